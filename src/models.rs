//! Core data models for library reconciliation.
//!
//! This module contains the persisted record shapes, the tri-state
//! completion flag, the collaborator-facing types and the run statistics
//! used throughout the sync pipeline.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// Steam application identifier
pub type AppId = u32;

/// HowLongToBeat game identifier
pub type HltbId = u64;

// ============================================================================
// Catalog Models
// ============================================================================

/// Game present in a user's ownership list
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedGame {
    pub app_id: AppId,
    pub name: String,
}

impl OwnedGame {
    pub fn new(app_id: AppId, name: impl Into<String>) -> Self {
        Self {
            app_id,
            name: name.into(),
        }
    }
}

/// Global unlock percentage for one achievement definition (0-100)
#[derive(Clone, Debug, PartialEq)]
pub struct AchievementPercentage {
    pub name: String,
    pub percent: f64,
}

impl AchievementPercentage {
    pub fn new(name: impl Into<String>, percent: f64) -> Self {
        Self {
            name: name.into(),
            percent,
        }
    }
}

/// Unlock state of one achievement for one player
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerAchievement {
    pub achieved: bool,
}

/// Whether a user has unlocked every achievement of a game.
///
/// Persisted as `true` / `false` / `null`. `Unknown` covers private
/// profiles and failed lookups; it never means "no achievements".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Completion {
    Completed,
    Incomplete,
    #[default]
    Unknown,
}

impl Completion {
    /// Derive completion from a player's achievement states.
    /// An empty list has nothing to judge and resolves to `Unknown`.
    pub fn from_states(states: &[PlayerAchievement]) -> Self {
        if states.is_empty() {
            Completion::Unknown
        } else if states.iter().all(|s| s.achieved) {
            Completion::Completed
        } else {
            Completion::Incomplete
        }
    }
}

impl From<Option<bool>> for Completion {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Completion::Completed,
            Some(false) => Completion::Incomplete,
            None => Completion::Unknown,
        }
    }
}

impl From<Completion> for Option<bool> {
    fn from(value: Completion) -> Self {
        match value {
            Completion::Completed => Some(true),
            Completion::Incomplete => Some(false),
            Completion::Unknown => None,
        }
    }
}

// ============================================================================
// Length Source Models
// ============================================================================

/// Candidate returned by a length-source search. Times are in hours.
#[derive(Clone, Debug, PartialEq)]
pub struct LengthCandidate {
    pub id: HltbId,
    pub title: String,
    pub similarity: f64,
    pub main_story: f64,
    pub main_extra: f64,
    pub completionist: f64,
    pub all_styles: f64,
}

/// Resolved length estimate. All fields are `None` when nothing matched.
/// A zero time is stored as `None`, never `Some(0.0)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthEstimate {
    #[serde(rename = "HLTB ID", default)]
    pub hltb_id: Option<HltbId>,
    #[serde(rename = "HLTB Title", default)]
    pub hltb_title: Option<String>,
    #[serde(rename = "HLTB Completionist Time", default)]
    pub completionist_hours: Option<f64>,
}

impl LengthEstimate {
    pub fn absent() -> Self {
        Self::default()
    }

    /// True when a length-source match exists for this entry
    pub fn is_resolved(&self) -> bool {
        self.hltb_id.is_some()
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// One scraped game in a user's library file (`<steamid>.json`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LibraryRecord {
    #[serde(rename = "AppID")]
    pub app_id: AppId,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Rarest Achievement %")]
    pub rarest_achievement: String,
    #[serde(rename = "Completed", default)]
    pub completed: Completion,
    #[serde(flatten)]
    pub length: LengthEstimate,
}

impl LibraryRecord {
    /// Rarity as a number, `None` if the stored string does not parse
    pub fn rarity_value(&self) -> Option<f64> {
        self.rarest_achievement.trim().parse().ok()
    }
}

/// AppID to length-source mapping shared across users (`steam_hltb_map.json`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossReferenceEntry {
    #[serde(rename = "AppID")]
    pub app_id: AppId,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Rarest Achievement %", default)]
    pub rarest_achievement: String,
    #[serde(flatten)]
    pub length: LengthEstimate,
}

impl From<&LibraryRecord> for CrossReferenceEntry {
    fn from(record: &LibraryRecord) -> Self {
        Self {
            app_id: record.app_id,
            title: record.title.clone(),
            rarest_achievement: record.rarest_achievement.clone(),
            length: record.length.clone(),
        }
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Counts for one sync pass, printed as the final summary
/// and optionally written as JSON.
#[derive(Default, Debug, Clone, Serialize)]
pub struct SyncReport {
    pub owned: usize,
    pub pending: usize,
    pub saved: usize,
    pub no_achievements: usize,
    pub skipped_with_error: usize,

    // Length lookups
    pub cache_hits: usize,
    pub length_lookups: usize,
    pub length_misses: usize,

    pub cancelled: bool,
    pub elapsed_seconds: f64,
}

impl SyncReport {
    /// Items that were looked at, whatever the outcome
    pub fn processed(&self) -> usize {
        self.saved + self.no_achievements + self.skipped_with_error
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::debug!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Outcome of a maintenance pass over the cross-reference cache
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub examined: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// The source has no data for the entry (no achievements, unknown id)
    pub not_found: usize,
    pub failed: usize,
}
