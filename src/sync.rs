//! Reconciliation engine: incremental library sync for one user.
//!
//! A pass works out which owned games have never been processed (neither
//! in the user's library nor in the no-achievements registry), then handles
//! them one at a time in ownership order:
//!
//! 1. length estimate, from the cross-reference cache or a fuzzy search
//! 2. global achievements; an empty list sends the game to the registry
//! 3. rarity and completion status
//! 4. append the record to the library file
//!
//! Each game is persisted before the next one starts, so an interrupted
//! run loses at most the game in flight and the next run resumes where it
//! stopped. A failure on one game is logged and the pass moves on.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::DataPaths;
use crate::identity::SteamId;
use crate::length::find_length;
use crate::models::{
    AppId, Completion, CrossReferenceEntry, LengthEstimate, LibraryRecord, OwnedGame, SyncReport,
};
use crate::normalize::clean_title;
use crate::progress::{create_progress_bar, create_spinner, tick};
use crate::scoring::rarity;
use crate::sources::{CatalogSource, LengthSource};
use crate::store::{CrossReferenceStore, LibraryStore, NoAchievementsRegistry};

/// The three stores a sync pass reads and writes
#[derive(Clone, Debug)]
pub struct Stores {
    pub library: LibraryStore,
    pub cross_reference: CrossReferenceStore,
    pub no_achievements: NoAchievementsRegistry,
}

impl Stores {
    pub fn for_user(paths: &DataPaths, user: SteamId) -> Self {
        Self {
            library: LibraryStore::open(paths.library(user)),
            cross_reference: CrossReferenceStore::open(paths.cross_reference()),
            no_achievements: NoAchievementsRegistry::open(paths.no_achievements()),
        }
    }
}

/// What happened to one pending game
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemOutcome {
    Saved,
    NoAchievements,
}

/// Mutable state carried across the items of one pass
struct PassState {
    cache: FxHashMap<AppId, CrossReferenceEntry>,
    no_achievements: BTreeSet<AppId>,
    report: SyncReport,
}

pub struct Reconciler<C, L> {
    catalog: C,
    length: L,
    cancel: Arc<AtomicBool>,
}

impl<C: CatalogSource, L: LengthSource> Reconciler<C, L> {
    pub fn new(catalog: C, length: L) -> Self {
        Self {
            catalog,
            length,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag. It is only checked between games.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Owned games not yet in the library or the registry, in ownership
    /// order, each AppID at most once.
    pub fn pending_games(&self, user: SteamId, stores: &Stores) -> Result<(usize, Vec<OwnedGame>)> {
        let mut processed: FxHashSet<AppId> = stores
            .library
            .app_ids()
            .context("Failed to read library file")?;
        processed.extend(
            stores
                .no_achievements
                .load()
                .context("Failed to read no-achievements registry")?,
        );

        let spinner = create_spinner("Fetching owned games");
        let owned = self.catalog.owned_games(user);
        spinner.finish_and_clear();
        let owned = owned.with_context(|| {
            format!(
                "Either the SteamID {} is invalid or the profile may be set to private",
                user
            )
        })?;
        let owned_count = owned.len();

        let pending = owned
            .into_iter()
            .filter(|g| processed.insert(g.app_id))
            .collect();
        Ok((owned_count, pending))
    }

    /// Run one sync pass for `user`.
    ///
    /// Errors only for problems that stop the whole pass (unreadable stores,
    /// ownership list unavailable); per-game failures are counted in
    /// `skipped_with_error`.
    pub fn sync(&self, user: SteamId, stores: &Stores) -> Result<SyncReport> {
        let start = Instant::now();

        let (owned, pending) = self.pending_games(user, stores)?;
        let mut state = PassState {
            cache: FxHashMap::default(),
            no_achievements: BTreeSet::new(),
            report: SyncReport {
                owned,
                pending: pending.len(),
                ..SyncReport::default()
            },
        };

        if pending.is_empty() {
            tracing::info!("No new games found to update.");
            state.report.elapsed_seconds = start.elapsed().as_secs_f64();
            return Ok(state.report);
        }
        tracing::info!(owned, pending = pending.len(), "found new games to scrape");

        state.cache = stores
            .cross_reference
            .index()
            .context("Failed to read cross-reference cache")?;

        let pb = create_progress_bar(pending.len() as u64, "Scraping library");

        for game in &pending {
            if self.is_cancelled() {
                state.report.cancelled = true;
                pb.suspend(|| tracing::warn!("Cancelled; stopping before AppID {}", game.app_id));
                break;
            }

            match self.process_game(user, game, stores, &mut state) {
                Ok(ItemOutcome::Saved) => state.report.saved += 1,
                Ok(ItemOutcome::NoAchievements) => state.report.no_achievements += 1,
                Err(e) => {
                    state.report.skipped_with_error += 1;
                    pb.suspend(|| {
                        tracing::warn!(
                            app_id = game.app_id,
                            title = %game.name.trim(),
                            "Skipping game: {:#}",
                            e
                        )
                    });
                }
            }
            tick(&pb, "sync");
        }

        pb.finish_with_message(format!("Saved {} games", state.report.saved));

        // Final flush; normally a no-op since each AppID is written on arrival
        if !state.no_achievements.is_empty() {
            stores
                .no_achievements
                .extend(state.no_achievements.iter().copied())
                .context("Failed to save no-achievements registry")?;
        }

        state.report.elapsed_seconds = start.elapsed().as_secs_f64();
        state.report.log_phase("sync");
        Ok(state.report)
    }

    fn process_game(
        &self,
        user: SteamId,
        game: &OwnedGame,
        stores: &Stores,
        state: &mut PassState,
    ) -> Result<ItemOutcome> {
        let app_id = game.app_id;
        let title = clean_title(&game.name);

        let (length, cached) = self.length_for(app_id, &title, state);

        let achievements = self
            .catalog
            .global_achievements(app_id)
            .context("Failed to fetch global achievements")?;

        if achievements.is_empty() {
            state.no_achievements.insert(app_id);
            stores
                .no_achievements
                .extend(state.no_achievements.iter().copied())
                .context("Failed to save no-achievements registry")?;
            return Ok(ItemOutcome::NoAchievements);
        }
        // A non-empty list without a usable percentage is a bad response,
        // not a game without achievements; retried on the next run
        let rarest = rarity(&achievements).context("No usable achievement percentage")?;

        let completed = match self.catalog.player_achievements(user, app_id) {
            Ok(states) => Completion::from_states(&states),
            Err(e) => {
                tracing::debug!(app_id, error = %e, "completion unknown");
                Completion::Unknown
            }
        };

        let record = LibraryRecord {
            app_id,
            title,
            rarest_achievement: rarest,
            completed,
            length,
        };
        stores
            .library
            .append(std::slice::from_ref(&record))
            .context("Failed to save library record")?;

        if !cached && record.length.is_resolved() {
            self.remember(&record, stores, state);
        }

        Ok(ItemOutcome::Saved)
    }

    /// Cached estimate if the AppID has a known match, otherwise a fresh
    /// fuzzy search. The flag is true for cache hits.
    fn length_for(&self, app_id: AppId, title: &str, state: &mut PassState) -> (LengthEstimate, bool) {
        if let Some(entry) = state.cache.get(&app_id) {
            if entry.length.is_resolved() {
                state.report.cache_hits += 1;
                return (entry.length.clone(), true);
            }
        }

        state.report.length_lookups += 1;
        let found = find_length(&self.length, title);
        if found.is_miss() {
            state.report.length_misses += 1;
            tracing::debug!(app_id, title, queries = found.queries.len(), "no length match");
        }
        (found.estimate, false)
    }

    /// Add a freshly resolved match to the cross-reference cache. The record
    /// is already saved, so a failure here is only logged.
    fn remember(&self, record: &LibraryRecord, stores: &Stores, state: &mut PassState) {
        let entry = CrossReferenceEntry::from(record);
        match stores.cross_reference.insert_new(std::slice::from_ref(&entry)) {
            Ok(_) => {
                let slot = state.cache.entry(entry.app_id).or_insert_with(|| entry.clone());
                if !slot.length.is_resolved() {
                    *slot = entry;
                }
            }
            Err(e) => tracing::warn!(app_id = record.app_id, error = %e, "cross-reference not updated"),
        }
    }
}
