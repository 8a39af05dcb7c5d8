//! In-memory collaborators for unit tests. Every call is recorded.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SourceError;
use crate::identity::SteamId;
use crate::models::{
    AchievementPercentage, AppId, HltbId, LengthCandidate, OwnedGame, PlayerAchievement,
};
use crate::sources::{CatalogSource, LengthSource};

pub const USER: &str = "76561197960287930";

pub fn user() -> SteamId {
    USER.parse().unwrap()
}

fn http_error(status: u16) -> SourceError {
    SourceError::Status {
        endpoint: "fake",
        status,
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub owned: Option<Vec<OwnedGame>>,
    pub achievements: HashMap<AppId, Vec<AchievementPercentage>>,
    pub failing_achievements: Vec<AppId>,
    pub player: HashMap<AppId, Vec<PlayerAchievement>>,
    pub vanity: HashMap<String, SteamId>,
    /// Set this flag when achievements for the given app are requested
    pub cancel_on: Option<(AppId, Arc<AtomicBool>)>,
    pub achievement_calls: RefCell<Vec<AppId>>,
    pub player_calls: RefCell<Vec<AppId>>,
}

impl FakeCatalog {
    pub fn owning(games: &[(AppId, &str)]) -> Self {
        Self {
            owned: Some(games.iter().map(|(id, name)| OwnedGame::new(*id, *name)).collect()),
            ..Self::default()
        }
    }

    pub fn with_achievements(mut self, app_id: AppId, percents: &[f64]) -> Self {
        let list = percents
            .iter()
            .enumerate()
            .map(|(i, p)| AchievementPercentage::new(format!("ACH_{}", i), *p))
            .collect();
        self.achievements.insert(app_id, list);
        self
    }

    pub fn with_player(mut self, app_id: AppId, achieved: &[bool]) -> Self {
        let list = achieved
            .iter()
            .map(|a| PlayerAchievement { achieved: *a })
            .collect();
        self.player.insert(app_id, list);
        self
    }

    pub fn own(&mut self, app_id: AppId, name: &str) {
        self.owned
            .get_or_insert_with(Vec::new)
            .push(OwnedGame::new(app_id, name));
    }

    pub fn achievement_fetches(&self, app_id: AppId) -> usize {
        self.achievement_calls
            .borrow()
            .iter()
            .filter(|id| **id == app_id)
            .count()
    }
}

impl CatalogSource for FakeCatalog {
    fn owned_games(&self, _user: SteamId) -> Result<Vec<OwnedGame>, SourceError> {
        self.owned
            .clone()
            .ok_or_else(|| SourceError::NotFound("private profile".to_string()))
    }

    fn global_achievements(&self, app_id: AppId) -> Result<Vec<AchievementPercentage>, SourceError> {
        self.achievement_calls.borrow_mut().push(app_id);
        if let Some((trigger, flag)) = &self.cancel_on {
            if *trigger == app_id {
                flag.store(true, Ordering::SeqCst);
            }
        }
        if self.failing_achievements.contains(&app_id) {
            return Err(SourceError::decode("fake", "truncated body"));
        }
        Ok(self.achievements.get(&app_id).cloned().unwrap_or_default())
    }

    fn player_achievements(
        &self,
        _user: SteamId,
        app_id: AppId,
    ) -> Result<Vec<PlayerAchievement>, SourceError> {
        self.player_calls.borrow_mut().push(app_id);
        self.player.get(&app_id).cloned().ok_or_else(|| http_error(403))
    }

    fn resolve_vanity(&self, name: &str) -> Result<Option<SteamId>, SourceError> {
        Ok(self.vanity.get(name).copied())
    }
}

#[derive(Default)]
pub struct FakeLength {
    pub by_title: HashMap<String, Vec<LengthCandidate>>,
    pub by_id: HashMap<HltbId, LengthCandidate>,
    pub failing_ids: Vec<HltbId>,
    pub searches: RefCell<Vec<String>>,
    pub id_lookups: RefCell<Vec<HltbId>>,
}

impl FakeLength {
    pub fn with_match(mut self, query: &str, candidate: LengthCandidate) -> Self {
        self.by_id.insert(candidate.id, candidate.clone());
        self.by_title.entry(query.to_string()).or_default().push(candidate);
        self
    }
}

impl LengthSource for FakeLength {
    fn search(&self, title: &str) -> Result<Vec<LengthCandidate>, SourceError> {
        self.searches.borrow_mut().push(title.to_string());
        Ok(self.by_title.get(title).cloned().unwrap_or_default())
    }

    fn search_by_id(&self, id: HltbId) -> Result<Option<LengthCandidate>, SourceError> {
        self.id_lookups.borrow_mut().push(id);
        if self.failing_ids.contains(&id) {
            return Err(http_error(502));
        }
        Ok(self.by_id.get(&id).cloned())
    }
}

pub fn candidate(id: HltbId, title: &str, similarity: f64, times: [f64; 4]) -> LengthCandidate {
    LengthCandidate {
        id,
        title: title.to_string(),
        similarity,
        main_story: times[0],
        main_extra: times[1],
        completionist: times[2],
        all_styles: times[3],
    }
}
