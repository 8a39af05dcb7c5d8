//! Collaborator seams: the catalog (ownership + achievements) and the
//! length source (game-length search).
//!
//! The engine is generic over these traits so the HTTP clients in
//! [`crate::steam`] and [`crate::hltb`] can be swapped for fakes.

use crate::error::SourceError;
use crate::identity::SteamId;
use crate::models::{AchievementPercentage, AppId, HltbId, LengthCandidate, OwnedGame, PlayerAchievement};

pub trait CatalogSource {
    /// Every app the user owns, limited and free apps included
    fn owned_games(&self, user: SteamId) -> Result<Vec<OwnedGame>, SourceError>;

    /// Global unlock percentages; empty when the app has no achievements
    fn global_achievements(&self, app_id: AppId) -> Result<Vec<AchievementPercentage>, SourceError>;

    /// The user's unlock states for one app
    fn player_achievements(
        &self,
        user: SteamId,
        app_id: AppId,
    ) -> Result<Vec<PlayerAchievement>, SourceError>;

    /// `Ok(None)` when the service has no profile under that name
    fn resolve_vanity(&self, name: &str) -> Result<Option<SteamId>, SourceError>;
}

pub trait LengthSource {
    /// Fuzzy title search; candidates carry a similarity score
    fn search(&self, title: &str) -> Result<Vec<LengthCandidate>, SourceError>;

    /// Direct lookup by length-source identifier
    fn search_by_id(&self, id: HltbId) -> Result<Option<LengthCandidate>, SourceError>;
}

impl<T: CatalogSource + ?Sized> CatalogSource for &T {
    fn owned_games(&self, user: SteamId) -> Result<Vec<OwnedGame>, SourceError> {
        (**self).owned_games(user)
    }

    fn global_achievements(&self, app_id: AppId) -> Result<Vec<AchievementPercentage>, SourceError> {
        (**self).global_achievements(app_id)
    }

    fn player_achievements(
        &self,
        user: SteamId,
        app_id: AppId,
    ) -> Result<Vec<PlayerAchievement>, SourceError> {
        (**self).player_achievements(user, app_id)
    }

    fn resolve_vanity(&self, name: &str) -> Result<Option<SteamId>, SourceError> {
        (**self).resolve_vanity(name)
    }
}

impl<T: LengthSource + ?Sized> LengthSource for &T {
    fn search(&self, title: &str) -> Result<Vec<LengthCandidate>, SourceError> {
        (**self).search(title)
    }

    fn search_by_id(&self, id: HltbId) -> Result<Option<LengthCandidate>, SourceError> {
        (**self).search_by_id(id)
    }
}
