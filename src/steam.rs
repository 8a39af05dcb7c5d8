//! Steam Web API client.
//!
//! Wraps the four endpoints the engine needs (ownership, global achievement
//! percentages, player achievements, vanity resolution) using
//! [`reqwest::blocking`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::SourceError;
use crate::identity::SteamId;
use crate::models::{AchievementPercentage, AppId, OwnedGame, PlayerAchievement};
use crate::sources::CatalogSource;

pub const DEFAULT_BASE_URL: &str = "https://api.steampowered.com";

const OWNED_GAMES: &str = "IPlayerService/GetOwnedGames/v1";
const GLOBAL_ACHIEVEMENTS: &str = "ISteamUserStats/GetGlobalAchievementPercentagesForApp/v2";
const PLAYER_ACHIEVEMENTS: &str = "ISteamUserStats/GetPlayerAchievements/v1";
const RESOLVE_VANITY: &str = "ISteamUser/ResolveVanityURL/v1";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesResponse {
    games: Option<Vec<OwnedGameWire>>,
}

#[derive(Debug, Deserialize)]
struct OwnedGameWire {
    appid: AppId,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GlobalAchievementsResponse {
    achievementpercentages: GlobalAchievementList,
}

#[derive(Debug, Deserialize)]
struct GlobalAchievementList {
    #[serde(default)]
    achievements: Vec<GlobalAchievementWire>,
}

/// The v2 endpoint reports `percent` as a string, v1 as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Percent {
    Number(f64),
    Text(String),
}

impl Percent {
    fn value(&self) -> Option<f64> {
        match self {
            Percent::Number(n) => n.is_finite().then_some(*n),
            Percent::Text(s) => s.trim().parse().ok().filter(|p: &f64| p.is_finite()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GlobalAchievementWire {
    #[serde(default)]
    name: String,
    percent: Percent,
}

#[derive(Debug, Deserialize)]
struct PlayerStatsResponse {
    playerstats: PlayerStats,
}

#[derive(Debug, Deserialize)]
struct PlayerStats {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    achievements: Vec<PlayerAchievementWire>,
}

#[derive(Debug, Deserialize)]
struct PlayerAchievementWire {
    achieved: u8,
}

#[derive(Debug, Deserialize)]
struct VanityResponse {
    success: u8,
    steamid: Option<String>,
}

/// Convert the wire list. A percent that does not parse makes the whole
/// response malformed rather than silently shrinking the list.
fn percentages(body: GlobalAchievementsResponse) -> Result<Vec<AchievementPercentage>, SourceError> {
    body.achievementpercentages
        .achievements
        .into_iter()
        .map(|a| match a.percent.value() {
            Some(percent) => Ok(AchievementPercentage::new(a.name, percent)),
            None => Err(SourceError::decode(
                GLOBAL_ACHIEVEMENTS,
                format!("unparsable percent for achievement '{}'", a.name),
            )),
        })
        .collect()
}

// ============================================================================
// Client
// ============================================================================

/// Blocking client for the Steam Web API, bound to one API key
pub struct SteamClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl SteamClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("steam-completionist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        tracing::trace!(endpoint, "steam request");
        let response = self
            .client
            .get(format!("{}/{}/", self.base_url, endpoint))
            .query(&[("key", self.api_key.as_str()), ("format", "json")])
            .query(query)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| SourceError::decode(endpoint, e.to_string()))
    }
}

impl CatalogSource for SteamClient {
    fn owned_games(&self, user: SteamId) -> Result<Vec<OwnedGame>, SourceError> {
        // skip_unvetted_apps=0 keeps profile-limited games in the list
        let envelope: Envelope<OwnedGamesResponse> = self.get_json(
            OWNED_GAMES,
            &[
                ("steamid", user.to_string()),
                ("include_appinfo", "1".to_string()),
                ("include_played_free_games", "1".to_string()),
                ("include_free_sub", "0".to_string()),
                ("skip_unvetted_apps", "0".to_string()),
                ("language", "en".to_string()),
            ],
        )?;

        let games = envelope.response.games.ok_or_else(|| {
            SourceError::NotFound(format!("no visible games for {} (private profile?)", user))
        })?;
        Ok(games
            .into_iter()
            .map(|g| OwnedGame::new(g.appid, g.name))
            .collect())
    }

    fn global_achievements(&self, app_id: AppId) -> Result<Vec<AchievementPercentage>, SourceError> {
        let result: Result<GlobalAchievementsResponse, _> =
            self.get_json(GLOBAL_ACHIEVEMENTS, &[("gameid", app_id.to_string())]);

        match result {
            Ok(body) => percentages(body),
            // Apps without a stats schema answer with an HTTP error
            Err(SourceError::Status { status, .. }) => {
                tracing::debug!(app_id, status, "no global achievement data");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn player_achievements(
        &self,
        user: SteamId,
        app_id: AppId,
    ) -> Result<Vec<PlayerAchievement>, SourceError> {
        let body: PlayerStatsResponse = self.get_json(
            PLAYER_ACHIEVEMENTS,
            &[("steamid", user.to_string()), ("appid", app_id.to_string())],
        )?;

        let stats = body.playerstats;
        if !stats.success {
            return Err(SourceError::NotFound(
                stats.error.unwrap_or_else(|| "player stats unavailable".to_string()),
            ));
        }
        Ok(stats
            .achievements
            .into_iter()
            .map(|a| PlayerAchievement {
                achieved: a.achieved != 0,
            })
            .collect())
    }

    fn resolve_vanity(&self, name: &str) -> Result<Option<SteamId>, SourceError> {
        let envelope: Envelope<VanityResponse> =
            self.get_json(RESOLVE_VANITY, &[("vanityurl", name.to_string())])?;

        let response = envelope.response;
        if response.success != 1 {
            return Ok(None);
        }
        match response.steamid {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| SourceError::decode(RESOLVE_VANITY, format!("bad steamid '{}'", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_accepts_number_or_string() {
        let body = r#"{"achievementpercentages":{"achievements":[
            {"name":"A","percent":"12.5"},
            {"name":"B","percent":3.25},
            {"name":"C","percent":"junk"}
        ]}}"#;
        let parsed: GlobalAchievementsResponse = serde_json::from_str(body).unwrap();
        let values: Vec<Option<f64>> = parsed
            .achievementpercentages
            .achievements
            .iter()
            .map(|a| a.percent.value())
            .collect();
        assert_eq!(values, vec![Some(12.5), Some(3.25), None]);
    }

    #[test]
    fn test_unparsable_percent_is_decode_error() {
        let body = r#"{"achievementpercentages":{"achievements":[
            {"name":"A","percent":"12.5"},
            {"name":"B","percent":"n/a"}
        ]}}"#;
        let parsed: GlobalAchievementsResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            percentages(parsed),
            Err(SourceError::Decode { endpoint: GLOBAL_ACHIEVEMENTS, .. })
        ));

        let good = r#"{"achievementpercentages":{"achievements":[{"name":"A","percent":"1.5"}]}}"#;
        let parsed: GlobalAchievementsResponse = serde_json::from_str(good).unwrap();
        assert_eq!(percentages(parsed).unwrap(), vec![AchievementPercentage::new("A", 1.5)]);
    }

    #[test]
    fn test_private_profile_has_no_games_key() {
        let parsed: Envelope<OwnedGamesResponse> = serde_json::from_str(r#"{"response":{}}"#).unwrap();
        assert!(parsed.response.games.is_none());
    }

    #[test]
    fn test_player_stats_failure_shape() {
        let body = r#"{"playerstats":{"error":"Profile is not public","success":false}}"#;
        let parsed: PlayerStatsResponse = serde_json::from_str(body).unwrap();
        assert!(!parsed.playerstats.success);
        assert!(parsed.playerstats.achievements.is_empty());
    }

    #[test]
    fn test_vanity_no_match_shape() {
        let body = r#"{"response":{"success":42,"message":"No match"}}"#;
        let parsed: Envelope<VanityResponse> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response.success, 42);
        assert!(parsed.response.steamid.is_none());
    }
}
