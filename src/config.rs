//! Runtime configuration and on-disk layout.
//!
//! Values come from CLI flags with environment fallbacks (`STEAM_API_KEY`,
//! `STEAM_ID`, `STEAM_COMPLETIONIST_DATA`); `main` loads a `.env` file first.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::identity::SteamId;

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Cross-reference cache file name
pub const CROSS_REFERENCE_FILE: &str = "steam_hltb_map.json";

/// No-achievements registry file name
pub const NO_ACHIEVEMENTS_FILE: &str = "no_achievements.json";

/// Resolved configuration for one invocation
#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<String>,
    pub default_steam_id: Option<String>,
    pub paths: DataPaths,
}

impl Config {
    pub fn new(
        api_key: Option<String>,
        default_steam_id: Option<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            default_steam_id: default_steam_id.filter(|s| !s.trim().is_empty()),
            paths: DataPaths::new(data_dir),
        }
    }

    /// API key, required by every mode that talks to Steam
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("No Steam API key configured: pass --api-key or set STEAM_API_KEY"),
        }
    }

    /// SteamID used when neither --steamid nor --vanity is given
    pub fn default_steam_id(&self) -> Result<SteamId> {
        match self.default_steam_id.as_deref() {
            Some(raw) => Ok(raw.parse()?),
            None => bail!("No SteamID given: pass --steamid, --vanity or set STEAM_ID"),
        }
    }
}

/// File locations inside the data directory
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub data_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Per-user library file: `<data>/<steamid>.json`
    pub fn library(&self, user: SteamId) -> PathBuf {
        self.data_dir.join(format!("{}.json", user))
    }

    pub fn cross_reference(&self) -> PathBuf {
        self.data_dir.join(CROSS_REFERENCE_FILE)
    }

    pub fn no_achievements(&self) -> PathBuf {
        self.data_dir.join(NO_ACHIEVEMENTS_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = DataPaths::new("/tmp/data");
        let user: SteamId = "76561197960287930".parse().unwrap();
        assert_eq!(paths.library(user), PathBuf::from("/tmp/data/76561197960287930.json"));
        assert_eq!(paths.cross_reference(), PathBuf::from("/tmp/data/steam_hltb_map.json"));
        assert_eq!(paths.no_achievements(), PathBuf::from("/tmp/data/no_achievements.json"));
    }

    #[test]
    fn test_blank_values_are_missing() {
        let config = Config::new(Some("  ".to_string()), Some(String::new()), "data");
        assert!(config.require_api_key().is_err());
        assert!(config.default_steam_id().is_err());
    }

    #[test]
    fn test_default_steam_id_is_validated() {
        let config = Config::new(None, Some("1234".to_string()), "data");
        let err = config.default_steam_id().unwrap_err();
        assert!(err.to_string().contains("invalid SteamID"));
    }
}
