//! User identity: the SteamID64 newtype and vanity-name resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::sources::CatalogSource;

/// Canonical 64-bit Steam user identifier (17 decimal digits)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(u64);

impl SteamId {
    pub const DIGITS: usize = 17;
}

impl FromStr for SteamId {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != Self::DIGITS || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ResolutionError::InvalidId(s.to_string()));
        }
        trimmed
            .parse()
            .map(SteamId)
            .map_err(|_| ResolutionError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve a profile vanity name (the `xyz` in `steamcommunity.com/id/xyz`)
/// to a SteamID. Transport failures are not retried.
pub fn resolve_vanity<C: CatalogSource + ?Sized>(
    catalog: &C,
    vanity: &str,
) -> Result<SteamId, ResolutionError> {
    let name = vanity.trim().trim_matches('/');
    if name.is_empty() {
        return Err(ResolutionError::NoMatch(vanity.to_string()));
    }
    match catalog.resolve_vanity(name)? {
        Some(id) => Ok(id),
        None => Err(ResolutionError::NoMatch(name.to_string())),
    }
}
