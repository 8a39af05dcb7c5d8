//! HowLongToBeat client.
//!
//! Title search goes through the site's JSON search endpoint; lookups by id
//! read the `__NEXT_DATA__` payload embedded in the game page. Times arrive
//! in seconds and are converted to hours. Similarity is computed here,
//! against the lower-cased query, and weak matches are dropped.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::Deserialize;

use crate::error::SourceError;
use crate::models::{HltbId, LengthCandidate};
use crate::sources::LengthSource;

pub const DEFAULT_BASE_URL: &str = "https://howlongtobeat.com";

/// Candidates less similar than this to the query are discarded
pub const MIN_SIMILARITY: f64 = 0.4;

/// Relative to the base URL; the site moves it from time to time
const SEARCH_PATH: &str = "api/search";

const SEARCH: &str = "hltb search";
const GAME_PAGE: &str = "hltb game page";

static NEXT_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json"[^>]*>(.*?)</script>"#).unwrap()
});

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<GameWire>,
}

#[derive(Debug, Deserialize)]
struct GameWire {
    game_id: HltbId,
    game_name: String,
    #[serde(default)]
    comp_main: f64,
    #[serde(default)]
    comp_plus: f64,
    #[serde(default)]
    comp_100: f64,
    #[serde(default)]
    comp_all: f64,
}

#[derive(Debug, Deserialize)]
struct NextData {
    props: NextProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextProps {
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    game: GamePage,
}

#[derive(Debug, Deserialize)]
struct GamePage {
    data: GamePageData,
}

#[derive(Debug, Deserialize)]
struct GamePageData {
    #[serde(default)]
    game: Vec<GameWire>,
}

fn seconds_to_hours(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds / 3600.0
    } else {
        0.0
    }
}

/// Similarity between the query and a candidate name (0.0 to 1.0)
pub fn title_similarity(query: &str, name: &str) -> f64 {
    strsim::normalized_levenshtein(&query.to_lowercase(), &name.to_lowercase())
}

impl GameWire {
    fn into_candidate(self, similarity: f64) -> LengthCandidate {
        LengthCandidate {
            id: self.game_id,
            title: self.game_name,
            similarity,
            main_story: seconds_to_hours(self.comp_main),
            main_extra: seconds_to_hours(self.comp_plus),
            completionist: seconds_to_hours(self.comp_100),
            all_styles: seconds_to_hours(self.comp_all),
        }
    }
}

fn parse_game_page(html: &str) -> Result<Option<GameWire>, SourceError> {
    let payload = NEXT_DATA
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| SourceError::decode(GAME_PAGE, "missing __NEXT_DATA__ payload"))?;
    let data: NextData = serde_json::from_str(payload.as_str())
        .map_err(|e| SourceError::decode(GAME_PAGE, e.to_string()))?;
    Ok(data.props.page_props.game.data.game.into_iter().next())
}

// ============================================================================
// Client
// ============================================================================

pub struct HltbClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HltbClient {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        // The search endpoint rejects requests without a site referer
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("{}/", base_url)) {
            headers.insert(REFERER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&base_url) {
            headers.insert(ORIGIN, value);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) steam-completionist")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
        })
    }

    fn search_body(title: &str) -> serde_json::Value {
        let terms: Vec<&str> = title.split_whitespace().collect();
        serde_json::json!({
            "searchType": "games",
            "searchTerms": terms,
            "searchPage": 1,
            "size": 20,
            "searchOptions": {
                "games": {
                    "userId": 0,
                    "platform": "",
                    "sortCategory": "popular",
                    "rangeCategory": "main",
                    "rangeTime": { "min": 0, "max": 0 },
                    "gameplay": { "perspective": "", "flow": "", "genre": "", "difficulty": "" },
                    "rangeYear": { "min": "", "max": "" },
                    "modifier": ""
                },
                "users": { "sortCategory": "postcount" },
                "lists": { "sortCategory": "follows" },
                "filter": "",
                "sort": 0,
                "randomizer": 0
            },
            "useCache": true
        })
    }
}

impl LengthSource for HltbClient {
    fn search(&self, title: &str) -> Result<Vec<LengthCandidate>, SourceError> {
        if title.trim().is_empty() {
            return Ok(Vec::new());
        }
        tracing::trace!(title, "hltb search");

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, SEARCH_PATH))
            .json(&Self::search_body(title))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: SEARCH,
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::decode(SEARCH, e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .filter_map(|game| {
                let similarity = title_similarity(title, &game.game_name);
                (similarity >= MIN_SIMILARITY).then(|| game.into_candidate(similarity))
            })
            .collect())
    }

    fn search_by_id(&self, id: HltbId) -> Result<Option<LengthCandidate>, SourceError> {
        let response = self
            .client
            .get(format!("{}/game/{}", self.base_url, id))
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                endpoint: GAME_PAGE,
                status: status.as_u16(),
            });
        }

        let html = response.text()?;
        Ok(parse_game_page(&html)?.map(|game| game.into_candidate(1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_similarity() {
        assert_eq!(title_similarity("Celeste", "celeste"), 1.0);
        assert!(title_similarity("Hades", "Hades II") > title_similarity("Hades", "Portal"));
    }

    #[test]
    fn test_search_response_to_hours() {
        let body = r#"{"data":[{"game_id":42,"game_name":"Celeste","comp_main":30600,"comp_plus":54000,"comp_100":136800,"comp_all":45000}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let candidate = parsed.data.into_iter().next().unwrap().into_candidate(1.0);
        assert_eq!(candidate.id, 42);
        assert_eq!(candidate.main_story, 8.5);
        assert_eq!(candidate.completionist, 38.0);
    }

    #[test]
    fn test_missing_times_are_zero() {
        let body = r#"{"data":[{"game_id":7,"game_name":"Obscure"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let candidate = parsed.data.into_iter().next().unwrap().into_candidate(0.5);
        assert_eq!(candidate.all_styles, 0.0);
    }

    #[test]
    fn test_parse_game_page() {
        let html = r#"<html><body><script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"game":{"data":{"game":[{"game_id":99,"game_name":"Game A","comp_main":18000,"comp_plus":0,"comp_100":36000,"comp_all":0}]}}}}}
            </script></body></html>"#;
        let game = parse_game_page(html).unwrap().unwrap();
        assert_eq!(game.game_id, 99);
        assert_eq!(seconds_to_hours(game.comp_100), 10.0);
    }

    #[test]
    fn test_game_page_without_payload_is_decode_error() {
        assert!(matches!(
            parse_game_page("<html></html>"),
            Err(SourceError::Decode { .. })
        ));
    }

    #[test]
    fn test_search_body_splits_terms() {
        let body = HltbClient::search_body("Hollow  Knight");
        assert_eq!(body["searchTerms"], serde_json::json!(["Hollow", "Knight"]));
    }
}
