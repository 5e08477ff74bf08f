use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use ureq::Agent;

use crate::duration;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Which kind of performance a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Original,
    Piano,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Original => "original",
            Category::Piano => "piano",
        }
    }

    /// Search text for this category. The piano template ignores the
    /// artist; the original template appends it when present.
    fn query(self, track_name: &str, artist: Option<&str>) -> String {
        match self {
            Category::Original => match artist {
                Some(artist) => format!("{track_name} {artist}"),
                None => track_name.to_string(),
            },
            Category::Piano => format!("{track_name} piano solo"),
        }
    }

    /// Whether a candidate title is acceptable. Original takes the top
    /// result as-is; piano insists on "piano" somewhere in the title.
    fn accepts(self, title: &str) -> bool {
        match self {
            Category::Original => true,
            Category::Piano => title.to_lowercase().contains("piano"),
        }
    }
}

/// Result of resolving one (track, category) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Found {
        url: String,
        duration_ms: Option<i64>,
    },
    NotFound,
    QuotaExceeded,
}

impl ResolutionOutcome {
    /// URL and duration for row assembly; the no-match outcomes carry
    /// neither.
    pub fn into_match(self) -> (Option<String>, Option<i64>) {
        match self {
            ResolutionOutcome::Found { url, duration_ms } => (Some(url), duration_ms),
            ResolutionOutcome::NotFound | ResolutionOutcome::QuotaExceeded => (None, None),
        }
    }
}

/// Run-scoped memo of resolution outcomes keyed by (track name, category).
/// Only Found and NotFound are stored; QuotaExceeded is never cached so a
/// later call retries once the quota resets.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<(String, Category), ResolutionOutcome>,
    hits: usize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a memoized outcome, counting the hit.
    pub fn get(&mut self, track_name: &str, category: Category) -> Option<ResolutionOutcome> {
        let hit = self.entries.get(&(track_name.to_string(), category)).cloned();
        if hit.is_some() {
            self.hits += 1;
            log::debug!("Cache hit for '{track_name}' ({})", category.label());
        }
        hit
    }

    /// Memoize an outcome. Quota signals are deliberately not stored.
    pub fn insert(&mut self, track_name: &str, category: Category, outcome: &ResolutionOutcome) {
        if *outcome == ResolutionOutcome::QuotaExceeded {
            return;
        }
        self.entries
            .insert((track_name.to_string(), category), outcome.clone());
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// YouTube Data API v3 search response (only the fields we read).
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Transport failure classification. Quota exhaustion is the only variant
/// the pipeline reacts to; everything else is logged and degraded.
#[derive(Debug, Error)]
enum ApiError {
    #[error("quota exhausted or key rejected (HTTP {0})")]
    Quota(u16),
    #[error(transparent)]
    Transport(#[from] ureq::Error),
}

fn classify(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::StatusCode(code) if code == 401 || code == 403 => ApiError::Quota(code),
        other => ApiError::Transport(other),
    }
}

/// First candidate, in ranking order, whose title the category accepts.
/// Candidates without a video id cannot be linked and are skipped.
fn first_acceptable(category: Category, items: &[SearchItem]) -> Option<(&str, &str)> {
    items.iter().find_map(|item| {
        let id = item.id.video_id.as_deref()?;
        category
            .accepts(&item.snippet.title)
            .then_some((id, item.snippet.title.as_str()))
    })
}

/// Search client for the YouTube Data API v3.
pub struct YouTubeClient {
    agent: Agent,
    api_key: String,
    max_results: u32,
}

impl YouTubeClient {
    pub fn new(agent: Agent, api_key: String, max_results: u32) -> Self {
        Self {
            agent,
            api_key,
            max_results,
        }
    }

    /// Resolve a track to a video of the given category, consulting and
    /// filling the run-scoped cache the orchestrator owns.
    pub fn resolve(
        &self,
        cache: &mut ResolutionCache,
        track_name: &str,
        artist: Option<&str>,
        category: Category,
    ) -> ResolutionOutcome {
        if let Some(hit) = cache.get(track_name, category) {
            return hit;
        }
        let outcome = self.lookup(track_name, artist, category);
        cache.insert(track_name, category, &outcome);
        outcome
    }

    /// Search, take the first acceptable candidate, then fetch its exact
    /// duration. Transport problems other than quota degrade to NotFound
    /// (search) or an absent duration (second lookup).
    fn lookup(
        &self,
        track_name: &str,
        artist: Option<&str>,
        category: Category,
    ) -> ResolutionOutcome {
        let query = category.query(track_name, artist);
        let items = match self.search(&query) {
            Ok(items) => items,
            Err(ApiError::Quota(code)) => {
                log::warn!(
                    "{} search for '{track_name}' rejected with HTTP {code}, treating as quota exhaustion",
                    category.label()
                );
                return ResolutionOutcome::QuotaExceeded;
            }
            Err(e) => {
                log::warn!("{} search for '{track_name}' failed: {e}", category.label());
                return ResolutionOutcome::NotFound;
            }
        };

        let Some((video_id, title)) = first_acceptable(category, &items) else {
            log::info!("No {} match for '{track_name}'", category.label());
            return ResolutionOutcome::NotFound;
        };
        log::debug!(
            "Accepted {} candidate for '{track_name}': {title}",
            category.label()
        );

        let url = format!("{WATCH_URL}{video_id}");
        let duration_ms = match self.video_duration(video_id) {
            Ok(ms) => ms,
            Err(ApiError::Quota(code)) => {
                log::warn!("Duration lookup for '{track_name}' rejected with HTTP {code}");
                return ResolutionOutcome::QuotaExceeded;
            }
            Err(e) => {
                log::warn!(
                    "Duration lookup for {video_id} failed, keeping the match without it: {e}"
                );
                None
            }
        };

        ResolutionOutcome::Found { url, duration_ms }
    }

    fn search(&self, query: &str) -> Result<Vec<SearchItem>, ApiError> {
        let url = format!(
            "{API_BASE}/search?part=snippet&type=video&videoDefinition=high&maxResults={}&q={}&key={}",
            self.max_results,
            urlencoding::encode(query),
            self.api_key
        );
        let resp: SearchResponse = self
            .agent
            .get(&url)
            .call()
            .map_err(classify)?
            .body_mut()
            .read_json()
            .map_err(classify)?;
        Ok(resp.items)
    }

    fn video_duration(&self, video_id: &str) -> Result<Option<i64>, ApiError> {
        let url = format!(
            "{API_BASE}/videos?part=contentDetails&id={video_id}&key={}",
            self.api_key
        );
        let resp: VideoListResponse = self
            .agent
            .get(&url)
            .call()
            .map_err(classify)?
            .body_mut()
            .read_json()
            .map_err(classify)?;

        let raw = resp
            .items
            .into_iter()
            .next()
            .and_then(|v| v.content_details.duration);
        match duration::normalize(raw.as_deref()) {
            Ok(ms) => Ok(ms),
            Err(e) => {
                log::warn!("Unparseable duration for {video_id}: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_items(json: &str) -> Vec<SearchItem> {
        serde_json::from_str::<SearchResponse>(json).unwrap().items
    }

    #[test]
    fn test_query_templates() {
        assert_eq!(
            Category::Original.query("Clair de Lune", Some("Claude Debussy")),
            "Clair de Lune Claude Debussy"
        );
        assert_eq!(Category::Original.query("Clair de Lune", None), "Clair de Lune");
        // The piano template never includes the artist.
        assert_eq!(
            Category::Piano.query("Clair de Lune", Some("Claude Debussy")),
            "Clair de Lune piano solo"
        );
    }

    #[test]
    fn test_acceptance_predicates() {
        assert!(Category::Piano.accepts("Clair de Lune - PIANO cover"));
        assert!(Category::Piano.accepts("relaxing piano solo"));
        assert!(!Category::Piano.accepts("Clair de Lune (guitar cover)"));
        // Original accepts anything the ranking puts first.
        assert!(Category::Original.accepts("Clair de Lune (guitar cover)"));
        assert!(Category::Original.accepts(""));
    }

    #[test]
    fn test_first_acceptable_respects_ranking() {
        let items = search_items(
            r#"{"items": [
                {"id": {"videoId": "aaa"}, "snippet": {"title": "Official Video"}},
                {"id": {"videoId": "bbb"}, "snippet": {"title": "Piano Solo Version"}},
                {"id": {"videoId": "ccc"}, "snippet": {"title": "Another Piano Take"}}
            ]}"#,
        );
        assert_eq!(
            first_acceptable(Category::Piano, &items),
            Some(("bbb", "Piano Solo Version"))
        );
        assert_eq!(
            first_acceptable(Category::Original, &items),
            Some(("aaa", "Official Video"))
        );
    }

    #[test]
    fn test_first_acceptable_skips_idless_candidates() {
        let items = search_items(
            r#"{"items": [
                {"id": {}, "snippet": {"title": "Piano but no id"}},
                {"id": {"videoId": "ddd"}, "snippet": {"title": "Piano with id"}}
            ]}"#,
        );
        assert_eq!(
            first_acceptable(Category::Piano, &items),
            Some(("ddd", "Piano with id"))
        );
        assert_eq!(first_acceptable(Category::Piano, &items[..1]), None);
    }

    #[test]
    fn test_cache_memoizes_found_and_not_found() {
        let mut cache = ResolutionCache::new();
        let found = ResolutionOutcome::Found {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            duration_ms: Some(253_000),
        };

        cache.insert("Clair de Lune", Category::Piano, &found);
        cache.insert("Clair de Lune", Category::Original, &ResolutionOutcome::NotFound);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.get("Clair de Lune", Category::Piano), Some(found));
        assert_eq!(
            cache.get("Clair de Lune", Category::Original),
            Some(ResolutionOutcome::NotFound)
        );
        assert_eq!(cache.get("Gymnopedie No. 1", Category::Piano), None);
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn test_cache_never_stores_quota() {
        let mut cache = ResolutionCache::new();
        cache.insert("Clair de Lune", Category::Piano, &ResolutionOutcome::QuotaExceeded);
        assert!(cache.is_empty());
        assert_eq!(cache.get("Clair de Lune", Category::Piano), None);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_video_list_deserialize() {
        let resp: VideoListResponse = serde_json::from_str(
            r#"{"items": [{"contentDetails": {"duration": "PT4M13S"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            resp.items[0].content_details.duration.as_deref(),
            Some("PT4M13S")
        );
    }
}
