use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use ureq::Agent;

use crate::config::{Credentials, FetchConfig};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// One page of a playlist's tracks from the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<RawTrack>,
}

/// Raw track record as the API returns it. Every nested field can be
/// missing; extraction substitutes absence instead of failing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    pub album: Option<RawAlbum>,
    pub duration_ms: Option<i64>,
    pub external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtist {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAlbum {
    pub name: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

/// Flat metadata for one playlist track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub track_name: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub duration_ms: Option<i64>,
    pub track_url: Option<String>,
}

/// Map one raw playlist entry to a TrackRow. Returns None when the entry
/// has no track or no track name; the orchestrator treats that as the end
/// of resolvable data. Any other missing field simply stays absent.
pub fn extract_track(item: &PlaylistItem) -> Option<TrackRow> {
    let track = item.track.as_ref()?;
    let name = track.name.as_ref()?;
    Some(TrackRow {
        track_name: name.clone(),
        artist: track.artists.first().and_then(|a| a.name.clone()),
        album: track.album.as_ref().and_then(|a| a.name.clone()),
        release_date: track.album.as_ref().and_then(|a| a.release_date.clone()),
        duration_ms: track.duration_ms,
        track_url: track.external_urls.as_ref().and_then(|u| u.spotify.clone()),
    })
}

/// Accept either a bare playlist id or an open.spotify.com share URL and
/// return the 22-character base62 id.
pub fn parse_playlist_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let candidate = match trimmed.rsplit_once('/') {
        Some((_, last)) => last,
        None => trimmed,
    };
    let id = candidate.split('?').next().unwrap_or(candidate);
    if id.len() == 22 && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(id.to_string())
    } else {
        anyhow::bail!("'{input}' does not look like a Spotify playlist id or URL")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Read-only client for one playlist, authenticated via the
/// client-credentials flow.
pub struct SpotifyClient {
    agent: Agent,
    token: String,
    playlist_id: String,
    page_limit: usize,
    retries: u32,
    retry_delay: Duration,
}

impl SpotifyClient {
    /// Exchange client credentials for a bearer token and bind the client
    /// to one playlist.
    pub fn connect(
        agent: Agent,
        creds: &Credentials,
        playlist_id: String,
        cfg: &FetchConfig,
    ) -> Result<Self> {
        let basic = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            creds.spotify_client_id, creds.spotify_client_secret
        ));
        let token: TokenResponse = agent
            .post(TOKEN_URL)
            .header("Authorization", &format!("Basic {basic}"))
            .send_form([("grant_type", "client_credentials")])
            .context("Spotify token request failed")?
            .body_mut()
            .read_json()
            .context("Failed to parse Spotify token response")?;

        Ok(Self {
            agent,
            token: token.access_token,
            playlist_id,
            page_limit: cfg.page_limit,
            retries: cfg.retries,
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
        })
    }

    /// Fetch one page of playlist items starting at `offset`. Transient
    /// failures are retried a fixed number of times with a fixed delay
    /// before the error is handed back to the caller.
    pub fn playlist_page(&self, offset: usize) -> Result<PlaylistPage> {
        let url = format!(
            "{API_BASE}/playlists/{}/tracks?offset={offset}&limit={}",
            self.playlist_id, self.page_limit
        );
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_page(&url, offset) {
                Ok(page) => return Ok(page),
                Err(e) if attempt <= self.retries => {
                    log::warn!(
                        "Playlist page at offset {offset} failed (attempt {attempt}/{}), retrying: {e}",
                        self.retries
                    );
                    thread::sleep(self.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_page(&self, url: &str, offset: usize) -> Result<PlaylistPage> {
        let page: PlaylistPage = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .call()
            .with_context(|| format!("HTTP request failed (page at offset {offset})"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse playlist page at offset {offset}"))?;
        Ok(page)
    }
}
