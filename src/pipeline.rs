use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::spotify::{self, PlaylistPage, SpotifyClient, TrackRow};
use crate::store::{self, ResolvedRow};
use crate::youtube::{Category, ResolutionCache, ResolutionOutcome, YouTubeClient};

/// Why a fetch run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The playlist was exhausted (or pagination gave up after retries).
    Completed,
    /// A playlist entry had no usable track name; that offset and
    /// everything after it stay unresolved for now.
    NoMoreData,
    /// The video API reported quota exhaustion; rerun after the reset.
    QuotaExhausted,
}

impl HaltReason {
    pub fn describe(self) -> &'static str {
        match self {
            HaltReason::Completed => "playlist exhausted",
            HaltReason::NoMoreData => "no more resolvable tracks",
            HaltReason::QuotaExhausted => "video API quota exhausted",
        }
    }
}

/// Summary of one fetch run.
#[derive(Debug)]
pub struct FetchReport {
    pub resume_offset: usize,
    pub rows_added: usize,
    pub total_rows: usize,
    pub halt: HaltReason,
    pub cache_hits: usize,
}

/// Paginated access to the source playlist.
pub trait PlaylistSource {
    fn page_at(&mut self, offset: usize) -> Result<PlaylistPage>;
}

impl PlaylistSource for SpotifyClient {
    fn page_at(&mut self, offset: usize) -> Result<PlaylistPage> {
        self.playlist_page(offset)
    }
}

/// Best-effort resolution of a track to a video of one category.
pub trait VideoSource {
    fn resolve(
        &mut self,
        cache: &mut ResolutionCache,
        track_name: &str,
        artist: Option<&str>,
        category: Category,
    ) -> ResolutionOutcome;
}

impl VideoSource for YouTubeClient {
    fn resolve(
        &mut self,
        cache: &mut ResolutionCache,
        track_name: &str,
        artist: Option<&str>,
        category: Category,
    ) -> ResolutionOutcome {
        YouTubeClient::resolve(self, cache, track_name, artist, category)
    }
}

fn assemble_row(
    track: TrackRow,
    original: ResolutionOutcome,
    piano: ResolutionOutcome,
) -> ResolvedRow {
    let (original_video_url, original_duration_ms) = original.into_match();
    let (piano_video_url, piano_duration_ms) = piano.into_match();
    ResolvedRow {
        track_name: track.track_name,
        artist: track.artist,
        album: track.album,
        release_date: track.release_date,
        spotify_duration_ms: track.duration_ms,
        spotify_track_url: track.track_url,
        original_video_url,
        original_duration_ms,
        piano_video_url,
        piano_duration_ms,
    }
}

fn track_progress(remaining: usize) -> ProgressBar {
    let pb = ProgressBar::new(remaining as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "  [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks {msg}",
        )
        .unwrap()
        .progress_chars("##-"),
    );
    pb
}

/// Run one resolution pass: load the dataset, page through the playlist
/// from the resume offset, resolve both categories per track, and persist
/// the grown dataset with a single save at the end. Only one pipeline
/// instance may run against a given dataset path at a time; nothing here
/// locks the file.
pub fn run_fetch<P: PlaylistSource, V: VideoSource>(
    playlist: &mut P,
    videos: &mut V,
    dataset_path: &Path,
) -> Result<FetchReport> {
    let existing = store::load(dataset_path)
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    let resume_offset = existing.len();
    log::info!("Dataset has {resume_offset} rows, resuming there");

    let mut cache = ResolutionCache::new();
    let mut batch: Vec<ResolvedRow> = Vec::new();
    let mut halt = HaltReason::Completed;
    let mut offset = resume_offset;
    let mut progress: Option<ProgressBar> = None;

    'pages: loop {
        let page = match playlist.page_at(offset) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Giving up on playlist page at offset {offset}: {e}");
                break;
            }
        };
        if page.items.is_empty() {
            break;
        }
        let bar = progress
            .get_or_insert_with(|| track_progress(page.total.saturating_sub(resume_offset)));

        for item in &page.items {
            let Some(track) = spotify::extract_track(item) else {
                halt = HaltReason::NoMoreData;
                break 'pages;
            };
            bar.set_message(track.track_name.clone());

            // The two lookups are independent but run one after the other;
            // a run is bounded by API quota, not by latency.
            let artist = track.artist.as_deref();
            let piano = videos.resolve(&mut cache, &track.track_name, artist, Category::Piano);
            if piano == ResolutionOutcome::QuotaExceeded {
                halt = HaltReason::QuotaExhausted;
                break 'pages;
            }
            let original =
                videos.resolve(&mut cache, &track.track_name, artist, Category::Original);
            if original == ResolutionOutcome::QuotaExceeded {
                halt = HaltReason::QuotaExhausted;
                break 'pages;
            }

            batch.push(assemble_row(track, original, piano));
            bar.inc(1);
        }

        offset += page.items.len();
        if offset >= page.total {
            break;
        }
    }

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    // One save per run. The only case that writes nothing is an empty batch
    // with no dataset on disk, so a quota halt at offset zero on a fresh
    // checkout leaves no file behind.
    if dataset_path.exists() || !batch.is_empty() {
        store::save(dataset_path, &existing, &batch)
            .with_context(|| format!("Failed to save dataset {}", dataset_path.display()))?;
    } else {
        log::info!("Nothing resolved and no dataset on disk, skipping write");
    }

    let report = FetchReport {
        resume_offset,
        rows_added: batch.len(),
        total_rows: existing.len() + batch.len(),
        halt,
        cache_hits: cache.hits(),
    };
    log::info!(
        "Run stopped ({}) at offset {}; {} rows added",
        report.halt.describe(),
        report.total_rows,
        report.rows_added
    );
    Ok(report)
}
