use std::fs::{self, File};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reading or writing the dataset file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dataset: {0}")]
    Malformed(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One persisted dataset row: a track's metadata plus its matched videos.
/// The serde renames pin the CSV header names, and field order is column
/// order; both are the durable contract with the download and audio steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRow {
    #[serde(rename = "Track Name")]
    pub track_name: String,
    #[serde(rename = "Artist")]
    pub artist: Option<String>,
    #[serde(rename = "Album")]
    pub album: Option<String>,
    #[serde(rename = "Release Date")]
    pub release_date: Option<String>,
    #[serde(rename = "Spotify Duration (ms)")]
    pub spotify_duration_ms: Option<i64>,
    #[serde(rename = "Spotify Track URL")]
    pub spotify_track_url: Option<String>,
    #[serde(rename = "YouTube Original Video URL")]
    pub original_video_url: Option<String>,
    #[serde(rename = "Original Duration")]
    pub original_duration_ms: Option<i64>,
    #[serde(rename = "YouTube Piano Solo Video URL")]
    pub piano_video_url: Option<String>,
    #[serde(rename = "Piano Solo Duration")]
    pub piano_duration_ms: Option<i64>,
}

/// Load the persisted dataset. A missing file is an empty dataset; the row
/// count of the result doubles as the resume offset for the next run. An
/// unreadable or malformed file is an error, never silently repaired.
pub fn load(path: &Path) -> Result<Vec<ResolvedRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Write `existing` followed by `fresh` as one table, header first. The
/// write goes to a sibling temp file and is renamed into place, so a reader
/// never observes a half-written dataset.
pub fn save(path: &Path, existing: &[ResolvedRow], fresh: &[ResolvedRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = csv::Writer::from_writer(file);
        for row in existing.iter().chain(fresh) {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Aggregate counts for the status display.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DatasetStats {
    pub rows: usize,
    pub with_original: usize,
    pub with_piano: usize,
    pub with_both: usize,
}

pub fn stats(rows: &[ResolvedRow]) -> DatasetStats {
    let mut out = DatasetStats {
        rows: rows.len(),
        ..Default::default()
    };
    for row in rows {
        let original = row.original_video_url.is_some();
        let piano = row.piano_video_url.is_some();
        if original {
            out.with_original += 1;
        }
        if piano {
            out.with_piano += 1;
        }
        if original && piano {
            out.with_both += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_row(name: &str) -> ResolvedRow {
        ResolvedRow {
            track_name: name.to_string(),
            artist: Some("Queen".to_string()),
            album: None,
            release_date: Some("1975-10-31".to_string()),
            spotify_duration_ms: Some(354_000),
            spotify_track_url: Some("https://open.spotify.com/track/x".to_string()),
            original_video_url: Some("https://www.youtube.com/watch?v=abc123".to_string()),
            original_duration_ms: Some(355_000),
            piano_video_url: None,
            piano_duration_ms: None,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let rows = load(&dir.path().join("absent.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");
        // Comma in the title exercises CSV quoting.
        let rows = vec![make_row("Bohemian Rhapsody"), make_row("Help, I'm Alive")];
        save(&path, &[], &rows).unwrap();
        assert_eq!(load(&path).unwrap(), rows);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_save_appends_after_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");
        let first = vec![make_row("One")];
        save(&path, &[], &first).unwrap();

        let existing = load(&path).unwrap();
        save(&path, &existing, &[make_row("Two")]).unwrap();

        let all = load(&path).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first[0]);
        assert_eq!(all[1].track_name, "Two");
    }

    #[test]
    fn test_header_names_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");
        save(&path, &[], &[make_row("One")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "Track Name,Artist,Album,Release Date,Spotify Duration (ms),\
             Spotify Track URL,YouTube Original Video URL,Original Duration,\
             YouTube Piano Solo Video URL,Piano Solo Duration"
        );
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(&path, "not a dataset\njust,junk\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn test_stats_counts() {
        let mut with_piano = make_row("Both");
        with_piano.piano_video_url = Some("https://www.youtube.com/watch?v=p1".to_string());
        let mut neither = make_row("Neither");
        neither.original_video_url = None;

        let s = stats(&[make_row("Original only"), with_piano, neither]);
        assert_eq!(
            s,
            DatasetStats {
                rows: 3,
                with_original: 2,
                with_piano: 1,
                with_both: 1,
            }
        );
    }
}
