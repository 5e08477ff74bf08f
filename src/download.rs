use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::store::ResolvedRow;
use crate::youtube::Category;

/// Options for one download pass over the dataset.
#[derive(Debug)]
pub struct DownloadOptions {
    pub audio_dir: PathBuf,
    pub start_over: bool,
    pub cookies_from_browser: Option<String>,
}

/// Counters for one download pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub resumed_at: usize,
    pub attempted: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Verify yt-dlp is runnable before starting a batch.
pub fn ensure_yt_dlp() -> Result<()> {
    match Command::new("yt-dlp").arg("--version").output() {
        Ok(out) if out.status.success() => Ok(()),
        Ok(_) => anyhow::bail!("yt-dlp is present but not working; try updating it"),
        Err(e) => anyhow::bail!("yt-dlp not found ({e}). Install it with: pip install yt-dlp"),
    }
}

/// Highest NNNN index present as an .mp3 in `dir`, or None when the
/// directory is empty or missing.
fn highest_index(dir: &Path) -> Option<usize> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| {
            let name = entry.ok()?.file_name();
            let stem = name.to_str()?.strip_suffix(".mp3")?;
            stem.parse::<usize>().ok()
        })
        .max()
}

/// First row offset still missing from either category directory. Downloads
/// run in row order, so the smaller of the two high-water marks decides
/// where to resume; a category directory with nothing in it means start over.
fn resume_index(audio_dir: &Path) -> usize {
    let original = highest_index(&audio_dir.join(Category::Original.label()));
    let piano = highest_index(&audio_dir.join(Category::Piano.label()));
    match (original, piano) {
        (Some(a), Some(b)) => a.min(b) + 1,
        _ => 0,
    }
}

/// yt-dlp invocation for one video: best audio extracted to mp3 at 192K,
/// kept quiet so the progress bar stays readable. The URL is always the
/// last argument.
fn build_command(url: &str, output_template: &Path, cookies: Option<&str>) -> Command {
    let mut command = Command::new("yt-dlp");
    command
        .arg("-f")
        .arg("bestaudio/best")
        .arg("-x")
        .arg("--audio-format")
        .arg("mp3")
        .arg("--audio-quality")
        .arg("192K")
        .arg("-q")
        .arg("--no-warnings")
        .arg("-o")
        .arg(output_template);
    if let Some(browser) = cookies {
        command.arg("--cookies-from-browser").arg(browser);
    }
    command.arg(url);
    command
}

/// Download audio for every resolved URL at or past the resume point,
/// naming files after their row offset. Individual failures are logged and
/// counted, never fatal.
pub fn run_downloads(rows: &[ResolvedRow], opts: &DownloadOptions) -> Result<DownloadReport> {
    ensure_yt_dlp()?;

    let start = if opts.start_over {
        0
    } else {
        resume_index(&opts.audio_dir)
    };
    let mut report = DownloadReport {
        resumed_at: start,
        ..Default::default()
    };
    if start >= rows.len() {
        log::info!("All {} rows already downloaded", rows.len());
        return Ok(report);
    }

    for category in [Category::Original, Category::Piano] {
        let dir = opts.audio_dir.join(category.label());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let pb = ProgressBar::new((rows.len() - start) as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "  [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} rows {msg}",
        )
        .unwrap()
        .progress_chars("##-"),
    );

    for (index, row) in rows.iter().enumerate().skip(start) {
        pb.set_message(row.track_name.clone());
        for (category, url) in [
            (Category::Original, row.original_video_url.as_deref()),
            (Category::Piano, row.piano_video_url.as_deref()),
        ] {
            let Some(url) = url else {
                report.skipped += 1;
                continue;
            };
            report.attempted += 1;

            let template = opts
                .audio_dir
                .join(category.label())
                .join(format!("{index:04}.%(ext)s"));
            let mut command =
                build_command(url, &template, opts.cookies_from_browser.as_deref());
            match command.status() {
                Ok(status) if status.success() => report.downloaded += 1,
                Ok(status) => {
                    log::warn!(
                        "yt-dlp exited with {status} for row {index} ({})",
                        category.label()
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to launch yt-dlp for row {index}: {e}");
                    report.failed += 1;
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_highest_index_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "0000.mp3");
        touch(dir.path(), "0003.mp3");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "cover.mp3");
        assert_eq!(highest_index(dir.path()), Some(3));
    }

    #[test]
    fn test_highest_index_empty_or_missing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(highest_index(dir.path()), None);
        assert_eq!(highest_index(&dir.path().join("nope")), None);
    }

    #[test]
    fn test_resume_index_takes_smaller_high_water() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("original");
        let piano = dir.path().join("piano");
        fs::create_dir_all(&original).unwrap();
        fs::create_dir_all(&piano).unwrap();
        for i in 0..4 {
            touch(&original, &format!("{i:04}.mp3"));
        }
        touch(&piano, "0000.mp3");
        touch(&piano, "0001.mp3");

        // Piano stopped at row 1, so row 2 is next despite original being ahead.
        assert_eq!(resume_index(dir.path()), 2);
    }

    #[test]
    fn test_resume_index_starts_over_when_either_side_empty() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("original");
        fs::create_dir_all(&original).unwrap();
        touch(&original, "0009.mp3");
        assert_eq!(resume_index(dir.path()), 0);
    }

    #[test]
    fn test_build_command_shape() {
        let command = build_command(
            "https://www.youtube.com/watch?v=abc",
            Path::new("audio/original/0004.%(ext)s"),
            None,
        );
        let args: Vec<&OsStr> = command.get_args().collect();
        assert!(args.contains(&OsStr::new("-x")));
        assert!(args.contains(&OsStr::new("bestaudio/best")));
        assert!(args.contains(&OsStr::new("192K")));
        assert_eq!(
            args.last(),
            Some(&OsStr::new("https://www.youtube.com/watch?v=abc"))
        );
        assert!(!args.contains(&OsStr::new("--cookies-from-browser")));
    }

    #[test]
    fn test_build_command_with_cookies() {
        let command = build_command(
            "https://www.youtube.com/watch?v=abc",
            Path::new("audio/piano/0000.%(ext)s"),
            Some("chrome"),
        );
        let args: Vec<&OsStr> = command.get_args().collect();
        assert!(args.contains(&OsStr::new("--cookies-from-browser")));
        assert!(args.contains(&OsStr::new("chrome")));
        assert_eq!(
            args.last(),
            Some(&OsStr::new("https://www.youtube.com/watch?v=abc"))
        );
    }
}
