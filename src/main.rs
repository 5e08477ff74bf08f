use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use pianoset::pipeline::HaltReason;

#[derive(Parser)]
#[command(
    name = "pianoset",
    version,
    about = "Build a paired original/piano-cover music dataset from a playlist"
)]
struct Cli {
    /// Path to the dataset CSV
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve playlist tracks to original and piano videos, growing the dataset
    Fetch {
        /// Playlist id or open.spotify.com share URL (defaults to config)
        #[arg(long)]
        playlist: Option<String>,
    },

    /// Show dataset statistics
    Status,

    /// Download audio for resolved rows with yt-dlp
    Download {
        /// Output directory (defaults to config, then ./audio)
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Redownload everything instead of resuming
        #[arg(long)]
        start_over: bool,

        /// Browser whose cookies yt-dlp should reuse (e.g. "chrome")
        #[arg(long)]
        cookies_from_browser: Option<String>,
    },
}

fn main() -> Result<()> {
    // Pick up a local .env before anything reads the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = pianoset::config::AppConfig::load();

    // Resolve dataset path: CLI > config > working-directory default
    let dataset_path = cli
        .dataset
        .or(config.dataset_path.clone())
        .unwrap_or_else(pianoset::config::default_dataset_path);
    log::info!("Dataset: {}", dataset_path.display());

    match cli.command {
        Commands::Fetch { playlist } => {
            let raw = playlist
                .or(config.playlist.clone())
                .context("No playlist given. Pass --playlist or set playlist in the config file.")?;
            let playlist_id = pianoset::spotify::parse_playlist_id(&raw)?;

            let creds = pianoset::config::Credentials::from_env().context(
                "Credentials missing. Set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and \
                 YOUTUBE_API_KEY (a .env file works too).",
            )?;

            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(config.fetch.http_timeout_secs)))
                .build()
                .into();

            let mut spotify = pianoset::spotify::SpotifyClient::connect(
                agent.clone(),
                &creds,
                playlist_id,
                &config.fetch,
            )
            .context("Spotify authentication failed")?;
            let mut youtube = pianoset::youtube::YouTubeClient::new(
                agent,
                creds.youtube_api_key,
                config.fetch.search_results,
            );

            let report = pianoset::pipeline::run_fetch(&mut spotify, &mut youtube, &dataset_path)
                .context("Fetch failed")?;

            println!(
                "Fetch complete: {} new rows (dataset now {} rows, {} cache hits)",
                report.rows_added, report.total_rows, report.cache_hits
            );
            println!("Stopped: {}", report.halt.describe());
            if report.halt == HaltReason::QuotaExhausted {
                println!(
                    "Re-run after the quota resets to continue from offset {}.",
                    report.total_rows
                );
            }
        }

        Commands::Status => {
            let rows = pianoset::store::load(&dataset_path)
                .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
            let stats = pianoset::store::stats(&rows);

            println!("Dataset Statistics");
            println!("==================");
            println!("Rows:              {}", stats.rows);
            println!("With original URL: {}", stats.with_original);
            println!("With piano URL:    {}", stats.with_piano);
            println!("With both:         {}", stats.with_both);
            println!();
            println!("Next fetch resumes at offset {}.", stats.rows);
        }

        Commands::Download {
            audio_dir,
            start_over,
            cookies_from_browser,
        } => {
            let rows = pianoset::store::load(&dataset_path)
                .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
            if rows.is_empty() {
                println!("Dataset is empty. Run `pianoset fetch` first.");
                return Ok(());
            }

            let audio_dir = audio_dir
                .or(config.audio_dir.clone())
                .unwrap_or_else(pianoset::config::default_audio_dir);
            let opts = pianoset::download::DownloadOptions {
                audio_dir,
                start_over,
                cookies_from_browser: cookies_from_browser.or(config.cookies_from_browser.clone()),
            };

            let report =
                pianoset::download::run_downloads(&rows, &opts).context("Download failed")?;
            println!(
                "Download complete: {} attempted, {} downloaded, {} skipped (no URL), {} failed",
                report.attempted, report.downloaded, report.skipped, report.failed
            );
            if report.resumed_at > 0 && !start_over {
                println!(
                    "(resumed at row {}; --start-over redownloads everything)",
                    report.resumed_at
                );
            }
        }
    }

    Ok(())
}
