pub mod config;
pub mod download;
pub mod duration;
pub mod pipeline;
pub mod spotify;
pub mod store;
pub mod youtube;

/// Application name for XDG paths
pub const APP_NAME: &str = "pianoset";

/// Dataset filename used when neither the CLI nor the config names one
pub const DEFAULT_DATASET_FILE: &str = "playlist_metadata.csv";
