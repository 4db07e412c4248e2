use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Path to batch configuration file (targets + anti-detection overrides)
    #[arg(long, default_value = "batch_config.json")]
    pub config_file: PathBuf,

    /// Directory to store extraction manifests
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Number of concurrent workers (each with its own session)
    #[arg(long, env = "GRIDSPLITS_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
