use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utils::serde::deserialize_vec_string;

/// This struct is used for both args and environment variables:
/// every env var can be overridden by a cli arg, and these override the
/// config file. Env vars follow the pattern AREA_{UPPERCASE_ARG_NAME}.
#[derive(Debug, Parser, Serialize, Deserialize, Default)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct CliArgs {
    /// The home directory of the application, where the area.toml
    /// configuration file is stored. If not provided here or in an env
    /// var, a series of default directories will be tried.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,

    /// The path to an optional dotenv file to try and load.
    /// If not set, will be the current working directory's .env
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dotenv: Option<PathBuf>,

    /// Log level in the format of comma-separated tracing directives
    #[arg(long, value_delimiter = ',')]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(deserialize_with = "deserialize_vec_string")]
    pub log_level: Vec<String>,

    /// The directory to store all internal data files
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,

    /// Seconds between supervisor reconciliation cycles
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    /// Number of concurrent queue workers. More than one gives up
    /// per-area processing order.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Name of the shared job list
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
}

impl CliArgs {
    pub const ENV_VAR_PREFIX: &'static str = "AREA";
}
