use anyhow::{bail, Context, Result};
use figment::{providers::Format, Figment};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf};

use crate::args::CliArgs;

/// The fully parsed and validated config struct we use in the application.
/// This is built up from the ConfigBuilder which can load from multiple
/// sources (in order of preference):
///
/// 1. cli args
/// 2. environment variables (AREA_ prefix, `__` for nesting)
/// 3. config file (area.toml)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// The log-level to use, in the format of [tracing directives](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives).
    /// Default is `["info"]`
    pub log_level: Vec<String>,
    /// The directory to store all internal data files.
    /// Default is `/var/area`
    pub data: PathBuf,
    /// Seconds between supervisor reconciliation cycles.
    /// Default is `10`
    pub poll_interval_secs: u64,
    /// Number of concurrent queue workers. Default is `1`; more than one
    /// gives up per-area processing order.
    pub workers: usize,
    /// Name of the shared job list. Default is `task_queue`
    pub queue_name: String,

    pub postgres: PostgresConfig,
    pub redis: RedisConfig,

    /// Per-provider OAuth settings, env-addressable as
    /// `AREA_OAUTH__<PROVIDER>__<FIELD>`. The credential-exchange flow
    /// itself lives in the HTTP API; the settings are parsed here because
    /// the env namespace is shared process-wide.
    #[serde(default)]
    pub oauth: HashMap<String, OAuthProviderConfig>,

    /// Consumed by the HTTP API's session layer
    pub session_secret: Option<String>,
    pub jwt_algorithm: String,
}

/// Default values for the config struct.
/// These are only used to fill in holes after all the parsing and loading
/// is done.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: vec!["info".to_string()],
            data: PathBuf::from("/var/area"),
            poll_interval_secs: 10,
            workers: 1,
            queue_name: "task_queue".to_string(),
            postgres: PostgresConfig::default(),
            redis: RedisConfig::default(),
            oauth: HashMap::new(),
            session_secret: None,
            jwt_algorithm: "HS256".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "area".to_string(),
            password: String::new(),
            db: "area".to_string(),
        }
    }
}

impl PostgresConfig {
    pub fn make_db_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db
        )
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: u8,
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl RedisConfig {
    pub fn make_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct OAuthProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Config {
    pub fn tracing_env_filter(&self) -> Result<tracing_subscriber::EnvFilter> {
        let mut filter = tracing_subscriber::EnvFilter::from_default_env();
        for directive in &self.log_level {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => bail!("{}: {}", err, directive),
            }
        }

        Ok(filter)
    }
}

/// The builder we use to build Config
#[derive(Debug)]
pub struct ConfigBuilder {
    pub cli_args: CliArgs,
}

impl ConfigBuilder {
    pub const FILENAME: &'static str = "area.toml";
    pub const DIRNAME: &'static str = "area";
    pub const HIDDEN_DIRNAME: &'static str = ".area";

    pub fn new(cli_args: CliArgs) -> Self {
        Self { cli_args }
    }

    // merges the cli and env vars, which have optional values (by default
    // None or empty) and parse complex types from strings
    pub fn merge_cli_env_args(&self) -> Result<CliArgs> {
        let cli_args: CliArgs = Figment::new()
            .merge(figment::providers::Env::prefixed(&format!(
                "{}_",
                CliArgs::ENV_VAR_PREFIX
            )))
            .merge(figment::providers::Serialized::defaults(&self.cli_args))
            .extract()?;

        Ok(cli_args)
    }

    pub fn build(self) -> Result<Config> {
        // try to load dotenv first, since it may affect env vars for filepaths
        let dotenv_path = self
            .cli_args
            .dotenv
            .clone()
            .unwrap_or(std::env::current_dir()?.join(".env"));

        if dotenv_path.exists() {
            if let Err(e) = dotenvy::from_path(dotenv_path) {
                bail!("Error loading dotenv file: {}", e);
            }
        }

        let cli_env_args = self.merge_cli_env_args()?;

        // then, our final config, which can have more complex types with
        // easier TOML-like syntax and nested env overrides
        // (AREA_POSTGRES__HOST, AREA_OAUTH__DISCORD__CLIENT_ID, ...),
        // and fills in defaults for required values at the end
        let mut figment = Figment::new();
        if let Some(filepath) = Self::filepath(&cli_env_args) {
            figment = figment.merge(figment::providers::Toml::file(filepath));
        }
        let config: Config = figment
            .merge(
                figment::providers::Env::prefixed(&format!("{}_", CliArgs::ENV_VAR_PREFIX))
                    .split("__"),
            )
            .merge(figment::providers::Serialized::defaults(cli_env_args))
            .join(figment::providers::Serialized::defaults(Config::default()))
            .extract()?;

        Ok(Config {
            data: shellexpand::tilde(&config.data.to_string_lossy())
                .to_string()
                .into(),
            ..config
        })
    }

    /// Finds the config file through a series of fallbacks; None when no
    /// candidate exists (env + defaults alone are a valid setup)
    pub fn filepath(cli_env_args: &CliArgs) -> Option<PathBuf> {
        Self::filepaths_to_try(cli_env_args)
            .into_iter()
            .find(|filename| filename.exists())
    }

    /// Provides the list of filepaths to try for the config file.
    /// The argument is internally derived cli + env args.
    pub fn filepaths_to_try(cli_env_args: &CliArgs) -> Vec<PathBuf> {
        // the paths returned will be tried in order of pushing
        let mut dirs = Vec::new();

        // explicit arg passed to the cli, e.g. --home /foo, or env var
        // AREA_HOME="/foo" - used as the direct home directory,
        // i.e. the path in this case will be /foo/area.toml
        if let Some(dir) = cli_env_args.home.clone() {
            dirs.push(dir);
        }

        // next, the current working directory: ./area.toml
        if let Ok(dir) = std::env::current_dir() {
            dirs.push(dir);
        }

        // the user's home directory directly, without polluting it:
        // ~/.area/area.toml
        if let Some(dir) = dirs::home_dir().map(|dir| dir.join(Self::HIDDEN_DIRNAME)) {
            dirs.push(dir);
        }

        // the system config directory; varies by platform, e.g.
        // ~/.config/area/area.toml on Linux
        if let Some(dir) = dirs::config_dir().map(|dir| dir.join(Self::DIRNAME)) {
            dirs.push(dir);
        }

        // XDG may point elsewhere than config_dir on some setups
        if let Some(dir) = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .map(|dir| dir.join(Self::DIRNAME))
        {
            dirs.push(dir);
        }

        // lastly, /etc/area/area.toml
        dirs.push(PathBuf::from("/etc").join(Self::DIRNAME));

        dirs.into_iter()
            .map(|dir| dir.join(Self::FILENAME))
            .collect()
    }
}

impl Config {
    /// Convenience used by main: full build from parsed cli args
    pub fn from_args(cli_args: CliArgs) -> Result<Config> {
        ConfigBuilder::new(cli_args)
            .build()
            .context("failed to build config")
    }
}
