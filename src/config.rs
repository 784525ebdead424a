// Runtime configuration: command-line flags with environment fallbacks.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.venmo.com/v1";
const API_URL_ENV: &str = "VENMO_API_URL";
const AUTH_FILE_ENV: &str = "VENMO_AUTH_FILE";

#[derive(Debug, Parser, Clone)]
#[command(name = "venmo-cli")]
#[command(version, about = "Interactive terminal client for a Venmo account")]
pub struct Cli {
    /// Base URL of the API (falls back to $VENMO_API_URL).
    #[arg(long)]
    pub api_url: Option<String>,

    /// Path of the saved login credentials (falls back to $VENMO_AUTH_FILE).
    #[arg(long)]
    pub auth_file: Option<PathBuf>,

    /// Use a fixed device id instead of a random one.
    #[arg(long)]
    pub device_id: Option<String>,

    /// Leave the access token valid when the program exits.
    #[arg(long)]
    pub keep_token: bool,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Log filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Fully resolved settings handed to the API client and the UI.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub auth_file: PathBuf,
    pub device_id: Option<String>,
    pub revoke_on_exit: bool,
    pub timeout: Duration,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = cli
            .api_url
            .clone()
            .or_else(|| env(API_URL_ENV))
            .unwrap_or_else(|| DEFAULT_API_URL.into());
        let auth_file = cli
            .auth_file
            .clone()
            .or_else(|| env(AUTH_FILE_ENV).map(PathBuf::from))
            .unwrap_or_else(default_auth_file);

        Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_file,
            device_id: cli.device_id.clone().filter(|d| !d.is_empty()),
            revoke_on_exit: !cli.keep_token,
            timeout: Duration::from_secs(cli.timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.into(),
            auth_file: default_auth_file(),
            device_id: None,
            revoke_on_exit: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// `<config dir>/venmo-cli/auth.json`, or `./auth.json` when the platform has
/// no config directory.
pub fn default_auth_file() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("venmo-cli").join("auth.json"),
        None => PathBuf::from("auth.json"),
    }
}
