use derive_more::Display;
use std::env;
use std::str::FromStr;

#[derive(Debug, Display)]
#[display(fmt = "invalid value {:?} for {}", value, key)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl std::error::Error for ConfigError {}

/// Runtime knobs, read from the environment (a `.env` file is honoured).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Accept result submissions without credentials.
    pub allow_anonymous_post: bool,
    /// Branch shown by the timeline when none is requested.
    pub def_branch: String,
    /// Percent change that makes a report red or green.
    pub change_threshold: f64,
    /// Percent deviation from the trend that makes a report yellow.
    pub trend_threshold: f64,
    /// Number of earlier revisions averaged into the trend.
    pub trend_depth: i64,
    pub api_limit_per_page: i64,
    pub timeline_revisions: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            allow_anonymous_post: true,
            def_branch: "default".to_string(),
            change_threshold: 3.0,
            trend_threshold: 5.0,
            trend_depth: 10,
            api_limit_per_page: 20,
            timeline_revisions: 200,
        }
    }
}

fn var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError { key, value }),
        Err(_) => Ok(default),
    }
}

fn flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError { key, value }),
        },
        Err(_) => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> Result<Settings, ConfigError> {
        let defaults = Settings::default();

        let settings = Settings {
            allow_anonymous_post: flag("ALLOW_ANONYMOUS_POST", defaults.allow_anonymous_post)?,
            def_branch: var("DEF_BRANCH", defaults.def_branch)?,
            change_threshold: var("CHANGE_THRESHOLD", defaults.change_threshold)?,
            trend_threshold: var("TREND_THRESHOLD", defaults.trend_threshold)?,
            trend_depth: var("TREND_DEPTH", defaults.trend_depth)?,
            api_limit_per_page: var("API_LIMIT_PER_PAGE", defaults.api_limit_per_page)?,
            timeline_revisions: var("TIMELINE_REVISIONS", defaults.timeline_revisions)?,
        };
        debug!("{:?}", settings);

        Ok(settings)
    }
}
