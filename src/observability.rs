//! Logging setup for the binaries and the lifecycle events they share.
//!
//! Overrides come from `AGRI_LOG_LEVEL` (an `EnvFilter` directive),
//! `AGRI_LOG_FORMAT` (`json` or `pretty`) and `AGRI_LOG_TARGET` (bool).

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LEVEL_VAR: &str = "AGRI_LOG_LEVEL";
const FORMAT_VAR: &str = "AGRI_LOG_FORMAT";
const TARGET_VAR: &str = "AGRI_LOG_TARGET";

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Blank or unrecognised values leave the default in place.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let level = lookup(LEVEL_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|level| !level.is_empty())
            .unwrap_or(defaults.level);
        let format = lookup(FORMAT_VAR)
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or(defaults.format);
        let include_target = lookup(TARGET_VAR)
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(defaults.include_target);

        Self {
            level,
            format,
            include_target,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    LoggingConfig::from_lookup(|key| env::var(key).ok())
}

/// Installs the global subscriber. An invalid level directive falls back
/// to `info`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target);

    match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())?
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

/// Where a binary gets its market data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChoice<'a> {
    Demo { reason: &'a str },
    Http { base_url: &'a str },
}

pub fn log_app_start(component: &'static str, config: &LoggingConfig) {
    info!(
        component,
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_source_selected(component: &'static str, choice: SourceChoice<'_>) {
    match choice {
        SourceChoice::Demo { reason } => info!(
            component,
            event = "source.selected",
            source = "demo",
            reason
        ),
        SourceChoice::Http { base_url } => info!(
            component,
            event = "source.selected",
            source = "http",
            base_url
        ),
    }
}

pub fn log_app_bind(component: &'static str, bound_addr: SocketAddr, route: &'static str) {
    info!(
        component,
        event = "app.bind",
        bind_addr = %bound_addr,
        route
    );
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> LoggingConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        LoggingConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        assert_eq!(config_from(&[]), LoggingConfig::default());
    }

    #[test]
    fn reads_level_format_and_target() {
        let cfg = config_from(&[
            (LEVEL_VAR, " agrimarket=debug,info "),
            (FORMAT_VAR, "JSON"),
            (TARGET_VAR, "off"),
        ]);

        assert_eq!(cfg.level, "agrimarket=debug,info");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn blank_or_unknown_values_keep_defaults() {
        let cfg = config_from(&[(LEVEL_VAR, "  "), (FORMAT_VAR, "yaml"), (TARGET_VAR, "maybe")]);
        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn switch_accepts_common_spellings() {
        for raw in ["1", "TRUE", " yes ", "On"] {
            assert_eq!(parse_switch(raw), Some(true), "{raw}");
        }
        for raw in ["0", "False", "no", "OFF"] {
            assert_eq!(parse_switch(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_switch(""), None);
    }
}
