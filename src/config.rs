//! Process configuration read from the environment.
//!
//! Every variable except the webhook secret has a default. A variable that
//! is set but does not parse is an error rather than a silent fallback.
//!
//! | Variable | Default |
//! |---|---|
//! | `AUTOPILOT_WEBHOOK_SECRET` | required |
//! | `AUTOPILOT_BIND_ADDR` | `0.0.0.0:3000` |
//! | `AUTOPILOT_MAX_CONCURRENCY` | `1` |
//! | `AUTOPILOT_MAX_ATTEMPTS` | `3` |
//! | `AUTOPILOT_TIMESTAMP_TOLERANCE_SECS` | `300` |
//! | `AUTOPILOT_TRIGGER_LABEL` | `autopilot` |
//! | `AUTOPILOT_TRIGGER_STATES` | `Todo` (comma-separated) |
//! | `AUTOPILOT_LABELS` | empty (`id=name,...`) |
//! | `AUTOPILOT_EXECUTOR_COMMAND` | unset: tasks are pulled over HTTP |
//! | `AUTOPILOT_EXECUTOR_TIMEOUT_SECS` | unset: no timeout |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

use crate::ingest::{DEFAULT_TRIGGER_LABEL, DEFAULT_TRIGGER_STATE, IngestConfig, StaticLabels};
use crate::queue::{DEFAULT_MAX_CONCURRENCY, QueueConfig};
use crate::types::DEFAULT_MAX_ATTEMPTS;
use crate::webhooks::DEFAULT_TIMESTAMP_TOLERANCE;
use crate::worker::CommandExecutor;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AUTOPILOT_WEBHOOK_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_secret: Vec<u8>,
    pub bind_addr: SocketAddr,
    pub max_concurrency: usize,
    pub timestamp_tolerance: TimeDelta,
    pub ingest: IngestConfig,
    /// Raw `id=name` label pairs for [`StaticLabels::parse`].
    pub labels: String,
    /// Command line run per task. `None` leaves execution to HTTP clients.
    pub executor_command: Option<String>,
    pub executor_timeout: Option<Duration>,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let webhook_secret = get("AUTOPILOT_WEBHOOK_SECRET")
            .ok_or(ConfigError::MissingSecret)?
            .into_bytes();

        let bind_addr: SocketAddr = parse_or(&get, "AUTOPILOT_BIND_ADDR", || {
            DEFAULT_BIND_ADDR.parse().ok()
        })?;

        let max_concurrency: usize = parse_or(&get, "AUTOPILOT_MAX_CONCURRENCY", || {
            Some(DEFAULT_MAX_CONCURRENCY)
        })?;
        if max_concurrency == 0 {
            return Err(invalid("AUTOPILOT_MAX_CONCURRENCY", "0"));
        }

        let max_attempts: u32 =
            parse_or(&get, "AUTOPILOT_MAX_ATTEMPTS", || Some(DEFAULT_MAX_ATTEMPTS))?;
        if max_attempts == 0 {
            return Err(invalid("AUTOPILOT_MAX_ATTEMPTS", "0"));
        }

        let timestamp_tolerance = match get("AUTOPILOT_TIMESTAMP_TOLERANCE_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map(|secs| TimeDelta::seconds(i64::from(secs)))
                .map_err(|_| invalid("AUTOPILOT_TIMESTAMP_TOLERANCE_SECS", &raw))?,
            None => DEFAULT_TIMESTAMP_TOLERANCE,
        };

        let trigger_label = get("AUTOPILOT_TRIGGER_LABEL")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TRIGGER_LABEL.to_string());

        let trigger_states = match get("AUTOPILOT_TRIGGER_STATES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![DEFAULT_TRIGGER_STATE.to_string()],
        };

        let executor_timeout = match get("AUTOPILOT_EXECUTOR_TIMEOUT_SECS") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid("AUTOPILOT_EXECUTOR_TIMEOUT_SECS", &raw))?,
            ),
            None => None,
        };

        Ok(Config {
            webhook_secret,
            bind_addr,
            max_concurrency,
            timestamp_tolerance,
            ingest: IngestConfig {
                trigger_label,
                trigger_states,
                max_attempts,
            },
            labels: get("AUTOPILOT_LABELS").unwrap_or_default(),
            executor_command: get("AUTOPILOT_EXECUTOR_COMMAND").map(|s| s.trim().to_string()),
            executor_timeout,
        })
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.max_concurrency)
    }

    pub fn static_labels(&self) -> StaticLabels {
        StaticLabels::parse(&self.labels)
    }

    /// Builds the in-process executor, if one is configured.
    pub fn executor(&self) -> Option<CommandExecutor> {
        let exec = CommandExecutor::from_command_line(self.executor_command.as_deref()?)?;
        Some(match self.executor_timeout {
            Some(timeout) => exec.timeout(timeout),
            None => exec,
        })
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
    }
}

fn parse_or<T, G, D>(get: &G, var: &'static str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
    D: FnOnce() -> Option<T>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(var, &raw)),
        None => default().ok_or_else(|| invalid(var, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("AUTOPILOT_WEBHOOK_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.webhook_secret, b"s3cret");
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.ingest.max_attempts, 3);
        assert_eq!(config.timestamp_tolerance, TimeDelta::seconds(300));
        assert_eq!(config.ingest.trigger_label, "autopilot");
        assert_eq!(config.ingest.trigger_states, vec!["Todo"]);
        assert!(config.static_labels().is_empty());
        assert!(config.executor().is_none());
    }

    #[test]
    fn missing_or_blank_secret_is_an_error() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::MissingSecret);
        assert_eq!(
            load(&[("AUTOPILOT_WEBHOOK_SECRET", "  ")]).unwrap_err(),
            ConfigError::MissingSecret
        );
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("AUTOPILOT_WEBHOOK_SECRET", "s"),
            ("AUTOPILOT_BIND_ADDR", "127.0.0.1:8080"),
            ("AUTOPILOT_MAX_CONCURRENCY", "4"),
            ("AUTOPILOT_MAX_ATTEMPTS", "5"),
            ("AUTOPILOT_TIMESTAMP_TOLERANCE_SECS", "60"),
            ("AUTOPILOT_TRIGGER_LABEL", "bot"),
            ("AUTOPILOT_TRIGGER_STATES", "Todo, Backlog,,"),
            ("AUTOPILOT_LABELS", "l1=bot,l2=bug"),
            ("AUTOPILOT_EXECUTOR_COMMAND", "agent run"),
            ("AUTOPILOT_EXECUTOR_TIMEOUT_SECS", "90"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.queue_config().max_concurrency, 4);
        assert_eq!(config.ingest.max_attempts, 5);
        assert_eq!(config.timestamp_tolerance, TimeDelta::seconds(60));
        assert_eq!(config.ingest.trigger_label, "bot");
        assert_eq!(config.ingest.trigger_states, vec!["Todo", "Backlog"]);
        assert_eq!(config.static_labels().len(), 2);
        assert_eq!(config.executor_timeout, Some(Duration::from_secs(90)));
        assert!(config.executor().is_some());
    }

    #[test]
    fn unparseable_values_are_errors() {
        let cases = [
            ("AUTOPILOT_BIND_ADDR", "not-an-addr"),
            ("AUTOPILOT_MAX_CONCURRENCY", "0"),
            ("AUTOPILOT_MAX_CONCURRENCY", "many"),
            ("AUTOPILOT_MAX_ATTEMPTS", "0"),
            ("AUTOPILOT_MAX_ATTEMPTS", "-1"),
            ("AUTOPILOT_TIMESTAMP_TOLERANCE_SECS", "5m"),
            ("AUTOPILOT_EXECUTOR_TIMEOUT_SECS", "0"),
        ];
        for (var, value) in cases {
            let err = load(&[("AUTOPILOT_WEBHOOK_SECRET", "s"), (var, value)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { var: v, .. } if v == var),
                "{var}={value} gave {err:?}"
            );
        }
    }
}
