//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// How log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `8234`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `COUNT_POLL_INTERVAL_MS`: how often live counts are polled (default `1000`)
/// - `FAULT_RATE`: share of simulated remote calls that fail (default `0.0`)
/// - `REMOTE_LATENCY_MS`: latency of simulated remote calls (default `10`)
/// - `JOURNAL_PATH`: journal file; unset keeps the journal in memory
/// - `PAGE_SIZE`: dashboard page size (default `25`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub count_poll_interval: Duration,
    pub fault_rate: f64,
    pub remote_latency: Duration,
    pub journal_path: Option<PathBuf>,
    pub page_size: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Unparsable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            count_poll_interval: parsed("COUNT_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.count_poll_interval),
            fault_rate: lookup("FAULT_RATE")
                .and_then(|r| r.trim().parse::<f64>().ok())
                .filter(|r| (0.0..=1.0).contains(r))
                .unwrap_or(defaults.fault_rate),
            remote_latency: parsed("REMOTE_LATENCY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.remote_latency),
            journal_path: lookup("JOURNAL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            page_size: parsed("PAGE_SIZE")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.page_size),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8234,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            count_poll_interval: Duration::from_millis(1000),
            fault_rate: 0.0,
            remote_latency: Duration::from_millis(10),
            journal_path: None,
            page_size: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8234);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.count_poll_interval, Duration::from_secs(1));
        assert_eq!(config.page_size, 25);
        assert!(config.journal_path.is_none());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("LOG_FORMAT", "JSON"),
            ("COUNT_POLL_INTERVAL_MS", "250"),
            ("FAULT_RATE", "0.2"),
            ("REMOTE_LATENCY_MS", "0"),
            ("JOURNAL_PATH", "/var/lib/pizza/journal.jsonl"),
            ("PAGE_SIZE", "10"),
        ]));

        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.count_poll_interval, Duration::from_millis(250));
        assert_eq!(config.fault_rate, 0.2);
        assert_eq!(config.remote_latency, Duration::ZERO);
        assert_eq!(
            config.journal_path,
            Some(PathBuf::from("/var/lib/pizza/journal.jsonl"))
        );
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "http"),
            ("FAULT_RATE", "1.5"),
            ("PAGE_SIZE", "0"),
            ("JOURNAL_PATH", " "),
        ]));

        assert_eq!(config.port, 8234);
        assert_eq!(config.fault_rate, 0.0);
        assert_eq!(config.page_size, 25);
        assert!(config.journal_path.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
