//! Server configuration from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HOST` | `0.0.0.0` | Bind address |
//! | `PORT` | `3000` | Bind port |
//! | `HEARTBEAT_INTERVAL_SECS` | `30` | Idle-stream heartbeat period |
//! | `STREAM_BUFFER` | `256` | Per-connection event queue depth |
//! | `EVENT_BUS_ADAPTER` | `local` | `local` or `broadcast` |
//! | `EVENT_BUS_CAPACITY` | `256` | Channel capacity for the broadcast adapter |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` | Comma-separated CORS whitelist |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `LOG_FILE` | unset | Log to a daily-rotated file instead of stdout |
//! | `LOG_ANSI` | auto | Force ANSI colors on or off |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gigdash_core::{defaults, Error, Result};

/// Which fan-out adapter the bus starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Local,
    Broadcast,
}

impl FromStr for AdapterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(AdapterKind::Local),
            "broadcast" => Ok(AdapterKind::Broadcast),
            other => Err(Error::Config(format!(
                "EVENT_BUS_ADAPTER must be 'local' or 'broadcast', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Settings for each SSE connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub heartbeat_interval: Duration,
    pub buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(defaults::HEARTBEAT_INTERVAL_SECS),
            buffer: defaults::STREAM_BUFFER,
        }
    }
}

impl StreamConfig {
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub stream: StreamConfig,
    pub adapter: AdapterKind,
    pub bus_capacity: usize,
    pub allowed_origins: Vec<String>,
    pub log: LogConfig,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let heartbeat_secs: u64 = parse(
            &var,
            "HEARTBEAT_INTERVAL_SECS",
            defaults::HEARTBEAT_INTERVAL_SECS,
        )?;
        if heartbeat_secs == 0 {
            return Err(Error::Config(
                "HEARTBEAT_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        let buffer: usize = parse(&var, "STREAM_BUFFER", defaults::STREAM_BUFFER)?;
        if buffer == 0 {
            return Err(Error::Config("STREAM_BUFFER must be at least 1".to_string()));
        }

        let adapter = match var("EVENT_BUS_ADAPTER") {
            Some(value) => value.parse()?,
            None => AdapterKind::Local,
        };

        let format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            Some("text") | None => LogFormat::Text,
            Some(other) => {
                return Err(Error::Config(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| defaults::SERVER_HOST.to_string()),
            port: parse(&var, "PORT", defaults::SERVER_PORT)?,
            stream: StreamConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                buffer,
            },
            adapter,
            bus_capacity: parse(&var, "EVENT_BUS_CAPACITY", defaults::EVENT_BUS_CAPACITY)?,
            allowed_origins,
            log: LogConfig {
                format,
                file: var("LOG_FILE").map(PathBuf::from),
                ansi: var("LOG_ANSI").map(|v| v == "true" || v == "1"),
            },
        })
    }
}

fn parse<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} is invalid ('{}'): {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.stream.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.stream.buffer, 256);
        assert_eq!(cfg.adapter, AdapterKind::Local);
        assert_eq!(cfg.log.format, LogFormat::Text);
        assert!(cfg.log.file.is_none());
        assert_eq!(cfg.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("HEARTBEAT_INTERVAL_SECS", "15"),
            ("EVENT_BUS_ADAPTER", "Broadcast"),
            ("LOG_FORMAT", "json"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example ,"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.stream.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(cfg.adapter, AdapterKind::Broadcast);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(
            cfg.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let cfg = config(&[("PORT", "  "), ("HEARTBEAT_INTERVAL_SECS", "")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.stream.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("PORT")));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        assert!(config(&[("HEARTBEAT_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_unknown_adapter_rejected() {
        assert!(config(&[("EVENT_BUS_ADAPTER", "kafka")]).is_err());
    }
}
