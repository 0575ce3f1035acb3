use std::env;
use std::path::PathBuf;

use crate::stream::DEFAULT_CHUNK_SIZE;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// Root directory items are resolved against
    pub data_directory: PathBuf,
    /// Bytes pulled from a source per read call
    pub read_chunk_size: usize,
    /// Upper bound on lines per read request
    pub max_read_lines: usize,
    /// Maximum concurrently open streams
    pub max_sessions: usize,
    /// Close streams idle this long; `None` keeps them until closed
    pub idle_timeout_seconds: Option<i64>,
    /// CORS allowed origins (comma-separated in env var)
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_chunk_size = parse_or(&lookup, "STREAM_READ_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        if read_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "STREAM_READ_CHUNK_SIZE must be greater than 0".to_string(),
            ));
        }

        let max_read_lines = parse_or(&lookup, "STREAM_MAX_READ_LINES", 10_000usize)?;
        if max_read_lines == 0 {
            return Err(ConfigError::InvalidValue(
                "STREAM_MAX_READ_LINES must be greater than 0".to_string(),
            ));
        }

        let idle_timeout_seconds = match lookup("STREAM_IDLE_TIMEOUT_SECONDS") {
            Some(raw) if !raw.trim().is_empty() => {
                let seconds: i64 = raw.trim().parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "STREAM_IDLE_TIMEOUT_SECONDS is not a number: {}",
                        raw
                    ))
                })?;
                if seconds <= 0 {
                    return Err(ConfigError::InvalidValue(
                        "STREAM_IDLE_TIMEOUT_SECONDS must be positive".to_string(),
                    ));
                }
                Some(seconds)
            }
            _ => None,
        };

        Ok(Self {
            port: lookup("STREAM_SERVER_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: lookup("STREAM_SERVER_BIND_ADDR")
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            data_directory: lookup("STREAM_DATA_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            read_chunk_size,
            max_read_lines,
            max_sessions: parse_or(&lookup, "STREAM_MAX_SESSIONS", 10_000usize)?,
            idle_timeout_seconds,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://127.0.0.1:3000".to_string(),
                        "http://localhost:8080".to_string(),
                        "http://127.0.0.1:8080".to_string(),
                    ]
                }),
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Check if the server is configured for LAN access
    pub fn is_lan_mode(&self) -> bool {
        self.bind_addr == "0.0.0.0"
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a number: {}", key, raw))),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
