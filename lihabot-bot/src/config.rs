use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use lihabot_core::{MAX_POLL_INTERVAL, QueueMode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN environment variable is required")]
    MissingToken,

    #[error("QUEUE_CHANNEL_ID environment variable is required and must be a numeric channel id")]
    MissingChannel,

    #[error("CLEAR_HOUR/CLEAR_MINUTE do not form a valid time ({hour}:{minute:02})")]
    InvalidClearTime { hour: u32, minute: u32 },

    #[error("QUEUE_MODE is invalid: {0}")]
    InvalidQueueMode(String),
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot file path
    /// Env: DATA_PATH (default: "bot-data.json")
    pub data_path: String,

    /// Queue layout as written, parsed by `mode`
    /// Env: QUEUE_MODE (default: shared, or per-tank)
    pub queue_mode: String,

    /// Discord API Token
    /// Env: DISCORD_TOKEN (required, checked by `validate`)
    pub discord_token: Option<String>,

    /// Channel whose topic shows the queue length and where players are pinged
    /// Env: QUEUE_CHANNEL_ID (required, checked by `validate`)
    pub queue_channel_id: Option<u64>,

    /// Local hour of the daily queue clear
    /// Env: CLEAR_HOUR (default: 5)
    pub clear_hour: u32,

    /// Env: CLEAR_MINUTE (default: 0)
    pub clear_minute: u32,

    /// How often the daily clear checks the clock, at most 60 seconds
    /// Env: CLEAR_CHECK_INTERVAL_SECS (default: 60)
    pub clear_check_interval: Duration,

    /// How long the "you're up" ping stays in the channel
    /// Env: PING_DELETE_AFTER_SECS (default: 900)
    pub ping_delete_after: Duration,

    /// Status server port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Requests per second for the status endpoints
    /// Env: RATE_LIMIT_PER_SEC (default: 10)
    pub rate_limit_per_sec: u64,

    /// Env: RATE_LIMIT_BURST (default: 20)
    pub rate_limit_burst: u32,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            data_path: env_or_default_string("DATA_PATH", "bot-data.json"),
            queue_mode: env_or_default_string("QUEUE_MODE", "shared"),
            discord_token: var("DISCORD_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            queue_channel_id: var("QUEUE_CHANNEL_ID")
                .ok()
                .and_then(|id| id.trim().parse().ok()),
            clear_hour: env_or_default("CLEAR_HOUR", 5),
            clear_minute: env_or_default("CLEAR_MINUTE", 0),
            clear_check_interval: poll_interval(env_or_default("CLEAR_CHECK_INTERVAL_SECS", 60)),
            ping_delete_after: Duration::from_secs(env_or_default("PING_DELETE_AFTER_SECS", 900)),
            port: env_or_default("PORT", 3000),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            rate_limit_per_sec: env_or_default("RATE_LIMIT_PER_SEC", 10),
            rate_limit_burst: env_or_default("RATE_LIMIT_BURST", 20),
        }
    }

    /// Parsed queue layout. Unknown values are an error, never a silent default.
    pub fn mode(&self) -> Result<QueueMode, ConfigError> {
        self.queue_mode
            .parse()
            .map_err(ConfigError::InvalidQueueMode)
    }

    /// Check the values the bot cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord_token.is_none() {
            return Err(ConfigError::MissingToken);
        }
        if self.queue_channel_id.is_none_or(|id| id == 0) {
            return Err(ConfigError::MissingChannel);
        }
        if self.clear_hour > 23 || self.clear_minute > 59 {
            return Err(ConfigError::InvalidClearTime {
                hour: self.clear_hour,
                minute: self.clear_minute,
            });
        }
        self.mode()?;
        Ok(())
    }
}

impl Default for Config {
    /// Create configuration with all default values
    fn default() -> Self {
        Self {
            data_path: "bot-data.json".to_string(),
            queue_mode: QueueMode::Shared.to_string(),
            discord_token: None,
            queue_channel_id: None,
            clear_hour: 5,
            clear_minute: 0,
            clear_check_interval: Duration::from_secs(60),
            ping_delete_after: Duration::from_secs(900),
            port: 3000,
            request_timeout: Duration::from_secs(30),
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Poll period for the daily clear; zero or anything above the maximum uses the maximum.
fn poll_interval(secs: u64) -> Duration {
    match Duration::from_secs(secs) {
        d if d.is_zero() || d > MAX_POLL_INTERVAL => MAX_POLL_INTERVAL,
        d => d,
    }
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_path, "bot-data.json");
        assert_eq!(config.mode(), Ok(QueueMode::Shared));
        assert_eq!(config.clear_hour, 5);
        assert_eq!(config.clear_minute, 0);
        assert_eq!(config.clear_check_interval, Duration::from_secs(60));
        assert_eq!(config.ping_delete_after, Duration::from_secs(900));
        assert_eq!(config.port, 3000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.rate_limit_per_sec, 10);
        assert_eq!(config.rate_limit_burst, 20);
    }

    #[test]
    fn test_validate_requires_token_and_channel() {
        let mut config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingToken));

        config.discord_token = Some("token".to_string());
        assert_eq!(config.validate(), Err(ConfigError::MissingChannel));

        config.queue_channel_id = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::MissingChannel));

        config.queue_channel_id = Some(123456789);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_clear_time() {
        let config = Config {
            discord_token: Some("token".to_string()),
            queue_channel_id: Some(1),
            clear_hour: 24,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidClearTime {
                hour: 24,
                minute: 0
            })
        );
    }

    #[test]
    fn test_queue_mode_parsing() {
        let mut config = Config {
            discord_token: Some("token".to_string()),
            queue_channel_id: Some(1),
            queue_mode: "Per-Tank".to_string(),
            ..Config::default()
        };
        assert_eq!(config.mode(), Ok(QueueMode::PerTank));
        assert_eq!(config.validate(), Ok(()));

        config.queue_mode = "per_tnak".to_string();
        assert!(matches!(config.mode(), Err(ConfigError::InvalidQueueMode(_))));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("per_tnak"));
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        assert_eq!(poll_interval(30), Duration::from_secs(30));
        assert_eq!(poll_interval(60), MAX_POLL_INTERVAL);
        assert_eq!(poll_interval(600), MAX_POLL_INTERVAL);
        assert_eq!(poll_interval(0), MAX_POLL_INTERVAL);
    }
}
