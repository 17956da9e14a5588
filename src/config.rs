//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The `scoring` and `spelling` sections are not consumed by the server
//! itself: they are the tuning values advertised to clients through
//! `GET /api/v1/config` so every consumer coaches with the same numbers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
    pub spelling: SpellingConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: accept connections from any address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// External inference worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Command used to start the worker process
    pub command: String,

    /// Arguments passed to the worker command
    pub args: Vec<String>,

    /// How long a dispatched request may go unanswered before the busy
    /// slot is reclaimed (milliseconds)
    pub request_timeout_ms: u64,
}

/// Session and liveness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Interval between liveness probes (seconds); sessions missing two
    /// consecutive probes are terminated
    pub heartbeat_interval_secs: u64,

    /// Maximum number of concurrent WebSocket sessions
    pub max_sessions: usize,
}

/// Scoring parameters advertised to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Exponential moving average factor for the smoothed score
    pub smoothing_alpha: f32,

    /// Consecutive no-hand frames before presence is retracted
    pub presence_miss_frames: u32,
}

/// Spelling progression parameters advertised to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellingConfig {
    /// Minimum score for a frame to count toward letter stability
    pub score_threshold: u32,

    /// Qualifying frames required to advance a letter
    pub stable_frames: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            worker: WorkerConfig {
                command: "python3".to_string(),
                args: vec!["worker/recognize.py".to_string()],
                request_timeout_ms: 10_000,
            },
            session: SessionConfig {
                heartbeat_interval_secs: 30,
                max_sessions: 64,
            },
            scoring: ScoringConfig {
                smoothing_alpha: 0.7,
                presence_miss_frames: 8,
            },
            spelling: SpellingConfig {
                score_threshold: 75,
                stable_frames: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: override server host
    /// - `APP_SERVER_PORT=3000`: override server port
    /// - `HOST` / `PORT`: deployment-platform overrides without the prefix
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.worker.command.is_empty() {
            return Err(anyhow::anyhow!("Worker command cannot be empty"));
        }

        if self.worker.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Worker request timeout must be greater than 0"));
        }

        if self.session.heartbeat_interval_secs == 0 {
            return Err(anyhow::anyhow!("Heartbeat interval must be greater than 0"));
        }

        if self.session.max_sessions == 0 {
            return Err(anyhow::anyhow!("Max sessions must be greater than 0"));
        }

        if !(self.scoring.smoothing_alpha > 0.0 && self.scoring.smoothing_alpha <= 1.0) {
            return Err(anyhow::anyhow!("Smoothing alpha must be in (0, 1]"));
        }

        if self.scoring.presence_miss_frames == 0 {
            return Err(anyhow::anyhow!("Presence miss frames must be greater than 0"));
        }

        if self.spelling.score_threshold > 100 {
            return Err(anyhow::anyhow!("Score threshold cannot exceed 100"));
        }

        if self.spelling.stable_frames == 0 {
            return Err(anyhow::anyhow!("Stable frames must be greater than 0"));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON document (runtime config updates).
    ///
    /// Only the fields present in the JSON are changed; the result is
    /// validated before it is accepted. Example: `{"session":
    /// {"max_sessions": 128}}` changes only the session limit.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(worker) = partial.get("worker") {
            if let Some(command) = worker.get("command").and_then(|v| v.as_str()) {
                self.worker.command = command.to_string();
            }
            if let Some(timeout) = worker.get("request_timeout_ms").and_then(|v| v.as_u64()) {
                self.worker.request_timeout_ms = timeout;
            }
        }

        if let Some(session) = partial.get("session") {
            if let Some(interval) = session
                .get("heartbeat_interval_secs")
                .and_then(|v| v.as_u64())
            {
                self.session.heartbeat_interval_secs = interval;
            }
            if let Some(max) = session.get("max_sessions").and_then(|v| v.as_u64()) {
                self.session.max_sessions = max as usize;
            }
        }

        if let Some(spelling) = partial.get("spelling") {
            if let Some(threshold) = spelling.get("score_threshold").and_then(|v| v.as_u64()) {
                self.spelling.score_threshold = threshold as u32;
            }
            if let Some(frames) = spelling.get("stable_frames").and_then(|v| v.as_u64()) {
                self.spelling.stable_frames = frames as u32;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.heartbeat_interval_secs, 30);
        assert_eq!(config.spelling.score_threshold, 75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.spelling.stable_frames = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scoring.smoothing_alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"session": {"max_sessions": 128}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.session.max_sessions, 128);
        // Untouched fields keep their values.
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_update_rejected() {
        let mut config = AppConfig::default();
        let json = r#"{"spelling": {"score_threshold": 300}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
