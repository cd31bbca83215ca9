use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::{player::MAX_VOLUME, session::SessionSettings};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Audio
    pub default_volume: u16, // Porcentaje 0-150
    pub max_queue_size: usize,

    // Motor de audio
    pub engine_timeout: Duration,

    // Sesiones
    pub idle_timeout: Option<Duration>, // None = nunca desalojar
    pub sweep_interval: Duration,

    // Rendimiento
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("DEFAULT_VOLUME inválido")?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,

            // Motor de audio
            engine_timeout: humantime::parse_duration(
                &std::env::var("ENGINE_TIMEOUT").unwrap_or_else(|_| "10s".to_string()),
            )
            .context("ENGINE_TIMEOUT inválido")?,

            // Sesiones
            idle_timeout: parse_optional_duration(
                &std::env::var("IDLE_TIMEOUT").unwrap_or_else(|_| "30m".to_string()),
            )
            .context("IDLE_TIMEOUT inválido")?,
            sweep_interval: humantime::parse_duration(
                &std::env::var("SWEEP_INTERVAL").unwrap_or_else(|_| "5m".to_string()),
            )
            .context("SWEEP_INTERVAL inválido")?,

            // Rendimiento
            worker_threads: match std::env::var("WORKER_THREADS") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => num_cpus::get(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be between 0 and 150 percent
    /// - Queue size must be greater than 0
    /// - Engine timeout and sweep interval must be non-zero
    /// - At least one worker thread
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "Default volume must be between 0 and {}, got: {}",
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.engine_timeout.is_zero() {
            anyhow::bail!("Engine timeout must be greater than 0");
        }

        if self.sweep_interval.is_zero() {
            anyhow::bail!("Sweep interval must be greater than 0");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("Worker threads must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Audio: {}% vol, {} max queue\n  \
            Engine: {} timeout\n  \
            Sessions: idle eviction {}, sweep every {}\n  \
            Runtime: {} worker threads",
            self.default_volume,
            self.max_queue_size,
            humantime::format_duration(self.engine_timeout),
            self.idle_timeout
                .map_or("off".to_string(), |d| humantime::format_duration(d).to_string()),
            humantime::format_duration(self.sweep_interval),
            self.worker_threads
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
            engine_timeout: self.engine_timeout,
        }
    }
}

/// "off", "0" o vacío desactivan el desalojo.
fn parse_optional_duration(raw: &str) -> Result<Option<Duration>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" || raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    Ok(Some(humantime::parse_duration(raw)?))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_volume: 100,
            max_queue_size: 1000,
            engine_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(30 * 60)),
            sweep_interval: Duration::from_secs(5 * 60),
            worker_threads: num_cpus::get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.summary().contains("idle eviction 30m"));

        let settings = config.session_settings();
        assert_eq!(settings.default_volume, 100);
        assert_eq!(settings.engine_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let loud = Config {
            default_volume: 151,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_queue = Config {
            max_queue_size: 0,
            ..Config::default()
        };
        assert!(no_queue.validate().is_err());

        let no_timeout = Config {
            engine_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_optional_duration_parsing() {
        assert_eq!(parse_optional_duration("off").unwrap(), None);
        assert_eq!(parse_optional_duration(" 0 ").unwrap(), None);
        assert_eq!(
            parse_optional_duration("15m").unwrap(),
            Some(Duration::from_secs(900))
        );
        assert!(parse_optional_duration("soon").is_err());
    }
}
