//! Main application configuration
//!
//! This module defines the primary configuration structures for the paddock
//! session-formation engine, including environment variable and TOML file
//! loading plus validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Queue monitor scan interval in seconds
    pub monitor_interval_seconds: u64,
    /// Delay before the monitor's first scan in seconds
    pub monitor_initial_delay_seconds: u64,
    /// Maximum instant-queue wait before an entry is dropped, seconds
    pub instant_max_wait_seconds: u64,
    /// Instant-queue wait after which the monitor creates a lobby, seconds
    pub auto_create_delay_seconds: u64,
    /// Countdown remaining below which a lobby stops admitting, milliseconds
    pub min_countdown_remaining_ms: u64,
    /// Countdown advertised in lobby invites, milliseconds
    pub invite_countdown_ms: u64,
    /// Shortened countdown applied when a lobby fills, milliseconds
    pub final_countdown_ms: u64,
    /// Lock new lobbies to the creator's car class
    pub lock_lobby_to_creator_class: bool,
    /// Event mode exempt from the class lock even when locking is on
    pub class_unlocked_mode_id: i32,
    /// Start sessions with power-ups disabled
    pub nopu_mode_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            matchmaking: MatchmakingSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "paddock".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            monitor_interval_seconds: 5,
            monitor_initial_delay_seconds: 3,
            instant_max_wait_seconds: 1800, // 30 minutes
            auto_create_delay_seconds: 30,
            min_countdown_remaining_ms: 6000,
            invite_countdown_ms: 10_000,
            final_countdown_ms: 10_000,
            lock_lobby_to_creator_class: false,
            class_unlocked_mode_id: 0,
            nopu_mode_enabled: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("PADDOCK_SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("PADDOCK_LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("PADDOCK_SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout)
            })?;
        }

        // Matchmaking settings
        if let Ok(interval) = env::var("PADDOCK_MONITOR_INTERVAL_SECONDS") {
            config.matchmaking.monitor_interval_seconds = interval.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_MONITOR_INTERVAL_SECONDS value: {}", interval)
            })?;
        }
        if let Ok(delay) = env::var("PADDOCK_MONITOR_INITIAL_DELAY_SECONDS") {
            config.matchmaking.monitor_initial_delay_seconds = delay.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_MONITOR_INITIAL_DELAY_SECONDS value: {}", delay)
            })?;
        }
        if let Ok(max_wait) = env::var("PADDOCK_INSTANT_MAX_WAIT_SECONDS") {
            config.matchmaking.instant_max_wait_seconds = max_wait.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_INSTANT_MAX_WAIT_SECONDS value: {}", max_wait)
            })?;
        }
        if let Ok(delay) = env::var("PADDOCK_AUTO_CREATE_DELAY_SECONDS") {
            config.matchmaking.auto_create_delay_seconds = delay.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_AUTO_CREATE_DELAY_SECONDS value: {}", delay)
            })?;
        }
        if let Ok(min_remaining) = env::var("PADDOCK_MIN_COUNTDOWN_REMAINING_MS") {
            config.matchmaking.min_countdown_remaining_ms =
                min_remaining.parse().map_err(|_| {
                    anyhow!(
                        "Invalid PADDOCK_MIN_COUNTDOWN_REMAINING_MS value: {}",
                        min_remaining
                    )
                })?;
        }
        if let Ok(countdown) = env::var("PADDOCK_INVITE_COUNTDOWN_MS") {
            config.matchmaking.invite_countdown_ms = countdown.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_INVITE_COUNTDOWN_MS value: {}", countdown)
            })?;
        }
        if let Ok(countdown) = env::var("PADDOCK_FINAL_COUNTDOWN_MS") {
            config.matchmaking.final_countdown_ms = countdown.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_FINAL_COUNTDOWN_MS value: {}", countdown)
            })?;
        }
        if let Ok(lock) = env::var("PADDOCK_LOCK_LOBBY_TO_CREATOR_CLASS") {
            config.matchmaking.lock_lobby_to_creator_class = lock.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_LOCK_LOBBY_TO_CREATOR_CLASS value: {}", lock)
            })?;
        }
        if let Ok(mode) = env::var("PADDOCK_CLASS_UNLOCKED_MODE_ID") {
            config.matchmaking.class_unlocked_mode_id = mode.parse().map_err(|_| {
                anyhow!("Invalid PADDOCK_CLASS_UNLOCKED_MODE_ID value: {}", mode)
            })?;
        }
        if let Ok(nopu) = env::var("PADDOCK_NOPU_MODE_ENABLED") {
            config.matchmaking.nopu_mode_enabled = nopu
                .parse()
                .map_err(|_| anyhow!("Invalid PADDOCK_NOPU_MODE_ENABLED value: {}", nopu))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then validate
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.as_ref().display()))?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get monitor scan interval as Duration
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.monitor_interval_seconds)
    }

    /// Get monitor initial delay as Duration
    pub fn monitor_initial_delay(&self) -> Duration {
        Duration::from_secs(self.matchmaking.monitor_initial_delay_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.matchmaking.monitor_interval_seconds == 0 {
        return Err(anyhow!("Monitor interval must be greater than 0"));
    }
    if config.matchmaking.invite_countdown_ms == 0 {
        return Err(anyhow!("Invite countdown must be greater than 0"));
    }
    if config.matchmaking.final_countdown_ms == 0 {
        return Err(anyhow!("Final countdown must be greater than 0"));
    }

    // A lobby that fills must still admit its last entrant, so the
    // admission floor has to sit below the invite countdown
    if config.matchmaking.min_countdown_remaining_ms >= config.matchmaking.invite_countdown_ms {
        return Err(anyhow!(
            "Minimum remaining countdown must be below the invite countdown"
        ));
    }

    if config.matchmaking.auto_create_delay_seconds > config.matchmaking.instant_max_wait_seconds {
        return Err(anyhow!(
            "Auto-create delay cannot exceed the maximum instant-queue wait"
        ));
    }

    Ok(())
}
