//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Bulk loan processing configuration.
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Failed-attempt blocking configuration.
    #[serde(default)]
    pub abuse_guard: AbuseGuardConfig,
    /// Savings interest configuration.
    #[serde(default)]
    pub savings: SavingsConfig,
    /// Storage behaviour shared by every backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Bulk loan processing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Pause between two loans, in milliseconds.
    #[serde(default = "default_per_loan_delay_ms")]
    pub per_loan_delay_ms: u64,
    /// Wall-clock budget for one bulk run, in seconds.
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
    /// Capacity of the progress broadcast channel.
    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,
}

fn default_per_loan_delay_ms() -> u64 {
    500
}

fn default_batch_timeout_secs() -> u64 {
    7200 // 2 hours
}

fn default_progress_channel_capacity() -> usize {
    256
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            per_loan_delay_ms: default_per_loan_delay_ms(),
            batch_timeout_secs: default_batch_timeout_secs(),
            progress_channel_capacity: default_progress_channel_capacity(),
        }
    }
}

/// Failed-attempt blocking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AbuseGuardConfig {
    /// Failures tolerated inside the window before the origin is blocked.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Sliding window for counting failures, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How long a blocked origin stays blocked, in seconds.
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,
    /// Upper bound on tracked origins.
    #[serde(default = "default_max_origins")]
    pub max_origins: u64,
}

fn default_max_failures() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    300
}

fn default_block_secs() -> u64 {
    900
}

fn default_max_origins() -> u64 {
    100_000
}

impl Default for AbuseGuardConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            window_secs: default_window_secs(),
            block_secs: default_block_secs(),
            max_origins: default_max_origins(),
        }
    }
}

/// Savings interest configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SavingsConfig {
    /// Days in the interest year.
    #[serde(default = "default_annual_divisor")]
    pub annual_divisor: u32,
}

fn default_annual_divisor() -> u32 {
    360
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            annual_divisor: default_annual_divisor(),
        }
    }
}

/// Storage behaviour shared by every backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Maximum wait for a row lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "coopbank=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("COOPBANK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
