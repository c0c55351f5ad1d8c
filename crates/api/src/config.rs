//! Configuration loading.
//!
//! Layered, later sources win:
//! 1. Defaults in code
//! 2. `config/{environment}.toml` (optional)
//! 3. Environment variables prefixed `STOCKROOM__`, e.g. `STOCKROOM__SERVER__PORT=9000`
//!
//! `main` loads a `.env` file first, so its entries count as environment variables.

use chrono::FixedOffset;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use stockroom_infra::{MAX_WINDOW_DAYS, ReportSettings};
use stockroom_observability::LogFormat;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Current environment (development, production, test)
    pub environment: String,
    pub server: ServerSettings,
    pub log: LogSettings,
    pub database: DatabaseSettings,
    pub reporting: ReportingSettings,
    pub movements: MovementListSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL. Without one the service runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Apply embedded migrations on startup.
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportingSettings {
    /// Offset from UTC, in minutes, for day and month boundaries.
    pub utc_offset_minutes: i32,
    pub window_days: i64,
    pub recent_limit: usize,
    pub active_limit: usize,
    pub decreasing_limit: usize,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MovementListSettings {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Settings {
    /// Load configuration from files and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKROOM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        defaults(&environment)?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("STOCKROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn report_settings(&self) -> Result<ReportSettings, ConfigError> {
        let minutes = self.reporting.utc_offset_minutes;
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "reporting.utc_offset_minutes out of range: {minutes}"
                ))
            })?;
        let window_days = self.reporting.window_days;
        if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(ConfigError::Message(format!(
                "reporting.window_days must be between 1 and {MAX_WINDOW_DAYS}: {window_days}"
            )));
        }
        Ok(ReportSettings {
            offset,
            window_days,
            recent_limit: self.reporting.recent_limit,
            active_limit: self.reporting.active_limit,
            decreasing_limit: self.reporting.decreasing_limit,
        })
    }
}

/// Builder preloaded with every default value.
pub fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("environment", environment)?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("log.format", "json")?
        .set_default("database.max_connections", 10)?
        .set_default("database.run_migrations", true)?
        .set_default("reporting.utc_offset_minutes", 180)?
        .set_default("reporting.window_days", 7)?
        .set_default("reporting.recent_limit", 10)?
        .set_default("reporting.active_limit", 10)?
        .set_default("reporting.decreasing_limit", 5)?
        .set_default("movements.default_limit", 200)?
        .set_default("movements.max_limit", 1000)
}
