//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and overridden by `WALLETPOINT__*` environment
//! variables (e.g. `WALLETPOINT__ENGINE__QR_SIGNING_SECRET`).
//!
//! See `settings.toml` for the configuration.
use config::{Config, ConfigError, Environment, File};
use engine::{EngineConfig, FrozenCreditPolicy, Isolation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Engine {
    pub qr_signing_secret: String,
    #[serde(default = "default_qr_expiry")]
    pub qr_expiry_minutes: i64,
    #[serde(default)]
    pub isolation: Isolation,
    #[serde(default)]
    pub frozen_credit: FrozenCreditPolicy,
}

fn default_qr_expiry() -> i64 {
    10
}

impl Engine {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig::new(self.qr_signing_secret.clone())
            .qr_expiry_minutes(self.qr_expiry_minutes)
            .isolation(self.isolation)
            .frozen_credit(self.frozen_credit)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub engine: Engine,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("WALLETPOINT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
