use sea_orm::DatabaseConnection;

use crate::{EngineConfig, EngineError, ResultEngine};

mod access;
mod adjustment;
mod idempotency;
mod ledger;
mod missions;
mod products;
mod qr;
mod store;
mod transfer;
mod users;
mod wallets;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The transaction is opened at the configured isolation level.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self
            .database
            .begin_with_config($self.config.isolation.level(), None)
            .await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    config: EngineConfig,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    config: Option<EngineConfig>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required configuration
    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = Some(config);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let config = self
            .config
            .ok_or_else(|| EngineError::InvalidInput("missing engine config".to_string()))?;
        if config.qr_signing_secret.is_empty() {
            return Err(EngineError::InvalidInput(
                "qr signing secret must not be empty".to_string(),
            ));
        }
        if config.qr_expiry_minutes <= 0 {
            return Err(EngineError::InvalidInput(
                "qr expiry must be > 0 minutes".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            config,
        })
    }
}
