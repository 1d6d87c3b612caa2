//! Store access.
//!
//! Every unit of work (one API request, one extraction run) takes its own
//! connection from a [`StoreConnector`] and hands it back to [`release`]
//! before returning, whatever the outcome. There is no shared pool.

pub mod deals;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::DatabaseConfig;

#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<DatabaseConnection, DbErr>;
}

/// Opens a single-connection sea-orm pool per call.
#[derive(Clone, Debug)]
pub struct PostgresConnector {
    config: DatabaseConfig,
}

impl PostgresConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for PostgresConnector {
    async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        let mut options = ConnectOptions::new(self.config.url.clone());
        options
            .max_connections(1)
            .min_connections(0)
            .connect_timeout(self.config.connect_timeout)
            .acquire_timeout(self.config.connect_timeout)
            .sqlx_logging(false);
        Database::connect(options).await
    }
}

/// Closes a connection obtained from a [`StoreConnector`].
pub async fn release(db: DatabaseConnection) {
    if let Err(e) = db.close().await {
        tracing::warn!(error = %e, "failed to close database connection cleanly");
    }
}
