//! Per-request store access.
//!
//! The pipeline asks a [`StoreProvider`] for a fresh handle on every call and
//! closes it when the call is done.

use crate::config::{Config, StoreConfig};
use crate::db::connection::DbConnection;
use crate::db::document::{DocumentStore, MongoStore};
use crate::error::{NlqError, NlqResult};
use crate::models::{Dialect, StoreKind};
use std::future::Future;
use tracing::info;

/// Opens store handles by dialect.
pub trait StoreProvider: Send + Sync {
    type Documents: DocumentStore;

    /// Configured dialects and the store kind serving each.
    fn dialects(&self) -> Vec<(Dialect, StoreKind)>;

    fn open_relational(
        &self,
        dialect: Dialect,
    ) -> impl Future<Output = NlqResult<DbConnection>> + Send;

    fn open_documents(&self) -> impl Future<Output = NlqResult<Self::Documents>> + Send;
}

/// Stores named on the command line.
#[derive(Debug, Clone)]
pub struct ConfiguredStores {
    stores: Vec<StoreConfig>,
}

impl ConfiguredStores {
    pub fn new(stores: Vec<StoreConfig>) -> Self {
        for store in &stores {
            info!(
                dialect = %store.dialect,
                store = %store.kind,
                url = %store.masked(),
                "Store configured"
            );
        }
        Self { stores }
    }

    /// Validate every configured URL; at least one store is required.
    pub fn from_config(config: &Config) -> NlqResult<Self> {
        let stores = config.store_configs().map_err(NlqError::configuration)?;
        if stores.is_empty() {
            return Err(NlqError::configuration(
                "No store configured: set --mysql-url, --postgres-url or --mongodb-url",
            ));
        }
        Ok(Self::new(stores))
    }

    fn get(&self, dialect: Dialect) -> NlqResult<&StoreConfig> {
        self.stores
            .iter()
            .find(|s| s.dialect == dialect)
            .ok_or_else(|| {
                NlqError::configuration(format!("No store configured for the {} dialect", dialect))
            })
    }
}

impl StoreProvider for ConfiguredStores {
    type Documents = MongoStore;

    fn dialects(&self) -> Vec<(Dialect, StoreKind)> {
        self.stores.iter().map(|s| (s.dialect, s.kind)).collect()
    }

    async fn open_relational(&self, dialect: Dialect) -> NlqResult<DbConnection> {
        let store = self.get(dialect)?;
        if !store.kind.is_relational() {
            return Err(NlqError::internal(format!(
                "{} dialect is served by a {} store",
                dialect, store.kind
            )));
        }
        DbConnection::open(&store.connection_string).await
    }

    async fn open_documents(&self) -> NlqResult<MongoStore> {
        let store = self.get(Dialect::MongoDb)?;
        MongoStore::connect(&store.connection_string, store.database.as_deref()).await
    }
}
