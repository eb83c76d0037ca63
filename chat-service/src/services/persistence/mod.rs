//! Optional recording of chat exchanges.
//!
//! The handler never holds a database client directly. It asks a
//! [`ConnectionCache`] for a live [`ExchangeStore`], which is established on
//! first use and re-established whenever the cached one stops being ready.

pub mod memory;

use crate::models::ChatExchange;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Write failed: {0}")]
    Write(String),
}

/// A connected store that chat exchanges are written to.
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// False once the underlying connection is known to be unusable.
    fn is_ready(&self) -> bool;

    async fn insert(&self, exchange: &ChatExchange) -> Result<(), PersistenceError>;

    /// Round-trip to the backend, for readiness probes.
    async fn ping(&self) -> Result<(), PersistenceError>;
}

/// Opens new store connections.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ExchangeStore>, PersistenceError>;
}

/// Lazily established, process-lifetime store handle.
///
/// No lock is held while connecting, so concurrent requests that all find
/// the handle stale may each open a connection; the first ready handle to be
/// installed wins and the others are dropped.
pub struct ConnectionCache {
    connector: Arc<dyn StoreConnector>,
    cached: RwLock<Option<Arc<dyn ExchangeStore>>>,
}

impl ConnectionCache {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            cached: RwLock::new(None),
        }
    }

    /// Return the cached store if it is ready, otherwise connect a new one.
    pub async fn acquire(&self) -> Result<Arc<dyn ExchangeStore>, PersistenceError> {
        if let Some(store) = self.ready_store().await {
            return Ok(store);
        }

        tracing::info!("Establishing chat store connection");
        let fresh = self.connector.connect().await?;

        let mut slot = self.cached.write().await;
        if let Some(existing) = slot.as_ref().filter(|s| s.is_ready()) {
            // Lost the race to another request; keep the installed handle.
            return Ok(existing.clone());
        }
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    /// The cached store, only if it is still ready.
    pub async fn ready_store(&self) -> Option<Arc<dyn ExchangeStore>> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|s| s.is_ready())
            .cloned()
    }
}
