//! MongoDB-backed exchange store.

use crate::config::MongoConfig;
use crate::models::ChatExchange;
use crate::services::metrics;
use crate::services::persistence::{ExchangeStore, PersistenceError, StoreConnector};
use async_trait::async_trait;
use mongodb::{
    bson::doc,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, IndexOptions},
    Client as MongoClient, Collection, IndexModel,
};
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct ChatDb {
    client: MongoClient,
    exchanges: Collection<ChatExchange>,
    collection_name: String,
    ready: Arc<AtomicBool>,
}

impl ChatDb {
    /// Connect and verify the deployment answers a ping.
    pub async fn connect(config: &MongoConfig) -> Result<Self, AppError> {
        tracing::info!(database = %config.database, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            tracing::error!("Invalid MongoDB connection string: {}", e);
            AppError::from(e)
        })?;
        options.app_name = Some("chat-service".to_string());
        options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout_secs));

        let client = MongoClient::with_options(options).map_err(|e| {
            tracing::error!("Failed to build MongoDB client: {}", e);
            AppError::from(e)
        })?;

        let db = Self::with_client(client, config);
        db.health_check().await?;
        db.ready.store(true, Ordering::SeqCst);

        tracing::info!(
            database = %config.database,
            collection = %config.collection,
            "Successfully connected to MongoDB database"
        );
        Ok(db)
    }

    /// Wrap an existing client. The handle starts not-ready until a ping
    /// succeeds.
    fn with_client(client: MongoClient, config: &MongoConfig) -> Self {
        Self {
            exchanges: client.database(&config.database).collection(&config.collection),
            collection_name: config.collection.clone(),
            client,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        let created_at_index = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_idx".to_string())
                    .build(),
            )
            .build();

        self.exchanges
            .create_index(created_at_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create created_at index: {}", e);
                AppError::from(e)
            })?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                self.note_failure(&e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub async fn insert_exchange(&self, exchange: &ChatExchange) -> Result<(), AppError> {
        let start = Instant::now();
        let result = self.exchanges.insert_one(exchange, None).await;
        metrics::record_db_operation(
            "insert",
            &self.collection_name,
            start.elapsed().as_secs_f64(),
        );

        result.map_err(|e| {
            tracing::error!("Failed to insert chat exchange: {}", e);
            metrics::record_db_error("insert", &self.collection_name);
            self.note_failure(&e);
            AppError::from(e)
        })?;
        Ok(())
    }

    /// Connection-level failures mark the handle stale so the next request
    /// reconnects.
    fn note_failure(&self, error: &MongoError) {
        if is_connection_failure(error) {
            tracing::warn!("MongoDB connection marked stale");
            self.ready.store(false, Ordering::SeqCst);
        }
    }
}

fn is_connection_failure(error: &MongoError) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
    )
}

#[async_trait]
impl ExchangeStore for ChatDb {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn insert(&self, exchange: &ChatExchange) -> Result<(), PersistenceError> {
        self.insert_exchange(exchange)
            .await
            .map_err(|e| PersistenceError::Write(e.to_string()))
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.health_check()
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))
    }
}

/// Opens [`ChatDb`] handles for the connection cache.
pub struct MongoConnector {
    config: MongoConfig,
}

impl MongoConnector {
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self) -> Result<Arc<dyn ExchangeStore>, PersistenceError> {
        let db = ChatDb::connect(&self.config)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        // Missing createIndex privileges must not block chat traffic.
        if let Err(e) = db.initialize_indexes().await {
            tracing::warn!(error = %e, "Continuing without chat exchange indexes");
        }

        Ok(Arc::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;
    use serde::de::Error as _;

    fn io_error() -> MongoError {
        MongoError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }

    fn decode_error() -> MongoError {
        MongoError::from(bson::de::Error::custom("unexpected field type"))
    }

    fn test_config() -> MongoConfig {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "chat_test".to_string(),
            collection: "chats".to_string(),
            connect_timeout_secs: 1,
        }
    }

    #[test]
    fn io_errors_are_connection_failures() {
        assert!(is_connection_failure(&io_error()));
    }

    #[test]
    fn decode_errors_are_not_connection_failures() {
        assert!(!is_connection_failure(&decode_error()));
    }

    #[tokio::test]
    async fn connection_failure_marks_handle_stale() {
        let config = test_config();
        // Parsing a plain mongodb:// URI and building the client do not
        // contact the server.
        let options = ClientOptions::parse(&config.uri).await.unwrap();
        let client = MongoClient::with_options(options).unwrap();
        let db = ChatDb::with_client(client, &config);
        db.ready.store(true, Ordering::SeqCst);

        db.note_failure(&decode_error());
        assert!(db.is_ready());

        db.note_failure(&io_error());
        assert!(!db.is_ready());
    }
}
