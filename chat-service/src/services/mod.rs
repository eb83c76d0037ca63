pub mod chat;
pub mod database;
pub mod metrics;
pub mod persistence;
pub mod providers;

pub use chat::{ChatService, WriteFailurePolicy};
pub use database::{ChatDb, MongoConnector};
pub use persistence::ConnectionCache;
