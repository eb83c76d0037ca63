//! In-process exchange store, used by tests and local runs without MongoDB.

use super::{ExchangeStore, PersistenceError, StoreConnector};
use crate::models::ChatExchange;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Records = Arc<Mutex<Vec<ChatExchange>>>;

pub struct MemoryExchangeStore {
    ready: AtomicBool,
    fail_writes: Arc<AtomicBool>,
    records: Records,
}

impl MemoryExchangeStore {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExchangeStore for MemoryExchangeStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn insert(&self, exchange: &ChatExchange) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write("memory store rejected write".to_string()));
        }
        self.records
            .lock()
            .map_err(|e| PersistenceError::Write(e.to_string()))?
            .push(exchange.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(PersistenceError::Connection("memory store not ready".to_string()))
        }
    }
}

/// Hands out memory stores that all append to one shared record list.
#[derive(Default)]
pub struct MemoryConnector {
    fail_connect: AtomicBool,
    fail_writes: Arc<AtomicBool>,
    connects: AtomicUsize,
    records: Records,
    last: Mutex<Option<Arc<MemoryExchangeStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of connection attempts, successful or not.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_store(&self) -> Option<Arc<MemoryExchangeStore>> {
        self.last.lock().ok().and_then(|last| last.clone())
    }

    pub fn records(&self) -> Vec<ChatExchange> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn ExchangeStore>, PersistenceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(PersistenceError::Connection(
                "memory connector refused connection".to_string(),
            ));
        }

        let store = Arc::new(MemoryExchangeStore {
            ready: AtomicBool::new(true),
            fail_writes: self.fail_writes.clone(),
            records: self.records.clone(),
        });
        if let Ok(mut last) = self.last.lock() {
            *last = Some(store.clone());
        }
        Ok(store)
    }
}
