//! Shared server state.

use std::path::Path;
use std::sync::Arc;

use agroboost_devices::{CommandSink, IngestionService, PumpService};
use agroboost_storage::{KitStore, NotificationStore, ReadingStore, UserStore};

use crate::auth::TokenKeys;

/// Everything the handlers need, cheap to clone.
#[derive(Clone)]
pub struct ServerState {
    pub kits: Arc<KitStore>,
    pub readings: Arc<ReadingStore>,
    pub notifications: Arc<NotificationStore>,
    pub users: Arc<UserStore>,
    pub ingestion: Arc<IngestionService>,
    pub pumps: Arc<PumpService>,
    pub tokens: Arc<TokenKeys>,
}

impl ServerState {
    /// Assemble the state from opened stores, the outbound command sink,
    /// and the token keys. The services are wired to the same store
    /// instances the handlers read from.
    pub fn new(
        kits: Arc<KitStore>,
        readings: Arc<ReadingStore>,
        notifications: Arc<NotificationStore>,
        users: Arc<UserStore>,
        sink: Arc<dyn CommandSink>,
        tokens: TokenKeys,
    ) -> Self {
        let ingestion = Arc::new(IngestionService::new(
            kits.clone(),
            readings.clone(),
            notifications.clone(),
        ));
        let pumps = Arc::new(PumpService::new(kits.clone(), notifications.clone(), sink));

        Self {
            kits,
            readings,
            notifications,
            users,
            ingestion,
            pumps,
            tokens: Arc::new(tokens),
        }
    }

    /// Open all stores under one data directory.
    pub fn open(
        data_dir: &Path,
        sink: Arc<dyn CommandSink>,
        tokens: TokenKeys,
    ) -> agroboost_storage::Result<Self> {
        Ok(Self::new(
            Arc::new(KitStore::open(data_dir)?),
            Arc::new(ReadingStore::open(data_dir)?),
            Arc::new(NotificationStore::open(data_dir)?),
            Arc::new(UserStore::open(data_dir)?),
            sink,
            tokens,
        ))
    }

    /// Fully in-memory state for tests.
    pub fn memory(sink: Arc<dyn CommandSink>) -> agroboost_storage::Result<Self> {
        Ok(Self::new(
            Arc::new(KitStore::memory()?),
            Arc::new(ReadingStore::memory()?),
            Arc::new(NotificationStore::memory()?),
            Arc::new(UserStore::memory()?),
            sink,
            TokenKeys::new("in-memory-test-secret"),
        ))
    }
}
