//! Request routing for the history service.
//!
//! This module provides:
//! - Shared application state
//! - Resource routing and error envelope mapping
//! - A line-delimited JSON server over stdio

mod handlers;
mod protocol;

pub use handlers::*;
pub use protocol::*;

use std::sync::Arc;

use crate::config::Config;
use crate::history::{ArtifactStore, HistoryService, LocalArtifactStore};
use crate::storage::RecordStore;
use crate::transaction::TransactionService;

/// Application state shared across requests.
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Record store backing every view.
    pub store: Arc<dyn RecordStore>,
    /// List, summary and export views.
    pub history: HistoryService,
    /// Single-record lookups.
    pub transactions: TransactionService,
}

impl AppState {
    /// Create state that writes exports to the configured local directory.
    pub fn new(config: Config, store: Arc<dyn RecordStore>) -> Self {
        let artifacts = Arc::new(LocalArtifactStore::new(&config.export));
        Self::with_artifacts(config, store, artifacts)
    }

    /// Create state with a specific artifact store.
    pub fn with_artifacts(
        config: Config,
        store: Arc<dyn RecordStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let config = Arc::new(config);

        tracing::info!(
            export_dir = %config.export.directory.display(),
            bucket = %config.export.bucket,
            "AppState initialized"
        );

        let history = HistoryService::new(store.clone(), artifacts, config.clone());
        let transactions = TransactionService::new(store.clone(), config.pricing);

        Self {
            config,
            store,
            history,
            transactions,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
