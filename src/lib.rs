//! # Verification History
//!
//! Query service over stored AI-assisted label/overview verification
//! results. Records are listed with filters and pagination, aggregated
//! into summary analytics over a date range, exported as CSV or JSON,
//! and retrieved one at a time by transaction id.
//!
//! ## Architecture
//!
//! ```text
//! RouteRequest (stdio) → handlers → HistoryService / TransactionService
//!                                          ↓
//!                                 RecordStore (SQLite)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use verification_history::{AppState, Config, HistoryServer};
//! use verification_history::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = Arc::new(AppState::new(config, Arc::new(storage)));
//!     HistoryServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// List, summary and export views over verification records.
pub mod history;
/// Request routing and the stdio server.
pub mod server;
/// Record model and the SQLite record store.
pub mod storage;
/// Single-record lookups.
pub mod transaction;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, HistoryServer, SharedState};
