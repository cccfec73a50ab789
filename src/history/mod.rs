//! Verification history: list, summary and export views.
//!
//! Every view runs the same pipeline. The record store is scanned with a
//! predicate derived from the query, each record's AI payload is parsed and
//! classified, and the results are paged, aggregated or exported.
//!
//! The views disagree on records whose payload fails to parse: the list
//! view returns them as placeholder items, while summary and export leave
//! them out.

pub mod analytics;
pub mod artifact;
pub mod classifier;
pub mod export;
pub mod filter;
pub mod paginator;
pub mod parser;
mod service;
pub mod types;

pub use analytics::{summarize, SummaryAggregator};
pub use artifact::{ArtifactLocation, ArtifactStore, LocalArtifactStore};
pub use classifier::{classify, CORRECT_THRESHOLD, INCORRECT_THRESHOLD};
pub use export::ExportFormat;
pub use filter::{applied_filters, build_filter, resolve_date_range};
pub use paginator::{paginate, Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use parser::parse_outcome;
pub use service::{HistoryService, FORMAT_PARAM, VIEW_PARAM};
pub use types::*;
