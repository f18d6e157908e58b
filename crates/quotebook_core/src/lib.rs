//! Core data-access logic for the Quotebook catalog.
//! This crate is the single source of truth for catalog invariants: atomic
//! quote + tag writes and federated search across catalogued entities.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use logging::{default_log_level, init_logging};
pub use model::catalog::{
    CatalogValidationError, NewSource, Source, SourceId, SourceType, SourceTypeId, Tag, TagId,
};
pub use model::quote::{CreateQuoteInput, Quote, QuoteId, QuoteValidationError};
pub use repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use repo::quote_repo::{QuoteFilter, QuoteRepository, SqliteQuoteRepository};
pub use repo::quote_write::{
    CreatedQuote, FieldError, FieldErrorKind, QuoteWriteError, QuoteWriteTransaction,
    WriteFailure, WriteStep, MAX_TAGS_PER_QUOTE,
};
pub use repo::{RepoError, RepoResult};
pub use search::federated::{
    search_all, SearchAggregator, SearchColumn, SearchError, SearchResult, SearchResultRow,
    SearchResultSet, SearchSource,
};
pub use service::quote_service::QuoteService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
