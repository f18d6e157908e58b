//! Resolver-facing adapter over `quotebook_core`.
//!
//! Exposes `createQuote`, `quotes(filter:)` and `quoteFullSearch` as typed
//! calls with serde request/response shapes and a single error envelope.

mod api;
mod error;

pub use api::{
    parse_id, resolve_db_path, CreateQuoteRequest, CreateSourceRequest, QuoteFilterRequest,
    QuotePayload, Resolver, SearchPayload,
};
pub use error::{ApiError, ApiErrorCode};

/// Exposes the core crate version.
pub fn core_version() -> &'static str {
    quotebook_core::core_version()
}

/// Initializes core logging once per process.
///
/// Safe to call repeatedly with the same `level + log_dir`.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), ApiError> {
    quotebook_core::init_logging(level, log_dir)
        .map_err(|message| ApiError::invalid_request("log", message))
}
