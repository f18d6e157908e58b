//! Quote use-case service.
//!
//! # Responsibility
//! - Normalize quote creation input before it reaches the write transaction.
//! - Expose quote reads filtered by source.
//! - Emit metadata-only log events for quote use-cases.
//!
//! # Invariants
//! - Service APIs never bypass the repository's transactional write path.
//! - Quote text and other user content never appear in logs.

use crate::model::catalog::Tag;
use crate::model::quote::{CreateQuoteInput, Quote, QuoteId};
use crate::repo::quote_repo::{QuoteFilter, QuoteRepository};
use crate::repo::quote_write::{CreatedQuote, QuoteWriteError};
use crate::repo::RepoResult;
use log::{error, info, warn};
use std::time::Instant;

/// Quote service facade over repository implementations.
pub struct QuoteService<R: QuoteRepository> {
    repo: R,
}

impl<R: QuoteRepository> QuoteService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one quote and attaches its tags atomically.
    ///
    /// Text fields are trimmed and blank optional fields dropped first.
    ///
    /// # Errors
    /// - `QuoteWriteError::Aborted` when a step rejects the input; nothing
    ///   is persisted.
    /// - `QuoteWriteError::Storage` on SQLite failures unrelated to input.
    pub fn create_with_tags(
        &mut self,
        input: CreateQuoteInput,
    ) -> Result<CreatedQuote, QuoteWriteError> {
        let started_at = Instant::now();
        let input = input.normalized();

        match self.repo.create_with_tags(&input) {
            Ok(created) => {
                info!(
                    "event=quote_create module=service status=ok quote_id={} source_id={} tag_count={} duration_ms={}",
                    created.quote.id,
                    created.quote.source_id,
                    created.tag_count,
                    started_at.elapsed().as_millis()
                );
                Ok(created)
            }
            Err(QuoteWriteError::Aborted(failure)) => {
                let fields = failure.error_map().into_keys().collect::<Vec<_>>();
                warn!(
                    "event=quote_create module=service status=error error_code=step_failed step={} fields={} duration_ms={}",
                    failure.step,
                    fields.join(","),
                    started_at.elapsed().as_millis()
                );
                Err(QuoteWriteError::Aborted(failure))
            }
            Err(err) => {
                error!(
                    "event=quote_create module=service status=error error_code=storage_failed duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Lists quotes, optionally restricted to one source.
    ///
    /// `None` returns every quote.
    pub fn get_quotes_by(&self, filter: Option<QuoteFilter>) -> RepoResult<Vec<Quote>> {
        let filter = filter.unwrap_or_default();
        let quotes = self.repo.list_quotes(&filter)?;
        info!(
            "event=quote_list module=service status=ok filtered={} count={}",
            filter.source.is_some(),
            quotes.len()
        );
        Ok(quotes)
    }

    /// Gets one quote by id.
    pub fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>> {
        self.repo.get_quote(id)
    }

    /// Lists tags attached to one quote.
    pub fn quote_tags(&self, id: QuoteId) -> RepoResult<Vec<Tag>> {
        self.repo.list_quote_tags(id)
    }
}
