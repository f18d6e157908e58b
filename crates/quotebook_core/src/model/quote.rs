//! Quote domain model.
//!
//! # Responsibility
//! - Define the persisted quote record and its creation input.
//! - Validate creation input fields that can be checked in memory.
//!
//! # Invariants
//! - `text` is never blank for a persisted quote.
//! - `page_end` is not lower than `page_start` when both are set.
//! - `source_id` existence is enforced by storage, not here.

use crate::model::catalog::SourceId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned quote identifier.
pub type QuoteId = i64;

/// Persisted quote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    /// Quoted text, never blank.
    pub text: String,
    /// Publication date of the quoted passage, when known.
    pub date: Option<NaiveDate>,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    /// Free-form notes about the quote.
    pub extras: Option<String>,
    pub source_id: SourceId,
    /// Creation timestamp in epoch milliseconds.
    pub inserted_at: i64,
    /// Last update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

/// Input for creating one quote together with its tag associations.
///
/// `tags` holds tag ids in their wire form; they are parsed to integer ids
/// inside the write transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuoteInput {
    pub text: String,
    pub source_id: SourceId,
    pub tags: Vec<String>,
    pub date: Option<NaiveDate>,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub extras: Option<String>,
}

impl CreateQuoteInput {
    /// Creates input with required fields only and no tags.
    pub fn new(text: impl Into<String>, source_id: SourceId) -> Self {
        Self {
            text: text.into(),
            source_id,
            ..Self::default()
        }
    }

    /// Replaces the tag id list.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns every in-memory validation failure, in field order.
    ///
    /// An empty vector means the input may be handed to storage.
    pub fn validation_errors(&self) -> Vec<QuoteValidationError> {
        let mut errors = Vec::new();
        if self.text.trim().is_empty() {
            errors.push(QuoteValidationError::BlankText);
        }
        if let (Some(page_start), Some(page_end)) = (self.page_start, self.page_end) {
            if page_end < page_start {
                errors.push(QuoteValidationError::ReversedPageRange {
                    page_start,
                    page_end,
                });
            }
        }
        errors
    }

    /// Trims text fields and collapses blank optional fields to `None`.
    pub fn normalized(mut self) -> Self {
        self.text = self.text.trim().to_string();
        self.volume = normalize_optional_text(self.volume);
        self.issue = normalize_optional_text(self.issue);
        self.extras = normalize_optional_text(self.extras);
        self
    }
}

/// Trims an optional text value, mapping blank values to `None`.
pub fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// In-memory validation failures for quote creation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteValidationError {
    BlankText,
    ReversedPageRange { page_start: i64, page_end: i64 },
}

impl QuoteValidationError {
    /// Name of the input field the failure belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankText => "text",
            Self::ReversedPageRange { .. } => "page_end",
        }
    }
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankText => write!(f, "can't be blank"),
            Self::ReversedPageRange {
                page_start,
                page_end,
            } => write!(
                f,
                "must be greater than or equal to page_start ({page_end} < {page_start})"
            ),
        }
    }
}

impl Error for QuoteValidationError {}

#[cfg(test)]
mod tests {
    use super::{normalize_optional_text, CreateQuoteInput, QuoteValidationError};

    #[test]
    fn whitespace_text_is_blank() {
        let input = CreateQuoteInput::new("  \n\t", 1);
        assert_eq!(
            input.validation_errors(),
            vec![QuoteValidationError::BlankText]
        );
    }

    #[test]
    fn reversed_page_range_is_reported_on_page_end() {
        let mut input = CreateQuoteInput::new("text", 1);
        input.page_start = Some(10);
        input.page_end = Some(3);
        let errors = input.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field(), "page_end");
    }

    #[test]
    fn single_page_range_is_valid() {
        let mut input = CreateQuoteInput::new("text", 1);
        input.page_start = Some(7);
        input.page_end = Some(7);
        assert!(input.validation_errors().is_empty());
    }

    #[test]
    fn normalized_collapses_blank_optionals() {
        let mut input = CreateQuoteInput::new("  padded  ", 1);
        input.volume = Some("   ".to_string());
        input.issue = Some(" 4 ".to_string());
        let normalized = input.normalized();
        assert_eq!(normalized.text, "padded");
        assert_eq!(normalized.volume, None);
        assert_eq!(normalized.issue.as_deref(), Some("4"));
        assert_eq!(normalize_optional_text(None), None);
    }
}
