//! Atomic "create quote + attach tags" write.
//!
//! # Responsibility
//! - Run quote creation as an ordered pipeline of named steps inside one
//!   SQLite transaction.
//! - Report step failures with field-level errors and the steps that
//!   completed before the failure.
//!
//! # Invariants
//! - A quote row is committed iff every one of its association rows is.
//! - All rows written by one transaction share one timestamp.
//! - Rollback is the storage engine's: a failed step drops the transaction
//!   uncommitted, nothing is deleted by hand.

use crate::db::{is_foreign_key_violation, DbError};
use crate::model::catalog::TagId;
use crate::model::quote::{CreateQuoteInput, Quote, QuoteId, QuoteValidationError};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Most distinct tags one quote may carry. The association insert binds
/// `2 + tags` parameters, which must stay under SQLite's 999-variable floor.
pub const MAX_TAGS_PER_QUOTE: usize = 500;

/// Named step of the quote write pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStep {
    /// Validate and insert the quote row.
    Quote,
    /// Parse tag ids and bulk-insert association rows.
    QuoteTags,
}

impl WriteStep {
    /// Steps in execution order.
    pub const PIPELINE: [WriteStep; 2] = [WriteStep::Quote, WriteStep::QuoteTags];

    pub fn name(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::QuoteTags => "quote_tags",
        }
    }
}

impl Display for WriteStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of a field-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Input rejected before or without touching referenced rows.
    Validation,
    /// Input references a row that does not exist.
    ForeignKey,
}

/// One failure attached to one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            kind: FieldErrorKind::Validation,
            message: message.into(),
        }
    }

    pub fn foreign_key(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            kind: FieldErrorKind::ForeignKey,
            message: message.into(),
        }
    }
}

impl From<&QuoteValidationError> for FieldError {
    fn from(value: &QuoteValidationError) -> Self {
        Self::validation(value.field(), value.to_string())
    }
}

/// Aborted write: which step failed, why, and what had run before it.
///
/// `completed` is diagnostic only; none of those steps' effects persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub step: WriteStep,
    pub errors: Vec<FieldError>,
    pub completed: Vec<WriteStep>,
}

impl WriteFailure {
    /// Groups error messages by field name.
    pub fn error_map(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.field)
                .or_default()
                .push(error.message.clone());
        }
        map
    }

    /// Returns whether any error of `kind` is attached to `field`.
    pub fn has_error(&self, field: &str, kind: FieldErrorKind) -> bool {
        self.errors
            .iter()
            .any(|error| error.field == field && error.kind == kind)
    }
}

impl Display for WriteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "step `{}` failed:", self.step)?;
        for (field, messages) in self.error_map() {
            write!(f, " {field}: {};", messages.join(", "))?;
        }
        Ok(())
    }
}

/// Error returned by the quote write transaction.
#[derive(Debug)]
pub enum QuoteWriteError {
    /// A step rejected the input; the transaction was rolled back.
    Aborted(WriteFailure),
    /// Storage failed for reasons unrelated to the input. `step` is `None`
    /// when the failure happened while opening or committing.
    Storage {
        step: Option<WriteStep>,
        error: DbError,
    },
}

impl QuoteWriteError {
    pub fn failure(&self) -> Option<&WriteFailure> {
        match self {
            Self::Aborted(failure) => Some(failure),
            Self::Storage { .. } => None,
        }
    }
}

impl Display for QuoteWriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborted(failure) => write!(f, "quote write aborted, {failure}"),
            Self::Storage {
                step: Some(step),
                error,
            } => write!(f, "quote write failed at step `{step}`: {error}"),
            Self::Storage { step: None, error } => write!(f, "quote write failed: {error}"),
        }
    }
}

impl Error for QuoteWriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Aborted(_) => None,
            Self::Storage { error, .. } => Some(error),
        }
    }
}

impl From<rusqlite::Error> for QuoteWriteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage {
            step: None,
            error: DbError::Sqlite(value),
        }
    }
}

/// Successful write result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedQuote {
    pub quote: Quote,
    /// Number of association rows inserted.
    pub tag_count: usize,
}

/// Step-local failure, turned into a [`QuoteWriteError`] once the failing
/// step is known.
enum StepError {
    Fields(Vec<FieldError>),
    Db(DbError),
}

impl StepError {
    fn into_write_error(self, step: WriteStep, completed: &[WriteStep]) -> QuoteWriteError {
        match self {
            Self::Fields(errors) => QuoteWriteError::Aborted(WriteFailure {
                step,
                errors,
                completed: completed.to_vec(),
            }),
            Self::Db(error) => QuoteWriteError::Storage {
                step: Some(step),
                error,
            },
        }
    }
}

impl From<rusqlite::Error> for StepError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One quote write: input plus the timestamp shared by every row it writes.
pub struct QuoteWriteTransaction<'a> {
    input: &'a CreateQuoteInput,
    now_ms: i64,
}

impl<'a> QuoteWriteTransaction<'a> {
    /// Prepares a write stamped with the current time.
    pub fn new(input: &'a CreateQuoteInput) -> Self {
        Self::at(input, Utc::now().timestamp_millis())
    }

    /// Prepares a write stamped with `now_ms` (epoch milliseconds).
    pub fn at(input: &'a CreateQuoteInput, now_ms: i64) -> Self {
        Self { input, now_ms }
    }

    /// Runs every pipeline step in one immediate transaction and commits.
    pub fn execute(&self, conn: &mut Connection) -> Result<CreatedQuote, QuoteWriteError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut completed = Vec::with_capacity(WriteStep::PIPELINE.len());

        let quote = self
            .insert_quote(&tx)
            .map_err(|err| err.into_write_error(WriteStep::Quote, &completed))?;
        completed.push(WriteStep::Quote);

        let tag_count = self
            .insert_quote_tags(&tx, quote.id)
            .map_err(|err| err.into_write_error(WriteStep::QuoteTags, &completed))?;

        tx.commit()?;
        Ok(CreatedQuote { quote, tag_count })
    }

    fn insert_quote(&self, tx: &Transaction<'_>) -> Result<Quote, StepError> {
        let input = self.input;
        let invalid = input.validation_errors();
        if !invalid.is_empty() {
            return Err(StepError::Fields(
                invalid.iter().map(FieldError::from).collect(),
            ));
        }

        let inserted = tx.execute(
            "INSERT INTO quotes (
                text,
                date,
                page_start,
                page_end,
                volume,
                issue,
                extras,
                source_id,
                inserted_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9);",
            params![
                input.text.as_str(),
                input.date,
                input.page_start,
                input.page_end,
                input.volume.as_deref(),
                input.issue.as_deref(),
                input.extras.as_deref(),
                input.source_id,
                self.now_ms,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_foreign_key_violation(&err) => {
                return Err(StepError::Fields(vec![FieldError::foreign_key(
                    "source_id",
                    format!("source {} does not exist", input.source_id),
                )]));
            }
            Err(err) => return Err(err.into()),
        }

        Ok(Quote {
            id: tx.last_insert_rowid(),
            text: input.text.clone(),
            date: input.date,
            page_start: input.page_start,
            page_end: input.page_end,
            volume: input.volume.clone(),
            issue: input.issue.clone(),
            extras: input.extras.clone(),
            source_id: input.source_id,
            inserted_at: self.now_ms,
            updated_at: self.now_ms,
        })
    }

    fn insert_quote_tags(
        &self,
        tx: &Transaction<'_>,
        quote_id: QuoteId,
    ) -> Result<usize, StepError> {
        let tag_ids = parse_tag_ids(&self.input.tags).map_err(StepError::Fields)?;
        if tag_ids.is_empty() {
            return Ok(0);
        }

        let mut bind_values = Vec::with_capacity(tag_ids.len() + 2);
        bind_values.push(Value::Integer(quote_id));
        bind_values.push(Value::Integer(self.now_ms));
        bind_values.extend(tag_ids.iter().map(|tag_id| Value::Integer(*tag_id)));

        match tx.execute(
            &bulk_insert_quote_tags_sql(tag_ids.len()),
            params_from_iter(bind_values),
        ) {
            Ok(inserted) => Ok(inserted),
            Err(err) if is_foreign_key_violation(&err) => {
                let missing = missing_tag_ids(tx, &tag_ids)?;
                Err(StepError::Fields(missing_tag_errors(&missing)))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Parses wire tag ids, dropping repeats while keeping first-seen order.
///
/// Every unparseable element is reported, not only the first. More than
/// [`MAX_TAGS_PER_QUOTE`] distinct ids is one validation error.
pub fn parse_tag_ids(raw_tags: &[String]) -> Result<Vec<TagId>, Vec<FieldError>> {
    let mut seen = BTreeSet::new();
    let mut tag_ids = Vec::with_capacity(raw_tags.len());
    let mut errors = Vec::new();

    for raw in raw_tags {
        match raw.trim().parse::<TagId>() {
            Ok(tag_id) => {
                if seen.insert(tag_id) {
                    tag_ids.push(tag_id);
                }
            }
            Err(_) => errors.push(FieldError::validation(
                "tags",
                format!("`{raw}` is not a valid tag id"),
            )),
        }
    }

    if errors.is_empty() && tag_ids.len() > MAX_TAGS_PER_QUOTE {
        errors.push(FieldError::validation(
            "tags",
            format!(
                "at most {MAX_TAGS_PER_QUOTE} tags can be attached to one quote, got {}",
                tag_ids.len()
            ),
        ));
    }

    if errors.is_empty() {
        Ok(tag_ids)
    } else {
        Err(errors)
    }
}

/// `?1` is the quote id, `?2` the shared timestamp, `?3..` the tag ids.
fn bulk_insert_quote_tags_sql(tag_count: usize) -> String {
    let rows = (0..tag_count)
        .map(|idx| format!("(?1, ?{}, ?2, ?2)", idx + 3))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO quote_tags (quote_id, tag_id, inserted_at, updated_at) VALUES {rows};")
}

fn missing_tag_ids(tx: &Transaction<'_>, tag_ids: &[TagId]) -> Result<Vec<TagId>, StepError> {
    let placeholders = vec!["?"; tag_ids.len()].join(", ");
    let mut stmt = tx.prepare(&format!(
        "SELECT id FROM tags WHERE id IN ({placeholders});"
    ))?;
    let existing = stmt
        .query_map(params_from_iter(tag_ids.iter()), |row| row.get::<_, TagId>(0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;

    Ok(tag_ids
        .iter()
        .copied()
        .filter(|tag_id| !existing.contains(tag_id))
        .collect())
}

fn missing_tag_errors(missing: &[TagId]) -> Vec<FieldError> {
    if missing.is_empty() {
        return vec![FieldError::foreign_key(
            "tags",
            "references a tag that does not exist",
        )];
    }
    missing
        .iter()
        .map(|tag_id| FieldError::foreign_key("tags", format!("tag {tag_id} does not exist")))
        .collect()
}
