//! Quote repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide quote reads (single, filtered list, attached tags).
//! - Route quote creation through [`QuoteWriteTransaction`].
//!
//! # Invariants
//! - Quotes are created only together with their tag associations.
//! - List order is `id ASC`.

use crate::model::catalog::{SourceId, Tag};
use crate::model::quote::{CreateQuoteInput, Quote, QuoteId};
use crate::repo::quote_write::{CreatedQuote, QuoteWriteError, QuoteWriteTransaction};
use crate::repo::{ensure_tables_ready, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

const QUOTE_SELECT_SQL: &str = "SELECT
    q.id AS id,
    q.text AS text,
    q.date AS date,
    q.page_start AS page_start,
    q.page_end AS page_end,
    q.volume AS volume,
    q.issue AS issue,
    q.extras AS extras,
    q.source_id AS source_id,
    q.inserted_at AS inserted_at,
    q.updated_at AS updated_at
FROM quotes q";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "quotes",
        &[
            "id",
            "text",
            "date",
            "page_start",
            "page_end",
            "volume",
            "issue",
            "extras",
            "source_id",
            "inserted_at",
            "updated_at",
        ],
    ),
    (
        "quote_tags",
        &["quote_id", "tag_id", "inserted_at", "updated_at"],
    ),
    ("sources", &["id"]),
    ("tags", &["id", "text"]),
];

/// Filter for quote list reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    /// Only quotes belonging to this source. `None` returns every quote.
    pub source: Option<SourceId>,
}

impl QuoteFilter {
    pub fn by_source(source: SourceId) -> Self {
        Self {
            source: Some(source),
        }
    }
}

/// Repository interface for quote operations.
pub trait QuoteRepository {
    /// Atomically creates one quote and all of its tag associations.
    fn create_with_tags(
        &mut self,
        input: &CreateQuoteInput,
    ) -> Result<CreatedQuote, QuoteWriteError>;
    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>>;
    fn list_quotes(&self, filter: &QuoteFilter) -> RepoResult<Vec<Quote>>;
    /// Returns the tags attached to one quote, ordered by tag id.
    fn list_quote_tags(&self, quote_id: QuoteId) -> RepoResult<Vec<Tag>>;
}

/// SQLite-backed quote repository.
pub struct SqliteQuoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteQuoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, REQUIRED_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl QuoteRepository for SqliteQuoteRepository<'_> {
    fn create_with_tags(
        &mut self,
        input: &CreateQuoteInput,
    ) -> Result<CreatedQuote, QuoteWriteError> {
        QuoteWriteTransaction::new(input).execute(self.conn)
    }

    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>> {
        let quote = self
            .conn
            .query_row(
                &format!("{QUOTE_SELECT_SQL} WHERE q.id = ?1;"),
                [id],
                parse_quote_row,
            )
            .optional()?;
        Ok(quote)
    }

    fn list_quotes(&self, filter: &QuoteFilter) -> RepoResult<Vec<Quote>> {
        let mut sql = String::from(QUOTE_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(source_id) = filter.source {
            sql.push_str(" INNER JOIN sources s ON s.id = q.source_id WHERE s.id = ?");
            bind_values.push(Value::Integer(source_id));
        }
        sql.push_str(" ORDER BY q.id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let quotes = stmt
            .query_map(params_from_iter(bind_values), parse_quote_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(quotes)
    }

    fn list_quote_tags(&self, quote_id: QuoteId) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id AS id, t.text AS text
             FROM quote_tags qt
             INNER JOIN tags t ON t.id = qt.tag_id
             WHERE qt.quote_id = ?1
             ORDER BY t.id ASC;",
        )?;
        let tags = stmt
            .query_map([quote_id], |row| {
                Ok(Tag {
                    id: row.get("id")?,
                    text: row.get("text")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

fn parse_quote_row(row: &Row<'_>) -> rusqlite::Result<Quote> {
    Ok(Quote {
        id: row.get("id")?,
        text: row.get("text")?,
        date: row.get("date")?,
        page_start: row.get("page_start")?,
        page_end: row.get("page_end")?,
        volume: row.get("volume")?,
        issue: row.get("issue")?,
        extras: row.get("extras")?,
        source_id: row.get("source_id")?,
        inserted_at: row.get("inserted_at")?,
        updated_at: row.get("updated_at")?,
    })
}
