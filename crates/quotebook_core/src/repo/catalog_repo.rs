//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and read the records quotes point at: source types, sources
//!   and tags.
//!
//! # Invariants
//! - Tag text and source type names are trimmed and must not be blank.
//! - Uniqueness and references are enforced by storage constraints and
//!   surfaced as `RepoError::Duplicate` / `RepoError::ForeignKey`.

use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::model::catalog::{
    CatalogValidationError, NewSource, Source, SourceId, SourceType, Tag,
};
use crate::model::quote::normalize_optional_text;
use crate::repo::{ensure_tables_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("source_types", &["id", "name"]),
    (
        "sources",
        &["id", "author", "topic", "publication", "url", "source_type_id"],
    ),
    ("tags", &["id", "text"]),
];

/// Repository interface for catalog records.
pub trait CatalogRepository {
    fn create_source_type(&self, name: &str) -> RepoResult<SourceType>;
    fn create_source(&self, source: &NewSource) -> RepoResult<Source>;
    fn get_source(&self, id: SourceId) -> RepoResult<Option<Source>>;
    fn list_sources(&self) -> RepoResult<Vec<Source>>;
    fn create_tag(&self, text: &str) -> RepoResult<Tag>;
    /// Returns all tags ordered by id.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, REQUIRED_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_source_type(&self, name: &str) -> RepoResult<SourceType> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogValidationError::BlankSourceTypeName.into());
        }

        self.conn
            .execute("INSERT INTO source_types (name) VALUES (?1);", [name])
            .map_err(|err| map_constraint_error(err, "source_type", "name"))?;

        Ok(SourceType {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn create_source(&self, source: &NewSource) -> RepoResult<Source> {
        let author = normalize_optional_text(source.author.clone());
        let topic = normalize_optional_text(source.topic.clone());
        let publication = normalize_optional_text(source.publication.clone());
        let url = normalize_optional_text(source.url.clone());

        self.conn
            .execute(
                "INSERT INTO sources (author, topic, publication, url, source_type_id)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![author, topic, publication, url, source.source_type_id],
            )
            .map_err(|err| map_constraint_error(err, "source", "source_type_id"))?;

        Ok(Source {
            id: self.conn.last_insert_rowid(),
            author,
            topic,
            publication,
            url,
            source_type_id: source.source_type_id,
        })
    }

    fn get_source(&self, id: SourceId) -> RepoResult<Option<Source>> {
        let source = self
            .conn
            .query_row(
                "SELECT id, author, topic, publication, url, source_type_id
                 FROM sources
                 WHERE id = ?1;",
                [id],
                parse_source_row,
            )
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> RepoResult<Vec<Source>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, author, topic, publication, url, source_type_id
             FROM sources
             ORDER BY id ASC;",
        )?;
        let sources = stmt
            .query_map([], parse_source_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sources)
    }

    fn create_tag(&self, text: &str) -> RepoResult<Tag> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CatalogValidationError::BlankTagText.into());
        }

        self.conn
            .execute("INSERT INTO tags (text) VALUES (?1);", [text])
            .map_err(|err| map_constraint_error(err, "tag", "text"))?;

        Ok(Tag {
            id: self.conn.last_insert_rowid(),
            text: text.to_string(),
        })
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, text FROM tags ORDER BY id ASC;")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get("id")?,
                    text: row.get("text")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

fn parse_source_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get("id")?,
        author: row.get("author")?,
        topic: row.get("topic")?,
        publication: row.get("publication")?,
        url: row.get("url")?,
        source_type_id: row.get("source_type_id")?,
    })
}

fn map_constraint_error(
    err: rusqlite::Error,
    entity: &'static str,
    field: &'static str,
) -> RepoError {
    if is_unique_violation(&err) {
        return RepoError::Duplicate { entity, field };
    }
    if is_foreign_key_violation(&err) {
        return RepoError::ForeignKey { entity, field };
    }
    err.into()
}
