//! Use-case API for resolver-facing calls.
//!
//! # Responsibility
//! - Map camelCase request types onto core quote services and search.
//! - Flatten every failure into an [`ApiError`] envelope.
//!
//! # Invariants
//! - Operations never panic; failures are returned, not thrown.
//! - Search configuration is checked when the resolver is opened, never
//!   lazily on the first search.
//!
//! # See also
//! - `quotebook_core::QuoteWriteTransaction` for the atomic write contract.

use crate::error::{ApiError, ApiErrorCode};
use chrono::NaiveDate;
use log::{error, warn};
use quotebook_core::db::{open_db, open_db_in_memory};
use quotebook_core::{
    CatalogRepository, CreateQuoteInput, NewSource, Quote, QuoteFilter, QuoteService,
    SearchAggregator, SearchResultSet, Source, SourceType, SqliteCatalogRepository,
    SqliteQuoteRepository, Tag,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DEFAULT_DB_FILE_NAME: &str = "quotebook.sqlite3";
static DEFAULT_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// `createQuote` input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub text: String,
    pub source_id: i64,
    /// Tag ids in wire (string) form.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub page_start: Option<i64>,
    #[serde(default)]
    pub page_end: Option<i64>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub extras: Option<String>,
}

impl From<CreateQuoteRequest> for CreateQuoteInput {
    fn from(value: CreateQuoteRequest) -> Self {
        Self {
            text: value.text,
            source_id: value.source_id,
            tags: value.tags,
            date: value.date,
            page_start: value.page_start,
            page_end: value.page_end,
            volume: value.volume,
            issue: value.issue,
            extras: value.extras,
        }
    }
}

/// `quotes(filter:)` input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFilterRequest {
    #[serde(default)]
    pub source: Option<i64>,
}

/// Quote as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePayload {
    pub id: i64,
    pub text: String,
    pub date: Option<NaiveDate>,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub extras: Option<String>,
    pub source_id: i64,
    pub inserted_at: i64,
    pub updated_at: i64,
}

impl From<Quote> for QuotePayload {
    fn from(value: Quote) -> Self {
        Self {
            id: value.id,
            text: value.text,
            date: value.date,
            page_start: value.page_start,
            page_end: value.page_end,
            volume: value.volume,
            issue: value.issue,
            extras: value.extras,
            source_id: value.source_id,
            inserted_at: value.inserted_at,
            updated_at: value.updated_at,
        }
    }
}

/// `quoteFullSearch` result: `{quotes, sources, tags, sourceTypes}`.
pub type SearchPayload = SearchResultSet;

/// `createSource` input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSourceRequest {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub publication: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source_type_id: Option<i64>,
}

/// Resolver over one catalog connection.
pub struct Resolver {
    conn: Connection,
}

impl Resolver {
    /// Opens (and migrates) the catalog at `path`.
    ///
    /// # Errors
    /// - `storage_error` when the database cannot be opened or migrated.
    /// - `search_configuration` when the schema lacks a searchable column.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        Self::from_connection(open_db(path)?)
    }

    /// Opens the catalog at [`resolve_db_path`].
    pub fn open_default() -> Result<Self, ApiError> {
        Self::open(resolve_db_path())
    }

    /// Opens a private in-memory catalog.
    pub fn open_in_memory() -> Result<Self, ApiError> {
        Self::from_connection(open_db_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ApiError> {
        SearchAggregator::try_new(&conn)?;
        Ok(Self { conn })
    }

    /// `createQuote`: creates one quote and its tag associations atomically.
    pub fn create_quote(
        &mut self,
        request: CreateQuoteRequest,
    ) -> Result<QuotePayload, ApiError> {
        let repo = SqliteQuoteRepository::try_new(&mut self.conn)?;
        let mut service = QuoteService::new(repo);
        service
            .create_with_tags(request.into())
            .map(|created| created.quote.into())
            .map_err(|err| rejected("create_quote", err.into()))
    }

    /// `quotes(filter:)`: every quote, or only those of `filter.source`.
    pub fn quotes(
        &mut self,
        filter: QuoteFilterRequest,
    ) -> Result<Vec<QuotePayload>, ApiError> {
        let repo = SqliteQuoteRepository::try_new(&mut self.conn)?;
        let service = QuoteService::new(repo);
        let quotes = service
            .get_quotes_by(filter.source.map(QuoteFilter::by_source))
            .map_err(|err| rejected("quotes", err.into()))?;
        Ok(quotes.into_iter().map(QuotePayload::from).collect())
    }

    /// `quoteFullSearch(text)`: federated substring search.
    pub fn quote_full_search(&self, text: &str) -> Result<SearchPayload, ApiError> {
        let aggregator = SearchAggregator::try_new(&self.conn)?;
        aggregator
            .search(text)
            .map_err(|err| rejected("quote_full_search", err.into()))
    }

    pub fn create_source_type(&self, name: &str) -> Result<SourceType, ApiError> {
        let catalog = SqliteCatalogRepository::try_new(&self.conn)?;
        catalog
            .create_source_type(name)
            .map_err(|err| rejected("create_source_type", err.into()))
    }

    pub fn create_source(&self, request: CreateSourceRequest) -> Result<Source, ApiError> {
        let catalog = SqliteCatalogRepository::try_new(&self.conn)?;
        let source = NewSource {
            author: request.author,
            topic: request.topic,
            publication: request.publication,
            url: request.url,
            source_type_id: request.source_type_id,
        };
        catalog
            .create_source(&source)
            .map_err(|err| rejected("create_source", err.into()))
    }

    pub fn create_tag(&self, text: &str) -> Result<Tag, ApiError> {
        let catalog = SqliteCatalogRepository::try_new(&self.conn)?;
        catalog
            .create_tag(text)
            .map_err(|err| rejected("create_tag", err.into()))
    }
}

/// Parses a GraphQL-style string id into a numeric id.
pub fn parse_id(field: &str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::invalid_request(field, format!("`{raw}` is not a valid id")))
}

/// Resolves the default database path.
///
/// `QUOTEBOOK_DB_PATH` wins when set and non-blank; otherwise the file lives
/// in the system temp directory. Resolved once per process.
pub fn resolve_db_path() -> PathBuf {
    DEFAULT_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("QUOTEBOOK_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
        })
        .clone()
}

fn rejected(op: &str, rejection: ApiError) -> ApiError {
    if rejection.code == ApiErrorCode::StorageError {
        error!("event=api_request module=api status=error op={op} error={rejection}");
    } else {
        let fields = rejection.fields.keys().cloned().collect::<Vec<_>>();
        warn!(
            "event=api_request module=api status=error op={op} code={} fields={}",
            rejection.code.as_str(),
            fields.join(",")
        );
    }
    rejection
}

#[cfg(test)]
mod tests {
    use super::{
        parse_id, resolve_db_path, CreateQuoteRequest, CreateSourceRequest, QuoteFilterRequest,
        Resolver,
    };
    use crate::error::ApiErrorCode;
    use quotebook_core::{SearchColumn, SearchSource, WriteStep};

    struct Fixture {
        resolver: Resolver,
        source_id: i64,
        other_source_id: i64,
        tag_ids: Vec<String>,
    }

    fn fixture() -> Fixture {
        let resolver = Resolver::open_in_memory().unwrap();
        let book = resolver.create_source_type("Book").unwrap();
        let source = resolver
            .create_source(CreateSourceRequest {
                author: Some("T. B. Reed".to_string()),
                publication: Some(
                    "Handbook of Biomass Downdraft Gasifier Engine Systems".to_string(),
                ),
                source_type_id: Some(book.id),
                ..CreateSourceRequest::default()
            })
            .unwrap();
        let other = resolver
            .create_source(CreateSourceRequest {
                author: Some("A. Kaupp".to_string()),
                source_type_id: Some(book.id),
                ..CreateSourceRequest::default()
            })
            .unwrap();
        let tag_ids = ["energy", "biomass", "Disadvantage of downdraft gasifier"]
            .into_iter()
            .map(|text| resolver.create_tag(text).unwrap().id.to_string())
            .collect();

        Fixture {
            resolver,
            source_id: source.id,
            other_source_id: other.id,
            tag_ids,
        }
    }

    #[test]
    fn create_quote_accepts_camel_case_json() {
        let mut fx = fixture();
        let request: CreateQuoteRequest = serde_json::from_value(serde_json::json!({
            "text": "Downdraft gasifiers need low-moisture fuel.",
            "sourceId": fx.source_id,
            "tags": fx.tag_ids,
            "pageStart": 10,
            "pageEnd": 11,
            "date": "1988-01-01"
        }))
        .unwrap();

        let quote = fx.resolver.create_quote(request).unwrap();
        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["sourceId"], fx.source_id);
        assert_eq!(json["pageEnd"], 11);
        assert_eq!(json["date"], "1988-01-01");
    }

    #[test]
    fn create_quote_with_unknown_tag_reports_step_and_field() {
        let mut fx = fixture();
        let request = CreateQuoteRequest {
            text: "Never stored".to_string(),
            source_id: fx.source_id,
            tags: vec![fx.tag_ids[0].clone(), "9999".to_string()],
            ..CreateQuoteRequest::default()
        };

        let error = fx.resolver.create_quote(request).unwrap_err();
        assert_eq!(error.code, ApiErrorCode::ForeignKeyViolation);
        assert_eq!(error.step, Some(WriteStep::QuoteTags));
        assert_eq!(error.fields["tags"], vec!["tag 9999 does not exist".to_string()]);
        assert!(fx
            .resolver
            .quotes(QuoteFilterRequest::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn create_quote_with_blank_text_is_a_validation_failure() {
        let mut fx = fixture();
        let request = CreateQuoteRequest {
            text: "   ".to_string(),
            source_id: fx.source_id,
            ..CreateQuoteRequest::default()
        };

        let error = fx.resolver.create_quote(request).unwrap_err();
        assert_eq!(error.code, ApiErrorCode::ValidationFailed);
        assert_eq!(error.step, Some(WriteStep::Quote));
        assert!(error.fields.contains_key("text"));
    }

    #[test]
    fn quotes_filter_by_source() {
        let mut fx = fixture();
        for (text, source_id) in [
            ("one", fx.source_id),
            ("two", fx.other_source_id),
            ("three", fx.source_id),
        ] {
            fx.resolver
                .create_quote(CreateQuoteRequest {
                    text: text.to_string(),
                    source_id,
                    ..CreateQuoteRequest::default()
                })
                .unwrap();
        }

        let all = fx.resolver.quotes(QuoteFilterRequest::default()).unwrap();
        assert_eq!(all.len(), 3);

        let filter: QuoteFilterRequest =
            serde_json::from_str(&format!("{{\"source\": {}}}", fx.source_id)).unwrap();
        let filtered = fx.resolver.quotes(filter).unwrap();
        assert_eq!(
            filtered.iter().map(|quote| quote.text.as_str()).collect::<Vec<_>>(),
            vec!["one", "three"]
        );
    }

    #[test]
    fn quote_full_search_serializes_all_buckets() {
        let fx = fixture();

        let result = fx.resolver.quote_full_search("downdraft").unwrap();
        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.tags[0].source, SearchSource::Tags);
        assert_eq!(result.tags[0].column, SearchColumn::Text);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].column, SearchColumn::Publication);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["tags"][0]["source"], "TAGS");
        assert_eq!(json["sources"][0]["source"], "SOURCES");
        assert!(json["quotes"].as_array().unwrap().is_empty());
        assert!(json["sourceTypes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn duplicate_tag_is_rejected_with_field() {
        let fx = fixture();
        let error = fx.resolver.create_tag("energy").unwrap_err();
        assert_eq!(error.code, ApiErrorCode::ValidationFailed);
        assert!(error.fields.contains_key("text"));
    }

    #[test]
    fn open_migrates_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        {
            let resolver = Resolver::open(&path).unwrap();
            resolver.create_tag("persisted").unwrap();
        }
        let reopened = Resolver::open(&path).unwrap();
        assert_eq!(reopened.quote_full_search("persist").unwrap().tags.len(), 1);
    }

    #[test]
    fn open_default_uses_configured_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.sqlite3");
        std::env::set_var("QUOTEBOOK_DB_PATH", &path);

        assert_eq!(resolve_db_path(), path);
        Resolver::open_default()
            .unwrap()
            .create_tag("from default")
            .unwrap();

        let reopened = Resolver::open(&path).unwrap();
        assert_eq!(reopened.quote_full_search("default").unwrap().tags.len(), 1);
    }

    #[test]
    fn parse_id_rejects_non_numeric_input() {
        assert_eq!(parse_id("source", " 42 ").unwrap(), 42);
        let error = parse_id("source", "abc").unwrap_err();
        assert_eq!(error.code, ApiErrorCode::InvalidRequest);
        assert!(error.fields.contains_key("source"));
    }
}
