//! Federated substring search across quotes, sources, tags and source types.
//!
//! # Responsibility
//! - Union one `LIKE` sub-query per searchable (table, column) pair into a
//!   single statement and run it in one round trip.
//! - Group the typed rows by origin table.
//!
//! # Invariants
//! - The searchable columns are a compile-time mapping; no table or column
//!   name is built from user input.
//! - Matching is a literal substring check after Unicode lowercasing of both
//!   the stored value and the query (`casefold`).
//! - Every bucket of [`SearchResultSet`] is present, empty when nothing
//!   matched. An empty match set is not an error.

use crate::db::DbError;
use crate::repo::{table_exists, table_has_column};
use log::{error, info};
use once_cell::sync::Lazy;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error.
#[derive(Debug)]
pub enum SearchError {
    /// The static table/column mapping is malformed or does not match the
    /// live schema. Raised only when an aggregator is constructed.
    Configuration(String),
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "invalid search configuration: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Configuration(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Origin table of a search row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchSource {
    Quotes,
    Sources,
    SourceTypes,
    Tags,
}

impl SearchSource {
    /// Every searchable table, in query order.
    pub const ALL: [SearchSource; 4] = [
        SearchSource::Quotes,
        SearchSource::Sources,
        SearchSource::Tags,
        SearchSource::SourceTypes,
    ];

    pub const fn table(self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Sources => "sources",
            Self::SourceTypes => "source_types",
            Self::Tags => "tags",
        }
    }

    /// Searchable text columns of this table.
    pub const fn columns(self) -> &'static [SearchColumn] {
        match self {
            Self::Quotes => &[
                SearchColumn::Text,
                SearchColumn::Volume,
                SearchColumn::Issue,
                SearchColumn::Extras,
            ],
            Self::Sources => &[
                SearchColumn::Author,
                SearchColumn::Topic,
                SearchColumn::Publication,
                SearchColumn::Url,
            ],
            Self::Tags => &[SearchColumn::Text],
            Self::SourceTypes => &[SearchColumn::Name],
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|source| source.table() == table)
    }
}

/// Column whose value matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchColumn {
    Text,
    Volume,
    Issue,
    Extras,
    Author,
    Topic,
    Publication,
    Url,
    Name,
}

impl SearchColumn {
    const ALL: [SearchColumn; 9] = [
        SearchColumn::Text,
        SearchColumn::Volume,
        SearchColumn::Issue,
        SearchColumn::Extras,
        SearchColumn::Author,
        SearchColumn::Topic,
        SearchColumn::Publication,
        SearchColumn::Url,
        SearchColumn::Name,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Volume => "volume",
            Self::Issue => "issue",
            Self::Extras => "extras",
            Self::Author => "author",
            Self::Topic => "topic",
            Self::Publication => "publication",
            Self::Url => "url",
            Self::Name => "name",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.name() == name)
    }
}

/// One matched field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultRow {
    /// Row id in the origin table.
    pub tid: i64,
    /// Full value of the matched field.
    pub text: String,
    pub source: SearchSource,
    pub column: SearchColumn,
}

/// Search rows grouped by origin table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    pub quotes: Vec<SearchResultRow>,
    pub sources: Vec<SearchResultRow>,
    pub tags: Vec<SearchResultRow>,
    pub source_types: Vec<SearchResultRow>,
}

impl SearchResultSet {
    /// Groups rows into their buckets, keeping input order within a bucket.
    pub fn from_rows(rows: impl IntoIterator<Item = SearchResultRow>) -> Self {
        let mut set = Self::default();
        for row in rows {
            set.bucket_mut(row.source).push(row);
        }
        set
    }

    pub fn bucket(&self, source: SearchSource) -> &[SearchResultRow] {
        match source {
            SearchSource::Quotes => &self.quotes,
            SearchSource::Sources => &self.sources,
            SearchSource::SourceTypes => &self.source_types,
            SearchSource::Tags => &self.tags,
        }
    }

    fn bucket_mut(&mut self, source: SearchSource) -> &mut Vec<SearchResultRow> {
        match source {
            SearchSource::Quotes => &mut self.quotes,
            SearchSource::Sources => &mut self.sources,
            SearchSource::SourceTypes => &mut self.source_types,
            SearchSource::Tags => &mut self.tags,
        }
    }

    /// Total number of rows across all buckets.
    pub fn len(&self) -> usize {
        SearchSource::ALL
            .iter()
            .map(|source| self.bucket(*source).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static FEDERATED_SEARCH_SQL: Lazy<String> = Lazy::new(build_federated_search_sql);

/// SQL scalar function lowercasing its argument with Unicode rules.
const CASEFOLD_FN: &str = "casefold";

/// Builds the union statement; `?1` is the escaped, case-folded pattern.
fn build_federated_search_sql() -> String {
    let sub_queries = SearchSource::ALL
        .iter()
        .flat_map(|source| {
            source.columns().iter().map(move |column| {
                format!(
                    "SELECT id AS tid, {column} AS text, '{table}' AS source, '{column}' AS matched_column
                     FROM {table}
                     WHERE {casefold}({column}) LIKE ?1 ESCAPE '\\'",
                    casefold = CASEFOLD_FN,
                    table = source.table(),
                    column = column.name(),
                )
            })
        })
        .collect::<Vec<_>>();

    format!(
        "{} ORDER BY source ASC, tid ASC, matched_column ASC;",
        sub_queries.join(" UNION ALL ")
    )
}

/// Lowercases `text` and wraps it in `%...%`, escaping `LIKE` wildcards so
/// they match literally.
pub fn like_pattern(text: &str) -> String {
    let folded = text.to_lowercase();
    let mut pattern = String::with_capacity(folded.len() + 2);
    pattern.push('%');
    for ch in folded.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Checks internal consistency of the static table/column mapping.
pub fn validate_search_config() -> SearchResult<()> {
    let mut tables = BTreeSet::new();
    for source in SearchSource::ALL {
        if !tables.insert(source.table()) {
            return Err(SearchError::Configuration(format!(
                "table `{}` is configured twice",
                source.table()
            )));
        }
        if SearchSource::from_table(source.table()) != Some(source) {
            return Err(SearchError::Configuration(format!(
                "table `{}` does not map back to its source",
                source.table()
            )));
        }

        let columns = source.columns();
        if columns.is_empty() {
            return Err(SearchError::Configuration(format!(
                "table `{}` has no searchable columns",
                source.table()
            )));
        }
        let mut seen = BTreeSet::new();
        for column in columns {
            if !seen.insert(*column) {
                return Err(SearchError::Configuration(format!(
                    "column `{}.{}` is configured twice",
                    source.table(),
                    column.name()
                )));
            }
            if SearchColumn::from_name(column.name()) != Some(*column) {
                return Err(SearchError::Configuration(format!(
                    "column `{}` does not map back to itself",
                    column.name()
                )));
            }
        }
    }
    Ok(())
}

/// Registers `casefold(text)` on `conn`; NULL stays NULL.
pub fn register_casefold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CASEFOLD_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        casefold,
    )
}

fn casefold(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let value: Option<String> = ctx.get(0)?;
    Ok(value.map(|text| text.to_lowercase()))
}

/// Checks that every configured table and column exists in `conn`.
pub fn ensure_search_schema(conn: &Connection) -> SearchResult<()> {
    for source in SearchSource::ALL {
        if !table_exists(conn, source.table())? {
            return Err(SearchError::Configuration(format!(
                "table `{}` does not exist",
                source.table()
            )));
        }
        for column in source.columns() {
            if !table_has_column(conn, source.table(), column.name())? {
                return Err(SearchError::Configuration(format!(
                    "column `{}.{}` does not exist",
                    source.table(),
                    column.name()
                )));
            }
        }
    }
    Ok(())
}

/// Runs federated searches against one connection.
pub struct SearchAggregator<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SearchAggregator<'conn> {
    /// Validates the search configuration against `conn`'s schema and
    /// registers the `casefold` function the search statement uses.
    pub fn try_new(conn: &'conn Connection) -> SearchResult<Self> {
        if let Err(err) = validate_search_config().and_then(|()| ensure_search_schema(conn)) {
            error!("event=search_config module=search status=error error={err}");
            return Err(err);
        }
        register_casefold(conn)?;
        Ok(Self { conn })
    }

    /// Returns every searchable value containing `text`, grouped by table.
    ///
    /// An empty `text` matches every non-null searchable value.
    pub fn search(&self, text: &str) -> SearchResult<SearchResultSet> {
        let started_at = Instant::now();
        let pattern = like_pattern(text);

        let mut stmt = self.conn.prepare_cached(FEDERATED_SEARCH_SQL.as_str())?;
        let mut rows = stmt.query([pattern.as_str()])?;
        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(parse_search_row(row)?);
        }

        let result = SearchResultSet::from_rows(parsed);
        info!(
            "event=quote_search module=search status=ok duration_ms={} query_chars={} quotes={} sources={} tags={} source_types={}",
            started_at.elapsed().as_millis(),
            text.chars().count(),
            result.quotes.len(),
            result.sources.len(),
            result.tags.len(),
            result.source_types.len()
        );
        Ok(result)
    }
}

/// Validates configuration, then searches in one call.
pub fn search_all(conn: &Connection, text: &str) -> SearchResult<SearchResultSet> {
    SearchAggregator::try_new(conn)?.search(text)
}

fn parse_search_row(row: &Row<'_>) -> SearchResult<SearchResultRow> {
    let table: String = row.get("source")?;
    let source = SearchSource::from_table(&table)
        .ok_or_else(|| SearchError::InvalidData(format!("unknown source table `{table}`")))?;

    let column_name: String = row.get("matched_column")?;
    let column = SearchColumn::from_name(&column_name)
        .ok_or_else(|| SearchError::InvalidData(format!("unknown column `{column_name}`")))?;

    Ok(SearchResultRow {
        tid: row.get("tid")?,
        text: row.get("text")?,
        source,
        column,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        build_federated_search_sql, like_pattern, validate_search_config, SearchColumn,
        SearchResultRow, SearchResultSet, SearchSource,
    };

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn like_pattern_lowercases_beyond_ascii() {
        assert_eq!(like_pattern("ÜBERDRUCK"), "%überdruck%");
        assert_eq!(like_pattern("Énergie"), "%énergie%");
    }

    #[test]
    fn static_config_is_consistent() {
        validate_search_config().expect("static search config should be valid");
    }

    #[test]
    fn union_has_one_sub_query_per_column() {
        let sql = build_federated_search_sql();
        let column_count: usize = SearchSource::ALL
            .iter()
            .map(|source| source.columns().len())
            .sum();
        assert_eq!(column_count, 10);
        assert_eq!(sql.matches("UNION ALL").count(), column_count - 1);
        assert!(sql.contains("'source_types' AS source"));
        assert!(sql.contains("'publication' AS matched_column"));
        assert!(sql.contains("casefold(author) LIKE ?1"));
    }

    #[test]
    fn result_set_groups_rows_and_keeps_empty_buckets() {
        let set = SearchResultSet::from_rows(vec![SearchResultRow {
            tid: 7,
            text: "gasifier".to_string(),
            source: SearchSource::Tags,
            column: SearchColumn::Text,
        }]);
        assert_eq!(set.tags.len(), 1);
        assert!(set.quotes.is_empty());
        assert!(set.sources.is_empty());
        assert!(set.source_types.is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn source_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&SearchSource::SourceTypes).unwrap();
        assert_eq!(json, "\"SOURCE_TYPES\"");
        let set = serde_json::to_value(SearchResultSet::default()).unwrap();
        assert!(set["sourceTypes"].as_array().unwrap().is_empty());
    }
}
