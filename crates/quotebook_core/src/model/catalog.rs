//! Catalog records referenced by quotes.
//!
//! Tags, sources and source types are created independently of quotes and
//! are never mutated by the quote write path.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TagId = i64;
pub type SourceId = i64;
pub type SourceTypeId = i64;

/// Topical label attached to quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Unique label text.
    pub text: String,
}

/// Kind of originating work (book, journal, website, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceType {
    pub id: SourceTypeId,
    pub name: String,
}

/// Originating work a quote was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub author: Option<String>,
    pub topic: Option<String>,
    pub publication: Option<String>,
    pub url: Option<String>,
    pub source_type_id: Option<SourceTypeId>,
}

/// Input for creating one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    pub author: Option<String>,
    pub topic: Option<String>,
    pub publication: Option<String>,
    pub url: Option<String>,
    pub source_type_id: Option<SourceTypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    BlankTagText,
    BlankSourceTypeName,
}

impl CatalogValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankTagText => "text",
            Self::BlankSourceTypeName => "name",
        }
    }
}

impl Display for CatalogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTagText => write!(f, "tag text can't be blank"),
            Self::BlankSourceTypeName => write!(f, "source type name can't be blank"),
        }
    }
}

impl Error for CatalogValidationError {}
