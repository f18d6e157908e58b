//! Boundary error envelope.
//!
//! Every core error is flattened into one serializable shape with a stable
//! machine-readable `code`. Field maps are keyed by input field name.

use quotebook_core::db::DbError;
use quotebook_core::{
    FieldErrorKind, QuoteWriteError, RepoError, SearchError, WriteFailure, WriteStep,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    ValidationFailed,
    ForeignKeyViolation,
    StorageError,
    SearchConfiguration,
    InvalidRequest,
}

impl ApiErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::StorageError => "storage_error",
            Self::SearchConfiguration => "search_configuration",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

/// Error envelope returned by every [`crate::Resolver`] operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    /// Failing write step, for aborted quote writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<WriteStep>,
    /// Field name -> messages.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            step: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn invalid_request(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut error = Self::new(ApiErrorCode::InvalidRequest, format!("{field}: {message}"));
        error.fields.insert(field.to_string(), vec![message]);
        error
    }

    fn with_field(mut self, field: &str, message: impl Into<String>) -> Self {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
        self
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl Error for ApiError {}

impl From<WriteFailure> for ApiError {
    fn from(failure: WriteFailure) -> Self {
        let code = if failure
            .errors
            .iter()
            .any(|error| error.kind == FieldErrorKind::ForeignKey)
        {
            ApiErrorCode::ForeignKeyViolation
        } else {
            ApiErrorCode::ValidationFailed
        };
        let fields = failure
            .error_map()
            .into_iter()
            .map(|(field, messages)| (field.to_string(), messages))
            .collect();

        Self {
            code,
            message: failure.to_string(),
            step: Some(failure.step),
            fields,
        }
    }
}

impl From<QuoteWriteError> for ApiError {
    fn from(value: QuoteWriteError) -> Self {
        match value {
            QuoteWriteError::Aborted(failure) => failure.into(),
            QuoteWriteError::Storage { step, error } => Self {
                step,
                ..Self::new(ApiErrorCode::StorageError, error.to_string())
            },
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        let message = value.to_string();
        match value {
            RepoError::Validation(err) => Self::new(ApiErrorCode::ValidationFailed, &message)
                .with_field(err.field(), err.to_string()),
            RepoError::Duplicate { field, .. } => {
                Self::new(ApiErrorCode::ValidationFailed, &message)
                    .with_field(field, "has already been taken")
            }
            RepoError::ForeignKey { field, .. } => {
                Self::new(ApiErrorCode::ForeignKeyViolation, &message)
                    .with_field(field, "does not reference an existing row")
            }
            _ => Self::new(ApiErrorCode::StorageError, message),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(value: SearchError) -> Self {
        let code = match value {
            SearchError::Configuration(_) => ApiErrorCode::SearchConfiguration,
            SearchError::Db(_) | SearchError::InvalidData(_) => ApiErrorCode::StorageError,
        };
        Self::new(code, value.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        Self::new(ApiErrorCode::StorageError, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, ApiErrorCode};
    use quotebook_core::{FieldError, RepoError, SearchError, WriteFailure, WriteStep};

    #[test]
    fn aborted_write_keeps_step_and_field_map() {
        let failure = WriteFailure {
            step: WriteStep::QuoteTags,
            errors: vec![
                FieldError::foreign_key("tags", "tag 12 does not exist"),
                FieldError::validation("tags", "`x` is not a valid tag id"),
            ],
            completed: vec![WriteStep::Quote],
        };

        let error = ApiError::from(failure);
        assert_eq!(error.code, ApiErrorCode::ForeignKeyViolation);
        assert_eq!(error.step, Some(WriteStep::QuoteTags));
        assert_eq!(error.fields["tags"].len(), 2);

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "foreign_key_violation");
        assert_eq!(json["step"], "quote_tags");
    }

    #[test]
    fn search_configuration_has_its_own_code() {
        let error = ApiError::from(SearchError::Configuration("no tables".to_string()));
        assert_eq!(error.code, ApiErrorCode::SearchConfiguration);
        assert!(error.to_string().starts_with("[search_configuration]"));
    }

    #[test]
    fn duplicate_catalog_value_is_a_validation_failure() {
        let error = ApiError::from(RepoError::Duplicate {
            entity: "tag",
            field: "text",
        });
        assert_eq!(error.code, ApiErrorCode::ValidationFailed);
        assert_eq!(error.fields["text"], vec!["has already been taken".to_string()]);
        let json = serde_json::to_value(&error).unwrap();
        assert!(json.get("step").is_none());
    }
}
