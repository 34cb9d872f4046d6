use thiserror::Error;

/// Failures surfaced while fetching, parsing or validating a game document.
///
/// Any of these prevents a [`NavigationState`](crate::NavigationState) from
/// being created for the requested document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document `{id}` was not found")]
    DocumentNotFound { id: String },

    #[error("document `{id}` could not be fetched: {message}")]
    Unavailable { id: String, message: String },

    #[error("document is malformed: {reason}")]
    DocumentMalformed { reason: String },

    #[error("formatting rule `{pattern}` is not a valid pattern: {source}")]
    FormatterInputInvalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl LoadError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        LoadError::DocumentMalformed {
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        LoadError::DocumentNotFound { id: id.into() }
    }

    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::DocumentNotFound { .. } => LoadErrorKind::DocumentNotFound,
            LoadError::Unavailable { .. } => LoadErrorKind::Unavailable,
            LoadError::DocumentMalformed { .. } => LoadErrorKind::DocumentMalformed,
            LoadError::FormatterInputInvalid { .. } => LoadErrorKind::FormatterInputInvalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    DocumentNotFound,
    Unavailable,
    DocumentMalformed,
    FormatterInputInvalid,
}

/// Rejected navigation requests. Callers are expected to ignore these; the
/// navigation state is never modified when one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("index {index} is out of range for tab `{tab}` ({len} items)")]
    OutOfRange { tab: String, index: usize, len: usize },
}
