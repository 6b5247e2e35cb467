//! Error types for JSON:API mapping, include resolution, and document tooling.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON:API error object.
///
/// Doubles as the protocol-level error type: handlers construct it with an
/// HTTP status, and every internal failure converts into it with status 500.
#[derive(Debug, Clone, Default, PartialEq, Error, Serialize, Deserialize)]
#[error("jsonapi(status: {status}): {title}")]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub links: Map<String, Value>,
    /// HTTP status code, carried as a string on the wire.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(
        rename = "source",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ApiError {
    /// Create an error object with the given status and title.
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Attach a detail message.
    pub fn detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = detail.to_string();
        self
    }

    /// Attach a machine-readable application code.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attach the `source` member, e.g. `{"pointer": "/data/attributes/name"}`.
    pub fn with_source(mut self, origin: Value) -> Self {
        self.origin = Some(origin);
        self
    }

    /// 500 error whose title and detail are the display text of `err`.
    pub fn internal(err: &dyn fmt::Display) -> Self {
        let text = err.to_string();
        Self::new(500, text.clone()).detail(text)
    }

    /// Numeric status. Missing or unparseable statuses count as 0.
    pub fn status_code(&self) -> u16 {
        self.status.trim().parse().unwrap_or(0)
    }
}

/// Errors while converting a domain value into a resource object.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("{type_name} does not expose a resource identifier")]
    MissingIdentity { type_name: &'static str },

    #[error("{type_name} declares field #{index} but does not provide its value")]
    UnclassifiedField {
        type_name: &'static str,
        index: usize,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("cannot serialize attribute {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{message}")]
    Custom { message: String },
}

impl MarshalError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

/// Errors while populating a domain value from a resource object.
#[derive(Debug, Error)]
pub enum UnmarshalError {
    #[error("{type_name} cannot accept a resource identifier")]
    MissingIdentityAssignment { type_name: &'static str },

    #[error("attribute {path}: {source}")]
    Attribute {
        path: String,
        #[source]
        source: CoerceError,
    },

    #[error("shape mismatch at {path}: expected {expected}, got {actual}")]
    ShapeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid relationship: {name}")]
    InvalidRelationship { name: String },
}

/// Leaf coercion failures.
#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("cannot assign null to {expected}")]
    Null { expected: &'static str },

    #[error("expected {expected}, got {actual}")]
    Shape {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("\"{value}\" is not a valid {expected}")]
    Invalid {
        expected: &'static str,
        value: String,
    },

    #[error("cannot parse time \"{value}\": {source}")]
    Time {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Attribute path addressing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty attribute path")]
    Empty,

    #[error("invalid attribute path \"{path}\"")]
    Invalid { path: String },

    #[error("attribute {path} is not an object")]
    NotAnObject { path: String },

    #[error("attribute {path} is not an array")]
    NotAnArray { path: String },

    #[error("index {index} of attribute {path} skips past its length {len}")]
    IndexOutOfRange { path: String, index: usize, len: usize },
}

/// Errors during include resolution.
#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("resolving include \"{include}\" failed: {source}")]
    Resolver {
        include: String,
        #[source]
        source: ApiError,
    },

    #[error("relationship in include \"{include}\" has neither id nor lid")]
    MissingIdentity { include: String },

    #[error("include \"{include}\" names unknown relationship \"{segment}\"")]
    UnknownRelationship { include: String, segment: String },
}

impl IncludeError {
    /// HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            IncludeError::UnknownRelationship { .. } => 400,
            _ => 500,
        }
    }
}

/// Errors while decoding a wire document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Unmarshal(#[from] UnmarshalError),
}

/// Errors while loading a document from a file or URL.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// Errors during structural validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Load(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid member.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl From<MarshalError> for ApiError {
    fn from(err: MarshalError) -> Self {
        ApiError::internal(&err)
    }
}

impl From<UnmarshalError> for ApiError {
    fn from(err: UnmarshalError) -> Self {
        ApiError::internal(&err)
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::InvalidJson { .. } => ApiError::new(400, "invalid document").detail(err),
            DocumentError::Unmarshal(inner) => inner.into(),
        }
    }
}

impl From<IncludeError> for ApiError {
    fn from(err: IncludeError) -> Self {
        ApiError::new(err.status(), "include failed").detail(err)
    }
}
