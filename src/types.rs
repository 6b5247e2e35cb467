//! Core types for JSON:API document mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registered JSON:API media type.
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

/// Media type of documents using the atomic operations extension.
pub const ATOMIC_MEDIA_TYPE: &str = "application/vnd.api+json;ext=\"https://jsonapi.org/ext/atomic\"";

/// Protocol version written into the `jsonapi` member of outbound documents.
pub const VERSION: &str = "1.1";

/// Member names that never appear as top-level attributes.
pub const RESERVED_NAMES: &[&str] = &["id", "type"];

/// Reserved `meta` keys used for pagination.
pub const PAGE_LIMIT_KEY: &str = "page[limit]";
pub const PAGE_OFFSET_KEY: &str = "page[offset]";
pub const PAGE_SORT_KEY: &str = "page[sort]";
pub const PAGE_TOTAL_KEY: &str = "page[total]";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns true if `name` is one of the reserved member names.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Layout used to parse string attributes into temporal fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFormat {
    /// RFC 3339 timestamp, e.g. `1985-06-15T12:13:59Z`.
    Rfc3339,
    /// `%Y-%m-%d`
    DateOnly,
    /// `%H:%M:%S`
    TimeOnly,
    /// `%Y-%m-%d %H:%M:%S`
    DateTime,
    /// A chrono strftime pattern.
    Pattern(&'static str),
}

impl TimeFormat {
    /// Parse a declarative format hint.
    ///
    /// `dateonly`, `timeonly` and `datetime` select the named layouts
    /// (case-insensitive), an empty hint selects RFC 3339 and anything
    /// else is taken as a literal pattern.
    pub fn from_hint(hint: &'static str) -> Self {
        match hint.to_ascii_lowercase().as_str() {
            "" | "rfc3339" => TimeFormat::Rfc3339,
            "dateonly" => TimeFormat::DateOnly,
            "timeonly" => TimeFormat::TimeOnly,
            "datetime" => TimeFormat::DateTime,
            _ => TimeFormat::Pattern(hint),
        }
    }

    /// The strftime pattern for this layout, if it has a fixed one.
    pub fn pattern(&self) -> Option<&'static str> {
        match self {
            TimeFormat::Rfc3339 => None,
            TimeFormat::DateOnly => Some("%Y-%m-%d"),
            TimeFormat::TimeOnly => Some("%H:%M:%S"),
            TimeFormat::DateTime => Some("%Y-%m-%d %H:%M:%S"),
            TimeFormat::Pattern(p) => Some(p),
        }
    }
}

/// Pagination state surfaced under the reserved `page[...]` meta keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
    pub sort: Vec<String>,
    pub total_count: i64,
}

impl Page {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort.push(field.into());
        self
    }

    pub fn total(mut self, total_count: i64) -> Self {
        self.total_count = total_count;
        self
    }
}

/// Decides whether a field of a resource type is marshaled.
///
/// Called with `(type_name, field_name)`; returning false suppresses the field.
pub type FieldFilter = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Produces the owner part of synthetic local identifiers.
pub type LidGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Build a filter from sparse fieldsets (`fields[type]=a,b`).
///
/// Types without a fieldset keep all of their fields. Field names compare
/// case-insensitively.
pub fn sparse_fieldset_filter(fieldsets: HashMap<String, Vec<String>>) -> FieldFilter {
    Arc::new(move |type_name: &str, field_name: &str| {
        match fieldsets.get(type_name) {
            Some(fields) => fields.iter().any(|f| f.eq_ignore_ascii_case(field_name)),
            None => true,
        }
    })
}

/// Combine two filters; a field survives only if both allow it.
pub fn combine_filters(first: FieldFilter, second: FieldFilter) -> FieldFilter {
    Arc::new(move |type_name: &str, field_name: &str| {
        first(type_name, field_name) && second(type_name, field_name)
    })
}

/// The default local identifier generator: nanoseconds since the epoch.
pub fn default_lid_generator() -> LidGenerator {
    Arc::new(|| {
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string()
    })
}

/// Options for marshaling domain values into resource objects.
#[derive(Clone)]
pub struct MarshalOptions {
    /// Optional field filter, applied at every nesting level.
    pub field_filter: Option<FieldFilter>,
    /// Generator for the owner part of synthetic LIDs.
    pub lid_generator: LidGenerator,
}

impl MarshalOptions {
    /// Options without a field filter, using the time-derived LID generator.
    pub fn new() -> Self {
        Self {
            field_filter: None,
            lid_generator: default_lid_generator(),
        }
    }

    /// Set the field filter, replacing any previous one.
    pub fn field_filter(mut self, filter: FieldFilter) -> Self {
        self.field_filter = Some(filter);
        self
    }

    /// Keep only the named fields (case-insensitive) on every type.
    ///
    /// An empty list keeps everything.
    pub fn only_fields<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return self;
        }
        self.field_filter(Arc::new(move |_: &str, field_name: &str| {
            names.iter().any(|n| n.eq_ignore_ascii_case(field_name))
        }))
    }

    /// Set the LID generator.
    pub fn lid_generator(mut self, generator: LidGenerator) -> Self {
        self.lid_generator = generator;
        self
    }

    /// Returns true if the filter (if any) allows this field.
    pub fn allows(&self, type_name: &str, field_name: &str) -> bool {
        self.field_filter
            .as_ref()
            .map_or(true, |filter| filter(type_name, field_name))
    }

    pub(crate) fn generate_lid(&self) -> String {
        (self.lid_generator)()
    }
}

impl Default for MarshalOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MarshalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalOptions")
            .field("field_filter", &self.field_filter.is_some())
            .finish_non_exhaustive()
    }
}

/// Options for include resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// When true, an include path segment that matches no relationship is an
    /// error instead of falling back to every relationship at that level.
    /// Defaults to false.
    pub strict: bool,
}

impl IncludeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
