//! Query-string parameters: sparse fieldsets, include paths and pagination.

use std::collections::{BTreeMap, HashMap};

use url::form_urlencoded;

use crate::types::Page;

/// Page size when `page[limit]` is missing or invalid.
pub const DEFAULT_PAGE_LIMIT: i64 = 25;

/// Decoded query parameters in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decode a raw query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn from_uri(uri: &http::Uri) -> Self {
        Self::parse(uri.query().unwrap_or_default())
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Members of a bracketed family such as `fields[person]=name`, keyed by
    /// the bracketed name. Later duplicates win.
    pub fn family(&self, prefix: &str) -> BTreeMap<String, String> {
        self.pairs
            .iter()
            .filter_map(|(key, value)| {
                let member = key.strip_prefix(prefix)?.strip_prefix('[')?.strip_suffix(']')?;
                (!member.is_empty()).then(|| (member.to_string(), value.clone()))
            })
            .collect()
    }

    /// `fields[<type>]=a,b` as `type -> [a, b]`.
    pub fn sparse_fieldsets(&self) -> HashMap<String, Vec<String>> {
        self.family("fields")
            .into_iter()
            .map(|(type_name, names)| (type_name, split_list(&names)))
            .collect()
    }

    /// `include=a.b,c` as `[a.b, c]`.
    pub fn includes(&self) -> Vec<String> {
        self.get("include").map(split_list).unwrap_or_default()
    }

    /// Pagination from `page[offset]`, `page[limit]` and `sort`.
    pub fn page(&self) -> Page {
        let number = |key: &str| self.get(key).and_then(|v| v.trim().parse::<i64>().ok());
        let mut page = Page::new(
            number("page[offset]").filter(|n| *n >= 0).unwrap_or(0),
            number("page[limit]")
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PAGE_LIMIT),
        );
        if let Some(sort) = self.get("sort") {
            page.sort = split_list(sort);
        }
        page
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
