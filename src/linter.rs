//! Document linting - static analysis of JSON:API document files.
//!
//! Checks document files for:
//! - JSON syntax errors
//! - Structural schema violations
//! - Top-level member conflicts and duplicate resources
//! - Linkage problems (unreferenced included resources, dangling LIDs)

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::ValidateError;
use crate::loader::load_document;
use crate::validator::{validate_document, DocumentKind};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON Pointer to the issue (e.g., "/data/0/relationships/author")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub kind: Option<DocumentKind>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, warnings are treated as errors.
/// Returns aggregated results for all files.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_document_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += count(&file_result, Severity::Error);
        total_warnings += count(&file_result, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Lint a single document file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let mut sink = Sink {
        file: file.to_path_buf(),
        diagnostics: Vec::new(),
    };

    let doc = match load_document(file) {
        Ok(doc) => doc,
        Err(e) => {
            sink.error("E001", "/", format!("syntax error: {}", e));
            return FileResult {
                file: display,
                kind: None,
                status: FileStatus::Error,
                diagnostics: sink.diagnostics,
            };
        }
    };

    let kind = DocumentKind::detect(&doc);
    match validate_document(&doc, kind) {
        Ok(()) => {}
        Err(ValidateError::Invalid { errors }) => {
            for error in errors {
                let path = if error.path.is_empty() {
                    "/".to_string()
                } else {
                    error.path
                };
                sink.error("E002", &path, error.message);
            }
        }
        Err(other) => sink.error("E002", "/", other.to_string()),
    }

    match kind {
        DocumentKind::Standard => check_standard(&doc, &mut sink),
        DocumentKind::Atomic => check_atomic(&doc, &mut sink),
    }

    let has_errors = sink.diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = sink.diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: display,
        kind: Some(kind),
        status,
        diagnostics: sink.diagnostics,
    }
}

struct Sink {
    file: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl Sink {
    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.clone(),
            path: path.to_string(),
            message,
        });
    }

    fn error(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Error, code, path, message);
    }

    fn warning(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Warning, code, path, message);
    }
}

/// A resource object found in the document with its pointer.
struct Located<'a> {
    path: String,
    value: &'a Value,
}

impl Located<'_> {
    fn key(&self) -> Option<(String, String)> {
        let type_ = self.value.get("type")?.as_str()?;
        let id = self.value.get("id").and_then(Value::as_str).unwrap_or_default();
        let lid = self.value.get("lid").and_then(Value::as_str).unwrap_or_default();
        match (id.is_empty(), lid.is_empty()) {
            (false, _) => Some((type_.to_string(), format!("id:{}", id))),
            (true, false) => Some((type_.to_string(), format!("lid:{}", lid))),
            (true, true) => None,
        }
    }
}

fn primary<'a>(data: Option<&'a Value>, base: &str) -> Vec<Located<'a>> {
    match data {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, value)| Located {
                path: format!("{}/{}", base, i),
                value,
            })
            .collect(),
        Some(value @ Value::Object(_)) => vec![Located {
            path: base.to_string(),
            value,
        }],
        _ => Vec::new(),
    }
}

/// Identifiers from every relationship of `resource`.
fn linkage(resource: &Value) -> Vec<&Value> {
    let Some(relationships) = resource.get("relationships").and_then(Value::as_object) else {
        return Vec::new();
    };
    relationships
        .values()
        .filter_map(|relationship| relationship.get("data"))
        .flat_map(|data| match data {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![data],
            _ => Vec::new(),
        })
        .collect()
}

fn identifier_key(identifier: &Value) -> Option<(String, String)> {
    Located {
        path: String::new(),
        value: identifier,
    }
    .key()
}

fn check_standard(doc: &Value, sink: &mut Sink) {
    let has_data = doc.get("data").is_some();

    if has_data && doc.get("errors").is_some() {
        sink.error(
            "E003",
            "/",
            "document contains both data and errors".to_string(),
        );
    }
    if !has_data && doc.get("included").is_some() {
        sink.error(
            "E004",
            "/included",
            "included resources without primary data".to_string(),
        );
    }

    let primary = primary(doc.get("data"), "/data");
    let included = primary_included(doc);

    // Duplicates over primary data and included
    let mut seen: HashMap<(String, String), String> = HashMap::new();
    for resource in primary.iter().chain(included.iter()) {
        let Some(key) = resource.key() else {
            continue;
        };
        if let Some(first) = seen.get(&key) {
            sink.error(
                "E005",
                &resource.path,
                format!(
                    "duplicate resource {} {} (first at {})",
                    key.0, key.1, first
                ),
            );
        } else {
            seen.insert(key, resource.path.clone());
        }
    }

    // Full linkage: every included resource is reachable from primary data
    let mut reachable: HashSet<(String, String)> = HashSet::new();
    let by_key: HashMap<(String, String), &Value> = included
        .iter()
        .filter_map(|resource| Some((resource.key()?, resource.value)))
        .collect();
    let mut pending: Vec<&Value> = primary.iter().map(|resource| resource.value).collect();
    while let Some(resource) = pending.pop() {
        for identifier in linkage(resource) {
            let Some(key) = identifier_key(identifier) else {
                continue;
            };
            if reachable.insert(key.clone()) {
                if let Some(next) = by_key.get(&key) {
                    pending.push(next);
                }
            }
        }
    }
    for resource in &included {
        if let Some(key) = resource.key() {
            if !reachable.contains(&key) {
                sink.warning(
                    "W001",
                    &resource.path,
                    format!(
                        "included resource {} {} is not referenced by any relationship",
                        key.0, key.1
                    ),
                );
            }
        }
    }

    for resource in &primary {
        let id = resource.value.get("id").and_then(Value::as_str).unwrap_or_default();
        if id.is_empty() {
            sink.warning(
                "W002",
                &resource.path,
                "primary resource has no server id".to_string(),
            );
        }
    }
}

fn primary_included(doc: &Value) -> Vec<Located<'_>> {
    match doc.get("included") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, value)| Located {
                path: format!("/included/{}", i),
                value,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn check_atomic(doc: &Value, sink: &mut Sink) {
    let Some(operations) = doc.get("atomic:operations").and_then(Value::as_array) else {
        return;
    };

    let mut defined: HashMap<String, String> = HashMap::new();
    for (i, operation) in operations.iter().enumerate() {
        let base = format!("/atomic:operations/{}/data", i);
        for resource in primary(operation.get("data"), &base) {
            let lid = resource.value.get("lid").and_then(Value::as_str).unwrap_or_default();
            if lid.is_empty() || resource.value.get("id").is_some() {
                continue;
            }
            if let Some(first) = defined.get(lid) {
                sink.error(
                    "E005",
                    &resource.path,
                    format!("lid \"{}\" is already defined at {}", lid, first),
                );
            } else {
                defined.insert(lid.to_string(), resource.path.clone());
            }
        }
    }

    for (i, operation) in operations.iter().enumerate() {
        let base = format!("/atomic:operations/{}", i);
        let mut references: Vec<(String, &Value)> = Vec::new();
        if let Some(target) = operation.get("ref") {
            references.push((format!("{}/ref", base), target));
        }
        for resource in primary(operation.get("data"), &format!("{}/data", base)) {
            for identifier in linkage(resource.value) {
                references.push((format!("{}/relationships", resource.path), identifier));
            }
        }

        for (path, identifier) in references {
            let lid = identifier.get("lid").and_then(Value::as_str).unwrap_or_default();
            if lid.is_empty() || identifier.get("id").is_some() {
                continue;
            }
            if !defined.contains_key(lid) {
                sink.warning(
                    "W003",
                    &path,
                    format!("lid \"{}\" is not defined by any operation", lid),
                );
            }
        }
    }
}

/// Collect all .json files in a path (file or directory).
fn collect_document_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
