//! Structural validation of wire documents against embedded JSON:API schemas.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{SchemaError, ValidateError};

/// Which document grammar applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Standard,
    Atomic,
}

impl DocumentKind {
    /// Atomic when the document carries `atomic:operations` or
    /// `atomic:results`.
    pub fn detect(doc: &Value) -> Self {
        let atomic = doc
            .as_object()
            .is_some_and(|obj| obj.contains_key("atomic:operations") || obj.contains_key("atomic:results"));
        if atomic {
            DocumentKind::Atomic
        } else {
            DocumentKind::Standard
        }
    }

    /// The JSON Schema for this kind of document.
    pub fn schema(self) -> Value {
        let mut schema = match self {
            DocumentKind::Standard => json!({
                "type": "object",
                "anyOf": [
                    {"required": ["data"]},
                    {"required": ["errors"]},
                    {"required": ["meta"]}
                ],
                "properties": {
                    "data": {"$ref": "#/$defs/primary"},
                    "included": {"type": "array", "items": {"$ref": "#/$defs/resource"}},
                    "errors": {"type": "array", "items": {"$ref": "#/$defs/error"}},
                    "meta": {"type": "object"},
                    "links": {"type": "object"},
                    "jsonapi": {"$ref": "#/$defs/jsonapi"}
                },
                "additionalProperties": false
            }),
            DocumentKind::Atomic => json!({
                "type": "object",
                "anyOf": [
                    {"required": ["atomic:operations"]},
                    {"required": ["atomic:results"]},
                    {"required": ["errors"]}
                ],
                "properties": {
                    "atomic:operations": {"type": "array", "items": {"$ref": "#/$defs/operation"}},
                    "atomic:results": {"type": "array", "items": {"$ref": "#/$defs/result"}},
                    "errors": {"type": "array", "items": {"$ref": "#/$defs/error"}},
                    "meta": {"type": "object"},
                    "links": {"type": "object"},
                    "jsonapi": {"$ref": "#/$defs/jsonapi"}
                },
                "additionalProperties": false
            }),
        };
        schema["$schema"] = json!("https://json-schema.org/draft/2020-12/schema");
        schema["$defs"] = definitions();
        schema
    }
}

fn definitions() -> Value {
    json!({
        "primary": {
            "oneOf": [
                {"type": "null"},
                {"$ref": "#/$defs/resource"},
                {"type": "array", "items": {"$ref": "#/$defs/resource"}}
            ]
        },
        "resource": {
            "type": "object",
            "required": ["type"],
            "properties": {
                "id": {"type": "string"},
                "lid": {"type": "string"},
                "type": {"type": "string", "minLength": 1},
                "attributes": {
                    "type": "object",
                    "not": {"anyOf": [{"required": ["id"]}, {"required": ["type"]}]}
                },
                "relationships": {
                    "type": "object",
                    "additionalProperties": {"$ref": "#/$defs/relationship"}
                },
                "links": {"type": "object"},
                "meta": {"type": "object"}
            },
            "additionalProperties": false
        },
        "identifier": {
            "type": "object",
            "required": ["type"],
            "anyOf": [{"required": ["id"]}, {"required": ["lid"]}],
            "properties": {
                "id": {"type": "string"},
                "lid": {"type": "string"},
                "type": {"type": "string", "minLength": 1},
                "meta": {"type": "object"}
            },
            "additionalProperties": false
        },
        "relationship": {
            "type": "object",
            "anyOf": [{"required": ["data"]}, {"required": ["links"]}, {"required": ["meta"]}],
            "properties": {
                "data": {
                    "oneOf": [
                        {"type": "null"},
                        {"$ref": "#/$defs/identifier"},
                        {"type": "array", "items": {"$ref": "#/$defs/identifier"}}
                    ]
                },
                "links": {"type": "object"},
                "meta": {"type": "object"}
            },
            "additionalProperties": false
        },
        "error": {
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "links": {"type": "object"},
                "status": {"type": "string"},
                "code": {"type": "string"},
                "title": {"type": "string"},
                "detail": {"type": "string"},
                "source": {"type": "object"},
                "meta": {"type": "object"}
            },
            "additionalProperties": false
        },
        "jsonapi": {
            "type": "object",
            "properties": {
                "version": {"type": "string"},
                "ext": {"type": "array", "items": {"type": "string"}},
                "profile": {"type": "array", "items": {"type": "string"}},
                "meta": {"type": "object"}
            },
            "additionalProperties": false
        },
        "operation": {
            "type": "object",
            "required": ["op"],
            "properties": {
                "op": {"enum": ["add", "update", "remove"]},
                "ref": {
                    "type": "object",
                    "required": ["type"],
                    "properties": {
                        "id": {"type": "string"},
                        "lid": {"type": "string"},
                        "type": {"type": "string", "minLength": 1},
                        "relationship": {"type": "string"}
                    },
                    "additionalProperties": false
                },
                "href": {"type": "string"},
                "data": {"$ref": "#/$defs/primary"},
                "meta": {"type": "object"}
            },
            "not": {"required": ["ref", "href"]}
        },
        "result": {
            "type": "object",
            "properties": {
                "data": {"$ref": "#/$defs/primary"},
                "meta": {"type": "object"}
            },
            "additionalProperties": false
        }
    })
}

/// Validate a wire document against the schema for `kind`.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` with every violation found.
pub fn validate_document(doc: &Value, kind: DocumentKind) -> Result<(), ValidateError> {
    validate_against_schema(&kind.schema(), doc)
}

/// Validate a document against an arbitrary JSON Schema.
pub fn validate_against_schema(schema: &Value, doc: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(doc)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
