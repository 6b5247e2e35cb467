//! Atomic operations extension documents and client LID reconciliation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, DocumentError};
use crate::model::{JsonApiObject, PrimaryData, ResourceIdentifier};
use crate::types::VERSION;

/// Extension URI advertised in `jsonapi.ext`.
pub const ATOMIC_EXTENSION: &str = "https://jsonapi.org/ext/atomic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationCode {
    Add,
    Update,
    Remove,
}

/// Target of an operation. `relationship` names a relationship of the
/// referenced resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRef {
    #[serde(flatten)]
    pub identifier: ResourceIdentifier,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: OperationCode,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<OperationRef>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub href: String,
    #[serde(default, skip_serializing_if = "PrimaryData::is_none")]
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Operation {
    pub fn new(op: OperationCode) -> Self {
        Self {
            op,
            target: None,
            href: String::new(),
            data: PrimaryData::None,
            meta: Map::new(),
        }
    }

    /// LIDs of the primary resources this operation carries.
    pub fn lids(&self) -> Vec<&str> {
        self.data
            .resources()
            .iter()
            .filter(|obj| obj.identifier.has_lid())
            .map(|obj| obj.lid())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    #[serde(default, skip_serializing_if = "PrimaryData::is_none")]
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

/// Where an LID-bearing identifier lives inside the operations list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LidLocation {
    Ref {
        operation: usize,
    },
    Data {
        operation: usize,
        resource: usize,
    },
    Relationship {
        operation: usize,
        resource: usize,
        // Index into the resource's relationships in key order.
        relationship: usize,
        identifier: usize,
    },
}

/// A document of the atomic operations extension.
///
/// Decoding records every identifier that carries an `lid` but no `id`, so
/// [`AtomicDocument::update_lid`] can rewrite all references to a client
/// resource once the server assigns its id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawAtomicDocument")]
pub struct AtomicDocument {
    #[serde(
        rename = "atomic:operations",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub operations: Vec<Operation>,
    #[serde(
        rename = "atomic:results",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub results: Vec<OperationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonapi: Option<JsonApiObject>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub links: Map<String, Value>,
    #[serde(skip)]
    lids: BTreeMap<String, Vec<LidLocation>>,
}

#[derive(Deserialize)]
struct RawAtomicDocument {
    #[serde(rename = "atomic:operations", default)]
    operations: Vec<Operation>,
    #[serde(rename = "atomic:results", default)]
    results: Vec<OperationResult>,
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    jsonapi: Option<JsonApiObject>,
    #[serde(default)]
    links: Map<String, Value>,
}

impl From<RawAtomicDocument> for AtomicDocument {
    fn from(raw: RawAtomicDocument) -> Self {
        let mut doc = AtomicDocument {
            operations: raw.operations,
            results: raw.results,
            errors: raw.errors,
            meta: raw.meta,
            jsonapi: raw.jsonapi,
            links: raw.links,
            lids: BTreeMap::new(),
        };
        doc.rebuild_lid_cache();
        doc
    }
}

impl AtomicDocument {
    /// An empty document advertising the atomic extension.
    pub fn new() -> Self {
        let mut jsonapi = JsonApiObject::version(VERSION);
        jsonapi.ext.push(ATOMIC_EXTENSION.to_string());
        Self {
            jsonapi: Some(jsonapi),
            ..Self::default()
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        serde_json::from_slice(bytes).map_err(|source| DocumentError::InvalidJson { source })
    }

    pub fn add_error(&mut self, error: impl Into<ApiError>) -> &mut Self {
        self.errors.push(error.into());
        self
    }

    /// Highest error status, 200 without errors.
    pub fn status(&self) -> u16 {
        self.errors
            .iter()
            .map(ApiError::status_code)
            .max()
            .map_or(200, |status| status.max(200))
    }

    /// Re-scan the operations for client identifiers. Call after editing
    /// `operations` by hand.
    pub fn rebuild_lid_cache(&mut self) {
        let mut lids: BTreeMap<String, Vec<LidLocation>> = BTreeMap::new();
        let mut record = |identifier: &ResourceIdentifier, location: LidLocation| {
            if identifier.has_lid() {
                lids.entry(identifier.lid.clone()).or_default().push(location);
            }
        };

        for (operation, op) in self.operations.iter().enumerate() {
            if let Some(target) = &op.target {
                record(&target.identifier, LidLocation::Ref { operation });
            }
            for (resource, obj) in op.data.resources().iter().enumerate() {
                record(&obj.identifier, LidLocation::Data { operation, resource });
                for (relationship, rel) in obj.relationships.values().enumerate() {
                    for (identifier, linkage) in rel.data.identifiers().iter().enumerate() {
                        record(
                            linkage,
                            LidLocation::Relationship {
                                operation,
                                resource,
                                relationship,
                                identifier,
                            },
                        );
                    }
                }
            }
        }
        self.lids = lids;
    }

    /// Assign the server id `id` to every identifier carrying `lid`.
    ///
    /// Returns `false` when no identifier uses `lid`.
    pub fn update_lid(&mut self, lid: &str, id: &str) -> bool {
        let Some(locations) = self.lids.get(lid).cloned() else {
            return false;
        };
        for location in &locations {
            if let Some(identifier) = self.identifier_mut(*location) {
                identifier.id = id.to_string();
            }
        }
        debug!(lid, id, references = locations.len(), "updated lid");
        true
    }

    /// Snapshot of `lid -> id` as currently assigned. Unresolved LIDs map to
    /// an empty id.
    pub fn lid_cache(&self) -> BTreeMap<String, String> {
        self.lids
            .iter()
            .map(|(lid, locations)| {
                let id = locations
                    .first()
                    .and_then(|location| self.identifier(*location))
                    .map(|identifier| identifier.id.clone())
                    .unwrap_or_default();
                (lid.clone(), id)
            })
            .collect()
    }

    /// LIDs defined by operation data, in operation order.
    pub fn defined_lids(&self) -> Vec<&str> {
        self.operations.iter().flat_map(Operation::lids).collect()
    }

    fn identifier(&self, location: LidLocation) -> Option<&ResourceIdentifier> {
        match location {
            LidLocation::Ref { operation } => self
                .operations
                .get(operation)?
                .target
                .as_ref()
                .map(|target| &target.identifier),
            LidLocation::Data {
                operation,
                resource,
            } => self
                .operations
                .get(operation)?
                .data
                .resources()
                .get(resource)
                .map(|obj| &obj.identifier),
            LidLocation::Relationship {
                operation,
                resource,
                relationship,
                identifier,
            } => self
                .operations
                .get(operation)?
                .data
                .resources()
                .get(resource)?
                .relationships
                .values()
                .nth(relationship)?
                .data
                .identifiers()
                .get(identifier),
        }
    }

    fn identifier_mut(&mut self, location: LidLocation) -> Option<&mut ResourceIdentifier> {
        match location {
            LidLocation::Ref { operation } => self
                .operations
                .get_mut(operation)?
                .target
                .as_mut()
                .map(|target| &mut target.identifier),
            LidLocation::Data {
                operation,
                resource,
            } => self
                .operations
                .get_mut(operation)?
                .data
                .resources_mut()
                .get_mut(resource)
                .map(|obj| &mut obj.identifier),
            LidLocation::Relationship {
                operation,
                resource,
                relationship,
                identifier,
            } => self
                .operations
                .get_mut(operation)?
                .data
                .resources_mut()
                .get_mut(resource)?
                .relationships
                .values_mut()
                .nth(relationship)?
                .data
                .identifiers_mut()
                .get_mut(identifier),
        }
    }
}
