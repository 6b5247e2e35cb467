//! Wire-level resource model: identifiers, resource objects, relationships.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::FieldFilter;

/// `{id, type, lid}` triple identifying a resource.
///
/// Equality considers `id` and `type` only; the local identifier is a
/// client-side alias and does not take part in comparisons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lid: String,
}

impl ResourceIdentifier {
    pub fn new(id: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_: type_.into(),
            lid: String::new(),
        }
    }

    /// Identifier of a resource that only has a local identifier so far.
    pub fn local(lid: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            type_: type_.into(),
            lid: lid.into(),
        }
    }

    /// True when the resource is only addressable by its local identifier.
    pub fn has_lid(&self) -> bool {
        self.id.is_empty() && !self.lid.is_empty()
    }

    /// True when neither `id` nor `lid` is set.
    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty() && self.lid.is_empty()
    }
}

impl PartialEq for ResourceIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.type_ == other.type_
    }
}

impl Eq for ResourceIdentifier {}

/// A resource object: identifier plus attributes, relationships, links and meta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(flatten)]
    pub identifier: ResourceIdentifier,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Relationship>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub links: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    /// Related resources marshaled without a server id, keyed by LID.
    /// Never serialized.
    #[serde(skip)]
    pub(crate) local_objects: BTreeMap<String, ResourceObject>,
}

impl ResourceObject {
    pub fn new(identifier: ResourceIdentifier) -> Self {
        Self {
            identifier,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.identifier.id
    }

    pub fn type_name(&self) -> &str {
        &self.identifier.type_
    }

    pub fn lid(&self) -> &str {
        &self.identifier.lid
    }

    /// Resources stashed during marshaling that have no server id yet.
    pub fn local_objects(&self) -> &BTreeMap<String, ResourceObject> {
        &self.local_objects
    }

    pub fn take_local_objects(&mut self) -> BTreeMap<String, ResourceObject> {
        std::mem::take(&mut self.local_objects)
    }

    pub fn clear_local_objects(&mut self) {
        self.local_objects.clear();
    }

    /// Drop top-level attributes and relationships rejected by `filter`.
    ///
    /// For nested relationship keys such as `address.country` the first
    /// segment decides.
    pub fn apply_field_filter(&mut self, filter: &FieldFilter) {
        let type_name = self.identifier.type_.clone();
        self.attributes.retain(|name, _| filter(&type_name, name));
        self.relationships
            .retain(|name, _| filter(&type_name, root_segment(name)));
    }
}

fn root_segment(key: &str) -> &str {
    let end = key.find(['.', '[']).unwrap_or(key.len());
    &key[..end]
}

/// A relationship object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub links: Map<String, Value>,
    #[serde(default, skip_serializing_if = "RelationshipData::is_absent")]
    pub data: RelationshipData,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Relationship {
    pub fn to_one(identifier: ResourceIdentifier) -> Self {
        Self {
            data: RelationshipData::One(identifier),
            ..Self::default()
        }
    }

    pub fn to_many(identifiers: Vec<ResourceIdentifier>) -> Self {
        Self {
            data: RelationshipData::Many(identifiers),
            ..Self::default()
        }
    }

    pub fn null() -> Self {
        Self {
            data: RelationshipData::Null,
            ..Self::default()
        }
    }
}

/// Resource linkage of a relationship.
///
/// `Absent` (no `data` member, linkage unknown) and `Null` (explicit
/// `"data": null`, known to be empty) are distinct.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RelationshipData {
    #[default]
    Absent,
    Null,
    One(ResourceIdentifier),
    Many(Vec<ResourceIdentifier>),
}

impl RelationshipData {
    pub fn is_absent(&self) -> bool {
        matches!(self, RelationshipData::Absent)
    }

    /// Identifiers in linkage order. Empty for `Absent` and `Null`.
    pub fn identifiers(&self) -> &[ResourceIdentifier] {
        match self {
            RelationshipData::One(id) => std::slice::from_ref(id),
            RelationshipData::Many(ids) => ids,
            RelationshipData::Absent | RelationshipData::Null => &[],
        }
    }

    pub fn identifiers_mut(&mut self) -> &mut [ResourceIdentifier] {
        match self {
            RelationshipData::One(id) => std::slice::from_mut(id),
            RelationshipData::Many(ids) => ids,
            RelationshipData::Absent | RelationshipData::Null => &mut [],
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Linkage {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

impl Serialize for RelationshipData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationshipData::Absent | RelationshipData::Null => serializer.serialize_none(),
            RelationshipData::One(id) => id.serialize(serializer),
            RelationshipData::Many(ids) => ids.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RelationshipData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Linkage>::deserialize(deserializer)? {
            None => RelationshipData::Null,
            Some(Linkage::One(id)) => RelationshipData::One(id),
            Some(Linkage::Many(ids)) => RelationshipData::Many(ids),
        })
    }
}

/// Primary data of a document or operation: nothing, one resource, or many.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PrimaryData {
    #[default]
    None,
    One(Box<ResourceObject>),
    Many(Vec<ResourceObject>),
}

impl PrimaryData {
    pub fn is_none(&self) -> bool {
        matches!(self, PrimaryData::None)
    }

    pub fn resources(&self) -> &[ResourceObject] {
        match self {
            PrimaryData::None => &[],
            PrimaryData::One(obj) => std::slice::from_ref(obj.as_ref()),
            PrimaryData::Many(objs) => objs,
        }
    }

    pub fn resources_mut(&mut self) -> &mut [ResourceObject] {
        match self {
            PrimaryData::None => &mut [],
            PrimaryData::One(obj) => std::slice::from_mut(obj.as_mut()),
            PrimaryData::Many(objs) => objs,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrimary {
    Many(Vec<ResourceObject>),
    One(Box<ResourceObject>),
}

impl Serialize for PrimaryData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PrimaryData::None => serializer.serialize_none(),
            PrimaryData::One(obj) => obj.serialize(serializer),
            PrimaryData::Many(objs) => objs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PrimaryData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<RawPrimary>::deserialize(deserializer)? {
            None => PrimaryData::None,
            Some(RawPrimary::One(obj)) => PrimaryData::One(obj),
            Some(RawPrimary::Many(objs)) => PrimaryData::Many(objs),
        })
    }
}

/// The top-level `jsonapi` member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonApiObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ext: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl JsonApiObject {
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}
