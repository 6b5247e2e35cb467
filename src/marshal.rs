//! Marshaling: domain values to resource objects.
//!
//! The walk follows the field table of the value. Nested values without an
//! identifier are flattened into the attribute tree under dotted/indexed
//! paths; values with an identifier become relationships that only carry the
//! identifier. Related values without a server id get a synthetic LID of the
//! form `<owner id or lid>_<sequence>` and are stashed in the owner's local
//! objects so include resolution can find them later.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::MarshalError;
use crate::fields::{FieldValue, Fields};
use crate::model::{Relationship, ResourceIdentifier, ResourceObject};
use crate::path::{set_attribute, AttributePath};
use crate::types::{is_reserved_name, MarshalOptions};

/// Convert `value` into a resource object.
///
/// # Errors
///
/// Returns `MarshalError::MissingIdentity` if `value` (or a related value)
/// does not expose an identifier, and path or serialization errors for
/// fields that cannot be written into the attribute tree.
pub fn marshal_resource(
    value: &dyn Fields,
    options: &MarshalOptions,
) -> Result<ResourceObject, MarshalError> {
    marshal_with_lid(value, options, None)
}

/// Marshal `value`, stamping `lid` on it before its own related values are
/// walked so their LIDs are scoped under it.
fn marshal_with_lid(
    value: &dyn Fields,
    options: &MarshalOptions,
    lid: Option<String>,
) -> Result<ResourceObject, MarshalError> {
    let identify = value.as_identify().ok_or(MarshalError::MissingIdentity {
        type_name: value.type_name(),
    })?;
    let mut obj = ResourceObject::new(identify.identifier());
    if let Some(lid) = lid {
        obj.identifier.lid = lid;
    }

    if let Some(custom) = value.as_resource_marshaler() {
        custom.marshal_resource(&mut obj)?;
        return Ok(obj);
    }

    let mut walker = Walker {
        options,
        lid_sequence: 0,
    };
    walker.walk(&mut obj, value, &AttributePath::root())?;

    debug!(
        resource_type = %obj.type_name(),
        id = %obj.id(),
        attributes = obj.attributes.len(),
        relationships = obj.relationships.len(),
        "marshaled resource"
    );
    Ok(obj)
}

/// Marshal each value in order.
pub fn marshal_resources<T: Fields>(
    values: &[T],
    options: &MarshalOptions,
) -> Result<Vec<ResourceObject>, MarshalError> {
    values
        .iter()
        .map(|value| marshal_resource(value, options))
        .collect()
}

/// Empty in the `omit_empty` sense: null, false, 0, "", [] or {}.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Per-owner walk state. The LID sequence is shared by every nesting level
/// of one resource, so sibling and nested related values never collide.
struct Walker<'o> {
    options: &'o MarshalOptions,
    lid_sequence: usize,
}

impl Walker<'_> {
    fn walk(
        &mut self,
        obj: &mut ResourceObject,
        value: &dyn Fields,
        path: &AttributePath,
    ) -> Result<(), MarshalError> {
        for (index, meta) in value.descriptor().iter().enumerate() {
            let field = value.field(index).ok_or(MarshalError::UnclassifiedField {
                type_name: value.type_name(),
                index,
            })?;

            if let FieldValue::Embedded(inner) = field {
                self.walk(obj, inner, path)?;
                continue;
            }
            if path.is_root() && is_reserved_name(meta.name) {
                continue;
            }
            if !self.options.allows(obj.type_name(), meta.name) {
                continue;
            }

            let field_path = path.child(meta.name);
            match field {
                FieldValue::Null => {
                    if !meta.omit_empty {
                        set_attribute(&mut obj.attributes, &field_path, Value::Null)?;
                    }
                }
                FieldValue::Attribute(leaf) => {
                    let attribute = leaf.to_attribute().map_err(|source| MarshalError::Serialize {
                        path: field_path.to_string(),
                        source,
                    })?;
                    if meta.omit_empty && is_empty_value(&attribute) {
                        continue;
                    }
                    set_attribute(&mut obj.attributes, &field_path, attribute)?;
                }
                FieldValue::Custom(custom) => custom.marshal_field(obj, meta, &field_path)?,
                FieldValue::Compound(inner) if inner.as_identify().is_some() => {
                    let identifier = self.related(obj, inner)?;
                    obj.relationships
                        .insert(field_path.to_string(), Relationship::to_one(identifier));
                }
                FieldValue::Compound(inner) => {
                    set_attribute(&mut obj.attributes, &field_path, Value::Object(Map::new()))?;
                    self.walk(obj, inner, &field_path)?;
                }
                FieldValue::EmptyRelationship => {
                    if !meta.omit_empty {
                        obj.relationships
                            .insert(field_path.to_string(), Relationship::null());
                    }
                }
                FieldValue::List(items) => {
                    if meta.omit_empty && items.is_empty() {
                        continue;
                    }
                    set_attribute(&mut obj.attributes, &field_path, Value::Array(Vec::new()))?;
                    for (i, item) in items.into_iter().enumerate() {
                        let item_path = field_path.indexed(i);
                        set_attribute(&mut obj.attributes, &item_path, Value::Object(Map::new()))?;
                        self.walk(obj, item, &item_path)?;
                    }
                }
                FieldValue::Map(entries) => {
                    if meta.omit_empty && entries.is_empty() {
                        continue;
                    }
                    set_attribute(&mut obj.attributes, &field_path, Value::Object(Map::new()))?;
                    for (key, item) in entries {
                        let entry_path = field_path.child(key);
                        set_attribute(&mut obj.attributes, &entry_path, Value::Object(Map::new()))?;
                        self.walk(obj, item, &entry_path)?;
                    }
                }
                FieldValue::Relationships(items) => {
                    if meta.omit_empty && items.is_empty() {
                        continue;
                    }
                    let identifiers = items
                        .into_iter()
                        .map(|item| self.related(obj, item))
                        .collect::<Result<Vec<_>, _>>()?;
                    obj.relationships
                        .insert(field_path.to_string(), Relationship::to_many(identifiers));
                }
                FieldValue::Embedded(_) => {}
            }
        }
        Ok(())
    }

    /// Identifier of a related value. Values without a server id are
    /// marshaled in full and stashed in the owner's local objects.
    fn related(
        &mut self,
        owner: &mut ResourceObject,
        value: &dyn Fields,
    ) -> Result<ResourceIdentifier, MarshalError> {
        let identify = value.as_identify().ok_or(MarshalError::MissingIdentity {
            type_name: value.type_name(),
        })?;
        let identifier = identify.identifier();
        if !identifier.id.is_empty() {
            return Ok(identifier);
        }

        let assigned = if identifier.lid.is_empty() {
            let lid = format!("{}_{}", self.owner_key(owner), self.lid_sequence);
            self.lid_sequence += 1;
            trace!(owner = %owner.type_name(), lid = %lid, "assigned local identifier");
            Some(lid)
        } else {
            None
        };
        let mut related = marshal_with_lid(value, self.options, assigned)?;

        let nested = related.take_local_objects();
        owner.local_objects.extend(nested);
        let identifier = related.identifier.clone();
        owner.local_objects.insert(identifier.lid.clone(), related);
        Ok(identifier)
    }

    /// The owner's id, or its LID (generated on first use).
    fn owner_key(&self, owner: &mut ResourceObject) -> String {
        if !owner.identifier.id.is_empty() {
            return owner.identifier.id.clone();
        }
        if owner.identifier.lid.is_empty() {
            owner.identifier.lid = self.options.generate_lid();
        }
        owner.identifier.lid.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldMeta, Identify, MarshalResource};
    use crate::model::RelationshipData;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Label {
        id: String,
        text: String,
    }

    const LABEL_FIELDS: &[FieldMeta] = &[FieldMeta::new("id"), FieldMeta::new("text")];

    impl Identify for Label {
        fn identifier(&self) -> ResourceIdentifier {
            ResourceIdentifier::new(self.id.clone(), "label")
        }
    }

    impl Fields for Label {
        fn descriptor(&self) -> &'static [FieldMeta] {
            LABEL_FIELDS
        }
        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::attribute(&self.id)),
                1 => Some(FieldValue::attribute(&self.text)),
                _ => None,
            }
        }
        fn as_identify(&self) -> Option<&dyn Identify> {
            Some(self)
        }
    }

    struct Box3 {
        id: String,
        note: Option<String>,
        count: u32,
        labels: Vec<Label>,
    }

    const BOX_FIELDS: &[FieldMeta] = &[
        FieldMeta::new("id"),
        FieldMeta::new("note"),
        FieldMeta::new("count").omit_empty(),
        FieldMeta::new("labels"),
    ];

    impl Identify for Box3 {
        fn identifier(&self) -> ResourceIdentifier {
            ResourceIdentifier::new(self.id.clone(), "box")
        }
    }

    impl Fields for Box3 {
        fn descriptor(&self) -> &'static [FieldMeta] {
            BOX_FIELDS
        }
        fn field(&self, index: usize) -> Option<FieldValue<'_>> {
            match index {
                0 => Some(FieldValue::attribute(&self.id)),
                1 => Some(FieldValue::optional(self.note.as_ref())),
                2 => Some(FieldValue::attribute(&self.count)),
                3 => Some(FieldValue::relationships(&self.labels)),
                _ => None,
            }
        }
        fn as_identify(&self) -> Option<&dyn Identify> {
            Some(self)
        }
    }

    struct Anonymous;

    impl Fields for Anonymous {
        fn descriptor(&self) -> &'static [FieldMeta] {
            &[]
        }
        fn field(&self, _index: usize) -> Option<FieldValue<'_>> {
            None
        }
    }

    struct Hand;

    impl Identify for Hand {
        fn identifier(&self) -> ResourceIdentifier {
            ResourceIdentifier::new("h", "hand")
        }
    }

    impl MarshalResource for Hand {
        fn marshal_resource(&self, obj: &mut ResourceObject) -> Result<(), MarshalError> {
            obj.attributes.insert("fingers".into(), json!(5));
            Ok(())
        }
    }

    impl Fields for Hand {
        fn descriptor(&self) -> &'static [FieldMeta] {
            &[]
        }
        fn field(&self, _index: usize) -> Option<FieldValue<'_>> {
            None
        }
        fn as_identify(&self) -> Option<&dyn Identify> {
            Some(self)
        }
        fn as_resource_marshaler(&self) -> Option<&dyn MarshalResource> {
            Some(self)
        }
    }

    fn fixed_lids() -> MarshalOptions {
        MarshalOptions::new().lid_generator(Arc::new(|| "gen".to_string()))
    }

    #[test]
    fn reserved_names_and_null_handling() {
        let value = Box3 {
            id: "b1".into(),
            note: None,
            count: 0,
            labels: vec![],
        };
        let obj = marshal_resource(&value, &MarshalOptions::new()).unwrap();

        assert_eq!(obj.id(), "b1");
        assert_eq!(Value::Object(obj.attributes), json!({"note": null}));
        assert_eq!(
            obj.relationships["labels"].data,
            RelationshipData::Many(vec![])
        );
    }

    #[test]
    fn persisted_relationships_carry_identifiers_only() {
        let value = Box3 {
            id: "b1".into(),
            note: Some("fragile".into()),
            count: 2,
            labels: vec![Label {
                id: "l1".into(),
                text: "red".into(),
            }],
        };
        let obj = marshal_resource(&value, &MarshalOptions::new()).unwrap();

        assert_eq!(
            obj.relationships["labels"].data.identifiers(),
            &[ResourceIdentifier::new("l1", "label")]
        );
        assert!(obj.local_objects().is_empty());
        assert_eq!(obj.attributes["count"], json!(2));
    }

    #[test]
    fn unpersisted_relationships_get_sequenced_lids() {
        let value = Box3 {
            id: String::new(),
            note: None,
            count: 0,
            labels: vec![
                Label {
                    id: String::new(),
                    text: "red".into(),
                },
                Label {
                    id: String::new(),
                    text: "blue".into(),
                },
            ],
        };
        let obj = marshal_resource(&value, &fixed_lids()).unwrap();

        let lids: Vec<&str> = obj.relationships["labels"]
            .data
            .identifiers()
            .iter()
            .map(|id| id.lid.as_str())
            .collect();
        assert_eq!(lids, vec!["gen_0", "gen_1"]);
        assert_eq!(obj.lid(), "gen");
        assert_eq!(obj.local_objects()["gen_1"].attributes["text"], json!("blue"));
    }

    #[test]
    fn field_filter_applies_to_owner_type() {
        let value = Box3 {
            id: "b1".into(),
            note: Some("x".into()),
            count: 1,
            labels: vec![],
        };
        let options = MarshalOptions::new().only_fields(["count"]);
        let obj = marshal_resource(&value, &options).unwrap();
        assert_eq!(Value::Object(obj.attributes), json!({"count": 1}));
        assert!(obj.relationships.is_empty());
    }

    #[test]
    fn missing_identity_is_fatal() {
        let err = marshal_resource(&Anonymous, &MarshalOptions::new()).unwrap_err();
        assert!(matches!(err, MarshalError::MissingIdentity { .. }));
    }

    #[test]
    fn custom_resource_marshaler_bypasses_walk() {
        let obj = marshal_resource(&Hand, &MarshalOptions::new()).unwrap();
        assert_eq!(Value::Object(obj.attributes), json!({"fingers": 5}));
    }

    #[test]
    fn empty_values() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(is_empty_value(&value), "{value} should be empty");
        }
        for value in [json!(true), json!(1), json!("a"), json!([0]), json!({"a": null})] {
            assert!(!is_empty_value(&value), "{value} should not be empty");
        }
    }
}
