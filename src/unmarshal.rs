//! Unmarshaling: resource objects back into domain values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::UnmarshalError;
use crate::fields::{FieldMeta, FieldMut, FieldValue, Fields, FieldsMut, ListSlot};
use crate::model::{Relationship, RelationshipData, ResourceIdentifier, ResourceObject};
use crate::path::{AttributePath, Segment};
use crate::types::{is_reserved_name, json_type_name};

/// Populate `dest` from `obj`, looking up related resources in `included`.
///
/// The identifier is assigned first. Attributes are matched to fields by
/// case-insensitive name; unknown names are ignored. Relationships fill
/// nested values from the matching included resource, one level deep.
///
/// # Errors
///
/// Fails without partial-object guarantees when `dest` cannot accept an
/// identifier, a value cannot be coerced, or a wire shape does not fit the
/// destination field.
pub fn unmarshal_resource(
    obj: &ResourceObject,
    included: &[ResourceObject],
    dest: &mut dyn FieldsMut,
) -> Result<(), UnmarshalError> {
    assign_identifier(dest, &obj.identifier)?;
    map_attributes(&obj.attributes, dest, &AttributePath::root())?;
    map_relationships(&obj.relationships, included, dest)?;
    debug!(
        resource_type = %obj.type_name(),
        id = %obj.id(),
        "unmarshaled resource"
    );
    Ok(())
}

/// Find an included resource by `id` and `type`, or by `lid` and `type` for
/// identifiers without a server id.
pub fn find_included<'a>(
    included: &'a [ResourceObject],
    identifier: &ResourceIdentifier,
) -> Option<&'a ResourceObject> {
    included.iter().find(|obj| {
        obj.identifier.type_ == identifier.type_
            && if identifier.id.is_empty() {
                !identifier.lid.is_empty() && obj.identifier.lid == identifier.lid
            } else {
                obj.identifier.id == identifier.id
            }
    })
}

fn assign_identifier(
    dest: &mut dyn FieldsMut,
    identifier: &ResourceIdentifier,
) -> Result<(), UnmarshalError> {
    let type_name = dest.type_name();
    let assign = dest
        .as_assign_identifier()
        .ok_or(UnmarshalError::MissingIdentityAssignment { type_name })?;
    assign.set_identifier(identifier);
    Ok(())
}

/// Route of descriptor indexes to the field called `name`, descending into
/// embedded fields.
fn locate<F: Fields + ?Sized>(fields: &F, name: &str) -> Option<(Vec<usize>, FieldMeta)> {
    for (index, meta) in fields.descriptor().iter().enumerate() {
        if let Some(FieldValue::Embedded(inner)) = fields.field(index) {
            if let Some((mut route, found)) = locate(inner, name) {
                route.insert(0, index);
                return Some((route, found));
            }
            continue;
        }
        if meta.matches(name) {
            return Some((vec![index], *meta));
        }
    }
    None
}

fn field_at<'a>(dest: &'a mut dyn FieldsMut, route: &[usize]) -> Option<FieldMut<'a>> {
    let (&first, rest) = route.split_first()?;
    let field = dest.field_mut(first)?;
    if rest.is_empty() {
        return Some(field);
    }
    match field {
        FieldMut::Embedded(inner) => field_at(inner, rest),
        _ => None,
    }
}

fn mismatch(path: impl ToString, expected: &'static str, value: &Value) -> UnmarshalError {
    UnmarshalError::ShapeMismatch {
        path: path.to_string(),
        expected,
        actual: json_type_name(value),
    }
}

fn map_attributes(
    attributes: &Map<String, Value>,
    dest: &mut dyn FieldsMut,
    path: &AttributePath,
) -> Result<(), UnmarshalError> {
    for (name, value) in attributes {
        if path.is_root() && is_reserved_name(name) {
            continue;
        }
        let Some((route, meta)) = locate(&*dest, name) else {
            continue;
        };
        let Some(field) = field_at(dest, &route) else {
            continue;
        };
        assign_field(field, &meta, value, &path.child(name))?;
    }
    Ok(())
}

fn assign_field(
    field: FieldMut<'_>,
    meta: &FieldMeta,
    value: &Value,
    path: &AttributePath,
) -> Result<(), UnmarshalError> {
    match field {
        FieldMut::Attribute(slot) => {
            slot.assign(value, meta)
                .map_err(|source| UnmarshalError::Attribute {
                    path: path.to_string(),
                    source,
                })
        }
        FieldMut::Compound(mut slot) => match value {
            Value::Null => {
                slot.clear();
                Ok(())
            }
            Value::Object(map) => {
                slot.clear();
                map_attributes(map, slot.populate(), path)
            }
            other => Err(mismatch(path, "object", other)),
        },
        FieldMut::Embedded(inner) => match value {
            Value::Object(map) => map_attributes(map, inner, path),
            other => Err(mismatch(path, "object", other)),
        },
        FieldMut::List(mut list) => match value {
            Value::Null => {
                list.clear();
                Ok(())
            }
            Value::Array(items) => {
                list.clear();
                for (i, item) in items.iter().enumerate() {
                    let item_path = path.indexed(i);
                    let Value::Object(map) = item else {
                        return Err(mismatch(item_path, "object", item));
                    };
                    map_attributes(map, list.push_default(), &item_path)?;
                }
                Ok(())
            }
            other => Err(mismatch(path, "array", other)),
        },
        FieldMut::Map(mut entries) => match value {
            Value::Null => {
                entries.clear();
                Ok(())
            }
            Value::Object(map) => {
                entries.clear();
                for (key, item) in map {
                    let entry_path = path.child(key);
                    let Value::Object(fields) = item else {
                        return Err(mismatch(entry_path, "object", item));
                    };
                    map_attributes(fields, entries.insert_default(key), &entry_path)?;
                }
                Ok(())
            }
            other => Err(mismatch(path, "object", other)),
        },
    }
}

fn map_relationships(
    relationships: &BTreeMap<String, Relationship>,
    included: &[ResourceObject],
    dest: &mut dyn FieldsMut,
) -> Result<(), UnmarshalError> {
    // every list index on the wire needs its own key
    let limit = relationships.len();
    for (name, relationship) in relationships {
        if relationship.data.is_absent() {
            continue;
        }
        let path = AttributePath::parse(name)
            .map_err(|_| UnmarshalError::InvalidRelationship { name: name.clone() })?;
        bind_relationship(
            dest,
            path.segments(),
            &relationship.data,
            included,
            name,
            limit,
        )?;
    }
    Ok(())
}

/// Walk intermediate segments of a nested relationship key such as
/// `address.country` or `children[1].pet`, creating nested values on the
/// way, then assign the linkage to the final field.
fn bind_relationship(
    dest: &mut dyn FieldsMut,
    segments: &[Segment],
    data: &RelationshipData,
    included: &[ResourceObject],
    key: &str,
    limit: usize,
) -> Result<(), UnmarshalError> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(());
    };
    let Some((route, _)) = locate(&*dest, &segment.name) else {
        return Ok(());
    };
    let Some(field) = field_at(dest, &route) else {
        return Ok(());
    };
    if rest.is_empty() {
        return assign_relationship(field, segment.index, data, included, key, limit);
    }

    match (field, segment.index) {
        (FieldMut::Compound(mut slot), None) => {
            bind_relationship(slot.populate(), rest, data, included, key, limit)
        }
        (FieldMut::Embedded(inner), None) => {
            bind_relationship(inner, rest, data, included, key, limit)
        }
        (FieldMut::List(mut list), Some(index)) => {
            let inner = element_at(&mut *list, index, limit, key)?;
            bind_relationship(inner, rest, data, included, key, limit)
        }
        (FieldMut::List(_), None) => Err(UnmarshalError::ShapeMismatch {
            path: key.to_string(),
            expected: "indexed path",
            actual: "array",
        }),
        (_, _) => Err(UnmarshalError::ShapeMismatch {
            path: key.to_string(),
            expected: "nested object",
            actual: "attribute",
        }),
    }
}

fn assign_relationship(
    field: FieldMut<'_>,
    index: Option<usize>,
    data: &RelationshipData,
    included: &[ResourceObject],
    key: &str,
    limit: usize,
) -> Result<(), UnmarshalError> {
    let shape = |expected: &'static str, actual: &'static str| UnmarshalError::ShapeMismatch {
        path: key.to_string(),
        expected,
        actual,
    };

    match (field, data) {
        (_, RelationshipData::Absent) => Ok(()),
        (FieldMut::Compound(mut slot), RelationshipData::Null) => {
            slot.clear();
            Ok(())
        }
        (FieldMut::Compound(mut slot), RelationshipData::One(identifier)) => {
            slot.clear();
            fill_related(slot.populate(), identifier, included)
        }
        (FieldMut::Compound(_), RelationshipData::Many(_)) => {
            Err(shape("to-one relationship", "array"))
        }
        (FieldMut::List(mut list), RelationshipData::Null) => {
            if index.is_none() {
                list.clear();
            }
            Ok(())
        }
        (FieldMut::List(mut list), RelationshipData::One(identifier)) => match index {
            Some(index) => {
                fill_related(element_at(&mut *list, index, limit, key)?, identifier, included)
            }
            None => fill_related(list.push_default(), identifier, included),
        },
        (FieldMut::List(mut list), RelationshipData::Many(identifiers)) => {
            for identifier in identifiers {
                fill_related(list.push_default(), identifier, included)?;
            }
            Ok(())
        }
        (FieldMut::Embedded(inner), RelationshipData::One(identifier)) => {
            fill_related(inner, identifier, included)
        }
        (FieldMut::Embedded(_), _) => Err(shape("to-one relationship", "embedded value")),
        (FieldMut::Attribute(_), _) => Err(shape("relationship field", "attribute")),
        (FieldMut::Map(_), _) => Err(shape("relationship field", "map")),
    }
}

/// Element `index` of a list addressed by a relationship key, growing the
/// list with defaults. Indexes at or past `limit` are rejected.
fn element_at<'l>(
    list: &'l mut dyn ListSlot,
    index: usize,
    limit: usize,
    key: &str,
) -> Result<&'l mut dyn FieldsMut, UnmarshalError> {
    let out_of_range = || UnmarshalError::InvalidRelationship {
        name: key.to_string(),
    };
    if index >= limit {
        return Err(out_of_range());
    }
    while list.len() <= index {
        list.push_default();
    }
    list.get_mut(index).ok_or_else(out_of_range)
}

/// Assign the identifier and, when the resource is included, its attributes
/// and relationship identifiers.
fn fill_related(
    dest: &mut dyn FieldsMut,
    identifier: &ResourceIdentifier,
    included: &[ResourceObject],
) -> Result<(), UnmarshalError> {
    assign_identifier(dest, identifier)?;
    if let Some(resource) = find_included(included, identifier) {
        map_attributes(&resource.attributes, dest, &AttributePath::root())?;
        map_relationships(&resource.relationships, &[], dest)?;
    }
    Ok(())
}
