//! Field tables: how domain types expose their fields to the marshaler and
//! unmarshaler.
//!
//! A type describes its fields once through a `&'static [FieldMeta]`
//! descriptor and hands out [`FieldValue`] (read) or [`FieldMut`] (write)
//! views by descriptor index. Identity and custom marshaling are optional
//! capabilities queried at runtime.
//!
//! ```
//! use jsonapi_mapper::{
//!     FieldMeta, FieldMut, FieldValue, Fields, FieldsMut, Identify, ResourceIdentifier,
//! };
//!
//! #[derive(Default)]
//! struct Tag {
//!     id: String,
//!     label: String,
//! }
//!
//! const TAG_FIELDS: &[FieldMeta] = &[FieldMeta::new("id"), FieldMeta::new("label")];
//!
//! impl Identify for Tag {
//!     fn identifier(&self) -> ResourceIdentifier {
//!         ResourceIdentifier::new(self.id.clone(), "tag")
//!     }
//! }
//!
//! impl Fields for Tag {
//!     fn descriptor(&self) -> &'static [FieldMeta] {
//!         TAG_FIELDS
//!     }
//!     fn field(&self, index: usize) -> Option<FieldValue<'_>> {
//!         match index {
//!             0 => Some(FieldValue::attribute(&self.id)),
//!             1 => Some(FieldValue::attribute(&self.label)),
//!             _ => None,
//!         }
//!     }
//!     fn as_identify(&self) -> Option<&dyn Identify> {
//!         Some(self)
//!     }
//! }
//!
//! impl FieldsMut for Tag {
//!     fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
//!         match index {
//!             0 => Some(FieldMut::attribute(&mut self.id)),
//!             1 => Some(FieldMut::attribute(&mut self.label)),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

use std::collections::{btree_map, hash_map, BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::coerce::FromAttribute;
use crate::error::{CoerceError, MarshalError};
use crate::model::{ResourceIdentifier, ResourceObject};
use crate::path::AttributePath;
use crate::types::TimeFormat;

/// Declarative metadata for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Wire name of the field.
    pub name: &'static str,
    /// Skip the field when its value is empty (null, false, 0, "", [] or {}).
    pub omit_empty: bool,
    /// Layout for temporal fields decoded from strings.
    pub time_format: Option<TimeFormat>,
}

impl FieldMeta {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            omit_empty: false,
            time_format: None,
        }
    }

    pub const fn omit_empty(self) -> Self {
        Self {
            omit_empty: true,
            ..self
        }
    }

    pub const fn time_format(self, format: TimeFormat) -> Self {
        Self {
            time_format: Some(format),
            ..self
        }
    }

    /// Case-insensitive name match.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Capability: produce the current resource identifier.
pub trait Identify {
    fn identifier(&self) -> ResourceIdentifier;
}

/// Capability: accept a resource identifier during unmarshaling.
pub trait AssignIdentifier {
    fn set_identifier(&mut self, identifier: &ResourceIdentifier);
}

/// Capability: marshal a whole value into a resource object, bypassing the
/// field walk.
pub trait MarshalResource {
    fn marshal_resource(&self, obj: &mut ResourceObject) -> Result<(), MarshalError>;
}

/// Capability: marshal a single field by hand.
///
/// `path` is where the field would have been written in the attribute tree.
pub trait MarshalField {
    fn marshal_field(
        &self,
        obj: &mut ResourceObject,
        meta: &FieldMeta,
        path: &AttributePath,
    ) -> Result<(), MarshalError>;
}

/// Read side of a field table.
pub trait Fields {
    /// Declared fields, in declaration order.
    fn descriptor(&self) -> &'static [FieldMeta];

    /// The value of the field at `index` in the descriptor.
    fn field(&self, index: usize) -> Option<FieldValue<'_>>;

    fn as_identify(&self) -> Option<&dyn Identify> {
        None
    }

    fn as_resource_marshaler(&self) -> Option<&dyn MarshalResource> {
        None
    }

    /// Name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Write side of a field table.
pub trait FieldsMut: Fields {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>>;

    fn as_assign_identifier(&mut self) -> Option<&mut dyn AssignIdentifier> {
        None
    }
}

/// Any serializable leaf value.
pub trait ToAttribute {
    fn to_attribute(&self) -> Result<Value, serde_json::Error>;
}

impl<T: Serialize + ?Sized> ToAttribute for T {
    fn to_attribute(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Read view of one field.
pub enum FieldValue<'a> {
    /// Serializable leaf written as an attribute.
    Attribute(&'a dyn ToAttribute),
    /// Unset optional value; written as `null` unless omitted.
    Null,
    /// Nested value. Becomes a relationship when it exposes an identifier,
    /// otherwise a nested attribute object.
    Compound(&'a dyn Fields),
    /// Unset to-one relationship; written as `"data": null` unless omitted.
    EmptyRelationship,
    /// Composition flattened into the owner's attribute path.
    Embedded(&'a dyn Fields),
    /// Collection of nested values, written as an array of attribute objects.
    List(Vec<&'a dyn Fields>),
    /// Collection of related resources, written as a to-many relationship.
    Relationships(Vec<&'a dyn Fields>),
    /// String-keyed nested values, written as an object of attribute objects.
    Map(Vec<(&'a str, &'a dyn Fields)>),
    /// Hand-written marshaling.
    Custom(&'a dyn MarshalField),
}

impl<'a> FieldValue<'a> {
    pub fn attribute<T: Serialize>(value: &'a T) -> Self {
        FieldValue::Attribute(value)
    }

    /// Leaf behind an `Option`: `None` is written as `null`.
    pub fn optional<T: Serialize>(value: Option<&'a T>) -> Self {
        match value {
            Some(value) => FieldValue::Attribute(value),
            None => FieldValue::Null,
        }
    }

    pub fn nested<T: Fields>(value: &'a T) -> Self {
        FieldValue::Compound(value)
    }

    /// Optional nested value or relationship.
    pub fn compound<T: Fields>(value: Option<&'a T>) -> Self {
        match value {
            Some(value) => FieldValue::Compound(value),
            None => FieldValue::Null,
        }
    }

    /// Optional to-one relationship: `None` is written as a relationship
    /// with `null` data rather than a `null` attribute.
    pub fn related<T: Fields>(value: Option<&'a T>) -> Self {
        match value {
            Some(value) => FieldValue::Compound(value),
            None => FieldValue::EmptyRelationship,
        }
    }

    pub fn embedded<T: Fields>(value: &'a T) -> Self {
        FieldValue::Embedded(value)
    }

    pub fn list<T: Fields>(items: &'a [T]) -> Self {
        FieldValue::List(items.iter().map(|item| item as &dyn Fields).collect())
    }

    /// Entries of a `BTreeMap<String, T>` or `HashMap<String, T>`.
    pub fn map<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a T)>,
        T: Fields + 'a,
    {
        FieldValue::Map(
            entries
                .into_iter()
                .map(|(key, item)| (key.as_str(), item as &dyn Fields))
                .collect(),
        )
    }

    pub fn relationships<T: Fields>(items: &'a [T]) -> Self {
        FieldValue::Relationships(items.iter().map(|item| item as &dyn Fields).collect())
    }

    pub fn custom<T: MarshalField>(value: &'a T) -> Self {
        FieldValue::Custom(value)
    }
}

/// A leaf that can be assigned from a wire value.
pub trait AttributeSlot {
    fn assign(&mut self, value: &Value, meta: &FieldMeta) -> Result<(), CoerceError>;
}

impl<T: FromAttribute> AttributeSlot for T {
    fn assign(&mut self, value: &Value, meta: &FieldMeta) -> Result<(), CoerceError> {
        *self = T::from_attribute(value, meta)?;
        Ok(())
    }
}

/// Storage for a single nested value (required, optional or boxed).
pub trait CompoundSlot {
    /// Reset to the unset state (`None`, or the default value).
    fn clear(&mut self);
    /// Make sure a value is present and return it.
    fn populate(&mut self) -> &mut dyn FieldsMut;
    /// The current value, if any.
    fn get_mut(&mut self) -> Option<&mut dyn FieldsMut>;
}

/// Storage for a collection of nested values.
pub trait ListSlot {
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn push_default(&mut self) -> &mut dyn FieldsMut;
    fn get_mut(&mut self, index: usize) -> Option<&mut dyn FieldsMut>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage for string-keyed nested values.
pub trait MapSlot {
    fn clear(&mut self);
    /// Insert a default value under `key`, replacing any previous one.
    fn insert_default(&mut self, key: &str) -> &mut dyn FieldsMut;
}

/// Write view of one field.
pub enum FieldMut<'a> {
    Attribute(&'a mut dyn AttributeSlot),
    Compound(Box<dyn CompoundSlot + 'a>),
    Embedded(&'a mut dyn FieldsMut),
    List(Box<dyn ListSlot + 'a>),
    Map(Box<dyn MapSlot + 'a>),
}

impl<'a> FieldMut<'a> {
    pub fn attribute<T: FromAttribute>(value: &'a mut T) -> Self {
        FieldMut::Attribute(value)
    }

    /// Required nested value; clearing resets it to its default.
    pub fn nested<T: FieldsMut + Default>(value: &'a mut T) -> Self {
        FieldMut::Compound(Box::new(ValueSlot(value)))
    }

    pub fn optional<T: FieldsMut + Default>(value: &'a mut Option<T>) -> Self {
        FieldMut::Compound(Box::new(OptionSlot(value)))
    }

    pub fn boxed<T: FieldsMut + Default>(value: &'a mut Option<Box<T>>) -> Self {
        FieldMut::Compound(Box::new(OptionBoxSlot(value)))
    }

    pub fn embedded<T: FieldsMut>(value: &'a mut T) -> Self {
        FieldMut::Embedded(value)
    }

    pub fn list<T: FieldsMut + Default>(items: &'a mut Vec<T>) -> Self {
        FieldMut::List(Box::new(VecSlot(items)))
    }

    pub fn map<T: FieldsMut + Default>(entries: &'a mut BTreeMap<String, T>) -> Self {
        FieldMut::Map(Box::new(BTreeMapSlot(entries)))
    }

    pub fn hash_map<T: FieldsMut + Default>(entries: &'a mut HashMap<String, T>) -> Self {
        FieldMut::Map(Box::new(HashMapSlot(entries)))
    }
}

struct ValueSlot<'a, T>(&'a mut T);

impl<T: FieldsMut + Default> CompoundSlot for ValueSlot<'_, T> {
    fn clear(&mut self) {
        *self.0 = T::default();
    }

    fn populate(&mut self) -> &mut dyn FieldsMut {
        &mut *self.0
    }

    fn get_mut(&mut self) -> Option<&mut dyn FieldsMut> {
        Some(&mut *self.0)
    }
}

struct OptionSlot<'a, T>(&'a mut Option<T>);

impl<T: FieldsMut + Default> CompoundSlot for OptionSlot<'_, T> {
    fn clear(&mut self) {
        *self.0 = None;
    }

    fn populate(&mut self) -> &mut dyn FieldsMut {
        self.0.get_or_insert_with(T::default)
    }

    fn get_mut(&mut self) -> Option<&mut dyn FieldsMut> {
        self.0.as_mut().map(|value| value as &mut dyn FieldsMut)
    }
}

struct OptionBoxSlot<'a, T>(&'a mut Option<Box<T>>);

impl<T: FieldsMut + Default> CompoundSlot for OptionBoxSlot<'_, T> {
    fn clear(&mut self) {
        *self.0 = None;
    }

    fn populate(&mut self) -> &mut dyn FieldsMut {
        let value = self.0.get_or_insert_with(Box::default);
        &mut **value
    }

    fn get_mut(&mut self) -> Option<&mut dyn FieldsMut> {
        self.0
            .as_mut()
            .map(|value| &mut **value as &mut dyn FieldsMut)
    }
}

struct VecSlot<'a, T>(&'a mut Vec<T>);

impl<T: FieldsMut + Default> ListSlot for VecSlot<'_, T> {
    fn clear(&mut self) {
        self.0.clear();
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn push_default(&mut self) -> &mut dyn FieldsMut {
        self.0.push(T::default());
        let last = self.0.len() - 1;
        &mut self.0[last]
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn FieldsMut> {
        self.0
            .get_mut(index)
            .map(|value| value as &mut dyn FieldsMut)
    }
}

struct BTreeMapSlot<'a, T>(&'a mut BTreeMap<String, T>);

impl<T: FieldsMut + Default> MapSlot for BTreeMapSlot<'_, T> {
    fn clear(&mut self) {
        self.0.clear();
    }

    fn insert_default(&mut self, key: &str) -> &mut dyn FieldsMut {
        match self.0.entry(key.to_string()) {
            btree_map::Entry::Occupied(mut entry) => {
                entry.insert(T::default());
                entry.into_mut()
            }
            btree_map::Entry::Vacant(entry) => entry.insert(T::default()),
        }
    }
}

struct HashMapSlot<'a, T>(&'a mut HashMap<String, T>);

impl<T: FieldsMut + Default> MapSlot for HashMapSlot<'_, T> {
    fn clear(&mut self) {
        self.0.clear();
    }

    fn insert_default(&mut self, key: &str) -> &mut dyn FieldsMut {
        match self.0.entry(key.to_string()) {
            hash_map::Entry::Occupied(mut entry) => {
                entry.insert(T::default());
                entry.into_mut()
            }
            hash_map::Entry::Vacant(entry) => entry.insert(T::default()),
        }
    }
}
