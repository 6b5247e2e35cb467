//! Domain models shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use jsonapi_mapper::{
    AssignIdentifier, FieldMeta, FieldMut, FieldValue, Fields, FieldsMut, Identify,
    MarshalOptions, ResourceIdentifier, ResourceObject,
};

// === Address: nested value without identity ===

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
}

const ADDRESS_FIELDS: &[FieldMeta] = &[FieldMeta::new("street"), FieldMeta::new("city")];

impl Fields for Address {
    fn descriptor(&self) -> &'static [FieldMeta] {
        ADDRESS_FIELDS
    }
    fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        match index {
            0 => Some(FieldValue::attribute(&self.street)),
            1 => Some(FieldValue::attribute(&self.city)),
            _ => None,
        }
    }
}

impl FieldsMut for Address {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
        match index {
            0 => Some(FieldMut::attribute(&mut self.street)),
            1 => Some(FieldMut::attribute(&mut self.city)),
            _ => None,
        }
    }
}

// === Tag: list element without identity ===

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub label: String,
    pub weight: u8,
}

const TAG_FIELDS: &[FieldMeta] = &[FieldMeta::new("label"), FieldMeta::new("weight")];

impl Tag {
    pub fn new(label: &str, weight: u8) -> Self {
        Self {
            label: label.to_string(),
            weight,
        }
    }
}

impl Fields for Tag {
    fn descriptor(&self) -> &'static [FieldMeta] {
        TAG_FIELDS
    }
    fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        match index {
            0 => Some(FieldValue::attribute(&self.label)),
            1 => Some(FieldValue::attribute(&self.weight)),
            _ => None,
        }
    }
}

impl FieldsMut for Tag {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
        match index {
            0 => Some(FieldMut::attribute(&mut self.label)),
            1 => Some(FieldMut::attribute(&mut self.weight)),
            _ => None,
        }
    }
}

// === Person ===

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub address: Option<Address>,
    pub places: BTreeMap<String, Address>,
}

const PERSON_FIELDS: &[FieldMeta] = &[
    FieldMeta::new("name").omit_empty(),
    FieldMeta::new("address").omit_empty(),
    FieldMeta::new("places").omit_empty(),
];

impl Person {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            address: None,
            places: BTreeMap::new(),
        }
    }

    pub fn living_at(mut self, street: &str, city: &str) -> Self {
        self.address = Some(Address {
            street: street.to_string(),
            city: city.to_string(),
        });
        self
    }

    pub fn with_place(mut self, label: &str, street: &str, city: &str) -> Self {
        self.places.insert(
            label.to_string(),
            Address {
                street: street.to_string(),
                city: city.to_string(),
            },
        );
        self
    }
}

impl Identify for Person {
    fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.id.clone(), "person")
    }
}

impl AssignIdentifier for Person {
    fn set_identifier(&mut self, identifier: &ResourceIdentifier) {
        self.id = identifier.id.clone();
    }
}

impl Fields for Person {
    fn descriptor(&self) -> &'static [FieldMeta] {
        PERSON_FIELDS
    }
    fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        match index {
            0 => Some(FieldValue::attribute(&self.name)),
            1 => Some(FieldValue::compound(self.address.as_ref())),
            2 => Some(FieldValue::map(&self.places)),
            _ => None,
        }
    }
    fn as_identify(&self) -> Option<&dyn Identify> {
        Some(self)
    }
}

impl FieldsMut for Person {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
        match index {
            0 => Some(FieldMut::attribute(&mut self.name)),
            1 => Some(FieldMut::optional(&mut self.address)),
            2 => Some(FieldMut::map(&mut self.places)),
            _ => None,
        }
    }
    fn as_assign_identifier(&mut self) -> Option<&mut dyn AssignIdentifier> {
        Some(self)
    }
}

// === Comment ===

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: Option<Person>,
}

const COMMENT_FIELDS: &[FieldMeta] = &[
    FieldMeta::new("body"),
    FieldMeta::new("author").omit_empty(),
];

impl Comment {
    pub fn new(id: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            body: body.to_string(),
            author: None,
        }
    }

    pub fn by(mut self, author: Person) -> Self {
        self.author = Some(author);
        self
    }
}

impl Identify for Comment {
    fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.id.clone(), "comment")
    }
}

impl AssignIdentifier for Comment {
    fn set_identifier(&mut self, identifier: &ResourceIdentifier) {
        self.id = identifier.id.clone();
    }
}

impl Fields for Comment {
    fn descriptor(&self) -> &'static [FieldMeta] {
        COMMENT_FIELDS
    }
    fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        match index {
            0 => Some(FieldValue::attribute(&self.body)),
            1 => Some(FieldValue::related(self.author.as_ref())),
            _ => None,
        }
    }
    fn as_identify(&self) -> Option<&dyn Identify> {
        Some(self)
    }
}

impl FieldsMut for Comment {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
        match index {
            0 => Some(FieldMut::attribute(&mut self.body)),
            1 => Some(FieldMut::optional(&mut self.author)),
            _ => None,
        }
    }
    fn as_assign_identifier(&mut self) -> Option<&mut dyn AssignIdentifier> {
        Some(self)
    }
}

// === Post ===

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub tags: Vec<Tag>,
    pub scores: BTreeMap<String, i64>,
    pub author: Option<Person>,
    pub comments: Vec<Comment>,
}

const POST_FIELDS: &[FieldMeta] = &[
    FieldMeta::new("title"),
    FieldMeta::new("subtitle").omit_empty(),
    FieldMeta::new("tags").omit_empty(),
    FieldMeta::new("scores").omit_empty(),
    FieldMeta::new("author"),
    FieldMeta::new("comments"),
];

impl Post {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            ..Self::default()
        }
    }
}

impl Identify for Post {
    fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.id.clone(), "post")
    }
}

impl AssignIdentifier for Post {
    fn set_identifier(&mut self, identifier: &ResourceIdentifier) {
        self.id = identifier.id.clone();
    }
}

impl Fields for Post {
    fn descriptor(&self) -> &'static [FieldMeta] {
        POST_FIELDS
    }
    fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        match index {
            0 => Some(FieldValue::attribute(&self.title)),
            1 => Some(FieldValue::optional(self.subtitle.as_ref())),
            2 => Some(FieldValue::list(&self.tags)),
            3 => Some(FieldValue::attribute(&self.scores)),
            4 => Some(FieldValue::related(self.author.as_ref())),
            5 => Some(FieldValue::relationships(&self.comments)),
            _ => None,
        }
    }
    fn as_identify(&self) -> Option<&dyn Identify> {
        Some(self)
    }
}

impl FieldsMut for Post {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
        match index {
            0 => Some(FieldMut::attribute(&mut self.title)),
            1 => Some(FieldMut::attribute(&mut self.subtitle)),
            2 => Some(FieldMut::list(&mut self.tags)),
            3 => Some(FieldMut::attribute(&mut self.scores)),
            4 => Some(FieldMut::optional(&mut self.author)),
            5 => Some(FieldMut::list(&mut self.comments)),
            _ => None,
        }
    }
    fn as_assign_identifier(&mut self) -> Option<&mut dyn AssignIdentifier> {
        Some(self)
    }
}

// === Item: numeric id, caller-chosen type, optional self relationship ===

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub id: u32,
    pub type_: String,
    pub attribute_a: String,
    pub attribute_b: String,
    pub relationship_a: Option<Box<Item>>,
}

pub const ITEM_TYPE: &str = "default.item";

const ITEM_FIELDS: &[FieldMeta] = &[
    FieldMeta::new("ID"),
    FieldMeta::new("Type"),
    FieldMeta::new("attributeA").omit_empty(),
    FieldMeta::new("attributeB").omit_empty(),
    FieldMeta::new("relationshipA").omit_empty(),
];

impl Item {
    pub fn new(id: u32, attribute_a: &str, attribute_b: &str) -> Self {
        Self {
            id,
            type_: ITEM_TYPE.to_string(),
            attribute_a: attribute_a.to_string(),
            attribute_b: attribute_b.to_string(),
            relationship_a: None,
        }
    }

    pub fn related_to(mut self, other: Item) -> Self {
        self.relationship_a = Some(Box::new(other));
        self
    }
}

impl Identify for Item {
    fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.id.to_string(), self.type_.clone())
    }
}

impl AssignIdentifier for Item {
    fn set_identifier(&mut self, identifier: &ResourceIdentifier) {
        self.id = identifier.id.parse().unwrap_or_default();
        self.type_ = identifier.type_.clone();
    }
}

impl Fields for Item {
    fn descriptor(&self) -> &'static [FieldMeta] {
        ITEM_FIELDS
    }
    fn field(&self, index: usize) -> Option<FieldValue<'_>> {
        match index {
            0 => Some(FieldValue::attribute(&self.id)),
            1 => Some(FieldValue::attribute(&self.type_)),
            2 => Some(FieldValue::attribute(&self.attribute_a)),
            3 => Some(FieldValue::attribute(&self.attribute_b)),
            4 => Some(FieldValue::related(self.relationship_a.as_deref())),
            _ => None,
        }
    }
    fn as_identify(&self) -> Option<&dyn Identify> {
        Some(self)
    }
}

impl FieldsMut for Item {
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
        match index {
            0 => Some(FieldMut::attribute(&mut self.id)),
            1 => Some(FieldMut::attribute(&mut self.type_)),
            2 => Some(FieldMut::attribute(&mut self.attribute_a)),
            3 => Some(FieldMut::attribute(&mut self.attribute_b)),
            4 => Some(FieldMut::boxed(&mut self.relationship_a)),
            _ => None,
        }
    }
    fn as_assign_identifier(&mut self) -> Option<&mut dyn AssignIdentifier> {
        Some(self)
    }
}

// === Fixtures ===

/// Marshal with default options, panicking on failure.
pub fn resource(value: &dyn Fields) -> ResourceObject {
    jsonapi_mapper::marshal_resource(value, &MarshalOptions::new()).unwrap()
}

/// Post 1 with comments 5 and 12, both written by person 9.
pub fn blog() -> (Post, Vec<ResourceObject>) {
    let ada = Person::new("9", "Ada").living_at("Main St 1", "London");
    let mut post = Post::new("1", "Hello");
    post.author = Some(Person::new("9", ""));
    post.comments = vec![
        Comment::new("5", "First!").by(Person::new("9", "")),
        Comment::new("12", "Nice post").by(Person::new("9", "")),
    ];

    let store = vec![
        resource(&ada),
        resource(&post.comments[0]),
        resource(&post.comments[1]),
    ];
    (post, store)
}
