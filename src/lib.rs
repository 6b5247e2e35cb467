//! JSON:API Mapper
//!
//! Bidirectional mapping between domain values and JSON:API documents.
//!
//! Domain types describe themselves through a small field table
//! ([`Fields`] / [`FieldsMut`]); the marshaler turns them into resource
//! objects, the unmarshaler fills them back in from a document and its
//! `included` pool, and the include resolver follows `include=a.b` paths
//! through an injected [`Resolver`].
//!
//! # Example
//!
//! ```
//! use jsonapi_mapper::{
//!     Document, FieldMeta, FieldMut, FieldValue, Fields, FieldsMut, Identify,
//!     AssignIdentifier, MarshalOptions, ResourceIdentifier,
//! };
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     id: String,
//!     name: String,
//! }
//!
//! const PERSON: &[FieldMeta] = &[FieldMeta::new("id"), FieldMeta::new("name")];
//!
//! impl Identify for Person {
//!     fn identifier(&self) -> ResourceIdentifier {
//!         ResourceIdentifier::new(self.id.clone(), "person")
//!     }
//! }
//!
//! impl AssignIdentifier for Person {
//!     fn set_identifier(&mut self, identifier: &ResourceIdentifier) {
//!         self.id = identifier.id.clone();
//!     }
//! }
//!
//! impl Fields for Person {
//!     fn descriptor(&self) -> &'static [FieldMeta] {
//!         PERSON
//!     }
//!     fn field(&self, index: usize) -> Option<FieldValue<'_>> {
//!         match index {
//!             0 => Some(FieldValue::attribute(&self.id)),
//!             1 => Some(FieldValue::attribute(&self.name)),
//!             _ => None,
//!         }
//!     }
//!     fn as_identify(&self) -> Option<&dyn Identify> {
//!         Some(self)
//!     }
//! }
//!
//! impl FieldsMut for Person {
//!     fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>> {
//!         match index {
//!             0 => Some(FieldMut::attribute(&mut self.id)),
//!             1 => Some(FieldMut::attribute(&mut self.name)),
//!             _ => None,
//!         }
//!     }
//!     fn as_assign_identifier(&mut self) -> Option<&mut dyn AssignIdentifier> {
//!         Some(self)
//!     }
//! }
//!
//! let ada = Person { id: "1".into(), name: "Ada".into() };
//! let mut doc = Document::new();
//! doc.set_data(&ada, &MarshalOptions::new()).unwrap();
//!
//! let wire = serde_json::to_value(&doc).unwrap();
//! assert_eq!(wire["data"]["attributes"]["name"], "Ada");
//! assert!(wire["data"]["attributes"].get("id").is_none());
//!
//! let back: Option<Person> = doc.map_data().unwrap();
//! assert_eq!(back, Some(ada));
//! ```
//!
//! # Relationships
//!
//! | Field value | Wire form |
//! |-------------|-----------|
//! | compound value with identity | `relationships.<name>.data = {id, type}` |
//! | compound value without identity | nested attribute object |
//! | declared to-many relationship | `relationships.<name>.data = [...]` |
//! | absent related value | `relationships.<name>.data = null` |
//!
//! Related values without a server id get a synthetic `lid` of the form
//! `<owner id or lid>_<n>` and are stashed on the owner, so a later include
//! resolution can place them in `included` without a resolver round-trip.

mod atomic;
mod coerce;
mod document;
mod error;
mod fields;
mod handler;
mod include;
mod linter;
mod loader;
mod marshal;
mod model;
mod path;
mod query;
mod types;
mod unmarshal;
mod validator;

pub use atomic::{
    AtomicDocument, Operation, OperationCode, OperationRef, OperationResult, ATOMIC_EXTENSION,
};
pub use coerce::{parse_moment, FromAttribute};
pub use document::{bind, bind_document, Document, DocumentData, DocumentDataItem};
pub use error::{
    ApiError, CoerceError, DocumentError, IncludeError, LoadError, MarshalError, PathError,
    SchemaError, UnmarshalError, ValidateError,
};
pub use fields::{
    AssignIdentifier, AttributeSlot, CompoundSlot, FieldMeta, FieldMut, FieldValue, Fields,
    FieldsMut, Identify, ListSlot, MapSlot, MarshalField, MarshalResource, ToAttribute,
};
pub use handler::{
    write_document, BeforeWrite, DocumentUpdater, Handler, RequestResolver,
    RESPONSE_CONTENT_TYPE,
};
pub use include::{resolve_includes, Resolver};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{is_url, load_document, load_document_auto, load_document_str};
pub use marshal::{is_empty_value, marshal_resource, marshal_resources};
pub use model::{
    JsonApiObject, PrimaryData, Relationship, RelationshipData, ResourceIdentifier,
    ResourceObject,
};
pub use path::{get_attribute, set_attribute, AttributePath, Segment};
pub use query::{QueryParams, DEFAULT_PAGE_LIMIT};
pub use types::{
    combine_filters, default_lid_generator, is_reserved_name, json_type_name,
    sparse_fieldset_filter, FieldFilter, IncludeOptions, LidGenerator, MarshalOptions, Page,
    TimeFormat, ATOMIC_MEDIA_TYPE, MEDIA_TYPE, PAGE_LIMIT_KEY, PAGE_OFFSET_KEY, PAGE_SORT_KEY,
    PAGE_TOTAL_KEY, RESERVED_NAMES, VERSION,
};
pub use unmarshal::{find_included, unmarshal_resource};
pub use validator::{validate_against_schema, validate_document, DocumentKind};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
