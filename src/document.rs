//! Top-level JSON:API documents and the construction-time `DocumentData` helper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, DocumentError, MarshalError, UnmarshalError};
use crate::fields::{Fields, FieldsMut};
use crate::marshal::{marshal_resource, marshal_resources};
use crate::model::{JsonApiObject, PrimaryData, RelationshipData, ResourceIdentifier, ResourceObject};
use crate::types::{
    MarshalOptions, Page, PAGE_LIMIT_KEY, PAGE_OFFSET_KEY, PAGE_SORT_KEY, PAGE_TOTAL_KEY, VERSION,
};
use crate::unmarshal::unmarshal_resource;

/// A JSON:API document.
///
/// `data` and `errors` are mutually exclusive in a well-formed outbound
/// document; `included` only makes sense alongside `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "PrimaryData::is_none")]
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonapi: Option<JsonApiObject>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub links: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceObject>,
}

impl Document {
    /// An empty document carrying the protocol version.
    pub fn new() -> Self {
        Self {
            jsonapi: Some(JsonApiObject::version(VERSION)),
            ..Self::default()
        }
    }

    /// Decode a wire document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        serde_json::from_slice(bytes).map_err(|source| DocumentError::InvalidJson { source })
    }

    pub fn add_error(&mut self, error: impl Into<ApiError>) -> &mut Self {
        self.errors.push(error.into());
        self
    }

    /// The included resource with this `id` and `type`.
    pub fn find_included(&self, id: &str, type_: &str) -> Option<&ResourceObject> {
        self.included
            .iter()
            .find(|obj| obj.id() == id && obj.type_name() == type_)
    }

    /// Primary resources in order.
    pub fn resources(&self) -> &[ResourceObject] {
        self.data.resources()
    }

    pub fn resources_mut(&mut self) -> &mut [ResourceObject] {
        self.data.resources_mut()
    }

    /// Marshal one value into `data`.
    pub fn set_data<T: Fields>(
        &mut self,
        value: &T,
        options: &MarshalOptions,
    ) -> Result<(), MarshalError> {
        self.data = PrimaryData::One(Box::new(marshal_resource(value, options)?));
        Ok(())
    }

    /// Marshal a sequence into `data`. An empty sequence becomes `[]`.
    pub fn set_data_many<T: Fields>(
        &mut self,
        values: &[T],
        options: &MarshalOptions,
    ) -> Result<(), MarshalError> {
        self.data = PrimaryData::Many(marshal_resources(values, options)?);
        Ok(())
    }

    /// Marshal `data` into this document: primary data, per-item links and
    /// meta, document meta, pagination and pre-resolved included resources.
    pub fn set_document_data<T: Fields>(
        &mut self,
        data: &DocumentData<T>,
        options: &MarshalOptions,
    ) -> Result<(), MarshalError> {
        let mut resources = Vec::with_capacity(data.items.len());
        for item in &data.items {
            let mut obj = marshal_resource(&item.data, options)?;
            obj.meta
                .extend(item.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
            obj.links
                .extend(item.links.iter().map(|(k, v)| (k.clone(), v.clone())));
            resources.push(obj);
        }

        self.data = if data.is_many {
            PrimaryData::Many(resources)
        } else {
            match resources.pop() {
                Some(obj) => PrimaryData::One(Box::new(obj)),
                None => PrimaryData::None,
            }
        };

        self.meta
            .extend(data.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(page) = &data.page {
            self.meta.insert(PAGE_LIMIT_KEY.into(), page.limit.into());
            self.meta.insert(PAGE_OFFSET_KEY.into(), page.offset.into());
            self.meta
                .insert(PAGE_SORT_KEY.into(), page.sort.join(",").into());
            self.meta
                .insert(PAGE_TOTAL_KEY.into(), page.total_count.into());
        }
        self.included.extend(data.included.iter().cloned());
        Ok(())
    }

    /// Relationship linkage aggregated over all primary resources.
    ///
    /// Relationships without linkage (`null` or no `data`) appear with an
    /// empty list.
    pub fn relationships(&self) -> BTreeMap<String, Vec<ResourceIdentifier>> {
        let mut aggregated: BTreeMap<String, Vec<ResourceIdentifier>> = BTreeMap::new();
        for obj in self.resources() {
            for (name, relationship) in &obj.relationships {
                let entry = aggregated.entry(name.clone()).or_default();
                if let RelationshipData::One(_) | RelationshipData::Many(_) = relationship.data {
                    entry.extend(relationship.data.identifiers().iter().cloned());
                }
            }
        }
        aggregated
    }

    /// Unmarshal single primary data. `Ok(None)` when there is no data.
    ///
    /// # Errors
    ///
    /// `UnmarshalError::ShapeMismatch` when `data` is an array.
    pub fn map_data<T: FieldsMut + Default>(&self) -> Result<Option<T>, UnmarshalError> {
        match &self.data {
            PrimaryData::None => Ok(None),
            PrimaryData::One(obj) => {
                let mut value = T::default();
                unmarshal_resource(obj, &self.included, &mut value)?;
                Ok(Some(value))
            }
            PrimaryData::Many(_) => Err(UnmarshalError::ShapeMismatch {
                path: "data".into(),
                expected: "resource object",
                actual: "array",
            }),
        }
    }

    /// Unmarshal every primary resource in order.
    pub fn map_data_many<T: FieldsMut + Default>(&self) -> Result<Vec<T>, UnmarshalError> {
        self.resources()
            .iter()
            .map(|obj| {
                let mut value = T::default();
                unmarshal_resource(obj, &self.included, &mut value)?;
                Ok(value)
            })
            .collect()
    }

    /// Outbound HTTP status: the highest error status, 200 without errors.
    pub fn status(&self) -> u16 {
        self.errors
            .iter()
            .map(ApiError::status_code)
            .max()
            .map_or(200, |status| status.max(200))
    }

    /// Drop the local-object pools of all primary resources.
    pub fn strip_local_objects(&mut self) {
        for obj in self.resources_mut() {
            obj.clear_local_objects();
        }
    }
}

/// Decode a request body into a document. An empty body is an empty document.
pub fn bind_document(body: &[u8]) -> Result<Document, DocumentError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::default());
    }
    Document::from_slice(body)
}

/// Decode a request body straight into a domain value.
pub fn bind<T: FieldsMut + Default>(body: &[u8]) -> Result<Option<T>, DocumentError> {
    Ok(bind_document(body)?.map_data()?)
}

/// One domain value with its per-resource links and meta.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDataItem<T> {
    pub data: T,
    pub links: Map<String, Value>,
    pub meta: Map<String, Value>,
}

impl<T> DocumentDataItem<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            links: Map::new(),
            meta: Map::new(),
        }
    }
}

/// Construction-time helper pairing domain values with links, meta and
/// pagination. Not a wire type.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentData<T> {
    pub items: Vec<DocumentDataItem<T>>,
    pub page: Option<Page>,
    pub is_many: bool,
    pub meta: Map<String, Value>,
    pub included: Vec<ResourceObject>,
}

impl<T: Fields> DocumentData<T> {
    /// Single primary resource. With `self_link`, the resource gets a
    /// `self` link of `<self_link>/<id>`.
    pub fn single(value: T, self_link: Option<&str>) -> Self {
        Self::build(vec![value], self_link, false)
    }

    /// Collection of primary resources, each linked like [`Self::single`].
    pub fn many(values: Vec<T>, self_link: Option<&str>) -> Self {
        Self::build(values, self_link, true)
    }

    fn build(values: Vec<T>, self_link: Option<&str>, is_many: bool) -> Self {
        let items = values
            .into_iter()
            .map(|value| {
                let mut item = DocumentDataItem::new(value);
                if let Some(base) = self_link {
                    let id = item
                        .data
                        .as_identify()
                        .map(|identify| identify.identifier().id)
                        .unwrap_or_default();
                    item.links
                        .insert("self".into(), Value::String(join_link(base, &id)));
                }
                item
            })
            .collect();
        Self {
            items,
            page: None,
            is_many,
            meta: Map::new(),
            included: Vec::new(),
        }
    }
}

impl<T> DocumentData<T> {
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Resources to place in `included` before include resolution runs.
    pub fn with_included(mut self, included: Vec<ResourceObject>) -> Self {
        self.included = included;
        self
    }

    /// The first domain value, if any.
    pub fn first(&self) -> Option<&T> {
        self.items.first().map(|item| &item.data)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|item| &item.data)
    }
}

fn join_link(base: &str, id: &str) -> String {
    if id.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), id)
}
