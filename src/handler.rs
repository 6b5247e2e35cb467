//! Generic request handler: media type check, marshal, includes, response.

use std::fmt;
use std::sync::Arc;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::request::Parts;
use http::{Response, StatusCode};
use tracing::{debug, warn};

use crate::document::{Document, DocumentData};
use crate::error::ApiError;
use crate::fields::Fields;
use crate::include::resolve_includes;
use crate::model::{ResourceIdentifier, ResourceObject};
use crate::query::QueryParams;
use crate::types::{
    combine_filters, sparse_fieldset_filter, FieldFilter, IncludeOptions, MarshalOptions,
    ATOMIC_MEDIA_TYPE, MEDIA_TYPE,
};

/// Content type of every response.
pub const RESPONSE_CONTENT_TYPE: &str = "application/vnd.api+json; charset=utf-8";

/// Resolver with access to the request, used for `include`.
pub type RequestResolver = Arc<
    dyn Fn(&Parts, &ResourceIdentifier) -> Result<Option<ResourceObject>, ApiError> + Send + Sync,
>;

/// Last hook before a successful document is written.
pub type BeforeWrite<T> =
    Arc<dyn Fn(&Parts, &DocumentData<T>, &mut Document) -> Result<(), ApiError> + Send + Sync>;

/// Post-processing step applied to every successful document.
pub trait DocumentUpdater: Send + Sync {
    fn update(&self, doc: &mut Document) -> Result<(), ApiError>;
}

impl<F> DocumentUpdater for F
where
    F: Fn(&mut Document) -> Result<(), ApiError> + Send + Sync,
{
    fn update(&self, doc: &mut Document) -> Result<(), ApiError> {
        self(doc)
    }
}

/// Turns domain results into JSON:API responses.
pub struct Handler<T> {
    media_type: String,
    resolver: Option<RequestResolver>,
    field_filter: Option<FieldFilter>,
    updaters: Vec<Arc<dyn DocumentUpdater>>,
    before_write: Option<BeforeWrite<T>>,
    include_options: IncludeOptions,
    marshal_options: MarshalOptions,
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            media_type: self.media_type.clone(),
            resolver: self.resolver.clone(),
            field_filter: self.field_filter.clone(),
            updaters: self.updaters.clone(),
            before_write: self.before_write.clone(),
            include_options: self.include_options,
            marshal_options: self.marshal_options.clone(),
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("media_type", &self.media_type)
            .field("resolver", &self.resolver.is_some())
            .field("updaters", &self.updaters.len())
            .field("include_options", &self.include_options)
            .finish_non_exhaustive()
    }
}

impl<T> Default for Handler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Handler<T> {
    /// A handler expecting `application/vnd.api+json`.
    pub fn new() -> Self {
        Self {
            media_type: MEDIA_TYPE.to_string(),
            resolver: None,
            field_filter: None,
            updaters: Vec::new(),
            before_write: None,
            include_options: IncludeOptions::default(),
            marshal_options: MarshalOptions::default(),
        }
    }

    /// Expect the atomic operations media type instead.
    pub fn atomic(self) -> Self {
        self.media_type(ATOMIC_MEDIA_TYPE)
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Parts, &ResourceIdentifier) -> Result<Option<ResourceObject>, ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Filter applied in addition to the request's sparse fieldsets.
    pub fn field_filter(mut self, filter: FieldFilter) -> Self {
        self.field_filter = Some(filter);
        self
    }

    pub fn updater(mut self, updater: impl DocumentUpdater + 'static) -> Self {
        self.updaters.push(Arc::new(updater));
        self
    }

    pub fn before_write<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Parts, &DocumentData<T>, &mut Document) -> Result<(), ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.before_write = Some(Arc::new(hook));
        self
    }

    pub fn include_options(mut self, options: IncludeOptions) -> Self {
        self.include_options = options;
        self
    }

    /// Marshal options; any filter they carry is combined with the others.
    pub fn marshal_options(mut self, options: MarshalOptions) -> Self {
        self.marshal_options = options;
        self
    }

    /// A document holding one error.
    pub fn error_document(&self, error: impl Into<ApiError>) -> Document {
        let mut doc = Document::new();
        doc.add_error(error);
        doc
    }
}

impl<T: Fields> Handler<T> {
    /// Run `f` for a request and build the response.
    ///
    /// Requests whose `Content-Type` differs from the configured media type
    /// get 415 without calling `f`. `Ok(None)` from `f` is written as 204.
    pub fn handle<F>(&self, parts: &Parts, f: F) -> Response<Vec<u8>>
    where
        F: FnOnce(&Parts) -> Result<Option<DocumentData<T>>, ApiError>,
    {
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        if content_type != Some(self.media_type.as_str()) {
            debug!(
                content_type = content_type.unwrap_or_default(),
                expected = %self.media_type,
                "unsupported media type"
            );
            return plain_response(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        }

        let data = match f(parts) {
            Ok(Some(data)) => data,
            Ok(None) => return write_document(None),
            Err(err) => return write_document(Some(&self.error_document(err))),
        };

        let mut doc = self.new_document(parts, &data);
        if !doc.errors.is_empty() {
            return write_document(Some(&doc));
        }
        for updater in &self.updaters {
            if let Err(err) = updater.update(&mut doc) {
                return write_document(Some(&self.error_document(err)));
            }
        }
        if let Some(hook) = &self.before_write {
            if let Err(err) = hook(parts, &data, &mut doc) {
                return write_document(Some(&self.error_document(err)));
            }
        }
        write_document(Some(&doc))
    }

    /// Marshal `data` for a request, applying its sparse fieldsets and
    /// resolving its `include` parameter. Failures come back as an error
    /// document.
    pub fn new_document(&self, parts: &Parts, data: &DocumentData<T>) -> Document {
        let query = QueryParams::from_uri(&parts.uri);

        let mut filter = sparse_fieldset_filter(query.sparse_fieldsets());
        for extra in [&self.field_filter, &self.marshal_options.field_filter]
            .into_iter()
            .flatten()
        {
            filter = combine_filters(filter, extra.clone());
        }
        let options = self.marshal_options.clone().field_filter(filter);

        let mut doc = Document::new();
        if let Err(err) = doc.set_document_data(data, &options) {
            return self.error_document(err);
        }

        if let Some(resolver) = &self.resolver {
            let includes = query.includes();
            if !includes.is_empty() {
                let resolve = |identifier: &ResourceIdentifier| resolver(parts, identifier);
                if let Err(err) =
                    resolve_includes(&resolve, &includes, &mut doc, &self.include_options)
                {
                    return self.error_document(err);
                }
            }
        }

        doc.strip_local_objects();
        doc
    }
}

/// Serialize `doc` as a response. `None` is 204 with an empty body.
///
/// The status is the highest error status in the document, at least 200.
pub fn write_document(doc: Option<&Document>) -> Response<Vec<u8>> {
    let Some(doc) = doc else {
        return response(StatusCode::NO_CONTENT, Vec::new());
    };

    for error in &doc.errors {
        warn!(
            status = %error.status,
            title = %error.title,
            detail = %error.detail,
            "writing error object"
        );
    }

    let status = StatusCode::from_u16(doc.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_vec(doc) {
        Ok(body) => response(status, body),
        Err(err) => {
            warn!(error = %err, "failed to serialize document");
            plain_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn plain_response(status: StatusCode) -> Response<Vec<u8>> {
    let text = status.canonical_reason().unwrap_or_default();
    response(status, text.as_bytes().to_vec())
}

fn response(status: StatusCode, body: Vec<u8>) -> Response<Vec<u8>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(RESPONSE_CONTENT_TYPE));
    response
}
