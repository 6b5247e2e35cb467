//! Integration tests for include resolution.

mod common;

use std::cell::Cell;

use common::{resource, Person, Post};
use jsonapi_mapper::{
    resolve_includes, ApiError, Document, IncludeError, IncludeOptions, MarshalOptions,
    ResourceIdentifier, ResourceObject,
};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Resolver answering from `store`, counting calls.
fn store_resolver<'a>(
    store: &'a [ResourceObject],
    calls: &'a Cell<usize>,
) -> impl Fn(&ResourceIdentifier) -> Result<Option<ResourceObject>, ApiError> + 'a {
    move |identifier: &ResourceIdentifier| {
        calls.set(calls.get() + 1);
        Ok(store
            .iter()
            .find(|obj| obj.identifier == *identifier)
            .cloned())
    }
}

fn failing_resolver(
    _identifier: &ResourceIdentifier,
) -> Result<Option<ResourceObject>, ApiError> {
    Err(ApiError::new(503, "store unavailable"))
}

fn blog_document() -> (Document, Vec<ResourceObject>) {
    let (post, store) = common::blog();
    let mut doc = Document::new();
    doc.set_data(&post, &MarshalOptions::new()).unwrap();
    (doc, store)
}

fn included_keys(doc: &Document) -> Vec<String> {
    doc.included
        .iter()
        .map(|obj| format!("{}/{}", obj.type_name(), obj.id()))
        .collect()
}

mod traversal {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_path_in_encounter_order() {
        let (mut doc, store) = blog_document();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["comments.author"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(
            included_keys(&doc),
            vec!["comment/5", "person/9", "comment/12"]
        );
        // person 9 is reached twice but resolved once
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn several_paths_share_the_cache() {
        let (mut doc, store) = blog_document();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["author", " ", "", "comments"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(
            included_keys(&doc),
            vec!["person/9", "comment/5", "comment/12"]
        );
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn existing_included_seed_the_cache() {
        let (mut doc, store) = blog_document();
        doc.included.push(resource(&Person::new("9", "Cached")));
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["author"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(calls.get(), 0);
        assert_eq!(doc.included.len(), 1);
        assert_eq!(doc.included[0].attributes["name"], json!("Cached"));
    }

    #[test]
    fn every_primary_resource_is_followed() {
        let (post, store) = common::blog();
        let mut other = Post::new("2", "Second");
        other.author = Some(Person::new("9", ""));
        let mut doc = Document::new();
        doc.set_data_many(&[other, post], &MarshalOptions::new())
            .unwrap();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["author", "comments"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(
            included_keys(&doc),
            vec!["person/9", "comment/5", "comment/12"]
        );
    }

    #[test]
    fn missing_targets_are_skipped() {
        let (mut doc, _) = blog_document();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&[], &calls),
            &["comments.author"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert!(doc.included.is_empty());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn indexed_relationship_keys() {
        let mut doc: Document = serde_json::from_value(json!({
            "data": {
                "id": "1",
                "type": "order",
                "relationships": {
                    "items[0].product": {"data": {"id": "p1", "type": "product"}},
                    "items[1].product": {"data": {"id": "p2", "type": "product"}}
                }
            }
        }))
        .unwrap();
        let store = vec![
            ResourceObject::new(ResourceIdentifier::new("p1", "product")),
            ResourceObject::new(ResourceIdentifier::new("p2", "product")),
        ];
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["items.product"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(included_keys(&doc), vec!["product/p1", "product/p2"]);
    }
}

mod local_objects {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unpersisted_relations_resolve_without_the_resolver() {
        let mut post = Post::new("1", "Hello");
        post.author = Some(Person::new("", "Bob"));
        let mut doc = Document::new();
        doc.set_data(&post, &MarshalOptions::new()).unwrap();

        resolve_includes(
            &failing_resolver,
            &["author"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&doc.included).unwrap(),
            json!([{"type": "person", "lid": "1_0", "attributes": {"name": "Bob"}}])
        );
    }

    #[test]
    fn local_objects_are_not_included_unless_requested() {
        let mut post = Post::new("1", "Hello");
        post.author = Some(Person::new("", "Bob"));
        let mut doc = Document::new();
        doc.set_data(&post, &MarshalOptions::new()).unwrap();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&[], &calls),
            &["comments"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert!(doc.included.is_empty());
    }
}

mod unknown_paths {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lenient_mode_ignores_unknown_relationship() {
        let (mut doc, store) = blog_document();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["editor"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert!(doc.included.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn lenient_mode_keeps_matched_prefix() {
        let (mut doc, store) = blog_document();
        let calls = Cell::new(0);

        resolve_includes(
            &store_resolver(&store, &calls),
            &["comments.editor"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap();

        assert_eq!(included_keys(&doc), vec!["comment/5", "comment/12"]);
    }

    #[test]
    fn strict_mode_rejects_unknown_relationship() {
        let (mut doc, store) = blog_document();
        let before = doc.clone();
        let calls = Cell::new(0);

        let err = resolve_includes(
            &store_resolver(&store, &calls),
            &["editor"],
            &mut doc,
            &IncludeOptions::new().strict(true),
        )
        .unwrap_err();

        match &err {
            IncludeError::UnknownRelationship { include, segment } => {
                assert_eq!(include, "editor");
                assert_eq!(segment, "editor");
            }
            other => panic!("expected unknown relationship, got {:?}", other),
        }
        assert_eq!(err.status(), 400);
        assert_eq!(doc, before);

        let api: ApiError = err.into();
        assert_eq!(api.status, "400");
        assert_eq!(api.title, "include failed");
    }
}

mod failures {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolver_error_is_internal() {
        let (mut doc, _) = blog_document();

        let err = resolve_includes(
            &failing_resolver,
            &["author"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap_err();

        assert!(matches!(err, IncludeError::Resolver { .. }));
        assert_eq!(err.status(), 500);
        assert!(doc.included.is_empty());
    }

    #[test]
    fn linkage_without_identity_is_rejected() {
        let mut doc: Document = serde_json::from_value(json!({
            "data": {
                "id": "1",
                "type": "post",
                "relationships": {"author": {"data": {"type": "person"}}}
            }
        }))
        .unwrap();
        let calls = Cell::new(0);

        let err = resolve_includes(
            &store_resolver(&[], &calls),
            &["author"],
            &mut doc,
            &IncludeOptions::new(),
        )
        .unwrap_err();

        assert!(matches!(err, IncludeError::MissingIdentity { .. }));
        assert_eq!(calls.get(), 0);
    }
}
