//! Include resolution: walk dot-separated relationship paths and fill `included`.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::document::Document;
use crate::error::{ApiError, IncludeError};
use crate::model::{Relationship, ResourceIdentifier, ResourceObject};
use crate::types::IncludeOptions;

/// Fetches a related resource by identifier.
///
/// `Ok(None)` means the resource does not exist and is skipped.
pub trait Resolver {
    fn resolve(&self, identifier: &ResourceIdentifier)
        -> Result<Option<ResourceObject>, ApiError>;
}

impl<F> Resolver for F
where
    F: Fn(&ResourceIdentifier) -> Result<Option<ResourceObject>, ApiError>,
{
    fn resolve(
        &self,
        identifier: &ResourceIdentifier,
    ) -> Result<Option<ResourceObject>, ApiError> {
        self(identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Server { id: String, type_: String },
    Local(String),
}

impl CacheKey {
    fn of(identifier: &ResourceIdentifier) -> Option<Self> {
        if !identifier.id.is_empty() {
            Some(CacheKey::Server {
                id: identifier.id.clone(),
                type_: identifier.type_.clone(),
            })
        } else if !identifier.lid.is_empty() {
            Some(CacheKey::Local(identifier.lid.clone()))
        } else {
            None
        }
    }
}

/// Resolve every path in `includes` against the primary data of `doc`.
///
/// Resources already in `included`, and local objects stashed on primary
/// resources during marshaling, seed the cache. The resulting `included` keeps
/// encounter order without duplicates. On error `doc` is left unchanged.
///
/// # Errors
///
/// - `IncludeError::Resolver` when the resolver fails
/// - `IncludeError::MissingIdentity` for linkage without `id` and `lid`
/// - `IncludeError::UnknownRelationship` for unmatched segments in strict mode
pub fn resolve_includes<S: AsRef<str>>(
    resolver: &dyn Resolver,
    includes: &[S],
    doc: &mut Document,
    options: &IncludeOptions,
) -> Result<(), IncludeError> {
    let mut resolution = Resolution::new(resolver, options.strict);

    for obj in &doc.included {
        resolution.seed(obj.clone(), true);
    }
    for obj in doc.resources() {
        for local in obj.local_objects().values() {
            resolution.seed(local.clone(), false);
        }
    }

    for include in includes {
        let include = include.as_ref().trim();
        if include.is_empty() {
            continue;
        }
        let segments: Vec<&str> = include.split('.').collect();
        for obj in doc.resources() {
            resolution.follow(include, &segments, &obj.relationships, false)?;
        }
    }

    debug!(
        includes = includes.len(),
        included = resolution.order.len(),
        "resolved includes"
    );
    doc.included = resolution.finish();
    Ok(())
}

struct Resolution<'r> {
    resolver: &'r dyn Resolver,
    strict: bool,
    arena: Vec<ResourceObject>,
    cache: HashMap<CacheKey, usize>,
    order: Vec<usize>,
}

impl<'r> Resolution<'r> {
    fn new(resolver: &'r dyn Resolver, strict: bool) -> Self {
        Self {
            resolver,
            strict,
            arena: Vec::new(),
            cache: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn seed(&mut self, obj: ResourceObject, included: bool) {
        let Some(key) = CacheKey::of(&obj.identifier) else {
            return;
        };
        if self.cache.contains_key(&key) {
            return;
        }
        let index = self.arena.len();
        self.arena.push(obj);
        self.cache.insert(key, index);
        if included {
            self.order.push(index);
        }
    }

    fn follow(
        &mut self,
        include: &str,
        segments: &[&str],
        relationships: &BTreeMap<String, Relationship>,
        nested: bool,
    ) -> Result<(), IncludeError> {
        let (matched, identifiers) = match self.narrow(include, segments, relationships, nested)? {
            Some(found) => found,
            None => return Ok(()),
        };
        let rest = &segments[matched..];

        for identifier in identifiers {
            let Some(index) = self.lookup(include, &identifier)? else {
                continue;
            };
            self.order.push(index);
            if !rest.is_empty() {
                let next = self.arena[index].relationships.clone();
                self.follow(include, rest, &next, true)?;
            }
        }
        Ok(())
    }

    /// Match leading segments against relationship keys.
    ///
    /// Keys are dotted paths whose segments may carry an index (`items[2]`).
    /// Returns the number of segments matched and the identifiers at that
    /// level, or `None` when nothing matches.
    fn narrow(
        &self,
        include: &str,
        segments: &[&str],
        relationships: &BTreeMap<String, Relationship>,
        nested: bool,
    ) -> Result<Option<(usize, Vec<ResourceIdentifier>)>, IncludeError> {
        let Some((first, _)) = segments.split_first() else {
            return Ok(None);
        };

        let mut current: Vec<(&str, &Relationship)> = relationships
            .iter()
            .filter_map(|(key, relationship)| {
                let (head, tail) = split_key(key);
                (head == *first).then_some((tail, relationship))
            })
            .collect();

        if current.is_empty() {
            if self.strict && !nested {
                return Err(IncludeError::UnknownRelationship {
                    include: include.to_string(),
                    segment: first.to_string(),
                });
            }
            return Ok(None);
        }

        let mut matched = 1;
        for segment in &segments[1..] {
            let next: Vec<(&str, &Relationship)> = current
                .iter()
                .filter_map(|&(tail, relationship)| {
                    if tail.is_empty() {
                        return None;
                    }
                    let (head, rest) = split_key(tail);
                    (head == *segment).then_some((rest, relationship))
                })
                .collect();
            if next.is_empty() {
                break;
            }
            current = next;
            matched += 1;
        }

        if self.strict && matched < segments.len() {
            current.retain(|(tail, _)| tail.is_empty());
            if current.is_empty() && !nested {
                return Err(IncludeError::UnknownRelationship {
                    include: include.to_string(),
                    segment: segments[matched].to_string(),
                });
            }
        }

        let identifiers = current
            .iter()
            .flat_map(|(_, relationship)| relationship.data.identifiers().iter().cloned())
            .collect();
        Ok(Some((matched, identifiers)))
    }

    fn lookup(
        &mut self,
        include: &str,
        identifier: &ResourceIdentifier,
    ) -> Result<Option<usize>, IncludeError> {
        let key = CacheKey::of(identifier).ok_or_else(|| IncludeError::MissingIdentity {
            include: include.to_string(),
        })?;
        if let Some(index) = self.cache.get(&key) {
            trace!(
                resource_type = %identifier.type_,
                id = %identifier.id,
                lid = %identifier.lid,
                "include cache hit"
            );
            return Ok(Some(*index));
        }

        let resolved = self
            .resolver
            .resolve(identifier)
            .map_err(|source| IncludeError::Resolver {
                include: include.to_string(),
                source,
            })?;
        let Some(obj) = resolved else {
            debug!(
                resource_type = %identifier.type_,
                id = %identifier.id,
                "include target not found"
            );
            return Ok(None);
        };

        let index = self.arena.len();
        self.arena.push(obj);
        self.cache.insert(key, index);
        Ok(Some(index))
    }

    fn finish(self) -> Vec<ResourceObject> {
        let mut seen = vec![false; self.arena.len()];
        let mut slots: Vec<Option<ResourceObject>> = self.arena.into_iter().map(Some).collect();
        let mut included = Vec::new();
        for index in self.order {
            if std::mem::replace(&mut seen[index], true) {
                continue;
            }
            if let Some(obj) = slots[index].take() {
                included.push(obj);
            }
        }
        included
    }
}

/// Split `a[1].b.c` into `("a", "b.c")`, dropping an index on the head.
fn split_key(key: &str) -> (&str, &str) {
    let (head, tail) = key.split_once('.').unwrap_or((key, ""));
    let head = head.split_once('[').map_or(head, |(name, _)| name);
    (head, tail)
}
