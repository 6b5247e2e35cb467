//! Dotted/indexed addressing into attribute trees (`address.city`, `items[2].sku`).

use std::fmt;

use serde_json::{Map, Value};

use crate::error::PathError;

/// One path segment: a member name with an optional array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub index: Option<usize>,
}

/// Address of a value inside an attribute tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<Segment>,
}

impl AttributePath {
    /// The empty path, addressing the attribute map itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `a.b[2].c`.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let invalid = || PathError::Invalid {
            path: path.to_string(),
        };
        let mut segments = Vec::new();
        for part in path.split('.') {
            let segment = match part.find('[') {
                None => Segment {
                    name: part.to_string(),
                    index: None,
                },
                Some(open) => {
                    let close = part.rfind(']').ok_or_else(invalid)?;
                    if close != part.len() - 1 || close < open {
                        return Err(invalid());
                    }
                    let index = part[open + 1..close].parse().map_err(|_| invalid())?;
                    Segment {
                        name: part[..open].to_string(),
                        index: Some(index),
                    }
                }
            };
            if segment.name.is_empty() {
                return Err(invalid());
            }
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Append a named member.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment {
            name: name.to_string(),
            index: None,
        });
        Self { segments }
    }

    /// Address element `index` of the array at this path. The root path is
    /// returned unchanged.
    pub fn indexed(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            last.index = Some(index);
        }
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            if let Some(index) = segment.index {
                write!(f, "[{index}]")?;
            }
        }
        Ok(())
    }
}

/// Set `value` at `path`, creating intermediate objects and arrays on demand.
///
/// An index may address an existing array element or the one just past the
/// end. Setting the root path replaces the whole map when `value` is an
/// object.
pub fn set_attribute(
    attributes: &mut Map<String, Value>,
    path: &AttributePath,
    value: Value,
) -> Result<(), PathError> {
    let Some((last, parents)) = path.segments.split_last() else {
        return match value {
            Value::Object(map) => {
                *attributes = map;
                Ok(())
            }
            _ => Err(PathError::Empty),
        };
    };

    let mut current = attributes;
    let mut walked = AttributePath::root();
    for segment in parents {
        walked.segments.push(segment.clone());
        let slot = current
            .entry(segment.name.clone())
            .or_insert_with(|| container_for(segment));
        let slot = match segment.index {
            Some(index) => element_mut(slot, index, &walked)?,
            None => slot,
        };
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => {
                return Err(PathError::NotAnObject {
                    path: walked.to_string(),
                })
            }
        };
    }

    walked.segments.push(last.clone());
    match last.index {
        None => {
            current.insert(last.name.clone(), value);
        }
        Some(index) => {
            let slot = current
                .entry(last.name.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            *element_mut(slot, index, &walked)? = value;
        }
    }
    Ok(())
}

/// Look up the value at `path`.
pub fn get_attribute<'a>(
    attributes: &'a Map<String, Value>,
    path: &AttributePath,
) -> Option<&'a Value> {
    let (first, rest) = path.segments.split_first()?;
    let mut current = step(attributes.get(&first.name)?, first)?;
    for segment in rest {
        current = step(current.as_object()?.get(&segment.name)?, segment)?;
    }
    Some(current)
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match segment.index {
        Some(index) => value.as_array()?.get(index),
        None => Some(value),
    }
}

fn container_for(segment: &Segment) -> Value {
    match segment.index {
        Some(_) => Value::Array(Vec::new()),
        None => Value::Object(Map::new()),
    }
}

fn element_mut<'a>(
    slot: &'a mut Value,
    index: usize,
    path: &AttributePath,
) -> Result<&'a mut Value, PathError> {
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    let Value::Array(items) = slot else {
        return Err(PathError::NotAnArray {
            path: path.to_string(),
        });
    };
    if index > items.len() {
        return Err(PathError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len: items.len(),
        });
    }
    if index == items.len() {
        items.push(Value::Null);
    }
    Ok(&mut items[index])
}
