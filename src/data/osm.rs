use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::errors::{Error, Result};

pub type OsmId = i64;

/// Structural metadata of an element, in insertion order.
pub type Attrs = IndexMap<String, AttrValue>;

/// Tag key to value. A `None` value is never emitted.
pub type Tags = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Int(i64),
    Text(String),
    Null,
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Reads the value as an integer, accepting numeric text.
    pub fn as_int(&self, field: &'static str) -> Result<i64> {
        match self {
            AttrValue::Int(value) => Ok(*value),
            AttrValue::Text(text) => text.trim().parse().map_err(|_| Error::InvalidValue {
                field,
                value: text.clone(),
            }),
            AttrValue::Null => Err(Error::InvalidValue {
                field,
                value: String::new(),
            }),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Text(text) => f.write_str(text),
            AttrValue::Null => Ok(()),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeatureKind {
    #[default]
    Node,
    /// Node references in geometry order.
    Way { refs: Vec<OsmId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureRecord {
    pub kind: FeatureKind,
    pub attrs: Attrs,
    pub tags: Tags,
}

impl FeatureRecord {
    pub fn node() -> Self {
        FeatureRecord::default()
    }

    pub fn way(refs: Vec<OsmId>) -> Self {
        FeatureRecord {
            kind: FeatureKind::Way { refs },
            ..FeatureRecord::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_tag(mut self, key: &str, value: Option<&str>) -> Self {
        self.tags.insert(key.to_string(), value.map(str::to_string));
        self
    }

    pub fn is_way(&self) -> bool {
        matches!(self.kind, FeatureKind::Way { .. })
    }

    pub fn refs(&self) -> &[OsmId] {
        match &self.kind {
            FeatureKind::Node => &[],
            FeatureKind::Way { refs } => refs,
        }
    }

    /// Attribute lookup that treats an explicit null like an absent key.
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key).filter(|value| !value.is_null())
    }

    /// The record's own identifier, if it carries one.
    pub fn id(&self) -> Option<OsmId> {
        match self.attrs.get("id") {
            Some(AttrValue::Int(id)) => Some(*id),
            Some(AttrValue::Text(text)) => text.parse().ok(),
            _ => None,
        }
    }
}
