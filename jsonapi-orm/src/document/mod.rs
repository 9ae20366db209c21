// JSON:API document model - the input side of normalization

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// A top-level JSON:API document.
///
/// Only `data` and `included` are interpreted; other top-level members
/// (`meta`, `links`, `jsonapi`) are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Resource>>,
}

/// Primary data: a single resource or an ordered list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    One(Box<Resource>),
    Many(Vec<Resource>),
}

/// One typed, identified resource object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "ordered_relationships")]
    pub relationships: Vec<(String, Relationship)>,
}

/// A resource identifier, as it appears inside relationship data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

/// A relationship object.
///
/// `data` is `None` when the member is absent (only `links`/`meta` were sent,
/// nothing is known about the linkage) and `Some(None)` for an explicit
/// `data: null` (the linkage is empty).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(
        default,
        deserialize_with = "deserialize_linkage",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Option<RelationshipData>>,
}

/// Resource linkage: to-one or to-many
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    One(Ref),
    Many(Vec<Ref>),
}

impl Document {
    /// Parse a document from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read and parse a document from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Primary resources in document order
    pub fn primary(&self) -> &[Resource] {
        match &self.data {
            PrimaryData::One(resource) => std::slice::from_ref(resource.as_ref()),
            PrimaryData::Many(resources) => resources,
        }
    }

    pub fn included(&self) -> &[Resource] {
        self.included.as_deref().unwrap_or_default()
    }
}

impl Resource {
    pub fn new(resource_type: &str, id: &str) -> Self {
        Resource {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            attributes: Map::new(),
            relationships: Vec::new(),
        }
    }
}

impl Ref {
    pub fn new(resource_type: &str, id: &str) -> Self {
        Ref {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }
}

impl Relationship {
    pub fn to_one(target: Ref) -> Self {
        Relationship {
            data: Some(Some(RelationshipData::One(target))),
        }
    }

    pub fn to_many(targets: Vec<Ref>) -> Self {
        Relationship {
            data: Some(Some(RelationshipData::Many(targets))),
        }
    }

    /// An explicit `data: null`
    pub fn null() -> Self {
        Relationship { data: Some(None) }
    }

    /// The linkage, or `None` if the document did not send one.
    pub fn linkage(&self) -> Option<Option<&RelationshipData>> {
        self.data.as_ref().map(Option::as_ref)
    }

    /// Referenced resources, with a to-one linkage seen as a one-element list
    /// and an empty or absent linkage as no references at all.
    pub fn refs(&self) -> &[Ref] {
        match self.data.as_ref().and_then(Option::as_ref) {
            None => &[],
            Some(RelationshipData::One(r)) => std::slice::from_ref(r),
            Some(RelationshipData::Many(refs)) => refs,
        }
    }
}

/// Ids are strings in JSON:API, but plenty of feeds emit numbers.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "resource id must be a string or number, got {other}"
        ))),
    }
}

/// Present `data` member, `null` included. Absence is handled by `default`.
fn deserialize_linkage<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<RelationshipData>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RelationshipData>::deserialize(deserializer).map(Some)
}

/// Relationships are kept in the order the deserializer yields them. Parsed
/// from JSON text that is document order; a `serde_json::Value` built without
/// `preserve_order` yields its keys sorted.
mod ordered_relationships {
    use super::Relationship;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(value: &[(String, Relationship)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(value.len()))?;
        for (name, relationship) in value {
            map.serialize_entry(name, relationship)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Relationship)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RelationshipsVisitor;

        impl<'de> Visitor<'de> for RelationshipsVisitor {
            type Value = Vec<(String, Relationship)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of relationship objects")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, relationship)) = access.next_entry()? {
                    entries.push((name, relationship));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(RelationshipsVisitor)
    }
}
