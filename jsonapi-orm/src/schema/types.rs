use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level schema definition parsed from schema.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub models: Vec<ModelSchema>,
}

/// Definition of a single model and the JSON:API type it is fed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    /// Models without a resource type still take part in relationships,
    /// but resources are never mapped onto them directly.
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// How a single model field is stored and related
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSpec {
    Attribute,
    ForeignKey {
        to: String,
        #[serde(default)]
        related_name: Option<String>,
    },
    ManyToMany {
        to: String,
        #[serde(default)]
        related_name: Option<String>,
        #[serde(default)]
        through: Option<String>,
        #[serde(default)]
        through_fields: Option<ThroughFields>,
    },
}

/// Field names on a join model: `from` points at the declaring model,
/// `to` at the target model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughFields {
    pub from: String,
    pub to: String,
}

impl SchemaDefinition {
    pub fn new(models: Vec<ModelSchema>) -> Self {
        SchemaDefinition { models }
    }
}

impl ModelSchema {
    pub fn new(name: &str) -> Self {
        ModelSchema {
            name: name.to_string(),
            resource_type: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn resource_type(mut self, resource_type: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    pub fn attribute(mut self, field: &str) -> Self {
        self.fields.insert(field.to_string(), FieldSpec::Attribute);
        self
    }

    pub fn foreign_key(mut self, field: &str, to: &str, related_name: &str) -> Self {
        self.fields.insert(
            field.to_string(),
            FieldSpec::ForeignKey {
                to: to.to_string(),
                related_name: Some(related_name.to_string()),
            },
        );
        self
    }

    pub fn many_to_many(mut self, field: &str, to: &str, related_name: &str) -> Self {
        self.fields.insert(
            field.to_string(),
            FieldSpec::ManyToMany {
                to: to.to_string(),
                related_name: Some(related_name.to_string()),
                through: None,
                through_fields: None,
            },
        );
        self
    }

    /// Resource type, treating an empty string the same as an absent one.
    pub fn effective_resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref().filter(|t| !t.is_empty())
    }
}
