use thiserror::Error;

#[derive(Error, Debug)]
pub enum JsonApiOrmError {
    #[error("Duplicate JSON:API resource type '{resource_type}' (model {model})")]
    DuplicateResourceType { resource_type: String, model: String },

    #[error("Duplicate model name: {0}")]
    DuplicateModelName(String),

    #[error("Unknown relationship: {model}.{field}")]
    UnknownRelationship { model: String, field: String },

    #[error("Relationship slot {model}.{field} is claimed by more than one declaration")]
    ConflictingRelationship { model: String, field: String },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JsonApiOrmError>;
