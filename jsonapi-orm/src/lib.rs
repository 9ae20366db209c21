pub mod schema;
pub mod document;
pub mod store;
pub mod mapper;
pub mod error;

pub use error::{JsonApiOrmError, Result};
pub use schema::{SchemaDefinition, SchemaIndex};
pub use store::{MemoryStore, NormalizedCollection, Store};
pub use document::Document;
pub use mapper::JsonApiMapper;
