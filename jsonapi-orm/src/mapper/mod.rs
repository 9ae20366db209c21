mod many_to_many;
mod many_to_one;
mod one_to_many;

pub use many_to_many::ManyToManyMapper;
pub use many_to_one::ManyToOneMapper;
pub use one_to_many::OneToManyMapper;

use crate::document::{Document, Relationship, Resource};
use crate::error::{JsonApiOrmError, Result};
use crate::schema::{RelationshipDescriptor, SchemaDefinition, SchemaIndex};
use crate::store::Store;

/// Counts from one `parse` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Resources written to the store
    pub upserted: usize,
    /// Resources whose type no model is registered for
    pub skipped: usize,
    /// Join records appended across all many-to-many relationships
    pub join_records: usize,
}

/// Normalizes JSON:API documents into a store, following a compiled schema.
#[derive(Debug, Clone)]
pub struct JsonApiMapper {
    index: SchemaIndex,
}

impl JsonApiMapper {
    /// Compile `schema` and build a mapper for it.
    pub fn new(schema: &SchemaDefinition) -> Result<Self> {
        Ok(Self::from_index(SchemaIndex::build(schema)?))
    }

    pub fn from_index(index: SchemaIndex) -> Self {
        JsonApiMapper { index }
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    /// Parse a whole document: every `included` resource first, then the
    /// primary data in order. A fatal error stops the parse where it is;
    /// writes made before it stay in the store.
    pub fn parse<S: Store + ?Sized>(&self, document: &Document, store: &mut S) -> Result<ParseSummary> {
        let mut summary = ParseSummary::default();
        for resource in document.included().iter().chain(document.primary()) {
            self.parse_resource_into(resource, store, &mut summary)?;
        }
        log::info!(
            "Parsed document: {} upserted, {} skipped, {} join records",
            summary.upserted,
            summary.skipped,
            summary.join_records
        );
        Ok(summary)
    }

    /// Parse one resource. Returns false if its type is not mapped to a model,
    /// in which case nothing is written.
    pub fn parse_resource<S: Store + ?Sized>(&self, resource: &Resource, store: &mut S) -> Result<bool> {
        let mut summary = ParseSummary::default();
        self.parse_resource_into(resource, store, &mut summary)?;
        Ok(summary.upserted == 1)
    }

    fn parse_resource_into<S: Store + ?Sized>(
        &self,
        resource: &Resource,
        store: &mut S,
        summary: &mut ParseSummary,
    ) -> Result<()> {
        let Some(model) = self.index.model_for(&resource.resource_type) else {
            log::debug!(
                "Skipping resource {}/{}: no model registered",
                resource.resource_type,
                resource.id
            );
            summary.skipped += 1;
            return Ok(());
        };

        upsert_resource(model, resource, store)?;
        summary.upserted += 1;

        for (name, relationship) in &resource.relationships {
            let descriptor = self.index.descriptor(model, name).ok_or_else(|| {
                JsonApiOrmError::UnknownRelationship {
                    model: model.to_string(),
                    field: name.clone(),
                }
            })?;
            summary.join_records += apply_relationship(descriptor, &resource.id, relationship, store)?;
        }
        Ok(())
    }
}

/// Write a resource's identity and attributes into its model's collection.
pub fn upsert_resource<S: Store + ?Sized>(model: &str, resource: &Resource, store: &mut S) -> Result<()> {
    log::trace!("Upserting {model}/{}", resource.id);
    store.upsert(model, &resource.id, &resource.attributes)?;
    Ok(())
}

/// Apply one relationship payload with the mapper matching the descriptor.
/// Returns the number of join records created.
pub fn apply_relationship<S: Store + ?Sized>(
    descriptor: &RelationshipDescriptor,
    resource_id: &str,
    relationship: &Relationship,
    store: &mut S,
) -> Result<usize> {
    match descriptor {
        RelationshipDescriptor::ManyToOneChild(link) => {
            let mapper = ManyToOneMapper {
                this_model: &link.this_model,
                this_field: &link.this_field,
                other_model: &link.other_model,
            };
            mapper.parse(resource_id, relationship, store)?;
            Ok(0)
        }
        RelationshipDescriptor::OneToManyParent(link) => {
            let mapper = OneToManyMapper {
                other_model: &link.other_model,
                other_field: &link.other_field,
            };
            mapper.parse(resource_id, relationship, store)?;
            Ok(0)
        }
        RelationshipDescriptor::ManyToManyParent(through) => {
            let mapper = ManyToManyMapper {
                target_model: &through.target_model,
                through_model: &through.through_model,
                this_through_field: &through.this_through_field,
                other_through_field: &through.other_through_field,
            };
            Ok(mapper.parse(resource_id, relationship, store)?.len())
        }
        // A join record's own foreign field is an ordinary to-one key.
        RelationshipDescriptor::ManyToManyChild(through) => {
            let mapper = ManyToOneMapper {
                this_model: &through.this_model,
                this_field: &through.this_field,
                other_model: &through.target_model,
            };
            mapper.parse(resource_id, relationship, store)?;
            Ok(0)
        }
    }
}
