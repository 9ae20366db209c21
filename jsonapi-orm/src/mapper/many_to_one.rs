use crate::document::{Relationship, RelationshipData};
use crate::error::{JsonApiOrmError, Result};
use crate::store::Store;
use serde_json::Value;

/// Child side of a foreign key: this resource's record holds the key.
#[derive(Debug, Clone, Copy)]
pub struct ManyToOneMapper<'a> {
    pub this_model: &'a str,
    pub this_field: &'a str,
    pub other_model: &'a str,
}

impl ManyToOneMapper<'_> {
    /// Point `resource_id`'s key at the referenced id and make sure the
    /// referenced entity exists, at least as a stub. A null linkage clears the
    /// key; a relationship without `data` leaves it as it is.
    pub fn parse<S: Store + ?Sized>(
        &self,
        resource_id: &str,
        relationship: &Relationship,
        store: &mut S,
    ) -> Result<()> {
        let related_id = match relationship.linkage() {
            // Only links/meta: nothing to apply.
            None => return Ok(()),
            Some(None) => None,
            Some(Some(RelationshipData::One(r))) => Some(r.id.as_str()),
            Some(Some(RelationshipData::Many(_))) => {
                return Err(JsonApiOrmError::InvalidDocument(format!(
                    "{}.{} of '{resource_id}' expects a to-one linkage",
                    self.this_model, self.this_field
                )));
            }
        };

        let records = store.require_mut(self.this_model)?;
        records.ensure_stub(resource_id);
        let value = match related_id {
            Some(id) => Value::String(id.to_string()),
            None => {
                log::debug!(
                    "Clearing {}.{} on '{resource_id}'",
                    self.this_model,
                    self.this_field
                );
                Value::Null
            }
        };
        records.set_field(resource_id, self.this_field, value);

        if let Some(id) = related_id {
            // Keyed by the referenced id, never the referencing one.
            store.require_mut(self.other_model)?.ensure_stub(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Ref;
    use crate::store::{MemoryStore, NormalizedCollection};
    use serde_json::json;

    const TASK: ManyToOneMapper<'static> = ManyToOneMapper {
        this_model: "Task",
        this_field: "project",
        other_model: "Project",
    };

    #[derive(Default)]
    struct TwoCollections {
        tasks: NormalizedCollection,
        projects: NormalizedCollection,
    }

    impl Store for TwoCollections {
        fn collection(&self, model: &str) -> Option<&NormalizedCollection> {
            match model {
                "Task" => Some(&self.tasks),
                "Project" => Some(&self.projects),
                _ => None,
            }
        }

        fn collection_mut(&mut self, model: &str) -> Option<&mut NormalizedCollection> {
            match model {
                "Task" => Some(&mut self.tasks),
                "Project" => Some(&mut self.projects),
                _ => None,
            }
        }
    }

    fn to_one(id: &str) -> Relationship {
        Relationship::to_one(Ref::new("projects", id))
    }

    #[test]
    fn test_sets_key_and_creates_stub() {
        let mut store = TwoCollections::default();
        store.tasks.ensure_stub("1");

        TASK.parse("1", &to_one("2"), &mut store).unwrap();

        assert_eq!(
            Value::Object(store.tasks.get("1").unwrap().clone()),
            json!({ "id": "1", "project": "2" })
        );
        assert_eq!(store.projects.items(), &["2".to_string()]);
        assert_eq!(
            Value::Object(store.projects.get("2").unwrap().clone()),
            json!({ "id": "2" })
        );
    }

    #[test]
    fn test_stub_check_uses_referenced_id() {
        let mut store = TwoCollections::default();
        store.tasks.ensure_stub("1");
        // A project sharing the task's id must not suppress the stub for "2".
        store.projects.ensure_stub("1");

        TASK.parse("1", &to_one("2"), &mut store).unwrap();

        assert!(store.projects.contains("2"));
        assert_eq!(store.projects.len(), 2);
    }

    #[test]
    fn test_existing_target_is_not_overwritten() {
        let mut store = TwoCollections::default();
        store.tasks.ensure_stub("1");
        store
            .projects
            .upsert("2", json!({ "name": "p2" }).as_object().unwrap());

        TASK.parse("1", &to_one("2"), &mut store).unwrap();

        assert_eq!(store.projects.get("2").unwrap()["name"], json!("p2"));
        assert_eq!(store.projects.len(), 1);
    }

    #[test]
    fn test_null_linkage_clears_key() {
        let mut store = TwoCollections::default();
        store.tasks.ensure_stub("1");
        TASK.parse("1", &to_one("2"), &mut store).unwrap();

        TASK.parse("1", &Relationship::null(), &mut store).unwrap();

        assert_eq!(store.tasks.get("1").unwrap()["project"], Value::Null);
        assert_eq!(store.projects.len(), 1);
    }

    #[test]
    fn test_missing_data_keeps_key() {
        let mut store = TwoCollections::default();
        store.tasks.ensure_stub("1");
        TASK.parse("1", &to_one("2"), &mut store).unwrap();

        TASK.parse("1", &Relationship::default(), &mut store)
            .unwrap();

        assert_eq!(
            Value::Object(store.tasks.get("1").unwrap().clone()),
            json!({ "id": "1", "project": "2" })
        );
    }

    #[test]
    fn test_to_many_linkage_is_rejected() {
        let mut store = MemoryStore::default();
        let relationship = Relationship::to_many(vec![Ref::new("projects", "2")]);
        let result = TASK.parse("1", &relationship, &mut store);
        assert!(matches!(result, Err(JsonApiOrmError::InvalidDocument(_))));
    }
}
