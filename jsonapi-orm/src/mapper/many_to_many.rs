use crate::document::Relationship;
use crate::error::Result;
use crate::store::{Record, Store};
use serde_json::Value;
use std::collections::HashSet;

/// One declaring side of a many-to-many. The same algorithm serves both
/// directions, with the join fields swapped.
#[derive(Debug, Clone, Copy)]
pub struct ManyToManyMapper<'a> {
    pub target_model: &'a str,
    pub through_model: &'a str,
    pub this_through_field: &'a str,
    pub other_through_field: &'a str,
}

impl ManyToManyMapper<'_> {
    /// Reconcile the join collection with the payload: stub every referenced
    /// entity, then append one join record per `(resource_id, other_id)` pair
    /// that is not already present. Returns the ids of the new join records.
    ///
    /// Pairs missing from the payload are never removed.
    pub fn parse<S: Store + ?Sized>(
        &self,
        resource_id: &str,
        relationship: &Relationship,
        store: &mut S,
    ) -> Result<Vec<u64>> {
        let refs = relationship.refs();

        let targets = store.require_mut(self.target_model)?;
        let mut seen = HashSet::with_capacity(refs.len());
        let mut desired: Vec<&str> = Vec::with_capacity(refs.len());
        for r in refs {
            targets.ensure_stub(&r.id);
            if seen.insert(r.id.as_str()) {
                desired.push(&r.id);
            }
        }

        let join = store.require_mut(self.through_model)?;
        let present: HashSet<&str> = join
            .records()
            .filter_map(|record| self.pair(record))
            .filter(|(this_id, _)| *this_id == resource_id)
            .map(|(_, other_id)| other_id)
            .collect();
        desired.retain(|other_id| !present.contains(other_id));

        let mut created = Vec::with_capacity(desired.len());
        for other_id in desired {
            let mut fields = Record::new();
            fields.insert(
                self.this_through_field.to_string(),
                Value::String(resource_id.to_string()),
            );
            fields.insert(
                self.other_through_field.to_string(),
                Value::String(other_id.to_string()),
            );
            let id = join.push_synthetic(fields);
            log::debug!(
                "{} #{id}: {}={resource_id} {}={other_id}",
                self.through_model,
                self.this_through_field,
                self.other_through_field
            );
            created.push(id);
        }
        Ok(created)
    }

    /// Project a join record onto its `(this, other)` id pair.
    fn pair<'r>(&self, record: &'r Record) -> Option<(&'r str, &'r str)> {
        let this_id = record.get(self.this_through_field)?.as_str()?;
        let other_id = record.get(self.other_through_field)?.as_str()?;
        Some((this_id, other_id))
    }
}
