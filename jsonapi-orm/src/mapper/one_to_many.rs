use crate::document::Relationship;
use crate::error::Result;
use crate::store::Store;
use serde_json::Value;

/// Parent side of a foreign key: the key lives on the other model's records.
#[derive(Debug, Clone, Copy)]
pub struct OneToManyMapper<'a> {
    pub other_model: &'a str,
    pub other_field: &'a str,
}

impl OneToManyMapper<'_> {
    /// Point every referenced record's key at `resource_id`, creating
    /// `{id, key}` records where none exist. Records linked to this parent by
    /// an earlier parse but missing from the payload are left alone.
    pub fn parse<S: Store + ?Sized>(
        &self,
        resource_id: &str,
        relationship: &Relationship,
        store: &mut S,
    ) -> Result<()> {
        let children = store.require_mut(self.other_model)?;
        for child in relationship.refs() {
            children.ensure_stub(&child.id);
            children.set_field(
                &child.id,
                self.other_field,
                Value::String(resource_id.to_string()),
            );
        }
        Ok(())
    }
}
