use crate::error::{JsonApiOrmError, Result};
use crate::schema::SchemaIndex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// A normalized record: `{id} ∪ attributes ∪ foreign-key fields`
pub type Record = Map<String, Value>;

/// The contract the normalizer needs from a storage engine.
/// Collection lifecycle (creation, clearing) belongs to the implementor.
pub trait Store {
    /// Get the collection for a model, if the store has one.
    fn collection(&self, model: &str) -> Option<&NormalizedCollection>;

    /// Get the collection for a model for in-place mutation.
    fn collection_mut(&mut self, model: &str) -> Option<&mut NormalizedCollection>;

    /// Like `collection_mut`, but a missing collection is an error.
    fn require_mut(&mut self, model: &str) -> Result<&mut NormalizedCollection> {
        self.collection_mut(model)
            .ok_or_else(|| JsonApiOrmError::UnknownModel(model.to_string()))
    }

    /// Insert `{id, ...attributes}`, or merge `attributes` onto the existing record.
    fn upsert(&mut self, model: &str, id: &str, attributes: &Map<String, Value>) -> Result<&Record> {
        Ok(self.require_mut(model)?.upsert(id, attributes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionMeta {
    #[serde(rename = "maxId", skip_serializing_if = "Option::is_none")]
    pub max_id: Option<u64>,
}

impl CollectionMeta {
    /// Records stored under their own numeric ids push a synthetic counter
    /// past them, so allocation never lands on a taken id.
    fn observe(&mut self, key: &str) {
        if let (Some(max_id), Ok(numeric)) = (self.max_id, key.parse::<u64>()) {
            if numeric > max_id {
                self.max_id = Some(numeric);
            }
        }
    }
}

/// Per-model state: ids in insertion order plus the records keyed by id.
///
/// `items` and `items_by_id` are only mutated together, so every id in
/// `items` is unique and has a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCollection {
    items: Vec<String>,
    items_by_id: BTreeMap<String, Record>,
    meta: CollectionMeta,
}

impl NormalizedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection that allocates synthetic integer ids (join collections).
    pub fn with_synthetic_ids() -> Self {
        NormalizedCollection {
            meta: CollectionMeta { max_id: Some(0) },
            ..Self::default()
        }
    }

    /// Ids in insertion order
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn meta(&self) -> &CollectionMeta {
        &self.meta
    }

    pub fn max_id(&self) -> Option<u64> {
        self.meta.max_id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items_by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.items_by_id.get(id)
    }

    /// Records in insertion order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.items.iter().filter_map(|id| self.items_by_id.get(id))
    }

    /// Insert `{id}` if nothing is stored under `id` yet. Existing records are
    /// left untouched. Returns whether a stub was created.
    pub fn ensure_stub(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.insert_new(id.to_string(), stub(Value::String(id.to_string())));
        true
    }

    /// Insert-or-merge keyed by id. Provided fields overwrite, absent fields
    /// are preserved. An `id` key inside `fields` never replaces the identity.
    pub fn upsert(&mut self, id: &str, fields: &Map<String, Value>) -> &Record {
        let record = match self.items_by_id.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.meta.observe(entry.key());
                self.items.push(entry.key().clone());
                entry.insert(stub(Value::String(id.to_string())))
            }
        };
        for (key, value) in fields {
            if key != "id" {
                record.insert(key.clone(), value.clone());
            }
        }
        record
    }

    /// Set one field on an existing record. Returns false if there is no record.
    pub fn set_field(&mut self, id: &str, field: &str, value: Value) -> bool {
        match self.items_by_id.get_mut(id) {
            Some(record) => {
                record.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Reserve the next synthetic id. Ids are never reused, so the counter
    /// only moves forward, skipping ids already taken by records stored
    /// under their own numeric ids.
    pub fn allocate_id(&mut self) -> u64 {
        let mut next = self.meta.max_id.unwrap_or(0) + 1;
        while self.items_by_id.contains_key(&next.to_string()) {
            next += 1;
        }
        self.meta.max_id = Some(next);
        next
    }

    /// Append a record under a freshly allocated synthetic id.
    pub fn push_synthetic(&mut self, fields: Record) -> u64 {
        let id = self.allocate_id();
        let mut record = stub(Value::from(id));
        for (key, value) in fields {
            if key != "id" {
                record.insert(key, value);
            }
        }
        self.insert_new(id.to_string(), record);
        id
    }

    /// Callers check `contains` first; a key is never pushed twice.
    fn insert_new(&mut self, key: String, record: Record) {
        debug_assert!(!self.items_by_id.contains_key(&key));
        self.meta.observe(&key);
        self.items.push(key.clone());
        self.items_by_id.insert(key, record);
    }
}

fn stub(id: Value) -> Record {
    let mut record = Record::new();
    record.insert("id".into(), id);
    record
}

/// In-memory store holding one collection per indexed model
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MemoryStore {
    collections: BTreeMap<String, NormalizedCollection>,
}

impl MemoryStore {
    /// Create empty collections for every model in the index, join models included.
    pub fn new(index: &SchemaIndex) -> Self {
        let collections = index
            .model_names()
            .map(|name| {
                let collection = if index.is_join_model(name) {
                    NormalizedCollection::with_synthetic_ids()
                } else {
                    NormalizedCollection::new()
                };
                (name.to_string(), collection)
            })
            .collect();
        MemoryStore { collections }
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Drop every record, keeping the collections (and their id counters reset).
    pub fn clear(&mut self) {
        for collection in self.collections.values_mut() {
            let synthetic = collection.max_id().is_some();
            *collection = if synthetic {
                NormalizedCollection::with_synthetic_ids()
            } else {
                NormalizedCollection::new()
            };
        }
    }

    /// The whole store as `{model: {items, itemsById, meta}}`
    pub fn snapshot(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Store for MemoryStore {
    fn collection(&self, model: &str) -> Option<&NormalizedCollection> {
        self.collections.get(model)
    }

    fn collection_mut(&mut self, model: &str) -> Option<&mut NormalizedCollection> {
        self.collections.get_mut(model)
    }
}
