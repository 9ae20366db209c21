use crate::error::{JsonApiOrmError, Result};
use super::types::{FieldSpec, ModelSchema, SchemaDefinition, ThroughFields};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A plain relationship between a field on this model and a field on the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub this_model: String,
    pub this_field: String,
    pub other_model: String,
    pub other_field: String,
}

/// One side of a many-to-many association routed through a join model.
///
/// `target_model` is the model whose ids appear in the relationship payload:
/// for a parent descriptor that is the far side of the association, for a
/// child descriptor (a field on the join model) it is the declaring model the
/// field points back at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughLink {
    pub this_model: String,
    pub this_field: String,
    pub through_model: String,
    pub this_through_field: String,
    pub other_through_field: String,
    pub target_model: String,
    pub target_field: String,
}

/// Compiled statement of how one `(model, field)` slot relates to the rest of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipDescriptor {
    /// This model holds the foreign key.
    ManyToOneChild(Link),
    /// The foreign key lives on the other model.
    OneToManyParent(Link),
    /// A declaring field of a many-to-many; its pair is a field on the join model.
    ManyToManyParent(ThroughLink),
    /// A foreign field on the join model pointing back at a declaring model.
    ManyToManyChild(ThroughLink),
}

impl RelationshipDescriptor {
    pub fn this_model(&self) -> &str {
        match self {
            Self::ManyToOneChild(link) | Self::OneToManyParent(link) => &link.this_model,
            Self::ManyToManyParent(through) | Self::ManyToManyChild(through) => {
                &through.this_model
            }
        }
    }

    pub fn this_field(&self) -> &str {
        match self {
            Self::ManyToOneChild(link) | Self::OneToManyParent(link) => &link.this_field,
            Self::ManyToManyParent(through) | Self::ManyToManyChild(through) => {
                &through.this_field
            }
        }
    }

    /// Model holding the complementary descriptor.
    pub fn other_model(&self) -> &str {
        match self {
            Self::ManyToOneChild(link) | Self::OneToManyParent(link) => &link.other_model,
            Self::ManyToManyParent(through) => &through.through_model,
            Self::ManyToManyChild(through) => &through.target_model,
        }
    }

    /// Field holding the complementary descriptor.
    pub fn other_field(&self) -> &str {
        match self {
            Self::ManyToOneChild(link) | Self::OneToManyParent(link) => &link.other_field,
            Self::ManyToManyParent(through) => &through.this_through_field,
            Self::ManyToManyChild(through) => &through.target_field,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ManyToOneChild(_) => "many_to_one_child",
            Self::OneToManyParent(_) => "one_to_many_parent",
            Self::ManyToManyParent(_) => "many_to_many_parent",
            Self::ManyToManyChild(_) => "many_to_many_child",
        }
    }
}

/// Schema compiled once ahead of any parse: resource type <-> model name maps
/// and the relationship descriptor table keyed by `(model, field)`.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    resource_type_map: HashMap<String, String>,
    model_name_map: HashMap<String, String>,
    models: Vec<String>,
    join_models: HashSet<String>,
    descriptors: HashMap<(String, String), RelationshipDescriptor>,
}

impl SchemaIndex {
    /// Compile a schema definition. Fails without producing a partial index
    /// if the schema contradicts itself.
    pub fn build(schema: &SchemaDefinition) -> Result<Self> {
        let mut index = SchemaIndex::default();

        for model in &schema.models {
            index.register_model(model)?;
        }

        // Only now are all targets known.
        for model in &schema.models {
            for (field_name, spec) in &model.fields {
                index.classify_field(model, field_name, spec)?;
            }
        }

        Ok(index)
    }

    fn register_model(&mut self, model: &ModelSchema) -> Result<()> {
        if self.models.contains(&model.name) {
            return Err(JsonApiOrmError::DuplicateModelName(model.name.clone()));
        }

        if let Some(resource_type) = model.effective_resource_type() {
            if let Some(existing) = self.resource_type_map.get(resource_type) {
                return Err(JsonApiOrmError::DuplicateResourceType {
                    resource_type: resource_type.to_string(),
                    model: existing.clone(),
                });
            }
            self.resource_type_map
                .insert(resource_type.to_string(), model.name.clone());
            self.model_name_map
                .insert(model.name.clone(), resource_type.to_string());
        }

        self.models.push(model.name.clone());
        Ok(())
    }

    fn classify_field(&mut self, model: &ModelSchema, field_name: &str, spec: &FieldSpec) -> Result<()> {
        match spec {
            FieldSpec::Attribute => Ok(()),
            FieldSpec::ForeignKey { to, related_name } => {
                self.require_model(to)?;
                let related = related_name
                    .clone()
                    .unwrap_or_else(|| default_related_name(&model.name));

                self.register(RelationshipDescriptor::ManyToOneChild(Link {
                    this_model: model.name.clone(),
                    this_field: field_name.to_string(),
                    other_model: to.clone(),
                    other_field: related.clone(),
                }))?;
                self.register(RelationshipDescriptor::OneToManyParent(Link {
                    this_model: to.clone(),
                    this_field: related,
                    other_model: model.name.clone(),
                    other_field: field_name.to_string(),
                }))
            }
            FieldSpec::ManyToMany {
                to,
                related_name,
                through,
                through_fields,
            } => {
                self.require_model(to)?;
                let related = related_name
                    .clone()
                    .unwrap_or_else(|| default_related_name(&model.name));

                let through_model = match through {
                    Some(name) => name.clone(),
                    None => {
                        let name = format!("{}{}", model.name, upper_first(field_name));
                        if self.models.contains(&name) {
                            return Err(JsonApiOrmError::DuplicateModelName(name));
                        }
                        name
                    }
                };
                let ThroughFields {
                    from: this_through_field,
                    to: other_through_field,
                } = through_fields
                    .clone()
                    .unwrap_or_else(|| default_through_fields(&model.name, to));

                if !self.models.contains(&through_model) {
                    self.models.push(through_model.clone());
                }
                self.join_models.insert(through_model.clone());

                let declaring = ThroughLink {
                    this_model: model.name.clone(),
                    this_field: field_name.to_string(),
                    through_model: through_model.clone(),
                    this_through_field: this_through_field.clone(),
                    other_through_field: other_through_field.clone(),
                    target_model: to.clone(),
                    target_field: related.clone(),
                };
                let related_side = ThroughLink {
                    this_model: to.clone(),
                    this_field: related.clone(),
                    through_model: through_model.clone(),
                    this_through_field: other_through_field.clone(),
                    other_through_field: this_through_field.clone(),
                    target_model: model.name.clone(),
                    target_field: field_name.to_string(),
                };

                self.register(RelationshipDescriptor::ManyToManyChild(ThroughLink {
                    this_model: through_model.clone(),
                    this_field: this_through_field.clone(),
                    through_model: through_model.clone(),
                    this_through_field: this_through_field.clone(),
                    other_through_field: other_through_field.clone(),
                    target_model: model.name.clone(),
                    target_field: field_name.to_string(),
                }))?;
                self.register(RelationshipDescriptor::ManyToManyChild(ThroughLink {
                    this_model: through_model.clone(),
                    this_field: other_through_field.clone(),
                    through_model,
                    this_through_field: other_through_field,
                    other_through_field: this_through_field,
                    target_model: to.clone(),
                    target_field: related,
                }))?;
                self.register(RelationshipDescriptor::ManyToManyParent(declaring))?;
                self.register(RelationshipDescriptor::ManyToManyParent(related_side))
            }
        }
    }

    fn require_model(&self, name: &str) -> Result<()> {
        if self.models.iter().any(|m| m == name) {
            Ok(())
        } else {
            Err(JsonApiOrmError::UnknownModel(name.to_string()))
        }
    }

    fn register(&mut self, descriptor: RelationshipDescriptor) -> Result<()> {
        let key = (
            descriptor.this_model().to_string(),
            descriptor.this_field().to_string(),
        );
        if self.descriptors.contains_key(&key) {
            return Err(JsonApiOrmError::ConflictingRelationship {
                model: key.0,
                field: key.1,
            });
        }
        self.descriptors.insert(key, descriptor);
        Ok(())
    }

    /// Model name registered for a JSON:API resource type.
    pub fn model_for(&self, resource_type: &str) -> Option<&str> {
        self.resource_type_map.get(resource_type).map(String::as_str)
    }

    /// JSON:API resource type registered for a model name.
    pub fn resource_type_for(&self, model: &str) -> Option<&str> {
        self.model_name_map.get(model).map(String::as_str)
    }

    pub fn resource_type_map(&self) -> &HashMap<String, String> {
        &self.resource_type_map
    }

    pub fn model_name_map(&self) -> &HashMap<String, String> {
        &self.model_name_map
    }

    pub fn descriptor(&self, model: &str, field: &str) -> Option<&RelationshipDescriptor> {
        self.descriptors
            .get(&(model.to_string(), field.to_string()))
    }

    /// The descriptor on the other end of `descriptor`'s pair.
    pub fn complement(&self, descriptor: &RelationshipDescriptor) -> Option<&RelationshipDescriptor> {
        self.descriptor(descriptor.other_model(), descriptor.other_field())
    }

    /// All descriptors, ordered by `(model, field)`.
    pub fn descriptors(&self) -> BTreeMap<(&str, &str), &RelationshipDescriptor> {
        self.descriptors
            .iter()
            .map(|((model, field), d)| ((model.as_str(), field.as_str()), d))
            .collect()
    }

    /// Every model the store needs a collection for: declared models first,
    /// then synthesized join models, in registration order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn is_join_model(&self, model: &str) -> bool {
        self.join_models.contains(model)
    }
}

fn default_related_name(model: &str) -> String {
    format!("{}Set", lower_first(model))
}

fn default_through_fields(from: &str, to: &str) -> ThroughFields {
    if from == to {
        ThroughFields {
            from: format!("from{from}Id"),
            to: format!("to{to}Id"),
        }
    } else {
        ThroughFields {
            from: format!("from{from}"),
            to: format!("to{to}"),
        }
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema_str;

    fn test_schema() -> SchemaDefinition {
        parse_schema_str(
            r#"
models:
  - name: Project
    resource_type: projects
    fields:
      name: { kind: attribute }
  - name: Task
    resource_type: tasks
    fields:
      project: { kind: foreign_key, to: Project, related_name: tasks }
      parent: { kind: foreign_key, to: Task, related_name: subtasks }
  - name: Person
    resource_type: people
    fields:
      projects: { kind: many_to_many, to: Project, related_name: assignees }
      friends: { kind: many_to_many, to: Person, related_name: friendOf }
  - name: Book
    resource_type: books
    fields:
      authors:
        kind: many_to_many
        to: Author
        related_name: books
        through: Authorship
        through_fields: { from: book, to: author }
  - name: Author
    resource_type: authors
  - name: Note
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resource_type_maps() {
        let index = SchemaIndex::build(&test_schema()).unwrap();
        assert_eq!(index.model_for("projects"), Some("Project"));
        assert_eq!(index.model_for("tasks"), Some("Task"));
        assert_eq!(index.resource_type_for("Person"), Some("people"));
        assert_eq!(index.model_for("notes"), None);
        assert_eq!(index.resource_type_for("Note"), None);
        assert_eq!(index.resource_type_map().len(), 5);
        assert_eq!(index.model_name_map().len(), 5);
    }

    #[test]
    fn test_empty_resource_type_is_not_mapped() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Project").resource_type("projects"),
            ModelSchema::new("Task2").resource_type(""),
            ModelSchema::new("Task3"),
        ]);
        let index = SchemaIndex::build(&schema).unwrap();
        assert_eq!(index.resource_type_map().len(), 1);
        assert_eq!(index.model_name_map().len(), 1);
        assert!(index.model_names().any(|m| m == "Task2"));
    }

    #[test]
    fn test_duplicate_resource_type() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Task").resource_type("tasks"),
            ModelSchema::new("DuplicateTask").resource_type("tasks"),
        ]);
        match SchemaIndex::build(&schema) {
            Err(JsonApiOrmError::DuplicateResourceType { resource_type, model }) => {
                assert_eq!(resource_type, "tasks");
                assert_eq!(model, "Task");
            }
            other => panic!("expected DuplicateResourceType, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_model_name() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Task").resource_type("tasks"),
            ModelSchema::new("Task").resource_type("todos"),
        ]);
        assert!(matches!(
            SchemaIndex::build(&schema),
            Err(JsonApiOrmError::DuplicateModelName(name)) if name == "Task"
        ));
    }

    #[test]
    fn test_foreign_key_registers_pair() {
        let index = SchemaIndex::build(&test_schema()).unwrap();

        assert_eq!(
            index.descriptor("Task", "project"),
            Some(&RelationshipDescriptor::ManyToOneChild(Link {
                this_model: "Task".into(),
                this_field: "project".into(),
                other_model: "Project".into(),
                other_field: "tasks".into(),
            }))
        );
        assert_eq!(
            index.descriptor("Project", "tasks"),
            Some(&RelationshipDescriptor::OneToManyParent(Link {
                this_model: "Project".into(),
                this_field: "tasks".into(),
                other_model: "Task".into(),
                other_field: "project".into(),
            }))
        );
    }

    #[test]
    fn test_self_referential_foreign_key() {
        let index = SchemaIndex::build(&test_schema()).unwrap();
        let child = index.descriptor("Task", "parent").unwrap();
        let parent = index.descriptor("Task", "subtasks").unwrap();
        assert_eq!(child.kind(), "many_to_one_child");
        assert_eq!(parent.kind(), "one_to_many_parent");
        assert_eq!(index.complement(child), Some(parent));
    }

    #[test]
    fn test_many_to_many_derives_join_model() {
        let index = SchemaIndex::build(&test_schema()).unwrap();

        assert!(index.is_join_model("PersonProjects"));
        assert!(index.model_names().any(|m| m == "PersonProjects"));
        assert_eq!(index.resource_type_for("PersonProjects"), None);

        match index.descriptor("Person", "projects") {
            Some(RelationshipDescriptor::ManyToManyParent(through)) => {
                assert_eq!(through.through_model, "PersonProjects");
                assert_eq!(through.this_through_field, "fromPerson");
                assert_eq!(through.other_through_field, "toProject");
                assert_eq!(through.target_model, "Project");
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
        match index.descriptor("Project", "assignees") {
            Some(RelationshipDescriptor::ManyToManyParent(through)) => {
                assert_eq!(through.through_model, "PersonProjects");
                assert_eq!(through.this_through_field, "toProject");
                assert_eq!(through.other_through_field, "fromPerson");
                assert_eq!(through.target_model, "Person");
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
        match index.descriptor("PersonProjects", "fromPerson") {
            Some(RelationshipDescriptor::ManyToManyChild(through)) => {
                assert_eq!(through.target_model, "Person");
                assert_eq!(through.target_field, "projects");
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
        assert!(matches!(
            index.descriptor("PersonProjects", "toProject"),
            Some(RelationshipDescriptor::ManyToManyChild(_))
        ));
    }

    #[test]
    fn test_self_referential_many_to_many_field_names() {
        let index = SchemaIndex::build(&test_schema()).unwrap();
        assert!(index.is_join_model("PersonFriends"));
        assert!(index.descriptor("PersonFriends", "fromPersonId").is_some());
        assert!(index.descriptor("PersonFriends", "toPersonId").is_some());
        assert!(index.descriptor("Person", "friendOf").is_some());
    }

    #[test]
    fn test_explicit_through_model() {
        let index = SchemaIndex::build(&test_schema()).unwrap();
        assert!(index.is_join_model("Authorship"));
        assert!(index.descriptor("Authorship", "book").is_some());
        assert!(index.descriptor("Authorship", "author").is_some());
        assert_eq!(
            index.descriptor("Author", "books").map(|d| d.other_field()),
            Some("author")
        );
    }

    #[test]
    fn test_default_related_name() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Project").resource_type("projects"),
            ModelSchema {
                name: "Task".into(),
                resource_type: Some("tasks".into()),
                fields: [(
                    "project".to_string(),
                    FieldSpec::ForeignKey {
                        to: "Project".into(),
                        related_name: None,
                    },
                )]
                .into_iter()
                .collect(),
            },
        ]);
        let index = SchemaIndex::build(&schema).unwrap();
        assert!(matches!(
            index.descriptor("Project", "taskSet"),
            Some(RelationshipDescriptor::OneToManyParent(_))
        ));
    }

    #[test]
    fn test_every_descriptor_has_one_complement() {
        let index = SchemaIndex::build(&test_schema()).unwrap();
        let descriptors = index.descriptors();
        assert!(!descriptors.is_empty());

        for ((model, field), descriptor) in &descriptors {
            let complement = index
                .complement(descriptor)
                .unwrap_or_else(|| panic!("{model}.{field} has no complement"));
            assert_eq!(complement.other_model(), *model);
            assert_eq!(complement.other_field(), *field);

            let pointing_back = descriptors
                .values()
                .filter(|d| d.other_model() == *model && d.other_field() == *field)
                .count();
            assert_eq!(pointing_back, 1, "{model}.{field}");
        }
    }

    #[test]
    fn test_unknown_target_model() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Task").foreign_key("project", "Project", "tasks"),
        ]);
        assert!(matches!(
            SchemaIndex::build(&schema),
            Err(JsonApiOrmError::UnknownModel(name)) if name == "Project"
        ));
    }

    #[test]
    fn test_conflicting_relationship_slot() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Project"),
            ModelSchema::new("Task").foreign_key("project", "Project", "items"),
            ModelSchema::new("Milestone").foreign_key("project", "Project", "items"),
        ]);
        assert!(matches!(
            SchemaIndex::build(&schema),
            Err(JsonApiOrmError::ConflictingRelationship { model, field })
                if model == "Project" && field == "items"
        ));
    }

    #[test]
    fn test_derived_join_name_collides_with_model() {
        let schema = SchemaDefinition::new(vec![
            ModelSchema::new("Author"),
            ModelSchema::new("Book").many_to_many("authors", "Author", "books"),
            ModelSchema::new("BookAuthors"),
        ]);
        assert!(matches!(
            SchemaIndex::build(&schema),
            Err(JsonApiOrmError::DuplicateModelName(name)) if name == "BookAuthors"
        ));
    }
}
