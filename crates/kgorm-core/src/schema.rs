//! # Node/Property Model
//!
//! Declarative description of every metadata type: its type IRI, forward and
//! reverse properties, value types, multiplicity and required-ness.
//!
//! Schemas are plain data. The built-in openMINDS subset lives in
//! [`crate::openminds`]; further types can be loaded from JSON with
//! [`SchemaRegistry::extend_from_json`].

use crate::KgError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// TYPE REFERENCES
// =============================================================================

/// The type of a property value: a primitive or the name of a registered class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Iri,
    /// A KGObject or EmbeddedMetadata class, by class name.
    Class(String),
}

impl TypeRef {
    /// Shorthand for a class reference.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    /// The class name, if this refers to a class.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Iri => "iri",
            Self::Class(name) => name,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TypeRef {
    type Error = KgError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(match value.as_str() {
            "" => return Err(KgError::Schema("empty type name".to_string())),
            "string" | "str" => Self::String,
            "integer" | "int" => Self::Integer,
            "float" | "number" => Self::Float,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "iri" => Self::Iri,
            _ => Self::Class(value),
        })
    }
}

impl From<TypeRef> for String {
    fn from(t: TypeRef) -> Self {
        t.as_str().to_string()
    }
}

// =============================================================================
// PROPERTY
// =============================================================================

/// One property of a metadata type.
///
/// A reverse property (`reverse` is set) has as `path` the forward IRI held by
/// the *other* class; it is read from query results but never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub types: Vec<TypeRef>,
    pub path: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub required: bool,
    /// Name of the forward property this one mirrors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
}

impl Property {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, types: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            types,
            path: path.into(),
            multiple: false,
            required: false,
            reverse: None,
            doc: String::new(),
        }
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as the reverse of the forward property `forward`.
    #[must_use]
    pub fn reverse_of(mut self, forward: impl Into<String>) -> Self {
        self.reverse = Some(forward.into());
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.reverse.is_some()
    }

    /// Names of the classes among this property's types.
    pub fn class_types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().filter_map(TypeRef::class_name)
    }

    /// True if any declared type is an identified (KGObject) class.
    #[must_use]
    pub fn is_link(&self, registry: &SchemaRegistry) -> bool {
        self.class_types()
            .any(|c| registry.get(c).is_ok_and(|s| !s.is_embedded()))
    }

    /// True if any declared type is an embedded class.
    #[must_use]
    pub fn is_embedded(&self, registry: &SchemaRegistry) -> bool {
        self.class_types()
            .any(|c| registry.get(c).is_ok_and(|s| s.is_embedded()))
    }

    /// True if the property holds text.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        self.types.contains(&TypeRef::String)
    }
}

// =============================================================================
// NODE SCHEMA
// =============================================================================

/// Whether instances have their own identity in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Identified graph node (KGObject).
    #[default]
    Object,
    /// Substructure without identifier (EmbeddedMetadata).
    Embedded,
}

/// Description of one metadata type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub class_name: String,
    pub type_iri: String,
    #[serde(default)]
    pub kind: SchemaKind,
    pub properties: Vec<Property>,
    #[serde(default)]
    pub reverse_properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_space: Option<String>,
    /// Properties whose values together identify an instance for `exists`.
    #[serde(default)]
    pub existence_fields: Vec<String>,
    /// Alternative property names, alias -> property name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
}

impl NodeSchema {
    /// Start an identified (KGObject) schema.
    #[must_use]
    pub fn object(class_name: impl Into<String>, type_iri: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            type_iri: type_iri.into(),
            kind: SchemaKind::Object,
            properties: Vec::new(),
            reverse_properties: Vec::new(),
            default_space: None,
            existence_fields: Vec::new(),
            aliases: BTreeMap::new(),
            doc: String::new(),
        }
    }

    /// Start an embedded schema.
    #[must_use]
    pub fn embedded(class_name: impl Into<String>, type_iri: impl Into<String>) -> Self {
        Self {
            kind: SchemaKind::Embedded,
            ..Self::object(class_name, type_iri)
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        if property.is_reverse() {
            self.reverse_properties.push(property);
        } else {
            self.properties.push(property);
        }
        self
    }

    #[must_use]
    pub fn with_default_space(mut self, space: impl Into<String>) -> Self {
        self.default_space = Some(space.into());
        self
    }

    #[must_use]
    pub fn with_existence_fields(mut self, fields: &[&str]) -> Self {
        self.existence_fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, name: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), name.into());
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.kind == SchemaKind::Embedded
    }

    /// Look up a forward or reverse property by name or alias.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        let name = self.aliases.get(name).map_or(name, String::as_str);
        self.all_properties().find(|p| p.name == name)
    }

    /// Like [`NodeSchema::property`], as an error when missing.
    pub fn require_property(&self, name: &str) -> Result<&Property, KgError> {
        self.property(name).ok_or_else(|| KgError::UnknownProperty {
            class: self.class_name.clone(),
            name: name.to_string(),
        })
    }

    /// Forward properties followed by reverse properties.
    pub fn all_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().chain(self.reverse_properties.iter())
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// All known schemas, by class name and by type IRI.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<NodeSchema>>,
    by_type: BTreeMap<String, String>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a schema.
    ///
    /// Two classes may not share a type IRI.
    pub fn register(&mut self, schema: NodeSchema) -> Result<(), KgError> {
        if let Some(existing) = self.by_type.get(&schema.type_iri)
            && existing != &schema.class_name
        {
            return Err(KgError::Schema(format!(
                "type {} already registered as {}",
                schema.type_iri, existing
            )));
        }
        self.by_type
            .insert(schema.type_iri.clone(), schema.class_name.clone());
        self.schemas
            .insert(schema.class_name.clone(), Arc::new(schema));
        Ok(())
    }

    pub fn get(&self, class_name: &str) -> Result<Arc<NodeSchema>, KgError> {
        self.schemas
            .get(class_name)
            .cloned()
            .ok_or_else(|| KgError::UnknownType(class_name.to_string()))
    }

    #[must_use]
    pub fn by_type_iri(&self, type_iri: &str) -> Option<Arc<NodeSchema>> {
        self.by_type
            .get(type_iri)
            .and_then(|name| self.schemas.get(name))
            .cloned()
    }

    /// The first registered schema among a list of `@type` values.
    #[must_use]
    pub fn first_of_types<'a>(
        &self,
        types: impl IntoIterator<Item = &'a str>,
    ) -> Option<Arc<NodeSchema>> {
        types.into_iter().find_map(|t| self.by_type_iri(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<NodeSchema>> {
        self.schemas.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Register every schema in a JSON array, then re-check the registry.
    ///
    /// Returns the number of schemas added.
    pub fn extend_from_json(&mut self, json: &str) -> Result<usize, KgError> {
        let schemas: Vec<NodeSchema> =
            serde_json::from_str(json).map_err(|e| KgError::Schema(e.to_string()))?;
        let count = schemas.len();
        for schema in schemas {
            self.register(schema)?;
        }
        self.check()?;
        Ok(count)
    }

    /// Verify cross-references between schemas.
    pub fn check(&self) -> Result<(), KgError> {
        let mut problems = Vec::new();
        for schema in self.schemas.values() {
            let class = &schema.class_name;
            for prop in schema.all_properties() {
                if prop.types.is_empty() {
                    problems.push(format!("{class}.{} has no types", prop.name));
                }
                for target in prop.class_types() {
                    if !self.schemas.contains_key(target) {
                        problems.push(format!(
                            "{class}.{} refers to unknown class {target}",
                            prop.name
                        ));
                    }
                }
            }
            for rev in &schema.reverse_properties {
                if rev.class_types().next().is_none() {
                    problems.push(format!(
                        "{class}.{} is a reverse property without a class type",
                        rev.name
                    ));
                }
            }
            for field in &schema.existence_fields {
                if !schema.properties.iter().any(|p| &p.name == field) {
                    problems.push(format!(
                        "{class}: existence field '{field}' is not a forward property"
                    ));
                }
            }
            for (alias, target) in &schema.aliases {
                if !schema.all_properties().any(|p| &p.name == target) {
                    problems.push(format!("{class}: alias '{alias}' points to '{target}'"));
                }
            }
            if schema.is_embedded()
                && (schema.default_space.is_some() || !schema.existence_fields.is_empty())
            {
                problems.push(format!(
                    "{class}: embedded types have no space or existence fields"
                ));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(KgError::Schema(problems.join("; ")))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
