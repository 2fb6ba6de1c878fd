//! # KGObject and EmbeddedMetadata
//!
//! `KgObject` is a client-side graph node with (once saved) an identifier and
//! a space. `EmbeddedMetadata` is a substructure stored inline in its parent.
//!
//! Both hold their values in a `BTreeMap` keyed by canonical property name, so
//! serialized documents are deterministic. A deserialized `KgObject` keeps a
//! snapshot of its own serialization (`remote_data`); [`KgObject::modified_data`]
//! diffs against it to build minimal updates.

use crate::codec::type_list;
use crate::primitives::{META_SPACE, OPENMINDS_VOCAB};
use crate::schema::{NodeSchema, SchemaRegistry};
use crate::types::{normalize_id, uuid_from_uri};
use crate::value::FieldValue;
use crate::{KgError, Scope};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// SHARED VALUE HANDLING
// =============================================================================

fn set_value(
    schema: &NodeSchema,
    values: &mut BTreeMap<String, FieldValue>,
    name: &str,
    value: FieldValue,
) -> Result<(), KgError> {
    let prop = schema.require_property(name)?;
    if prop.is_reverse() {
        return Err(KgError::Schema(format!(
            "{}.{} is a reverse property and is read-only",
            schema.class_name, prop.name
        )));
    }
    if value.is_null() {
        values.remove(&prop.name);
    } else {
        values.insert(prop.name.clone(), value);
    }
    Ok(())
}

fn validate_values(
    schema: &NodeSchema,
    values: &BTreeMap<String, FieldValue>,
    registry: &SchemaRegistry,
) -> Result<(), KgError> {
    let null = FieldValue::Null;
    let problems: Vec<String> = schema
        .all_properties()
        .flat_map(|prop| prop.validate(values.get(&prop.name).unwrap_or(&null), registry))
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(KgError::Validation(problems))
    }
}

/// Serialize forward properties only; reverse links are owned by the other side.
fn serialize_values(
    schema: &NodeSchema,
    values: &BTreeMap<String, FieldValue>,
    include_empty: bool,
) -> Result<Map<String, Value>, KgError> {
    let mut body = Map::new();
    for prop in &schema.properties {
        match values.get(&prop.name) {
            Some(value) if !value.is_null() => {
                body.insert(prop.path.clone(), prop.serialize(value)?);
            }
            _ if include_empty => {
                body.insert(prop.path.clone(), Value::Null);
            }
            _ => {}
        }
    }
    Ok(body)
}

fn deserialize_values(
    schema: &NodeSchema,
    data: &Map<String, Value>,
    registry: &SchemaRegistry,
    scope: Option<Scope>,
) -> Result<BTreeMap<String, FieldValue>, KgError> {
    let mut values = BTreeMap::new();
    for prop in schema.all_properties() {
        if let Some(raw) = data.get(&prop.response_key()) {
            let value = prop.deserialize(raw, registry, scope)?;
            if !value.is_null() {
                values.insert(prop.name.clone(), value);
            }
        }
    }
    Ok(values)
}

/// Pick the schema for a node: the expected class, or the first registered `@type`.
fn resolve_schema(
    data: &Map<String, Value>,
    registry: &SchemaRegistry,
    expected: Option<&str>,
) -> Result<Arc<NodeSchema>, KgError> {
    let types = type_list(data);
    match expected {
        Some(class) => {
            let schema = registry.get(class)?;
            if !types.is_empty() && !types.contains(&schema.type_iri.as_str()) {
                return Err(KgError::Deserialization(format!(
                    "expected {} but document has @type {}",
                    schema.type_iri,
                    types.join(", ")
                )));
            }
            Ok(schema)
        }
        None => registry
            .first_of_types(types.iter().copied())
            .ok_or_else(|| KgError::UnknownType(types.join(", "))),
    }
}

// =============================================================================
// KGOBJECT
// =============================================================================

/// An identified graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct KgObject {
    pub schema: Arc<NodeSchema>,
    /// Full instance URI; `None` until saved or found by `exists`.
    pub id: Option<String>,
    pub space: Option<String>,
    /// Scope the object was read from.
    pub scope: Option<Scope>,
    values: BTreeMap<String, FieldValue>,
    remote_data: Option<Map<String, Value>>,
}

impl KgObject {
    #[must_use]
    pub fn new(schema: Arc<NodeSchema>) -> Self {
        Self {
            schema,
            id: None,
            space: None,
            scope: None,
            values: BTreeMap::new(),
            remote_data: None,
        }
    }

    /// Builder-style [`KgObject::set`].
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Result<Self, KgError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Builder-style id assignment; accepts a UUID or a full URI.
    pub fn with_id(mut self, id: &str) -> Result<Self, KgError> {
        self.id = Some(normalize_id(id)?);
        Ok(self)
    }

    /// Set a forward property; `Null` clears it.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), KgError> {
        set_value(&self.schema, &mut self.values, name, value.into())
    }

    /// Value of a property (by name or alias), if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let prop = self.schema.property(name)?;
        self.values.get(&prop.name)
    }

    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Direct access to the stored values, used to save linked objects in place.
    pub fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut FieldValue)> {
        self.values.iter_mut()
    }

    /// Replace a stored value without schema checks; the name must be canonical.
    pub fn replace_value(&mut self, name: &str, value: FieldValue) {
        if value.is_null() {
            self.values.remove(name);
        } else {
            self.values.insert(name.to_string(), value);
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.schema.class_name
    }

    pub fn uuid(&self) -> Result<Uuid, KgError> {
        let id = self
            .id
            .as_deref()
            .ok_or_else(|| KgError::NotSaved(self.class_name().to_string()))?;
        uuid_from_uri(id)
    }

    pub fn validate(&self, registry: &SchemaRegistry) -> Result<(), KgError> {
        validate_values(&self.schema, &self.values, registry)
            .map_err(|e| prefix_problems(e, &self.schema.class_name))
    }

    /// Write as a JSON-LD instance document.
    pub fn to_jsonld(&self, include_empty: bool) -> Result<Value, KgError> {
        let mut doc = Map::new();
        doc.insert("@context".into(), json!({ "@vocab": OPENMINDS_VOCAB }));
        doc.insert("@type".into(), json!([self.schema.type_iri]));
        if let Some(id) = &self.id {
            doc.insert("@id".into(), Value::String(id.clone()));
        }
        doc.extend(serialize_values(&self.schema, &self.values, include_empty)?);
        Ok(Value::Object(doc))
    }

    /// Read an instance document or a query result row.
    ///
    /// With `expected`, the document's `@type` (if any) must match that class;
    /// otherwise the class is chosen from `@type`.
    pub fn from_jsonld(
        data: &Value,
        registry: &SchemaRegistry,
        expected: Option<&str>,
        scope: Option<Scope>,
    ) -> Result<Self, KgError> {
        let map = data
            .as_object()
            .ok_or_else(|| KgError::Deserialization("instance is not a JSON object".into()))?;
        let schema = resolve_schema(map, registry, expected)?;
        if schema.is_embedded() {
            return Err(KgError::Deserialization(format!(
                "{} is embedded metadata, not an object",
                schema.class_name
            )));
        }
        let id = map.get("@id").and_then(Value::as_str).map(str::to_string);
        let space = match map.get(META_SPACE) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => items.iter().find_map(Value::as_str).map(str::to_string),
            _ => None,
        };
        let values = deserialize_values(&schema, map, registry, scope)?;
        let mut obj = Self {
            schema,
            id,
            space,
            scope,
            values,
            remote_data: None,
        };
        obj.snapshot();
        Ok(obj)
    }

    /// Take identity and remote state from `remote`, keeping local values.
    pub fn adopt_remote(&mut self, remote: &KgObject) {
        self.id.clone_from(&remote.id);
        self.space.clone_from(&remote.space);
        self.scope = remote.scope;
        self.remote_data.clone_from(&remote.remote_data);
    }

    /// Record the current state as the state known to the KG.
    pub fn snapshot(&mut self) {
        self.remote_data = serialize_values(&self.schema, &self.values, false).ok();
    }

    #[must_use]
    pub fn remote_data(&self) -> Option<&Map<String, Value>> {
        self.remote_data.as_ref()
    }

    /// Forward properties that differ from the last snapshot.
    ///
    /// Cleared properties map to `null`. Without a snapshot every set
    /// property counts as modified.
    pub fn modified_data(&self) -> Result<Map<String, Value>, KgError> {
        let current = serialize_values(&self.schema, &self.values, false)?;
        let Some(remote) = &self.remote_data else {
            return Ok(current);
        };
        let mut changed = Map::new();
        for (key, value) in &current {
            if remote.get(key) != Some(value) {
                changed.insert(key.clone(), value.clone());
            }
        }
        for key in remote.keys() {
            if !current.contains_key(key) {
                changed.insert(key.clone(), Value::Null);
            }
        }
        Ok(changed)
    }

    /// Filters identifying this object for an existence check.
    ///
    /// `None` if the schema declares no existence fields or any is unset.
    #[must_use]
    pub fn existence_filters(&self) -> Option<BTreeMap<String, FieldValue>> {
        if self.schema.existence_fields.is_empty() {
            return None;
        }
        let mut filters = BTreeMap::new();
        for field in &self.schema.existence_fields {
            let value = self.values.get(field).filter(|v| !v.is_null())?;
            filters.insert(field.clone(), value.clone());
        }
        Some(filters)
    }
}

// =============================================================================
// EMBEDDED METADATA
// =============================================================================

/// A substructure without identity, stored inside its parent node.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedMetadata {
    pub schema: Arc<NodeSchema>,
    values: BTreeMap<String, FieldValue>,
}

impl EmbeddedMetadata {
    #[must_use]
    pub fn new(schema: Arc<NodeSchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Result<Self, KgError> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), KgError> {
        set_value(&self.schema, &mut self.values, name, value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let prop = self.schema.property(name)?;
        self.values.get(&prop.name)
    }

    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut FieldValue)> {
        self.values.iter_mut()
    }

    /// See [`KgObject::replace_value`].
    pub fn replace_value(&mut self, name: &str, value: FieldValue) {
        if value.is_null() {
            self.values.remove(name);
        } else {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn validate(&self, registry: &SchemaRegistry) -> Result<(), KgError> {
        validate_values(&self.schema, &self.values, registry)
    }

    pub fn to_jsonld(&self) -> Result<Value, KgError> {
        let mut doc = Map::new();
        doc.insert("@type".into(), json!([self.schema.type_iri]));
        doc.extend(serialize_values(&self.schema, &self.values, false)?);
        Ok(Value::Object(doc))
    }

    pub fn from_jsonld(
        data: &Value,
        registry: &SchemaRegistry,
        expected: Option<&str>,
        scope: Option<Scope>,
    ) -> Result<Self, KgError> {
        let map = data.as_object().ok_or_else(|| {
            KgError::Deserialization("embedded metadata is not a JSON object".into())
        })?;
        let schema = resolve_schema(map, registry, expected)?;
        if !schema.is_embedded() {
            return Err(KgError::Deserialization(format!(
                "{} is not embedded metadata",
                schema.class_name
            )));
        }
        let values = deserialize_values(&schema, map, registry, scope)?;
        Ok(Self { schema, values })
    }
}

fn prefix_problems(err: KgError, class: &str) -> KgError {
    match err {
        KgError::Validation(problems) => KgError::Validation(
            problems.into_iter().map(|p| format!("{class}: {p}")).collect(),
        ),
        other => other,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openminds;
    use chrono::NaiveDate;

    const ORG_ID: &str =
        "https://kg.ebrains.eu/api/instances/5a1b9c61-8f0e-4d57-9c1b-6bd1f0a0b0c2";
    const PERSON_ID: &str =
        "https://kg.ebrains.eu/api/instances/9d2c9f3e-4a4d-4b9e-8a0b-2f0c7b1e6a11";

    fn registry() -> SchemaRegistry {
        openminds::core_registry().expect("registry")
    }

    fn person(reg: &SchemaRegistry) -> KgObject {
        let org = KgObject::new(reg.get("Organization").expect("org"))
            .with("name", "Example Institute")
            .expect("name")
            .with_id(ORG_ID)
            .expect("id");
        let affiliation = EmbeddedMetadata::new(reg.get("Affiliation").expect("affiliation"))
            .with("member_of", org)
            .expect("member_of")
            .with("start_date", NaiveDate::from_ymd_opt(2019, 9, 1).expect("date"))
            .expect("start");
        KgObject::new(reg.get("Person").expect("person"))
            .with("given_name", "Ada")
            .expect("given")
            .with("family_name", "Lovelace")
            .expect("family")
            .with("affiliations", vec![affiliation])
            .expect("affiliations")
    }

    #[test]
    fn to_jsonld_writes_forward_properties() {
        let reg = registry();
        let doc = person(&reg).to_jsonld(false).expect("jsonld");
        assert_eq!(doc["@type"], json!(["https://openminds.ebrains.eu/core/Person"]));
        assert_eq!(doc["https://openminds.ebrains.eu/vocab/givenName"], json!("Ada"));
        let affiliation = &doc["https://openminds.ebrains.eu/vocab/affiliation"][0];
        assert_eq!(
            affiliation["https://openminds.ebrains.eu/vocab/memberOf"],
            json!({ "@id": ORG_ID })
        );
        assert_eq!(
            affiliation["https://openminds.ebrains.eu/vocab/startDate"],
            json!("2019-09-01")
        );
        assert!(doc.get("@id").is_none());
    }

    #[test]
    fn include_empty_writes_nulls() {
        let reg = registry();
        let doc = person(&reg).to_jsonld(true).expect("jsonld");
        assert_eq!(
            doc["https://openminds.ebrains.eu/vocab/contactInformation"],
            Value::Null
        );
    }

    #[test]
    fn from_jsonld_reads_space_and_links() {
        let reg = registry();
        let data = json!({
            "@id": PERSON_ID,
            "@type": ["https://openminds.ebrains.eu/core/Person"],
            "https://core.kg.ebrains.eu/vocab/meta/space": "common",
            "https://openminds.ebrains.eu/vocab/givenName": "Ada",
            "https://openminds.ebrains.eu/vocab/familyName": "Lovelace",
            "https://openminds.ebrains.eu/vocab/affiliation": [{
                "@type": ["https://openminds.ebrains.eu/core/Affiliation"],
                "https://openminds.ebrains.eu/vocab/memberOf": { "@id": ORG_ID }
            }]
        });
        let obj = KgObject::from_jsonld(&data, &reg, Some("Person"), Some(Scope::Released))
            .expect("from_jsonld");
        assert_eq!(obj.id.as_deref(), Some(PERSON_ID));
        assert_eq!(obj.space.as_deref(), Some("common"));
        let affiliations = obj.get("affiliations").expect("affiliations").items();
        let member_of = affiliations[0]
            .as_embedded()
            .and_then(|a| a.get("member_of"))
            .and_then(FieldValue::as_proxy)
            .expect("proxy");
        assert_eq!(member_of.id, ORG_ID);
        assert!(obj.modified_data().expect("diff").is_empty());
    }

    #[test]
    fn from_jsonld_rejects_wrong_type() {
        let reg = registry();
        let data = json!({ "@type": "https://openminds.ebrains.eu/core/Organization" });
        assert!(matches!(
            KgObject::from_jsonld(&data, &reg, Some("Person"), None),
            Err(KgError::Deserialization(_))
        ));
        let unknown = json!({ "@type": "https://example.org/Unknown" });
        assert!(matches!(
            KgObject::from_jsonld(&unknown, &reg, None, None),
            Err(KgError::UnknownType(_))
        ));
    }

    #[test]
    fn modified_data_tracks_changes_and_clears() {
        let reg = registry();
        let mut obj = person(&reg);
        obj.snapshot();
        obj.set("given_name", "Augusta").expect("set");
        obj.set("family_name", FieldValue::Null).expect("clear");
        let diff = obj.modified_data().expect("diff");
        assert_eq!(diff.len(), 2);
        assert_eq!(diff["https://openminds.ebrains.eu/vocab/givenName"], json!("Augusta"));
        assert_eq!(diff["https://openminds.ebrains.eu/vocab/familyName"], Value::Null);
    }

    #[test]
    fn adopt_remote_keeps_local_values() {
        let reg = registry();
        let mut remote = person(&reg)
            .with("given_name", "Augusta")
            .expect("given")
            .with_id(PERSON_ID)
            .expect("id");
        remote.space = Some("common".into());
        remote.snapshot();

        let mut local = person(&reg);
        local.adopt_remote(&remote);
        assert_eq!(local.id.as_deref(), Some(PERSON_ID));
        assert_eq!(local.space.as_deref(), Some("common"));
        let diff = local.modified_data().expect("diff");
        assert_eq!(diff.len(), 1);
        assert_eq!(diff["https://openminds.ebrains.eu/vocab/givenName"], json!("Ada"));
    }

    #[test]
    fn validation_reports_missing_required() {
        let reg = registry();
        let obj = KgObject::new(reg.get("Person").expect("person"));
        let Err(KgError::Validation(problems)) = obj.validate(&reg) else {
            unreachable!("given_name is required")
        };
        assert!(problems.iter().any(|p| p.contains("given_name")));
        assert!(problems[0].starts_with("Person: "));
    }

    #[test]
    fn validation_descends_into_embedded() {
        let reg = registry();
        let empty_affiliation = EmbeddedMetadata::new(reg.get("Affiliation").expect("aff"));
        let obj = person(&reg)
            .with("affiliations", vec![empty_affiliation])
            .expect("set");
        let err = obj.validate(&reg).expect_err("member_of missing");
        assert!(err.to_string().contains("affiliations.'member_of' is required"));
    }

    #[test]
    fn reverse_properties_are_read_only() {
        let reg = registry();
        let mut obj = KgObject::new(reg.get("Person").expect("person"));
        assert!(matches!(
            obj.set("is_custodian_of", "x"),
            Err(KgError::Schema(_))
        ));
    }

    #[test]
    fn existence_filters_need_all_fields() {
        let reg = registry();
        let obj = person(&reg);
        let filters = obj.existence_filters().expect("filters");
        assert_eq!(filters.len(), 2);
        let partial = KgObject::new(reg.get("Person").expect("person"))
            .with("given_name", "Ada")
            .expect("given");
        assert!(partial.existence_filters().is_none());
    }

    #[test]
    fn uuid_requires_id() {
        let reg = registry();
        assert!(matches!(person(&reg).uuid(), Err(KgError::NotSaved(_))));
        let saved = person(&reg).with_id(PERSON_ID).expect("id");
        assert!(saved.uuid().is_ok());
    }
}
