//! # Property Codec
//!
//! Validation and JSON-LD (de)serialization of single property values.
//!
//! Linked nodes are written as `{"@id": uri}`. On the way back, a linked node
//! that only carries `@id`/`@type` becomes a [`KgProxy`]; one that carries
//! properties (a followed link in a query result) becomes a full [`KgObject`].

use crate::object::{EmbeddedMetadata, KgObject};
use crate::primitives::{META_SPACE, RESPONSE_VOCAB};
use crate::proxy::KgProxy;
use crate::schema::{NodeSchema, Property, SchemaRegistry, TypeRef};
use crate::types::normalize_id;
use crate::value::FieldValue;
use crate::{KgError, Scope};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value, json};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Property {
    /// Key under which this property appears in documents and query results.
    ///
    /// Forward properties use their IRI. Reverse properties get a key of their
    /// own in the response vocabulary, since a class may hold both directions
    /// of the same IRI.
    #[must_use]
    pub fn response_key(&self) -> String {
        if self.is_reverse() {
            format!("{RESPONSE_VOCAB}{}", self.name)
        } else {
            self.path.clone()
        }
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Check a value against this property; returns the problems found.
    #[must_use]
    pub fn validate(&self, value: &FieldValue, registry: &SchemaRegistry) -> Vec<String> {
        let mut problems = Vec::new();
        if value.is_null() {
            if self.required {
                problems.push(format!("'{}' is required", self.name));
            }
            return problems;
        }
        if let FieldValue::List(items) = value
            && !self.multiple
            && items.len() > 1
        {
            problems.push(format!(
                "'{}' takes a single value, got {}",
                self.name,
                items.len()
            ));
        }
        for item in value.items() {
            if matches!(item, FieldValue::List(_)) {
                problems.push(format!("'{}' does not accept nested lists", self.name));
                continue;
            }
            if !self.accepts(item) {
                let expected: Vec<&str> = self.types.iter().map(TypeRef::as_str).collect();
                problems.push(format!(
                    "'{}': {} is not one of [{}]",
                    self.name,
                    item.kind(),
                    expected.join(", ")
                ));
            }
            if let FieldValue::Embedded(embedded) = item
                && let Err(KgError::Validation(inner)) = embedded.validate(registry)
            {
                problems.extend(inner.into_iter().map(|p| format!("{}.{p}", self.name)));
            }
        }
        problems
    }

    /// True if a single (non-list) value matches one of the declared types.
    #[must_use]
    pub fn accepts(&self, item: &FieldValue) -> bool {
        let has = |t: &TypeRef| self.types.contains(t);
        let has_class = |c: &str| self.class_types().any(|t| t == c);
        match item {
            FieldValue::Null => true,
            FieldValue::Str(_) | FieldValue::Iri(_) => has(&TypeRef::String) || has(&TypeRef::Iri),
            FieldValue::Int(_) => has(&TypeRef::Integer) || has(&TypeRef::Float),
            FieldValue::Float(_) => has(&TypeRef::Float),
            FieldValue::Bool(_) => has(&TypeRef::Boolean),
            FieldValue::Date(_) => has(&TypeRef::Date),
            FieldValue::DateTime(_) => has(&TypeRef::DateTime),
            FieldValue::Embedded(e) => has_class(&e.schema.class_name),
            FieldValue::Object(o) => has_class(o.class_name()),
            FieldValue::Proxy(p) => {
                p.classes.is_empty() || p.classes.iter().any(|c| has_class(c))
            }
            FieldValue::Query(q) => q.classes.iter().any(|c| has_class(c)),
            FieldValue::List(_) => false,
        }
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Write a value as JSON-LD.
    pub fn serialize(&self, value: &FieldValue) -> Result<Value, KgError> {
        match value {
            FieldValue::List(items) => items
                .iter()
                .map(|item| self.serialize_item(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => self.serialize_item(single),
        }
    }

    fn serialize_item(&self, item: &FieldValue) -> Result<Value, KgError> {
        Ok(match item {
            FieldValue::Null => Value::Null,
            FieldValue::Str(s) | FieldValue::Iri(s) => Value::String(s.clone()),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Float(x) => Number::from_f64(*x).map(Value::Number).ok_or_else(|| {
                KgError::Serialization(format!("'{}': {x} is not a finite number", self.name))
            })?,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            FieldValue::Embedded(e) => e.to_jsonld()?,
            FieldValue::Object(o) => match &o.id {
                Some(id) => json!({ "@id": id }),
                None => return Err(KgError::NotSaved(o.class_name().to_string())),
            },
            FieldValue::Proxy(p) => json!({ "@id": p.id }),
            FieldValue::Query(_) => {
                return Err(KgError::Serialization(format!(
                    "'{}': a KgQuery cannot be written, resolve it first",
                    self.name
                )));
            }
            FieldValue::List(_) => {
                return Err(KgError::Serialization(format!(
                    "'{}': nested lists cannot be written",
                    self.name
                )));
            }
        })
    }

    // =========================================================================
    // DESERIALIZATION
    // =========================================================================

    /// Read a value from a JSON-LD document or query result.
    pub fn deserialize(
        &self,
        data: &Value,
        registry: &SchemaRegistry,
        scope: Option<Scope>,
    ) -> Result<FieldValue, KgError> {
        match data {
            Value::Null => Ok(FieldValue::Null),
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.deserialize_item(item, registry, scope)?;
                    if !value.is_null() {
                        values.push(value);
                    }
                }
                Ok(match values.len() {
                    0 => FieldValue::Null,
                    1 if !self.multiple => values.remove(0),
                    _ => FieldValue::List(values),
                })
            }
            single => {
                let value = self.deserialize_item(single, registry, scope)?;
                if self.multiple && !value.is_null() {
                    Ok(FieldValue::List(vec![value]))
                } else {
                    Ok(value)
                }
            }
        }
    }

    fn deserialize_item(
        &self,
        item: &Value,
        registry: &SchemaRegistry,
        scope: Option<Scope>,
    ) -> Result<FieldValue, KgError> {
        match item {
            Value::Null => Ok(FieldValue::Null),
            Value::Object(map) => self.deserialize_node(map, item, registry, scope),
            Value::String(s) => Ok(self.parse_text(s, registry, scope)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64()
                    && (self.types.contains(&TypeRef::Integer)
                        || !self.types.contains(&TypeRef::Float))
                {
                    return Ok(FieldValue::Int(i));
                }
                n.as_f64().map(FieldValue::Float).ok_or_else(|| {
                    KgError::Deserialization(format!("'{}': unreadable number {n}", self.name))
                })
            }
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Array(_) => Err(KgError::Deserialization(format!(
                "'{}': nested arrays are not supported",
                self.name
            ))),
        }
    }

    fn deserialize_node(
        &self,
        map: &Map<String, Value>,
        item: &Value,
        registry: &SchemaRegistry,
        scope: Option<Scope>,
    ) -> Result<FieldValue, KgError> {
        let types = type_list(map);
        let candidates: Vec<Arc<NodeSchema>> = self
            .class_types()
            .filter_map(|c| registry.get(c).ok())
            .collect();
        let matched = candidates
            .iter()
            .find(|s| types.iter().any(|t| *t == s.type_iri))
            .cloned();
        let id = map.get("@id").and_then(Value::as_str);

        let embedded = match &matched {
            Some(schema) => schema.is_embedded().then(|| schema.clone()),
            None if id.is_none() => candidates.iter().find(|s| s.is_embedded()).cloned(),
            None => None,
        };
        if let Some(schema) = embedded {
            return EmbeddedMetadata::from_jsonld(item, registry, Some(&schema.class_name), scope)
                .map(FieldValue::Embedded);
        }

        let Some(id) = id else {
            return Err(KgError::Deserialization(format!(
                "'{}': linked node without @id",
                self.name
            )));
        };
        let links: Vec<&Arc<NodeSchema>> = candidates.iter().filter(|s| !s.is_embedded()).collect();
        let followed = map
            .keys()
            .any(|k| k != "@id" && k != "@type" && k != META_SPACE);
        let target = matched.clone().or_else(|| match links.as_slice() {
            [only] => Some(Arc::clone(only)),
            _ => None,
        });

        if followed && let Some(schema) = target {
            return KgObject::from_jsonld(item, registry, Some(&schema.class_name), scope)
                .map(|obj| FieldValue::Object(Box::new(obj)));
        }

        let classes = match matched {
            Some(schema) => vec![schema.class_name.clone()],
            None => links.iter().map(|s| s.class_name.clone()).collect(),
        };
        let mut proxy = KgProxy::new(classes, id);
        proxy.preferred_scope = scope;
        Ok(FieldValue::Proxy(proxy))
    }

    /// Interpret a string against the declared types.
    ///
    /// Types are tried by [`text_rank`], not in declaration order, so a date
    /// reads as a date even when a string type is declared first.
    fn parse_text(&self, s: &str, registry: &SchemaRegistry, scope: Option<Scope>) -> FieldValue {
        let mut ordered: Vec<&TypeRef> = self.types.iter().collect();
        ordered.sort_by_key(|t| text_rank(t));
        for t in ordered {
            let parsed = match t {
                TypeRef::String => Some(FieldValue::Str(s.to_string())),
                TypeRef::Iri => Some(FieldValue::Iri(s.to_string())),
                TypeRef::Date => NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .ok()
                    .map(FieldValue::Date),
                TypeRef::DateTime => parse_datetime(s).map(FieldValue::DateTime),
                TypeRef::Integer => s.parse().ok().map(FieldValue::Int),
                TypeRef::Float => s.parse().ok().map(FieldValue::Float),
                TypeRef::Boolean => s.parse().ok().map(FieldValue::Bool),
                TypeRef::Class(class) => registry
                    .get(class)
                    .ok()
                    .filter(|schema| !schema.is_embedded())
                    .and_then(|_| normalize_id(s).ok())
                    .map(|uri| {
                        let mut proxy = KgProxy::new(vec![class.clone()], uri);
                        proxy.preferred_scope = scope;
                        FieldValue::Proxy(proxy)
                    }),
            };
            if let Some(value) = parsed {
                return value;
            }
        }
        FieldValue::Str(s.to_string())
    }
}

/// Parsing priority of a declared type for text values.
fn text_rank(t: &TypeRef) -> u8 {
    match t {
        TypeRef::Date => 0,
        TypeRef::DateTime => 1,
        TypeRef::Integer => 2,
        TypeRef::Float => 3,
        TypeRef::Boolean => 4,
        TypeRef::Class(_) => 5,
        TypeRef::Iri => 6,
        TypeRef::String => 7,
    }
}

/// The `@type` entries of a node, whether given as a string or a list.
pub(crate) fn type_list(map: &Map<String, Value>) -> Vec<&str> {
    match map.get("@type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<chrono::FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

// =============================================================================
// TESTS
// =============================================================================
