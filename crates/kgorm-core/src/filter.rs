//! # Filter Normalization
//!
//! Converts user-facing filter values into the text parameters a compiled
//! query expects, and derives the canonical key used by the save cache.

use crate::primitives::ID_PARAMETER;
use crate::schema::{NodeSchema, Property, SchemaRegistry};
use crate::types::normalize_id;
use crate::value::FieldValue;
use crate::KgError;
use std::collections::BTreeMap;

/// Normalize a filter map for `schema`.
///
/// Keys resolve through aliases to canonical property names; `id` is kept
/// as is. Values become the exact text sent as request parameters.
pub fn normalize_filters(
    schema: &NodeSchema,
    registry: &SchemaRegistry,
    filters: &BTreeMap<String, FieldValue>,
) -> Result<BTreeMap<String, String>, KgError> {
    let mut out = BTreeMap::new();
    for (name, value) in filters {
        if name == ID_PARAMETER {
            let id = match value {
                FieldValue::Str(s) | FieldValue::Iri(s) => normalize_id(s)?,
                other => other
                    .link_id()
                    .map(str::to_string)
                    .ok_or_else(|| KgError::InvalidFilter(format!("id: {}", other.kind())))?,
            };
            out.insert(ID_PARAMETER.to_string(), id);
            continue;
        }
        let prop = schema.require_property(name)?;
        out.insert(prop.name.clone(), normalize_value(prop, registry, value)?);
    }
    Ok(out)
}

/// Text form of one filter value.
pub fn normalize_value(
    prop: &Property,
    registry: &SchemaRegistry,
    value: &FieldValue,
) -> Result<String, KgError> {
    let invalid = |why: &str| KgError::InvalidFilter(format!("'{}': {why}", prop.name));
    match value {
        FieldValue::Null => Err(invalid("null cannot be used as a filter")),
        FieldValue::List(items) => match items.as_slice() {
            [only] => normalize_value(prop, registry, only),
            _ => Err(invalid("filters take exactly one value")),
        },
        FieldValue::Str(s) | FieldValue::Iri(s) => {
            if prop.is_link(registry) {
                match normalize_id(s) {
                    Ok(uri) => Ok(uri),
                    Err(_) if prop.is_textual() => Ok(s.clone()),
                    Err(e) => Err(e),
                }
            } else {
                Ok(s.clone())
            }
        }
        FieldValue::Int(n) => Ok(n.to_string()),
        FieldValue::Float(x) => Ok(x.to_string()),
        FieldValue::Bool(b) => Ok(b.to_string()),
        FieldValue::Date(d) => Ok(d.format("%Y-%m-%d").to_string()),
        FieldValue::DateTime(dt) => Ok(dt.to_rfc3339()),
        FieldValue::Object(obj) => {
            if !prop.accepts(value) {
                return Err(invalid(&format!("{} is not a valid target", obj.class_name())));
            }
            obj.id
                .clone()
                .ok_or_else(|| KgError::NotSaved(obj.class_name().to_string()))
        }
        FieldValue::Proxy(proxy) => {
            if !prop.accepts(value) {
                return Err(invalid("proxy class is not a valid target"));
            }
            Ok(proxy.id.clone())
        }
        FieldValue::Embedded(_) => Err(invalid("embedded metadata cannot be used as a filter")),
        FieldValue::Query(_) => Err(invalid("a query cannot be used as a filter")),
    }
}

/// Canonical save-cache key: class name plus `k=v` pairs in key order.
#[must_use]
pub fn cache_key(class_name: &str, normalized: &BTreeMap<String, String>) -> (String, String) {
    let pairs: Vec<String> = normalized.iter().map(|(k, v)| format!("{k}={v}")).collect();
    (class_name.to_string(), pairs.join("&"))
}
