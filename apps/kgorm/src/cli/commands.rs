//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Output;
use crate::client::{KgApi, KgClient};
use crate::error::OrmError;
use crate::store::{ListOptions, Store};
use kgorm_core::{
    FieldValue, FollowLinks, KgError, KgObject, Scope, SchemaRegistry, TypeRef,
};
use serde_json::{Map, Number, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Maximum size of an input file for `create` (10 MB).
const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

const SCHEMA_ORG_USERNAME: &str = "http://schema.org/alternateName";
const SCHEMA_ORG_NAME: &str = "http://schema.org/name";

// =============================================================================
// ARGUMENT HELPERS
// =============================================================================

/// Parse `name=value` filter arguments.
pub fn parse_filters(args: &[String]) -> Result<BTreeMap<String, FieldValue>, OrmError> {
    let mut filters = BTreeMap::new();
    for arg in args {
        let (name, value) = arg.split_once('=').ok_or_else(|| {
            KgError::InvalidFilter(format!("'{arg}': expected name=value"))
        })?;
        filters.insert(name.trim().to_string(), FieldValue::from(value.trim()));
    }
    Ok(filters)
}

/// Property names of filter arguments; values, if any, are ignored.
fn filter_names(args: &[String]) -> BTreeSet<String> {
    args.iter()
        .map(|arg| arg.split_once('=').map_or(arg.as_str(), |(name, _)| name))
        .map(|name| name.trim().to_string())
        .collect()
}

fn parse_follow(args: &[String]) -> Result<Option<FollowLinks>, OrmError> {
    if args.is_empty() {
        return Ok(None);
    }
    Ok(Some(FollowLinks::parse(args)?))
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn not_found(id: &str) -> OrmError {
    KgError::ResolutionFailed(format!("no instance {id}")).into()
}

// =============================================================================
// OBJECT VIEWS
// =============================================================================

/// Readable rendering of an object: properties by name, nested objects inline.
pub fn object_view(obj: &KgObject) -> Value {
    let mut view = Map::new();
    if let Some(id) = &obj.id {
        view.insert("@id".into(), json!(id));
    }
    view.insert("@type".into(), json!(obj.class_name()));
    if let Some(space) = &obj.space {
        view.insert("space".into(), json!(space));
    }
    for (name, value) in obj.values() {
        view.insert(name.clone(), value_view(value));
    }
    Value::Object(view)
}

fn value_view(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Str(s) | FieldValue::Iri(s) => json!(s),
        FieldValue::Int(n) => json!(n),
        FieldValue::Float(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
        FieldValue::Bool(b) => json!(b),
        FieldValue::Date(d) => json!(d.to_string()),
        FieldValue::DateTime(dt) => json!(dt.to_rfc3339()),
        FieldValue::Embedded(embedded) => {
            let mut view = Map::new();
            view.insert("@type".into(), json!(embedded.schema.class_name));
            for (name, item) in embedded.values() {
                view.insert(name.clone(), value_view(item));
            }
            Value::Object(view)
        }
        FieldValue::Object(obj) => object_view(obj),
        FieldValue::Proxy(proxy) => json!({ "@id": proxy.id, "@type": proxy.classes }),
        FieldValue::Query(query) => json!({ "query": query.classes, "filters": query.filters }),
        FieldValue::List(items) => Value::Array(items.iter().map(value_view).collect()),
    }
}

/// Short label: the first text property that is set.
fn label(obj: &KgObject) -> String {
    obj.schema
        .properties
        .iter()
        .find_map(|p| obj.get(&p.name).and_then(FieldValue::as_str))
        .unwrap_or("")
        .to_string()
}

// =============================================================================
// OFFLINE COMMANDS
// =============================================================================

/// List registered types.
pub fn cmd_types(registry: &SchemaRegistry, out: Output) -> Result<(), OrmError> {
    if out.json {
        let types: Vec<Value> = registry
            .iter()
            .map(|s| {
                json!({
                    "class": s.class_name,
                    "type": s.type_iri,
                    "kind": s.kind,
                    "default_space": s.default_space,
                })
            })
            .collect();
        print_json(&Value::Array(types));
        return Ok(());
    }

    for schema in registry.iter() {
        let space = schema.default_space.as_deref().unwrap_or("-");
        let kind = if schema.is_embedded() { "embedded" } else { "object" };
        println!("{:<20} {:<9} {:<12} {}", schema.class_name, kind, space, schema.type_iri);
    }
    Ok(())
}

/// Show the properties of one type.
pub fn cmd_describe(registry: &SchemaRegistry, out: Output, class: &str) -> Result<(), OrmError> {
    let schema = registry.get(class)?;
    if out.json {
        let value = serde_json::to_value(&*schema)
            .map_err(|e| KgError::Serialization(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    println!("{} ({})", schema.class_name, schema.type_iri);
    if !schema.doc.is_empty() {
        println!("{}", schema.doc);
    }
    if let Some(space) = &schema.default_space {
        println!("Default space: {space}");
    }
    if !schema.existence_fields.is_empty() {
        println!("Identified by: {}", schema.existence_fields.join(", "));
    }
    println!();
    for prop in schema.all_properties() {
        let types: Vec<&str> = prop.types.iter().map(TypeRef::as_str).collect();
        let mut flags = Vec::new();
        if prop.required {
            flags.push("required");
        }
        if prop.multiple {
            flags.push("multiple");
        }
        if prop.is_reverse() {
            flags.push("reverse");
        }
        println!(
            "  {:<26} {:<32} {}",
            prop.name,
            types.join(" | "),
            flags.join(", ")
        );
    }
    for (alias, name) in &schema.aliases {
        println!("  {alias} -> {name}");
    }
    Ok(())
}

/// Print the query document for a type.
pub fn cmd_query(
    registry: &SchemaRegistry,
    class: &str,
    filters: &[String],
    follow: &[String],
    space: Option<&str>,
    label: Option<&str>,
) -> Result<(), OrmError> {
    let schema = registry.get(class)?;
    let follow = parse_follow(follow)?;
    let mut query =
        schema.generate_query(registry, &filter_names(filters), follow.as_ref(), space)?;
    if let Some(label) = label {
        query = query.with_label(label);
    }
    print_json(&query.serialize());
    Ok(())
}

// =============================================================================
// KG COMMANDS
// =============================================================================

/// Search instances.
pub async fn cmd_list(
    store: &Store<KgClient>,
    out: Output,
    class: &str,
    filters: &[String],
    follow: &[String],
    space: Option<String>,
    from: usize,
    size: Option<usize>,
) -> Result<(), OrmError> {
    let filters = parse_filters(filters)?;
    let options = ListOptions {
        scope: None,
        space,
        from,
        size,
        follow_links: parse_follow(follow)?,
    };
    let objects = store.list(class, &filters, &options).await?;

    if out.json {
        print_json(&Value::Array(objects.iter().map(object_view).collect()));
        return Ok(());
    }
    for obj in &objects {
        println!("{}  {}", obj.id.as_deref().unwrap_or("-"), label(obj));
    }
    if !out.quiet {
        println!("{} result(s)", objects.len());
    }
    Ok(())
}

/// Count instances.
pub async fn cmd_count(
    store: &Store<KgClient>,
    out: Output,
    class: &str,
    filters: &[String],
    space: Option<&str>,
) -> Result<(), OrmError> {
    let filters = parse_filters(filters)?;
    let count = store.count(class, &filters, None, space).await?;
    if out.json {
        print_json(&json!({ "class": class, "count": count }));
    } else {
        println!("{count}");
    }
    Ok(())
}

/// Fetch one instance.
pub async fn cmd_get(
    store: &Store<KgClient>,
    out: Output,
    id: &str,
    class: Option<&str>,
    follow: &[String],
    resolve: usize,
) -> Result<(), OrmError> {
    let follow = parse_follow(follow)?;
    let found = match class {
        Some(class) => store.from_id(class, id, None, follow.as_ref()).await?,
        None if follow.is_some() => {
            return Err(OrmError::Config("--follow requires --class".to_string()));
        }
        None => store.from_uri_any(id, None).await?,
    };
    let obj = found.ok_or_else(|| not_found(id))?;
    let obj = store.resolve_links(obj, resolve).await?;

    if out.json {
        print_json(&object_view(&obj));
        return Ok(());
    }
    println!("{} {}", obj.class_name(), obj.id.as_deref().unwrap_or(id));
    if let Some(space) = &obj.space {
        println!("  space: {space}");
    }
    for (name, value) in obj.values() {
        let text = match value_view(value) {
            Value::String(s) => s,
            other => other.to_string(),
        };
        println!("  {name}: {text}");
    }
    Ok(())
}

/// Read property values for `class` from a JSON file.
///
/// Linked objects are given by id; embedded metadata in JSON-LD form.
pub fn read_object(registry: &SchemaRegistry, class: &str, path: &Path) -> Result<KgObject, OrmError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| OrmError::Io(format!("Cannot read '{}': {e}", path.display())))?;
    if !metadata.is_file() {
        return Err(OrmError::Io(format!("'{}' is not a regular file", path.display())));
    }
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(OrmError::Io(format!(
            "File size {} bytes exceeds maximum allowed {MAX_INPUT_FILE_SIZE} bytes",
            metadata.len()
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| OrmError::Io(format!("Cannot read '{}': {e}", path.display())))?;
    let data: Value =
        serde_json::from_str(&text).map_err(|e| KgError::Deserialization(e.to_string()))?;
    let Value::Object(fields) = data else {
        return Err(KgError::Deserialization("expected a JSON object of property values".into()).into());
    };

    let schema = registry.get(class)?;
    let mut obj = KgObject::new(schema.clone());
    for (name, raw) in &fields {
        let prop = schema.require_property(name)?;
        let value = prop.deserialize(raw, registry, None)?;
        obj.set(name, value)?;
    }
    Ok(obj)
}

/// Create (or update the matching) instance.
pub async fn cmd_create(
    store: &Store<KgClient>,
    out: Output,
    class: &str,
    file: &Path,
    space: Option<&str>,
) -> Result<(), OrmError> {
    let mut obj = read_object(store.registry(), class, file)?;
    let kind = store.save(&mut obj, space, false).await?;
    let id = obj.id.clone().unwrap_or_default();

    if out.json {
        print_json(&json!({ "result": kind, "id": id, "space": obj.space }));
    } else {
        println!("{kind}: {class} {id}");
    }
    Ok(())
}

async fn fetch_in_progress(store: &Store<KgClient>, id: &str) -> Result<KgObject, OrmError> {
    store
        .from_uri_any(id, Some(Scope::InProgress))
        .await?
        .ok_or_else(|| not_found(id))
}

/// Delete an instance.
pub async fn cmd_delete(store: &Store<KgClient>, out: Output, id: &str) -> Result<(), OrmError> {
    let obj = fetch_in_progress(store, id).await?;
    store.delete(&obj).await?;
    if !out.quiet {
        println!("Deleted {} {}", obj.class_name(), obj.id.as_deref().unwrap_or(id));
    }
    Ok(())
}

/// Release (or unrelease) an instance.
pub async fn cmd_release(
    store: &Store<KgClient>,
    out: Output,
    id: &str,
    release: bool,
) -> Result<(), OrmError> {
    let obj = fetch_in_progress(store, id).await?;
    if release {
        store.release(&obj).await?;
    } else {
        store.unrelease(&obj).await?;
    }
    if !out.quiet {
        let action = if release { "Released" } else { "Unreleased" };
        println!("{action} {} {}", obj.class_name(), obj.id.as_deref().unwrap_or(id));
    }
    Ok(())
}

/// Show the release status of an instance.
pub async fn cmd_release_status(
    store: &Store<KgClient>,
    out: Output,
    id: &str,
) -> Result<(), OrmError> {
    let obj = fetch_in_progress(store, id).await?;
    let status = store.release_status(&obj).await?;
    if out.json {
        print_json(&json!({ "id": obj.id, "status": status }));
    } else {
        println!("{status}");
    }
    Ok(())
}

/// Show the token owner's profile.
pub async fn cmd_whoami(store: &Store<KgClient>, out: Output) -> Result<(), OrmError> {
    let user = store.client().user_info().await?;
    let username = user.get(SCHEMA_ORG_USERNAME).and_then(Value::as_str);
    match (out.json, username) {
        (false, Some(username)) => {
            let name = user.get(SCHEMA_ORG_NAME).and_then(Value::as_str).unwrap_or("");
            println!("{username} {name}");
        }
        _ => print_json(&user),
    }
    Ok(())
}

/// List visible spaces.
pub async fn cmd_spaces(store: &Store<KgClient>, out: Output) -> Result<(), OrmError> {
    let spaces = store.client().spaces().await?;
    if out.json {
        print_json(&json!(spaces));
    } else {
        for space in &spaces {
            println!("{space}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgorm_core::openminds;
    use std::io::Write;

    #[test]
    fn filters_need_a_value() {
        let filters = parse_filters(&["given_name = Ada".to_string()]).expect("parse");
        assert_eq!(filters["given_name"], FieldValue::from("Ada"));
        assert!(parse_filters(&["given_name".to_string()]).is_err());
    }

    #[test]
    fn filter_names_ignore_values() {
        let names = filter_names(&["name=Atlas".to_string(), "custodians".to_string()]);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["custodians".to_string(), "name".to_string()]
        );
    }

    #[test]
    fn read_object_uses_property_types() {
        let registry = openminds::core_registry().expect("registry");
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"given_name": "Ada", "family_name": "Lovelace",
                "contact_information": "5a1b9c61-8f0e-4d57-9c1b-6bd1f0a0b0c2"}}"#
        )
        .expect("write");
        let obj = read_object(&registry, "Person", file.path()).expect("read");
        assert_eq!(label(&obj), "Ada");
        let contact = obj.get("contact_information").and_then(FieldValue::as_proxy).expect("proxy");
        assert_eq!(
            contact.id,
            "https://kg.ebrains.eu/api/instances/5a1b9c61-8f0e-4d57-9c1b-6bd1f0a0b0c2"
        );
        let view = object_view(&obj);
        assert_eq!(view["@type"], json!("Person"));
        assert_eq!(view["contact_information"]["@type"], json!(["ContactInformation"]));
    }

    #[test]
    fn read_object_rejects_unknown_properties() {
        let registry = openminds::core_registry().expect("registry");
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"height": 180}}"#).expect("write");
        assert!(matches!(
            read_object(&registry, "Person", file.path()),
            Err(OrmError::Model(KgError::UnknownProperty { .. }))
        ));
    }
}
