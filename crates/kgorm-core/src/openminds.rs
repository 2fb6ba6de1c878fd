//! # Built-in openMINDS Schemas
//!
//! A subset of the openMINDS core module: people, organizations and datasets,
//! enough for the common curation workflows. Other types can be added at
//! runtime with [`SchemaRegistry::extend_from_json`].

use crate::primitives::{OPENMINDS_CORE, OPENMINDS_VOCAB};
use crate::schema::{NodeSchema, Property, SchemaRegistry, TypeRef};
use crate::KgError;

fn vocab(term: &str) -> String {
    format!("{OPENMINDS_VOCAB}{term}")
}

fn core(name: &str) -> String {
    format!("{OPENMINDS_CORE}{name}")
}

fn prop(name: &str, term: &str, types: Vec<TypeRef>) -> Property {
    Property::new(name, vocab(term), types)
}

fn class(name: &str) -> TypeRef {
    TypeRef::class(name)
}

#[must_use]
pub fn person() -> NodeSchema {
    NodeSchema::object("Person", core("Person"))
        .with_doc("Structured information on a person.")
        .with_property(prop("given_name", "givenName", vec![TypeRef::String]).required())
        .with_property(prop("family_name", "familyName", vec![TypeRef::String]))
        .with_property(prop("alternate_names", "alternateName", vec![TypeRef::String]).multiple())
        .with_property(prop("affiliations", "affiliation", vec![class("Affiliation")]).multiple())
        .with_property(prop(
            "contact_information",
            "contactInformation",
            vec![class("ContactInformation")],
        ))
        .with_property(prop("digital_identifiers", "digitalIdentifier", vec![class("ORCID")]).multiple())
        .with_property(
            prop("is_custodian_of", "custodian", vec![class("Dataset"), class("DatasetVersion")])
                .multiple()
                .reverse_of("custodians"),
        )
        .with_default_space("common")
        .with_existence_fields(&["given_name", "family_name"])
}

#[must_use]
pub fn organization() -> NodeSchema {
    NodeSchema::object("Organization", core("Organization"))
        .with_doc("An entity comprised of one or more natural persons with a particular purpose.")
        .with_property(prop("name", "fullName", vec![TypeRef::String]).required())
        .with_property(prop("alias", "shortName", vec![TypeRef::String]))
        .with_property(prop("has_parents", "hasParent", vec![class("Organization")]).multiple())
        .with_property(prop("homepage", "homepage", vec![TypeRef::Iri]))
        .with_property(
            prop("has_children", "hasParent", vec![class("Organization")])
                .multiple()
                .reverse_of("has_parents"),
        )
        .with_default_space("common")
        .with_existence_fields(&["name"])
        .with_alias("full_name", "name")
        .with_alias("short_name", "alias")
}

#[must_use]
pub fn contact_information() -> NodeSchema {
    NodeSchema::object("ContactInformation", core("ContactInformation"))
        .with_property(prop("email", "email", vec![TypeRef::String]).required())
        .with_property(
            prop("is_contact_information_of", "contactInformation", vec![class("Person")])
                .multiple()
                .reverse_of("contact_information"),
        )
        .with_default_space("restricted")
        .with_existence_fields(&["email"])
}

#[must_use]
pub fn orcid() -> NodeSchema {
    NodeSchema::object("ORCID", core("ORCID"))
        .with_doc("A persistent identifier for a researcher provided by Open Researcher and Contributor ID, Inc.")
        .with_property(prop("identifier", "identifier", vec![TypeRef::Iri]).required())
        .with_default_space("common")
        .with_existence_fields(&["identifier"])
}

#[must_use]
pub fn affiliation() -> NodeSchema {
    NodeSchema::embedded("Affiliation", core("Affiliation"))
        .with_property(prop("member_of", "memberOf", vec![class("Organization")]).required())
        .with_property(prop("start_date", "startDate", vec![TypeRef::Date]))
        .with_property(prop("end_date", "endDate", vec![TypeRef::Date]))
}

#[must_use]
pub fn dataset() -> NodeSchema {
    NodeSchema::object("Dataset", core("Dataset"))
        .with_doc("An information resource to which several versions may belong.")
        .with_property(prop("name", "fullName", vec![TypeRef::String]).required())
        .with_property(prop("alias", "shortName", vec![TypeRef::String]).required())
        .with_property(prop("description", "description", vec![TypeRef::String]))
        .with_property(
            prop("custodians", "custodian", vec![class("Person"), class("Organization")]).multiple(),
        )
        .with_property(prop("has_versions", "hasVersion", vec![class("DatasetVersion")]).multiple())
        .with_default_space("dataset")
        .with_existence_fields(&["alias"])
        .with_alias("full_name", "name")
        .with_alias("short_name", "alias")
        .with_alias("versions", "has_versions")
}

#[must_use]
pub fn dataset_version() -> NodeSchema {
    NodeSchema::object("DatasetVersion", core("DatasetVersion"))
        .with_property(prop("name", "fullName", vec![TypeRef::String]))
        .with_property(prop("alias", "shortName", vec![TypeRef::String]).required())
        .with_property(prop("version_identifier", "versionIdentifier", vec![TypeRef::String]).required())
        .with_property(prop("version_innovation", "versionInnovation", vec![TypeRef::String]))
        .with_property(prop("release_date", "releaseDate", vec![TypeRef::Date]))
        .with_property(
            prop("custodians", "custodian", vec![class("Person"), class("Organization")]).multiple(),
        )
        .with_property(
            prop("authors", "author", vec![class("Person"), class("Organization")]).multiple(),
        )
        .with_property(
            prop("is_version_of", "hasVersion", vec![class("Dataset")]).reverse_of("has_versions"),
        )
        .with_default_space("dataset")
        .with_existence_fields(&["alias", "version_identifier"])
        .with_alias("full_name", "name")
        .with_alias("short_name", "alias")
}

/// Registry holding every built-in schema.
pub fn core_registry() -> Result<SchemaRegistry, KgError> {
    let mut registry = SchemaRegistry::new();
    for schema in [
        person(),
        organization(),
        contact_information(),
        orcid(),
        affiliation(),
        dataset(),
        dataset_version(),
    ] {
        registry.register(schema)?;
    }
    registry.check()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_registry_is_consistent() {
        let registry = core_registry().expect("registry");
        assert_eq!(registry.len(), 7);
        assert!(registry.get("Affiliation").expect("affiliation").is_embedded());
        assert_eq!(
            registry
                .by_type_iri("https://openminds.ebrains.eu/core/Person")
                .map(|s| s.class_name.clone()),
            Some("Person".to_string())
        );
    }

    #[test]
    fn reverse_links_mirror_forward_paths() {
        let registry = core_registry().expect("registry");
        for schema in registry.iter() {
            for rev in &schema.reverse_properties {
                let forward_name = rev.reverse.as_deref().expect("reverse");
                let mirrored = rev.class_types().any(|target| {
                    registry
                        .get(target)
                        .ok()
                        .and_then(|t| t.property(forward_name).map(|p| p.path == rev.path))
                        .unwrap_or(false)
                });
                assert!(mirrored, "{}.{}", schema.class_name, rev.name);
            }
        }
    }
}
