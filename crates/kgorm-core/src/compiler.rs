//! # Query Compiler
//!
//! Turns a node schema, a set of filtered property names and a `FollowLinks`
//! tree into a kg-core query document.
//!
//! Filtered properties get a `filter` bound to a request parameter of the same
//! name, so one document serves any filter values; the values themselves are
//! passed when the query is executed (see [`crate::filter`]).

use crate::primitives::{ID_PARAMETER, MAX_FOLLOW_DEPTH, META_SPACE};
use crate::query::{Filter, FilterOp, FollowLinks, Query, QueryProperty, merge_properties};
use crate::schema::{NodeSchema, Property, SchemaRegistry};
use crate::KgError;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Embedded structures may nest; bound the recursion for malformed schemas.
const MAX_NESTING: usize = 2 * MAX_FOLLOW_DEPTH;

impl NodeSchema {
    /// Build the query document for instances of this type.
    ///
    /// `filters` holds property names (aliases allowed, plus `id`) that will be
    /// supplied as request parameters. A `space` is baked in as a literal.
    pub fn generate_query(
        &self,
        registry: &SchemaRegistry,
        filters: &BTreeSet<String>,
        follow_links: Option<&FollowLinks>,
        space: Option<&str>,
    ) -> Result<Query, KgError> {
        let mut canonical = BTreeSet::new();
        let mut filter_id = false;
        for name in filters {
            if name == ID_PARAMETER {
                filter_id = true;
                continue;
            }
            let prop = self.require_property(name)?;
            canonical.insert(prop.name.clone());
        }
        if let Some(follow) = follow_links {
            check_follow_links(self, registry, follow)?;
        }

        let mut id = QueryProperty::new("@id");
        if filter_id {
            id = id.with_filter(Filter::parameter(FilterOp::Equals, ID_PARAMETER));
        }
        let mut space_prop = QueryProperty::new(META_SPACE);
        if let Some(space) = space {
            space_prop = space_prop
                .with_filter(Filter::value(FilterOp::Equals, space))
                .required();
        }
        let mut structure = vec![id, QueryProperty::new("@type"), space_prop];
        structure.extend(self.properties_at(registry, &canonical, follow_links, 0)?);
        Ok(Query::new(self.type_iri.clone(), structure))
    }

    /// Query properties for every forward and reverse property of this type.
    pub fn generate_query_properties(
        &self,
        registry: &SchemaRegistry,
        filters: &BTreeSet<String>,
        follow_links: Option<&FollowLinks>,
    ) -> Result<Vec<QueryProperty>, KgError> {
        self.properties_at(registry, filters, follow_links, 0)
    }

    fn properties_at(
        &self,
        registry: &SchemaRegistry,
        filters: &BTreeSet<String>,
        follow_links: Option<&FollowLinks>,
        depth: usize,
    ) -> Result<Vec<QueryProperty>, KgError> {
        if depth > MAX_NESTING {
            return Err(KgError::Schema(format!(
                "{} nests deeper than {MAX_NESTING} levels",
                self.class_name
            )));
        }
        self.all_properties()
            .map(|prop| {
                let follow = follow_links.and_then(|f| follow_entry(self, prop, f));
                prop.query_property(registry, filters.contains(&prop.name), follow, depth)
            })
            .collect()
    }
}

impl Property {
    fn query_property(
        &self,
        registry: &SchemaRegistry,
        filtered: bool,
        follow: Option<&FollowLinks>,
        depth: usize,
    ) -> Result<QueryProperty, KgError> {
        let mut base = QueryProperty::new(self.path.clone())
            .named(self.response_key())
            .reversed(self.is_reverse());
        if self.multiple {
            base = base.ordered();
        }

        let targets: Vec<Arc<NodeSchema>> = self
            .class_types()
            .map(|c| registry.get(c))
            .collect::<Result<_, _>>()?;
        let no_filters = BTreeSet::new();

        if !targets.is_empty() && targets.iter().all(|t| t.is_embedded()) {
            if filtered {
                return Err(KgError::InvalidFilter(format!(
                    "cannot filter on embedded property '{}'",
                    self.name
                )));
            }
            let mut nested = vec![QueryProperty::new("@type")];
            for target in &targets {
                nested.extend(target.properties_at(registry, &no_filters, follow, depth + 1)?);
            }
            if let [only] = targets.as_slice() {
                base = base.with_type_filter(only.type_iri.clone());
            }
            return Ok(base.with_properties(merge_properties(nested)));
        }

        if !targets.is_empty() {
            let mut id = QueryProperty::new("@id");
            if filtered {
                id = id.with_filter(Filter::parameter(FilterOp::Equals, self.name.clone()));
                base = base.required();
            }
            let mut nested = vec![id, QueryProperty::new("@type")];
            if let Some(follow) = follow {
                nested.push(QueryProperty::new(META_SPACE));
                for target in &targets {
                    nested.extend(target.properties_at(
                        registry,
                        &no_filters,
                        Some(follow),
                        depth + 1,
                    )?);
                }
                if let [only] = targets.as_slice() {
                    base = base.with_type_filter(only.type_iri.clone());
                }
            }
            return Ok(base.with_properties(merge_properties(nested)));
        }

        if filtered {
            let op = if self.is_textual() {
                FilterOp::Contains
            } else {
                FilterOp::Equals
            };
            base = base
                .with_filter(Filter::parameter(op, self.name.clone()))
                .required();
        }
        Ok(base)
    }
}

/// The sub-tree of `follow` selected for `prop`, by name or alias.
fn follow_entry<'a>(
    schema: &NodeSchema,
    prop: &Property,
    follow: &'a FollowLinks,
) -> Option<&'a FollowLinks> {
    follow.get(&prop.name).or_else(|| {
        schema
            .aliases
            .iter()
            .filter(|(_, target)| **target == prop.name)
            .find_map(|(alias, _)| follow.get(alias))
    })
}

/// Every followed name must be a link or embedded property of at least one
/// of the classes reached at that level.
fn check_follow_links(
    schema: &NodeSchema,
    registry: &SchemaRegistry,
    follow: &FollowLinks,
) -> Result<(), KgError> {
    check_level(&[Arc::new(schema.clone())], registry, follow)
}

fn check_level(
    schemas: &[Arc<NodeSchema>],
    registry: &SchemaRegistry,
    follow: &FollowLinks,
) -> Result<(), KgError> {
    for name in follow.names() {
        let Some(prop) = schemas.iter().find_map(|s| s.property(name)) else {
            let class = schemas
                .iter()
                .map(|s| s.class_name.as_str())
                .collect::<Vec<_>>()
                .join("|");
            return Err(KgError::UnknownProperty {
                class,
                name: name.to_string(),
            });
        };
        let targets: Vec<Arc<NodeSchema>> = prop
            .class_types()
            .map(|c| registry.get(c))
            .collect::<Result<_, _>>()?;
        if targets.is_empty() {
            return Err(KgError::InvalidFilter(format!(
                "'{name}' holds plain values and cannot be followed"
            )));
        }
        if let Some(sub) = follow.get(name)
            && !sub.is_empty()
        {
            check_level(&targets, registry, sub)?;
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
