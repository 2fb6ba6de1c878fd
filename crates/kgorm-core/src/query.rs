//! # Query Module
//!
//! Structured representation of a kg-core JSON-LD query document.
//!
//! - `Filter`: a constraint on a property, bound to a request parameter or a literal
//! - `QueryProperty`: one node of the `structure` tree
//! - `Query`: the whole document
//! - `FollowLinks`: which links to expand inline when generating a query
//!
//! Documents are built by [`crate::compiler`]; this module only knows how to
//! write them.

use crate::primitives::{MAX_FOLLOW_DEPTH, QUERY_DESCRIPTION, QUERY_VOCAB, RESPONSE_VOCAB};
use crate::KgError;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

// =============================================================================
// FILTER
// =============================================================================

/// Filter operations supported by kg-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Regex,
    IsEmpty,
}

impl FilterOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::Equals => "EQUALS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::Regex => "REGEX",
            Self::IsEmpty => "IS_EMPTY",
        }
    }
}

/// What a filter compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    /// Named request parameter, supplied when the query is executed.
    Parameter(String),
    /// Literal baked into the document.
    Value(String),
    /// No operand (`IS_EMPTY`).
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub op: FilterOp,
    pub target: FilterTarget,
}

impl Filter {
    #[must_use]
    pub fn parameter(op: FilterOp, name: impl Into<String>) -> Self {
        Self {
            op,
            target: FilterTarget::Parameter(name.into()),
        }
    }

    #[must_use]
    pub fn value(op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            op,
            target: FilterTarget::Value(value.into()),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            op: FilterOp::IsEmpty,
            target: FilterTarget::None,
        }
    }

    #[must_use]
    pub fn serialize(&self) -> Value {
        let mut out = Map::new();
        out.insert("op".into(), Value::String(self.op.as_str().into()));
        match &self.target {
            FilterTarget::Parameter(p) => {
                out.insert("parameter".into(), Value::String(p.clone()));
            }
            FilterTarget::Value(v) => {
                out.insert("value".into(), Value::String(v.clone()));
            }
            FilterTarget::None => {}
        }
        Value::Object(out)
    }
}

// =============================================================================
// QUERY PROPERTY
// =============================================================================

/// One entry of a query `structure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProperty {
    pub path: String,
    /// Response key; defaults to `path`.
    pub name: Option<String>,
    pub reverse: bool,
    pub type_filter: Option<String>,
    pub filter: Option<Filter>,
    pub sorted: bool,
    pub required: bool,
    pub ensure_order: bool,
    pub expect_single: bool,
    pub properties: Vec<QueryProperty>,
}

impl QueryProperty {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            reverse: false,
            type_filter: None,
            filter: None,
            sorted: false,
            required: false,
            ensure_order: false,
            expect_single: false,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    #[must_use]
    pub fn with_type_filter(mut self, type_iri: impl Into<String>) -> Self {
        self.type_filter = Some(type_iri.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.sorted = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn ordered(mut self) -> Self {
        self.ensure_order = true;
        self
    }

    #[must_use]
    pub fn single(mut self) -> Self {
        self.expect_single = true;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Vec<QueryProperty>) -> Self {
        self.properties = properties;
        self
    }

    /// Response key of this property.
    #[must_use]
    pub fn property_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }

    #[must_use]
    pub fn serialize(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "propertyName".into(),
            Value::String(self.property_name().to_string()),
        );
        let path = if self.reverse || self.type_filter.is_some() {
            let mut p = Map::new();
            p.insert("@id".into(), Value::String(self.path.clone()));
            if self.reverse {
                p.insert("reverse".into(), Value::Bool(true));
            }
            if let Some(t) = &self.type_filter {
                p.insert("typeFilter".into(), json!({ "@id": t }));
            }
            Value::Object(p)
        } else {
            Value::String(self.path.clone())
        };
        out.insert("path".into(), path);
        if let Some(filter) = &self.filter {
            out.insert("filter".into(), filter.serialize());
        }
        if self.sorted {
            out.insert("sort".into(), Value::Bool(true));
        }
        if self.required {
            out.insert("required".into(), Value::Bool(true));
        }
        if self.ensure_order {
            out.insert("ensureOrder".into(), Value::Bool(true));
        }
        if self.expect_single {
            out.insert("singleValue".into(), Value::String("FIRST".into()));
        }
        if !self.properties.is_empty() {
            out.insert(
                "structure".into(),
                Value::Array(self.properties.iter().map(Self::serialize).collect()),
            );
        }
        Value::Object(out)
    }
}

/// Merge entries sharing a response key, keeping first-seen order.
///
/// Nested structures are merged recursively; flags are OR-ed.
#[must_use]
pub fn merge_properties(properties: Vec<QueryProperty>) -> Vec<QueryProperty> {
    let mut merged: Vec<QueryProperty> = Vec::with_capacity(properties.len());
    for prop in properties {
        match merged
            .iter_mut()
            .find(|m| m.property_name() == prop.property_name())
        {
            Some(existing) => {
                existing.required |= prop.required;
                existing.ensure_order |= prop.ensure_order;
                existing.sorted |= prop.sorted;
                if existing.filter.is_none() {
                    existing.filter = prop.filter;
                }
                if existing.type_filter != prop.type_filter {
                    existing.type_filter = None;
                }
                let mut children = std::mem::take(&mut existing.properties);
                children.extend(prop.properties);
                existing.properties = merge_properties(children);
            }
            None => merged.push(prop),
        }
    }
    merged
}

// =============================================================================
// QUERY
// =============================================================================

/// A complete query document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Type IRI of the root nodes.
    pub node_type: String,
    pub label: Option<String>,
    pub properties: Vec<QueryProperty>,
}

impl Query {
    #[must_use]
    pub fn new(node_type: impl Into<String>, properties: Vec<QueryProperty>) -> Self {
        Self {
            node_type: node_type.into(),
            label: None,
            properties,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Names of the request parameters referenced by filters, sorted.
    #[must_use]
    pub fn parameters(&self) -> Vec<String> {
        fn walk(props: &[QueryProperty], out: &mut Vec<String>) {
            for p in props {
                if let Some(Filter {
                    target: FilterTarget::Parameter(name),
                    ..
                }) = &p.filter
                {
                    out.push(name.clone());
                }
                walk(&p.properties, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.properties, &mut out);
        out.sort();
        out.dedup();
        out
    }

    #[must_use]
    pub fn serialize(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("type".into(), Value::String(self.node_type.clone()));
        meta.insert("responseVocab".into(), Value::String(RESPONSE_VOCAB.into()));
        if let Some(label) = &self.label {
            meta.insert("name".into(), Value::String(label.clone()));
        }
        meta.insert("description".into(), Value::String(QUERY_DESCRIPTION.into()));
        json!({
            "@context": {
                "@vocab": QUERY_VOCAB,
                "query": RESPONSE_VOCAB,
                "propertyName": { "@id": "propertyName", "@type": "@id" },
                "path": { "@id": "path", "@type": "@id" }
            },
            "meta": meta,
            "structure": self.properties.iter().map(QueryProperty::serialize).collect::<Vec<_>>()
        })
    }
}

// =============================================================================
// FOLLOW LINKS
// =============================================================================

/// Tree of property names whose targets are expanded inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowLinks(BTreeMap<String, FollowLinks>);

impl FollowLinks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from dotted paths such as `affiliations.member_of`.
    pub fn parse<I, S>(paths: I) -> Result<Self, KgError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert_path(path.as_ref())?;
        }
        Ok(tree)
    }

    pub fn insert_path(&mut self, path: &str) -> Result<(), KgError> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(KgError::InvalidFilter(format!(
                "malformed follow_links path '{path}'"
            )));
        }
        if segments.len() > MAX_FOLLOW_DEPTH {
            return Err(KgError::InvalidFilter(format!(
                "follow_links path '{path}' is deeper than {MAX_FOLLOW_DEPTH}"
            )));
        }
        let mut node = self;
        for segment in segments {
            node = node.0.entry(segment.to_string()).or_default();
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FollowLinks> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the longest path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.values().map(|c| 1 + c.depth()).max().unwrap_or(0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
