//! # Lazy Placeholders
//!
//! `KgProxy` stands for a linked object known only by id; `KgQuery` stands
//! for a search that has not been executed yet. Neither touches the network:
//! a `Store` in the client crate resolves them.

use crate::types::uuid_from_uri;
use crate::{KgError, Scope};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unresolved reference to a KGObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KgProxy {
    /// Candidate class names; more than one when the link is polymorphic and
    /// the document did not say which.
    pub classes: Vec<String>,
    /// Full instance URI.
    pub id: String,
    pub preferred_scope: Option<Scope>,
}

impl KgProxy {
    #[must_use]
    pub fn new(classes: Vec<String>, id: impl Into<String>) -> Self {
        Self {
            classes,
            id: id.into(),
            preferred_scope: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.preferred_scope = Some(scope);
        self
    }

    pub fn uuid(&self) -> Result<Uuid, KgError> {
        uuid_from_uri(&self.id)
    }
}

/// Deferred search for objects of the given classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KgQuery {
    pub classes: Vec<String>,
    /// Normalized filter parameters, property name -> text.
    pub filters: BTreeMap<String, String>,
    pub preferred_scope: Option<Scope>,
}

impl KgQuery {
    #[must_use]
    pub fn new(classes: Vec<String>, filters: BTreeMap<String, String>) -> Self {
        Self {
            classes,
            filters,
            preferred_scope: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.preferred_scope = Some(scope);
        self
    }
}
