//! # Core Type Definitions
//!
//! This module contains the small vocabulary types shared by every other module:
//! - Data scopes and kg-core stages (`Scope`, `Stage`)
//! - Release status of an instance (`ReleaseStatus`)
//! - Instance identifier helpers (`uri_from_uuid`, `uuid_from_uri`, `normalize_id`)
//! - Error types (`KgError`)

use crate::primitives::INSTANCE_URI_PREFIX;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// SCOPE & STAGE
// =============================================================================

/// Which version of the data a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// Only data that has been released.
    #[default]
    Released,
    /// The current, possibly unreleased, version of the data.
    InProgress,
    /// Either of the above, in-progress data taking precedence.
    Any,
}

impl Scope {
    /// The concrete kg-core stages to query for this scope, in priority order.
    #[must_use]
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Self::Released => &[Stage::Released],
            Self::InProgress => &[Stage::InProgress],
            Self::Any => &[Stage::InProgress, Stage::Released],
        }
    }

    /// Human-readable form, as accepted by `FromStr`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Released => "released",
            Self::InProgress => "in progress",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "released" => Ok(Self::Released),
            "in progress" | "in_progress" | "in-progress" => Ok(Self::InProgress),
            "any" => Ok(Self::Any),
            other => Err(KgError::InvalidScope(other.to_string())),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = KgError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

/// A concrete data stage understood by kg-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Released,
    InProgress,
}

impl Stage {
    /// Wire form used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Released => "RELEASED",
            Self::InProgress => "IN_PROGRESS",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Stage> for Scope {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Released => Self::Released,
            Stage::InProgress => Self::InProgress,
        }
    }
}

// =============================================================================
// RELEASE STATUS
// =============================================================================

/// Release state of a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseStatus {
    /// The released version matches the in-progress version.
    Released,
    /// The instance has never been released.
    Unreleased,
    /// Released, but modified since.
    HasChanged,
}

impl FromStr for ReleaseStatus {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RELEASED" => Ok(Self::Released),
            "UNRELEASED" => Ok(Self::Unreleased),
            "HAS_CHANGED" => Ok(Self::HasChanged),
            other => Err(KgError::Deserialization(format!(
                "unknown release status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Released => "released",
            Self::Unreleased => "unreleased",
            Self::HasChanged => "has changed",
        };
        f.write_str(s)
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Build the full instance URI for a UUID.
#[must_use]
pub fn uri_from_uuid(uuid: &Uuid) -> String {
    format!("{INSTANCE_URI_PREFIX}{uuid}")
}

/// Extract the UUID from a full instance URI.
///
/// Only the last path segment is inspected, so URIs from other KG hosts are
/// accepted as long as they end in a UUID.
pub fn uuid_from_uri(uri: &str) -> Result<Uuid, KgError> {
    let last = uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri);
    Uuid::parse_str(last).map_err(|_| KgError::InvalidId(uri.to_string()))
}

/// Accept either a bare UUID or a full URI and return the full URI.
pub fn normalize_id(id: &str) -> Result<String, KgError> {
    let id = id.trim();
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uri_from_uuid(&uuid));
    }
    if id.starts_with("http://") || id.starts_with("https://") {
        uuid_from_uri(id)?;
        return Ok(id.to_string());
    }
    Err(KgError::InvalidId(id.to_string()))
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the object model.
///
/// The model never panics; every fallible operation returns `Result<T, KgError>`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KgError {
    /// No schema is registered under this class name or type IRI.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// The class has no property (or alias) with this name.
    #[error("{class} has no property '{name}'")]
    UnknownProperty { class: String, name: String },

    /// One or more values violate the schema.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A value cannot be written as JSON-LD.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A JSON-LD document does not match the schema.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Neither a UUID nor an instance URI.
    #[error("Invalid instance id: {0}")]
    InvalidId(String),

    /// A filter value cannot be expressed as a query parameter.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Unrecognized scope name.
    #[error("Invalid scope '{0}' (expected released, in progress or any)")]
    InvalidScope(String),

    /// A linked object has to be saved before it can be referenced.
    #[error("{0} has no id; save it first")]
    NotSaved(String),

    /// A proxy or query could not be turned into objects.
    #[error("Could not resolve {0}")]
    ResolutionFailed(String),

    /// A schema definition is inconsistent.
    #[error("Schema error: {0}")]
    Schema(String),
}

// =============================================================================
// TESTS
// =============================================================================
