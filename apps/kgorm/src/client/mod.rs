//! # KG Client
//!
//! The `KgApi` trait is the seam between the ORM and the kg-core REST API.
//! [`KgClient`] implements it over HTTP; tests substitute in-memory fakes.

mod http;

pub use http::KgClient;

use async_trait::async_trait;
use kgorm_core::primitives::DEFAULT_PAGE_SIZE;
use kgorm_core::{ReleaseStatus, Stage};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors from the HTTP client layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Cannot reach the KG server.
    #[error("Cannot connect to the KG at {0}")]
    ConnectionFailed(String),

    /// 401 Unauthorized - token missing, invalid or expired.
    #[error("Unauthorized: invalid or expired token")]
    Unauthorized,

    /// 403 Forbidden - the token lacks rights on this space or instance.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404 on an endpoint where absence is an error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 429 Too Many Requests.
    #[error("Rate limited: too many requests")]
    RateLimited,

    /// Any other 4xx.
    #[error("Request rejected ({0}): {1}")]
    BadRequest(u16, String),

    /// Server returned a 5xx error.
    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    /// Failed to parse response body.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// An argument could not be turned into a request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

/// Parameters of a stored-query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub stage: Stage,
    pub from: usize,
    pub size: usize,
    /// Restrict the results to a single instance.
    pub instance_id: Option<Uuid>,
    /// Values for the query's named filter parameters.
    pub filters: BTreeMap<String, String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            stage: Stage::Released,
            from: 0,
            size: DEFAULT_PAGE_SIZE,
            instance_id: None,
            filters: BTreeMap::new(),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultPage {
    #[serde(default)]
    pub data: Vec<Value>,
    /// Total number of matches, when the server reports it.
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub from: usize,
    #[serde(default)]
    pub size: usize,
}

// =============================================================================
// API TRAIT
// =============================================================================

/// The kg-core operations the ORM relies on.
#[async_trait]
pub trait KgApi: Send + Sync {
    /// Execute a query document.
    async fn query(&self, query: &Value, params: &QueryParams) -> Result<ResultPage, ClientError>;

    /// Fetch one instance document; `None` if it does not exist in `stage`.
    async fn instance_from_full_uri(
        &self,
        uri: &str,
        stage: Stage,
    ) -> Result<Option<Value>, ClientError>;

    /// Create an instance with a client-chosen UUID; returns the stored document.
    async fn create_new_instance(
        &self,
        data: &Value,
        space: &str,
        uuid: Uuid,
    ) -> Result<Value, ClientError>;

    /// Partially update an instance; returns the stored document.
    async fn update_instance(&self, uuid: Uuid, data: &Value) -> Result<Value, ClientError>;

    async fn delete_instance(&self, uuid: Uuid) -> Result<(), ClientError>;

    async fn release(&self, uuid: Uuid) -> Result<(), ClientError>;

    async fn unrelease(&self, uuid: Uuid) -> Result<(), ClientError>;

    async fn release_status(&self, uuid: Uuid) -> Result<ReleaseStatus, ClientError>;

    /// Profile of the token's owner.
    async fn user_info(&self) -> Result<Value, ClientError>;

    /// Names of the spaces visible to the token's owner.
    async fn spaces(&self) -> Result<Vec<String>, ClientError>;
}
