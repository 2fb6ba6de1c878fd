//! # kgorm-core
//!
//! The object model for the EBRAINS Knowledge Graph - THE MODEL.
//!
//! This crate describes openMINDS metadata types, converts objects to and from
//! JSON-LD, and compiles searches into kg-core query documents. It performs no
//! I/O; `apps/kgorm` drives it against the live service.
//!
//! ## Layout
//!
//! - `schema` / `openminds`: the Node/Property model and built-in types
//! - `value` / `codec`: property values and their JSON-LD form
//! - `object` / `proxy`: KGObject, EmbeddedMetadata, KGProxy, KGQuery
//! - `query` / `compiler` / `filter`: query documents and their parameters
//! - `cache` / `activity`: identity cache and write log used by the client

// =============================================================================
// MODULES
// =============================================================================

pub mod activity;
pub mod cache;
pub mod codec;
pub mod compiler;
pub mod filter;
pub mod object;
pub mod openminds;
pub mod primitives;
pub mod proxy;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{KgError, ReleaseStatus, Scope, Stage, normalize_id, uri_from_uuid, uuid_from_uri};

// =============================================================================
// RE-EXPORTS: Model
// =============================================================================

pub use activity::{Activity, ActivityKind, ActivityLog};
pub use cache::IdentityCache;
pub use filter::{cache_key, normalize_filters};
pub use object::{EmbeddedMetadata, KgObject};
pub use proxy::{KgProxy, KgQuery};
pub use query::{Filter, FilterOp, FollowLinks, Query, QueryProperty};
pub use schema::{NodeSchema, Property, SchemaKind, SchemaRegistry, TypeRef};
pub use value::FieldValue;
