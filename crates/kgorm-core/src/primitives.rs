//! # Vocabulary Constants
//!
//! Fixed IRIs and limits shared by the codec, the query compiler and the client.
//! These values are dictated by kg-core and openMINDS and never change at runtime.

/// Prefix of every instance identifier issued by the KG.
pub const INSTANCE_URI_PREFIX: &str = "https://kg.ebrains.eu/api/instances/";

/// openMINDS property vocabulary, used as `@vocab` in written documents.
pub const OPENMINDS_VOCAB: &str = "https://openminds.ebrains.eu/vocab/";

/// Base of the openMINDS core type IRIs.
pub const OPENMINDS_CORE: &str = "https://openminds.ebrains.eu/core/";

/// Base of the openMINDS controlled-terms type IRIs.
pub const OPENMINDS_CONTROLLED_TERMS: &str = "https://openminds.ebrains.eu/controlledTerms/";

/// kg-core meta property carrying the space an instance lives in.
pub const META_SPACE: &str = "https://core.kg.ebrains.eu/vocab/meta/space";

/// `@vocab` of the query document language.
pub const QUERY_VOCAB: &str = "https://core.kg.ebrains.eu/vocab/query/";

/// Vocabulary of query responses.
pub const RESPONSE_VOCAB: &str = "https://schema.hbp.eu/myQuery/";

/// Description stamped into every generated query document.
pub const QUERY_DESCRIPTION: &str = "Automatically generated by kgorm";

/// Query parameter name used to filter by instance id.
pub const ID_PARAMETER: &str = "id";

/// Default number of results fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound on the depth of a `follow_links` tree.
///
/// Deeper trees produce query documents kg-core rejects or takes minutes to answer.
pub const MAX_FOLLOW_DEPTH: usize = 6;
