//! # Application Errors
//!
//! `OrmError` unifies model errors from kgorm-core with transport errors from
//! the HTTP client, so `Store` and CLI code can use `?` on both.

use crate::client::ClientError;
use kgorm_core::KgError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error(transparent)]
    Model(#[from] KgError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// A new instance has no target space.
    #[error("No space given for {0}, and the type has no default space")]
    NoSpace(String),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file could not be read or parsed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl OrmError {
    /// True when the KG rejected the request for lack of a (valid) token.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Client(ClientError::Unauthorized | ClientError::Forbidden(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_and_client_errors_convert() {
        let err: OrmError = KgError::InvalidId("x".into()).into();
        assert_eq!(err.to_string(), "Invalid instance id: x");
        let err: OrmError = ClientError::Unauthorized.into();
        assert!(err.is_auth_failure());
        assert!(!OrmError::Config("no host".into()).is_auth_failure());
    }
}
