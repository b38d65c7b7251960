//! Error types.
//!
//! Resolution itself never fails: a query that finds nothing reports
//! [`Resolution::Unresolved`](crate::method::Resolution::Unresolved) or
//! [`Resolution::Ambiguous`](crate::method::Resolution::Ambiguous). The only
//! error a query returns is [`Cancelled`].

use thiserror::Error;

use crate::ty::Type;

/// Result type alias for resolution queries.
pub type ResolveResult<T> = Result<T, Cancelled>;

/// A query observed cancellation and aborted.
///
/// Any inference bindings made by the aborted query have been discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resolution cancelled{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
pub struct Cancelled {
    /// The cancellation reason, if the canceller provided one.
    pub reason: Option<String>,
}

/// Errors from [`Unifier::combine`](crate::unify::Unifier::combine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnifyError {
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    Mismatch { expected: Type, found: Type },
}

/// Errors from loading a [`ResolveConfig`](crate::config::ResolveConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid configuration for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}
