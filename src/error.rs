//! Error types for farmgate

use std::fmt;

/// Rule category behind a `Forbidden` error.
///
/// Only the category is reported so a denial never reveals whether another
/// user holds a grant, or at which level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Caller's level is not in the allowed set
    InsufficientLevel,
    /// Manager-level grants cannot be handed to other users
    ManagerEscalation,
    /// Existing Manager grants cannot be changed or removed
    ManagerProtected,
    /// Only the owner may change grants held by the farm owner
    OwnerProtected,
    /// Operation is reserved for the farm owner
    NotOwner,
    /// No verified caller identity
    MissingIdentity,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rule::InsufficientLevel => "insufficient permission level",
            Rule::ManagerEscalation => "manager grants cannot be created for other users",
            Rule::ManagerProtected => "manager grants are protected",
            Rule::OwnerProtected => "the farm owner's grant is protected",
            Rule::NotOwner => "only the farm owner may do this",
            Rule::MissingIdentity => "missing caller identity",
        })
    }
}

/// The main error type for farmgate operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(Rule),
    /// A stored parent link points at nothing. Server-side fault.
    #[error("hierarchy integrity violated: {0}")]
    Integrity(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }
}

/// Result type alias for farmgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert a backend error into `Error::Storage`
pub fn err<E: std::error::Error>(e: E) -> Error {
    Error::Storage(e.to_string())
}
