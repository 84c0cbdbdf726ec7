//! Error types for pack/board loading and profile merging.

use std::path::PathBuf;

use crate::pin::PinId;

/// Errors that can occur while loading, validating, or merging declarations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// A pack or board declaration is missing fields, has malformed values,
    /// carries unknown fields, or declares an unsupported schema version.
    #[error("schema error in {origin}: {detail}")]
    Schema {
        /// File path or identifier of the offending declaration.
        origin: String,
        /// Description of the problem.
        detail: String,
    },

    /// A pack or board identifier does not resolve to a declaration.
    #[error("unknown {kind} '{id}'{}", referenced_by.as_ref().map(|r| format!(" (referenced by {r})")).unwrap_or_default())]
    Reference {
        /// "pack" or "board".
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
        /// The declaration holding the dangling reference, if any.
        referenced_by: Option<String>,
    },

    /// The requested pin map is inconsistent.
    #[error("pin conflict: {0}")]
    PinConflict(#[from] PinConflict),

    /// I/O error reading a declaration.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

/// A specific pin-map conflict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinConflict {
    /// Two physical pins were given the same name.
    #[error("name '{name}' is used by both {first} and {second}")]
    DuplicateName {
        name: String,
        first: PinId,
        second: PinId,
    },

    /// The same physical pin was requested twice.
    #[error("{pin} is requested as both '{first}' and '{second}'")]
    DuplicatePin {
        pin: PinId,
        first: String,
        second: String,
    },

    /// A reserved pin was given a name.
    #[error("{pin} is reserved ({reason}) and cannot be named '{name}'")]
    Reserved {
        pin: PinId,
        name: String,
        reason: String,
    },

    /// The pin does not exist on the selected board.
    #[error("{pin} does not exist on this board")]
    NoSuchPin { pin: PinId },

    /// The name cannot be emitted as a C identifier.
    #[error("'{name}' is not a valid pin name (expected [A-Za-z_][A-Za-z0-9_]*)")]
    InvalidName { name: String },
}

impl ProfileError {
    pub(crate) fn schema(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        ProfileError::Schema {
            origin: origin.into(),
            detail: detail.into(),
        }
    }
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
