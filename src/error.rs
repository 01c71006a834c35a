use std::fmt;

/// Compilation error
///
/// Returned by [`ChainCompiler::compile`](crate::compiler::ChainCompiler::compile) and the
/// components it orchestrates. Every variant is fatal: a configuration either compiles
/// fully or not at all, and a failed compile leaves no partial artifacts behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A global option or feature option is malformed
    ///
    /// Examples: a login or logout URL without a leading slash, a malformed regex
    /// pattern, or two mutually exclusive options set together.
    Validation {
        /// The offending configuration field
        field: String,
        message: String,
    },
    /// A filter placement could not be resolved
    Placement(PlacementError),
    /// Two features claim authority over the same external resource
    WiringAmbiguity {
        /// The contested resource
        resource: String,
        message: String,
    },
    /// A named reference does not resolve, or resolves to an object of the wrong kind
    UnresolvedReference {
        name: String,
        /// The capability the reference was expected to provide
        expected: &'static str,
    },
}

/// Filter placement error
///
/// `position`, `FIRST` and `LAST` directives are exclusive claims on a rank; built-in
/// filters hold exclusive claims on their canonical ranks. Two claimants to one rank is
/// a conflict. `before`/`after` directives only constrain relative order and never
/// conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// Two filters resolved to the same exclusive rank
    DuplicateRank {
        first: String,
        second: String,
        /// The contested slot or bucket, e.g. `LOGOUT` or `FIRST`
        slot: String,
    },
    /// A placement directive references a slot name that does not exist
    UnknownAnchor {
        filter: String,
        anchor: String,
    },
}

impl CompileError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Validation { field, message } => {
                write!(f, "invalid security configuration: {}: {}", field, message)
            }
            CompileError::Placement(e) => write!(f, "{}", e),
            CompileError::WiringAmbiguity { resource, message } => {
                write!(f, "ambiguous wiring for {}: {}", resource, message)
            }
            CompileError::UnresolvedReference { name, expected } => {
                write!(f, "reference '{}' does not resolve to a {}", name, expected)
            }
        }
    }
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::DuplicateRank { first, second, slot } => {
                write!(
                    f,
                    "filters '{}' and '{}' both claim the {} position; \
                    use before/after to order filters relative to an occupied slot",
                    first, second, slot
                )
            }
            PlacementError::UnknownAnchor { filter, anchor } => {
                write!(
                    f,
                    "custom filter '{}' references unknown slot '{}'",
                    filter, anchor
                )
            }
        }
    }
}

impl std::error::Error for CompileError {}
impl std::error::Error for PlacementError {}

impl From<PlacementError> for CompileError {
    fn from(e: PlacementError) -> Self {
        CompileError::Placement(e)
    }
}
