// src/error.rs

use thiserror::Error;
use uuid::Uuid;

/// Represents errors raised by operations on the option tree.
///
/// All of these are synchronous, local failures reported straight to the
/// caller; the engine never retries or swallows them. Stale derived-node
/// references are *not* errors (they are silently pruned).
#[derive(Error, Debug)]
pub enum OptionsError {
    /// The identifier is not present in the definition catalog.
    #[error("Option '{name}' is not defined in the catalog.")]
    UnknownOption {
        /// The unrecognized option identifier.
        name: String,
    },
    /// The definition exists but its applicability predicate rejects the
    /// node's scope.
    #[error("Option '{name}' is not valid in this scope.")]
    OptionNotApplicable {
        /// The option identifier.
        name: String,
    },
    /// The supplied value's runtime type does not match the declared type.
    #[error(
        "Invalid value type for option '{name}': expected '{expected}', got '{supplied}'."
    )]
    InvalidValueType {
        /// The option identifier.
        name: String,
        /// The type the catalog declares for this option.
        expected: &'static str,
        /// The type of the value the caller supplied.
        supplied: &'static str,
    },
    /// The value was rejected by the definition's validator.
    #[error("The supplied value failed validation for option '{name}'.")]
    ValidationFailed {
        /// The option identifier.
        name: String,
    },
    /// A typed read requested a static type incompatible with the declared
    /// value type.
    #[error(
        "Invalid type requested for option '{name}': requested '{requested}', declared '{declared}'."
    )]
    TypeMismatch {
        /// The option identifier.
        name: String,
        /// The statically requested type.
        requested: &'static str,
        /// The type the catalog declares for this option.
        declared: &'static str,
    },
    /// An operation that is never legal on the target node, such as changing
    /// the parent of the global node.
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation is rejected.
        reason: &'static str,
    },
    /// A node was supplied as its own parent.
    #[error("Node '{node_id}' cannot be its own parent.")]
    SelfReference {
        /// The offending node.
        node_id: Uuid,
    },
    /// Re-parenting would create a cycle in the ancestor chain.
    #[error("Re-parenting node '{node_id}' would create a cycle in the parent chain.")]
    CycleDetected {
        /// The node whose move would close the cycle.
        node_id: Uuid,
    },
}

pub type OptionsResult<T> = Result<T, OptionsError>;
