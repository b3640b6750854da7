//! Error types for the bridge

use ponte_sdk::{AbiError, BridgeStatus, Handle, MemberKind, StatusCode};
use thiserror::Error;

use crate::loader::LoadError;
use crate::registry::RegistryState;
use crate::runtime::TypeId;

/// Result alias used throughout the bridge
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Library could not be loaded or an export is missing
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Handle unknown, released, or naming the wrong kind of referent
    #[error("Invalid handle {handle:?}: {reason}")]
    InvalidHandle {
        /// Offending handle
        handle: Handle,
        /// What was wrong with it
        reason: &'static str,
    },

    /// Handle space exhausted
    #[error("Handle table exhausted")]
    HandlesExhausted,

    /// Member could not be resolved
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Handle names a member of another kind than requested
    #[error("{member} is a {actual}, not a {requested}")]
    KindMismatch {
        /// Member name
        member: String,
        /// Kind the member really has
        actual: MemberKind,
        /// Kind named by the caller
        requested: MemberKind,
    },

    /// Value does not match the declared type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Declared type
        expected: String,
        /// Received kind or class
        got: String,
    },

    /// Value access requested with the method kind
    #[error("Cannot get or set the value of method {0}")]
    MissingMethod(String),

    /// Value access requested with the constructor kind
    #[error("Cannot get or set the value of constructor {0}")]
    MissingMember(String),

    /// Property lacks the accessor an operation needs
    #[error("Property {member} is not {access}")]
    Inaccessible {
        /// Property name
        member: String,
        /// "readable" or "writable"
        access: &'static str,
    },

    /// Wrong number of arguments
    #[error("{member} takes {expected} arguments, got {got}")]
    ArityMismatch {
        /// Method or constructor name
        member: String,
        /// Declared count
        expected: usize,
        /// Received count
        got: usize,
    },

    /// Malformed input from native code
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A member body failed
    #[error("{member}: {source}")]
    Invocation {
        /// Member that failed
        member: String,
        /// Error reported by the body
        #[source]
        source: AbiError,
    },

    /// Entry point called off the owning thread or after teardown
    #[error("No active bridge context on this thread")]
    NoContext,

    /// Another bridge is already active on this thread
    #[error("A bridge is already active on this thread")]
    ContextBusy,

    /// Create/destroy calls that do not pair up
    #[error("Unbalanced lifecycle: {0}")]
    UnbalancedLifecycle(String),

    /// Operation not valid in the current registration state
    #[error("Bridge is {actual:?}; expected {expected}")]
    InvalidState {
        /// State the operation requires
        expected: &'static str,
        /// Current state
        actual: RegistryState,
    },

    /// Native `CreateInstance` returned null
    #[error("Native library could not create an instance of {0}")]
    CreateFailed(String),

    /// Type name registered twice
    #[error("Type already registered: {0}")]
    DuplicateType(String),

    /// Reference to a type id that was never registered
    #[error("Unknown type: {0:?}")]
    UnknownType(TypeId),
}

impl BridgeError {
    /// Shorthand for an `InvalidHandle` error
    pub fn invalid_handle(handle: Handle, reason: &'static str) -> Self {
        BridgeError::InvalidHandle { handle, reason }
    }
}

impl StatusCode for BridgeError {
    fn status(&self) -> BridgeStatus {
        match self {
            BridgeError::InvalidHandle { .. } | BridgeError::UnknownType(_) => {
                BridgeStatus::InvalidHandle
            }
            BridgeError::MemberNotFound(_)
            | BridgeError::KindMismatch { .. }
            | BridgeError::Inaccessible { .. } => BridgeStatus::MemberNotFound,
            BridgeError::TypeMismatch { .. } => BridgeStatus::TypeMismatch,
            BridgeError::MissingMethod(_) => BridgeStatus::MissingMethod,
            BridgeError::MissingMember(_) => BridgeStatus::MissingMember,
            BridgeError::ArityMismatch { .. } => BridgeStatus::ArityMismatch,
            BridgeError::Invocation { source, .. } => source.status(),
            BridgeError::NoContext | BridgeError::ContextBusy => BridgeStatus::NoContext,
            BridgeError::Load(_)
            | BridgeError::HandlesExhausted
            | BridgeError::InvalidArgument(_)
            | BridgeError::UnbalancedLifecycle(_)
            | BridgeError::InvalidState { .. }
            | BridgeError::CreateFailed(_)
            | BridgeError::DuplicateType(_) => BridgeStatus::InvalidArgument,
        }
    }
}
