//! Error types for the ponte ABI

use std::fmt;

/// Result type for member bodies and ABI calls
pub type AbiResult<T> = Result<T, AbiError>;

/// Errors raised while servicing a bridge operation
#[derive(Debug, Clone, thiserror::Error)]
pub enum AbiError {
    /// Value kind does not match the declared type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Invalid argument
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// Member body reported a failure
    #[error("Invocation failed: {0}")]
    Invocation(String),

    /// Member body panicked
    #[error("Member panicked: {0}")]
    Panic(String),
}

impl From<String> for AbiError {
    fn from(s: String) -> Self {
        AbiError::Invocation(s)
    }
}

impl From<&str> for AbiError {
    fn from(s: &str) -> Self {
        AbiError::Invocation(s.to_string())
    }
}

/// Status code returned across the boundary by get/set/call entry points
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeStatus {
    /// Operation completed
    Ok = 0,
    /// Handle unknown, released, or of the wrong referent kind
    InvalidHandle = -1,
    /// Member could not be resolved
    MemberNotFound = -2,
    /// Value kind did not match the declared type
    TypeMismatch = -3,
    /// Value access attempted on a method
    MissingMethod = -4,
    /// Value access attempted on a constructor
    MissingMember = -5,
    /// Wrong number of arguments
    ArityMismatch = -6,
    /// Member body failed
    Invocation = -7,
    /// Called off the owning thread or after teardown
    NoContext = -8,
    /// Member body panicked
    Panic = -9,
    /// Malformed argument (null pointer, bad UTF-8, unknown kind)
    InvalidArgument = -10,
}

impl BridgeStatus {
    /// Check for success
    pub const fn is_ok(self) -> bool {
        matches!(self, BridgeStatus::Ok)
    }

    /// Decode a raw status code
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(BridgeStatus::Ok),
            -1 => Some(BridgeStatus::InvalidHandle),
            -2 => Some(BridgeStatus::MemberNotFound),
            -3 => Some(BridgeStatus::TypeMismatch),
            -4 => Some(BridgeStatus::MissingMethod),
            -5 => Some(BridgeStatus::MissingMember),
            -6 => Some(BridgeStatus::ArityMismatch),
            -7 => Some(BridgeStatus::Invocation),
            -8 => Some(BridgeStatus::NoContext),
            -9 => Some(BridgeStatus::Panic),
            -10 => Some(BridgeStatus::InvalidArgument),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

impl From<&AbiError> for BridgeStatus {
    fn from(err: &AbiError) -> Self {
        match err {
            AbiError::TypeMismatch { .. } => BridgeStatus::TypeMismatch,
            AbiError::ArgumentError(_) => BridgeStatus::InvalidArgument,
            AbiError::Invocation(_) => BridgeStatus::Invocation,
            AbiError::Panic(_) => BridgeStatus::Panic,
        }
    }
}
