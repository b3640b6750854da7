//! Reflect trait — the capability set native code is granted
//!
//! Native code cannot see managed object layouts, so everything it does to
//! the managed side goes through this interface: resolve a type, resolve a
//! member, construct, read, write, call. The bridge implements it exactly
//! once; the `extern "C"` entry points handed to native code are thin shims
//! over these methods.
//!
//! Resolution methods return `Ok(Handle::NULL)` for a miss so native code can
//! probe speculatively. `Err` is reserved for contract violations such as a
//! stale handle.

use crate::error::{AbiError, BridgeStatus};
use crate::handle::Handle;
use crate::kind::MemberKind;
use crate::value::BridgeValue;

/// Maps an error onto the status code reported across the boundary.
pub trait StatusCode {
    /// Status for this error
    fn status(&self) -> BridgeStatus;
}

impl StatusCode for AbiError {
    fn status(&self) -> BridgeStatus {
        BridgeStatus::from(self)
    }
}

/// Reflection capabilities exposed to native code.
pub trait Reflect {
    /// Error type of failed operations
    type Error: std::error::Error + StatusCode;

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a type by fully-qualified name
    fn resolve_type(&self, name: &str) -> Result<Handle, Self::Error>;

    /// Resolve a constructor of `ty` whose parameter types are exactly `param_types`
    fn resolve_constructor(
        &self,
        ty: Handle,
        param_types: &[Handle],
    ) -> Result<Handle, Self::Error>;

    /// Resolve a member of `ty` by name and kind
    fn resolve_member(
        &self,
        ty: Handle,
        name: &str,
        kind: MemberKind,
    ) -> Result<Handle, Self::Error>;

    // ========================================================================
    // Instances
    // ========================================================================

    /// Invoke a constructor and return the new instance handle
    fn construct(&self, ctor: Handle, args: &[BridgeValue]) -> Result<Handle, Self::Error>;

    /// Release a handle handed out earlier. Handles owned by the host, such
    /// as a live instance's proxy, are refused.
    fn release_handle(&self, handle: Handle) -> Result<(), Self::Error>;

    /// Read a field or property
    fn get_value(
        &self,
        instance: Handle,
        member: Handle,
        kind: MemberKind,
    ) -> Result<BridgeValue, Self::Error>;

    /// Write a field or property
    fn set_value(
        &self,
        instance: Handle,
        member: Handle,
        kind: MemberKind,
        value: &BridgeValue,
    ) -> Result<(), Self::Error>;

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call a method; `BridgeValue::none()` for void methods.
    /// Static methods take the null instance handle.
    fn call_method(
        &self,
        instance: Handle,
        method: Handle,
        args: &[BridgeValue],
    ) -> Result<BridgeValue, Self::Error>;

    /// Call a method whose last parameter is an output and whose return value
    /// is a success flag. `args` excludes the output parameter. Returns the
    /// output value when the method reports success.
    fn call_method_out(
        &self,
        instance: Handle,
        method: Handle,
        args: &[BridgeValue],
    ) -> Result<Option<BridgeValue>, Self::Error>;

    // ========================================================================
    // Essentials
    // ========================================================================

    /// Record a log line emitted by native code
    fn log_message(&self, message: &str);

    /// Deliver `message` to `method` on the managed object named `target`
    fn send_message(&self, target: &str, method: &str, message: &str) -> Result<(), Self::Error>;
}
