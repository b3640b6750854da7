//! Function-pointer signatures exchanged between the bridge and native code
//!
//! Two families of signatures live here:
//!
//! - **Entry points** implemented by the bridge and handed to native code
//!   during the handshake (`GetTypeFn`, `CallMethodFn`, ...).
//! - **Exports** implemented by the native library and resolved by name
//!   (`SetGetTypePtrMethod`, `CreateInstance`, ...).
//!
//! Every export has a zero-sized marker implementing [`Export`], which ties
//! the symbol name to exactly one signature. Resolvers are generic over the
//! marker, so a symbol can only ever be read back as the type it is declared
//! with.

use std::ffi::{c_char, c_void};

use crate::error::BridgeStatus;
use crate::handle::Handle;
use crate::value::BridgeValue;

/// Opaque pointer to a native object instance
pub type NativeInstance = *mut c_void;

// ============================================================================
// Entry points (managed side, called by native code)
// ============================================================================

/// Route a native log line into the host logger
pub type DebugLogFn = unsafe extern "C" fn(message: *const c_char);

/// Deliver `message` to `method` on the managed object named `target`
pub type SendMessageFn =
    unsafe extern "C" fn(target: *const c_char, method: *const c_char, message: *const c_char);

/// Release a handle native code no longer needs. The handle never
/// resolves again.
pub type ReleaseHandleFn = unsafe extern "C" fn(handle: Handle) -> BridgeStatus;

/// Resolve a type by fully-qualified name; null handle on miss
pub type GetTypeFn = unsafe extern "C" fn(name: *const c_char) -> Handle;

/// Resolve a constructor by exact parameter types; null handle on miss
pub type GetConstructorFn =
    unsafe extern "C" fn(ty: Handle, param_types: *const Handle, param_count: i32) -> Handle;

/// Resolve a member by name and kind; null handle on miss
pub type GetMemberFn = unsafe extern "C" fn(ty: Handle, name: *const c_char, kind: i32) -> Handle;

/// Invoke a constructor; null handle on failure
pub type ConstructFn =
    unsafe extern "C" fn(ctor: Handle, args: *const BridgeValue, arg_count: i32) -> Handle;

/// Read a field or property into `value`
pub type GetValueFn = unsafe extern "C" fn(
    instance: Handle,
    member: Handle,
    kind: i32,
    value: *mut BridgeValue,
) -> BridgeStatus;

/// Write a field or property from `value`
pub type SetValueFn = unsafe extern "C" fn(
    instance: Handle,
    member: Handle,
    kind: i32,
    value: *mut BridgeValue,
) -> BridgeStatus;

/// Invoke a method, writing its return value (or none) to `output`
pub type CallMethodFn = unsafe extern "C" fn(
    instance: Handle,
    method: Handle,
    args: *const BridgeValue,
    arg_count: i32,
    output: *mut BridgeValue,
) -> BridgeStatus;

/// Invoke a `bool Try*(..., out T)` method; `output` is written only when
/// the method reports success. `arg_count` includes the output slot.
pub type CallMethodOutFn = unsafe extern "C" fn(
    instance: Handle,
    method: Handle,
    args: *const BridgeValue,
    arg_count: i32,
    output: *mut BridgeValue,
) -> bool;

// ============================================================================
// Exports (native side, called by the bridge)
// ============================================================================

/// `SetDebugLogMethod`
pub type SetDebugLogMethodFn = unsafe extern "C" fn(callback: DebugLogFn);
/// `SetSendMessageMethod`
pub type SetSendMessageMethodFn = unsafe extern "C" fn(callback: SendMessageFn);
/// `SetGetTypePtrMethod`
pub type SetGetTypePtrMethodFn = unsafe extern "C" fn(callback: GetTypeFn);
/// `SetGetConstructorPtrMethod`
pub type SetGetConstructorPtrMethodFn = unsafe extern "C" fn(callback: GetConstructorFn);
/// `SetGetMemberPtrMethod`
pub type SetGetMemberPtrMethodFn = unsafe extern "C" fn(callback: GetMemberFn);
/// `SetConstructorMethod`
pub type SetConstructorMethodFn = unsafe extern "C" fn(callback: ConstructFn);
/// `SetReleaseHandleMethod`, optional: libraries that never release
/// handles may leave it out
pub type SetReleaseHandleMethodFn = unsafe extern "C" fn(callback: ReleaseHandleFn);
/// `SetGetSetValueMethod`
pub type SetGetSetValueMethodFn = unsafe extern "C" fn(get: GetValueFn, set: SetValueFn);
/// `SetCallMethodMethod`
pub type SetCallMethodMethodFn = unsafe extern "C" fn(callback: CallMethodFn);
/// `SetCallMethodOutMethod`
pub type SetCallMethodOutMethodFn = unsafe extern "C" fn(callback: CallMethodOutFn);
/// `CreateInstance`: build the native object for `class_name`, paired with
/// the proxy's managed handle. Returns null on failure.
pub type CreateInstanceFn =
    unsafe extern "C" fn(class_name: *const c_char, proxy: Handle) -> NativeInstance;
/// `DestroyInstance`
pub type DestroyInstanceFn = unsafe extern "C" fn(instance: NativeInstance);
/// `Call<Hook>` exports
pub type LifecycleHookFn = unsafe extern "C" fn(instance: NativeInstance);
/// `InitializeNative` / `DeinitializeNative`
pub type NativeVoidFn = unsafe extern "C" fn();

/// A named native export with a fixed signature.
pub trait Export {
    /// Symbol name in the native library
    const NAME: &'static str;
    /// Function-pointer type of the symbol
    type Fn: Copy;
}

macro_rules! exports {
    ($($(#[$meta:meta])* $marker:ident => $fn_ty:ty;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;

            impl Export for $marker {
                const NAME: &'static str = stringify!($marker);
                type Fn = $fn_ty;
            }
        )*
    };
}

/// Marker types for every non-hook export
pub mod exports {
    use super::*;

    exports! {
        /// Registers the log entry point
        SetDebugLogMethod => SetDebugLogMethodFn;
        /// Registers the send-message entry point
        SetSendMessageMethod => SetSendMessageMethodFn;
        /// Registers the type resolver
        SetGetTypePtrMethod => SetGetTypePtrMethodFn;
        /// Registers the constructor resolver
        SetGetConstructorPtrMethod => SetGetConstructorPtrMethodFn;
        /// Registers the member resolver
        SetGetMemberPtrMethod => SetGetMemberPtrMethodFn;
        /// Registers the constructor invoker
        SetConstructorMethod => SetConstructorMethodFn;
        /// Registers the handle release entry point
        SetReleaseHandleMethod => SetReleaseHandleMethodFn;
        /// Registers the get/set value pair
        SetGetSetValueMethod => SetGetSetValueMethodFn;
        /// Registers the method invoker
        SetCallMethodMethod => SetCallMethodMethodFn;
        /// Registers the out-parameter method invoker
        SetCallMethodOutMethod => SetCallMethodOutMethodFn;
        /// Creates a native instance for a proxy
        CreateInstance => CreateInstanceFn;
        /// Destroys a native instance
        DestroyInstance => DestroyInstanceFn;
        /// Called once after the handshake
        InitializeNative => NativeVoidFn;
        /// Called once before unload
        DeinitializeNative => NativeVoidFn;
    }
}
