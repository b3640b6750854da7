//! Typed export resolution
//!
//! Exports are looked up through their [`Export`] marker, so the address of
//! `SetGetTypePtrMethod` can only ever come back as a
//! `SetGetTypePtrMethodFn`.

use std::ffi::c_void;
use std::mem::size_of;

use ponte_sdk::abi::LifecycleHookFn;
use ponte_sdk::{Export, LifecycleHook};

use crate::loader::{LoadError, SymbolSource};

/// Resolve the export described by `E`.
///
/// # Safety
///
/// The library behind `source` must export `E::NAME` with exactly the
/// signature `E::Fn`, and the returned pointer must not be called after the
/// library is unloaded.
pub unsafe fn resolve<E: Export>(source: &dyn SymbolSource) -> Result<E::Fn, LoadError> {
    resolve_as::<E::Fn>(source, E::NAME)
}

/// Resolve the `Call<Hook>` export for `hook`.
///
/// # Safety
///
/// Same contract as [`resolve`].
pub unsafe fn resolve_hook(
    source: &dyn SymbolSource,
    hook: LifecycleHook,
) -> Result<LifecycleHookFn, LoadError> {
    resolve_as::<LifecycleHookFn>(source, hook.export_name())
}

/// Names of every export a native library is expected to provide, in
/// handshake order.
pub fn expected_exports() -> Vec<&'static str> {
    use ponte_sdk::abi::exports::*;

    let mut names = vec![
        SetDebugLogMethod::NAME,
        SetSendMessageMethod::NAME,
        CreateInstance::NAME,
        DestroyInstance::NAME,
    ];
    names.extend(LifecycleHook::ALL.iter().map(|hook| hook.export_name()));
    names.extend([
        SetGetTypePtrMethod::NAME,
        SetGetConstructorPtrMethod::NAME,
        SetGetMemberPtrMethod::NAME,
        SetConstructorMethod::NAME,
        SetGetSetValueMethod::NAME,
        SetCallMethodMethod::NAME,
        SetCallMethodOutMethod::NAME,
        InitializeNative::NAME,
        DeinitializeNative::NAME,
    ]);
    names
}

/// Exports the handshake uses when present and skips otherwise
pub fn optional_exports() -> Vec<&'static str> {
    vec![ponte_sdk::abi::exports::SetReleaseHandleMethod::NAME]
}

unsafe fn resolve_as<T: Copy>(source: &dyn SymbolSource, name: &str) -> Result<T, LoadError> {
    if size_of::<T>() != size_of::<*mut c_void>() {
        return Err(LoadError::PlatformError(format!(
            "{} is not declared with a pointer-sized signature",
            name
        )));
    }
    let address = source.symbol_address(name)?;
    Ok(std::mem::transmute_copy(&address.as_ptr()))
}
