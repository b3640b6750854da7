//! Callback registry and handshake
//!
//! After a library loads, the bridge hands its entry points to native code
//! in a fixed order, then resolves the native exports it will call back:
//!
//! 1. essentials: debug log and send message; `CreateInstance`,
//!    `DestroyInstance` and the `Call<Hook>` exports are resolved here
//! 2. type operations: type, constructor and member resolvers, constructor
//!    invoker, and the handle release entry point when the library asks
//!    for it
//! 3. value operations: the get/set pair
//! 4. method operations: call and call-with-out
//! 5. `InitializeNative`
//!
//! A missing export aborts the handshake at the step that needed it; steps
//! already performed are not rolled back. The caller is expected to unload
//! the library.

use std::ffi::CStr;
use std::fmt;

use ponte_sdk::abi::exports::*;
use ponte_sdk::abi::{CreateInstanceFn, DestroyInstanceFn, LifecycleHookFn, NativeVoidFn};
use ponte_sdk::{Export, Handle, LifecycleHook, NativeInstance};

use crate::entry;
use crate::error::{BridgeError, BridgeResult};
use crate::exports::{resolve, resolve_hook};
use crate::loader::SymbolSource;

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegistryState {
    /// Library loaded, nothing exchanged
    Unregistered,
    /// Debug log and send message registered, native exports resolved
    EssentialsRegistered,
    /// Type, constructor and member resolvers registered
    TypeOpsRegistered,
    /// Get/set value registered
    ValueOpsRegistered,
    /// Call method entry points registered
    MethodOpsRegistered,
    /// `InitializeNative` has run
    Initialized,
    /// `DeinitializeNative` has run
    Deinitialized,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A native callback slot. Registering again overwrites the previous pointer.
pub struct CallbackSlot<F> {
    name: &'static str,
    callback: Option<F>,
}

impl<F: Copy> CallbackSlot<F> {
    /// Create an empty slot
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            callback: None,
        }
    }

    /// Store `callback`
    pub fn register(&mut self, callback: F) {
        if self.callback.is_some() {
            log::debug!("Overwriting callback {}", self.name);
        }
        self.callback = Some(callback);
    }

    /// Registered callback, or an error naming the empty slot
    pub fn get(&self) -> BridgeResult<F> {
        self.callback.ok_or_else(|| {
            BridgeError::InvalidArgument(format!("callback {} is not registered", self.name))
        })
    }

    /// Check whether a callback is registered
    pub fn is_registered(&self) -> bool {
        self.callback.is_some()
    }

    /// Empty the slot
    pub fn clear(&mut self) {
        self.callback = None;
    }
}

/// Holds the handshake state and every native export the bridge calls
pub struct CallbackRegistry {
    state: RegistryState,
    create_instance: CallbackSlot<CreateInstanceFn>,
    destroy_instance: CallbackSlot<DestroyInstanceFn>,
    hooks: [CallbackSlot<LifecycleHookFn>; 9],
}

impl CallbackRegistry {
    /// Create an unregistered registry
    pub fn new() -> Self {
        Self {
            state: RegistryState::Unregistered,
            create_instance: CallbackSlot::new(CreateInstance::NAME),
            destroy_instance: CallbackSlot::new(DestroyInstance::NAME),
            hooks: LifecycleHook::ALL.map(|hook| CallbackSlot::new(hook.export_name())),
        }
    }

    /// Current handshake state
    pub fn state(&self) -> RegistryState {
        self.state
    }

    /// Check whether native code has been initialized and not yet torn down
    pub fn is_initialized(&self) -> bool {
        self.state == RegistryState::Initialized
    }

    /// Run the full handshake against `source`.
    ///
    /// The bridge context must already be active on this thread: native code
    /// may call back into it from inside any registration export.
    pub fn initialize(&mut self, source: &dyn SymbolSource) -> BridgeResult<()> {
        self.expect(RegistryState::Unregistered, "Unregistered")?;
        log::debug!("Starting handshake with {}", source.name());

        // SAFETY (all blocks below): each export is resolved through its
        // marker type, so the pointer is read back with the signature the
        // native library declares, and it is only called while the library
        // is loaded.
        unsafe {
            resolve::<SetDebugLogMethod>(source)?(entry::debug_log);
            resolve::<SetSendMessageMethod>(source)?(entry::send_message);
            self.create_instance.register(resolve::<CreateInstance>(source)?);
            self.destroy_instance.register(resolve::<DestroyInstance>(source)?);
            for hook in LifecycleHook::ALL {
                self.hooks[hook.index()].register(resolve_hook(source, hook)?);
            }
        }
        self.advance(RegistryState::EssentialsRegistered);

        unsafe {
            resolve::<SetGetTypePtrMethod>(source)?(entry::get_type);
            resolve::<SetGetConstructorPtrMethod>(source)?(entry::get_constructor);
            resolve::<SetGetMemberPtrMethod>(source)?(entry::get_member);
            resolve::<SetConstructorMethod>(source)?(entry::construct);
            match resolve::<SetReleaseHandleMethod>(source) {
                Ok(set) => set(entry::release_handle),
                Err(err) => log::debug!("Handle release not offered: {}", err),
            }
        }
        self.advance(RegistryState::TypeOpsRegistered);

        unsafe {
            resolve::<SetGetSetValueMethod>(source)?(entry::get_value, entry::set_value);
        }
        self.advance(RegistryState::ValueOpsRegistered);

        unsafe {
            resolve::<SetCallMethodMethod>(source)?(entry::call_method);
            resolve::<SetCallMethodOutMethod>(source)?(entry::call_method_out);
        }
        self.advance(RegistryState::MethodOpsRegistered);

        let initialize: NativeVoidFn = unsafe { resolve::<InitializeNative>(source)? };
        unsafe { initialize() };
        self.advance(RegistryState::Initialized);
        log::info!("Native library {} initialized", source.name());
        Ok(())
    }

    /// Call `DeinitializeNative`. Native exports stay resolved but may no
    /// longer be called.
    pub fn deinitialize(&mut self, source: &dyn SymbolSource) -> BridgeResult<()> {
        self.expect(RegistryState::Initialized, "Initialized")?;
        // SAFETY: resolved through its marker type while the library is loaded
        unsafe {
            let deinitialize: NativeVoidFn = resolve::<DeinitializeNative>(source)?;
            deinitialize();
        }
        self.advance(RegistryState::Deinitialized);
        self.create_instance.clear();
        self.destroy_instance.clear();
        for slot in &mut self.hooks {
            slot.clear();
        }
        log::info!("Native library {} deinitialized", source.name());
        Ok(())
    }

    /// Call `CreateInstance` for `class_name`, paired with `proxy`
    pub fn create_instance(
        &self,
        class_name: &CStr,
        proxy: Handle,
    ) -> BridgeResult<NativeInstance> {
        self.expect(RegistryState::Initialized, "Initialized")?;
        let create = self.create_instance.get()?;
        // SAFETY: the pointer came from the loaded library and `class_name`
        // outlives the call
        Ok(unsafe { create(class_name.as_ptr(), proxy) })
    }

    /// Call `DestroyInstance`
    pub fn destroy_instance(&self, instance: NativeInstance) -> BridgeResult<()> {
        let destroy = self.destroy_instance.get()?;
        // SAFETY: `instance` was returned by `CreateInstance` and is destroyed once
        unsafe { destroy(instance) };
        Ok(())
    }

    /// Call the `Call<Hook>` export for `hook`
    pub fn invoke_hook(&self, hook: LifecycleHook, instance: NativeInstance) -> BridgeResult<()> {
        let callback = self.hooks[hook.index()].get()?;
        log::trace!("{} {:p}", hook.export_name(), instance);
        // SAFETY: `instance` is a live native instance owned by the tracker
        unsafe { callback(instance) };
        Ok(())
    }

    fn expect(&self, state: RegistryState, name: &'static str) -> BridgeResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                expected: name,
                actual: self.state,
            })
        }
    }

    fn advance(&mut self, state: RegistryState) {
        log::debug!("Handshake: {} -> {}", self.state, state);
        self.state = state;
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
