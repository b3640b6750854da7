//! Bridge context: the state every entry point operates on
//!
//! One context exists per bridge and lives on the bridge's owning thread.
//! Entry points reach it through the thread-local slot managed by
//! [`crate::entry`]. State is split into two cells, types and handles, and
//! neither borrow is ever held while a member body or native code runs, so
//! native callbacks may re-enter the bridge freely.

use std::cell::{Ref, RefCell};

use ponte_sdk::Handle;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::BridgeOptions;
use crate::error::{BridgeError, BridgeResult};
use crate::handles::HandleSpace;
use crate::marshal::{StringArena, ValueMarshaler};
use crate::runtime::{ObjectRef, TypeBuilder, TypeId, TypeRegistry};

pub(crate) struct BridgeState {
    pub(crate) handles: HandleSpace,
    pub(crate) strings: StringArena,
    pub(crate) named: FxHashMap<String, Handle>,
    pub(crate) owned: FxHashSet<Handle>,
}

/// Reflection state shared by the bridge and its native entry points
pub struct BridgeContext {
    types: RefCell<TypeRegistry>,
    state: RefCell<BridgeState>,
    options: BridgeOptions,
}

impl BridgeContext {
    /// Create a context holding only the builtin types
    pub fn new(options: BridgeOptions) -> Self {
        Self {
            types: RefCell::new(TypeRegistry::new()),
            state: RefCell::new(BridgeState {
                handles: HandleSpace::new(),
                strings: StringArena::new(),
                named: FxHashMap::default(),
                owned: FxHashSet::default(),
            }),
            options,
        }
    }

    /// Options this context was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Register a host class so native code can resolve it
    pub fn register_type(&self, builder: TypeBuilder) -> BridgeResult<TypeId> {
        self.types
            .try_borrow_mut()
            .map_err(|_| BridgeError::InvalidArgument("type registry is in use".to_string()))?
            .register(builder)
    }

    /// Borrow the type registry
    pub fn types(&self) -> Ref<'_, TypeRegistry> {
        self.types.borrow()
    }

    /// Pin `object` under a handle owned by the caller and make it
    /// reachable by name for `SendMessage`. Every call returns a distinct
    /// handle, even for an object that is already pinned. A name already
    /// taken keeps its first owner.
    pub fn register_named(&self, name: &str, object: &ObjectRef) -> BridgeResult<Handle> {
        let mut state = self.state.borrow_mut();
        let handle = state.handles.alloc_instance(object)?;
        state.owned.insert(handle);
        state.named.entry(name.to_string()).or_insert(handle);
        Ok(handle)
    }

    /// Forget the name registration for `name` if it points at `handle`
    pub fn unregister_named(&self, name: &str, handle: Handle) -> bool {
        let mut state = self.state.borrow_mut();
        if state.named.get(name) == Some(&handle) {
            state.named.remove(name);
            true
        } else {
            false
        }
    }

    /// Handle of the object registered as `name`
    pub fn named(&self, name: &str) -> Option<Handle> {
        self.state.borrow().named.get(name).copied()
    }

    /// Pin `object` under its instance handle
    pub fn pin(&self, object: &ObjectRef) -> BridgeResult<Handle> {
        self.state.borrow_mut().handles.intern_instance(object)
    }

    /// Object behind an instance handle
    pub fn resolve_instance(&self, handle: Handle) -> BridgeResult<ObjectRef> {
        self.state.borrow().handles.resolve_instance(handle)
    }

    /// Release any handle. Released handles never resolve again.
    pub fn release(&self, handle: Handle) -> BridgeResult<()> {
        let mut state = self.state.borrow_mut();
        state.handles.release(handle)?;
        state.owned.remove(&handle);
        state.named.retain(|_, named| *named != handle);
        Ok(())
    }

    /// Check whether `handle` was handed out by [`Self::register_named`]
    /// and is still held by the host
    pub fn is_host_owned(&self, handle: Handle) -> bool {
        self.state.borrow().owned.contains(&handle)
    }

    /// Check whether `handle` is live
    pub fn is_live(&self, handle: Handle) -> bool {
        self.state.borrow().handles.contains(handle)
    }

    /// Number of live handles of every kind
    pub fn live_handles(&self) -> usize {
        self.state.borrow().handles.len()
    }

    /// Drop strings lent to native code, returning how many were held
    pub(crate) fn clear_scratch(&self) -> usize {
        self.state.borrow_mut().strings.clear()
    }

    /// Release every handle and name, returning how many handles were live
    pub(crate) fn release_all(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.named.clear();
        state.owned.clear();
        state.strings.clear();
        state.handles.clear()
    }

    /// Run `f` with the handle space borrowed
    pub(crate) fn with_handles<R>(&self, f: impl FnOnce(&mut HandleSpace) -> R) -> R {
        f(&mut self.state.borrow_mut().handles)
    }

    /// Run `f` with a marshaler over this context's state
    pub(crate) fn marshal<R>(
        &self,
        f: impl FnOnce(&mut ValueMarshaler<'_>) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        let types = self.types.borrow();
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let mut marshaler = ValueMarshaler::new(&mut state.handles, &mut state.strings, &types);
        f(&mut marshaler)
    }
}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeContext")
            .field("types", &self.types.borrow().len())
            .field("live_handles", &self.live_handles())
            .field("options", &self.options)
            .finish()
    }
}
