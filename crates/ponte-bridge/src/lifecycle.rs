//! Native instance lifecycle tracking
//!
//! Every native instance created for a managed proxy is recorded here
//! together with the proxy's handle. Destruction may be requested from any
//! thread through a [`DestroyRequester`]; requests are queued and carried
//! out on the owning thread when the bridge drains them, in the order they
//! were made.

use std::ffi::c_void;

use crossbeam::channel::{unbounded, Receiver, Sender};
use ponte_sdk::{Handle, NativeInstance};
use rustc_hash::FxHashMap;

use crate::error::{BridgeError, BridgeResult};
use crate::handles::HandleTable;

/// Identifier of a tracked native instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Handle);

impl InstanceId {
    /// Underlying tracker handle
    pub fn handle(self) -> Handle {
        self.0
    }
}

/// Bookkeeping for one native instance
#[derive(Debug, Clone)]
pub struct NativeInstanceRecord {
    native: usize,
    proxy: Handle,
    class_name: String,
    name: String,
    pub(crate) enabled: bool,
    pub(crate) started: bool,
}

impl NativeInstanceRecord {
    /// Native object pointer
    pub fn native(&self) -> NativeInstance {
        self.native as *mut c_void
    }

    /// Instance handle of the managed proxy
    pub fn proxy(&self) -> Handle {
        self.proxy
    }

    /// Native class the instance was created as
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Name of the proxy
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether per-frame hooks run for this instance
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the start hook has run
    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// Thread-safe handle for requesting destruction of a native instance
#[derive(Debug, Clone)]
pub struct DestroyRequester {
    sender: Sender<usize>,
}

impl DestroyRequester {
    /// Queue `instance` for destruction on the owning thread. Returns false
    /// if the bridge is gone.
    pub fn request(&self, instance: NativeInstance) -> bool {
        self.sender.send(instance as usize).is_ok()
    }
}

/// Records live native instances and queues destroy requests
pub struct InstanceLifecycleTracker {
    records: HandleTable<NativeInstanceRecord>,
    by_native: FxHashMap<usize, InstanceId>,
    order: Vec<InstanceId>,
    sender: Sender<usize>,
    receiver: Receiver<usize>,
    created: u64,
    destroyed: u64,
}

impl InstanceLifecycleTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            records: HandleTable::new(),
            by_native: FxHashMap::default(),
            order: Vec::new(),
            sender,
            receiver,
            created: 0,
            destroyed: 0,
        }
    }

    /// Record a freshly created native instance. New instances start enabled.
    pub fn register(
        &mut self,
        native: NativeInstance,
        proxy: Handle,
        class_name: &str,
        name: &str,
    ) -> BridgeResult<InstanceId> {
        let native = native as usize;
        if native == 0 {
            return Err(BridgeError::CreateFailed(class_name.to_string()));
        }
        if self.by_native.contains_key(&native) {
            return Err(BridgeError::UnbalancedLifecycle(format!(
                "native instance {:#x} is already tracked",
                native
            )));
        }
        let id = InstanceId(self.records.alloc(NativeInstanceRecord {
            native,
            proxy,
            class_name: class_name.to_string(),
            name: name.to_string(),
            enabled: true,
            started: false,
        })?);
        self.by_native.insert(native, id);
        self.order.push(id);
        self.created += 1;
        log::debug!("Tracking {} '{}' as {:?}", class_name, name, id);
        Ok(id)
    }

    /// Record for `id`
    pub fn get(&self, id: InstanceId) -> Option<&NativeInstanceRecord> {
        self.records.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut NativeInstanceRecord> {
        self.records.get_mut(id.0)
    }

    /// Instance tracked for a native pointer
    pub fn find(&self, native: NativeInstance) -> Option<InstanceId> {
        self.by_native.get(&(native as usize)).copied()
    }

    /// Stop tracking `id`. Fails if it was never tracked or already removed.
    pub fn remove(&mut self, id: InstanceId) -> BridgeResult<NativeInstanceRecord> {
        let record = self.records.release(id.0).map_err(|_| {
            BridgeError::UnbalancedLifecycle(format!(
                "{:?} was already destroyed or never created",
                id
            ))
        })?;
        self.by_native.remove(&record.native);
        self.order.retain(|tracked| *tracked != id);
        self.destroyed += 1;
        Ok(record)
    }

    /// Tracked instances in creation order
    pub fn ids(&self) -> Vec<InstanceId> {
        self.order.clone()
    }

    /// Enabled instances in creation order
    pub fn enabled_ids(&self) -> Vec<InstanceId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.get(*id).is_some_and(|r| r.enabled))
            .collect()
    }

    /// A requester that may be moved to other threads
    pub fn requester(&self) -> DestroyRequester {
        DestroyRequester {
            sender: self.sender.clone(),
        }
    }

    /// Take every queued destroy request, oldest first. Requests for
    /// pointers that are not tracked, or repeated within the batch, are
    /// logged and dropped.
    pub fn take_requests(&mut self) -> Vec<InstanceId> {
        let mut ids = Vec::new();
        for native in self.receiver.try_iter() {
            match self.by_native.get(&native) {
                Some(id) if !ids.contains(id) => ids.push(*id),
                Some(id) => log::warn!("Duplicate destroy request for {:?}", id),
                None => log::warn!(
                    "Unbalanced lifecycle: destroy requested for untracked instance {:#x}",
                    native
                ),
            }
        }
        ids
    }

    /// Number of tracked instances
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check for no tracked instances
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Instances created so far
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Instances destroyed so far
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }
}

impl Default for InstanceLifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}
