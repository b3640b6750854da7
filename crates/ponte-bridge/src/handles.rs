//! Generational handle tables
//!
//! Native code never sees a managed object, type or member directly; it holds
//! a [`Handle`] encoding a slot index and that slot's generation. Releasing a
//! handle bumps the slot's generation, so a stale copy never resolves again,
//! and a slot whose generation would wrap is retired instead of reused.
//!
//! Storing the referent in the table is what keeps it alive: an object is
//! pinned for exactly as long as some handle to it is allocated.

use ponte_sdk::handle::{MAX_GENERATION, MAX_INDEX};
use ponte_sdk::{Handle, MemberKind};
use rustc_hash::FxHashMap;

use crate::error::{BridgeError, BridgeResult};
use crate::runtime::{ManagedObject, ObjectRef, TypeId};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Table mapping generational handles to values of type `T`
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store `value` and return a fresh handle for it
    pub fn alloc(&mut self, value: T) -> BridgeResult<Handle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .ok()
                    .filter(|index| *index <= MAX_INDEX)
                    .ok_or(BridgeError::HandlesExhausted)?;
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle =
            Handle::compose(index, slot.generation).ok_or(BridgeError::HandlesExhausted)?;
        slot.value = Some(value);
        self.live += 1;
        Ok(handle)
    }

    /// Borrow the value behind `handle`
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let (index, generation) = handle.decompose()?;
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutably borrow the value behind `handle`
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let (index, generation) = handle.decompose()?;
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Check whether `handle` is live
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove the value behind `handle`. Fails for null, stale or unknown
    /// handles, so each handle can be released exactly once.
    pub fn release(&mut self, handle: Handle) -> BridgeResult<T> {
        let (index, generation) = handle
            .decompose()
            .ok_or_else(|| BridgeError::invalid_handle(handle, "null or malformed"))?;
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .ok_or_else(|| BridgeError::invalid_handle(handle, "stale or unknown"))?;
        let value = slot
            .value
            .take()
            .ok_or_else(|| BridgeError::invalid_handle(handle, "already released"))?;

        self.live -= 1;
        if slot.generation < MAX_GENERATION {
            slot.generation += 1;
            self.free.push(index);
        } else {
            log::debug!("Retiring handle slot {} after generation wrap", index);
        }
        Ok(value)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check for no live handles
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live handles in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((Handle::compose(index as u32, slot.generation)?, value))
        })
    }

    /// Release every live handle, returning the values in slot order
    pub fn drain(&mut self) -> Vec<(Handle, T)> {
        let handles: Vec<Handle> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.release(handle).ok().map(|value| (handle, value)))
            .collect()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A member of a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Declaring type
    pub type_id: TypeId,
    /// Member kind
    pub kind: MemberKind,
    /// Index within the type's members of that kind
    pub index: usize,
}

/// What a bridge handle refers to
#[derive(Debug, Clone)]
pub enum Referent {
    /// A type
    Type(TypeId),
    /// A field, property, method or constructor
    Member(MemberRef),
    /// A managed object
    Instance(ObjectRef),
}

impl Referent {
    fn describe(&self) -> &'static str {
        match self {
            Referent::Type(_) => "refers to a type",
            Referent::Member(_) => "refers to a member",
            Referent::Instance(_) => "refers to an instance",
        }
    }
}

/// The bridge's handle space: one table for every referent, with interning
/// so repeated resolution returns the same handle.
#[derive(Default)]
pub struct HandleSpace {
    table: HandleTable<Referent>,
    types: FxHashMap<TypeId, Handle>,
    members: FxHashMap<MemberRef, Handle>,
    instances: FxHashMap<*const ManagedObject, Handle>,
}

impl HandleSpace {
    /// Create an empty space
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for a type, allocated on first use
    pub fn intern_type(&mut self, type_id: TypeId) -> BridgeResult<Handle> {
        if let Some(handle) = self.types.get(&type_id) {
            return Ok(*handle);
        }
        let handle = self.table.alloc(Referent::Type(type_id))?;
        self.types.insert(type_id, handle);
        Ok(handle)
    }

    /// Handle for a member, allocated on first use
    pub fn intern_member(&mut self, member: MemberRef) -> BridgeResult<Handle> {
        if let Some(handle) = self.members.get(&member) {
            return Ok(*handle);
        }
        let handle = self.table.alloc(Referent::Member(member))?;
        self.members.insert(member, handle);
        Ok(handle)
    }

    /// Handle for an object. An object that already has a live handle gets
    /// the same one back; otherwise the object is pinned under a new handle.
    pub fn intern_instance(&mut self, object: &ObjectRef) -> BridgeResult<Handle> {
        let key = ObjectRef::as_ptr(object);
        if let Some(handle) = self.instances.get(&key) {
            return Ok(*handle);
        }
        let handle = self.table.alloc(Referent::Instance(object.clone()))?;
        self.instances.insert(key, handle);
        Ok(handle)
    }

    /// Pin `object` under a fresh handle that is never shared. Interning
    /// is bypassed, so each call hands back a handle the caller releases
    /// exactly once.
    pub fn alloc_instance(&mut self, object: &ObjectRef) -> BridgeResult<Handle> {
        self.table.alloc(Referent::Instance(object.clone()))
    }

    /// Resolve a type handle
    pub fn resolve_type(&self, handle: Handle) -> BridgeResult<TypeId> {
        match self.lookup(handle)? {
            Referent::Type(type_id) => Ok(*type_id),
            other => Err(self.wrong_kind(handle, other)),
        }
    }

    /// Resolve a member handle
    pub fn resolve_member(&self, handle: Handle) -> BridgeResult<MemberRef> {
        match self.lookup(handle)? {
            Referent::Member(member) => Ok(*member),
            other => Err(self.wrong_kind(handle, other)),
        }
    }

    /// Resolve an instance handle
    pub fn resolve_instance(&self, handle: Handle) -> BridgeResult<ObjectRef> {
        match self.lookup(handle)? {
            Referent::Instance(object) => Ok(object.clone()),
            other => Err(self.wrong_kind(handle, other)),
        }
    }

    /// Release a handle of any kind, unpinning its referent
    pub fn release(&mut self, handle: Handle) -> BridgeResult<Referent> {
        let referent = self.table.release(handle)?;
        match &referent {
            Referent::Type(type_id) => {
                self.types.remove(type_id);
            }
            Referent::Member(member) => {
                self.members.remove(member);
            }
            Referent::Instance(object) => {
                let key = ObjectRef::as_ptr(object);
                if self.instances.get(&key) == Some(&handle) {
                    self.instances.remove(&key);
                }
            }
        }
        Ok(referent)
    }

    /// Check whether `handle` is live
    pub fn contains(&self, handle: Handle) -> bool {
        self.table.contains(handle)
    }

    /// Number of live handles of all kinds
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check for no live handles
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of live instance handles, interned or not
    pub fn pinned_instances(&self) -> usize {
        self.table
            .iter()
            .filter(|(_, referent)| matches!(referent, Referent::Instance(_)))
            .count()
    }

    /// Release every handle
    pub fn clear(&mut self) -> usize {
        let released = self.table.drain().len();
        self.types.clear();
        self.members.clear();
        self.instances.clear();
        released
    }

    fn lookup(&self, handle: Handle) -> BridgeResult<&Referent> {
        if handle.is_null() {
            return Err(BridgeError::invalid_handle(handle, "null"));
        }
        self.table
            .get(handle)
            .ok_or_else(|| BridgeError::invalid_handle(handle, "stale or unknown"))
    }

    fn wrong_kind(&self, handle: Handle, found: &Referent) -> BridgeError {
        BridgeError::invalid_handle(handle, found.describe())
    }
}
