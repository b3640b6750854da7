//! Ponte bridge - managed side of a native reflection bridge
//!
//! A native shared library drives host-side objects by name: it resolves
//! types and members to opaque handles, constructs objects, reads and writes
//! fields and properties, and calls methods. In the other direction the
//! bridge forwards lifecycle events to native instances paired with managed
//! proxies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────┐
//! │ Bridge (owning thread)       │        │ native library           │
//! │  ├─ CallbackRegistry  ───────┼─ Set*Method(entry points) ───────►│
//! │  ├─ InstanceLifecycleTracker ┼─ CreateInstance / Call<Hook> ────►│
//! │  └─ BridgeContext            │◄─ GetType / CallMethod / ... ─────┤
//! │       ├─ TypeRegistry        │        └──────────────────────────┘
//! │       ├─ HandleSpace         │
//! │       └─ StringArena         │
//! └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut bridge = Bridge::load("./libgame.so", BridgeOptions::default())?;
//! bridge.register_type(TypeBuilder::new("Game.Player").field("health", TypeId::INT32))?;
//! bridge.initialize()?;
//! let id = bridge.spawn("PlayerController", "Player", &proxy)?;
//! bridge.tick()?;
//! bridge.shutdown()?;
//! ```

#![warn(missing_docs)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod exports;
pub mod handles;
pub mod lifecycle;
pub mod loader;
pub mod marshal;
pub mod reflection;
pub mod registry;
pub mod runtime;

pub use bridge::{Bridge, BridgeStats};
pub use config::BridgeOptions;
pub use context::BridgeContext;
pub use dispatch::{Dispatcher, MainThreadAction};
pub use error::{BridgeError, BridgeResult};
pub use handles::{HandleSpace, HandleTable, MemberRef, Referent};
pub use lifecycle::{DestroyRequester, InstanceId, InstanceLifecycleTracker, NativeInstanceRecord};
pub use loader::{Library, LoadError, SymbolSource};
pub use marshal::{StringArena, ValueMarshaler};
pub use registry::{CallbackRegistry, CallbackSlot, RegistryState};
pub use runtime::{
    ConstructorDef, ManagedObject, ManagedValue, MethodDef, ObjectRef, PropertyDef, TypeBuilder,
    TypeDescriptor, TypeId, TypeRegistry,
};

pub use ponte_sdk;
