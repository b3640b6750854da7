//! Ponte SDK - ABI types shared by the bridge and native libraries
//!
//! This crate defines everything that crosses the native/managed boundary
//! without depending on the bridge itself:
//!
//! - [`Handle`]: opaque pointer-sized ids for types, members and instances
//! - [`BridgeValue`]: the fixed-size tagged wire value
//! - [`MemberKind`] and [`LifecycleHook`]
//! - [`abi`]: entry-point and export signatures, with typed export markers
//! - [`Reflect`]: the capability set native code is granted
//! - [`BuildProgress`]/[`ProgressSink`]: shapes used by external build tooling

#![warn(missing_docs)]

pub mod abi;
pub mod context;
pub mod error;
pub mod handle;
pub mod kind;
pub mod progress;
pub mod value;

pub use abi::{Export, NativeInstance};
pub use context::{Reflect, StatusCode};
pub use error::{AbiError, AbiResult, BridgeStatus};
pub use handle::Handle;
pub use kind::{LifecycleHook, MemberKind};
pub use progress::{BuildProgress, ProgressSink};
pub use value::{BridgeValue, ValueKind};
