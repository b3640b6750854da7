//! Managed runtime model
//!
//! The bridge reflects over host classes described at startup rather than
//! over a language runtime: each class is a [`TypeDescriptor`] of fields,
//! properties, methods and constructors whose bodies are Rust closures.

mod object;
mod types;

pub use object::{FieldLayout, ManagedObject, ManagedValue, ObjectRef};
pub use types::{
    ConstructorDef, ConstructorFn, FieldDef, GetterFn, MethodDef, MethodFn, PropertyDef, SetterFn,
    TypeBuilder, TypeDescriptor, TypeId, TypeRegistry,
};
