//! Value marshaling between managed values and the wire format
//!
//! Every conversion is checked against the declared type of the slot the
//! value is travelling to or from. A value whose kind does not match is a
//! `TypeMismatch`; nothing is coerced.
//!
//! Strings handed to native code are copied into a [`StringArena`] owned by
//! the bridge. Their pointers stay valid until the arena is cleared at the
//! end of the current tick.

use std::ffi::{c_char, CStr, CString};

use ponte_sdk::{BridgeValue, ValueKind};

use crate::error::{BridgeError, BridgeResult};
use crate::handles::HandleSpace;
use crate::runtime::{ManagedValue, TypeId, TypeRegistry};

/// Scratch storage for strings lent to native code
#[derive(Debug, Default)]
pub struct StringArena {
    strings: Vec<CString>,
}

impl StringArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `s` into the arena and return a pointer to the NUL-terminated copy
    pub fn intern(&mut self, s: &str) -> BridgeResult<*const c_char> {
        let c_string = CString::new(s).map_err(|_| {
            BridgeError::InvalidArgument(format!("string contains a NUL byte: {:?}", s))
        })?;
        let ptr = c_string.as_ptr();
        self.strings.push(c_string);
        Ok(ptr)
    }

    /// Drop every string, returning how many were held
    pub fn clear(&mut self) -> usize {
        let count = self.strings.len();
        self.strings.clear();
        count
    }

    /// Number of strings held
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check for no strings
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Read a NUL-terminated UTF-8 string received from native code.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated buffer.
pub unsafe fn read_c_str<'a>(ptr: *const c_char, what: &str) -> BridgeResult<&'a str> {
    if ptr.is_null() {
        return Err(BridgeError::InvalidArgument(format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| BridgeError::InvalidArgument(format!("{} is not UTF-8: {}", what, e)))
}

/// Converts values in both directions for one bridge operation
pub struct ValueMarshaler<'a> {
    handles: &'a mut HandleSpace,
    strings: &'a mut StringArena,
    types: &'a TypeRegistry,
}

impl<'a> ValueMarshaler<'a> {
    /// Create a marshaler over the bridge's handle space and string arena
    pub fn new(
        handles: &'a mut HandleSpace,
        strings: &'a mut StringArena,
        types: &'a TypeRegistry,
    ) -> Self {
        Self {
            handles,
            strings,
            types,
        }
    }

    /// Convert a managed value into a wire value for a slot of type `declared`.
    /// Objects are pinned under their instance handle.
    pub fn to_wire(&mut self, value: &ManagedValue, declared: TypeId) -> BridgeResult<BridgeValue> {
        if !declared.accepts(value) {
            return Err(self.mismatch(declared, value.type_name()));
        }
        let wire = match value {
            ManagedValue::None => BridgeValue::none(),
            ManagedValue::Int32(v) => BridgeValue::i32(*v),
            ManagedValue::Int64(v) => BridgeValue::i64(*v),
            ManagedValue::Single(v) => BridgeValue::f32(*v),
            ManagedValue::Double(v) => BridgeValue::f64(*v),
            ManagedValue::Boolean(v) => BridgeValue::bool(*v),
            ManagedValue::String(s) => {
                let ptr = self.strings.intern(s)?;
                // SAFETY: the arena keeps the buffer alive until the end of the tick
                unsafe { BridgeValue::string(ptr) }
            }
            ManagedValue::Object(object) => {
                BridgeValue::object(self.handles.intern_instance(object)?)
            }
        };
        Ok(wire)
    }

    /// Convert a wire value received for a slot of type `declared`.
    ///
    /// Object slots accept `None` and the null handle as a null reference.
    pub fn from_wire(&self, value: &BridgeValue, declared: TypeId) -> BridgeResult<ManagedValue> {
        let kind = value
            .kind()
            .ok_or_else(|| self.mismatch(declared, value.type_name()))?;
        let expected = declared.value_kind();

        let managed = match (expected, kind) {
            (ValueKind::Object, ValueKind::None) => ManagedValue::None,
            (ValueKind::Object, ValueKind::Object) => {
                let handle = value.as_handle().unwrap_or_default();
                if handle.is_null() {
                    ManagedValue::None
                } else {
                    let object = self.handles.resolve_instance(handle)?;
                    let managed = ManagedValue::Object(object);
                    if !declared.accepts(&managed) {
                        return Err(self.mismatch(declared, managed.type_name()));
                    }
                    managed
                }
            }
            (ValueKind::String, ValueKind::String) => {
                let ptr = value.as_string_ptr().unwrap_or(std::ptr::null());
                // SAFETY: string values only come from `BridgeValue::string`
                // or raw native input, both of which promise a valid buffer
                let s = unsafe { read_c_str(ptr, "string argument")? };
                ManagedValue::String(s.to_string())
            }
            (ValueKind::Int32, ValueKind::Int32) => ManagedValue::Int32(value.data() as i32),
            (ValueKind::Int64, ValueKind::Int64) => ManagedValue::Int64(value.data() as i64),
            (ValueKind::Single, ValueKind::Single) => {
                ManagedValue::Single(f32::from_bits(value.data() as u32))
            }
            (ValueKind::Double, ValueKind::Double) => {
                ManagedValue::Double(f64::from_bits(value.data()))
            }
            (ValueKind::Boolean, ValueKind::Boolean) => ManagedValue::Boolean(value.data() != 0),
            (_, _) => return Err(self.mismatch(declared, kind.name().to_string())),
        };
        Ok(managed)
    }

    /// Convert an argument list against declared parameter types
    pub fn args_from_wire(
        &self,
        member: &str,
        args: &[BridgeValue],
        params: &[TypeId],
    ) -> BridgeResult<Vec<ManagedValue>> {
        if args.len() != params.len() {
            return Err(BridgeError::ArityMismatch {
                member: member.to_string(),
                expected: params.len(),
                got: args.len(),
            });
        }
        args.iter()
            .zip(params)
            .map(|(arg, ty)| self.from_wire(arg, *ty))
            .collect()
    }

    fn mismatch(&self, declared: TypeId, got: String) -> BridgeError {
        BridgeError::TypeMismatch {
            expected: self.types.name_of(declared).to_string(),
            got,
        }
    }
}
