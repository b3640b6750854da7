//! BridgeValue — tagged wire value exchanged with native code
//!
//! # Layout
//!
//! ```text
//! #[repr(C)]
//! struct BridgeValue {
//!     tag:  u32,   // ValueKind discriminant
//!     data: u64,   // payload, wide enough for i64/f64/pointers
//! }
//! ```
//!
//! | tag | kind    | payload                                    |
//! |-----|---------|--------------------------------------------|
//! | 0   | none    | 0                                          |
//! | 1   | int32   | sign-extended `i32`                        |
//! | 2   | int64   | `i64` bits                                 |
//! | 3   | single  | `f32::to_bits` in the low 32 bits          |
//! | 4   | double  | `f64::to_bits`                             |
//! | 5   | boolean | 0 or 1                                     |
//! | 6   | string  | pointer to NUL-terminated UTF-8            |
//! | 7   | object  | raw `Handle` word                          |
//!
//! String pointers written by the bridge point into a scratch arena owned by
//! the bridge and stay valid until the end of the current tick.

use std::ffi::c_char;
use std::fmt;

use crate::handle::Handle;

/// Discriminant of a [`BridgeValue`]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value (void return, null object)
    None = 0,
    /// Signed 32-bit integer
    Int32 = 1,
    /// Signed 64-bit integer
    Int64 = 2,
    /// 32-bit float
    Single = 3,
    /// 64-bit float
    Double = 4,
    /// Boolean
    Boolean = 5,
    /// UTF-8 string
    String = 6,
    /// Instance handle
    Object = 7,
}

impl ValueKind {
    /// Decode a raw tag
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(ValueKind::None),
            1 => Some(ValueKind::Int32),
            2 => Some(ValueKind::Int64),
            3 => Some(ValueKind::Single),
            4 => Some(ValueKind::Double),
            5 => Some(ValueKind::Boolean),
            6 => Some(ValueKind::String),
            7 => Some(ValueKind::Object),
            _ => None,
        }
    }

    /// Get the kind name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::None => "none",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Single => "single",
            ValueKind::Double => "double",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size tagged value passed by pointer across the boundary.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BridgeValue {
    tag: u32,
    data: u64,
}

unsafe impl Send for BridgeValue {}
unsafe impl Sync for BridgeValue {}

impl BridgeValue {
    /// Create an empty value
    #[inline]
    pub const fn none() -> Self {
        BridgeValue {
            tag: ValueKind::None as u32,
            data: 0,
        }
    }

    /// Create a 32-bit integer value
    #[inline]
    pub const fn i32(i: i32) -> Self {
        BridgeValue {
            tag: ValueKind::Int32 as u32,
            data: i as i64 as u64,
        }
    }

    /// Create a 64-bit integer value
    #[inline]
    pub const fn i64(i: i64) -> Self {
        BridgeValue {
            tag: ValueKind::Int64 as u32,
            data: i as u64,
        }
    }

    /// Create a 32-bit float value
    #[inline]
    pub fn f32(f: f32) -> Self {
        BridgeValue {
            tag: ValueKind::Single as u32,
            data: f.to_bits() as u64,
        }
    }

    /// Create a 64-bit float value
    #[inline]
    pub fn f64(f: f64) -> Self {
        BridgeValue {
            tag: ValueKind::Double as u32,
            data: f.to_bits(),
        }
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        BridgeValue {
            tag: ValueKind::Boolean as u32,
            data: b as u64,
        }
    }

    /// Create a string value from a NUL-terminated buffer.
    ///
    /// # Safety
    /// `ptr` must point to a NUL-terminated buffer that outlives every read
    /// of this value.
    #[inline]
    pub unsafe fn string(ptr: *const c_char) -> Self {
        BridgeValue {
            tag: ValueKind::String as u32,
            data: ptr as usize as u64,
        }
    }

    /// Create an object value from an instance handle
    #[inline]
    pub const fn object(handle: Handle) -> Self {
        BridgeValue {
            tag: ValueKind::Object as u32,
            data: handle.to_raw() as u64,
        }
    }

    /// Build from raw parts (as received from native code)
    ///
    /// # Safety
    /// When `tag` is the string tag, `data` must satisfy the contract of
    /// [`BridgeValue::string`].
    #[inline(always)]
    pub const unsafe fn from_raw_parts(tag: u32, data: u64) -> Self {
        BridgeValue { tag, data }
    }

    /// Raw tag
    #[inline(always)]
    pub const fn tag(&self) -> u32 {
        self.tag
    }

    /// Raw payload
    #[inline(always)]
    pub const fn data(&self) -> u64 {
        self.data
    }

    /// Decoded kind, `None` for unknown tags
    #[inline]
    pub const fn kind(&self) -> Option<ValueKind> {
        ValueKind::from_tag(self.tag)
    }

    /// Check for the empty value
    #[inline]
    pub const fn is_none(&self) -> bool {
        self.tag == ValueKind::None as u32
    }

    /// Get as i32 if this is an int32
    #[inline]
    pub const fn as_i32(&self) -> Option<i32> {
        if self.tag == ValueKind::Int32 as u32 {
            Some(self.data as i32)
        } else {
            None
        }
    }

    /// Get as i64 if this is an int64
    #[inline]
    pub const fn as_i64(&self) -> Option<i64> {
        if self.tag == ValueKind::Int64 as u32 {
            Some(self.data as i64)
        } else {
            None
        }
    }

    /// Get as f32 if this is a single
    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        if self.tag == ValueKind::Single as u32 {
            Some(f32::from_bits(self.data as u32))
        } else {
            None
        }
    }

    /// Get as f64 if this is a double
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        if self.tag == ValueKind::Double as u32 {
            Some(f64::from_bits(self.data))
        } else {
            None
        }
    }

    /// Get as bool if this is a boolean
    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        if self.tag == ValueKind::Boolean as u32 {
            Some(self.data != 0)
        } else {
            None
        }
    }

    /// Get the string pointer if this is a string
    #[inline]
    pub fn as_string_ptr(&self) -> Option<*const c_char> {
        if self.tag == ValueKind::String as u32 {
            Some(self.data as usize as *const c_char)
        } else {
            None
        }
    }

    /// Get the instance handle if this is an object
    #[inline]
    pub const fn as_handle(&self) -> Option<Handle> {
        if self.tag == ValueKind::Object as u32 {
            Some(Handle::from_raw(self.data as usize))
        } else {
            None
        }
    }

    /// Kind name for diagnostics, including unknown tags
    pub fn type_name(&self) -> String {
        match self.kind() {
            Some(kind) => kind.name().to_string(),
            None => format!("unknown tag {}", self.tag),
        }
    }
}

impl Default for BridgeValue {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for BridgeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(ValueKind::None) => write!(f, "BridgeValue::None"),
            Some(ValueKind::Int32) => write!(f, "BridgeValue::Int32({})", self.data as i32),
            Some(ValueKind::Int64) => write!(f, "BridgeValue::Int64({})", self.data as i64),
            Some(ValueKind::Single) => {
                write!(f, "BridgeValue::Single({})", f32::from_bits(self.data as u32))
            }
            Some(ValueKind::Double) => {
                write!(f, "BridgeValue::Double({})", f64::from_bits(self.data))
            }
            Some(ValueKind::Boolean) => write!(f, "BridgeValue::Boolean({})", self.data != 0),
            Some(ValueKind::String) => write!(f, "BridgeValue::String({:#x})", self.data),
            Some(ValueKind::Object) => {
                write!(f, "BridgeValue::Object({:?})", Handle::from_raw(self.data as usize))
            }
            None => write!(f, "BridgeValue::Unknown(tag={}, data={:#x})", self.tag, self.data),
        }
    }
}
