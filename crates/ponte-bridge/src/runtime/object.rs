//! Managed values and objects

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ponte_sdk::{AbiError, AbiResult, ValueKind};
use rustc_hash::FxHashMap;

use super::types::TypeId;

/// Shared reference to a managed object. Identity is pointer identity.
pub type ObjectRef = Rc<ManagedObject>;

/// A value on the managed side of the bridge
#[derive(Clone)]
pub enum ManagedValue {
    /// Null object or void
    None,
    /// Signed 32-bit integer
    Int32(i32),
    /// Signed 64-bit integer
    Int64(i64),
    /// 32-bit float
    Single(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Boolean(bool),
    /// Owned string
    String(String),
    /// Object reference
    Object(ObjectRef),
}

impl ManagedValue {
    /// Wire kind this value marshals to
    pub fn kind(&self) -> ValueKind {
        match self {
            ManagedValue::None => ValueKind::None,
            ManagedValue::Int32(_) => ValueKind::Int32,
            ManagedValue::Int64(_) => ValueKind::Int64,
            ManagedValue::Single(_) => ValueKind::Single,
            ManagedValue::Double(_) => ValueKind::Double,
            ManagedValue::Boolean(_) => ValueKind::Boolean,
            ManagedValue::String(_) => ValueKind::String,
            ManagedValue::Object(_) => ValueKind::Object,
        }
    }

    /// Type name for diagnostics; objects report their class name
    pub fn type_name(&self) -> String {
        match self {
            ManagedValue::Object(obj) => obj.type_name().to_string(),
            other => other.kind().name().to_string(),
        }
    }

    /// Check for `None`
    pub fn is_none(&self) -> bool {
        matches!(self, ManagedValue::None)
    }

    /// Get as i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ManagedValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ManagedValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as f32
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ManagedValue::Single(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ManagedValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ManagedValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManagedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            ManagedValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so a NaN read back from the wire equals the
// NaN that was written.
impl PartialEq for ManagedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ManagedValue::None, ManagedValue::None) => true,
            (ManagedValue::Int32(a), ManagedValue::Int32(b)) => a == b,
            (ManagedValue::Int64(a), ManagedValue::Int64(b)) => a == b,
            (ManagedValue::Single(a), ManagedValue::Single(b)) => a.to_bits() == b.to_bits(),
            (ManagedValue::Double(a), ManagedValue::Double(b)) => a.to_bits() == b.to_bits(),
            (ManagedValue::Boolean(a), ManagedValue::Boolean(b)) => a == b,
            (ManagedValue::String(a), ManagedValue::String(b)) => a == b,
            (ManagedValue::Object(a), ManagedValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ManagedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagedValue::None => write!(f, "None"),
            ManagedValue::Int32(v) => write!(f, "Int32({})", v),
            ManagedValue::Int64(v) => write!(f, "Int64({})", v),
            ManagedValue::Single(v) => write!(f, "Single({})", v),
            ManagedValue::Double(v) => write!(f, "Double({})", v),
            ManagedValue::Boolean(v) => write!(f, "Boolean({})", v),
            ManagedValue::String(s) => write!(f, "String({:?})", s),
            ManagedValue::Object(obj) => write!(f, "Object({:?})", obj),
        }
    }
}

impl From<i32> for ManagedValue {
    fn from(v: i32) -> Self {
        ManagedValue::Int32(v)
    }
}

impl From<i64> for ManagedValue {
    fn from(v: i64) -> Self {
        ManagedValue::Int64(v)
    }
}

impl From<f32> for ManagedValue {
    fn from(v: f32) -> Self {
        ManagedValue::Single(v)
    }
}

impl From<f64> for ManagedValue {
    fn from(v: f64) -> Self {
        ManagedValue::Double(v)
    }
}

impl From<bool> for ManagedValue {
    fn from(v: bool) -> Self {
        ManagedValue::Boolean(v)
    }
}

impl From<&str> for ManagedValue {
    fn from(v: &str) -> Self {
        ManagedValue::String(v.to_string())
    }
}

impl From<String> for ManagedValue {
    fn from(v: String) -> Self {
        ManagedValue::String(v)
    }
}

impl From<ObjectRef> for ManagedValue {
    fn from(v: ObjectRef) -> Self {
        ManagedValue::Object(v)
    }
}

/// Field names and declared types of one class, shared by its instances
#[derive(Debug)]
pub struct FieldLayout {
    type_name: String,
    names: Vec<String>,
    types: Vec<TypeId>,
    lookup: FxHashMap<String, usize>,
}

impl FieldLayout {
    pub(crate) fn new(type_name: &str, fields: impl IntoIterator<Item = (String, TypeId)>) -> Self {
        let mut names = Vec::new();
        let mut types = Vec::new();
        let mut lookup = FxHashMap::default();
        for (index, (name, ty)) in fields.into_iter().enumerate() {
            lookup.entry(name.clone()).or_insert(index);
            names.push(name);
            types.push(ty);
        }
        Self {
            type_name: type_name.to_string(),
            names,
            types,
            lookup,
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check whether the class has no fields
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the field called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }
}

/// A managed object instance: a class id plus field storage
pub struct ManagedObject {
    type_id: TypeId,
    layout: Rc<FieldLayout>,
    fields: RefCell<Vec<ManagedValue>>,
}

impl ManagedObject {
    /// Allocate an instance with every field at its type's default
    pub(crate) fn instantiate(type_id: TypeId, layout: Rc<FieldLayout>) -> ObjectRef {
        let fields = layout.types.iter().map(|ty| ty.default_value()).collect();
        Rc::new(Self {
            type_id,
            layout,
            fields: RefCell::new(fields),
        })
    }

    /// Class of this object
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Class name of this object
    pub fn type_name(&self) -> &str {
        &self.layout.type_name
    }

    /// Read a field by name
    pub fn get(&self, name: &str) -> Option<ManagedValue> {
        self.layout.index_of(name).and_then(|index| self.field(index))
    }

    /// Write a field by name, checking the value against the declared type
    pub fn set(&self, name: &str, value: impl Into<ManagedValue>) -> AbiResult<()> {
        let index = self.layout.index_of(name).ok_or_else(|| {
            AbiError::ArgumentError(format!("{} has no field '{}'", self.type_name(), name))
        })?;
        self.set_field(index, value.into())
    }

    pub(crate) fn field(&self, index: usize) -> Option<ManagedValue> {
        self.fields.borrow().get(index).cloned()
    }

    pub(crate) fn set_field(&self, index: usize, value: ManagedValue) -> AbiResult<()> {
        let declared = *self.layout.types.get(index).ok_or_else(|| {
            AbiError::ArgumentError(format!("{} has no field #{}", self.type_name(), index))
        })?;
        if !declared.accepts(&value) {
            return Err(AbiError::TypeMismatch {
                expected: format!("{:?}", declared),
                got: value.type_name(),
            });
        }
        self.fields.borrow_mut()[index] = value;
        Ok(())
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.type_name(), self)
    }
}
