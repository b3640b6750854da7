//! Type descriptors and the type registry
//!
//! Host code describes its classes with [`TypeBuilder`] and registers them in
//! a [`TypeRegistry`]. Names are resolved exactly; the seven builtin types
//! also answer to their `System.*` aliases. There is no inheritance: members
//! are looked up on the named type only.

use std::fmt;
use std::rc::Rc;

use ponte_sdk::{AbiResult, MemberKind, ValueKind};
use rustc_hash::FxHashMap;

use super::object::{FieldLayout, ManagedObject, ManagedValue, ObjectRef};
use crate::error::BridgeError;

/// Identifier of a registered type
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// `Int32`
    pub const INT32: TypeId = TypeId(0);
    /// `Int64`
    pub const INT64: TypeId = TypeId(1);
    /// `Single`
    pub const SINGLE: TypeId = TypeId(2);
    /// `Double`
    pub const DOUBLE: TypeId = TypeId(3);
    /// `Boolean`
    pub const BOOLEAN: TypeId = TypeId(4);
    /// `String`
    pub const STRING: TypeId = TypeId(5);
    /// `Object`: accepts any object reference
    pub const OBJECT: TypeId = TypeId(6);

    /// Index into the registry
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check for one of the builtin types
    pub const fn is_builtin(self) -> bool {
        self.0 <= Self::OBJECT.0
    }

    /// Wire kind values of this type marshal to
    pub const fn value_kind(self) -> ValueKind {
        match self.0 {
            0 => ValueKind::Int32,
            1 => ValueKind::Int64,
            2 => ValueKind::Single,
            3 => ValueKind::Double,
            4 => ValueKind::Boolean,
            5 => ValueKind::String,
            _ => ValueKind::Object,
        }
    }

    /// Check whether `value` may be stored in a slot declared as this type
    pub fn accepts(self, value: &ManagedValue) -> bool {
        match (self.value_kind(), value) {
            (ValueKind::Object, ManagedValue::None) => true,
            (ValueKind::Object, ManagedValue::Object(obj)) => {
                self == TypeId::OBJECT || obj.type_id() == self
            }
            (kind, value) => kind == value.kind(),
        }
    }

    /// Initial value of a slot declared as this type
    pub fn default_value(self) -> ManagedValue {
        match self.value_kind() {
            ValueKind::Int32 => ManagedValue::Int32(0),
            ValueKind::Int64 => ManagedValue::Int64(0),
            ValueKind::Single => ManagedValue::Single(0.0),
            ValueKind::Double => ManagedValue::Double(0.0),
            ValueKind::Boolean => ManagedValue::Boolean(false),
            ValueKind::String => ManagedValue::String(String::new()),
            ValueKind::None | ValueKind::Object => ManagedValue::None,
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match BUILTINS.get(self.index()) {
            Some((_, name, _)) => write!(f, "{}", name),
            None => write!(f, "TypeId({})", self.0),
        }
    }
}

const BUILTINS: [(TypeId, &str, &str); 7] = [
    (TypeId::INT32, "Int32", "System.Int32"),
    (TypeId::INT64, "Int64", "System.Int64"),
    (TypeId::SINGLE, "Single", "System.Single"),
    (TypeId::DOUBLE, "Double", "System.Double"),
    (TypeId::BOOLEAN, "Boolean", "System.Boolean"),
    (TypeId::STRING, "String", "System.String"),
    (TypeId::OBJECT, "Object", "System.Object"),
];

/// Property getter body
pub type GetterFn = Rc<dyn Fn(&ObjectRef) -> AbiResult<ManagedValue>>;
/// Property setter body
pub type SetterFn = Rc<dyn Fn(&ObjectRef, ManagedValue) -> AbiResult<()>>;
/// Method body. Receives the instance (`None` for static methods) and the
/// arguments; an out parameter occupies the last slot.
pub type MethodFn = Rc<dyn Fn(Option<&ObjectRef>, &mut [ManagedValue]) -> AbiResult<ManagedValue>>;
/// Constructor body, run on a freshly allocated instance
pub type ConstructorFn = Rc<dyn Fn(&ObjectRef, &[ManagedValue]) -> AbiResult<()>>;

/// Field declaration
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
}

/// Property declaration
#[derive(Clone)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
    pub(crate) getter: Option<GetterFn>,
    pub(crate) setter: Option<SetterFn>,
}

impl PropertyDef {
    /// Create a property with neither accessor
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            getter: None,
            setter: None,
        }
    }

    /// Attach a getter
    pub fn getter(mut self, f: impl Fn(&ObjectRef) -> AbiResult<ManagedValue> + 'static) -> Self {
        self.getter = Some(Rc::new(f));
        self
    }

    /// Attach a setter
    pub fn setter(
        mut self,
        f: impl Fn(&ObjectRef, ManagedValue) -> AbiResult<()> + 'static,
    ) -> Self {
        self.setter = Some(Rc::new(f));
        self
    }

    /// Check for a getter
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    /// Check for a setter
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Method declaration
#[derive(Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Declared parameter types, excluding any out parameter
    pub params: Vec<TypeId>,
    /// Return type; `None` for void
    pub ret: Option<TypeId>,
    /// Type of the trailing out parameter, if any
    pub out_param: Option<TypeId>,
    /// Whether the method takes no instance
    pub is_static: bool,
    pub(crate) body: MethodFn,
}

impl MethodDef {
    /// Create a void instance method with no parameters
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(Option<&ObjectRef>, &mut [ManagedValue]) -> AbiResult<ManagedValue> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret: None,
            out_param: None,
            is_static: false,
            body: Rc::new(body),
        }
    }

    /// Append a parameter
    pub fn param(mut self, ty: TypeId) -> Self {
        self.params.push(ty);
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: TypeId) -> Self {
        self.ret = Some(ty);
        self
    }

    /// Add a trailing out parameter. The method then returns a success flag.
    pub fn out(mut self, ty: TypeId) -> Self {
        self.out_param = Some(ty);
        self.ret = Some(TypeId::BOOLEAN);
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Number of argument slots native code passes, out slot included
    pub fn arity(&self) -> usize {
        self.params.len() + usize::from(self.out_param.is_some())
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("out_param", &self.out_param)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// Constructor declaration
#[derive(Clone)]
pub struct ConstructorDef {
    /// Declared parameter types
    pub params: Vec<TypeId>,
    pub(crate) body: ConstructorFn,
}

impl ConstructorDef {
    /// Create a constructor taking `params`
    pub fn new(
        params: &[TypeId],
        body: impl Fn(&ObjectRef, &[ManagedValue]) -> AbiResult<()> + 'static,
    ) -> Self {
        Self {
            params: params.to_vec(),
            body: Rc::new(body),
        }
    }

    /// Parameterless constructor that leaves every field at its default
    pub fn empty() -> Self {
        Self::new(&[], |_, _| Ok(()))
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .finish()
    }
}

/// Builder for a host class
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    name: String,
    fields: Vec<FieldDef>,
    properties: Vec<PropertyDef>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
}

impl TypeBuilder {
    /// Start describing the class `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Add a field
    pub fn field(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    /// Add a property
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a method. Overloads are kept in insertion order.
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, ctor: ConstructorDef) -> Self {
        self.constructors.push(ctor);
        self
    }

    fn referenced_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        let fields = self.fields.iter().map(|f| f.ty);
        let properties = self.properties.iter().map(|p| p.ty);
        let methods = self.methods.iter().flat_map(|m| {
            m.params
                .iter()
                .copied()
                .chain(m.ret)
                .chain(m.out_param)
        });
        let ctors = self.constructors.iter().flat_map(|c| c.params.iter().copied());
        fields.chain(properties).chain(methods).chain(ctors)
    }
}

/// A registered type
#[derive(Debug)]
pub struct TypeDescriptor {
    id: TypeId,
    name: String,
    layout: Rc<FieldLayout>,
    fields: Vec<FieldDef>,
    properties: Vec<PropertyDef>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
}

impl TypeDescriptor {
    fn from_builder(id: TypeId, builder: TypeBuilder) -> Self {
        let layout = FieldLayout::new(
            &builder.name,
            builder.fields.iter().map(|f| (f.name.clone(), f.ty)),
        );
        Self {
            id,
            name: builder.name,
            layout: Rc::new(layout),
            fields: builder.fields,
            properties: builder.properties,
            methods: builder.methods,
            constructors: builder.constructors,
        }
    }

    /// Type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully-qualified name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Declared properties
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    /// Declared methods
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    /// Declared constructors
    pub fn constructors(&self) -> &[ConstructorDef] {
        &self.constructors
    }

    /// Index of the member called `name` of the given kind. Methods resolve
    /// to the first overload registered under that name. Constructors have
    /// no name: the first registered constructor is returned.
    pub fn find_member(&self, name: &str, kind: MemberKind) -> Option<usize> {
        match kind {
            MemberKind::Field => self.fields.iter().position(|f| f.name == name),
            MemberKind::Property => self.properties.iter().position(|p| p.name == name),
            MemberKind::Method => self.methods.iter().position(|m| m.name == name),
            MemberKind::Constructor => (!self.constructors.is_empty()).then_some(0),
        }
    }

    /// Index of the constructor whose parameter types are exactly `params`
    pub fn find_constructor(&self, params: &[TypeId]) -> Option<usize> {
        self.constructors.iter().position(|c| c.params == params)
    }

    /// Name of a member for diagnostics
    pub fn member_name(&self, kind: MemberKind, index: usize) -> String {
        let name = match kind {
            MemberKind::Field => self.fields.get(index).map(|f| f.name.as_str()),
            MemberKind::Property => self.properties.get(index).map(|p| p.name.as_str()),
            MemberKind::Method => self.methods.get(index).map(|m| m.name.as_str()),
            MemberKind::Constructor => Some(".ctor"),
        };
        format!("{}.{}", self.name, name.unwrap_or("<unknown>"))
    }

    /// Allocate an instance with every field at its default value
    pub fn instantiate(&self) -> ObjectRef {
        ManagedObject::instantiate(self.id, self.layout.clone())
    }
}

/// Registry of every type native code can resolve
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    name_to_id: FxHashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create a registry holding only the builtin types
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            name_to_id: FxHashMap::default(),
        };
        for (id, name, alias) in BUILTINS {
            registry
                .types
                .push(TypeDescriptor::from_builder(id, TypeBuilder::new(name)));
            registry.name_to_id.insert(name.to_string(), id);
            registry.name_to_id.insert(alias.to_string(), id);
        }
        registry
    }

    /// Register a host class
    pub fn register(&mut self, builder: TypeBuilder) -> Result<TypeId, BridgeError> {
        if self.name_to_id.contains_key(&builder.name) {
            return Err(BridgeError::DuplicateType(builder.name));
        }
        let id = TypeId(self.types.len() as u32);
        // A class may refer to itself
        if let Some(unknown) = builder
            .referenced_types()
            .find(|ty| ty.index() > self.types.len())
        {
            return Err(BridgeError::UnknownType(unknown));
        }

        log::debug!("Registered type {} as {:?}", builder.name, id);
        self.name_to_id.insert(builder.name.clone(), id);
        self.types.push(TypeDescriptor::from_builder(id, builder));
        Ok(id)
    }

    /// Look up a type by name or builtin alias
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.name_to_id.get(name).copied()
    }

    /// Get a type by id
    pub fn get(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(id.index())
    }

    /// Get a type by id, failing with `UnknownType`
    pub fn descriptor(&self, id: TypeId) -> Result<&TypeDescriptor, BridgeError> {
        self.get(id).ok_or(BridgeError::UnknownType(id))
    }

    /// Name of a type for diagnostics
    pub fn name_of(&self, id: TypeId) -> &str {
        self.get(id).map(|t| t.name()).unwrap_or("<unknown>")
    }

    /// Number of registered types, builtins included
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: builtins are present from construction
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all types
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
