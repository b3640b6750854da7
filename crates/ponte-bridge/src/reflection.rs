//! Reflection operations serviced for native code
//!
//! [`BridgeContext`] implements [`Reflect`]: resolve types, constructors
//! and members to handles, then construct, read, write and call through
//! those handles. Every value crossing the boundary goes through the
//! marshaler and is checked against the member's declared types.

use std::panic::{catch_unwind, AssertUnwindSafe};

use ponte_sdk::{AbiError, AbiResult, BridgeValue, Handle, MemberKind, Reflect};

use crate::context::BridgeContext;
use crate::error::{BridgeError, BridgeResult};
use crate::handles::MemberRef;
use crate::runtime::{ManagedValue, MethodDef, ObjectRef, PropertyDef, TypeId};

/// Run a member body, turning a panic into an `AbiError::Panic`
pub(crate) fn invoke_body<R>(member: &str, body: impl FnOnce() -> AbiResult<R>) -> BridgeResult<R> {
    let result = catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| {
        Err(AbiError::Panic(panic_message(payload.as_ref())))
    });
    result.map_err(|source| BridgeError::Invocation {
        member: member.to_string(),
        source,
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl BridgeContext {
    fn member(&self, handle: Handle, kind: MemberKind) -> BridgeResult<(MemberRef, String)> {
        let member = self.with_handles(|h| h.resolve_member(handle))?;
        let name = self.member_name(member);
        if member.kind != kind {
            return Err(BridgeError::KindMismatch {
                member: name,
                actual: member.kind,
                requested: kind,
            });
        }
        Ok((member, name))
    }

    fn member_name(&self, member: MemberRef) -> String {
        match self.types().get(member.type_id) {
            Some(ty) => ty.member_name(member.kind, member.index),
            None => format!("{:?}", member),
        }
    }

    /// Resolve `handle` to an instance of the member's declaring type
    fn receiver(&self, handle: Handle, member: MemberRef) -> BridgeResult<ObjectRef> {
        let object = self.resolve_instance(handle)?;
        if object.type_id() != member.type_id {
            return Err(BridgeError::TypeMismatch {
                expected: self.types().name_of(member.type_id).to_string(),
                got: object.type_name().to_string(),
            });
        }
        Ok(object)
    }

    fn property(&self, member: MemberRef, name: &str) -> BridgeResult<PropertyDef> {
        self.types()
            .descriptor(member.type_id)?
            .properties()
            .get(member.index)
            .cloned()
            .ok_or_else(|| BridgeError::MemberNotFound(name.to_string()))
    }

    fn field_type(&self, member: MemberRef, name: &str) -> BridgeResult<TypeId> {
        self.types()
            .descriptor(member.type_id)?
            .fields()
            .get(member.index)
            .map(|f| f.ty)
            .ok_or_else(|| BridgeError::MemberNotFound(name.to_string()))
    }

    fn method(&self, member: MemberRef, name: &str) -> BridgeResult<MethodDef> {
        self.types()
            .descriptor(member.type_id)?
            .methods()
            .get(member.index)
            .cloned()
            .ok_or_else(|| BridgeError::MemberNotFound(name.to_string()))
    }

    /// Reject value access through the method or constructor kinds
    fn check_value_kind(&self, member: Handle, kind: MemberKind) -> BridgeResult<()> {
        let describe = || {
            self.with_handles(|h| h.resolve_member(member))
                .map(|m| self.member_name(m))
                .unwrap_or_else(|_| format!("{:?}", member))
        };
        match kind {
            MemberKind::Method => Err(BridgeError::MissingMethod(describe())),
            MemberKind::Constructor => Err(BridgeError::MissingMember(describe())),
            MemberKind::Field | MemberKind::Property => Ok(()),
        }
    }

    fn method_receiver(
        &self,
        instance: Handle,
        member: MemberRef,
        def: &MethodDef,
    ) -> BridgeResult<Option<ObjectRef>> {
        if def.is_static {
            Ok(None)
        } else {
            self.receiver(instance, member).map(Some)
        }
    }

    fn invoke_method(
        &self,
        name: &str,
        def: &MethodDef,
        receiver: Option<&ObjectRef>,
        args: &mut [ManagedValue],
    ) -> BridgeResult<ManagedValue> {
        log::trace!("Calling {}", name);
        invoke_body(name, || (def.body)(receiver, args))
    }

    /// Deliver a message to a method of the object registered as `target`.
    /// A method taking one string is preferred over a parameterless one.
    fn deliver(&self, target: &str, method: &str, message: &str) -> BridgeResult<()> {
        let Some(handle) = self.named(target) else {
            return self.missing_receiver(format!("no object named '{}'", target));
        };
        let object = self.resolve_instance(handle)?;
        let found = {
            let types = self.types();
            let ty = types.descriptor(object.type_id())?;
            let mut with_string = None;
            let mut without_args = None;
            let candidates = ty
                .methods()
                .iter()
                .filter(|m| m.name == method && !m.is_static && m.out_param.is_none());
            for candidate in candidates {
                if candidate.params == [TypeId::STRING] {
                    with_string = with_string.or(Some(candidate));
                } else if candidate.params.is_empty() {
                    without_args = without_args.or(Some(candidate));
                }
            }
            with_string
                .or(without_args)
                .cloned()
                .map(|def| (def, ty.name().to_string()))
        };
        let Some((def, type_name)) = found else {
            return self.missing_receiver(format!("'{}' has no method {}", target, method));
        };

        let mut args = if def.params.is_empty() {
            Vec::new()
        } else {
            vec![ManagedValue::String(message.to_string())]
        };
        let name = format!("{}.{}", type_name, def.name);
        self.invoke_method(&name, &def, Some(&object), &mut args)?;
        Ok(())
    }

    fn missing_receiver(&self, reason: String) -> BridgeResult<()> {
        if self.options().require_message_receiver {
            Err(BridgeError::MemberNotFound(reason))
        } else {
            log::debug!("Dropping message: {}", reason);
            Ok(())
        }
    }
}

impl Reflect for BridgeContext {
    type Error = BridgeError;

    fn resolve_type(&self, name: &str) -> BridgeResult<Handle> {
        let Some(type_id) = self.types().lookup(name) else {
            log::debug!("GetType: no type named '{}'", name);
            return Ok(Handle::NULL);
        };
        self.with_handles(|h| h.intern_type(type_id))
    }

    fn resolve_constructor(&self, ty: Handle, param_types: &[Handle]) -> BridgeResult<Handle> {
        let (type_id, params) = self.with_handles(|h| {
            let type_id = h.resolve_type(ty)?;
            let params = param_types
                .iter()
                .map(|p| h.resolve_type(*p))
                .collect::<BridgeResult<Vec<_>>>()?;
            Ok::<_, BridgeError>((type_id, params))
        })?;
        let index = self.types().descriptor(type_id)?.find_constructor(&params);
        match index {
            Some(index) => self.with_handles(|h| {
                h.intern_member(MemberRef {
                    type_id,
                    kind: MemberKind::Constructor,
                    index,
                })
            }),
            None => {
                log::debug!(
                    "GetConstructor: {} has no constructor ({:?})",
                    self.types().name_of(type_id),
                    params
                );
                Ok(Handle::NULL)
            }
        }
    }

    fn resolve_member(&self, ty: Handle, name: &str, kind: MemberKind) -> BridgeResult<Handle> {
        let type_id = self.with_handles(|h| h.resolve_type(ty))?;
        let index = self.types().descriptor(type_id)?.find_member(name, kind);
        match index {
            Some(index) => {
                self.with_handles(|h| h.intern_member(MemberRef { type_id, kind, index }))
            }
            None => {
                log::debug!(
                    "GetMember: {} has no {} named '{}'",
                    self.types().name_of(type_id),
                    kind,
                    name
                );
                Ok(Handle::NULL)
            }
        }
    }

    fn construct(&self, ctor: Handle, args: &[BridgeValue]) -> BridgeResult<Handle> {
        let (member, name) = self.member(ctor, MemberKind::Constructor)?;
        let (def, object) = {
            let types = self.types();
            let ty = types.descriptor(member.type_id)?;
            let def = ty
                .constructors()
                .get(member.index)
                .cloned()
                .ok_or_else(|| BridgeError::MemberNotFound(name.clone()))?;
            (def, ty.instantiate())
        };
        let args = self.marshal(|m| m.args_from_wire(&name, args, &def.params))?;
        invoke_body(&name, || (def.body)(&object, &args))?;
        self.pin(&object)
    }

    fn release_handle(&self, handle: Handle) -> BridgeResult<()> {
        if self.is_host_owned(handle) {
            return Err(BridgeError::InvalidArgument(format!(
                "handle {} is owned by the host",
                handle
            )));
        }
        self.release(handle)?;
        log::trace!("Released handle {}", handle);
        Ok(())
    }

    fn get_value(
        &self,
        instance: Handle,
        member: Handle,
        kind: MemberKind,
    ) -> BridgeResult<BridgeValue> {
        self.check_value_kind(member, kind)?;
        let (member, name) = self.member(member, kind)?;
        let object = self.receiver(instance, member)?;

        match kind {
            MemberKind::Field => {
                let ty = self.field_type(member, &name)?;
                let value = object
                    .field(member.index)
                    .ok_or_else(|| BridgeError::MemberNotFound(name.clone()))?;
                self.marshal(|m| m.to_wire(&value, ty))
            }
            _ => {
                let property = self.property(member, &name)?;
                let getter = property.getter.ok_or_else(|| BridgeError::Inaccessible {
                    member: name.clone(),
                    access: "readable",
                })?;
                let value = invoke_body(&name, || getter(&object))?;
                self.marshal(|m| m.to_wire(&value, property.ty))
            }
        }
    }

    fn set_value(
        &self,
        instance: Handle,
        member: Handle,
        kind: MemberKind,
        value: &BridgeValue,
    ) -> BridgeResult<()> {
        self.check_value_kind(member, kind)?;
        let (member, name) = self.member(member, kind)?;
        let object = self.receiver(instance, member)?;

        match kind {
            MemberKind::Field => {
                let ty = self.field_type(member, &name)?;
                let value = self.marshal(|m| m.from_wire(value, ty))?;
                invoke_body(&name, || object.set_field(member.index, value))
            }
            _ => {
                let property = self.property(member, &name)?;
                let setter = property.setter.ok_or_else(|| BridgeError::Inaccessible {
                    member: name.clone(),
                    access: "writable",
                })?;
                let value = self.marshal(|m| m.from_wire(value, property.ty))?;
                invoke_body(&name, || setter(&object, value))
            }
        }
    }

    fn call_method(
        &self,
        instance: Handle,
        method: Handle,
        args: &[BridgeValue],
    ) -> BridgeResult<BridgeValue> {
        let (member, name) = self.member(method, MemberKind::Method)?;
        let def = self.method(member, &name)?;
        if def.out_param.is_some() {
            return Err(BridgeError::InvalidArgument(format!(
                "{} has an out parameter and must be called through CallMethodOut",
                name
            )));
        }
        let receiver = self.method_receiver(instance, member, &def)?;
        let mut args = self.marshal(|m| m.args_from_wire(&name, args, &def.params))?;

        let result = self.invoke_method(&name, &def, receiver.as_ref(), &mut args)?;
        match def.ret {
            Some(ty) => self.marshal(|m| m.to_wire(&result, ty)),
            None => Ok(BridgeValue::none()),
        }
    }

    fn call_method_out(
        &self,
        instance: Handle,
        method: Handle,
        args: &[BridgeValue],
    ) -> BridgeResult<Option<BridgeValue>> {
        let (member, name) = self.member(method, MemberKind::Method)?;
        let def = self.method(member, &name)?;
        let Some(out_ty) = def.out_param else {
            return Err(BridgeError::InvalidArgument(format!(
                "{} has no out parameter",
                name
            )));
        };
        let receiver = self.method_receiver(instance, member, &def)?;
        let mut args = self.marshal(|m| m.args_from_wire(&name, args, &def.params))?;
        args.push(out_ty.default_value());

        let result = self.invoke_method(&name, &def, receiver.as_ref(), &mut args)?;
        let succeeded = result.as_bool().ok_or_else(|| BridgeError::TypeMismatch {
            expected: "Boolean".to_string(),
            got: result.type_name(),
        })?;
        if !succeeded {
            return Ok(None);
        }
        let out = args.pop().unwrap_or(ManagedValue::None);
        self.marshal(|m| m.to_wire(&out, out_ty)).map(Some)
    }

    fn log_message(&self, message: &str) {
        log::info!(target: self.options().native_log_target.as_str(), "{}", message);
    }

    fn send_message(&self, target: &str, method: &str, message: &str) -> BridgeResult<()> {
        self.deliver(target, method, message)
    }
}
