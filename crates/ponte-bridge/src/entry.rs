//! `extern "C"` entry points handed to native code
//!
//! Each entry point looks up the bridge context installed on the calling
//! thread, decodes its raw arguments, forwards to [`Reflect`], and encodes
//! the outcome as a handle, a status code, or a flag. Nothing unwinds
//! across the boundary: errors and panics are logged and reported as
//! status codes (or the null handle / `false` for entry points without one).
//!
//! A call from a thread with no active context, including any thread other
//! than the bridge's owning thread, fails with `NoContext`.

use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use ponte_sdk::{BridgeStatus, BridgeValue, Handle, MemberKind, Reflect, StatusCode};

use crate::context::BridgeContext;
use crate::error::{BridgeError, BridgeResult};
use crate::marshal::read_c_str;
use crate::reflection::panic_message;

thread_local! {
    static ACTIVE: RefCell<Option<Rc<BridgeContext>>> = const { RefCell::new(None) };
}

/// Keeps a context installed on the current thread until dropped
#[derive(Debug)]
pub struct ActiveContext {
    _owner: PhantomData<Rc<BridgeContext>>,
}

/// Install `context` as the current thread's active context
pub(crate) fn activate(context: Rc<BridgeContext>) -> BridgeResult<ActiveContext> {
    ACTIVE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(BridgeError::ContextBusy);
        }
        *slot = Some(context);
        Ok(ActiveContext {
            _owner: PhantomData,
        })
    })
}

impl Drop for ActiveContext {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Check whether a bridge is active on the current thread
pub fn has_active_context() -> bool {
    current().is_some()
}

fn current() -> Option<Rc<BridgeContext>> {
    ACTIVE.try_with(|slot| slot.borrow().clone()).ok().flatten()
}

fn run<T>(
    op: &'static str,
    f: impl FnOnce(&BridgeContext) -> BridgeResult<T>,
) -> Result<T, BridgeStatus> {
    let Some(context) = current() else {
        log::error!(
            "{} called on thread {:?} with no active bridge",
            op,
            std::thread::current().id()
        );
        return Err(BridgeStatus::NoContext);
    };
    match catch_unwind(AssertUnwindSafe(|| f(&context))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            log::error!("{} failed: {}", op, err);
            Err(err.status())
        }
        Err(payload) => {
            log::error!("{} panicked: {}", op, panic_message(payload.as_ref()));
            Err(BridgeStatus::Panic)
        }
    }
}

fn status(result: Result<(), BridgeStatus>) -> BridgeStatus {
    result.err().unwrap_or(BridgeStatus::Ok)
}

/// Borrow a native array of `count` elements.
///
/// # Safety
/// `ptr` must be null or point to `count` initialized elements.
unsafe fn slice<'a, T>(ptr: *const T, count: i32, what: &str) -> BridgeResult<&'a [T]> {
    let len = usize::try_from(count)
        .map_err(|_| BridgeError::InvalidArgument(format!("negative {} count {}", what, count)))?;
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(BridgeError::InvalidArgument(format!(
            "{} {} given with a null pointer",
            len, what
        )));
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

fn member_kind(raw: i32) -> BridgeResult<MemberKind> {
    MemberKind::from_raw(raw)
        .ok_or_else(|| BridgeError::InvalidArgument(format!("unknown member kind {}", raw)))
}

// ============================================================================
// Essentials
// ============================================================================

pub(crate) unsafe extern "C" fn debug_log(message: *const c_char) {
    let _ = run("DebugLog", |ctx| {
        if message.is_null() {
            return Err(BridgeError::InvalidArgument("log message is null".to_string()));
        }
        let text = CStr::from_ptr(message).to_string_lossy();
        ctx.log_message(&text);
        Ok(())
    });
}

pub(crate) unsafe extern "C" fn send_message(
    target: *const c_char,
    method: *const c_char,
    message: *const c_char,
) {
    let _ = run("SendMessage", |ctx| {
        let target = read_c_str(target, "target")?;
        let method = read_c_str(method, "method")?;
        let message = read_c_str(message, "message")?;
        ctx.send_message(target, method, message)
    });
}

// ============================================================================
// Resolution
// ============================================================================

pub(crate) unsafe extern "C" fn get_type(name: *const c_char) -> Handle {
    run("GetType", |ctx| {
        let name = read_c_str(name, "type name")?;
        ctx.resolve_type(name)
    })
    .unwrap_or(Handle::NULL)
}

pub(crate) unsafe extern "C" fn get_constructor(
    ty: Handle,
    param_types: *const Handle,
    param_count: i32,
) -> Handle {
    run("GetConstructor", |ctx| {
        let params = slice(param_types, param_count, "parameter types")?;
        ctx.resolve_constructor(ty, params)
    })
    .unwrap_or(Handle::NULL)
}

pub(crate) unsafe extern "C" fn get_member(ty: Handle, name: *const c_char, kind: i32) -> Handle {
    run("GetMember", |ctx| {
        let kind = member_kind(kind)?;
        let name = if kind == MemberKind::Constructor && name.is_null() {
            ""
        } else {
            read_c_str(name, "member name")?
        };
        ctx.resolve_member(ty, name, kind)
    })
    .unwrap_or(Handle::NULL)
}

// ============================================================================
// Instances
// ============================================================================

pub(crate) unsafe extern "C" fn construct(
    ctor: Handle,
    args: *const BridgeValue,
    arg_count: i32,
) -> Handle {
    run("Construct", |ctx| {
        let args = slice(args, arg_count, "arguments")?;
        ctx.construct(ctor, args)
    })
    .unwrap_or(Handle::NULL)
}

pub(crate) unsafe extern "C" fn release_handle(handle: Handle) -> BridgeStatus {
    status(run("ReleaseHandle", |ctx| ctx.release_handle(handle)))
}

pub(crate) unsafe extern "C" fn get_value(
    instance: Handle,
    member: Handle,
    kind: i32,
    value: *mut BridgeValue,
) -> BridgeStatus {
    status(run("GetValue", |ctx| {
        let kind = member_kind(kind)?;
        if value.is_null() {
            return Err(BridgeError::InvalidArgument("output slot is null".to_string()));
        }
        let result = ctx.get_value(instance, member, kind)?;
        value.write(result);
        Ok(())
    }))
}

pub(crate) unsafe extern "C" fn set_value(
    instance: Handle,
    member: Handle,
    kind: i32,
    value: *mut BridgeValue,
) -> BridgeStatus {
    status(run("SetValue", |ctx| {
        let kind = member_kind(kind)?;
        if value.is_null() {
            return Err(BridgeError::InvalidArgument("input slot is null".to_string()));
        }
        ctx.set_value(instance, member, kind, &value.read())
    }))
}

// ============================================================================
// Calls
// ============================================================================

pub(crate) unsafe extern "C" fn call_method(
    instance: Handle,
    method: Handle,
    args: *const BridgeValue,
    arg_count: i32,
    output: *mut BridgeValue,
) -> BridgeStatus {
    status(run("CallMethod", |ctx| {
        let args = slice(args, arg_count, "arguments")?;
        let result = ctx.call_method(instance, method, args)?;
        if !output.is_null() {
            output.write(result);
        }
        Ok(())
    }))
}

pub(crate) unsafe extern "C" fn call_method_out(
    instance: Handle,
    method: Handle,
    args: *const BridgeValue,
    arg_count: i32,
    output: *mut BridgeValue,
) -> bool {
    run("CallMethodOut", |ctx| {
        if arg_count < 1 {
            return Err(BridgeError::InvalidArgument(format!(
                "argument count {} leaves no out slot",
                arg_count
            )));
        }
        let args = slice(args, arg_count - 1, "arguments")?;
        match ctx.call_method_out(instance, method, args)? {
            Some(result) => {
                if !output.is_null() {
                    output.write(result);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    })
    .unwrap_or(false)
}
