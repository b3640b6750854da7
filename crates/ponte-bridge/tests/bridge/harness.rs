//! In-process fake of a native bridge library
//!
//! Every export is a plain `extern "C"` function in this test binary. State
//! (registered entry points, live instances, an event log) is thread-local,
//! so each test gets its own fake library. The [`native`] module plays the
//! part of native code calling back into the bridge.

use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr};
use std::ptr::NonNull;

use ponte_bridge::{
    Bridge, BridgeOptions, LoadError, ManagedValue, MethodDef, SymbolSource, TypeBuilder, TypeId,
};
use ponte_sdk::abi::*;
use ponte_sdk::{Handle, NativeInstance};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default, Clone, Copy)]
pub struct EntryPoints {
    pub debug_log: Option<DebugLogFn>,
    pub send_message: Option<SendMessageFn>,
    pub get_type: Option<GetTypeFn>,
    pub get_constructor: Option<GetConstructorFn>,
    pub get_member: Option<GetMemberFn>,
    pub construct: Option<ConstructFn>,
    pub release_handle: Option<ReleaseHandleFn>,
    pub get_value: Option<GetValueFn>,
    pub set_value: Option<SetValueFn>,
    pub call_method: Option<CallMethodFn>,
    pub call_method_out: Option<CallMethodOutFn>,
}

type InitHook = Box<dyn FnOnce()>;
type FrameHook = Box<dyn FnMut(&str, usize)>;

#[derive(Default)]
struct NativeState {
    entry: EntryPoints,
    events: Vec<String>,
    next_id: usize,
    live: Vec<usize>,
    created: usize,
    destroyed: usize,
    on_init: Option<InitHook>,
    on_hook: Option<FrameHook>,
}

thread_local! {
    static NATIVE: RefCell<NativeState> = RefCell::new(NativeState::default());
}

fn with<R>(f: impl FnOnce(&mut NativeState) -> R) -> R {
    NATIVE.with(|state| f(&mut state.borrow_mut()))
}

fn record(event: impl Into<String>) {
    with(|s| s.events.push(event.into()));
}

/// Event log of the fake library, oldest first
pub fn events() -> Vec<String> {
    with(|s| s.events.clone())
}

/// Events recorded since the last call, oldest first
pub fn take_events() -> Vec<String> {
    with(|s| std::mem::take(&mut s.events))
}

/// (created, destroyed, live) instance counts
pub fn instance_counts() -> (usize, usize, usize) {
    with(|s| (s.created, s.destroyed, s.live.len()))
}

/// Run `f` from inside `InitializeNative`
pub fn on_initialize(f: impl FnOnce() + 'static) {
    with(|s| s.on_init = Some(Box::new(f)));
}

/// Run `f(hook, instance_id)` after every lifecycle hook
pub fn on_hook(f: impl FnMut(&str, usize) + 'static) {
    with(|s| s.on_hook = Some(Box::new(f)));
}

struct FakeInstance {
    id: usize,
}

unsafe fn instance_id(instance: NativeInstance) -> usize {
    (*(instance as *const FakeInstance)).id
}

// ============================================================================
// Exports
// ============================================================================

unsafe extern "C" fn set_debug_log_method(callback: DebugLogFn) {
    with(|s| s.entry.debug_log = Some(callback));
    record("SetDebugLogMethod");
}

unsafe extern "C" fn set_send_message_method(callback: SendMessageFn) {
    with(|s| s.entry.send_message = Some(callback));
    record("SetSendMessageMethod");
}

unsafe extern "C" fn set_get_type_ptr_method(callback: GetTypeFn) {
    with(|s| s.entry.get_type = Some(callback));
    record("SetGetTypePtrMethod");
}

unsafe extern "C" fn set_get_constructor_ptr_method(callback: GetConstructorFn) {
    with(|s| s.entry.get_constructor = Some(callback));
    record("SetGetConstructorPtrMethod");
}

unsafe extern "C" fn set_get_member_ptr_method(callback: GetMemberFn) {
    with(|s| s.entry.get_member = Some(callback));
    record("SetGetMemberPtrMethod");
}

unsafe extern "C" fn set_constructor_method(callback: ConstructFn) {
    with(|s| s.entry.construct = Some(callback));
    record("SetConstructorMethod");
}

unsafe extern "C" fn set_release_handle_method(callback: ReleaseHandleFn) {
    with(|s| s.entry.release_handle = Some(callback));
    record("SetReleaseHandleMethod");
}

unsafe extern "C" fn set_get_set_value_method(get: GetValueFn, set: SetValueFn) {
    with(|s| {
        s.entry.get_value = Some(get);
        s.entry.set_value = Some(set);
    });
    record("SetGetSetValueMethod");
}

unsafe extern "C" fn set_call_method_method(callback: CallMethodFn) {
    with(|s| s.entry.call_method = Some(callback));
    record("SetCallMethodMethod");
}

unsafe extern "C" fn set_call_method_out_method(callback: CallMethodOutFn) {
    with(|s| s.entry.call_method_out = Some(callback));
    record("SetCallMethodOutMethod");
}

unsafe extern "C" fn create_instance(
    class_name: *const c_char,
    _proxy: Handle,
) -> NativeInstance {
    let class = CStr::from_ptr(class_name).to_string_lossy().into_owned();
    if class == "Missing" {
        record("create failed Missing");
        return std::ptr::null_mut();
    }
    let id = with(|s| {
        s.next_id += 1;
        s.created += 1;
        s.live.push(s.next_id);
        s.next_id
    });
    record(format!("create {}#{}", class, id));
    Box::into_raw(Box::new(FakeInstance { id })) as NativeInstance
}

unsafe extern "C" fn destroy_instance(instance: NativeInstance) {
    let instance = Box::from_raw(instance as *mut FakeInstance);
    with(|s| {
        s.destroyed += 1;
        s.live.retain(|id| *id != instance.id);
    });
    record(format!("destroy_instance #{}", instance.id));
}

macro_rules! hooks {
    ($($fn_name:ident => $event:literal;)*) => {
        $(
            unsafe extern "C" fn $fn_name(instance: NativeInstance) {
                let id = instance_id(instance);
                record(format!("{} #{}", $event, id));
                let hook = with(|s| s.on_hook.take());
                if let Some(mut hook) = hook {
                    hook($event, id);
                    with(|s| {
                        s.on_hook.get_or_insert(hook);
                    });
                }
            }
        )*
    };
}

hooks! {
    call_awake => "awake";
    call_start => "start";
    call_stop => "stop";
    call_enable => "enable";
    call_disable => "disable";
    call_fixed_tick => "fixed_tick";
    call_tick => "tick";
    call_late_tick => "late_tick";
    call_destroy => "destroy";
}

unsafe extern "C" fn initialize_native() {
    record("InitializeNative");
    let hook = with(|s| s.on_init.take());
    if let Some(hook) = hook {
        hook();
    }
}

unsafe extern "C" fn deinitialize_native() {
    record("DeinitializeNative");
}

// ============================================================================
// Symbol source
// ============================================================================

macro_rules! symbol {
    ($f:expr, $ty:ty) => {
        ($f as $ty) as *mut c_void
    };
}

fn symbol_table() -> Vec<(&'static str, *mut c_void)> {
    vec![
        ("SetDebugLogMethod", symbol!(set_debug_log_method, SetDebugLogMethodFn)),
        (
            "SetSendMessageMethod",
            symbol!(set_send_message_method, SetSendMessageMethodFn),
        ),
        (
            "SetGetTypePtrMethod",
            symbol!(set_get_type_ptr_method, SetGetTypePtrMethodFn),
        ),
        (
            "SetGetConstructorPtrMethod",
            symbol!(set_get_constructor_ptr_method, SetGetConstructorPtrMethodFn),
        ),
        (
            "SetGetMemberPtrMethod",
            symbol!(set_get_member_ptr_method, SetGetMemberPtrMethodFn),
        ),
        (
            "SetConstructorMethod",
            symbol!(set_constructor_method, SetConstructorMethodFn),
        ),
        (
            "SetReleaseHandleMethod",
            symbol!(set_release_handle_method, SetReleaseHandleMethodFn),
        ),
        (
            "SetGetSetValueMethod",
            symbol!(set_get_set_value_method, SetGetSetValueMethodFn),
        ),
        (
            "SetCallMethodMethod",
            symbol!(set_call_method_method, SetCallMethodMethodFn),
        ),
        (
            "SetCallMethodOutMethod",
            symbol!(set_call_method_out_method, SetCallMethodOutMethodFn),
        ),
        ("CreateInstance", symbol!(create_instance, CreateInstanceFn)),
        ("DestroyInstance", symbol!(destroy_instance, DestroyInstanceFn)),
        ("CallAwake", symbol!(call_awake, LifecycleHookFn)),
        ("CallStart", symbol!(call_start, LifecycleHookFn)),
        ("CallStop", symbol!(call_stop, LifecycleHookFn)),
        ("CallEnable", symbol!(call_enable, LifecycleHookFn)),
        ("CallDisable", symbol!(call_disable, LifecycleHookFn)),
        ("CallFixedTick", symbol!(call_fixed_tick, LifecycleHookFn)),
        ("CallTick", symbol!(call_tick, LifecycleHookFn)),
        ("CallLateTick", symbol!(call_late_tick, LifecycleHookFn)),
        ("CallDestroy", symbol!(call_destroy, LifecycleHookFn)),
        ("InitializeNative", symbol!(initialize_native, NativeVoidFn)),
        ("DeinitializeNative", symbol!(deinitialize_native, NativeVoidFn)),
    ]
}

/// The fake library as a [`SymbolSource`]
pub struct FakeLibrary {
    symbols: Vec<(&'static str, *mut c_void)>,
}

impl FakeLibrary {
    /// A complete library with fresh state for the current thread
    pub fn new() -> Self {
        with(|s| *s = NativeState::default());
        Self {
            symbols: symbol_table(),
        }
    }

    /// Pretend `symbol` is not exported
    pub fn without(mut self, symbol: &str) -> Self {
        self.symbols.retain(|(name, _)| *name != symbol);
        self
    }
}

impl SymbolSource for FakeLibrary {
    fn name(&self) -> &str {
        "fake-native"
    }

    fn symbol_address(&self, symbol: &str) -> Result<NonNull<c_void>, LoadError> {
        self.symbols
            .iter()
            .find(|(name, _)| *name == symbol)
            .and_then(|(_, address)| NonNull::new(*address))
            .ok_or_else(|| LoadError::SymbolNotFound {
                symbol: symbol.to_string(),
                library: self.name().to_string(),
            })
    }

    fn unload(self: Box<Self>) -> bool {
        record("unload");
        true
    }
}

// ============================================================================
// Native-side calls into the bridge
// ============================================================================

pub mod native {
    use super::*;
    use ponte_sdk::{BridgeStatus, BridgeValue, MemberKind};

    /// Entry points registered by the bridge
    pub fn entry() -> EntryPoints {
        with(|s| s.entry)
    }

    pub fn debug_log(message: &CStr) {
        let f = entry().debug_log.expect("DebugLog registered");
        unsafe { f(message.as_ptr()) }
    }

    pub fn send_message(target: &CStr, method: &CStr, message: &CStr) {
        let f = entry().send_message.expect("SendMessage registered");
        unsafe { f(target.as_ptr(), method.as_ptr(), message.as_ptr()) }
    }

    pub fn get_type(name: &CStr) -> Handle {
        let f = entry().get_type.expect("GetType registered");
        unsafe { f(name.as_ptr()) }
    }

    pub fn get_constructor(ty: Handle, params: &[Handle]) -> Handle {
        let f = entry().get_constructor.expect("GetConstructor registered");
        unsafe { f(ty, params.as_ptr(), params.len() as i32) }
    }

    pub fn get_member(ty: Handle, name: &CStr, kind: MemberKind) -> Handle {
        let f = entry().get_member.expect("GetMember registered");
        unsafe { f(ty, name.as_ptr(), kind as i32) }
    }

    pub fn construct(ctor: Handle, args: &[BridgeValue]) -> Handle {
        let f = entry().construct.expect("Construct registered");
        unsafe { f(ctor, args.as_ptr(), args.len() as i32) }
    }

    pub fn release_handle(handle: Handle) -> BridgeStatus {
        let f = entry().release_handle.expect("ReleaseHandle registered");
        unsafe { f(handle) }
    }

    pub fn get_value(
        instance: Handle,
        member: Handle,
        kind: MemberKind,
    ) -> (BridgeStatus, BridgeValue) {
        let f = entry().get_value.expect("GetValue registered");
        let mut value = BridgeValue::none();
        let status = unsafe { f(instance, member, kind as i32, &mut value) };
        (status, value)
    }

    pub fn set_value(
        instance: Handle,
        member: Handle,
        kind: MemberKind,
        value: BridgeValue,
    ) -> BridgeStatus {
        let f = entry().set_value.expect("SetValue registered");
        let mut value = value;
        unsafe { f(instance, member, kind as i32, &mut value) }
    }

    pub fn call_method(
        instance: Handle,
        method: Handle,
        args: &[BridgeValue],
    ) -> (BridgeStatus, BridgeValue) {
        let f = entry().call_method.expect("CallMethod registered");
        let mut output = BridgeValue::none();
        let count = args.len() as i32;
        let status = unsafe { f(instance, method, args.as_ptr(), count, &mut output) };
        (status, output)
    }

    /// `args` excludes the out slot
    pub fn call_method_out(
        instance: Handle,
        method: Handle,
        args: &[BridgeValue],
    ) -> Option<BridgeValue> {
        let f = entry().call_method_out.expect("CallMethodOut registered");
        let mut slots = args.to_vec();
        slots.push(BridgeValue::none());
        let mut output = BridgeValue::none();
        let count = slots.len() as i32;
        let ok = unsafe { f(instance, method, slots.as_ptr(), count, &mut output) };
        ok.then_some(output)
    }

    /// Read a string value lent by the bridge
    pub fn read_string(value: &BridgeValue) -> String {
        let ptr = value.as_string_ptr().expect("string value");
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    pub fn string(s: &'static CStr) -> BridgeValue {
        unsafe { BridgeValue::string(s.as_ptr()) }
    }
}

// ============================================================================
// Host setup
// ============================================================================

/// Register the proxy class used by lifecycle tests: a `name` field and an
/// `OnMessage(String)` method storing the message in `last_message`.
pub fn register_proxy_type(bridge: &Bridge) -> TypeId {
    bridge
        .register_type(
            TypeBuilder::new("Test.Proxy")
                .field("name", TypeId::STRING)
                .field("last_message", TypeId::STRING)
                .method(
                    MethodDef::new("OnMessage", |this, args| {
                        let this = this.ok_or("no receiver")?;
                        this.set("last_message", args[0].clone())?;
                        Ok(ManagedValue::None)
                    })
                    .param(TypeId::STRING),
                ),
        )
        .unwrap()
}

/// A loaded and initialized bridge over a fresh fake library
pub fn initialized_bridge(options: BridgeOptions) -> Bridge {
    init_logging();
    let mut bridge = Bridge::from_source(Box::new(FakeLibrary::new()), options).unwrap();
    register_proxy_type(&bridge);
    bridge.initialize().unwrap();
    take_events();
    bridge
}

/// A fresh proxy object of the test proxy class
pub fn proxy(bridge: &Bridge, name: &str) -> ponte_bridge::ObjectRef {
    let types = bridge.types();
    let ty = types.lookup("Test.Proxy").unwrap();
    let object = types.get(ty).unwrap().instantiate();
    object.set("name", name).unwrap();
    object
}
