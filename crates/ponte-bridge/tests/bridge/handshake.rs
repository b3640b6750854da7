use std::cell::Cell;
use std::rc::Rc;

use ponte_bridge::{Bridge, BridgeError, BridgeOptions, LoadError, RegistryState};
use ponte_sdk::BridgeStatus;

use crate::harness::{self, native, FakeLibrary};

const HANDSHAKE: [&str; 11] = [
    "SetDebugLogMethod",
    "SetSendMessageMethod",
    "SetGetTypePtrMethod",
    "SetGetConstructorPtrMethod",
    "SetGetMemberPtrMethod",
    "SetConstructorMethod",
    "SetReleaseHandleMethod",
    "SetGetSetValueMethod",
    "SetCallMethodMethod",
    "SetCallMethodOutMethod",
    "InitializeNative",
];

#[test]
fn test_handshake_order() {
    harness::init_logging();
    let library = Box::new(FakeLibrary::new());
    let mut bridge = Bridge::from_source(library, BridgeOptions::default()).unwrap();
    assert_eq!(bridge.state(), RegistryState::Unregistered);

    bridge.initialize().unwrap();
    assert_eq!(bridge.state(), RegistryState::Initialized);
    assert_eq!(harness::take_events(), HANDSHAKE);

    assert!(bridge.shutdown().unwrap());
    assert_eq!(harness::take_events(), vec!["DeinitializeNative", "unload"]);
    assert!(!bridge.is_loaded());
}

#[test]
fn test_handshake_without_handle_release() {
    harness::init_logging();
    let library = FakeLibrary::new().without("SetReleaseHandleMethod");
    let mut bridge = Bridge::from_source(Box::new(library), BridgeOptions::default()).unwrap();

    bridge.initialize().unwrap();
    assert_eq!(bridge.state(), RegistryState::Initialized);
    let events = harness::take_events();
    assert!(!events.iter().any(|e| e == "SetReleaseHandleMethod"));
    assert_eq!(events.len(), HANDSHAKE.len() - 1);
    assert!(native::entry().release_handle.is_none());
}

#[test]
fn test_missing_export_aborts_handshake() {
    harness::init_logging();
    let library = FakeLibrary::new().without("SetGetSetValueMethod");
    let mut bridge = Bridge::from_source(Box::new(library), BridgeOptions::default()).unwrap();

    let err = bridge.initialize().unwrap_err();
    match &err {
        BridgeError::Load(LoadError::SymbolNotFound { symbol, .. }) => {
            assert_eq!(symbol, "SetGetSetValueMethod")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(bridge.state(), RegistryState::TypeOpsRegistered);

    let events = harness::take_events();
    assert_eq!(events, HANDSHAKE[..7]);
    assert!(!events.iter().any(|e| e == "InitializeNative"));

    // Never initialized, so there is nothing to deinitialize
    assert!(bridge.shutdown().unwrap());
    assert_eq!(harness::take_events(), vec!["unload"]);
}

#[test]
fn test_missing_hook_aborts_before_type_ops() {
    harness::init_logging();
    let library = FakeLibrary::new().without("CallLateTick");
    let mut bridge = Bridge::from_source(Box::new(library), BridgeOptions::default()).unwrap();

    assert!(bridge.initialize().is_err());
    assert_eq!(bridge.state(), RegistryState::Unregistered);
    assert_eq!(harness::take_events(), HANDSHAKE[..2]);
}

#[test]
fn test_initialize_twice_is_rejected() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let err = bridge.initialize().unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState { .. }));
    assert!(harness::take_events().is_empty());
}

#[test]
fn test_native_calls_back_during_initialize() {
    harness::init_logging();
    let bridge_library = FakeLibrary::new();
    let resolved = Rc::new(Cell::new(false));
    let seen = resolved.clone();
    harness::on_initialize(move || {
        native::debug_log(c"native library starting");
        let ty = native::get_type(c"Test.Proxy");
        seen.set(!ty.is_null());
    });

    let library = Box::new(bridge_library);
    let mut bridge = Bridge::from_source(library, BridgeOptions::default()).unwrap();
    harness::register_proxy_type(&bridge);
    bridge.initialize().unwrap();
    assert!(resolved.get());
}

#[test]
fn test_unload_requires_deinitialize() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let err = bridge.unload().unwrap_err();
    assert!(matches!(
        err,
        BridgeError::InvalidState {
            actual: RegistryState::Initialized,
            ..
        }
    ));
    assert!(bridge.is_loaded());

    bridge.deinitialize().unwrap();
    assert_eq!(bridge.state(), RegistryState::Deinitialized);
    assert!(bridge.unload().unwrap());
    assert_eq!(harness::take_events(), vec!["DeinitializeNative", "unload"]);
}

#[test]
fn test_entry_points_inert_after_unload() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let entry = native::entry();
    bridge.shutdown().unwrap();

    let get_type = entry.get_type.unwrap();
    let handle = unsafe { get_type(c"Test.Proxy".as_ptr()) };
    assert!(handle.is_null());

    let get_value = entry.get_value.unwrap();
    let mut out = ponte_sdk::BridgeValue::none();
    let null = ponte_sdk::Handle::NULL;
    let status = unsafe { get_value(null, null, 0, &mut out) };
    assert_eq!(status, BridgeStatus::NoContext);
}

#[test]
fn test_one_bridge_per_thread() {
    let mut first = harness::initialized_bridge(BridgeOptions::default());
    let library = Box::new(FakeLibrary::new());
    let err = Bridge::from_source(library, BridgeOptions::default()).unwrap_err();
    assert!(matches!(err, BridgeError::ContextBusy));

    first.shutdown().unwrap();
    let mut second = harness::initialized_bridge(BridgeOptions::default());
    assert_eq!(second.state(), RegistryState::Initialized);
    second.shutdown().unwrap();
}

#[test]
fn test_drop_tears_down() {
    {
        let _bridge = harness::initialized_bridge(BridgeOptions::default());
    }
    assert_eq!(harness::events(), vec!["DeinitializeNative", "unload"]);
}
