use ponte_bridge::{
    Bridge, BridgeOptions, ConstructorDef, ManagedValue, MethodDef, PropertyDef, TypeBuilder,
    TypeId,
};
use ponte_sdk::{BridgeStatus, BridgeValue, Handle, MemberKind};

use crate::harness::{self, native};

fn register_label_type(bridge: &Bridge) -> TypeId {
    bridge
        .register_type(
            TypeBuilder::new("Game.Label")
                .field("size", TypeId::INT32)
                .field("text", TypeId::STRING)
                .property(
                    PropertyDef::new("Text", TypeId::STRING)
                        .getter(|obj| Ok(obj.get("text").unwrap_or(ManagedValue::None)))
                        .setter(|obj, value| obj.set("text", value)),
                )
                .property(PropertyDef::new("Length", TypeId::INT32).getter(|obj| {
                    let len = obj.get("text").and_then(|v| v.as_str().map(str::len)).unwrap_or(0);
                    Ok(ManagedValue::Int32(len as i32))
                }))
                .method(
                    MethodDef::new("Grow", |this, args| {
                        let this = this.ok_or("no receiver")?;
                        let size = this.get("size").and_then(|v| v.as_i32()).unwrap_or(0);
                        let size = size + args[0].as_i32().unwrap_or(0);
                        this.set("size", size)?;
                        Ok(ManagedValue::Int32(size))
                    })
                    .param(TypeId::INT32)
                    .returns(TypeId::INT32),
                )
                .method(
                    MethodDef::new("TryParse", |_, args| {
                        match args[0].as_str().and_then(|s| s.parse().ok()) {
                            Some(n) => {
                                args[1] = ManagedValue::Int32(n);
                                Ok(ManagedValue::Boolean(true))
                            }
                            None => Ok(ManagedValue::Boolean(false)),
                        }
                    })
                    .param(TypeId::STRING)
                    .out(TypeId::INT32)
                    .as_static(),
                )
                .constructor(ConstructorDef::new(&[TypeId::INT32, TypeId::STRING], |obj, args| {
                    obj.set("size", args[0].clone())?;
                    obj.set("text", args[1].clone())
                })),
        )
        .unwrap()
}

struct Label {
    ty: Handle,
    ctor: Handle,
    size: Handle,
    text: Handle,
}

fn resolve_label() -> Label {
    let ty = native::get_type(c"Game.Label");
    let int32 = native::get_type(c"Int32");
    let string = native::get_type(c"System.String");
    Label {
        ty,
        ctor: native::get_constructor(ty, &[int32, string]),
        size: native::get_member(ty, c"size", MemberKind::Field),
        text: native::get_member(ty, c"Text", MemberKind::Property),
    }
}

fn setup() -> Bridge {
    let bridge = harness::initialized_bridge(BridgeOptions::default());
    register_label_type(&bridge);
    bridge
}

#[test]
fn test_unknown_type_resolves_to_null() {
    let bridge = setup();
    let live = bridge.context().live_handles();
    assert!(native::get_type(c"Foo").is_null());
    assert_eq!(bridge.context().live_handles(), live);
}

#[test]
fn test_resolution_is_stable() {
    let _bridge = setup();
    let first = resolve_label();
    let second = resolve_label();
    assert_eq!(first.ty, second.ty);
    assert_eq!(first.ctor, second.ctor);
    assert_eq!(first.size, second.size);
    assert!(!first.ctor.is_null());
    assert!(native::get_member(first.ty, c"missing", MemberKind::Field).is_null());
    assert!(native::get_constructor(first.ty, &[]).is_null());
}

#[test]
fn test_construct_and_read_back() {
    let _bridge = setup();
    let label = resolve_label();

    let instance = native::construct(label.ctor, &[BridgeValue::i32(42), native::string(c"x")]);
    assert!(!instance.is_null());

    let (status, size) = native::get_value(instance, label.size, MemberKind::Field);
    assert_eq!(status, BridgeStatus::Ok);
    assert_eq!(size.as_i32(), Some(42));

    let (status, text) = native::get_value(instance, label.text, MemberKind::Property);
    assert_eq!(status, BridgeStatus::Ok);
    assert_eq!(native::read_string(&text), "x");
}

#[test]
fn test_construct_with_wrong_arguments() {
    let bridge = setup();
    let label = resolve_label();
    let live = bridge.context().live_handles();

    assert!(native::construct(label.ctor, &[BridgeValue::i32(42)]).is_null());
    assert!(native::construct(label.ctor, &[native::string(c"x"), BridgeValue::i32(42)]).is_null());
    assert_eq!(bridge.context().live_handles(), live);
}

#[test]
fn test_get_value_on_method_is_missing_method() {
    let bridge = setup();
    let label = resolve_label();
    let instance = native::construct(label.ctor, &[BridgeValue::i32(1), native::string(c"a")]);
    let grow = native::get_member(label.ty, c"Grow", MemberKind::Method);
    let live = bridge.context().live_handles();

    let (status, value) = native::get_value(instance, grow, MemberKind::Method);
    assert_eq!(status, BridgeStatus::MissingMethod);
    assert!(value.is_none());

    let ctor_status =
        native::set_value(instance, label.ctor, MemberKind::Constructor, BridgeValue::i32(1));
    assert_eq!(ctor_status, BridgeStatus::MissingMember);
    assert_eq!(bridge.context().live_handles(), live);
}

#[test]
fn test_set_value_type_mismatch_leaves_value() {
    let _bridge = setup();
    let label = resolve_label();
    let instance = native::construct(label.ctor, &[BridgeValue::i32(1), native::string(c"keep")]);

    let status = native::set_value(instance, label.text, MemberKind::Property, BridgeValue::i32(5));
    assert_eq!(status, BridgeStatus::TypeMismatch);

    let (_, text) = native::get_value(instance, label.text, MemberKind::Property);
    assert_eq!(native::read_string(&text), "keep");

    let text = native::string(c"new");
    let status = native::set_value(instance, label.text, MemberKind::Property, text);
    assert_eq!(status, BridgeStatus::Ok);
    let (_, text) = native::get_value(instance, label.text, MemberKind::Property);
    assert_eq!(native::read_string(&text), "new");
}

#[test]
fn test_read_only_property() {
    let _bridge = setup();
    let label = resolve_label();
    let instance = native::construct(label.ctor, &[BridgeValue::i32(1), native::string(c"four")]);
    let length = native::get_member(label.ty, c"Length", MemberKind::Property);

    let (status, value) = native::get_value(instance, length, MemberKind::Property);
    assert_eq!(status, BridgeStatus::Ok);
    assert_eq!(value.as_i32(), Some(4));
    assert_ne!(
        native::set_value(instance, length, MemberKind::Property, BridgeValue::i32(9)),
        BridgeStatus::Ok
    );
}

#[test]
fn test_call_methods() {
    let _bridge = setup();
    let label = resolve_label();
    let instance = native::construct(label.ctor, &[BridgeValue::i32(10), native::string(c"a")]);
    let grow = native::get_member(label.ty, c"Grow", MemberKind::Method);

    let (status, out) = native::call_method(instance, grow, &[BridgeValue::i32(5)]);
    assert_eq!(status, BridgeStatus::Ok);
    assert_eq!(out.as_i32(), Some(15));

    let (status, _) = native::call_method(instance, grow, &[]);
    assert_eq!(status, BridgeStatus::ArityMismatch);

    let parse = native::get_member(label.ty, c"TryParse", MemberKind::Method);
    let parsed = native::call_method_out(Handle::NULL, parse, &[native::string(c"31")]);
    assert_eq!(parsed.and_then(|v| v.as_i32()), Some(31));
    assert!(native::call_method_out(Handle::NULL, parse, &[native::string(c"nope")]).is_none());
}

#[test]
fn test_released_instance_is_invalid() {
    let bridge = setup();
    let label = resolve_label();
    let a = native::construct(label.ctor, &[BridgeValue::i32(1), native::string(c"a")]);
    let b = native::construct(label.ctor, &[BridgeValue::i32(2), native::string(c"b")]);
    assert_ne!(a, b);

    bridge.context().release(a).unwrap();
    let (status, _) = native::get_value(a, label.size, MemberKind::Field);
    assert_eq!(status, BridgeStatus::InvalidHandle);

    // The slot is reused under a new generation
    let c = native::construct(label.ctor, &[BridgeValue::i32(3), native::string(c"c")]);
    assert_ne!(c, a);
    let (status, size) = native::get_value(c, label.size, MemberKind::Field);
    assert_eq!(status, BridgeStatus::Ok);
    assert_eq!(size.as_i32(), Some(3));
    let (status, size) = native::get_value(b, label.size, MemberKind::Field);
    assert_eq!(status, BridgeStatus::Ok);
    assert_eq!(size.as_i32(), Some(2));
}

#[test]
fn test_native_release_makes_handle_stale() {
    let bridge = setup();
    let label = resolve_label();
    let instance = native::construct(label.ctor, &[BridgeValue::i32(5), native::string(c"e")]);
    let live = bridge.context().live_handles();

    assert_eq!(native::release_handle(instance), BridgeStatus::Ok);
    assert_eq!(bridge.context().live_handles(), live - 1);
    let (status, _) = native::get_value(instance, label.size, MemberKind::Field);
    assert_eq!(status, BridgeStatus::InvalidHandle);

    assert_eq!(native::release_handle(instance), BridgeStatus::InvalidHandle);
    assert_eq!(native::release_handle(Handle::NULL), BridgeStatus::InvalidHandle);
}

#[test]
fn test_per_frame_construction_does_not_leak_handles() {
    let mut bridge = setup();
    let label = resolve_label();
    let live = bridge.context().live_handles();

    for frame in 0..100 {
        let args = [BridgeValue::i32(frame), native::string(c"frame")];
        let instance = native::construct(label.ctor, &args);
        let (status, size) = native::get_value(instance, label.size, MemberKind::Field);
        assert_eq!(status, BridgeStatus::Ok);
        assert_eq!(size.as_i32(), Some(frame));
        assert_eq!(native::release_handle(instance), BridgeStatus::Ok);

        bridge.tick().unwrap();
        assert_eq!(bridge.context().live_handles(), live);
    }
}

#[test]
fn test_native_cannot_release_proxy() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let proxy = harness::proxy(&bridge, "Door");
    let id = bridge.spawn("Game.Door", "Door", &proxy).unwrap();
    let handle = bridge.instance(id).unwrap().proxy();

    assert_eq!(native::release_handle(handle), BridgeStatus::InvalidArgument);
    assert!(bridge.context().is_live(handle));
    assert_eq!(bridge.context().named("Door"), Some(handle));

    bridge.destroy(id).unwrap();
    assert!(!bridge.context().is_live(handle));
}

#[test]
fn test_send_message_from_native() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let proxy = harness::proxy(&bridge, "Door");
    bridge.spawn("Game.Door", "Door", &proxy).unwrap();

    native::send_message(c"Door", c"OnMessage", c"open");
    let last_message = proxy.get("last_message").and_then(|v| v.as_str().map(String::from));
    assert_eq!(last_message.as_deref(), Some("open"));

    // Unknown receivers are reported, not fatal
    native::send_message(c"Window", c"OnMessage", c"open");
    bridge.shutdown().unwrap();
}

#[test]
fn test_strings_survive_until_tick_end() {
    let mut bridge = setup();
    let label = resolve_label();
    let instance = native::construct(label.ctor, &[BridgeValue::i32(1), native::string(c"held")]);
    let (_, first) = native::get_value(instance, label.text, MemberKind::Property);
    let (_, second) = native::get_value(instance, label.text, MemberKind::Property);
    assert_eq!(native::read_string(&first), "held");
    assert_eq!(native::read_string(&second), "held");
    bridge.tick().unwrap();
}
