use ponte_bridge::{BridgeError, BridgeOptions};

use crate::harness;

#[test]
fn test_spawn_runs_awake_then_enable() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let live = bridge.context().live_handles();
    let proxy = harness::proxy(&bridge, "Enemy");

    let id = bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    assert_eq!(harness::take_events(), vec!["create Game.Enemy#1", "awake #1", "enable #1"]);

    let record = bridge.instance(id).unwrap();
    assert_eq!(record.class_name(), "Game.Enemy");
    assert_eq!(record.name(), "Enemy");
    assert!(record.is_enabled());
    assert!(!record.is_started());
    assert_eq!(bridge.find_instance(record.native()), Some(id));
    assert_eq!(bridge.context().named("Enemy"), Some(record.proxy()));
    assert_eq!(bridge.context().live_handles(), live + 1);
}

#[test]
fn test_tick_order() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let a = harness::proxy(&bridge, "A");
    let b = harness::proxy(&bridge, "B");
    bridge.spawn("Game.Enemy", "A", &a).unwrap();
    bridge.spawn("Game.Enemy", "B", &b).unwrap();
    harness::take_events();

    bridge.tick().unwrap();
    assert_eq!(
        harness::take_events(),
        vec![
            "start #1",
            "start #2",
            "fixed_tick #1",
            "fixed_tick #2",
            "tick #1",
            "tick #2",
            "late_tick #1",
            "late_tick #2",
        ]
    );

    bridge.tick().unwrap();
    assert_eq!(
        harness::take_events(),
        vec!["fixed_tick #1", "fixed_tick #2", "tick #1", "tick #2", "late_tick #1", "late_tick #2"]
    );
    assert_eq!(bridge.stats().frames, 2);
}

#[test]
fn test_fixed_ticks_per_frame() {
    let options = BridgeOptions {
        fixed_ticks_per_frame: 3,
        ..BridgeOptions::default()
    };
    let mut bridge = harness::initialized_bridge(options);
    let proxy = harness::proxy(&bridge, "Enemy");
    bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    bridge.tick().unwrap();
    harness::take_events();

    bridge.tick().unwrap();
    assert_eq!(
        harness::take_events(),
        vec!["fixed_tick #1", "fixed_tick #1", "fixed_tick #1", "tick #1", "late_tick #1"]
    );
}

#[test]
fn test_disabled_instances_skip_frames() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let proxy = harness::proxy(&bridge, "Enemy");
    let id = bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    bridge.set_enabled(id, false).unwrap();
    // Setting the current state again is a no-op
    bridge.set_enabled(id, false).unwrap();
    harness::take_events();

    bridge.tick().unwrap();
    assert!(harness::take_events().is_empty());
    assert!(!bridge.instance(id).unwrap().is_started());

    bridge.set_enabled(id, true).unwrap();
    bridge.tick().unwrap();
    assert_eq!(
        harness::take_events(),
        vec!["enable #1", "start #1", "fixed_tick #1", "tick #1", "late_tick #1"]
    );
}

#[test]
fn test_destroy_order() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let live = bridge.context().live_handles();
    let proxy = harness::proxy(&bridge, "Enemy");
    let id = bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    bridge.tick().unwrap();
    harness::take_events();

    bridge.destroy(id).unwrap();
    assert_eq!(
        harness::take_events(),
        vec!["disable #1", "stop #1", "destroy #1", "destroy_instance #1"]
    );
    assert!(bridge.instance(id).is_none());
    assert_eq!(bridge.context().named("Enemy"), None);
    assert_eq!(bridge.context().live_handles(), live);

    let err = bridge.destroy(id).unwrap_err();
    assert!(matches!(err, BridgeError::UnbalancedLifecycle(_)));
    assert!(harness::take_events().is_empty());
}

#[test]
fn test_destroy_before_start_skips_stop() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let proxy = harness::proxy(&bridge, "Enemy");
    let id = bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    bridge.set_enabled(id, false).unwrap();
    harness::take_events();

    bridge.destroy(id).unwrap();
    assert_eq!(harness::take_events(), vec!["destroy #1", "destroy_instance #1"]);
}

#[test]
fn test_instances_sharing_a_proxy_keep_their_own_handles() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let live = bridge.context().live_handles();
    let proxy = harness::proxy(&bridge, "Player");

    let mover = bridge.spawn("Game.Mover", "Mover", &proxy).unwrap();
    let shooter = bridge.spawn("Game.Shooter", "Shooter", &proxy).unwrap();
    let mover_proxy = bridge.instance(mover).unwrap().proxy();
    let shooter_proxy = bridge.instance(shooter).unwrap().proxy();
    assert_ne!(mover_proxy, shooter_proxy);
    assert_eq!(bridge.context().live_handles(), live + 2);
    harness::take_events();

    bridge.destroy(mover).unwrap();
    assert!(!bridge.context().is_live(mover_proxy));
    assert!(bridge.context().is_live(shooter_proxy));
    let object = bridge.context().resolve_instance(shooter_proxy).unwrap();
    assert!(ponte_bridge::ObjectRef::ptr_eq(&object, &proxy));
    assert_eq!(bridge.context().named("Mover"), None);
    assert_eq!(bridge.context().named("Shooter"), Some(shooter_proxy));

    harness::take_events();
    bridge.tick().unwrap();
    assert_eq!(
        harness::take_events(),
        vec!["start #2", "fixed_tick #2", "tick #2", "late_tick #2"]
    );

    bridge.destroy(shooter).unwrap();
    assert_eq!(bridge.context().live_handles(), live);
}

#[test]
fn test_failed_create_releases_proxy() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let live = bridge.context().live_handles();
    let proxy = harness::proxy(&bridge, "Ghost");

    let err = bridge.spawn("Missing", "Ghost", &proxy).unwrap_err();
    assert!(matches!(err, BridgeError::CreateFailed(ref class) if class == "Missing"));
    assert_eq!(harness::take_events(), vec!["create failed Missing"]);
    assert_eq!(bridge.outstanding_instances(), 0);
    assert_eq!(bridge.context().named("Ghost"), None);
    assert_eq!(bridge.context().live_handles(), live);
}

#[test]
fn test_spawn_before_initialize_fails() {
    harness::init_logging();
    let mut bridge = ponte_bridge::Bridge::from_source(
        Box::new(harness::FakeLibrary::new()),
        BridgeOptions::default(),
    )
    .unwrap();
    harness::register_proxy_type(&bridge);
    let proxy = harness::proxy(&bridge, "Early");

    let err = bridge.spawn("Game.Enemy", "Early", &proxy).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState { .. }));
    assert_eq!(bridge.context().named("Early"), None);
    assert_eq!(harness::instance_counts(), (0, 0, 0));
}

#[test]
fn test_deinitialize_refuses_live_instances() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let proxy = harness::proxy(&bridge, "Enemy");
    let id = bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    harness::take_events();

    let err = bridge.deinitialize().unwrap_err();
    assert!(matches!(err, BridgeError::UnbalancedLifecycle(_)));
    assert!(harness::take_events().is_empty());

    bridge.destroy(id).unwrap();
    bridge.deinitialize().unwrap();
    assert!(bridge.unload().unwrap());
}

#[test]
fn test_shutdown_destroys_leaked_instances() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let a = harness::proxy(&bridge, "A");
    let b = harness::proxy(&bridge, "B");
    bridge.spawn("Game.Enemy", "A", &a).unwrap();
    let second = bridge.spawn("Game.Enemy", "B", &b).unwrap();
    bridge.tick().unwrap();
    bridge.set_enabled(second, false).unwrap();
    harness::take_events();

    assert!(bridge.shutdown().unwrap());
    assert_eq!(
        harness::take_events(),
        vec![
            "disable #1",
            "stop #1",
            "destroy #1",
            "destroy_instance #1",
            "stop #2",
            "destroy #2",
            "destroy_instance #2",
            "DeinitializeNative",
            "unload",
        ]
    );
    assert_eq!(harness::instance_counts(), (2, 2, 0));

    let stats = bridge.stats();
    assert_eq!(stats.created, stats.destroyed);
    assert_eq!(stats.outstanding, 0);
    assert_eq!(stats.live_handles, 0);
}

#[test]
fn test_destroy_requested_from_native_hook() {
    let mut bridge = harness::initialized_bridge(BridgeOptions::default());
    let proxy = harness::proxy(&bridge, "Enemy");
    let id = bridge.spawn("Game.Enemy", "Enemy", &proxy).unwrap();
    let native = bridge.instance(id).unwrap().native();
    let requester = bridge.destroy_requester();
    harness::on_hook(move |hook, _| {
        if hook == "tick" {
            requester.request(native);
        }
    });
    harness::take_events();

    bridge.tick().unwrap();
    assert_eq!(
        harness::take_events(),
        vec![
            "start #1",
            "fixed_tick #1",
            "tick #1",
            "late_tick #1",
            "disable #1",
            "stop #1",
            "destroy #1",
            "destroy_instance #1",
        ]
    );
    assert_eq!(bridge.outstanding_instances(), 0);
}
