//! Registry behavior: registration, subscription tracking, dispatch and
//! fan-out.

mod common;

use common::{drain_events, CounterModule, Harness};
use modhub::channel::{CALL_CHANNEL, SUBSCRIBE_CHANNEL, UNSUBSCRIBE_CHANNEL};
use modhub::{CallError, Module, RegistryError, UiProcessHandle};
use serde_json::{json, Value};

#[tokio::test]
async fn duplicate_module_id_is_rejected_and_not_registered() {
    let harness = Harness::new();
    let first = CounterModule::new("x");
    let second = CounterModule::new("x");

    harness.registry.use_module(first.clone()).unwrap();
    let err = harness.registry.use_module(second.clone()).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateModule(id) if id == "x"));

    // The first registration is still the one the registry resolves.
    harness.registry.setup().await.unwrap();
    first.foo.set(42);
    let resolved = harness
        .registry
        .get_module::<CounterModule>("x")
        .unwrap();
    assert_eq!(resolved.foo.get(), 42);
    assert_eq!(second.foo.get(), 0);
}

#[tokio::test]
async fn get_module_distinguishes_unknown_from_mismatch() {
    let harness = Harness::new();
    harness.registry.use_module(CounterModule::new("x")).unwrap();

    assert!(matches!(
        harness.registry.get_module::<CounterModule>("y"),
        Err(RegistryError::UnknownModule(_))
    ));
    assert!(harness.registry.has_module("x"));
    assert!(!harness.registry.has_module("y"));
}

#[tokio::test]
async fn subscribe_to_unknown_module_is_rejected() {
    let harness = Harness::new();
    harness.registry.setup().await.unwrap();

    let _rx = harness.transport.attach_ui(UiProcessHandle(1));
    let err = harness
        .transport
        .call(UiProcessHandle(1), SUBSCRIBE_CHANNEL, vec![json!("ghost")])
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::UnknownModule(id) if id == "ghost"));
}

#[tokio::test]
async fn destruction_notification_purges_subscriber_without_unsubscribe() {
    let harness = Harness::new();
    harness.registry.use_module(CounterModule::new("x")).unwrap();
    harness.registry.setup().await.unwrap();

    let _rx = harness.transport.attach_ui(UiProcessHandle(7));
    harness
        .transport
        .call(UiProcessHandle(7), SUBSCRIBE_CHANNEL, vec![json!("x")])
        .await
        .unwrap();
    assert_eq!(
        harness.registry.subscribers("x").unwrap(),
        vec![UiProcessHandle(7)]
    );

    harness.transport.destroy_ui(UiProcessHandle(7));
    assert!(harness.registry.subscribers("x").unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribe_of_absent_handle_is_a_noop() {
    let harness = Harness::new();
    harness.registry.use_module(CounterModule::new("x")).unwrap();
    harness.registry.setup().await.unwrap();

    let _rx = harness.transport.attach_ui(UiProcessHandle(3));
    let result = harness
        .transport
        .call(UiProcessHandle(3), UNSUBSCRIBE_CHANNEL, vec![json!("x")])
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn fan_out_reaches_only_subscribers_of_the_module() {
    let harness = Harness::new();
    harness.registry.use_module(CounterModule::new("a")).unwrap();
    harness.registry.use_module(CounterModule::new("b")).unwrap();
    harness.registry.setup().await.unwrap();

    let mut rx_a = harness.transport.attach_ui(UiProcessHandle(1));
    let mut rx_b = harness.transport.attach_ui(UiProcessHandle(2));
    harness
        .transport
        .call(UiProcessHandle(1), SUBSCRIBE_CHANNEL, vec![json!("a")])
        .await
        .unwrap();
    harness
        .transport
        .call(UiProcessHandle(2), SUBSCRIBE_CHANNEL, vec![json!("b")])
        .await
        .unwrap();

    harness
        .registry
        .send_event("a", "something-happened", vec![json!(1)])
        .unwrap();

    let events_a = drain_events(&mut rx_a);
    assert_eq!(events_a.len(), 1);
    assert_eq!(events_a[0].module_id, "a");
    assert_eq!(events_a[0].event, "something-happened");
    assert!(drain_events(&mut rx_b).is_empty());
}

// End-to-end scenario: register "x", subscribe handle 7, mutate the
// observed field 0 -> 1, expect exactly one update-getter/foo event.
#[tokio::test]
async fn mutation_pushes_exactly_one_update_to_the_subscriber() {
    let harness = Harness::new();
    let module = CounterModule::new("x");
    harness.registry.use_module(module.clone()).unwrap();
    harness.registry.setup().await.unwrap();

    let mut rx = harness.transport.attach_ui(UiProcessHandle(7));
    harness
        .transport
        .call(UiProcessHandle(7), SUBSCRIBE_CHANNEL, vec![json!("x")])
        .await
        .unwrap();

    module.foo.set(1);

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].module_id, "x");
    assert_eq!(events[0].event, "update-getter/foo");
    assert_eq!(events[0].args, vec![json!(1)]);

    // Pull channel agrees.
    let value = harness
        .transport
        .call(UiProcessHandle(7), CALL_CHANNEL, vec![json!("x"), json!("get-getter/foo")])
        .await
        .unwrap();
    assert_eq!(value, json!(1));
}

// Generic invoke is best-effort; direct dispatch is strict.
#[tokio::test]
async fn invoke_is_lenient_where_dispatch_call_is_strict() {
    let harness = Harness::new();
    let module = CounterModule::new("x");
    harness.registry.use_module(module.clone()).unwrap();
    harness.registry.setup().await.unwrap();

    let _rx = harness.transport.attach_ui(UiProcessHandle(1));

    // Unknown module and unknown method both resolve to null.
    let value = harness
        .transport
        .call(
            UiProcessHandle(1),
            CALL_CHANNEL,
            vec![json!("ghost"), json!("anything")],
        )
        .await
        .unwrap();
    assert_eq!(value, Value::Null);

    let value = harness
        .transport
        .call(
            UiProcessHandle(1),
            CALL_CHANNEL,
            vec![json!("x"), json!("unknownMethod")],
        )
        .await
        .unwrap();
    assert_eq!(value, Value::Null);

    // A real method still round-trips.
    let value = harness
        .transport
        .call(
            UiProcessHandle(1),
            CALL_CHANNEL,
            vec![json!("x"), json!("echo"), json!("hi")],
        )
        .await
        .unwrap();
    assert_eq!(value, json!("hi"));

    let err = module
        .runtime()
        .dispatch_call("unknownMethod", vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::UnknownMethod { .. }));
}

#[tokio::test]
async fn disposing_a_module_twice_is_a_noop() {
    let harness = Harness::new();
    let module = CounterModule::new("x");
    harness.registry.use_module(module.clone()).unwrap();
    harness.registry.setup().await.unwrap();

    module.dispose().await.unwrap();
    module.dispose().await.unwrap();

    // Registry-level dispose after module-level dispose is also fine.
    harness.registry.dispose().await;
    harness.registry.dispose().await;
}

#[tokio::test]
async fn registering_the_same_module_value_twice_fails_on_attachment() {
    let first = Harness::new();
    let second = Harness::new();
    let module = CounterModule::new("x");

    first.registry.use_module(module.clone()).unwrap();
    let err = second.registry.use_module(module).unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyAttached(_)));
}

// A send racing ahead of the destruction notification purges the stale
// handle instead of failing the sender.
#[tokio::test]
async fn stale_subscriber_is_purged_on_send() {
    let harness = Harness::new();
    harness.registry.use_module(CounterModule::new("x")).unwrap();
    harness.registry.setup().await.unwrap();

    let _rx = harness.transport.attach_ui(UiProcessHandle(5));
    harness
        .transport
        .call(UiProcessHandle(5), SUBSCRIBE_CHANNEL, vec![json!("x")])
        .await
        .unwrap();

    // Mailbox vanishes without the destruction hook firing.
    harness.transport.drop_mailbox(UiProcessHandle(5));

    harness
        .registry
        .send_event("x", "tick", vec![])
        .unwrap();
    assert!(harness.registry.subscribers("x").unwrap().is_empty());
}

#[tokio::test]
async fn events_after_registry_dispose_stop_flowing() {
    let harness = Harness::new();
    let module = CounterModule::new("x");
    harness.registry.use_module(module.clone()).unwrap();
    harness.registry.setup().await.unwrap();

    let mut rx = harness.transport.attach_ui(UiProcessHandle(1));
    harness
        .transport
        .call(UiProcessHandle(1), SUBSCRIBE_CHANNEL, vec![json!("x")])
        .await
        .unwrap();

    harness.registry.dispose().await;
    module.foo.set(9);
    assert!(drain_events(&mut rx).is_empty());

    // Standing channels are gone too.
    let err = harness
        .transport
        .call(UiProcessHandle(1), SUBSCRIBE_CHANNEL, vec![json!("x")])
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::UnknownChannel(_)));
}
