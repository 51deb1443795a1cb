//! End-to-end window scenarios through the public API

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use spectral_core::{ComponentNode, Props, ToolInvocation, UiSpec, codes};
use spectral_runtime::{
    EventOutcome, InMemoryTransport, InstanceRegistry, RenderedKind, RuntimeConfig,
    ToolDispatcher, ToolRequest, VirtualizationConfig, WindowHost,
};
use tokio_test::{assert_err, assert_ok};

const CALCULATOR: &str = r#"{
    "title": "Calculator",
    "layout": "vertical",
    "components": [
        {"type": "text", "id": "display", "props": {"content": "0"}},
        {"type": "container", "id": "keys", "props": {"layout": "grid", "columns": 4}, "children": [
            {"type": "button", "id": "btn-7", "props": {"text": "7"}, "on_event": {"click": "ui.append"}},
            {"type": "button", "id": "btn-plus", "props": {"text": "+"}, "on_event": {"click": "ui.append"}},
            {"type": "button", "id": "btn-2", "props": {"text": "2"}, "on_event": {"click": "ui.append"}},
            {"type": "button", "id": "btn-eq", "props": {"text": "="}, "on_event": {"click": "ui.compute"}},
            {"type": "button", "id": "btn-c", "props": {"text": "C"}, "on_event": {"click": "ui.clear"}}
        ]},
        {"type": "button", "id": "sum", "props": {"text": "Remote add"},
         "onEvent": {"click": {"toolId": "calc.add", "params": {"a": 1, "b": 2}}}},
        {"type": "button", "id": "broken", "props": {"text": "Divide"},
         "onEvent": {"click": {"toolId": "calc.div", "params": {"a": 1, "b": 0}}}},
        {"type": "hologram", "id": "mystery"}
    ],
    "lifecycle_hooks": {"on_mount": {"toolId": "ui.set", "params": {"key": "display", "value": "0"}}}
}"#;

fn calculator_host() -> WindowHost {
    spectral_logging::init_testing();
    WindowHost::new(
        Arc::new(InMemoryTransport::with_calculator()),
        RuntimeConfig::default(),
    )
}

fn params(value: Value) -> Props {
    value.as_object().cloned().unwrap_or_default()
}

fn list_spec(id: &str, count: usize) -> UiSpec {
    let items = (0..count).map(|i| {
        ComponentNode::new(format!("{id}-row-{i}"), "text")
            .with_prop("content", json!(format!("Row {i}")))
    });
    UiSpec::new(
        "vertical",
        vec![ComponentNode::new(id, "list").with_children(items)],
    )
}

// Scenario 1
#[test]
fn test_get_or_create_returns_same_pair() {
    let mut registry = InstanceRegistry::new(Arc::new(InMemoryTransport::with_calculator()));
    let p1 = registry.get_or_create("W1", "calc").unwrap();
    let again = registry.get_or_create("W1", "calc").unwrap();
    assert!(p1.ptr_eq(&again));
}

// Scenario 2
#[test]
fn test_last_write_wins() {
    let mut registry = InstanceRegistry::new(Arc::new(InMemoryTransport::new()));
    let handle = registry.get_or_create("W1", "counter").unwrap();
    handle.state.set("btn1:count", json!(0));
    handle.state.set("btn1:count", json!(1));
    assert_eq!(handle.state.get("btn1:count"), Some(json!(1)));
}

// Scenario 3
#[test]
fn test_list_switchover_at_threshold() {
    let config = RuntimeConfig::default()
        .with_virtualization(VirtualizationConfig::default().with_threshold(30));
    let mut host = WindowHost::new(Arc::new(InMemoryTransport::new()), config);

    let session = host.open("big", "feed", list_spec("feed", 50)).unwrap();
    let output = session.render();
    assert!(matches!(output.roots[0].kind, RenderedKind::VirtualList { .. }));
    assert!(output.roots[0].children.len() < 50);

    let session = host.open("small", "feed", list_spec("feed", 10)).unwrap();
    let output = session.render();
    assert_eq!(output.roots[0].tag(), Some("list"));
    assert_eq!(output.roots[0].children.len(), 10);
}

// Scenario 4
#[tokio::test]
async fn test_execute_then_cleanup() {
    let dispatcher = ToolDispatcher::new(Arc::new(InMemoryTransport::with_calculator()));
    dispatcher.set_app_id("calc").unwrap();

    let result = dispatcher.execute("calc.add", params(json!({"a": 1, "b": 2}))).await;
    assert_eq!(assert_ok!(result), json!(3));

    dispatcher.cleanup();
    let err = assert_err!(dispatcher.execute("calc.add", params(json!({"a": 1, "b": 2}))).await);
    assert!(err.is_disposed());
}

#[test]
fn test_read_your_write_for_many_keys() {
    let mut registry = InstanceRegistry::new(Arc::new(InMemoryTransport::new()));
    let handle = registry.get_or_create("W1", "app").unwrap();
    for i in 0..200 {
        let key = format!("field-{i}:value");
        handle.state.set(key.clone(), json!(i));
        assert_eq!(handle.state.get(&key), Some(json!(i)));
    }
}

#[test]
fn test_lifecycle_reset() {
    let mut host = calculator_host();
    let session = host.open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap()).unwrap();
    session.state().set("display", json!("123"));
    let old = session.handle().clone();

    host.close("W1").unwrap();
    assert!(old.dispatcher.is_disposed());
    assert!(host.close("W1").is_err());

    let session = host.open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap()).unwrap();
    assert!(!session.handle().ptr_eq(&old));
    assert!(session.state().get("display").is_none());
}

#[test]
fn test_open_with_other_app_is_rejected() {
    let mut host = calculator_host();
    host.open("W1", "calc", UiSpec::default()).unwrap();
    assert!(host.open("W1", "notes", UiSpec::default()).is_err());
    assert_eq!(host.session("W1").unwrap().app_id(), "calc");
}

#[tokio::test]
async fn test_calculator_local_tools() {
    let mut host = calculator_host();
    let session = host
        .open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap())
        .unwrap();

    let first = session.render();
    assert!(first.find("mystery").unwrap().is_placeholder());
    assert!(!first.find("btn-7").unwrap().is_placeholder());

    for button in ["btn-7", "btn-plus", "btn-2"] {
        let outcome = session.handle_event(button, "click", None);
        assert!(matches!(outcome, Some(EventOutcome::Local(Ok(_)))));
    }
    assert!(session.dirty_components().contains("display"));

    session.handle_event("btn-eq", "click", None);
    let output = session.render();
    assert_eq!(output.find("display").unwrap().props["content"], json!("9"));
    assert!(!session.needs_render());

    session.handle_event("btn-c", "click", None);
    assert_eq!(session.state().get("display"), Some(json!("0")));
}

#[tokio::test]
async fn test_remote_result_arrives_through_queue() {
    let mut host = calculator_host();
    let session = host
        .open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap())
        .unwrap();
    session.render();

    let outcome = session.handle_event("sum", "click", None);
    assert!(matches!(outcome, Some(EventOutcome::Remote(_))));
    assert_eq!(session.in_flight(), 1);
    // Nothing is written until the window applies its queue
    assert!(session.state().get("sum:result").is_none());

    assert_eq!(session.settle().await, 1);
    assert_eq!(session.state().get("sum:result"), Some(json!(3)));
    assert_eq!(session.in_flight(), 0);
}

#[tokio::test]
async fn test_remote_error_recorded_per_component() {
    let mut host = calculator_host();
    let session = host
        .open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap())
        .unwrap();
    session.render();

    session.handle_event("broken", "click", None);
    session.settle().await;

    let error = session.state().get("broken:error").unwrap();
    assert_eq!(error["code"], json!("DIVISION_BY_ZERO"));
    // Siblings and the rest of the tree are unaffected
    assert!(session.state().get("sum:error").is_none());
    let output = session.render();
    assert!(!output.find("broken").unwrap().is_placeholder());
}

#[test]
fn test_on_mount_fires_once() {
    let mut host = calculator_host();
    let session = host
        .open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap())
        .unwrap();

    session.render();
    assert_eq!(session.state().get("display"), Some(json!("0")));

    session.state().set("display", json!("5"));
    session.render();
    assert_eq!(session.state().get("display"), Some(json!("5")));
}

#[test]
fn test_unbound_event_is_ignored() {
    let mut host = calculator_host();
    let session = host
        .open("W1", "calc", UiSpec::from_json_str(CALCULATOR).unwrap())
        .unwrap();
    session.render();
    assert!(session.handle_event("display", "click", None).is_none());
    assert!(session.handle_event("nope", "click", None).is_none());
}

#[test]
fn test_scroll_to_end_mounts_last_item() {
    let mut host = WindowHost::new(Arc::new(InMemoryTransport::new()), RuntimeConfig::default());
    let session = host.open("W1", "feed", list_spec("feed", 500)).unwrap();

    let output = session.render();
    assert!(output.find("feed-row-0").is_some());
    assert!(output.find("feed-row-499").is_none());

    let mut offset = 0.0;
    loop {
        offset += 1000.0;
        session.scroll("feed", offset);
        assert!(session.dirty_components().contains("feed"));
        let output = session.render();
        if output.find("feed-row-499").is_some() {
            break;
        }
        assert!(offset < 100_000.0, "last row never became visible");
    }

    let window = &session.mount_changes()["feed"];
    assert!(window.mounted.contains(&"feed-row-499".to_string()));
}

#[test]
fn test_visible_items_respect_overscan() {
    let config = RuntimeConfig::default().with_virtualization(
        VirtualizationConfig::default()
            .with_threshold(30)
            .with_item_height(40.0)
            .with_viewport_height(400.0)
            .with_overscan(2),
    );
    let mut host = WindowHost::new(Arc::new(InMemoryTransport::new()), config);
    let session = host.open("W1", "feed", list_spec("feed", 100)).unwrap();

    session.scroll("feed", 800.0);
    let output = session.render();
    let RenderedKind::VirtualList { window } = &output.roots[0].kind else {
        panic!("expected a virtualized list");
    };
    // Rows 20..30 are on screen, two more on each side
    assert_eq!((window.start, window.end), (18, 32));
    assert_eq!(output.roots[0].children.first().unwrap().id, "feed-row-18");
    assert_eq!(output.roots[0].children.last().unwrap().id, "feed-row-31");
}

#[test]
fn test_item_identity_retained_across_scroll() {
    let mut host = WindowHost::new(Arc::new(InMemoryTransport::new()), RuntimeConfig::default());
    let session = host.open("W1", "feed", list_spec("feed", 200)).unwrap();
    session.render();

    session.scroll("feed", 80.0);
    session.render();
    let diff = &session.mount_changes()["feed"];
    assert!(diff.retained.contains(&"feed-row-5".to_string()));
    assert!(diff.unmounted.is_empty());
    assert!(diff.mounted.contains(&"feed-row-16".to_string()));
    assert!(!diff.mounted.contains(&"feed-row-17".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_close_with_call_in_flight() {
    let transport = InMemoryTransport::new();
    transport.register("notes.save", |_request: ToolRequest| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!("saved"))
    });
    let mut host = WindowHost::new(Arc::new(transport), RuntimeConfig::default());

    let spec = UiSpec::new(
        "vertical",
        vec![
            ComponentNode::new("save", "button")
                .with_event("click", ToolInvocation::new("notes.save")),
        ],
    );
    let session = host.open("W1", "notes", spec).unwrap();
    session.render();

    let Some(EventOutcome::Remote(handle)) = session.handle_event("save", "click", None) else {
        panic!("expected a remote call");
    };
    let dispatcher = session.dispatcher().clone();
    while dispatcher.pending_count() == 0 {
        tokio::task::yield_now().await;
    }

    host.close("W1").unwrap();
    let err = handle.outcome().await.unwrap_err();
    assert_eq!(err.code(), codes::DISPOSED);

    let err = dispatcher
        .execute("notes.save", Props::new())
        .await
        .unwrap_err();
    assert!(err.is_disposed());
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(InMemoryTransport::with_calculator())));
    dispatcher.set_app_id("calc").unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            dispatcher.submit(
                ToolInvocation::new("calc.mul").with_params(params(json!({"a": i, "b": 2}))),
                |_, _| {},
            )
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.outcome().await.unwrap(), json!(i * 2));
    }
}

#[test]
fn test_shutdown_disposes_every_window() {
    let mut host = calculator_host();
    let a = host.open("W1", "calc", UiSpec::default()).unwrap().handle().clone();
    let b = host.open("W2", "calc", UiSpec::default()).unwrap().handle().clone();

    assert_eq!(host.shutdown(), 2);
    assert_eq!(host.window_count(), 0);
    assert!(a.dispatcher.is_disposed());
    assert!(b.dispatcher.is_disposed());
}
