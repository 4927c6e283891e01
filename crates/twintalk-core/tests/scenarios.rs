//! End-to-end scenarios for the ingest → evaluate → save/update pipeline,
//! driven entirely through `IngestionDispatcher`/`TwinsService` the way a
//! broker subscription and the CRUD façade would.

use std::sync::Arc;
use twintalk_core::{
    build_in_memory, Attribute, BusMessage, Config, Definition, IdentityClient, StandaloneIdentity,
    TwinFilter, Value,
};

fn config() -> Config {
    Config {
        notification_channel: None,
        broker_url: "mem://".to_string(),
        identity_url: "mem://".to_string(),
        identity_timeout: std::time::Duration::from_secs(1),
        cache_url: None,
        registry_url: None,
        http_port: 0,
        standalone_email: None,
        standalone_token: None,
    }
}

fn attr(name: &str, channel: &str, subtopic: &str) -> Attribute {
    Attribute {
        name: name.to_string(),
        channel: channel.to_string(),
        subtopic: subtopic.to_string(),
        persist_state: true,
    }
}

fn senml(channel: &str, subtopic: &str, base_name: &str, base_time: f64, time: f64, value: f64) -> BusMessage {
    BusMessage {
        channel: channel.to_string(),
        subtopic: subtopic.to_string(),
        publisher: "sensor".to_string(),
        payload: serde_json::json!([{"bn": base_name, "bt": base_time, "t": time, "v": value}]),
    }
}

fn identity() -> Arc<dyn IdentityClient> {
    Arc::new(StandaloneIdentity::new("a@example.com", "secret"))
}

#[tokio::test]
async fn s1_first_sample_saves_state_zero() {
    let handles = build_in_memory(&config(), identity());
    let twin = handles
        .service
        .add_twin("secret", None, "sensor".to_string(), serde_json::json!({}), Definition::new(0, vec![attr("t", "a", "x")]))
        .await
        .unwrap();

    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 1.0)).await.unwrap();

    let page = handles.service.list_states("secret", None, None, &twin.id).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, 0);
    assert_eq!(page.items[0].payload.get("t"), Some(&Value::from(1.0)));
}

#[tokio::test]
async fn s2_samples_within_delta_update_in_place() {
    let handles = build_in_memory(&config(), identity());
    let twin = handles
        .service
        .add_twin(
            "secret",
            None,
            "sensor".to_string(),
            serde_json::json!({}),
            Definition::new(0, vec![attr("t", "a", "x")]).with_delta_ns(1_000_000),
        )
        .await
        .unwrap();

    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 1.0)).await.unwrap();
    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 2.0)).await.unwrap();
    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 3.0)).await.unwrap();

    let page = handles.service.list_states("secret", None, None, &twin.id).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, 0);
    assert_eq!(page.items[0].payload.get("t"), Some(&Value::from(3.0)));
}

#[tokio::test]
async fn s3_sample_past_delta_saves_a_new_state() {
    let handles = build_in_memory(&config(), identity());
    let twin = handles
        .service
        .add_twin(
            "secret",
            None,
            "sensor".to_string(),
            serde_json::json!({}),
            Definition::new(0, vec![attr("t", "a", "x")]).with_delta_ns(1_000_000),
        )
        .await
        .unwrap();

    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 1.0)).await.unwrap();
    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 2.0)).await.unwrap();
    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 3.0)).await.unwrap();
    handles
        .dispatcher
        .dispatch(senml("a", "x", "t", 1_700_000_000.0, 0.0, 4.0))
        .await
        .unwrap();

    let page = handles.service.list_states("secret", None, None, &twin.id).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, 0);
    assert_eq!(page.items[0].payload.get("t"), Some(&Value::from(3.0)));
    assert_eq!(page.items[1].id, 1);
    assert_eq!(page.items[1].payload.get("t"), Some(&Value::from(4.0)));
    assert_eq!(page.items[1].created.timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn s4_definition_change_prunes_dropped_attributes() {
    let handles = build_in_memory(&config(), identity());
    let twin = handles
        .service
        .add_twin("secret", None, "sensor".to_string(), serde_json::json!({}), Definition::new(0, vec![attr("t", "a", "x")]))
        .await
        .unwrap();

    handles.dispatcher.dispatch(senml("a", "x", "t", 0.0, 0.0, 1.0)).await.unwrap();

    handles
        .service
        .update_twin("secret", &twin.id, None, None, Some(Definition::new(0, vec![attr("u", "a", "x")])))
        .await
        .unwrap();

    handles
        .dispatcher
        .dispatch(BusMessage {
            channel: "a".to_string(),
            subtopic: "x".to_string(),
            publisher: "sensor".to_string(),
            payload: serde_json::json!([{"bn": "u", "bt": 1_700_000_001.0, "t": 0.0, "vs": "hot"}]),
        })
        .await
        .unwrap();

    let page = handles.service.list_states("secret", None, None, &twin.id).await.unwrap();
    assert_eq!(page.items.len(), 2);
    let latest = &page.items[1];
    assert_eq!(latest.id, 1);
    assert_eq!(latest.definition, 1);
    assert_eq!(latest.payload.get("u"), Some(&Value::String("hot".to_string())));
    assert!(!latest.payload.contains_key("t"));
}

#[tokio::test]
async fn s5_wildcard_subtopic_matches_any_subtopic_on_channel() {
    let handles = build_in_memory(&config(), identity());
    let twin = handles
        .service
        .add_twin("secret", None, "sensor".to_string(), serde_json::json!({}), Definition::new(0, vec![attr("t", "a", ">")]))
        .await
        .unwrap();

    handles
        .dispatcher
        .dispatch(senml("a", "engine/temp", "t", 0.0, 0.0, 42.0))
        .await
        .unwrap();

    let page = handles.service.list_states("secret", None, None, &twin.id).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].payload.get("t"), Some(&Value::from(42.0)));
}

#[tokio::test]
async fn s6_notification_channel_messages_bypass_ingestion() {
    let mut cfg = config();
    cfg.notification_channel = Some("N".to_string());
    let handles = build_in_memory(&cfg, identity());

    handles
        .service
        .add_twin("secret", None, "sensor".to_string(), serde_json::json!({}), Definition::new(0, vec![attr("t", "N", "x")]))
        .await
        .unwrap();

    let result = handles
        .dispatcher
        .dispatch(BusMessage {
            channel: "N".to_string(),
            subtopic: "x".to_string(),
            publisher: "system".to_string(),
            payload: serde_json::json!("not even a valid senml array"),
        })
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn ingest_for_unregistered_subtopic_is_silently_dropped() {
    let handles = build_in_memory(&config(), identity());
    handles
        .service
        .add_twin("secret", None, "sensor".to_string(), serde_json::json!({}), Definition::new(0, vec![attr("t", "a", "x")]))
        .await
        .unwrap();

    let result = handles.dispatcher.dispatch(senml("a", "unrelated", "t", 0.0, 0.0, 1.0)).await;
    assert!(result.is_ok());

    let page = handles
        .service
        .list_twins("secret", None, None, TwinFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}
