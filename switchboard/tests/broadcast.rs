//! Broadcast and domain-event scenarios: every subscriber sees every message,
//! and the event adapter composes with router traffic on the same transport.

use switchboard::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn connected() -> Arc<MemoryTransport> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let transport = Arc::new(MemoryTransport::new());
    transport.connect().await.unwrap();
    transport
}

#[tokio::test]
async fn every_subscriber_receives_the_payload_unchanged() {
    let transport = connected().await;
    let (tx, mut rx) = mpsc::channel(8);

    for tag in 0..3 {
        let tx = tx.clone();
        transport
            .subscribe(
                "workout.created",
                subscriber(move |envelope: Envelope| {
                    let tx = tx.clone();
                    async move {
                        tx.send((tag, envelope.payload)).await.ok();
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();
    }

    let payload = json!({"workoutId": 7, "athlete": "alice"});
    transport
        .send(
            "workout.created",
            Envelope::new("workout.created", payload.clone()),
            SendOptions::default(),
        )
        .await
        .unwrap();

    for expected_tag in 0..3 {
        let (tag, seen) = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tag, expected_tag);
        assert_eq!(seen, payload);
    }
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

#[tokio::test]
async fn router_and_event_listener_share_a_channel() {
    let transport = connected().await;
    let (event_tx, mut event_rx) = mpsc::channel(1);

    // A router answers requests on the channel; an unrelated event listener
    // observes the same traffic. Broadcast means both run.
    let mut router = Router::new(transport.clone());
    router.register("workout.create", |payload: Value| async move {
        Ok(json!({"id": 1, "echo": payload}))
    });
    router.listen().await.unwrap();

    let bus = EventBus::new(transport.clone());
    bus.subscribe("workout.create", move |seen: Value| {
        let event_tx = event_tx.clone();
        async move {
            event_tx.send(seen).await.ok();
        }
    })
    .await
    .unwrap();

    let client = ServiceClient::new(transport.clone());
    let created: Value = client
        .call("workout.create", &json!({"reps": 12}))
        .await
        .unwrap();
    assert_eq!(created["id"], 1);

    let observed = timeout(Duration::from_secs(1), event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(observed, json!({"reps": 12}));
}

#[tokio::test]
async fn typed_events_flow_between_modules() {
    let transport = connected().await;
    let bus = EventBus::new(transport.clone());
    let (tx, mut rx) = mpsc::channel(2);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PlanArchived {
        plan_id: u64,
    }

    bus.subscribe("plan.archived", move |event: PlanArchived| {
        let tx = tx.clone();
        async move {
            tx.send(event).await.ok();
        }
    })
    .await
    .unwrap();

    bus.publish("plan.archived", &PlanArchived { plan_id: 42 })
        .await
        .unwrap();

    assert_eq!(
        timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap(),
        PlanArchived { plan_id: 42 }
    );
}

#[tokio::test]
async fn unsubscribed_channel_goes_quiet() {
    let transport = connected().await;
    let (tx, mut rx) = mpsc::channel(2);

    transport
        .subscribe(
            "media.uploaded",
            subscriber(move |_| {
                let tx = tx.clone();
                async move {
                    tx.send(()).await.ok();
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();

    transport.unsubscribe("media.uploaded").await.unwrap();
    transport
        .send(
            "media.uploaded",
            Envelope::new("media.uploaded", json!(null)),
            SendOptions::default(),
        )
        .await
        .unwrap();

    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}
