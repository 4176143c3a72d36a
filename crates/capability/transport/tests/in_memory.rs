use twin_transport::{InMemoryTransport, Qos, TransportError, TransportEvent, TwinTransport};

#[tokio::test]
async fn loopback_delivers_to_subscriber() {
    let transport = InMemoryTransport::new();
    let mut subscription = transport
        .subscribe("dev/result", Qos::AtMostOnce)
        .await
        .expect("subscribe");
    assert_eq!(subscription.topic(), "dev/result");

    transport
        .publish("dev/result", b"reply".to_vec(), Qos::AtMostOnce, false)
        .await
        .expect("publish");

    let message = subscription.recv().await.expect("message");
    assert_eq!(message.topic, "dev/result");
    assert_eq!(message.payload, b"reply");
}

#[tokio::test]
async fn events_are_recorded_in_order() {
    let transport = InMemoryTransport::new();
    let _subscription = transport
        .subscribe("a", Qos::AtMostOnce)
        .await
        .expect("subscribe");
    transport
        .publish("b", b"x".to_vec(), Qos::AtLeastOnce, false)
        .await
        .expect("publish");
    transport.unsubscribe("a").await.expect("unsubscribe");

    assert_eq!(
        transport.events(),
        vec![
            TransportEvent::Subscribed("a".to_string()),
            TransportEvent::Published {
                topic: "b".to_string(),
                payload: b"x".to_vec(),
                qos: Qos::AtLeastOnce,
                retain: false,
            },
            TransportEvent::Unsubscribed("a".to_string()),
        ]
    );
    assert_eq!(transport.published_to("b"), vec![b"x".to_vec()]);
}

#[tokio::test]
async fn unsubscribe_closes_subscription() {
    let transport = InMemoryTransport::new();
    let mut subscription = transport
        .subscribe("a", Qos::AtMostOnce)
        .await
        .expect("subscribe");
    transport.unsubscribe("a").await.expect("unsubscribe");
    transport
        .publish("a", b"late".to_vec(), Qos::AtMostOnce, false)
        .await
        .expect("publish");
    assert!(subscription.recv().await.is_none());
}

#[tokio::test]
async fn forced_publish_failure_is_not_recorded() {
    let transport = InMemoryTransport::new();
    transport.fail_publishes_to("a");
    let err = transport
        .publish("a", b"x".to_vec(), Qos::AtMostOnce, false)
        .await
        .expect_err("forced");
    assert!(matches!(err, TransportError::Publish(_)));
    assert!(transport.events().is_empty());
}
