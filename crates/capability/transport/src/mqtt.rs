//! MQTT 传输实现（rumqttc）。
//!
//! 连接建立后由后台任务驱动 eventloop：
//! - 收到 Publish 时按主题投递给对应订阅
//! - 收到 SubAck 时按发送顺序唤醒等待中的 `subscribe`

use crate::{IncomingMessage, Qos, Subscription, TransportError, TwinTransport};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// MQTT 连接配置。
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive: Duration,
    /// 等待 ConnAck 的超时。
    pub connect_timeout: Duration,
    /// 等待 SubAck 的超时。
    pub subscribe_timeout: Duration,
    /// 每个订阅的缓冲消息数。
    pub channel_capacity: usize,
}

type SubAckSender = oneshot::Sender<Result<(), TransportError>>;

#[derive(Default)]
struct Shared {
    routes: Mutex<HashMap<String, mpsc::Sender<IncomingMessage>>>,
    pending_subacks: Mutex<VecDeque<SubAckSender>>,
}

impl Shared {
    fn route(&self, topic: String, payload: Vec<u8>) {
        let mut routes = lock(&self.routes);
        let Some(sender) = routes.get(&topic) else {
            debug!(target: "twin.transport", topic = %topic, "mqtt_message_unrouted");
            return;
        };
        match sender.try_send(IncomingMessage {
            topic: topic.clone(),
            payload,
        }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(target: "twin.transport", topic = %topic, "mqtt_message_dropped_full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                routes.remove(&topic);
            }
        }
    }

    fn complete_subscribe(&self, result: Result<(), TransportError>) {
        match lock(&self.pending_subacks).pop_front() {
            Some(waiter) => {
                let _ = waiter.send(result);
            }
            None => debug!(target: "twin.transport", "mqtt_suback_unexpected"),
        }
    }

    fn fail_pending(&self, reason: &str) {
        for waiter in lock(&self.pending_subacks).drain(..) {
            let _ = waiter.send(Err(TransportError::Subscribe(reason.to_string())));
        }
    }
}

/// MQTT 传输。
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    shared: Arc<Shared>,
    subscribe_lock: Arc<tokio::sync::Mutex<()>>,
    subscribe_timeout: Duration,
    channel_capacity: usize,
}

impl MqttTransport {
    /// 连接 broker 并等待 ConnAck，成功后在后台驱动 eventloop。
    pub async fn connect(
        config: MqttTransportConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), TransportError> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = config.username.as_ref() {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        tokio::time::timeout(config.connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "no connack from {}:{} within {:?}",
                    config.host, config.port, config.connect_timeout
                ))
            })??;
        info!(
            target: "twin.transport",
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            "mqtt_connected"
        );

        let shared = Arc::new(Shared::default());
        let handle = tokio::spawn(drive_eventloop(eventloop, shared.clone()));
        Ok((
            Self {
                client,
                shared,
                subscribe_lock: Arc::new(tokio::sync::Mutex::new(())),
                subscribe_timeout: config.subscribe_timeout,
                channel_capacity: config.channel_capacity.max(1),
            },
            handle,
        ))
    }

    /// 主动断开连接。
    pub async fn disconnect(&self) {
        if let Err(err) = self.client.disconnect().await {
            debug!(target: "twin.transport", error = %err, "mqtt_disconnect_failed");
        }
    }

    fn forget_route(&self, topic: &str) {
        lock(&self.shared.routes).remove(topic);
    }
}

#[async_trait]
impl TwinTransport for MqttTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        debug!(
            target: "twin.transport",
            topic = %topic,
            payload_size = payload.len(),
            "mqtt_publish"
        );
        self.client
            .publish(topic, qos_to_mqtt(qos), retain, payload)
            .await
            .map_err(|err| TransportError::Publish(err.to_string()))
    }

    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<Subscription, TransportError> {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            // 等待队列的顺序必须与 SUBSCRIBE 的发送顺序一致。
            let _guard = self.subscribe_lock.lock().await;
            lock(&self.shared.routes).insert(topic.to_string(), sender);
            lock(&self.shared.pending_subacks).push_back(ack_tx);
            if let Err(err) = self.client.subscribe(topic, qos_to_mqtt(qos)).await {
                lock(&self.shared.pending_subacks).pop_back();
                self.forget_route(topic);
                return Err(TransportError::Subscribe(err.to_string()));
            }
        }

        match tokio::time::timeout(self.subscribe_timeout, ack_rx).await {
            Ok(Ok(Ok(()))) => {
                debug!(target: "twin.transport", topic = %topic, "mqtt_subscribed");
                Ok(Subscription::new(topic, receiver))
            }
            Ok(Ok(Err(err))) => {
                self.forget_route(topic);
                Err(err)
            }
            Ok(Err(_)) => {
                self.forget_route(topic);
                Err(TransportError::Closed)
            }
            Err(_) => {
                self.forget_route(topic);
                Err(TransportError::Timeout(format!("suback for {}", topic)))
            }
        }
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.forget_route(topic);
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|err| TransportError::Subscribe(err.to_string()))
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(TransportError::Connect(err.to_string())),
        }
    }
}

async fn drive_eventloop(mut eventloop: EventLoop, shared: Arc<Shared>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                shared.route(publish.topic, publish.payload.to_vec());
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                let rejected = suback
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                if rejected {
                    shared.complete_subscribe(Err(TransportError::Subscribe(
                        "subscription rejected by broker".to_string(),
                    )));
                } else {
                    shared.complete_subscribe(Ok(()));
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "twin.transport", error = %err, "mqtt_eventloop_error");
                shared.fail_pending(&err.to_string());
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn qos_to_mqtt(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_maps_to_mqtt_levels() {
        assert_eq!(qos_to_mqtt(Qos::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(qos_to_mqtt(Qos::from_u8(1)), QoS::AtLeastOnce);
        assert_eq!(qos_to_mqtt(Qos::from_u8(2)), QoS::ExactlyOnce);
        assert_eq!(qos_to_mqtt(Qos::from_u8(9)), QoS::AtMostOnce);
    }

    #[tokio::test]
    async fn suback_wakes_waiters_in_order() {
        let shared = Shared::default();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        lock(&shared.pending_subacks).push_back(first_tx);
        lock(&shared.pending_subacks).push_back(second_tx);

        shared.complete_subscribe(Ok(()));
        shared.complete_subscribe(Err(TransportError::Subscribe("rejected".to_string())));

        assert!(first_rx.await.expect("first").is_ok());
        assert!(second_rx.await.expect("second").is_err());
    }

    #[tokio::test]
    async fn route_delivers_by_exact_topic() {
        let shared = Shared::default();
        let (sender, mut receiver) = mpsc::channel(4);
        lock(&shared.routes).insert("a/b".to_string(), sender);

        shared.route("a/b".to_string(), b"hello".to_vec());
        shared.route("a/c".to_string(), b"ignored".to_vec());

        let message = receiver.recv().await.expect("message");
        assert_eq!(message.topic, "a/b");
        assert_eq!(message.payload, b"hello");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn route_forgets_closed_subscription() {
        let shared = Shared::default();
        let (sender, receiver) = mpsc::channel(1);
        lock(&shared.routes).insert("a/b".to_string(), sender);
        drop(receiver);

        shared.route("a/b".to_string(), b"late".to_vec());
        assert!(lock(&shared.routes).is_empty());
    }
}
