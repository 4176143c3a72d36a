//! 进程内回环总线（用于测试与接线）。

use crate::{IncomingMessage, Qos, Subscription, TransportError, TwinTransport};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// 总线上发生过的操作，按发生顺序记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Subscribed(String),
    Unsubscribed(String),
    Published {
        topic: String,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    },
}

pub struct InMemoryTransport {
    routes: Mutex<HashMap<String, mpsc::Sender<IncomingMessage>>>,
    events: Mutex<Vec<TransportEvent>>,
    failing_topics: Mutex<HashSet<String>>,
    capacity: usize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            failing_topics: Mutex::new(HashSet::new()),
            capacity: capacity.max(1),
        }
    }

    /// 之后发布到该主题的消息都返回 `TransportError::Publish`。
    pub fn fail_publishes_to(&self, topic: impl Into<String>) {
        lock(&self.failing_topics).insert(topic.into());
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        lock(&self.events).clone()
    }

    /// 成功发布到指定主题的负载。
    pub fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Published {
                    topic: published, payload, ..
                } if published == topic => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: TransportEvent) {
        lock(&self.events).push(event);
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TwinTransport for InMemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        if lock(&self.failing_topics).contains(topic) {
            return Err(TransportError::Publish(format!("forced failure on {}", topic)));
        }
        self.record(TransportEvent::Published {
            topic: topic.to_string(),
            payload: payload.clone(),
            qos,
            retain,
        });
        let mut routes = lock(&self.routes);
        if let Some(sender) = routes.get(topic) {
            let message = IncomingMessage {
                topic: topic.to_string(),
                payload,
            };
            if let Err(mpsc::error::TrySendError::Closed(_)) = sender.try_send(message) {
                routes.remove(topic);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: Qos) -> Result<Subscription, TransportError> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        lock(&self.routes).insert(topic.to_string(), sender);
        self.record(TransportEvent::Subscribed(topic.to_string()));
        Ok(Subscription::new(topic, receiver))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        lock(&self.routes).remove(topic);
        self.record(TransportEvent::Unsubscribed(topic.to_string()));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
