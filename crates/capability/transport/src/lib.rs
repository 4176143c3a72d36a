//! # 孪生总线传输能力模块
//!
//! 同步引擎只依赖 [`TwinTransport`]，具体实现：
//! - **MqttTransport**：基于 rumqttc 的 MQTT 连接（生产）
//! - **InMemoryTransport**：进程内回环总线（测试与接线）
//!
//! ```text
//! TwinSyncEngine
//!       │ publish / subscribe
//!       ▼
//! TwinTransport ──► MqttTransport ──► broker ──► twin-store
//!       │
//!       └────────► InMemoryTransport
//! ```

mod error;
mod in_memory;
mod mqtt;

pub use error::TransportError;
pub use in_memory::{InMemoryTransport, TransportEvent};
pub use mqtt::{MqttTransport, MqttTransportConfig};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// 投递质量。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Qos::AtLeastOnce,
            2 => Qos::ExactlyOnce,
            _ => Qos::AtMostOnce,
        }
    }
}

/// 订阅收到的一条消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// 已确认的订阅；drop 后不再接收消息。
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: mpsc::Receiver<IncomingMessage>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, receiver: mpsc::Receiver<IncomingMessage>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 等待下一条消息；传输关闭或取消订阅后返回 `None`。
    pub async fn recv(&mut self) -> Option<IncomingMessage> {
        self.receiver.recv().await
    }
}

/// 发布/订阅能力抽象。
#[async_trait]
pub trait TwinTransport: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError>;

    /// 返回时订阅已被确认，之后发布的请求不会丢失其回复。
    async fn subscribe(&self, topic: &str, qos: Qos) -> Result<Subscription, TransportError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;
}
