//! 孪生同步引擎：上报在线 → 请求孪生 → 等待快照 → 比较并纠正。

use crate::error::SyncError;
use crate::reconcile::{Reconciliation, correction, reconcile, twin_request};
use crate::store::SnapshotStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use twin_contract::{
    DEFAULT_PROPERTY, DeviceStateUpdate, DeviceTwinUpdate, TwinMessage, TwinTopics, encode,
};
use twin_telemetry::{
    new_cycle_id, record_announce, record_correction_published, record_cycle_completed,
    record_cycle_started, record_in_sync, record_malformed_payload, record_publish_failure,
    record_reply_latency_ms, record_reply_timeout, record_snapshot_received,
    record_subscribe_failure, record_twin_request,
};
use twin_transport::{Qos, TwinTransport};

/// 同步引擎参数。
#[derive(Debug, Clone)]
pub struct TwinSyncConfig {
    pub device_id: String,
    /// 跟踪的孪生属性名。
    pub property: String,
    /// 每个周期上报的设备状态。
    pub device_state: String,
    pub qos: Qos,
    /// 等待快照的超时；`None` 表示一直等待。
    pub reply_timeout: Option<Duration>,
}

impl TwinSyncConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            property: DEFAULT_PROPERTY.to_string(),
            device_state: "online".to_string(),
            qos: Qos::AtMostOnce,
            reply_timeout: None,
        }
    }
}

/// 单个同步周期的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 完成比较（需要时已尝试发布纠正）。
    Compared(Reconciliation),
    /// 等待快照超时，本周期放弃。
    TimedOut,
    /// 未能建立订阅或监听提前结束，本周期放弃。
    Aborted(String),
}

/// 周期监听任务；drop 时中止，订阅随之释放。
struct ListenerTask(JoinHandle<bool>);

impl ListenerTask {
    async fn wait(&mut self) -> bool {
        (&mut self.0).await.unwrap_or(false)
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct TwinSyncEngine {
    transport: Arc<dyn TwinTransport>,
    store: Arc<SnapshotStore>,
    topics: TwinTopics,
    config: TwinSyncConfig,
}

impl TwinSyncEngine {
    pub fn new(transport: Arc<dyn TwinTransport>, config: TwinSyncConfig) -> Self {
        Self {
            transport,
            store: Arc::new(SnapshotStore::new()),
            topics: TwinTopics::new(config.device_id.clone()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn topics(&self) -> &TwinTopics {
        &self.topics
    }

    /// 执行一个完整周期；周期内的错误只记录，不向外传播。
    pub async fn run_cycle(&self) -> CycleOutcome {
        let span = tracing::info_span!(
            "twin_cycle",
            cycle_id = %new_cycle_id(),
            device_id = %self.topics.device_id(),
            property = %self.config.property
        );
        async {
            record_cycle_started();
            if let Err(err) = self.announce().await {
                warn!(target: "twin.sync", error = %err, "device_state_publish_failed");
            }

            let snapshot = match self.request_snapshot().await {
                Ok(snapshot) => snapshot,
                Err(SyncError::ReplyTimeout(timeout)) => {
                    record_reply_timeout();
                    warn!(
                        target: "twin.sync",
                        timeout_ms = timeout.as_millis() as u64,
                        "twin_reply_timeout"
                    );
                    return CycleOutcome::TimedOut;
                }
                Err(err) => {
                    warn!(target: "twin.sync", error = %err, "twin_cycle_aborted");
                    return CycleOutcome::Aborted(err.to_string());
                }
            };

            let result = self.compare_and_correct(&snapshot).await;
            record_cycle_completed();
            CycleOutcome::Compared(result)
        }
        .instrument(span)
        .await
    }

    /// 上报设备在线状态（不重试）。
    pub async fn announce(&self) -> Result<(), SyncError> {
        info!(target: "twin.sync", state = %self.config.device_state, "device_state_announce");
        record_announce();
        let update = DeviceStateUpdate::new(self.config.device_state.clone());
        self.publish(&self.topics.state_update(), &update).await
    }

    /// 订阅查询结果、发布查询请求，并等待第一份非空快照。
    pub async fn request_snapshot(&self) -> Result<Arc<DeviceTwinUpdate>, SyncError> {
        let result_topic = self.topics.twin_get_result();
        let mut subscription = self
            .transport
            .subscribe(&result_topic, self.config.qos)
            .await
            .map_err(|err| {
                record_subscribe_failure();
                SyncError::Subscribe(err.to_string())
            })?;

        let store = self.store.clone();
        let mut listener = ListenerTask(tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                match store.accept(&message.payload) {
                    Ok(true) => return true,
                    Ok(false) => {
                        debug!(target: "twin.sync", topic = %message.topic, "twin_snapshot_empty");
                    }
                    Err(err) => {
                        record_malformed_payload();
                        warn!(
                            target: "twin.sync",
                            topic = %message.topic,
                            payload_size = message.payload.len(),
                            error = %err,
                            "twin_snapshot_malformed"
                        );
                    }
                }
            }
            false
        }));

        let started_at = Instant::now();
        record_twin_request();
        let request = twin_request(&self.config.property);
        if let Err(err) = self.publish(&self.topics.twin_get(), &request).await {
            warn!(target: "twin.sync", error = %err, "twin_get_publish_failed");
        }

        let waited = match self.config.reply_timeout {
            Some(timeout) => tokio::time::timeout(timeout, listener.wait())
                .await
                .map_err(|_| SyncError::ReplyTimeout(timeout)),
            None => Ok(listener.wait().await),
        };
        drop(listener);
        self.release(&result_topic).await;

        if !waited? {
            return Err(SyncError::ListenerClosed);
        }
        record_snapshot_received();
        record_reply_latency_ms(started_at.elapsed().as_millis() as u64);
        self.store.latest().ok_or(SyncError::ListenerClosed)
    }

    /// 按比较规则决定是否发布纠正；发布失败只记录。
    pub async fn compare_and_correct(&self, snapshot: &DeviceTwinUpdate) -> Reconciliation {
        let result = reconcile(snapshot.twin(&self.config.property));
        match &result {
            Reconciliation::Correct { expected, actual } => {
                info!(
                    target: "twin.sync",
                    expected = %expected,
                    actual = ?actual,
                    "twin_correction_required"
                );
                let update = correction(&self.config.property, expected);
                match self.publish(&self.topics.twin_update(), &update).await {
                    Ok(()) => {
                        record_correction_published();
                        info!(target: "twin.sync", value = %expected, "twin_correction_published");
                    }
                    Err(err) => {
                        warn!(target: "twin.sync", error = %err, "twin_correction_publish_failed");
                    }
                }
            }
            Reconciliation::InSync { value } => {
                record_in_sync();
                info!(target: "twin.sync", value = %value, "twin_in_sync");
            }
            Reconciliation::NoExpected => {
                info!(target: "twin.sync", "twin_expected_absent");
            }
            Reconciliation::Unknown => {
                warn!(target: "twin.sync", "twin_property_unknown");
            }
        }
        result
    }

    async fn publish<T: TwinMessage + Sync>(&self, topic: &str, message: &T) -> Result<(), SyncError> {
        let payload = encode(message)?;
        self.transport
            .publish(topic, payload, self.config.qos, false)
            .await
            .map_err(|err| {
                record_publish_failure();
                SyncError::Publish(err.to_string())
            })
    }

    async fn release(&self, topic: &str) {
        if let Err(err) = self.transport.unsubscribe(topic).await {
            debug!(target: "twin.sync", topic = %topic, error = %err, "twin_unsubscribe_failed");
        }
    }
}
