//! 日志初始化、同步周期标识与同步指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 同步指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub announces: u64,
    pub twin_requests: u64,
    pub snapshots_received: u64,
    pub corrections_published: u64,
    pub in_sync: u64,
    pub publish_failures: u64,
    pub subscribe_failures: u64,
    pub malformed_payloads: u64,
    pub reply_timeouts: u64,
    pub reply_latency_ms_total: u64,
    pub reply_latency_ms_count: u64,
}

/// 进程级同步指标。
pub struct TelemetryMetrics {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    announces: AtomicU64,
    twin_requests: AtomicU64,
    snapshots_received: AtomicU64,
    corrections_published: AtomicU64,
    in_sync: AtomicU64,
    publish_failures: AtomicU64,
    subscribe_failures: AtomicU64,
    malformed_payloads: AtomicU64,
    reply_timeouts: AtomicU64,
    reply_latency_ms_total: AtomicU64,
    reply_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            cycles_started: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            announces: AtomicU64::new(0),
            twin_requests: AtomicU64::new(0),
            snapshots_received: AtomicU64::new(0),
            corrections_published: AtomicU64::new(0),
            in_sync: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            subscribe_failures: AtomicU64::new(0),
            malformed_payloads: AtomicU64::new(0),
            reply_timeouts: AtomicU64::new(0),
            reply_latency_ms_total: AtomicU64::new(0),
            reply_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            announces: self.announces.load(Ordering::Relaxed),
            twin_requests: self.twin_requests.load(Ordering::Relaxed),
            snapshots_received: self.snapshots_received.load(Ordering::Relaxed),
            corrections_published: self.corrections_published.load(Ordering::Relaxed),
            in_sync: self.in_sync.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            reply_timeouts: self.reply_timeouts.load(Ordering::Relaxed),
            reply_latency_ms_total: self.reply_latency_ms_total.load(Ordering::Relaxed),
            reply_latency_ms_count: self.reply_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，`RUST_LOG` 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的同步周期 ID。
pub fn new_cycle_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录同步周期开始次数。
pub fn record_cycle_started() {
    metrics().cycles_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录完成比较的同步周期次数。
pub fn record_cycle_completed() {
    metrics().cycles_completed.fetch_add(1, Ordering::Relaxed);
}

/// 记录在线状态上报次数。
pub fn record_announce() {
    metrics().announces.fetch_add(1, Ordering::Relaxed);
}

/// 记录孪生查询请求次数。
pub fn record_twin_request() {
    metrics().twin_requests.fetch_add(1, Ordering::Relaxed);
}

/// 记录收到有效快照次数。
pub fn record_snapshot_received() {
    metrics().snapshots_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录纠正消息发布次数。
pub fn record_correction_published() {
    metrics()
        .corrections_published
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录 expected 与 actual 一致的次数。
pub fn record_in_sync() {
    metrics().in_sync.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布失败次数。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅失败次数。
pub fn record_subscribe_failure() {
    metrics().subscribe_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法解码的负载次数。
pub fn record_malformed_payload() {
    metrics().malformed_payloads.fetch_add(1, Ordering::Relaxed);
}

/// 记录等待快照超时次数。
pub fn record_reply_timeout() {
    metrics().reply_timeouts.fetch_add(1, Ordering::Relaxed);
}

/// 记录请求到收到快照的耗时（毫秒）。
pub fn record_reply_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .reply_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .reply_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
