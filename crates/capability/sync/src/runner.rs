//! 常驻同步循环。

use crate::engine::TwinSyncEngine;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// 无条件重复执行同步周期，直到宿主给出的 shutdown 信号完成。
pub struct ReconciliationLoop {
    engine: TwinSyncEngine,
    interval: Duration,
}

impl ReconciliationLoop {
    pub fn new(engine: TwinSyncEngine) -> Self {
        Self {
            engine,
            interval: Duration::ZERO,
        }
    }

    /// 两个周期之间的停顿（默认为 0，即紧接着执行下一周期）。
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn engine(&self) -> &TwinSyncEngine {
        &self.engine
    }

    /// 运行直到 `shutdown` 完成，返回已结束的周期数。
    ///
    /// shutdown 时正在进行的周期被直接丢弃，其监听任务随之中止。
    pub async fn run<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0u64;
        info!(
            target: "twin.sync",
            device_id = %self.engine.topics().device_id(),
            interval_ms = self.interval.as_millis() as u64,
            "reconciliation_loop_started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.engine.run_cycle() => {
                    cycles += 1;
                    debug!(target: "twin.sync", cycles, outcome = ?outcome, "twin_cycle_finished");
                }
            }
            if !self.interval.is_zero() {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }
        info!(target: "twin.sync", cycles, "reconciliation_loop_stopped");
        cycles
    }
}
