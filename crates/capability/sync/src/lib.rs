//! # 孪生同步能力模块
//!
//! 让单个设备属性的 actual 值追上 expected 值：
//!
//! ```text
//! ReconciliationLoop
//!       │ 每个周期
//!       ▼
//! TwinSyncEngine
//!       ├── Announce   publish state/update {"state":"online"}
//!       ├── Request    subscribe twin/get/result，然后 publish twin/get
//!       ├── Await      监听任务写入 SnapshotStore 后完成
//!       └── Correct    expected ≠ actual 时 publish twin/update
//! ```

mod engine;
mod error;
mod reconcile;
mod runner;
mod store;

pub use engine::{CycleOutcome, TwinSyncConfig, TwinSyncEngine};
pub use error::SyncError;
pub use reconcile::{Reconciliation, correction, reconcile, twin_request};
pub use runner::ReconciliationLoop;
pub use store::SnapshotStore;
