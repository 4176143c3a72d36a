//! 最近一次孪生快照的单槽存储。

use std::sync::{Arc, RwLock};
use twin_contract::{CodecError, DeviceTwinUpdate, decode};

/// 只保留最新的完整快照，每次投递整体替换，不做字段合并。
#[derive(Debug, Default)]
pub struct SnapshotStore {
    slot: RwLock<Option<Arc<DeviceTwinUpdate>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Arc<DeviceTwinUpdate>> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 解码一次订阅投递。
    ///
    /// 非空文档替换槽位并返回 `Ok(true)`；空文档忽略并返回 `Ok(false)`；
    /// 解码失败时槽位保持不变。
    pub fn accept(&self, payload: &[u8]) -> Result<bool, CodecError> {
        let snapshot = decode(payload)?;
        if snapshot.is_empty() {
            return Ok(false);
        }
        self.replace(snapshot);
        Ok(true)
    }

    fn replace(&self, snapshot: DeviceTwinUpdate) {
        *self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ON: &[u8] = br#"{"twin":{"say_something":{"expected":{"value":"on"}}}}"#;
    const OFF: &[u8] = br#"{"twin":{"say_something":{"expected":{"value":"off"}}}}"#;

    #[test]
    fn store_starts_empty() {
        assert!(SnapshotStore::new().latest().is_none());
    }

    #[test]
    fn delivery_replaces_whole_document() {
        let store = SnapshotStore::new();
        assert!(store.accept(ON).expect("on"));
        assert!(
            store
                .accept(br#"{"twin":{"other":{"actual":{"value":"1"}}}}"#)
                .expect("other")
        );
        let latest = store.latest().expect("latest");
        assert!(latest.twin("say_something").is_none());
        assert!(latest.twin("other").is_some());
    }

    #[test]
    fn empty_document_is_ignored() {
        let store = SnapshotStore::new();
        store.accept(OFF).expect("off");
        assert!(!store.accept(br#"{"twin":{}}"#).expect("empty"));
        let latest = store.latest().expect("latest");
        assert_eq!(
            latest.twin("say_something").and_then(|twin| twin.expected_value()),
            Some("off")
        );
    }

    #[test]
    fn malformed_delivery_leaves_store_unchanged() {
        let store = SnapshotStore::new();
        store.accept(ON).expect("on");
        let before = store.latest().expect("before");

        let err = store
            .accept(br#"{"twin":{"say_something":{"expected":"#)
            .expect_err("truncated");
        assert!(matches!(err, CodecError::MalformedPayload(_)));
        assert_eq!(store.latest().expect("after"), before);
    }
}
