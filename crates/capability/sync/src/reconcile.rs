//! expected / actual 比较规则与请求、纠正消息构造。

use twin_contract::{DeviceTwinUpdate, MsgTwin, UNKNOWN_VALUE};

/// 单个属性的比较结论。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// 快照中没有该属性，或 expected 与 actual 都缺失。
    Unknown,
    /// 没有 expected 值，无需纠正。
    NoExpected,
    InSync { value: String },
    /// actual 缺失或与 expected 不同，需要把 actual 改为 expected。
    Correct {
        expected: String,
        actual: Option<String>,
    },
}

impl Reconciliation {
    pub fn needs_correction(&self) -> bool {
        matches!(self, Reconciliation::Correct { .. })
    }
}

pub fn reconcile(twin: Option<&MsgTwin>) -> Reconciliation {
    let Some(twin) = twin.filter(|twin| !twin.is_unknown()) else {
        return Reconciliation::Unknown;
    };
    let Some(expected) = twin.expected_value() else {
        return Reconciliation::NoExpected;
    };
    match twin.actual_value() {
        Some(actual) if actual == expected => Reconciliation::InSync {
            value: expected.to_string(),
        },
        actual => Reconciliation::Correct {
            expected: expected.to_string(),
            actual: actual.map(str::to_string),
        },
    }
}

/// 孪生查询请求：actual 为占位值 `unknown`。
pub fn twin_request(property: &str) -> DeviceTwinUpdate {
    actual_update(property, UNKNOWN_VALUE)
}

/// 把 actual 设为 expected 的纠正消息。
pub fn correction(property: &str, expected: &str) -> DeviceTwinUpdate {
    actual_update(property, expected)
}

fn actual_update(property: &str, value: &str) -> DeviceTwinUpdate {
    DeviceTwinUpdate::new(uuid::Uuid::new_v4().to_string(), now_epoch_ms())
        .with_twin(property, MsgTwin::actual_update(value))
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_contract::{TwinValue, UPDATED_TYPE};

    fn twin(expected: Option<&str>, actual: Option<&str>) -> MsgTwin {
        MsgTwin {
            expected: expected.map(TwinValue::new),
            actual: actual.map(TwinValue::new),
            ..MsgTwin::default()
        }
    }

    #[test]
    fn equal_values_are_in_sync() {
        for value in ["on", "off", ""] {
            let result = reconcile(Some(&twin(Some(value), Some(value))));
            assert_eq!(
                result,
                Reconciliation::InSync {
                    value: value.to_string()
                }
            );
            assert!(!result.needs_correction());
        }
    }

    #[test]
    fn missing_actual_requires_correction() {
        assert_eq!(
            reconcile(Some(&twin(Some("X"), None))),
            Reconciliation::Correct {
                expected: "X".to_string(),
                actual: None
            }
        );
    }

    #[test]
    fn mismatch_requires_correction() {
        assert_eq!(
            reconcile(Some(&twin(Some("X"), Some("Y")))),
            Reconciliation::Correct {
                expected: "X".to_string(),
                actual: Some("Y".to_string())
            }
        );
    }

    #[test]
    fn actual_without_value_requires_correction() {
        let mut entry = twin(Some("X"), None);
        entry.actual = Some(TwinValue::default());
        assert!(reconcile(Some(&entry)).needs_correction());
    }

    #[test]
    fn missing_expected_needs_nothing() {
        assert_eq!(
            reconcile(Some(&twin(None, Some("Y")))),
            Reconciliation::NoExpected
        );
        let mut entry = twin(None, None);
        entry.expected = Some(TwinValue::default());
        assert_eq!(reconcile(Some(&entry)), Reconciliation::NoExpected);
    }

    #[test]
    fn absent_or_empty_entry_is_unknown() {
        assert_eq!(reconcile(None), Reconciliation::Unknown);
        assert_eq!(reconcile(Some(&twin(None, None))), Reconciliation::Unknown);
    }

    #[test]
    fn correction_carries_only_actual() {
        let update = correction("say_something", "on");
        assert!(!update.event_id.is_empty());
        assert!(update.timestamp > 0);
        let entry = update.twin("say_something").expect("entry");
        assert_eq!(entry.actual_value(), Some("on"));
        assert!(entry.expected.is_none());
        assert_eq!(
            entry.metadata.as_ref().and_then(|meta| meta.kind.as_deref()),
            Some(UPDATED_TYPE)
        );
    }

    #[test]
    fn request_uses_unknown_placeholder() {
        let request = twin_request("say_something");
        assert_eq!(
            request.twin("say_something").and_then(MsgTwin::actual_value),
            Some(UNKNOWN_VALUE)
        );
    }
}
