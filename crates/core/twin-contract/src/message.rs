//! 设备孪生消息模型（与 twin-store 服务交换的 JSON 结构）。

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// 纠正消息中 `metadata.type` 的取值。
pub const UPDATED_TYPE: &str = "Updated";

/// 请求快照时 actual 的占位值（尚无纠正值）。
pub const UNKNOWN_VALUE: &str = "unknown";

/// 默认跟踪的设备状态属性。
pub const DEFAULT_PROPERTY: &str = "say_something";

/// 设备在线状态上报。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStateUpdate {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
}

impl DeviceStateUpdate {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

/// 取值的附加信息。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// 孪生属性的一侧取值（expected 或 actual）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwinValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ValueMetadata>,
}

impl TwinValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            metadata: None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// 孪生条目的类型标记。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl TypeMetadata {
    pub fn updated() -> Self {
        Self {
            kind: Some(UPDATED_TYPE.to_string()),
        }
    }
}

/// 云端/边缘版本号（仅透传，比较逻辑不使用）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwinVersion {
    #[serde(default)]
    pub cloud: i64,
    #[serde(default)]
    pub edge: i64,
}

/// 单个属性的完整孪生记录。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTwin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<TwinValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<TwinValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TypeMetadata>,
    #[serde(
        default,
        alias = "expectedVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_version: Option<TwinVersion>,
    #[serde(
        default,
        alias = "actualVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub actual_version: Option<TwinVersion>,
}

impl MsgTwin {
    /// 只携带 actual 值、标记为 `Updated` 的条目。
    pub fn actual_update(value: impl Into<String>) -> Self {
        Self {
            actual: Some(TwinValue::new(value)),
            metadata: Some(TypeMetadata::updated()),
            ..Self::default()
        }
    }

    /// expected 与 actual 都缺失时，条目不携带任何同步信息。
    pub fn is_unknown(&self) -> bool {
        self.expected.is_none() && self.actual.is_none()
    }

    pub fn expected_value(&self) -> Option<&str> {
        self.expected.as_ref().and_then(TwinValue::value)
    }

    pub fn actual_value(&self) -> Option<&str> {
        self.actual.as_ref().and_then(TwinValue::value)
    }
}

/// 总线上交换的孪生文档（请求、更新与查询结果共用）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTwinUpdate {
    #[serde(default, alias = "eventID", alias = "eventId")]
    pub event_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "deserialize_twin")]
    pub twin: BTreeMap<String, MsgTwin>,
}

impl DeviceTwinUpdate {
    pub fn new(event_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            twin: BTreeMap::new(),
        }
    }

    pub fn with_twin(mut self, property: impl Into<String>, twin: MsgTwin) -> Self {
        self.twin.insert(property.into(), twin);
        self
    }

    pub fn twin(&self, property: &str) -> Option<&MsgTwin> {
        self.twin.get(property)
    }

    pub fn is_empty(&self) -> bool {
        self.twin.is_empty()
    }
}

// `"twin": null` 与 `"prop": null` 都按缺失处理。
fn deserialize_twin<'de, D>(deserializer: D) -> Result<BTreeMap<String, MsgTwin>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<BTreeMap<String, Option<MsgTwin>>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(property, twin)| twin.map(|twin| (property, twin)))
        .collect())
}
