//! 设备孪生总线主题。
//!
//! ```text
//! $hw/events/device/{id}/state/update      在线状态上报
//! $hw/events/device/{id}/twin/update       孪生更新
//! $hw/events/device/{id}/twin/get          孪生查询请求
//! $hw/events/device/{id}/twin/get/result   孪生查询结果
//! ```

pub const DEVICE_TOPIC_PREFIX: &str = "$hw/events/device/";

const STATE_UPDATE_SUFFIX: &str = "/state/update";
const TWIN_UPDATE_SUFFIX: &str = "/twin/update";
const TWIN_GET_SUFFIX: &str = "/twin/get";
const TWIN_GET_RESULT_SUFFIX: &str = "/twin/get/result";

/// 单个设备的主题集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwinTopics {
    device_id: String,
}

impl TwinTopics {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn state_update(&self) -> String {
        self.topic(STATE_UPDATE_SUFFIX)
    }

    pub fn twin_update(&self) -> String {
        self.topic(TWIN_UPDATE_SUFFIX)
    }

    pub fn twin_get(&self) -> String {
        self.topic(TWIN_GET_SUFFIX)
    }

    pub fn twin_get_result(&self) -> String {
        self.topic(TWIN_GET_RESULT_SUFFIX)
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}{}{}", DEVICE_TOPIC_PREFIX, self.device_id, suffix)
    }
}
