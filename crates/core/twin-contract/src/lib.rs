//! 设备孪生协议契约：消息模型、JSON 编解码与主题模板。

pub mod codec;
pub mod message;
pub mod topic;

pub use codec::{CodecError, TwinMessage, decode, encode};
pub use message::{
    DEFAULT_PROPERTY, DeviceStateUpdate, DeviceTwinUpdate, MsgTwin, TwinValue, TwinVersion,
    TypeMetadata, UNKNOWN_VALUE, UPDATED_TYPE, ValueMetadata,
};
pub use topic::{DEVICE_TOPIC_PREFIX, TwinTopics};
