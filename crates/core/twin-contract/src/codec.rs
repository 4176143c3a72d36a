//! 孪生消息编解码（JSON）。

use crate::message::{DeviceStateUpdate, DeviceTwinUpdate};
use serde::Serialize;

/// 编解码错误。
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("encode error: {0}")]
    Encode(String),
}

/// 可以发布到总线上的消息。
pub trait TwinMessage: Serialize {}

impl TwinMessage for DeviceTwinUpdate {}
impl TwinMessage for DeviceStateUpdate {}

/// 编码为 JSON 字节。
pub fn encode<T: TwinMessage>(message: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|err| CodecError::Encode(err.to_string()))
}

/// 解码孪生文档；非 JSON 对象或结构不符时返回 `MalformedPayload`。
pub fn decode(payload: &[u8]) -> Result<DeviceTwinUpdate, CodecError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::MalformedPayload("empty payload".to_string()));
    }
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|err| CodecError::MalformedPayload(err.to_string()))?;
    if !value.is_object() {
        return Err(CodecError::MalformedPayload(
            "expected a json object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| CodecError::MalformedPayload(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_array_payload() {
        let err = decode(br#"["id", 1, {}]"#).expect_err("array");
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn decode_rejects_blank_payload() {
        let err = decode(b"  \n").expect_err("blank");
        assert_eq!(err.to_string(), "malformed payload: empty payload");
    }
}
