//! 代理运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 代理运行配置。
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub device_id: String,
    pub twin_property: String,
    pub device_state: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: Option<String>,
    pub mqtt_keep_alive_seconds: u64,
    pub mqtt_connect_timeout_seconds: u64,
    pub mqtt_subscribe_timeout_ms: u64,
    pub mqtt_qos: u8,
    /// 等待孪生快照的超时；`None` 表示无限等待。
    pub reply_timeout_seconds: Option<u64>,
    pub cycle_interval_ms: u64,
}

impl AgentConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device_id = read_optional(&lookup, "TWIN_DEVICE_ID")
            .ok_or_else(|| ConfigError::Missing("TWIN_DEVICE_ID".to_string()))?;
        let twin_property = read_optional(&lookup, "TWIN_PROPERTY")
            .unwrap_or_else(|| "say_something".to_string());
        let device_state =
            read_optional(&lookup, "TWIN_DEVICE_STATE").unwrap_or_else(|| "online".to_string());
        let mqtt_host =
            read_optional(&lookup, "TWIN_MQTT_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default(&lookup, "TWIN_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional(&lookup, "TWIN_MQTT_USERNAME");
        let mqtt_password = read_optional(&lookup, "TWIN_MQTT_PASSWORD");
        let mqtt_client_id = read_optional(&lookup, "TWIN_MQTT_CLIENT_ID");
        let mqtt_keep_alive_seconds =
            read_u64_with_default(&lookup, "TWIN_MQTT_KEEP_ALIVE_SECONDS", 30)?;
        let mqtt_connect_timeout_seconds =
            read_u64_with_default(&lookup, "TWIN_MQTT_CONNECT_TIMEOUT_SECONDS", 10)?;
        let mqtt_subscribe_timeout_ms =
            read_u64_with_default(&lookup, "TWIN_MQTT_SUBSCRIBE_TIMEOUT_MS", 5000)?;
        let mqtt_qos = read_u8_with_default(&lookup, "TWIN_MQTT_QOS", 0)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "TWIN_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let reply_timeout_seconds =
            read_optional_u64(&lookup, "TWIN_REPLY_TIMEOUT_SECONDS")?.filter(|value| *value > 0);
        let cycle_interval_ms = read_u64_with_default(&lookup, "TWIN_CYCLE_INTERVAL_MS", 0)?;

        Ok(Self {
            device_id,
            twin_property,
            device_state,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_client_id,
            mqtt_keep_alive_seconds,
            mqtt_connect_timeout_seconds,
            mqtt_subscribe_timeout_ms,
            mqtt_qos,
            reply_timeout_seconds,
            cycle_interval_ms,
        })
    }
}

fn read_u16_with_default<F>(lookup: &F, key: &str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(key) {
        Some(value) => value,
        None => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default<F>(lookup: &F, key: &str, default: u8) -> Result<u8, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(key) {
        Some(value) => value,
        None => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(key) {
        Some(value) => value,
        None => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        None => Ok(None),
    }
}
