//! 设备孪生同步代理：连接总线后循环执行 上报在线 → 请求孪生 → 比较 → 纠正。

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use twin_config::AgentConfig;
use twin_sync::{ReconciliationLoop, TwinSyncConfig, TwinSyncEngine};
use twin_telemetry::{init_tracing, metrics};
use twin_transport::{MqttTransport, MqttTransportConfig, Qos};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AgentConfig::from_env()?;
    init_tracing();
    info!(
        device_id = %config.device_id,
        property = %config.twin_property,
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        "twin_agent_starting"
    );

    // 建连失败直接退出
    let (transport, eventloop) = match MqttTransport::connect(mqtt_config(&config)).await {
        Ok(connected) => connected,
        Err(err) => {
            error!(error = %err, "mqtt_connect_failed");
            return Err(err.into());
        }
    };
    let transport = Arc::new(transport);

    let engine = TwinSyncEngine::new(transport.clone(), sync_config(&config));
    let runner = ReconciliationLoop::new(engine)
        .with_interval(Duration::from_millis(config.cycle_interval_ms));
    let cycles = runner.run(shutdown_signal()).await;

    transport.disconnect().await;
    eventloop.abort();
    let snapshot = metrics().snapshot();
    info!(
        cycles,
        corrections = snapshot.corrections_published,
        publish_failures = snapshot.publish_failures,
        reply_timeouts = snapshot.reply_timeouts,
        "twin_agent_stopped"
    );
    Ok(())
}

fn mqtt_config(config: &AgentConfig) -> MqttTransportConfig {
    MqttTransportConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        client_id: config
            .mqtt_client_id
            .clone()
            .unwrap_or_else(|| format!("twin-agent-{}", config.device_id)),
        keep_alive: Duration::from_secs(config.mqtt_keep_alive_seconds),
        connect_timeout: Duration::from_secs(config.mqtt_connect_timeout_seconds),
        subscribe_timeout: Duration::from_millis(config.mqtt_subscribe_timeout_ms),
        channel_capacity: 16,
    }
}

fn sync_config(config: &AgentConfig) -> TwinSyncConfig {
    TwinSyncConfig {
        device_id: config.device_id.clone(),
        property: config.twin_property.clone(),
        device_state: config.device_state.clone(),
        qos: Qos::from_u8(config.mqtt_qos),
        reply_timeout: config.reply_timeout_seconds.map(Duration::from_secs),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "shutdown_signal_unavailable");
        std::future::pending::<()>().await;
    }
    info!("shutdown_signal_received");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> AgentConfig {
        AgentConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        })
        .expect("config")
    }

    #[test]
    fn client_id_defaults_to_device_id() {
        let mqtt = mqtt_config(&config(&[("TWIN_DEVICE_ID", "dev-1")]));
        assert_eq!(mqtt.client_id, "twin-agent-dev-1");
        assert_eq!(mqtt.port, 1883);
        assert!(mqtt.username.is_none());
    }

    #[test]
    fn sync_config_carries_property_and_timeout() {
        let sync = sync_config(&config(&[
            ("TWIN_DEVICE_ID", "dev-1"),
            ("TWIN_PROPERTY", "power"),
            ("TWIN_MQTT_QOS", "1"),
            ("TWIN_REPLY_TIMEOUT_SECONDS", "3"),
        ]));
        assert_eq!(sync.device_id, "dev-1");
        assert_eq!(sync.property, "power");
        assert_eq!(sync.device_state, "online");
        assert_eq!(sync.qos, Qos::AtLeastOnce);
        assert_eq!(sync.reply_timeout, Some(Duration::from_secs(3)));
    }
}
