//! 传输层错误类型定义

/// 总线传输错误
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 建连失败（启动期致命）
    #[error("connect error: {0}")]
    Connect(String),

    /// 发布失败
    #[error("publish error: {0}")]
    Publish(String),

    /// 订阅/取消订阅失败
    #[error("subscribe error: {0}")]
    Subscribe(String),

    /// 等待 broker 确认超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 连接已关闭
    #[error("transport closed")]
    Closed,
}
