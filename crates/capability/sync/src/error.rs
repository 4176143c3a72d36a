use std::time::Duration;
use twin_contract::CodecError;

/// 同步周期内的错误；均由周期自身记录并吸收。
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("publish error: {0}")]
    Publish(String),
    #[error("subscribe error: {0}")]
    Subscribe(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("twin reply timeout after {0:?}")]
    ReplyTimeout(Duration),
    #[error("twin result listener closed before a snapshot arrived")]
    ListenerClosed,
}
