//! `providers` 模組負責開啟與後端之間的 SSE 位元組串流。
//!
//! 驅動器只依賴 `StreamBackend` trait，因此測試時可以換成記憶體中的實作。

/// `http` 模組：透過 reqwest 向模擬後端發出請求並取得回應的位元組串流。
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// 後端回應本文的位元組串流。
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// 請求模式：即時查詢或重播儲存的紀錄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Live,
    Replay,
}

/// 串流層級的錯誤，發生時整個組裝流程都會中止。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("response has no body")]
    MissingBody,
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("stream error: {0}")]
    Stream(String),
}

/// 定義了所有串流後端都必須遵守的通用行為介面。
#[async_trait]
pub trait StreamBackend: Send + Sync {
    /// 回傳此後端的名稱，用於日誌記錄。
    fn name(&self) -> &str;

    /// 送出查詢並回傳回應本文的位元組串流。
    ///
    /// # Arguments
    /// * `query` - 使用者輸入的文字；重播模式下不會送出。
    /// * `mode` - 即時或重播模式。
    async fn open(&self, query: &str, mode: ChatMode) -> Result<ByteStream, TransportError>;
}
