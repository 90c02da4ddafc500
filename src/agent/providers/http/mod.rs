use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::agent::config::ChatSettings;

use super::{ByteStream, ChatMode, StreamBackend, TransportError};

mod models;

/// `StreamBackend` 的 HTTP 實作：即時模式 POST 查詢，重播模式 GET 重播端點。
pub struct HttpBackend {
    /// 存放後端設定資訊。
    info: HttpBackendInfo,
    /// `reqwest` 的非同步 HTTP 客戶端。
    client: Client,
}

/// 一個輔助結構，用於儲存端點與標頭設定。
#[derive(Clone)]
struct HttpBackendInfo {
    chat_url: String,
    replay_url: String,
    headers: HeaderMap,
}

impl HttpBackend {
    /// 根據提供的設定建立一個新的 `HttpBackend`。
    pub fn new(settings: &ChatSettings) -> Result<Self> {
        let headers = build_headers(&settings.extra_headers)?;
        Ok(Self {
            info: HttpBackendInfo {
                chat_url: settings.chat_url(),
                replay_url: settings.replay_url(),
                headers,
            },
            client: Client::new(),
        })
    }
}

#[async_trait]
impl StreamBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, query: &str, mode: ChatMode) -> Result<ByteStream, TransportError> {
        use models::FreestylePayload;

        let request = match mode {
            ChatMode::Live => {
                debug!("POST {}", self.info.chat_url);
                self.client
                    .post(&self.info.chat_url)
                    .headers(self.info.headers.clone())
                    .json(&FreestylePayload { query })
            }
            ChatMode::Replay => {
                debug!("GET {}", self.info.replay_url);
                self.client
                    .get(&self.info.replay_url)
                    .headers(self.info.headers.clone())
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(TransportError::MissingBody);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed())
    }
}

/// 建構 HTTP 標頭：JSON 請求、SSE 回應，再加上設定中的額外標頭。
fn build_headers(extra: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    for (key, value) in extra {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("無效的標頭名稱: {key}"))?;
        let header_value =
            HeaderValue::from_str(value).with_context(|| format!("無效的標頭內容: {key}"))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use futures_util::TryStreamExt;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const BODY: &str = "data: {\"label\":\"planning_agent_knowledge\",\"content\":{}}\n\ndata: [DONE]\n\n";

    async fn setup() -> (mockito::ServerGuard, HttpBackend) {
        let server = mockito::Server::new_async().await;
        let settings = ChatSettings {
            base_url: server.url(),
            extra_headers: BTreeMap::from([("x-demo".to_string(), "1".to_string())]),
            ..ChatSettings::default()
        };
        let backend = HttpBackend::new(&settings).unwrap();
        (server, backend)
    }

    async fn collect(stream: ByteStream) -> String {
        let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[tokio::test]
    async fn live_mode_posts_query() {
        let (mut server, backend) = setup().await;
        let mock = server
            .mock("POST", "/freestyle")
            .match_header("x-demo", "1")
            .match_body(Matcher::Json(json!({"query": "ETH_LOS on 1/0/1"})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(BODY)
            .create_async()
            .await;

        let stream = backend.open("ETH_LOS on 1/0/1", ChatMode::Live).await.unwrap();
        assert_eq!(collect(stream).await, BODY);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn replay_mode_gets_replay_endpoint() {
        let (mut server, backend) = setup().await;
        let mock = server
            .mock("GET", "/api/replay")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(BODY)
            .create_async()
            .await;

        let stream = backend.open("ignored", ChatMode::Replay).await.unwrap();
        assert_eq!(collect(stream).await, BODY);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_is_a_transport_error() {
        let (mut server, backend) = setup().await;
        server
            .mock("POST", "/freestyle")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = backend.open("q", ChatMode::Live).await.err().unwrap();
        assert!(matches!(err, TransportError::Status { status: 503, ref body } if body == "overloaded"));
    }

    #[tokio::test]
    async fn empty_response_is_missing_body() {
        let (mut server, backend) = setup().await;
        server
            .mock("POST", "/freestyle")
            .with_status(204)
            .create_async()
            .await;

        let err = backend.open("q", ChatMode::Live).await.err().unwrap();
        assert!(matches!(err, TransportError::MissingBody));
    }

    #[test]
    fn invalid_extra_header_is_rejected() {
        let extra = BTreeMap::from([("bad header".to_string(), "v".to_string())]);
        assert!(build_headers(&extra).is_err());
    }
}
