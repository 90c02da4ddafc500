//! 送往後端的請求本文結構。

#[derive(serde::Serialize)]
pub struct FreestylePayload<'a> {
    pub query: &'a str,
}
