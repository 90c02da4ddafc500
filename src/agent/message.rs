use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 回應失敗時附加在對話尾端的提示文字。
pub const FAILURE_NOTICE: &str =
    "Sorry, something went wrong while generating the response. Please try again.";

/// 訊息的發送者角色。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 回應訊息所屬的邏輯代理。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Planning,
    Troubleshooting,
    Summarizing,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Planning => "planning",
            AgentType::Troubleshooting => "troubleshooting",
            AgentType::Summarizing => "summarizing",
        }
    }
}

/// 訊息結束串流的原因。中止（abort）時保持未設定。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Completed,
    Error,
}

/// 一個可折疊的推理區塊，同一則訊息中每個 label 只會有一個。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reasoning {
    pub label: String,
    pub content: String,
    pub is_streaming: bool,
}

/// 一個可點擊的工具呼叫卡片。與推理不同，工具呼叫不會依 label 合併。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub label: String,
    pub content: String,
}

/// 對話中的單一條目。
///
/// 使用者訊息建立後不再變動；助理訊息由組裝器在串流期間持續更新，
/// 但 `agent_type` 在建立後固定，代理切換時一定會產生新的訊息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    pub content: String,
    #[serde(default)]
    pub reasoning_content: Vec<Reasoning>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// 建立一則使用者訊息。
    pub fn user(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            thread_id: thread_id.into(),
            role: Role::User,
            agent_type: None,
            content: content.into(),
            reasoning_content: Vec::new(),
            tool_calls: Vec::new(),
            is_streaming: false,
            finish_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 建立一則正在串流中的空白助理訊息。
    pub fn assistant(thread_id: impl Into<String>, agent_type: AgentType) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            thread_id: thread_id.into(),
            role: Role::Assistant,
            agent_type: Some(agent_type),
            content: String::new(),
            reasoning_content: Vec::new(),
            tool_calls: Vec::new(),
            is_streaming: true,
            finish_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 建立一則已結束的錯誤提示訊息，沒有所屬代理。
    pub fn failure(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            thread_id: thread_id.into(),
            role: Role::Assistant,
            agent_type: None,
            content: FAILURE_NOTICE.to_string(),
            reasoning_content: Vec::new(),
            tool_calls: Vec::new(),
            is_streaming: false,
            finish_reason: Some(FinishReason::Error),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reasoning(&self, label: &str) -> Option<&Reasoning> {
        self.reasoning_content.iter().find(|r| r.label == label)
    }

    pub fn reasoning_mut(&mut self, label: &str) -> Option<&mut Reasoning> {
        self.reasoning_content.iter_mut().find(|r| r.label == label)
    }

    /// 取得指定 label 的推理區塊；不存在時以串流狀態新增於尾端。
    pub fn reasoning_entry(&mut self, label: &str) -> &mut Reasoning {
        let index = match self.reasoning_content.iter().position(|r| r.label == label) {
            Some(index) => index,
            None => {
                self.reasoning_content.push(Reasoning {
                    label: label.to_string(),
                    content: String::new(),
                    is_streaming: true,
                });
                self.reasoning_content.len() - 1
            }
        };
        &mut self.reasoning_content[index]
    }

    /// 結束這則訊息的串流狀態，並關閉所有仍在串流中的推理區塊。
    pub fn finish(&mut self, reason: Option<FinishReason>) {
        self.is_streaming = false;
        self.finish_reason = reason;
        for reasoning in &mut self.reasoning_content {
            reasoning.is_streaming = false;
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// 每筆紀錄的傳輸方式。缺少時視為 `normal`。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    #[default]
    Normal,
    Stream,
}

/// 紀錄內容的形狀，用於對照宣告的 label 形狀表。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Text,
    Structured,
    List,
}

/// 已解析的紀錄內容。
#[derive(Debug, Clone, PartialEq)]
pub enum RecordContent {
    Text(String),
    Structured(serde_json::Value),
    List(Vec<serde_json::Value>),
}

impl RecordContent {
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => RecordContent::Text(text),
            serde_json::Value::Array(items) => RecordContent::List(items),
            other => RecordContent::Structured(other),
        }
    }

    pub fn shape(&self) -> PayloadShape {
        match self {
            RecordContent::Text(_) => PayloadShape::Text,
            RecordContent::Structured(_) => PayloadShape::Structured,
            RecordContent::List(_) => PayloadShape::List,
        }
    }

    /// 轉成可附加到訊息中的文字。非字串內容以縮排 JSON 呈現。
    pub fn to_text(&self) -> String {
        match self {
            RecordContent::Text(text) => text.clone(),
            RecordContent::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            RecordContent::List(items) => serde_json::to_string_pretty(items)
                .unwrap_or_else(|_| serde_json::Value::Array(items.clone()).to_string()),
        }
    }
}

/// 串流標記：開始、內容片段或結束。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Begin,
    Delta,
    End,
}

/// 一筆已解析的 SSE 紀錄。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub label: String,
    pub content: RecordContent,
    pub return_type: ReturnType,
    pub kind: EventKind,
}
