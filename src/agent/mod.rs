//! 串流對話的核心：解碼 SSE、解析紀錄、組裝訊息並寫入對話儲存庫。
//!
//! 資料流向：`providers` 取得位元組串流 → `sse` 切出框架 → `parser` 解析紀錄
//! → `classifier` 與 `assembler` 決定歸屬 → `session` 保存結果供 UI 讀取。

// --- 子模組宣告 ---

/// `assembler` 模組：訊息組裝狀態機，決定紀錄要開新訊息還是延續目前的訊息。
pub mod assembler;

/// `classifier` 模組：label 對代理類型與訊息欄位的對照表。
pub mod classifier;

/// `config` 模組：`config/netdiag.toml` 的解析格式與預設值。
pub mod config;

/// `manager` 模組：提供 `ChatManager`，驅動一次完整的送出與接收流程。
pub mod manager;

/// `message` 模組：對話訊息與線路紀錄的資料結構。
pub mod message;

/// `parser` 模組：將 SSE 框架中的 `data:` 行解析為紀錄或結束標記。
pub mod parser;

/// `providers` 模組：開啟後端串流的實作。
pub mod providers;

/// `session` 模組：對話儲存庫與變動通知。
pub mod session;

/// `sse` 模組：增量式 SSE 框架解碼器。
pub mod sse;

// --- 公共 API 重新導出 ---

pub use assembler::{MessageAssembler, UnclassifiedPolicy};
pub use config::ChatSettings;
pub use manager::{ChatManager, SendError, SendOptions, SendOutcome};
pub use message::{AgentType, FinishReason, Message, Reasoning, Role, ToolCall};
pub use providers::{ChatMode, StreamBackend, TransportError};
pub use session::{ConversationStore, SharedStore, StoreError, StoreEvent};
