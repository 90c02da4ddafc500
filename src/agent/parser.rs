use log::warn;
use serde::Deserialize;

use super::message::{EventKind, PayloadShape, Record, RecordContent, ReturnType};

/// 串流結束的字面標記。
pub const DONE_TOKEN: &str = "[DONE]";

/// 解析單一 SSE 框架後得到的事件。
///
/// `ParseError` 與 `ProtocolViolation` 只影響該筆紀錄，呼叫端記錄後略過即可。
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    Record(Record),
    StreamEnd,
    ParseError { payload: String, reason: String },
    ProtocolViolation { reason: String },
}

/// 線路上的原始 JSON 紀錄。
#[derive(Deserialize)]
struct WireRecord {
    label: String,
    content: serde_json::Value,
    #[serde(default)]
    return_type: ReturnType,
}

/// 解析一個框架中的所有 `data:` 行，每行視為一個獨立的 payload。
pub fn parse_frame(frame: &str) -> Vec<ParsedEvent> {
    let events: Vec<ParsedEvent> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| parse_payload(rest.strip_prefix(' ').unwrap_or(rest)))
        .collect();

    if events.is_empty() {
        return vec![ParsedEvent::ProtocolViolation {
            reason: format!("frame without data line: {frame:?}"),
        }];
    }
    events
}

/// 解析單一 payload 字串。
pub fn parse_payload(payload: &str) -> ParsedEvent {
    if payload.trim() == DONE_TOKEN {
        return ParsedEvent::StreamEnd;
    }

    let wire: WireRecord = match serde_json::from_str(payload) {
        Ok(wire) => wire,
        Err(err) => {
            return ParsedEvent::ParseError {
                payload: payload.to_string(),
                reason: err.to_string(),
            };
        }
    };

    let content = RecordContent::from_value(wire.content);
    if let Some(expected) = declared_shape(&wire.label)
        && expected != content.shape()
    {
        warn!(
            "label {} declared as {:?} but carried {:?}",
            wire.label,
            expected,
            content.shape()
        );
    }

    let kind = event_kind(&content);
    ParsedEvent::Record(Record {
        label: wire.label,
        content,
        return_type: wire.return_type,
        kind,
    })
}

/// 已知 label 所宣告的內容形狀。
pub fn declared_shape(label: &str) -> Option<PayloadShape> {
    match label {
        "planning_agent_troubleshooting_text"
        | "troubleshooting_agent_model_thinking"
        | "troubleshooting_agent_refined_apis"
        | "troubleshooting_agent_code_thinking" => Some(PayloadShape::Text),
        "planning_agent_knowledge"
        | "troubleshooting_agent_mock_status_done"
        | "summarizing_agent_result"
        | "find_root_cause"
        | "final_summarizer"
        | "final_summarizerr" => Some(PayloadShape::Structured),
        _ => None,
    }
}

/// 判斷文字內容是否為開始或結束標記。
fn event_kind(content: &RecordContent) -> EventKind {
    let RecordContent::Text(text) = content else {
        return EventKind::Delta;
    };
    let trimmed = text.trim();
    if trimmed == "begin" || text.contains("[begin]") {
        EventKind::Begin
    } else if trimmed == "complete" || trimmed == "end" || text.contains("[end]") {
        EventKind::End
    } else {
        EventKind::Delta
    }
}
