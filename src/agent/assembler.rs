//! Turns parsed records into assistant messages.
//!
//! The assembler owns a working copy of the active message. Every record
//! mutates that copy and writes a clone back to the store, so the store and
//! the assembler never alias the same value.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::classifier::{self, Route};
use super::message::{AgentType, EventKind, FinishReason, Message, Record, ToolCall};
use super::session::{SharedStore, StoreError};

/// What to do with a record whose label belongs to no agent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnclassifiedPolicy {
    /// Join the active message, or start a planning message if none exists.
    #[default]
    Inherit,
    /// Log and drop the record.
    Ignore,
}

/// Outcome of applying one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The record changed the active message.
    Updated,
    /// The record was dropped (sentinel on a non-reasoning route, or an
    /// unclassified label under [`UnclassifiedPolicy::Ignore`]).
    Skipped,
}

pub struct MessageAssembler {
    thread_id: String,
    policy: UnclassifiedPolicy,
    active: Option<Message>,
}

impl MessageAssembler {
    pub fn new(thread_id: impl Into<String>, policy: UnclassifiedPolicy) -> Self {
        Self {
            thread_id: thread_id.into(),
            policy,
            active: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// The message currently receiving records.
    pub fn active(&self) -> Option<&Message> {
        self.active.as_ref()
    }

    pub fn apply(&mut self, record: &Record, store: &SharedStore) -> Result<Applied, StoreError> {
        let agent = match classifier::classify(&record.label) {
            Some(agent) => agent,
            None => match (self.policy, self.active.as_ref()) {
                (UnclassifiedPolicy::Ignore, _) => {
                    debug!("ignoring unclassified label {}", record.label);
                    return Ok(Applied::Skipped);
                }
                (UnclassifiedPolicy::Inherit, Some(active)) => {
                    active.agent_type.unwrap_or(AgentType::Planning)
                }
                (UnclassifiedPolicy::Inherit, None) => AgentType::Planning,
            },
        };

        let mut message = self.take_or_start(agent, store)?;
        let applied = route_record(&mut message, record);
        debug!(
            "{} message {}: content {} chars, {} reasoning, {} tool calls",
            agent.as_str(),
            message.id,
            message.content.len(),
            message.reasoning_content.len(),
            message.tool_calls.len()
        );
        store.update(message.clone())?;
        self.active = Some(message);
        Ok(applied)
    }

    /// `[DONE]`: the active message completed.
    pub fn complete(&mut self, store: &SharedStore) -> Result<(), StoreError> {
        self.finish_active(store, Some(FinishReason::Completed))
    }

    /// Transport failure: the active message errored. Content already
    /// applied stays.
    pub fn fail(&mut self, store: &SharedStore) -> Result<(), StoreError> {
        self.finish_active(store, Some(FinishReason::Error))
    }

    /// Cancellation: stop streaming without a finish reason.
    pub fn abort(&mut self, store: &SharedStore) -> Result<(), StoreError> {
        self.finish_active(store, None)
    }

    /// Returns the active message if it belongs to `agent`. Otherwise closes
    /// it and starts a new one.
    fn take_or_start(&mut self, agent: AgentType, store: &SharedStore) -> Result<Message, StoreError> {
        if let Some(active) = self.active.take() {
            if active.agent_type == Some(agent) {
                return Ok(active);
            }
            let mut previous = active;
            if previous.is_streaming {
                previous.finish(Some(FinishReason::Completed));
                store.update(previous)?;
            }
        }

        let message = Message::assistant(self.thread_id.clone(), agent);
        debug!("new {} message {}", agent.as_str(), message.id);
        store.append(message.clone())?;
        Ok(message)
    }

    fn finish_active(
        &mut self,
        store: &SharedStore,
        reason: Option<FinishReason>,
    ) -> Result<(), StoreError> {
        let Some(message) = self.active.as_mut() else {
            return Ok(());
        };
        if !message.is_streaming {
            return Ok(());
        }
        message.finish(reason);
        store.update(message.clone())
    }
}

fn route_record(message: &mut Message, record: &Record) -> Applied {
    match classifier::route(&record.label, record.return_type) {
        Route::Reasoning => match record.kind {
            EventKind::Begin => {
                message.reasoning_entry(&record.label).is_streaming = true;
                Applied::Updated
            }
            EventKind::Delta => {
                let entry = message.reasoning_entry(&record.label);
                entry.content.push_str(&record.content.to_text());
                Applied::Updated
            }
            // only closes an entry that already exists
            EventKind::End => match message.reasoning_mut(&record.label) {
                Some(entry) => {
                    entry.is_streaming = false;
                    Applied::Updated
                }
                None => {
                    warn!("end of {} without an open reasoning block", record.label);
                    Applied::Skipped
                }
            },
        },
        route if record.kind != EventKind::Delta => {
            warn!(
                "sentinel {:?} on {:?} label {} skipped",
                record.kind, route, record.label
            );
            Applied::Skipped
        }
        Route::Content => {
            message.content.push_str(&record.content.to_text());
            Applied::Updated
        }
        Route::ToolCall => {
            message.tool_calls.push(ToolCall {
                label: record.label.clone(),
                content: record.content.to_text(),
            });
            Applied::Updated
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::agent::message::{Reasoning, RecordContent, Role};
    use crate::agent::parser::{ParsedEvent, parse_payload};

    fn rec(label: &str, content: serde_json::Value, return_type: &str) -> Record {
        let payload = json!({"label": label, "content": content, "return_type": return_type});
        match parse_payload(&payload.to_string()) {
            ParsedEvent::Record(record) => record,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn setup() -> (MessageAssembler, SharedStore) {
        (
            MessageAssembler::new("thread-1", UnclassifiedPolicy::Inherit),
            SharedStore::new(),
        )
    }

    #[test]
    fn agent_switch_creates_new_message() {
        let (mut assembler, store) = setup();
        for label in [
            "planning_agent_knowledge",
            "planning_agent_troubleshooting_text",
            "troubleshooting_agent_mock_status_done",
        ] {
            assembler.apply(&rec(label, json!("x"), "normal"), &store).unwrap();
        }

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].agent_type, Some(AgentType::Planning));
        assert_eq!(messages[0].tool_calls.len(), 1);
        assert_eq!(messages[0].content, "x");
        assert_eq!(messages[1].agent_type, Some(AgentType::Troubleshooting));
        assert_eq!(messages[1].tool_calls.len(), 1);
        assert!(messages.iter().all(|m| m.role == Role::Assistant && m.thread_id == "thread-1"));
    }

    #[test]
    fn superseded_message_stops_streaming() {
        let (mut assembler, store) = setup();
        assembler
            .apply(&rec("planning_agent_knowledge", json!({}), "normal"), &store)
            .unwrap();
        assembler
            .apply(&rec("summarizing_agent_result", json!({}), "normal"), &store)
            .unwrap();

        let messages = store.messages();
        assert!(!messages[0].is_streaming);
        assert_eq!(messages[0].finish_reason, Some(FinishReason::Completed));
        assert!(messages[1].is_streaming);
    }

    #[test]
    fn reasoning_merges_by_label_and_skips_sentinels() {
        let (mut assembler, store) = setup();
        let label = "troubleshooting_agent_model_thinking";
        for content in ["begin", "begin", "step1 ", "step2", "complete"] {
            assembler.apply(&rec(label, json!(content), "stream"), &store).unwrap();
        }

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].reasoning_content,
            vec![Reasoning {
                label: label.to_string(),
                content: "step1 step2".to_string(),
                is_streaming: false,
            }]
        );
    }

    #[test]
    fn begin_reopens_existing_entry() {
        let (mut assembler, store) = setup();
        let label = "troubleshooting_agent_code_thinking";
        assembler.apply(&rec(label, json!("a"), "stream"), &store).unwrap();
        assembler.apply(&rec(label, json!("complete"), "stream"), &store).unwrap();
        assembler.apply(&rec(label, json!("begin"), "stream"), &store).unwrap();

        let reasoning = assembler.active().unwrap().reasoning(label).unwrap();
        assert!(reasoning.is_streaming);
        assert_eq!(reasoning.content, "a");
    }

    #[test]
    fn end_without_entry_adds_nothing() {
        let (mut assembler, store) = setup();
        assembler
            .apply(&rec("troubleshooting_agent_model_thinking", json!("x"), "stream"), &store)
            .unwrap();
        let applied = assembler
            .apply(&rec("troubleshooting_agent_code_thinking", json!("complete"), "stream"), &store)
            .unwrap();

        assert_eq!(applied, Applied::Skipped);
        assert_eq!(
            store.messages()[0].reasoning_content,
            vec![Reasoning {
                label: "troubleshooting_agent_model_thinking".to_string(),
                content: "x".to_string(),
                is_streaming: true,
            }]
        );
    }

    #[test]
    fn unknown_labels_follow_return_type() {
        let (mut assembler, store) = setup();
        assembler
            .apply(&rec("troubleshooting_agent_extra", json!("think"), "stream"), &store)
            .unwrap();
        assembler
            .apply(&rec("troubleshooting_agent_note", json!("note"), "normal"), &store)
            .unwrap();

        let message = assembler.active().unwrap();
        assert_eq!(message.reasoning("troubleshooting_agent_extra").unwrap().content, "think");
        assert_eq!(message.content, "note");
    }

    #[test]
    fn unclassified_labels_inherit_active_agent() {
        let (mut assembler, store) = setup();
        assembler
            .apply(&rec("summarizing_agent_result", json!("a"), "normal"), &store)
            .unwrap();
        assembler
            .apply(&rec("find_root_cause", json!({"found": true}), "normal"), &store)
            .unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("a{"));
    }

    #[test]
    fn unclassified_label_without_active_message_starts_planning() {
        let (mut assembler, store) = setup();
        assembler.apply(&rec("chat_delta", json!("hi"), "normal"), &store).unwrap();
        assert_eq!(store.messages()[0].agent_type, Some(AgentType::Planning));
    }

    #[test]
    fn ignore_policy_drops_unclassified_labels() {
        let mut assembler = MessageAssembler::new("t", UnclassifiedPolicy::Ignore);
        let store = SharedStore::new();
        let applied = assembler
            .apply(&rec("find_root_cause", json!({}), "normal"), &store)
            .unwrap();

        assert_eq!(applied, Applied::Skipped);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn sentinel_on_content_route_is_skipped() {
        let (mut assembler, store) = setup();
        let applied = assembler
            .apply(&rec("planning_agent_troubleshooting_text", json!("begin"), "stream"), &store)
            .unwrap();

        assert_eq!(applied, Applied::Skipped);
        assert_eq!(store.messages()[0].content, "");
    }

    #[test]
    fn tool_calls_never_merge() {
        let (mut assembler, store) = setup();
        for _ in 0..2 {
            assembler
                .apply(&rec("planning_agent_knowledge", json!({"k": 1}), "normal"), &store)
                .unwrap();
        }
        let expected = ToolCall {
            label: "planning_agent_knowledge".to_string(),
            content: RecordContent::Structured(json!({"k": 1})).to_text(),
        };
        assert_eq!(store.messages()[0].tool_calls, vec![expected.clone(), expected]);
    }

    #[test]
    fn terminal_signals() {
        let (mut assembler, store) = setup();
        assembler.complete(&store).unwrap();
        assert!(store.messages().is_empty());

        assembler
            .apply(&rec("planning_agent_knowledge", json!({}), "normal"), &store)
            .unwrap();
        assembler.fail(&store).unwrap();
        let message = store.messages().remove(0);
        assert!(!message.is_streaming);
        assert_eq!(message.finish_reason, Some(FinishReason::Error));

        // already finished, a later abort changes nothing
        assembler.abort(&store).unwrap();
        assert_eq!(store.messages()[0].finish_reason, Some(FinishReason::Error));
    }

    #[test]
    fn abort_leaves_finish_reason_unset() {
        let (mut assembler, store) = setup();
        assembler
            .apply(&rec("troubleshooting_agent_model_thinking", json!("begin"), "stream"), &store)
            .unwrap();
        assembler.abort(&store).unwrap();

        let message = store.messages().remove(0);
        assert!(!message.is_streaming);
        assert_eq!(message.finish_reason, None);
        assert!(!message.reasoning_content[0].is_streaming);
    }
}
