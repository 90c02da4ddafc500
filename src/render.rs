//! Plain-text views of the conversation for the terminal.

use std::collections::HashSet;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::agent::message::{FinishReason, Message, Role};
use crate::agent::session::{ConversationStore, SharedStore, StoreEvent};

pub fn render_message(message: &Message) -> String {
    let mut out = String::new();
    let who = match (message.role, message.agent_type) {
        (Role::User, _) => String::from("user"),
        (Role::Assistant, Some(agent)) => format!("assistant · {}", agent.as_str()),
        (Role::Assistant, None) => String::from("assistant"),
    };
    let state = match (message.is_streaming, message.finish_reason) {
        (true, _) => " (streaming)",
        (false, Some(FinishReason::Completed)) => "",
        (false, Some(FinishReason::Error)) => " (error)",
        (false, None) if message.role == Role::Assistant => " (stopped)",
        (false, None) => "",
    };
    out.push_str(&format!("[{who}]{state}\n"));

    for call in &message.tool_calls {
        out.push_str(&format!("  ⚙ {}\n", call.label));
        push_indented(&mut out, &call.content, 4);
    }
    for reasoning in &message.reasoning_content {
        let marker = if reasoning.is_streaming { "…" } else { "✓" };
        out.push_str(&format!("  {marker} {}\n", reasoning.label));
        push_indented(&mut out, &reasoning.content, 4);
    }
    if !message.content.is_empty() {
        push_indented(&mut out, &message.content, 2);
    }
    out
}

pub fn render_conversation(store: &ConversationStore) -> String {
    store
        .messages()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_indented(out: &mut String, text: &str, indent: usize) {
    let pad = " ".repeat(indent);
    for line in text.lines() {
        out.push_str(&pad);
        out.push_str(line);
        out.push('\n');
    }
}

/// Turns store notifications into one-line progress updates.
#[derive(Default)]
pub struct Progress {
    reasoning_seen: HashSet<(String, String)>,
    finished: HashSet<String>,
}

impl Progress {
    pub fn observe(&mut self, event: &StoreEvent, store: &SharedStore) -> Vec<String> {
        let mut lines = Vec::new();
        match event {
            StoreEvent::Appended(id) => {
                if let Some(message) = store.message(id)
                    && let Some(agent) = message.agent_type
                {
                    lines.push(format!("→ {} agent", agent.as_str()));
                }
            }
            StoreEvent::Updated(id) => {
                let Some(message) = store.message(id) else {
                    return lines;
                };
                for reasoning in &message.reasoning_content {
                    if self
                        .reasoning_seen
                        .insert((message.id.clone(), reasoning.label.clone()))
                    {
                        lines.push(format!("  … {}", reasoning.label));
                    }
                }
                if !message.is_streaming
                    && message.role == Role::Assistant
                    && self.finished.insert(message.id.clone())
                {
                    let agent = message.agent_type.map(|a| a.as_str()).unwrap_or("assistant");
                    lines.push(format!("✓ {agent} agent finished"));
                }
            }
            StoreEvent::Deleted(_) | StoreEvent::Responding(_) => {}
        }
        lines
    }
}

/// Prints progress lines until the channel closes.
pub async fn follow(store: SharedStore, mut events: broadcast::Receiver<StoreEvent>) {
    let mut progress = Progress::default();
    loop {
        match events.recv().await {
            Ok(event) => {
                for line in progress.observe(&event, &store) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::agent::message::{AgentType, Reasoning, ToolCall};

    #[test]
    fn renders_assistant_message() {
        let mut message = Message::assistant("t", AgentType::Troubleshooting);
        message.tool_calls.push(ToolCall {
            label: "troubleshooting_agent_mock_status_done".into(),
            content: "{\n  \"ok\": true\n}".into(),
        });
        message.reasoning_content.push(Reasoning {
            label: "troubleshooting_agent_model_thinking".into(),
            content: "step1\nstep2\n".into(),
            is_streaming: false,
        });
        message.finish(Some(FinishReason::Completed));

        assert_eq!(
            render_message(&message),
            "[assistant · troubleshooting]\n\
             \x20 ⚙ troubleshooting_agent_mock_status_done\n\
             \x20   {\n\
             \x20     \"ok\": true\n\
             \x20   }\n\
             \x20 ✓ troubleshooting_agent_model_thinking\n\
             \x20   step1\n\
             \x20   step2\n"
        );
    }

    #[test]
    fn marks_stopped_and_errored_messages() {
        let mut stopped = Message::assistant("t", AgentType::Planning);
        stopped.finish(None);
        assert!(render_message(&stopped).starts_with("[assistant · planning] (stopped)"));

        let mut errored = Message::assistant("t", AgentType::Planning);
        errored.finish(Some(FinishReason::Error));
        assert!(render_message(&errored).starts_with("[assistant · planning] (error)"));

        assert_eq!(render_message(&Message::user("t", "hi")), "[user]\n  hi\n");
        assert!(render_message(&Message::failure("t")).starts_with("[assistant] (error)\n  Sorry"));
    }

    #[test]
    fn progress_reports_each_milestone_once() {
        let store = SharedStore::new();
        let mut progress = Progress::default();
        let mut message = Message::assistant("t", AgentType::Troubleshooting);
        let id = message.id.clone();

        store.append(message.clone()).unwrap();
        assert_eq!(
            progress.observe(&StoreEvent::Appended(id.clone()), &store),
            vec!["→ troubleshooting agent".to_string()]
        );

        message.reasoning_entry("troubleshooting_agent_code_thinking");
        store.update(message.clone()).unwrap();
        let event = StoreEvent::Updated(id.clone());
        assert_eq!(
            progress.observe(&event, &store),
            vec!["  … troubleshooting_agent_code_thinking".to_string()]
        );
        assert!(progress.observe(&event, &store).is_empty());

        message.finish(Some(FinishReason::Completed));
        store.update(message).unwrap();
        assert_eq!(
            progress.observe(&event, &store),
            vec!["✓ troubleshooting agent finished".to_string()]
        );
    }
}
