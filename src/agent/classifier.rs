//! Label tables: which agent a label belongs to and which message field it
//! feeds.

use super::message::{AgentType, ReturnType};

/// Message field a record is routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Content,
    ToolCall,
    Reasoning,
}

/// Maps a label to its agent. First matching rule wins.
pub fn classify(label: &str) -> Option<AgentType> {
    if label.starts_with("planning_agent") {
        Some(AgentType::Planning)
    } else if label.starts_with("troubleshooting_agent") {
        Some(AgentType::Troubleshooting)
    } else if label.contains("summarizing") || label.starts_with("final_summarizer") {
        Some(AgentType::Summarizing)
    } else {
        None
    }
}

/// Picks the message field for a label. Unknown labels fall back on their
/// return type: streamed ones are reasoning, the rest is content.
pub fn route(label: &str, return_type: ReturnType) -> Route {
    match label {
        "planning_agent_troubleshooting_text" | "summarizing_agent_result" => Route::Content,
        "planning_agent_knowledge" | "troubleshooting_agent_mock_status_done" => Route::ToolCall,
        "troubleshooting_agent_model_thinking"
        | "troubleshooting_agent_refined_apis"
        | "troubleshooting_agent_code_thinking" => Route::Reasoning,
        _ => match return_type {
            ReturnType::Stream => Route::Reasoning,
            ReturnType::Normal => Route::Content,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn classifies_known_prefixes() {
        assert_eq!(classify("planning_agent_knowledge"), Some(AgentType::Planning));
        assert_eq!(
            classify("troubleshooting_agent_model_thinking"),
            Some(AgentType::Troubleshooting)
        );
        assert_eq!(classify("summarizing_agent_result"), Some(AgentType::Summarizing));
        assert_eq!(classify("final_summarizerr"), Some(AgentType::Summarizing));
        assert_eq!(classify("find_root_cause"), None);
        assert_eq!(classify("chat_delta"), None);
    }

    #[test]
    fn first_rule_wins() {
        assert_eq!(classify("planning_agent_summarizing"), Some(AgentType::Planning));
    }

    #[test]
    fn routes_fixed_labels() {
        assert_eq!(route("planning_agent_knowledge", ReturnType::Normal), Route::ToolCall);
        assert_eq!(
            route("planning_agent_troubleshooting_text", ReturnType::Normal),
            Route::Content
        );
        assert_eq!(
            route("troubleshooting_agent_refined_apis", ReturnType::Stream),
            Route::Reasoning
        );
        assert_eq!(
            route("troubleshooting_agent_mock_status_done", ReturnType::Normal),
            Route::ToolCall
        );
        assert_eq!(route("summarizing_agent_result", ReturnType::Normal), Route::Content);
    }

    #[test]
    fn unknown_labels_route_by_return_type() {
        assert_eq!(route("chat_delta", ReturnType::Stream), Route::Reasoning);
        assert_eq!(route("find_root_cause", ReturnType::Normal), Route::Content);
    }
}
