//! Conversation context windows for prompts.
//!
//! Stored turns are loaded once per request; these helpers decide how much of
//! that history each phase sees and how it is rendered.

use crate::types::{ChatMessage, Turn};

/// Default number of recent turns loaded from the store.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default number of turns rendered into classification and synthesis prompts.
pub const DEFAULT_PROMPT_HISTORY_WINDOW: usize = 5;

/// Suffix appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Most recent `window_size` turns, oldest first.
pub fn truncate_history(history: &[Turn], window_size: usize) -> &[Turn] {
    if history.len() <= window_size {
        history
    } else {
        &history[history.len() - window_size..]
    }
}

/// Render turns as `role: content` lines.
///
/// Returns an empty string for an empty history.
pub fn format_history_for_prompt(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert turns into chat messages for multi-turn completions.
pub fn history_as_messages(history: &[Turn]) -> Vec<ChatMessage> {
    history.iter().map(Turn::to_chat_message).collect()
}

/// Drop a trailing user turn that repeats the message being answered.
///
/// Callers commonly persist the user message before asking for an answer.
pub fn without_pending_message<'a>(history: &'a [Turn], message: &str) -> &'a [Turn] {
    match history.split_last() {
        Some((last, rest))
            if last.role == crate::types::MessageRole::User
                && last.content.trim() == message.trim() =>
        {
            rest
        }
        _ => history,
    }
}

/// Estimates token count for a text (rough approximation).
///
/// Uses a simple heuristic of ~4 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Cut `text` to at most `max_chars` characters, marking the cut with [`ELLIPSIS`].
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    fn turns(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user("c", format!("question {}", i))
                } else {
                    Turn::assistant("c", format!("answer {}", i))
                }
            })
            .collect()
    }

    #[test]
    fn test_truncate_history_within_window() {
        let history = turns(3);
        assert_eq!(truncate_history(&history, 10).len(), 3);
    }

    #[test]
    fn test_truncate_history_keeps_newest() {
        let history = turns(8);
        let window = truncate_history(&history, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "answer 5");
        assert_eq!(window[2].content, "answer 7");
    }

    #[test]
    fn test_format_history() {
        let history = turns(2);
        assert_eq!(
            format_history_for_prompt(&history),
            "user: question 0\nassistant: answer 1"
        );
        assert_eq!(format_history_for_prompt(&[]), "");
    }

    #[test]
    fn test_history_as_messages() {
        let messages = history_as_messages(&turns(2));
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn test_without_pending_message() {
        let mut history = turns(2);
        history.push(Turn::user("c", "what about RNNs?"));
        assert_eq!(without_pending_message(&history, " what about RNNs? ").len(), 2);
        assert_eq!(without_pending_message(&history, "something else").len(), 3);
        assert!(without_pending_message(&[], "x").is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 300), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
    }
}
