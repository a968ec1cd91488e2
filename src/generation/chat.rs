//! Chat turn assembly and the streaming event shape.

use crate::models::{ChatTurn, SourceCitation};
use crate::types::RagError;

use super::client::ChatMessage;
use super::prompts;

/// Prior turns carried into each request.
pub const HISTORY_TURNS: usize = 5;

/// A complete, non-streamed chat reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub reply: String,
    pub sources: Vec<SourceCitation>,
}

/// One event on a streamed chat reply.
///
/// Fragments arrive in model emission order; `Done` is terminal and carries
/// the concatenated text so consumers need not reassemble it themselves.
#[derive(Debug, Clone)]
pub enum ChatStreamEvent {
    Fragment(String),
    Done {
        full_text: String,
        sources: Vec<SourceCitation>,
    },
}

/// Builds the message list for a chat completion: system prompt, then the
/// most recent history turns, then the current question.
pub fn build_messages(
    system_prompt: String,
    history: &[ChatTurn],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(HISTORY_TURNS + 2);
    messages.push(ChatMessage::system(system_prompt));
    for turn in prompts::recent_history(history, HISTORY_TURNS) {
        messages.push(ChatMessage {
            role: turn.role.clone(),
            content: turn.content.clone(),
        });
    }
    messages.push(ChatMessage::user(question));
    messages
}

/// Wraps a raw fragment stream into chat events, appending a terminal `Done`.
///
/// Dropping the returned receiver drops the forwarding task's sender on its
/// next send, which in turn drops the upstream receiver and cancels the
/// request.
pub fn into_event_stream(
    fragments: flume::Receiver<Result<String, RagError>>,
    sources: Vec<SourceCitation>,
) -> flume::Receiver<Result<ChatStreamEvent, RagError>> {
    let (tx, rx) = flume::bounded(32);
    tokio::spawn(async move {
        let mut full_text = String::new();
        while let Ok(fragment) = fragments.recv_async().await {
            match fragment {
                Ok(text) => {
                    full_text.push_str(&text);
                    if tx
                        .send_async(Ok(ChatStreamEvent::Fragment(text)))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send_async(Err(err)).await;
                    return;
                }
            }
        }
        let _ = tx
            .send_async(Ok(ChatStreamEvent::Done { full_text, sources }))
            .await;
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.into(),
            content: content.into(),
        }
    }

    #[test]
    fn messages_start_with_system_and_end_with_question() {
        let history = vec![turn("user", "earlier question"), turn("assistant", "earlier answer")];
        let messages = build_messages("system prompt".into(), &history, "current question");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[3].content, "current question");
    }

    #[test]
    fn long_history_is_truncated_to_recent_turns() {
        let history: Vec<ChatTurn> = (0..9).map(|i| turn("user", &format!("t{i}"))).collect();
        let messages = build_messages("sys".into(), &history, "q");
        // system + 5 history turns + question
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[1].content, "t4");
    }

    #[tokio::test]
    async fn event_stream_ends_with_done_carrying_full_text() {
        let (tx, fragments) = flume::unbounded();
        tx.send(Ok("Hello ".to_string())).unwrap();
        tx.send(Ok("world".to_string())).unwrap();
        drop(tx);

        let sources = vec![SourceCitation {
            page_number: 3,
            source: "book.txt".into(),
            class_level: "Class IX".into(),
        }];
        let events = into_event_stream(fragments, sources);

        let mut fragments_seen = Vec::new();
        let mut done = None;
        while let Ok(event) = events.recv_async().await {
            match event.unwrap() {
                ChatStreamEvent::Fragment(text) => fragments_seen.push(text),
                ChatStreamEvent::Done { full_text, sources } => done = Some((full_text, sources)),
            }
        }
        assert_eq!(fragments_seen, vec!["Hello ".to_string(), "world".to_string()]);
        let (full_text, sources) = done.unwrap();
        assert_eq!(full_text, "Hello world");
        assert_eq!(sources.len(), 1);
    }

    #[tokio::test]
    async fn upstream_error_terminates_the_stream() {
        let (tx, fragments) = flume::unbounded();
        tx.send(Ok("partial".to_string())).unwrap();
        tx.send(Err(RagError::Completion("connection reset".into())))
            .unwrap();
        drop(tx);

        let events = into_event_stream(fragments, Vec::new());
        let mut saw_error = false;
        while let Ok(event) = events.recv_async().await {
            if event.is_err() {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}
