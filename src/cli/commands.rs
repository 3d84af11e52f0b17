//! CLI command implementations
//!
//! Commands report through an [`OutputHandler`] and return the process exit
//! code.

use super::output::{OutputEvent, OutputHandler};
use crate::service::{ChatService, validate_thread_id};
use crate::workflow::{TurnOutcome, WorkflowGraph};
use std::fmt::Display;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

fn report(handler: &dyn OutputHandler, error: impl Display) -> i32 {
    handler.emit(OutputEvent::Error {
        error: error.to_string(),
    });
    1
}

fn turn_event(thread_id: &str, outcome: TurnOutcome) -> OutputEvent {
    OutputEvent::Turn {
        thread_id: thread_id.to_string(),
        answer: outcome.answer,
        path: outcome.path,
        duration_ms: outcome.elapsed.as_millis() as u64,
        state: outcome.state,
    }
}

/// Allocate a thread id
pub fn new_thread(service: &ChatService, handler: &dyn OutputHandler) -> i32 {
    let thread = service.new_thread();
    handler.emit(OutputEvent::ThreadCreated {
        thread_id: thread.thread_id,
        created_at: thread.created_at,
    });
    0
}

/// Send one message and print the answer
pub async fn send(
    service: &ChatService,
    thread_id: &str,
    message: &str,
    handler: &dyn OutputHandler,
) -> i32 {
    match service.send_message(thread_id, message).await {
        Ok(outcome) => {
            handler.emit(turn_event(thread_id, outcome));
            0
        }
        Err(e) => report(handler, e),
    }
}

/// Interactive session: one turn per input line until EOF or `shutdown`
///
/// Blank lines are skipped. A failed turn is reported and the session goes on.
pub async fn chat<R, S>(
    service: &ChatService,
    thread_id: Option<String>,
    input: R,
    shutdown: S,
    handler: &dyn OutputHandler,
) -> i32
where
    R: AsyncBufRead + Unpin,
    S: Future,
{
    let thread_id = match thread_id {
        Some(id) => match validate_thread_id(&id) {
            Ok(()) => id,
            Err(e) => return report(handler, e),
        },
        None => service.new_thread().thread_id,
    };
    handler.emit(OutputEvent::Info {
        message: format!("Thread {} (Ctrl+C to exit)", thread_id),
    });

    tokio::pin!(shutdown);
    let mut lines = input.lines();

    loop {
        handler.prompt();

        let line = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return report(handler, e),
        };
        if line.trim().is_empty() {
            continue;
        }

        let result = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            result = service.send_message(&thread_id, &line) => result,
        };
        match result {
            Ok(outcome) => handler.emit(turn_event(&thread_id, outcome)),
            Err(e) => {
                report(handler, e);
            }
        }
    }

    tracing::debug!(thread_id = %thread_id, "Chat session ended");
    0
}

/// List stored threads, most recently active first
pub async fn list_threads(service: &ChatService, handler: &dyn OutputHandler) -> i32 {
    match service.threads().await {
        Ok(threads) => {
            handler.emit(OutputEvent::Threads { threads });
            0
        }
        Err(e) => report(handler, e),
    }
}

/// Print a thread's transcript
pub async fn show_thread(
    service: &ChatService,
    thread_id: &str,
    handler: &dyn OutputHandler,
) -> i32 {
    match service.conversation(thread_id).await {
        Ok(conversation) => {
            handler.emit(OutputEvent::Conversation { conversation });
            0
        }
        Err(e) => report(handler, e),
    }
}

pub async fn delete_thread(
    service: &ChatService,
    thread_id: &str,
    handler: &dyn OutputHandler,
) -> i32 {
    match service.delete_thread(thread_id).await {
        Ok(checkpoints) => {
            handler.emit(OutputEvent::ThreadDeleted {
                thread_id: thread_id.to_string(),
                checkpoints,
            });
            0
        }
        Err(e) => report(handler, e),
    }
}

/// Print the step graph
pub fn show_graph(graph: &WorkflowGraph, handler: &dyn OutputHandler) -> i32 {
    handler.emit(OutputEvent::Graph {
        entry: graph.entry(),
        edges: graph.edges(),
    });
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::config::Durability;
    use crate::reasoner::ReasoningTask;
    use crate::workflow::testing::{ScriptedQueries, ScriptedReasoner, step_context};
    use crate::workflow::{StepId, WorkflowExecutor, vote_inquiry_graph};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct MockHandler {
        events: Arc<Mutex<Vec<OutputEvent>>>,
    }

    impl MockHandler {
        fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn events(&self) -> Vec<OutputEvent> {
            self.events.lock().unwrap().clone()
        }

        fn answers(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    OutputEvent::Turn { answer, .. } => Some(answer),
                    _ => None,
                })
                .collect()
        }

        fn errors(&self) -> usize {
            self.events()
                .iter()
                .filter(|event| matches!(event, OutputEvent::Error { .. }))
                .count()
        }
    }

    impl OutputHandler for MockHandler {
        fn emit(&self, event: OutputEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn service(scope_replies: usize) -> ChatService {
        let reasoner = (0..scope_replies).fold(ScriptedReasoner::new(), |r, _| {
            r.reply(ReasoningTask::ScopeCheck, json!({"isValidInput": false}))
        });
        ChatService::new(WorkflowExecutor::new(
            vote_inquiry_graph().unwrap(),
            step_context(reasoner, ScriptedQueries::new()),
            Arc::new(InMemoryCheckpointStore::new()),
            Durability::EndOfTurn,
        ))
    }

    #[tokio::test]
    async fn test_send_emits_turn() {
        let service = service(1);
        let handler = MockHandler::new();

        let code = send(&service, "thread_x", "oi", &handler).await;

        assert_eq!(code, 0);
        let events = handler.events();
        match &events[0] {
            OutputEvent::Turn { thread_id, path, .. } => {
                assert_eq!(thread_id, "thread_x");
                assert_eq!(path.first(), Some(&StepId::ScopeCheck));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_invalid_thread_reports_error() {
        let service = service(0);
        let handler = MockHandler::new();

        assert_eq!(send(&service, "bad id", "oi", &handler).await, 1);
        assert_eq!(handler.errors(), 1);
    }

    #[tokio::test]
    async fn test_chat_runs_one_turn_per_line() {
        let service = service(2);
        let handler = MockHandler::new();
        let input: &[u8] = b"oi\n\n   \ntudo bem?\n";

        let code = chat(
            &service,
            Some("thread_x".into()),
            input,
            std::future::pending::<()>(),
            &handler,
        )
        .await;

        assert_eq!(code, 0);
        assert_eq!(handler.answers().len(), 2);

        let view = service.conversation("thread_x").await.unwrap();
        assert_eq!(view.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_chat_stops_on_shutdown() {
        let service = service(1);
        let handler = MockHandler::new();
        let input: &[u8] = b"oi\n";

        let code = chat(&service, None, input, async {}, &handler).await;

        assert_eq!(code, 0);
        assert!(handler.answers().is_empty());
    }

    #[tokio::test]
    async fn test_chat_rejects_invalid_thread() {
        let service = service(0);
        let handler = MockHandler::new();
        let input: &[u8] = b"oi\n";

        let code = chat(
            &service,
            Some("nope".into()),
            input,
            std::future::pending::<()>(),
            &handler,
        )
        .await;

        assert_eq!(code, 1);
        assert_eq!(handler.errors(), 1);
    }

    #[tokio::test]
    async fn test_show_and_delete() {
        let service = service(1);
        let handler = MockHandler::new();

        assert_eq!(show_thread(&service, "thread_x", &handler).await, 1);

        send(&service, "thread_x", "oi", &handler).await;
        assert_eq!(show_thread(&service, "thread_x", &handler).await, 0);
        assert_eq!(list_threads(&service, &handler).await, 0);
        assert_eq!(delete_thread(&service, "thread_x", &handler).await, 0);
        assert_eq!(delete_thread(&service, "thread_x", &handler).await, 1);

        let deleted = handler.events().into_iter().any(|event| {
            matches!(event, OutputEvent::ThreadDeleted { checkpoints: 1, .. })
        });
        assert!(deleted);
    }

    #[test]
    fn test_new_thread_and_graph() {
        let service = service(0);
        let handler = MockHandler::new();

        assert_eq!(new_thread(&service, &handler), 0);
        assert_eq!(show_graph(service.executor().graph(), &handler), 0);

        let events = handler.events();
        assert!(matches!(events[0], OutputEvent::ThreadCreated { .. }));
        match &events[1] {
            OutputEvent::Graph { entry, edges } => {
                assert_eq!(*entry, StepId::ScopeCheck);
                assert!(!edges.is_empty());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
