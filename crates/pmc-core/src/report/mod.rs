//! Execution reporter: an ordered, unbounded message channel between the
//! background worker and the single foreground consumer.
//!
//! Every operation ends with exactly one [`Message::Completed`]. Anything
//! posted after the marker is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::execute::{ExecutionOutcome, ProjectResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl MessageLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageLevel::Debug => "debug",
            MessageLevel::Info => "info",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: MessageLevel,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Log(LogEntry),
    ProjectResult {
        project: String,
        result: ProjectResult,
    },
    /// Terminates the stream. `outcome` is absent when the operation failed
    /// before execution started.
    Completed {
        outcome: Option<ExecutionOutcome>,
    },
}

impl Message {
    pub fn is_completion(&self) -> bool {
        matches!(self, Message::Completed { .. })
    }
}

/// Create a connected reporter and receiver.
pub fn channel() -> (Reporter, ReportReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = Reporter {
        inner: Arc::new(Mutex::new(Sender {
            tx,
            completed: false,
        })),
    };
    let receiver = ReportReceiver { rx, done: false };
    (reporter, receiver)
}

#[derive(Debug)]
struct Sender {
    tx: mpsc::UnboundedSender<Message>,
    completed: bool,
}

/// Producer side. Cheap to clone; every clone feeds the same stream.
#[derive(Debug, Clone)]
pub struct Reporter {
    inner: Arc<Mutex<Sender>>,
}

impl Reporter {
    /// Post a non-terminal message. Returns false once completed.
    pub fn post(&self, message: Message) -> bool {
        if let Message::Completed { outcome } = message {
            return self.complete(outcome);
        }
        let sender = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if sender.completed {
            tracing::debug!("dropping message posted after completion");
            return false;
        }
        // The receiver may be gone; producers don't care.
        sender.tx.send(message).is_ok()
    }

    pub fn log(&self, level: MessageLevel, text: impl Into<String>) -> bool {
        self.post(Message::Log(LogEntry {
            level,
            text: text.into(),
            timestamp: Utc::now(),
        }))
    }

    pub fn info(&self, text: impl Into<String>) -> bool {
        self.log(MessageLevel::Info, text)
    }

    pub fn warning(&self, text: impl Into<String>) -> bool {
        self.log(MessageLevel::Warning, text)
    }

    pub fn error(&self, text: impl Into<String>) -> bool {
        self.log(MessageLevel::Error, text)
    }

    pub fn project_result(&self, project: impl Into<String>, result: ProjectResult) -> bool {
        self.post(Message::ProjectResult {
            project: project.into(),
            result,
        })
    }

    /// Post the completion marker. Only the first call has any effect.
    pub fn complete(&self, outcome: Option<ExecutionOutcome>) -> bool {
        let mut sender = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if sender.completed {
            return false;
        }
        sender.completed = true;
        let _ = sender.tx.send(Message::Completed { outcome });
        true
    }

    pub fn is_completed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .completed
    }

    /// Guard that posts an empty completion marker when dropped.
    pub fn completion_guard(&self) -> CompletionGuard {
        CompletionGuard {
            reporter: self.clone(),
        }
    }
}

/// Posts `Completed { outcome: None }` on drop unless the operation already
/// completed. Covers early returns and panics in the worker.
#[derive(Debug)]
pub struct CompletionGuard {
    reporter: Reporter,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.reporter.complete(None) {
            tracing::debug!("operation ended without completing; posted marker");
        }
    }
}

/// Consumer side. Yields messages in post order up to and including the
/// completion marker, then nothing.
#[derive(Debug)]
pub struct ReportReceiver {
    rx: mpsc::UnboundedReceiver<Message>,
    done: bool,
}

impl ReportReceiver {
    pub async fn recv(&mut self) -> Option<Message> {
        if self.done {
            return None;
        }
        let message = self.rx.recv().await;
        self.observe(message)
    }

    /// Blocking drain for a foreground thread outside the runtime.
    pub fn blocking_iter(self) -> BlockingIter {
        BlockingIter { receiver: self }
    }

    /// Drain everything up to the marker.
    pub async fn collect(mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await {
            messages.push(message);
        }
        messages
    }

    fn observe(&mut self, message: Option<Message>) -> Option<Message> {
        match message {
            Some(message) => {
                if message.is_completion() {
                    self.done = true;
                    self.rx.close();
                }
                Some(message)
            }
            None => {
                // Every reporter dropped without a marker; nothing more will arrive.
                self.done = true;
                None
            }
        }
    }
}

pub struct BlockingIter {
    receiver: ReportReceiver,
}

impl Iterator for BlockingIter {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        if self.receiver.done {
            return None;
        }
        let message = self.receiver.rx.blocking_recv();
        self.receiver.observe(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|message| match message {
                Message::Log(entry) => Some(entry.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn messages_arrive_in_post_order_then_stop() {
        let (reporter, receiver) = channel();
        reporter.info("one");
        reporter.warning("two");
        reporter.clone().error("three");
        reporter.complete(None);

        let messages = receiver.collect().await;
        assert_eq!(texts(&messages), vec!["one", "two", "three"]);
        assert!(messages.last().is_some_and(Message::is_completion));
    }

    #[tokio::test]
    async fn completion_is_posted_once_and_seals_the_stream() {
        let (reporter, receiver) = channel();
        assert!(reporter.complete(None));
        assert!(!reporter.complete(None));
        assert!(!reporter.info("late"));

        let messages = receiver.collect().await;
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn guard_completes_on_drop() {
        let (reporter, receiver) = channel();
        {
            let _guard = reporter.completion_guard();
            reporter.info("working");
        }
        let messages = receiver.collect().await;
        assert_eq!(messages.len(), 2);
        assert!(reporter.is_completed());
    }

    #[test]
    fn blocking_iter_drains_from_another_thread() {
        let (reporter, receiver) = channel();
        let producer = std::thread::spawn(move || {
            for i in 0..5 {
                reporter.info(format!("line {i}"));
            }
            reporter.complete(None);
        });
        let messages: Vec<_> = receiver.blocking_iter().collect();
        producer.join().unwrap();
        assert_eq!(messages.len(), 6);
    }
}
