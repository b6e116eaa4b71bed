//! Deterministic completion service for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use wayfarer_core::Message;

use crate::error::LlmError;
use crate::CompletionService;

type ReplyFn = dyn Fn(&str, &[Message]) -> Result<String, LlmError> + Send + Sync;

enum Script {
    Queue(Mutex<VecDeque<Result<String, LlmError>>>),
    Func(Box<ReplyFn>),
}

/// One call observed by a [`ScriptedCompletion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub turns: Vec<Message>,
}

/// Completion service that replays canned replies and records every call.
pub struct ScriptedCompletion {
    script: Script,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedCompletion {
    /// Replies are returned in order; once drained, calls fail with
    /// [`LlmError::Exhausted`].
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Like [`ScriptedCompletion::new`] but individual steps may fail.
    pub fn with_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self {
            script: Script::Queue(Mutex::new(results.into_iter().collect())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Compute each reply from the system prompt and turns.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &[Message]) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Script::Func(Box::new(f)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a clone of `err`.
    pub fn failing(err: LlmError) -> Self {
        Self::from_fn(move |_, _| Err(err.clone()))
    }

    /// Calls observed so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, system: &str, turns: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system: system.to_string(),
                turns: turns.to_vec(),
            });
        }

        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .map_err(|e| LlmError::Request(format!("script lock poisoned: {}", e)))?
                .pop_front()
                .unwrap_or(Err(LlmError::Exhausted)),
            Script::Func(f) => f(system, turns),
        }
    }
}
