//! Scripted operator input.

use crate::credentials::{PromptError, Prompter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Script {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    messages: Vec<String>,
    secret_prompts: usize,
}

/// A [`Prompter`] that replays answers in order.
///
/// Clones share the same script, so a test can keep a handle after boxing
/// the prompter into a stage context. Running out of answers behaves like
/// a closed terminal.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPrompter {
    /// Creates a prompter that answers with `answers` in order.
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Arc::new(Mutex::new(Script {
                answers: answers.into_iter().map(Into::into).collect(),
                ..Script::default()
            })),
        }
    }

    /// Appends more answers.
    pub fn push(&self, answer: impl Into<String>) {
        self.script.lock().answers.push_back(answer.into());
    }

    /// Returns every prompt shown so far, echoed or not.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.script.lock().prompts.clone()
    }

    /// Returns every informational message shown so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.script.lock().messages.clone()
    }

    /// Returns how many secret prompts were shown.
    #[must_use]
    pub fn secret_prompts(&self) -> usize {
        self.script.lock().secret_prompts
    }

    /// Returns how many answers are left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().answers.len()
    }

    fn next(&self, prompt: &str, secret: bool) -> Result<String, PromptError> {
        let mut script = self.script.lock();
        script.prompts.push(prompt.to_string());
        if secret {
            script.secret_prompts += 1;
        }
        script.answers.pop_front().ok_or(PromptError::Closed)
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String, PromptError> {
        self.next(prompt, false)
    }

    fn read_secret(&mut self, prompt: &str) -> Result<String, PromptError> {
        self.next(prompt, true)
    }

    fn notify(&mut self, message: &str) {
        self.script.lock().messages.push(message.to_string());
    }
}
