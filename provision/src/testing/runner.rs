//! Recorded command execution.

use crate::gateway::{CommandOutput, CommandRunner, Invocation, ServiceError};
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
enum Matcher {
    CommandLine(String),
    CommandPrefix(String),
    StdinContains(String),
}

impl Matcher {
    fn matches(&self, invocation: &Invocation) -> bool {
        match self {
            Self::CommandLine(line) => invocation.command_line() == *line,
            Self::CommandPrefix(prefix) => invocation.command_line().starts_with(prefix.as_str()),
            Self::StdinContains(fragment) => invocation
                .stdin
                .as_deref()
                .is_some_and(|stdin| stdin.contains(fragment.as_str())),
        }
    }
}

/// A [`CommandRunner`] that records invocations instead of running them.
///
/// Responses are matched in registration order and may match any number of
/// times. Unmatched invocations succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    responses: Vec<(Matcher, CommandOutput)>,
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    /// Creates a runner where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Responds with `output` when the command line equals `command_line`.
    #[must_use]
    pub fn respond_to(mut self, command_line: impl Into<String>, output: CommandOutput) -> Self {
        self.responses
            .push((Matcher::CommandLine(command_line.into()), output));
        self
    }

    /// Responds with `output` when the command line starts with `prefix`.
    #[must_use]
    pub fn respond_when_command_starts_with(
        mut self,
        prefix: impl Into<String>,
        output: CommandOutput,
    ) -> Self {
        self.responses
            .push((Matcher::CommandPrefix(prefix.into()), output));
        self
    }

    /// Responds with `output` when standard input contains `fragment`.
    #[must_use]
    pub fn respond_when_stdin_contains(
        mut self,
        fragment: impl Into<String>,
        output: CommandOutput,
    ) -> Self {
        self.responses
            .push((Matcher::StdinContains(fragment.into()), output));
        self
    }

    /// Returns every invocation so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    /// Returns the command line of every invocation so far.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(Invocation::command_line)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ServiceError> {
        self.invocations.lock().push(invocation.clone());
        Ok(self
            .responses
            .iter()
            .find(|(matcher, _)| matcher.matches(invocation))
            .map_or_else(|| CommandOutput::success(""), |(_, output)| output.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_match_wins() {
        let runner = RecordingRunner::new()
            .respond_to("apachectl configtest", CommandOutput::failure(1, "bad"))
            .respond_when_stdin_contains("SELECT", CommandOutput::success("1\n"));

        let config = runner
            .run(&Invocation::new("apachectl").arg("configtest"))
            .await
            .unwrap();
        let query = runner
            .run(&Invocation::new("mysql").stdin("SELECT 1;"))
            .await
            .unwrap();
        let other = runner.run(&Invocation::new("true")).await.unwrap();

        assert_eq!(config.code, Some(1));
        assert_eq!(query.stdout, "1\n");
        assert!(other.is_success());
        assert_eq!(
            runner.command_lines(),
            vec!["apachectl configtest", "mysql", "true"]
        );
    }
}
