//! Operator terminal abstraction.

use super::PromptError;
use std::io::{self, BufRead, Write};

/// A source of operator input.
///
/// Implementations strip the trailing line ending and report end-of-file as
/// [`PromptError::Closed`].
pub trait Prompter: Send {
    /// Shows `prompt` and reads one line with echo.
    fn read_line(&mut self, prompt: &str) -> Result<String, PromptError>;

    /// Shows `prompt` and reads one line without echo.
    fn read_secret(&mut self, prompt: &str) -> Result<String, PromptError>;

    /// Shows an informational message.
    fn notify(&mut self, message: &str);

    /// Asks a yes/no question. Empty input means no.
    fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        loop {
            let answer = self.read_line(&format!("{question} [y/N]: "))?;
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                _ => self.notify("Please answer 'y' or 'n'."),
            }
        }
    }
}

/// Prompts on the controlling terminal.
///
/// Secrets are read with `rpassword`, which disables echo.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Creates a terminal prompter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String, PromptError> {
        let mut stdout = io::stdout();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(strip_line_ending(line))
    }

    fn read_secret(&mut self, prompt: &str) -> Result<String, PromptError> {
        match rpassword::prompt_password(prompt) {
            Ok(value) => Ok(strip_line_ending(value)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(PromptError::Closed),
            Err(e) => Err(PromptError::Io(e)),
        }
    }

    fn notify(&mut self, message: &str) {
        println!("{message}");
    }
}

fn strip_line_ending(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending("abc\r\n".to_string()), "abc");
        assert_eq!(strip_line_ending("abc".to_string()), "abc");
    }

    #[test]
    fn test_confirm_reprompts_until_answered() {
        let mut prompter = ScriptedPrompter::new(["maybe", "YES"]);
        assert!(prompter.confirm("Re-run?").unwrap());
        assert_eq!(prompter.messages(), vec!["Please answer 'y' or 'n'."]);
    }

    #[test]
    fn test_confirm_defaults_to_no() {
        let mut prompter = ScriptedPrompter::new([""]);
        assert!(!prompter.confirm("Re-run?").unwrap());
    }

    #[test]
    fn test_confirm_on_closed_input() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(matches!(prompter.confirm("Re-run?"), Err(PromptError::Closed)));
    }
}
