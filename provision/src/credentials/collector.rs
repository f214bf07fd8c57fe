//! Prompt, validate and confirm individual fields.

use super::{PromptError, Prompter, SecretString, Validator};
use tracing::debug;

/// Describes one value to collect from the operator.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Stable identifier used in diagnostics.
    pub name: &'static str,
    /// Label shown to the operator.
    pub label: String,
    /// Rule applied to non-empty input.
    pub validator: Validator,
    /// Read without echo.
    pub secret: bool,
    /// Ask twice and require both entries to match.
    pub confirm: bool,
    /// Re-prompt on empty input instead of accepting it.
    pub required: bool,
    /// Value used when the operator enters nothing.
    pub default: Option<String>,
}

impl FieldSpec {
    /// Creates a required, echoed, unconfirmed field.
    #[must_use]
    pub fn new(name: &'static str, label: impl Into<String>, validator: Validator) -> Self {
        Self {
            name,
            label: label.into(),
            validator,
            secret: false,
            confirm: false,
            required: true,
            default: None,
        }
    }

    /// Marks the field as secret.
    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Requires the value to be entered twice.
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirm = true;
        self
    }

    /// Accepts empty input.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the value used on empty input.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn prompt(&self) -> String {
        match &self.default {
            Some(default) if !self.secret => format!("{} [{default}]: ", self.label),
            _ => format!("{}: ", self.label),
        }
    }
}

/// Collects fields through a [`Prompter`].
///
/// There is no retry limit: invalid input re-prompts until the operator
/// enters a valid value or closes the input stream.
pub struct CredentialCollector<'a> {
    prompter: &'a mut dyn Prompter,
}

impl<'a> CredentialCollector<'a> {
    /// Creates a collector over a prompter.
    pub fn new(prompter: &'a mut dyn Prompter) -> Self {
        Self { prompter }
    }

    /// Collects one field.
    ///
    /// Optional fields without a default yield an empty string on empty
    /// input.
    pub fn collect(&mut self, field: &FieldSpec) -> Result<String, PromptError> {
        loop {
            let value = self.read(field, &field.prompt())?;

            if value.is_empty() {
                if let Some(default) = &field.default {
                    debug!(field = field.name, "Using default value");
                    return Ok(default.clone());
                }
                if !field.required {
                    return Ok(String::new());
                }
                self.prompter.notify(&format!("{} is required.", field.label));
                continue;
            }

            if let Err(rule) = field.validator.check(&value) {
                self.prompter.notify(&format!("Invalid {}: {rule}.", field.label));
                continue;
            }

            if field.confirm {
                let again = self.read(field, &format!("Confirm {}: ", field.label))?;
                if again != value {
                    self.prompter.notify("Entries did not match. Please try again.");
                    continue;
                }
            }

            debug!(field = field.name, "Field collected");
            return Ok(value);
        }
    }

    /// Collects one field into a [`SecretString`].
    pub fn collect_secret(&mut self, field: &FieldSpec) -> Result<SecretString, PromptError> {
        self.collect(field).map(SecretString::from)
    }

    /// Shows an informational message.
    pub fn notify(&mut self, message: &str) {
        self.prompter.notify(message);
    }

    fn read(&mut self, field: &FieldSpec, prompt: &str) -> Result<String, PromptError> {
        if field.secret {
            self.prompter.read_secret(prompt)
        } else {
            self.prompter.read_line(prompt).map(|v| v.trim().to_string())
        }
    }
}
