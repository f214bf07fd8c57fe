//! Validated interactive credential collection.
//!
//! Values are collected once per run, held only in process memory and
//! written out only inside rendered artifacts. Secret values are wrapped in
//! [`SecretString`] so neither `Debug` nor `Display` can leak them into logs.

mod collector;
mod prompter;
mod secret;
mod set;
mod validators;

pub use collector::{CredentialCollector, FieldSpec};
pub use prompter::{Prompter, TerminalPrompter};
pub use secret::SecretString;
pub use set::{
    AdminProfile, AmiCredentials, CredentialDefaults, CredentialSet, DatabaseCredentials,
    MessagingCredentials,
};
pub use validators::Validator;

use thiserror::Error;

/// Errors raised while talking to the operator.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The input stream reached end-of-file.
    #[error("operator input closed")]
    Closed,

    /// Reading from or writing to the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A field was declared with an invalid pattern.
    #[error("invalid validation pattern: {0}")]
    Pattern(#[from] regex::Error),
}
