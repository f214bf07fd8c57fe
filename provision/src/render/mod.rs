//! Template rendering for service configuration, SQL and firewall rules.
//!
//! Templates use `{NAME}` placeholders. `{{` and `}}` produce literal braces,
//! which Apache (`%{GLOBAL}`) and Asterisk (`${EXTEN}`) syntax both need.
//! Rendering is pure: it never touches the filesystem and never logs the
//! substituted values.

mod escape;
mod template;
pub mod templates;

pub use escape::{python_literal, sql_string};
pub use template::{render, RenderedArtifact, Substitutions, Template};

use thiserror::Error;

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// One or more placeholders had no substitution.
    #[error("template '{template}' has unresolved placeholders: {}", names.join(", "))]
    Unresolved {
        /// The template being rendered.
        template: String,
        /// Every missing name, sorted and de-duplicated.
        names: Vec<String>,
    },

    /// The template text is not well formed.
    #[error("template '{template}' is malformed at byte {offset}: {reason}")]
    Malformed {
        /// The template being rendered.
        template: String,
        /// Byte offset of the problem.
        offset: usize,
        /// What is wrong.
        reason: String,
    },
}
