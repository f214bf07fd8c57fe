//! Placeholder substitution.

use super::RenderError;
use crate::core::{ArtifactKind, ArtifactRecord};
use crate::credentials::SecretString;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Named values to substitute into a template.
///
/// Values added through [`Substitutions::secret`] mark any artifact that uses
/// them as sensitive. `Debug` lists names only.
#[derive(Clone, Default)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
    secrets: BTreeSet<String>,
}

impl Substitutions {
    /// Creates an empty substitution set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Adds a secret value.
    #[must_use]
    pub fn secret(mut self, name: impl Into<String>, value: &SecretString) -> Self {
        let name = name.into();
        self.secrets.insert(name.clone());
        self.values.insert(name, value.expose().to_string());
        self
    }

    /// Adds a secret value after transforming it (for example escaping).
    #[must_use]
    pub fn secret_with(
        mut self,
        name: impl Into<String>,
        value: &SecretString,
        transform: impl FnOnce(&str) -> String,
    ) -> Self {
        let name = name.into();
        self.secrets.insert(name.clone());
        self.values.insert(name, transform(value.expose()));
        self
    }

    /// Sets a plain value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the value for a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn is_secret(&self, name: &str) -> bool {
        self.secrets.contains(name)
    }
}

impl fmt::Debug for Substitutions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Substitutions")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A named template for one kind of artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    kind: ArtifactKind,
    name: &'static str,
    text: &'static str,
}

impl Template {
    /// Creates a template.
    #[must_use]
    pub const fn new(kind: ArtifactKind, name: &'static str, text: &'static str) -> Self {
        Self { kind, name, text }
    }

    /// Returns the template name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the artifact kind.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Returns the raw template text.
    #[must_use]
    pub const fn text(&self) -> &'static str {
        self.text
    }

    /// Returns every placeholder name the template references.
    pub fn placeholders(&self) -> Result<BTreeSet<String>, RenderError> {
        let mut names = BTreeSet::new();
        scan(self.name, self.text, |segment| {
            if let Segment::Placeholder(name) = segment {
                names.insert(name.to_string());
            }
        })?;
        Ok(names)
    }

    /// Renders the template.
    ///
    /// Every placeholder must resolve; the error lists all missing names.
    /// Substituted values are inserted verbatim and never rescanned.
    pub fn render(&self, subs: &Substitutions) -> Result<RenderedArtifact, RenderError> {
        let Substituted { content, secrets, sensitive } = substitute(self.name, self.text, subs)?;
        Ok(RenderedArtifact {
            kind: self.kind,
            name: self.name.to_string(),
            content,
            sensitive,
            secrets,
        })
    }
}

/// Renders free-form template text.
pub fn render(text: &str, subs: &Substitutions) -> Result<String, RenderError> {
    substitute("inline", text, subs).map(|out| out.content)
}

struct Substituted {
    content: String,
    /// Distinct non-empty secret values, as substituted.
    secrets: Vec<String>,
    sensitive: bool,
}

fn substitute(template: &str, text: &str, subs: &Substitutions) -> Result<Substituted, RenderError> {
    let mut content = String::with_capacity(text.len());
    let mut missing = BTreeSet::new();
    let mut secrets: Vec<String> = Vec::new();
    let mut sensitive = false;

    scan(template, text, |segment| match segment {
        Segment::Literal(text) => content.push_str(text),
        Segment::Placeholder(name) => match subs.get(name) {
            Some(value) => {
                if subs.is_secret(name) {
                    sensitive = true;
                    if !value.is_empty() && !secrets.iter().any(|s| s == value) {
                        secrets.push(value.to_string());
                    }
                }
                content.push_str(value);
            }
            None => {
                missing.insert(name.to_string());
            }
        },
    })?;

    if !missing.is_empty() {
        return Err(RenderError::Unresolved {
            template: template.to_string(),
            names: missing.into_iter().collect(),
        });
    }

    // Longest first so a secret containing another is masked whole.
    secrets.sort_by(|a, b| b.len().cmp(&a.len()));
    Ok(Substituted { content, secrets, sensitive })
}

/// Materialized template output, consumed once by a gateway or the editor.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    kind: ArtifactKind,
    name: String,
    content: String,
    sensitive: bool,
    secrets: Vec<String>,
}

impl RenderedArtifact {
    /// Returns the artifact kind.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Returns the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the rendered text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consumes the artifact, returning its text.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }

    /// Returns true if a secret was substituted into the content.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Replaces every secret value substituted into this artifact with
    /// `<redacted>`, for text that may echo the content back (such as a
    /// command's stderr).
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "<redacted>"))
    }

    /// Returns the SHA-256 digest of the content, hex encoded.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.content.as_bytes()))
    }

    /// Returns a loggable record of this artifact.
    #[must_use]
    pub fn record(&self) -> ArtifactRecord {
        ArtifactRecord {
            kind: self.kind,
            name: self.name.clone(),
            digest: self.digest(),
            target: None,
            changed: false,
        }
    }
}

impl fmt::Debug for RenderedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RenderedArtifact");
        s.field("kind", &self.kind).field("name", &self.name);
        if self.sensitive {
            s.field("content", &"<redacted>");
        } else {
            s.field("content", &self.content);
        }
        s.field("digest", &self.digest()).finish()
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn scan<'a>(
    template: &str,
    text: &'a str,
    mut visit: impl FnMut(Segment<'a>),
) -> Result<(), RenderError> {
    let malformed = |offset: usize, reason: &str| RenderError::Malformed {
        template: template.to_string(),
        offset,
        reason: reason.to_string(),
    };

    let mut rest = text;
    while let Some(idx) = rest.find(|c: char| c == '{' || c == '}') {
        let offset = text.len() - rest.len() + idx;
        if idx > 0 {
            visit(Segment::Literal(&rest[..idx]));
        }
        let tail = &rest[idx..];

        if let Some(after) = tail.strip_prefix("{{") {
            visit(Segment::Literal("{"));
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            visit(Segment::Literal("}"));
            rest = after;
            continue;
        }
        if tail.starts_with('}') {
            return Err(malformed(offset, "unmatched '}'"));
        }

        let Some(close) = tail.find('}') else {
            return Err(malformed(offset, "unclosed '{'"));
        };
        let name = &tail[1..close];
        if !is_placeholder_name(name) {
            return Err(malformed(offset, "invalid placeholder name"));
        }
        visit(Segment::Placeholder(name));
        rest = &tail[close + 1..];
    }
    if !rest.is_empty() {
        visit(Segment::Literal(rest));
    }
    Ok(())
}

fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
