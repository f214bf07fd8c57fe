//! Field validation predicates.

use regex::Regex;

/// Service number prefixes that may never be stored as a phone number.
const RESTRICTED_PREFIXES: [&str; 3] = ["911", "411", "511"];

/// Characters that would break a config file value if embedded verbatim.
const CONFIG_UNSAFE: &[char] = &[';', '#', '"', '\'', '\\', '[', ']', '=', '{', '}'];

/// A validation rule applied to operator input.
///
/// [`Validator::check`] returns the violated rule's description so it can be
/// shown to the operator before re-prompting.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Any non-empty value.
    NonEmpty,
    /// Exactly `n` ASCII digits.
    ExactDigits(usize),
    /// Between `min` and `max` ASCII digits, inclusive.
    DigitCount {
        /// Minimum number of digits.
        min: usize,
        /// Maximum number of digits.
        max: usize,
    },
    /// A plausible email address.
    Email,
    /// A 4 or 10 digit phone number outside the restricted service prefixes.
    PhoneNumber,
    /// A database or AMI identifier: a letter followed by letters, digits or
    /// underscores, at most 32 characters.
    Identifier,
    /// A password of at least `min_len` characters with no control characters.
    Password {
        /// Minimum length in characters.
        min_len: usize,
    },
    /// A value safe to embed unquoted in a configuration file.
    ConfigToken {
        /// Minimum length in characters.
        min_len: usize,
    },
    /// A regular expression with a human-readable rule.
    Pattern {
        /// The pattern; should be anchored.
        regex: Regex,
        /// Shown to the operator when the pattern does not match.
        rule: String,
    },
}

impl Validator {
    /// Creates a pattern validator.
    pub fn pattern(regex: &str, rule: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self::Pattern {
            regex: Regex::new(regex)?,
            rule: rule.into(),
        })
    }

    /// Returns a description of the rule.
    #[must_use]
    pub fn rule(&self) -> String {
        match self {
            Self::NonEmpty => "must not be empty".to_string(),
            Self::ExactDigits(n) => format!("must be exactly {n} digits"),
            Self::DigitCount { min, max } => format!("must be {min} to {max} digits"),
            Self::Email => "must be an email address such as admin@example.com".to_string(),
            Self::PhoneNumber => "must be 4 or 10 digits and not a restricted service number".to_string(),
            Self::Identifier => {
                "must start with a letter and contain only letters, digits or underscores (max 32)"
                    .to_string()
            }
            Self::Password { min_len } => {
                format!("must be at least {min_len} characters with no control characters")
            }
            Self::ConfigToken { min_len } => format!(
                "must be at least {min_len} characters with no spaces or any of {}",
                CONFIG_UNSAFE.iter().collect::<String>()
            ),
            Self::Pattern { rule, .. } => rule.clone(),
        }
    }

    /// Checks a value, returning the violated rule on failure.
    pub fn check(&self, value: &str) -> Result<(), String> {
        let ok = match self {
            Self::NonEmpty => !value.trim().is_empty(),
            Self::ExactDigits(n) => is_digits(value) && value.len() == *n,
            Self::DigitCount { min, max } => is_digits(value) && (*min..=*max).contains(&value.len()),
            Self::Email => is_email(value),
            Self::PhoneNumber => return check_phone(value),
            Self::Identifier => is_identifier(value),
            Self::Password { min_len } => {
                value.chars().count() >= *min_len && !value.chars().any(char::is_control)
            }
            Self::ConfigToken { min_len } => {
                value.chars().count() >= *min_len
                    && !value
                        .chars()
                        .any(|c| c.is_whitespace() || c.is_control() || CONFIG_UNSAFE.contains(&c))
            }
            Self::Pattern { regex, .. } => regex.is_match(value),
        };
        if ok {
            Ok(())
        } else {
            Err(self.rule())
        }
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    value.len() <= 32
        && matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_email(value: &str) -> bool {
    if value.chars().any(|c| c.is_whitespace() || c.is_control() || c == '\'' || c == '\\') {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

fn check_phone(value: &str) -> Result<(), String> {
    if !is_digits(value) {
        return Err("must contain digits only".to_string());
    }
    if let Some(prefix) = RESTRICTED_PREFIXES.iter().find(|p| value.starts_with(*p)) {
        return Err(format!("cannot use restricted number '{prefix}'"));
    }
    if value.len() != 4 && value.len() != 10 {
        return Err("must be 4 or 10 digits".to_string());
    }
    Ok(())
}
