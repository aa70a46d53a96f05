use std::fmt::Display;

/// A status line which has been trimmed and upper-cased.
///
/// Never empty: [`normalize`] refuses to produce a line with no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine(String);

/// Normalize a raw line as read from the transport (delimiter already stripped).
///
/// Returns `None` if nothing is left after trimming,
/// in which case the line must not be decoded at all.
pub fn normalize<S: AsRef<str>>(raw: S) -> Option<NormalizedLine> {
    let trimmed = raw.as_ref().trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(NormalizedLine(trimmed.to_uppercase()))
    }
}

impl NormalizedLine {
    /// Borrowed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does the line contain the given (upper-case) phrase anywhere?
    pub fn contains(&self, phrase: &str) -> bool {
        self.0.contains(phrase)
    }

    /// Does the line contain any of the given phrases?
    pub fn contains_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|phrase| self.contains(phrase))
    }

    /// The whole words of the line.
    ///
    /// Anything not alphanumeric separates words, so `MANT_BLINK:ON`
    /// yields `MANT`, `BLINK` and `ON`.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
    }

    /// Is any of the given words present as a whole token?
    pub fn has_token(&self, words: &[&str]) -> bool {
        self.tokens().any(|token| words.contains(&token))
    }
}

impl Display for NormalizedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
