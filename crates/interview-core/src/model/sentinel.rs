use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const PROBLEMATIC_CONTENT_CODE: &str = "5j3k";
pub const INTERVIEW_END_CODE: &str = "x7y8";

pub const PROBLEMATIC_CONTENT_MESSAGE: &str =
    "Thank you for participating, the interview concludes here.";
pub const INTERVIEW_END_MESSAGE: &str = "Thank you very much for participating in the interview and sharing your valuable perspectives. Your time and insights are greatly appreciated for this research project!";

/// A closing code the backend emits as the entire content of a turn, paired
/// with the message shown to the respondent instead of the code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentinelCode {
    pub code: String,
    pub message: String,
}

impl SentinelCode {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The closed, ordered set of registered sentinel codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelRegistry {
    codes: Vec<SentinelCode>,
}

impl SentinelRegistry {
    /// Build a registry. Codes must be non-empty after trimming and unique.
    pub fn new(codes: Vec<SentinelCode>) -> Result<Self, CoreError> {
        for (i, c) in codes.iter().enumerate() {
            if c.code.trim().is_empty() {
                return Err(CoreError::Config(format!("sentinel #{i} has an empty code")));
            }
            if c.code.trim() != c.code {
                return Err(CoreError::Config(format!(
                    "sentinel code '{}' has surrounding whitespace",
                    c.code
                )));
            }
            if codes[..i].iter().any(|prev| prev.code == c.code) {
                return Err(CoreError::Config(format!(
                    "sentinel code '{}' registered twice",
                    c.code
                )));
            }
        }
        Ok(Self { codes })
    }

    /// Exact match of the trimmed text against the registered codes.
    /// The first registered code wins.
    pub fn match_exact(&self, text: &str) -> Option<&SentinelCode> {
        let trimmed = text.trim();
        self.codes.iter().find(|c| c.code == trimmed)
    }

    pub fn is_code(&self, text: &str) -> bool {
        self.match_exact(text).is_some()
    }

    pub fn is_display_message(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.codes.iter().any(|c| c.message == trimmed)
    }

    /// True if the text is either a raw code or its display message.
    pub fn is_sentinel_text(&self, text: &str) -> bool {
        self.is_code(text) || self.is_display_message(text)
    }

    pub fn message_for(&self, code: &str) -> Option<&str> {
        self.match_exact(code).map(|c| c.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SentinelCode> {
        self.codes.iter()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for SentinelRegistry {
    fn default() -> Self {
        Self {
            codes: default_sentinels(),
        }
    }
}

pub fn default_sentinels() -> Vec<SentinelCode> {
    vec![
        SentinelCode::new(PROBLEMATIC_CONTENT_CODE, PROBLEMATIC_CONTENT_MESSAGE),
        SentinelCode::new(INTERVIEW_END_CODE, INTERVIEW_END_MESSAGE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_after_trim() {
        let registry = SentinelRegistry::default();
        assert_eq!(
            registry.match_exact("  x7y8\n").map(|c| c.code.as_str()),
            Some("x7y8")
        );
        assert!(registry.match_exact("x7y8extra").is_none());
        assert!(registry.match_exact("x7").is_none());
        assert!(registry.match_exact("say x7y8").is_none());
    }

    #[test]
    fn test_message_lookup() {
        let registry = SentinelRegistry::default();
        assert_eq!(
            registry.message_for("5j3k"),
            Some(PROBLEMATIC_CONTENT_MESSAGE)
        );
        assert!(registry.is_display_message(INTERVIEW_END_MESSAGE));
        assert!(registry.is_sentinel_text("5j3k"));
        assert!(!registry.is_sentinel_text("Tell me more"));
    }

    #[test]
    fn test_rejects_duplicate_and_empty_codes() {
        let dup = vec![SentinelCode::new("a1", "one"), SentinelCode::new("a1", "two")];
        assert!(SentinelRegistry::new(dup).is_err());
        assert!(SentinelRegistry::new(vec![SentinelCode::new("  ", "blank")]).is_err());
        assert!(SentinelRegistry::new(vec![SentinelCode::new(" a1", "padded")]).is_err());
    }

    #[test]
    fn test_first_registered_wins() {
        // Codes are unique by construction, so the rule only shows through order.
        let registry = SentinelRegistry::new(vec![
            SentinelCode::new("zz", "first"),
            SentinelCode::new("yy", "second"),
        ])
        .unwrap();
        let order: Vec<_> = registry.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(order, vec!["zz", "yy"]);
        assert_eq!(registry.match_exact("yy").unwrap().message, "second");
    }
}
