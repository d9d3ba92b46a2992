//! Validation and salvage of stage output.
//!
//! Transformer stages are supposed to return SRT, but language models
//! drift: they apologize, they wrap output in markdown fences, they
//! prepend commentary. The guard turns any such string into a parsed cue
//! list when possible and a plain `Invalid` value when not. It never
//! panics.

use crate::subtitle::srt;
use crate::subtitle::Cue;
use regex::Regex;
use std::fmt;

/// How a non-strict outcome was salvaged.
///
/// A fenced code block is tried before the header scan: the fence
/// delimits the payload exactly, whereas a header scan over fenced text
/// would drag the closing fence into the last cue's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Parsed from the earliest index-line-plus-timestamp-line match.
    HeaderScan,
    /// Parsed from the body of a fenced code block.
    CodeBlock,
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovery::HeaderScan => write!(f, "first-header"),
            Recovery::CodeBlock => write!(f, "code-block"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Valid(Vec<Cue>),
    Recovered(Vec<Cue>, Recovery),
    Invalid(String),
}

impl GuardOutcome {
    pub fn cues(self) -> Option<Vec<Cue>> {
        match self {
            GuardOutcome::Valid(cues) | GuardOutcome::Recovered(cues, _) => Some(cues),
            GuardOutcome::Invalid(_) => None,
        }
    }
}

pub struct FormatGuard {
    header: Regex,
    fence: Regex,
}

impl Default for FormatGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatGuard {
    pub fn new() -> Self {
        Self {
            header: Regex::new(r"(\d+)[ \t]*\r?\n[ \t]*\d+:\d{2}:\d{2}[,.]\d{3}[ \t]*-[ -][ \t]*>")
                .expect("header regex"),
            fence: Regex::new(r"```(?:srt)?[ \t]*\r?\n((?s:.*?))\r?\n[ \t]*```")
                .expect("fence regex"),
        }
    }

    /// Validate `text` as SRT, salvaging when the strict parse fails.
    pub fn check(&self, text: &str) -> GuardOutcome {
        if text.trim().is_empty() {
            return GuardOutcome::Invalid("empty output".to_string());
        }

        let strict_reason = match srt::parse(text, false) {
            Ok(cues) if !cues.is_empty() => return GuardOutcome::Valid(cues),
            Ok(_) => "no cues found".to_string(),
            Err(e) => e.to_string(),
        };

        if let Some(caps) = self.fence.captures(text) {
            if let Ok(cues) = srt::parse(&caps[1], true) {
                if !cues.is_empty() {
                    return GuardOutcome::Recovered(cues, Recovery::CodeBlock);
                }
            }
        }

        if let Some(caps) = self.header.captures(text) {
            let start = caps.get(1).expect("header group").start();
            if let Ok(cues) = srt::parse(&text[start..], true) {
                if !cues.is_empty() {
                    return GuardOutcome::Recovered(cues, Recovery::HeaderScan);
                }
            }
        }

        GuardOutcome::Invalid(strict_reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "1\n00:00:01,000 --> 00:00:02,000\nhello\n\n2\n00:00:03,000 --> 00:00:04,000\nworld\n";

    #[test]
    fn test_valid_passthrough() {
        let guard = FormatGuard::new();
        match guard.check(WELL_FORMED) {
            GuardOutcome::Valid(cues) => assert_eq!(cues.len(), 2),
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn test_recovers_from_leading_commentary() {
        let guard = FormatGuard::new();
        let text = format!("Sure! Here is the corrected subtitle file:\n\n{}", WELL_FORMED);
        match guard.check(&text) {
            GuardOutcome::Recovered(cues, Recovery::HeaderScan) => {
                assert_eq!(cues.len(), 2);
                assert_eq!(cues[0].content, "hello");
            }
            other => panic!("expected HeaderScan recovery, got {other:?}"),
        }
    }

    #[test]
    fn test_recovers_from_fenced_code_block() {
        let guard = FormatGuard::new();
        let text = "I cannot produce raw output, but here you go:\n```srt\n1\n00:00:01,000 --> 00:00:02,000\n你好\n```\nHope that helps!";
        match guard.check(text) {
            GuardOutcome::Recovered(cues, Recovery::CodeBlock) => {
                assert_eq!(cues.len(), 1);
                assert_eq!(cues[0].content, "你好");
            }
            other => panic!("expected CodeBlock recovery, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_fence_without_language_tag() {
        let guard = FormatGuard::new();
        let text = "```\n1\n00:00:01,000 --> 00:00:02,000\nhi\n```";
        assert!(matches!(
            guard.check(text),
            GuardOutcome::Recovered(_, Recovery::CodeBlock)
        ));
    }

    #[test]
    fn test_fence_preferred_when_both_present() {
        let guard = FormatGuard::new();
        let text = format!(
            "{}\n```srt\n1\n00:00:09,000 --> 00:00:10,000\nother\n```",
            WELL_FORMED
        );
        match guard.check(&text) {
            GuardOutcome::Recovered(cues, Recovery::CodeBlock) => {
                assert_eq!(cues.len(), 1);
                assert_eq!(cues[0].content, "other");
            }
            other => panic!("expected CodeBlock recovery, got {other:?}"),
        }
    }

    #[test]
    fn test_fence_keeps_trailing_prose_out_of_content() {
        let guard = FormatGuard::new();
        let text = "```srt\n1\n00:00:01,000 --> 00:00:02,000\n你好\n```";
        match guard.check(text) {
            GuardOutcome::Recovered(cues, Recovery::CodeBlock) => {
                assert_eq!(cues[0].content, "你好");
            }
            other => panic!("expected CodeBlock recovery, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_outcomes_are_values() {
        let guard = FormatGuard::new();
        for text in ["", "   \n\t\n", "sorry, cannot comply", "1\n2\n3\nnot srt"] {
            assert!(
                matches!(guard.check(text), GuardOutcome::Invalid(_)),
                "expected Invalid for {text:?}"
            );
        }
    }

    #[test]
    fn test_cues_accessor() {
        let guard = FormatGuard::new();
        assert!(guard.check(WELL_FORMED).cues().is_some());
        assert!(guard.check("nope").cues().is_none());
    }
}
