//! Heuristic input safety filter.
//!
//! Screens user input before it reaches the remote assistant: sanitizes the
//! raw text, rejects jailbreak attempts, and flags out-of-domain queries.
//! Every check is log-observable; only jailbreak detection rejects.

use aho_corasick::AhoCorasick;
use regex::Regex;

use crate::config::SafetyConfig;

/// Maximum accepted input length, in code points.
const MAX_INPUT_CHARS: usize = 5000;

/// Half-width of the context window used to suppress jailbreak false
/// positives, in code points on each side of the matched phrase.
const CONTEXT_RADIUS: usize = 50;

/// Fixed user-facing reason for jailbreak rejections.
pub const HARMFUL_CONTENT_MESSAGE: &str = "Your request contains potentially harmful content. \
     Please rephrase your request to focus on test data generation.";

/// Known override/bypass phrases, matched case-insensitively as substrings.
const JAILBREAK_PHRASES: &[&str] = &[
    "ignore previous instructions",
    "forget all previous",
    "you are now",
    "pretend to be",
    "act as if",
    "system prompt",
    "override",
    "bypass",
    "jailbreak",
    "ignore safety",
    "disable safety",
];

/// Testing-domain vocabulary. Presence near a jailbreak phrase suppresses
/// the match; presence anywhere marks the input as in-domain.
const DOMAIN_KEYWORDS: &[&str] = &[
    "test",
    "testing",
    "data",
    "synthetic",
    "generate",
    "mock",
    "fixture",
    "sample",
    "dataset",
    "scenario",
    "case",
    "validation",
    "verify",
    "assert",
    "expect",
    "input",
    "output",
    "format",
    "schema",
    "structure",
];

/// Small-talk openers, matched as case-insensitive prefixes.
const SMALL_TALK_OPENERS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "please",
    "how are you",
    "what's up",
    "bye",
    "goodbye",
    "see you",
    "help",
    "can you",
];

/// Outcome of classifying one input. Exactly one of the two variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allowed { sanitized: String },
    Rejected { reason: &'static str },
}

impl SafetyVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SafetyVerdict::Allowed { .. })
    }
}

/// Input safety filter. Build once, share by reference.
pub struct SafetyFilter {
    config: SafetyConfig,
    jailbreak: AhoCorasick,
    role_assumption: Regex,
}

impl SafetyFilter {
    pub fn new(config: SafetyConfig) -> Self {
        let jailbreak =
            AhoCorasick::new(JAILBREAK_PHRASES).expect("static jailbreak phrase list compiles");
        let role_assumption = Regex::new(
            r"(?i)(act|pretend|simulate|roleplay|play the role).*(as|of|being).*(admin|root|system|developer)",
        )
        .expect("static role-assumption pattern compiles");
        Self {
            config,
            jailbreak,
            role_assumption,
        }
    }

    /// Sanitize and classify one raw user input.
    ///
    /// Empty input is domain-irrelevant but never rejected here; blank-input
    /// validation belongs to the request handler.
    pub fn classify(&self, raw: &str) -> SafetyVerdict {
        if !self.config.filter_enabled {
            return SafetyVerdict::Allowed {
                sanitized: raw.to_string(),
            };
        }

        let sanitized = sanitize(raw);

        if self.config.jailbreak_detection_enabled && self.detect_jailbreak(&sanitized) {
            tracing::warn!(input = %sanitized, "jailbreak attempt detected");
            return SafetyVerdict::Rejected {
                reason: HARMFUL_CONTENT_MESSAGE,
            };
        }

        if self.config.domain_validation_enabled && !is_domain_relevant(&sanitized) {
            // Allowed anyway; the assistant redirects off-topic conversation.
            tracing::info!(input = %sanitized, "out-of-domain query detected");
        }

        SafetyVerdict::Allowed { sanitized }
    }

    fn detect_jailbreak(&self, input: &str) -> bool {
        let lowered = input.to_lowercase();

        for m in self.jailbreak.find_iter(&lowered) {
            // A phrase inside testing vocabulary is a likely false positive.
            let context = context_window(&lowered, m.start(), m.end());
            if !DOMAIN_KEYWORDS.iter().any(|kw| context.contains(kw)) {
                return true;
            }
        }

        // Role-assumption attempts reject regardless of surrounding context.
        self.role_assumption.is_match(input)
    }
}

/// Strip disallowed control characters, collapse whitespace runs, trim, and
/// truncate to [`MAX_INPUT_CHARS`] code points.
fn sanitize(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| !is_stripped_control(*c)).collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > MAX_INPUT_CHARS {
        tracing::warn!(limit = MAX_INPUT_CHARS, "input truncated");
        return collapsed.chars().take(MAX_INPUT_CHARS).collect();
    }
    collapsed
}

/// Control characters removed by sanitization. Newline, tab and carriage
/// return survive to the whitespace-collapse step.
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

/// Slice of `text` spanning [`CONTEXT_RADIUS`] code points on either side of
/// the `start..end` byte range.
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_RADIUS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

/// Keyword presence or a small-talk opener marks the input as in-domain.
fn is_domain_relevant(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }

    DOMAIN_KEYWORDS.iter().any(|kw| lowered.contains(kw))
        || SMALL_TALK_OPENERS.iter().any(|p| lowered.starts_with(p))
}
