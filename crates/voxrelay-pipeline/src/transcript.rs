//! Transcript normalization and formatting.
//!
//! Segment text arrives with recognizer artifacts: stray spaces inside CJK
//! prose, spaced-out punctuation, and missing terminal punctuation. Each
//! segment is cleaned and rendered as a `[MM:SS - MM:SS] text` line; an
//! entirely empty transcript collapses to a fixed sentinel message.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::transcribe::Segment;

/// Message delivered when no segment contained usable speech.
pub const NO_SPEECH_SENTINEL: &str = "No clear speech was detected.";

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static SPACED_CJK_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([，。？！：；、])\s*").expect("punctuation regex"));

const TERMINAL_PUNCTUATION: [char; 6] = ['，', '。', '？', '！', '：', '；'];

const fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{3000}'..='\u{303F}'
            | '\u{FF00}'..='\u{FFEF}'
    )
}

/// Clean one segment's text: collapse whitespace runs, close up spacing
/// around CJK punctuation and between CJK characters, and guarantee terminal
/// punctuation. Returns an empty string for whitespace-only input.
#[must_use]
pub fn normalize_segment(text: &str) -> String {
    let collapsed = WHITESPACE_RUNS.replace_all(text.trim(), " ");
    let punctuated = SPACED_CJK_PUNCTUATION.replace_all(&collapsed, "$1");

    let mut cleaned = String::with_capacity(punctuated.len());
    let mut chars = punctuated.chars().peekable();
    let mut previous: Option<char> = None;
    while let Some(c) = chars.next() {
        if c == ' ' {
            let between_cjk = previous.is_some_and(is_cjk)
                && chars.peek().copied().is_some_and(is_cjk);
            if between_cjk {
                continue;
            }
        }
        cleaned.push(c);
        previous = Some(c);
    }

    if cleaned.is_empty() {
        return cleaned;
    }
    if !cleaned.ends_with(TERMINAL_PUNCTUATION) {
        cleaned.push('。');
    }
    cleaned
}

/// Render a second offset as `MM:SS`.
#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(seconds: f64) -> u64 {
    seconds.max(0.0) as u64
}

/// Accumulates normalized, timestamped transcript lines.
#[derive(Debug, Default)]
pub struct TranscriptBuilder {
    body: String,
}

impl TranscriptBuilder {
    /// Start an empty transcript.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            body: String::new(),
        }
    }

    /// Normalize one segment and append its line; segments whose text cleans
    /// down to nothing are dropped.
    pub fn push_segment(&mut self, segment: &Segment) {
        let text = normalize_segment(&segment.text);
        if text.is_empty() {
            return;
        }
        self.body.push_str(&format!(
            "[{} - {}] {text}\n",
            format_timestamp(segment.start_secs),
            format_timestamp(segment.end_secs)
        ));
    }

    /// Finish the transcript, substituting the no-speech sentinel when no
    /// line survived normalization.
    #[must_use]
    pub fn finish(self) -> String {
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            NO_SPEECH_SENTINEL.to_string()
        } else {
            trimmed.to_string()
        }
    }
}
