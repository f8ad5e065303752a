//! Answer-gap parser.
//!
//! Splits question text into literal runs and `[[correct,distractor,...]]`
//! gap slots. The first candidate of every gap is the canonical answer; the
//! remaining candidates are distractors. Malformed markers are never fatal,
//! they simply stay in the literal text.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separator used when a question does not configure its own.
pub const DEFAULT_SEPARATOR: &str = ",";

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

fn gap_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Inner text may not contain brackets, so a stray `[[` never swallows a later gap.
    PATTERN.get_or_init(|| Regex::new(r"\[\[([^\[\]]*?)\]\]").expect("gap pattern is valid"))
}

/// A fill-in slot extracted from question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Zero-based position in document order.
    pub index: usize,
    /// Candidate values; `candidates[0]` is the canonical answer.
    pub candidates: Vec<String>,
    /// Id of the question the gap belongs to; `None` for free-standing text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
}

impl Gap {
    /// The value graded as correct, if the gap has any candidates at all.
    pub fn canonical(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }

    /// A gap without candidates can be rendered but never answered correctly.
    pub fn is_answerable(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Re-embed the candidates as gap markup using `separator`.
    pub fn to_markup(&self, separator: &str) -> String {
        format!("{OPEN}{}{CLOSE}", self.candidates.join(separator))
    }
}

/// One piece of parsed question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Literal(String),
    Gap(Gap),
}

/// Question text split into literal runs and gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedText {
    pub segments: Vec<Segment>,
}

impl ParsedText {
    /// All gaps in document order.
    pub fn gaps(&self) -> impl Iterator<Item = &Gap> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Gap(g) => Some(g),
            Segment::Literal(_) => None,
        })
    }

    pub fn gap_count(&self) -> usize {
        self.gaps().count()
    }

    /// Canonical answer per gap; `None` for gaps with no candidates.
    pub fn canonical_answers(&self) -> Vec<Option<String>> {
        self.gaps()
            .map(|g| g.canonical().map(str::to_string))
            .collect()
    }

    /// Whether any literal run still contains a gap marker, i.e. the source had
    /// an unmatched `[[` or `]]`.
    pub fn has_stray_markers(&self) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Literal(text) => text.contains(OPEN) || text.contains(CLOSE),
            Segment::Gap(_) => false,
        })
    }

    /// Mark every gap as belonging to `question_id`.
    pub fn owned_by(mut self, question_id: &str) -> Self {
        for segment in &mut self.segments {
            if let Segment::Gap(gap) = segment {
                gap.question_id = Some(question_id.to_string());
            }
        }
        self
    }

    /// Rebuild gap markup from the parsed form.
    pub fn to_markup(&self, separator: &str) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.clone(),
                Segment::Gap(g) => g.to_markup(separator),
            })
            .collect()
    }
}

/// Split the inner text of a gap marker into trimmed, non-empty candidates.
pub fn split_candidates(inner: &str, separator: &str) -> Vec<String> {
    let separator = effective_separator(separator);
    inner
        .split(separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn effective_separator(separator: &str) -> &str {
    if separator.is_empty() {
        DEFAULT_SEPARATOR
    } else {
        separator
    }
}

/// Parse `text` into literal runs and gaps.
///
/// Gap indices follow first-occurrence order. The result depends on nothing
/// but `text` and `separator`.
pub fn parse_gaps(text: &str, separator: &str) -> ParsedText {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for (index, caps) in gap_pattern().captures_iter(text).enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            segments.push(Segment::Literal(text[cursor..whole.start()].to_string()));
        }
        let inner = caps.get(1).map_or("", |m| m.as_str());
        segments.push(Segment::Gap(Gap {
            index,
            candidates: split_candidates(inner, separator),
            question_id: None,
        }));
        cursor = whole.end();
    }

    if cursor < text.len() {
        segments.push(Segment::Literal(text[cursor..].to_string()));
    }

    ParsedText { segments }
}

/// Count gaps without building segments.
pub fn count_gaps(text: &str) -> usize {
    gap_pattern().find_iter(text).count()
}
