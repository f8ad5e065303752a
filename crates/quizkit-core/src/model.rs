//! Core data model types for quizkit.
//!
//! Questions are loaded once per session and never mutated afterwards. The
//! question variant is a closed sum type: every operation that depends on
//! the variant matches on [`QuestionKind`] exhaustively.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::gaps::{parse_gaps, ParsedText};

/// The seven supported question variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    FillBlank,
    TextCompletion,
    ShortAnswer,
    LongText,
    MediaQuestion,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::SingleChoice => write!(f, "single_choice"),
            QuestionType::MultipleChoice => write!(f, "multiple_choice"),
            QuestionType::FillBlank => write!(f, "fill_blank"),
            QuestionType::TextCompletion => write!(f, "text_completion"),
            QuestionType::ShortAnswer => write!(f, "short_answer"),
            QuestionType::LongText => write!(f, "long_text"),
            QuestionType::MediaQuestion => write!(f, "media_question"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "single_choice" | "single" => Ok(QuestionType::SingleChoice),
            "multiple_choice" | "multiple" => Ok(QuestionType::MultipleChoice),
            "fill_blank" | "fill_in_the_blank" => Ok(QuestionType::FillBlank),
            "text_completion" => Ok(QuestionType::TextCompletion),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "long_text" | "essay" => Ok(QuestionType::LongText),
            "media_question" | "media" => Ok(QuestionType::MediaQuestion),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// An answer option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    /// Letter in authored order ("A", "B", ...).
    pub letter: String,
    pub text: String,
    pub correct: bool,
}

/// Spreadsheet-style letter for a zero-based position: A..Z, AA, AB, ...
pub fn letter_for(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Media attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// "image", "audio", "video", ...
    pub kind: String,
    pub url: String,
}

/// Variant-specific data and answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice {
        options: Vec<QuizOption>,
    },
    MultipleChoice {
        options: Vec<QuizOption>,
    },
    /// Gaps are typed in freely.
    FillBlank {
        separator: String,
    },
    /// Gaps are chosen from their (shuffled) candidates.
    TextCompletion {
        separator: String,
    },
    ShortAnswer {
        /// `|`-delimited accepted answers.
        accepted: String,
    },
    LongText,
    /// Options may be empty (free-text response); without a correct option
    /// the question is graded manually.
    MediaQuestion {
        options: Vec<QuizOption>,
    },
}

/// A single question of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    /// Passage shown with the prompt; the gap source for gap questions when present.
    #[serde(default)]
    pub content: Option<String>,
    pub kind: QuestionKind,
    pub points: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub media: Option<MediaRef>,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        match &self.kind {
            QuestionKind::SingleChoice { .. } => QuestionType::SingleChoice,
            QuestionKind::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionKind::FillBlank { .. } => QuestionType::FillBlank,
            QuestionKind::TextCompletion { .. } => QuestionType::TextCompletion,
            QuestionKind::ShortAnswer { .. } => QuestionType::ShortAnswer,
            QuestionKind::LongText => QuestionType::LongText,
            QuestionKind::MediaQuestion { .. } => QuestionType::MediaQuestion,
        }
    }

    /// Options in authored order; empty for variants without options.
    pub fn options(&self) -> &[QuizOption] {
        match &self.kind {
            QuestionKind::SingleChoice { options }
            | QuestionKind::MultipleChoice { options }
            | QuestionKind::MediaQuestion { options } => options.as_slice(),
            QuestionKind::FillBlank { .. }
            | QuestionKind::TextCompletion { .. }
            | QuestionKind::ShortAnswer { .. }
            | QuestionKind::LongText => &[],
        }
    }

    /// Indices of options flagged correct.
    pub fn correct_indices(&self) -> BTreeSet<usize> {
        self.options()
            .iter()
            .enumerate()
            .filter(|(_, o)| o.correct)
            .map(|(i, _)| i)
            .collect()
    }

    /// The correct option of a single-answer question.
    pub fn correct_index(&self) -> Option<usize> {
        self.options().iter().position(|o| o.correct)
    }

    /// Gap separator for gap questions.
    pub fn separator(&self) -> Option<&str> {
        match &self.kind {
            QuestionKind::FillBlank { separator } | QuestionKind::TextCompletion { separator } => {
                Some(separator.as_str())
            }
            QuestionKind::SingleChoice { .. }
            | QuestionKind::MultipleChoice { .. }
            | QuestionKind::ShortAnswer { .. }
            | QuestionKind::LongText
            | QuestionKind::MediaQuestion { .. } => None,
        }
    }

    pub fn is_gap_question(&self) -> bool {
        self.separator().is_some()
    }

    /// Text the gaps are parsed from: the passage if there is one, else the prompt.
    pub fn gap_source(&self) -> &str {
        self.content.as_deref().unwrap_or(&self.prompt)
    }

    /// Parsed gap text, `None` for variants without gaps.
    pub fn parsed_gaps(&self) -> Option<ParsedText> {
        self.separator()
            .map(|separator| parse_gaps(self.gap_source(), separator).owned_by(&self.id))
    }

    pub fn gap_count(&self) -> usize {
        self.parsed_gaps().map_or(0, |p| p.gap_count())
    }

    /// Whether correctness is decided by a human or an external grader.
    pub fn needs_manual_grading(&self) -> bool {
        match &self.kind {
            QuestionKind::LongText => true,
            QuestionKind::MediaQuestion { options } => !options.iter().any(|o| o.correct),
            QuestionKind::SingleChoice { .. }
            | QuestionKind::MultipleChoice { .. }
            | QuestionKind::FillBlank { .. }
            | QuestionKind::TextCompletion { .. }
            | QuestionKind::ShortAnswer { .. } => false,
        }
    }
}

/// Presentation of a quiz session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Sequential, one question at a time.
    #[default]
    OneByOne,
    /// Everything at once ("feed").
    AllAtOnce,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::OneByOne => write!(f, "one_by_one"),
            DisplayMode::AllAtOnce => write!(f, "all_at_once"),
        }
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one_by_one" | "sequential" => Ok(DisplayMode::OneByOne),
            "all_at_once" | "feed" => Ok(DisplayMode::AllAtOnce),
            other => Err(format!("unknown display mode: {other}")),
        }
    }
}

/// A complete quiz as delivered by the content collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDocument {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    /// Overrides the engine's pass threshold for this quiz.
    #[serde(default)]
    pub pass_threshold: Option<f64>,
    pub questions: Vec<Question>,
}

impl QuizDocument {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }
}

/// A manual-grading record from the external grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualGrade {
    pub is_graded: bool,
    #[serde(default)]
    pub score_percentage: f64,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl ManualGrade {
    /// Graded with a usable score. A non-finite score leaves the item pending.
    pub fn is_final(&self) -> bool {
        self.is_graded && self.score_percentage.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, correct: bool, i: usize) -> QuizOption {
        QuizOption {
            id: format!("o{i}"),
            letter: letter_for(i),
            text: text.into(),
            correct,
        }
    }

    #[test]
    fn question_type_display_and_parse() {
        assert_eq!(QuestionType::FillBlank.to_string(), "fill_blank");
        assert_eq!(
            "text-completion".parse::<QuestionType>().unwrap(),
            QuestionType::TextCompletion
        );
        assert_eq!("essay".parse::<QuestionType>().unwrap(), QuestionType::LongText);
        assert!("matching".parse::<QuestionType>().is_err());
    }

    #[test]
    fn letters() {
        assert_eq!(letter_for(0), "A");
        assert_eq!(letter_for(25), "Z");
        assert_eq!(letter_for(26), "AA");
        assert_eq!(letter_for(27), "AB");
    }

    #[test]
    fn gap_source_prefers_content() {
        let mut q = Question {
            id: "q".into(),
            prompt: "Fill in [[x]]".into(),
            content: None,
            kind: QuestionKind::FillBlank {
                separator: ",".into(),
            },
            points: 1.0,
            explanation: None,
            media: None,
        };
        assert_eq!(q.gap_count(), 1);
        q.content = Some("[[a]] and [[b]]".into());
        assert_eq!(q.gap_count(), 2);
        assert!(q.is_gap_question());
        let parsed = q.parsed_gaps().unwrap();
        assert!(parsed.gaps().all(|g| g.question_id.as_deref() == Some("q")));
    }

    #[test]
    fn manual_grading_depends_on_key() {
        let mut q = Question {
            id: "m".into(),
            prompt: "What is shown?".into(),
            content: None,
            kind: QuestionKind::MediaQuestion {
                options: vec![option("cat", false, 0), option("dog", false, 1)],
            },
            points: 1.0,
            explanation: None,
            media: Some(MediaRef {
                kind: "image".into(),
                url: "https://example.com/pet.png".into(),
            }),
        };
        assert!(q.needs_manual_grading());
        q.kind = QuestionKind::MediaQuestion {
            options: vec![option("cat", true, 0), option("dog", false, 1)],
        };
        assert!(!q.needs_manual_grading());
        assert_eq!(q.correct_index(), Some(0));
    }

    #[test]
    fn display_mode_parse() {
        assert_eq!("feed".parse::<DisplayMode>().unwrap(), DisplayMode::AllAtOnce);
        assert_eq!(DisplayMode::default(), DisplayMode::OneByOne);
    }
}
