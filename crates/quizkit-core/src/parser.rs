//! Quiz document parser.
//!
//! Loads quizzes from TOML or JSON files and directories, enforces the
//! data-model invariants, and validates them for softer issues.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::answer::{normalize, Answer};
use crate::formula::validate_formulas;
use crate::gaps::{parse_gaps, Segment, DEFAULT_SEPARATOR};
use crate::model::{
    letter_for, DisplayMode, MediaRef, Question, QuestionKind, QuestionType, QuizDocument,
    QuizOption,
};
use crate::traits::Typesetter;

/// Intermediate structure for parsing quiz files.
#[derive(Debug, Deserialize)]
struct RawQuizFile {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    display_mode: Option<String>,
    #[serde(default)]
    time_limit_minutes: Option<u32>,
    #[serde(default)]
    pass_threshold: Option<f64>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    id: String,
    #[serde(rename = "type")]
    question_type: String,
    prompt: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    accepted: Option<String>,
    #[serde(default)]
    correct_answers: Option<Vec<String>>,
    #[serde(default)]
    separator: Option<String>,
    #[serde(default = "default_points")]
    points: f64,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    media: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    correct: bool,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default = "default_media_kind")]
    kind: String,
    url: String,
}

fn default_points() -> f64 {
    1.0
}

fn default_media_kind() -> String {
    "image".to_string()
}

/// Parse a single quiz file. The format follows the extension: `.json` is
/// JSON, anything else TOML.
pub fn parse_quiz(path: &Path) -> Result<QuizDocument> {
    parse_quiz_with_separator(path, DEFAULT_SEPARATOR)
}

/// Like [`parse_quiz`], with the separator used by gap questions that do
/// not set their own.
pub fn parse_quiz_with_separator(path: &Path, default_separator: &str) -> Result<QuizDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_str_with_separator(&content, path, default_separator)
}

/// Parse quiz text (useful for testing).
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<QuizDocument> {
    parse_quiz_str_with_separator(content, source_path, DEFAULT_SEPARATOR)
}

pub fn parse_quiz_str_with_separator(
    content: &str,
    source_path: &Path,
    default_separator: &str,
) -> Result<QuizDocument> {
    let raw: RawQuizFile = if is_json(source_path) {
        serde_json::from_str(content)
            .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?
    } else {
        toml::from_str(content)
            .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?
    };

    let id = raw
        .id
        .or_else(|| {
            source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "quiz".to_string());

    let display_mode = raw
        .display_mode
        .map(|m| m.parse::<DisplayMode>().map_err(|e| anyhow::anyhow!("{e}")))
        .transpose()
        .with_context(|| format!("invalid quiz {id}"))?
        .unwrap_or_default();

    if let Some(threshold) = raw.pass_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("quiz {id}: pass_threshold must be between 0 and 1, got {threshold}");
        }
    }

    let questions = raw
        .questions
        .into_iter()
        .map(|q| {
            let question_id = q.id.clone();
            build_question(q, default_separator)
                .with_context(|| format!("invalid question {question_id} in quiz {id}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuizDocument {
        id,
        title: raw.title,
        description: raw.description,
        display_mode,
        time_limit_minutes: raw.time_limit_minutes,
        pass_threshold: raw.pass_threshold,
        questions,
    })
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn build_question(raw: RawQuestion, default_separator: &str) -> Result<Question> {
    let question_type: QuestionType = raw
        .question_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{e}"))?;

    if !raw.points.is_finite() || raw.points < 0.0 {
        anyhow::bail!("points must be a non-negative number, got {}", raw.points);
    }

    let options: Vec<QuizOption> = raw
        .options
        .into_iter()
        .enumerate()
        .map(|(i, o)| QuizOption {
            id: o.id.unwrap_or_else(|| format!("{}-{}", raw.id, i + 1)),
            letter: letter_for(i),
            text: o.text,
            correct: o.correct,
        })
        .collect();
    let correct = options.iter().filter(|o| o.correct).count();
    let separator = raw
        .separator
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_separator.to_string());

    let kind = match question_type {
        QuestionType::SingleChoice => {
            if correct != 1 {
                anyhow::bail!("single_choice needs exactly one correct option, found {correct}");
            }
            QuestionKind::SingleChoice { options }
        }
        QuestionType::MultipleChoice => {
            if correct == 0 {
                anyhow::bail!("multiple_choice needs at least one correct option");
            }
            QuestionKind::MultipleChoice { options }
        }
        QuestionType::FillBlank => QuestionKind::FillBlank { separator },
        QuestionType::TextCompletion => QuestionKind::TextCompletion { separator },
        QuestionType::ShortAnswer => {
            let accepted = raw.accepted.unwrap_or_default();
            if accepted.split('|').all(|a| a.trim().is_empty()) {
                anyhow::bail!("short_answer needs at least one accepted answer");
            }
            QuestionKind::ShortAnswer { accepted }
        }
        QuestionType::LongText => QuestionKind::LongText,
        QuestionType::MediaQuestion => {
            if correct > 1 {
                anyhow::bail!("media_question allows at most one correct option, found {correct}");
            }
            QuestionKind::MediaQuestion { options }
        }
    };

    let question = Question {
        id: raw.id,
        prompt: raw.prompt,
        content: raw.content,
        kind,
        points: raw.points,
        explanation: raw.explanation,
        media: raw.media.map(|m| MediaRef {
            kind: m.kind,
            url: m.url,
        }),
    };

    if let (Some(expected), Some(parsed)) = (&raw.correct_answers, question.parsed_gaps()) {
        let canonical = parsed.canonical_answers();
        if expected.len() != canonical.len() {
            anyhow::bail!(
                "correct_answers lists {} values but the text has {} gaps",
                expected.len(),
                canonical.len()
            );
        }
        for (i, (want, have)) in expected.iter().zip(&canonical).enumerate() {
            if have.as_deref().map(normalize) != Some(normalize(want)) {
                anyhow::bail!(
                    "gap {} answer {want:?} does not match its first candidate {:?}",
                    i + 1,
                    have.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(question)
}

/// Recursively load all `.toml` and `.json` quiz files from a directory.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<QuizDocument>> {
    load_quiz_directory_with_separator(dir, DEFAULT_SEPARATOR)
}

pub fn load_quiz_directory_with_separator(
    dir: &Path,
    default_separator: &str,
) -> Result<Vec<QuizDocument>> {
    let mut quizzes = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            quizzes.extend(load_quiz_directory_with_separator(&path, default_separator)?);
        } else if is_quiz_file(&path) {
            match parse_quiz_with_separator(&path, default_separator) {
                Ok(quiz) => quizzes.push(quiz),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(quizzes)
}

/// Whether `path` looks like a quiz document.
pub fn is_quiz_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "toml" || ext == "json")
}

/// Parse an answer sheet: a JSON object from question id to answer.
pub fn parse_answer_sheet(content: &str) -> Result<BTreeMap<String, Answer>> {
    serde_json::from_str(content).context("failed to parse answer sheet")
}

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a quiz for common issues. Formulas are only checked when a
/// typesetter is supplied.
pub fn validate_quiz(
    quiz: &QuizDocument,
    typesetter: Option<&dyn Typesetter>,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |question: &Question, message: String| {
        warnings.push(ValidationWarning {
            question_id: Some(question.id.clone()),
            message,
        });
    };

    let mut seen_ids = HashSet::new();
    for question in &quiz.questions {
        if !seen_ids.insert(&question.id) {
            warn(question, format!("duplicate question ID: {}", question.id));
        }

        if question.prompt.trim().is_empty() {
            warn(question, "prompt is empty".into());
        }

        if let Some(parsed) = question.parsed_gaps() {
            if parsed.gap_count() == 0 {
                warn(question, format!("{} question has no gaps", question.question_type()));
            }
            for gap in parsed.gaps().filter(|g| !g.is_answerable()) {
                warn(
                    question,
                    format!("gap {} has no candidates and can never be correct", gap.index + 1),
                );
            }
            if parsed.has_stray_markers() {
                warn(question, "unbalanced gap markers are shown as plain text".into());
            }
        }

        if matches!(question.kind, QuestionKind::MediaQuestion { .. }) && question.media.is_none() {
            warn(question, "media_question has no media attached".into());
        }

        if let Some(typesetter) = typesetter {
            for text in formula_texts(question) {
                for issue in validate_formulas(&text, typesetter) {
                    warn(
                        question,
                        format!("formula `{}` will not render: {}", issue.source, issue.error),
                    );
                }
            }
        }
    }

    if quiz.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "quiz has no questions".into(),
        });
    }

    warnings
}

/// Text runs the formula spanner will see for `question`.
fn formula_texts(question: &Question) -> Vec<String> {
    let mut texts = Vec::new();
    let literals = |text: &str| -> Vec<String> {
        match question.separator() {
            Some(separator) => parse_gaps(text, separator)
                .segments
                .into_iter()
                .filter_map(|s| match s {
                    Segment::Literal(t) => Some(t),
                    Segment::Gap(_) => None,
                })
                .collect(),
            None => vec![text.to_string()],
        }
    };
    texts.extend(literals(&question.prompt));
    if let Some(content) = &question.content {
        texts.extend(literals(content));
    }
    texts.extend(question.options().iter().map(|o| o.text.clone()));
    texts
}
