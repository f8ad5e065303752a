//! Question numbering, grading statistics and pass/fail.
//!
//! The unit of counting is the *item*: a whole non-gap question, or a single
//! gap inside a gap question. Everything here is a pure function of the
//! questions, the answers and the manual grades, so grading the same data
//! twice always gives the same result, whatever order options were shown in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answer::{self, Answer, Verdict};
use crate::model::{ManualGrade, Question};

/// Default share of items that must be correct to pass.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.5;

/// Manual grades by question id.
pub type ManualGrades = BTreeMap<String, ManualGrade>;

/// 1-based item numbers covered by one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionNumber {
    pub first: usize,
    pub last: usize,
}

impl QuestionNumber {
    pub fn span(&self) -> usize {
        (self.last + 1).saturating_sub(self.first)
    }
}

impl fmt::Display for QuestionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span() > 1 {
            write!(f, "Questions {}\u{2013}{}", self.first, self.last)
        } else {
            write!(f, "Question {}", self.first)
        }
    }
}

/// Items a question contributes to numbering and statistics.
///
/// A gap question whose text has no gaps still counts as one (unanswerable)
/// item, graded like a regular question.
pub fn item_count(question: &Question) -> usize {
    if question.is_gap_question() {
        question.gap_count().max(1)
    } else {
        1
    }
}

/// Display numbers for a whole quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Numbering {
    pub numbers: Vec<QuestionNumber>,
    pub total_items: usize,
}

impl Numbering {
    pub fn new(questions: &[Question]) -> Self {
        let mut numbers = Vec::with_capacity(questions.len());
        let mut next = 1;
        for question in questions {
            let count = item_count(question);
            numbers.push(QuestionNumber {
                first: next,
                last: (next + count).saturating_sub(1),
            });
            next += count;
        }
        Self {
            numbers,
            total_items: next - 1,
        }
    }

    /// "Questions 4–6 of 12" for the question at `index`.
    pub fn label(&self, index: usize) -> Option<String> {
        self.numbers
            .get(index)
            .map(|n| format!("{n} of {}", self.total_items))
    }
}

/// Item counts behind the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeStats {
    pub total_gaps: usize,
    pub correct_gaps: usize,
    pub regular_questions: usize,
    pub correct_regular: usize,
    /// Questions waiting for a manual grade; excluded from the ratio.
    pub pending_review: usize,
}

impl GradeStats {
    pub fn correct_items(&self) -> usize {
        self.correct_gaps + self.correct_regular
    }

    pub fn graded_items(&self) -> usize {
        self.total_gaps + self.regular_questions
    }

    /// Fraction of graded items answered correctly; 0 when nothing is graded.
    pub fn ratio(&self) -> f64 {
        let graded = self.graded_items();
        if graded == 0 {
            0.0
        } else {
            self.correct_items() as f64 / graded as f64
        }
    }
}

/// Session-level outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Passed,
    Failed,
    /// At least one question waits for a manual grade.
    PendingReview,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Passed => write!(f, "passed"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::PendingReview => write!(f, "pending review"),
        }
    }
}

/// Grading of a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemGrade {
    pub question_id: String,
    pub number: QuestionNumber,
    pub verdict: Verdict,
    /// Per-gap correctness for gap questions, empty otherwise.
    #[serde(default)]
    pub gap_results: Vec<bool>,
    pub points_earned: f64,
    pub points_possible: f64,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Derived grading of a whole session. Never stored as the source of truth;
/// recomputed from questions and answers whenever answers are revealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub items: Vec<ItemGrade>,
    pub stats: GradeStats,
    /// `correct items / graded items`.
    pub score: f64,
    pub passed: bool,
    pub status: SessionStatus,
    pub threshold: f64,
    pub earned_points: f64,
    pub total_points: f64,
    pub total_items: usize,
}

impl GradingResult {
    pub fn percentage(&self) -> f64 {
        (self.score * 1000.0).round() / 10.0
    }

    pub fn item(&self, question_id: &str) -> Option<&ItemGrade> {
        self.items.iter().find(|i| i.question_id == question_id)
    }
}

/// Grade every question against `answers`.
pub fn grade(
    questions: &[Question],
    answers: &BTreeMap<String, Answer>,
    manual: &ManualGrades,
    threshold: f64,
) -> GradingResult {
    let numbering = Numbering::new(questions);
    let mut stats = GradeStats::default();
    let mut items = Vec::with_capacity(questions.len());
    let mut earned_points = 0.0;
    let mut total_points = 0.0;

    for (question, number) in questions.iter().zip(&numbering.numbers) {
        let response = answers.get(&question.id);
        let mut verdict = answer::evaluate(question, response);
        let gap_results = if question.is_gap_question() {
            answer::gap_results(question, response)
        } else {
            Vec::new()
        };
        let mut feedback = None;
        let points_possible = question.points.max(0.0);
        let mut points_earned = 0.0;

        if !gap_results.is_empty() {
            let correct = gap_results.iter().filter(|ok| **ok).count();
            stats.total_gaps += gap_results.len();
            stats.correct_gaps += correct;
            points_earned = points_possible * correct as f64 / gap_results.len() as f64;
        } else if verdict == Verdict::Ungraded {
            match manual.get(&question.id).filter(|g| g.is_final()) {
                Some(record) => {
                    let pct = record.score_percentage.clamp(0.0, 100.0);
                    let correct = pct >= threshold * 100.0;
                    stats.regular_questions += 1;
                    if correct {
                        stats.correct_regular += 1;
                    }
                    verdict = if correct {
                        Verdict::Correct
                    } else {
                        Verdict::Incorrect
                    };
                    points_earned = points_possible * pct / 100.0;
                    feedback = record.feedback.clone();
                }
                None => stats.pending_review += 1,
            }
        } else {
            stats.regular_questions += 1;
            if verdict == Verdict::Correct {
                stats.correct_regular += 1;
                points_earned = points_possible;
            }
        }

        earned_points += points_earned;
        total_points += points_possible;
        items.push(ItemGrade {
            question_id: question.id.clone(),
            number: *number,
            verdict,
            gap_results,
            points_earned,
            points_possible,
            feedback,
            explanation: question.explanation.clone(),
        });
    }

    let score = stats.ratio();
    let passed = stats.graded_items() > 0 && score >= threshold;
    let status = if stats.pending_review > 0 {
        SessionStatus::PendingReview
    } else if passed {
        SessionStatus::Passed
    } else {
        SessionStatus::Failed
    };

    GradingResult {
        items,
        stats,
        score,
        passed,
        status,
        threshold,
        earned_points,
        total_points,
        total_items: numbering.total_items,
    }
}
