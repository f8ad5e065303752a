//! Session report types with JSON persistence and Markdown output.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answer::{Answer, Verdict};
use crate::grading::GradingResult;
use crate::model::{DisplayMode, QuizDocument};

/// A graded quiz session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// The session the answers came from.
    pub session_id: Uuid,
    /// Summary of the quiz.
    pub quiz: QuizSummary,
    pub grading: GradingResult,
    /// Answers as captured, keyed by question id.
    pub answers: BTreeMap<String, Answer>,
}

/// Summary of a quiz (without the questions themselves).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub display_mode: DisplayMode,
    pub question_count: usize,
}

impl QuizSummary {
    pub fn of(quiz: &QuizDocument) -> Self {
        Self {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            display_mode: quiz.display_mode,
            question_count: quiz.questions.len(),
        }
    }
}

impl SessionReport {
    pub fn new(
        quiz: &QuizDocument,
        session_id: Uuid,
        answers: BTreeMap<String, Answer>,
        grading: GradingResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            session_id,
            quiz: QuizSummary::of(quiz),
            grading,
            answers,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let grading = &self.grading;
        let stats = &grading.stats;
        let mut md = String::new();

        md.push_str(&format!("## {}\n\n", self.quiz.title));
        md.push_str(&format!(
            "**Result:** {} with {:.1}% ({} of {} items correct, pass mark {:.0}%)\n\n",
            grading.status,
            grading.percentage(),
            stats.correct_items(),
            stats.graded_items(),
            grading.threshold * 100.0
        ));
        md.push_str(&format!(
            "**Points:** {:.1} / {:.1}\n\n",
            grading.earned_points, grading.total_points
        ));
        if stats.pending_review > 0 {
            md.push_str(&format!(
                "**Pending review:** {} question(s) wait for a manual grade\n\n",
                stats.pending_review
            ));
        }

        md.push_str("| Number | Question | Verdict | Points |\n");
        md.push_str("|--------|----------|---------|--------|\n");
        for item in &grading.items {
            let verdict = if item.gap_results.is_empty() {
                item.verdict.to_string()
            } else {
                format!(
                    "{} ({}/{} gaps)",
                    item.verdict,
                    item.gap_results.iter().filter(|ok| **ok).count(),
                    item.gap_results.len()
                )
            };
            md.push_str(&format!(
                "| {} | {} | {} | {:.1} / {:.1} |\n",
                item.number, item.question_id, verdict, item.points_earned, item.points_possible
            ));
        }

        let notes: Vec<_> = grading
            .items
            .iter()
            .filter(|i| i.verdict != Verdict::Correct)
            .filter_map(|i| {
                i.feedback
                    .as_deref()
                    .or(i.explanation.as_deref())
                    .map(|note| (i.question_id.as_str(), note))
            })
            .collect();
        if !notes.is_empty() {
            md.push_str("\n### Notes\n\n");
            for (id, note) in notes {
                md.push_str(&format!("- **{id}:** {note}\n"));
            }
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{grade, ManualGrades, DEFAULT_PASS_THRESHOLD};
    use crate::model::{letter_for, Question, QuestionKind, QuizOption};

    fn quiz() -> QuizDocument {
        QuizDocument {
            id: "colours".into(),
            title: "Colours".into(),
            description: String::new(),
            display_mode: DisplayMode::OneByOne,
            time_limit_minutes: None,
            pass_threshold: None,
            questions: vec![
                Question {
                    id: "sky".into(),
                    prompt: "Sky?".into(),
                    content: None,
                    kind: QuestionKind::SingleChoice {
                        options: ["blue", "green"]
                            .iter()
                            .enumerate()
                            .map(|(i, t)| QuizOption {
                                id: format!("sky-{i}"),
                                letter: letter_for(i),
                                text: t.to_string(),
                                correct: i == 0,
                            })
                            .collect(),
                    },
                    points: 1.0,
                    explanation: Some("Rayleigh scattering.".into()),
                    media: None,
                },
                Question {
                    id: "flag".into(),
                    prompt: "[[red]] and [[white]]".into(),
                    content: None,
                    kind: QuestionKind::FillBlank {
                        separator: ",".into(),
                    },
                    points: 2.0,
                    explanation: None,
                    media: None,
                },
            ],
        }
    }

    fn make_report() -> SessionReport {
        let quiz = quiz();
        let answers: BTreeMap<String, Answer> = [
            ("sky".to_string(), Answer::Choice(1)),
            (
                "flag".to_string(),
                Answer::Gaps(vec!["Red".into(), "white ".into()]),
            ),
        ]
        .into_iter()
        .collect();
        let grading = grade(
            &quiz.questions,
            &answers,
            &ManualGrades::new(),
            DEFAULT_PASS_THRESHOLD,
        );
        SessionReport::new(&quiz, Uuid::nil(), answers, grading)
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = SessionReport::load_json(&path).unwrap();

        assert_eq!(loaded.quiz.id, "colours");
        assert_eq!(loaded.answers, report.answers);
        assert_eq!(loaded.grading.stats, report.grading.stats);
        assert_eq!(loaded.grading.items.len(), 2);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SessionReport::load_json(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn markdown_output() {
        let md = make_report().to_markdown();
        assert!(md.contains("## Colours"));
        assert!(md.contains("66.7%"));
        assert!(md.contains("| Question 1 | sky | incorrect | 0.0 / 1.0 |"));
        assert!(md.contains("| Questions 2\u{2013}3 | flag | correct (2/2 gaps) | 2.0 / 2.0 |"));
        assert!(md.contains("- **sky:** Rayleigh scattering."));
    }
}
