//! Plain-text presentation for the terminal.

use quizkit_core::formula::MathMode;
use quizkit_core::grading::{GradingResult, ItemGrade};
use quizkit_core::render::{RenderedQuestion, RenderedSegment};
use quizkit_core::traits::{FormulaCheck, Typesetter};
use quizkit_sources::MarkupTypesetter;

/// Typesetter that leaves TeX source readable as-is.
///
/// Validation follows [`MarkupTypesetter`], so `validate` and `take` agree on
/// which formulas are broken.
pub struct TerminalTypesetter {
    checker: MarkupTypesetter,
}

impl TerminalTypesetter {
    pub fn new() -> Self {
        Self {
            checker: MarkupTypesetter::new(),
        }
    }
}

impl Typesetter for TerminalTypesetter {
    fn render(&self, expression: &str, mode: MathMode) -> anyhow::Result<String> {
        let check = self.checker.validate(expression);
        let expression = expression.trim();
        let rendered = match mode {
            MathMode::Inline => expression.to_string(),
            MathMode::Display => format!("\n    {expression}\n"),
        };
        Ok(match check.error {
            Some(error) if !check.valid => format!("{rendered} [formula error: {error}]"),
            _ => rendered,
        })
    }

    fn validate(&self, expression: &str) -> FormulaCheck {
        self.checker.validate(expression)
    }

    fn escape_text(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Text for one gap slot: `[1: ____]` or `[1: red / green]`.
fn gap_slot(index: usize, choices: Option<&[String]>) -> String {
    match choices {
        Some(choices) if !choices.is_empty() => format!("[{}: {}]", index + 1, choices.join(" / ")),
        _ => format!("[{}: ____]", index + 1),
    }
}

/// A question as terminal text, headed by its display label.
pub fn question_text(label: &str, question: &RenderedQuestion) -> String {
    let mut out = format!("{label} ({})\n", question.question_type);
    if let Some(prompt) = &question.prompt {
        out.push_str(prompt);
        out.push('\n');
    }
    if let Some(media) = &question.media {
        out.push_str(&format!("[{}: {}]\n", media.kind, media.url));
    }
    if !question.body.is_empty() {
        for segment in &question.body {
            match segment {
                RenderedSegment::Markup(text) => out.push_str(text),
                RenderedSegment::Gap { index, choices } => {
                    out.push_str(&gap_slot(*index, choices.as_deref()))
                }
            }
        }
        out.push('\n');
    }
    for option in &question.options {
        out.push_str(&format!("  {}) {}\n", option.letter, option.markup));
    }
    out
}

/// One-line verdict for an item grade.
pub fn verdict_line(item: &ItemGrade) -> String {
    let mut line = format!("{}: {}", item.number, item.verdict);
    if !item.gap_results.is_empty() {
        let correct = item.gap_results.iter().filter(|ok| **ok).count();
        line.push_str(&format!(" ({correct}/{} gaps)", item.gap_results.len()));
    }
    line.push_str(&format!(
        ", {:.1} / {:.1} points",
        item.points_earned, item.points_possible
    ));
    line
}

/// Summary table of a grading result.
pub fn grading_table(result: &GradingResult) -> comfy_table::Table {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Number", "Question", "Verdict", "Gaps", "Points"]);

    for item in &result.items {
        let gaps = if item.gap_results.is_empty() {
            "-".to_string()
        } else {
            format!(
                "{}/{}",
                item.gap_results.iter().filter(|ok| **ok).count(),
                item.gap_results.len()
            )
        };
        table.add_row(vec![
            Cell::new(item.number),
            Cell::new(&item.question_id),
            Cell::new(item.verdict),
            Cell::new(gaps),
            Cell::new(format!(
                "{:.1} / {:.1}",
                item.points_earned, item.points_possible
            )),
        ]);
    }

    table
}

/// `passed with 75.0% (3 of 4 items correct, pass mark 50%)`.
pub fn summary_line(result: &GradingResult) -> String {
    let mut line = format!(
        "{} with {:.1}% ({} of {} items correct, pass mark {:.0}%)",
        result.status,
        result.percentage(),
        result.stats.correct_items(),
        result.stats.graded_items(),
        result.threshold * 100.0
    );
    if result.stats.pending_review > 0 {
        line.push_str(&format!(
            "; {} question(s) pending review",
            result.stats.pending_review
        ));
    }
    line
}
