//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use quizkit_core::answer::Verdict;
use quizkit_core::grading::{ItemGrade, SessionStatus};
use quizkit_core::report::SessionReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn verdict_class(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Correct => "pass",
        Verdict::Incorrect | Verdict::Unanswered => "fail",
        Verdict::Ungraded => "pending",
    }
}

fn status_class(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Passed => "pass",
        SessionStatus::Failed => "fail",
        SessionStatus::PendingReview => "pending",
    }
}

/// Generate an HTML report from a graded session.
pub fn generate_html(report: &SessionReport) -> String {
    let grading = &report.grading;
    let stats = &grading.stats;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>quizkit report: {}</title>\n",
        html_escape(&report.quiz.title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&report.quiz.title)));
    html.push_str(&format!(
        "<p class=\"meta\">Quiz: <strong>{}</strong> | {} questions | {} items | {} | {}</p>\n",
        html_escape(&report.quiz.id),
        report.quiz.question_count,
        grading.total_items,
        report.quiz.display_mode,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Status</th><th>Score</th><th>Pass mark</th><th>Correct items</th><th>Points</th><th>Pending review</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    html.push_str(&format!(
        "<tr><td class=\"{}\">{}</td><td>{:.1}%</td><td>{:.0}%</td><td>{} / {}</td><td>{:.1} / {:.1}</td><td>{}</td></tr>\n",
        status_class(grading.status),
        grading.status,
        grading.percentage(),
        grading.threshold * 100.0,
        stats.correct_items(),
        stats.graded_items(),
        grading.earned_points,
        grading.total_points,
        stats.pending_review,
    ));
    html.push_str("</tbody></table>\n");

    if !grading.items.is_empty() {
        html.push_str(&generate_bar_chart(&grading.items));
    }
    html.push_str("</section>\n");

    // Per-question results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Questions</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Number</th><th onclick=\"sortTable(1)\">Question</th><th onclick=\"sortTable(2)\">Verdict</th><th onclick=\"sortTable(3)\">Gaps</th><th onclick=\"sortTable(4)\">Points</th><th>Notes</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for item in &grading.items {
        let class = verdict_class(item.verdict);
        let gaps = if item.gap_results.is_empty() {
            "-".to_string()
        } else {
            format!(
                "{}/{}",
                item.gap_results.iter().filter(|ok| **ok).count(),
                item.gap_results.len()
            )
        };
        let note = item
            .feedback
            .as_deref()
            .or(item.explanation.as_deref())
            .map(html_escape)
            .unwrap_or_default();

        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{:.1} / {:.1}</td><td>{}</td></tr>\n",
            class,
            item.number,
            html_escape(&item.question_id),
            class,
            item.verdict,
            gaps,
            item.points_earned,
            item.points_possible,
            note
        ));
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &SessionReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// Share of each question's items answered correctly.
fn item_score(item: &ItemGrade) -> f64 {
    if !item.gap_results.is_empty() {
        let ok = item.gap_results.iter().filter(|ok| **ok).count();
        return ok as f64 / item.gap_results.len() as f64;
    }
    match item.verdict {
        Verdict::Correct => 1.0,
        _ if item.points_possible > 0.0 => item.points_earned / item.points_possible,
        _ => 0.0,
    }
}

fn generate_bar_chart(items: &[ItemGrade]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 200;

    let total_height = items.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, item) in items.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let score = item_score(item).clamp(0.0, 1.0);
        let width = (score * max_width as f64) as usize;

        let color = if item.verdict == Verdict::Ungraded {
            "#9ca3af"
        } else if score >= 0.8 {
            "#22c55e"
        } else if score >= 0.5 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&item.number.to_string())
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.0}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            score * 100.0
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; --pending: #fef9c3; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; --pending: #713f12; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.pending { background: var(--pending); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, {numeric: true}) : vb.localeCompare(va, undefined, {numeric: true});
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use quizkit_core::answer::Answer;
    use quizkit_core::grading::{grade, ManualGrades};
    use quizkit_core::model::{
        letter_for, DisplayMode, Question, QuestionKind, QuizDocument, QuizOption,
    };
    use std::collections::BTreeMap;

    fn make_test_report() -> SessionReport {
        let quiz = QuizDocument {
            id: "html-quiz".into(),
            title: "Fractions <basics>".into(),
            description: String::new(),
            display_mode: DisplayMode::AllAtOnce,
            time_limit_minutes: None,
            pass_threshold: None,
            questions: vec![
                Question {
                    id: "half".into(),
                    prompt: "1/2 of 10?".into(),
                    content: None,
                    kind: QuestionKind::SingleChoice {
                        options: ["5", "2"]
                            .iter()
                            .enumerate()
                            .map(|(i, t)| QuizOption {
                                id: format!("half-{i}"),
                                letter: letter_for(i),
                                text: t.to_string(),
                                correct: i == 0,
                            })
                            .collect(),
                    },
                    points: 1.0,
                    explanation: None,
                    media: None,
                },
                Question {
                    id: "essay".into(),
                    prompt: "Why do fractions matter?".into(),
                    content: None,
                    kind: QuestionKind::LongText,
                    points: 3.0,
                    explanation: Some("Look for real-world examples.".into()),
                    media: None,
                },
            ],
        };
        let answers: BTreeMap<String, Answer> = [
            ("half".to_string(), Answer::Choice(0)),
            ("essay".to_string(), Answer::Text("Cooking.".into())),
        ]
        .into_iter()
        .collect();
        let grading = grade(&quiz.questions, &answers, &ManualGrades::new(), 0.5);
        SessionReport::new(&quiz, uuid::Uuid::nil(), answers, grading)
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report();
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Fractions &lt;basics&gt;"));
        assert!(!html.contains("Fractions <basics>"));
        assert!(html.contains("pending review"));
        assert!(html.contains("<td>half</td>"));
        assert!(html.contains("Look for real-world examples."));
        assert!(html.contains("<svg"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }

    #[test]
    fn escape_covers_quotes() {
        assert_eq!(html_escape(r#"<a href="x">'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#x27;&lt;/a&gt;");
    }
}
