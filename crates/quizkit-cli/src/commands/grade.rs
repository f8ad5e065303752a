//! The `quizkit grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use quizkit_core::grading::{grade, ManualGrades, SessionStatus};
use quizkit_core::model::ManualGrade;
use quizkit_core::parser;
use quizkit_core::report::SessionReport;
use quizkit_report::write_html_report;
use quizkit_sources::config::load_config_from;

use crate::terminal::{grading_table, summary_line};

#[allow(clippy::too_many_arguments)]
pub fn execute(
    quiz_path: PathBuf,
    answers_path: PathBuf,
    grades_path: Option<PathBuf>,
    threshold: Option<f64>,
    output: Option<PathBuf>,
    format: String,
    fail_on_fail: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    if let Some(t) = threshold {
        anyhow::ensure!(
            (0.0..=1.0).contains(&t),
            "threshold must be between 0.0 and 1.0"
        );
    }

    let config = load_config_from(config_path.as_deref())?;
    let quiz = parser::parse_quiz_with_separator(&quiz_path, &config.gap_separator)?;

    let sheet = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers from {}", answers_path.display()))?;
    let answers = parser::parse_answer_sheet(&sheet)?;
    for id in answers.keys() {
        if quiz.question(id).is_none() {
            eprintln!("Warning: answer for unknown question '{id}' ignored");
        }
    }

    let manual: ManualGrades = match &grades_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read grades from {}", path.display()))?;
            serde_json::from_str::<std::collections::BTreeMap<String, ManualGrade>>(&content)
                .with_context(|| format!("failed to parse grades in {}", path.display()))?
        }
        None => ManualGrades::new(),
    };

    // A command-line threshold wins; otherwise the quiz's own, then the config's.
    let threshold = threshold
        .or(quiz.pass_threshold)
        .unwrap_or(config.pass_threshold);
    let result = grade(&quiz.questions, &answers, &manual, threshold);
    let status = result.status;

    println!("{}\n", quiz.title);
    println!("{}", grading_table(&result));
    println!(
        "\nResult: {} | points {:.1} / {:.1}",
        summary_line(&result),
        result.earned_points,
        result.total_points
    );

    let report = SessionReport::new(&quiz, uuid::Uuid::new_v4(), answers, result);
    let output = output.unwrap_or_else(|| config.output_dir.clone());
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let stem = format!("{}-{timestamp}", quiz.id);

    let formats: Vec<&str> = match format.as_str() {
        "none" => Vec::new(),
        "all" => vec!["json", "html", "markdown"],
        other => other.split(',').map(str::trim).collect(),
    };

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join(format!("{stem}.json"));
                report.save_json(&path)?;
                eprintln!("Report saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("{stem}.html"));
                write_html_report(&report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            "markdown" | "md" => {
                let path = output.join(format!("{stem}.md"));
                std::fs::create_dir_all(&output)?;
                std::fs::write(&path, report.to_markdown())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!("Markdown report: {}", path.display());
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    if fail_on_fail && status == SessionStatus::Failed {
        std::process::exit(1);
    }

    Ok(())
}
