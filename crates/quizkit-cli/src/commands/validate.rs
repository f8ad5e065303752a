//! The `quizkit validate` command.

use std::path::PathBuf;

use anyhow::Result;

use quizkit_core::parser;
use quizkit_sources::config::load_config_from;
use quizkit_sources::MarkupTypesetter;

pub fn execute(quiz_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let separator = config.gap_separator.as_str();

    let quizzes = if quiz_path.is_dir() {
        parser::load_quiz_directory_with_separator(&quiz_path, separator)?
    } else {
        vec![parser::parse_quiz_with_separator(&quiz_path, separator)?]
    };

    let typesetter = MarkupTypesetter::new();
    let mut total_warnings = 0;

    for quiz in &quizzes {
        println!(
            "Quiz: {} [{}] ({} questions, {} items)",
            quiz.title,
            quiz.id,
            quiz.questions.len(),
            quizkit_core::grading::Numbering::new(&quiz.questions).total_items
        );

        let warnings = parser::validate_quiz(quiz, Some(&typesetter));
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All quizzes valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
