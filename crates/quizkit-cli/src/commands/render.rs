//! The `quizkit render` command.

use std::path::PathBuf;

use anyhow::Result;

use quizkit_core::grading::Numbering;
use quizkit_core::model::QuizDocument;
use quizkit_core::parser;
use quizkit_core::render::{render_question, RenderedQuestion};
use quizkit_core::shuffle::{fresh_seed, DisplayOrder};
use quizkit_core::traits::Typesetter;
use quizkit_sources::config::load_config_from;
use quizkit_sources::MarkupTypesetter;

use crate::terminal::{question_text, TerminalTypesetter};

pub fn execute(
    quiz_path: PathBuf,
    seed: Option<u64>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let quiz = parser::parse_quiz_with_separator(&quiz_path, &config.gap_separator)?;
    let seed = seed.or(config.seed).unwrap_or_else(fresh_seed);
    let order = DisplayOrder::new(&quiz.questions, seed);

    match format.as_str() {
        "html" => {
            for question in render_all(&quiz, &order, &MarkupTypesetter::new()) {
                print!("{}", question.to_html());
            }
        }
        "json" => {
            let rendered = render_all(&quiz, &order, &MarkupTypesetter::new());
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        "text" => {
            let numbering = Numbering::new(&quiz.questions);
            println!("{}", quiz.title);
            if !quiz.description.is_empty() {
                println!("{}", quiz.description);
            }
            println!("(seed {seed})\n");
            for (question, number) in render_all(&quiz, &order, &TerminalTypesetter::new())
                .iter()
                .zip(&numbering.numbers)
            {
                println!("{}", question_text(&number.to_string(), question));
            }
        }
        other => anyhow::bail!("unknown format: {other} (expected text, html or json)"),
    }

    Ok(())
}

fn render_all(
    quiz: &QuizDocument,
    order: &DisplayOrder,
    typesetter: &dyn Typesetter,
) -> Vec<RenderedQuestion> {
    quiz.questions
        .iter()
        .map(|q| render_question(q, order, typesetter))
        .collect()
}
