//! quizkit CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "quizkit", version, about = "Quiz answering engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a quiz interactively on the terminal
    Take {
        /// Quiz id, as known to the configured content source
        quiz: String,

        /// Display mode override: one_by_one or all_at_once
        #[arg(long)]
        mode: Option<String>,

        /// Resume a saved session by its id
        #[arg(long)]
        resume: Option<uuid::Uuid>,

        /// JSON file of manual grades (question id to grade)
        #[arg(long)]
        grades: Option<PathBuf>,

        /// Write a JSON report here when the session ends
        #[arg(long)]
        report: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade an answer sheet against a quiz
    Grade {
        /// Path to the quiz file
        #[arg(long)]
        quiz: PathBuf,

        /// JSON answer sheet (question id to answer)
        #[arg(long)]
        answers: PathBuf,

        /// JSON file of manual grades (question id to grade)
        #[arg(long)]
        grades: Option<PathBuf>,

        /// Pass threshold override (0.0 to 1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, markdown, all, none
        #[arg(long, default_value = "none")]
        format: String,

        /// Exit code 1 if the session failed
        #[arg(long)]
        fail_on_fail: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Render a quiz with its gaps, formulas and shuffled options
    Render {
        /// Path to the quiz file
        #[arg(long)]
        quiz: PathBuf,

        /// Shuffle seed (fresh when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Output format: text, html, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate quiz files
    Validate {
        /// Path to a quiz file or directory
        #[arg(long)]
        quiz: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example quiz
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizkit=warn".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            quiz,
            mode,
            resume,
            grades,
            report,
            config,
        } => commands::take::execute(quiz, mode, resume, grades, report, config).await,
        Commands::Grade {
            quiz,
            answers,
            grades,
            threshold,
            output,
            format,
            fail_on_fail,
            config,
        } => commands::grade::execute(
            quiz,
            answers,
            grades,
            threshold,
            output,
            format,
            fail_on_fail,
            config,
        ),
        Commands::Render {
            quiz,
            seed,
            format,
            config,
        } => commands::render::execute(quiz, seed, format, config),
        Commands::Validate { quiz, config } => commands::validate::execute(quiz, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
