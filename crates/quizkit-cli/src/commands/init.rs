//! The `quizkit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create quizkit.toml
    if std::path::Path::new("quizkit.toml").exists() {
        println!("quizkit.toml already exists, skipping.");
    } else {
        std::fs::write("quizkit.toml", SAMPLE_CONFIG)?;
        println!("Created quizkit.toml");
    }

    // Create example quiz
    std::fs::create_dir_all("quizzes")?;
    let example_path = std::path::Path::new("quizzes/example.toml");
    if example_path.exists() {
        println!("quizzes/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUIZ)?;
        println!("Created quizzes/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: quizkit validate --quiz quizzes/example.toml");
    println!("  2. Run: quizkit render --quiz quizzes/example.toml");
    println!("  3. Run: quizkit take example");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizkit configuration

# Share of items that must be correct to pass (a quiz may set its own).
pass_threshold = 0.5

# Separator between gap candidates, e.g. [[blue,azure]].
gap_separator = ","

# Fixed shuffle seed for reproducible option order; omit for a fresh one per session.
# seed = 42

draft_dir = "./.quizkit/drafts"
output_dir = "./quizkit-results"

[content]
type = "file"
dir = "./quizzes"

# [content]
# type = "http"
# base_url = "https://lms.example.com/api"
# api_key = "${QUIZKIT_API_KEY}"

[grades]
type = "memory"
"#;

const EXAMPLE_QUIZ: &str = r#"title = "Example Quiz"
description = "A short quiz covering every question type"
display_mode = "one_by_one"
pass_threshold = 0.6

[[questions]]
id = "capital"
type = "single_choice"
prompt = "What is the capital of France?"
options = [
    { text = "Paris", correct = true },
    { text = "Lyon", correct = false },
    { text = "Marseille", correct = false },
]
explanation = "Paris has been the capital since 987."

[[questions]]
id = "primes"
type = "multiple_choice"
prompt = "Which of these numbers are prime?"
options = [
    { text = "$2$", correct = true },
    { text = "$9$", correct = false },
    { text = "$13$", correct = true },
]

[[questions]]
id = "colours"
type = "fill_blank"
prompt = "The sky is [[blue]] and grass is [[green]]."

[[questions]]
id = "planets"
type = "text_completion"
prompt = "The largest planet is"
content = "The largest planet is [[Jupiter,Saturn,Mars]]; the closest to the sun is [[Mercury,Venus,Earth]]."
points = 2

[[questions]]
id = "area"
type = "short_answer"
prompt = "The area of a circle with radius $r$ is $\\pi r^2$. What is the area for $r = 1$, rounded to two decimals?"
accepted = "3.14|3,14"

[[questions]]
id = "reflection"
type = "long_text"
prompt = "Describe one thing you learned from this quiz."
"#;
