//! The `quizkit take` command.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::Instant;
use uuid::Uuid;

use quizkit_core::answer::{is_complete, Answer, Verdict};
use quizkit_core::engine::{QuizEngine, SessionObserver};
use quizkit_core::error::CollaboratorError;
use quizkit_core::grading::GradingResult;
use quizkit_core::model::{letter_for, DisplayMode, Question, QuestionKind};
use quizkit_core::session::{Event, Phase, Rejection};
use quizkit_core::traits::GradeStore;
use quizkit_sources::config::load_config_from;
use quizkit_sources::MemoryGradeStore;

use crate::terminal::{grading_table, question_text, summary_line, verdict_line, TerminalTypesetter};

const MAX_LOAD_RETRIES: u32 = 3;
const LOAD_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Console session observer.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_transition(&self, event: &str, from: Phase, to: Phase) {
        tracing::debug!(event, %from, %to, "transition");
    }

    fn on_rejected(&self, _rejection: &Rejection) {}

    fn on_graded(&self, result: &GradingResult) {
        tracing::debug!(score = result.score, status = %result.status, "graded");
    }

    fn on_collaborator_error(&self, operation: &str, error: &str) {
        eprintln!("  ERROR: {operation}: {error}");
    }
}

/// What the learner typed.
enum Reply {
    Line(String),
    /// End of input or `:q`.
    Quit,
    /// The time limit ran out while waiting.
    Expired,
}

/// How answering a question ended.
enum Flow {
    Answered,
    Quit,
    Expired,
}

/// How the session loop ended.
enum Outcome {
    Finished,
    Suspended,
}

struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, prompt: &str, deadline: Option<Instant>) -> Result<Reply> {
        print!("{prompt}");
        std::io::stdout().flush()?;

        let next = self.lines.next_line();
        let line = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, next).await {
                Ok(line) => line?,
                Err(_) => return Ok(Reply::Expired),
            },
            None => next.await?,
        };

        Ok(match line {
            None => Reply::Quit,
            Some(line) if line.trim() == ":q" => Reply::Quit,
            Some(line) => Reply::Line(line.trim().to_string()),
        })
    }
}

pub async fn execute(
    quiz_id: String,
    mode: Option<String>,
    resume: Option<Uuid>,
    grades_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let content = config.content_source()?;
    let grades: Arc<dyn GradeStore> = match &grades_path {
        Some(path) => Arc::new(MemoryGradeStore::from_json_file(&quiz_id, path)?),
        None => config.grade_store()?,
    };

    let mut engine = QuizEngine::new(
        quiz_id,
        content,
        Arc::new(TerminalTypesetter::new()),
        grades,
        config.engine_config(),
    )
    .with_drafts(config.draft_store())
    .with_observer(Arc::new(ConsoleObserver));

    if let Some(mode) = mode {
        let mode: DisplayMode = mode.parse().map_err(anyhow::Error::msg)?;
        engine = engine.with_mode(mode);
    }

    let resumed = match resume {
        Some(session_id) => {
            let found = engine.resume(session_id).await?;
            if !found {
                eprintln!("No saved session {session_id}, starting a new one.");
            }
            found
        }
        None => false,
    };
    if !resumed {
        load_with_retry(&mut engine).await?;
    }

    let mut prompter = Prompter::new();
    match run_session(&mut engine, &mut prompter).await? {
        Outcome::Finished => {
            engine.discard_draft().await?;
            if let (Some(path), Some(report)) = (report_path, engine.report()) {
                report.save_json(&path)?;
                eprintln!("Report saved to: {}", path.display());
            }
        }
        Outcome::Suspended => {
            engine.save_draft().await?;
            println!(
                "\nSession saved. Resume with: quizkit take {} --resume {}",
                engine.quiz_id(),
                engine.session().id()
            );
        }
    }

    Ok(())
}

/// Load the quiz, retrying transient collaborator errors with exponential backoff.
async fn load_with_retry(engine: &mut QuizEngine) -> Result<()> {
    let mut retry_delay = LOAD_RETRY_DELAY;
    for retry in 0..=MAX_LOAD_RETRIES {
        if retry > 0 {
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(Duration::from_secs(10));
        }
        match engine.load().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let permanent = CollaboratorError::classify(&e).map_or(true, |c| c.is_permanent());
                if permanent || retry == MAX_LOAD_RETRIES {
                    return Err(e);
                }
                eprintln!("  Retrying in {}ms: {e:#}", retry_delay.as_millis());
            }
        }
    }
    anyhow::bail!("failed to load quiz {}", engine.quiz_id())
}

async fn run_session(engine: &mut QuizEngine, prompter: &mut Prompter) -> Result<Outcome> {
    loop {
        let deadline = engine.deadline();
        match engine.phase() {
            Phase::Stalled => anyhow::bail!("quiz {} is not loaded", engine.quiz_id()),

            Phase::Title => {
                print_title(engine);
                match prompter.ask("Press Enter to start (:q to quit) ", None).await? {
                    Reply::Line(_) | Reply::Expired => send(engine, Event::Start),
                    Reply::Quit => return Ok(Outcome::Suspended),
                }
            }

            Phase::Question => {
                let index = engine.session().current_index();
                let question = engine
                    .session()
                    .current_question()
                    .cloned()
                    .context("no current question")?;
                show_question(engine, index, deadline);
                match answer_question(engine, prompter, &question, deadline).await? {
                    Flow::Answered => send(engine, Event::Check),
                    Flow::Quit => return Ok(Outcome::Suspended),
                    Flow::Expired => expire(engine),
                }
            }

            Phase::Result => {
                if let Some(question) = engine.session().current_question() {
                    if let Some(item) = engine.grading().and_then(|g| g.item(&question.id)) {
                        println!("{}", verdict_line(item));
                        if item.verdict == Verdict::Ungraded {
                            println!("  Awaiting manual review.");
                        } else if item.verdict != Verdict::Correct {
                            if let Some(explanation) = &item.explanation {
                                println!("  {explanation}");
                            }
                        }
                    }
                }
                match prompter.ask("Press Enter to continue ", deadline).await? {
                    Reply::Line(_) => send(engine, Event::Advance),
                    Reply::Quit => return Ok(Outcome::Suspended),
                    Reply::Expired => expire(engine),
                }
            }

            Phase::Open => {
                let pending: Vec<(usize, Question)> = engine
                    .session()
                    .questions()
                    .iter()
                    .enumerate()
                    .filter(|(_, q)| !is_complete(q, engine.session().answer(&q.id)))
                    .map(|(i, q)| (i, q.clone()))
                    .collect();

                let mut expired = false;
                for (index, question) in &pending {
                    show_question(engine, *index, deadline);
                    match answer_question(engine, prompter, question, deadline).await? {
                        Flow::Answered => {}
                        Flow::Quit => return Ok(Outcome::Suspended),
                        Flow::Expired => {
                            expired = true;
                            break;
                        }
                    }
                }

                if expired {
                    expire(engine);
                } else {
                    send(engine, Event::CheckAll);
                }
            }

            Phase::Completed | Phase::Checked => {
                let result = engine
                    .grading()
                    .cloned()
                    .unwrap_or_else(|| engine.grade_now());
                println!("\n{}", grading_table(&result));
                println!("\nResult: {}", summary_line(&result));

                let (question, event) = if engine.phase() == Phase::Completed {
                    ("Retake the quiz? [y/N] ", Event::Retake)
                } else {
                    ("Try again? [y/N] ", Event::Retry)
                };
                match prompter.ask(question, None).await? {
                    Reply::Line(line) if matches!(line.to_lowercase().as_str(), "y" | "yes") => {
                        send(engine, event)
                    }
                    _ => return Ok(Outcome::Finished),
                }
            }
        }
    }
}

fn print_title(engine: &QuizEngine) {
    let Some(quiz) = engine.session().document() else {
        return;
    };
    println!("\n{}", quiz.title);
    if !quiz.description.is_empty() {
        println!("{}", quiz.description);
    }
    let numbering = quizkit_core::grading::Numbering::new(&quiz.questions);
    println!(
        "{} questions, {} items, pass mark {:.0}%",
        quiz.questions.len(),
        numbering.total_items,
        engine.pass_threshold() * 100.0
    );
    if let Some(minutes) = quiz.time_limit_minutes {
        println!("Time limit: {minutes} minutes");
    }
}

fn show_question(engine: &QuizEngine, index: usize, deadline: Option<Instant>) {
    let Some(question) = engine.session().questions().get(index) else {
        return;
    };
    let Some(order) = engine.session().display_order() else {
        return;
    };
    let rendered = quizkit_core::render::render_question(
        question,
        order,
        &TerminalTypesetter::new(),
    );
    let label = engine.label(index).unwrap_or_else(|| format!("Question {}", index + 1));
    println!("\n{}", question_text(&label, &rendered));
    if let Some(deadline) = deadline {
        let left = deadline.saturating_duration_since(Instant::now()).as_secs();
        println!("({}:{:02} left)", left / 60, left % 60);
    }
}

/// Dispatch an event, reporting a rejection to the learner.
fn send(engine: &mut QuizEngine, event: Event) {
    if let Err(rejection) = engine.dispatch(event) {
        println!("  {rejection}");
    }
}

fn expire(engine: &mut QuizEngine) {
    println!("\nTime is up.");
    send(engine, Event::Expire);
}

/// Authored index of the option shown at `position`.
fn authored_index(engine: &QuizEngine, question: &Question, position: usize) -> Option<usize> {
    engine
        .session()
        .display_order()
        .and_then(|order| order.option_at(question, position))
}

/// Display positions named by option letters, e.g. `"A c"` or `"a,c"`.
fn parse_letters(line: &str, count: usize) -> Result<Vec<usize>, String> {
    let letters: Vec<String> = (0..count).map(letter_for).collect();
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let token = token.to_uppercase();
            letters
                .iter()
                .position(|letter| *letter == token)
                .ok_or_else(|| format!("  No option {token}."))
        })
        .collect()
}

async fn answer_question(
    engine: &mut QuizEngine,
    prompter: &mut Prompter,
    question: &Question,
    deadline: Option<Instant>,
) -> Result<Flow> {
    if question.is_gap_question() {
        return fill_gaps(engine, prompter, question, deadline).await;
    }

    let option_count = question.options().len();
    loop {
        let prompt = match &question.kind {
            QuestionKind::MultipleChoice { .. } => "Your answers (letters, e.g. A C): ",
            _ if option_count > 0 => "Your answer (letter): ",
            _ => "Your answer: ",
        };
        let line = match prompter.ask(prompt, deadline).await? {
            Reply::Line(line) => line,
            Reply::Quit => return Ok(Flow::Quit),
            Reply::Expired => return Ok(Flow::Expired),
        };

        if option_count == 0 {
            send(
                engine,
                Event::EnterText {
                    question_id: question.id.clone(),
                    text: line,
                },
            );
            return Ok(Flow::Answered);
        }

        let positions = match parse_letters(&line, option_count) {
            Ok(positions) => positions,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        if let QuestionKind::MultipleChoice { .. } = question.kind {
            let wanted: BTreeSet<usize> = positions
                .iter()
                .filter_map(|p| authored_index(engine, question, *p))
                .collect();
            let current = match engine.session().answer(&question.id) {
                Some(Answer::Choices(set)) => set.clone(),
                _ => BTreeSet::new(),
            };
            for option in current.symmetric_difference(&wanted) {
                send(
                    engine,
                    Event::Toggle {
                        question_id: question.id.clone(),
                        option: *option,
                    },
                );
            }
            return Ok(Flow::Answered);
        }

        match positions.as_slice() {
            [position] => {
                if let Some(option) = authored_index(engine, question, *position) {
                    send(
                        engine,
                        Event::Select {
                            question_id: question.id.clone(),
                            option,
                        },
                    );
                }
                return Ok(Flow::Answered);
            }
            // Nothing picked: let Check report the question as incomplete.
            [] => return Ok(Flow::Answered),
            _ => println!("  Pick exactly one option."),
        }
    }
}

async fn fill_gaps(
    engine: &mut QuizEngine,
    prompter: &mut Prompter,
    question: &Question,
    deadline: Option<Instant>,
) -> Result<Flow> {
    let Some(parsed) = question.parsed_gaps() else {
        return Ok(Flow::Answered);
    };
    let offers_choices = matches!(question.kind, QuestionKind::TextCompletion { .. });

    for gap in parsed.gaps() {
        let choices: Vec<String> = match engine.session().display_order() {
            Some(order) if offers_choices => order
                .candidates(&question.id, gap)
                .into_iter()
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        let prompt = if choices.is_empty() {
            format!("Gap {}: ", gap.index + 1)
        } else {
            let listed: Vec<String> = choices
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}) {c}", i + 1))
                .collect();
            format!("Gap {} [{}]: ", gap.index + 1, listed.join("  "))
        };

        let line = match prompter.ask(&prompt, deadline).await? {
            Reply::Line(line) => line,
            Reply::Quit => return Ok(Flow::Quit),
            Reply::Expired => return Ok(Flow::Expired),
        };
        // A number picks from the listed choices; anything else is taken as typed.
        let value = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| choices.get(i).cloned())
            .unwrap_or(line);

        send(
            engine,
            Event::FillGap {
                question_id: question.id.clone(),
                gap: gap.index,
                value,
            },
        );
    }

    Ok(Flow::Answered)
}
