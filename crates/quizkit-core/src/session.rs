//! Quiz session state machine.
//!
//! [`QuizSession::apply`] is a pure reducer: it takes the current snapshot
//! and an [`Event`] and returns either the next snapshot or a [`Rejection`].
//! A rejected event leaves the caller's snapshot exactly as it was.
//!
//! Sequential mode:
//!
//! ```text
//! stalled -> title -(start)-> question -(check)-> result -(advance)-> question | completed
//! completed -(retake)-> title
//! ```
//!
//! Feed mode:
//!
//! ```text
//! stalled -> open -(check_all)-> checked -(retry)-> open
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::answer::{self, Answer};
use crate::model::{DisplayMode, Question, QuestionKind, QuizDocument};
use crate::shuffle::DisplayOrder;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Content has not arrived yet.
    Stalled,
    Title,
    Question,
    Result,
    Completed,
    Open,
    Checked,
}

impl Phase {
    /// No further progress without a retake/retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Checked)
    }

    /// Answers can be edited in this phase.
    pub fn accepts_input(self) -> bool {
        matches!(self, Phase::Question | Phase::Open)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Stalled => "stalled",
            Phase::Title => "title",
            Phase::Question => "question",
            Phase::Result => "result",
            Phase::Completed => "completed",
            Phase::Open => "open",
            Phase::Checked => "checked",
        };
        f.write_str(name)
    }
}

/// Something the learner (or the environment) did.
#[derive(Debug, Clone)]
pub enum Event {
    /// Quiz content arrived from the content collaborator.
    Loaded(Arc<QuizDocument>),
    Start,
    /// Pick an option (authored index) of a single-answer question.
    Select { question_id: String, option: usize },
    /// Flip an option (authored index) of a multiple-choice question.
    Toggle { question_id: String, option: usize },
    FillGap {
        question_id: String,
        gap: usize,
        value: String,
    },
    EnterText { question_id: String, text: String },
    Check,
    Advance,
    CheckAll,
    Retake,
    Retry,
    /// The time limit ran out.
    Expire,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Loaded(_) => "loaded",
            Event::Start => "start",
            Event::Select { .. } => "select",
            Event::Toggle { .. } => "toggle",
            Event::FillGap { .. } => "fill_gap",
            Event::EnterText { .. } => "enter_text",
            Event::Check => "check",
            Event::Advance => "advance",
            Event::CheckAll => "check_all",
            Event::Retake => "retake",
            Event::Retry => "retry",
            Event::Expire => "expire",
        }
    }
}

/// Why an event was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("question {question_id} is incomplete: missing {}", .missing.join(", "))]
    Incomplete {
        question_id: String,
        missing: Vec<String>,
    },

    #[error("{event} is not allowed in the {phase} phase")]
    NotAllowed { phase: Phase, event: &'static str },

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("question {0} is not the current question")]
    NotCurrent(String),

    #[error("question {question_id}: index {index} is out of range")]
    OutOfRange { question_id: String, index: usize },

    #[error("question {question_id} does not accept {event} input")]
    WrongKind {
        question_id: String,
        event: &'static str,
    },
}

/// Serializable part of a session, used for drafts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub quiz_id: String,
    pub mode: DisplayMode,
    pub phase: Phase,
    pub current: usize,
    pub answers: BTreeMap<String, Answer>,
    pub revealed: bool,
    pub seed: u64,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

/// One learner's pass through a quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    mode_override: Option<DisplayMode>,
    mode: DisplayMode,
    phase: Phase,
    current: usize,
    answers: BTreeMap<String, Answer>,
    revealed: bool,
    seed: u64,
    document: Option<Arc<QuizDocument>>,
    order: Option<Arc<DisplayOrder>>,
}

impl QuizSession {
    /// A session waiting for content. `mode` overrides the document's display mode.
    pub fn new(mode: Option<DisplayMode>, seed: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode_override: mode,
            mode: mode.unwrap_or_default(),
            phase: Phase::Stalled,
            current: 0,
            answers: BTreeMap::new(),
            revealed: false,
            seed,
            document: None,
            order: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether the answers of the current step have been checked and revealed.
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn document(&self) -> Option<&QuizDocument> {
        self.document.as_deref()
    }

    pub fn questions(&self) -> &[Question] {
        self.document
            .as_deref()
            .map_or(&[], |doc| doc.questions.as_slice())
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Question | Phase::Result => self.questions().get(self.current),
            _ => None,
        }
    }

    pub fn display_order(&self) -> Option<&DisplayOrder> {
        self.order.as_deref()
    }

    /// Number of questions whose required fields are all filled in.
    pub fn completed_count(&self) -> usize {
        self.questions()
            .iter()
            .filter(|q| answer::is_complete(q, self.answers.get(&q.id)))
            .count()
    }

    /// Apply `event`, returning the next snapshot.
    pub fn apply(&self, event: Event) -> Result<QuizSession, Rejection> {
        let event_name = event.name();
        let not_allowed = || Rejection::NotAllowed {
            phase: self.phase,
            event: event_name,
        };
        let mut next = self.clone();

        match event {
            Event::Loaded(document) => {
                if self.phase != Phase::Stalled {
                    return Err(not_allowed());
                }
                next.mode = self.mode_override.unwrap_or(document.display_mode);
                next.order = Some(Arc::new(DisplayOrder::new(&document.questions, self.seed)));
                next.document = Some(document);
                next.phase = match next.mode {
                    DisplayMode::OneByOne => Phase::Title,
                    DisplayMode::AllAtOnce => Phase::Open,
                };
            }
            Event::Start => {
                if self.phase != Phase::Title {
                    return Err(not_allowed());
                }
                next.current = 0;
                next.revealed = false;
                next.phase = if self.questions().is_empty() {
                    Phase::Completed
                } else {
                    Phase::Question
                };
            }
            Event::Select {
                question_id,
                option,
            } => {
                let question = self.editable_question(&question_id, event_name)?;
                match &question.kind {
                    QuestionKind::SingleChoice { options }
                    | QuestionKind::MediaQuestion { options }
                        if !options.is_empty() =>
                    {
                        if option >= options.len() {
                            return Err(Rejection::OutOfRange {
                                question_id,
                                index: option,
                            });
                        }
                        next.answers.insert(question_id, Answer::Choice(option));
                    }
                    _ => return Err(wrong_kind(question_id, event_name)),
                }
            }
            Event::Toggle {
                question_id,
                option,
            } => {
                let question = self.editable_question(&question_id, event_name)?;
                let QuestionKind::MultipleChoice { options } = &question.kind else {
                    return Err(wrong_kind(question_id, event_name));
                };
                if option >= options.len() {
                    return Err(Rejection::OutOfRange {
                        question_id,
                        index: option,
                    });
                }
                let entry = next
                    .answers
                    .entry(question_id)
                    .or_insert_with(|| Answer::Choices(Default::default()));
                if let Answer::Choices(set) = entry {
                    if !set.remove(&option) {
                        set.insert(option);
                    }
                } else {
                    *entry = Answer::Choices([option].into_iter().collect());
                }
            }
            Event::FillGap {
                question_id,
                gap,
                value,
            } => {
                let question = self.editable_question(&question_id, event_name)?;
                if !question.is_gap_question() {
                    return Err(wrong_kind(question_id, event_name));
                }
                let gap_count = question.gap_count();
                if gap >= gap_count {
                    return Err(Rejection::OutOfRange {
                        question_id,
                        index: gap,
                    });
                }
                let entry = next
                    .answers
                    .entry(question_id)
                    .or_insert_with(|| Answer::Gaps(Vec::new()));
                if !matches!(entry, Answer::Gaps(_)) {
                    *entry = Answer::Gaps(Vec::new());
                }
                if let Answer::Gaps(values) = entry {
                    if values.len() < gap_count {
                        values.resize(gap_count, String::new());
                    }
                    values[gap] = value;
                }
            }
            Event::EnterText { question_id, text } => {
                let question = self.editable_question(&question_id, event_name)?;
                match &question.kind {
                    QuestionKind::ShortAnswer { .. } | QuestionKind::LongText => {}
                    QuestionKind::MediaQuestion { options } if options.is_empty() => {}
                    _ => return Err(wrong_kind(question_id, event_name)),
                }
                next.answers.insert(question_id, Answer::Text(text));
            }
            Event::Check => {
                if self.phase != Phase::Question {
                    return Err(not_allowed());
                }
                if let Some(question) = self.questions().get(self.current) {
                    let missing = answer::missing_fields(question, self.answers.get(&question.id));
                    if !missing.is_empty() {
                        return Err(Rejection::Incomplete {
                            question_id: question.id.clone(),
                            missing,
                        });
                    }
                }
                next.phase = Phase::Result;
                next.revealed = true;
            }
            Event::Advance => {
                if self.phase != Phase::Result {
                    return Err(not_allowed());
                }
                if self.current + 1 < self.questions().len() {
                    next.current = self.current + 1;
                    next.phase = Phase::Question;
                    next.revealed = false;
                } else {
                    next.phase = Phase::Completed;
                }
            }
            Event::CheckAll => {
                if self.phase != Phase::Open {
                    return Err(not_allowed());
                }
                for question in self.questions() {
                    let missing = answer::missing_fields(question, self.answers.get(&question.id));
                    if !missing.is_empty() {
                        return Err(Rejection::Incomplete {
                            question_id: question.id.clone(),
                            missing,
                        });
                    }
                }
                next.phase = Phase::Checked;
                next.revealed = true;
            }
            Event::Retake => {
                if self.phase != Phase::Completed {
                    return Err(not_allowed());
                }
                next.reset_answers();
                next.phase = Phase::Title;
            }
            Event::Retry => {
                if self.phase != Phase::Checked {
                    return Err(not_allowed());
                }
                next.reset_answers();
                next.phase = Phase::Open;
            }
            Event::Expire => {
                next.phase = match self.phase {
                    Phase::Question | Phase::Result => Phase::Completed,
                    Phase::Open => Phase::Checked,
                    _ => return Err(not_allowed()),
                };
                next.revealed = true;
            }
        }

        tracing::debug!(
            session = %self.id,
            event = event_name,
            from = %self.phase,
            to = %next.phase,
            "session transition"
        );
        Ok(next)
    }

    fn reset_answers(&mut self) {
        self.answers.clear();
        self.current = 0;
        self.revealed = false;
    }

    /// The question an input event targets, if input is allowed for it now.
    fn editable_question(
        &self,
        question_id: &str,
        event: &'static str,
    ) -> Result<&Question, Rejection> {
        if !self.phase.accepts_input() {
            return Err(Rejection::NotAllowed {
                phase: self.phase,
                event,
            });
        }
        let position = self
            .document
            .as_deref()
            .and_then(|doc| doc.position(question_id))
            .ok_or_else(|| Rejection::UnknownQuestion(question_id.to_string()))?;
        if self.phase == Phase::Question && position != self.current {
            return Err(Rejection::NotCurrent(question_id.to_string()));
        }
        Ok(&self.questions()[position])
    }

    /// Capture the serializable state for a draft.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            quiz_id: self
                .document
                .as_deref()
                .map(|doc| doc.id.clone())
                .unwrap_or_default(),
            mode: self.mode,
            phase: self.phase,
            current: self.current,
            answers: self.answers.clone(),
            revealed: self.revealed,
            seed: self.seed,
            saved_at: chrono::Utc::now(),
        }
    }

    /// Rebuild a session from a draft against freshly loaded content.
    ///
    /// Answers for questions that no longer exist are dropped, and an index
    /// beyond the end of the quiz is clamped.
    pub fn restore(snapshot: SessionSnapshot, document: Arc<QuizDocument>) -> Self {
        let len = document.questions.len();
        let answers = snapshot
            .answers
            .into_iter()
            .filter(|(id, _)| document.position(id).is_some())
            .collect();
        let phase = match (snapshot.phase, snapshot.mode) {
            (Phase::Stalled, DisplayMode::OneByOne) => Phase::Title,
            (Phase::Stalled, DisplayMode::AllAtOnce) => Phase::Open,
            (phase, _) => phase,
        };
        Self {
            id: snapshot.session_id,
            mode_override: Some(snapshot.mode),
            mode: snapshot.mode,
            phase,
            current: snapshot.current.min(len.saturating_sub(1)),
            answers,
            revealed: snapshot.revealed,
            seed: snapshot.seed,
            order: Some(Arc::new(DisplayOrder::new(&document.questions, snapshot.seed))),
            document: Some(document),
        }
    }
}

fn wrong_kind(question_id: String, event: &'static str) -> Rejection {
    Rejection::WrongKind { question_id, event }
}
