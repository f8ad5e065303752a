//! Quiz engine: one learner session wired to its collaborators.
//!
//! The engine owns a [`QuizSession`] and feeds it events. Everything that
//! needs the outside world (loading content, looking up manual grades,
//! saving drafts) is async and goes through the collaborator traits; the
//! transitions themselves are synchronous.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::CollaboratorError;
use crate::formula::DeferredRender;
use crate::grading::{grade, GradingResult, ManualGrades, Numbering, DEFAULT_PASS_THRESHOLD};
use crate::model::DisplayMode;
use crate::render::{render_question, RenderedQuestion};
use crate::report::SessionReport;
use crate::session::{Event, Phase, QuizSession, Rejection};
use crate::shuffle::fresh_seed;
use crate::traits::{ContentSource, DraftStore, GradeStore, Typesetter};

/// Configuration for the quiz engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Share of items that must be correct to pass, unless the quiz sets its own.
    pub pass_threshold: f64,
    /// Fixed shuffle seed; a fresh one is drawn per session when unset.
    pub seed: Option<u64>,
    /// Delay before a deferred formula re-render runs.
    pub render_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            seed: None,
            render_delay: Duration::from_millis(50),
        }
    }
}

/// Session event observer.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, event: &str, from: Phase, to: Phase);
    fn on_rejected(&self, rejection: &Rejection);
    fn on_graded(&self, result: &GradingResult);
    fn on_collaborator_error(&self, operation: &str, error: &str);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_transition(&self, _: &str, _: Phase, _: Phase) {}
    fn on_rejected(&self, _: &Rejection) {}
    fn on_graded(&self, _: &GradingResult) {}
    fn on_collaborator_error(&self, _: &str, _: &str) {}
}

/// The quiz engine for a single learner session.
pub struct QuizEngine {
    quiz_id: String,
    content: Arc<dyn ContentSource>,
    typesetter: Arc<dyn Typesetter>,
    grades: Arc<dyn GradeStore>,
    drafts: Option<Arc<dyn DraftStore>>,
    observer: Arc<dyn SessionObserver>,
    config: EngineConfig,
    session: QuizSession,
    manual: ManualGrades,
    grading: Option<GradingResult>,
    deadline: Option<Instant>,
}

impl QuizEngine {
    pub fn new(
        quiz_id: impl Into<String>,
        content: Arc<dyn ContentSource>,
        typesetter: Arc<dyn Typesetter>,
        grades: Arc<dyn GradeStore>,
        config: EngineConfig,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(fresh_seed);
        Self {
            quiz_id: quiz_id.into(),
            content,
            typesetter,
            grades,
            drafts: None,
            observer: Arc::new(NoopObserver),
            config,
            session: QuizSession::new(None, seed),
            manual: ManualGrades::new(),
            grading: None,
            deadline: None,
        }
    }

    pub fn with_drafts(mut self, drafts: Arc<dyn DraftStore>) -> Self {
        self.drafts = Some(drafts);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the quiz's display mode. Only takes effect before content loads.
    pub fn with_mode(mut self, mode: DisplayMode) -> Self {
        if self.session.phase() == Phase::Stalled {
            self.session = QuizSession::new(Some(mode), self.session.seed());
        }
        self
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// Grading from the last reveal, if any.
    pub fn grading(&self) -> Option<&GradingResult> {
        self.grading.as_ref()
    }

    pub fn manual_grades(&self) -> &ManualGrades {
        &self.manual
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Pass threshold in effect: the quiz's own, else the configured one.
    pub fn pass_threshold(&self) -> f64 {
        self.session
            .document()
            .and_then(|doc| doc.pass_threshold)
            .unwrap_or(self.config.pass_threshold)
    }

    /// Fetch the quiz content. On failure the engine stays stalled and the
    /// collaborator error is returned; calling again retries.
    pub async fn load(&mut self) -> Result<()> {
        if self.phase() != Phase::Stalled {
            return Ok(());
        }

        let document = match self.content.load_quiz(&self.quiz_id).await {
            Ok(document) => document,
            Err(e) => {
                let permanent = CollaboratorError::classify(&e).is_some_and(|c| c.is_permanent());
                tracing::warn!(
                    quiz = %self.quiz_id,
                    source = self.content.name(),
                    permanent,
                    "failed to load quiz: {e:#}"
                );
                self.observer
                    .on_collaborator_error("load_quiz", &format!("{e:#}"));
                return Err(e.context(format!("failed to load quiz {}", self.quiz_id)));
            }
        };

        tracing::info!(
            quiz = %document.id,
            questions = document.questions.len(),
            "quiz loaded"
        );
        self.dispatch(Event::Loaded(Arc::new(document)))?;
        self.refresh_manual_grades().await;
        Ok(())
    }

    /// Apply one event. A rejected event leaves the session untouched.
    pub fn dispatch(&mut self, event: Event) -> Result<Phase, Rejection> {
        let name = event.name();
        let is_reset = matches!(event, Event::Retake | Event::Retry);
        let from = self.session.phase();

        let next = match self.session.apply(event) {
            Ok(next) => next,
            Err(rejection) => {
                tracing::debug!(session = %self.session.id(), event = name, "rejected: {rejection}");
                self.observer.on_rejected(&rejection);
                return Err(rejection);
            }
        };
        self.session = next;
        let to = self.session.phase();
        self.observer.on_transition(name, from, to);

        if is_reset {
            self.grading = None;
        }
        if from != to && self.session.is_revealed() {
            self.regrade();
        }
        self.update_deadline(from, to);

        Ok(to)
    }

    fn regrade(&mut self) {
        let result = self.grade_now();
        tracing::debug!(
            session = %self.session.id(),
            score = result.score,
            status = %result.status,
            "graded"
        );
        self.observer.on_graded(&result);
        self.grading = Some(result);
    }

    /// Grade the current answers without changing any state.
    pub fn grade_now(&self) -> GradingResult {
        grade(
            self.session.questions(),
            self.session.answers(),
            &self.manual,
            self.pass_threshold(),
        )
    }

    fn update_deadline(&mut self, from: Phase, to: Phase) {
        let started = matches!(
            (from, to),
            (Phase::Title, Phase::Question)
                | (Phase::Stalled, Phase::Open)
                | (Phase::Checked, Phase::Open)
        );
        if started {
            self.deadline = self
                .session
                .document()
                .and_then(|doc| doc.time_limit_minutes)
                .map(|minutes| Instant::now() + Duration::from_secs(u64::from(minutes) * 60));
        } else if !matches!(to, Phase::Question | Phase::Result | Phase::Open) {
            self.deadline = None;
        }
    }

    /// Time left before the session expires, `None` without a time limit.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Expire the session if its deadline has passed. Returns whether it did.
    pub fn check_deadline(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                tracing::info!(session = %self.session.id(), "time limit reached");
                self.dispatch(Event::Expire).is_ok()
            }
            _ => false,
        }
    }

    /// Ask the grade store about every question that needs a manual grade.
    ///
    /// Lookups run concurrently; failures are logged and leave any earlier
    /// grade in place. Returns how many questions now have a final grade.
    pub async fn refresh_manual_grades(&mut self) -> usize {
        let pending: Vec<(usize, String)> = self
            .session
            .questions()
            .iter()
            .enumerate()
            .filter(|(_, q)| q.needs_manual_grading())
            .map(|(i, q)| (i, q.id.clone()))
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let quiz_id = self
            .session
            .document()
            .map_or_else(|| self.quiz_id.clone(), |doc| doc.id.clone());
        let mut lookups = FuturesUnordered::new();
        for (index, question_id) in pending {
            let grades = Arc::clone(&self.grades);
            let quiz_id = quiz_id.clone();
            lookups.push(async move {
                let result = grades.manual_grade(&quiz_id, &question_id).await;
                (index, question_id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(outcome) = lookups.next().await {
            results.push(outcome);
        }
        results.sort_by_key(|(index, _, _)| *index);

        for (_, question_id, result) in results {
            match result {
                Ok(Some(record)) if record.is_graded && !record.is_final() => {
                    tracing::warn!(
                        question = %question_id,
                        score = record.score_percentage,
                        "manual grade has no usable score, question stays pending"
                    );
                }
                Ok(Some(record)) => {
                    self.manual.insert(question_id, record);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(question = %question_id, "manual grade lookup failed: {e:#}");
                    self.observer
                        .on_collaborator_error("manual_grade", &format!("{e:#}"));
                }
            }
        }

        if self.grading.is_some() && self.session.is_revealed() {
            self.regrade();
        }
        self.manual.values().filter(|g| g.is_final()).count()
    }

    /// Numbering label of the question at `index`, e.g. "Questions 4–6 of 12".
    pub fn label(&self, index: usize) -> Option<String> {
        Numbering::new(self.session.questions()).label(index)
    }

    /// The current question of a sequential session, rendered.
    pub fn render_current(&self) -> Option<RenderedQuestion> {
        let question = self.session.current_question()?;
        let order = self.session.display_order()?;
        Some(render_question(question, order, self.typesetter.as_ref()))
    }

    /// Every question, rendered in order.
    pub fn render_all(&self) -> Vec<RenderedQuestion> {
        let Some(order) = self.session.display_order() else {
            return Vec::new();
        };
        self.session
            .questions()
            .iter()
            .map(|q| render_question(q, order, self.typesetter.as_ref()))
            .collect()
    }

    /// Re-render `text` after the configured delay. Dropping the handle
    /// cancels the render.
    pub fn schedule_render(&self, text: impl Into<String>) -> DeferredRender {
        DeferredRender::schedule(
            text.into(),
            Arc::clone(&self.typesetter),
            self.config.render_delay,
        )
    }

    /// Persist the session through the draft store, if one is configured.
    pub async fn save_draft(&self) -> Result<()> {
        let Some(drafts) = &self.drafts else {
            tracing::debug!("no draft store configured, draft not saved");
            return Ok(());
        };
        if self.phase() == Phase::Stalled {
            return Ok(());
        }
        drafts
            .save(&self.session.snapshot())
            .await
            .with_context(|| format!("failed to save draft for session {}", self.session.id()))
    }

    /// Resume a saved session. Returns `false` if there is no such draft.
    pub async fn resume(&mut self, session_id: Uuid) -> Result<bool> {
        let Some(drafts) = &self.drafts else {
            anyhow::bail!("no draft store configured");
        };
        let Some(snapshot) = drafts
            .load(session_id)
            .await
            .with_context(|| format!("failed to load draft {session_id}"))?
        else {
            return Ok(false);
        };

        let document = self
            .content
            .load_quiz(&snapshot.quiz_id)
            .await
            .with_context(|| format!("failed to load quiz {}", snapshot.quiz_id))?;
        self.quiz_id = document.id.clone();
        let from = self.session.phase();
        self.session = QuizSession::restore(snapshot, Arc::new(document));
        tracing::info!(session = %session_id, phase = %self.session.phase(), "session resumed");

        self.grading = None;
        self.refresh_manual_grades().await;
        if self.session.is_revealed() {
            self.regrade();
        }
        let to = self.session.phase();
        if matches!(to, Phase::Question | Phase::Result | Phase::Open) {
            // The remaining time is not stored, so a resumed session gets a full limit.
            self.update_deadline(Phase::Title, Phase::Question);
        } else {
            self.update_deadline(from, to);
        }
        Ok(true)
    }

    /// Remove the session's draft, if a draft store is configured.
    pub async fn discard_draft(&self) -> Result<()> {
        match &self.drafts {
            Some(drafts) => drafts.delete(self.session.id()).await,
            None => Ok(()),
        }
    }

    /// A report of the session as it stands, once content is loaded.
    pub fn report(&self) -> Option<SessionReport> {
        let document = self.session.document()?;
        let grading = self.grading.clone().unwrap_or_else(|| self.grade_now());
        Some(SessionReport::new(
            document,
            self.session.id(),
            self.session.answers().clone(),
            grading,
        ))
    }
}
