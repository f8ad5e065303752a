//! Mock collaborators for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use quizkit_core::error::CollaboratorError;
use quizkit_core::formula::MathMode;
use quizkit_core::model::{ManualGrade, QuizDocument};
use quizkit_core::traits::{ContentSource, FormulaCheck, GradeStore, Typesetter};

/// A content source serving one document, optionally after a number of
/// simulated outages.
pub struct MockContentSource {
    document: QuizDocument,
    /// Loads that fail with `Unavailable` before the document is served.
    outages: u32,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last quiz id requested.
    last_request: Mutex<Option<String>>,
}

impl MockContentSource {
    pub fn new(document: QuizDocument) -> Self {
        Self {
            document,
            outages: 0,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail the first `outages` loads.
    pub fn with_outages(mut self, outages: u32) -> Self {
        self.outages = outages;
        self
    }

    /// Get the number of calls made to this source.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last quiz id requested.
    pub fn last_request(&self) -> Option<String> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_quiz(&self, quiz_id: &str) -> anyhow::Result<QuizDocument> {
        let call = self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(quiz_id.to_string());

        if call < self.outages {
            return Err(CollaboratorError::Unavailable("simulated outage".into()).into());
        }
        if quiz_id != self.document.id {
            return Err(CollaboratorError::NotFound(format!("quiz {quiz_id}")).into());
        }
        Ok(self.document.clone())
    }
}

/// A grade store whose every lookup fails.
pub struct FailingGradeStore;

#[async_trait]
impl GradeStore for FailingGradeStore {
    async fn manual_grade(&self, _: &str, _: &str) -> anyhow::Result<Option<ManualGrade>> {
        Err(CollaboratorError::Unavailable("grading service offline".into()).into())
    }
}

/// A typesetter that wraps expressions in `<m>` tags and rejects a fixed set
/// of expressions.
#[derive(Default)]
pub struct MockTypesetter {
    rejected: HashSet<String>,
    call_count: AtomicU32,
}

impl MockTypesetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `expression` in both `render` and `validate`.
    pub fn rejecting(mut self, expression: &str) -> Self {
        self.rejected.insert(expression.to_string());
        self
    }

    /// Get the number of render calls made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Typesetter for MockTypesetter {
    fn render(&self, expression: &str, mode: MathMode) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.rejected.contains(expression) {
            anyhow::bail!("cannot typeset `{expression}`");
        }
        Ok(match mode {
            MathMode::Inline => format!("<m>{expression}</m>"),
            MathMode::Display => format!("<m display>{expression}</m>"),
        })
    }

    fn validate(&self, expression: &str) -> FormulaCheck {
        if self.rejected.contains(expression) {
            FormulaCheck::invalid(format!("cannot typeset `{expression}`"))
        } else {
            FormulaCheck::ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizkit_core::formula::render_formulas;
    use quizkit_core::model::DisplayMode;

    fn document() -> QuizDocument {
        QuizDocument {
            id: "mock".into(),
            title: "Mock".into(),
            description: String::new(),
            display_mode: DisplayMode::OneByOne,
            time_limit_minutes: None,
            pass_threshold: None,
            questions: vec![],
        }
    }

    #[tokio::test]
    async fn outages_then_document() {
        let source = MockContentSource::new(document()).with_outages(2);
        assert!(source.load_quiz("mock").await.is_err());
        assert!(source.load_quiz("mock").await.is_err());
        assert_eq!(source.load_quiz("mock").await.unwrap().title, "Mock");
        assert_eq!(source.call_count(), 3);
        assert_eq!(source.last_request().as_deref(), Some("mock"));

        let err = source.load_quiz("other").await.unwrap_err();
        assert!(CollaboratorError::classify(&err).unwrap().is_permanent());
    }

    #[test]
    fn typesetter_rejections() {
        let t = MockTypesetter::new().rejecting("bad");
        let out = render_formulas("$$ok$$ and $bad$", &t);
        assert!(out.starts_with("<m display>ok</m> and "));
        assert!(out.contains("math-error"));
        assert_eq!(t.call_count(), 2);
        assert!(!t.validate("bad").valid);
    }

    #[tokio::test]
    async fn failing_grade_store() {
        let err = FailingGradeStore.manual_grade("q", "e").await.unwrap_err();
        assert!(!CollaboratorError::classify(&err).unwrap().is_permanent());
    }
}
