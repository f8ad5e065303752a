//! Collaborator traits.
//!
//! The engine never reaches for global handles: typesetting, content
//! loading, manual grading and draft persistence are all passed in as trait
//! objects. Concrete implementations live in `quizkit-sources`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::formula::MathMode;
use crate::model::{ManualGrade, QuizDocument};
use crate::session::SessionSnapshot;

// ---------------------------------------------------------------------------
// Typesetting
// ---------------------------------------------------------------------------

/// Turns a math expression into markup.
///
/// Implementations must be deterministic: the same expression and mode
/// always produce the same markup.
pub trait Typesetter: Send + Sync {
    /// Render one expression (without its `$` delimiters).
    fn render(&self, expression: &str, mode: MathMode) -> anyhow::Result<String>;

    /// Check an expression without rendering it.
    fn validate(&self, expression: &str) -> FormulaCheck;

    /// Prepare the plain text between formulas for this typesetter's output.
    /// The default targets HTML and escapes it.
    fn escape_text(&self, text: &str) -> String {
        crate::render::escape_html(text)
    }
}

/// Result of [`Typesetter::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaCheck {
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl FormulaCheck {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Content, grading and drafts
// ---------------------------------------------------------------------------

/// Delivers quiz documents.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable source name (e.g. "file").
    fn name(&self) -> &str;

    /// Fetch the quiz with the given id.
    async fn load_quiz(&self, quiz_id: &str) -> anyhow::Result<QuizDocument>;
}

/// Read-only view of externally recorded manual grades.
#[async_trait]
pub trait GradeStore: Send + Sync {
    /// The grade recorded for one question, `None` if nothing was recorded.
    async fn manual_grade(
        &self,
        quiz_id: &str,
        question_id: &str,
    ) -> anyhow::Result<Option<ManualGrade>>;
}

/// Key-value persistence of in-progress sessions.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()>;

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<SessionSnapshot>>;

    async fn delete(&self, session_id: Uuid) -> anyhow::Result<()>;
}
