//! In-memory manual-grade store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::Context;
use async_trait::async_trait;

use quizkit_core::model::ManualGrade;
use quizkit_core::traits::GradeStore;

/// Manual grades held in memory, keyed by quiz and question id.
///
/// Grades recorded here outlive any number of retakes of the quiz.
#[derive(Default)]
pub struct MemoryGradeStore {
    grades: RwLock<HashMap<(String, String), ManualGrade>>,
}

impl MemoryGradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load grades for one quiz from a JSON object of question id to grade.
    pub fn from_json_file(quiz_id: &str, path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read grades from {}", path.display()))?;
        let grades: HashMap<String, ManualGrade> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse grades in {}", path.display()))?;
        let store = Self::new();
        for (question_id, grade) in grades {
            store.record(quiz_id, &question_id, grade);
        }
        Ok(store)
    }

    /// Record (or replace) the grade for one question.
    pub fn record(&self, quiz_id: &str, question_id: &str, grade: ManualGrade) {
        let mut grades = self.grades.write().unwrap_or_else(|e| e.into_inner());
        grades.insert((quiz_id.to_string(), question_id.to_string()), grade);
    }

    pub fn len(&self) -> usize {
        self.grades.read().map_or(0, |g| g.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GradeStore for MemoryGradeStore {
    async fn manual_grade(
        &self,
        quiz_id: &str,
        question_id: &str,
    ) -> anyhow::Result<Option<ManualGrade>> {
        let grades = self.grades.read().unwrap_or_else(|e| e.into_inner());
        Ok(grades
            .get(&(quiz_id.to_string(), question_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(score: f64) -> ManualGrade {
        ManualGrade {
            is_graded: true,
            score_percentage: score,
            feedback: None,
        }
    }

    #[tokio::test]
    async fn record_and_lookup() {
        let store = MemoryGradeStore::new();
        assert!(store.is_empty());
        store.record("quiz", "essay", graded(40.0));
        store.record("quiz", "essay", graded(90.0));
        assert_eq!(store.len(), 1);

        let grade = store.manual_grade("quiz", "essay").await.unwrap().unwrap();
        assert_eq!(grade.score_percentage, 90.0);
        assert!(store.manual_grade("other", "essay").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.json");
        std::fs::write(
            &path,
            r#"{"essay": {"is_graded": true, "score_percentage": 65, "feedback": "ok"},
                "photo": {"is_graded": false}}"#,
        )
        .unwrap();

        let store = MemoryGradeStore::from_json_file("quiz", &path).unwrap();
        assert_eq!(store.len(), 2);
        let photo = store.manual_grade("quiz", "photo").await.unwrap().unwrap();
        assert!(!photo.is_graded);
        assert!(MemoryGradeStore::from_json_file("quiz", &dir.path().join("missing.json")).is_err());
    }
}
