//! File-backed content source and draft store.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use quizkit_core::gaps::DEFAULT_SEPARATOR;
use quizkit_core::model::QuizDocument;
use quizkit_core::parser::{load_quiz_directory_with_separator, parse_quiz_str_with_separator};
use quizkit_core::session::SessionSnapshot;
use quizkit_core::traits::{ContentSource, DraftStore};

use crate::error::CollaboratorError;

/// Loads quizzes from a directory of `.toml` / `.json` files.
///
/// `load_quiz("algebra")` tries `algebra.toml` and `algebra.json` first, then
/// falls back to scanning the directory for a document whose `id` matches.
pub struct FileContentSource {
    dir: PathBuf,
    separator: String,
}

impl FileContentSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    /// Gap separator for questions that do not set their own.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every quiz in the directory, recursively.
    pub async fn list(&self) -> anyhow::Result<Vec<QuizDocument>> {
        let dir = self.dir.clone();
        let separator = self.separator.clone();
        tokio::task::spawn_blocking(move || load_quiz_directory_with_separator(&dir, &separator))
            .await
            .context("quiz directory scan panicked")?
    }
}

#[async_trait]
impl ContentSource for FileContentSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_quiz(&self, quiz_id: &str) -> anyhow::Result<QuizDocument> {
        if !self.dir.is_dir() {
            return Err(CollaboratorError::Unavailable(format!(
                "quiz directory {} does not exist",
                self.dir.display()
            ))
            .into());
        }

        for ext in ["toml", "json"] {
            let path = self.dir.join(format!("{quiz_id}.{ext}"));
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    return parse_quiz_str_with_separator(&content, &path, &self.separator)
                        .map_err(|e| CollaboratorError::Malformed(format!("{e:#}")).into());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read {}", path.display()));
                }
            }
        }

        self.list()
            .await?
            .into_iter()
            .find(|quiz| quiz.id == quiz_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("quiz {quiz_id}")).into())
    }
}

/// Stores session drafts as `{session_id}.json` files.
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create draft directory {}", self.dir.display()))?;
        let path = self.path_for(snapshot.session_id);
        let json = serde_json::to_string_pretty(snapshot).context("failed to serialize draft")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write draft to {}", path.display()))?;
        tracing::debug!(session = %snapshot.session_id, path = %path.display(), "draft saved");
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> anyhow::Result<Option<SessionSnapshot>> {
        let path = self.path_for(session_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read draft {}", path.display()))
            }
        };
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse draft {}", path.display()))?;
        Ok(Some(snapshot))
    }

    async fn delete(&self, session_id: Uuid) -> anyhow::Result<()> {
        let path = self.path_for(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete draft {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizkit_core::answer::Answer;
    use quizkit_core::model::DisplayMode;
    use quizkit_core::session::Phase;
    use std::collections::BTreeMap;

    const QUIZ: &str = r#"
title = "Local"

[[questions]]
id = "s"
type = "short_answer"
prompt = "Capital of Italy?"
accepted = "Rome|Roma"
"#;

    #[tokio::test]
    async fn loads_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("local.toml"), QUIZ).unwrap();

        let source = FileContentSource::new(dir.path());
        let quiz = source.load_quiz("local").await.unwrap();
        assert_eq!(quiz.id, "local");
        assert_eq!(quiz.questions.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_document_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("unit1")).unwrap();
        std::fs::write(
            dir.path().join("unit1").join("whatever.toml"),
            format!("id = \"capitals\"\n{QUIZ}"),
        )
        .unwrap();

        let source = FileContentSource::new(dir.path());
        let quiz = source.load_quiz("capitals").await.unwrap();
        assert_eq!(quiz.title, "Local");
        assert_eq!(source.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_quiz_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileContentSource::new(dir.path());
        let err = source.load_quiz("ghost").await.unwrap_err();
        assert!(CollaboratorError::classify(&err).unwrap().is_permanent());

        let source = FileContentSource::new(dir.path().join("nope"));
        let err = source.load_quiz("ghost").await.unwrap_err();
        assert!(matches!(
            CollaboratorError::classify(&err),
            Some(CollaboratorError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalid_quiz_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.toml"), "title = ").unwrap();
        let source = FileContentSource::new(dir.path());
        let err = source.load_quiz("broken").await.unwrap_err();
        assert!(matches!(
            CollaboratorError::classify(&err),
            Some(CollaboratorError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn draft_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("drafts"));
        let session_id = Uuid::new_v4();
        let snapshot = SessionSnapshot {
            session_id,
            quiz_id: "local".into(),
            mode: DisplayMode::OneByOne,
            phase: Phase::Question,
            current: 0,
            answers: BTreeMap::from([("s".to_string(), Answer::Text("Rome".into()))]),
            revealed: false,
            seed: 7,
            saved_at: chrono::Utc::now(),
        };

        assert!(store.load(session_id).await.unwrap().is_none());
        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load(session_id).await.unwrap(), Some(snapshot));
        store.delete(session_id).await.unwrap();
        assert!(store.load(session_id).await.unwrap().is_none());
        // Deleting twice is fine.
        store.delete(session_id).await.unwrap();
    }
}
