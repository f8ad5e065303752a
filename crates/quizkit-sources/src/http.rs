//! HTTP content source and manual-grade store.
//!
//! Both talk to the same kind of backend:
//!
//! - `GET {base}/quizzes/{quiz_id}` returns a quiz document in the JSON
//!   quiz format
//! - `GET {base}/quizzes/{quiz_id}/grades/{question_id}` returns a manual
//!   grade record, 404 when nothing has been recorded

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::instrument;

use quizkit_core::gaps::DEFAULT_SEPARATOR;
use quizkit_core::model::{ManualGrade, QuizDocument};
use quizkit_core::parser::parse_quiz_str_with_separator;
use quizkit_core::traits::{ContentSource, GradeStore};

use crate::error::{from_reqwest, from_status, CollaboratorError, SetupError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Shared client plumbing.
struct Backend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Backend {
    fn new(base_url: &str, api_key: Option<String>) -> Result<Self, SetupError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SetupError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http:// or https:// URL".into(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SetupError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    /// GET `path`; `Ok(None)` on 404.
    async fn get_text(&self, path: &str, what: &str) -> Result<Option<String>, CollaboratorError> {
        let mut request = self.client.get(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| from_reqwest(e, &self.base_url, DEFAULT_TIMEOUT_SECS))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status, what, body));
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|e| CollaboratorError::Network(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<Option<T>, CollaboratorError> {
        match self.get_text(path, what).await? {
            Some(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| CollaboratorError::Malformed(format!("{what}: {e}"))),
            None => Ok(None),
        }
    }
}

/// Loads quizzes from an HTTP backend.
pub struct HttpContentSource {
    backend: Backend,
    separator: String,
}

impl HttpContentSource {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, SetupError> {
        Ok(Self {
            backend: Backend::new(base_url, api_key)?,
            separator: DEFAULT_SEPARATOR.to_string(),
        })
    }

    /// Gap separator for questions that do not set their own.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.backend.base_url))]
    async fn load_quiz(&self, quiz_id: &str) -> anyhow::Result<QuizDocument> {
        let what = format!("quiz {quiz_id}");
        let body = self
            .backend
            .get_text(&format!("/quizzes/{quiz_id}"), &what)
            .await?
            .ok_or_else(|| CollaboratorError::NotFound(what.clone()))?;

        // The file name only decides the format and the fallback id.
        let virtual_path = format!("{quiz_id}.json");
        let document =
            parse_quiz_str_with_separator(&body, Path::new(&virtual_path), &self.separator)
                .map_err(|e| CollaboratorError::Malformed(format!("{what}: {e:#}")))?;
        tracing::debug!(questions = document.questions.len(), "quiz fetched");
        Ok(document)
    }
}

/// Reads manual grades from an HTTP backend.
pub struct HttpGradeStore {
    backend: Backend,
}

impl HttpGradeStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, SetupError> {
        Ok(Self {
            backend: Backend::new(base_url, api_key)?,
        })
    }
}

#[async_trait]
impl GradeStore for HttpGradeStore {
    #[instrument(skip(self), fields(base_url = %self.backend.base_url))]
    async fn manual_grade(
        &self,
        quiz_id: &str,
        question_id: &str,
    ) -> anyhow::Result<Option<ManualGrade>> {
        let grade = self
            .backend
            .get_json::<ManualGrade>(
                &format!("/quizzes/{quiz_id}/grades/{question_id}"),
                &format!("grade for {quiz_id}/{question_id}"),
            )
            .await?;
        Ok(grade)
    }
}
