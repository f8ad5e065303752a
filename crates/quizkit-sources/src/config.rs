//! Configuration and collaborator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizkit_core::engine::EngineConfig;
use quizkit_core::gaps::DEFAULT_SEPARATOR;
use quizkit_core::grading::DEFAULT_PASS_THRESHOLD;
use quizkit_core::traits::{ContentSource, DraftStore, GradeStore};

use crate::file::{FileContentSource, FileDraftStore};
use crate::http::{HttpContentSource, HttpGradeStore};
use crate::memory::MemoryGradeStore;

/// Where quiz documents come from.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentConfig {
    File {
        #[serde(default = "default_quiz_dir")]
        dir: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

/// Where manual grades come from.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GradesConfig {
    Memory,
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

fn mask(key: &Option<String>) -> Option<&'static str> {
    key.as_ref().map(|_| "***")
}

impl std::fmt::Debug for ContentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentConfig::File { dir } => f.debug_struct("File").field("dir", dir).finish(),
            ContentConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &mask(api_key))
                .finish(),
        }
    }
}

impl std::fmt::Debug for GradesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GradesConfig::Memory => f.write_str("Memory"),
            GradesConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &mask(api_key))
                .finish(),
        }
    }
}

fn default_quiz_dir() -> PathBuf {
    PathBuf::from("./quizzes")
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig::File {
            dir: default_quiz_dir(),
        }
    }
}

impl Default for GradesConfig {
    fn default() -> Self {
        GradesConfig::Memory
    }
}

/// Top-level quizkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizkitConfig {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub grades: GradesConfig,
    /// Where in-progress sessions are saved.
    #[serde(default = "default_draft_dir")]
    pub draft_dir: PathBuf,
    /// Share of items that must be correct to pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Fixed shuffle seed (reproducible option order).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Gap separator for questions that do not set their own.
    #[serde(default = "default_separator")]
    pub gap_separator: String,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_draft_dir() -> PathBuf {
    PathBuf::from("./.quizkit/drafts")
}
fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}
fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./quizkit-results")
}

impl Default for QuizkitConfig {
    fn default() -> Self {
        Self {
            content: ContentConfig::default(),
            grades: GradesConfig::default(),
            draft_dir: default_draft_dir(),
            pass_threshold: default_pass_threshold(),
            seed: None,
            gap_separator: default_separator(),
            output_dir: default_output_dir(),
        }
    }
}

impl QuizkitConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            pass_threshold: self.pass_threshold,
            seed: self.seed,
            ..EngineConfig::default()
        }
    }

    /// Build the configured content source.
    pub fn content_source(&self) -> Result<Arc<dyn ContentSource>> {
        Ok(match &self.content {
            ContentConfig::File { dir } => {
                Arc::new(FileContentSource::new(dir).with_separator(&self.gap_separator))
            }
            ContentConfig::Http { base_url, api_key } => Arc::new(
                HttpContentSource::new(base_url, api_key.clone())
                    .context("invalid content configuration")?
                    .with_separator(&self.gap_separator),
            ),
        })
    }

    /// Build the configured manual-grade store.
    pub fn grade_store(&self) -> Result<Arc<dyn GradeStore>> {
        Ok(match &self.grades {
            GradesConfig::Memory => Arc::new(MemoryGradeStore::new()),
            GradesConfig::Http { base_url, api_key } => Arc::new(
                HttpGradeStore::new(base_url, api_key.clone())
                    .context("invalid grades configuration")?,
            ),
        })
    }

    pub fn draft_store(&self) -> Arc<dyn DraftStore> {
        Arc::new(FileDraftStore::new(&self.draft_dir))
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        // Substituted values are not scanned again.
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_opt(value: &Option<String>) -> Option<String> {
    value.as_deref().map(resolve_env_vars)
}

/// Resolve env vars in every string field that may reference them.
fn resolve_config(config: &mut QuizkitConfig) {
    config.content = match &config.content {
        ContentConfig::File { dir } => ContentConfig::File {
            dir: PathBuf::from(resolve_env_vars(&dir.to_string_lossy())),
        },
        ContentConfig::Http { base_url, api_key } => ContentConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_key: resolve_opt(api_key),
        },
    };
    config.grades = match &config.grades {
        GradesConfig::Memory => GradesConfig::Memory,
        GradesConfig::Http { base_url, api_key } => GradesConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_key: resolve_opt(api_key),
        },
    };
    config.draft_dir = PathBuf::from(resolve_env_vars(&config.draft_dir.to_string_lossy()));
    config.output_dir = PathBuf::from(resolve_env_vars(&config.output_dir.to_string_lossy()));
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizkit.toml` in the current directory
/// 2. `~/.config/quizkit/config.toml`
///
/// Environment variable overrides: `QUIZKIT_API_KEY`, `QUIZKIT_SEED`.
pub fn load_config() -> Result<QuizkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizkitConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizkit.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizkitConfig::default(),
    };

    // Apply env var overrides
    if let Ok(key) = std::env::var("QUIZKIT_API_KEY") {
        if let ContentConfig::Http { api_key, .. } = &mut config.content {
            *api_key = Some(key.clone());
        }
        if let GradesConfig::Http { api_key, .. } = &mut config.grades {
            *api_key = Some(key);
        }
    }

    if let Ok(seed) = std::env::var("QUIZKIT_SEED") {
        let seed = seed
            .trim()
            .parse::<u64>()
            .with_context(|| format!("QUIZKIT_SEED must be an unsigned integer, got {seed:?}"))?;
        config.seed = Some(seed);
    }

    Ok(config)
}

/// Parse config text and resolve `${VAR}` references.
pub fn parse_config(content: &str) -> Result<QuizkitConfig> {
    let mut config: QuizkitConfig = toml::from_str(content)?;
    if !(0.0..=1.0).contains(&config.pass_threshold) {
        anyhow::bail!(
            "pass_threshold must be between 0 and 1, got {}",
            config.pass_threshold
        );
    }
    resolve_config(&mut config);
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizkit"))
}
