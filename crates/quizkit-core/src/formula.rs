//! Math span detection and rendering.
//!
//! `$$...$$` block spans are found first over the whole text, then `$...$`
//! inline spans in whatever text is left, left to right and without
//! overlap. Every expression goes through the [`Typesetter`]; a failure is
//! replaced by a `math-error` placeholder holding the original source and the
//! rest of the text is still rendered.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::render::escape_html;
use crate::traits::Typesetter;

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("block pattern is valid"))
}

fn inline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([^$]+?)\$").expect("inline pattern is valid"))
}

/// How an expression is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    Inline,
    Display,
}

/// A piece of text after span detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaSpan {
    Text(String),
    Math { source: String, mode: MathMode },
}

/// Split `text` into plain runs and math spans.
pub fn split_formulas(text: &str) -> Vec<FormulaSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    for caps in block_pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        split_inline(&text[cursor..whole.start()], &mut spans);
        spans.push(FormulaSpan::Math {
            source: caps.get(1).map_or("", |m| m.as_str()).to_string(),
            mode: MathMode::Display,
        });
        cursor = whole.end();
    }
    split_inline(&text[cursor..], &mut spans);

    spans
}

fn split_inline(text: &str, spans: &mut Vec<FormulaSpan>) {
    let mut cursor = 0;
    for caps in inline_pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            spans.push(FormulaSpan::Text(text[cursor..whole.start()].to_string()));
        }
        spans.push(FormulaSpan::Math {
            source: caps.get(1).map_or("", |m| m.as_str()).to_string(),
            mode: MathMode::Inline,
        });
        cursor = whole.end();
    }
    if cursor < text.len() {
        spans.push(FormulaSpan::Text(text[cursor..].to_string()));
    }
}

/// Whether `text` contains anything the spanner would pick up.
pub fn has_formulas(text: &str) -> bool {
    split_formulas(text)
        .iter()
        .any(|s| matches!(s, FormulaSpan::Math { .. }))
}

/// Markup used in place of an expression the typesetter rejected.
pub fn error_placeholder(source: &str, mode: MathMode, error: &str) -> String {
    let tag = match mode {
        MathMode::Inline => "span",
        MathMode::Display => "div",
    };
    format!(
        "<{tag} class=\"math-error\" title=\"{}\">{}</{tag}>",
        escape_html(error),
        escape_html(source)
    )
}

/// Render every math span in `text`; plain runs pass through untouched.
///
/// The output is a pure function of `text` and the typesetter's own output.
pub fn render_formulas(text: &str, typesetter: &dyn Typesetter) -> String {
    render_spans(text, typesetter, false)
}

/// Like [`render_formulas`], but plain runs go through
/// [`Typesetter::escape_text`], so authored text cannot inject markup.
pub fn render_formulas_escaped(text: &str, typesetter: &dyn Typesetter) -> String {
    render_spans(text, typesetter, true)
}

fn render_spans(text: &str, typesetter: &dyn Typesetter, escape: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for span in split_formulas(text) {
        match span {
            FormulaSpan::Text(t) if escape => out.push_str(&typesetter.escape_text(&t)),
            FormulaSpan::Text(t) => out.push_str(&t),
            FormulaSpan::Math { source, mode } => match typesetter.render(&source, mode) {
                Ok(markup) => out.push_str(&markup),
                Err(e) => {
                    tracing::warn!("failed to typeset `{source}`: {e:#}");
                    out.push_str(&error_placeholder(&source, mode, &format!("{e:#}")));
                }
            },
        }
    }
    out
}

/// A formula the typesetter refuses, found during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaIssue {
    pub source: String,
    pub mode: MathMode,
    pub error: String,
}

/// Run the typesetter's validator over every span in `text`.
pub fn validate_formulas(text: &str, typesetter: &dyn Typesetter) -> Vec<FormulaIssue> {
    split_formulas(text)
        .into_iter()
        .filter_map(|span| match span {
            FormulaSpan::Math { source, mode } => {
                let check = typesetter.validate(&source);
                if check.valid {
                    None
                } else {
                    Some(FormulaIssue {
                        source,
                        mode,
                        error: check.error.unwrap_or_else(|| "invalid expression".into()),
                    })
                }
            }
            FormulaSpan::Text(_) => None,
        })
        .collect()
}

/// A formula render scheduled to run after a delay.
///
/// Dropping it (or calling [`DeferredRender::cancel`]) aborts the pending
/// task, so a torn-down view never receives late output.
pub struct DeferredRender {
    handle: JoinHandle<()>,
    output: Option<oneshot::Receiver<String>>,
}

impl DeferredRender {
    /// Schedule `text` for rendering on the current tokio runtime.
    pub fn schedule(text: String, typesetter: Arc<dyn Typesetter>, delay: Duration) -> Self {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let markup = render_formulas(&text, typesetter.as_ref());
            let _ = tx.send(markup);
        });
        Self {
            handle,
            output: Some(rx),
        }
    }

    /// Wait for the rendered markup. `None` if the render was aborted.
    pub async fn output(mut self) -> Option<String> {
        let rx = self.output.take()?;
        rx.await.ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for DeferredRender {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
