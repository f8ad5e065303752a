//! Built-in typesetter.
//!
//! Produces wrapper markup that carries the escaped TeX source, for a
//! client-side math renderer to pick up. Validation catches the structural
//! mistakes that would make such a renderer fail: unbalanced braces,
//! unmatched `\left`/`\right`, a dangling backslash.

use quizkit_core::formula::MathMode;
use quizkit_core::render::escape_html;
use quizkit_core::traits::{FormulaCheck, Typesetter};

/// Typesetter emitting `<span class="math math-inline">` / `<div class="math math-display">`.
#[derive(Debug, Clone, Default)]
pub struct MarkupTypesetter;

impl MarkupTypesetter {
    pub fn new() -> Self {
        Self
    }
}

impl Typesetter for MarkupTypesetter {
    fn render(&self, expression: &str, mode: MathMode) -> anyhow::Result<String> {
        if let Some(error) = check(expression) {
            anyhow::bail!(error);
        }
        let source = escape_html(expression.trim());
        Ok(match mode {
            MathMode::Inline => {
                format!("<span class=\"math math-inline\" data-tex=\"{source}\">{source}</span>")
            }
            MathMode::Display => {
                format!("<div class=\"math math-display\" data-tex=\"{source}\">{source}</div>")
            }
        })
    }

    fn validate(&self, expression: &str) -> FormulaCheck {
        match check(expression) {
            Some(error) => FormulaCheck::invalid(error),
            None => FormulaCheck::ok(),
        }
    }
}

/// The first structural problem in `expression`, if any.
fn check(expression: &str) -> Option<String> {
    if expression.trim().is_empty() {
        return Some("empty expression".into());
    }

    let mut depth = 0usize;
    let mut chars = expression.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                // Escaped characters (`\{`, `\\`, ...) never count as structure.
                if chars.next().is_none() {
                    return Some("dangling backslash at end of expression".into());
                }
            }
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Some("unexpected `}`".into());
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Some(format!("missing {depth} closing `}}`"));
    }

    let lefts = expression.matches("\\left").count();
    let rights = expression.matches("\\right").count();
    if lefts != rights {
        return Some(format!("{lefts} \\left but {rights} \\right"));
    }

    None
}
