//! Question rendering: gaps first, then math on the literal runs.
//!
//! Gap markers are extracted before any formula is looked at, and formulas
//! are only rendered inside literal segments, never inside a gap's
//! candidates.

use serde::{Deserialize, Serialize};

use crate::formula::render_formulas_escaped;
use crate::gaps::Segment;
use crate::model::{letter_for, MediaRef, Question, QuestionKind, QuestionType};
use crate::shuffle::DisplayOrder;
use crate::traits::Typesetter;

/// Escape a string for safe HTML insertion.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// A rendered piece of the question body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderedSegment {
    Markup(String),
    /// A slot to fill. `choices` is set for text-completion gaps and lists the
    /// candidates in display order.
    Gap {
        index: usize,
        choices: Option<Vec<String>>,
    },
}

/// An option in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedOption {
    /// Letter of the display position.
    pub letter: String,
    /// Index in authored order; what answers refer to.
    pub index: usize,
    pub markup: String,
}

/// A question ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedQuestion {
    pub id: String,
    pub question_type: QuestionType,
    /// Rendered prompt; `None` when the prompt itself carries the gaps and is
    /// rendered as the body instead.
    pub prompt: Option<String>,
    pub body: Vec<RenderedSegment>,
    pub options: Vec<RenderedOption>,
    pub media: Option<MediaRef>,
}

/// Render one question with the session's display order.
///
/// Authored text is passed through [`Typesetter::escape_text`]; only the
/// typesetter's own formula output is inserted verbatim.
pub fn render_question(
    question: &Question,
    order: &DisplayOrder,
    typesetter: &dyn Typesetter,
) -> RenderedQuestion {
    let mut prompt = Some(render_formulas_escaped(&question.prompt, typesetter));
    let mut body = Vec::new();

    match question.parsed_gaps() {
        Some(parsed) => {
            if question.content.is_none() {
                prompt = None;
            }
            let offers_choices = matches!(question.kind, QuestionKind::TextCompletion { .. });
            for segment in &parsed.segments {
                body.push(match segment {
                    Segment::Literal(text) => {
                        RenderedSegment::Markup(render_formulas_escaped(text, typesetter))
                    }
                    Segment::Gap(gap) => RenderedSegment::Gap {
                        index: gap.index,
                        choices: offers_choices.then(|| {
                            order
                                .candidates(&question.id, gap)
                                .into_iter()
                                .map(str::to_string)
                                .collect()
                        }),
                    },
                });
            }
        }
        None => {
            if let Some(content) = &question.content {
                body.push(RenderedSegment::Markup(render_formulas_escaped(
                    content, typesetter,
                )));
            }
        }
    }

    let options = order
        .options(question)
        .into_iter()
        .enumerate()
        .map(|(position, (index, option))| RenderedOption {
            letter: letter_for(position),
            index,
            markup: render_formulas_escaped(&option.text, typesetter),
        })
        .collect();

    RenderedQuestion {
        id: question.id.clone(),
        question_type: question.question_type(),
        prompt,
        body,
        options,
        media: question.media.clone(),
    }
}

impl RenderedQuestion {
    /// HTML fragment with inputs for every gap and a list of options.
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div class=\"question {}\" data-question=\"{}\">\n",
            self.question_type,
            escape_html(&self.id)
        );
        if let Some(prompt) = &self.prompt {
            html.push_str(&format!("<div class=\"prompt\">{prompt}</div>\n"));
        }
        if let Some(media) = &self.media {
            html.push_str(&format!(
                "<div class=\"media {}\" data-src=\"{}\"></div>\n",
                escape_html(&media.kind),
                escape_html(&media.url)
            ));
        }
        if !self.body.is_empty() {
            html.push_str("<div class=\"body\">");
            for segment in &self.body {
                match segment {
                    RenderedSegment::Markup(markup) => html.push_str(markup),
                    RenderedSegment::Gap {
                        index,
                        choices: Some(choices),
                    } => {
                        html.push_str(&format!(
                            "<select class=\"gap\" data-gap=\"{index}\"><option value=\"\"></option>"
                        ));
                        for choice in choices {
                            let value = escape_html(choice);
                            html.push_str(&format!("<option value=\"{value}\">{value}</option>"));
                        }
                        html.push_str("</select>");
                    }
                    RenderedSegment::Gap {
                        index,
                        choices: None,
                    } => {
                        html.push_str(&format!(
                            "<input type=\"text\" class=\"gap\" data-gap=\"{index}\">"
                        ));
                    }
                }
            }
            html.push_str("</div>\n");
        }
        if !self.options.is_empty() {
            html.push_str("<ol class=\"options\">\n");
            for option in &self.options {
                html.push_str(&format!(
                    "<li data-option=\"{}\"><span class=\"letter\">{}</span> {}</li>\n",
                    option.index, option.letter, option.markup
                ));
            }
            html.push_str("</ol>\n");
        }
        html.push_str("</div>\n");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::MathMode;
    use crate::model::QuizOption;
    use crate::traits::FormulaCheck;

    struct Plain;

    impl Typesetter for Plain {
        fn render(&self, expression: &str, _mode: MathMode) -> anyhow::Result<String> {
            Ok(format!("<math>{expression}</math>"))
        }

        fn validate(&self, _expression: &str) -> FormulaCheck {
            FormulaCheck::ok()
        }
    }

    fn gap_question(kind: QuestionKind, prompt: &str) -> Question {
        Question {
            id: "g".into(),
            prompt: prompt.into(),
            content: None,
            kind,
            points: 1.0,
            explanation: None,
            media: None,
        }
    }

    #[test]
    fn escape() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
    }

    #[test]
    fn authored_text_is_escaped() {
        let mut q = gap_question(
            QuestionKind::FillBlank {
                separator: ",".into(),
            },
            "Is 1 < 2 & <b>so</b>?",
        );
        q.content = Some("<script>x</script> $a<b$ is [[true]]".into());
        let order = DisplayOrder::new(std::slice::from_ref(&q), 3);
        let rendered = render_question(&q, &order, &Plain);
        assert_eq!(
            rendered.prompt.as_deref(),
            Some("Is 1 &lt; 2 &amp; &lt;b&gt;so&lt;/b&gt;?")
        );
        assert_eq!(
            rendered.body[0],
            RenderedSegment::Markup(
                "&lt;script&gt;x&lt;/script&gt; <math>a<b</math> is ".into()
            )
        );
        assert!(!rendered.to_html().contains("<script>"));
    }

    #[test]
    fn formulas_are_never_rendered_inside_gaps() {
        let q = gap_question(
            QuestionKind::FillBlank {
                separator: ",".into(),
            },
            "If $x=2$ then $x^2$ = [[4,$5$]]",
        );
        let order = DisplayOrder::new(std::slice::from_ref(&q), 1);
        let rendered = render_question(&q, &order, &Plain);
        assert_eq!(rendered.prompt, None);
        assert_eq!(
            rendered.body,
            vec![
                RenderedSegment::Markup(
                    "If <math>x=2</math> then <math>x^2</math> = ".into()
                ),
                RenderedSegment::Gap {
                    index: 0,
                    choices: None
                },
            ]
        );
        assert!(rendered.to_html().contains("<input type=\"text\" class=\"gap\" data-gap=\"0\">"));
    }

    #[test]
    fn completion_gaps_offer_shuffled_candidates() {
        let mut q = gap_question(
            QuestionKind::TextCompletion {
                separator: ",".into(),
            },
            "Complete the passage",
        );
        q.content = Some("Roses are [[red,blue,green]].".into());
        let order = DisplayOrder::new(std::slice::from_ref(&q), 5);
        let rendered = render_question(&q, &order, &Plain);
        assert_eq!(rendered.prompt.as_deref(), Some("Complete the passage"));
        let RenderedSegment::Gap {
            choices: Some(choices),
            ..
        } = &rendered.body[1]
        else {
            panic!("expected a select gap");
        };
        let mut sorted = choices.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["blue", "green", "red"]);
        // Rendering twice gives the same order.
        assert_eq!(render_question(&q, &order, &Plain), rendered);
    }

    #[test]
    fn options_follow_display_order() {
        let q = Question {
            id: "c".into(),
            prompt: "Which is $\\pi$?".into(),
            content: None,
            kind: QuestionKind::SingleChoice {
                options: ["3.14", "2.71", "1.41"]
                    .iter()
                    .enumerate()
                    .map(|(i, t)| QuizOption {
                        id: format!("c{i}"),
                        letter: letter_for(i),
                        text: t.to_string(),
                        correct: i == 0,
                    })
                    .collect(),
            },
            points: 1.0,
            explanation: None,
            media: None,
        };
        let order = DisplayOrder::new(std::slice::from_ref(&q), 11);
        let rendered = render_question(&q, &order, &Plain);
        assert_eq!(rendered.prompt.as_deref(), Some("Which is <math>\\pi</math>?"));
        let letters: Vec<_> = rendered.options.iter().map(|o| o.letter.as_str()).collect();
        assert_eq!(letters, vec!["A", "B", "C"]);
        for (pos, option) in rendered.options.iter().enumerate() {
            assert_eq!(order.option_at(&q, pos), Some(option.index));
        }
    }
}
