//! Answer payloads and correctness rules.
//!
//! Every function here is total: a missing answer, a payload of the wrong
//! shape, or an out-of-range index yields a verdict, never a panic.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Question, QuestionKind};

/// A learner's response to one question. Indices always refer to the
/// authored option order, never the shuffled display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Choice(usize),
    Choices(BTreeSet<usize>),
    Gaps(Vec<String>),
    Text(String),
}

impl Answer {
    /// Whether the payload carries no input at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Choice(_) => false,
            Answer::Choices(set) => set.is_empty(),
            Answer::Gaps(values) => values.iter().all(|v| v.trim().is_empty()),
            Answer::Text(text) => text.trim().is_empty(),
        }
    }
}

/// Outcome of checking one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unanswered,
    /// No automatic verdict; waits for a manual grader.
    Ungraded,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => write!(f, "correct"),
            Verdict::Incorrect => write!(f, "incorrect"),
            Verdict::Unanswered => write!(f, "unanswered"),
            Verdict::Ungraded => write!(f, "ungraded"),
        }
    }
}

/// Comparison form of free text: trimmed and lowercased.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Check `answer` against `question`'s key.
pub fn evaluate(question: &Question, answer: Option<&Answer>) -> Verdict {
    if question.needs_manual_grading() {
        return Verdict::Ungraded;
    }
    let Some(answer) = answer.filter(|a| !a.is_empty()) else {
        return Verdict::Unanswered;
    };

    let correct = match &question.kind {
        QuestionKind::SingleChoice { .. } | QuestionKind::MediaQuestion { .. } => match answer {
            Answer::Choice(i) => Some(*i) == question.correct_index(),
            _ => false,
        },
        QuestionKind::MultipleChoice { .. } => match answer {
            Answer::Choices(selected) => {
                let key = question.correct_indices();
                !key.is_empty() && *selected == key
            }
            _ => false,
        },
        QuestionKind::FillBlank { .. } | QuestionKind::TextCompletion { .. } => {
            let results = gap_results(question, Some(answer));
            !results.is_empty() && results.iter().all(|ok| *ok)
        }
        QuestionKind::ShortAnswer { accepted } => match answer {
            Answer::Text(text) => accepts(accepted, text),
            _ => false,
        },
        QuestionKind::LongText => false,
    };

    if correct {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    }
}

/// Shorthand for `evaluate(..) == Verdict::Correct`.
pub fn is_correct(question: &Question, answer: Option<&Answer>) -> bool {
    evaluate(question, answer) == Verdict::Correct
}

/// Whether `value` matches one of the `|`-delimited accepted answers.
pub fn accepts(accepted: &str, value: &str) -> bool {
    let value = normalize(value);
    !value.is_empty()
        && accepted
            .split('|')
            .map(normalize)
            .any(|candidate| !candidate.is_empty() && candidate == value)
}

/// Per-gap correctness, one entry per gap in document order.
///
/// Empty for questions without gaps. A gap with no candidates is never correct.
pub fn gap_results(question: &Question, answer: Option<&Answer>) -> Vec<bool> {
    let Some(parsed) = question.parsed_gaps() else {
        return Vec::new();
    };
    let values: &[String] = match answer {
        Some(Answer::Gaps(values)) => values,
        _ => &[],
    };
    parsed
        .gaps()
        .map(|gap| match (gap.canonical(), values.get(gap.index)) {
            (Some(canonical), Some(value)) => {
                let value = normalize(value);
                !value.is_empty() && value == normalize(canonical)
            }
            _ => false,
        })
        .collect()
}

/// Names of the required fields still empty; empty when the answer is complete.
pub fn missing_fields(question: &Question, answer: Option<&Answer>) -> Vec<String> {
    let selection = || vec!["selection".to_string()];
    let text = || vec!["text".to_string()];

    match &question.kind {
        QuestionKind::SingleChoice { .. } => match answer {
            Some(Answer::Choice(_)) => Vec::new(),
            _ => selection(),
        },
        QuestionKind::MultipleChoice { .. } => match answer {
            Some(Answer::Choices(set)) if !set.is_empty() => Vec::new(),
            _ => selection(),
        },
        QuestionKind::FillBlank { .. } | QuestionKind::TextCompletion { .. } => {
            let values: &[String] = match answer {
                Some(Answer::Gaps(values)) => values,
                _ => &[],
            };
            question
                .parsed_gaps()
                .map(|parsed| {
                    parsed
                        .gaps()
                        .filter(|gap| gap.is_answerable())
                        .filter(|gap| {
                            values
                                .get(gap.index)
                                .map_or(true, |v| v.trim().is_empty())
                        })
                        .map(|gap| format!("gap {}", gap.index + 1))
                        .collect()
                })
                .unwrap_or_default()
        }
        QuestionKind::ShortAnswer { .. } | QuestionKind::LongText => match answer {
            Some(Answer::Text(t)) if !t.trim().is_empty() => Vec::new(),
            _ => text(),
        },
        QuestionKind::MediaQuestion { options } => match answer {
            Some(Answer::Choice(_)) if !options.is_empty() => Vec::new(),
            Some(Answer::Text(t)) if options.is_empty() && !t.trim().is_empty() => Vec::new(),
            _ if options.is_empty() => text(),
            _ => selection(),
        },
    }
}

/// Every required field of the question is filled in.
pub fn is_complete(question: &Question, answer: Option<&Answer>) -> bool {
    missing_fields(question, answer).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{letter_for, QuizOption};

    fn options(correct: &[usize], n: usize) -> Vec<QuizOption> {
        (0..n)
            .map(|i| QuizOption {
                id: format!("o{i}"),
                letter: letter_for(i),
                text: format!("option {i}"),
                correct: correct.contains(&i),
            })
            .collect()
    }

    fn question(kind: QuestionKind, prompt: &str) -> Question {
        Question {
            id: "q".into(),
            prompt: prompt.into(),
            content: None,
            kind,
            points: 1.0,
            explanation: None,
            media: None,
        }
    }

    #[test]
    fn single_choice_matches_correct_index() {
        let q = question(
            QuestionKind::SingleChoice {
                options: options(&[2], 4),
            },
            "Pick",
        );
        for i in 0..6 {
            assert_eq!(is_correct(&q, Some(&Answer::Choice(i))), i == 2);
        }
        assert_eq!(evaluate(&q, None), Verdict::Unanswered);
        assert_eq!(
            evaluate(&q, Some(&Answer::Text("2".into()))),
            Verdict::Incorrect
        );
    }

    #[test]
    fn multiple_choice_is_set_equality() {
        let q = question(
            QuestionKind::MultipleChoice {
                options: options(&[0, 3], 4),
            },
            "Pick all",
        );
        let forward: BTreeSet<usize> = [0, 3].into_iter().collect();
        let backward: BTreeSet<usize> = [3, 0].into_iter().collect();
        let partial: BTreeSet<usize> = [3].into_iter().collect();
        let extra: BTreeSet<usize> = [0, 1, 3].into_iter().collect();
        assert!(is_correct(&q, Some(&Answer::Choices(forward))));
        assert!(is_correct(&q, Some(&Answer::Choices(backward))));
        assert!(!is_correct(&q, Some(&Answer::Choices(partial))));
        assert!(!is_correct(&q, Some(&Answer::Choices(extra))));
        assert_eq!(
            evaluate(&q, Some(&Answer::Choices(BTreeSet::new()))),
            Verdict::Unanswered
        );
    }

    #[test]
    fn gaps_compare_trimmed_and_case_insensitive() {
        let q = question(
            QuestionKind::FillBlank {
                separator: ",".into(),
            },
            "The sky is [[Blue,green]] and grass is [[green,red]]",
        );
        let answer = Answer::Gaps(vec!["  blue ".into(), "GREEN".into()]);
        assert!(is_correct(&q, Some(&answer)));
        assert_eq!(gap_results(&q, Some(&answer)), vec![true, true]);

        let half = Answer::Gaps(vec!["blue".into(), "red".into()]);
        assert_eq!(gap_results(&q, Some(&half)), vec![true, false]);
        assert_eq!(evaluate(&q, Some(&half)), Verdict::Incorrect);

        let short = Answer::Gaps(vec!["blue".into()]);
        assert_eq!(gap_results(&q, Some(&short)), vec![true, false]);
        assert_eq!(gap_results(&q, None), vec![false, false]);
    }

    #[test]
    fn empty_gap_is_never_correct() {
        let q = question(
            QuestionKind::TextCompletion {
                separator: ",".into(),
            },
            "a [[x]] b [[ ]]",
        );
        let answer = Answer::Gaps(vec!["x".into(), "anything".into()]);
        assert_eq!(gap_results(&q, Some(&answer)), vec![true, false]);
        // The empty gap cannot be filled, so it is not required.
        assert!(is_complete(&q, Some(&Answer::Gaps(vec!["x".into()]))));
    }

    #[test]
    fn short_answer_accepts_any_listed_value() {
        let q = question(
            QuestionKind::ShortAnswer {
                accepted: "Paris| paris, France |".into(),
            },
            "Capital of France?",
        );
        assert!(is_correct(&q, Some(&Answer::Text(" PARIS ".into()))));
        assert!(is_correct(&q, Some(&Answer::Text("Paris, France".into()))));
        assert!(!is_correct(&q, Some(&Answer::Text("Lyon".into()))));
        assert_eq!(
            evaluate(&q, Some(&Answer::Text("   ".into()))),
            Verdict::Unanswered
        );
    }

    #[test]
    fn manual_questions_are_never_incorrect() {
        let essay = question(QuestionKind::LongText, "Discuss.");
        assert_eq!(
            evaluate(&essay, Some(&Answer::Text("My essay".into()))),
            Verdict::Ungraded
        );
        assert_eq!(evaluate(&essay, None), Verdict::Ungraded);

        let media = question(
            QuestionKind::MediaQuestion {
                options: Vec::new(),
            },
            "Describe the image",
        );
        assert_eq!(
            evaluate(&media, Some(&Answer::Choice(9))),
            Verdict::Ungraded
        );
    }

    #[test]
    fn keyed_media_question_is_graded_like_single_choice() {
        let q = question(
            QuestionKind::MediaQuestion {
                options: options(&[1], 3),
            },
            "Which bird sings here?",
        );
        assert!(is_correct(&q, Some(&Answer::Choice(1))));
        assert!(!is_correct(&q, Some(&Answer::Choice(0))));
    }

    #[test]
    fn completeness() {
        let single = question(
            QuestionKind::SingleChoice {
                options: options(&[0], 2),
            },
            "Pick",
        );
        assert!(!is_complete(&single, None));
        assert!(is_complete(&single, Some(&Answer::Choice(1))));

        let gaps = question(
            QuestionKind::FillBlank {
                separator: ",".into(),
            },
            "[[a]] [[b]] [[c]]",
        );
        let partial = Answer::Gaps(vec!["a".into(), " ".into(), "c".into()]);
        assert_eq!(missing_fields(&gaps, Some(&partial)), vec!["gap 2"]);

        let media = question(
            QuestionKind::MediaQuestion {
                options: Vec::new(),
            },
            "Describe",
        );
        assert_eq!(missing_fields(&media, None), vec!["text"]);
        assert!(is_complete(&media, Some(&Answer::Text("a bird".into()))));
    }
}
