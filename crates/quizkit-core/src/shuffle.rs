//! Seeded display order for options and gap candidates.
//!
//! One permutation per choice question and one per text-completion gap,
//! all drawn from a single RNG seeded when the session loads its content.
//! The order never changes afterwards, and grading never looks at it.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::gaps::Gap;
use crate::model::{Question, QuestionKind, QuizOption};

/// Draw a seed for a session that was not given one.
pub fn fresh_seed() -> u64 {
    rand::random()
}

/// Display permutations for one session. Each permutation maps display
/// position to authored index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOrder {
    seed: u64,
    options: HashMap<String, Vec<usize>>,
    candidates: HashMap<(String, usize), Vec<usize>>,
}

impl DisplayOrder {
    pub fn new(questions: &[Question], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut options = HashMap::new();
        let mut candidates = HashMap::new();

        for question in questions {
            match &question.kind {
                QuestionKind::SingleChoice { options: opts }
                | QuestionKind::MultipleChoice { options: opts }
                | QuestionKind::MediaQuestion { options: opts } => {
                    let mut order: Vec<usize> = (0..opts.len()).collect();
                    order.shuffle(&mut rng);
                    options.insert(question.id.clone(), order);
                }
                QuestionKind::TextCompletion { .. } => {
                    if let Some(parsed) = question.parsed_gaps() {
                        for gap in parsed.gaps() {
                            let mut order: Vec<usize> = (0..gap.candidates.len()).collect();
                            order.shuffle(&mut rng);
                            candidates.insert((question.id.clone(), gap.index), order);
                        }
                    }
                }
                QuestionKind::FillBlank { .. }
                | QuestionKind::ShortAnswer { .. }
                | QuestionKind::LongText => {}
            }
        }

        Self {
            seed,
            options,
            candidates,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Options of `question` in display order, paired with their authored index.
    pub fn options<'q>(&self, question: &'q Question) -> Vec<(usize, &'q QuizOption)> {
        let authored = question.options();
        match self.options.get(&question.id) {
            Some(order) if order.len() == authored.len() => {
                order.iter().map(|&i| (i, &authored[i])).collect()
            }
            _ => authored.iter().enumerate().collect(),
        }
    }

    /// Authored index of the option shown at `display_position`.
    pub fn option_at(&self, question: &Question, display_position: usize) -> Option<usize> {
        self.options(question)
            .get(display_position)
            .map(|(index, _)| *index)
    }

    /// Candidates of one gap in display order.
    pub fn candidates<'g>(&self, question_id: &str, gap: &'g Gap) -> Vec<&'g str> {
        match self.candidates.get(&(question_id.to_string(), gap.index)) {
            Some(order) if order.len() == gap.candidates.len() => order
                .iter()
                .map(|&i| gap.candidates[i].as_str())
                .collect(),
            _ => gap.candidates.iter().map(String::as_str).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::letter_for;

    fn choice(id: &str, n: usize) -> Question {
        Question {
            id: id.into(),
            prompt: "Pick".into(),
            content: None,
            kind: QuestionKind::SingleChoice {
                options: (0..n)
                    .map(|i| QuizOption {
                        id: format!("{id}-{i}"),
                        letter: letter_for(i),
                        text: format!("opt {i}"),
                        correct: i == 0,
                    })
                    .collect(),
            },
            points: 1.0,
            explanation: None,
            media: None,
        }
    }

    fn completion(id: &str) -> Question {
        Question {
            id: id.into(),
            prompt: "[[alpha,beta,gamma,delta,epsilon]]".into(),
            content: None,
            kind: QuestionKind::TextCompletion {
                separator: ",".into(),
            },
            points: 1.0,
            explanation: None,
            media: None,
        }
    }

    #[test]
    fn same_seed_same_order() {
        let questions = vec![choice("a", 6), completion("b"), choice("c", 4)];
        let first = DisplayOrder::new(&questions, 42);
        let second = DisplayOrder::new(&questions, 42);
        assert_eq!(first, second);
        assert_eq!(first.seed(), 42);
    }

    #[test]
    fn options_are_a_permutation() {
        let q = choice("a", 8);
        let order = DisplayOrder::new(std::slice::from_ref(&q), 7);
        let mut indices: Vec<usize> = order.options(&q).iter().map(|(i, _)| *i).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
        for (pos, (index, option)) in order.options(&q).iter().enumerate() {
            assert_eq!(order.option_at(&q, pos), Some(*index));
            assert_eq!(option.text, format!("opt {index}"));
        }
        assert_eq!(order.option_at(&q, 8), None);
    }

    #[test]
    fn candidates_are_a_permutation() {
        let q = completion("b");
        let order = DisplayOrder::new(std::slice::from_ref(&q), 3);
        let parsed = q.parsed_gaps().unwrap();
        let gap = parsed.gaps().next().unwrap();
        let mut shown = order.candidates("b", gap);
        shown.sort_unstable();
        assert_eq!(shown, vec!["alpha", "beta", "delta", "epsilon", "gamma"]);
        // The canonical answer is still candidate 0 of the parsed gap.
        assert_eq!(gap.canonical(), Some("alpha"));
    }

    #[test]
    fn unknown_question_falls_back_to_authored_order() {
        let order = DisplayOrder::new(&[], 1);
        let q = choice("z", 3);
        let indices: Vec<usize> = order.options(&q).iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
