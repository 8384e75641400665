//! Question sourcing.
//!
//! Question content itself comes from outside the simulation; this module
//! defines the trait a session draws questions through, plus an in-memory
//! pool over caller-supplied questions. A source must always produce a
//! question: a session can never stall waiting for content, so filters that
//! match nothing fall back to the whole pool.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use quizlab_core::error::ValidationError;
use quizlab_core::model::{Difficulty, Question, Topic};

/// Supplies questions to a running session.
pub trait QuestionSource {
    /// Draw a question, preferring the given difficulty and topic.
    ///
    /// Implementations must fall back to the unfiltered pool when nothing
    /// matches, never fail.
    fn next_question(&mut self, difficulty: Option<Difficulty>, topic: Option<Topic>) -> Question;
}

/// Aggregate statistics about a question pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_questions: usize,
    /// Question count per difficulty label.
    pub by_difficulty: BTreeMap<String, usize>,
    /// Question count per topic.
    pub by_topic: BTreeMap<String, usize>,
    /// Mean expected time per difficulty label.
    pub avg_expected_time: BTreeMap<String, f64>,
}

/// In-memory question pool with uniform random selection.
///
/// The pool is read-only after construction; only the selection RNG mutates.
#[derive(Debug, Clone)]
pub struct QuestionPool {
    questions: Vec<Question>,
    rng: ChaCha8Rng,
}

impl QuestionPool {
    /// Build a pool from caller-supplied questions.
    ///
    /// Every question is validated up front, and an empty pool is rejected:
    /// with no questions at all the always-return contract of
    /// [`QuestionSource`] cannot be honored.
    pub fn new(questions: Vec<Question>, seed: u64) -> Result<Self, ValidationError> {
        if questions.is_empty() {
            return Err(ValidationError::InvalidConfig(
                "question pool must not be empty".into(),
            ));
        }
        for question in &questions {
            question.validate()?;
        }
        Ok(Self {
            questions,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// All questions of one difficulty.
    pub fn by_difficulty(&self, difficulty: Difficulty) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .collect()
    }

    /// Summary statistics over the pool.
    pub fn stats(&self) -> PoolStats {
        let mut by_difficulty = BTreeMap::new();
        let mut by_topic = BTreeMap::new();
        let mut time_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for q in &self.questions {
            *by_difficulty.entry(q.difficulty.to_string()).or_insert(0) += 1;
            *by_topic.entry(q.topic.to_string()).or_insert(0) += 1;
            let entry = time_sums.entry(q.difficulty.to_string()).or_insert((0.0, 0));
            entry.0 += q.expected_time_secs;
            entry.1 += 1;
        }

        let avg_expected_time = time_sums
            .into_iter()
            .map(|(label, (sum, count))| (label, sum / count as f64))
            .collect();

        PoolStats {
            total_questions: self.questions.len(),
            by_difficulty,
            by_topic,
            avg_expected_time,
        }
    }
}

impl QuestionSource for QuestionPool {
    fn next_question(&mut self, difficulty: Option<Difficulty>, topic: Option<Topic>) -> Question {
        let matching: Vec<usize> = self
            .questions
            .iter()
            .enumerate()
            .filter(|(_, q)| difficulty.map_or(true, |d| q.difficulty == d))
            .filter(|(_, q)| topic.map_or(true, |t| q.topic == t))
            .map(|(i, _)| i)
            .collect();

        let index = if matching.is_empty() {
            // No exact match; fall back to the whole pool.
            self.rng.gen_range(0..self.questions.len())
        } else {
            matching[self.rng.gen_range(0..matching.len())]
        };
        self.questions[index].clone()
    }
}
