//! Core data model types for quizlab.
//!
//! These are the fundamental types the whole simulation builds on: question
//! records consumed from the question bank, and the per-answer performance
//! records produced by the learner model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Question difficulty, ordered `Easy < Medium < Hard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// All levels in ascending order.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Numeric difficulty score: easy=1, medium=2, hard=3.
    pub fn score(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    /// One level harder, saturating at `Hard`.
    pub fn step_up(self) -> Difficulty {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Hard => Difficulty::Hard,
        }
    }

    /// One level easier, saturating at `Easy`.
    pub fn step_down(self) -> Difficulty {
        match self {
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Easy => Difficulty::Easy,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ValidationError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// Question topic, from a fixed small set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Math,
    Science,
    History,
    Literature,
    Geography,
}

impl Topic {
    /// All topics, in a stable order.
    pub const ALL: [Topic; 5] = [
        Topic::Math,
        Topic::Science,
        Topic::History,
        Topic::Literature,
        Topic::Geography,
    ];
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Math => write!(f, "Math"),
            Topic::Science => write!(f, "Science"),
            Topic::History => write!(f, "History"),
            Topic::Literature => write!(f, "Literature"),
            Topic::Geography => write!(f, "Geography"),
        }
    }
}

impl FromStr for Topic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "math" => Ok(Topic::Math),
            "science" => Ok(Topic::Science),
            "history" => Ok(Topic::History),
            "literature" => Ok(Topic::Literature),
            "geography" => Ok(Topic::Geography),
            other => Err(ValidationError::UnknownTopic(other.to_string())),
        }
    }
}

/// A single quiz question, immutable once generated by the question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique question identifier.
    pub id: u32,
    /// Topic this question belongs to.
    pub topic: Topic,
    /// Difficulty level.
    pub difficulty: Difficulty,
    /// Question text (synthetic in simulations).
    #[serde(default)]
    pub text: String,
    /// Correct answer key (e.g. "A".."D").
    #[serde(default)]
    pub correct_answer: String,
    /// Expected time to answer, in seconds. Must be positive.
    pub expected_time_secs: f64,
}

impl Question {
    /// Check structural invariants.
    ///
    /// A malformed question must fail fast here rather than being silently
    /// defaulted, since a defaulted expected time would corrupt every
    /// downstream time-ratio statistic.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.expected_time_secs <= 0.0 || !self.expected_time_secs.is_finite() {
            return Err(ValidationError::NonPositiveExpectedTime(
                self.expected_time_secs,
            ));
        }
        Ok(())
    }
}

/// Outcome of one answered question.
///
/// Created by [`crate::learner::SimulatedLearner::answer`], consumed by the
/// difficulty policy and the performance tracker. Never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Identifier of the answered question.
    pub question_id: u32,
    /// Topic of the answered question.
    pub topic: Topic,
    /// Difficulty the question was served at.
    pub difficulty: Difficulty,
    /// Whether the learner answered correctly.
    pub correct: bool,
    /// Simulated response time in seconds.
    pub time_taken_secs: f64,
    /// Expected time copied from the question.
    pub expected_time_secs: f64,
}
