//! Stochastic learner model.
//!
//! [`SimulatedLearner`] models one learner answering questions: correctness
//! is a Bernoulli draw whose probability depends on current ability and
//! question difficulty, response time scales the question's expected time,
//! and every answered question nudges ability upward along an asymptotic
//! learning curve.
//!
//! Each learner owns its own [`ChaCha8Rng`], seeded deterministically from a
//! master seed plus the learner's index. There is no shared random state, so
//! a single learner's run can be replayed in isolation.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{Difficulty, PerformanceRecord, Question};

/// Success probability is clamped to this floor (nobody fails everything).
const SUCCESS_FLOOR: f64 = 0.1;
/// Success probability is clamped to this ceiling (nobody is infallible).
const SUCCESS_CEIL: f64 = 0.95;
/// Ability asymptote. Learning approaches but never reaches this cap.
const ABILITY_CAP: f64 = 0.98;
/// Minimum simulated response time in seconds.
const MIN_RESPONSE_TIME_SECS: f64 = 5.0;

/// Additive success-probability modifier per difficulty.
fn difficulty_modifier(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.3,
        Difficulty::Medium => 0.0,
        Difficulty::Hard => -0.3,
    }
}

/// Learning weight per difficulty: harder material teaches more per question.
fn difficulty_weight(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.5,
        Difficulty::Medium => 1.0,
        Difficulty::Hard => 1.5,
    }
}

/// Fixed characteristics of a simulated learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Base probability of answering a medium question correctly (0..1).
    pub base_ability: f64,
    /// Per-question ability improvement rate.
    pub learning_rate: f64,
    /// Response speed multiplier (1.0 = average, lower = faster).
    pub speed_factor: f64,
    /// Consistency of performance (0..1, higher = less random variation).
    pub consistency: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            base_ability: 0.7,
            learning_rate: 0.05,
            speed_factor: 1.0,
            consistency: 0.8,
        }
    }
}

impl LearnerConfig {
    /// Check configuration bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.base_ability) {
            return Err(ValidationError::InvalidConfig(format!(
                "base_ability must be in [0, 1], got {}",
                self.base_ability
            )));
        }
        if !(0.0..=1.0).contains(&self.consistency) {
            return Err(ValidationError::InvalidConfig(format!(
                "consistency must be in [0, 1], got {}",
                self.consistency
            )));
        }
        if self.learning_rate < 0.0 {
            return Err(ValidationError::InvalidConfig(format!(
                "learning_rate must be non-negative, got {}",
                self.learning_rate
            )));
        }
        if self.speed_factor <= 0.0 {
            return Err(ValidationError::InvalidConfig(format!(
                "speed_factor must be positive, got {}",
                self.speed_factor
            )));
        }
        Ok(())
    }
}

/// Serializable snapshot of a learner's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub learner_id: String,
    pub base_ability: f64,
    pub current_ability: f64,
    pub learning_rate: f64,
    pub speed_factor: f64,
    pub consistency: f64,
    pub questions_answered: u32,
}

/// A simulated learner with specific ability and learning characteristics.
#[derive(Debug, Clone)]
pub struct SimulatedLearner {
    id: String,
    config: LearnerConfig,
    current_ability: f64,
    questions_answered: u32,
    rng: ChaCha8Rng,
}

impl SimulatedLearner {
    /// Create a learner with its own deterministic random stream.
    pub fn new(
        id: impl Into<String>,
        config: LearnerConfig,
        seed: u64,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            id: id.into(),
            current_ability: config.base_ability,
            config,
            questions_answered: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn current_ability(&self) -> f64 {
        self.current_ability
    }

    pub fn questions_answered(&self) -> u32 {
        self.questions_answered
    }

    /// Probability of answering a question of `difficulty` correctly,
    /// before the per-draw consistency perturbation.
    pub fn success_probability(&self, difficulty: Difficulty) -> f64 {
        (self.current_ability + difficulty_modifier(difficulty)).clamp(SUCCESS_FLOOR, SUCCESS_CEIL)
    }

    /// Simulate answering one question.
    ///
    /// Validates the question first: a malformed question is a fatal input
    /// error, not something to paper over.
    pub fn answer(&mut self, question: &Question) -> Result<PerformanceRecord, ValidationError> {
        question.validate()?;

        let mut probability = self.success_probability(question.difficulty);
        if self.config.consistency < 1.0 {
            let sigma = (1.0 - self.config.consistency) * 0.2;
            probability =
                (probability + normal(&mut self.rng, 0.0, sigma)).clamp(SUCCESS_FLOOR, SUCCESS_CEIL);
        }

        let correct = self.rng.gen::<f64>() < probability;

        let mut response_time = question.expected_time_secs
            * self.config.speed_factor
            * normal(&mut self.rng, 1.0, 0.2);
        if !correct {
            // Struggling takes longer.
            response_time *= self.rng.gen_range(1.1..1.4);
        }
        let response_time = response_time.max(MIN_RESPONSE_TIME_SECS);

        self.questions_answered += 1;
        self.update_ability(correct, question.difficulty);

        Ok(PerformanceRecord {
            question_id: question.id,
            topic: question.topic,
            difficulty: question.difficulty,
            correct,
            time_taken_secs: response_time,
            expected_time_secs: question.expected_time_secs,
        })
    }

    /// Apply the learning effect for one answered question.
    ///
    /// Learning happens regardless of correctness, but an incorrect answer
    /// teaches only 30% as much. Diminishing returns keep ability below the
    /// cap no matter how many questions are answered.
    fn update_ability(&mut self, correct: bool, difficulty: Difficulty) {
        let outcome_factor = if correct { 1.0 } else { 0.3 };
        let improvement = self.config.learning_rate * difficulty_weight(difficulty) * outcome_factor;
        self.current_ability =
            (self.current_ability + improvement * (1.0 - self.current_ability)).min(ABILITY_CAP);
    }

    /// Restore current ability to base ability and zero the counter.
    ///
    /// The random stream is deliberately not rewound: a reset separates
    /// experiment phases, it does not replay them.
    pub fn reset(&mut self) {
        self.current_ability = self.config.base_ability;
        self.questions_answered = 0;
    }

    /// Snapshot of the learner's current state.
    pub fn profile(&self) -> LearnerProfile {
        LearnerProfile {
            learner_id: self.id.clone(),
            base_ability: self.config.base_ability,
            current_ability: self.current_ability,
            learning_rate: self.config.learning_rate,
            speed_factor: self.config.speed_factor,
            consistency: self.config.consistency,
            questions_answered: self.questions_answered,
        }
    }
}

/// Sample from N(mean, sd) via the Box–Muller transform.
fn normal<R: Rng>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sd * z
}

/// Summary statistics over a generated population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationStats {
    pub total_learners: usize,
    pub avg_base_ability: f64,
    pub avg_learning_rate: f64,
    pub avg_speed_factor: f64,
    /// Learners with base ability below 0.5.
    pub struggling: usize,
    /// Learners with base ability in [0.5, 0.75).
    pub average: usize,
    /// Learners with base ability of 0.75 or higher.
    pub advanced: usize,
}

/// A diverse population of simulated learners.
///
/// Generation is deterministic in the master seed: parameters are drawn from
/// one seeded stream, and each learner receives its own stream seeded from
/// the master seed plus its index.
#[derive(Debug, Clone)]
pub struct LearnerPopulation {
    learners: Vec<SimulatedLearner>,
}

impl LearnerPopulation {
    /// Generate `num_learners` learners spread across ability tiers:
    /// the first third struggling, the middle third average, the rest
    /// advanced.
    pub fn generate(num_learners: usize, master_seed: u64) -> Self {
        let mut param_rng = ChaCha8Rng::seed_from_u64(master_seed);
        let mut learners = Vec::with_capacity(num_learners);

        for i in 0..num_learners {
            let (base_ability, learning_rate) = if i < num_learners / 3 {
                (
                    param_rng.gen_range(0.3..0.5),
                    param_rng.gen_range(0.03..0.07),
                )
            } else if i < 2 * num_learners / 3 {
                (
                    param_rng.gen_range(0.5..0.75),
                    param_rng.gen_range(0.04..0.06),
                )
            } else {
                (
                    param_rng.gen_range(0.75..0.9),
                    param_rng.gen_range(0.02..0.05),
                )
            };

            let config = LearnerConfig {
                base_ability,
                learning_rate,
                speed_factor: param_rng.gen_range(0.7..1.5),
                consistency: param_rng.gen_range(0.6..0.95),
            };
            // Generated parameters are within bounds by construction.
            learners.push(SimulatedLearner {
                id: format!("learner_{:03}", i + 1),
                current_ability: config.base_ability,
                config,
                questions_answered: 0,
                rng: ChaCha8Rng::seed_from_u64(master_seed.wrapping_add(i as u64 + 1)),
            });
        }

        Self { learners }
    }

    /// Build a population from pre-constructed learners.
    pub fn from_learners(learners: Vec<SimulatedLearner>) -> Self {
        Self { learners }
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    /// Look up a learner by id.
    pub fn get(&self, learner_id: &str) -> Option<&SimulatedLearner> {
        self.learners.iter().find(|l| l.id() == learner_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimulatedLearner> {
        self.learners.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SimulatedLearner> {
        self.learners.iter_mut()
    }

    /// Reset every learner to its base state.
    pub fn reset_all(&mut self) {
        for learner in &mut self.learners {
            learner.reset();
        }
    }

    /// Aggregate statistics over the population.
    pub fn stats(&self) -> PopulationStats {
        let n = self.learners.len().max(1) as f64;
        let profiles: Vec<LearnerProfile> = self.learners.iter().map(|l| l.profile()).collect();
        PopulationStats {
            total_learners: self.learners.len(),
            avg_base_ability: profiles.iter().map(|p| p.base_ability).sum::<f64>() / n,
            avg_learning_rate: profiles.iter().map(|p| p.learning_rate).sum::<f64>() / n,
            avg_speed_factor: profiles.iter().map(|p| p.speed_factor).sum::<f64>() / n,
            struggling: profiles.iter().filter(|p| p.base_ability < 0.5).count(),
            average: profiles
                .iter()
                .filter(|p| (0.5..0.75).contains(&p.base_ability))
                .count(),
            advanced: profiles.iter().filter(|p| p.base_ability >= 0.75).count(),
        }
    }
}
