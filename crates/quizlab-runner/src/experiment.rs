//! Population-level experiment orchestration.
//!
//! Runs every learner in a population through two independent phases —
//! adaptive then static — with a learner reset between the phases so that
//! learning accumulated under one policy never leaks into the other's
//! baseline. Sessions within a phase deliberately share the learner's
//! evolving ability; that is the longitudinal learning signal the
//! comparison is after.

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quizlab_core::learner::{LearnerPopulation, LearnerProfile, SimulatedLearner};
use quizlab_core::model::Difficulty;
use quizlab_core::policy::{AdaptiveConfig, AdaptivePolicy, StaticPolicy};
use quizlab_core::ValidationError;

use crate::bank::QuestionPool;
use crate::session::{QuizSession, SessionResult, SessionSpec};
use crate::tracker::{ComparisonStats, PerformanceTracker};

/// Configuration for a population experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Questions per quiz session.
    #[serde(default = "default_questions_per_session")]
    pub questions_per_session: usize,
    /// Sessions per learner per policy.
    #[serde(default = "default_sessions_per_policy")]
    pub sessions_per_policy: usize,
    /// Number of learners in a generated population.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Difficulty every session starts at.
    #[serde(default = "default_difficulty")]
    pub initial_difficulty: Difficulty,
    /// Fixed difficulty for the static baseline policy.
    #[serde(default = "default_difficulty")]
    pub static_difficulty: Difficulty,
    /// Adaptive policy thresholds.
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
    /// Master seed for population generation and question selection.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
}

fn default_questions_per_session() -> usize {
    20
}
fn default_sessions_per_policy() -> usize {
    5
}
fn default_population_size() -> usize {
    15
}
fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}
fn default_master_seed() -> u64 {
    42
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            questions_per_session: default_questions_per_session(),
            sessions_per_policy: default_sessions_per_policy(),
            population_size: default_population_size(),
            initial_difficulty: default_difficulty(),
            static_difficulty: default_difficulty(),
            adaptive: AdaptiveConfig::default(),
            master_seed: default_master_seed(),
        }
    }
}

impl ExperimentConfig {
    /// Check configuration bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.questions_per_session == 0 {
            return Err(ValidationError::InvalidConfig(
                "questions_per_session must be at least 1".into(),
            ));
        }
        if self.sessions_per_policy == 0 {
            return Err(ValidationError::InvalidConfig(
                "sessions_per_policy must be at least 1".into(),
            ));
        }
        if self.population_size == 0 {
            return Err(ValidationError::InvalidConfig(
                "population_size must be at least 1".into(),
            ));
        }
        self.adaptive.validate()
    }
}

/// Both phases of one learner's experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerOutcome {
    pub learner_id: String,
    /// Profile snapshot taken after both phases finished.
    pub profile: LearnerProfile,
    pub adaptive_sessions: Vec<SessionResult>,
    pub static_sessions: Vec<SessionResult>,
}

/// A complete population experiment report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub created_at: DateTime<Utc>,
    /// Configuration the run used.
    pub config: ExperimentConfig,
    /// Per-learner results.
    pub outcomes: Vec<LearnerOutcome>,
    /// Cross-policy comparison over all finalized sessions.
    pub comparison: ComparisonStats,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Runs experiments comparing the adaptive policy against the static
/// baseline across a learner population.
pub struct ExperimentRunner {
    pool: QuestionPool,
    tracker: PerformanceTracker,
    adaptive: AdaptivePolicy,
    static_: StaticPolicy,
    config: ExperimentConfig,
}

impl ExperimentRunner {
    pub fn new(pool: QuestionPool, config: ExperimentConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let adaptive = AdaptivePolicy::new(config.adaptive.clone())?;
        let static_ = StaticPolicy::new(config.static_difficulty);
        Ok(Self {
            pool,
            tracker: PerformanceTracker::new(),
            adaptive,
            static_,
            config,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    /// Run both phases for one learner.
    ///
    /// The learner is reset before each phase so the phases are independent:
    /// ability gained under the adaptive policy must not inflate the static
    /// baseline, nor the other way around.
    pub fn run_learner(
        &mut self,
        learner: &mut SimulatedLearner,
    ) -> Result<(Vec<SessionResult>, Vec<SessionResult>)> {
        learner.reset();
        let mut adaptive_sessions = Vec::with_capacity(self.config.sessions_per_policy);
        for number in 1..=self.config.sessions_per_policy {
            let mut session = QuizSession::new(SessionSpec {
                session_id: format!("{}_adaptive_{}", learner.id(), number),
                num_questions: self.config.questions_per_session,
                initial_difficulty: self.config.initial_difficulty,
            });
            let result = session
                .run(learner, &mut self.pool, &self.adaptive, &mut self.tracker)
                .with_context(|| format!("adaptive session {number} failed"))?;
            adaptive_sessions.push(result);
        }

        learner.reset();
        let mut static_sessions = Vec::with_capacity(self.config.sessions_per_policy);
        for number in 1..=self.config.sessions_per_policy {
            let mut session = QuizSession::new(SessionSpec {
                session_id: format!("{}_static_{}", learner.id(), number),
                num_questions: self.config.questions_per_session,
                initial_difficulty: self.config.initial_difficulty,
            });
            let result = session
                .run(learner, &mut self.pool, &self.static_, &mut self.tracker)
                .with_context(|| format!("static session {number} failed"))?;
            static_sessions.push(result);
        }

        Ok((adaptive_sessions, static_sessions))
    }

    /// Run the full experiment over a population.
    ///
    /// The question pool is never mutated; learners are left in their
    /// post-static-phase state.
    pub fn run_population(&mut self, population: &mut LearnerPopulation) -> Result<ExperimentReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let created_at = Utc::now();
        let total = population.len();
        tracing::info!(%run_id, learners = total, "running population experiment");

        let mut outcomes = Vec::with_capacity(total);
        for (index, learner) in population.iter_mut().enumerate() {
            tracing::info!(
                learner_id = learner.id(),
                current = index + 1,
                total,
                "processing learner"
            );
            let (adaptive_sessions, static_sessions) = self
                .run_learner(learner)
                .with_context(|| format!("experiment failed for learner {}", learner.id()))?;
            outcomes.push(LearnerOutcome {
                learner_id: learner.id().to_string(),
                profile: learner.profile(),
                adaptive_sessions,
                static_sessions,
            });
        }

        let comparison = self.tracker.comparison_stats();
        tracing::info!(
            %run_id,
            accuracy_improvement_pct = comparison.accuracy_improvement_pct,
            mastery_improvement_pct = comparison.mastery_improvement_pct,
            "experiment complete"
        );

        Ok(ExperimentReport {
            run_id,
            created_at,
            config: self.config.clone(),
            outcomes,
            comparison,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Comparison statistics over everything tracked so far.
    pub fn summary(&self) -> ComparisonStats {
        self.tracker.comparison_stats()
    }

    /// Clear all tracked data.
    pub fn reset(&mut self) {
        self.tracker.clear();
    }
}
