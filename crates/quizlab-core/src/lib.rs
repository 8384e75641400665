//! quizlab-core — Learner model, difficulty policies, and mastery scoring.
//!
//! This crate defines the fundamental data model, the stochastic learner
//! model, and the difficulty-selection policies that the quizlab simulation
//! builds on. It performs no I/O and no orchestration; see `quizlab-runner`
//! for sessions, experiments, and tracking.

pub mod error;
pub mod learner;
pub mod model;
pub mod policy;

pub use error::ValidationError;
pub use model::{Difficulty, PerformanceRecord, Question, Topic};
pub use policy::{
    mastery_index, AdaptiveConfig, AdaptivePolicy, DifficultyPolicy, PolicyKind, StaticPolicy,
};
