//! quizlab-runner — Session orchestration, experiments, and tracking.
//!
//! Drives simulated learners (from `quizlab-core`) through quiz sessions
//! under adaptive and static difficulty policies, accumulates session and
//! per-question records in an append-only tracker, and compares the two
//! policies across a population. The whole pipeline is single-threaded and
//! deterministic given a master seed.

pub mod bank;
pub mod experiment;
pub mod session;
pub mod tracker;

pub use bank::{QuestionPool, QuestionSource};
pub use experiment::{ExperimentConfig, ExperimentReport, ExperimentRunner};
pub use session::{QuizSession, SessionResult, SessionSpec};
pub use tracker::{ComparisonStats, PerformanceTracker, TrackerError};
