//! Performance tracking.
//!
//! Append-only store of session records and per-question response rows.
//! Insertion order is chronological within a session and is never reordered;
//! external report and plot consumers read the records through the accessor
//! surface and serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use quizlab_core::model::{Difficulty, PerformanceRecord, Topic};
use quizlab_core::policy::PolicyKind;

/// Errors raised by tracker lookups.
///
/// These are fatal to the offending call but must never corrupt other
/// sessions' records.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No open session matches the (learner, session) key.
    #[error("unknown session {session_id} for learner {learner_id}")]
    UnknownSession {
        learner_id: String,
        session_id: String,
    },

    /// The session was already finalized; it is immutable from then on.
    #[error("session {session_id} for learner {learner_id} is already finalized")]
    SessionFinalized {
        learner_id: String,
        session_id: String,
    },

    /// A session with this (learner, session) key is already open.
    #[error("duplicate session {session_id} for learner {learner_id}")]
    DuplicateSession {
        learner_id: String,
        session_id: String,
    },
}

/// One quiz session's record.
///
/// Opened by [`PerformanceTracker::start_session`], mutated by every
/// recorded response, finalized exactly once, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub learner_id: String,
    pub session_id: String,
    pub policy: PolicyKind,
    pub initial_difficulty: Difficulty,
    pub started_at: DateTime<Utc>,
    /// Set at finalization; `None` while the session is open.
    pub ended_at: Option<DateTime<Utc>>,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub total_time_secs: f64,
    /// Difficulty labels in order, appended only when the difficulty
    /// changes. The first element is always the initial difficulty.
    pub difficulty_progression: Vec<Difficulty>,
    /// correct / answered; set at finalization.
    pub accuracy: f64,
    /// total time / answered; set at finalization.
    pub avg_time_per_question_secs: f64,
    /// Mastery index over the session history; set at finalization.
    pub mastery_index: f64,
    /// `len(progression) - 1`; set at finalization.
    pub difficulty_changes: usize,
}

impl SessionRecord {
    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// One durable row per answered question. Never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponseRecord {
    pub learner_id: String,
    pub session_id: String,
    pub question_id: u32,
    pub correct: bool,
    pub time_taken_secs: f64,
    pub difficulty: Difficulty,
    pub topic: Topic,
    pub recorded_at: DateTime<Utc>,
}

/// Per-policy means over finalized sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySummary {
    pub mean_accuracy: f64,
    pub mean_mastery: f64,
    pub mean_time_per_question_secs: f64,
    pub mean_difficulty_changes: f64,
    pub total_sessions: usize,
}

/// Cross-policy comparison of finalized sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub adaptive: PolicySummary,
    #[serde(rename = "static")]
    pub static_: PolicySummary,
    /// Percentage improvement of adaptive mean accuracy over static.
    /// Zero when the static baseline is zero or either group is empty.
    pub accuracy_improvement_pct: f64,
    /// Percentage improvement of adaptive mean mastery over static.
    pub mastery_improvement_pct: f64,
}

/// A learner's per-session metric series, in chronological order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningProgression {
    pub session_numbers: Vec<usize>,
    pub accuracies: Vec<f64>,
    pub mastery_indices: Vec<f64>,
    pub avg_times: Vec<f64>,
    pub policies: Vec<PolicyKind>,
}

/// Append-only tracker for session and question-response records.
#[derive(Debug, Default, Clone)]
pub struct PerformanceTracker {
    sessions: Vec<SessionRecord>,
    responses: Vec<QuestionResponseRecord>,
    /// (learner, session) key to index into `sessions`.
    index: HashMap<(String, String), usize>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session record.
    pub fn start_session(
        &mut self,
        learner_id: &str,
        session_id: &str,
        policy: PolicyKind,
        initial_difficulty: Difficulty,
    ) -> Result<(), TrackerError> {
        let key = (learner_id.to_string(), session_id.to_string());
        if self.index.contains_key(&key) {
            return Err(TrackerError::DuplicateSession {
                learner_id: learner_id.to_string(),
                session_id: session_id.to_string(),
            });
        }

        tracing::debug!(learner_id, session_id, %policy, "session started");
        self.sessions.push(SessionRecord {
            learner_id: learner_id.to_string(),
            session_id: session_id.to_string(),
            policy,
            initial_difficulty,
            started_at: Utc::now(),
            ended_at: None,
            questions_answered: 0,
            correct_answers: 0,
            total_time_secs: 0.0,
            difficulty_progression: vec![initial_difficulty],
            accuracy: 0.0,
            avg_time_per_question_secs: 0.0,
            mastery_index: 0.0,
            difficulty_changes: 0,
        });
        self.index.insert(key, self.sessions.len() - 1);
        Ok(())
    }

    /// Record one answered question against an open session.
    ///
    /// Updates the session's running counters and appends a durable
    /// question-response row.
    pub fn record_response(
        &mut self,
        learner_id: &str,
        session_id: &str,
        record: &PerformanceRecord,
    ) -> Result<(), TrackerError> {
        let session = self.open_session_mut(learner_id, session_id)?;

        session.questions_answered += 1;
        if record.correct {
            session.correct_answers += 1;
        }
        session.total_time_secs += record.time_taken_secs;
        if session.difficulty_progression.last() != Some(&record.difficulty) {
            session.difficulty_progression.push(record.difficulty);
        }

        self.responses.push(QuestionResponseRecord {
            learner_id: learner_id.to_string(),
            session_id: session_id.to_string(),
            question_id: record.question_id,
            correct: record.correct,
            time_taken_secs: record.time_taken_secs,
            difficulty: record.difficulty,
            topic: record.topic,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    /// Finalize a session: set the end time and derived metrics.
    ///
    /// A second finalize on the same key is rejected with
    /// [`TrackerError::SessionFinalized`]; finalized sessions are immutable.
    pub fn finalize_session(
        &mut self,
        learner_id: &str,
        session_id: &str,
        mastery_index: f64,
    ) -> Result<(), TrackerError> {
        let session = self.open_session_mut(learner_id, session_id)?;

        session.ended_at = Some(Utc::now());
        session.mastery_index = mastery_index;
        if session.questions_answered > 0 {
            session.accuracy = session.correct_answers as f64 / session.questions_answered as f64;
            session.avg_time_per_question_secs =
                session.total_time_secs / session.questions_answered as f64;
        }
        session.difficulty_changes = session.difficulty_progression.len() - 1;

        tracing::debug!(
            learner_id,
            session_id,
            accuracy = session.accuracy,
            mastery_index,
            "session finalized"
        );
        Ok(())
    }

    fn open_session_mut(
        &mut self,
        learner_id: &str,
        session_id: &str,
    ) -> Result<&mut SessionRecord, TrackerError> {
        let key = (learner_id.to_string(), session_id.to_string());
        let index = *self
            .index
            .get(&key)
            .ok_or_else(|| TrackerError::UnknownSession {
                learner_id: learner_id.to_string(),
                session_id: session_id.to_string(),
            })?;
        let session = &mut self.sessions[index];
        if session.is_finalized() {
            return Err(TrackerError::SessionFinalized {
                learner_id: learner_id.to_string(),
                session_id: session_id.to_string(),
            });
        }
        Ok(session)
    }

    /// Look up a session record by key.
    pub fn session_summary(&self, learner_id: &str, session_id: &str) -> Option<&SessionRecord> {
        let key = (learner_id.to_string(), session_id.to_string());
        self.index.get(&key).map(|&i| &self.sessions[i])
    }

    /// All session records for one learner, in insertion order.
    pub fn learner_history(&self, learner_id: &str) -> Vec<&SessionRecord> {
        self.sessions
            .iter()
            .filter(|s| s.learner_id == learner_id)
            .collect()
    }

    /// Per-session metric series for one learner's finalized sessions.
    pub fn learning_progression(&self, learner_id: &str) -> LearningProgression {
        let mut progression = LearningProgression::default();
        let sessions = self
            .sessions
            .iter()
            .filter(|s| s.learner_id == learner_id && s.is_finalized());
        for (number, session) in sessions.enumerate() {
            progression.session_numbers.push(number + 1);
            progression.accuracies.push(session.accuracy);
            progression.mastery_indices.push(session.mastery_index);
            progression.avg_times.push(session.avg_time_per_question_secs);
            progression.policies.push(session.policy);
        }
        progression
    }

    /// All session records, in insertion order.
    pub fn all_sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    /// All question-response rows, in insertion order.
    pub fn all_responses(&self) -> &[QuestionResponseRecord] {
        &self.responses
    }

    /// Compare adaptive against static sessions.
    ///
    /// Only finalized sessions contribute. Empty groups and zero baselines
    /// yield zero improvement rather than a fault.
    pub fn comparison_stats(&self) -> ComparisonStats {
        let summarize = |kind: PolicyKind| -> PolicySummary {
            let group: Vec<&SessionRecord> = self
                .sessions
                .iter()
                .filter(|s| s.policy == kind && s.is_finalized())
                .collect();
            if group.is_empty() {
                return PolicySummary::default();
            }
            let n = group.len() as f64;
            PolicySummary {
                mean_accuracy: group.iter().map(|s| s.accuracy).sum::<f64>() / n,
                mean_mastery: group.iter().map(|s| s.mastery_index).sum::<f64>() / n,
                mean_time_per_question_secs: group
                    .iter()
                    .map(|s| s.avg_time_per_question_secs)
                    .sum::<f64>()
                    / n,
                mean_difficulty_changes: group
                    .iter()
                    .map(|s| s.difficulty_changes as f64)
                    .sum::<f64>()
                    / n,
                total_sessions: group.len(),
            }
        };

        let adaptive = summarize(PolicyKind::Adaptive);
        let static_ = summarize(PolicyKind::Static);

        let improvement = |adaptive_mean: f64, static_mean: f64| -> f64 {
            if static_mean > 0.0 {
                (adaptive_mean - static_mean) / static_mean * 100.0
            } else {
                0.0
            }
        };

        ComparisonStats {
            accuracy_improvement_pct: improvement(adaptive.mean_accuracy, static_.mean_accuracy),
            mastery_improvement_pct: improvement(adaptive.mean_mastery, static_.mean_mastery),
            adaptive,
            static_,
        }
    }

    /// Drop all tracked data.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.responses.clear();
        self.index.clear();
    }
}
