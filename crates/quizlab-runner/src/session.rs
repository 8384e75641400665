//! Single-session orchestration.
//!
//! A [`QuizSession`] drives one learner through a fixed-length sequence of
//! questions under one policy: draw a question at the running difficulty,
//! let the learner answer, record the result, and (for the adaptive policy)
//! ask the policy for the next difficulty. The session is a state machine
//! `Idle -> InProgress -> Finalized`; `Finalized` is terminal.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizlab_core::learner::SimulatedLearner;
use quizlab_core::model::{Difficulty, PerformanceRecord};
use quizlab_core::policy::{mastery_index, DifficultyPolicy, PolicyKind};

use crate::bank::QuestionSource;
use crate::tracker::PerformanceTracker;

/// Parameters for one quiz session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    /// Unique per (learner, policy, sequence number); tracker keys collide
    /// otherwise.
    pub session_id: String,
    pub num_questions: usize,
    pub initial_difficulty: Difficulty,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InProgress,
    Finalized,
}

/// Results of one finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub learner_id: String,
    pub session_id: String,
    pub policy: PolicyKind,
    pub num_questions: usize,
    /// Every answered question's record, in order.
    pub history: Vec<PerformanceRecord>,
    pub accuracy: f64,
    pub avg_time_secs: f64,
    pub mastery_index: f64,
    /// Difficulty each question was served at, in order.
    pub difficulty_sequence: Vec<Difficulty>,
}

/// One bounded run of N questions for one learner under one policy.
#[derive(Debug)]
pub struct QuizSession {
    spec: SessionSpec,
    state: SessionState,
}

impl QuizSession {
    pub fn new(spec: SessionSpec) -> Self {
        Self {
            spec,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// A session runs exactly once; running a non-idle session is an error.
    pub fn run(
        &mut self,
        learner: &mut SimulatedLearner,
        source: &mut dyn QuestionSource,
        policy: &dyn DifficultyPolicy,
        tracker: &mut PerformanceTracker,
    ) -> Result<SessionResult> {
        anyhow::ensure!(
            self.state == SessionState::Idle,
            "session {} has already run",
            self.spec.session_id
        );
        self.state = SessionState::InProgress;

        let learner_id = learner.id().to_string();
        tracker
            .start_session(
                &learner_id,
                &self.spec.session_id,
                policy.kind(),
                self.spec.initial_difficulty,
            )
            .context("failed to open session record")?;

        let mut history: Vec<PerformanceRecord> = Vec::with_capacity(self.spec.num_questions);
        let mut difficulty_sequence = Vec::with_capacity(self.spec.num_questions);
        let mut current = self.spec.initial_difficulty;

        for number in 0..self.spec.num_questions {
            let question = source.next_question(Some(current), None);
            difficulty_sequence.push(current);

            let record = learner
                .answer(&question)
                .with_context(|| format!("question {} failed validation", question.id))?;
            tracker
                .record_response(&learner_id, &self.spec.session_id, &record)
                .context("failed to record response")?;

            tracing::trace!(
                learner_id = %learner_id,
                session_id = %self.spec.session_id,
                question = number + 1,
                difficulty = %current,
                correct = record.correct,
                "question answered"
            );

            history.push(record);

            // The static policy never moves the running difficulty.
            if policy.kind() == PolicyKind::Adaptive {
                current = policy.next_difficulty(&history, current);
            }
        }

        let mastery = mastery_index(&history);
        tracker
            .finalize_session(&learner_id, &self.spec.session_id, mastery)
            .context("failed to finalize session")?;
        self.state = SessionState::Finalized;

        let answered = history.len().max(1) as f64;
        let accuracy = history.iter().filter(|r| r.correct).count() as f64 / answered;
        let avg_time_secs = history.iter().map(|r| r.time_taken_secs).sum::<f64>() / answered;

        Ok(SessionResult {
            learner_id,
            session_id: self.spec.session_id.clone(),
            policy: policy.kind(),
            num_questions: self.spec.num_questions,
            accuracy,
            avg_time_secs,
            mastery_index: mastery,
            difficulty_sequence,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizlab_core::learner::LearnerConfig;
    use quizlab_core::model::{Question, Topic};
    use quizlab_core::policy::{AdaptivePolicy, StaticPolicy};
    use crate::bank::QuestionPool;

    fn pool(seed: u64) -> QuestionPool {
        let mut questions = Vec::new();
        let mut id = 0;
        for difficulty in Difficulty::ALL {
            for topic in Topic::ALL {
                id += 1;
                questions.push(Question {
                    id,
                    topic,
                    difficulty,
                    text: format!("Question {id}"),
                    correct_answer: "A".into(),
                    expected_time_secs: match difficulty {
                        Difficulty::Easy => 15.0,
                        Difficulty::Medium => 30.0,
                        Difficulty::Hard => 50.0,
                    },
                });
            }
        }
        QuestionPool::new(questions, seed).unwrap()
    }

    fn learner(base_ability: f64) -> SimulatedLearner {
        SimulatedLearner::new(
            "l1",
            LearnerConfig {
                base_ability,
                ..LearnerConfig::default()
            },
            21,
        )
        .unwrap()
    }

    #[test]
    fn static_session_never_moves_difficulty() {
        let mut source = pool(5);
        let mut tracker = PerformanceTracker::new();
        let mut l = learner(0.6);
        let policy = StaticPolicy::new(Difficulty::Medium);

        let mut session = QuizSession::new(SessionSpec {
            session_id: "static_1".into(),
            num_questions: 12,
            initial_difficulty: Difficulty::Medium,
        });
        let result = session
            .run(&mut l, &mut source, &policy, &mut tracker)
            .unwrap();

        assert_eq!(session.state(), SessionState::Finalized);
        assert_eq!(result.policy, PolicyKind::Static);
        assert_eq!(result.history.len(), 12);
        assert!(result
            .difficulty_sequence
            .iter()
            .all(|&d| d == Difficulty::Medium));
        assert!(result.history.iter().all(|r| r.difficulty == Difficulty::Medium));

        let record = tracker.session_summary("l1", "static_1").unwrap();
        assert!(record.is_finalized());
        assert_eq!(record.questions_answered, 12);
        assert_eq!(record.difficulty_progression, vec![Difficulty::Medium]);
        assert_eq!(record.difficulty_changes, 0);
    }

    #[test]
    fn adaptive_session_records_everything() {
        let mut source = pool(5);
        let mut tracker = PerformanceTracker::new();
        let mut l = learner(0.8);
        let policy = AdaptivePolicy::default();

        let mut session = QuizSession::new(SessionSpec {
            session_id: "adaptive_1".into(),
            num_questions: 20,
            initial_difficulty: Difficulty::Medium,
        });
        let result = session
            .run(&mut l, &mut source, &policy, &mut tracker)
            .unwrap();

        assert_eq!(result.history.len(), 20);
        assert_eq!(result.difficulty_sequence.len(), 20);
        assert_eq!(result.difficulty_sequence[0], Difficulty::Medium);
        assert!((0.0..=1.0).contains(&result.accuracy));
        assert!((0.0..=3.0).contains(&result.mastery_index));
        assert_eq!(tracker.all_responses().len(), 20);

        // Served difficulty matches the recorded difficulty question by
        // question: the pool always has questions at every level.
        for (served, record) in result.difficulty_sequence.iter().zip(&result.history) {
            assert_eq!(*served, record.difficulty);
        }

        // Adjacent served difficulties never jump two levels.
        for pair in result.difficulty_sequence.windows(2) {
            assert!(pair[0].score().abs_diff(pair[1].score()) <= 1);
        }
    }

    #[test]
    fn session_runs_exactly_once() {
        let mut source = pool(5);
        let mut tracker = PerformanceTracker::new();
        let mut l = learner(0.6);
        let policy = StaticPolicy::default();

        let mut session = QuizSession::new(SessionSpec {
            session_id: "once".into(),
            num_questions: 3,
            initial_difficulty: Difficulty::Medium,
        });
        session
            .run(&mut l, &mut source, &policy, &mut tracker)
            .unwrap();
        assert!(session
            .run(&mut l, &mut source, &policy, &mut tracker)
            .is_err());
    }

    #[test]
    fn duplicate_session_id_fails_cleanly() {
        let mut source = pool(5);
        let mut tracker = PerformanceTracker::new();
        let mut l = learner(0.6);
        let policy = StaticPolicy::default();

        let spec = SessionSpec {
            session_id: "dup".into(),
            num_questions: 3,
            initial_difficulty: Difficulty::Medium,
        };
        QuizSession::new(spec.clone())
            .run(&mut l, &mut source, &policy, &mut tracker)
            .unwrap();
        assert!(QuizSession::new(spec)
            .run(&mut l, &mut source, &policy, &mut tracker)
            .is_err());
    }
}
