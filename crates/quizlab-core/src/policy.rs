//! Difficulty-selection policies.
//!
//! The adaptive policy is a three-state state machine over
//! `Easy < Medium < Hard` driven by a rolling window of recent performance,
//! so old performance ages out of the decision. Transitions are single-step
//! only. The rules live in an ordered decision table evaluated first-match-
//! wins, which keeps the cascade auditable and testable rule by rule.
//!
//! The static policy ignores history entirely and is the experiment's
//! baseline; it shares the mastery formula so comparisons are
//! apples-to-apples.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::model::{Difficulty, PerformanceRecord};

/// Which difficulty-selection strategy a session ran under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Adaptive,
    Static,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Adaptive => write!(f, "adaptive"),
            PolicyKind::Static => write!(f, "static"),
        }
    }
}

/// A difficulty-selection strategy.
pub trait DifficultyPolicy {
    /// Which kind of policy this is.
    fn kind(&self) -> PolicyKind;

    /// Recommend the difficulty for the next question.
    ///
    /// An empty history returns `current` unchanged: start-of-session is an
    /// expected condition, not an anomaly.
    fn next_difficulty(&self, history: &[PerformanceRecord], current: Difficulty) -> Difficulty;
}

/// Thresholds for the adaptive policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Accuracy above which difficulty may increase.
    pub accuracy_high_threshold: f64,
    /// Accuracy below which difficulty decreases.
    pub accuracy_low_threshold: f64,
    /// Time-ratio boundary separating "fast" from "slow" answers.
    pub time_threshold_factor: f64,
    /// Number of most recent records considered for a decision.
    pub window_size: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            accuracy_high_threshold: 0.80,
            accuracy_low_threshold: 0.50,
            time_threshold_factor: 1.0,
            window_size: 5,
        }
    }
}

impl AdaptiveConfig {
    /// Check threshold bounds and ordering.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.window_size == 0 {
            return Err(ValidationError::InvalidConfig(
                "window_size must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("accuracy_high_threshold", self.accuracy_high_threshold),
            ("accuracy_low_threshold", self.accuracy_low_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.accuracy_low_threshold >= self.accuracy_high_threshold {
            return Err(ValidationError::InvalidConfig(format!(
                "accuracy_low_threshold ({}) must be below accuracy_high_threshold ({})",
                self.accuracy_low_threshold, self.accuracy_high_threshold
            )));
        }
        if self.time_threshold_factor <= 0.0 {
            return Err(ValidationError::InvalidConfig(format!(
                "time_threshold_factor must be positive, got {}",
                self.time_threshold_factor
            )));
        }
        Ok(())
    }
}

/// What a rule recommends for the running difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increase,
    Decrease,
    Hold,
}

/// Metrics computed over the performance window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMetrics {
    /// Fraction of correct answers in the window.
    pub accuracy: f64,
    /// Mean of time/expected-time over records with a positive expected
    /// time; 1.0 when none qualify.
    pub time_ratio: f64,
}

impl WindowMetrics {
    /// Compute metrics over the last `window_size` records of `history`.
    pub fn over_window(history: &[PerformanceRecord], window_size: usize) -> WindowMetrics {
        let start = history.len().saturating_sub(window_size);
        Self::over(&history[start..])
    }

    /// Compute metrics over an entire slice.
    pub fn over(records: &[PerformanceRecord]) -> WindowMetrics {
        if records.is_empty() {
            return WindowMetrics {
                accuracy: 0.0,
                time_ratio: 1.0,
            };
        }
        let correct = records.iter().filter(|r| r.correct).count();
        let accuracy = correct as f64 / records.len() as f64;

        let ratios: Vec<f64> = records
            .iter()
            .filter(|r| r.expected_time_secs > 0.0)
            .map(|r| r.time_taken_secs / r.expected_time_secs)
            .collect();
        let time_ratio = if ratios.is_empty() {
            1.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };

        WindowMetrics {
            accuracy,
            time_ratio,
        }
    }
}

type RuleFn = fn(&AdaptiveConfig, &WindowMetrics) -> Option<Adjustment>;

/// High accuracy and faster than expected: the learner is coasting.
fn rule_fast_mastery(cfg: &AdaptiveConfig, m: &WindowMetrics) -> Option<Adjustment> {
    (m.accuracy > cfg.accuracy_high_threshold && m.time_ratio < cfg.time_threshold_factor)
        .then_some(Adjustment::Increase)
}

/// Low accuracy: back off one level.
fn rule_struggling(cfg: &AdaptiveConfig, m: &WindowMetrics) -> Option<Adjustment> {
    (m.accuracy < cfg.accuracy_low_threshold).then_some(Adjustment::Decrease)
}

/// High accuracy but slow: escalate only past the stricter 0.90 gate.
///
/// The asymmetry with `rule_fast_mastery` (fast learners escalate at the
/// high threshold, slow learners need 0.90) is intentional and preserved
/// from the reference behavior.
fn rule_slow_mastery(cfg: &AdaptiveConfig, m: &WindowMetrics) -> Option<Adjustment> {
    if m.accuracy > cfg.accuracy_high_threshold && m.time_ratio >= cfg.time_threshold_factor {
        if m.accuracy > 0.9 {
            Some(Adjustment::Increase)
        } else {
            Some(Adjustment::Hold)
        }
    } else {
        None
    }
}

/// Middling accuracy: stay where we are.
fn rule_steady(_cfg: &AdaptiveConfig, _m: &WindowMetrics) -> Option<Adjustment> {
    Some(Adjustment::Hold)
}

/// The rule cascade, in priority order. First match wins.
const RULES: [(&str, RuleFn); 4] = [
    ("fast-mastery", rule_fast_mastery),
    ("struggling", rule_struggling),
    ("slow-mastery", rule_slow_mastery),
    ("steady", rule_steady),
];

/// Rule-based adaptive difficulty policy.
#[derive(Debug, Clone, Default)]
pub struct AdaptivePolicy {
    config: AdaptiveConfig,
}

impl AdaptivePolicy {
    pub fn new(config: AdaptiveConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Evaluate the decision table against window metrics.
    pub fn decide(&self, metrics: &WindowMetrics) -> Adjustment {
        for (name, rule) in RULES {
            if let Some(adjustment) = rule(&self.config, metrics) {
                tracing::trace!(rule = name, ?adjustment, "difficulty rule matched");
                return adjustment;
            }
        }
        // rule_steady always matches.
        Adjustment::Hold
    }
}

impl DifficultyPolicy for AdaptivePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Adaptive
    }

    fn next_difficulty(&self, history: &[PerformanceRecord], current: Difficulty) -> Difficulty {
        if history.is_empty() {
            return current;
        }
        let metrics = WindowMetrics::over_window(history, self.config.window_size);
        match self.decide(&metrics) {
            Adjustment::Increase => current.step_up(),
            Adjustment::Decrease => current.step_down(),
            Adjustment::Hold => current,
        }
    }
}

/// Fixed-difficulty baseline policy.
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicy {
    fixed: Difficulty,
}

impl StaticPolicy {
    pub fn new(fixed: Difficulty) -> Self {
        Self { fixed }
    }

    pub fn fixed_difficulty(&self) -> Difficulty {
        self.fixed
    }
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            fixed: Difficulty::Medium,
        }
    }
}

impl DifficultyPolicy for StaticPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Static
    }

    /// History-invariant: always the configured fixed difficulty.
    fn next_difficulty(&self, _history: &[PerformanceRecord], _current: Difficulty) -> Difficulty {
        self.fixed
    }
}

/// Mastery index over a full performance history, in `[0, 3]`.
///
/// Sum of difficulty score for each correct answer, normalized by the
/// maximum possible (every question hard and correct) and rescaled to 0–3.
/// Sustained correctness on harder material scores higher than the same
/// accuracy on easier material. Empty history scores 0.0.
pub fn mastery_index(history: &[PerformanceRecord]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let weighted: u32 = history
        .iter()
        .filter(|r| r.correct)
        .map(|r| r.difficulty.score() as u32)
        .sum();
    let max_possible = history.len() as u32 * 3;
    weighted as f64 / max_possible as f64 * 3.0
}

/// Detailed statistics about a performance history and its adaptations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptationStats {
    pub total_questions: usize,
    /// Full-history accuracy.
    pub accuracy: f64,
    /// Full-history mean time ratio.
    pub avg_time_ratio: f64,
    pub mastery_index: f64,
    /// Mean difficulty score over the history.
    pub avg_difficulty: f64,
    /// Difficulty score of every record, in order.
    pub difficulty_progression: Vec<u8>,
    /// Number of adjacent records whose difficulty differs.
    pub difficulty_changes: usize,
}

/// Compute [`AdaptationStats`] over a full history (not windowed).
pub fn adaptation_stats(history: &[PerformanceRecord]) -> AdaptationStats {
    if history.is_empty() {
        return AdaptationStats::default();
    }
    let metrics = WindowMetrics::over(history);
    let scores: Vec<u8> = history.iter().map(|r| r.difficulty.score()).collect();
    let changes = scores.windows(2).filter(|pair| pair[0] != pair[1]).count();
    AdaptationStats {
        total_questions: history.len(),
        accuracy: metrics.accuracy,
        avg_time_ratio: metrics.time_ratio,
        mastery_index: mastery_index(history),
        avg_difficulty: scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64,
        difficulty_changes: changes,
        difficulty_progression: scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Topic;

    fn record(correct: bool, time: f64, expected: f64, difficulty: Difficulty) -> PerformanceRecord {
        PerformanceRecord {
            question_id: 0,
            topic: Topic::Science,
            difficulty,
            correct,
            time_taken_secs: time,
            expected_time_secs: expected,
        }
    }

    fn fast_correct(n: usize, difficulty: Difficulty) -> Vec<PerformanceRecord> {
        (0..n).map(|_| record(true, 10.0, 20.0, difficulty)).collect()
    }

    fn slow_incorrect(n: usize, difficulty: Difficulty) -> Vec<PerformanceRecord> {
        (0..n).map(|_| record(false, 30.0, 20.0, difficulty)).collect()
    }

    #[test]
    fn empty_history_keeps_current_difficulty() {
        let policy = AdaptivePolicy::default();
        assert_eq!(policy.next_difficulty(&[], Difficulty::Medium), Difficulty::Medium);
        assert_eq!(policy.next_difficulty(&[], Difficulty::Hard), Difficulty::Hard);
    }

    #[test]
    fn fast_accurate_performance_escalates() {
        let policy = AdaptivePolicy::default();
        let history = fast_correct(5, Difficulty::Medium);
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Medium),
            Difficulty::Hard
        );
        // Capped at the hardest level.
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Hard),
            Difficulty::Hard
        );
    }

    #[test]
    fn low_accuracy_backs_off() {
        let policy = AdaptivePolicy::default();
        let history = slow_incorrect(5, Difficulty::Hard);
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Medium),
            Difficulty::Easy
        );
        // Capped at the easiest level.
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Easy),
            Difficulty::Easy
        );
    }

    #[test]
    fn transitions_are_single_step() {
        let policy = AdaptivePolicy::default();
        let up = fast_correct(5, Difficulty::Easy);
        let down = slow_incorrect(5, Difficulty::Hard);
        for current in Difficulty::ALL {
            let next = policy.next_difficulty(&up, current);
            assert!(next.score().abs_diff(current.score()) <= 1);
            let next = policy.next_difficulty(&down, current);
            assert!(next.score().abs_diff(current.score()) <= 1);
        }
    }

    #[test]
    fn slow_but_accurate_needs_ninety_percent() {
        // Boundary case: the slow-response escalation gate is deliberately
        // stricter (0.90) than the fast-response gate (0.80).
        let policy = AdaptivePolicy::default();

        // 5 correct but slow answers: accuracy 1.0 > 0.9, escalate.
        let all_correct_slow: Vec<_> =
            (0..5).map(|_| record(true, 30.0, 20.0, Difficulty::Medium)).collect();
        assert_eq!(
            policy.next_difficulty(&all_correct_slow, Difficulty::Medium),
            Difficulty::Hard
        );

        // Slow window with accuracy in (0.80, 0.90] holds. With window 5 a
        // raw 4/5 = 0.8 does not exceed the high threshold, so widen the
        // window to get 5/6 ~ 0.83.
        let policy = AdaptivePolicy::new(AdaptiveConfig {
            window_size: 6,
            ..AdaptiveConfig::default()
        })
        .unwrap();
        let mut mostly_correct_slow: Vec<_> =
            (0..5).map(|_| record(true, 30.0, 20.0, Difficulty::Medium)).collect();
        mostly_correct_slow.push(record(false, 30.0, 20.0, Difficulty::Medium));
        assert_eq!(
            policy.next_difficulty(&mostly_correct_slow, Difficulty::Medium),
            Difficulty::Medium
        );
    }

    #[test]
    fn middling_accuracy_holds() {
        let policy = AdaptivePolicy::default();
        // 3/5 correct sits between the thresholds.
        let mut history = fast_correct(3, Difficulty::Medium);
        history.extend(slow_incorrect(2, Difficulty::Medium));
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Medium),
            Difficulty::Medium
        );
    }

    #[test]
    fn only_recent_window_drives_the_decision() {
        let policy = AdaptivePolicy::default();
        // A long miserable past followed by five perfect fast answers: the
        // old failures must have aged out.
        let mut history = slow_incorrect(20, Difficulty::Easy);
        history.extend(fast_correct(5, Difficulty::Easy));
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Easy),
            Difficulty::Medium
        );
    }

    #[test]
    fn short_history_uses_all_records() {
        let policy = AdaptivePolicy::default();
        let history = fast_correct(2, Difficulty::Easy);
        assert_eq!(
            policy.next_difficulty(&history, Difficulty::Easy),
            Difficulty::Medium
        );
    }

    #[test]
    fn decision_table_rule_by_rule() {
        let policy = AdaptivePolicy::default();
        let cfg = policy.config();

        let fast_accurate = WindowMetrics { accuracy: 0.9, time_ratio: 0.8 };
        assert_eq!(rule_fast_mastery(cfg, &fast_accurate), Some(Adjustment::Increase));

        let failing = WindowMetrics { accuracy: 0.4, time_ratio: 0.8 };
        assert_eq!(rule_fast_mastery(cfg, &failing), None);
        assert_eq!(rule_struggling(cfg, &failing), Some(Adjustment::Decrease));

        let slow_very_accurate = WindowMetrics { accuracy: 0.95, time_ratio: 1.3 };
        assert_eq!(rule_slow_mastery(cfg, &slow_very_accurate), Some(Adjustment::Increase));

        let slow_accurate = WindowMetrics { accuracy: 0.85, time_ratio: 1.3 };
        assert_eq!(rule_slow_mastery(cfg, &slow_accurate), Some(Adjustment::Hold));

        let middling = WindowMetrics { accuracy: 0.6, time_ratio: 1.0 };
        assert_eq!(rule_steady(cfg, &middling), Some(Adjustment::Hold));

        assert_eq!(policy.decide(&fast_accurate), Adjustment::Increase);
        assert_eq!(policy.decide(&failing), Adjustment::Decrease);
        assert_eq!(policy.decide(&middling), Adjustment::Hold);
    }

    #[test]
    fn static_policy_ignores_history() {
        let policy = StaticPolicy::new(Difficulty::Medium);
        let histories = [
            vec![],
            fast_correct(10, Difficulty::Hard),
            slow_incorrect(10, Difficulty::Easy),
        ];
        for history in &histories {
            for current in Difficulty::ALL {
                assert_eq!(policy.next_difficulty(history, current), Difficulty::Medium);
            }
        }
        assert_eq!(policy.kind(), PolicyKind::Static);
    }

    #[test]
    fn mastery_index_bounds() {
        assert_eq!(mastery_index(&[]), 0.0);

        let all_hard_correct = fast_correct(10, Difficulty::Hard);
        assert!((mastery_index(&all_hard_correct) - 3.0).abs() < 1e-12);

        let all_incorrect = slow_incorrect(10, Difficulty::Hard);
        assert_eq!(mastery_index(&all_incorrect), 0.0);

        let all_easy_correct = fast_correct(10, Difficulty::Easy);
        assert!((mastery_index(&all_easy_correct) - 1.0).abs() < 1e-12);

        // Mixed histories stay in range.
        let mut mixed = fast_correct(3, Difficulty::Medium);
        mixed.extend(slow_incorrect(2, Difficulty::Hard));
        let m = mastery_index(&mixed);
        assert!((0.0..=3.0).contains(&m));
    }

    #[test]
    fn mastery_uses_full_history_not_window() {
        // 20 correct hard answers followed by 5 misses: windowed scoring
        // would see only the misses, full-history scoring must not.
        let mut history = fast_correct(20, Difficulty::Hard);
        history.extend(slow_incorrect(5, Difficulty::Hard));
        let m = mastery_index(&history);
        assert!((m - 20.0 / 25.0 * 3.0).abs() < 1e-12);
    }

    #[test]
    fn adaptation_stats_counts_changes() {
        let history = vec![
            record(true, 10.0, 20.0, Difficulty::Easy),
            record(true, 10.0, 20.0, Difficulty::Easy),
            record(true, 10.0, 20.0, Difficulty::Medium),
            record(false, 30.0, 20.0, Difficulty::Hard),
            record(false, 30.0, 20.0, Difficulty::Medium),
        ];
        let stats = adaptation_stats(&history);
        assert_eq!(stats.total_questions, 5);
        assert_eq!(stats.difficulty_changes, 3);
        assert_eq!(stats.difficulty_progression, vec![1, 1, 2, 3, 2]);
        assert!((stats.accuracy - 0.6).abs() < 1e-12);
        assert!((stats.avg_difficulty - 1.8).abs() < 1e-12);

        let empty = adaptation_stats(&[]);
        assert_eq!(empty.total_questions, 0);
        assert_eq!(empty.mastery_index, 0.0);
    }

    #[test]
    fn config_validation() {
        assert!(AdaptiveConfig::default().validate().is_ok());

        let zero_window = AdaptiveConfig { window_size: 0, ..Default::default() };
        assert!(zero_window.validate().is_err());

        let inverted = AdaptiveConfig {
            accuracy_low_threshold: 0.9,
            accuracy_high_threshold: 0.5,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let out_of_range = AdaptiveConfig {
            accuracy_high_threshold: 1.5,
            ..Default::default()
        };
        assert!(out_of_range.validate().is_err());
    }
}
