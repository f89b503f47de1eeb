use serde::Serialize;

use faceid_config::DEFAULT_MATCH_THRESHOLD;

use crate::faces::embedding::Embedding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchDecision {
    pub outcome: MatchOutcome,
    pub distance: f64,
}

impl MatchDecision {
    pub fn is_accept(&self) -> bool {
        self.outcome == MatchOutcome::Accept
    }

    /// Display-only similarity percentage, `(1 - min(distance, 1)) * 100`.
    pub fn match_level(&self) -> f64 {
        (1.0 - self.distance.min(1.0)) * 100.0
    }
}

/// Hard Euclidean threshold: accept iff `distance < threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    threshold: f64,
}

impl MatchPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, distance: f64) -> MatchOutcome {
        if distance < self.threshold {
            MatchOutcome::Accept
        } else {
            MatchOutcome::Reject
        }
    }

    pub fn evaluate(&self, live: &Embedding, stored: &Embedding) -> MatchDecision {
        let distance = euclidean_distance(live.as_slice(), stored.as_slice());
        MatchDecision {
            outcome: self.decide(distance),
            distance,
        }
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

/// Callers must pass vectors of equal length; the session validates both
/// sides against the extractor profile before comparing.
pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    debug_assert_eq!(
        lhs.len(),
        rhs.len(),
        "euclidean_distance called with vectors of different length"
    );

    lhs.iter()
        .zip(rhs.iter())
        .map(|(l, r)| (l - r) * (l - r))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(values: &[f64]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn distance_is_symmetric_and_zero_for_identical_vectors() {
        let a = [0.1, -0.4, 0.9, 0.0];
        let b = [0.3, 0.2, -0.1, 0.5];
        assert_eq!(euclidean_distance(&a, &b), euclidean_distance(&b, &a));
        assert_eq!(euclidean_distance(&a, &a), 0.0);
    }

    #[test]
    fn distance_matches_hand_computed_value() {
        let distance = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn threshold_boundary_rejects() {
        let policy = MatchPolicy::new(0.55);
        assert_eq!(policy.decide(0.5499), MatchOutcome::Accept);
        assert_eq!(policy.decide(0.55), MatchOutcome::Reject);
        assert_eq!(policy.decide(0.7), MatchOutcome::Reject);
    }

    #[test]
    fn decision_is_monotonic_in_distance() {
        let policy = MatchPolicy::default();
        let mut seen_reject = false;
        for step in 0..200 {
            let distance = step as f64 * 0.005;
            match policy.decide(distance) {
                MatchOutcome::Reject => seen_reject = true,
                MatchOutcome::Accept => assert!(!seen_reject, "accept after reject at {distance}"),
            }
        }
        assert!(seen_reject);
    }

    #[test]
    fn evaluate_reports_distance_with_outcome() {
        let policy = MatchPolicy::default();
        let stored = embedding(&[0.0, 0.0, 0.0]);

        let same = policy.evaluate(&stored, &stored);
        assert!(same.is_accept());
        assert_eq!(same.distance, 0.0);
        assert_eq!(same.match_level(), 100.0);

        let far = policy.evaluate(&embedding(&[0.7, 0.0, 0.0]), &stored);
        assert_eq!(far.outcome, MatchOutcome::Reject);
        assert!((far.distance - 0.7).abs() < 1e-12);
        assert!((far.match_level() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn default_threshold_comes_from_configuration() {
        assert_eq!(MatchPolicy::default().threshold(), DEFAULT_MATCH_THRESHOLD);
    }
}
