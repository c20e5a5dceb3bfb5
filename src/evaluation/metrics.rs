// src/evaluation/metrics.rs - Confusion matrix and derived rates

use serde::{Deserialize, Serialize};

/// Ratio that is 0.0 instead of NaN/inf for an empty denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (false, false) => self.true_negatives += 1,
            (true, false) => self.false_positives += 1,
            (false, true) => self.false_negatives += 1,
        }
    }

    /// Adds another matrix's counts, e.g. to pool cross-validation folds.
    pub fn merge(&mut self, other: &ConfusionMatrix) {
        self.true_positives += other.true_positives;
        self.true_negatives += other.true_negatives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    fn tp(&self) -> f64 {
        self.true_positives as f64
    }

    fn tn(&self) -> f64 {
        self.true_negatives as f64
    }

    fn fp(&self) -> f64 {
        self.false_positives as f64
    }

    fn fn_(&self) -> f64 {
        self.false_negatives as f64
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp(), self.tp() + self.fp())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp(), self.tp() + self.fn_())
    }

    pub fn f_beta(&self, beta: f64) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        let b2 = beta * beta;
        ratio((1.0 + b2) * p * r, b2 * p + r)
    }

    pub fn f1(&self) -> f64 {
        self.f_beta(1.0)
    }

    /// Recall-weighted F-score.
    pub fn f2(&self) -> f64 {
        self.f_beta(2.0)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp() + self.tn(), self.total() as f64)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.tn(), self.tn() + self.fp())
    }

    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.fp(), self.fp() + self.tn())
    }

    pub fn false_negative_rate(&self) -> f64 {
        ratio(self.fn_(), self.fn_() + self.tp())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub f2: f64,
    pub accuracy: f64,
    pub specificity: f64,
    pub false_positive_rate: f64,
    pub false_negative_rate: f64,
}

impl From<&ConfusionMatrix> for Metrics {
    fn from(m: &ConfusionMatrix) -> Self {
        Self {
            precision: m.precision(),
            recall: m.recall(),
            f1: m.f1(),
            f2: m.f2(),
            accuracy: m.accuracy(),
            specificity: m.specificity(),
            false_positive_rate: m.false_positive_rate(),
            false_negative_rate: m.false_negative_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_rates(m: &ConfusionMatrix) -> [f64; 8] {
        let x = Metrics::from(m);
        [
            x.precision,
            x.recall,
            x.f1,
            x.f2,
            x.accuracy,
            x.specificity,
            x.false_positive_rate,
            x.false_negative_rate,
        ]
    }

    #[test]
    fn test_perfect_matrix() {
        let m = ConfusionMatrix::new(10, 10, 0, 0);
        assert_eq!(m.precision(), 1.0);
        assert_eq!(m.recall(), 1.0);
        assert_eq!(m.f1(), 1.0);
        assert_eq!(m.accuracy(), 1.0);
        assert_eq!(m.specificity(), 1.0);
        assert_eq!(m.false_positive_rate(), 0.0);
    }

    #[test]
    fn test_all_false_positives() {
        let m = ConfusionMatrix::new(0, 0, 10, 0);
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.f1(), 0.0);
        assert_eq!(m.accuracy(), 0.0);
        assert_eq!(m.false_positive_rate(), 1.0);
    }

    #[test]
    fn test_rates_bounded_and_finite() {
        let matrices = [
            ConfusionMatrix::default(),
            ConfusionMatrix::new(0, 5, 0, 0),
            ConfusionMatrix::new(0, 0, 0, 7),
            ConfusionMatrix::new(3, 4, 5, 6),
            ConfusionMatrix::new(1, 0, 0, 0),
        ];
        for m in &matrices {
            for rate in all_rates(m) {
                assert!(rate.is_finite(), "{:?}", m);
                assert!((0.0..=1.0).contains(&rate), "{:?} -> {}", m, rate);
            }
        }
        assert_eq!(all_rates(&ConfusionMatrix::default()), [0.0; 8]);
    }

    #[test]
    fn test_f_scores() {
        // precision 0.5, recall 1.0
        let m = ConfusionMatrix::new(2, 0, 2, 0);
        assert!((m.f1() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f2() - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_pools_counts() {
        let mut pooled = ConfusionMatrix::new(1, 2, 3, 4);
        pooled.merge(&ConfusionMatrix::new(4, 3, 2, 1));
        assert_eq!(pooled, ConfusionMatrix::new(5, 5, 5, 5));
        assert_eq!(pooled.total(), 20);
    }

    #[test]
    fn test_record() {
        let mut m = ConfusionMatrix::default();
        m.record(true, true);
        m.record(true, false);
        m.record(false, true);
        m.record(false, false);
        m.record(false, false);
        assert_eq!(m, ConfusionMatrix::new(1, 2, 1, 1));
        assert_eq!(m.total(), 5);
    }
}
