use serde::{Deserialize, Serialize};

/// The four aggregate scores reported after evaluation, each scaled
/// to [0, 100]. Precision, recall and F1 are macro-averaged: per-class
/// scores averaged uniformly, ignoring class frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Computes accuracy and macro precision/recall/F1 from predicted vs.
/// true class indices. A class with an empty denominator contributes 0
/// to the macro average.
pub fn evaluate(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> EvaluationReport {
    assert_eq!(y_true.len(), y_pred.len());
    assert!(!y_true.is_empty());

    let mut confusion: Vec<Vec<usize>> = vec![vec![0; num_classes]; num_classes];
    let mut correct: usize = 0;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        confusion[t][p] += 1;
        if t == p {
            correct += 1;
        }
    }

    let mut precision_sum: f64 = 0.0;
    let mut recall_sum: f64 = 0.0;
    let mut f1_sum: f64 = 0.0;
    for c in 0..num_classes {
        let tp: usize = confusion[c][c];
        let predicted: usize = (0..num_classes).map(|t| confusion[t][c]).sum();
        let actual: usize = confusion[c].iter().sum();

        let precision: f64 = if predicted > 0 { tp as f64 / predicted as f64 } else { 0.0 };
        let recall: f64 = if actual > 0 { tp as f64 / actual as f64 } else { 0.0 };
        let f1: f64 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        precision_sum += precision;
        recall_sum += recall;
        f1_sum += f1;
    }

    let n: f64 = num_classes as f64;
    EvaluationReport {
        accuracy: correct as f64 / y_true.len() as f64 * 100.0,
        precision: precision_sum / n * 100.0,
        recall: recall_sum / n * 100.0,
        f1_score: f1_sum / n * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_score_100() {
        let y = vec![0, 1, 2, 3, 4, 2, 1];
        let report = evaluate(&y, &y, 5);
        assert_eq!(report.accuracy, 100.0);
        assert_eq!(report.precision, 100.0);
        assert_eq!(report.recall, 100.0);
        assert_eq!(report.f1_score, 100.0);
    }

    #[test]
    fn all_wrong_predictions_score_0() {
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![1, 1, 0, 0];
        let report = evaluate(&y_true, &y_pred, 2);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1_score, 0.0);
    }

    #[test]
    fn macro_average_matches_hand_computation() {
        // class 0: tp=2, fp=1, fn=0 -> p=2/3, r=1
        // class 1: tp=1, fp=0, fn=1 -> p=1,   r=1/2
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 0, 0, 1];
        let report = evaluate(&y_true, &y_pred, 2);

        let p0: f64 = 2.0 / 3.0;
        let r0: f64 = 1.0;
        let p1: f64 = 1.0;
        let r1: f64 = 0.5;
        let f0: f64 = 2.0 * p0 * r0 / (p0 + r0);
        let f1: f64 = 2.0 * p1 * r1 / (p1 + r1);

        assert_eq!(report.accuracy, 75.0);
        assert!((report.precision - (p0 + p1) / 2.0 * 100.0).abs() < 1e-9);
        assert!((report.recall - (r0 + r1) / 2.0 * 100.0).abs() < 1e-9);
        assert!((report.f1_score - (f0 + f1) / 2.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn unpredicted_class_contributes_zero() {
        // class 2 never appears in y_pred and never in y_true
        let y_true = vec![0, 1];
        let y_pred = vec![0, 1];
        let report = evaluate(&y_true, &y_pred, 3);
        assert!((report.precision - 200.0 / 3.0).abs() < 1e-9);
        assert!((report.recall - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_range() {
        let y_true = vec![0, 1, 2, 3, 4, 0, 1, 2, 3, 4];
        let y_pred = vec![0, 2, 2, 3, 0, 0, 1, 1, 3, 4];
        let report = evaluate(&y_true, &y_pred, 5);
        for score in [report.accuracy, report.precision, report.recall, report.f1_score] {
            assert!((0.0..=100.0).contains(&score));
        }
    }
}
