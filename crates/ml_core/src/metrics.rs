//! Regression error metrics

use serde::{Deserialize, Serialize};

/// Held-out evaluation of a trained model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Root-mean-squared error, >= 0
    pub rmse: f64,
    /// Coefficient of determination, <= 1
    pub r2: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

/// Mean squared error. Empty input yields 0.
pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    sum / y_true.len() as f64
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mse(y_true, y_pred).sqrt()
}

/// R² = 1 - SS_res / SS_tot.
///
/// Constant `y_true` gives 1.0 for a perfect fit and 0.0 otherwise.
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(rmse(&y, &y), 0.0);
        assert_eq!(r_squared(&y, &y), 1.0);
    }

    #[test]
    fn test_known_values() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let p = [2.0, 2.0, 3.0, 3.0];
        assert_eq!(mse(&y, &p), 0.5);
        assert!((rmse(&y, &p) - 0.5f64.sqrt()).abs() < 1e-12);
        // SS_tot = 5, SS_res = 2
        assert!((r_squared(&y, &p) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_mean_predictor_scores_zero() {
        let y = [1.0, 3.0];
        assert_eq!(r_squared(&y, &[2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = [1.0, 2.0, 3.0];
        assert!(r_squared(&y, &[3.0, 2.0, 1.0]) < 0.0);
    }

    #[test]
    fn test_constant_targets() {
        assert_eq!(r_squared(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r_squared(&[5.0, 5.0], &[4.0, 5.0]), 0.0);
    }
}
