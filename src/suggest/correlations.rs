//! Parameter/score correlation with significance filtering
//!
//! Pearson correlation between retention parameters and total score, with
//! p-values from the Student's t-distribution (statrs). Non-significant
//! correlations (p ≥ 0.05) are dropped.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-tailed significance threshold.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Minimum joined samples for a meaningful correlation.
pub const MIN_SAMPLES: usize = 8;

/// A statistically significant parameter/score correlation.
#[derive(Debug, Clone, Serialize)]
pub struct ParamCorrelation {
    pub param: String,
    pub r_value: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub sample_count: usize,
}

/// Calculate the correlation between one parameter and the total score.
/// Returns `None` below the sample floor or above the significance
/// threshold.
pub fn calculate(x: &[f64], y: &[f64], param: &str) -> Option<ParamCorrelation> {
    let n = x.len();
    if n < MIN_SAMPLES || n != y.len() {
        return None;
    }

    let r = pearson(x, y);
    let p_value = p_value_for_r(r, n);
    if p_value >= SIGNIFICANCE_THRESHOLD {
        return None;
    }

    Some(ParamCorrelation {
        param: param.to_string(),
        r_value: r,
        r_squared: r * r,
        p_value,
        sample_count: n,
    })
}

/// Pearson correlation coefficient.
///
/// r = Σ[(xi - x̄)(yi - ȳ)] / sqrt(Σ(xi - x̄)² × Σ(yi - ȳ)²)
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|a| a * a).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x.powi(2)) * (n * sum_y2 - sum_y.powi(2))).sqrt();

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Two-tailed p-value via t = r·sqrt(n-2)/sqrt(1-r²) with n-2 degrees of
/// freedom.
pub fn p_value_for_r(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 0.9999 {
        return 0.0;
    }

    let df = (n - 2) as f64;
    let t_stat = r * df.sqrt() / (1.0 - r * r).sqrt();

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => 2.0 * (1.0 - t_dist.cdf(t_stat.abs())),
        Err(_) => 1.0,
    }
}

/// Population standard deviation.
pub fn stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_positive_correlation() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y = x.clone();
        let corr = calculate(&x, &y, "cut_aggression").unwrap();
        assert!((corr.r_value - 1.0).abs() < 0.001);
        assert!(corr.p_value < 0.05);
    }

    #[test]
    fn perfect_negative_correlation() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 100.0 - v).collect();
        let corr = calculate(&x, &y, "jank_guard").unwrap();
        assert!((corr.r_value + 1.0).abs() < 0.001);
    }

    #[test]
    fn constant_parameter_has_zero_correlation() {
        let x = vec![62.0; 40];
        let y: Vec<f64> = (0..40).map(|i| 50.0 + i as f64).collect();
        assert_eq!(pearson(&x, &y), 0.0);
        assert!(calculate(&x, &y, "cut_aggression").is_none());
    }

    #[test]
    fn insufficient_samples_rejected() {
        let x: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let y = x.clone();
        assert!(calculate(&x, &y, "cut_aggression").is_none());
    }

    #[test]
    fn weak_correlation_filtered_by_p_value() {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 50.0 } else { 50.5 })
            .collect();
        assert!(calculate(&x, &y, "cut_aggression").is_none());
    }

    #[test]
    fn p_value_reference_points() {
        let p = p_value_for_r(0.5, 30);
        assert!(p < 0.01 && p > 0.001, "r=0.5 n=30 => p={p}");
        let p = p_value_for_r(0.2, 30);
        assert!(p > 0.2, "r=0.2 n=30 => p={p}");
    }
}
