//! Class rebalancing for discrete targets.

use serde::{Deserialize, Serialize};

/// Rebalancing policy applied before fitting a classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rebalance {
    /// Every sample weighs 1.
    None,
    /// Weight samples by `n / (k * count(class))` so each class carries the
    /// same total weight.
    #[default]
    Balanced,
}

impl Rebalance {
    /// Per-sample weights for class labels in `0..n_classes`.
    pub fn sample_weights(&self, labels: &[usize], n_classes: usize) -> Vec<f64> {
        match self {
            Rebalance::None => vec![1.0; labels.len()],
            Rebalance::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &label in labels {
                    if let Some(c) = counts.get_mut(label) {
                        *c += 1;
                    }
                }
                let present = counts.iter().filter(|&&c| c > 0).count().max(1);
                let n = labels.len() as f64;
                labels
                    .iter()
                    .map(|&label| match counts.get(label) {
                        Some(&c) if c > 0 => n / (present as f64 * c as f64),
                        _ => 0.0,
                    })
                    .collect()
            }
        }
    }
}

/// Standard deviation of per-class sample counts.
pub fn class_count_std(labels: &[usize], n_classes: usize) -> f64 {
    if n_classes == 0 {
        return 0.0;
    }
    let mut counts = vec![0.0; n_classes];
    for &label in labels {
        if let Some(c) = counts.get_mut(label) {
            *c += 1.0;
        }
    }
    let mean = counts.iter().sum::<f64>() / n_classes as f64;
    (counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n_classes as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_weights_equalize_classes() {
        let labels = vec![0, 0, 0, 1];
        let w = Rebalance::Balanced.sample_weights(&labels, 2);
        let class0: f64 = w[..3].iter().sum();
        assert!((class0 - w[3]).abs() < 1e-12);
        assert!((w.iter().sum::<f64>() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_rebalancing() {
        assert_eq!(Rebalance::None.sample_weights(&[0, 1, 1], 2), vec![1.0; 3]);
    }

    #[test]
    fn test_class_count_std() {
        assert_eq!(class_count_std(&[0, 1], 2), 0.0);
        assert!((class_count_std(&[0, 0, 0, 1], 2) - 1.0).abs() < 1e-12);
    }
}
