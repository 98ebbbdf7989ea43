//! Feature transforms: raw cell values to a dense numeric vector.
//!
//! Transforms are fitted once on the training rows and stored with the model.
//! Encoding walks the transform list in order, so a fitted pipeline produces
//! the same layout at training and inference time.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// One fitted transform over a subset of the model's features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureTransform {
    /// Sum (deviation) coding for small domains: `k` levels become `k - 1`
    /// columns; the last level is all `-1`, unknown values are all `0`.
    SumCoding {
        features: Vec<usize>,
        levels: Vec<IndexSet<String>>,
    },
    /// Ordinal codes `1..=k` for large domains; unknown values map to `-1`
    /// and absent values to `-2`.
    Ordinal {
        features: Vec<usize>,
        levels: Vec<IndexSet<String>>,
    },
    /// Numeric features passed through; unparsable or absent values are NaN.
    Passthrough { features: Vec<usize> },
}

impl FeatureTransform {
    fn encode_into(&self, values: &[Option<&str>], out: &mut Vec<f64>) {
        let value = |i: usize| values.get(i).copied().flatten();
        match self {
            FeatureTransform::SumCoding { features, levels } => {
                for (&f, levels) in features.iter().zip(levels) {
                    let width = levels.len().saturating_sub(1);
                    let start = out.len();
                    out.resize(start + width, 0.0);
                    match value(f).and_then(|v| levels.get_index_of(v)) {
                        Some(idx) if idx < width => out[start + idx] = 1.0,
                        Some(_) => out[start..].fill(-1.0),
                        None => {}
                    }
                }
            }
            FeatureTransform::Ordinal { features, levels } => {
                for (&f, levels) in features.iter().zip(levels) {
                    let code = match value(f) {
                        Some(v) => levels.get_index_of(v).map_or(-1.0, |i| (i + 1) as f64),
                        None => -2.0,
                    };
                    out.push(code);
                }
            }
            FeatureTransform::Passthrough { features } => {
                out.extend(features.iter().map(|&f| {
                    value(f)
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                }));
            }
        }
    }

    /// Number of encoded columns this transform produces.
    pub fn width(&self) -> usize {
        match self {
            FeatureTransform::SumCoding { levels, .. } => {
                levels.iter().map(|l| l.len().saturating_sub(1)).sum()
            }
            FeatureTransform::Ordinal { features, .. }
            | FeatureTransform::Passthrough { features } => features.len(),
        }
    }
}

/// How a feature is treated when the pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Numeric feature, passed through.
    Continuous,
    /// Categorical feature with the given domain size.
    Discrete { domain_size: usize },
}

/// Fit the transform pipeline for a feature list.
///
/// `rows` holds the raw feature values of each training row, positionally
/// aligned with `kinds`. Discrete features with fewer than
/// `small_domain_threshold` distinct values are sum-coded, the other discrete
/// features are ordinal-coded, continuous features pass through. The pipeline
/// is always sum coding, then ordinal, then passthrough; empty stages are
/// omitted.
pub fn fit_transforms(
    kinds: &[FeatureKind],
    rows: &[Vec<Option<&str>>],
    small_domain_threshold: usize,
) -> Vec<FeatureTransform> {
    let mut sum_features = Vec::new();
    let mut ordinal_features = Vec::new();
    let mut numeric = Vec::new();
    for (idx, kind) in kinds.iter().enumerate() {
        match kind {
            FeatureKind::Continuous => numeric.push(idx),
            FeatureKind::Discrete { domain_size } if *domain_size < small_domain_threshold => {
                sum_features.push(idx)
            }
            FeatureKind::Discrete { .. } => ordinal_features.push(idx),
        }
    }

    let levels_of = |features: &[usize]| -> Vec<IndexSet<String>> {
        features
            .iter()
            .map(|&f| {
                rows.iter()
                    .filter_map(|row| row.get(f).copied().flatten())
                    .map(str::to_string)
                    .collect()
            })
            .collect()
    };

    let mut transforms = Vec::new();
    if !sum_features.is_empty() {
        let levels = levels_of(&sum_features);
        transforms.push(FeatureTransform::SumCoding {
            features: sum_features,
            levels,
        });
    }
    if !ordinal_features.is_empty() {
        let levels = levels_of(&ordinal_features);
        transforms.push(FeatureTransform::Ordinal {
            features: ordinal_features,
            levels,
        });
    }
    if !numeric.is_empty() {
        transforms.push(FeatureTransform::Passthrough { features: numeric });
    }
    transforms
}

/// Encode one row with a fitted pipeline.
pub fn encode(transforms: &[FeatureTransform], values: &[Option<&str>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(transforms.iter().map(FeatureTransform::width).sum());
    for transform in transforms {
        transform.encode_into(values, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<Option<&'static str>>> {
        vec![
            vec![Some("a"), Some("x1"), Some("1.5")],
            vec![Some("b"), Some("x2"), None],
            vec![Some("c"), Some("x3"), Some("2")],
        ]
    }

    fn kinds() -> Vec<FeatureKind> {
        vec![
            FeatureKind::Discrete { domain_size: 3 },
            FeatureKind::Discrete { domain_size: 30 },
            FeatureKind::Continuous,
        ]
    }

    #[test]
    fn test_pipeline_order() {
        let transforms = fit_transforms(&kinds(), &rows(), 12);
        assert_eq!(transforms.len(), 3);
        assert!(matches!(transforms[0], FeatureTransform::SumCoding { .. }));
        assert!(matches!(transforms[1], FeatureTransform::Ordinal { .. }));
        assert!(matches!(transforms[2], FeatureTransform::Passthrough { .. }));
    }

    #[test]
    fn test_encoding_layout() {
        let transforms = fit_transforms(&kinds(), &rows(), 12);
        assert_eq!(encode(&transforms, &[Some("a"), Some("x2"), Some("3")]), vec![1.0, 0.0, 2.0, 3.0]);
        assert_eq!(encode(&transforms, &[Some("c"), Some("x1"), None])[..3], [-1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_unknown_values_are_imputed() {
        let transforms = fit_transforms(&kinds(), &rows(), 12);
        let encoded = encode(&transforms, &[Some("zzz"), Some("unseen"), None]);
        assert_eq!(&encoded[..3], &[0.0, 0.0, -1.0]);
        assert!(encoded[3].is_nan());

        let absent = encode(&transforms, &[None, None, None]);
        assert_eq!(absent[2], -2.0);
    }

    #[test]
    fn test_small_domain_threshold_controls_encoding() {
        let transforms = fit_transforms(&kinds(), &rows(), 2);
        assert!(matches!(transforms[0], FeatureTransform::Ordinal { .. }));
        assert_eq!(transforms[0].width(), 2);
    }
}
