//! Column models: the trained predictor for one target column.
//!
//! A [`ColumnModel`] is one of three kinds, matched exhaustively at
//! prediction time:
//!
//! - [`ConstantModel`]: the column had at most one distinct training value,
//!   or fitting failed and a fallback was substituted.
//! - [`FunctionalDepModel`]: an exact lookup table from a source column.
//! - [`StatisticalModel`]: a gradient-boosted classifier or regressor over an
//!   encoded feature vector.
//!
//! Models are immutable once trained and serialize to JSON.

pub mod gbdt;
pub mod rebalance;
pub mod transform;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use gbdt::{BoostingParams, GbdtClassifier, GbdtRegressor};
pub use rebalance::Rebalance;
pub use transform::{FeatureKind, FeatureTransform};

/// Candidate values with their probabilities, most likely first.
pub type Distribution = Vec<(String, f64)>;

/// A single prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// A discrete class (or constant value).
    Class(String),
    /// A numeric regression output.
    Value(f64),
}

/// Always predicts the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantModel {
    /// The predicted value; `None` when the column had no known values.
    pub value: Option<String>,
}

/// Lookup table from a source column's value to the target value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionalDepModel {
    /// Column whose value determines the target.
    pub source: String,
    /// Observed source value → target value.
    pub mapping: IndexMap<String, String>,
    /// Distinct target values of the mapping, in first-seen order.
    pub classes: Vec<String>,
}

impl FunctionalDepModel {
    /// Build the mapping from `(source, target)` observations.
    ///
    /// Conflicting observations resolve to the most frequent target, the
    /// first one seen on ties.
    pub fn fit<'a>(
        source: impl Into<String>,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut counts: IndexMap<&str, IndexMap<&str, usize>> = IndexMap::new();
        for (x, y) in pairs {
            *counts.entry(x).or_default().entry(y).or_insert(0) += 1;
        }

        let mut mapping = IndexMap::new();
        for (x, targets) in &counts {
            let mut best: Option<(&str, usize)> = None;
            for (&y, &n) in targets {
                if best.is_none_or(|(_, b)| n > b) {
                    best = Some((y, n));
                }
            }
            if let Some((y, _)) = best {
                mapping.insert(x.to_string(), y.to_string());
            }
        }

        let mut classes: Vec<String> = Vec::new();
        for y in mapping.values() {
            if !classes.contains(y) {
                classes.push(y.clone());
            }
        }

        Self {
            source: source.into(),
            mapping,
            classes,
        }
    }

    fn lookup(&self, source_value: Option<&str>) -> Option<&String> {
        source_value.and_then(|v| self.mapping.get(v))
    }
}

/// The fitted learner inside a statistical model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predictor {
    /// Discrete target; `classes[i]` is the label of class index `i`.
    Classifier {
        classes: Vec<String>,
        model: GbdtClassifier,
    },
    /// Continuous target.
    Regressor { model: GbdtRegressor },
}

/// A trained learner with its feature list and transform pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalModel {
    /// The fitted learner.
    pub predictor: Predictor,
    /// Feature columns, in the order the transforms index them.
    pub features: Vec<String>,
    /// Fitted transforms applied in order before predicting.
    pub transforms: Vec<FeatureTransform>,
}

impl StatisticalModel {
    fn encode(&self, features: &[Option<&str>]) -> Vec<f64> {
        transform::encode(&self.transforms, features)
    }
}

/// Trained model for one target column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ColumnModel {
    Constant(ConstantModel),
    FunctionalDep(FunctionalDepModel),
    Statistical(StatisticalModel),
}

impl ColumnModel {
    /// A constant model.
    pub fn constant(value: Option<String>) -> Self {
        ColumnModel::Constant(ConstantModel { value })
    }

    /// Short name of the model kind, used in logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ColumnModel::Constant(_) => "constant",
            ColumnModel::FunctionalDep(_) => "functional_dependency",
            ColumnModel::Statistical(_) => "statistical",
        }
    }

    /// Columns whose values this model reads, in the order it expects them.
    pub fn features(&self) -> Vec<&str> {
        match self {
            ColumnModel::Constant(_) => Vec::new(),
            ColumnModel::FunctionalDep(m) => vec![m.source.as_str()],
            ColumnModel::Statistical(m) => m.features.iter().map(String::as_str).collect(),
        }
    }

    /// Source column of a functional-dependency model.
    pub fn fd_source(&self) -> Option<&str> {
        match self {
            ColumnModel::FunctionalDep(m) => Some(&m.source),
            _ => None,
        }
    }

    /// Whether the model outputs numbers rather than classes.
    pub fn is_regressor(&self) -> bool {
        matches!(
            self,
            ColumnModel::Statistical(StatisticalModel {
                predictor: Predictor::Regressor { .. },
                ..
            })
        )
    }

    /// Predict one value from feature values aligned with [`Self::features`].
    pub fn predict(&self, features: &[Option<&str>]) -> Option<Prediction> {
        match self {
            ColumnModel::Constant(m) => m.value.clone().map(Prediction::Class),
            ColumnModel::FunctionalDep(m) => m
                .lookup(features.first().copied().flatten())
                .cloned()
                .map(Prediction::Class),
            ColumnModel::Statistical(m) => {
                let x = m.encode(features);
                Some(match &m.predictor {
                    Predictor::Classifier { classes, model } => {
                        Prediction::Class(classes[model.predict(&x)].clone())
                    }
                    Predictor::Regressor { model } => Prediction::Value(model.predict(&x)),
                })
            }
        }
    }

    /// Probability for every class, in class order.
    ///
    /// Regressors and absent constants have no distribution.
    pub fn predict_proba(&self, features: &[Option<&str>]) -> Option<Distribution> {
        match self {
            ColumnModel::Constant(m) => m.value.clone().map(|v| vec![(v, 1.0)]),
            ColumnModel::FunctionalDep(m) => {
                if m.classes.is_empty() {
                    return None;
                }
                let dist = match m.lookup(features.first().copied().flatten()) {
                    Some(target) => m
                        .classes
                        .iter()
                        .map(|c| (c.clone(), if c == target { 1.0 } else { 0.0 }))
                        .collect(),
                    None => {
                        let p = 1.0 / m.classes.len() as f64;
                        m.classes.iter().map(|c| (c.clone(), p)).collect()
                    }
                };
                Some(dist)
            }
            ColumnModel::Statistical(m) => match &m.predictor {
                Predictor::Classifier { classes, model } => {
                    let probs = model.predict_proba(&m.encode(features));
                    Some(classes.iter().cloned().zip(probs).collect())
                }
                Predictor::Regressor { .. } => None,
            },
        }
    }

    /// [`Self::predict`] and [`Self::predict_proba`] together, evaluating a
    /// boosted classifier once and reading the class off its distribution.
    pub fn predict_with_proba(&self, features: &[Option<&str>]) -> (Option<Prediction>, Option<Distribution>) {
        if let ColumnModel::Statistical(m) = self {
            if let Predictor::Classifier { classes, model } = &m.predictor {
                let probs = model.predict_proba(&m.encode(features));
                let prediction = classes.get(gbdt::argmax(&probs)).cloned().map(Prediction::Class);
                return (prediction, Some(classes.iter().cloned().zip(probs).collect()));
            }
        }
        (self.predict(features), self.predict_proba(features))
    }

    /// Class labels the model can emit.
    pub fn classes(&self) -> Vec<&str> {
        match self {
            ColumnModel::Constant(m) => m.value.as_deref().into_iter().collect(),
            ColumnModel::FunctionalDep(m) => m.classes.iter().map(String::as_str).collect(),
            ColumnModel::Statistical(m) => match &m.predictor {
                Predictor::Classifier { classes, .. } => {
                    classes.iter().map(String::as_str).collect()
                }
                Predictor::Regressor { .. } => Vec::new(),
            },
        }
    }
}
