//! Update cost functions: distances between a current value and a repair candidate.

use std::fmt;

/// Pluggable distance between a current value and a candidate value.
///
/// Costs bias the repair selector toward plausible updates. An absent input on
/// either side yields an absent cost rather than an error.
pub trait UpdateCostFunction: Send + Sync {
    /// Attributes this function is scoped to; empty means every attribute.
    fn targets(&self) -> &[String];

    /// Distance between two present values.
    fn distance(&self, current: &str, candidate: &str) -> f64;

    /// Cost of updating `current` to `candidate`, or `None` if either is absent.
    fn compute(&self, current: Option<&str>, candidate: Option<&str>) -> Option<f64> {
        match (current, candidate) {
            (Some(x), Some(y)) => Some(self.distance(x, y)),
            _ => None,
        }
    }

    /// Whether this function should be applied to an attribute.
    fn applies_to(&self, attribute: &str) -> bool {
        let targets = self.targets();
        targets.is_empty() || targets.iter().any(|t| t == attribute)
    }

    /// Scoped cost: absent when the attribute is out of scope.
    fn compute_for(
        &self,
        attribute: &str,
        current: Option<&str>,
        candidate: Option<&str>,
    ) -> Option<f64> {
        if self.applies_to(attribute) {
            self.compute(current, candidate)
        } else {
            None
        }
    }
}

/// Edit distance between the string forms of two values.
#[derive(Debug, Clone, Default)]
pub struct Levenshtein {
    targets: Vec<String>,
}

impl Levenshtein {
    /// Levenshtein cost over every attribute.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the cost function to some attributes.
    pub fn with_targets(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }
}

impl UpdateCostFunction for Levenshtein {
    fn targets(&self) -> &[String] {
        &self.targets
    }

    fn distance(&self, current: &str, candidate: &str) -> f64 {
        levenshtein_distance(current, candidate) as f64
    }
}

impl fmt::Display for Levenshtein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.targets.is_empty() {
            write!(f, "Levenshtein()")
        } else {
            write!(f, "Levenshtein(targets={})", self.targets.join(","))
        }
    }
}

type DistanceFn = dyn Fn(&str, &str) -> f64 + Send + Sync;

/// Cost function backed by a user closure.
pub struct UserDefinedCost {
    f: Box<DistanceFn>,
    targets: Vec<String>,
}

impl UserDefinedCost {
    /// Wrap a distance closure.
    pub fn new(f: impl Fn(&str, &str) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            f: Box::new(f),
            targets: Vec::new(),
        }
    }

    /// Restrict the cost function to some attributes.
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }
}

impl UpdateCostFunction for UserDefinedCost {
    fn targets(&self) -> &[String] {
        &self.targets
    }

    fn distance(&self, current: &str, candidate: &str) -> f64 {
        (self.f)(current, candidate)
    }
}

impl fmt::Debug for UserDefinedCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDefinedCost")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

/// Calculate Levenshtein (edit) distance between two strings.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rolling rows of the edit matrix
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_values() {
        let f = Levenshtein::new();
        assert_eq!(f.compute(Some("111"), Some("123")), Some(2.0));
        assert_eq!(f.compute(Some("1.11"), Some("1.23")), Some(2.0));
        assert_eq!(f.compute(None, Some("123")), None);
        assert_eq!(f.compute(Some("111"), None), None);
        assert_eq!(f.compute(None, None), None);
    }

    #[test]
    fn test_levenshtein_orderings() {
        let f = Levenshtein::new();
        let d = |y| f.distance("1xx%", y);
        assert!(d("100%") < d("abcdefg"));
        assert_eq!(d("100%"), d("12%"));
        assert_eq!(d("100%"), d("1%"));
        assert!(d("100%") < d("2%"));
    }

    #[test]
    fn test_user_defined_cost() {
        let f = UserDefinedCost::new(|x, y| {
            (x.chars().count() as f64 - y.chars().count() as f64).abs()
                + levenshtein_distance(x, y) as f64
        });
        assert_eq!(f.compute(Some("111"), Some("123")), Some(2.0));
        assert!(f.distance("1xx%", "100%") < f.distance("1xx%", "12%"));
        assert_eq!(f.compute(Some("1"), None), None);
    }

    #[test]
    fn test_target_scoping() {
        let f = Levenshtein::with_targets(["city"]);
        assert!(f.applies_to("city"));
        assert!(!f.applies_to("zip"));
        assert_eq!(f.compute_for("zip", Some("a"), Some("b")), None);
        assert_eq!(f.compute_for("city", Some("a"), Some("b")), Some(1.0));
        assert_eq!(f.to_string(), "Levenshtein(targets=city)");
    }
}
