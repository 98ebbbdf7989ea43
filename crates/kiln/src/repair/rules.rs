//! Rule-based repairs applied before any model is trained.
//!
//! Two rules are supported: regular-expression corrections of a value, and
//! substitution by the nearest known value of the column when it is close
//! enough and unambiguous.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cells::{Cell, ErrorCells, Repair};
use crate::cost::UpdateCostFunction;
use crate::error::Result;
use crate::input::DataTable;

/// Rewrite values of one attribute matching a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexRule {
    /// Attribute the rule applies to.
    pub attribute: String,
    /// Pattern to match.
    pub pattern: String,
    /// Replacement, with `$1`-style group references.
    pub replacement: String,
}

/// Rule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Regular-expression corrections, tried in order.
    pub regex_rules: Vec<RegexRule>,
    /// Substitute the nearest known value when it is close enough.
    pub nearest_value: bool,
    /// Nearest values must cost strictly less than this.
    pub merge_threshold: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            regex_rules: Vec::new(),
            nearest_value: false,
            merge_threshold: 2.0,
        }
    }
}

impl RuleConfig {
    /// Whether any rule is configured.
    pub fn is_enabled(&self) -> bool {
        self.nearest_value || !self.regex_rules.is_empty()
    }
}

/// Applies the configured rules to error cells.
pub struct RuleRepairer<'a> {
    rules: Vec<(String, Regex, String)>,
    nearest_value: bool,
    merge_threshold: f64,
    cost: &'a dyn UpdateCostFunction,
}

impl<'a> RuleRepairer<'a> {
    /// Compile the rules; an invalid pattern is an error.
    pub fn new(config: &RuleConfig, cost: &'a dyn UpdateCostFunction) -> Result<Self> {
        let rules = config
            .regex_rules
            .iter()
            .map(|r| Ok((r.attribute.clone(), Regex::new(&r.pattern)?, r.replacement.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            nearest_value: config.nearest_value,
            merge_threshold: config.merge_threshold,
            cost,
        })
    }

    /// Resolve whatever cells the rules can.
    ///
    /// `clean` supplies the known values of each attribute for nearest-value
    /// substitution. Cells without a current value are never touched.
    pub fn repair(&self, cells: &ErrorCells, clean: &DataTable) -> Result<Vec<Repair>> {
        let mut repairs = Vec::new();
        let mut by_regex = 0;
        let mut by_nearest = 0;
        let mut known: IndexMap<&str, Vec<&str>> = IndexMap::new();

        for cell in cells.iter() {
            let Some(current) = cell.current_value.as_deref() else {
                continue;
            };
            if let Some(fixed) = self.apply_regex(&cell.attribute, current) {
                repairs.push(Repair::for_cell(cell, Some(fixed)));
                by_regex += 1;
                continue;
            }
            if self.nearest_value {
                if !known.contains_key(cell.attribute.as_str()) {
                    let col = clean.require_column(&cell.attribute)?;
                    known.insert(cell.attribute.as_str(), clean.distinct_values(col));
                }
                if let Some(nearest) = self.nearest(cell, current, &known[cell.attribute.as_str()]) {
                    repairs.push(Repair::for_cell(cell, Some(nearest)));
                    by_nearest += 1;
                }
            }
        }

        info!(
            "[Rule-based Repair Phase] {} cells fixed by regex rules and {} by nearest values",
            by_regex, by_nearest
        );
        Ok(repairs)
    }

    fn apply_regex(&self, attribute: &str, current: &str) -> Option<String> {
        self.rules
            .iter()
            .filter(|(attr, _, _)| attr == attribute)
            .find_map(|(_, re, replacement)| {
                let fixed = re.replace_all(current, replacement.as_str());
                (fixed != current).then(|| fixed.into_owned())
            })
    }

    /// Known value with the lowest cost, if it beats the merge threshold and
    /// the runner-up.
    fn nearest(&self, cell: &Cell, current: &str, known: &[&str]) -> Option<String> {
        let mut best: Option<(&str, f64)> = None;
        let mut second: Option<f64> = None;
        for &candidate in known {
            if candidate == current {
                continue;
            }
            let Some(cost) = self.cost.compute_for(&cell.attribute, Some(current), Some(candidate)) else {
                continue;
            };
            match best {
                Some((_, b)) if cost >= b => {
                    if second.is_none_or(|s| cost < s) {
                        second = Some(cost);
                    }
                }
                _ => {
                    second = best.map(|(_, b)| b);
                    best = Some((candidate, cost));
                }
            }
        }

        let (value, cost) = best?;
        let unambiguous = second.is_none_or(|s| cost < s);
        debug!(
            row = cell.row_id.as_str(),
            attribute = cell.attribute.as_str(),
            candidate = value,
            cost,
            unambiguous,
            "nearest known value"
        );
        (cost < self.merge_threshold && unambiguous).then(|| value.to_string())
    }
}
