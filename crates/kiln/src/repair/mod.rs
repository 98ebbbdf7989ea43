//! Repair execution and selection.
//!
//! The [`RepairExecutor`] fills absent target cells of dirty rows with model
//! predictions (and, on request, per-cell distributions). The
//! [`RepairSelector`] turns those into committed repairs. [`RuleRepairer`]
//! resolves the cells simple rules can fix before any model is trained.

mod executor;
mod rules;
mod selector;

pub use executor::{Distributions, ExecutionOutput, RepairExecutor};
pub use rules::{RegexRule, RuleConfig, RuleRepairer};
pub use selector::{LikelihoodSelection, RepairPmf, RepairSelector, ScoredRepair, SelectionConfig};
