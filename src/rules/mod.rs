//! Disease rule table for chest radiograph triage.
//!
//! One entry per supported finding: risk tier, confirmation threshold,
//! in-tier priority rank, localized name and follow-up recommendation.
//! The standard table is embedded TOML, parsed once and never mutated.
//!
//! # Example
//!
//! ```ignore
//! use pulmo_triage::rules::RuleTable;
//!
//! let table = RuleTable::standard();
//! let rule = table.get("Pneumothorax").unwrap();
//! assert_eq!(rule.threshold, 0.60);
//! ```

mod table;
mod types;

pub use table::{default_rules, load_rules, RuleTable, MIN_THRESHOLD};
pub use types::*;
