//! Services module for salt-rules-service.

pub mod calculation;
pub mod comparison;
pub mod converter;
pub mod database;
pub mod lifecycle;
pub mod materializer;
pub mod metrics;
pub mod validator;

pub use calculation::{calculate_taxes, CalculationService, RuleLookups, TaxAmounts};
pub use comparison::{compare_rule_sets, RuleSetComparison};
pub use converter::ConvertedRules;
pub use database::Database;
pub use lifecycle::{LifecycleError, RuleSetManager};
pub use materializer::materialize_resolved_rules;
pub use metrics::{get_metrics, init_metrics};
pub use validator::validate_workbook;
