//! Domain models for salt-rules-service.

mod composite_rule;
mod distribution;
mod entity_type;
mod jurisdiction;
mod resolved_rule;
mod rule_set;
mod validation_issue;
mod withholding_rule;
mod workbook;

pub use composite_rule::{CompositeRule, NewCompositeRule};
pub use distribution::{Distribution, Investor, NewDistribution, NewInvestor, UploadSession};
pub use entity_type::EntityCode;
pub use jurisdiction::is_valid_state;
pub use resolved_rule::{NewResolvedRule, ResolvedRule};
pub use rule_set::{
    CreateRuleSet, PublishOutcome, Quarter, RuleSet, RuleSetDetail, RuleSetStatus,
    MAX_RULE_SET_YEAR, MIN_RULE_SET_YEAR,
};
pub use validation_issue::{
    Issue, IssueCode, IssueSeverity, ValidationIssue, ValidationReport, MAX_ISSUE_MESSAGE_LEN,
};
pub use withholding_rule::{NewWithholdingRule, WithholdingRule};
pub use workbook::{
    Workbook, Worksheet, COMPOSITE_COLUMNS, COMPOSITE_OPTIONAL_COLUMNS, COMPOSITE_SHEET,
    WITHHOLDING_COLUMNS, WITHHOLDING_SHEET,
};
