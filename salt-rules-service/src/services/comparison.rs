//! Rule-set comparison: the pre-publish diff of two rule collections.

use crate::models::{CompositeRule, WithholdingRule};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Which rule collection a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Withholding,
    Composite,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Withholding => "withholding",
            RuleKind::Composite => "composite",
        }
    }
}

/// One tracked field that differs between baseline and target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub description: String,
}

/// One added, modified, or removed rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleChange {
    pub rule_kind: RuleKind,
    pub state_code: String,
    pub entity_type: String,
    pub field_changes: Vec<FieldChange>,
}

/// Tallies over the whole comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub fields_changed: usize,
}

/// Full diff of a target rule set against a baseline. Identical rules are
/// omitted entirely.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSetComparison {
    pub added: Vec<RuleChange>,
    pub modified: Vec<RuleChange>,
    pub removed: Vec<RuleChange>,
    pub summary: ComparisonSummary,
}

/// Compare the target collections against the baseline collections. An
/// absent baseline compares against empty collections, so every target
/// rule classifies as added.
pub fn compare_rule_sets(
    target_withholding: &[WithholdingRule],
    target_composite: &[CompositeRule],
    baseline_withholding: &[WithholdingRule],
    baseline_composite: &[CompositeRule],
) -> RuleSetComparison {
    let mut comparison = RuleSetComparison {
        added: Vec::new(),
        modified: Vec::new(),
        removed: Vec::new(),
        summary: ComparisonSummary::default(),
    };

    diff_collection(
        RuleKind::Withholding,
        target_withholding,
        baseline_withholding,
        withholding_field_changes,
        &mut comparison,
    );
    diff_collection(
        RuleKind::Composite,
        target_composite,
        baseline_composite,
        composite_field_changes,
        &mut comparison,
    );

    comparison.summary.added = comparison.added.len();
    comparison.summary.modified = comparison.modified.len();
    comparison.summary.removed = comparison.removed.len();
    comparison.summary.fields_changed = comparison
        .modified
        .iter()
        .map(|change| change.field_changes.len())
        .sum();

    comparison
}

trait KeyedRule {
    fn key(&self) -> (String, String);
}

impl KeyedRule for WithholdingRule {
    fn key(&self) -> (String, String) {
        (self.state_code.clone(), self.entity_type.clone())
    }
}

impl KeyedRule for CompositeRule {
    fn key(&self) -> (String, String) {
        (self.state_code.clone(), self.entity_type.clone())
    }
}

fn diff_collection<R: KeyedRule>(
    kind: RuleKind,
    target: &[R],
    baseline: &[R],
    field_changes: fn(&R, &R) -> Vec<FieldChange>,
    comparison: &mut RuleSetComparison,
) {
    let target_by_key: BTreeMap<(String, String), &R> =
        target.iter().map(|rule| (rule.key(), rule)).collect();
    let baseline_by_key: BTreeMap<(String, String), &R> =
        baseline.iter().map(|rule| (rule.key(), rule)).collect();

    for ((state, entity), rule) in &target_by_key {
        match baseline_by_key.get(&(state.clone(), entity.clone())) {
            None => comparison.added.push(RuleChange {
                rule_kind: kind,
                state_code: state.clone(),
                entity_type: entity.clone(),
                field_changes: Vec::new(),
            }),
            Some(old) => {
                let changes = field_changes(old, rule);
                if !changes.is_empty() {
                    comparison.modified.push(RuleChange {
                        rule_kind: kind,
                        state_code: state.clone(),
                        entity_type: entity.clone(),
                        field_changes: changes,
                    });
                }
            }
        }
    }

    for ((state, entity), _) in &baseline_by_key {
        if !target_by_key.contains_key(&(state.clone(), entity.clone())) {
            comparison.removed.push(RuleChange {
                rule_kind: kind,
                state_code: state.clone(),
                entity_type: entity.clone(),
                field_changes: Vec::new(),
            });
        }
    }
}

fn withholding_field_changes(old: &WithholdingRule, new: &WithholdingRule) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    push_rate_change(&mut changes, "TaxRate", old.tax_rate, new.tax_rate);
    push_money_change(
        &mut changes,
        "IncomeThreshold",
        Some(old.income_threshold),
        Some(new.income_threshold),
    );
    push_money_change(&mut changes, "TaxThreshold", old.tax_threshold, new.tax_threshold);
    changes
}

fn composite_field_changes(old: &CompositeRule, new: &CompositeRule) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    push_rate_change(&mut changes, "TaxRate", old.tax_rate, new.tax_rate);
    push_money_change(
        &mut changes,
        "IncomeThreshold",
        Some(old.income_threshold),
        Some(new.income_threshold),
    );
    if old.mandatory_filing != new.mandatory_filing {
        changes.push(FieldChange {
            field: "MandatoryFiling".to_string(),
            old_value: Some(old.mandatory_filing.to_string()),
            new_value: Some(new.mandatory_filing.to_string()),
            description: format!(
                "MandatoryFiling changed from {} to {}",
                old.mandatory_filing, new.mandatory_filing
            ),
        });
    }
    push_money_change(&mut changes, "MinTaxAmount", old.min_tax_amount, new.min_tax_amount);
    push_money_change(&mut changes, "MaxTaxAmount", old.max_tax_amount, new.max_tax_amount);
    changes
}

fn push_rate_change(changes: &mut Vec<FieldChange>, field: &str, old: Decimal, new: Decimal) {
    if old != new {
        changes.push(FieldChange {
            field: field.to_string(),
            old_value: Some(old.to_string()),
            new_value: Some(new.to_string()),
            description: format!(
                "{} changed from {} to {}",
                field,
                format_percent(old),
                format_percent(new)
            ),
        });
    }
}

fn push_money_change(
    changes: &mut Vec<FieldChange>,
    field: &str,
    old: Option<Decimal>,
    new: Option<Decimal>,
) {
    if old != new {
        changes.push(FieldChange {
            field: field.to_string(),
            old_value: old.map(|v| v.to_string()),
            new_value: new.map(|v| v.to_string()),
            description: format!(
                "{} changed from {} to {}",
                field,
                format_money_opt(old),
                format_money_opt(new)
            ),
        });
    }
}

fn format_percent(rate: Decimal) -> String {
    format!("{:.2}%", rate * Decimal::ONE_HUNDRED)
}

fn format_money_opt(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("${:.2}", v),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn withholding(state: &str, entity: &str, rate: Decimal) -> WithholdingRule {
        WithholdingRule {
            rule_id: Uuid::new_v4(),
            rule_set_id: Uuid::new_v4(),
            state_code: state.to_string(),
            entity_type: entity.to_string(),
            tax_rate: rate,
            income_threshold: Decimal::new(500, 0),
            tax_threshold: Some(Decimal::ZERO),
            created_utc: Utc::now(),
        }
    }

    fn composite(state: &str, entity: &str, rate: Decimal, mandatory: bool) -> CompositeRule {
        CompositeRule {
            rule_id: Uuid::new_v4(),
            rule_set_id: Uuid::new_v4(),
            state_code: state.to_string(),
            entity_type: entity.to_string(),
            tax_rate: rate,
            income_threshold: Decimal::new(1000, 0),
            mandatory_filing: mandatory,
            min_tax_amount: None,
            max_tax_amount: None,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn identical_collections_compare_empty() {
        let w = vec![withholding("NY", "Partnership", Decimal::new(5, 2))];
        let c = vec![composite("NY", "Partnership", Decimal::new(625, 4), true)];

        let comparison = compare_rule_sets(&w, &c, &w, &c);
        assert!(comparison.added.is_empty());
        assert!(comparison.modified.is_empty());
        assert!(comparison.removed.is_empty());
        assert_eq!(comparison.summary, ComparisonSummary::default());
    }

    #[test]
    fn absent_baseline_classifies_everything_added() {
        let w = vec![
            withholding("NY", "Partnership", Decimal::new(5, 2)),
            withholding("CA", "Trust", Decimal::new(7, 2)),
        ];
        let c = vec![composite("NY", "Partnership", Decimal::new(625, 4), true)];

        let comparison = compare_rule_sets(&w, &c, &[], &[]);
        assert_eq!(comparison.summary.added, 3);
        assert_eq!(comparison.summary.modified, 0);
        assert_eq!(comparison.summary.removed, 0);
    }

    #[test]
    fn removed_rules_come_from_baseline_only_keys() {
        let baseline = vec![
            withholding("NY", "Partnership", Decimal::new(5, 2)),
            withholding("CA", "Trust", Decimal::new(7, 2)),
        ];
        let target = vec![withholding("NY", "Partnership", Decimal::new(5, 2))];

        let comparison = compare_rule_sets(&target, &[], &baseline, &[]);
        assert_eq!(comparison.summary.removed, 1);
        assert_eq!(comparison.removed[0].state_code, "CA");
        assert_eq!(comparison.removed[0].rule_kind, RuleKind::Withholding);
    }

    #[test]
    fn modified_rule_lists_each_changed_field() {
        let old = vec![withholding("NY", "Partnership", Decimal::new(5, 2))];
        let mut new_rule = withholding("NY", "Partnership", Decimal::new(625, 4));
        new_rule.income_threshold = Decimal::new(750, 0);
        let new = vec![new_rule];

        let comparison = compare_rule_sets(&new, &[], &old, &[]);
        assert_eq!(comparison.summary.modified, 1);
        assert_eq!(comparison.summary.fields_changed, 2);

        let fields: Vec<&str> = comparison.modified[0]
            .field_changes
            .iter()
            .map(|c| c.field.as_str())
            .collect();
        assert_eq!(fields, vec!["TaxRate", "IncomeThreshold"]);

        let rate_change = &comparison.modified[0].field_changes[0];
        assert_eq!(
            rate_change.description,
            "TaxRate changed from 5.00% to 6.25%"
        );
    }

    #[test]
    fn mandatory_filing_flip_is_a_modification() {
        let old = vec![composite("NY", "Partnership", Decimal::new(625, 4), true)];
        let new = vec![composite("NY", "Partnership", Decimal::new(625, 4), false)];

        let comparison = compare_rule_sets(&[], &new, &[], &old);
        assert_eq!(comparison.summary.modified, 1);
        let change = &comparison.modified[0].field_changes[0];
        assert_eq!(change.field, "MandatoryFiling");
        assert_eq!(change.description, "MandatoryFiling changed from true to false");
    }

    #[test]
    fn optional_money_fields_format_none() {
        let old = vec![composite("NY", "Partnership", Decimal::new(625, 4), true)];
        let mut updated = composite("NY", "Partnership", Decimal::new(625, 4), true);
        updated.min_tax_amount = Some(Decimal::new(2500, 2));
        let new = vec![updated];

        let comparison = compare_rule_sets(&[], &new, &[], &old);
        let change = &comparison.modified[0].field_changes[0];
        assert_eq!(change.field, "MinTaxAmount");
        assert_eq!(change.old_value, None);
        assert_eq!(
            change.description,
            "MinTaxAmount changed from none to $25.00"
        );
    }
}
