//! Resolved-rule materialization: the denormalized withholding + composite
//! join rebuilt on every publish.

use crate::models::{CompositeRule, NewResolvedRule, RuleSet, WithholdingRule};
use std::collections::BTreeMap;

/// Build one resolved rule per (state, entity) key present in BOTH rule
/// collections. Keys held by only one collection produce nothing; the
/// calculator tolerates partial coverage via live lookups.
pub fn materialize_resolved_rules(
    rule_set: &RuleSet,
    withholding: &[WithholdingRule],
    composite: &[CompositeRule],
) -> Vec<NewResolvedRule> {
    let composite_by_key: BTreeMap<(&str, &str), &CompositeRule> = composite
        .iter()
        .map(|rule| ((rule.state_code.as_str(), rule.entity_type.as_str()), rule))
        .collect();

    // BTreeMap keeps output order deterministic across publishes.
    let withholding_by_key: BTreeMap<(&str, &str), &WithholdingRule> = withholding
        .iter()
        .map(|rule| ((rule.state_code.as_str(), rule.entity_type.as_str()), rule))
        .collect();

    withholding_by_key
        .into_iter()
        .filter_map(|(key, w)| {
            composite_by_key.get(&key).map(|c| NewResolvedRule {
                state_code: w.state_code.clone(),
                entity_type: w.entity_type.clone(),
                withholding_tax_rate: w.tax_rate,
                withholding_income_threshold: w.income_threshold,
                withholding_tax_threshold: w.tax_threshold,
                composite_tax_rate: c.tax_rate,
                composite_income_threshold: c.income_threshold,
                mandatory_filing: c.mandatory_filing,
                min_tax_amount: c.min_tax_amount,
                max_tax_amount: c.max_tax_amount,
                effective_date: rule_set.effective_date,
                expiration_date: rule_set.expiration_date,
                withholding_rule_id: w.rule_id,
                composite_rule_id: c.rule_id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn rule_set() -> RuleSet {
        RuleSet {
            rule_set_id: Uuid::new_v4(),
            year: 2026,
            quarter: "Q1".to_string(),
            version: "1.0.0".to_string(),
            status: "draft".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            expiration_date: None,
            created_utc: Utc::now(),
            published_utc: None,
            created_by: "tester".to_string(),
            description: None,
            rule_count_withholding: 0,
            rule_count_composite: 0,
            source_file_name: None,
            source_file_hash: None,
        }
    }

    fn withholding(state: &str, entity: &str) -> WithholdingRule {
        WithholdingRule {
            rule_id: Uuid::new_v4(),
            rule_set_id: Uuid::new_v4(),
            state_code: state.to_string(),
            entity_type: entity.to_string(),
            tax_rate: Decimal::new(5, 2),
            income_threshold: Decimal::new(500, 0),
            tax_threshold: Some(Decimal::ZERO),
            created_utc: Utc::now(),
        }
    }

    fn composite(state: &str, entity: &str) -> CompositeRule {
        CompositeRule {
            rule_id: Uuid::new_v4(),
            rule_set_id: Uuid::new_v4(),
            state_code: state.to_string(),
            entity_type: entity.to_string(),
            tax_rate: Decimal::new(625, 4),
            income_threshold: Decimal::new(1000, 0),
            mandatory_filing: true,
            min_tax_amount: None,
            max_tax_amount: Some(Decimal::new(10000, 0)),
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn only_intersection_keys_materialize() {
        let rs = rule_set();
        let w = vec![
            withholding("NY", "Partnership"),
            withholding("CA", "Trust"),
            withholding("TX", "Individual"),
        ];
        let c = vec![
            composite("NY", "Partnership"),
            composite("CA", "Trust"),
            composite("FL", "Estate"),
        ];

        let resolved = materialize_resolved_rules(&rs, &w, &c);
        assert_eq!(resolved.len(), 2);
        let keys: Vec<(&str, &str)> = resolved
            .iter()
            .map(|r| (r.state_code.as_str(), r.entity_type.as_str()))
            .collect();
        assert_eq!(keys, vec![("CA", "Trust"), ("NY", "Partnership")]);
    }

    #[test]
    fn resolved_rule_copies_both_sides_and_dates() {
        let rs = rule_set();
        let w = vec![withholding("NY", "Partnership")];
        let c = vec![composite("NY", "Partnership")];

        let resolved = materialize_resolved_rules(&rs, &w, &c);
        let r = &resolved[0];
        assert_eq!(r.withholding_tax_rate, w[0].tax_rate);
        assert_eq!(r.withholding_tax_threshold, w[0].tax_threshold);
        assert_eq!(r.composite_tax_rate, c[0].tax_rate);
        assert!(r.mandatory_filing);
        assert_eq!(r.max_tax_amount, c[0].max_tax_amount);
        assert_eq!(r.effective_date, rs.effective_date);
        assert_eq!(r.withholding_rule_id, w[0].rule_id);
        assert_eq!(r.composite_rule_id, c[0].rule_id);
    }

    #[test]
    fn empty_collections_materialize_nothing() {
        let rs = rule_set();
        assert!(materialize_resolved_rules(&rs, &[], &[]).is_empty());
        assert!(materialize_resolved_rules(&rs, &[withholding("NY", "Trust")], &[]).is_empty());
    }
}
