//! Resolved rule model: the denormalized withholding + composite join.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Denormalized lookup record combining one withholding and one composite
/// rule for a (state, entity) pair. Rebuilt in full on every publish.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResolvedRule {
    pub resolved_rule_id: Uuid,
    pub rule_set_id: Uuid,
    pub state_code: String,
    pub entity_type: String,
    pub withholding_tax_rate: Decimal,
    pub withholding_income_threshold: Decimal,
    pub withholding_tax_threshold: Option<Decimal>,
    pub composite_tax_rate: Decimal,
    pub composite_income_threshold: Decimal,
    pub mandatory_filing: bool,
    pub min_tax_amount: Option<Decimal>,
    pub max_tax_amount: Option<Decimal>,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub withholding_rule_id: Uuid,
    pub composite_rule_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting a resolved rule during publish.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResolvedRule {
    pub state_code: String,
    pub entity_type: String,
    pub withholding_tax_rate: Decimal,
    pub withholding_income_threshold: Decimal,
    pub withholding_tax_threshold: Option<Decimal>,
    pub composite_tax_rate: Decimal,
    pub composite_income_threshold: Decimal,
    pub mandatory_filing: bool,
    pub min_tax_amount: Option<Decimal>,
    pub max_tax_amount: Option<Decimal>,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub withholding_rule_id: Uuid,
    pub composite_rule_id: Uuid,
}
