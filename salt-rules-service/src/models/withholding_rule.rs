//! Withholding rule model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-state/entity tax withheld on distributions above an income threshold.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithholdingRule {
    pub rule_id: Uuid,
    pub rule_set_id: Uuid,
    pub state_code: String,
    pub entity_type: String,
    pub tax_rate: Decimal,
    pub income_threshold: Decimal,
    pub tax_threshold: Option<Decimal>,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting a withholding rule under a draft rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWithholdingRule {
    pub state_code: String,
    pub entity_type: String,
    pub tax_rate: Decimal,
    pub income_threshold: Decimal,
    pub tax_threshold: Option<Decimal>,
}
