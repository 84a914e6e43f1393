//! Composite rule model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-state/entity composite filing rule applied when mandatory filing
/// is in effect for the jurisdiction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompositeRule {
    pub rule_id: Uuid,
    pub rule_set_id: Uuid,
    pub state_code: String,
    pub entity_type: String,
    pub tax_rate: Decimal,
    pub income_threshold: Decimal,
    pub mandatory_filing: bool,
    pub min_tax_amount: Option<Decimal>,
    pub max_tax_amount: Option<Decimal>,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting a composite rule under a draft rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCompositeRule {
    pub state_code: String,
    pub entity_type: String,
    pub tax_rate: Decimal,
    pub income_threshold: Decimal,
    pub mandatory_filing: bool,
    pub min_tax_amount: Option<Decimal>,
    pub max_tax_amount: Option<Decimal>,
}
