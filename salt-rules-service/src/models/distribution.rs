//! Distribution, investor, and upload session models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fund investor receiving distributions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Investor {
    pub investor_id: Uuid,
    pub name: String,
    pub entity_type: String,
    pub tax_state: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting an investor.
#[derive(Debug, Clone)]
pub struct NewInvestor {
    pub name: String,
    pub entity_type: String,
    pub tax_state: String,
}

/// One distribution to one investor within an upload session. The two tax
/// amounts are engine-owned: null until computed, reset on every pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Distribution {
    pub distribution_id: Uuid,
    pub session_id: Uuid,
    pub investor_id: Option<Uuid>,
    pub jurisdiction: String,
    pub amount: Decimal,
    pub composite_exemption: bool,
    pub withholding_exemption: bool,
    pub composite_tax_amount: Option<Decimal>,
    pub withholding_tax_amount: Option<Decimal>,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting a distribution.
#[derive(Debug, Clone)]
pub struct NewDistribution {
    pub session_id: Uuid,
    pub investor_id: Option<Uuid>,
    pub jurisdiction: String,
    pub amount: Decimal,
    pub composite_exemption: bool,
    pub withholding_exemption: bool,
}

/// Upload session tying a distribution batch to its tax period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UploadSession {
    pub session_id: Uuid,
    pub year: i32,
    pub quarter: String,
    pub source_file_name: Option<String>,
    pub source_file_hash: Option<String>,
    pub created_utc: DateTime<Utc>,
}
