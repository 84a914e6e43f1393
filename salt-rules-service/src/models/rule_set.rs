//! Rule set model and lifecycle enums.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{CompositeRule, WithholdingRule};

/// Earliest tax year a rule set may cover.
pub const MIN_RULE_SET_YEAR: i32 = 2020;
/// Latest tax year a rule set may cover.
pub const MAX_RULE_SET_YEAR: i32 = 2030;

/// Rule set lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetStatus {
    Draft,
    Active,
    Archived,
}

impl RuleSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSetStatus::Draft => "draft",
            RuleSetStatus::Active => "active",
            RuleSetStatus::Archived => "archived",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => RuleSetStatus::Active,
            "archived" => RuleSetStatus::Archived,
            _ => RuleSetStatus::Draft,
        }
    }
}

/// Tax quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "Q4" => Some(Quarter::Q4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Quarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One versioned collection of withholding and composite rules for a
/// (year, quarter) period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RuleSet {
    pub rule_set_id: Uuid,
    pub year: i32,
    pub quarter: String,
    pub version: String,
    pub status: String,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub published_utc: Option<DateTime<Utc>>,
    pub created_by: String,
    pub description: Option<String>,
    pub rule_count_withholding: i32,
    pub rule_count_composite: i32,
    pub source_file_name: Option<String>,
    pub source_file_hash: Option<String>,
}

impl RuleSet {
    pub fn status(&self) -> RuleSetStatus {
        RuleSetStatus::from_string(&self.status)
    }
}

/// Input for creating a draft rule set.
#[derive(Debug, Clone)]
pub struct CreateRuleSet {
    pub year: i32,
    pub quarter: Quarter,
    pub version: String,
    pub created_by: String,
    pub description: Option<String>,
    pub source_file_name: Option<String>,
    pub source_file_hash: Option<String>,
}

/// Result of a successful publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub rule_set_id: Uuid,
    pub status: RuleSetStatus,
    pub published_utc: DateTime<Utc>,
    pub effective_date: NaiveDate,
    pub resolved_rule_count: usize,
    pub archived_previous_id: Option<Uuid>,
}

/// Rule set summary with validation tallies and, optionally, the rules.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSetDetail {
    pub rule_set: RuleSet,
    pub error_count: i64,
    pub warning_count: i64,
    pub withholding_rules: Option<Vec<WithholdingRule>>,
    pub composite_rules: Option<Vec<CompositeRule>>,
}
