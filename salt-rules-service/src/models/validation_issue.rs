//! Validation issue model and severity/code enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Messages longer than this are truncated before persistence.
pub const MAX_ISSUE_MESSAGE_LEN: usize = 1000;

/// Issue severity. Errors block publish, warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "warning" => IssueSeverity::Warning,
            _ => IssueSeverity::Error,
        }
    }
}

/// Machine-readable issue codes emitted by the validator and converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingRequiredSheet,
    MissingColumn,
    UnexpectedColumn,
    EmptyRequiredField,
    InvalidDataType,
    InvalidState,
    InvalidEntityType,
    InvalidRateRange,
    ZeroRate,
    DuplicateRule,
    ConversionError,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingRequiredSheet => "MISSING_REQUIRED_SHEET",
            IssueCode::MissingColumn => "MISSING_COLUMN",
            IssueCode::UnexpectedColumn => "UNEXPECTED_COLUMN",
            IssueCode::EmptyRequiredField => "EMPTY_REQUIRED_FIELD",
            IssueCode::InvalidDataType => "INVALID_DATA_TYPE",
            IssueCode::InvalidState => "INVALID_STATE",
            IssueCode::InvalidEntityType => "INVALID_ENTITY_TYPE",
            IssueCode::InvalidRateRange => "INVALID_RATE_RANGE",
            IssueCode::ZeroRate => "ZERO_RATE",
            IssueCode::DuplicateRule => "DUPLICATE_RULE",
            IssueCode::ConversionError => "CONVERSION_ERROR",
        }
    }
}

/// Transient issue produced by the validation pipeline, before any rule
/// set exists to anchor it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub sheet_name: String,
    pub row_number: i32,
    pub column_name: Option<String>,
    pub error_code: IssueCode,
    pub severity: IssueSeverity,
    pub message: String,
    pub field_value: Option<String>,
}

impl Issue {
    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

/// Outcome of a whole-workbook validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let is_valid = !issues.iter().any(Issue::is_error);
        ValidationReport { is_valid, issues }
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }
}

/// Persisted validation issue, anchored to a rule set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ValidationIssue {
    pub issue_id: Uuid,
    pub rule_set_id: Uuid,
    pub sheet_name: String,
    pub row_number: i32,
    pub column_name: Option<String>,
    pub error_code: String,
    pub severity: String,
    pub message: String,
    pub field_value: Option<String>,
    pub created_utc: DateTime<Utc>,
}
