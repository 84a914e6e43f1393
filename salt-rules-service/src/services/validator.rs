//! Workbook validation: structural and semantic checks over parsed sheets.
//!
//! Issues are data, never errors. Row checks are independent and
//! accumulate; only whole-sheet absence stops the pass early.

use crate::models::{
    is_valid_state, EntityCode, Issue, IssueCode, IssueSeverity, ValidationReport, Workbook,
    Worksheet, COMPOSITE_COLUMNS, COMPOSITE_OPTIONAL_COLUMNS, COMPOSITE_SHEET,
    WITHHOLDING_COLUMNS, WITHHOLDING_SHEET,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Header row number; data rows are numbered from 2.
pub const HEADER_ROW: i32 = 1;

/// Validate a parsed workbook. Returns every issue found, ordered by
/// sheet then row.
pub fn validate_workbook(workbook: &Workbook) -> ValidationReport {
    let mut issues = Vec::new();

    let withholding = workbook.sheet(WITHHOLDING_SHEET);
    let composite = workbook.sheet(COMPOSITE_SHEET);

    if withholding.is_none() {
        issues.push(missing_sheet_issue(WITHHOLDING_SHEET));
    }
    if composite.is_none() {
        issues.push(missing_sheet_issue(COMPOSITE_SHEET));
    }
    // Fail fast at the file level: nothing else is checkable without
    // both sheets present.
    let (Some(withholding), Some(composite)) = (withholding, composite) else {
        return ValidationReport::from_issues(issues);
    };

    validate_sheet(withholding, WITHHOLDING_COLUMNS, &[], &mut issues);
    validate_sheet(
        composite,
        COMPOSITE_COLUMNS,
        COMPOSITE_OPTIONAL_COLUMNS,
        &mut issues,
    );

    ValidationReport::from_issues(issues)
}

fn missing_sheet_issue(sheet_name: &str) -> Issue {
    Issue {
        sheet_name: sheet_name.to_string(),
        row_number: HEADER_ROW,
        column_name: None,
        error_code: IssueCode::MissingRequiredSheet,
        severity: IssueSeverity::Error,
        message: format!("Required sheet '{}' is missing", sheet_name),
        field_value: None,
    }
}

fn validate_sheet(
    sheet: &Worksheet,
    required_columns: &[&str],
    optional_columns: &[&str],
    issues: &mut Vec<Issue>,
) {
    let mut missing_column = false;
    for column in required_columns {
        if !sheet.has_column(column) {
            missing_column = true;
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number: HEADER_ROW,
                column_name: Some(column.to_string()),
                error_code: IssueCode::MissingColumn,
                severity: IssueSeverity::Error,
                message: format!("Sheet '{}' is missing column '{}'", sheet.name, column),
                field_value: None,
            });
        }
    }

    for header in &sheet.headers {
        let known = required_columns.iter().chain(optional_columns).any(|c| c == header);
        if !known {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number: HEADER_ROW,
                column_name: Some(header.clone()),
                error_code: IssueCode::UnexpectedColumn,
                severity: IssueSeverity::Warning,
                message: format!("Sheet '{}' has unrecognized column '{}'", sheet.name, header),
                field_value: None,
            });
        }
    }

    // Row checks assume the full header set; with columns missing they
    // would mis-report every row as empty.
    if missing_column {
        return;
    }

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_number = HEADER_ROW + 1 + index as i32;
        validate_row(sheet, row, row_number, issues);
    }

    detect_duplicates(sheet, issues);
}

fn validate_row(
    sheet: &Worksheet,
    row: &HashMap<String, String>,
    row_number: i32,
    issues: &mut Vec<Issue>,
) {
    let is_composite = sheet.name == COMPOSITE_SHEET;

    check_required_string(sheet, row, row_number, "State", issues);
    check_required_string(sheet, row, row_number, "EntityType", issues);

    if let Some(state) = non_empty(row, "State") {
        if !is_valid_state(state) {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number,
                column_name: Some("State".to_string()),
                error_code: IssueCode::InvalidState,
                severity: IssueSeverity::Error,
                message: format!("'{}' is not a recognized state code", state.trim()),
                field_value: Some(state.trim().to_string()),
            });
        }
    }

    if let Some(entity) = non_empty(row, "EntityType") {
        if EntityCode::from_variant(entity).is_none() {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number,
                column_name: Some("EntityType".to_string()),
                error_code: IssueCode::InvalidEntityType,
                severity: IssueSeverity::Error,
                message: format!("'{}' is not a recognized entity type", entity.trim()),
                field_value: Some(entity.trim().to_string()),
            });
        }
    }

    match check_numeric(sheet, row, row_number, "TaxRate", true, issues) {
        Some(rate) if rate < Decimal::ZERO || rate > Decimal::ONE => {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number,
                column_name: Some("TaxRate".to_string()),
                error_code: IssueCode::InvalidRateRange,
                severity: IssueSeverity::Error,
                message: format!("Tax rate {} is outside the range 0.0000-1.0000", rate),
                field_value: row.get("TaxRate").map(|v| v.trim().to_string()),
            });
        }
        Some(rate) if rate == Decimal::ZERO => {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number,
                column_name: Some("TaxRate".to_string()),
                error_code: IssueCode::ZeroRate,
                severity: IssueSeverity::Warning,
                message: "Tax rate is zero; rule will never produce tax".to_string(),
                field_value: row.get("TaxRate").map(|v| v.trim().to_string()),
            });
        }
        _ => {}
    }

    check_numeric(sheet, row, row_number, "IncomeThreshold", true, issues);

    if is_composite {
        check_boolean(sheet, row, row_number, "MandatoryFiling", issues);
        check_numeric(sheet, row, row_number, "MinTaxAmount", false, issues);
        check_numeric(sheet, row, row_number, "MaxTaxAmount", false, issues);
    } else {
        check_numeric(sheet, row, row_number, "TaxThreshold", true, issues);
    }
}

fn check_required_string(
    sheet: &Worksheet,
    row: &HashMap<String, String>,
    row_number: i32,
    column: &str,
    issues: &mut Vec<Issue>,
) {
    if non_empty(row, column).is_none() {
        issues.push(Issue {
            sheet_name: sheet.name.clone(),
            row_number,
            column_name: Some(column.to_string()),
            error_code: IssueCode::EmptyRequiredField,
            severity: IssueSeverity::Error,
            message: format!("Required field '{}' is empty", column),
            field_value: None,
        });
    }
}

/// Check a numeric column; returns the parsed value when valid so range
/// checks can chain. `required` distinguishes the optional money columns.
fn check_numeric(
    sheet: &Worksheet,
    row: &HashMap<String, String>,
    row_number: i32,
    column: &str,
    required: bool,
    issues: &mut Vec<Issue>,
) -> Option<Decimal> {
    let raw = match non_empty(row, column) {
        Some(raw) => raw,
        None => {
            if required {
                issues.push(Issue {
                    sheet_name: sheet.name.clone(),
                    row_number,
                    column_name: Some(column.to_string()),
                    error_code: IssueCode::EmptyRequiredField,
                    severity: IssueSeverity::Error,
                    message: format!("Required field '{}' is empty", column),
                    field_value: None,
                });
            }
            return None;
        }
    };

    match parse_decimal(raw) {
        Some(value) => Some(value),
        None => {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number,
                column_name: Some(column.to_string()),
                error_code: IssueCode::InvalidDataType,
                severity: IssueSeverity::Error,
                message: format!("'{}' is not a valid number for '{}'", raw.trim(), column),
                field_value: Some(raw.trim().to_string()),
            });
            None
        }
    }
}

fn check_boolean(
    sheet: &Worksheet,
    row: &HashMap<String, String>,
    row_number: i32,
    column: &str,
    issues: &mut Vec<Issue>,
) {
    let raw = match non_empty(row, column) {
        Some(raw) => raw,
        None => {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number,
                column_name: Some(column.to_string()),
                error_code: IssueCode::EmptyRequiredField,
                severity: IssueSeverity::Error,
                message: format!("Required field '{}' is empty", column),
                field_value: None,
            });
            return;
        }
    };

    if parse_boolean(raw).is_none() {
        issues.push(Issue {
            sheet_name: sheet.name.clone(),
            row_number,
            column_name: Some(column.to_string()),
            error_code: IssueCode::InvalidDataType,
            severity: IssueSeverity::Error,
            message: format!("'{}' is not a valid boolean for '{}'", raw.trim(), column),
            field_value: Some(raw.trim().to_string()),
        });
    }
}

/// Flag every row participating in a repeated (State, EntityType) key.
fn detect_duplicates(sheet: &Worksheet, issues: &mut Vec<Issue>) {
    let mut by_key: HashMap<(String, String), Vec<i32>> = HashMap::new();

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_number = HEADER_ROW + 1 + index as i32;
        let state = match non_empty(row, "State") {
            Some(s) => s.trim().to_uppercase(),
            None => continue,
        };
        // Unknown entity variants still form a key, normalized the same
        // way unknown states are.
        let entity = match non_empty(row, "EntityType") {
            Some(raw) => match EntityCode::from_variant(raw) {
                Some(code) => code.as_str().to_string(),
                None => raw.trim().to_uppercase(),
            },
            None => continue,
        };
        by_key.entry((state, entity)).or_default().push(row_number);
    }

    let mut duplicates: Vec<(&(String, String), &Vec<i32>)> =
        by_key.iter().filter(|(_, rows)| rows.len() > 1).collect();
    duplicates.sort_by_key(|(_, rows)| rows[0]);

    for ((state, entity), rows) in duplicates {
        for row_number in rows {
            issues.push(Issue {
                sheet_name: sheet.name.clone(),
                row_number: *row_number,
                column_name: None,
                error_code: IssueCode::DuplicateRule,
                severity: IssueSeverity::Error,
                message: format!(
                    "Duplicate rule for state '{}' and entity type '{}'",
                    state, entity
                ),
                field_value: Some(format!("{}/{}", state, entity)),
            });
        }
    }
}

fn non_empty<'a>(row: &'a HashMap<String, String>, column: &str) -> Option<&'a str> {
    row.get(column).map(|v| v.as_str()).filter(|v| !v.trim().is_empty())
}

/// Parse a decimal cell, tolerating a leading `$` and thousands separators.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse a boolean cell: true/false/1/0/yes/no, case-insensitive.
pub(crate) fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
