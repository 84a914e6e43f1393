//! Rule conversion: valid workbook rows to typed rule inputs.
//!
//! Runs per sheet, and only for sheets the validator passed clean. A row
//! that still fails coercion is recorded as a CONVERSION_ERROR issue and
//! conversion moves on; the pipeline never aborts mid-sheet.

use crate::models::{
    EntityCode, Issue, IssueCode, IssueSeverity, NewCompositeRule, NewWithholdingRule, Worksheet,
};
use crate::services::validator::{parse_boolean, parse_decimal, HEADER_ROW};
use std::collections::HashMap;

/// Converted rule collections plus any per-row conversion issues.
#[derive(Debug, Default)]
pub struct ConvertedRules {
    pub withholding: Vec<NewWithholdingRule>,
    pub composite: Vec<NewCompositeRule>,
    pub issues: Vec<Issue>,
}

/// Convert a clean withholding sheet.
pub fn convert_withholding_sheet(sheet: &Worksheet) -> (Vec<NewWithholdingRule>, Vec<Issue>) {
    let mut rules = Vec::with_capacity(sheet.rows.len());
    let mut issues = Vec::new();

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_number = HEADER_ROW + 1 + index as i32;
        match convert_withholding_row(row) {
            Ok(rule) => rules.push(rule),
            Err(detail) => issues.push(conversion_issue(sheet, row_number, detail)),
        }
    }

    (rules, issues)
}

/// Convert a clean composite sheet.
pub fn convert_composite_sheet(sheet: &Worksheet) -> (Vec<NewCompositeRule>, Vec<Issue>) {
    let mut rules = Vec::with_capacity(sheet.rows.len());
    let mut issues = Vec::new();

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_number = HEADER_ROW + 1 + index as i32;
        match convert_composite_row(row) {
            Ok(rule) => rules.push(rule),
            Err(detail) => issues.push(conversion_issue(sheet, row_number, detail)),
        }
    }

    (rules, issues)
}

fn convert_withholding_row(row: &HashMap<String, String>) -> Result<NewWithholdingRule, String> {
    Ok(NewWithholdingRule {
        state_code: normalized_state(row)?,
        entity_type: canonical_entity(row)?,
        tax_rate: required_decimal(row, "TaxRate")?,
        income_threshold: required_decimal(row, "IncomeThreshold")?,
        tax_threshold: optional_decimal(row, "TaxThreshold")?,
    })
}

fn convert_composite_row(row: &HashMap<String, String>) -> Result<NewCompositeRule, String> {
    Ok(NewCompositeRule {
        state_code: normalized_state(row)?,
        entity_type: canonical_entity(row)?,
        tax_rate: required_decimal(row, "TaxRate")?,
        income_threshold: required_decimal(row, "IncomeThreshold")?,
        mandatory_filing: required_boolean(row, "MandatoryFiling")?,
        min_tax_amount: optional_decimal(row, "MinTaxAmount")?,
        max_tax_amount: optional_decimal(row, "MaxTaxAmount")?,
    })
}

fn normalized_state(row: &HashMap<String, String>) -> Result<String, String> {
    row.get("State")
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "State is missing".to_string())
}

fn canonical_entity(row: &HashMap<String, String>) -> Result<String, String> {
    let raw = row
        .get("EntityType")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "EntityType is missing".to_string())?;
    EntityCode::from_variant(raw)
        .map(|code| code.as_str().to_string())
        .ok_or_else(|| format!("Unknown entity type '{}'", raw))
}

fn required_decimal(
    row: &HashMap<String, String>,
    column: &str,
) -> Result<rust_decimal::Decimal, String> {
    let raw = row
        .get(column)
        .map(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("{} is missing", column))?;
    parse_decimal(raw).ok_or_else(|| format!("Cannot parse {} value '{}'", column, raw.trim()))
}

fn optional_decimal(
    row: &HashMap<String, String>,
    column: &str,
) -> Result<Option<rust_decimal::Decimal>, String> {
    match row.get(column).map(|s| s.as_str()).filter(|s| !s.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => parse_decimal(raw)
            .map(Some)
            .ok_or_else(|| format!("Cannot parse {} value '{}'", column, raw.trim())),
    }
}

fn required_boolean(row: &HashMap<String, String>, column: &str) -> Result<bool, String> {
    let raw = row
        .get(column)
        .map(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("{} is missing", column))?;
    parse_boolean(raw).ok_or_else(|| format!("Cannot parse {} value '{}'", column, raw.trim()))
}

fn conversion_issue(sheet: &Worksheet, row_number: i32, detail: String) -> Issue {
    Issue {
        sheet_name: sheet.name.clone(),
        row_number,
        column_name: None,
        error_code: IssueCode::ConversionError,
        severity: IssueSeverity::Error,
        message: format!("Row could not be converted: {}", detail),
        field_value: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{COMPOSITE_SHEET, WITHHOLDING_SHEET};
    use rust_decimal::Decimal;

    fn sheet_of(name: &str, rows: Vec<Vec<(&str, &str)>>) -> Worksheet {
        Worksheet {
            name: name.to_string(),
            headers: Vec::new(),
            rows: rows
                .into_iter()
                .map(|cells| {
                    cells
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .collect(),
        }
    }

    #[test]
    fn converts_and_normalizes_withholding_rows() {
        let sheet = sheet_of(
            WITHHOLDING_SHEET,
            vec![vec![
                ("State", " ny "),
                ("EntityType", "Limited Partnership"),
                ("TaxRate", "0.05"),
                ("IncomeThreshold", "$1,000.00"),
                ("TaxThreshold", "50"),
            ]],
        );

        let (rules, issues) = convert_withholding_sheet(&sheet);
        assert!(issues.is_empty());
        assert_eq!(
            rules,
            vec![NewWithholdingRule {
                state_code: "NY".to_string(),
                entity_type: "Partnership".to_string(),
                tax_rate: Decimal::new(5, 2),
                income_threshold: Decimal::new(100000, 2),
                tax_threshold: Some(Decimal::new(50, 0)),
            }]
        );
    }

    #[test]
    fn converts_composite_rows_with_optional_bounds() {
        let sheet = sheet_of(
            COMPOSITE_SHEET,
            vec![vec![
                ("State", "CA"),
                ("EntityType", "trust"),
                ("TaxRate", "0.093"),
                ("IncomeThreshold", "0"),
                ("MandatoryFiling", "no"),
                ("MinTaxAmount", "25.00"),
            ]],
        );

        let (rules, issues) = convert_composite_sheet(&sheet);
        assert!(issues.is_empty());
        let rule = &rules[0];
        assert_eq!(rule.entity_type, "Trust");
        assert!(!rule.mandatory_filing);
        assert_eq!(rule.min_tax_amount, Some(Decimal::new(2500, 2)));
        assert_eq!(rule.max_tax_amount, None);
    }

    #[test]
    fn conversion_failure_is_recorded_and_skipped() {
        let sheet = sheet_of(
            WITHHOLDING_SHEET,
            vec![
                vec![
                    ("State", "NY"),
                    ("EntityType", "Unknown Thing"),
                    ("TaxRate", "0.05"),
                    ("IncomeThreshold", "0"),
                ],
                vec![
                    ("State", "CA"),
                    ("EntityType", "Estate"),
                    ("TaxRate", "0.07"),
                    ("IncomeThreshold", "0"),
                ],
            ],
        );

        let (rules, issues) = convert_withholding_sheet(&sheet);
        // The bad row is reported, the good row still converts.
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].state_code, "CA");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].error_code, IssueCode::ConversionError);
        assert_eq!(issues[0].row_number, 2);
    }
}
