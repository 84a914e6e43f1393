//! Parsed workbook input types.
//!
//! File-format decoding belongs to the upstream reader; the engine sees
//! named sheets of ordered rows, each row a column-name → raw-value map.

use std::collections::HashMap;

pub const WITHHOLDING_SHEET: &str = "Withholding";
pub const COMPOSITE_SHEET: &str = "Composite";

/// Required columns for the withholding sheet.
pub const WITHHOLDING_COLUMNS: &[&str] = &[
    "State",
    "EntityType",
    "TaxRate",
    "IncomeThreshold",
    "TaxThreshold",
];

/// Required columns for the composite sheet.
pub const COMPOSITE_COLUMNS: &[&str] = &[
    "State",
    "EntityType",
    "TaxRate",
    "IncomeThreshold",
    "MandatoryFiling",
];

/// Optional columns recognized on the composite sheet.
pub const COMPOSITE_OPTIONAL_COLUMNS: &[&str] = &["MinTaxAmount", "MaxTaxAmount"];

/// One logical sheet: header row plus ordered data rows.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl Worksheet {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

/// A parsed workbook of named sheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
