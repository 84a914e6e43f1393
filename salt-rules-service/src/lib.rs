//! SALT rules service: tax-rule workbook ingestion, rule-set versioning,
//! resolved-rule materialization, and per-distribution tax calculation.

pub mod config;
pub mod models;
pub mod services;
