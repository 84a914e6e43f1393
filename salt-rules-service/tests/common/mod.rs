//! Test helper module for salt-rules-service integration tests.
//!
//! Provides PostgreSQL setup with schema-per-test isolation. Tests skip
//! themselves when TEST_DATABASE_URL is not set.

#![allow(dead_code)]

use salt_rules_service::models::{Workbook, Worksheet, COMPOSITE_SHEET, WITHHOLDING_SHEET};
use salt_rules_service::services::Database;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// Counter for unique schema names
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Get the database URL for testing, if configured.
pub fn get_test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Generate a unique schema name for test isolation.
fn unique_schema_name() -> String {
    let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test_salt_{}_{}", std::process::id(), counter)
}

/// Database handle scoped to a throwaway schema.
pub struct TestDb {
    pub db: Arc<Database>,
    base_url: String,
    schema_name: String,
}

impl TestDb {
    /// Set up a migrated database in a fresh schema, or None when no test
    /// database is configured.
    pub async fn spawn() -> Option<Self> {
        let base_url = match get_test_database_url() {
            Some(url) => url,
            None => {
                eprintln!("skipping: TEST_DATABASE_URL not set");
                return None;
            }
        };

        let schema_name = unique_schema_name();

        // Create schema for test isolation
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");

        pool.close().await;

        // Use ? or & depending on whether URL already has query parameters
        let separator = if base_url.contains('?') { "&" } else { "?" };
        let db_url_with_schema = format!(
            "{}{}options=-c search_path%3D{}",
            base_url, separator, schema_name
        );

        let db = Database::new(&db_url_with_schema, 5, 1)
            .await
            .expect("Failed to connect with test schema");
        db.run_migrations().await.expect("Failed to run migrations");

        Some(TestDb {
            db: Arc::new(db),
            base_url,
            schema_name,
        })
    }

    /// Drop the test schema.
    pub async fn cleanup(self) {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.base_url)
            .await
            .expect("Failed to connect for cleanup");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema_name))
            .execute(&pool)
            .await
            .ok();
        pool.close().await;
    }
}

fn row(cells: &[(&str, &str)]) -> HashMap<String, String> {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Build a workbook from raw withholding and composite cell rows.
pub fn workbook(withholding: &[&[(&str, &str)]], composite: &[&[(&str, &str)]]) -> Workbook {
    Workbook {
        sheets: vec![
            Worksheet {
                name: WITHHOLDING_SHEET.to_string(),
                headers: vec![
                    "State".to_string(),
                    "EntityType".to_string(),
                    "TaxRate".to_string(),
                    "IncomeThreshold".to_string(),
                    "TaxThreshold".to_string(),
                ],
                rows: withholding.iter().map(|cells| row(cells)).collect(),
            },
            Worksheet {
                name: COMPOSITE_SHEET.to_string(),
                headers: vec![
                    "State".to_string(),
                    "EntityType".to_string(),
                    "TaxRate".to_string(),
                    "IncomeThreshold".to_string(),
                    "MandatoryFiling".to_string(),
                ],
                rows: composite.iter().map(|cells| row(cells)).collect(),
            },
        ],
    }
}

/// The standard NY/CA sample workbook used across lifecycle tests.
pub fn sample_workbook() -> Workbook {
    workbook(
        &[
            &[
                ("State", "NY"),
                ("EntityType", "Partnership"),
                ("TaxRate", "0.05"),
                ("IncomeThreshold", "500"),
                ("TaxThreshold", "0"),
            ],
            &[
                ("State", "CA"),
                ("EntityType", "Trust"),
                ("TaxRate", "0.07"),
                ("IncomeThreshold", "1000"),
                ("TaxThreshold", "10"),
            ],
            &[
                ("State", "TX"),
                ("EntityType", "Individual"),
                ("TaxRate", "0.03"),
                ("IncomeThreshold", "0"),
                ("TaxThreshold", "0"),
            ],
        ],
        &[
            &[
                ("State", "NY"),
                ("EntityType", "Partnership"),
                ("TaxRate", "0.0625"),
                ("IncomeThreshold", "1000.00"),
                ("MandatoryFiling", "true"),
            ],
            &[
                ("State", "CA"),
                ("EntityType", "Trust"),
                ("TaxRate", "0.093"),
                ("IncomeThreshold", "500"),
                ("MandatoryFiling", "false"),
            ],
        ],
    )
}
