//! End-to-end tax calculation tests over an upload session.

mod common;

use common::{sample_workbook, TestDb};
use rust_decimal::Decimal;
use salt_rules_service::models::{CreateRuleSet, NewDistribution, NewInvestor, Quarter};
use salt_rules_service::services::{CalculationService, RuleSetManager};
use serial_test::serial;
use uuid::Uuid;

fn create_input(version: &str) -> CreateRuleSet {
    CreateRuleSet {
        year: 2026,
        quarter: Quarter::Q1,
        version: version.to_string(),
        created_by: "tester".to_string(),
        description: None,
        source_file_name: None,
        source_file_hash: None,
    }
}

async fn publish_sample_rules(test_db: &TestDb) {
    let manager = RuleSetManager::new(test_db.db.clone());
    let rule_set = manager
        .ingest_rule_set(create_input("1.0.0"), &sample_workbook())
        .await
        .expect("Failed to ingest");
    manager
        .publish_rule_set(rule_set.rule_set_id, None, false)
        .await
        .expect("Failed to publish");
}

async fn seed_investor(test_db: &TestDb, entity_type: &str, tax_state: &str) -> Uuid {
    test_db
        .db
        .create_investor(&NewInvestor {
            name: "Investor".to_string(),
            entity_type: entity_type.to_string(),
            tax_state: tax_state.to_string(),
        })
        .await
        .expect("Failed to create investor")
        .investor_id
}

async fn seed_session(test_db: &TestDb) -> Uuid {
    test_db
        .db
        .create_upload_session(2026, Quarter::Q1, None, None)
        .await
        .expect("Failed to create session")
        .session_id
}

async fn seed_distribution(
    test_db: &TestDb,
    session_id: Uuid,
    investor_id: Option<Uuid>,
    jurisdiction: &str,
    amount: Decimal,
) -> Uuid {
    test_db
        .db
        .create_distribution(&NewDistribution {
            session_id,
            investor_id,
            jurisdiction: jurisdiction.to_string(),
            amount,
            composite_exemption: false,
            withholding_exemption: false,
        })
        .await
        .expect("Failed to create distribution")
        .distribution_id
}

#[tokio::test]
#[serial]
async fn session_batch_computes_expected_amounts() {
    let Some(test_db) = TestDb::spawn().await else { return };
    publish_sample_rules(&test_db).await;

    let session_id = seed_session(&test_db).await;
    let partnership = seed_investor(&test_db, "Partnership", "CA").await;
    let trust = seed_investor(&test_db, "Grantor Trust", "NY").await;

    // NY Partnership: mandatory composite at 6.25% over 1000.00.
    let composite_dist = seed_distribution(
        &test_db,
        session_id,
        Some(partnership),
        "NY",
        Decimal::new(120000, 2),
    )
    .await;
    // CA Trust: composite is non-mandatory, withholding 7% over 1000.
    let withholding_dist = seed_distribution(
        &test_db,
        session_id,
        Some(trust),
        "CA",
        Decimal::new(200000, 2),
    )
    .await;
    // Unlinked distribution stays null.
    let unlinked_dist =
        seed_distribution(&test_db, session_id, None, "NY", Decimal::new(120000, 2)).await;

    let service = CalculationService::new(test_db.db.clone());
    service
        .apply_tax_calculation(session_id)
        .await
        .expect("Calculation failed");

    let distributions = test_db
        .db
        .get_distributions_by_session(session_id)
        .await
        .expect("Failed to load distributions");
    let by_id = |id: Uuid| {
        distributions
            .iter()
            .find(|d| d.distribution_id == id)
            .expect("distribution missing")
    };

    let composite = by_id(composite_dist);
    assert_eq!(composite.composite_tax_amount, Some(Decimal::new(7500, 2)));
    assert_eq!(composite.withholding_tax_amount, None);

    let withheld = by_id(withholding_dist);
    assert_eq!(withheld.composite_tax_amount, None);
    assert_eq!(withheld.withholding_tax_amount, Some(Decimal::new(14000, 2)));

    let unlinked = by_id(unlinked_dist);
    assert_eq!(unlinked.composite_tax_amount, None);
    assert_eq!(unlinked.withholding_tax_amount, None);

    test_db.cleanup().await;
}

#[tokio::test]
#[serial]
async fn recalculation_is_idempotent() {
    let Some(test_db) = TestDb::spawn().await else { return };
    publish_sample_rules(&test_db).await;

    let session_id = seed_session(&test_db).await;
    let partnership = seed_investor(&test_db, "Partnership", "CA").await;
    seed_distribution(
        &test_db,
        session_id,
        Some(partnership),
        "NY",
        Decimal::new(120000, 2),
    )
    .await;

    let service = CalculationService::new(test_db.db.clone());
    service
        .apply_tax_calculation(session_id)
        .await
        .expect("First pass failed");
    let first = test_db
        .db
        .get_distributions_by_session(session_id)
        .await
        .expect("load");

    service
        .apply_tax_calculation(session_id)
        .await
        .expect("Second pass failed");
    let second = test_db
        .db
        .get_distributions_by_session(session_id)
        .await
        .expect("load");

    assert_eq!(
        first[0].composite_tax_amount,
        second[0].composite_tax_amount
    );
    assert_eq!(
        first[0].withholding_tax_amount,
        second[0].withholding_tax_amount
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[serial]
async fn no_active_rule_set_resets_taxes_to_null() {
    let Some(test_db) = TestDb::spawn().await else { return };

    let session_id = seed_session(&test_db).await;
    let partnership = seed_investor(&test_db, "Partnership", "CA").await;
    let dist_id = seed_distribution(
        &test_db,
        session_id,
        Some(partnership),
        "NY",
        Decimal::new(120000, 2),
    )
    .await;

    // Simulate stale amounts from an earlier pass.
    test_db
        .db
        .update_distribution_taxes(dist_id, Some(Decimal::new(7500, 2)), None)
        .await
        .expect("Failed to seed stale taxes");

    let service = CalculationService::new(test_db.db.clone());
    service
        .apply_tax_calculation(session_id)
        .await
        .expect("Calculation failed");

    let distributions = test_db
        .db
        .get_distributions_by_session(session_id)
        .await
        .expect("load");
    assert_eq!(distributions[0].composite_tax_amount, None);
    assert_eq!(distributions[0].withholding_tax_amount, None);

    test_db.cleanup().await;
}

#[tokio::test]
#[serial]
async fn missing_session_is_not_found() {
    let Some(test_db) = TestDb::spawn().await else { return };

    let service = CalculationService::new(test_db.db.clone());
    let err = service
        .apply_tax_calculation(Uuid::new_v4())
        .await
        .expect_err("Missing session should fail");
    assert!(err.to_string().contains("not found"));

    test_db.cleanup().await;
}
