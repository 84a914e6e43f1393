//! Rule set lifecycle: draft → active → archived.
//!
//! The manager owns the state machine and its uniqueness invariants; all
//! multi-step transitions defer to the database layer's transactions.

use crate::models::{
    CreateRuleSet, PublishOutcome, Quarter, RuleSet, RuleSetDetail, RuleSetStatus,
    ValidationReport, Workbook, COMPOSITE_SHEET, MAX_RULE_SET_YEAR, MIN_RULE_SET_YEAR,
    WITHHOLDING_SHEET,
};
use crate::services::comparison::{compare_rule_sets, RuleSetComparison};
use crate::services::converter::{
    convert_composite_sheet, convert_withholding_sheet, ConvertedRules,
};
use crate::services::database::Database;
use crate::services::materializer::materialize_resolved_rules;
use crate::services::metrics::{ERRORS_TOTAL, RULE_SET_OPERATIONS_TOTAL, VALIDATION_ISSUES_TOTAL};
use crate::services::validator::validate_workbook;
use chrono::{NaiveDate, Utc};
use salt_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Typed lifecycle failures. Each aborts its operation with no partial
/// state change.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Rule set {0} not found")]
    NotFound(Uuid),

    #[error("Publish blocked: {count} validation error(s) outstanding")]
    ValidationBlocked { count: i64 },

    #[error(
        "Rule set {active_id} is already active for {year} {quarter}; pass confirm_archive to supersede it"
    )]
    ConflictRequiresConfirmation {
        active_id: Uuid,
        year: i32,
        quarter: String,
    },

    #[error("Rule set {0} is already archived")]
    AlreadyArchived(Uuid),

    #[error("Rule set {0} is active; deletion requires force")]
    ActiveDeletionRequiresForce(Uuid),

    #[error(transparent)]
    App(#[from] AppError),
}

/// Orchestrates workbook ingestion and rule set lifecycle operations.
#[derive(Clone)]
pub struct RuleSetManager {
    db: Arc<Database>,
}

impl RuleSetManager {
    pub fn new(db: Arc<Database>) -> Self {
        RuleSetManager { db }
    }

    /// Pre-persistence validation of a parsed workbook.
    pub fn validate_workbook(workbook: &Workbook) -> ValidationReport {
        let report = validate_workbook(workbook);
        for issue in &report.issues {
            VALIDATION_ISSUES_TOTAL
                .with_label_values(&[issue.severity.as_str()])
                .inc();
        }
        report
    }

    /// Validate and, for clean sheets, convert a workbook into typed rules.
    pub fn validate_and_convert(workbook: &Workbook) -> (ValidationReport, ConvertedRules) {
        let report = Self::validate_workbook(workbook);
        let mut converted = ConvertedRules::default();

        if !report.is_valid {
            return (report, converted);
        }

        // The report is clean, so both sheets exist.
        if let Some(sheet) = workbook.sheet(WITHHOLDING_SHEET) {
            let (rules, issues) = convert_withholding_sheet(sheet);
            converted.withholding = rules;
            converted.issues.extend(issues);
        }
        if let Some(sheet) = workbook.sheet(COMPOSITE_SHEET) {
            let (rules, issues) = convert_composite_sheet(sheet);
            converted.composite = rules;
            converted.issues.extend(issues);
        }

        (report, converted)
    }

    /// Create a draft rule set from a validated workbook.
    ///
    /// Validation errors refuse ingestion outright; conversion errors are
    /// persisted with the draft and block its publish instead.
    #[instrument(skip(self, input, workbook), fields(year = input.year, quarter = %input.quarter))]
    pub async fn ingest_rule_set(
        &self,
        input: CreateRuleSet,
        workbook: &Workbook,
    ) -> Result<RuleSet, LifecycleError> {
        if input.year < MIN_RULE_SET_YEAR || input.year > MAX_RULE_SET_YEAR {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Year {} is outside the supported range {}-{}",
                input.year,
                MIN_RULE_SET_YEAR,
                MAX_RULE_SET_YEAR
            ))
            .into());
        }

        let (report, converted) = Self::validate_and_convert(workbook);
        if !report.is_valid {
            ERRORS_TOTAL.with_label_values(&["ingest_rejected"]).inc();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Workbook failed validation with {} error(s)",
                report.error_count()
            ))
            .into());
        }

        let mut issues = report.issues;
        issues.extend(converted.issues);

        let rule_set = self
            .db
            .create_rule_set(&input, &converted.withholding, &converted.composite, &issues)
            .await?;

        RULE_SET_OPERATIONS_TOTAL
            .with_label_values(&["ingest"])
            .inc();

        info!(
            rule_set_id = %rule_set.rule_set_id,
            withholding = converted.withholding.len(),
            composite = converted.composite.len(),
            issues = issues.len(),
            "Rule set ingested as draft"
        );

        Ok(rule_set)
    }

    /// Publish a draft, archiving any active sibling for the same period.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn publish_rule_set(
        &self,
        rule_set_id: Uuid,
        effective_date: Option<NaiveDate>,
        confirm_archive: bool,
    ) -> Result<PublishOutcome, LifecycleError> {
        let rule_set = self
            .db
            .get_rule_set(rule_set_id)
            .await?
            .ok_or(LifecycleError::NotFound(rule_set_id))?;

        match rule_set.status() {
            RuleSetStatus::Archived => return Err(LifecycleError::AlreadyArchived(rule_set_id)),
            RuleSetStatus::Active => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Rule set {} is already active",
                    rule_set_id
                ))
                .into());
            }
            RuleSetStatus::Draft => {}
        }

        let (error_count, _) = self.db.count_issues(rule_set_id).await?;
        if error_count > 0 {
            warn!(
                rule_set_id = %rule_set_id,
                errors = error_count,
                "Publish blocked by validation errors"
            );
            ERRORS_TOTAL
                .with_label_values(&["publish_blocked"])
                .inc();
            return Err(LifecycleError::ValidationBlocked { count: error_count });
        }

        let active_sibling = self
            .db
            .get_active_rule_set(rule_set.year, &rule_set.quarter)
            .await?;
        let archived_previous_id = match active_sibling {
            Some(sibling) if sibling.rule_set_id != rule_set_id => {
                if !confirm_archive {
                    return Err(LifecycleError::ConflictRequiresConfirmation {
                        active_id: sibling.rule_set_id,
                        year: rule_set.year,
                        quarter: rule_set.quarter.clone(),
                    });
                }
                Some(sibling.rule_set_id)
            }
            _ => None,
        };

        let withholding = self.db.get_withholding_rules(rule_set_id).await?;
        let composite = self.db.get_composite_rules(rule_set_id).await?;
        let resolved = materialize_resolved_rules(&rule_set, &withholding, &composite);

        let effective = effective_date.unwrap_or_else(|| Utc::now().date_naive());
        let published_utc = self
            .db
            .publish_rule_set(rule_set_id, effective, archived_previous_id, &resolved)
            .await?;

        RULE_SET_OPERATIONS_TOTAL
            .with_label_values(&["publish"])
            .inc();

        info!(
            rule_set_id = %rule_set_id,
            resolved_rules = resolved.len(),
            archived_previous = ?archived_previous_id,
            "Rule set published"
        );

        Ok(PublishOutcome {
            rule_set_id,
            status: RuleSetStatus::Active,
            published_utc,
            effective_date: effective,
            resolved_rule_count: resolved.len(),
            archived_previous_id,
        })
    }

    /// Retire a rule set manually.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn archive_rule_set(&self, rule_set_id: Uuid) -> Result<(), LifecycleError> {
        let rule_set = self
            .db
            .get_rule_set(rule_set_id)
            .await?
            .ok_or(LifecycleError::NotFound(rule_set_id))?;

        if rule_set.status() == RuleSetStatus::Archived {
            return Err(LifecycleError::AlreadyArchived(rule_set_id));
        }

        self.db.archive_rule_set(rule_set_id).await?;

        RULE_SET_OPERATIONS_TOTAL
            .with_label_values(&["archive"])
            .inc();

        Ok(())
    }

    /// Delete a rule set and everything under it.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn delete_rule_set(
        &self,
        rule_set_id: Uuid,
        force: bool,
    ) -> Result<(), LifecycleError> {
        let rule_set = self
            .db
            .get_rule_set(rule_set_id)
            .await?
            .ok_or(LifecycleError::NotFound(rule_set_id))?;

        if rule_set.status() == RuleSetStatus::Active && !force {
            return Err(LifecycleError::ActiveDeletionRequiresForce(rule_set_id));
        }

        self.db.delete_rule_set(rule_set_id).await?;

        RULE_SET_OPERATIONS_TOTAL
            .with_label_values(&["delete"])
            .inc();

        Ok(())
    }

    /// Rule set summary with issue tallies and, optionally, its rules.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn get_rule_set_detail(
        &self,
        rule_set_id: Uuid,
        include_rules: bool,
    ) -> Result<RuleSetDetail, LifecycleError> {
        let rule_set = self
            .db
            .get_rule_set(rule_set_id)
            .await?
            .ok_or(LifecycleError::NotFound(rule_set_id))?;

        let (error_count, warning_count) = self.db.count_issues(rule_set_id).await?;

        let (withholding_rules, composite_rules) = if include_rules {
            (
                Some(self.db.get_withholding_rules(rule_set_id).await?),
                Some(self.db.get_composite_rules(rule_set_id).await?),
            )
        } else {
            (None, None)
        };

        Ok(RuleSetDetail {
            rule_set,
            error_count,
            warning_count,
            withholding_rules,
            composite_rules,
        })
    }

    /// Diff a target rule set against a baseline.
    ///
    /// With no explicit baseline, the active rule set for the target's
    /// period is used; if none exists every target rule reads as added.
    #[instrument(skip(self), fields(target_id = %target_id))]
    pub async fn compare_rule_sets(
        &self,
        target_id: Uuid,
        baseline_id: Option<Uuid>,
    ) -> Result<RuleSetComparison, LifecycleError> {
        let target = self
            .db
            .get_rule_set(target_id)
            .await?
            .ok_or(LifecycleError::NotFound(target_id))?;

        let baseline = match baseline_id {
            Some(id) => Some(
                self.db
                    .get_rule_set(id)
                    .await?
                    .ok_or(LifecycleError::NotFound(id))?,
            ),
            None => {
                self.db
                    .get_active_rule_set(target.year, &target.quarter)
                    .await?
            }
        };

        let target_withholding = self.db.get_withholding_rules(target_id).await?;
        let target_composite = self.db.get_composite_rules(target_id).await?;

        let (baseline_withholding, baseline_composite) = match &baseline {
            Some(baseline) => (
                self.db.get_withholding_rules(baseline.rule_set_id).await?,
                self.db.get_composite_rules(baseline.rule_set_id).await?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        Ok(compare_rule_sets(
            &target_withholding,
            &target_composite,
            &baseline_withholding,
            &baseline_composite,
        ))
    }
}

/// Parse and range-check period inputs from an outer layer.
pub fn parse_period(year: i32, quarter: &str) -> Result<(i32, Quarter), AppError> {
    if !(MIN_RULE_SET_YEAR..=MAX_RULE_SET_YEAR).contains(&year) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Year {} is outside the supported range {}-{}",
            year,
            MIN_RULE_SET_YEAR,
            MAX_RULE_SET_YEAR
        )));
    }
    let quarter = Quarter::from_string(quarter).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("'{}' is not a valid quarter", quarter))
    })?;
    Ok((year, quarter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_period_accepts_valid_inputs() {
        let (year, quarter) = parse_period(2026, "q3").expect("valid period");
        assert_eq!(year, 2026);
        assert_eq!(quarter, Quarter::Q3);
    }

    #[test]
    fn parse_period_rejects_out_of_range_year() {
        assert!(parse_period(2019, "Q1").is_err());
        assert!(parse_period(2031, "Q1").is_err());
    }

    #[test]
    fn parse_period_rejects_bad_quarter() {
        assert!(parse_period(2026, "Q5").is_err());
        assert!(parse_period(2026, "first").is_err());
    }
}
