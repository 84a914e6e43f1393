//! Database service for salt-rules-service.

use crate::models::{
    CompositeRule, CreateRuleSet, Distribution, Investor, Issue, NewCompositeRule,
    NewDistribution, NewInvestor, NewResolvedRule, NewWithholdingRule, Quarter, ResolvedRule,
    RuleSet, RuleSetStatus, UploadSession, ValidationIssue, WithholdingRule,
    MAX_ISSUE_MESSAGE_LEN,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use salt_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "salt-rules-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rule Set Operations
    // -------------------------------------------------------------------------

    /// Persist a draft rule set with its rules and validation issues in one
    /// transaction.
    #[instrument(skip(self, input, withholding, composite, issues), fields(year = input.year, quarter = %input.quarter))]
    pub async fn create_rule_set(
        &self,
        input: &CreateRuleSet,
        withholding: &[NewWithholdingRule],
        composite: &[NewCompositeRule],
        issues: &[Issue],
    ) -> Result<RuleSet, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_rule_set"])
            .start_timer();

        if let Some(hash) = &input.source_file_hash {
            if let Some(existing) = self
                .find_rule_set_by_hash(input.year, input.quarter, hash)
                .await?
            {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Workbook already ingested for {} {} as rule set {}",
                    input.year,
                    input.quarter,
                    existing
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let rule_set_id = Uuid::new_v4();
        let rule_set = sqlx::query_as::<_, RuleSet>(
            r#"
            INSERT INTO rule_sets (rule_set_id, year, quarter, version, status, created_by,
                                   description, rule_count_withholding, rule_count_composite,
                                   source_file_name, source_file_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING rule_set_id, year, quarter, version, status, effective_date,
                      expiration_date, created_utc, published_utc, created_by, description,
                      rule_count_withholding, rule_count_composite, source_file_name,
                      source_file_hash
            "#,
        )
        .bind(rule_set_id)
        .bind(input.year)
        .bind(input.quarter.as_str())
        .bind(&input.version)
        .bind(RuleSetStatus::Draft.as_str())
        .bind(&input.created_by)
        .bind(&input.description)
        .bind(withholding.len() as i32)
        .bind(composite.len() as i32)
        .bind(&input.source_file_name)
        .bind(&input.source_file_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Rule set version {} already exists for {} {}",
                    input.version,
                    input.year,
                    input.quarter
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create rule set: {}", e)),
        })?;

        for rule in withholding {
            sqlx::query(
                r#"
                INSERT INTO withholding_rules (rule_id, rule_set_id, state_code, entity_type,
                                               tax_rate, income_threshold, tax_threshold)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule_set_id)
            .bind(&rule.state_code)
            .bind(&rule.entity_type)
            .bind(rule.tax_rate)
            .bind(rule.income_threshold)
            .bind(rule.tax_threshold)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to insert withholding rule: {}",
                    e
                ))
            })?;
        }

        for rule in composite {
            sqlx::query(
                r#"
                INSERT INTO composite_rules (rule_id, rule_set_id, state_code, entity_type,
                                             tax_rate, income_threshold, mandatory_filing,
                                             min_tax_amount, max_tax_amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule_set_id)
            .bind(&rule.state_code)
            .bind(&rule.entity_type)
            .bind(rule.tax_rate)
            .bind(rule.income_threshold)
            .bind(rule.mandatory_filing)
            .bind(rule.min_tax_amount)
            .bind(rule.max_tax_amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert composite rule: {}", e))
            })?;
        }

        for issue in issues {
            let message: String = issue.message.chars().take(MAX_ISSUE_MESSAGE_LEN).collect();
            sqlx::query(
                r#"
                INSERT INTO validation_issues (issue_id, rule_set_id, sheet_name, row_number,
                                               column_name, error_code, severity, message,
                                               field_value)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule_set_id)
            .bind(&issue.sheet_name)
            .bind(issue.row_number)
            .bind(&issue.column_name)
            .bind(issue.error_code.as_str())
            .bind(issue.severity.as_str())
            .bind(message)
            .bind(&issue.field_value)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to insert validation issue: {}",
                    e
                ))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit rule set: {}", e))
        })?;

        timer.observe_duration();

        info!(rule_set_id = %rule_set.rule_set_id, "Rule set created as draft");

        Ok(rule_set)
    }

    /// Get a rule set by ID.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn get_rule_set(&self, rule_set_id: Uuid) -> Result<Option<RuleSet>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_rule_set"])
            .start_timer();

        let rule_set = sqlx::query_as::<_, RuleSet>(
            r#"
            SELECT rule_set_id, year, quarter, version, status, effective_date, expiration_date,
                   created_utc, published_utc, created_by, description, rule_count_withholding,
                   rule_count_composite, source_file_name, source_file_hash
            FROM rule_sets
            WHERE rule_set_id = $1
            "#,
        )
        .bind(rule_set_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get rule set: {}", e)))?;

        timer.observe_duration();

        Ok(rule_set)
    }

    /// Get the active rule set for a period, if any.
    #[instrument(skip(self))]
    pub async fn get_active_rule_set(
        &self,
        year: i32,
        quarter: &str,
    ) -> Result<Option<RuleSet>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_active_rule_set"])
            .start_timer();

        let rule_set = sqlx::query_as::<_, RuleSet>(
            r#"
            SELECT rule_set_id, year, quarter, version, status, effective_date, expiration_date,
                   created_utc, published_utc, created_by, description, rule_count_withholding,
                   rule_count_composite, source_file_name, source_file_hash
            FROM rule_sets
            WHERE year = $1 AND quarter = $2 AND status = 'active'
            "#,
        )
        .bind(year)
        .bind(quarter)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get active rule set: {}", e))
        })?;

        timer.observe_duration();

        Ok(rule_set)
    }

    async fn find_rule_set_by_hash(
        &self,
        year: i32,
        quarter: Quarter,
        hash: &str,
    ) -> Result<Option<Uuid>, AppError> {
        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT rule_set_id FROM rule_sets WHERE year = $1 AND quarter = $2 AND source_file_hash = $3",
        )
        .bind(year)
        .bind(quarter.as_str())
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check file hash: {}", e))
        })?;
        Ok(existing)
    }

    /// Publish a rule set: archive the prior active sibling (if any), mark
    /// the target active, and rebuild its resolved rules — atomically.
    ///
    /// A racing publish for the same period trips the partial unique index
    /// on (year, quarter) WHERE status = 'active' and surfaces as Conflict.
    #[instrument(skip(self, resolved), fields(rule_set_id = %rule_set_id))]
    pub async fn publish_rule_set(
        &self,
        rule_set_id: Uuid,
        effective_date: NaiveDate,
        archive_sibling: Option<Uuid>,
        resolved: &[NewResolvedRule],
    ) -> Result<DateTime<Utc>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["publish_rule_set"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let today = Utc::now().date_naive();

        if let Some(sibling_id) = archive_sibling {
            sqlx::query(
                r#"
                UPDATE rule_sets
                SET status = 'archived', expiration_date = $2
                WHERE rule_set_id = $1 AND status = 'active'
                "#,
            )
            .bind(sibling_id)
            .bind(today)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to archive sibling: {}", e))
            })?;
        }

        let published_utc = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE rule_sets
            SET status = 'active', published_utc = NOW(), effective_date = $2
            WHERE rule_set_id = $1
            RETURNING published_utc
            "#,
        )
        .bind(rule_set_id)
        .bind(effective_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Another rule set was activated concurrently for this period"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to activate rule set: {}", e)),
        })?;

        sqlx::query("DELETE FROM resolved_rules WHERE rule_set_id = $1")
            .bind(rule_set_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to clear stale resolved rules: {}",
                    e
                ))
            })?;

        for rule in resolved {
            sqlx::query(
                r#"
                INSERT INTO resolved_rules (resolved_rule_id, rule_set_id, state_code,
                                            entity_type, withholding_tax_rate,
                                            withholding_income_threshold,
                                            withholding_tax_threshold, composite_tax_rate,
                                            composite_income_threshold, mandatory_filing,
                                            min_tax_amount, max_tax_amount, effective_date,
                                            expiration_date, withholding_rule_id,
                                            composite_rule_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule_set_id)
            .bind(&rule.state_code)
            .bind(&rule.entity_type)
            .bind(rule.withholding_tax_rate)
            .bind(rule.withholding_income_threshold)
            .bind(rule.withholding_tax_threshold)
            .bind(rule.composite_tax_rate)
            .bind(rule.composite_income_threshold)
            .bind(rule.mandatory_filing)
            .bind(rule.min_tax_amount)
            .bind(rule.max_tax_amount)
            .bind(effective_date)
            .bind(rule.expiration_date)
            .bind(rule.withholding_rule_id)
            .bind(rule.composite_rule_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert resolved rule: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Another rule set was activated concurrently for this period"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to commit publish: {}", e)),
        })?;

        timer.observe_duration();

        info!(rule_set_id = %rule_set_id, resolved_rules = resolved.len(), "Rule set published");

        Ok(published_utc)
    }

    /// Archive a rule set with today's date as its expiration.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn archive_rule_set(&self, rule_set_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["archive_rule_set"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE rule_sets
            SET status = 'archived', expiration_date = $2
            WHERE rule_set_id = $1
            "#,
        )
        .bind(rule_set_id)
        .bind(Utc::now().date_naive())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to archive rule set: {}", e))
        })?;

        timer.observe_duration();

        info!(rule_set_id = %rule_set_id, "Rule set archived");

        Ok(())
    }

    /// Delete a rule set; rules, issues, and resolved rules cascade.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn delete_rule_set(&self, rule_set_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_rule_set"])
            .start_timer();

        sqlx::query("DELETE FROM rule_sets WHERE rule_set_id = $1")
            .bind(rule_set_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete rule set: {}", e))
            })?;

        timer.observe_duration();

        info!(rule_set_id = %rule_set_id, "Rule set deleted");

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rule Operations
    // -------------------------------------------------------------------------

    /// Get all withholding rules for a rule set.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn get_withholding_rules(
        &self,
        rule_set_id: Uuid,
    ) -> Result<Vec<WithholdingRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_withholding_rules"])
            .start_timer();

        let rules = sqlx::query_as::<_, WithholdingRule>(
            r#"
            SELECT rule_id, rule_set_id, state_code, entity_type, tax_rate, income_threshold,
                   tax_threshold, created_utc
            FROM withholding_rules
            WHERE rule_set_id = $1
            ORDER BY state_code, entity_type
            "#,
        )
        .bind(rule_set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get withholding rules: {}", e))
        })?;

        timer.observe_duration();

        Ok(rules)
    }

    /// Get all composite rules for a rule set.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn get_composite_rules(
        &self,
        rule_set_id: Uuid,
    ) -> Result<Vec<CompositeRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_composite_rules"])
            .start_timer();

        let rules = sqlx::query_as::<_, CompositeRule>(
            r#"
            SELECT rule_id, rule_set_id, state_code, entity_type, tax_rate, income_threshold,
                   mandatory_filing, min_tax_amount, max_tax_amount, created_utc
            FROM composite_rules
            WHERE rule_set_id = $1
            ORDER BY state_code, entity_type
            "#,
        )
        .bind(rule_set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get composite rules: {}", e))
        })?;

        timer.observe_duration();

        Ok(rules)
    }

    /// Get all resolved rules for a rule set.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn get_resolved_rules(
        &self,
        rule_set_id: Uuid,
    ) -> Result<Vec<ResolvedRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_resolved_rules"])
            .start_timer();

        let rules = sqlx::query_as::<_, ResolvedRule>(
            r#"
            SELECT resolved_rule_id, rule_set_id, state_code, entity_type, withholding_tax_rate,
                   withholding_income_threshold, withholding_tax_threshold, composite_tax_rate,
                   composite_income_threshold, mandatory_filing, min_tax_amount, max_tax_amount,
                   effective_date, expiration_date, withholding_rule_id, composite_rule_id,
                   created_utc
            FROM resolved_rules
            WHERE rule_set_id = $1
            ORDER BY state_code, entity_type
            "#,
        )
        .bind(rule_set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get resolved rules: {}", e))
        })?;

        timer.observe_duration();

        Ok(rules)
    }

    // -------------------------------------------------------------------------
    // Validation Issue Operations
    // -------------------------------------------------------------------------

    /// Get all validation issues for a rule set, ordered as emitted.
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn get_validation_issues(
        &self,
        rule_set_id: Uuid,
    ) -> Result<Vec<ValidationIssue>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_validation_issues"])
            .start_timer();

        let issues = sqlx::query_as::<_, ValidationIssue>(
            r#"
            SELECT issue_id, rule_set_id, sheet_name, row_number, column_name, error_code,
                   severity, message, field_value, created_utc
            FROM validation_issues
            WHERE rule_set_id = $1
            ORDER BY sheet_name, row_number, created_utc
            "#,
        )
        .bind(rule_set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get validation issues: {}", e))
        })?;

        timer.observe_duration();

        Ok(issues)
    }

    /// Count issues by severity: (errors, warnings).
    #[instrument(skip(self), fields(rule_set_id = %rule_set_id))]
    pub async fn count_issues(&self, rule_set_id: Uuid) -> Result<(i64, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_issues"])
            .start_timer();

        let (errors, warnings) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*) FILTER (WHERE severity = 'error'),
                   COUNT(*) FILTER (WHERE severity = 'warning')
            FROM validation_issues
            WHERE rule_set_id = $1
            "#,
        )
        .bind(rule_set_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count issues: {}", e))
        })?;

        timer.observe_duration();

        Ok((errors, warnings))
    }

    // -------------------------------------------------------------------------
    // Upload Session Operations
    // -------------------------------------------------------------------------

    /// Create an upload session for a tax period.
    ///
    /// A duplicate file hash for the same period is a conflict naming the
    /// existing session.
    #[instrument(skip(self, source_file_hash))]
    pub async fn create_upload_session(
        &self,
        year: i32,
        quarter: Quarter,
        source_file_name: Option<&str>,
        source_file_hash: Option<&str>,
    ) -> Result<UploadSession, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_upload_session"])
            .start_timer();

        if let Some(hash) = source_file_hash {
            let existing = sqlx::query_scalar::<_, Uuid>(
                "SELECT session_id FROM upload_sessions WHERE year = $1 AND quarter = $2 AND source_file_hash = $3",
            )
            .bind(year)
            .bind(quarter.as_str())
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check session hash: {}", e))
            })?;

            if let Some(session_id) = existing {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "File already uploaded for {} {} as session {}",
                    year,
                    quarter,
                    session_id
                )));
            }
        }

        let session = sqlx::query_as::<_, UploadSession>(
            r#"
            INSERT INTO upload_sessions (session_id, year, quarter, source_file_name,
                                         source_file_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING session_id, year, quarter, source_file_name, source_file_hash, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(year)
        .bind(quarter.as_str())
        .bind(source_file_name)
        .bind(source_file_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create upload session: {}", e))
        })?;

        timer.observe_duration();

        Ok(session)
    }

    /// Get an upload session by ID.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_upload_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<UploadSession>, AppError> {
        let session = sqlx::query_as::<_, UploadSession>(
            r#"
            SELECT session_id, year, quarter, source_file_name, source_file_hash, created_utc
            FROM upload_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get upload session: {}", e))
        })?;

        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Investor & Distribution Operations
    // -------------------------------------------------------------------------

    /// Create an investor.
    #[instrument(skip(self, input))]
    pub async fn create_investor(&self, input: &NewInvestor) -> Result<Investor, AppError> {
        let investor = sqlx::query_as::<_, Investor>(
            r#"
            INSERT INTO investors (investor_id, name, entity_type, tax_state)
            VALUES ($1, $2, $3, $4)
            RETURNING investor_id, name, entity_type, tax_state, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.entity_type)
        .bind(&input.tax_state)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create investor: {}", e))
        })?;

        Ok(investor)
    }

    /// Fetch investors by ID into a lookup map.
    #[instrument(skip(self, investor_ids))]
    pub async fn get_investors_by_ids(
        &self,
        investor_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Investor>, AppError> {
        if investor_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_investors_by_ids"])
            .start_timer();

        let investors = sqlx::query_as::<_, Investor>(
            r#"
            SELECT investor_id, name, entity_type, tax_state, created_utc
            FROM investors
            WHERE investor_id = ANY($1)
            "#,
        )
        .bind(investor_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get investors: {}", e))
        })?;

        timer.observe_duration();

        Ok(investors
            .into_iter()
            .map(|investor| (investor.investor_id, investor))
            .collect())
    }

    /// Create a distribution with null tax fields.
    #[instrument(skip(self, input), fields(session_id = %input.session_id))]
    pub async fn create_distribution(
        &self,
        input: &NewDistribution,
    ) -> Result<Distribution, AppError> {
        let distribution = sqlx::query_as::<_, Distribution>(
            r#"
            INSERT INTO distributions (distribution_id, session_id, investor_id, jurisdiction,
                                       amount, composite_exemption, withholding_exemption)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING distribution_id, session_id, investor_id, jurisdiction, amount,
                      composite_exemption, withholding_exemption, composite_tax_amount,
                      withholding_tax_amount, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.session_id)
        .bind(input.investor_id)
        .bind(&input.jurisdiction)
        .bind(input.amount)
        .bind(input.composite_exemption)
        .bind(input.withholding_exemption)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create distribution: {}", e))
        })?;

        Ok(distribution)
    }

    /// Get all distributions in an upload session.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_distributions_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<Distribution>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_distributions_by_session"])
            .start_timer();

        let distributions = sqlx::query_as::<_, Distribution>(
            r#"
            SELECT distribution_id, session_id, investor_id, jurisdiction, amount,
                   composite_exemption, withholding_exemption, composite_tax_amount,
                   withholding_tax_amount, created_utc
            FROM distributions
            WHERE session_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get distributions: {}", e))
        })?;

        timer.observe_duration();

        Ok(distributions)
    }

    /// Replace both engine-owned tax fields on a distribution.
    #[instrument(skip(self), fields(distribution_id = %distribution_id))]
    pub async fn update_distribution_taxes(
        &self,
        distribution_id: Uuid,
        composite_tax_amount: Option<Decimal>,
        withholding_tax_amount: Option<Decimal>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE distributions
            SET composite_tax_amount = $2, withholding_tax_amount = $3
            WHERE distribution_id = $1
            "#,
        )
        .bind(distribution_id)
        .bind(composite_tax_amount)
        .bind(withholding_tax_amount)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to update distribution taxes: {}",
                e
            ))
        })?;

        Ok(())
    }
}
