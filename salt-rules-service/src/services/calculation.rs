//! Tax calculation engine.
//!
//! The per-distribution algorithm is pure and order-independent; the
//! service wrapper loads a session batch, resolves the active rule set
//! for the session's period, and persists the recomputed amounts.

use crate::models::{CompositeRule, Distribution, EntityCode, Investor, WithholdingRule};
use crate::services::database::Database;
use crate::services::metrics::TAX_CALCULATIONS_TOTAL;
use rust_decimal::{Decimal, RoundingStrategy};
use salt_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Active rules indexed by (jurisdiction, canonical entity coding).
#[derive(Debug, Default)]
pub struct RuleLookups {
    composite: HashMap<(String, String), CompositeRule>,
    withholding: HashMap<(String, String), WithholdingRule>,
}

impl RuleLookups {
    pub fn new(withholding: Vec<WithholdingRule>, composite: Vec<CompositeRule>) -> Self {
        let withholding = withholding
            .into_iter()
            .map(|rule| (rule_key(&rule.state_code, &rule.entity_type), rule))
            .collect();
        let composite = composite
            .into_iter()
            .map(|rule| (rule_key(&rule.state_code, &rule.entity_type), rule))
            .collect();
        RuleLookups {
            composite,
            withholding,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.composite.is_empty() && self.withholding.is_empty()
    }
}

fn rule_key(state: &str, entity: &str) -> (String, String) {
    (state.trim().to_uppercase(), entity.to_string())
}

/// Computed tax amounts for one distribution. Both fields null means
/// "no tax applies" — a normal outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaxAmounts {
    pub composite_tax_amount: Option<Decimal>,
    pub withholding_tax_amount: Option<Decimal>,
}

/// Round half-up (midpoint away from zero) to cents.
fn round_tax(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount exceeds a threshold; a missing threshold is always exceeded.
fn exceeds(amount: Decimal, threshold: Option<Decimal>) -> bool {
    threshold.map_or(true, |t| amount > t)
}

/// Apply the active rules to one distribution. Idempotent: the result is
/// a full replacement for both engine-owned fields.
pub fn calculate_taxes(
    distribution: &Distribution,
    investor: Option<&Investor>,
    lookups: &RuleLookups,
) -> TaxAmounts {
    // Unlinked distributions carry no tax.
    let investor = match investor {
        Some(investor) => investor,
        None => return TaxAmounts::default(),
    };

    if distribution.composite_exemption || distribution.withholding_exemption {
        return TaxAmounts::default();
    }

    let jurisdiction = distribution.jurisdiction.trim().to_uppercase();

    // Same-state distributions are never taxed here.
    if jurisdiction == investor.tax_state.trim().to_uppercase() {
        return TaxAmounts::default();
    }

    let entity_code = match EntityCode::from_variant(&investor.entity_type) {
        Some(code) => code,
        None => return TaxAmounts::default(),
    };
    let key = (jurisdiction, entity_code.as_str().to_string());

    // Composite takes precedence over withholding.
    if let Some(rule) = lookups.composite.get(&key) {
        if rule.mandatory_filing && exceeds(distribution.amount, Some(rule.income_threshold)) {
            let tax = round_tax(distribution.amount * rule.tax_rate);
            if tax > Decimal::ZERO {
                return TaxAmounts {
                    composite_tax_amount: Some(tax),
                    withholding_tax_amount: None,
                };
            }
        }
    }

    let rule = match lookups.withholding.get(&key) {
        Some(rule) => rule,
        None => return TaxAmounts::default(),
    };
    if !exceeds(distribution.amount, Some(rule.income_threshold)) {
        return TaxAmounts::default();
    }

    let tax = round_tax(distribution.amount * rule.tax_rate);
    // A per-investor reporting threshold discards small computed taxes.
    if let Some(threshold) = rule.tax_threshold {
        if tax <= threshold {
            return TaxAmounts::default();
        }
    }
    if tax > Decimal::ZERO {
        TaxAmounts {
            composite_tax_amount: None,
            withholding_tax_amount: Some(tax),
        }
    } else {
        TaxAmounts::default()
    }
}

/// Batch tax calculation over an upload session.
#[derive(Clone)]
pub struct CalculationService {
    db: Arc<Database>,
}

impl CalculationService {
    pub fn new(db: Arc<Database>) -> Self {
        CalculationService { db }
    }

    /// Recompute both tax fields for every distribution in the session.
    ///
    /// No active rule set for the session's period, or an active rule set
    /// with no rules, resets every distribution to null taxes; that is the
    /// documented "no rules configured" state, not an error.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn apply_tax_calculation(&self, session_id: Uuid) -> Result<(), AppError> {
        let session = self
            .db
            .get_upload_session(session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Upload session {} not found", session_id))
            })?;

        let lookups = match self
            .db
            .get_active_rule_set(session.year, &session.quarter)
            .await?
        {
            Some(rule_set) => {
                let withholding = self.db.get_withholding_rules(rule_set.rule_set_id).await?;
                let composite = self.db.get_composite_rules(rule_set.rule_set_id).await?;
                RuleLookups::new(withholding, composite)
            }
            None => RuleLookups::default(),
        };

        let distributions = self.db.get_distributions_by_session(session_id).await?;
        let investor_ids: Vec<Uuid> =
            distributions.iter().filter_map(|d| d.investor_id).collect();
        let investors = self.db.get_investors_by_ids(&investor_ids).await?;

        let mut taxed = 0usize;
        for distribution in &distributions {
            let investor = distribution
                .investor_id
                .and_then(|id| investors.get(&id));
            let amounts = calculate_taxes(distribution, investor, &lookups);
            if amounts.composite_tax_amount.is_some() || amounts.withholding_tax_amount.is_some() {
                taxed += 1;
            }
            self.db
                .update_distribution_taxes(
                    distribution.distribution_id,
                    amounts.composite_tax_amount,
                    amounts.withholding_tax_amount,
                )
                .await?;
        }

        TAX_CALCULATIONS_TOTAL
            .with_label_values(&["session"])
            .inc_by(distributions.len() as f64);

        info!(
            session_id = %session_id,
            distributions = distributions.len(),
            taxed = taxed,
            "Tax calculation pass completed"
        );

        Ok(())
    }
}
