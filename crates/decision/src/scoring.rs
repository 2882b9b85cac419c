//! Deterministic scoring

use crate::config::DecisionConfig;
use crate::error::{DecisionError, DecisionResult};
use ekyc_core::{DecisionStatus, ResultKind, Step};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Digits kept in the composite score
const SCORE_DP: u32 = 4;

/// Outcome of scoring one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub status: DecisionStatus,
    pub score: Decimal,
    /// One entry per factor below the approve threshold, in step order
    pub reasons: Vec<String>,
}

/// Score a set of (kind, quality) pairs.
///
/// Every required kind must be present; if a kind appears more than once the
/// last pair wins.
pub fn assess(
    config: &DecisionConfig,
    qualities: &[(ResultKind, Decimal)],
) -> DecisionResult<Assessment> {
    let mut weighted = Decimal::ZERO;
    let mut reasons = Vec::new();

    for step in Step::REQUIRED {
        let kind = step.result_kind();
        let quality = qualities
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, q)| *q)
            .ok_or(DecisionError::MissingResult(kind))?;

        if quality.is_sign_negative() || quality > Decimal::ONE {
            return Err(DecisionError::InvalidQuality { kind, quality });
        }

        weighted += config.weight(kind) * quality;

        if quality < config.approve_threshold {
            reasons.push(format!(
                "{} quality {} below {}",
                kind, quality, config.approve_threshold
            ));
        }
    }

    let total = config.total_weight();
    if total.is_zero() {
        return Err(DecisionError::Config("weights sum to zero".to_string()));
    }
    let score = (weighted / total).round_dp(SCORE_DP).normalize();

    let status = if score >= config.approve_threshold {
        DecisionStatus::Approved
    } else if score <= config.reject_threshold {
        DecisionStatus::Rejected
    } else {
        DecisionStatus::Review
    };

    Ok(Assessment {
        status,
        score,
        reasons,
    })
}
