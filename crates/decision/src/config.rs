//! Decision configuration
//!
//! Weights and thresholds are configuration, tunable from the config file
//! without recompilation.

use crate::error::{DecisionError, DecisionResult};
use ekyc_core::{ResultKind, Step};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Scoring weights and classification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    // === Weights ===
    #[serde(default = "default_ocr_weight")]
    pub ocr_weight: Decimal,

    #[serde(default = "default_face_weight")]
    pub face_weight: Decimal,

    #[serde(default = "default_liveness_weight")]
    pub liveness_weight: Decimal,

    // === Thresholds ===
    /// Composite at or above this approves
    #[serde(default = "default_approve_threshold")]
    pub approve_threshold: Decimal,

    /// Composite at or below this rejects
    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: Decimal,
}

fn default_ocr_weight() -> Decimal {
    Decimal::new(3, 1)
}

fn default_face_weight() -> Decimal {
    Decimal::new(4, 1)
}

fn default_liveness_weight() -> Decimal {
    Decimal::new(3, 1)
}

fn default_approve_threshold() -> Decimal {
    Decimal::new(80, 2)
}

fn default_reject_threshold() -> Decimal {
    Decimal::new(50, 2)
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            ocr_weight: default_ocr_weight(),
            face_weight: default_face_weight(),
            liveness_weight: default_liveness_weight(),
            approve_threshold: default_approve_threshold(),
            reject_threshold: default_reject_threshold(),
        }
    }
}

impl DecisionConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn weight(&self, kind: ResultKind) -> Decimal {
        match kind {
            ResultKind::Ocr => self.ocr_weight,
            ResultKind::Face => self.face_weight,
            ResultKind::Liveness => self.liveness_weight,
        }
    }

    /// Sum of the weights of every required step
    pub fn total_weight(&self) -> Decimal {
        Step::REQUIRED
            .iter()
            .map(|step| self.weight(step.result_kind()))
            .sum()
    }

    pub fn validate(&self) -> DecisionResult<()> {
        for step in Step::REQUIRED {
            let kind = step.result_kind();
            if self.weight(kind).is_sign_negative() {
                return Err(DecisionError::Config(format!(
                    "{} weight must not be negative",
                    kind
                )));
            }
        }
        if self.total_weight().is_zero() {
            return Err(DecisionError::Config("weights sum to zero".to_string()));
        }
        if self.reject_threshold >= self.approve_threshold {
            return Err(DecisionError::Config(format!(
                "reject threshold {} must be below approve threshold {}",
                self.reject_threshold, self.approve_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = DecisionConfig::default();

        assert_eq!(config.weight(ResultKind::Ocr), dec!(0.3));
        assert_eq!(config.weight(ResultKind::Face), dec!(0.4));
        assert_eq!(config.weight(ResultKind::Liveness), dec!(0.3));
        assert_eq!(config.approve_threshold, dec!(0.80));
        assert_eq!(config.reject_threshold, dec!(0.50));
        assert_eq!(config.total_weight(), dec!(1.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DecisionConfig =
            serde_json::from_str(r#"{"approve_threshold": "0.9"}"#).unwrap();
        assert_eq!(config.approve_threshold, dec!(0.9));
        assert_eq!(config.face_weight, dec!(0.4));
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let inverted = DecisionConfig {
            reject_threshold: dec!(0.9),
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(DecisionError::Config(_))));

        let zero = DecisionConfig {
            ocr_weight: Decimal::ZERO,
            face_weight: Decimal::ZERO,
            liveness_weight: Decimal::ZERO,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let negative = DecisionConfig {
            face_weight: dec!(-0.1),
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }
}
