//! Prediction decision data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Human-readable alert label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLabel {
    #[serde(rename = "DELAY")]
    Delay,
    #[serde(rename = "ON-TIME")]
    OnTime,
}

/// Two-level qualitative risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLabel {
    High,
    Low,
}

/// Decision produced for a single scored request.
///
/// `probability` keeps full precision; the outbound response carries the
/// rounded display value. `threshold` records the operating cutoff the
/// classification was made against, for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionDecision {
    /// Unique decision identifier
    pub decision_id: String,

    /// Probability of delay, full precision
    pub probability: f64,

    /// Binary class: 1 = delay alert, 0 = on time
    pub predicted_class: u8,

    /// Alert label derived from the class
    pub label: AlertLabel,

    /// Qualitative risk level
    pub risk_level: RiskLabel,

    /// Threshold the probability was compared against
    pub threshold: f64,

    /// Identifier of the scoring model that produced the probability
    pub model: String,

    /// Decision timestamp
    pub decided_at: DateTime<Utc>,
}

impl PredictionDecision {
    /// Build a decision from a probability and the threshold in force.
    /// The boundary is inclusive: probability == threshold is a delay.
    pub fn classify(probability: f64, threshold: f64, model: &str) -> Self {
        let delayed = probability >= threshold;
        Self {
            decision_id: uuid::Uuid::new_v4().to_string(),
            probability,
            predicted_class: u8::from(delayed),
            label: if delayed {
                AlertLabel::Delay
            } else {
                AlertLabel::OnTime
            },
            risk_level: if delayed {
                RiskLabel::High
            } else {
                RiskLabel::Low
            },
            threshold,
            model: model.to_string(),
            decided_at: Utc::now(),
        }
    }

    /// Probability rounded to 4 decimals for display
    pub fn rounded_probability(&self) -> f64 {
        (self.probability * 10_000.0).round() / 10_000.0
    }
}

/// Outbound response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreResponse {
    Ok {
        request_id: String,
        decision_id: String,
        prediction: AlertLabel,
        /// Display probability, rounded to 4 decimals
        confidence_score: f64,
        threshold_used: f64,
        risk_level: RiskLabel,
        model_used: String,
    },
    Failed {
        request_id: String,
        kind: String,
        detail: String,
    },
}

impl ScoreResponse {
    pub fn from_decision(request_id: &str, decision: &PredictionDecision) -> Self {
        ScoreResponse::Ok {
            request_id: request_id.to_string(),
            decision_id: decision.decision_id.clone(),
            prediction: decision.label,
            confidence_score: decision.rounded_probability(),
            threshold_used: decision.threshold,
            risk_level: decision.risk_level,
            model_used: decision.model.clone(),
        }
    }

    pub fn from_error(request_id: &str, error: &PipelineError) -> Self {
        ScoreResponse::Failed {
            request_id: request_id.to_string(),
            kind: error.kind().to_string(),
            detail: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_inclusive_boundary() {
        let decision = PredictionDecision::classify(0.35, 0.35, "xgboost");
        assert_eq!(decision.predicted_class, 1);
        assert_eq!(decision.label, AlertLabel::Delay);
        assert_eq!(decision.risk_level, RiskLabel::High);

        let decision = PredictionDecision::classify(0.349999, 0.35, "xgboost");
        assert_eq!(decision.predicted_class, 0);
        assert_eq!(decision.label, AlertLabel::OnTime);
        assert_eq!(decision.risk_level, RiskLabel::Low);
    }

    #[test]
    fn test_rounding_keeps_full_precision_internally() {
        let decision = PredictionDecision::classify(0.123456789, 0.5, "xgboost");
        assert_eq!(decision.rounded_probability(), 0.1235);
        assert_eq!(decision.probability, 0.123456789);
    }

    #[test]
    fn test_response_serialization() {
        let decision = PredictionDecision::classify(0.72, 0.35, "xgboost");
        let response = ScoreResponse::from_decision("req-1", &decision);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"prediction\":\"DELAY\""));
        assert!(json.contains("\"risk_level\":\"HIGH\""));

        let back: ScoreResponse = serde_json::from_str(&json).unwrap();
        match back {
            ScoreResponse::Ok { threshold_used, .. } => assert_eq!(threshold_used, 0.35),
            ScoreResponse::Failed { .. } => panic!("expected ok response"),
        }
    }

    #[test]
    fn test_failed_response_carries_kind() {
        let err = PipelineError::UnknownModel("nope".to_string());
        let response = ScoreResponse::from_error("req-2", &err);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"kind\":\"unknown_model\""));
    }
}
