// service/lead_classifier.rs
use serde::Serialize;

use crate::{
    config::ContactPolicy,
    models::contactmodels::{Classification, Urgency},
};

pub const WORKER_FEE: i64 = 50;
pub const LAWYER_FEE_NORMAL: i64 = 150;
pub const LAWYER_FEE_HOT: i64 = 300;

/// Case attributes available at creation time.
#[derive(Debug, Clone, Default)]
pub struct CaseSignals {
    pub urgency: Urgency,
    pub case_type: String,
    pub estimated_severance: Option<i64>,
    pub years_of_service: Option<i32>,
    /// Externally derived risk/value score in `[0, 1]`.
    pub risk_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAssessment {
    pub classification: Classification,
    pub worker_fee: i64,
    pub lawyer_fee: i64,
    pub urgency_score: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct LeadClassifier {
    severance_threshold: i64,
    years_of_service_threshold: i32,
    risk_score_threshold: f64,
}

impl LeadClassifier {
    pub fn new(policy: &ContactPolicy) -> Self {
        Self {
            severance_threshold: policy.hot_severance_threshold,
            years_of_service_threshold: policy.hot_years_of_service_threshold,
            risk_score_threshold: policy.hot_risk_score_threshold,
        }
    }

    /// Computed once at creation; the result is stored and never recomputed.
    pub fn assess(&self, signals: &CaseSignals) -> LeadAssessment {
        let classification = if self.is_hot(signals) {
            Classification::Hot
        } else {
            Classification::Normal
        };

        let (worker_fee, lawyer_fee) = fees_for(classification);

        let mut urgency_score = if signals.urgency == Urgency::High { 80 } else { 50 };
        if classification == Classification::Hot {
            urgency_score += 20;
        }

        tracing::debug!(
            case_type = %signals.case_type,
            classification = ?classification,
            urgency_score,
            "Lead classified"
        );

        LeadAssessment {
            classification,
            worker_fee,
            lawyer_fee,
            urgency_score,
        }
    }

    fn is_hot(&self, signals: &CaseSignals) -> bool {
        if signals.urgency == Urgency::High {
            return true;
        }

        let high_value = signals
            .estimated_severance
            .map_or(false, |severance| severance > self.severance_threshold);
        let long_tenure = signals
            .years_of_service
            .map_or(false, |years| years > self.years_of_service_threshold);
        let risky = signals
            .risk_score
            .map_or(false, |score| score >= self.risk_score_threshold);

        high_value || long_tenure || risky
    }
}

pub fn fees_for(classification: Classification) -> (i64, i64) {
    match classification {
        Classification::Hot => (WORKER_FEE, LAWYER_FEE_HOT),
        Classification::Normal => (WORKER_FEE, LAWYER_FEE_NORMAL),
    }
}
