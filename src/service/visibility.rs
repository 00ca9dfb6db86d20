// service/visibility.rs
use std::{collections::HashMap, fmt, str::FromStr};

use uuid::Uuid;

use crate::models::contactmodels::{
    Classification, ContactRequest, LawyerPlan, RequestStatus,
};

/// Which of a lawyer's past requests count toward their lead total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadCountScope {
    AllTime,
    ExcludeRejected,
}

impl FromStr for LeadCountScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_time" => Ok(LeadCountScope::AllTime),
            "exclude_rejected" => Ok(LeadCountScope::ExcludeRejected),
            other => Err(format!("unknown lead count scope: {}", other)),
        }
    }
}

impl fmt::Display for LeadCountScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadCountScope::AllTime => f.write_str("all_time"),
            LeadCountScope::ExcludeRejected => f.write_str("exclude_rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VisibilityInput {
    pub plan: LawyerPlan,
    pub total_leads_received: i64,
    pub status: RequestStatus,
    pub both_payments_succeeded: bool,
}

/// Whether the worker's identity may be shown to the lawyer.
pub fn is_unmasked(input: &VisibilityInput, trial_quota: i64) -> bool {
    input.plan == LawyerPlan::Pro
        || input.status == RequestStatus::Accepted
        || input.both_payments_succeeded
        || input.total_leads_received <= trial_quota
}

/// The "SOLO PRO" gate: hot leads can only be accepted on the pro plan.
pub fn can_accept(classification: Classification, plan: LawyerPlan) -> bool {
    classification != Classification::Hot || plan == LawyerPlan::Pro
}

#[derive(Debug, Clone, Copy)]
pub struct LeadCounting {
    pub scope: LeadCountScope,
    pub gated_hot_consumes_trial: bool,
}

impl LeadCounting {
    fn counts(&self, request: &ContactRequest, plan: LawyerPlan) -> bool {
        if request.status == RequestStatus::Rejected {
            if self.scope == LeadCountScope::ExcludeRejected {
                return false;
            }
            if !self.gated_hot_consumes_trial && !can_accept(request.classification, plan) {
                return false;
            }
        }
        true
    }
}

/// Stable per-request lead ordinal for one lawyer profile.
///
/// `requests` must hold every request of the profile. The ordinal of a request
/// is one plus the number of earlier requests (by `created_at`, then `id`)
/// that count under `counting`, so a lead's position never depends on leads
/// that arrived after it.
pub fn lead_ordinals(
    requests: &[ContactRequest],
    plan: LawyerPlan,
    counting: LeadCounting,
) -> HashMap<Uuid, i64> {
    let mut ordered: Vec<&ContactRequest> = requests.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let mut ordinals = HashMap::with_capacity(ordered.len());
    let mut counted_before = 0i64;
    for request in ordered {
        ordinals.insert(request.id, counted_before + 1);
        if counting.counts(request, plan) {
            counted_before += 1;
        }
    }
    ordinals
}
