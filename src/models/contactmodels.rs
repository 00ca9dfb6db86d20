// models/contactmodels.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "contact_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub fn to_str(&self) -> &str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Expired => "expired",
        }
    }
}

/// Conversational turn of an accepted request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "contact_sub_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubStatus {
    WaitingLawyer,
    WaitingWorkerResponse,
    WaitingLawyerResponse,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "lead_classification", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Normal,
    Hot,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "case_urgency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

/// Lawyer-side pipeline label. Independent of `RequestStatus`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "crm_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrmStatus {
    #[default]
    New,
    Contacted,
    Negotiating,
    ClosedWon,
    ClosedLost,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "payment_gateway", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentGatewayKind {
    #[default]
    Stripe,
    Mercadopago,
}

impl PaymentGatewayKind {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentGatewayKind::Stripe => "stripe",
            PaymentGatewayKind::Mercadopago => "mercadopago",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "refund_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Processed,
    /// Void kept failing; needs manual reconciliation.
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "lawyer_plan", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LawyerPlan {
    Basic,
    Pro,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LawyerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub professional_name: Option<String>,
    pub plan: LawyerPlan,
    pub subscription_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub lawyer_profile_id: Uuid,

    pub case_summary: String,
    pub case_type: String,
    pub urgency: Urgency,
    pub urgency_score: i32,
    pub classification: Classification,

    pub worker_payment_gateway: PaymentGatewayKind,
    pub worker_fee: i64,
    pub worker_transaction_id: Option<String>,
    pub worker_paid: bool,
    pub lawyer_payment_amount: i64,
    pub lawyer_transaction_id: Option<String>,
    pub lawyer_paid: bool,
    pub both_payments_succeeded: bool,
    pub refund_status: Option<RefundStatus>,

    pub status: RequestStatus,
    pub sub_status: SubStatus,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,

    pub last_message_content: Option<String>,
    pub last_message_sender_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count_worker: i32,
    pub unread_count_lawyer: i32,

    pub crm_status: CrmStatus,

    #[serde(skip)]
    pub lease_token: Option<Uuid>,
    #[serde(skip)]
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactRequest {
    /// Which side of the conversation `user_id` is on, if any.
    pub fn party_of(&self, user_id: Uuid, lawyer_user_id: Uuid) -> Option<Party> {
        if user_id == self.worker_id {
            Some(Party::Worker)
        } else if user_id == lawyer_user_id {
            Some(Party::Lawyer)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Worker,
    Lawyer,
}

impl Party {
    /// Sub-status after this party speaks: the ball is in the other court.
    pub fn sub_status_after_sending(&self) -> SubStatus {
        match self {
            Party::Worker => SubStatus::WaitingLawyerResponse,
            Party::Lawyer => SubStatus::WaitingWorkerResponse,
        }
    }
}

/// Row written by `create` once the worker hold is authorized.
#[derive(Debug, Clone)]
pub struct NewContactRequest {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub lawyer_profile_id: Uuid,
    pub case_summary: String,
    pub case_type: String,
    pub urgency: Urgency,
    pub urgency_score: i32,
    pub classification: Classification,
    pub worker_payment_gateway: PaymentGatewayKind,
    pub worker_fee: i64,
    pub worker_transaction_id: String,
    pub lawyer_payment_amount: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Everything the accept commit writes in one transaction.
#[derive(Debug, Clone)]
pub struct AcceptanceCommit {
    pub worker_capture_ref: String,
    pub lawyer_transaction_ref: String,
    pub lawyer_user_id: Uuid,
    pub welcome_message: String,
    pub accepted_at: DateTime<Utc>,
}

/// Terminal closure that releases the worker hold without charging anyone.
#[derive(Debug, Clone)]
pub struct ClosureCommit {
    pub status: RequestStatus,
    pub reason: Option<String>,
    pub refund_status: RefundStatus,
    pub closed_at: DateTime<Utc>,
}
