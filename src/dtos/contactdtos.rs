// dtos/contactdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{
    chatmodels::{ChatMessage, MessageType},
    contactmodels::*,
};

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequestDto {
    pub lawyer_profile_id: Uuid,

    #[validate(
        length(min = 1, message = "Case summary is required"),
        length(max = 4000, message = "Case summary is too long"),
        custom = "validate_not_blank"
    )]
    pub case_summary: String,

    #[validate(
        length(min = 1, max = 100, message = "Case type is required"),
        custom = "validate_not_blank"
    )]
    pub case_type: String,

    #[serde(default)]
    pub urgency: Urgency,

    #[serde(default)]
    pub worker_payment_gateway: PaymentGatewayKind,

    #[validate(range(min = 0, message = "Estimated severance cannot be negative"))]
    pub estimated_severance: Option<i64>,

    #[validate(range(min = 0, max = 80, message = "Years of service is out of range"))]
    pub years_of_service: Option<i32>,

    #[validate(range(min = 0.0, max = 1.0, message = "Risk score must be between 0 and 1"))]
    pub risk_score: Option<f64>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RejectContactDto {
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageDto {
    #[validate(
        length(min = 1, max = 5000, message = "Message must be between 1 and 5000 characters"),
        custom = "validate_not_blank"
    )]
    pub content: String,

    #[serde(default)]
    pub message_type: MessageType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCrmStatusDto {
    pub crm_status: CrmStatus,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReceivedQueryDto {
    pub status: Option<RequestStatus>,
    pub lawyer_profile_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactResponseDto {
    pub request_id: Uuid,
    pub classification: Classification,
    pub worker_fee: i64,
    pub lawyer_fee: i64,
    pub urgency_score: i32,
    pub expires_at: DateTime<Utc>,
}

/// Worker identity fields, present only on unmasked leads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerContactDto {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A contact request as a lawyer sees it.
///
/// Masked leads carry no worker identifier, name, email or phone at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadViewDto {
    pub id: Uuid,
    pub lawyer_profile_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerContactDto>,

    pub case_summary: String,
    pub case_type: String,
    pub urgency: Urgency,
    pub urgency_score: i32,
    pub classification: Classification,
    pub lawyer_payment_amount: i64,

    pub status: RequestStatus,
    pub sub_status: SubStatus,
    pub crm_status: CrmStatus,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i32,

    pub lead_number: i64,
    pub unmasked: bool,
    pub actionable: bool,
    pub upsell: bool,
    pub created_at: DateTime<Utc>,
}

impl LeadViewDto {
    pub fn masked(request: &ContactRequest, lead_number: i64, actionable: bool) -> Self {
        LeadViewDto {
            id: request.id,
            lawyer_profile_id: request.lawyer_profile_id,
            worker_id: None,
            worker: None,
            case_summary: request.case_summary.clone(),
            case_type: request.case_type.clone(),
            urgency: request.urgency,
            urgency_score: request.urgency_score,
            classification: request.classification,
            lawyer_payment_amount: request.lawyer_payment_amount,
            status: request.status,
            sub_status: request.sub_status,
            crm_status: request.crm_status,
            expires_at: request.expires_at,
            accepted_at: request.accepted_at,
            rejected_at: request.rejected_at,
            rejection_reason: request.rejection_reason.clone(),
            expired_at: request.expired_at,
            last_message_content: None,
            last_message_at: None,
            unread_count: request.unread_count_lawyer,
            lead_number,
            unmasked: false,
            actionable,
            upsell: true,
            created_at: request.created_at,
        }
    }

    pub fn unmasked(
        request: &ContactRequest,
        worker: Option<WorkerContactDto>,
        lead_number: i64,
        actionable: bool,
    ) -> Self {
        LeadViewDto {
            worker_id: Some(request.worker_id),
            worker,
            last_message_content: request.last_message_content.clone(),
            last_message_at: request.last_message_at,
            unmasked: true,
            upsell: !actionable,
            ..Self::masked(request, lead_number, actionable)
        }
    }
}

/// `GetRequest` answer: workers get their own row, lawyers the lead view.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestViewDto {
    Worker(ContactRequest),
    Lawyer(LeadViewDto),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponseDto {
    pub message: ChatMessage,
    pub request: ContactRequest,
}
