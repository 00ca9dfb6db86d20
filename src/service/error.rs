use thiserror::Error;
use uuid::Uuid;

use crate::{error::HttpError, service::payment_gateway::GatewayError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment authorization failed: {0}")]
    PaymentAuthorizationFailed(String),

    #[error("Payment capture failed, request left pending: {0}")]
    PaymentCaptureFailed(String),

    #[error("Could not release the payment hold: {0}")]
    PaymentVoidFailed(String),

    #[error("{0}")]
    PolicyViolation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Contact request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Lawyer profile not found")]
    LawyerProfileNotFound,

    #[error("User {0} is not a participant of contact request {1}")]
    NotParticipant(Uuid, Uuid),

    #[error("Worker contact details are locked until the lead is unlocked")]
    ContactLocked,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn authorization(err: GatewayError) -> Self {
        ServiceError::PaymentAuthorizationFailed(err.to_string())
    }

    pub fn capture(err: GatewayError) -> Self {
        ServiceError::PaymentCaptureFailed(err.to_string())
    }

    pub fn void(err: GatewayError) -> Self {
        ServiceError::PaymentVoidFailed(err.to_string())
    }

    /// Transient failures the caller may retry without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::PaymentCaptureFailed(_) | ServiceError::PaymentVoidFailed(_)
        )
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(_) => {
                HttpError::bad_request(error.to_string()).with_code("validation_error")
            }

            ServiceError::PaymentAuthorizationFailed(_) => {
                HttpError::payment_required(error.to_string()).with_code("payment_authorization_failed")
            }

            ServiceError::PaymentCaptureFailed(_) => {
                HttpError::service_unavailable(error.to_string()).with_code("payment_capture_failed")
            }

            ServiceError::PaymentVoidFailed(_) => {
                HttpError::service_unavailable(error.to_string()).with_code("payment_void_failed")
            }

            ServiceError::PolicyViolation(_) => {
                HttpError::forbidden(error.to_string()).with_code("upgrade_required")
            }

            ServiceError::Conflict(_) => HttpError::conflict(error.to_string()).with_code("conflict"),

            ServiceError::RequestNotFound(_) | ServiceError::LawyerProfileNotFound => {
                HttpError::not_found(error.to_string()).with_code("not_found")
            }

            ServiceError::NotParticipant(_, _) => {
                HttpError::forbidden(error.to_string()).with_code("forbidden")
            }

            ServiceError::ContactLocked => {
                HttpError::forbidden(error.to_string()).with_code("contact_locked")
            }

            ServiceError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                HttpError::server_error("Internal server error")
            }

            ServiceError::Other(_) => HttpError::server_error(error.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Other(format!("transition task aborted: {}", err))
    }
}
