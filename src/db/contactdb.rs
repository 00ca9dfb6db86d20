// db/contactdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Error;
use uuid::Uuid;

use super::{db::DBClient, userdb::IdentityProvider};
use crate::models::{
    chatmodels::{ChatMessage, MessageType},
    contactmodels::*,
};

#[async_trait]
pub trait LawyerExt {
    async fn get_lawyer_profile(&self, profile_id: Uuid) -> Result<Option<LawyerProfile>, Error>;

    async fn get_lawyer_profile_by_user(&self, user_id: Uuid) -> Result<Option<LawyerProfile>, Error>;
}

/// Persistence of contact requests and their chat log.
///
/// Every state change is a conditional update: transitions out of `pending`
/// require the caller to hold the row's lease, chat writes require
/// `accepted`. A `None` result means the condition did not hold.
#[async_trait]
pub trait ContactRequestExt {
    /// Returns `None` when the worker already has a pending request for the profile.
    async fn insert_contact_request(
        &self,
        new_request: NewContactRequest,
    ) -> Result<Option<ContactRequest>, Error>;

    async fn get_contact_request(&self, request_id: Uuid) -> Result<Option<ContactRequest>, Error>;

    async fn find_pending_for_pair(
        &self,
        worker_id: Uuid,
        lawyer_profile_id: Uuid,
    ) -> Result<Option<ContactRequest>, Error>;

    /// All requests of a profile, oldest first.
    async fn list_for_lawyer_profile(
        &self,
        lawyer_profile_id: Uuid,
    ) -> Result<Vec<ContactRequest>, Error>;

    /// A worker's requests, newest first.
    async fn list_for_worker(&self, worker_id: Uuid) -> Result<Vec<ContactRequest>, Error>;

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ContactRequest>, Error>;

    /// Take the single-writer lease on a pending request.
    async fn claim_pending(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<ContactRequest>, Error>;

    async fn release_lease(&self, request_id: Uuid, lease_token: Uuid) -> Result<(), Error>;

    /// Swap the worker authorization reference on a pending request, provided
    /// it still points at `expected_hold`.
    async fn replace_worker_hold(
        &self,
        request_id: Uuid,
        expected_hold: &str,
        worker_transaction_id: &str,
    ) -> Result<bool, Error>;

    /// Accept and write the welcome message in one transaction.
    async fn commit_acceptance(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        commit: AcceptanceCommit,
    ) -> Result<Option<(ContactRequest, ChatMessage)>, Error>;

    async fn commit_closure(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        commit: ClosureCommit,
    ) -> Result<Option<ContactRequest>, Error>;

    /// Append a message and refresh the request's chat mirror in one transaction.
    async fn append_message(
        &self,
        request_id: Uuid,
        sender_id: Uuid,
        sender: Party,
        content: String,
        message_type: MessageType,
        now: DateTime<Utc>,
    ) -> Result<Option<(ChatMessage, ContactRequest)>, Error>;

    async fn list_messages(&self, request_id: Uuid) -> Result<Vec<ChatMessage>, Error>;

    async fn reset_unread(
        &self,
        request_id: Uuid,
        reader: Party,
    ) -> Result<Option<ContactRequest>, Error>;

    async fn set_crm_status(
        &self,
        request_id: Uuid,
        crm_status: CrmStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<ContactRequest>, Error>;
}

/// Everything the contact engine needs from storage.
pub trait ContactStore: ContactRequestExt + LawyerExt + IdentityProvider + Send + Sync {}

impl<T> ContactStore for T where T: ContactRequestExt + LawyerExt + IdentityProvider + Send + Sync {}

#[async_trait]
impl LawyerExt for DBClient {
    async fn get_lawyer_profile(&self, profile_id: Uuid) -> Result<Option<LawyerProfile>, Error> {
        sqlx::query_as::<_, LawyerProfile>(
            r#"
            SELECT id, user_id, professional_name, plan, subscription_active, created_at
            FROM lawyer_profiles
            WHERE id = $1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_lawyer_profile_by_user(&self, user_id: Uuid) -> Result<Option<LawyerProfile>, Error> {
        sqlx::query_as::<_, LawyerProfile>(
            r#"
            SELECT id, user_id, professional_name, plan, subscription_active, created_at
            FROM lawyer_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl ContactRequestExt for DBClient {
    async fn insert_contact_request(
        &self,
        new_request: NewContactRequest,
    ) -> Result<Option<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            INSERT INTO contact_requests (
                id, worker_id, lawyer_profile_id, case_summary, case_type,
                urgency, urgency_score, classification,
                worker_payment_gateway, worker_fee, worker_transaction_id,
                lawyer_payment_amount, status, sub_status, expires_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    'pending', 'waiting_lawyer', $13, $14, $14)
            ON CONFLICT (worker_id, lawyer_profile_id) WHERE status = 'pending'
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new_request.id)
        .bind(new_request.worker_id)
        .bind(new_request.lawyer_profile_id)
        .bind(new_request.case_summary)
        .bind(new_request.case_type)
        .bind(new_request.urgency)
        .bind(new_request.urgency_score)
        .bind(new_request.classification)
        .bind(new_request.worker_payment_gateway)
        .bind(new_request.worker_fee)
        .bind(new_request.worker_transaction_id)
        .bind(new_request.lawyer_payment_amount)
        .bind(new_request.expires_at)
        .bind(new_request.created_at)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_contact_request(&self, request_id: Uuid) -> Result<Option<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"SELECT * FROM contact_requests WHERE id = $1"#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_pending_for_pair(
        &self,
        worker_id: Uuid,
        lawyer_profile_id: Uuid,
    ) -> Result<Option<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            SELECT * FROM contact_requests
            WHERE worker_id = $1 AND lawyer_profile_id = $2 AND status = 'pending'
            "#,
        )
        .bind(worker_id)
        .bind(lawyer_profile_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_for_lawyer_profile(
        &self,
        lawyer_profile_id: Uuid,
    ) -> Result<Vec<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            SELECT * FROM contact_requests
            WHERE lawyer_profile_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(lawyer_profile_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_for_worker(&self, worker_id: Uuid) -> Result<Vec<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            SELECT * FROM contact_requests
            WHERE worker_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            SELECT * FROM contact_requests
            WHERE status = 'pending'
              AND expires_at < $1
              AND (lease_token IS NULL OR lease_expires_at < $1)
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn claim_pending(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            UPDATE contact_requests
            SET lease_token = $2, lease_expires_at = $4
            WHERE id = $1
              AND status = 'pending'
              AND (lease_token IS NULL OR lease_expires_at < $3)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(lease_token)
        .bind(now)
        .bind(lease_until)
        .fetch_optional(&self.pool)
        .await
    }

    async fn release_lease(&self, request_id: Uuid, lease_token: Uuid) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE contact_requests
            SET lease_token = NULL, lease_expires_at = NULL
            WHERE id = $1 AND lease_token = $2
            "#,
        )
        .bind(request_id)
        .bind(lease_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_worker_hold(
        &self,
        request_id: Uuid,
        expected_hold: &str,
        worker_transaction_id: &str,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE contact_requests
            SET worker_transaction_id = $3, updated_at = NOW()
            WHERE id = $1 AND worker_transaction_id = $2 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .bind(expected_hold)
        .bind(worker_transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit_acceptance(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        commit: AcceptanceCommit,
    ) -> Result<Option<(ContactRequest, ChatMessage)>, Error> {
        let mut tx = self.pool.begin().await?;

        let accepted = sqlx::query_as::<_, ContactRequest>(
            r#"
            UPDATE contact_requests
            SET status = 'accepted',
                sub_status = 'waiting_worker_response',
                accepted_at = $3,
                worker_paid = TRUE,
                worker_transaction_id = $4,
                lawyer_paid = TRUE,
                lawyer_transaction_id = $5,
                both_payments_succeeded = TRUE,
                last_message_content = $6,
                last_message_sender_id = $7,
                last_message_at = $3,
                unread_count_worker = 1,
                unread_count_lawyer = 0,
                lease_token = NULL,
                lease_expires_at = NULL,
                updated_at = $3
            WHERE id = $1 AND status = 'pending' AND lease_token = $2
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(lease_token)
        .bind(commit.accepted_at)
        .bind(&commit.worker_capture_ref)
        .bind(&commit.lawyer_transaction_ref)
        .bind(&commit.welcome_message)
        .bind(commit.lawyer_user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(accepted) = accepted else {
            tx.rollback().await?;
            return Ok(None);
        };

        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (request_id, sender_id, content, message_type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, request_id, sender_id, content, message_type, created_at
            "#,
        )
        .bind(request_id)
        .bind(commit.lawyer_user_id)
        .bind(&commit.welcome_message)
        .bind(MessageType::System)
        .bind(commit.accepted_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some((accepted, message)))
    }

    async fn commit_closure(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        commit: ClosureCommit,
    ) -> Result<Option<ContactRequest>, Error> {
        let (rejected_at, expired_at) = match commit.status {
            RequestStatus::Rejected => (Some(commit.closed_at), None),
            _ => (None, Some(commit.closed_at)),
        };

        sqlx::query_as::<_, ContactRequest>(
            r#"
            UPDATE contact_requests
            SET status = $3,
                rejected_at = $4,
                rejection_reason = $5,
                expired_at = $6,
                refund_status = $7,
                worker_paid = FALSE,
                lawyer_paid = FALSE,
                both_payments_succeeded = FALSE,
                lease_token = NULL,
                lease_expires_at = NULL,
                updated_at = $8
            WHERE id = $1 AND status = 'pending' AND lease_token = $2
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(lease_token)
        .bind(commit.status)
        .bind(rejected_at)
        .bind(commit.reason)
        .bind(expired_at)
        .bind(commit.refund_status)
        .bind(commit.closed_at)
        .fetch_optional(&self.pool)
        .await
    }

    async fn append_message(
        &self,
        request_id: Uuid,
        sender_id: Uuid,
        sender: Party,
        content: String,
        message_type: MessageType,
        now: DateTime<Utc>,
    ) -> Result<Option<(ChatMessage, ContactRequest)>, Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock taken here serializes concurrent posters.
        let request = sqlx::query_as::<_, ContactRequest>(
            r#"
            UPDATE contact_requests
            SET last_message_content = $3,
                last_message_sender_id = $2,
                last_message_at = $4,
                sub_status = $5,
                unread_count_worker = CASE WHEN $6 THEN 0 ELSE unread_count_worker + 1 END,
                unread_count_lawyer = CASE WHEN $6 THEN unread_count_lawyer + 1 ELSE 0 END,
                updated_at = $4
            WHERE id = $1 AND status = 'accepted'
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(sender_id)
        .bind(&content)
        .bind(now)
        .bind(sender.sub_status_after_sending())
        .bind(sender == Party::Worker)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request) = request else {
            tx.rollback().await?;
            return Ok(None);
        };

        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (request_id, sender_id, content, message_type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, request_id, sender_id, content, message_type, created_at
            "#,
        )
        .bind(request_id)
        .bind(sender_id)
        .bind(content)
        .bind(message_type)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some((message, request)))
    }

    async fn list_messages(&self, request_id: Uuid) -> Result<Vec<ChatMessage>, Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, request_id, sender_id, content, message_type, created_at
            FROM chat_messages
            WHERE request_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn reset_unread(
        &self,
        request_id: Uuid,
        reader: Party,
    ) -> Result<Option<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            UPDATE contact_requests
            SET unread_count_worker = CASE WHEN $2 THEN 0 ELSE unread_count_worker END,
                unread_count_lawyer = CASE WHEN $2 THEN unread_count_lawyer ELSE 0 END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(reader == Party::Worker)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_crm_status(
        &self,
        request_id: Uuid,
        crm_status: CrmStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<ContactRequest>, Error> {
        sqlx::query_as::<_, ContactRequest>(
            r#"
            UPDATE contact_requests
            SET crm_status = $2, updated_at = $3
            WHERE id = $1 AND status = 'accepted'
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(crm_status)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }
}
