// db/memorydb.rs
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Error;
use uuid::Uuid;

use super::{
    contactdb::{ContactRequestExt, LawyerExt},
    userdb::UserExt,
};
use crate::models::{
    chatmodels::{ChatMessage, MessageType},
    contactmodels::*,
    usermodel::User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    lawyer_profiles: HashMap<Uuid, LawyerProfile>,
    contact_requests: HashMap<Uuid, ContactRequest>,
    chat_messages: Vec<ChatMessage>,
}

/// Store with the same conditional-update semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryDB {
    tables: Mutex<Tables>,
    fail_next_commit: AtomicBool,
    lose_lease_before_commit: AtomicBool,
}

impl MemoryDB {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, Error> {
        self.tables
            .lock()
            .map_err(|_| Error::Protocol("memory store poisoned".to_string()))
    }

    pub fn add_user(&self, user: User) {
        self.tables.lock().unwrap().users.insert(user.id, user);
    }

    pub fn add_lawyer_profile(&self, profile: LawyerProfile) {
        self.tables.lock().unwrap().lawyer_profiles.insert(profile.id, profile);
    }

    pub fn set_plan(&self, profile_id: Uuid, plan: LawyerPlan) {
        if let Some(profile) = self.tables.lock().unwrap().lawyer_profiles.get_mut(&profile_id) {
            profile.plan = plan;
        }
    }

    pub fn request(&self, request_id: Uuid) -> Option<ContactRequest> {
        self.tables.lock().unwrap().contact_requests.get(&request_id).cloned()
    }

    pub fn request_count(&self) -> usize {
        self.tables.lock().unwrap().contact_requests.len()
    }

    pub fn messages_for(&self, request_id: Uuid) -> Vec<ChatMessage> {
        self.tables
            .lock()
            .unwrap()
            .chat_messages
            .iter()
            .filter(|m| m.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Make the next acceptance commit fail as if the database went away.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Drop the lease of the next accepted request right before it commits,
    /// as if it lapsed and a competing claim was released in between.
    pub fn lose_lease_before_commit(&self) {
        self.lose_lease_before_commit.store(true, Ordering::SeqCst);
    }
}

fn lease_is_free(request: &ContactRequest, now: DateTime<Utc>) -> bool {
    match (request.lease_token, request.lease_expires_at) {
        (None, _) => true,
        (Some(_), Some(until)) => until < now,
        (Some(_), None) => false,
    }
}

fn holds_lease(request: &ContactRequest, lease_token: Uuid) -> bool {
    request.status == RequestStatus::Pending && request.lease_token == Some(lease_token)
}

#[async_trait]
impl UserExt for MemoryDB {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.tables()?.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl LawyerExt for MemoryDB {
    async fn get_lawyer_profile(&self, profile_id: Uuid) -> Result<Option<LawyerProfile>, Error> {
        Ok(self.tables()?.lawyer_profiles.get(&profile_id).cloned())
    }

    async fn get_lawyer_profile_by_user(&self, user_id: Uuid) -> Result<Option<LawyerProfile>, Error> {
        Ok(self
            .tables()?
            .lawyer_profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl ContactRequestExt for MemoryDB {
    async fn insert_contact_request(
        &self,
        new_request: NewContactRequest,
    ) -> Result<Option<ContactRequest>, Error> {
        let mut tables = self.tables()?;

        let duplicate = tables.contact_requests.values().any(|r| {
            r.worker_id == new_request.worker_id
                && r.lawyer_profile_id == new_request.lawyer_profile_id
                && r.status == RequestStatus::Pending
        });
        if duplicate {
            return Ok(None);
        }

        let request = ContactRequest {
            id: new_request.id,
            worker_id: new_request.worker_id,
            lawyer_profile_id: new_request.lawyer_profile_id,
            case_summary: new_request.case_summary,
            case_type: new_request.case_type,
            urgency: new_request.urgency,
            urgency_score: new_request.urgency_score,
            classification: new_request.classification,
            worker_payment_gateway: new_request.worker_payment_gateway,
            worker_fee: new_request.worker_fee,
            worker_transaction_id: Some(new_request.worker_transaction_id),
            worker_paid: false,
            lawyer_payment_amount: new_request.lawyer_payment_amount,
            lawyer_transaction_id: None,
            lawyer_paid: false,
            both_payments_succeeded: false,
            refund_status: None,
            status: RequestStatus::Pending,
            sub_status: SubStatus::WaitingLawyer,
            expires_at: new_request.expires_at,
            accepted_at: None,
            rejected_at: None,
            rejection_reason: None,
            expired_at: None,
            last_message_content: None,
            last_message_sender_id: None,
            last_message_at: None,
            unread_count_worker: 0,
            unread_count_lawyer: 0,
            crm_status: CrmStatus::New,
            lease_token: None,
            lease_expires_at: None,
            created_at: new_request.created_at,
            updated_at: new_request.created_at,
        };

        tables.contact_requests.insert(request.id, request.clone());
        Ok(Some(request))
    }

    async fn get_contact_request(&self, request_id: Uuid) -> Result<Option<ContactRequest>, Error> {
        Ok(self.tables()?.contact_requests.get(&request_id).cloned())
    }

    async fn find_pending_for_pair(
        &self,
        worker_id: Uuid,
        lawyer_profile_id: Uuid,
    ) -> Result<Option<ContactRequest>, Error> {
        Ok(self
            .tables()?
            .contact_requests
            .values()
            .find(|r| {
                r.worker_id == worker_id
                    && r.lawyer_profile_id == lawyer_profile_id
                    && r.status == RequestStatus::Pending
            })
            .cloned())
    }

    async fn list_for_lawyer_profile(
        &self,
        lawyer_profile_id: Uuid,
    ) -> Result<Vec<ContactRequest>, Error> {
        let mut requests: Vec<ContactRequest> = self
            .tables()?
            .contact_requests
            .values()
            .filter(|r| r.lawyer_profile_id == lawyer_profile_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    async fn list_for_worker(&self, worker_id: Uuid) -> Result<Vec<ContactRequest>, Error> {
        let mut requests: Vec<ContactRequest> = self
            .tables()?
            .contact_requests
            .values()
            .filter(|r| r.worker_id == worker_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ContactRequest>, Error> {
        let mut requests: Vec<ContactRequest> = self
            .tables()?
            .contact_requests
            .values()
            .filter(|r| {
                r.status == RequestStatus::Pending && r.expires_at < now && lease_is_free(r, now)
            })
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        requests.truncate(limit.max(0) as usize);
        Ok(requests)
    }

    async fn claim_pending(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<ContactRequest>, Error> {
        let mut tables = self.tables()?;
        match tables.contact_requests.get_mut(&request_id) {
            Some(request) if request.status == RequestStatus::Pending && lease_is_free(request, now) => {
                request.lease_token = Some(lease_token);
                request.lease_expires_at = Some(lease_until);
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_lease(&self, request_id: Uuid, lease_token: Uuid) -> Result<(), Error> {
        let mut tables = self.tables()?;
        if let Some(request) = tables.contact_requests.get_mut(&request_id) {
            if request.lease_token == Some(lease_token) {
                request.lease_token = None;
                request.lease_expires_at = None;
            }
        }
        Ok(())
    }

    async fn replace_worker_hold(
        &self,
        request_id: Uuid,
        expected_hold: &str,
        worker_transaction_id: &str,
    ) -> Result<bool, Error> {
        let mut tables = self.tables()?;
        match tables.contact_requests.get_mut(&request_id) {
            Some(request)
                if request.status == RequestStatus::Pending
                    && request.worker_transaction_id.as_deref() == Some(expected_hold) =>
            {
                request.worker_transaction_id = Some(worker_transaction_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_acceptance(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        commit: AcceptanceCommit,
    ) -> Result<Option<(ContactRequest, ChatMessage)>, Error> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(Error::PoolTimedOut);
        }

        let mut tables = self.tables()?;
        if self.lose_lease_before_commit.swap(false, Ordering::SeqCst) {
            if let Some(request) = tables.contact_requests.get_mut(&request_id) {
                request.lease_token = None;
                request.lease_expires_at = None;
            }
        }

        let accepted = match tables.contact_requests.get_mut(&request_id) {
            Some(request) if holds_lease(request, lease_token) => {
                request.status = RequestStatus::Accepted;
                request.sub_status = SubStatus::WaitingWorkerResponse;
                request.accepted_at = Some(commit.accepted_at);
                request.worker_paid = true;
                request.worker_transaction_id = Some(commit.worker_capture_ref.clone());
                request.lawyer_paid = true;
                request.lawyer_transaction_id = Some(commit.lawyer_transaction_ref.clone());
                request.both_payments_succeeded = true;
                request.last_message_content = Some(commit.welcome_message.clone());
                request.last_message_sender_id = Some(commit.lawyer_user_id);
                request.last_message_at = Some(commit.accepted_at);
                request.unread_count_worker = 1;
                request.unread_count_lawyer = 0;
                request.lease_token = None;
                request.lease_expires_at = None;
                request.updated_at = commit.accepted_at;
                request.clone()
            }
            _ => return Ok(None),
        };

        let message = ChatMessage {
            id: Uuid::new_v4(),
            request_id,
            sender_id: commit.lawyer_user_id,
            content: commit.welcome_message,
            message_type: MessageType::System,
            created_at: commit.accepted_at,
        };
        tables.chat_messages.push(message.clone());

        Ok(Some((accepted, message)))
    }

    async fn commit_closure(
        &self,
        request_id: Uuid,
        lease_token: Uuid,
        commit: ClosureCommit,
    ) -> Result<Option<ContactRequest>, Error> {
        let mut tables = self.tables()?;
        match tables.contact_requests.get_mut(&request_id) {
            Some(request) if holds_lease(request, lease_token) => {
                request.status = commit.status;
                if commit.status == RequestStatus::Rejected {
                    request.rejected_at = Some(commit.closed_at);
                } else {
                    request.expired_at = Some(commit.closed_at);
                }
                request.rejection_reason = commit.reason;
                request.refund_status = Some(commit.refund_status);
                request.worker_paid = false;
                request.lawyer_paid = false;
                request.both_payments_succeeded = false;
                request.lease_token = None;
                request.lease_expires_at = None;
                request.updated_at = commit.closed_at;
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
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
        let mut tables = self.tables()?;
        let request = match tables.contact_requests.get_mut(&request_id) {
            Some(request) if request.status == RequestStatus::Accepted => {
                request.last_message_content = Some(content.clone());
                request.last_message_sender_id = Some(sender_id);
                request.last_message_at = Some(now);
                request.sub_status = sender.sub_status_after_sending();
                match sender {
                    Party::Worker => {
                        request.unread_count_worker = 0;
                        request.unread_count_lawyer += 1;
                    }
                    Party::Lawyer => {
                        request.unread_count_lawyer = 0;
                        request.unread_count_worker += 1;
                    }
                }
                request.updated_at = now;
                request.clone()
            }
            _ => return Ok(None),
        };

        let message = ChatMessage {
            id: Uuid::new_v4(),
            request_id,
            sender_id,
            content,
            message_type,
            created_at: now,
        };
        tables.chat_messages.push(message.clone());

        Ok(Some((message, request)))
    }

    async fn list_messages(&self, request_id: Uuid) -> Result<Vec<ChatMessage>, Error> {
        Ok(self
            .tables()?
            .chat_messages
            .iter()
            .filter(|m| m.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn reset_unread(
        &self,
        request_id: Uuid,
        reader: Party,
    ) -> Result<Option<ContactRequest>, Error> {
        let mut tables = self.tables()?;
        Ok(tables.contact_requests.get_mut(&request_id).map(|request| {
            match reader {
                Party::Worker => request.unread_count_worker = 0,
                Party::Lawyer => request.unread_count_lawyer = 0,
            }
            request.clone()
        }))
    }

    async fn set_crm_status(
        &self,
        request_id: Uuid,
        crm_status: CrmStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<ContactRequest>, Error> {
        let mut tables = self.tables()?;
        match tables.contact_requests.get_mut(&request_id) {
            Some(request) if request.status == RequestStatus::Accepted => {
                request.crm_status = crm_status;
                request.updated_at = now;
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }
}
