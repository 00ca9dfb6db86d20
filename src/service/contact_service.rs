// service/contact_service.rs
use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::time::{sleep, Duration};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::ContactPolicy,
    db::contactdb::ContactStore,
    dtos::contactdtos::*,
    models::{
        chatmodels::{ChatMessage, MessageType},
        contactmodels::*,
        usermodel::{first_name, User},
    },
    service::{
        chat_bootstrap::welcome_message,
        error::ServiceError,
        lead_classifier::{CaseSignals, LeadClassifier},
        payment_gateway::{GatewayRouter, HoldRef, PaymentGateway, TransactionRef},
        visibility::{can_accept, is_unmasked, lead_ordinals, LeadCounting, VisibilityInput},
    },
    utils::{clock::Clock, currency::format_pesos},
};

const VOID_RETRY_BASE_MS: u64 = 200;
const VOID_RETRY_MAX_MS: u64 = 30_000;

/// Exponential delay before void retry `attempt` (zero-based), capped.
fn void_backoff_ms(attempt: u32, jitter_ms: u64) -> u64 {
    VOID_RETRY_BASE_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(VOID_RETRY_MAX_MS)
        .saturating_add(jitter_ms)
}

/// Owns the lifecycle of contact requests: creation, acceptance, rejection,
/// expiry, the chat channel that opens on acceptance and CRM tagging.
pub struct ContactRequestService {
    store: Arc<dyn ContactStore>,
    gateways: GatewayRouter,
    clock: Arc<dyn Clock>,
    classifier: LeadClassifier,
    policy: ContactPolicy,
    currency: String,
}

impl std::fmt::Debug for ContactRequestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactRequestService")
            .field("policy", &self.policy)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Run a transition to completion even if the caller goes away.
async fn detached<F, T>(transition: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(transition).await?
}

impl ContactRequestService {
    pub fn new(
        store: Arc<dyn ContactStore>,
        gateways: GatewayRouter,
        clock: Arc<dyn Clock>,
        policy: ContactPolicy,
        currency: String,
    ) -> Self {
        Self {
            store,
            gateways,
            clock,
            classifier: LeadClassifier::new(&policy),
            policy,
            currency,
        }
    }

    pub fn policy(&self) -> &ContactPolicy {
        &self.policy
    }

    fn gateway(&self, kind: PaymentGatewayKind) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        self.gateways.get(kind).ok_or_else(|| {
            ServiceError::Validation(format!("Payment gateway {} is not available", kind.to_str()))
        })
    }

    fn counting(&self) -> LeadCounting {
        LeadCounting {
            scope: self.policy.lead_count_scope,
            gated_hot_consumes_trial: self.policy.gated_hot_consumes_trial,
        }
    }

    async fn load_request(&self, request_id: Uuid) -> Result<ContactRequest, ServiceError> {
        self.store
            .get_contact_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))
    }

    async fn load_profile(&self, profile_id: Uuid) -> Result<LawyerProfile, ServiceError> {
        self.store
            .get_lawyer_profile(profile_id)
            .await?
            .ok_or(ServiceError::LawyerProfileNotFound)
    }

    /// The request plus its lawyer profile, provided `lawyer_user_id` owns it.
    async fn load_owned(
        &self,
        request_id: Uuid,
        lawyer_user_id: Uuid,
    ) -> Result<(ContactRequest, LawyerProfile), ServiceError> {
        let request = self.load_request(request_id).await?;
        let profile = self.load_profile(request.lawyer_profile_id).await?;
        if profile.user_id != lawyer_user_id {
            return Err(ServiceError::NotParticipant(lawyer_user_id, request_id));
        }
        Ok((request, profile))
    }

    async fn release(&self, request_id: Uuid, lease_token: Uuid) {
        if let Err(e) = self.store.release_lease(request_id, lease_token).await {
            tracing::warn!(%request_id, "Failed to release transition lease: {}", e);
        }
    }

    async fn void_logged(&self, gateway: &Arc<dyn PaymentGateway>, hold: &HoldRef, request_id: Uuid) {
        if let Err(e) = gateway.void(hold).await {
            tracing::error!(%request_id, hold = %hold, "Void failed, hold needs manual release: {}", e);
        }
    }

    async fn refund_logged(
        &self,
        gateway: &Arc<dyn PaymentGateway>,
        transaction: &TransactionRef,
        request_id: Uuid,
    ) {
        if let Err(e) = gateway.refund(transaction).await {
            tracing::error!(
                %request_id,
                transaction = %transaction,
                "Refund failed, capture needs manual reconciliation: {}",
                e
            );
        }
    }

    // ---------------------------------------------------------------------
    // create
    // ---------------------------------------------------------------------

    pub async fn create(
        self: &Arc<Self>,
        worker: &User,
        body: CreateContactRequestDto,
    ) -> Result<CreateContactResponseDto, ServiceError> {
        body.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let this = Arc::clone(self);
        let worker_id = worker.id;
        detached(async move { this.create_inner(worker_id, body).await }).await
    }

    async fn create_inner(
        &self,
        worker_id: Uuid,
        body: CreateContactRequestDto,
    ) -> Result<CreateContactResponseDto, ServiceError> {
        if self
            .store
            .find_pending_for_pair(worker_id, body.lawyer_profile_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "You already have a pending request with this lawyer".to_string(),
            ));
        }

        let profile = self.load_profile(body.lawyer_profile_id).await?;
        if profile.user_id == worker_id {
            return Err(ServiceError::Validation(
                "You cannot send a contact request to yourself".to_string(),
            ));
        }

        let assessment = self.classifier.assess(&CaseSignals {
            urgency: body.urgency,
            case_type: body.case_type.clone(),
            estimated_severance: body.estimated_severance,
            years_of_service: body.years_of_service,
            risk_score: body.risk_score,
        });

        let gateway = self.gateway(body.worker_payment_gateway)?;
        let request_id = Uuid::new_v4();
        let now = self.clock.now();

        let hold = gateway
            .authorize(
                worker_id,
                assessment.worker_fee,
                &self.currency,
                &format!("contact-{}-worker", request_id),
            )
            .await
            .map_err(|e| {
                tracing::warn!(%worker_id, "Worker hold declined: {}", e);
                ServiceError::authorization(e)
            })?;

        let new_request = NewContactRequest {
            id: request_id,
            worker_id,
            lawyer_profile_id: profile.id,
            case_summary: body.case_summary.trim().to_string(),
            case_type: body.case_type.trim().to_string(),
            urgency: body.urgency,
            urgency_score: assessment.urgency_score,
            classification: assessment.classification,
            worker_payment_gateway: body.worker_payment_gateway,
            worker_fee: assessment.worker_fee,
            worker_transaction_id: hold.0.clone(),
            lawyer_payment_amount: assessment.lawyer_fee,
            expires_at: now + self.policy.request_ttl(),
            created_at: now,
        };

        let inserted = match self.store.insert_contact_request(new_request).await {
            Ok(inserted) => inserted,
            Err(e) => {
                self.void_logged(&gateway, &hold, request_id).await;
                return Err(e.into());
            }
        };

        let Some(request) = inserted else {
            self.void_logged(&gateway, &hold, request_id).await;
            return Err(ServiceError::Conflict(
                "You already have a pending request with this lawyer".to_string(),
            ));
        };

        tracing::info!(
            request_id = %request.id,
            %worker_id,
            lawyer_profile_id = %request.lawyer_profile_id,
            classification = ?request.classification,
            worker_fee = request.worker_fee,
            lawyer_fee = request.lawyer_payment_amount,
            "Contact request created"
        );

        Ok(CreateContactResponseDto {
            request_id: request.id,
            classification: request.classification,
            worker_fee: request.worker_fee,
            lawyer_fee: request.lawyer_payment_amount,
            urgency_score: request.urgency_score,
            expires_at: request.expires_at,
        })
    }

    // ---------------------------------------------------------------------
    // accept
    // ---------------------------------------------------------------------

    pub async fn accept(
        self: &Arc<Self>,
        request_id: Uuid,
        lawyer: &User,
    ) -> Result<ContactRequest, ServiceError> {
        let this = Arc::clone(self);
        let lawyer_id = lawyer.id;
        detached(async move { this.accept_inner(request_id, lawyer_id).await }).await
    }

    async fn accept_inner(
        &self,
        request_id: Uuid,
        lawyer_user_id: Uuid,
    ) -> Result<ContactRequest, ServiceError> {
        let (request, profile) = self.load_owned(request_id, lawyer_user_id).await?;

        if request.status != RequestStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Request is already {}",
                request.status.to_str()
            )));
        }

        let now = self.clock.now();
        if now >= request.expires_at {
            return Err(ServiceError::Conflict("Request has expired".to_string()));
        }

        if !profile.subscription_active {
            return Err(ServiceError::PolicyViolation(
                "Your subscription is inactive. Renew it to accept new cases.".to_string(),
            ));
        }

        if !can_accept(request.classification, profile.plan) {
            return Err(ServiceError::PolicyViolation(format!(
                "HOT cases are PRO only ({} per case). Upgrade your plan to accept it.",
                format_pesos(request.lawyer_payment_amount, &self.currency)
            )));
        }

        let lease_token = Uuid::new_v4();
        let claimed = self
            .store
            .claim_pending(request_id, lease_token, now, now + self.policy.transition_lease())
            .await?
            .ok_or_else(|| {
                ServiceError::Conflict("Request is being processed or no longer pending".to_string())
            })?;

        match self.settle_acceptance(&claimed, &profile, lease_token, now).await {
            Ok(accepted) => Ok(accepted),
            Err(e) => {
                self.release(request_id, lease_token).await;
                Err(e)
            }
        }
    }

    /// Runs while holding the lease: charge both sides, then commit.
    async fn settle_acceptance(
        &self,
        claimed: &ContactRequest,
        profile: &LawyerProfile,
        lease_token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ContactRequest, ServiceError> {
        let request_id = claimed.id;

        let worker_hold = claimed
            .worker_transaction_id
            .clone()
            .map(HoldRef)
            .ok_or_else(|| ServiceError::Other(format!("request {} has no worker hold", request_id)))?;

        let lawyer_name = match profile.professional_name.clone() {
            Some(name) => name,
            None => self
                .store
                .get_display_name(profile.user_id)
                .await?
                .unwrap_or_default(),
        };
        let worker_name = self
            .store
            .get_display_name(claimed.worker_id)
            .await?
            .unwrap_or_default();
        let welcome = welcome_message(&lawyer_name, first_name(&worker_name));

        let gateway = self.gateway(claimed.worker_payment_gateway)?;

        let lawyer_hold = gateway
            .authorize(
                profile.user_id,
                claimed.lawyer_payment_amount,
                &self.currency,
                &format!("contact-{}-lawyer-{}", request_id, lease_token),
            )
            .await
            .map_err(|e| {
                tracing::warn!(%request_id, "Lawyer hold declined: {}", e);
                ServiceError::capture(e)
            })?;

        let worker_capture = match gateway.capture(&worker_hold).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(%request_id, "Worker capture failed: {}", e);
                self.void_logged(&gateway, &lawyer_hold, request_id).await;
                return Err(ServiceError::capture(e));
            }
        };

        let lawyer_capture = match gateway.capture(&lawyer_hold).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(%request_id, "Lawyer capture failed, unwinding worker capture: {}", e);
                self.refund_logged(&gateway, &worker_capture, request_id).await;
                self.void_logged(&gateway, &lawyer_hold, request_id).await;
                self.restore_worker_hold(&gateway, claimed, &worker_hold, lease_token)
                    .await;
                return Err(ServiceError::capture(e));
            }
        };

        let commit = AcceptanceCommit {
            worker_capture_ref: worker_capture.0.clone(),
            lawyer_transaction_ref: lawyer_capture.0.clone(),
            lawyer_user_id: profile.user_id,
            welcome_message: welcome,
            accepted_at: now,
        };

        match self.store.commit_acceptance(request_id, lease_token, commit).await {
            Ok(Some((accepted, message))) => {
                tracing::info!(
                    %request_id,
                    lawyer_profile_id = %profile.id,
                    worker_fee = accepted.worker_fee,
                    lawyer_fee = accepted.lawyer_payment_amount,
                    message_id = %message.id,
                    "Contact request accepted"
                );
                Ok(accepted)
            }
            Ok(None) => {
                tracing::error!(%request_id, "Lease lost before commit, refunding both captures");
                self.refund_logged(&gateway, &worker_capture, request_id).await;
                self.refund_logged(&gateway, &lawyer_capture, request_id).await;
                self.restore_worker_hold(&gateway, claimed, &worker_hold, lease_token)
                    .await;
                Err(ServiceError::Conflict(
                    "Request changed while it was being accepted".to_string(),
                ))
            }
            Err(e) => {
                // The commit may have landed before the connection dropped.
                if let Ok(Some(current)) = self.store.get_contact_request(request_id).await {
                    if current.status == RequestStatus::Accepted
                        && current.lawyer_transaction_id.as_deref() == Some(lawyer_capture.0.as_str())
                    {
                        return Ok(current);
                    }
                }

                tracing::error!(%request_id, "Accept commit failed, refunding both captures: {}", e);
                self.refund_logged(&gateway, &worker_capture, request_id).await;
                self.refund_logged(&gateway, &lawyer_capture, request_id).await;
                self.restore_worker_hold(&gateway, claimed, &worker_hold, lease_token)
                    .await;
                Err(e.into())
            }
        }
    }

    /// After an unwound capture the request stays pending and needs a live hold.
    /// The swap only lands if the row still points at the spent hold.
    async fn restore_worker_hold(
        &self,
        gateway: &Arc<dyn PaymentGateway>,
        claimed: &ContactRequest,
        spent_hold: &HoldRef,
        lease_token: Uuid,
    ) {
        let request_id = claimed.id;
        let hold = match gateway
            .authorize(
                claimed.worker_id,
                claimed.worker_fee,
                &self.currency,
                &format!("contact-{}-worker-{}", request_id, lease_token),
            )
            .await
        {
            Ok(hold) => hold,
            Err(e) => {
                tracing::error!(
                    %request_id,
                    "Could not re-authorize worker hold after unwinding accept: {}",
                    e
                );
                return;
            }
        };

        match self
            .store
            .replace_worker_hold(request_id, &spent_hold.0, &hold.0)
            .await
        {
            Ok(true) => {}
            Ok(false) => self.void_logged(gateway, &hold, request_id).await,
            Err(e) => {
                tracing::error!(%request_id, "Could not record re-authorized worker hold: {}", e);
                self.void_logged(gateway, &hold, request_id).await;
            }
        }
    }

    // ---------------------------------------------------------------------
    // reject / expire
    // ---------------------------------------------------------------------

    /// Returns the lawyer's view of the closed request, masked if the lead is.
    pub async fn reject(
        self: &Arc<Self>,
        request_id: Uuid,
        lawyer: &User,
        body: RejectContactDto,
    ) -> Result<LeadViewDto, ServiceError> {
        body.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let this = Arc::clone(self);
        let lawyer_id = lawyer.id;
        let reason = body
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let rejected =
            detached(async move { this.reject_inner(request_id, lawyer_id, reason).await }).await?;

        let profile = self.load_profile(rejected.lawyer_profile_id).await?;
        let lead_number = self.lead_number(&rejected, &profile).await?;
        self.lead_view(&rejected, &profile, lead_number, false).await
    }

    async fn reject_inner(
        &self,
        request_id: Uuid,
        lawyer_user_id: Uuid,
        reason: Option<String>,
    ) -> Result<ContactRequest, ServiceError> {
        let (request, _profile) = self.load_owned(request_id, lawyer_user_id).await?;

        if request.status != RequestStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Request is already {}",
                request.status.to_str()
            )));
        }

        let now = self.clock.now();
        let lease_token = Uuid::new_v4();
        let claimed = self
            .store
            .claim_pending(request_id, lease_token, now, now + self.policy.transition_lease())
            .await?
            .ok_or_else(|| {
                ServiceError::Conflict("Request is being processed or no longer pending".to_string())
            })?;

        if let Err(e) = self.void_worker_hold(&claimed).await {
            self.release(request_id, lease_token).await;
            return Err(e);
        }

        let rejected = self
            .store
            .commit_closure(
                request_id,
                lease_token,
                ClosureCommit {
                    status: RequestStatus::Rejected,
                    reason,
                    refund_status: RefundStatus::Processed,
                    closed_at: now,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::Conflict("Request changed while it was being rejected".to_string()))?;

        tracing::info!(
            %request_id,
            lawyer_profile_id = %rejected.lawyer_profile_id,
            "Contact request rejected, worker hold released"
        );

        Ok(rejected)
    }

    async fn void_worker_hold(&self, request: &ContactRequest) -> Result<(), ServiceError> {
        let Some(hold) = request.worker_transaction_id.clone().map(HoldRef) else {
            return Ok(());
        };
        let gateway = self.gateway(request.worker_payment_gateway)?;
        gateway.void(&hold).await.map_err(ServiceError::void)
    }

    /// Expire one overdue pending request, releasing the worker hold.
    pub async fn expire(self: &Arc<Self>, request_id: Uuid) -> Result<ContactRequest, ServiceError> {
        let this = Arc::clone(self);
        detached(async move { this.expire_inner(request_id).await }).await
    }

    async fn expire_inner(&self, request_id: Uuid) -> Result<ContactRequest, ServiceError> {
        let request = self.load_request(request_id).await?;
        let now = self.clock.now();

        if request.status != RequestStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Request is already {}",
                request.status.to_str()
            )));
        }
        if now < request.expires_at {
            return Err(ServiceError::Conflict("Request has not expired yet".to_string()));
        }

        let lease_token = Uuid::new_v4();
        let claimed = self
            .store
            .claim_pending(request_id, lease_token, now, now + self.policy.transition_lease())
            .await?
            .ok_or_else(|| {
                ServiceError::Conflict("Request is being processed or no longer pending".to_string())
            })?;

        let refund_status = self.void_with_retry(&claimed).await;

        let expired = self
            .store
            .commit_closure(
                request_id,
                lease_token,
                ClosureCommit {
                    status: RequestStatus::Expired,
                    reason: None,
                    refund_status,
                    closed_at: now,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::Conflict("Request changed while it was expiring".to_string()))?;

        tracing::info!(
            %request_id,
            worker_id = %expired.worker_id,
            refund_status = ?refund_status,
            "Contact request expired"
        );

        Ok(expired)
    }

    async fn void_with_retry(&self, request: &ContactRequest) -> RefundStatus {
        let attempts = self.policy.void_retry_attempts;
        let mut attempt = 0u32;

        loop {
            match self.void_worker_hold(request).await {
                Ok(()) => return RefundStatus::Processed,
                Err(e) if attempt < attempts => {
                    let jitter = rand::rng().random_range(0..VOID_RETRY_BASE_MS);
                    let backoff = void_backoff_ms(attempt, jitter);
                    tracing::warn!(
                        request_id = %request.id,
                        attempt = attempt + 1,
                        "Void failed, retrying in {}ms: {}",
                        backoff,
                        e
                    );
                    sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %request.id,
                        worker_id = %request.worker_id,
                        hold = ?request.worker_transaction_id,
                        "Void failed after {} retries, flagging for manual reconciliation: {}",
                        attempts,
                        e
                    );
                    return RefundStatus::Failed;
                }
            }
        }
    }

    /// Expire every overdue pending request, one batch at a time.
    pub async fn sweep_expired(self: &Arc<Self>) -> Result<usize, ServiceError> {
        let mut expired = 0usize;

        loop {
            let now = self.clock.now();
            let batch = self
                .store
                .list_expired_pending(now, self.policy.expiry_sweep_batch)
                .await?;
            if batch.is_empty() {
                break;
            }

            let mut progressed = false;
            for request in &batch {
                match self.expire(request.id).await {
                    Ok(_) => {
                        expired += 1;
                        progressed = true;
                    }
                    // Lost the race to an accept or reject; nothing to do.
                    Err(ServiceError::Conflict(_)) => {}
                    Err(e) => tracing::error!(
                        request_id = %request.id,
                        retryable = e.is_retryable(),
                        "Expiry failed: {}",
                        e
                    ),
                }
            }

            if !progressed || (batch.len() as i64) < self.policy.expiry_sweep_batch {
                break;
            }
        }

        Ok(expired)
    }

    // ---------------------------------------------------------------------
    // reads and visibility
    // ---------------------------------------------------------------------

    pub async fn list_for_worker(&self, worker: &User) -> Result<Vec<ContactRequest>, ServiceError> {
        Ok(self.store.list_for_worker(worker.id).await?)
    }

    pub async fn list_for_lawyer(
        &self,
        caller: &User,
        query: ReceivedQueryDto,
    ) -> Result<Vec<LeadViewDto>, ServiceError> {
        let operator = caller.role.is_operator();

        let profile = match (operator, query.lawyer_profile_id) {
            (true, Some(profile_id)) => self.load_profile(profile_id).await?,
            (true, None) => {
                return Err(ServiceError::Validation(
                    "lawyer_profile_id is required".to_string(),
                ))
            }
            (false, requested) => {
                let own = self
                    .store
                    .get_lawyer_profile_by_user(caller.id)
                    .await?
                    .ok_or(ServiceError::LawyerProfileNotFound)?;
                if let Some(profile_id) = requested {
                    if profile_id != own.id {
                        return Err(ServiceError::NotParticipant(caller.id, profile_id));
                    }
                }
                own
            }
        };

        let requests = self.store.list_for_lawyer_profile(profile.id).await?;
        let ordinals = lead_ordinals(&requests, profile.plan, self.counting());

        let mut views = Vec::new();
        for request in requests.iter().rev() {
            if query.status.map_or(false, |status| status != request.status) {
                continue;
            }
            let lead_number = ordinals.get(&request.id).copied().unwrap_or(1);
            views.push(self.lead_view(request, &profile, lead_number, operator).await?);
        }

        Ok(views)
    }

    fn unmasked_for(
        &self,
        request: &ContactRequest,
        profile: &LawyerProfile,
        lead_number: i64,
        operator: bool,
    ) -> bool {
        operator
            || is_unmasked(
                &VisibilityInput {
                    plan: profile.plan,
                    total_leads_received: lead_number,
                    status: request.status,
                    both_payments_succeeded: request.both_payments_succeeded,
                },
                self.policy.trial_lead_quota,
            )
    }

    async fn lead_view(
        &self,
        request: &ContactRequest,
        profile: &LawyerProfile,
        lead_number: i64,
        operator: bool,
    ) -> Result<LeadViewDto, ServiceError> {
        let actionable = can_accept(request.classification, profile.plan);

        if !self.unmasked_for(request, profile, lead_number, operator) {
            return Ok(LeadViewDto::masked(request, lead_number, actionable));
        }

        let worker = self
            .store
            .get_contact(request.worker_id)
            .await?
            .map(|user| WorkerContactDto {
                full_name: user.name,
                email: user.email,
                phone: user.phone,
            });

        Ok(LeadViewDto::unmasked(request, worker, lead_number, actionable))
    }

    async fn lead_number(
        &self,
        request: &ContactRequest,
        profile: &LawyerProfile,
    ) -> Result<i64, ServiceError> {
        let requests = self.store.list_for_lawyer_profile(profile.id).await?;
        let ordinals = lead_ordinals(&requests, profile.plan, self.counting());
        Ok(ordinals.get(&request.id).copied().unwrap_or(1))
    }

    pub async fn get_request(
        &self,
        request_id: Uuid,
        caller: &User,
    ) -> Result<RequestViewDto, ServiceError> {
        let request = self.load_request(request_id).await?;
        if request.worker_id == caller.id {
            return Ok(RequestViewDto::Worker(request));
        }

        let profile = self.load_profile(request.lawyer_profile_id).await?;
        let operator = caller.role.is_operator();
        if profile.user_id != caller.id && !operator {
            return Err(ServiceError::NotParticipant(caller.id, request_id));
        }

        let lead_number = self.lead_number(&request, &profile).await?;
        let view = self.lead_view(&request, &profile, lead_number, operator).await?;
        Ok(RequestViewDto::Lawyer(view))
    }

    pub async fn get_contact_info(
        &self,
        request_id: Uuid,
        caller: &User,
    ) -> Result<WorkerContactDto, ServiceError> {
        let request = self.load_request(request_id).await?;
        let profile = self.load_profile(request.lawyer_profile_id).await?;
        let operator = caller.role.is_operator();
        if profile.user_id != caller.id && !operator {
            return Err(ServiceError::NotParticipant(caller.id, request_id));
        }

        let lead_number = self.lead_number(&request, &profile).await?;
        if !self.unmasked_for(&request, &profile, lead_number, operator) {
            return Err(ServiceError::ContactLocked);
        }

        let worker = self
            .store
            .get_contact(request.worker_id)
            .await?
            .ok_or_else(|| ServiceError::Other(format!("worker {} not found", request.worker_id)))?;

        Ok(WorkerContactDto {
            full_name: worker.name,
            email: worker.email,
            phone: worker.phone,
        })
    }

    // ---------------------------------------------------------------------
    // chat
    // ---------------------------------------------------------------------

    /// The request and which side of it `user_id` is on.
    async fn load_as_participant(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<(ContactRequest, Party), ServiceError> {
        let request = self.load_request(request_id).await?;
        let profile = self.load_profile(request.lawyer_profile_id).await?;
        let party = request
            .party_of(user_id, profile.user_id)
            .ok_or(ServiceError::NotParticipant(user_id, request_id))?;
        Ok((request, party))
    }

    pub async fn post_message(
        &self,
        request_id: Uuid,
        sender: &User,
        body: PostMessageDto,
    ) -> Result<(ChatMessage, ContactRequest), ServiceError> {
        body.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        if body.message_type == MessageType::System {
            return Err(ServiceError::Validation(
                "System messages cannot be posted by users".to_string(),
            ));
        }

        let (request, party) = self.load_as_participant(request_id, sender.id).await?;
        if request.status != RequestStatus::Accepted {
            return Err(ServiceError::Conflict(
                "Chat opens once the lawyer accepts the request".to_string(),
            ));
        }

        let (message, updated) = self
            .store
            .append_message(
                request_id,
                sender.id,
                party,
                body.content.trim().to_string(),
                body.message_type,
                self.clock.now(),
            )
            .await?
            .ok_or_else(|| ServiceError::Conflict("Request is no longer open for chat".to_string()))?;

        tracing::debug!(%request_id, sender = ?party, message_id = %message.id, "Chat message posted");

        Ok((message, updated))
    }

    pub async fn list_messages(
        &self,
        request_id: Uuid,
        caller: &User,
    ) -> Result<Vec<ChatMessage>, ServiceError> {
        let (_request, party) = self.load_as_participant(request_id, caller.id).await?;
        let messages = self.store.list_messages(request_id).await?;
        self.store.reset_unread(request_id, party).await?;
        Ok(messages)
    }

    pub async fn mark_read(
        &self,
        request_id: Uuid,
        caller: &User,
    ) -> Result<ContactRequest, ServiceError> {
        let (_request, party) = self.load_as_participant(request_id, caller.id).await?;
        self.store
            .reset_unread(request_id, party)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))
    }

    // ---------------------------------------------------------------------
    // CRM
    // ---------------------------------------------------------------------

    pub async fn set_crm_status(
        &self,
        request_id: Uuid,
        lawyer: &User,
        crm_status: CrmStatus,
    ) -> Result<ContactRequest, ServiceError> {
        let (request, _profile) = self.load_owned(request_id, lawyer.id).await?;
        if request.status != RequestStatus::Accepted {
            return Err(ServiceError::Conflict(
                "Pipeline status can only be set on accepted requests".to_string(),
            ));
        }

        let updated = self
            .store
            .set_crm_status(request_id, crm_status, self.clock.now())
            .await?
            .ok_or_else(|| ServiceError::Conflict("Request is no longer accepted".to_string()))?;

        tracing::info!(%request_id, crm_status = ?crm_status, "CRM status updated");

        Ok(updated)
    }
}
