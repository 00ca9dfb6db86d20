// service/payment_gateway.rs
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::contactmodels::PaymentGatewayKind;

/// Reference to an authorized, not yet captured, amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldRef(pub String);

/// Reference to money actually moved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionRef(pub String);

impl fmt::Display for HoldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("operation not allowed in current state: {0}")]
    InvalidState(String),

    #[error("gateway unreachable: {0}")]
    Transport(String),
}

/// Authorize/capture/void/refund capability of a card processor.
///
/// Every call is idempotent: repeating it with the same hold, transaction or
/// idempotency key returns the original outcome without moving money twice.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        payer_id: Uuid,
        amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<HoldRef, GatewayError>;

    async fn capture(&self, hold: &HoldRef) -> Result<TransactionRef, GatewayError>;

    async fn void(&self, hold: &HoldRef) -> Result<(), GatewayError>;

    async fn refund(&self, transaction: &TransactionRef) -> Result<(), GatewayError>;
}

/// Gateways available to the engine, keyed by the worker's choice.
#[derive(Clone, Default)]
pub struct GatewayRouter {
    gateways: HashMap<PaymentGatewayKind, Arc<dyn PaymentGateway>>,
}

impl GatewayRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: PaymentGatewayKind, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(kind, gateway);
        self
    }

    pub fn get(&self, kind: PaymentGatewayKind) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&kind).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Authorized,
    Captured,
    Voided,
    Refunded,
}

#[derive(Debug, Clone)]
struct SandboxHold {
    payer_id: Uuid,
    amount: i64,
    state: HoldState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxOp {
    Authorize,
    Capture,
    Void,
    Refund,
}

#[derive(Debug, Default)]
struct Ledger {
    holds: HashMap<String, SandboxHold>,
    by_idempotency_key: HashMap<String, String>,
    captures: Vec<(Uuid, i64)>,
    failures: HashMap<SandboxOp, Vec<Option<GatewayError>>>,
}

/// In-memory processor used for local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct SandboxGateway {
    ledger: Arc<Mutex<Ledger>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> Result<std::sync::MutexGuard<'_, Ledger>, GatewayError> {
        self.ledger
            .lock()
            .map_err(|_| GatewayError::Transport("sandbox ledger poisoned".to_string()))
    }

    fn injected_failure(ledger: &mut Ledger, op: SandboxOp) -> Result<(), GatewayError> {
        match ledger.failures.get_mut(&op) {
            Some(queue) if !queue.is_empty() => match queue.remove(0) {
                Some(error) => Err(error),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Queue a failure returned by the next call of `op`.
    #[cfg(test)]
    pub fn fail_next(&self, op: SandboxOp, error: GatewayError) {
        self.fail_after(op, 0, error);
    }

    /// Let `skip` calls of `op` through, then fail the one after.
    #[cfg(test)]
    pub fn fail_after(&self, op: SandboxOp, skip: usize, error: GatewayError) {
        if let Ok(mut ledger) = self.ledger.lock() {
            let queue = ledger.failures.entry(op).or_default();
            queue.extend(std::iter::repeat(None).take(skip));
            queue.push(Some(error));
        }
    }

    #[cfg(test)]
    pub fn hold_state(&self, hold: &str) -> Option<HoldState> {
        self.ledger
            .lock()
            .ok()
            .and_then(|ledger| ledger.holds.get(hold).map(|h| h.state))
    }

    /// Successful captures as `(payer, amount)`, refunded ones included.
    #[cfg(test)]
    pub fn captures(&self) -> Vec<(Uuid, i64)> {
        self.ledger
            .lock()
            .map(|ledger| ledger.captures.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn holds_in_state(&self, state: HoldState) -> usize {
        self.ledger
            .lock()
            .map(|ledger| ledger.holds.values().filter(|h| h.state == state).count())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn authorize(
        &self,
        payer_id: Uuid,
        amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<HoldRef, GatewayError> {
        let mut ledger = self.ledger()?;
        Self::injected_failure(&mut ledger, SandboxOp::Authorize)?;

        if amount <= 0 {
            return Err(GatewayError::Declined(format!("invalid amount {}", amount)));
        }

        if let Some(existing) = ledger.by_idempotency_key.get(idempotency_key) {
            return Ok(HoldRef(existing.clone()));
        }

        let reference = format!("sbx_hold_{}", Uuid::new_v4().simple());
        ledger.holds.insert(
            reference.clone(),
            SandboxHold {
                payer_id,
                amount,
                state: HoldState::Authorized,
            },
        );
        ledger
            .by_idempotency_key
            .insert(idempotency_key.to_string(), reference.clone());

        tracing::debug!("Sandbox authorized {} {} for payer {}", amount, currency, payer_id);
        Ok(HoldRef(reference))
    }

    async fn capture(&self, hold: &HoldRef) -> Result<TransactionRef, GatewayError> {
        let mut ledger = self.ledger()?;
        Self::injected_failure(&mut ledger, SandboxOp::Capture)?;

        let entry = ledger
            .holds
            .get_mut(&hold.0)
            .ok_or_else(|| GatewayError::InvalidState(format!("unknown hold {}", hold)))?;

        match entry.state {
            HoldState::Authorized => {
                entry.state = HoldState::Captured;
                let capture = (entry.payer_id, entry.amount);
                ledger.captures.push(capture);
            }
            HoldState::Captured => {}
            state => {
                return Err(GatewayError::InvalidState(format!(
                    "hold {} is {:?}",
                    hold, state
                )))
            }
        }

        Ok(TransactionRef(hold.0.clone()))
    }

    async fn void(&self, hold: &HoldRef) -> Result<(), GatewayError> {
        let mut ledger = self.ledger()?;
        Self::injected_failure(&mut ledger, SandboxOp::Void)?;

        let entry = ledger
            .holds
            .get_mut(&hold.0)
            .ok_or_else(|| GatewayError::InvalidState(format!("unknown hold {}", hold)))?;

        match entry.state {
            HoldState::Authorized => {
                entry.state = HoldState::Voided;
                Ok(())
            }
            HoldState::Voided => Ok(()),
            state => Err(GatewayError::InvalidState(format!(
                "hold {} is {:?}",
                hold, state
            ))),
        }
    }

    async fn refund(&self, transaction: &TransactionRef) -> Result<(), GatewayError> {
        let mut ledger = self.ledger()?;
        Self::injected_failure(&mut ledger, SandboxOp::Refund)?;

        let entry = ledger.holds.get_mut(&transaction.0).ok_or_else(|| {
            GatewayError::InvalidState(format!("unknown transaction {}", transaction))
        })?;

        match entry.state {
            HoldState::Captured => {
                entry.state = HoldState::Refunded;
                Ok(())
            }
            HoldState::Refunded => Ok(()),
            state => Err(GatewayError::InvalidState(format!(
                "transaction {} is {:?}",
                transaction, state
            ))),
        }
    }
}
