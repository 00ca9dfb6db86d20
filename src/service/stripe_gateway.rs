// service/stripe_gateway.rs
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    service::payment_gateway::{GatewayError, HoldRef, PaymentGateway, TransactionRef},
    utils::currency::pesos_to_centavos,
};

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Stripe PaymentIntents with manual capture.
///
/// A hold is a PaymentIntent confirmed off-session against the payer's
/// default card; the payer is the Stripe customer whose
/// `metadata['user_id']` matches our user id.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        idempotency_key: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let mut request = request.bearer_auth(&self.secret_key);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("Stripe request failed")
            .to_string();

        tracing::warn!("Stripe responded {}: {}", status, message);

        if status.is_server_error() || status.as_u16() == 429 {
            Err(GatewayError::Transport(message))
        } else if body["error"]["type"].as_str() == Some("card_error") || status.as_u16() == 402 {
            Err(GatewayError::Declined(message))
        } else {
            Err(GatewayError::InvalidState(message))
        }
    }

    async fn find_customer(&self, payer_id: Uuid) -> Result<(String, String), GatewayError> {
        let query = format!("metadata['user_id']:'{}'", payer_id);
        let body = self
            .send(
                self.client
                    .get(format!("{}/customers/search", STRIPE_API))
                    .query(&[("query", query.as_str())]),
                None,
            )
            .await?;

        let customer = body["data"]
            .get(0)
            .ok_or_else(|| GatewayError::Declined(format!("no Stripe customer for user {}", payer_id)))?;

        let customer_id = customer["id"].as_str().unwrap_or_default().to_string();
        let payment_method = customer["invoice_settings"]["default_payment_method"]
            .as_str()
            .ok_or_else(|| GatewayError::Declined("customer has no default payment method".to_string()))?
            .to_string();

        Ok((customer_id, payment_method))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn authorize(
        &self,
        payer_id: Uuid,
        amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<HoldRef, GatewayError> {
        let (customer, payment_method) = self.find_customer(payer_id).await?;

        let amount_minor = pesos_to_centavos(amount).to_string();
        let currency = currency.to_lowercase();
        let user_id = payer_id.to_string();
        let form = [
            ("amount", amount_minor.as_str()),
            ("currency", currency.as_str()),
            ("customer", customer.as_str()),
            ("payment_method", payment_method.as_str()),
            ("capture_method", "manual"),
            ("confirm", "true"),
            ("off_session", "true"),
            ("metadata[user_id]", user_id.as_str()),
        ];

        let body = self
            .send(
                self.client
                    .post(format!("{}/payment_intents", STRIPE_API))
                    .form(&form),
                Some(idempotency_key),
            )
            .await?;

        match body["status"].as_str() {
            Some("requires_capture") => {
                let id = body["id"].as_str().unwrap_or_default().to_string();
                tracing::info!("Stripe hold {} authorized for user {}", id, payer_id);
                Ok(HoldRef(id))
            }
            other => Err(GatewayError::Declined(format!(
                "payment intent not authorized (status {:?})",
                other
            ))),
        }
    }

    async fn capture(&self, hold: &HoldRef) -> Result<TransactionRef, GatewayError> {
        let key = format!("capture-{}", hold);
        let body = self
            .send(
                self.client
                    .post(format!("{}/payment_intents/{}/capture", STRIPE_API, hold)),
                Some(&key),
            )
            .await?;

        if body["status"].as_str() != Some("succeeded") {
            return Err(GatewayError::InvalidState(format!(
                "capture of {} ended in {:?}",
                hold,
                body["status"].as_str()
            )));
        }

        let charge = body["latest_charge"].as_str().unwrap_or(&hold.0).to_string();
        Ok(TransactionRef(charge))
    }

    async fn void(&self, hold: &HoldRef) -> Result<(), GatewayError> {
        let key = format!("void-{}", hold);
        let result = self
            .send(
                self.client
                    .post(format!("{}/payment_intents/{}/cancel", STRIPE_API, hold)),
                Some(&key),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // Already canceled counts as voided.
            Err(GatewayError::InvalidState(message)) if message.contains("canceled") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn refund(&self, transaction: &TransactionRef) -> Result<(), GatewayError> {
        let key = format!("refund-{}", transaction);
        let field = if transaction.0.starts_with("pi_") {
            "payment_intent"
        } else {
            "charge"
        };

        self.send(
            self.client
                .post(format!("{}/refunds", STRIPE_API))
                .form(&[(field, transaction.0.as_str())]),
            Some(&key),
        )
        .await?;

        Ok(())
    }
}
