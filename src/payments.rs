use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Processor-side lifecycle of a payment authorization. Only `Succeeded`
/// is accepted by the order placement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresCapture => "requires_capture",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Canceled => "canceled",
            PaymentIntentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: PaymentIntentStatus,
    /// Amount in the processor's minor units (major units x 100).
    pub amount: i64,
    pub currency: String,
}

/// Opaque proxy to the external payment processor. Constructed once at
/// process start; no retries, every failure surfaces to the caller.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        user_id: Uuid,
    ) -> AppResult<PaymentIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent>;
}

/// Convert a major-unit amount to the processor's minor-unit integer
/// representation (x 100, midpoint rounds away from zero).
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("Valid amount required".to_string()));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::BadRequest("Amount out of range".to_string()))
}

/// REST client against the Stripe payment-intents API. No vendor SDK, just
/// form-encoded requests over a preconfigured reqwest client with a hard
/// timeout.
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.payment_timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
        })
    }

    async fn parse_intent(&self, response: reqwest::Response) -> AppResult<PaymentIntent> {
        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("processor returned HTTP {status}"));
            return Err(AppError::PaymentGateway(message));
        }
        response
            .json::<PaymentIntent>()
            .await
            .map_err(|err| AppError::PaymentGateway(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        user_id: Uuid,
    ) -> AppResult<PaymentIntent> {
        let minor_units = to_minor_units(amount)?;
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", minor_units.to_string()),
                ("currency", currency.to_string()),
                ("metadata[user_id]", user_id.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.parse_intent(response).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(transport_error)?;

        self.parse_intent(response).await
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::PaymentGateway("processor request timed out".to_string())
    } else {
        AppError::PaymentGateway(err.to_string())
    }
}
