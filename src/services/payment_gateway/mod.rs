//! Hosted payment link creation.
//!
//! The checkout only needs one operation from a payment provider: turn an
//! order into a hosted checkout URL. Every call carries an idempotency key so
//! a retried request never creates a second gateway order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{GatewayProvider, PaymentGatewayConfig};
use crate::middleware_helpers::retry::RetryPolicy;

pub mod in_memory;
pub mod square;

pub use in_memory::InMemoryGateway;
pub use square::SquareGateway;

#[cfg(test)]
use mockall::automock;

/// One line item, amounts in minor units of `currency`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_amount_minor: i64,
    pub currency: String,
    /// Selected options, human readable
    pub note: Option<String>,
}

/// Order-scoped percentage discount
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayDiscount {
    pub name: String,
    /// Decimal string, e.g. "12.5"
    pub percentage: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    /// Unique per checkout, reused only by retries of that checkout
    pub idempotency_key: String,
    pub location_id: String,
    pub line_items: Vec<GatewayLineItem>,
    pub discount: Option<GatewayDiscount>,
    /// Free text shown to staff; carries customer contact and local order id
    pub note: String,
    pub redirect_url: String,
    /// Local order id
    pub reference_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub payment_url: String,
    pub gateway_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network failure, 5xx or rate limiting. Safe to retry with the same key.
    #[error("transient gateway failure: {0}")]
    Transient(String),

    /// No answer in time; the gateway may or may not have created the order.
    #[error("gateway call timed out after {0:?}")]
    TimedOut(Duration),

    /// The gateway refused the request; retrying will not help.
    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_) | GatewayError::TimedOut(_))
    }
}

/// Retries transient failures and timeouts; never rejections.
pub struct GatewayRetryPolicy;

impl RetryPolicy<GatewayError> for GatewayRetryPolicy {
    fn is_retryable(&self, error: &GatewayError) -> bool {
        error.is_retryable()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short provider name for logs and health output
    fn name(&self) -> &'static str;

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError>;
}

/// Builds the configured gateway once at startup.
pub fn build_gateway(cfg: &PaymentGatewayConfig) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    let gateway: Arc<dyn PaymentGateway> = match cfg.provider {
        GatewayProvider::Square => Arc::new(SquareGateway::from_config(cfg)?),
        GatewayProvider::InMemory => Arc::new(InMemoryGateway::new()),
    };
    info!(
        provider = gateway.name(),
        environment = ?cfg.environment,
        "Payment gateway configured"
    );
    Ok(gateway)
}
