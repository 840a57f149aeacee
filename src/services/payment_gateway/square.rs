use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::{GatewayError, PaymentGateway, PaymentLink, PaymentLinkRequest};
use crate::config::PaymentGatewayConfig;

const PAYMENT_LINKS_PATH: &str = "/v2/online-checkout/payment-links";
const ORDER_DISCOUNT_UID: &str = "order-promotion";

/// Square Online Checkout payment links over REST
pub struct SquareGateway {
    client: Client,
    base_url: String,
    access_token: String,
    api_version: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct Money<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Serialize)]
struct LineItemBody<'a> {
    name: &'a str,
    /// Square expects the quantity as a decimal string
    quantity: String,
    base_price_money: Money<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DiscountBody<'a> {
    uid: &'a str,
    name: &'a str,
    percentage: &'a str,
    scope: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    location_id: &'a str,
    reference_id: &'a str,
    line_items: Vec<LineItemBody<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    discounts: Vec<DiscountBody<'a>>,
}

#[derive(Debug, Serialize)]
struct CheckoutOptions<'a> {
    redirect_url: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePaymentLinkBody<'a> {
    idempotency_key: &'a str,
    order: OrderBody<'a>,
    checkout_options: CheckoutOptions<'a>,
    payment_note: &'a str,
}

impl<'a> From<&'a PaymentLinkRequest> for CreatePaymentLinkBody<'a> {
    fn from(req: &'a PaymentLinkRequest) -> Self {
        let line_items = req
            .line_items
            .iter()
            .map(|item| LineItemBody {
                name: &item.name,
                quantity: item.quantity.to_string(),
                base_price_money: Money {
                    amount: item.unit_amount_minor,
                    currency: &item.currency,
                },
                note: item.note.as_deref(),
            })
            .collect();

        let discounts = req
            .discount
            .iter()
            .map(|d| DiscountBody {
                uid: ORDER_DISCOUNT_UID,
                name: &d.name,
                percentage: &d.percentage,
                scope: "ORDER",
            })
            .collect();

        Self {
            idempotency_key: &req.idempotency_key,
            order: OrderBody {
                location_id: &req.location_id,
                reference_id: &req.reference_id,
                line_items,
                discounts,
            },
            checkout_options: CheckoutOptions {
                redirect_url: &req.redirect_url,
            },
            payment_note: &req.note,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatePaymentLinkResponse {
    payment_link: PaymentLinkBody,
}

#[derive(Debug, Deserialize)]
struct PaymentLinkBody {
    url: String,
    order_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<SquareErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SquareErrorDetail {
    #[serde(default)]
    category: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: Option<String>,
}

fn describe_errors(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if parsed.errors.is_empty() {
        return body.chars().take(200).collect();
    }
    parsed
        .errors
        .iter()
        .map(|e| match &e.detail {
            Some(detail) => format!("{}/{}: {}", e.category, e.code, detail),
            None => format!("{}/{}", e.category, e.code),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl SquareGateway {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            access_token: access_token.into(),
            api_version: api_version.into(),
            timeout,
        })
    }

    pub fn from_config(cfg: &PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let access_token = cfg
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GatewayError::Rejected {
                status: 401,
                message: "Square access token is not configured".to_string(),
            })?;

        Self::new(
            cfg.base_url(),
            access_token,
            cfg.api_version.clone(),
            cfg.request_timeout(),
        )
    }

    fn classify_transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::TimedOut(self.timeout)
        } else {
            GatewayError::Transient(err.to_string())
        }
    }
}

#[async_trait]
impl PaymentGateway for SquareGateway {
    fn name(&self) -> &'static str {
        "square"
    }

    #[instrument(skip(self, request), fields(idempotency_key = %request.idempotency_key, reference_id = %request.reference_id))]
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        let url = format!("{}{}", self.base_url, PAYMENT_LINKS_PATH);
        let body = CreatePaymentLinkBody::from(request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Square-Version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Square request failed before a response arrived");
                self.classify_transport_error(e)
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        if status.is_success() {
            let parsed: CreatePaymentLinkResponse = serde_json::from_str(&text).map_err(|e| {
                error!(error = %e, "Unexpected Square payment link response");
                GatewayError::Transient(format!("unreadable payment link response: {e}"))
            })?;
            debug!(gateway_order_id = %parsed.payment_link.order_id, "Square payment link created");
            return Ok(PaymentLink {
                payment_url: parsed.payment_link.url,
                gateway_order_id: parsed.payment_link.order_id,
            });
        }

        let message = describe_errors(&text);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(status = %status, message = %message, "Square returned a retryable error");
            Err(GatewayError::Transient(format!("{status}: {message}")))
        } else {
            error!(status = %status, message = %message, "Square rejected the payment link request");
            Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
