use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::{GatewayError, PaymentGateway, PaymentLink, PaymentLinkRequest};

const CHECKOUT_BASE_URL: &str = "https://checkout.local/pay";

/// Gateway double for development and tests.
///
/// Honors idempotency keys the way a real provider does: a repeated key
/// returns the link created the first time. Failures can be scripted with
/// [`InMemoryGateway::fail_next`].
#[derive(Default)]
pub struct InMemoryGateway {
    links: DashMap<String, PaymentLink>,
    requests: DashMap<String, PaymentLinkRequest>,
    scripted_failures: Mutex<VecDeque<GatewayError>>,
    calls: AtomicU32,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues errors returned by the next calls, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = GatewayError>) {
        if let Ok(mut queue) = self.scripted_failures.lock() {
            queue.extend(errors);
        }
    }

    /// Number of calls received, failed ones included
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Distinct payment links created so far
    pub fn links_created(&self) -> usize {
        self.links.len()
    }

    /// Request that produced the link for `idempotency_key`
    pub fn request_for(&self, idempotency_key: &str) -> Option<PaymentLinkRequest> {
        self.requests.get(idempotency_key).map(|r| r.value().clone())
    }

    fn next_failure(&self) -> Option<GatewayError> {
        self.scripted_failures
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.next_failure() {
            debug!(error = %err, "Returning scripted gateway failure");
            return Err(err);
        }

        if request.line_items.is_empty() {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "order has no line items".to_string(),
            });
        }

        let link = self
            .links
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| {
                let gateway_order_id = Uuid::new_v4().simple().to_string();
                self.requests
                    .insert(request.idempotency_key.clone(), request.clone());
                PaymentLink {
                    payment_url: format!("{}/{}", CHECKOUT_BASE_URL, gateway_order_id),
                    gateway_order_id,
                }
            })
            .value()
            .clone();

        debug!(gateway_order_id = %link.gateway_order_id, "In-memory payment link issued");
        Ok(link)
    }
}
