//! One checkout, start to finish.
//!
//! Stages run strictly in order: the cart is validated, priced, persisted as a
//! pending order, and only then sent to the payment gateway. The redirect URL
//! handed to the gateway names the local order, so the order must exist first.
//! A gateway failure leaves the pending order in place without a gateway
//! reference; operators can find it with `orders-cli list --unlinked`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::order::Model as OrderModel,
    errors::ServiceError,
    middleware_helpers::retry::{with_retry, RetryConfig},
    services::{
        customization::{validate_line, CartLineInput, ValidatedLine},
        menu::MenuService,
        orders::{CustomerDetails, OrderService},
        payment_gateway::{
            GatewayDiscount, GatewayError, GatewayLineItem, GatewayRetryPolicy, PaymentGateway,
            PaymentLink, PaymentLinkRequest,
        },
        pricing::{self, round2, to_minor_units, PriceBreakdown},
        promotions::{self, PromotionService},
    },
};

/// Ten digits starting with 0, whitespace already stripped
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[0-9]{9}$").unwrap());

pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutStage {
    Validating,
    Pricing,
    Persisting,
    RequestingPayment,
    Reconciled,
}

impl CheckoutStage {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckoutStage::Validating => "validating",
            CheckoutStage::Pricing => "pricing",
            CheckoutStage::Persisting => "persisting",
            CheckoutStage::RequestingPayment => "requesting_payment",
            CheckoutStage::Reconciled => "reconciled",
        }
    }
}

/// A checkout as received from the storefront
#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub customer: CustomerDetails,
    pub lines: Vec<CartLineInput>,
}

/// What the customer needs to continue to payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub payment_url: String,
    pub gateway_order_id: String,
}

/// Checkout knobs taken from configuration
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    pub currency: String,
    pub location_id: String,
    pub public_base_url: String,
    pub max_cart_lines: usize,
    pub retry: RetryConfig,
    /// Bound on a single gateway attempt
    pub gateway_timeout: Duration,
}

impl From<&AppConfig> for CheckoutSettings {
    fn from(cfg: &AppConfig) -> Self {
        let gateway = &cfg.payment_gateway;
        Self {
            currency: gateway.currency.to_uppercase(),
            location_id: gateway.location(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
            max_cart_lines: cfg.max_cart_lines,
            retry: RetryConfig::from(gateway),
            gateway_timeout: gateway.request_timeout(),
        }
    }
}

/// Trims contact details and checks them before anything is priced.
pub fn normalize_customer(customer: &CustomerDetails) -> Result<CustomerDetails, ServiceError> {
    let name = customer.name.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(
            "Customer name is required".to_string(),
        ));
    }

    let phone: String = customer.phone.chars().filter(|c| !c.is_whitespace()).collect();
    if phone.is_empty() {
        return Err(ServiceError::ValidationError(
            "Phone number is required".to_string(),
        ));
    }
    if !PHONE_RE.is_match(&phone) {
        return Err(ServiceError::ValidationError(
            "Phone number must be 10 digits and start with 0".to_string(),
        ));
    }

    let email = match customer.email.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(email) if validator::validate_email(email) => Some(email.to_string()),
        Some(_) => {
            return Err(ServiceError::ValidationError(
                "Email address is not valid".to_string(),
            ))
        }
    };

    Ok(CustomerDetails {
        name: name.to_string(),
        phone,
        email,
    })
}

/// Short human readable summary of the chosen options, e.g. "Sauce: Garlic, Chili"
fn options_note(line: &ValidatedLine) -> Option<String> {
    if line.selected_options.is_empty() {
        return None;
    }
    Some(
        line.selected_options
            .iter()
            .map(|(group, options)| format!("{}: {}", group, options.join(", ")))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Runs checkouts against the menu, promotions, order store and gateway
#[derive(Clone)]
pub struct CheckoutService {
    menu: MenuService,
    promotions: PromotionService,
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        menu: MenuService,
        promotions: PromotionService,
        orders: OrderService,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            menu,
            promotions,
            orders,
            gateway,
            settings,
        }
    }

    /// Validates, prices and persists the cart, then asks the gateway for a payment link.
    #[instrument(skip(self, request), fields(lines = request.lines.len(), gateway = self.gateway.name()))]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, ServiceError> {
        let mut stage = CheckoutStage::Validating;
        let result = self.run(request, &mut stage).await;

        match &result {
            Ok(receipt) => {
                counter!("checkout.orders.completed", 1);
                info!(order_id = %receipt.order_id, "Checkout completed");
            }
            Err(e) => {
                counter!("checkout.orders.failed", 1, "stage" => stage.as_str());
                warn!(stage = stage.as_str(), error = %e, "Checkout failed");
            }
        }
        result
    }

    async fn run(
        &self,
        request: CheckoutRequest,
        stage: &mut CheckoutStage,
    ) -> Result<CheckoutReceipt, ServiceError> {
        *stage = CheckoutStage::Validating;
        let customer = normalize_customer(&request.customer)?;
        let lines = self.validate_lines(&request.lines).await?;

        *stage = CheckoutStage::Pricing;
        let (breakdown, discount) = self.price(&lines).await?;

        *stage = CheckoutStage::Persisting;
        // One key per checkout, shared by every retry of the gateway call below
        let idempotency_key = Uuid::new_v4().to_string();
        let order = self
            .orders
            .create_pending(
                &customer,
                &lines,
                &breakdown,
                &self.settings.currency,
                &idempotency_key,
            )
            .await?;

        *stage = CheckoutStage::RequestingPayment;
        let link_request = self.link_request(&order, &customer, &lines, discount, idempotency_key)?;
        let link = self.request_payment_link(&link_request).await.map_err(|e| {
            error!(
                order_id = %order.id,
                idempotency_key = %link_request.idempotency_key,
                error = %e,
                "Payment link not created; order left pending without gateway reference"
            );
            ServiceError::Gateway(e)
        })?;

        *stage = CheckoutStage::Reconciled;
        self.orders
            .attach_gateway_reference(order.id, &link.gateway_order_id)
            .await
            .map_err(|e| {
                error!(
                    order_id = %order.id,
                    gateway_order_id = %link.gateway_order_id,
                    error = %e,
                    "Payment link created but not recorded on the order"
                );
                e
            })?;

        Ok(CheckoutReceipt {
            order_id: order.id,
            payment_url: link.payment_url,
            gateway_order_id: link.gateway_order_id,
        })
    }

    async fn validate_lines(
        &self,
        lines: &[CartLineInput],
    ) -> Result<Vec<ValidatedLine>, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }
        if lines.len() > self.settings.max_cart_lines {
            return Err(ServiceError::ValidationError(format!(
                "Cart has more than {} lines",
                self.settings.max_cart_lines
            )));
        }
        if let Some(line) = lines
            .iter()
            .find(|l| l.quantity == 0 || l.quantity > MAX_LINE_QUANTITY)
        {
            return Err(ServiceError::ValidationError(format!(
                "Quantity must be between 1 and {} (got {})",
                MAX_LINE_QUANTITY, line.quantity
            )));
        }

        let ids: Vec<Uuid> = lines
            .iter()
            .map(|l| l.menu_item_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let menu = self.menu.items_by_ids(&ids).await?;

        let mut validated = Vec::with_capacity(lines.len());
        for line in lines {
            let item = menu.get(&line.menu_item_id).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Menu item {} does not exist",
                    line.menu_item_id
                ))
            })?;
            if !item.is_available {
                return Err(ServiceError::ValidationError(format!(
                    "{} is currently unavailable",
                    item.name
                )));
            }

            let checked = validate_line(item, line)?;
            if let Some(client_price) = line.client_unit_price {
                if round2(client_price) != checked.unit_price {
                    warn!(
                        menu_item_id = %line.menu_item_id,
                        client_price = %client_price,
                        menu_price = %checked.unit_price,
                        "Client price differs from menu price; using menu price"
                    );
                }
            }
            validated.push(checked);
        }
        Ok(validated)
    }

    async fn price(
        &self,
        lines: &[ValidatedLine],
    ) -> Result<(PriceBreakdown, Option<GatewayDiscount>), ServiceError> {
        let now = Utc::now();
        let running = self.promotions.current_promotions(now).await?;
        let best = promotions::select_best(&running, now);
        if let Some(promo) = best {
            debug!(promotion_id = %promo.id, discount = %promo.discount_value, "Promotion applied");
        }

        let breakdown = pricing::price(lines, best);
        let discount = best.filter(|p| !p.discount_value.is_zero()).map(|p| GatewayDiscount {
            name: p.name.clone(),
            percentage: p.discount_value.normalize().to_string(),
        });
        Ok((breakdown, discount))
    }

    fn link_request(
        &self,
        order: &OrderModel,
        customer: &CustomerDetails,
        lines: &[ValidatedLine],
        discount: Option<GatewayDiscount>,
        idempotency_key: String,
    ) -> Result<PaymentLinkRequest, ServiceError> {
        let line_items = lines
            .iter()
            .map(|line| {
                let unit_amount_minor = to_minor_units(line.unit_price).ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Price of {} does not fit in minor units",
                        line.name
                    ))
                })?;
                Ok(GatewayLineItem {
                    name: line.name.clone(),
                    quantity: line.quantity,
                    unit_amount_minor,
                    currency: self.settings.currency.clone(),
                    note: options_note(line),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(PaymentLinkRequest {
            idempotency_key,
            location_id: self.settings.location_id.clone(),
            line_items,
            discount,
            note: format!(
                "{} ({}) - order {}",
                customer.name, customer.phone, order.id
            ),
            redirect_url: format!(
                "{}/order-confirmation/{}",
                self.settings.public_base_url, order.id
            ),
            reference_id: order.id.to_string(),
        })
    }

    /// Retries transient failures and timeouts with the same idempotency key.
    async fn request_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        let gateway: &dyn PaymentGateway = self.gateway.as_ref();
        let timeout = self.settings.gateway_timeout;

        with_retry(&self.settings.retry, GatewayRetryPolicy, move |attempt| async move {
            counter!("checkout.gateway.attempts", 1);
            debug!(attempt, idempotency_key = %request.idempotency_key, "Requesting payment link");
            match tokio::time::timeout(timeout, gateway.create_payment_link(request)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::TimedOut(timeout)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::menu_item::{CustomizationGroup, MenuOption, SelectionMode};
    use crate::entities::order::OrderStatus;
    use crate::services::menu::NewMenuItem;
    use crate::services::orders::OrderFilter;
    use crate::services::payment_gateway::MockPaymentGateway;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sea_orm::ConnectionTrait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct Fixture {
        menu: MenuService,
        promotions: PromotionService,
        orders: OrderService,
        burger_id: Uuid,
        pool: Arc<crate::db::DbPool>,
    }

    async fn fixture() -> Fixture {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        let pool = Arc::new(pool);

        let menu = MenuService::new(pool.clone());
        let burger = menu
            .create_item(NewMenuItem {
                name: "Cheese Burger".into(),
                category: "Burgers".into(),
                description: String::new(),
                price: dec!(6.95),
                image_url: None,
                groups: vec![CustomizationGroup {
                    title: "Sauce".into(),
                    selection: SelectionMode::Single,
                    max_selections: 1,
                    options: vec![
                        MenuOption {
                            name: "Garlic".into(),
                            price: Decimal::ZERO,
                            unlocks_groups: vec![],
                        },
                        MenuOption {
                            name: "Chili".into(),
                            price: dec!(0.50),
                            unlocks_groups: vec![],
                        },
                    ],
                }],
            })
            .await
            .unwrap();

        Fixture {
            menu,
            promotions: PromotionService::new(pool.clone()),
            orders: OrderService::new(pool.clone()),
            burger_id: burger.id,
            pool,
        }
    }

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            currency: "EUR".into(),
            location_id: "local".into(),
            public_base_url: "https://shop.example".into(),
            max_cart_lines: 50,
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_factor: 2.0,
            },
            gateway_timeout: Duration::from_millis(200),
        }
    }

    fn service(f: &Fixture, gateway: Arc<dyn PaymentGateway>) -> CheckoutService {
        CheckoutService::new(
            f.menu.clone(),
            f.promotions.clone(),
            f.orders.clone(),
            gateway,
            settings(),
        )
    }

    fn request(f: &Fixture) -> CheckoutRequest {
        let mut selected = BTreeMap::new();
        selected.insert("Sauce".to_string(), vec!["Garlic".to_string()]);
        CheckoutRequest {
            customer: CustomerDetails {
                name: " Ada ".into(),
                phone: "06 1234 5678".into(),
                email: None,
            },
            lines: vec![CartLineInput {
                menu_item_id: f.burger_id,
                quantity: 2,
                selected_options: selected,
                client_unit_price: Some(dec!(6.95)),
            }],
        }
    }

    fn link(id: &str) -> PaymentLink {
        PaymentLink {
            payment_url: format!("https://pay.example/{id}"),
            gateway_order_id: id.to_string(),
        }
    }

    #[test]
    fn customer_details_are_normalized() {
        let customer = normalize_customer(&CustomerDetails {
            name: "  Ada ".into(),
            phone: "06 12 34 56 78".into(),
            email: Some("".into()),
        })
        .unwrap();
        assert_eq!(customer.name, "Ada");
        assert_eq!(customer.phone, "0612345678");
        assert_eq!(customer.email, None);
    }

    #[test]
    fn missing_or_malformed_contact_is_rejected() {
        let base = CustomerDetails {
            name: "Ada".into(),
            phone: "0612345678".into(),
            email: None,
        };
        let cases = [
            CustomerDetails { name: "  ".into(), ..base.clone() },
            CustomerDetails { phone: "".into(), ..base.clone() },
            CustomerDetails { phone: "612345678".into(), ..base.clone() },
            CustomerDetails { email: Some("not-an-email".into()), ..base.clone() },
        ];
        for case in cases {
            assert_matches!(normalize_customer(&case), Err(ServiceError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn successful_checkout_links_the_order() {
        let f = fixture().await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_name().return_const("mock");
        gateway
            .expect_create_payment_link()
            .withf(|req| {
                req.line_items.len() == 1
                    && req.line_items[0].unit_amount_minor == 695
                    && req.line_items[0].quantity == 2
                    && req.redirect_url.starts_with("https://shop.example/order-confirmation/")
                    && req.note.contains("0612345678")
                    && req.discount.is_none()
            })
            .times(1)
            .returning(|_| Ok(link("sq-1")));

        let receipt = service(&f, Arc::new(gateway))
            .place_order(request(&f))
            .await
            .unwrap();

        let order = f.orders.get_order(receipt.order_id).await.unwrap();
        assert_eq!(order.gateway_order_id.as_deref(), Some("sq-1"));
        assert_eq!(order.status, OrderStatus::PendingAcceptance);
        assert_eq!(order.customer_name, "Ada");
        assert_eq!(receipt.payment_url, "https://pay.example/sq-1");
    }

    #[tokio::test]
    async fn transient_failures_are_retried_with_the_same_key() {
        let f = fixture().await;
        let keys = Arc::new(Mutex::new(Vec::new()));
        let seen = keys.clone();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_name().return_const("mock");
        gateway
            .expect_create_payment_link()
            .times(3)
            .returning(move |req| {
                let mut seen = seen.lock().unwrap();
                seen.push(req.idempotency_key.clone());
                if seen.len() < 3 {
                    Err(GatewayError::Transient("503".into()))
                } else {
                    Ok(link("sq-2"))
                }
            });

        service(&f, Arc::new(gateway))
            .place_order(request(&f))
            .await
            .unwrap();

        let keys = keys.lock().unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k == &keys[0]));
    }

    #[tokio::test]
    async fn rejection_is_not_retried_and_order_stays_pending() {
        let f = fixture().await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_name().return_const("mock");
        gateway
            .expect_create_payment_link()
            .times(1)
            .returning(|_| {
                Err(GatewayError::Rejected {
                    status: 400,
                    message: "INVALID_REQUEST_ERROR".into(),
                })
            });

        let err = service(&f, Arc::new(gateway))
            .place_order(request(&f))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Gateway(GatewayError::Rejected { .. }));

        let orders = f.orders.list_orders(OrderFilter::default()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::PendingAcceptance);
        assert!(orders[0].gateway_order_id.is_none());
    }

    struct SlowGateway;

    #[async_trait]
    impl PaymentGateway for SlowGateway {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn create_payment_link(
            &self,
            _request: &PaymentLinkRequest,
        ) -> Result<PaymentLink, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(link("too-late"))
        }
    }

    #[tokio::test]
    async fn slow_gateway_times_out_as_bad_gateway() {
        let f = fixture().await;
        let err = service(&f, Arc::new(SlowGateway))
            .place_order(request(&f))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Gateway(GatewayError::TimedOut(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn invalid_cart_never_reaches_storage_or_gateway() {
        let f = fixture().await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_name().return_const("mock");
        gateway.expect_create_payment_link().times(0);
        let svc = service(&f, Arc::new(gateway));

        let mut missing_sauce = request(&f);
        missing_sauce.lines[0].selected_options.clear();
        assert_matches!(
            svc.place_order(missing_sauce).await,
            Err(ServiceError::Customization(_))
        );

        let mut unknown_item = request(&f);
        unknown_item.lines[0].menu_item_id = Uuid::new_v4();
        assert_matches!(
            svc.place_order(unknown_item).await,
            Err(ServiceError::ValidationError(_))
        );

        let mut zero_qty = request(&f);
        zero_qty.lines[0].quantity = 0;
        assert_matches!(
            svc.place_order(zero_qty).await,
            Err(ServiceError::ValidationError(_))
        );

        let mut empty = request(&f);
        empty.lines.clear();
        assert_matches!(svc.place_order(empty).await, Err(ServiceError::ValidationError(_)));

        assert!(f.orders.list_orders(OrderFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_internal_and_skips_gateway() {
        let f = fixture().await;
        f.pool.execute_unprepared("DROP TABLE orders").await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_name().return_const("mock");
        gateway.expect_create_payment_link().times(0);

        let err = service(&f, Arc::new(gateway))
            .place_order(request(&f))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::DatabaseError(_));
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn options_note_lists_groups() {
        let mut selected = BTreeMap::new();
        selected.insert("Sauce".to_string(), vec!["Garlic".to_string(), "Chili".to_string()]);
        selected.insert("Drink".to_string(), vec!["Cola".to_string()]);
        let line = ValidatedLine {
            menu_item_id: Uuid::new_v4(),
            name: "Meal Deal".into(),
            quantity: 1,
            unit_price: dec!(15),
            selected_options: selected,
        };
        assert_eq!(
            options_note(&line).as_deref(),
            Some("Drink: Cola; Sauce: Garlic, Chili")
        );
    }
}
