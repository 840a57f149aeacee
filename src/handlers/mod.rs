pub mod common;
pub mod health;
pub mod orders;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::{
    checkout::{CheckoutService, CheckoutSettings},
    menu::MenuService,
    orders::OrderService,
    payment_gateway::PaymentGateway,
    promotions::PromotionService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub menu: Arc<MenuService>,
    pub promotions: Arc<PromotionService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppServices {
    /// Wires the services around one database pool and the configured gateway.
    pub fn new(db_pool: Arc<DbPool>, cfg: &AppConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        let menu = MenuService::new(db_pool.clone());
        let promotions = PromotionService::new(db_pool.clone());
        let orders = OrderService::new(db_pool);

        let checkout = Arc::new(CheckoutService::new(
            menu.clone(),
            promotions.clone(),
            orders.clone(),
            gateway.clone(),
            CheckoutSettings::from(cfg),
        ));

        Self {
            menu: Arc::new(menu),
            promotions: Arc::new(promotions),
            orders: Arc::new(orders),
            checkout,
            gateway,
        }
    }
}
