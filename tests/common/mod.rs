#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use takeaway_api::{
    config::AppConfig,
    db,
    entities::menu_item::{CustomizationGroup, MenuOption, SelectionMode},
    services::{
        menu::NewMenuItem,
        payment_gateway::{InMemoryGateway, PaymentGateway},
        promotions::NewPromotion,
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

/// Ids of the menu items every test app starts with
#[derive(Clone, Copy, Debug)]
pub struct Menu {
    /// 6.95, required single "Sauce": Garlic (+0) or Chili (+0.50)
    pub cheese_burger: Uuid,
    /// 15.00, "Main" plus "Drink"; "Soft Drink" unlocks "Flavour"
    pub meal_deal: Uuid,
    /// 9.50, no customization
    pub falafel_wrap: Uuid,
    /// 4.00, switched off
    pub sold_out: Uuid,
}

/// Helper harness for spinning up an application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<InMemoryGateway>,
    pub menu: Menu,
}

fn option(name: &str, price: Decimal) -> MenuOption {
    MenuOption {
        name: name.to_string(),
        price,
        unlocks_groups: Vec::new(),
    }
}

fn single(title: &str, options: Vec<MenuOption>) -> CustomizationGroup {
    CustomizationGroup {
        title: title.to_string(),
        selection: SelectionMode::Single,
        max_selections: 1,
        options,
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.public_base_url = "https://shop.example".to_string();
    cfg.payment_gateway.initial_backoff_ms = 1;
    cfg.payment_gateway.max_backoff_ms = 5;
    cfg
}

impl TestApp {
    /// Construct a new test application with the in-memory gateway.
    pub async fn new() -> Self {
        let gateway = Arc::new(InMemoryGateway::new());
        let mut app = Self::with_gateway(gateway.clone(), test_config()).await;
        app.gateway = gateway;
        app
    }

    /// Construct a test application around any gateway implementation.
    pub async fn with_gateway(gateway: Arc<dyn PaymentGateway>, cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg, gateway);
        let menu = seed_menu(&state).await;
        let router = takeaway_api::app(state.clone());

        Self {
            router,
            state,
            gateway: Arc::new(InMemoryGateway::new()),
            menu,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a raw body, for malformed JSON cases.
    pub async fn post_raw(&self, uri: &str, raw: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn post_order(&self, body: Value) -> (StatusCode, Value) {
        let response = self.request(Method::POST, "/orders", Some(body)).await;
        read_json(response).await
    }

    pub async fn get_order(&self, id: &str) -> (StatusCode, Value) {
        let response = self
            .request(Method::GET, &format!("/orders/{}", id), None)
            .await;
        read_json(response).await
    }

    /// Adds a running promotion with the given percentage.
    pub async fn add_promotion(&self, name: &str, discount: Decimal) {
        let now = Utc::now();
        self.state
            .services
            .promotions
            .create_promotion(NewPromotion {
                name: name.to_string(),
                description: String::new(),
                discount_value: discount,
                start_time: now - Duration::hours(1),
                end_time: now + Duration::hours(1),
                is_active: true,
            })
            .await
            .expect("seed promotion");
    }
}

async fn seed_menu(state: &AppState) -> Menu {
    let menu = &state.services.menu;

    let cheese_burger = menu
        .create_item(NewMenuItem {
            name: "Cheese Burger".into(),
            category: "Burgers".into(),
            description: "Beef, cheddar, pickles".into(),
            price: dec!(6.95),
            image_url: None,
            groups: vec![single(
                "Sauce",
                vec![option("Garlic", Decimal::ZERO), option("Chili", dec!(0.50))],
            )],
        })
        .await
        .expect("seed burger");

    let meal_deal = menu
        .create_item(NewMenuItem {
            name: "Meal Deal".into(),
            category: "Deals".into(),
            description: "Burger, fries and a drink".into(),
            price: dec!(15.00),
            image_url: None,
            groups: vec![
                single(
                    "Main",
                    vec![option("Cheese Burger", Decimal::ZERO), option("Chicken Burger", dec!(0.55))],
                ),
                CustomizationGroup {
                    title: "Drink".into(),
                    selection: SelectionMode::Single,
                    max_selections: 1,
                    options: vec![
                        option("Water", Decimal::ZERO),
                        MenuOption {
                            name: "Soft Drink".into(),
                            price: Decimal::ZERO,
                            unlocks_groups: vec!["Flavour".into()],
                        },
                    ],
                },
                single("Flavour", vec![option("Cola", Decimal::ZERO), option("Orange", Decimal::ZERO)]),
            ],
        })
        .await
        .expect("seed meal deal");

    let falafel_wrap = menu
        .create_item(NewMenuItem {
            name: "Falafel Wrap".into(),
            category: "Wraps".into(),
            description: "Falafel, hummus, tahini".into(),
            price: dec!(9.50),
            image_url: None,
            groups: Vec::new(),
        })
        .await
        .expect("seed wrap");

    let sold_out = menu
        .create_item(NewMenuItem {
            name: "Seasonal Soup".into(),
            category: "Sides".into(),
            description: String::new(),
            price: dec!(4.00),
            image_url: None,
            groups: Vec::new(),
        })
        .await
        .expect("seed soup");
    mark_unavailable(state, sold_out.id).await;

    Menu {
        cheese_burger: cheese_burger.id,
        meal_deal: meal_deal.id,
        falafel_wrap: falafel_wrap.id,
        sold_out: sold_out.id,
    }
}

async fn mark_unavailable(state: &AppState, id: Uuid) {
    use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
    use takeaway_api::entities::menu_item;

    let model = menu_item::Entity::find_by_id(id)
        .one(&*state.db)
        .await
        .expect("load menu item")
        .expect("menu item exists");
    let mut active = model.into_active_model();
    active.is_available = Set(false);
    active.update(&*state.db).await.expect("update menu item");
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("response body is json")
    };
    (status, json)
}

/// Order body as the storefront sends it
pub fn order_body(lines: Value) -> Value {
    serde_json::json!({
        "cartItems": lines,
        "customer": { "name": "Ada Lovelace", "phone": "0612345678", "email": "ada@example.com" }
    })
}

pub fn burger_line(id: Uuid, qty: u32, sauce: &str) -> Value {
    serde_json::json!({
        "itemId": id,
        "name": "Cheese Burger",
        "qty": qty,
        "price": 6.95,
        "selectedOptions": { "Sauce": [sauce] }
    })
}

pub fn assert_money(value: &Value, expected: f64) {
    let actual = value.as_f64().expect("money is a number");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
