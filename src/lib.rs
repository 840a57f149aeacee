//! Takeaway checkout API library
//!
//! Cart validation, promotion pricing, order records and hosted payment links
//! for a takeaway restaurant storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        gateway: Arc<dyn services::payment_gateway::PaymentGateway>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config, gateway);
        Self {
            db,
            config,
            services,
        }
    }
}

/// Checkout and order status routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/orders", post(handlers::orders::create_order))
        // Route used by earlier storefront builds
        .route("/orders/create", post(handlers::orders::create_order))
        .route("/orders/:id", get(handlers::orders::get_order))
}

/// Routes plus request-id and HTTP tracing middleware, ready to serve
pub fn app(state: AppState) -> Router {
    api_routes()
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
