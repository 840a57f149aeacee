use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::order::{Model as OrderModel, OrderStatus},
    errors::{ApiError, ServiceError},
    handlers::common::parse_order_id,
    services::{
        checkout::CheckoutRequest, customization::CartLineInput, orders::CustomerDetails,
        pricing::round2,
    },
    AppState,
};

/// A selected option, either by name or as the `{name, price}` object the storefront sends
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SelectedOption {
    Name(String),
    Detailed(SelectedOptionDetail),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SelectedOptionDetail {
    pub name: String,
    /// Informational; the menu price is used
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
}

impl SelectedOption {
    fn into_name(self) -> String {
        match self {
            SelectedOption::Name(name) => name,
            SelectedOption::Detailed(detail) => detail.name,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CartItemRequest {
    pub item_id: Uuid,
    /// Display name as shown in the cart; the menu name is used
    #[serde(default)]
    pub name: Option<String>,
    pub qty: u32,
    /// Unit price the storefront displayed; the server recomputes it
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    /// Group title to the options chosen in it
    #[serde(default)]
    pub selected_options: BTreeMap<String, Vec<SelectedOption>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub cart_items: Vec<CartItemRequest>,
    pub customer: CustomerRequest,
}

impl From<CreateOrderRequest> for CheckoutRequest {
    fn from(req: CreateOrderRequest) -> Self {
        let lines = req
            .cart_items
            .into_iter()
            .map(|item| CartLineInput {
                menu_item_id: item.item_id,
                quantity: item.qty,
                selected_options: item
                    .selected_options
                    .into_iter()
                    .map(|(group, options)| {
                        (group, options.into_iter().map(SelectedOption::into_name).collect())
                    })
                    .collect(),
                client_unit_price: item.price,
            })
            .collect();

        CheckoutRequest {
            customer: CustomerDetails {
                name: req.customer.name,
                phone: req.customer.phone,
                email: req.customer.email,
            },
            lines,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub payment_url: String,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
    pub selected_options: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer: CustomerResponse,
    pub items: Vec<OrderItemResponse>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub discount_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub discount_percent: Option<Decimal>,
    pub promotion_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_price: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub verification_code: String,
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderModel> for OrderResponse {
    type Error = ServiceError;

    fn try_from(order: OrderModel) -> Result<Self, Self::Error> {
        let items = order
            .line_items()?
            .into_iter()
            .map(|item| OrderItemResponse {
                menu_item_id: item.menu_item_id,
                name: item.name,
                quantity: item.quantity,
                unit_price: round2(item.unit_price),
                selected_options: item.selected_options,
            })
            .collect();

        Ok(Self {
            id: order.id,
            customer: CustomerResponse {
                name: order.customer_name,
                phone: order.customer_phone,
                email: order.customer_email,
            },
            items,
            subtotal: round2(order.subtotal),
            discount_amount: round2(order.discount_amount),
            discount_percent: order.discount_percent.map(|p| p.normalize()),
            promotion_name: order.promotion_name,
            total_price: round2(order.total_price),
            currency: order.currency,
            status: order.status,
            verification_code: order.verification_code,
            gateway_order_id: order.gateway_order_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

/// Create an order and a hosted payment link for it
#[utoipa::path(
    post,
    path = "/orders",
    summary = "Place order",
    description = "Validates the cart, prices it with the best running promotion, stores a pending order and returns the payment link",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order stored and payment link created", body = CreateOrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid customer details or cart", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order could not be stored", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider failed", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let Json(request) = payload?;

    let receipt = state
        .services
        .checkout
        .place_order(CheckoutRequest::from(request))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            payment_url: receipt.payment_url,
            order_id: receipt.order_id,
        }),
    ))
}

/// Fetch an order for status polling and pickup verification
#[utoipa::path(
    get,
    path = "/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order could not be loaded", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let order_id = parse_order_id(&id)?;
    let order = state.services.orders.get_order(order_id).await?;
    Ok(Json(OrderResponse::try_from(order)?))
}
