use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Takeaway Checkout API",
        version = "0.1.0",
        description = r#"
# Takeaway Checkout API

Checkout backend for a takeaway restaurant.

- `POST /orders` validates a cart of customizable menu items, applies the best running promotion, stores a pending order and returns a hosted payment link.
- `GET /orders/{id}` returns the order for status polling and pickup verification.

## Error Handling

Every error uses the same body:

```json
{
  "error": "Bad Request",
  "message": "Cheese Burger: please choose an option for 'Sauce'",
  "requestId": "req-abc123",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Checkout and order status"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::orders::CartItemRequest,
            crate::handlers::orders::CustomerRequest,
            crate::handlers::orders::SelectedOption,
            crate::handlers::orders::SelectedOptionDetail,
            crate::handlers::orders::CreateOrderResponse,
            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::CustomerResponse,
            crate::entities::order::OrderStatus,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
