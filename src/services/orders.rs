use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, LineItemSnapshot, Model as OrderModel, OrderStatus},
    errors::ServiceError,
    services::{customization::ValidatedLine, pricing::PriceBreakdown},
};

const DEFAULT_LIST_LIMIT: u64 = 50;

/// Contact details captured at checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Filter for operator listings
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Only orders the gateway never acknowledged
    pub unlinked_only: bool,
    pub limit: Option<u64>,
}

/// Two decimal digits, zero padded. Pickup identification only, not a secret.
pub fn generate_verification_code() -> String {
    format!("{:02}", rand::thread_rng().gen_range(0..100))
}

/// Persistence of order records and their status lifecycle
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Persists a new `PENDING_ACCEPTANCE` order with no gateway reference.
    #[instrument(skip(self, customer, lines, breakdown), fields(lines = lines.len(), total = %breakdown.total))]
    pub async fn create_pending(
        &self,
        customer: &CustomerDetails,
        lines: &[ValidatedLine],
        breakdown: &PriceBreakdown,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let snapshot: Vec<LineItemSnapshot> = lines
            .iter()
            .map(|line| LineItemSnapshot {
                menu_item_id: line.menu_item_id,
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                selected_options: line.selected_options.clone(),
            })
            .collect();

        let model = order::ActiveModel {
            id: Set(order_id),
            gateway_order_id: Set(None),
            verification_code: Set(generate_verification_code()),
            customer_name: Set(customer.name.clone()),
            customer_phone: Set(customer.phone.clone()),
            customer_email: Set(customer.email.clone()),
            items: Set(serde_json::to_value(&snapshot)?),
            subtotal: Set(breakdown.subtotal),
            discount_amount: Set(breakdown.discount_amount),
            discount_percent: Set(breakdown.discount_percent),
            promotion_name: Set(breakdown.promotion_name.clone()),
            total_price: Set(breakdown.total),
            currency: Set(currency.to_string()),
            status: Set(OrderStatus::PendingAcceptance),
            idempotency_key: Set(Some(idempotency_key.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to persist pending order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %model.id, "Pending order created");
        Ok(model)
    }

    /// Records the gateway order id once. Repeating the same id is a no-op.
    #[instrument(skip(self))]
    pub async fn attach_gateway_reference(
        &self,
        order_id: Uuid,
        gateway_order_id: &str,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;

        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::GatewayOrderId,
                Expr::value(gateway_order_id.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::GatewayOrderId.is_null())
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, gateway_order_id, "Failed to attach gateway reference");
                ServiceError::DatabaseError(e)
            })?;

        let order = self.get_order(order_id).await?;
        if result.rows_affected == 0 {
            match order.gateway_order_id.as_deref() {
                Some(existing) if existing == gateway_order_id => {}
                Some(existing) => {
                    warn!(order_id = %order_id, existing, gateway_order_id, "Order already linked to another gateway order");
                    return Err(ServiceError::Conflict(format!(
                        "Order {} is already linked to gateway order {}",
                        order_id, existing
                    )));
                }
                None => {
                    return Err(ServiceError::InternalError(format!(
                        "Gateway reference for order {} was not stored",
                        order_id
                    )));
                }
            }
        }

        info!(order_id = %order_id, gateway_order_id, "Gateway reference attached");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to load order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Moves an order forward. The update only applies while the order is
    /// still in the status it was read with, so concurrent changes are not lost.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        let current = self.get_order(order_id).await?;

        if !current.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let result = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(next))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(current.status))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            let latest = self.get_order(order_id).await?;
            return Err(ServiceError::InvalidTransition {
                from: latest.status,
                to: next,
            });
        }

        info!(order_id = %order_id, from = %current.status, to = %next, "Order status updated");
        self.get_order(order_id).await
    }

    /// Newest first
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<OrderModel>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = OrderEntity::find();

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if filter.unlinked_only {
            query = query.filter(order::Column::GatewayOrderId.is_null());
        }

        Ok(query
            .order_by_desc(order::Column::CreatedAt)
            .limit(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .all(db)
            .await?)
    }
}
