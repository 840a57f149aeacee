use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order lifecycle. Orders are created as `PendingAcceptance`; staff move them on.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING_ACCEPTANCE")]
    PendingAcceptance,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

impl OrderStatus {
    /// `REJECTED` and `COMPLETED` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Completed)
    }

    /// Forward-only transitions made by staff after creation.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingAcceptance, Accepted | Rejected | Completed) | (Accepted, Rejected | Completed)
        )
    }
}

/// Frozen copy of one cart line as it was priced at checkout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemSnapshot {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    /// Base price plus selected option prices
    pub unit_price: Decimal,
    /// Group title to selected option names, in selection order
    pub selected_options: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Gateway-side order id; `None` until the payment link exists
    pub gateway_order_id: Option<String>,
    pub verification_code: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub items: Json, // Vec<LineItemSnapshot> serialized
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub discount_percent: Option<Decimal>,
    pub promotion_name: Option<String>,
    pub total_price: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn line_items(&self) -> Result<Vec<LineItemSnapshot>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }
}
