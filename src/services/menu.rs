use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::menu_item::{self, CustomizationGroup, Entity as MenuItemEntity},
    errors::ServiceError,
};

/// Menu item as the checkout sees it: decoded groups, read-only.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuItemDefinition {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_available: bool,
    pub groups: Vec<CustomizationGroup>,
}

impl TryFrom<menu_item::Model> for MenuItemDefinition {
    type Error = ServiceError;

    fn try_from(model: menu_item::Model) -> Result<Self, Self::Error> {
        let groups = model.groups().map_err(|e| {
            error!(error = %e, menu_item_id = %model.id, "Stored customization groups are malformed");
            ServiceError::SerializationError(e)
        })?;
        Ok(Self {
            id: model.id,
            name: model.name,
            price: model.price,
            is_available: model.is_available,
            groups,
        })
    }
}

/// Input for adding an item to the menu (seeding and tests)
#[derive(Clone, Debug)]
pub struct NewMenuItem {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub groups: Vec<CustomizationGroup>,
}

/// Read access to the menu maintained by the administration side
#[derive(Clone)]
pub struct MenuService {
    db_pool: Arc<DbPool>,
}

impl MenuService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Loads the given items, keyed by id. Missing ids are simply absent.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn items_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, MenuItemDefinition>, ServiceError> {
        let db = &*self.db_pool;
        let models = MenuItemEntity::find()
            .filter(menu_item::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load menu items");
                ServiceError::DatabaseError(e)
            })?;

        models
            .into_iter()
            .map(|m| MenuItemDefinition::try_from(m).map(|d| (d.id, d)))
            .collect()
    }

    /// Every item, grouped by category order then name
    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<menu_item::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(MenuItemEntity::find()
            .order_by_asc(menu_item::Column::Category)
            .order_by_asc(menu_item::Column::Name)
            .all(db)
            .await?)
    }

    #[instrument(skip(self, item), fields(name = %item.name))]
    pub async fn create_item(&self, item: NewMenuItem) -> Result<menu_item::Model, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let model = menu_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(item.name),
            category: Set(item.category),
            description: Set(item.description),
            price: Set(item.price),
            image_url: Set(item.image_url),
            customization_groups: Set(serde_json::to_value(&item.groups)?),
            is_available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create menu item");
            ServiceError::DatabaseError(e)
        })?;

        info!(menu_item_id = %model.id, "Menu item created");
        Ok(model)
    }
}
