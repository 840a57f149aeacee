use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// How many options a customer may pick in a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SelectionMode {
    Single,
    Multiple,
}

/// One choice inside a customization group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub name: String,
    /// Additional price on top of the item's base price
    #[serde(default)]
    pub price: Decimal,
    /// Titles of groups that become visible once this option is selected
    #[serde(default)]
    pub unlocks_groups: Vec<String>,
}

/// A named set of options offered on a menu item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationGroup {
    pub title: String,
    #[serde(rename = "type")]
    pub selection: SelectionMode,
    #[serde(default = "default_max_selections")]
    pub max_selections: u32,
    #[serde(default)]
    pub options: Vec<MenuOption>,
}

fn default_max_selections() -> u32 {
    1
}

impl CustomizationGroup {
    pub fn option(&self, name: &str) -> Option<&MenuOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "menu_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub customization_groups: Json, // Vec<CustomizationGroup> serialized
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decodes the stored customization groups, in their declared order.
    pub fn groups(&self) -> Result<Vec<CustomizationGroup>, serde_json::Error> {
        if self.customization_groups.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.customization_groups.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn groups_decode_with_defaults() {
        let model = Model {
            id: Uuid::new_v4(),
            name: "The Meal Deal".into(),
            category: "Deals".into(),
            description: "Burger, fries and a drink".into(),
            price: dec!(15.00),
            image_url: None,
            customization_groups: json!([
                {
                    "title": "Choose your drink",
                    "type": "SINGLE",
                    "options": [{ "name": "Cola" }, { "name": "Lemonade", "price": "0.50" }]
                }
            ]),
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let groups = model.groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].max_selections, 1);
        assert_eq!(groups[0].selection, SelectionMode::Single);
        assert_eq!(groups[0].option("Cola").unwrap().price, Decimal::ZERO);
        assert_eq!(groups[0].option("Lemonade").unwrap().price, dec!(0.50));
        assert!(groups[0].option("Water").is_none());
    }
}
