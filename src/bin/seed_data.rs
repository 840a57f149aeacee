//! Seed data script - populates the database with the demo menu
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 5 menu items (burgers, wraps, meal deal) with customization groups
//! - A weekday lunch promotion running for the next 30 days

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use takeaway_api::{
    config, db,
    entities::menu_item::{CustomizationGroup, MenuOption, SelectionMode},
    services::{
        menu::{MenuService, NewMenuItem},
        promotions::{NewPromotion, PromotionService},
    },
};

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

fn multiple(title: &str, max_selections: u32, options: Vec<MenuOption>) -> CustomizationGroup {
    CustomizationGroup {
        title: title.to_string(),
        selection: SelectionMode::Multiple,
        max_selections,
        options,
    }
}

fn burger_sauces() -> CustomizationGroup {
    multiple(
        "Sauces",
        2,
        vec![
            option("House Sauce", Decimal::ZERO),
            option("Garlic Mayo", Decimal::ZERO),
            option("Chili Mayo", dec!(0.50)),
            option("BBQ", Decimal::ZERO),
        ],
    )
}

fn demo_menu() -> Vec<NewMenuItem> {
    vec![
        NewMenuItem {
            name: "The Classic Burger".into(),
            category: "Burgers".into(),
            description: "6oz Irish beef patty, cheese, lettuce, onion, tomato, and house sauce.".into(),
            price: dec!(10.95),
            image_url: Some("/images/classic-burger.jpg".into()),
            groups: vec![
                single(
                    "Cooking",
                    vec![option("Medium", Decimal::ZERO), option("Well Done", Decimal::ZERO)],
                ),
                multiple(
                    "Extras",
                    3,
                    vec![
                        option("Bacon", dec!(1.50)),
                        option("Extra Cheese", dec!(1.00)),
                        option("Jalapeños", dec!(0.75)),
                    ],
                ),
                burger_sauces(),
            ],
        },
        NewMenuItem {
            name: "Spicy Chicken Burger".into(),
            category: "Burgers".into(),
            description: "Crispy fried chicken, spicy slaw, pickles, and chili mayo.".into(),
            price: dec!(11.50),
            image_url: Some("/images/spicy-chicken-burger.jpg".into()),
            groups: vec![single(
                "Heat",
                vec![option("Hot", Decimal::ZERO), option("Extra Hot", Decimal::ZERO)],
            )],
        },
        NewMenuItem {
            name: "Chicken Shawarma Wrap".into(),
            category: "Wraps".into(),
            description: "Marinated chicken, garlic sauce, pickles, and fries wrapped in flatbread.".into(),
            price: dec!(9.95),
            image_url: Some("/images/chicken-shawarma-wrap.jpg".into()),
            groups: vec![single(
                "Bread",
                vec![option("Flatbread", Decimal::ZERO), option("Wholemeal", dec!(0.50))],
            )],
        },
        NewMenuItem {
            name: "The Meal Deal".into(),
            category: "Deals".into(),
            description: "Choose any burger, a side of fries, and a soft drink.".into(),
            price: dec!(15.00),
            image_url: Some("/images/meal-deal.jpg".into()),
            groups: vec![
                single(
                    "Main",
                    vec![
                        option("The Classic Burger", Decimal::ZERO),
                        option("Spicy Chicken Burger", dec!(0.55)),
                    ],
                ),
                single(
                    "Side",
                    vec![option("Fries", Decimal::ZERO), option("Cheesy Fries", dec!(1.00))],
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
                            unlocks_groups: vec!["Soft Drink Flavour".into()],
                        },
                    ],
                },
                single(
                    "Soft Drink Flavour",
                    vec![
                        option("Cola", Decimal::ZERO),
                        option("Orange", Decimal::ZERO),
                        option("Lemon", Decimal::ZERO),
                    ],
                ),
            ],
        },
        NewMenuItem {
            name: "Falafel Wrap".into(),
            category: "Wraps".into(),
            description: "Homemade falafel, hummus, lettuce, tomato, and tahini sauce.".into(),
            price: dec!(9.50),
            image_url: Some("/images/falafel-wrap.jpg".into()),
            groups: Vec::new(),
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load application config")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Takeaway API Seed Data ===");
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    let pool = Arc::new(pool);

    info!("Creating menu items...");
    let menu = MenuService::new(pool.clone());
    let mut created = 0;
    for item in demo_menu() {
        let model = menu.create_item(item).await?;
        info!("  {} {} ({})", model.id, model.name, model.price);
        created += 1;
    }
    info!("  Created {} menu items", created);

    info!("Creating promotions...");
    let now = Utc::now();
    let promotion = PromotionService::new(pool)
        .create_promotion(NewPromotion {
            name: "Lunch Deal".into(),
            description: "10% off every order".into(),
            discount_value: dec!(10),
            start_time: now,
            end_time: now + Duration::days(30),
            is_active: true,
        })
        .await?;
    info!("  {} {}% until {}", promotion.name, promotion.discount_value, promotion.end_time);

    info!("=== Seed complete ===");
    Ok(())
}
