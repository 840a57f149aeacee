//! Operator CLI for orders: status transitions and manual reconciliation.
//!
//! Orders whose payment link could not be created stay `PENDING_ACCEPTANCE`
//! without a gateway reference; `orders-cli list --unlinked` finds them.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use takeaway_api::{
    config,
    db,
    entities::order::{Model as OrderModel, OrderStatus},
    handlers::orders::OrderResponse,
    services::{
        menu::MenuService,
        orders::{OrderFilter, OrderService},
    },
};

#[derive(Parser)]
#[command(name = "orders-cli", about = "Inspect and move takeaway orders", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent orders, newest first
    List(ListArgs),
    /// Show one order with its line items
    Show(ShowArgs),
    /// Move an order to a new status
    SetStatus(SetStatusArgs),
    /// List the menu
    Menu,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, value_enum, help = "Only orders in this status")]
    status: Option<StatusArg>,
    #[arg(long, action = ArgAction::SetTrue, help = "Only orders without a gateway reference")]
    unlinked: bool,
    #[arg(long, default_value_t = 50)]
    limit: u64,
}

#[derive(Args)]
struct ShowArgs {
    #[arg(value_parser = clap::value_parser!(Uuid), help = "Order identifier")]
    id: Uuid,
}

#[derive(Args)]
struct SetStatusArgs {
    #[arg(value_parser = clap::value_parser!(Uuid), help = "Order identifier")]
    id: Uuid,
    #[arg(value_enum)]
    status: StatusArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl From<StatusArg> for OrderStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => OrderStatus::PendingAcceptance,
            StatusArg::Accepted => OrderStatus::Accepted,
            StatusArg::Rejected => OrderStatus::Rejected,
            StatusArg::Completed => OrderStatus::Completed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config().context("failed to load application config")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    let pool = Arc::new(pool);
    let orders = OrderService::new(pool.clone());

    match cli.command {
        Commands::List(args) => {
            let found = orders
                .list_orders(OrderFilter {
                    status: args.status.map(OrderStatus::from),
                    unlinked_only: args.unlinked,
                    limit: Some(args.limit),
                })
                .await
                .context("failed to list orders")?;
            if cli.json {
                let rendered = found
                    .into_iter()
                    .map(OrderResponse::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                print_json(&rendered)?;
            } else if found.is_empty() {
                println!("No orders found");
            } else {
                found.iter().for_each(render_order);
            }
        }
        Commands::Show(args) => {
            let order = orders
                .get_order(args.id)
                .await
                .with_context(|| format!("failed to load order {}", args.id))?;
            let response = OrderResponse::try_from(order)?;
            if cli.json {
                print_json(&response)?;
            } else {
                render_order_details(&response);
            }
        }
        Commands::SetStatus(args) => {
            let order = orders
                .update_status(args.id, args.status.into())
                .await
                .with_context(|| format!("failed to update order {}", args.id))?;
            if cli.json {
                print_json(&OrderResponse::try_from(order)?)?;
            } else {
                println!("Order {} is now {}", order.id, order.status);
            }
        }
        Commands::Menu => {
            let items = MenuService::new(pool)
                .list_items()
                .await
                .context("failed to load menu")?;
            if cli.json {
                print_json(&items)?;
            } else {
                for item in items {
                    let marker = if item.is_available { "" } else { " (unavailable)" };
                    println!(
                        "- [{}] {} {} {}{}",
                        item.category, item.id, item.name, item.price, marker
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_order(order: &OrderModel) {
    println!(
        "- Order {} • {} • code {} • {} • total {} {} • gateway {}",
        order.id,
        order.created_at.format("%Y-%m-%d %H:%M"),
        order.verification_code,
        order.status,
        order.total_price.round_dp(2),
        order.currency,
        order.gateway_order_id.as_deref().unwrap_or("-")
    );
}

fn render_order_details(order: &OrderResponse) {
    println!("Order {}", order.id);
    println!("  status:       {}", order.status);
    println!("  code:         {}", order.verification_code);
    println!("  customer:     {} ({})", order.customer.name, order.customer.phone);
    if let Some(email) = &order.customer.email {
        println!("  email:        {}", email);
    }
    println!(
        "  gateway:      {}",
        order.gateway_order_id.as_deref().unwrap_or("not linked")
    );
    for item in &order.items {
        println!("  {} x {} @ {}", item.quantity, item.name, item.unit_price);
        for (group, options) in &item.selected_options {
            println!("      {}: {}", group, options.join(", "));
        }
    }
    println!("  subtotal:     {}", order.subtotal);
    if let Some(promo) = &order.promotion_name {
        println!("  promotion:    {} (-{})", promo, order.discount_amount);
    }
    println!("  total:        {} {}", order.total_price, order.currency);
}
