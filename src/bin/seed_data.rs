//! Seed data script - fills an empty database with a browsable demo shop
//!
//! Run with: cargo run --bin seed-data -- --admin-password <password>
//!
//! This creates:
//! - item classes, colors and materials
//! - a dozen furniture items with stock
//! - one active staff account

use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use storefront_api::{
    auth::{check_password_policy, hash_password},
    config, db,
    events::{process_events, EventSender},
    repositories::UserRepository,
    services::catalog::{CatalogService, ItemInput, ReferenceInput, ReferenceKind},
};

#[derive(Parser)]
#[command(name = "seed-data", version, about = "Populate the storefront with demo data")]
struct Args {
    /// Staff username
    #[arg(long, default_value = "admin")]
    admin_username: String,
    #[arg(long, default_value = "admin@storefront.local")]
    admin_email: String,
    #[arg(long)]
    admin_password: String,
    /// Skip the catalog and only create the staff account
    #[arg(long)]
    accounts_only: bool,
}

const CLASSES: [&str; 4] = ["Chairs", "Tables", "Sofas", "Shelves"];
const COLORS: [&str; 4] = ["Oak", "Walnut", "Black", "White"];
const MATERIALS: [&str; 4] = ["Wood", "Metal", "Fabric", "Leather"];

// name, price, count, class, color, materials
const ITEMS: [(&str, Decimal, i32, usize, usize, &[usize]); 12] = [
    ("Chair", dec!(100.00), 12, 0, 0, &[0]),
    ("Bar Stool", dec!(74.99), 8, 0, 2, &[1, 3]),
    ("Armchair", dec!(349.00), 4, 0, 1, &[0, 2]),
    ("Dining Table", dec!(520.00), 3, 1, 1, &[0]),
    ("Coffee Table", dec!(189.50), 6, 1, 3, &[0, 1]),
    ("Desk", dec!(275.00), 5, 1, 2, &[1]),
    ("Corner Sofa", dec!(1299.00), 2, 2, 3, &[2]),
    ("Loveseat", dec!(799.99), 3, 2, 2, &[3]),
    ("Bookcase", dec!(230.00), 7, 3, 0, &[0]),
    ("Wall Shelf", dec!(39.90), 20, 3, 3, &[0, 1]),
    ("Ladder Shelf", dec!(119.00), 0, 3, 1, &[0]),
    ("Footstool", dec!(0.99), 15, 0, 2, &[2]),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Storefront Seed Data ===");
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;
    let pool = Arc::new(pool);

    let (tx, rx) = mpsc::channel(cfg.event_channel_capacity);
    tokio::spawn(process_events(rx));
    let events = Arc::new(EventSender::new(tx));

    create_admin(&pool, &args).await?;

    if !args.accounts_only {
        let catalog = CatalogService::new(pool.clone(), events, cfg.catalog_page_size);
        let created = create_catalog(&catalog).await?;
        info!("  Created {} items", created);
    }

    info!("=== Seed complete ===");
    Ok(())
}

async fn create_admin(pool: &db::DbPool, args: &Args) -> anyhow::Result<()> {
    let problems = check_password_policy(&args.admin_password);
    if !problems.is_empty() {
        let messages: Vec<String> = problems.iter().map(ToString::to_string).collect();
        anyhow::bail!("admin password rejected: {}", messages.join(" "));
    }

    let users = UserRepository::new(pool);
    if users.username_taken(&args.admin_username).await? {
        info!("Staff account '{}' already exists", args.admin_username);
        return Ok(());
    }

    let hash = hash_password(&args.admin_password)?;
    let account = users
        .insert_inactive(&args.admin_username, &args.admin_email, hash)
        .await?;
    let account = users.grant_superuser(account).await?;
    info!(user_id = %account.id, "Created staff account '{}'", account.username);
    Ok(())
}

async fn create_reference(
    catalog: &CatalogService,
    kind: ReferenceKind,
    values: &[&str],
) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(values.len());
    for value in values {
        let entry = catalog
            .create_reference(
                kind,
                ReferenceInput {
                    value: (*value).to_string(),
                },
            )
            .await?;
        ids.push(entry.id);
    }
    Ok(ids)
}

async fn create_catalog(catalog: &CatalogService) -> anyhow::Result<usize> {
    info!("Creating reference data...");
    let classes = create_reference(catalog, ReferenceKind::ItemClass, &CLASSES).await?;
    let colors = create_reference(catalog, ReferenceKind::Color, &COLORS).await?;
    let materials = create_reference(catalog, ReferenceKind::Material, &MATERIALS).await?;

    info!("Creating items...");
    for (name, price, count, class, color, mats) in ITEMS {
        catalog
            .create_item(ItemInput {
                name: name.to_string(),
                price,
                description: Some(format!("{} from the demo collection", name)),
                color_id: Some(colors[color]),
                item_class_id: Some(classes[class]),
                material_ids: mats.iter().map(|&m| materials[m]).collect(),
                count,
                image_url: None,
            })
            .await?;
    }
    Ok(ITEMS.len())
}
