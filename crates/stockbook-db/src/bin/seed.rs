//! # Seed Data Generator
//!
//! Populates the database with a small catalog for development.
//!
//! ## Usage
//! ```bash
//! # Default: ./stockbook_dev.db, 40 products
//! cargo run -p stockbook-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p stockbook-db --bin seed -- --count 200 --db ./data/stockbook.db
//! ```
//!
//! ## Generated Data
//! - Manufacturers and categories for a sanitary-ware showroom
//! - Products: `{CATEGORY}-{MAKER}-{NNN}` model numbers, varied stock
//! - A few customers, each with one booking
//!
//! Nothing is written when the database already has products.

use std::env;

use chrono::{Duration, Utc};
use stockbook_core::{
    BookingInput, BookingItemInput, BookingStatus, CategoryInput, CustomerInput, ManufacturerInput,
    ProductInput,
};
use stockbook_db::{Database, DbConfig};

/// Recorded as the actor of every seeded change.
const SEED_ACTOR: &str = "seed";

const MANUFACTURERS: &[(&str, &str)] = &[
    ("Sonex Ceramics", "SNX"),
    ("Porta Bath", "PRT"),
    ("Master Sanitary", "MST"),
    ("Faisal Fittings", "FSL"),
];

const CATEGORIES: &[(&str, &str, &[&str])] = &[
    ("Basins", "WB", &["Oval Basin", "Round Basin", "Counter Basin", "Pedestal Basin"]),
    ("Commodes", "WC", &["Wall Hung WC", "Floor WC", "Smart WC"]),
    ("Mixers", "MX", &["Basin Mixer", "Sink Mixer", "Shower Mixer", "Bath Mixer"]),
    ("Tiles", "TL", &["Floor Tile 60x60", "Wall Tile 30x60", "Glazed Tile 80x80"]),
];

const FINISHES: &[&str] = &["White", "Ivory", "Chrome", "Matte Black"];

const CUSTOMERS: &[&str] = &["Ayesha Khan", "Bilal Ahmed", "Usman Builders", "Sara Interiors"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path = String::from("./stockbook_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: ./stockbook_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Stockbook Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut makers = Vec::new();
    for (name, code) in MANUFACTURERS {
        let maker = db
            .manufacturers()
            .create(
                SEED_ACTOR,
                &ManufacturerInput {
                    factory_name: name.to_string(),
                    contact_person: Some("Sales Office".to_string()),
                    ..Default::default()
                },
            )
            .await?;
        makers.push((maker, *code));
    }

    let mut groups = Vec::new();
    for (name, code, items) in CATEGORIES {
        let category = db
            .categories()
            .create(
                SEED_ACTOR,
                &CategoryInput {
                    name: name.to_string(),
                    description: None,
                },
            )
            .await?;
        groups.push((category, *code, *items));
    }
    println!("✓ {} manufacturers, {} categories", makers.len(), groups.len());

    println!();
    println!("Generating products...");
    let start = std::time::Instant::now();
    let mut products = Vec::new();

    'outer: for seed in 0.. {
        for (category, code, items) in &groups {
            if products.len() >= count {
                break 'outer;
            }
            let (maker, maker_code) = &makers[seed % makers.len()];
            let input = generate_product(seed, code, maker_code, items, &maker.id, &category.id);

            match db.products().create(SEED_ACTOR, &input).await {
                Ok(product) => products.push(product),
                Err(e) => eprintln!("Failed to insert {}: {}", input.model_no, e),
            }
        }
    }

    println!(
        "✓ Generated {} products in {:?}",
        products.len(),
        start.elapsed()
    );

    println!();
    println!("Creating customers and bookings...");
    let today = Utc::now().date_naive();
    let statuses = [
        BookingStatus::Pending,
        BookingStatus::AdvancePaid,
        BookingStatus::FullPaid,
        BookingStatus::Cancelled,
    ];

    for (index, name) in CUSTOMERS.iter().enumerate() {
        let customer = db
            .customers()
            .create(
                SEED_ACTOR,
                &CustomerInput {
                    name: name.to_string(),
                    phone: Some(format!("0300-55501{:02}", index)),
                    ..Default::default()
                },
            )
            .await?;

        let items: Vec<BookingItemInput> = products
            .iter()
            .skip(index * 3)
            .take(2)
            .filter(|p| p.available_stock > 1)
            .map(|p| BookingItemInput {
                product_id: p.id.clone(),
                quantity: 1 + (p.available_stock / 4).min(5),
            })
            .collect();
        if items.is_empty() {
            continue;
        }

        let input = BookingInput {
            customer_id: customer.id.clone(),
            status: statuses[index % statuses.len()],
            total_amount_cents: 2_500_000 * (index as i64 + 1),
            booking_date: Some(today - Duration::days(index as i64 * 3)),
            notes: None,
            items,
        };
        match db.bookings().create(SEED_ACTOR, &input).await {
            Ok(booking) => println!("  {} booked {} units", name, booking.total_quantity()),
            Err(e) => eprintln!("Failed to book for {}: {}", name, e),
        }
    }

    let stats = db.stats().overview().await?;
    println!();
    println!("Total stock:     {}", stats.total_stock);
    println!("Total available: {}", stats.total_available);
    println!("Low stock items: {}", stats.low_stock_items);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic, varied stock.
fn generate_product(
    seed: usize,
    category_code: &str,
    maker_code: &str,
    items: &[&str],
    manufacturer_id: &str,
    category_id: &str,
) -> ProductInput {
    let name = items[seed % items.len()];
    let total_stock = ((seed * 37) % 120) as i64;
    let bad_stock = (total_stock / 20).min(3);
    let dead_stock = if seed % 7 == 0 { (total_stock / 10).min(2) } else { 0 };

    ProductInput {
        model_no: format!("{}-{}-{:03}", category_code, maker_code, seed),
        name: name.to_string(),
        description: None,
        size: None,
        finish: Some(FINISHES[seed % FINISHES.len()].to_string()),
        manufacturer_id: Some(manufacturer_id.to_string()),
        category_id: Some(category_id.to_string()),
        remarks: None,
        internal_notes: (seed % 5 == 0).then(|| "Check carton before dispatch".to_string()),
        total_stock,
        bad_stock,
        dead_stock,
    }
}
