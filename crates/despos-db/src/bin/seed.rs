//! # Seed Data Generator
//!
//! Populates a register database with reference data and priced products
//! for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p despos-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p despos-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p despos-db --bin seed -- --db ./data/despos.db
//! ```
//!
//! ## Generated Data
//! - One location and the two invoice types ("OR", "SI")
//! - One category per product group, one dealer per category
//! - A handful of walk-in and regular customers
//! - Products with two price levels each ("Level 1" retail, "Level 2"
//!   wholesale at 90%)

use std::env;

use chrono::Utc;
use despos_core::{
    Contact, ContactType, InvoiceType, ItemCategory, ItemPriceLevel, Location, Money, PriceLevel,
    Product,
};
use despos_db::{Database, DbConfig};
use tracing::{info, warn};
use uuid::Uuid;

/// Product groups: (category name, product names)
const GROUPS: &[(&str, &[&str])] = &[
    (
        "Beverages",
        &[
            "Cola 1.5L",
            "Orange Soda 1.5L",
            "Bottled Water 500ml",
            "Iced Tea 1L",
            "Instant Coffee 3-in-1",
            "Chocolate Drink Sachet",
            "Mango Juice 1L",
            "Energy Drink 250ml",
        ],
    ),
    (
        "Canned Goods",
        &[
            "Sardines in Tomato Sauce",
            "Corned Beef 150g",
            "Tuna Flakes in Oil",
            "Luncheon Meat 340g",
            "Evaporated Milk 370ml",
            "Condensed Milk 300ml",
            "Meat Loaf 150g",
            "Pork and Beans 230g",
        ],
    ),
    (
        "Household",
        &[
            "Laundry Powder 1kg",
            "Dishwashing Liquid 250ml",
            "Bath Soap 135g",
            "Shampoo Sachet",
            "Toothpaste 150ml",
            "Tissue Roll 4-Pack",
            "Bleach 1L",
            "Fabric Conditioner 1L",
        ],
    ),
    (
        "Dry Goods",
        &[
            "Rice 5kg",
            "White Sugar 1kg",
            "Iodized Salt 500g",
            "Cooking Oil 1L",
            "Soy Sauce 1L",
            "Vinegar 1L",
            "Instant Noodles",
            "Spaghetti 1kg",
        ],
    ),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Walk-in", "Customer"),
    ("Maria", "Santos"),
    ("Jose", "Reyes"),
    ("Ana", "Cruz"),
    ("Paolo", "Garcia"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    despos_db::init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./despos_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
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
                println!("DesPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./despos_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        println!("Database already has {} products.", existing);
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let location = db
        .locations()
        .upsert(&Location {
            id: new_id(),
            location_name: "Main Branch".to_string(),
            address: Some("Poblacion".to_string()),
        })
        .await?;

    for (code, name) in [("OR", "Official Receipt"), ("SI", "Sales Invoice")] {
        db.invoice_types()
            .upsert(&InvoiceType {
                id: new_id(),
                code: code.to_string(),
                invoice_name: name.to_string(),
            })
            .await?;
    }

    for (first, last) in CUSTOMERS {
        db.contacts()
            .upsert(&contact(ContactType::Customer, first, last, &location.id))
            .await?;
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'groups: for (group_idx, (group, names)) in GROUPS.iter().enumerate() {
        let category = db
            .categories()
            .upsert(&ItemCategory {
                id: new_id(),
                type_name: group.to_string(),
            })
            .await?;

        let dealer = db
            .contacts()
            .upsert(&contact(
                ContactType::Dealer,
                group,
                "Distributor",
                &location.id,
            ))
            .await?;

        // Cycle the names with a batch suffix until `count` is reached
        let mut batch = 0;
        loop {
            for (name_idx, name) in names.iter().enumerate() {
                if generated >= count {
                    break 'groups;
                }
                if generated >= (group_idx + 1) * count / GROUPS.len() {
                    continue 'groups;
                }

                let seed = (batch * GROUPS.len() + group_idx) * 100 + name_idx;
                let product = generate_product(name, batch, seed, &category.id, &dealer.id);

                db.products().save(&product).await?;
                generated += 1;
            }
            batch += 1;
        }
    }

    info!(generated, elapsed = ?start.elapsed(), "Seed complete");
    println!("Generated {} products in {:?}", generated, start.elapsed());

    let found = db.products().search("rice", 10).await?;
    println!("Search 'rice': {} results", found.len());

    db.close().await;
    Ok(())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn contact(contact_type: ContactType, first: &str, last: &str, location_id: &str) -> Contact {
    Contact {
        id: new_id(),
        contact_type,
        first_name: first.to_string(),
        middle_name: None,
        last_name: last.to_string(),
        email: None,
        phone: None,
        location_id: Some(location_id.to_string()),
        price_level: Some("Level 1".to_string()),
        date_open: Some(Utc::now().date_naive().to_string()),
        birthdate: None,
        profile_url: None,
        date_added: Utc::now(),
    }
}

/// Builds one product with a retail and a wholesale price level.
fn generate_product(
    name: &str,
    batch: usize,
    seed: usize,
    category_id: &str,
    dealer_id: &str,
) -> Product {
    let id = new_id();

    let item_name = if batch == 0 {
        name.to_string()
    } else {
        format!("{} #{}", name, batch + 1)
    };

    // Retail price 15.00 - 514.75, cost 70% of retail
    let retail = 1500 + ((seed * 37) % 200) as i64 * 250;
    let cost = retail * 70 / 100;

    let levels = [("Level 1", retail), ("Level 2", retail * 90 / 100)]
        .into_iter()
        .map(|(level_name, cents)| ItemPriceLevel {
            id: String::new(),
            item_id: id.clone(),
            price_level_id: String::new(),
            price_level: PriceLevel {
                id: new_id(),
                level_name: level_name.to_string(),
                price: Money::from_cents(cents),
            },
        })
        .collect();

    Product {
        id,
        code: Some(format!("P{:05}", seed)),
        barcode: Some(format!("480{:010}", seed)),
        item_name,
        item_type_id: Some(category_id.to_string()),
        dealer_id: Some(dealer_id.to_string()),
        item_cost: Money::from_cents(cost),
        item_quantity: 10 + (seed % 91) as i64,
        item_sold: 0,
        item_image_url: None,
        default_item_quantity: 0,
        price_levels: levels,
    }
}
