//! # Seed Data Generator
//!
//! Creates a verified admin account and a starter catalogue for development.
//!
//! ## Usage
//! ```bash
//! # Admin from SEED_ADMIN_EMAIL / SEED_ADMIN_PASSWORD, 40 products
//! cargo run -p tally-db --bin seed
//!
//! # Explicit database and product count
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --count 10
//! ```
//!
//! Re-running is safe: an existing admin email is left alone and products
//! are only generated into an empty catalogue.

use std::env;

use tally_core::Role;
use tally_db::credentials::hash_password;
use tally_db::{Database, DbConfig, DbError, NewProduct, NewUser};

/// Category → product names.
const CATALOGUE: &[(&str, &[&str])] = &[
    (
        "Beverages",
        &[
            "Sparkling Water",
            "Orange Juice",
            "Cold Brew Coffee",
            "Green Tea",
            "Lemonade",
            "Cola",
            "Energy Drink",
            "Coconut Water",
        ],
    ),
    (
        "Snacks",
        &[
            "Salted Crisps",
            "Trail Mix",
            "Dark Chocolate Bar",
            "Pretzels",
            "Granola Bar",
            "Popcorn",
            "Rice Crackers",
            "Roasted Almonds",
        ],
    ),
    (
        "Dairy",
        &[
            "Whole Milk",
            "Greek Yogurt",
            "Cheddar Cheese",
            "Butter",
            "Cream Cheese",
            "Oat Milk",
            "Mozzarella",
            "Kefir",
        ],
    ),
    (
        "Household",
        &[
            "Dish Soap",
            "Paper Towels",
            "Trash Bags",
            "Sponges",
            "Laundry Detergent",
            "Hand Soap",
            "Aluminium Foil",
            "Light Bulb",
        ],
    ),
    (
        "Stationery",
        &[
            "Ballpoint Pens",
            "Notebook A5",
            "Sticky Notes",
            "Stapler",
            "Highlighters",
            "Envelopes",
            "Glue Stick",
            "Scissors",
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,tally_db=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/tally.db".into());
    let admin_email =
        env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@tally.local".into());
    let admin_password = env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin12345".into());

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
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 40)");
                println!("  -d, --db <PATH>    Database file path (default: $DATABASE_PATH)");
                println!("  -h, --help         Show this help message");
                println!();
                println!("Environment:");
                println!("  SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tally POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    // Admin account
    let admin = NewUser {
        name: "Administrator".into(),
        email: admin_email.trim().to_lowercase(),
        password_hash: hash_password(&admin_password)?,
        role: Role::Admin,
        is_verified: true,
        verification_token_hash: None,
        verification_expires_at: None,
    };
    match db.users().insert(&admin).await {
        Ok(user) => println!("✓ Admin created: {}", user.email),
        Err(DbError::UniqueViolation { .. }) => {
            println!("• Admin {} already exists, leaving it unchanged", admin.email)
        }
        Err(e) => return Err(e.into()),
    }

    // Catalogue
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("• Catalogue already has {} products, skipping", existing);
        db.close().await;
        return Ok(());
    }

    let mut generated = 0;
    'outer: for (category_idx, (category, names)) in CATALOGUE.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }

            let product = generate_product(category, name, category_idx * 10 + name_idx);
            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.name, e);
                continue;
            }
            generated += 1;
        }
    }

    println!("✓ Generated {} products", generated);
    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Deterministic price ($0.99 - $24.99) and stock (5 - 104) from the seed.
fn generate_product(category: &str, name: &str, seed: usize) -> NewProduct {
    let price_cents = 99 + ((seed * 137) % 2400) as i64;
    let quantity = 5 + ((seed * 31) % 100) as i64;

    NewProduct {
        name: name.to_string(),
        description: Some(format!("{} from the {} aisle", name, category.to_lowercase())),
        price_cents,
        quantity,
        category: Some(category.to_string()),
    }
}
