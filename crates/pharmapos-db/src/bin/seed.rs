//! # Seed Data Generator
//!
//! Populates a development database with pharmacy catalog data and the
//! default user accounts.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p pharmapos-db --bin seed
//!
//! # Specify database path
//! cargo run -p pharmapos-db --bin seed -- --db ./data/pharmacy_pos.db
//! ```
//!
//! ## Generated Data
//! - Categories: Pain Relief, Antibiotics, Cough & Cold, Vitamins,
//!   First Aid, Personal Care
//! - A starter product list with realistic peso prices, stock levels,
//!   reorder thresholds and expiry dates
//! - One supplier
//! - Default accounts: admin/admin123, pharmacist1/pharma123,
//!   cashier1/cashier123 (development only; change on first login)

use std::env;

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pharmapos_core::{Product, Role, Supplier, User};
use pharmapos_db::auth::hash_password;
use pharmapos_db::{Database, DbConfig};

/// (category, [(name, price_cents, cost_cents, stock, reorder, expiry_months)])
const CATALOG: &[(&str, &[(&str, i64, i64, i64, i64, Option<i64>)])] = &[
    (
        "Pain Relief",
        &[
            ("Paracetamol 500mg Tablet", 500, 300, 500, 100, Some(24)),
            ("Ibuprofen 200mg Tablet", 750, 450, 300, 80, Some(24)),
            ("Mefenamic Acid 500mg Capsule", 900, 550, 200, 50, Some(18)),
            ("Aspirin 80mg Tablet", 400, 240, 250, 60, Some(30)),
        ],
    ),
    (
        "Antibiotics",
        &[
            ("Amoxicillin 500mg Capsule", 1200, 720, 150, 40, Some(18)),
            ("Cefalexin 500mg Capsule", 1800, 1100, 100, 30, Some(18)),
            ("Azithromycin 500mg Tablet", 3500, 2100, 60, 20, Some(24)),
        ],
    ),
    (
        "Cough & Cold",
        &[
            ("Cough Syrup 120ml", 4550, 2800, 80, 20, Some(12)),
            ("Carbocisteine 500mg Capsule", 1100, 650, 150, 40, Some(18)),
            ("Phenylephrine 10mg Tablet", 850, 500, 120, 30, Some(24)),
            ("Lozenges Menthol 10s", 3000, 1800, 90, 25, Some(18)),
        ],
    ),
    (
        "Vitamins",
        &[
            ("Vitamin C 500mg Tablet", 600, 350, 400, 100, Some(36)),
            ("Multivitamins Capsule", 1500, 900, 200, 50, Some(36)),
            ("Vitamin B-Complex Tablet", 800, 480, 180, 40, Some(36)),
            ("Zinc 10mg Tablet", 700, 420, 150, 40, Some(36)),
        ],
    ),
    (
        "First Aid",
        &[
            ("Adhesive Bandages 20s", 5500, 3300, 70, 15, None),
            ("Povidone-Iodine 60ml", 8900, 5300, 50, 12, Some(36)),
            ("Sterile Gauze Pads 10s", 4500, 2700, 60, 15, None),
            ("Elastic Bandage 2in", 6500, 3900, 40, 10, None),
        ],
    ),
    (
        "Personal Care",
        &[
            ("Alcohol 70% 500ml", 8500, 5100, 120, 30, Some(36)),
            ("Hand Sanitizer 100ml", 6000, 3600, 100, 25, Some(24)),
            ("Face Mask 50s", 15000, 9000, 80, 20, None),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./pharmacy_pos.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("PharmaPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pharmacy_pos.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 PharmaPOS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Default accounts first so the catalog has owners in the audit trail.
    let admin_created = db
        .users()
        .ensure_initial_admin("admin", &hash_password("admin123")?, "System Administrator")
        .await?;

    if admin_created {
        for (username, password, full_name, role) in [
            ("pharmacist1", "pharma123", "Maria Santos", Role::Pharmacist),
            ("cashier1", "cashier123", "Juan Dela Cruz", Role::Cashier),
        ] {
            db.users()
                .insert(&User {
                    id: Uuid::new_v4().to_string(),
                    username: username.to_string(),
                    password_hash: hash_password(password)?,
                    full_name: full_name.to_string(),
                    role,
                    is_active: true,
                    last_login: None,
                    created_at: Utc::now(),
                })
                .await?;
        }
        println!("✓ Created default accounts (admin, pharmacist1, cashier1)");
    } else {
        println!("⚠ Users already exist, skipping account creation");
    }

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping catalog seed to avoid duplicates.");
        return Ok(());
    }

    let supplier = Supplier {
        id: Uuid::new_v4().to_string(),
        name: "MedSupply Philippines Inc.".to_string(),
        contact_person: Some("Ramon Garcia".to_string()),
        phone: Some("+63 2 8123 4567".to_string()),
        email: Some("orders@medsupply.ph".to_string()),
        address: Some("Quezon City, Metro Manila".to_string()),
        created_at: Utc::now(),
    };
    db.suppliers().insert(&supplier).await?;
    println!("✓ Created supplier: {}", supplier.name);

    println!();
    println!("Seeding catalog...");

    let mut seeded = 0;
    for (category_name, products) in CATALOG {
        let category = db.categories().get_or_create(category_name, None).await?;

        for (name, price, cost, stock, reorder, expiry_months) in products.iter() {
            let now = Utc::now();
            let product = Product {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                category_id: Some(category.id.clone()),
                description: None,
                unit_price_cents: *price,
                cost_price_cents: *cost,
                stock_quantity: *stock,
                reorder_level: *reorder,
                expiry_date: expiry_months
                    .map(|months| (now + Duration::days(months * 30)).date_naive()),
                supplier_id: Some(supplier.id.clone()),
                is_active: true,
                created_at: now,
                updated_at: now,
            };

            db.products().insert(&product).await?;
            seeded += 1;
        }

        println!("  {} ({} products)", category_name, products.len());
    }

    println!();
    println!("✓ Seeded {} products across {} categories", seeded, CATALOG.len());

    let low = db.products().low_stock().await?;
    println!("  Low-stock check: {} products at/below reorder level", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
