//! Startup data: the configured admin account and the demo catalog.

use chrono::Utc;
use thiserror::Error;

use crate::auth::{AuthError, AuthService};
use crate::config::AdminBootstrap;
use crate::models::{CreateProductRequest, Role, User};
use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create the configured admin unless an account with that email exists.
/// Returns the admin when one was created.
pub fn ensure_admin(
    store: &Store,
    auth: &AuthService,
    admin: &AdminBootstrap,
) -> Result<Option<User>, SeedError> {
    match store.get_user_by_email(&admin.email) {
        Ok(existing) => {
            if !existing.is_admin() {
                log::warn!(
                    "Account {} exists but is not an admin; leaving it unchanged",
                    existing.email
                );
            }
            return Ok(None);
        }
        Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let now = Utc::now();
    let mut user = User {
        id: String::new(),
        username: admin.username.clone(),
        email: admin.email.clone(),
        password_hash: auth.hash_password(&admin.password)?,
        role: Role::Admin,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&mut user)?;
    log::info!("Created admin user {}", user.email);
    Ok(Some(user))
}

/// Insert the demo catalog, owned by `owner_id`, when the catalog is empty.
/// Returns how many products were inserted.
pub fn seed_demo_catalog(store: &Store, owner_id: &str) -> Result<usize, SeedError> {
    if store.count_products()? > 0 {
        log::info!("Catalog already has products, skipping demo seed");
        return Ok(0);
    }

    let products = demo_products();
    for fields in &products {
        store.create_product(fields, owner_id)?;
    }
    log::info!("Seeded {} demo products", products.len());
    Ok(products.len())
}

type DemoRow = (&'static str, &'static str, &'static str, f64, f64, f64, &'static [&'static str], &'static str, i64);

const DEMO_CATALOG: &[DemoRow] = &[
    ("Golden Goliath Flower", "Premium indoor-grown flower with a balanced cannabinoid profile", "Flower", 22.5, 0.8, 12.99, &["Relaxed", "Happy", "Focused"], "Smoking", 15),
    ("Blueberry Dream", "Sweet blueberry aroma with calming effects", "Flower", 18.5, 1.2, 10.99, &["Calm", "Happy", "Sleepy"], "Smoking", 20),
    ("Sour Diesel", "Energizing strain with powerful diesel aroma", "Flower", 24.3, 0.5, 13.99, &["Energetic", "Focused", "Creative"], "Smoking", 12),
    ("Purple Haze", "Legendary strain with purple undertones", "Flower", 20.1, 0.9, 11.99, &["Uplifted", "Creative", "Happy"], "Smoking", 18),
    ("Og Kush", "Classic strain with earthy and pine notes", "Flower", 21.5, 0.7, 12.49, &["Relaxed", "Happy", "Sleepy"], "Smoking", 14),
    ("Strawberry Cough", "Sweet strawberry flavor with mild cough effect", "Flower", 19.2, 1.1, 11.49, &["Energetic", "Social", "Happy"], "Smoking", 16),
    ("White Widow", "Potent hybrid strain with frosty appearance", "Flower", 23.0, 0.6, 13.49, &["Energetic", "Focused", "Happy"], "Smoking", 11),
    ("Cannabis Gummies - Mixed Berry", "Delicious mixed berry gummies, 10mg THC per piece", "Edibles", 12.0, 0.0, 14.99, &["Relaxed", "Happy"], "Edible", 25),
    ("Chocolate Bars - Dark", "Premium dark chocolate infused with cannabis", "Edibles", 15.0, 5.0, 18.99, &["Relaxed", "Content"], "Edible", 12),
    ("Cannabis Cookies - Chocolate Chip", "Classic chocolate chip cookies with balanced THC/CBD", "Edibles", 12.0, 2.0, 12.99, &["Happy", "Relaxed"], "Edible", 18),
    ("Cannabis Honey - 500mg", "Raw honey infused with high-quality cannabis extract", "Edibles", 18.0, 0.0, 24.99, &["Relaxed", "Sleepy"], "Sublingual", 8),
    ("Cannabis Mints - Peppermint", "Breath-freshening mints with 5mg THC each", "Edibles", 8.0, 0.0, 9.99, &["Uplifted", "Focused"], "Sublingual", 30),
    ("Cannabis Brownies - Double Fudge", "Decadent double fudge brownies", "Edibles", 15.0, 2.0, 15.99, &["Relaxed", "Happy"], "Edible", 14),
    ("Cannabis Tea - Chamomile", "Calming chamomile tea blend with cannabis", "Edibles", 5.0, 8.0, 11.99, &["Calm", "Sleepy"], "Edible", 22),
    ("CBD Oil - Full Spectrum 1000mg", "Full-spectrum CBD oil with natural hemp flavor", "Oils", 0.0, 90.0, 34.99, &["Calm", "Focused", "Relaxed"], "Sublingual", 10),
    ("THC Oil - Golden Extract 500mg", "Potent THC oil for sublingual or vaping use", "Oils", 85.0, 0.0, 44.99, &["Relaxed", "Happy", "Sleepy"], "Sublingual", 7),
    ("Balanced Oil - 1:1 THC:CBD", "Perfectly balanced cannabis oil for therapeutic use", "Oils", 40.0, 40.0, 39.99, &["Balanced", "Focused", "Calm"], "Sublingual", 9),
    ("Cannabis Salve - Soothing", "Topical salve for muscle and joint relief", "Oils", 30.0, 30.0, 29.99, &["Relief", "Soothing"], "Topical", 13),
    ("Vape Oil - Berry Blast 400mg", "Smooth vape oil with berry flavoring", "Oils", 80.0, 0.0, 32.99, &["Uplifted", "Happy", "Creative"], "Vaping", 11),
    ("Isolate Oil - Pure CBD", "Pure CBD isolate oil, 99% purity", "Oils", 0.0, 95.0, 49.99, &["Calm", "Clear-headed"], "Sublingual", 6),
];

pub fn demo_products() -> Vec<CreateProductRequest> {
    DEMO_CATALOG
        .iter()
        .map(
            |&(name, description, category, thc, cbd, price, effects, usage_type, stock)| {
                CreateProductRequest {
                    name: Some(name.to_string()),
                    description: Some(description.to_string()),
                    category: Some(category.to_string()),
                    thc: Some(thc),
                    cbd: Some(cbd),
                    price: Some(price),
                    image: Some(format!(
                        "https://via.placeholder.com/300?text={}",
                        name.replace(' ', "+")
                    )),
                    effects: Some(effects.iter().map(|e| e.to_string()).collect()),
                    usage_type: Some(usage_type.to_string()),
                    stock: Some(stock),
                }
            },
        )
        .collect()
}
