use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Inline SVG used when a product is created without an image.
pub const PLACEHOLDER_IMAGE: &str = "data:image/svg+xml;utf8,<svg xmlns='http://www.w3.org/2000/svg' width='300' height='200'><rect fill='%23f3f4f6' width='100%25' height='100%25'/><text x='50%25' y='50%25' dominant-baseline='middle' text-anchor='middle' fill='%23222' font-size='20'>Cannabis Product</text></svg>";

pub const DEFAULT_STOCK: i64 = 10;

/// A request field that is missing or out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

// ==================== Enumerations ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError(format!("Invalid role: {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Flower,
    Edibles,
    Oils,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Flower, Category::Edibles, Category::Oils];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Flower => "Flower",
            Category::Edibles => "Edibles",
            Category::Oils => "Oils",
        }
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                ValidationError(format!(
                    "Invalid category '{}': expected one of Flower, Edibles, Oils",
                    s
                ))
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageType {
    Smoking,
    Vaping,
    Edible,
    Topical,
    Sublingual,
}

impl UsageType {
    pub const ALL: [UsageType; 5] = [
        UsageType::Smoking,
        UsageType::Vaping,
        UsageType::Edible,
        UsageType::Topical,
        UsageType::Sublingual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UsageType::Smoking => "Smoking",
            UsageType::Vaping => "Vaping",
            UsageType::Edible => "Edible",
            UsageType::Topical => "Topical",
            UsageType::Sublingual => "Sublingual",
        }
    }
}

impl Default for UsageType {
    fn default() -> Self {
        UsageType::Smoking
    }
}

impl FromStr for UsageType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UsageType::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| {
                ValidationError(format!(
                    "Invalid usageType '{}': expected one of Smoking, Vaping, Edible, Topical, Sublingual",
                    s
                ))
            })
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== Records ====================

/// A registered account. The password only ever exists as a bcrypt hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The user who created a product, resolved to a display name on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub username: String,
}

/// A catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub thc: f64,
    pub cbd: f64,
    pub price: f64,
    pub image: String,
    pub effects: Vec<String>,
    pub usage_type: UsageType,
    pub stock: i64,
    pub created_by: Creator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One saved (user, product) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
}

/// A wishlist entry together with the product it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
    #[serde(flatten)]
    pub entry: WishlistEntry,
    pub product: Product,
}

// ==================== Validation helpers ====================

fn required_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn check_percentage(field: &str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ValidationError(format!(
            "{} must be between 0 and 100",
            field
        )));
    }
    Ok(value)
}

fn check_price(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new("price must be 0 or greater"));
    }
    Ok(value)
}

fn check_stock(value: i64) -> Result<i64, ValidationError> {
    if value < 0 {
        return Err(ValidationError::new("stock must be 0 or greater"));
    }
    Ok(value)
}

/// Effects behave as a set: blanks and repeats are dropped, first-seen order kept.
pub fn normalize_effects(effects: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(effects.len());
    for effect in effects {
        let label = effect.trim();
        if !label.is_empty() && !out.iter().any(|e| e == label) {
            out.push(label.to_string());
        }
    }
    out
}

fn image_or_placeholder(image: &Option<String>) -> String {
    required_text(image).unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

// ==================== Request types ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Registration input that passed validation. Email is lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        let (Some(username), Some(email), Some(password)) = (
            required_text(&self.username),
            required_text(&self.email),
            self.password.clone().filter(|p| !p.is_empty()),
        ) else {
            return Err(ValidationError::new(
                "Please provide username, email and password",
            ));
        };

        let len = username.chars().count();
        if !(3..=30).contains(&len) {
            return Err(ValidationError::new(
                "Username must be between 3 and 30 characters",
            ));
        }

        let email = email.to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(ValidationError::new("Please provide a valid email")),
        }

        if password.chars().count() < 6 {
            return Err(ValidationError::new(
                "Password must be at least 6 characters",
            ));
        }

        Ok(NewUser {
            username,
            email,
            password,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Fields accepted when creating a product. Everything is optional on the
/// wire so a missing field surfaces as a validation error, not a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

/// A fully validated product ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub thc: f64,
    pub cbd: f64,
    pub price: f64,
    pub image: String,
    pub effects: Vec<String>,
    pub usage_type: UsageType,
    pub stock: i64,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<NewProduct, ValidationError> {
        let name = required_text(&self.name);
        let description = required_text(&self.description);
        let category = required_text(&self.category);

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push("name");
        }
        if description.is_none() {
            missing.push("description");
        }
        if category.is_none() {
            missing.push("category");
        }
        if self.thc.is_none() {
            missing.push("thc");
        }
        if self.cbd.is_none() {
            missing.push("cbd");
        }
        if self.price.is_none() {
            missing.push("price");
        }

        let (Some(name), Some(description), Some(category), Some(thc), Some(cbd), Some(price)) =
            (name, description, category, self.thc, self.cbd, self.price)
        else {
            return Err(ValidationError(format!(
                "Please provide all required fields: {}",
                missing.join(", ")
            )));
        };

        let usage_type = match required_text(&self.usage_type) {
            Some(u) => u.parse()?,
            None => UsageType::default(),
        };

        Ok(NewProduct {
            name,
            description,
            category: category.parse()?,
            thc: check_percentage("thc", thc)?,
            cbd: check_percentage("cbd", cbd)?,
            price: check_price(price)?,
            image: image_or_placeholder(&self.image),
            effects: normalize_effects(self.effects.as_deref().unwrap_or_default()),
            usage_type,
            stock: check_stock(self.stock.unwrap_or(DEFAULT_STOCK))?,
        })
    }
}

/// Partial update. Only supplied fields are validated and applied; the
/// creator is not updatable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

impl UpdateProductRequest {
    /// Validate every supplied field, then apply them all. On error the
    /// product is left untouched.
    pub fn apply_to(&self, product: &mut Product) -> Result<(), ValidationError> {
        let name = match &self.name {
            Some(_) => Some(
                required_text(&self.name)
                    .ok_or_else(|| ValidationError::new("name cannot be empty"))?,
            ),
            None => None,
        };
        let description = match &self.description {
            Some(_) => Some(
                required_text(&self.description)
                    .ok_or_else(|| ValidationError::new("description cannot be empty"))?,
            ),
            None => None,
        };
        let category = self
            .category
            .as_deref()
            .map(|c| c.trim().parse::<Category>())
            .transpose()?;
        let usage_type = self
            .usage_type
            .as_deref()
            .map(|u| u.trim().parse::<UsageType>())
            .transpose()?;
        let thc = self.thc.map(|v| check_percentage("thc", v)).transpose()?;
        let cbd = self.cbd.map(|v| check_percentage("cbd", v)).transpose()?;
        let price = self.price.map(check_price).transpose()?;
        let stock = self.stock.map(check_stock).transpose()?;

        if let Some(name) = name {
            product.name = name;
        }
        if let Some(description) = description {
            product.description = description;
        }
        if let Some(category) = category {
            product.category = category;
        }
        if let Some(usage_type) = usage_type {
            product.usage_type = usage_type;
        }
        if let Some(thc) = thc {
            product.thc = thc;
        }
        if let Some(cbd) = cbd {
            product.cbd = cbd;
        }
        if let Some(price) = price {
            product.price = price;
        }
        if let Some(stock) = stock {
            product.stock = stock;
        }
        if self.image.is_some() {
            product.image = image_or_placeholder(&self.image);
        }
        if let Some(effects) = &self.effects {
            product.effects = normalize_effects(effects);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToWishlistRequest {
    pub product_id: Option<String>,
}

// ==================== Response types ====================

/// Uniform response envelope: `{success, message?, ...payload}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload: Some(payload),
        }
    }

    pub fn with_message(msg: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: Some(msg.into()),
            payload: Some(payload),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(msg.into()),
            payload: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(msg.into()),
            payload: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListPayload {
    pub count: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPayload {
    pub product: Product,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItemPayload {
    pub wishlist_item: WishlistEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistPayload {
    pub count: usize,
    pub wishlist: Vec<WishlistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistStatusPayload {
    pub is_in_wishlist: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> CreateProductRequest {
        CreateProductRequest {
            name: Some("  Golden Goliath Flower ".to_string()),
            description: Some("Premium indoor-grown flower".to_string()),
            category: Some("Flower".to_string()),
            thc: Some(22.5),
            cbd: Some(0.8),
            price: Some(12.99),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_request_applies_defaults() {
        let product = full_request().validate().unwrap();
        assert_eq!(product.name, "Golden Goliath Flower");
        assert_eq!(product.category, Category::Flower);
        assert_eq!(product.usage_type, UsageType::Smoking);
        assert_eq!(product.stock, DEFAULT_STOCK);
        assert_eq!(product.image, PLACEHOLDER_IMAGE);
        assert!(product.effects.is_empty());
    }

    #[test]
    fn test_create_request_reports_missing_fields() {
        let mut req = full_request();
        req.price = None;
        req.description = Some("   ".to_string());

        let err = req.validate().unwrap_err();
        assert!(err.0.contains("price"));
        assert!(err.0.contains("description"));
        assert!(!err.0.contains("name"));
    }

    #[test]
    fn test_create_request_allows_zero_price_and_stock() {
        let mut req = full_request();
        req.price = Some(0.0);
        req.stock = Some(0);

        let product = req.validate().unwrap();
        assert_eq!(product.price, 0.0);
        assert_eq!(product.stock, 0);
    }

    #[test]
    fn test_create_request_rejects_out_of_range() {
        let mut req = full_request();
        req.thc = Some(100.5);
        assert!(req.validate().is_err());

        let mut req = full_request();
        req.cbd = Some(-1.0);
        assert!(req.validate().is_err());

        let mut req = full_request();
        req.price = Some(-0.01);
        assert!(req.validate().is_err());

        let mut req = full_request();
        req.stock = Some(-5);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_unknown_enums() {
        let mut req = full_request();
        req.category = Some("Seeds".to_string());
        assert!(req.validate().is_err());

        let mut req = full_request();
        req.usage_type = Some("Injected".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_effects_are_a_set() {
        let effects = vec![
            "Relaxed".to_string(),
            " Happy ".to_string(),
            "Relaxed".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_effects(&effects), vec!["Relaxed", "Happy"]);
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            username: Some("budfan".to_string()),
            email: Some("Bud@Example.com ".to_string()),
            password: Some("secret1".to_string()),
        };
        let user = ok.validate().unwrap();
        assert_eq!(user.email, "bud@example.com");

        let short = RegisterRequest {
            username: Some("ab".to_string()),
            ..ok.clone()
        };
        assert!(short.validate().is_err());

        let bad_email = RegisterRequest {
            email: Some("not-an-email".to_string()),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let weak = RegisterRequest {
            password: Some("123".to_string()),
            ..ok.clone()
        };
        assert!(weak.validate().is_err());

        let missing = RegisterRequest {
            password: None,
            ..ok
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_envelope_flattens_payload() {
        let body = serde_json::to_value(ApiResponse::success(WishlistStatusPayload {
            is_in_wishlist: true,
        }))
        .unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["isInWishlist"], true);
        assert!(body.get("message").is_none());

        let body = serde_json::to_value(ApiResponse::<()>::error("Product not found")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Product not found");
    }
}
