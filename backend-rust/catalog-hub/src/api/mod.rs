use actix_web::{error, web, HttpRequest, HttpResponse};
use chrono::Utc;
use std::sync::Arc;

use crate::auth::{AdminUser, AuthService, AuthUser};
use crate::error::ApiError;
use crate::models::*;
use crate::query::{ProductFilter, ProductQuery};
use crate::store::{Store, StoreError};

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    pub fn new(store: Arc<Store>, auth_service: Arc<AuthService>) -> Self {
        Self {
            store,
            auth_service,
        }
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

// ==================== Health Check ====================

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::<()>::message(
        "Cannabis Product Discovery Platform API",
    ))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Auth Endpoints ====================

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> ApiResult {
    let new_user = body.validate()?;
    let password_hash = state.auth_service.hash_password(&new_user.password)?;

    let now = Utc::now();
    let mut user = User {
        id: String::new(),
        username: new_user.username,
        email: new_user.email,
        password_hash,
        role: Role::User,
        created_at: now,
        updated_at: now,
    };

    state.store.create_user(&mut user)?;
    log::info!("Registered user {} <{}>", user.username, user.email);

    let token = state.auth_service.generate_token(&user.id)?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "User registered successfully",
        AuthResponse { user, token },
    )))
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> ApiResult {
    let (Some(email), Some(password)) = (body.email.as_deref(), body.password.as_deref()) else {
        return Err(ApiError::Validation(
            "Please provide email and password".to_string(),
        ));
    };

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = match state.store.get_user_by_email(&email.trim().to_lowercase()) {
        Ok(u) => u,
        Err(StoreError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    if !state
        .auth_service
        .verify_password(password, &user.password_hash)
        .unwrap_or(false)
    {
        return Err(invalid());
    }

    let token = state.auth_service.generate_token(&user.id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Login successful",
        AuthResponse { user, token },
    )))
}

pub async fn profile(state: web::Data<AppState>, auth_user: AuthUser) -> ApiResult {
    let user = state.store.get_user(&auth_user.user_id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserPayload { user })))
}

// ==================== Product Endpoints ====================

pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<ProductQuery>,
) -> ApiResult {
    let filter = ProductFilter::from_query(&query)?;
    let products = state.store.list_products(&filter)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ProductListPayload {
        count: products.len(),
        products,
    })))
}

pub async fn get_product(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let product = state.store.get_product(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ProductPayload { product })))
}

pub async fn create_product(
    AdminUser(admin): AdminUser,
    state: web::Data<AppState>,
    body: web::Json<CreateProductRequest>,
) -> ApiResult {
    let product = state.store.create_product(&body, &admin.user_id)?;
    log::info!("{} created product {} ({})", admin.username, product.name, product.id);

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Product created successfully",
        ProductPayload { product },
    )))
}

pub async fn update_product(
    AdminUser(admin): AdminUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateProductRequest>,
) -> ApiResult {
    let product = state.store.update_product(&path.into_inner(), &body)?;
    log::info!("{} updated product {}", admin.username, product.id);

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Product updated successfully",
        ProductPayload { product },
    )))
}

pub async fn delete_product(
    AdminUser(admin): AdminUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult {
    let id = path.into_inner();
    state.store.delete_product(&id)?;
    log::info!("{} deleted product {}", admin.username, id);

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Product deleted successfully")))
}

// ==================== Wishlist Endpoints ====================

pub async fn add_to_wishlist(
    auth_user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<AddToWishlistRequest>,
) -> ApiResult {
    let product_id = body
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("Product ID is required".to_string()))?;

    let wishlist_item = state.store.add_to_wishlist(&auth_user.user_id, product_id)?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Product added to wishlist",
        WishlistItemPayload { wishlist_item },
    )))
}

pub async fn get_wishlist(auth_user: AuthUser, state: web::Data<AppState>) -> ApiResult {
    let wishlist = state.store.list_wishlist(&auth_user.user_id)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(WishlistPayload {
        count: wishlist.len(),
        wishlist,
    })))
}

pub async fn remove_from_wishlist(
    auth_user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult {
    state
        .store
        .remove_from_wishlist(&auth_user.user_id, &path.into_inner())?;

    Ok(HttpResponse::Ok().json(ApiResponse::<()>::message("Product removed from wishlist")))
}

pub async fn wishlist_status(
    auth_user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult {
    let is_in_wishlist = state
        .store
        .wishlist_status(&auth_user.user_id, &path.into_inner())?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(WishlistStatusPayload { is_in_wishlist })))
}

// ==================== Extractor errors ====================

fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(format!("Invalid request body: {}", err)).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(format!("Invalid query string: {}", err)).into()
}

fn path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(format!("Invalid path: {}", err)).into()
}

pub async fn not_found() -> ApiResult {
    Err(ApiError::NotFound("Route not found".to_string()))
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        .app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error))

        .route("/", web::get().to(index))
        .route("/health", web::get().to(health))

        // Auth
        .route("/api/auth/register", web::post().to(register))
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/profile", web::get().to(profile))

        // Products (writes are admin-only)
        .route("/api/products", web::get().to(list_products))
        .route("/api/products", web::post().to(create_product))
        .route("/api/products/{id}", web::get().to(get_product))
        .route("/api/products/{id}", web::put().to(update_product))
        .route("/api/products/{id}", web::delete().to(delete_product))

        // Wishlist (all authenticated)
        .route("/api/wishlist", web::post().to(add_to_wishlist))
        .route("/api/wishlist", web::get().to(get_wishlist))
        .route("/api/wishlist/status/{product_id}", web::get().to(wishlist_status))
        .route("/api/wishlist/{product_id}", web::delete().to(remove_from_wishlist));
}
