use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use catalog_hub::api::{self, AppState};
use catalog_hub::auth::AuthService;
use catalog_hub::models::{CreateProductRequest, Role, User};
use catalog_hub::store::Store;

fn create_app_state() -> web::Data<AppState> {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service =
        Arc::new(AuthService::new("test_secret".to_string(), store.clone()).with_hash_cost(4));
    web::Data::new(AppState::new(store, auth_service))
}

/// Insert an admin and return (token, user id).
fn create_admin(state: &AppState) -> (String, String) {
    let mut admin = User {
        id: String::new(),
        username: "admin".to_string(),
        email: "admin@example.com".to_string(),
        password_hash: state.auth_service.hash_password("admin123").unwrap(),
        role: Role::Admin,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_user(&mut admin).unwrap();
    let token = state.auth_service.generate_token(&admin.id).unwrap();
    (token, admin.id)
}

fn seed_product(state: &AppState, owner_id: &str, name: &str) -> String {
    let fields = CreateProductRequest {
        name: Some(name.to_string()),
        description: Some("Test product".to_string()),
        category: Some("Flower".to_string()),
        thc: Some(20.0),
        cbd: Some(1.0),
        price: Some(10.0),
        ..Default::default()
    };
    state.store.create_product(&fields, owner_id).unwrap().id
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(api::configure_routes)
                .default_service(web::to(api::not_found)),
        )
        .await
    };
}

macro_rules! register_and_get_token {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": $username,
                "email": format!("{}@example.com", $username),
                "password": "password123"
            }))
            .to_request();

        let resp: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        resp["token"].as_str().unwrap().to_string()
    }};
}

macro_rules! add_to_wishlist {
    ($app:expr, $token:expr, $product_id:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/wishlist")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json(json!({ "productId": $product_id }))
            .to_request();
        test::call_service(&$app, req).await
    }};
}

macro_rules! wishlist_status {
    ($app:expr, $token:expr, $product_id:expr) => {{
        let req = test::TestRequest::get()
            .uri(&format!("/api/wishlist/status/{}", $product_id))
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        body["isInWishlist"].as_bool().unwrap()
    }};
}

macro_rules! get_wishlist {
    ($app:expr, $token:expr) => {{
        let req = test::TestRequest::get()
            .uri("/api/wishlist")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        body
    }};
}

// ==================== Add Tests ====================

#[actix_web::test]
async fn test_add_to_wishlist() {
    let state = create_app_state();
    let app = init_app!(state);
    let (_, admin_id) = create_admin(&state);
    let product_id = seed_product(&state, &admin_id, "Blueberry Dream");
    let token = register_and_get_token!(app, "shopper");

    let resp = add_to_wishlist!(app, token, product_id);
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Product added to wishlist");
    assert_eq!(body["wishlistItem"]["productId"], product_id.as_str());
    assert!(body["wishlistItem"]["userId"].is_string());

    assert!(wishlist_status!(app, token, product_id));
}

#[actix_web::test]
async fn test_add_duplicate_is_conflict() {
    let state = create_app_state();
    let app = init_app!(state);
    let (_, admin_id) = create_admin(&state);
    let product_id = seed_product(&state, &admin_id, "Sour Diesel");
    let token = register_and_get_token!(app, "shopper");

    let resp = add_to_wishlist!(app, token, product_id);
    assert_eq!(resp.status(), 201);

    let resp = add_to_wishlist!(app, token, product_id);
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Product already in wishlist");

    let body = get_wishlist!(app, token);
    assert_eq!(body["count"], 1);
}

#[actix_web::test]
async fn test_add_validation_and_missing_product() {
    let state = create_app_state();
    let app = init_app!(state);
    let token = register_and_get_token!(app, "shopper");

    let req = test::TestRequest::post()
        .uri("/api/wishlist")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Product ID is required");

    let resp = add_to_wishlist!(app, token, "no-such-product");
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Product not found");
}

#[actix_web::test]
async fn test_wishlist_requires_auth() {
    let state = create_app_state();
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/wishlist").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/wishlist")
        .set_json(json!({ "productId": "anything" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/wishlist/status/anything")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

// ==================== Remove / Status Tests ====================

#[actix_web::test]
async fn test_remove_from_wishlist() {
    let state = create_app_state();
    let app = init_app!(state);
    let (_, admin_id) = create_admin(&state);
    let product_id = seed_product(&state, &admin_id, "Purple Haze");
    let token = register_and_get_token!(app, "shopper");

    add_to_wishlist!(app, token, product_id);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/wishlist/{}", product_id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Product removed from wishlist");

    assert!(!wishlist_status!(app, token, product_id));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/wishlist/{}", product_id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Product not in wishlist");
}

#[actix_web::test]
async fn test_status_for_unknown_product_is_false() {
    let state = create_app_state();
    let app = init_app!(state);
    let token = register_and_get_token!(app, "shopper");

    assert!(!wishlist_status!(app, token, "no-such-product"));
}

#[actix_web::test]
async fn test_wishlists_are_per_user() {
    let state = create_app_state();
    let app = init_app!(state);
    let (_, admin_id) = create_admin(&state);
    let product_id = seed_product(&state, &admin_id, "Og Kush");
    let alice = register_and_get_token!(app, "alice");
    let bob = register_and_get_token!(app, "bob");

    let resp = add_to_wishlist!(app, alice, product_id);
    assert_eq!(resp.status(), 201);
    let resp = add_to_wishlist!(app, bob, product_id);
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/wishlist/{}", product_id))
        .insert_header(("Authorization", format!("Bearer {}", alice)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    assert!(!wishlist_status!(app, alice, product_id));
    assert!(wishlist_status!(app, bob, product_id));
}

// ==================== List Tests ====================

#[actix_web::test]
async fn test_list_wishlist_newest_first_with_products() {
    let state = create_app_state();
    let app = init_app!(state);
    let (_, admin_id) = create_admin(&state);
    let first = seed_product(&state, &admin_id, "White Widow");
    let second = seed_product(&state, &admin_id, "Strawberry Cough");
    let token = register_and_get_token!(app, "shopper");

    add_to_wishlist!(app, token, first);
    add_to_wishlist!(app, token, second);

    let body = get_wishlist!(app, token);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    let items = body["wishlist"].as_array().unwrap();
    assert_eq!(items[0]["productId"], second.as_str());
    assert_eq!(items[0]["product"]["name"], "Strawberry Cough");
    assert_eq!(items[1]["product"]["name"], "White Widow");
    assert_eq!(items[1]["product"]["createdBy"]["username"], "admin");
}

// ==================== Product deletion ====================

#[actix_web::test]
async fn test_deleting_wishlisted_product_removes_entry() {
    let state = create_app_state();
    let app = init_app!(state);
    let (admin_token, admin_id) = create_admin(&state);
    let product_id = seed_product(&state, &admin_id, "Cannabis Salve");
    let token = register_and_get_token!(app, "shopper");

    add_to_wishlist!(app, token, product_id);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/products/{}", product_id))
        .insert_header(("Authorization", format!("Bearer {}", admin_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = get_wishlist!(app, token);
    assert_eq!(body["count"], 0);
    assert!(!wishlist_status!(app, token, product_id));
}

#[actix_web::test]
async fn test_deleting_unrelated_product_leaves_wishlist() {
    let state = create_app_state();
    let app = init_app!(state);
    let (admin_token, admin_id) = create_admin(&state);
    let kept = seed_product(&state, &admin_id, "Blueberry Dream");
    let unrelated = seed_product(&state, &admin_id, "Sour Diesel");
    let token = register_and_get_token!(app, "shopper");

    add_to_wishlist!(app, token, kept);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/products/{}", unrelated))
        .insert_header(("Authorization", format!("Bearer {}", admin_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = get_wishlist!(app, token);
    assert_eq!(body["count"], 1);
    assert_eq!(body["wishlist"][0]["productId"], kept.as_str());
    assert!(wishlist_status!(app, token, kept));
}
