//! Typed HTTP client for the catalog API and a local mirror of the last
//! fetched catalog and wishlist state.
//!
//! The mirror is never authoritative. After every mutation it re-issues the
//! matching read, so its contents always reflect the last successful fetch.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::*;
use crate::query::ProductFilter;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} ({status})")]
    Api { status: StatusCode, message: String },
    #[error("Not logged in")]
    NotAuthenticated,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::NotAuthenticated => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WishlistAdd<'a> {
    product_id: &'a str,
}

/// Thin async wrapper over the REST surface. Holds the bearer token once
/// `register` or `login` succeeds.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn authed(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        if self.token.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(self.request(method, path))
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> ClientResult<T> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        Err(ClientError::Api { status, message })
    }

    // Auth

    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<User> {
        let body = RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let auth: AuthResponse =
            Self::send(self.request(Method::POST, "/api/auth/register").json(&body)).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<User> {
        let body = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let auth: AuthResponse =
            Self::send(self.request(Method::POST, "/api/auth/login").json(&body)).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn profile(&self) -> ClientResult<User> {
        let payload: UserPayload =
            Self::send(self.authed(Method::GET, "/api/auth/profile")?).await?;
        Ok(payload.user)
    }

    // Products

    pub async fn list_products(&self, filter: &ProductFilter) -> ClientResult<Vec<Product>> {
        let payload: ProductListPayload =
            Self::send(self.request(Method::GET, "/api/products").query(filter)).await?;
        Ok(payload.products)
    }

    pub async fn get_product(&self, id: &str) -> ClientResult<Product> {
        let payload: ProductPayload =
            Self::send(self.request(Method::GET, &format!("/api/products/{}", id))).await?;
        Ok(payload.product)
    }

    pub async fn create_product(&self, fields: &CreateProductRequest) -> ClientResult<Product> {
        let payload: ProductPayload =
            Self::send(self.authed(Method::POST, "/api/products")?.json(fields)).await?;
        Ok(payload.product)
    }

    pub async fn update_product(
        &self,
        id: &str,
        fields: &UpdateProductRequest,
    ) -> ClientResult<Product> {
        let req = self.authed(Method::PUT, &format!("/api/products/{}", id))?;
        let payload: ProductPayload = Self::send(req.json(fields)).await?;
        Ok(payload.product)
    }

    pub async fn delete_product(&self, id: &str) -> ClientResult<()> {
        let req = self.authed(Method::DELETE, &format!("/api/products/{}", id))?;
        let _: serde_json::Value = Self::send(req).await?;
        Ok(())
    }

    // Wishlist

    pub async fn add_to_wishlist(&self, product_id: &str) -> ClientResult<WishlistEntry> {
        let req = self
            .authed(Method::POST, "/api/wishlist")?
            .json(&WishlistAdd { product_id });
        let payload: WishlistItemPayload = Self::send(req).await?;
        Ok(payload.wishlist_item)
    }

    pub async fn wishlist(&self) -> ClientResult<Vec<WishlistItem>> {
        let payload: WishlistPayload =
            Self::send(self.authed(Method::GET, "/api/wishlist")?).await?;
        Ok(payload.wishlist)
    }

    pub async fn remove_from_wishlist(&self, product_id: &str) -> ClientResult<()> {
        let req = self.authed(Method::DELETE, &format!("/api/wishlist/{}", product_id))?;
        let _: serde_json::Value = Self::send(req).await?;
        Ok(())
    }

    pub async fn wishlist_status(&self, product_id: &str) -> ClientResult<bool> {
        let req = self.authed(Method::GET, &format!("/api/wishlist/status/{}", product_id))?;
        let payload: WishlistStatusPayload = Self::send(req).await?;
        Ok(payload.is_in_wishlist)
    }
}

/// Cached copies of the last product list, the last product detail and the
/// caller's wishlist. One mirror per client session; nothing is shared.
#[derive(Debug)]
pub struct CatalogMirror {
    client: CatalogClient,
    filter: ProductFilter,
    products: Vec<Product>,
    product: Option<Product>,
    wishlist: Vec<WishlistItem>,
}

impl CatalogMirror {
    pub fn new(client: CatalogClient) -> Self {
        Self {
            client,
            filter: ProductFilter::default(),
            products: Vec::new(),
            product: None,
            wishlist: Vec::new(),
        }
    }

    pub fn client(&self) -> &CatalogClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut CatalogClient {
        &mut self.client
    }

    pub fn filter(&self) -> &ProductFilter {
        &self.filter
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self) -> Option<&Product> {
        self.product.as_ref()
    }

    pub fn wishlist(&self) -> &[WishlistItem] {
        &self.wishlist
    }

    /// Drop the token and everything cached for the session.
    pub fn logout(&mut self) {
        self.client.logout();
        self.wishlist.clear();
    }

    /// Fetch the catalog with a new filter. The filter is remembered only
    /// once the fetch succeeds.
    pub async fn refresh_products(&mut self, filter: ProductFilter) -> ClientResult<&[Product]> {
        self.products = self.client.list_products(&filter).await?;
        self.filter = filter;
        Ok(&self.products)
    }

    /// Re-run the last successful catalog query.
    pub async fn reload_products(&mut self) -> ClientResult<&[Product]> {
        self.products = self.client.list_products(&self.filter).await?;
        Ok(&self.products)
    }

    pub async fn load_product(&mut self, id: &str) -> ClientResult<&Product> {
        let product = self.client.get_product(id).await?;
        Ok(self.product.insert(product))
    }

    pub async fn refresh_wishlist(&mut self) -> ClientResult<&[WishlistItem]> {
        self.wishlist = self.client.wishlist().await?;
        Ok(&self.wishlist)
    }

    /// Answer from the cached wishlist without a round trip.
    pub fn is_wishlisted(&self, product_id: &str) -> bool {
        self.wishlist.iter().any(|item| item.entry.product_id == product_id)
    }

    pub async fn create_product(&mut self, fields: &CreateProductRequest) -> ClientResult<Product> {
        let product = self.client.create_product(fields).await?;
        self.reload_products().await?;
        Ok(product)
    }

    pub async fn update_product(
        &mut self,
        id: &str,
        fields: &UpdateProductRequest,
    ) -> ClientResult<Product> {
        let product = self.client.update_product(id, fields).await?;
        self.reload_products().await?;
        if self.product.as_ref().is_some_and(|p| p.id == id) {
            self.load_product(id).await?;
        }
        Ok(product)
    }

    pub async fn delete_product(&mut self, id: &str) -> ClientResult<()> {
        self.client.delete_product(id).await?;
        if self.product.as_ref().is_some_and(|p| p.id == id) {
            self.product = None;
        }
        self.reload_products().await?;
        if self.client.token().is_some() {
            self.refresh_wishlist().await?;
        }
        Ok(())
    }

    pub async fn add_to_wishlist(&mut self, product_id: &str) -> ClientResult<WishlistEntry> {
        let entry = self.client.add_to_wishlist(product_id).await?;
        self.refresh_wishlist().await?;
        Ok(entry)
    }

    pub async fn remove_from_wishlist(&mut self, product_id: &str) -> ClientResult<()> {
        self.client.remove_from_wishlist(product_id).await?;
        self.refresh_wishlist().await?;
        Ok(())
    }

    /// Add the product if it is not cached as wishlisted, remove it
    /// otherwise. Failures are logged and swallowed; the return value is the
    /// cached status after the attempt.
    pub async fn toggle_wishlist(&mut self, product_id: &str) -> bool {
        let result = if self.is_wishlisted(product_id) {
            self.remove_from_wishlist(product_id).await.map(|_| ())
        } else {
            self.add_to_wishlist(product_id).await.map(|_| ())
        };

        if let Err(e) = result {
            log::warn!("Wishlist toggle for {} failed: {}", product_id, e);
            if let Err(e) = self.refresh_wishlist().await {
                log::warn!("Wishlist refresh failed: {}", e);
            }
        }
        self.is_wishlisted(product_id)
    }
}
