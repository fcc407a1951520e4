// Library entry point for catalog-hub
// Exposes modules for the binary and the integration tests

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod seed;
pub mod store;
