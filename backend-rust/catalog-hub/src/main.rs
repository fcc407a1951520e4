use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use chrono::Duration;
use std::io;
use std::sync::Arc;

use catalog_hub::api::{self, AppState};
use catalog_hub::auth::AuthService;
use catalog_hub::config::Config;
use catalog_hub::seed;
use catalog_hub::store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // Initialize store
    let store = Arc::new(Store::new(&config.database_path).map_err(io::Error::other)?);
    log::info!("Database: {}", config.database_path);

    let auth_service = Arc::new(
        AuthService::new(config.jwt_secret.clone(), store.clone())
            .with_hash_cost(config.bcrypt_cost)
            .with_token_ttl(Duration::days(config.token_ttl_days)),
    );

    if let Some(admin) = &config.admin {
        seed::ensure_admin(&store, &auth_service, admin).map_err(io::Error::other)?;
    }

    if config.seed_demo_data {
        match store.first_admin().map_err(io::Error::other)? {
            Some(owner) => {
                seed::seed_demo_catalog(&store, &owner.id).map_err(io::Error::other)?;
            }
            None => log::warn!("SEED_DEMO_DATA is set but no admin exists; set ADMIN_EMAIL and ADMIN_PASSWORD"),
        }
    }

    let cors_origins = config.cors_origins.clone();
    let server = HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));
        let cors = if cors_origins.is_empty() {
            cors.allow_any_origin()
        } else {
            cors
        }
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState::new(
                store.clone(),
                auth_service.clone(),
            )))
            .configure(api::configure_routes)
            .default_service(web::to(api::not_found))
    });

    log::info!("Starting catalog-hub server on {}:{}", config.host, config.port);

    server.bind((config.host.as_str(), config.port))?.run().await
}
