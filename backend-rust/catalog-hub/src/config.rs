//! Runtime configuration read from the environment (and `.env`, if present).

use std::env;
use thiserror::Error;

const INSECURE_JWT_SECRET: &str = "default_jwt_secret_change_me";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("ADMIN_EMAIL and ADMIN_PASSWORD must be set together")]
    IncompleteAdmin,
}

/// Credentials for the admin account created at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub admin: Option<AdminBootstrap>,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value: v,
            })?,
            None => 5000,
        };

        let token_ttl_days = match var("TOKEN_TTL_DAYS") {
            Some(v) => match v.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TOKEN_TTL_DAYS",
                        expected: "a positive number of days",
                        value: v,
                    })
                }
            },
            None => crate::auth::DEFAULT_TOKEN_TTL_DAYS,
        };

        let bcrypt_cost = match var("BCRYPT_COST") {
            Some(v) => match v.parse::<u32>() {
                Ok(cost) if (4..=31).contains(&cost) => cost,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BCRYPT_COST",
                        expected: "between 4 and 31",
                        value: v,
                    })
                }
            },
            None => crate::auth::DEFAULT_HASH_COST,
        };

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            INSECURE_JWT_SECRET.to_string()
        });

        let cors_origins = var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                email: email.to_lowercase(),
                password,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteAdmin),
        };

        let seed_demo_data = var("SEED_DEMO_DATA")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_path: var("DATABASE_PATH").unwrap_or_else(|| "catalog.db".to_string()),
            jwt_secret,
            token_ttl_days,
            bcrypt_cost,
            cors_origins,
            admin,
            seed_demo_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.database_path, "catalog.db");
        assert_eq!(config.jwt_secret, INSECURE_JWT_SECRET);
        assert_eq!(config.bcrypt_cost, 10);
        assert!(config.cors_origins.is_empty());
        assert!(config.admin.is_none());
        assert!(!config.seed_demo_data);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("DATABASE_PATH", ":memory:"),
            ("JWT_SECRET", "s3cret"),
            ("CORS_ORIGINS", "http://localhost:5173, https://shop.example.com/"),
            ("ADMIN_EMAIL", "Admin@Example.com"),
            ("ADMIN_PASSWORD", "Admin@123"),
            ("SEED_DEMO_DATA", "true"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "https://shop.example.com"]
        );
        let admin = config.admin.unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.email, "admin@example.com");
        assert!(config.seed_demo_data);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("BCRYPT_COST", "2")]).is_err());
        assert!(config_from(&[("TOKEN_TTL_DAYS", "0")]).is_err());
        assert!(matches!(
            config_from(&[("ADMIN_EMAIL", "admin@example.com")]),
            Err(ConfigError::IncompleteAdmin)
        ));
    }
}
