//! Server configuration, read once from the environment at startup.
//!
//! | Variable        | Default        |
//! |-----------------|----------------|
//! | `HOST`          | `127.0.0.1`    |
//! | `PORT`          | `5000`         |
//! | `DATABASE_PATH` | `taskflow.db`  |
//! | `JWT_SECRET`    | required unless `DEV_MODE` |
//! | `JWT_TTL_DAYS`  | `7`            |
//! | `DEV_MODE`      | `false`        |

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set (or enable DEV_MODE for an ephemeral secret)")]
    MissingJwtSecret,

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Allows starting without `JWT_SECRET`; tokens then die with the process.
    pub dev_mode: bool,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let dev_mode = match var("DEV_MODE") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                name: "DEV_MODE",
                value: v,
            })?,
            None => false,
        };

        let port = match var("PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: v,
            })?,
            None => 5000,
        };

        let jwt_ttl_days = match var("JWT_TTL_DAYS") {
            Some(v) => match v.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "JWT_TTL_DAYS",
                        value: v,
                    })
                }
            },
            None => 7,
        };

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if dev_mode => {
                tracing::warn!("JWT_SECRET not set; using an ephemeral secret (DEV_MODE)");
                ephemeral_secret()
            }
            None => return Err(ConfigError::MissingJwtSecret),
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database_path: var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("taskflow.db")),
            dev_mode,
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_days,
            },
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn ephemeral_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
