// src/config.rs

use std::env;

#[derive(Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub token_expiration_days: i64,
    pub bind_address: String,
    pub image_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            mongo_uri: env::var("MONGO_URI")
                .unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "encomienda".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "encomienda_secret_key".to_string()),
            token_expiration_days: env::var("TOKEN_EXPIRATION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(365),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            image_dir: env::var("IMAGE_DIR").unwrap_or_else(|_| "public/images".to_string()),
        }
    }
}
