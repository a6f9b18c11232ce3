use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod database;

pub use database::DatabaseConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub razorpay: RazorpayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            razorpay: RazorpayConfig {
                key_id: env::var("RAZORPAY_KEY_ID")
                    .map_err(|_| AppError::Configuration("RAZORPAY_KEY_ID not set".to_string()))?,
                key_secret: env::var("RAZORPAY_KEY_SECRET").map_err(|_| {
                    AppError::Configuration("RAZORPAY_KEY_SECRET not set".to_string())
                })?,
                base_url: env::var("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.razorpay.key_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "Razorpay key id cannot be empty".to_string(),
            ));
        }
        if self.razorpay.key_secret.trim().is_empty() {
            return Err(AppError::Configuration(
                "Razorpay key secret cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Initialize tracing for the host application
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
