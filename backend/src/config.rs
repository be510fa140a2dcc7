//! Server settings for the stock service
//!
//! Built-in defaults, then `config/<environment>.toml`, then `MSK__*`
//! environment variables (`MSK__STOCK__TOLERANCE_PERCENT=3`).

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// `development` or `production`
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub stock: StockConfig,
}

/// HTTP listener; the API is mounted under `/api/v1`
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API; empty allows any
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection before failing the request
    pub acquire_timeout_secs: u64,
    /// Apply `migrations/` at startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// HMAC secret shared with the token issuer
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StockConfig {
    /// Percentage a request may exceed available stock before it is refused
    pub tolerance_percent: Decimal,

    /// Minimum hours between two low-stock alerts for the same material
    pub alert_dedup_hours: i64,

    /// Unit price applied to receipts that carry no price
    pub default_unit_price: Decimal,
}

impl StockConfig {
    fn check(&self) -> Result<(), ConfigError> {
        if self.tolerance_percent < Decimal::ZERO || self.tolerance_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::Message(
                "stock.tolerance_percent must be between 0 and 100".into(),
            ));
        }
        if self.alert_dedup_hours < 0 {
            return Err(ConfigError::Message("stock.alert_dedup_hours cannot be negative".into()));
        }
        if self.default_unit_price < Decimal::ZERO {
            return Err(ConfigError::Message("stock.default_unit_price cannot be negative".into()));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("MSK_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let development = environment == "development";

        let config: Config = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", development)?
            .set_default("stock.tolerance_percent", "5")?
            .set_default("stock.alert_dedup_hours", 24)?
            .set_default("stock.default_unit_price", "0")?
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(
                Environment::with_prefix("MSK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.stock.check()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(tolerance: i64, dedup: i64, price: i64) -> StockConfig {
        StockConfig {
            tolerance_percent: Decimal::from(tolerance),
            alert_dedup_hours: dedup,
            default_unit_price: Decimal::from(price),
        }
    }

    #[test]
    fn test_stock_settings_accepted() {
        assert!(stock(5, 24, 0).check().is_ok());
        assert!(stock(0, 0, 12).check().is_ok());
    }

    #[test]
    fn test_stock_settings_rejected() {
        assert!(stock(-1, 24, 0).check().is_err());
        assert!(stock(101, 24, 0).check().is_err());
        assert!(stock(5, -1, 0).check().is_err());
        assert!(stock(5, 24, -3).check().is_err());
    }
}
