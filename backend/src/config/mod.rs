use config::{Config, ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::ipfs::{DEFAULT_GATEWAY, DEFAULT_PINNING_URL};
use crate::oracle::DEFAULT_ORACLE_URL;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    /// Owner of the local factory contract.
    pub admin_address: String,
    pub notification_store: String,
    pub notification_poll_secs: u64,
    pub ipfs_gateway: String,
    pub pinata_api_url: String,
    #[serde(default)]
    pub pinata_api_key: String,
    #[serde(default)]
    pub pinata_secret_api_key: String,
    pub price_oracle_url: String,
    /// Initial-sale price per token, in ETH.
    pub token_sale_price_eth: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Self::from_env(Environment::default().try_parsing(true))
    }

    /// Builds the configuration from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_env(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("port", 8080)?
            .set_default("admin_address", "0x00000000000000000000000000000000000000ad")?
            .set_default("notification_store", "notifications.json")?
            .set_default("notification_poll_secs", 15)?
            .set_default("ipfs_gateway", DEFAULT_GATEWAY)?
            .set_default("pinata_api_url", DEFAULT_PINNING_URL)?
            .set_default("price_oracle_url", DEFAULT_ORACLE_URL)?
            .set_default("token_sale_price_eth", "50")?
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config = AppConfig::from_vars(vars(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.ipfs_gateway, DEFAULT_GATEWAY);
        assert_eq!(config.poll_period(), Duration::from_secs(15));
        assert!(config.pinata_api_key.is_empty());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_vars(vars(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "9090"),
            ("NOTIFICATION_POLL_SECS", "5"),
            ("TOKEN_SALE_PRICE_ETH", "0.025"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.poll_period(), Duration::from_secs(5));
        assert_eq!(config.token_sale_price_eth, "0.025");
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(AppConfig::from_vars(HashMap::new()).is_err());
    }
}
