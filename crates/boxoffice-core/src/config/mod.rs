//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. The configuration is loaded once at startup and handed to
//! component constructors by value.

pub mod admission;
pub mod app;
pub mod database;
pub mod logging;
pub mod store;

use serde::{Deserialize, Serialize};

pub use self::admission::{
    AdmissionConfig, FingerprintConfig, InventoryConfig, RateLimitConfig, RateLimitProfileConfig,
    SeedTicketType,
};
pub use self::app::{CorsConfig, ServerConfig};
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::store::{CacheSyncConfig, MemoryStoreConfig, RedisStoreConfig, StoreConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Coordination store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Admission gate settings.
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Background cache-sync worker settings.
    #[serde(default)]
    pub cache_sync: CacheSyncConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `BOXOFFICE__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BOXOFFICE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_profiles() {
        let config = AppConfig::default();
        assert_eq!(config.admission.rate_limit.default.limit, 100);
        assert_eq!(config.admission.rate_limit.default.window_seconds, 60);
        assert_eq!(config.admission.rate_limit.strict.limit, 10);
        assert_eq!(config.admission.fingerprint.claim_ttl_seconds, 24 * 60 * 60);
        assert_eq!(config.store.key_prefix, "boxoffice:");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[store]\nprovider = \"redis\"\n[admission.rate_limit.strict]\nlimit = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.provider, "redis");
        assert_eq!(config.admission.rate_limit.strict.limit, 5);
        assert_eq!(config.admission.rate_limit.strict.window_seconds, 60);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_inventory_seed_list() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [[admission.inventory.seed]]
                id = "6f1c2a4e-9b1d-4f7a-8c3e-2d5b7a9e0c11"
                name = "General Admission"
                total_quantity = 500

                [[admission.inventory.seed]]
                id = "0b8e5d2f-3c6a-4e1b-9f7d-1a2c3e4f5a6b"
                name = "VIP"
                price = 250.0
                total_quantity = 20
                available_quantity = 5
                opens_in_minutes = 30
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let seed = &config.admission.inventory.seed;
        assert_eq!(seed.len(), 2);
        assert_eq!(seed[0].name, "General Admission");
        assert_eq!(seed[0].available_quantity, None);
        assert_eq!(seed[0].opens_in_minutes, 0);
        assert_eq!(seed[0].closes_in_minutes, 7 * 24 * 60);
        assert_eq!(seed[1].available_quantity, Some(5));
        assert_eq!(
            seed[1].id.to_string(),
            "0b8e5d2f-3c6a-4e1b-9f7d-1a2c3e4f5a6b"
        );
        assert_eq!(config.admission.inventory.reservation_ttl_seconds, 3600);
    }
}
