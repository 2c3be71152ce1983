use core::fmt::{Debug, Display};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use seat_allocation_optimizer::{default_layout, InventoryError, SeatGroup, SeatInventory};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "seat-allocation.toml";
pub const ENV_PREFIX: &str = "SEAT_";

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub listen_address: SocketAddr,
    /// Without a database url submissions are only kept in memory.
    pub database_url: Option<String>,
    /// Required in the `x-admin-token` header of the administrative routes when set.
    pub admin_token: Option<String>,
    pub max_body_bytes: usize,
    pub seating: Vec<SeatGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 3000)),
            database_url: None,
            admin_token: None,
            max_body_bytes: 64 * 1024,
            seating: default_layout(),
        }
    }
}

// keeps the secrets out of logs
impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_address", &self.listen_address)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<set>"))
            .field("max_body_bytes", &self.max_body_bytes)
            .field("seating", &self.seating)
            .finish()
    }
}

impl Config {
    pub fn seat_inventory(&self) -> Result<SeatInventory, ConfigError> {
        Ok(SeatInventory::from_layout(&self.seating)?)
    }
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("invalid seating: {0}")]
    Seating(#[from] InventoryError),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[must_use]
pub fn figment() -> Figment {
    Figment::new()
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Reads `seat-allocation.toml` from the working directory, overridden by `SEAT_*` variables.
/// The seating is checked here so a broken layout stops the process at start.
pub fn get_config() -> Result<Config, ConfigError> {
    let config: Config = figment().extract()?;
    config.seat_inventory()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = get_config().map_err(|error| error.to_string())?;
            assert_eq!(config.listen_address.port(), 3000);
            assert!(config.database_url.is_none());
            assert!(config.admin_token.is_none());
            assert_eq!(config.seating, default_layout());
            Ok(())
        });
    }

    #[test]
    fn file_and_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                listen_address = "127.0.0.1:8080"
                admin_token = "from-file"

                [[seating]]
                name = "Front"
                rows = 3
                capacity = 1
                "#,
            )?;
            jail.set_env("SEAT_ADMIN_TOKEN", "from-env");
            jail.set_env("SEAT_DATABASE_URL", "postgres://localhost/seats");

            let config = get_config().map_err(|error| error.to_string())?;
            assert_eq!(config.listen_address.port(), 8080);
            assert_eq!(config.admin_token.as_deref(), Some("from-env"));
            assert_eq!(
                config.database_url.as_deref(),
                Some("postgres://localhost/seats")
            );
            let inventory = config.seat_inventory().map_err(|error| error.to_string())?;
            assert_eq!(inventory.len(), 3);
            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_seating() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                [[seating]]
                name = "Front"
                rows = 2
                capacity = 0
                "#,
            )?;
            let error = get_config().err().ok_or("expected an error")?;
            assert!(matches!(error, ConfigError::Seating(_)));
            Ok(())
        });
    }

    #[test]
    fn debug_hides_secrets() {
        let config = Config {
            admin_token: Some("hunter2".to_owned()),
            ..Config::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
