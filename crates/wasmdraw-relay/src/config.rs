//! Relay configuration from the environment.

use std::net::SocketAddr;

use thiserror::Error;

/// Listen address used when `WASMDRAW_RELAY_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Per-room broadcast buffer used when `WASMDRAW_RELAY_CHANNEL_CAPACITY` is unset.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub const ADDR_VAR: &str = "WASMDRAW_RELAY_ADDR";
pub const CHANNEL_CAPACITY_VAR: &str = "WASMDRAW_RELAY_CHANNEL_CAPACITY";

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub addr: SocketAddr,
    /// Frames buffered per room before slow peers start missing some.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let addr = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| RelayError::Config(format!("{}={:?}: {}", ADDR_VAR, addr, e)))?;

        let channel_capacity = match lookup(CHANNEL_CAPACITY_VAR) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(RelayError::Config(format!(
                        "{}={:?} must be a positive integer",
                        CHANNEL_CAPACITY_VAR, raw
                    )));
                }
                Ok(n) => n,
            },
            None => DEFAULT_CHANNEL_CAPACITY,
        };

        Ok(Self {
            addr,
            channel_capacity,
        })
    }
}
