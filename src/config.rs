use std::net::SocketAddr;

use crate::{pipeline::DEFAULT_VALIDATION_BYTES, Error};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Service settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of leading bytes of each upload that are validated.
    pub validation_bytes: usize,
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            validation_bytes: DEFAULT_VALIDATION_BYTES,
            bind_addr: ([127, 0, 0, 1], 8080).into(),
        }
    }
}

impl Config {
    /// Reads `VALIDATION_BYTES` and `BIND_ADDR`, falling back to the defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let validation_bytes = match lookup("VALIDATION_BYTES") {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::config(format!(
                        "VALIDATION_BYTES must be a positive integer, got {:?}",
                        v
                    )))
                }
            },
            None => DEFAULT_VALIDATION_BYTES,
        };

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| Error::config(format!("BIND_ADDR {:?}: {}", bind_addr, e)))?;

        Ok(Config {
            validation_bytes,
            bind_addr,
        })
    }
}
