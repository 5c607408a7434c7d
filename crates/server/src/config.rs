// Hub configuration read from the environment

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9001";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub bind_addr: SocketAddr,

    /// Replicas created at startup, in id order. The first is the root.
    pub replicas: Vec<String>,
}

impl HubConfig {
    /// Reads `BIND_ADDR` and `HUB_REPLICAS` (comma separated names)
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::var("BIND_ADDR").ok(), env::var("HUB_REPLICAS").ok())
    }

    fn from_vars(bind_addr: Option<String>, replicas: Option<String>) -> Result<Self> {
        let bind_addr = bind_addr.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid BIND_ADDR: {}", bind_addr))?;

        let replicas = replicas
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        Ok(HubConfig {
            bind_addr,
            replicas,
        })
    }
}
