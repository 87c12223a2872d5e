use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::ServerError;

/// Port the server listens on when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 12345;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        }
    }
}

impl ServerConfig {
    /// Read `TLT_HOST` and `PORT` from the environment.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_vars(std::env::var("TLT_HOST").ok(), std::env::var("PORT").ok())
    }

    pub fn from_vars(host: Option<String>, port: Option<String>) -> Result<Self, ServerError> {
        let defaults = Self::default();

        let ip = match host {
            Some(h) => h
                .parse::<IpAddr>()
                .map_err(|_| ServerError::Config(format!("TLT_HOST is not an IP address: {}", h)))?,
            None => defaults.bind_addr.ip(),
        };
        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ServerError::Config(format!("PORT is not a port number: {}", p)))?,
            None => defaults.bind_addr.port(),
        };

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
        })
    }
}
