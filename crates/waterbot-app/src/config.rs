use tokio::net::TcpListener;

use crate::error::ServeError;

pub const HOST_VAR: &str = "HOST";
pub const PORT_VAR: &str = "PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;

/// Listen address, read from `HOST` and `PORT`.
///
/// The image sets both; outside it they default to `0.0.0.0:5001`.
/// `host` may be an IP address or a hostname; it is resolved when bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServeConfig {
    /// Load from the process environment, honouring `.env`.
    pub fn load() -> Result<Self, ServeError> {
        // Attempt to load .env file (silently ignore if not found)
        let dotenv_loaded = dotenvy::dotenv().is_ok();
        tracing::debug!(dotenv = dotenv_loaded, "loading ServeConfig");

        // arch-lint: allow(no-silent-result-drop) reason="an unset variable falls back to the default address"
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset; anything else must parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = match value(HOST_VAR) {
            Some(raw) => raw.trim().to_owned(),
            None => defaults.host,
        };
        let port = match value(PORT_VAR) {
            Some(raw) => raw.trim().parse().map_err(|_| ServeError::InvalidEnvVar {
                var: PORT_VAR,
                value: raw,
            })?,
            None => defaults.port,
        };

        Ok(Self { host, port })
    }

    /// `host:port` as written in the environment, for display.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Resolve `host` and bind the listener.
    pub async fn bind(&self) -> Result<TcpListener, ServeError> {
        TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| ServeError::Bind {
                addr: self.addr(),
                source: e,
            })
    }
}
