use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub readers: usize,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path = get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into());
        let host = get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = get("PARLEY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let readers = match get("PARLEY_READERS") {
            Some(raw) => raw.parse().context("PARLEY_READERS must be a number")?,
            None => parley_db::DEFAULT_READERS,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            host,
            port,
            readers,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
