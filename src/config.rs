use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context};
use tracing::info;

pub struct Config {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub session_minutes: i64,
}

impl Config {
    /// Reads the environment (and `.env`, if present).
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenv::dotenv();

        Ok(Self {
            database_path: try_load("DATABASE_PATH", "database/manager.db")?,
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:8080")?,
            session_minutes: try_load("SESSION_MINUTES", "30")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let value = dotenv::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value
        .parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default() {
        let port: u16 = try_load("ROOMKEEPER_SURELY_UNSET_VAR", "8080").unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn rejects_unparsable_default() {
        let err = try_load::<u16>("ROOMKEEPER_SURELY_UNSET_VAR", "eighty").unwrap_err();
        assert!(err.to_string().contains("ROOMKEEPER_SURELY_UNSET_VAR"));
    }
}
