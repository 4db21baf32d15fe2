use std::{fmt::Display, net::SocketAddr, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

impl Env {
    pub fn from_env() -> Self {
        match var("ENVIRONMENT") {
            Ok(Some(env)) => match env.as_str() {
                "dev" => Env::Dev,
                "staging" => Env::Staging,
                "production" => Env::Production,
                _ => Env::Dev,
            },
            _ => Env::Dev,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub store_backend: StoreBackend,
    /// Only set for the postgres backend.
    pub database_url: Option<String>,
    pub listen_addr: SocketAddr,
    pub db_max_connections: usize,
    pub vote_max_retries: u32,
    /// Upper bound on the `depth` a comment tree request may ask for.
    pub max_comment_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            store_backend: StoreBackend::Postgres,
            database_url: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            db_max_connections: 10,
            vote_max_retries: 3,
            max_comment_depth: 10,
        }
    }
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => {
            tracing::debug!("Missing environment variable `{key}`");
            match e {
                std::env::VarError::NotPresent => Ok(None),
                std::env::VarError::NotUnicode(_) => Err(format!(
                    "Could not get the environment variable `{key}` due to unicode error"
                )),
            }
        }
    }
}

fn required_var(key: &str) -> String {
    let val = var(key);
    match val {
        Ok(val) => match val {
            Some(val) => val,
            None => {
                tracing::error!("Environment variable `{key}` is required");
                std::process::exit(1)
            }
        },
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value `{raw}` for `{key}`: {e}")),
        None => Ok(default),
    }
}

/// Optional variable with a default; a value that does not parse is fatal.
fn parsed_var<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match var(key).and_then(|raw| parse_value(key, raw, default)) {
        Ok(val) => val,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1)
        }
    }
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let defaults = ServerConfig::default();

        let store_backend = parsed_var("STORE_BACKEND", defaults.store_backend);
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(required_var("DATABASE_URL")),
            StoreBackend::Memory => None,
        };

        ServerConfig {
            store_backend,
            database_url,
            listen_addr: parsed_var("LISTEN_ADDR", defaults.listen_addr),
            db_max_connections: parsed_var("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            vote_max_retries: parsed_var("VOTE_MAX_RETRIES", defaults.vote_max_retries),
            max_comment_depth: parsed_var("MAX_COMMENT_DEPTH", defaults.max_comment_depth).max(1),
        }
    }
}
