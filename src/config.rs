//! Runtime configuration.
//!
//! Every setting is optional and read from the environment, falling back to a default:
//!
//! | variable       | default        |
//! |----------------|----------------|
//! | `IB_HOST`      | `127.0.0.1`    |
//! | `IB_PORT`      | `7496`         |
//! | `IB_CLIENT_ID` | `1`            |
//! | `OUTPUT_DIR`   | `ibkr_candles` |
//! | `IB_SYMBOLS`   | built-in list  |
//!
//! An empty variable is treated as unset.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::gateway::Endpoint;
use crate::symbols::{default_symbols, parse_symbols, Symbol};
use crate::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7496;
pub const DEFAULT_CLIENT_ID: i32 = 1;
pub const DEFAULT_OUTPUT_DIR: &str = "ibkr_candles";

pub const HOST_VAR: &str = "IB_HOST";
pub const PORT_VAR: &str = "IB_PORT";
pub const CLIENT_ID_VAR: &str = "IB_CLIENT_ID";
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIR";
pub const SYMBOLS_VAR: &str = "IB_SYMBOLS";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    pub output_dir: PathBuf,
    pub symbols: Vec<Symbol>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            client_id: DEFAULT_CLIENT_ID,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            symbols: default_symbols(),
        }
    }
}

impl Config {
    /// Reads the configuration from the environment.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Config::default();

        Ok(Config {
            host: var(HOST_VAR).unwrap_or(defaults.host),
            port: parse_var(PORT_VAR)?.unwrap_or(defaults.port),
            client_id: parse_var(CLIENT_ID_VAR)?.unwrap_or(defaults.client_id),
            output_dir: var(OUTPUT_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.output_dir),
            symbols: var(SYMBOLS_VAR).map(|list| parse_symbols(&list)).unwrap_or(defaults.symbols),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id,
        }
    }
}

fn var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
        _ => None,
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|err| Error::Config(name.to_owned(), format!("{value:?}: {err}"))),
        None => Ok(None),
    }
}
