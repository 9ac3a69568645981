//! Records real-time 5-second bars from Interactive Brokers to per-symbol CSV files.
//!
//! The recorder connects to TWS or IB Gateway through the [ibapi](https://crates.io/crates/ibapi)
//! client, requests a 5-second TRADES bar stream for every configured ticker and appends each bar
//! to `<output_dir>/<SYMBOL>.csv` as soon as it arrives. SIGINT or SIGTERM closes every file and
//! the session before the process exits.
//!
//!```no_run
//! use candlestream::{Config, ShutdownSignal};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!
//!     let signal = ShutdownSignal::new();
//!     signal.install()?;
//!
//!     let summary = candlestream::run(&config, &signal)?;
//!     println!("wrote {} bars", summary.written());
//!     Ok(())
//! }
//!```

/// Bars and the recent-bar history of a subscription.
pub mod bars;

/// Environment driven settings.
pub mod config;

/// The session with TWS or IB Gateway.
pub mod gateway;

pub mod lifecycle;

/// Dispatches bars to the output of their subscription.
pub mod recorder;

pub mod setup;

pub mod shutdown;

/// Per-symbol output files.
pub mod sink;

pub mod streamer;

pub mod symbols;

mod errors;

pub use config::Config;
pub use errors::Error;
pub use gateway::{FeedEvent, Gateway, IbGateway, SubscriptionHandle};
pub use shutdown::ShutdownSignal;
pub use streamer::{run, run_with, RunSummary, StopReason};
