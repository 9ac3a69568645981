//! The brokerage session.
//!
//! A [Gateway] owns the connection to TWS or IB Gateway. Bars are not returned to the caller
//! directly: every subscription pushes [FeedEvent]s onto a channel supplied at subscription
//! time, and a single consumer drains that channel. [IbGateway] is the implementation backed by
//! the `ibapi` client.

use std::fmt;

use crossbeam::channel::Sender;

use crate::bars::Bar;
use crate::symbols::Symbol;
use crate::Error;

mod ib;

pub use ib::IbGateway;

/// Identifies one streaming request for the lifetime of a run.
pub type SubscriptionHandle = usize;

/// Messages pushed by a gateway to the recorder.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    /// A new bar arrived for the subscription.
    Bar { handle: SubscriptionHandle, bar: Bar },
    /// The gateway stopped delivering bars for the subscription.
    Closed { handle: SubscriptionHandle, reason: Option<String> },
}

/// Connection parameters for TWS or IB Gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
}

impl Endpoint {
    /// Socket address in the `host:port` form expected by `ibapi`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with client ID {}", self.address(), self.client_id)
    }
}

/// A session with the brokerage gateway.
pub trait Gateway {
    /// Requests a real-time stream of 5-second trade bars for `symbol`.
    ///
    /// Bars and the end of the stream are reported on `events`, tagged with `handle`. An error
    /// means the request itself failed and nothing will be sent for `handle`.
    fn subscribe_bars(&mut self, symbol: &Symbol, handle: SubscriptionHandle, events: Sender<FeedEvent>) -> Result<(), Error>;

    /// Cancels all subscriptions and closes the session. Safe to call repeatedly.
    fn disconnect(&mut self) -> Result<(), Error>;
}
