use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use ibapi::client::Subscription;
use ibapi::contracts::Contract;
use ibapi::market_data::realtime::{self, BarSize, WhatToShow};
use ibapi::market_data::TradingHours;
use ibapi::Client;
use log::{debug, info, warn};

use super::{Endpoint, FeedEvent, Gateway, SubscriptionHandle};
use crate::symbols::Symbol;
use crate::Error;

// How long a forwarder waits for a bar before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A [Gateway] backed by an `ibapi` [Client].
///
/// Each subscription is serviced by a forwarder thread that polls the `ibapi` subscription and
/// pushes bars onto the event channel.
pub struct IbGateway {
    endpoint: Endpoint,
    client: Option<Arc<Client>>,
    stopping: Arc<AtomicBool>,
    forwarders: Vec<JoinHandle<()>>,
}

impl IbGateway {
    /// Connects to TWS or IB Gateway. No retry is attempted.
    pub fn connect(endpoint: &Endpoint) -> Result<Self, Error> {
        let address = endpoint.address();
        let client = Client::connect(&address, endpoint.client_id).map_err(|err| Error::ConnectionFailed(address, err.to_string()))?;

        info!("connected to IB at {endpoint} (server version {})", client.server_version());

        Ok(Self {
            endpoint: endpoint.clone(),
            client: Some(Arc::new(client)),
            stopping: Arc::new(AtomicBool::new(false)),
            forwarders: Vec::new(),
        })
    }
}

impl Gateway for IbGateway {
    fn subscribe_bars(&mut self, symbol: &Symbol, handle: SubscriptionHandle, events: Sender<FeedEvent>) -> Result<(), Error> {
        let client = self.client.clone().ok_or_else(|| Error::Gateway("not connected".to_owned()))?;
        let stopping = self.stopping.clone();
        let contract = Contract::stock(symbol.as_str()).build();

        let (ready_sender, ready) = channel::bounded::<Result<(), Error>>(1);

        let forwarder = thread::Builder::new().name(format!("bars-{symbol}")).spawn(move || {
            let subscription = match client.realtime_bars(&contract, BarSize::Sec5, WhatToShow::Trades, TradingHours::Extended) {
                Ok(subscription) => {
                    let _ = ready_sender.send(Ok(()));
                    subscription
                }
                Err(err) => {
                    let _ = ready_sender.send(Err(Error::from(err)));
                    return;
                }
            };

            let live = LiveBars {
                client: &client,
                subscription: &subscription,
            };
            forward_bars(&live, handle, &events, &stopping, POLL_INTERVAL);
        })?;

        match ready.recv() {
            Ok(Ok(())) => {
                debug!("forwarding realtime bars for {symbol} as subscription {handle}");
                self.forwarders.push(forwarder);
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = forwarder.join();
                Err(err)
            }
            Err(_) => {
                let _ = forwarder.join();
                Err(Error::Gateway(format!("realtime bars request for {symbol} was abandoned")))
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.stopping.store(true, Ordering::SeqCst);

        let mut panicked = 0;
        for forwarder in self.forwarders.drain(..) {
            if forwarder.join().is_err() {
                panicked += 1;
            }
        }

        // Forwarders hold the only other references, so this drops the client and closes the socket.
        if self.client.take().is_some() {
            info!("disconnected from IB at {}", self.endpoint);
        }

        if panicked > 0 {
            return Err(Error::Simple(format!("{panicked} bar forwarder(s) panicked")));
        }

        Ok(())
    }
}

impl Drop for IbGateway {
    fn drop(&mut self) {
        if let Err(err) = self.disconnect() {
            warn!("error disconnecting from IB: {err}");
        }
    }
}

/// The parts of a bar subscription a forwarder polls.
trait BarFeed {
    /// Waits up to `timeout` for the next bar.
    fn next_bar(&self, timeout: Duration) -> Option<realtime::Bar>;

    /// The error that ended the stream, if any.
    fn error(&self) -> Option<String>;

    fn is_connected(&self) -> bool;

    fn cancel(&self);
}

struct LiveBars<'a> {
    client: &'a Client,
    subscription: &'a Subscription<realtime::Bar>,
}

impl BarFeed for LiveBars<'_> {
    fn next_bar(&self, timeout: Duration) -> Option<realtime::Bar> {
        self.subscription.next_timeout(timeout)
    }

    fn error(&self) -> Option<String> {
        self.subscription.error().map(|err| err.to_string())
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn cancel(&self) {
        self.subscription.cancel();
    }
}

// Pushes bars from `feed` until the stream ends, the receiver goes away or `stopping` is set.
fn forward_bars<F: BarFeed + ?Sized>(
    feed: &F,
    handle: SubscriptionHandle,
    events: &Sender<FeedEvent>,
    stopping: &AtomicBool,
    poll_interval: Duration,
) {
    while !stopping.load(Ordering::Relaxed) {
        let started = Instant::now();

        match feed.next_bar(poll_interval) {
            Some(bar) => {
                if events.send(FeedEvent::Bar { handle, bar: bar.into() }).is_err() {
                    debug!("event channel closed, stopping subscription {handle}");
                    break;
                }
            }
            None => {
                if let Some(err) = feed.error() {
                    let _ = events.send(FeedEvent::Closed { handle, reason: Some(err) });
                    return;
                }

                if !feed.is_connected() {
                    let _ = events.send(FeedEvent::Closed {
                        handle,
                        reason: Some("connection to IB lost".to_owned()),
                    });
                    return;
                }

                // next_timeout returns early on notices that carry no bar
                let elapsed = started.elapsed();
                if elapsed < poll_interval {
                    thread::sleep(poll_interval - elapsed);
                }
            }
        }
    }

    feed.cancel();
}
