//! Per-symbol subscription setup.

use crossbeam::channel::Sender;
use log::{info, warn};

use crate::gateway::{FeedEvent, Gateway, SubscriptionHandle};
use crate::recorder::Recorder;
use crate::sink::RecordSink;
use crate::symbols::Symbol;
use crate::Error;

/// A symbol that could not be subscribed, and why.
#[derive(Debug)]
pub struct SetupFailure {
    pub symbol: Symbol,
    pub error: Error,
}

/// Opens an output and requests a bar stream for every symbol.
///
/// Handles are assigned in list order starting at 0. A failure for one symbol is logged and the
/// symbol skipped; its output, if it was opened, is closed again. Fails with
/// [Error::NoSubscriptions] when no symbol could be subscribed.
pub fn subscribe_all<G, F>(
    gateway: &mut G,
    symbols: &[Symbol],
    mut open_sink: F,
    events: &Sender<FeedEvent>,
) -> Result<(Recorder, Vec<SetupFailure>), Error>
where
    G: Gateway + ?Sized,
    F: FnMut(&Symbol) -> Result<Box<dyn RecordSink>, Error>,
{
    info!("setting up streaming for {} tickers...", symbols.len());

    let mut recorder = Recorder::new();
    let mut failures = Vec::new();

    for (handle, symbol) in symbols.iter().enumerate() {
        match subscribe_one(gateway, handle, symbol, &mut open_sink, events) {
            Ok(sink) => {
                recorder.register(handle, symbol.clone(), sink)?;
                info!("set up streaming for {symbol}");
            }
            Err(error) => {
                warn!("failed to set up streaming for {symbol}: {error}");
                failures.push(SetupFailure {
                    symbol: symbol.clone(),
                    error,
                });
            }
        }
    }

    if recorder.is_empty() {
        return Err(Error::NoSubscriptions);
    }

    Ok((recorder, failures))
}

fn subscribe_one<G, F>(
    gateway: &mut G,
    handle: SubscriptionHandle,
    symbol: &Symbol,
    open_sink: &mut F,
    events: &Sender<FeedEvent>,
) -> Result<Box<dyn RecordSink>, Error>
where
    G: Gateway + ?Sized,
    F: FnMut(&Symbol) -> Result<Box<dyn RecordSink>, Error>,
{
    let mut sink = open_sink(symbol)?;

    if let Err(err) = gateway.subscribe_bars(symbol, handle, events.clone()) {
        if let Err(close_err) = sink.close() {
            warn!("ignoring error closing output for {symbol}: {close_err}");
        }
        return Err(err);
    }

    Ok(sink)
}
