//! Routes bars to the output of the subscription they belong to.

use std::collections::BTreeMap;

use log::{debug, error, info, warn};

use crate::bars::{format_timestamp, Bar, BarHistory};
use crate::gateway::{FeedEvent, SubscriptionHandle};
use crate::sink::RecordSink;
use crate::symbols::Symbol;
use crate::Error;

/// Output and recent bars of one subscription.
pub struct Route {
    symbol: Symbol,
    sink: Box<dyn RecordSink>,
    bars: BarHistory,
    written: usize,
    dropped: usize,
    streaming: bool,
}

impl Route {
    fn new(symbol: Symbol, sink: Box<dyn RecordSink>) -> Self {
        Self {
            symbol,
            sink,
            bars: BarHistory::new(),
            written: 0,
            dropped: 0,
            streaming: true,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    fn write_latest(&mut self, handle: SubscriptionHandle) -> Result<(), Error> {
        let bar = self.bars.latest().ok_or(Error::NoBars(handle))?;
        self.sink.append(bar)?;

        if log::log_enabled!(log::Level::Debug) {
            debug!("{}: {}", self.symbol, describe(bar));
        }

        Ok(())
    }
}

/// Bars written and dropped for one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolStats {
    pub symbol: Symbol,
    pub written: usize,
    pub dropped: usize,
}

/// Outcome of closing every output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Maps subscription handles to their symbol and output.
///
/// The recorder is the only owner of the outputs. Bars reach it through [Recorder::dispatch],
/// called from a single consumer, so appends for different symbols never interleave.
#[derive(Default)]
pub struct Recorder {
    routes: BTreeMap<SubscriptionHandle, Route>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the output of a new subscription. A handle can only be registered once.
    pub fn register(&mut self, handle: SubscriptionHandle, symbol: Symbol, sink: Box<dyn RecordSink>) -> Result<(), Error> {
        if self.routes.contains_key(&handle) {
            return Err(Error::Simple(format!("subscription {handle} is already registered")));
        }
        self.routes.insert(handle, Route::new(symbol, sink));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route(&self, handle: SubscriptionHandle) -> Option<&Route> {
        self.routes.get(&handle)
    }

    /// Subscriptions still delivering bars.
    pub fn streaming(&self) -> usize {
        self.routes.values().filter(|route| route.streaming).count()
    }

    /// Handles one event from the gateway. Never fails; errors are logged.
    pub fn dispatch(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Bar { handle, bar } => {
                if let Err(err) = self.push_bar(handle, bar) {
                    error!("error processing bar data: {err}");
                    return;
                }
                self.on_bar(handle, true);
            }
            FeedEvent::Closed { handle, reason } => self.on_closed(handle, reason),
        }
    }

    /// Appends `bar` to the bar history of `handle`.
    pub fn push_bar(&mut self, handle: SubscriptionHandle, bar: Bar) -> Result<(), Error> {
        let route = self.routes.get_mut(&handle).ok_or(Error::UnknownSubscription(handle))?;
        route.bars.push(bar);
        Ok(())
    }

    /// Writes the most recent bar of `handle` to its output when `has_new_bar` is set.
    ///
    /// Errors are logged and the bar is dropped; they never reach the caller.
    pub fn on_bar(&mut self, handle: SubscriptionHandle, has_new_bar: bool) {
        if !has_new_bar {
            return;
        }

        let Some(route) = self.routes.get_mut(&handle) else {
            error!("error processing bar data: {}", Error::UnknownSubscription(handle));
            return;
        };

        match route.write_latest(handle) {
            Ok(()) => route.written += 1,
            Err(err) => {
                route.dropped += 1;
                error!("error processing bar data for {}: {err}", route.symbol);
            }
        }
    }

    fn on_closed(&mut self, handle: SubscriptionHandle, reason: Option<String>) {
        match self.routes.get_mut(&handle) {
            Some(route) => {
                route.streaming = false;
                match reason {
                    Some(reason) => warn!("stream for {} ended: {reason}", route.symbol),
                    None => warn!("stream for {} ended", route.symbol),
                }
            }
            None => warn!("stream ended for unknown subscription {handle}"),
        }
    }

    /// Attempts to close every output, including after earlier failures.
    pub fn close_all(&mut self) -> CloseReport {
        let mut report = CloseReport::default();

        for route in self.routes.values_mut() {
            if route.sink.is_closed() {
                continue;
            }

            report.attempted += 1;
            if let Err(err) = route.sink.close() {
                report.failed += 1;
                warn!("ignoring error closing output for {}: {err}", route.symbol);
            }
        }

        report
    }

    pub fn stats(&self) -> Vec<SymbolStats> {
        self.routes
            .values()
            .map(|route| SymbolStats {
                symbol: route.symbol.clone(),
                written: route.written,
                dropped: route.dropped,
            })
            .collect()
    }

    /// Total bars written across all symbols.
    pub fn written(&self) -> usize {
        self.routes.values().map(|route| route.written).sum()
    }

    /// Total bars dropped across all symbols.
    pub fn dropped(&self) -> usize {
        self.routes.values().map(|route| route.dropped).sum()
    }

    pub(crate) fn log_summary(&self) {
        info!("wrote {} bars for {} symbols ({} dropped)", self.written(), self.len(), self.dropped());
        for stats in self.stats().iter().filter(|stats| stats.dropped > 0) {
            info!("{}: {} written, {} dropped", stats.symbol, stats.written, stats.dropped);
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn describe(bar: &Bar) -> String {
    let timestamp = format_timestamp(&bar.timestamp).unwrap_or_else(|_| bar.timestamp.to_string());
    format!(
        "{timestamp} - O:{} H:{} L:{} C:{} V:{}",
        bar.open, bar.high, bar.low, bar.close, bar.volume
    )
}

#[cfg(test)]
mod tests;
