//! The recording run: connect, subscribe, stream until told to stop, shut down.

use std::fs;

use crossbeam::channel::{self, select, Receiver};
use log::{info, warn};

use crate::config::Config;
use crate::gateway::{FeedEvent, Gateway, IbGateway};
use crate::lifecycle::{Lifecycle, StreamState};
use crate::recorder::{Recorder, SymbolStats};
use crate::setup::subscribe_all;
use crate::shutdown::{shutdown, ShutdownReport, ShutdownSignal};
use crate::sink::{OutputDir, RecordSink};
use crate::symbols::Symbol;
use crate::Error;

/// Why the event loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown signal fired.
    Signal,
    /// Every bar stream ended.
    StreamsEnded,
}

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub subscribed: usize,
    pub failed: usize,
    pub stop_reason: StopReason,
    pub stats: Vec<SymbolStats>,
    pub shutdown: ShutdownReport,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.stats.iter().map(|stats| stats.written).sum()
    }
}

/// Connects to IB using `config` and records bars until `signal` fires.
///
/// Returns an error for fatal startup failures: the connection cannot be established, the
/// output directory cannot be created or no symbol could be subscribed.
pub fn run(config: &Config, signal: &ShutdownSignal) -> Result<RunSummary, Error> {
    let endpoint = config.endpoint();
    info!("connecting to IB at {endpoint}");

    let mut gateway = IbGateway::connect(&endpoint)?;
    run_with(&mut gateway, config, signal)
}

/// Records bars from an already connected `gateway`.
pub fn run_with<G: Gateway + ?Sized>(gateway: &mut G, config: &Config, signal: &ShutdownSignal) -> Result<RunSummary, Error> {
    let mut lifecycle = Lifecycle::new();
    lifecycle.advance(StreamState::Connected)?;

    let output = OutputDir::new(&config.output_dir);
    if let Err(err) = output.create() {
        lifecycle.advance(StreamState::ShuttingDown)?;
        disconnect_quietly(gateway);
        return Err(err);
    }
    info!("output directory: {}", absolute(&output));

    let (events, feed) = channel::unbounded();
    let open_sink = |symbol: &Symbol| output.open(symbol).map(|sink| Box::new(sink) as Box<dyn RecordSink>);

    let (mut recorder, failures) = match subscribe_all(gateway, &config.symbols, open_sink, &events) {
        Ok(subscribed) => subscribed,
        Err(err) => {
            lifecycle.advance(StreamState::ShuttingDown)?;
            disconnect_quietly(gateway);
            return Err(err);
        }
    };
    // Forwarders hold the remaining senders; the feed disconnects once all of them are gone.
    drop(events);

    lifecycle.advance(StreamState::Streaming)?;
    info!("streaming 5-second bars for {} tickers", recorder.len());
    info!("press Ctrl+C to stop.");

    let stop_reason = event_loop(&mut recorder, &feed, signal);

    lifecycle.advance(StreamState::ShuttingDown)?;
    let report = shutdown(&mut recorder, gateway);
    recorder.log_summary();
    lifecycle.advance(StreamState::Terminated)?;

    Ok(RunSummary {
        subscribed: recorder.len(),
        failed: failures.len(),
        stop_reason,
        stats: recorder.stats(),
        shutdown: report,
    })
}

/// Dispatches feed events to `recorder` until the signal fires or every stream has ended.
///
/// Events already queued when the signal fires are still dispatched.
pub fn event_loop(recorder: &mut Recorder, feed: &Receiver<FeedEvent>, signal: &ShutdownSignal) -> StopReason {
    loop {
        select! {
            recv(signal.receiver()) -> _ => {
                for event in feed.try_iter() {
                    recorder.dispatch(event);
                }
                return StopReason::Signal;
            }
            recv(feed) -> event => match event {
                Ok(event) => recorder.dispatch(event),
                Err(_) => {
                    warn!("all bar streams have ended");
                    return StopReason::StreamsEnded;
                }
            }
        }
    }
}

fn disconnect_quietly<G: Gateway + ?Sized>(gateway: &mut G) {
    if let Err(err) = gateway.disconnect() {
        warn!("ignoring error disconnecting: {err}");
    }
}

fn absolute(output: &OutputDir) -> String {
    fs::canonicalize(output.path())
        .unwrap_or_else(|_| output.path().to_path_buf())
        .display()
        .to_string()
}
