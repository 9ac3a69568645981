//! Termination handling.
//!
//! Signals do not run any cleanup themselves. The handler installed by [ShutdownSignal::install]
//! only triggers the signal; the event loop observes it through [ShutdownSignal::receiver] and
//! then runs [shutdown] on the main thread.

use crossbeam::channel::{self, Receiver, Sender};
use log::{info, warn};

use crate::gateway::Gateway;
use crate::recorder::{CloseReport, Recorder};
use crate::Error;

/// Cancellation token fired on SIGINT or SIGTERM.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        let (sender, receiver) = channel::bounded(1);
        Self { sender, receiver }
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the signal from SIGINT and SIGTERM.
    ///
    /// Can only be installed once per process.
    pub fn install(&self) -> Result<(), Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            info!("received termination signal, shutting down...");
            signal.trigger();
        })?;
        Ok(())
    }

    /// Requests shutdown. Never blocks; repeated triggers are ignored.
    pub fn trigger(&self) {
        let _ = self.sender.try_send(());
    }

    /// Becomes ready once the signal is triggered.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

/// What happened while shutting down.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub closed: CloseReport,
    pub disconnect_failed: bool,
}

impl ShutdownReport {
    /// Number of errors ignored during shutdown.
    pub fn suppressed(&self) -> usize {
        self.closed.failed + usize::from(self.disconnect_failed)
    }
}

/// Closes every output and then disconnects. Errors are logged and otherwise ignored, so every
/// step is always attempted.
pub fn shutdown<G: Gateway + ?Sized>(recorder: &mut Recorder, gateway: &mut G) -> ShutdownReport {
    let closed = recorder.close_all();

    let disconnect_failed = match gateway.disconnect() {
        Ok(()) => false,
        Err(err) => {
            warn!("ignoring error disconnecting: {err}");
            true
        }
    };

    let report = ShutdownReport { closed, disconnect_failed };
    if report.suppressed() > 0 {
        warn!("shutdown completed with {} suppressed error(s)", report.suppressed());
    } else {
        info!("shutdown complete.");
    }

    report
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crossbeam::channel::Sender;

    use super::*;
    use crate::bars::Bar;
    use crate::gateway::{FeedEvent, SubscriptionHandle};
    use crate::sink::RecordSink;
    use crate::symbols::Symbol;

    struct FakeGateway {
        fail: bool,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Gateway for FakeGateway {
        fn subscribe_bars(&mut self, _symbol: &Symbol, _handle: SubscriptionHandle, _events: Sender<FeedEvent>) -> Result<(), Error> {
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), Error> {
            self.calls.borrow_mut().push("disconnect");
            if self.fail {
                return Err(Error::Gateway("socket already closed".to_owned()));
            }
            Ok(())
        }
    }

    struct FakeSink {
        name: &'static str,
        fail: bool,
        closed: bool,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl RecordSink for FakeSink {
        fn append(&mut self, _bar: &Bar) -> Result<(), Error> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), Error> {
            self.calls.borrow_mut().push(self.name);
            if self.fail {
                return Err(Error::Simple("close failed".to_owned()));
            }
            self.closed = true;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn recorder(calls: &Rc<RefCell<Vec<&'static str>>>, sinks: &[(&'static str, bool)]) -> Recorder {
        let mut recorder = Recorder::new();
        for (handle, &(name, fail)) in sinks.iter().enumerate() {
            let sink = FakeSink {
                name,
                fail,
                closed: false,
                calls: calls.clone(),
            };
            recorder.register(handle, Symbol::new(name).unwrap(), Box::new(sink)).unwrap();
        }
        recorder
    }

    #[test]
    fn test_signal_trigger() {
        let signal = ShutdownSignal::new();
        assert!(signal.receiver().try_recv().is_err());

        signal.clone().trigger();
        signal.trigger();

        assert!(signal.receiver().try_recv().is_ok());
        assert!(signal.receiver().try_recv().is_err());
    }

    #[test]
    fn test_outputs_closed_before_disconnect() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder(&calls, &[("AAPL", false), ("MSFT", false)]);
        let mut gateway = FakeGateway {
            fail: false,
            calls: calls.clone(),
        };

        let report = shutdown(&mut recorder, &mut gateway);

        assert_eq!(*calls.borrow(), vec!["AAPL", "MSFT", "disconnect"]);
        assert_eq!(report.suppressed(), 0);
    }

    #[test]
    fn test_failing_close_does_not_stop_shutdown() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder(&calls, &[("AAPL", true), ("MSFT", false)]);
        let mut gateway = FakeGateway {
            fail: false,
            calls: calls.clone(),
        };

        let report = shutdown(&mut recorder, &mut gateway);

        assert_eq!(*calls.borrow(), vec!["AAPL", "MSFT", "disconnect"]);
        assert_eq!(report.closed, CloseReport { attempted: 2, failed: 1 });
        assert!(!report.disconnect_failed);
    }

    #[test]
    fn test_failing_disconnect_is_suppressed() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut recorder = recorder(&calls, &[("AAPL", false)]);
        let mut gateway = FakeGateway {
            fail: true,
            calls: calls.clone(),
        };

        let report = shutdown(&mut recorder, &mut gateway);

        assert!(report.disconnect_failed);
        assert_eq!(report.suppressed(), 1);
    }
}
