use std::cell::RefCell;
use std::rc::Rc;

use time::macros::datetime;
use time::Duration;

use super::*;

#[derive(Debug, Default)]
struct SinkLog {
    records: Vec<Bar>,
    close_calls: usize,
}

/// Records appended bars in memory. Can be told to fail writes or closes.
struct MemorySink {
    symbol: &'static str,
    log: Rc<RefCell<SinkLog>>,
    fail_append: bool,
    fail_close: bool,
    closed: bool,
}

impl MemorySink {
    fn new(symbol: &'static str) -> (Self, Rc<RefCell<SinkLog>>) {
        let log = Rc::new(RefCell::new(SinkLog::default()));
        let sink = MemorySink {
            symbol,
            log: log.clone(),
            fail_append: false,
            fail_close: false,
            closed: false,
        };
        (sink, log)
    }

    fn failing_append(mut self) -> Self {
        self.fail_append = true;
        self
    }

    fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, bar: &Bar) -> Result<(), Error> {
        if self.fail_append {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        }
        if self.closed {
            return Err(Error::SinkClosed(self.symbol.to_owned()));
        }
        self.log.borrow_mut().records.push(bar.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.log.borrow_mut().close_calls += 1;
        if self.fail_close {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "close failed")));
        }
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

fn symbol(value: &str) -> Symbol {
    Symbol::new(value).unwrap()
}

fn bar(seconds: i64, close: f64) -> Bar {
    Bar {
        timestamp: datetime!(2024-03-08 14:30:00 UTC) + Duration::seconds(seconds),
        open: 100.0,
        high: 101.0,
        low: 99.0,
        close,
        volume: 42.0,
    }
}

#[test]
fn test_register_rejects_duplicate_handle() {
    let mut recorder = Recorder::new();
    let (first, _) = MemorySink::new("AAPL");
    let (second, _) = MemorySink::new("MSFT");

    recorder.register(0, symbol("AAPL"), Box::new(first)).unwrap();
    let result = recorder.register(0, symbol("MSFT"), Box::new(second));

    assert!(result.is_err());
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.route(0).unwrap().symbol().as_str(), "AAPL");
}

#[test]
fn test_bars_are_written_in_arrival_order() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();

    for i in 0..3 {
        recorder.dispatch(FeedEvent::Bar {
            handle: 0,
            bar: bar(i * 5, 100.0 + i as f64),
        });
    }

    let records = &log.borrow().records;
    assert_eq!(records.len(), 3);
    assert_eq!(records.iter().map(|bar| bar.close).collect::<Vec<_>>(), vec![100.0, 101.0, 102.0]);
    assert_eq!(recorder.route(0).unwrap().written(), 3);
}

#[test]
fn test_no_new_bar_is_a_no_op() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();
    recorder.push_bar(0, bar(0, 100.0)).unwrap();

    recorder.on_bar(0, false);
    recorder.on_bar(0, false);

    assert!(log.borrow().records.is_empty());
    assert_eq!(recorder.written(), 0);
}

#[test]
fn test_on_bar_writes_most_recent_bar() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();

    recorder.push_bar(0, bar(0, 100.0)).unwrap();
    recorder.push_bar(0, bar(5, 100.5)).unwrap();
    recorder.on_bar(0, true);

    assert_eq!(log.borrow().records, vec![bar(5, 100.5)]);
    assert_eq!(recorder.route(0).unwrap().written(), 1);
}

#[test]
fn test_on_bar_without_bars_is_dropped() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();

    recorder.on_bar(0, true);

    assert!(log.borrow().records.is_empty());
    assert_eq!(recorder.route(0).unwrap().dropped(), 1);
}

#[test]
fn test_unknown_subscription_does_not_panic() {
    let mut recorder = Recorder::new();

    recorder.dispatch(FeedEvent::Bar { handle: 9, bar: bar(0, 1.0) });
    recorder.on_bar(9, true);
    recorder.dispatch(FeedEvent::Closed { handle: 9, reason: None });

    assert!(recorder.is_empty());
    assert!(matches!(recorder.push_bar(9, bar(0, 1.0)), Err(Error::UnknownSubscription(9))));
}

#[test]
fn test_failing_write_does_not_affect_other_symbols() {
    let mut recorder = Recorder::new();
    let (aapl, aapl_log) = MemorySink::new("AAPL");
    let (msft, msft_log) = MemorySink::new("MSFT");
    recorder.register(0, symbol("AAPL"), Box::new(aapl.failing_append())).unwrap();
    recorder.register(1, symbol("MSFT"), Box::new(msft)).unwrap();

    recorder.dispatch(FeedEvent::Bar { handle: 0, bar: bar(0, 1.0) });
    recorder.dispatch(FeedEvent::Bar { handle: 1, bar: bar(0, 2.0) });
    recorder.dispatch(FeedEvent::Bar { handle: 0, bar: bar(5, 1.5) });
    recorder.dispatch(FeedEvent::Bar { handle: 1, bar: bar(5, 2.5) });

    assert!(aapl_log.borrow().records.is_empty());
    assert_eq!(msft_log.borrow().records, vec![bar(0, 2.0), bar(5, 2.5)]);

    let stats = recorder.stats();
    assert_eq!(
        stats,
        vec![
            SymbolStats {
                symbol: symbol("AAPL"),
                written: 0,
                dropped: 2
            },
            SymbolStats {
                symbol: symbol("MSFT"),
                written: 2,
                dropped: 0
            },
        ]
    );
}

#[test]
fn test_closed_stream_stops_streaming_but_keeps_output_open() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();

    recorder.dispatch(FeedEvent::Closed {
        handle: 0,
        reason: Some("No market data permissions".to_owned()),
    });

    let route = recorder.route(0).unwrap();
    assert!(!route.is_streaming());
    assert!(!route.is_closed());
    assert_eq!(recorder.streaming(), 0);
    assert_eq!(log.borrow().close_calls, 0);
}

#[test]
fn test_close_all_attempts_every_output() {
    let mut recorder = Recorder::new();
    let (aapl, aapl_log) = MemorySink::new("AAPL");
    let (msft, msft_log) = MemorySink::new("MSFT");
    let (spy, spy_log) = MemorySink::new("SPY");
    recorder.register(0, symbol("AAPL"), Box::new(aapl)).unwrap();
    recorder.register(1, symbol("MSFT"), Box::new(msft.failing_close())).unwrap();
    recorder.register(2, symbol("SPY"), Box::new(spy)).unwrap();

    let report = recorder.close_all();

    assert_eq!(report, CloseReport { attempted: 3, failed: 1 });
    assert_eq!(aapl_log.borrow().close_calls, 1);
    assert_eq!(msft_log.borrow().close_calls, 1);
    assert_eq!(spy_log.borrow().close_calls, 1);
}

#[test]
fn test_close_all_skips_closed_outputs() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();

    recorder.close_all();
    let report = recorder.close_all();

    assert_eq!(report, CloseReport::default());
    assert_eq!(log.borrow().close_calls, 1);
}

#[test]
fn test_drop_closes_outputs() {
    let (sink, log) = MemorySink::new("AAPL");
    {
        let mut recorder = Recorder::new();
        recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();
    }

    assert_eq!(log.borrow().close_calls, 1);
}

#[test]
fn test_bar_after_close_is_dropped() {
    let mut recorder = Recorder::new();
    let (sink, log) = MemorySink::new("AAPL");
    recorder.register(0, symbol("AAPL"), Box::new(sink)).unwrap();
    recorder.close_all();

    recorder.dispatch(FeedEvent::Bar { handle: 0, bar: bar(0, 1.0) });

    assert!(log.borrow().records.is_empty());
    assert_eq!(recorder.dropped(), 1);
}
