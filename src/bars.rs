use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::Error;

/// Number of bars retained per subscription. Ten minutes of 5-second bars.
pub const BAR_HISTORY_LIMIT: usize = 120;

/// Column header of every output file.
pub const HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Represents a real-time bar with OHLCV data
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    /// Start of the 5-second interval
    pub timestamp: OffsetDateTime,
    /// Opening price during the bar period
    pub open: f64,
    /// Highest price during the bar period
    pub high: f64,
    /// Lowest price during the bar period
    pub low: f64,
    /// Closing price of the bar period
    pub close: f64,
    /// Total volume traded during the bar period
    pub volume: f64,
}

impl Bar {
    /// Fields in output column order.
    pub fn to_record(&self) -> Result<[String; 6], Error> {
        Ok([
            format_timestamp(&self.timestamp)?,
            format_number(self.open),
            format_number(self.high),
            format_number(self.low),
            format_number(self.close),
            format_number(self.volume),
        ])
    }
}

/// Formats a price or volume with at least one decimal place, `171.0` rather than `171`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

impl From<ibapi::market_data::realtime::Bar> for Bar {
    fn from(bar: ibapi::market_data::realtime::Bar) -> Self {
        Bar {
            timestamp: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// Formats a bar timestamp as `2024-03-08 14:30:05+00:00`.
pub fn format_timestamp(timestamp: &OffsetDateTime) -> Result<String, Error> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]");
    Ok(timestamp.format(&format)?)
}

/// Recent bars of one subscription. The last element is the most recent.
#[derive(Debug, Default)]
pub struct BarHistory {
    bars: VecDeque<Bar>,
}

impl BarHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() == BAR_HISTORY_LIMIT {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
