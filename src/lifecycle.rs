use std::fmt;

use log::debug;

use crate::Error;

/// Stages of a recording run. A run only ever moves forward through these states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamState {
    #[default]
    Unconnected,
    Connected,
    Streaming,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Unconnected => "UNCONNECTED",
            StreamState::Connected => "CONNECTED",
            StreamState::Streaming => "STREAMING",
            StreamState::ShuttingDown => "SHUTTING_DOWN",
            StreamState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Tracks the current [StreamState] and rejects backward or repeated transitions.
///
/// States may be skipped: a run that fails during setup goes from `CONNECTED` straight to
/// `SHUTTING_DOWN`.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: StreamState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn advance(&mut self, next: StreamState) -> Result<(), Error> {
        if next <= self.state {
            return Err(Error::InvalidTransition(self.state.to_string(), next.to_string()));
        }

        debug!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}
