use crate::gateway::SubscriptionHandle;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    // Errors from external libraries
    Io(std::io::Error),
    Csv(csv::Error),
    FormatTime(time::error::Format),
    Gateway(String),

    // Errors raised by candlestream
    Config(String, String),
    ConnectionFailed(String, String),
    OutputDirectory(String, std::io::Error),
    NoSubscriptions,
    UnknownSubscription(SubscriptionHandle),
    NoBars(SubscriptionHandle),
    SinkClosed(String),
    InvalidTransition(String, String),
    Signal(String),
    Simple(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(ref err) => err.fmt(f),
            Error::Csv(ref err) => err.fmt(f),
            Error::FormatTime(ref err) => err.fmt(f),
            Error::Gateway(ref err) => write!(f, "gateway error: {err}"),

            Error::Config(name, message) => write!(f, "invalid configuration for {name}: {message}"),
            Error::ConnectionFailed(address, message) => write!(f, "failed to connect to {address}: {message}"),
            Error::OutputDirectory(path, err) => write!(f, "failed to create output directory {path}: {err}"),
            Error::NoSubscriptions => write!(f, "no successful streaming setups"),
            Error::UnknownSubscription(handle) => write!(f, "no output registered for subscription {handle}"),
            Error::NoBars(handle) => write!(f, "subscription {handle} has no bars"),
            Error::SinkClosed(symbol) => write!(f, "output for {symbol} is already closed"),
            Error::InvalidTransition(from, to) => write!(f, "invalid state transition: {from} -> {to}"),
            Error::Signal(err) => write!(f, "failed to install signal handler: {err}"),

            Error::Simple(ref err) => write!(f, "error occurred: {err}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Error {
        Error::Csv(err)
    }
}

impl From<time::error::Format> for Error {
    fn from(err: time::error::Format) -> Error {
        Error::FormatTime(err)
    }
}

impl From<ibapi::Error> for Error {
    fn from(err: ibapi::Error) -> Error {
        Error::Gateway(err.to_string())
    }
}

impl From<ctrlc::Error> for Error {
    fn from(err: ctrlc::Error) -> Error {
        Error::Signal(err.to_string())
    }
}
