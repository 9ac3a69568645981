use std::path::PathBuf;

use clap::{arg, value_parser, ArgMatches, Command};
use log::{error, info};
use time::OffsetDateTime;

use candlestream::symbols::parse_symbols;
use candlestream::{Config, Error, ShutdownSignal};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new().filter_level(log::LevelFilter::Info).parse_default_env().init();

    let matches = Command::new("candlestream")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Records real-time 5-second bars from Interactive Brokers to CSV files")
        .arg(arg!(--host <HOST> "TWS or IB Gateway host [env: IB_HOST]"))
        .arg(arg!(--port <PORT> "TWS or IB Gateway port [env: IB_PORT]").value_parser(value_parser!(u16)))
        .arg(arg!(--"client-id" <ID> "API client ID [env: IB_CLIENT_ID]").value_parser(value_parser!(i32)))
        .arg(arg!(--"output-dir" <DIR> "directory for the CSV files [env: OUTPUT_DIR]").value_parser(value_parser!(PathBuf)))
        .arg(arg!(--symbols <SYMBOLS> "comma separated tickers to stream [env: IB_SYMBOLS]"))
        .get_matches();

    let config = configure(&matches).inspect_err(|err| error!("invalid configuration: {err}"))?;

    info!("{}", "=".repeat(60));
    info!("Interactive Brokers Real-Time Data Streamer");
    info!("{}", "=".repeat(60));
    info!("start time: {}", OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()));

    let signal = ShutdownSignal::new();
    signal.install()?;

    let summary = candlestream::run(&config, &signal).inspect_err(|err| error!("{err}"))?;
    info!("stopped ({:?}) after writing {} bars", summary.stop_reason, summary.written());

    Ok(())
}

/// Environment settings with command line overrides applied.
fn configure(matches: &ArgMatches) -> Result<Config, Error> {
    let mut config = Config::from_env()?;

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(client_id) = matches.get_one::<i32>("client-id") {
        config.client_id = *client_id;
    }
    if let Some(output_dir) = matches.get_one::<PathBuf>("output-dir") {
        config.output_dir = output_dir.clone();
    }
    if let Some(symbols) = matches.get_one::<String>("symbols") {
        config.symbols = parse_symbols(symbols);
    }

    Ok(config)
}
