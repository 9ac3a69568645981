//! Append-only per-symbol output files.
//!
//! Each subscribed symbol owns one CSV file, `<output_dir>/<SYMBOL>.csv`. The file is opened
//! in append mode so data from previous runs is preserved; the header row is written only when
//! the file is empty. Every record is flushed as soon as it is written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::bars::{Bar, HEADER};
use crate::symbols::Symbol;
use crate::Error;

/// File extension of the per-symbol output files.
pub const EXTENSION: &str = "csv";

/// Destination for the bars of one symbol.
pub trait RecordSink {
    /// Appends `bar` and flushes it to the underlying resource.
    fn append(&mut self, bar: &Bar) -> Result<(), Error>;

    /// Releases the underlying resource. Calling `close` more than once is harmless.
    fn close(&mut self) -> Result<(), Error>;

    fn is_closed(&self) -> bool;
}

/// The directory holding all output files.
#[derive(Clone, Debug)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Creates the directory, and any missing parents, if it does not exist.
    pub fn create(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.path).map_err(|err| Error::OutputDirectory(self.path.display().to_string(), err))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the output file for `symbol`.
    pub fn file_for(&self, symbol: &Symbol) -> PathBuf {
        self.path.join(format!("{}.{EXTENSION}", symbol.as_str()))
    }

    /// Opens the output file for `symbol` in append mode.
    pub fn open(&self, symbol: &Symbol) -> Result<CsvSink, Error> {
        CsvSink::open(symbol.clone(), self.file_for(symbol))
    }
}

/// A CSV output with a `timestamp,open,high,low,close,volume` header.
///
/// Records are encoded one at a time and written with a single `write_all`, so a failed append
/// leaves nothing buffered to resurface with the next bar.
pub struct CsvSink<W: Write = File> {
    symbol: Symbol,
    output: Option<W>,
}

impl CsvSink<File> {
    /// Opens `path` in append mode, writing the header if the file is empty.
    pub fn open(symbol: Symbol, path: PathBuf) -> Result<Self, Error> {
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        if file.metadata()?.len() == 0 {
            debug!("writing header to {}", path.display());
            file.write_all(&encode(HEADER)?)?;
            file.flush()?;
        }

        Ok(CsvSink::new(symbol, file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wraps an already positioned output. No header is written.
    pub fn new(symbol: Symbol, output: W) -> Self {
        Self {
            symbol,
            output: Some(output),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn append(&mut self, bar: &Bar) -> Result<(), Error> {
        let record = encode(&bar.to_record()?)?;

        let output = self.output.as_mut().ok_or_else(|| Error::SinkClosed(self.symbol.to_string()))?;
        output.write_all(&record)?;
        output.flush()?;

        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(mut output) = self.output.take() {
            output.flush()?;
            debug!("closed output for {}", self.symbol);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.output.is_none()
    }
}

// One CSV line, terminator included.
fn encode<I, T>(record: I) -> Result<Vec<u8>, Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(record)?;
    writer
        .into_inner()
        .map_err(|err| Error::Io(io::Error::new(err.error().kind(), err.to_string())))
}
