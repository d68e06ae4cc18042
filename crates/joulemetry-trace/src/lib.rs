//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! The trace pipeline: CSV wire format, streaming reader, and per-series
//! rate statistics.
//!
//! A trace is a CSV stream whose first two columns are sample start and end
//! timestamps in UNIX nanoseconds, followed by one column per sensor titled
//! `"<name> (<unit>)"`. Watt columns are followed by a derived
//! `"integrated <name> (J)"` column. Readers recognise series columns by
//! their `(J)` / `(W)` suffix and tolerate empty cells.

use joulemetry_sensors::Unit;
use thiserror::Error;

pub mod dataset;
pub mod line_reader;
pub mod reader;
pub mod series;
pub mod session;
pub mod writer;

pub use dataset::Dataset;
pub use line_reader::LineReader;
pub use reader::{stream_path, SeriesInfo, TraceEvent, TraceReader};
pub use series::{RateWindow, Series};
pub use session::{
    benchmark_file_for, generate_session_id, session_file_for, SessionRecorder,
};
pub use writer::{SensorColumn, TraceWriter};

/// Result alias used throughout the trace crate.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Error type for the trace pipeline.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Wrapper for IO errors on the underlying stream or file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for malformed CSV encountered mid-stream.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// The stream ended before a header row arrived.
    #[error("trace ended before a header row")]
    MissingHeader,
    /// A sample referenced a series id the dataset has never seen.
    #[error("unknown series id {0}")]
    UnknownSeries(u32),
    /// A row carried a different number of values than the writer schema.
    #[error("row has {got} values but the schema has {expected} columns")]
    ColumnCount { expected: usize, got: usize },
    /// Wrapper for filesystem watch failures in follow mode.
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// One measurement attributed to a series over a time interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub start_ns: i64,
    pub end_ns: i64,
    pub series: u32,
    pub value: f64,
    pub unit: Unit,
}
