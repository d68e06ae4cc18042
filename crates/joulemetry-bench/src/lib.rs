//! ---
//! jm_section: "04-benchmark-harness"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Benchmark orchestration, baseline correction, and the versioned store."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! Benchmark harness: runs a workload under a live sampler, brackets it
//! with idle baselines, and reports baseline-corrected energy figures.
//!
//! A benchmark is four consecutive wall-clock sections: pre-baseline,
//! run, post-baseline, and a derived adjusted section where the mean of
//! the two baselines is subtracted from the run. Records persist in a
//! per-session JSON store stamped with the writing build's version.

use std::io;
use std::path::PathBuf;

use joulemetry_common::version::Version;
use joulemetry_trace::TraceError;
use thiserror::Error;

pub mod results;
pub mod runner;
pub mod store;

pub use results::{BenchmarkResults, SectionStats, SeriesResults};
pub use runner::{run_benchmark, BenchmarkPlan, BenchmarkSummary};
pub use store::{BenchmarkRecord, BenchmarkStore};

/// Convenience alias for benchmark results.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors raised by the benchmark harness.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Reading or writing a benchmark store file failed.
    #[error("benchmark store i/o failure at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Records could not be encoded for persistence.
    #[error("failed to encode benchmark records")]
    Encode(#[source] serde_json::Error),
    /// The store on disk was written by an incompatible build.
    #[error("benchmark store {path} was written by version {found}, this build reads major {current}")]
    IncompatibleStore {
        path: PathBuf,
        found: Version,
        current: Version,
    },
    /// The sampler executable could not be started.
    #[error("failed to launch sampler `{command}`")]
    Sampler {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The workload command could not be started.
    #[error("failed to run workload `{command}`")]
    Workload {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The trace pipeline rejected the sampler's output.
    #[error("trace pipeline failure")]
    Trace(#[from] TraceError),
    /// The sampler exited without producing any trace data.
    #[error("the sampler produced no trace data")]
    NoTraceData,
    /// The thread recording the sampler's trace panicked.
    #[error("trace recorder thread panicked")]
    RecorderPanicked,
    /// The recorded trace does not cover every benchmark section.
    #[error("not enough samples to summarize every benchmark section")]
    InsufficientSamples,
}
