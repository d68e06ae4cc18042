//! ---
//! jm_section: "04-benchmark-harness"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Benchmark orchestration, baseline correction, and the versioned store."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use joulemetry_common::version::Version;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{BenchError, Result};

/// One benchmark as recorded against a session trace.
///
/// The four timestamps bound the pre-baseline and post-baseline sections
/// on the trace's own clock; the run section is the gap between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub benchmark_id: Uuid,
    pub session_id: String,
    pub command: String,
    pub notes: String,
    pub pre_baseline_start_ns: i64,
    pub pre_baseline_end_ns: i64,
    pub post_baseline_start_ns: i64,
    pub post_baseline_end_ns: i64,
    /// Failure reported by the workload, if any. The record is kept
    /// either way so the energy cost of the failure stays visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchmarkRecord {
    /// Wall-clock length of the run section.
    #[must_use]
    pub fn run_duration(&self) -> Duration {
        let nanos = (self.post_baseline_start_ns - self.pre_baseline_end_ns).max(0);
        Duration::from_nanos(nanos as u64)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreEnvelope {
    version: Version,
    records: Vec<BenchmarkRecord>,
}

/// JSON-backed store of the benchmarks recorded against one session.
///
/// The envelope carries the writing build's version. Loading refuses
/// stores from another major version; a store written by a newer build
/// of the same major loads with a warning. Unparsable stores are moved
/// aside rather than overwritten.
#[derive(Debug)]
pub struct BenchmarkStore {
    path: PathBuf,
    records: Vec<BenchmarkRecord>,
}

impl BenchmarkStore {
    /// Open the store at `path`, treating a missing file as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    records: Vec::new(),
                });
            }
            Err(source) => return Err(BenchError::Io { path, source }),
        };
        let envelope: StoreEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                // Keep the unreadable file for inspection and start over.
                let quarantine = with_suffix(&path, ".corrupt");
                warn!(
                    path = %path.display(),
                    quarantine = %quarantine.display(),
                    %error,
                    "benchmark store unreadable, moving it aside"
                );
                fs::rename(&path, &quarantine).map_err(|source| BenchError::Io {
                    path: path.clone(),
                    source,
                })?;
                return Ok(Self {
                    path,
                    records: Vec::new(),
                });
            }
        };

        let current = Version::CURRENT;
        if !envelope.version.is_compatible_with(&current) {
            return Err(BenchError::IncompatibleStore {
                path,
                found: envelope.version,
                current,
            });
        }
        if envelope.version > current {
            warn!(
                store = %envelope.version,
                running = %current,
                "benchmark store written by a newer build"
            );
        }
        Ok(Self {
            path,
            records: envelope.records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[BenchmarkRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record and rewrite the store.
    pub fn append(&mut self, record: BenchmarkRecord) -> Result<()> {
        self.records.push(record);
        self.rewrite()
    }

    /// Rewrite the whole store. The previous file is parked as `.old`
    /// until the new contents are safely on disk, so a failed write
    /// never leaves the store empty.
    fn rewrite(&self) -> Result<()> {
        let backup = with_suffix(&self.path, ".old");
        let had_previous = self.path.exists();
        if had_previous {
            fs::rename(&self.path, &backup).map_err(|source| BenchError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        let envelope = StoreEnvelope {
            version: Version::CURRENT,
            records: self.records.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&envelope).map_err(BenchError::Encode)?;
        fs::write(&self.path, encoded).map_err(|source| BenchError::Io {
            path: self.path.clone(),
            source,
        })?;
        if had_previous {
            let _ = fs::remove_file(&backup);
        }
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
