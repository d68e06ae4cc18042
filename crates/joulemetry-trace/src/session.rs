//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::dataset::Dataset;
use crate::reader::{SeriesInfo, TraceEvent};
use crate::{Result, Sample};

/// Compact UTC timestamp naming one recording session, nanosecond
/// precision.
#[must_use]
pub fn generate_session_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S%f").to_string()
}

/// Path of the trace recorded for a session.
#[must_use]
pub fn session_file_for(directory: &Path, session_id: &str) -> PathBuf {
    directory.join(format!("joulemetry-{session_id}.csv"))
}

/// Path of the benchmark store attached to a session.
#[must_use]
pub fn benchmark_file_for(directory: &Path, session_id: &str) -> PathBuf {
    directory.join(format!("joulemetry-{session_id}-benchmarks.json"))
}

/// Re-records a live trace stream into a session file while populating a
/// dataset for concurrent analysis.
///
/// A headings event opens a fresh session file carrying the announced
/// headings verbatim. Samples append one sparse row each: both
/// timestamps plus the single column the sample belongs to, every other
/// cell left blank.
pub struct SessionRecorder {
    directory: PathBuf,
    dataset: Arc<Dataset>,
    session_id: Option<String>,
    writer: Option<csv::Writer<File>>,
    columns: HashMap<u32, usize>,
    headings: Vec<String>,
}

impl SessionRecorder {
    pub fn new(directory: impl Into<PathBuf>, dataset: Arc<Dataset>) -> Self {
        Self {
            directory: directory.into(),
            dataset,
            session_id: None,
            writer: None,
            columns: HashMap::new(),
            headings: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Feed one reader event through the recorder.
    pub fn on_event(&mut self, event: &TraceEvent) -> Result<()> {
        match event {
            TraceEvent::Headings(infos) => {
                for info in infos {
                    self.dataset.register(info);
                }
                self.rotate(infos)
            }
            TraceEvent::Sample(sample) => {
                self.dataset.insert(sample)?;
                self.append(sample)
            }
        }
    }

    fn rotate(&mut self, infos: &[SeriesInfo]) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        let session_id = generate_session_id();
        let path = session_file_for(&self.directory, &session_id);
        let mut writer = csv::Writer::from_writer(File::create(&path)?);

        self.columns.clear();
        self.headings.clear();
        self.headings.push("start (ns)".to_owned());
        self.headings.push("end (ns)".to_owned());
        for info in infos {
            self.columns.insert(info.series, self.headings.len());
            self.headings.push(info.heading.clone());
        }
        writer.write_record(&self.headings)?;
        writer.flush()?;

        info!(session = %session_id, path = %path.display(), "recording session");
        self.session_id = Some(session_id);
        self.writer = Some(writer);
        Ok(())
    }

    fn append(&mut self, sample: &Sample) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Ok(()),
        };
        let column = match self.columns.get(&sample.series) {
            Some(column) => *column,
            None => return Ok(()),
        };
        let mut record = vec![String::new(); self.headings.len()];
        record[0] = sample.start_ns.to_string();
        record[1] = sample.end_ns.to_string();
        record[column] = sample.value.to_string();
        writer.write_record(&record)?;
        Ok(())
    }

    /// Flush the session file and hand back the session id, if any trace
    /// data ever arrived.
    pub fn finish(mut self) -> Result<Option<String>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(self.session_id.take())
    }
}
