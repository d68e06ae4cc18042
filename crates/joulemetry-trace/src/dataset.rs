//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::reader::{SeriesInfo, TraceEvent};
use crate::{Result, Sample, Series, TraceError};

/// All series of one trace, keyed by the reader-assigned series id and
/// kept in announcement order.
#[derive(Debug, Default)]
pub struct Dataset {
    series: RwLock<IndexMap<u32, Arc<Series>>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series announced by a headings event. Re-registering an
    /// id keeps the existing series and its data.
    pub fn register(&self, info: &SeriesInfo) {
        let mut series = self.series.write();
        series
            .entry(info.series)
            .or_insert_with(|| Arc::new(Series::new(info.heading.clone())));
    }

    /// Route a sample to the series it references.
    pub fn insert(&self, sample: &Sample) -> Result<bool> {
        let series = self.series.read();
        match series.get(&sample.series) {
            Some(series) => Ok(series.insert(sample)),
            None => Err(TraceError::UnknownSeries(sample.series)),
        }
    }

    /// Feed one reader event into the dataset. Samples rejected by their
    /// series (overlaps) are dropped silently.
    pub fn apply(&self, event: &TraceEvent) -> Result<()> {
        match event {
            TraceEvent::Headings(infos) => {
                for info in infos {
                    self.register(info);
                }
                Ok(())
            }
            TraceEvent::Sample(sample) => {
                self.insert(sample)?;
                Ok(())
            }
        }
    }

    pub fn get(&self, series_id: u32) -> Option<Arc<Series>> {
        self.series.read().get(&series_id).cloned()
    }

    /// Snapshot of all series in announcement order.
    pub fn snapshot(&self) -> Vec<Arc<Series>> {
        self.series.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }
}
