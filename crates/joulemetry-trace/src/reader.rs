//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc;

use csv::{ReaderBuilder, StringRecord, Trim};
use joulemetry_sensors::Unit;
use notify::{EventKind, RecursiveMode, Watcher};
use tracing::warn;

use crate::line_reader::LineReader;
use crate::{Result, Sample, TraceError};

/// A series discovered in a trace header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInfo {
    /// Reader-assigned id, counted from 1 in column order.
    pub series: u32,
    /// Heading verbatim from the header row.
    pub heading: String,
    pub unit: Unit,
}

/// Events yielded while parsing a trace stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// The header row was parsed; announces every relevant series.
    Headings(Vec<SeriesInfo>),
    Sample(Sample),
}

struct ColumnBinding {
    column: usize,
    series: u32,
    unit: Unit,
}

/// Incremental trace parser.
///
/// Reads whole lines only, so it can sit on a file another process is
/// still appending to: `next_event` returns `Ok(None)` at end of input
/// and picks up where it left off when called again after the source has
/// grown. Columns whose heading names neither joules nor watts are
/// ignored, as are the two leading timestamp columns.
pub struct TraceReader<R> {
    lines: LineReader<R>,
    bindings: Option<Vec<ColumnBinding>>,
    pending: VecDeque<TraceEvent>,
    next_series_id: u32,
}

impl<R: Read> TraceReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            lines: LineReader::new(source),
            bindings: None,
            pending: VecDeque::new(),
            next_series_id: 1,
        }
    }

    /// Whether a header row has been parsed yet.
    pub fn saw_header(&self) -> bool {
        self.bindings.is_some()
    }

    /// Parse the next event, or `None` when the input is exhausted.
    pub fn next_event(&mut self) -> Result<Option<TraceEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            let line = match self.lines.next_line()? {
                Some(line) => line,
                None => return Ok(None),
            };
            let record = match parse_record(&line)? {
                Some(record) if record.iter().any(|field| !field.is_empty()) => record,
                _ => continue,
            };
            if self.bindings.is_none() {
                self.bind_header(&record);
            } else {
                self.parse_row(&record);
            }
        }
    }

    /// The first row names the columns. Relevance is decided per heading:
    /// "(J)" marks an energy column, otherwise "(W)" marks a power column.
    fn bind_header(&mut self, record: &StringRecord) {
        let mut bindings = Vec::new();
        let mut infos = Vec::new();
        for (index, heading) in record.iter().enumerate() {
            if index < 2 {
                // Sample start and end timestamps.
                continue;
            }
            let unit = if heading.contains("(J)") {
                Unit::Joules
            } else if heading.contains("(W)") {
                Unit::Watts
            } else {
                continue;
            };
            let series = self.next_series_id;
            self.next_series_id += 1;
            bindings.push(ColumnBinding {
                column: index,
                series,
                unit,
            });
            infos.push(SeriesInfo {
                series,
                heading: heading.to_owned(),
                unit,
            });
        }
        self.bindings = Some(bindings);
        self.pending.push_back(TraceEvent::Headings(infos));
    }

    fn parse_row(&mut self, record: &StringRecord) {
        let bindings = match &self.bindings {
            Some(bindings) => bindings,
            None => return,
        };
        let start_ns = match record.get(0).and_then(|cell| cell.parse::<i64>().ok()) {
            Some(value) => value,
            None => {
                warn!(row = ?record, "skipping trace row with a malformed start timestamp");
                return;
            }
        };
        let end_ns = match record.get(1).and_then(|cell| cell.parse::<i64>().ok()) {
            Some(value) => value,
            None => {
                warn!(row = ?record, "skipping trace row with a malformed end timestamp");
                return;
            }
        };
        for binding in bindings {
            let cell = match record.get(binding.column) {
                Some(cell) => cell,
                None => continue,
            };
            if cell.is_empty() {
                // Sparse rows leave unrelated columns blank.
                continue;
            }
            let value = match cell.parse::<f64>() {
                Ok(value) => value,
                Err(error) => {
                    warn!(cell, %error, "skipping unparsable trace cell");
                    continue;
                }
            };
            self.pending.push_back(TraceEvent::Sample(Sample {
                start_ns,
                end_ns,
                series: binding.series,
                value,
                unit: binding.unit,
            }));
        }
    }
}

impl TraceReader<File> {
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

fn parse_record(line: &str) -> Result<Option<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(Some(record))
    } else {
        Ok(None)
    }
}

/// Stream a trace file into `sink`.
///
/// Without `follow` the call drains the file once and fails with
/// [`TraceError::MissingHeader`] if no header row was found. With
/// `follow` it blocks at end of file until the file grows again and
/// returns only when the watch channel closes.
pub fn stream_path(path: &Path, follow: bool, mut sink: impl FnMut(TraceEvent)) -> Result<()> {
    let mut reader = TraceReader::from_path(path)?;
    if !follow {
        while let Some(event) = reader.next_event()? {
            sink(event);
        }
        if !reader.saw_header() {
            return Err(TraceError::MissingHeader);
        }
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |event| {
        let _ = tx.send(event);
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    loop {
        match reader.next_event()? {
            Some(event) => sink(event),
            None => loop {
                match rx.recv() {
                    Ok(Ok(event)) if matches!(event.kind, EventKind::Modify(_)) => break,
                    Ok(Ok(_)) => continue,
                    Ok(Err(error)) => return Err(TraceError::Watch(error)),
                    // Watcher gone; the trace will not grow any further.
                    Err(_) => return Ok(()),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "sample start (ns),sample end (ns),package-0 (J),cpu (W),integrated cpu (J)\n";

    #[test]
    fn header_binds_energy_and_power_columns_in_order() {
        let mut reader = TraceReader::new(HEADER.as_bytes());
        let event = reader.next_event().unwrap().unwrap();
        let infos = match event {
            TraceEvent::Headings(infos) => infos,
            other => panic!("expected headings, got {other:?}"),
        };
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].series, 1);
        assert_eq!(infos[0].heading, "package-0 (J)");
        assert_eq!(infos[0].unit, Unit::Joules);
        assert_eq!(infos[1].series, 2);
        assert_eq!(infos[1].unit, Unit::Watts);
        assert_eq!(infos[2].series, 3);
        assert_eq!(infos[2].unit, Unit::Joules);
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn rows_become_one_sample_per_relevant_column() {
        let input = format!("{HEADER}100,200,0.5,3,0.0000003\n");
        let mut reader = TraceReader::new(input.as_bytes());
        reader.next_event().unwrap().unwrap();

        let mut samples = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            match event {
                TraceEvent::Sample(sample) => samples.push(sample),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].series, 1);
        assert_eq!(samples[0].start_ns, 100);
        assert_eq!(samples[0].end_ns, 200);
        assert_eq!(samples[0].value, 0.5);
        assert_eq!(samples[0].unit, Unit::Joules);
        assert_eq!(samples[1].series, 2);
        assert_eq!(samples[1].value, 3.0);
        assert_eq!(samples[1].unit, Unit::Watts);
    }

    #[test]
    fn blank_cells_and_malformed_rows_are_skipped() {
        let input = format!(
            "{HEADER}100,200,,3,\nbogus,200,1,1,1\n200,300,0.25,,\n"
        );
        let mut reader = TraceReader::new(input.as_bytes());
        reader.next_event().unwrap().unwrap();

        let mut samples = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            if let TraceEvent::Sample(sample) = event {
                samples.push(sample);
            }
        }
        // Row one contributes only the watt cell, row two is dropped
        // outright, row three contributes only the joule cell.
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].series, 2);
        assert_eq!(samples[0].value, 3.0);
        assert_eq!(samples[1].series, 1);
        assert_eq!(samples[1].value, 0.25);
    }

    #[test]
    fn partial_trailing_lines_wait_for_completion() {
        let input = format!("{HEADER}100,200,0.5");
        let mut reader = TraceReader::new(input.as_bytes());
        reader.next_event().unwrap().unwrap();
        // The unterminated row must not be parsed.
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn stream_path_without_a_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        File::create(&path).unwrap();
        let result = stream_path(&path, false, |_| {});
        assert!(matches!(result, Err(TraceError::MissingHeader)));
    }

    #[test]
    fn stream_path_drains_a_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.csv");
        let mut file = File::create(&path).unwrap();
        write!(file, "{HEADER}").unwrap();
        writeln!(file, "100,200,0.5,3,0.0000003").unwrap();
        drop(file);

        let mut events = Vec::new();
        stream_path(&path, false, |event| events.push(event)).unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], TraceEvent::Headings(_)));
        assert!(matches!(events[1], TraceEvent::Sample(_)));
    }
}
