//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::io::Write;

use joulemetry_sensors::Unit;

use crate::{Result, TraceError};

/// Schema of one trace column: the sensor name and its unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorColumn {
    pub name: String,
    pub unit: Unit,
}

impl SensorColumn {
    pub fn new(name: impl Into<String>, unit: Unit) -> Self {
        Self {
            name: name.into(),
            unit,
        }
    }

    /// Column heading as it appears on the wire.
    #[must_use]
    pub fn heading(&self) -> String {
        format!("{} ({})", self.name, self.unit)
    }
}

/// Streaming CSV writer for live traces.
///
/// The header row is emitted on construction. Every watt column is
/// followed by a derived joules column integrating the reading over its
/// sample interval, so downstream consumers never need the sensor's unit
/// to accumulate energy. Rows are flushed eagerly; a consumer tailing the
/// stream only ever observes whole lines.
pub struct TraceWriter<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<SensorColumn>,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W, columns: Vec<SensorColumn>) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(out);
        let mut header = Vec::with_capacity(columns.len() + 2);
        header.push("sample start (ns)".to_owned());
        header.push("sample end (ns)".to_owned());
        for column in &columns {
            header.push(column.heading());
            if column.unit == Unit::Watts {
                header.push(format!("integrated {} ({})", column.name, Unit::Joules));
            }
        }
        writer.write_record(&header)?;
        writer.flush()?;
        Ok(Self { writer, columns })
    }

    /// Append one row of readings taken over `[start_ns, end_ns)`.
    ///
    /// `values` must carry one reading per configured column, in column
    /// order.
    pub fn write_row(&mut self, start_ns: i64, end_ns: i64, values: &[f64]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(TraceError::ColumnCount {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        let interval_secs = (end_ns - start_ns) as f64 / 1_000_000_000.0;
        let mut record = Vec::with_capacity(values.len() + 2);
        record.push(start_ns.to_string());
        record.push(end_ns.to_string());
        for (column, value) in self.columns.iter().zip(values) {
            record.push(value.to_string());
            if column.unit == Unit::Watts {
                record.push((value * interval_secs).to_string());
            }
        }
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
