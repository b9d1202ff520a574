//! CSV boundary: loading waveforms and rate series, exporting result tables.

use std::io::{Read, Write};

use csv::{Reader, StringRecord, Writer};

use crate::analysis::align::AlignedPair;
use crate::analysis::window::{calibration_table, CalibrationWindow};
use crate::error::{Error, Result};
use crate::signal::{Sample, TimeSeries, Waveform};

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))
}

fn parse_cell(record: &StringRecord, idx: usize, row: usize, column: &str) -> Result<Option<f64>> {
    let cell = record.get(idx).unwrap_or("").trim();
    if cell.is_empty() {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|_| Error::Parse(format!("row {}, column {}: {:?}", row + 1, column, cell)))
}

fn read_columns<R: Read>(reader: R, time_col: &str, value_col: &str) -> Result<Vec<(Option<f64>, Option<f64>, usize)>> {
    let mut rdr = Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let t_idx = column_index(&headers, time_col)?;
    let v_idx = column_index(&headers, value_col)?;

    let mut rows = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let t = parse_cell(&record, t_idx, row, time_col)?;
        let v = parse_cell(&record, v_idx, row, value_col)?;
        rows.push((t, v, row));
    }
    Ok(rows)
}

/// Loads a waveform; the sampling rate is inferred from the first two
/// timestamps. Every row must carry both cells.
pub fn read_waveform<R: Read>(reader: R, time_col: &str, value_col: &str) -> Result<Waveform> {
    let mut times = Vec::new();
    let mut values = Vec::new();
    for (t, v, row) in read_columns(reader, time_col, value_col)? {
        match (t, v) {
            (Some(t), Some(v)) => {
                times.push(t);
                values.push(v);
            }
            _ => return Err(Error::Parse(format!("row {} has an empty cell", row + 1))),
        }
    }
    Waveform::infer_rate(times, values)
}

/// Loads a `(time, value)` series. Rows with an empty value are skipped.
pub fn read_series<R: Read>(reader: R, time_col: &str, value_col: &str) -> Result<TimeSeries> {
    let mut samples = Vec::new();
    for (t, v, row) in read_columns(reader, time_col, value_col)? {
        match (t, v) {
            (Some(t), Some(v)) => samples.push(Sample::new(t, v)),
            (None, Some(_)) => {
                return Err(Error::Parse(format!("row {} has no timestamp", row + 1)))
            }
            (_, None) => {}
        }
    }
    Ok(TimeSeries::new(samples))
}

pub fn write_calibration_table<W: Write>(writer: W, windows: &[CalibrationWindow]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    for row in calibration_table(windows) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Unavailable values are written as empty cells.
pub fn write_aligned_table<W: Write>(
    writer: W,
    pairs: &[AlignedPair],
    header_a: &str,
    header_b: &str,
) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["Time (s)", header_a, header_b])?;
    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for p in pairs {
        wtr.write_record([p.bucket_time.to_string(), cell(p.value_a), cell(p.value_b)])?;
    }
    wtr.flush()?;
    Ok(())
}
