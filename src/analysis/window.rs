use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};

use crate::error::{Error, Result};
use crate::signal::{PeakEvent, RateSample};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowParameters {
    /// Rate samples per calibration window; sets smoothing granularity.
    pub window_size: usize,
}

impl Default for WindowParameters {
    fn default() -> Self {
        WindowParameters { window_size: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationWindow {
    pub index: usize,
    pub mean_time: f64,
    pub mean_rate: f64,
    pub mean_raw_amplitude: f64,
    pub mean_filtered_amplitude: f64,
    pub sample_count: usize,
}

/// One row of the exported calibration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRow {
    #[serde(rename = "Time (s)")]
    pub time_seconds: f64,
    #[serde(rename = "Heart_Rate (BPM)")]
    pub heart_rate_bpm: f64,
    #[serde(rename = "Raw_Signal")]
    pub raw_signal: f64,
    #[serde(rename = "Filtered_Signal")]
    pub filtered_signal: f64,
}

impl From<&CalibrationWindow> for CalibrationRow {
    fn from(w: &CalibrationWindow) -> Self {
        CalibrationRow {
            time_seconds: w.mean_time,
            heart_rate_bpm: w.mean_rate,
            raw_signal: w.mean_raw_amplitude,
            filtered_signal: w.mean_filtered_amplitude,
        }
    }
}

pub fn calibration_table(windows: &[CalibrationWindow]) -> Vec<CalibrationRow> {
    windows.iter().map(CalibrationRow::from).collect()
}

pub struct WindowAggregator {
    pub params: WindowParameters,
    logger: Logger,
}

impl WindowAggregator {
    pub fn new(params: WindowParameters, logger: Logger) -> Self {
        WindowAggregator { params, logger }
    }

    /// Averages contiguous blocks of `window_size` rates; a trailing partial
    /// block is dropped.
    ///
    /// Rate `k` belongs to `peaks[k + 1]`, so window `i` takes its time and
    /// amplitudes from `peaks[i*w + 1 ..= (i+1)*w]`.
    // NOTE: this offset mirrors how the calibration tables were produced
    // historically; keep it until the anchoring is reviewed with the
    // physiology side.
    pub fn aggregate(
        &self,
        rates: &[RateSample],
        peaks: &[PeakEvent],
    ) -> Result<Vec<CalibrationWindow>> {
        let w = self.params.window_size;
        if w == 0 {
            return Err(Error::InvalidParameter("window size must be positive".into()));
        }
        if !rates.is_empty() && peaks.len() != rates.len() + 1 {
            return Err(Error::MismatchedSeries(format!(
                "{} rates need {} peaks, got {}",
                rates.len(),
                rates.len() + 1,
                peaks.len()
            )));
        }

        let bpm: Vec<f64> = rates.iter().map(|r| r.bpm).collect();
        let times: Vec<f64> = peaks.iter().map(|p| p.time).collect();
        let raw: Vec<f64> = peaks.iter().map(|p| p.raw_amplitude).collect();
        let filtered: Vec<f64> = peaks.iter().map(|p| p.filtered_amplitude).collect();

        let windows: Vec<CalibrationWindow> = (0..rates.len() / w)
            .map(|i| {
                let (start, end) = (i * w, (i + 1) * w);
                let peak_block = start + 1..end + 1;
                CalibrationWindow {
                    index: i,
                    mean_time: block_mean(&times[peak_block.clone()]),
                    mean_rate: block_mean(&bpm[start..end]),
                    mean_raw_amplitude: block_mean(&raw[peak_block.clone()]),
                    mean_filtered_amplitude: block_mean(&filtered[peak_block]),
                    sample_count: w,
                }
            })
            .collect();

        debug!(self.logger, "aggregated calibration windows";
            "rates" => rates.len(), "window_size" => w, "windows" => windows.len(),
            "dropped" => rates.len() % w);
        Ok(windows)
    }
}

fn block_mean(values: &[f64]) -> f64 {
    ArrayView1::from(values).sum() / values.len() as f64
}
