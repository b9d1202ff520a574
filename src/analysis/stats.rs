use std::collections::BTreeMap;

use ndarray::Array1;
use ndarray_stats::interpolate::Linear;
use ndarray_stats::{Quantile1dExt, QuantileExt, SummaryStatisticsExt};
use noisy_float::types::{n64, N64};
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};

use crate::error::{Error, Result};
use crate::signal::PeakEvent;

/// Minimum counts for the guarded statistics.
pub const MIN_SAMPLES_SHAPE: usize = 3;
pub const MIN_SAMPLES_PERCENTILES: usize = 4;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsParameters {
    /// Percentile levels reported once enough samples exist.
    pub percentiles: Vec<u8>,
}

impl Default for StatsParameters {
    fn default() -> Self {
        StatsParameters {
            percentiles: vec![25, 50, 75, 95],
        }
    }
}

/// Descriptive statistics. Guarded fields are `None` below their minimum
/// sample count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub variance: f64,
    pub range: f64,
    pub median: f64,
    pub mode: f64,
    /// Standard deviation with one degree of freedom removed.
    pub sample_std: Option<f64>,
    pub skewness: Option<f64>,
    /// Excess (Fisher) kurtosis.
    pub kurtosis: Option<f64>,
    pub iqr: Option<f64>,
    pub percentiles: Option<BTreeMap<u8, f64>>,
}

impl StatisticsSummary {
    /// Flat metric map; guarded fields that are unavailable are left out.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("count".to_string(), self.count as f64);
        map.insert("min".to_string(), self.min);
        map.insert("max".to_string(), self.max);
        map.insert("mean".to_string(), self.mean);
        map.insert("std".to_string(), self.std);
        map.insert("variance".to_string(), self.variance);
        map.insert("range".to_string(), self.range);
        map.insert("median".to_string(), self.median);
        map.insert("mode".to_string(), self.mode);
        let optional = [
            ("sample_std", self.sample_std),
            ("skewness", self.skewness),
            ("kurtosis", self.kurtosis),
            ("iqr", self.iqr),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                map.insert(name.to_string(), v);
            }
        }
        if let Some(percentiles) = &self.percentiles {
            for (level, v) in percentiles {
                map.insert(format!("p{}", level), *v);
            }
        }
        map
    }
}

/// Time-domain heart-rate variability over RR intervals in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub count: usize,
    pub mean_rr: f64,
    pub sdnn: f64,
    pub rmssd: f64,
    /// Percent of successive differences above 50 ms.
    pub pnn50: f64,
}

/// Span and cadence of a detected peak sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub duration: f64,
    pub rate_count: usize,
    /// Rate samples per second of recording.
    pub average_cadence: f64,
}

impl RecordingSummary {
    pub fn from_peaks(peaks: &[PeakEvent]) -> Result<Self> {
        if peaks.len() < 2 {
            return Err(Error::insufficient("recording summary (peaks)", 2, peaks.len()));
        }
        let duration = peaks[peaks.len() - 1].time - peaks[0].time;
        let rate_count = peaks.len() - 1;
        Ok(RecordingSummary {
            duration,
            rate_count,
            average_cadence: rate_count as f64 / duration,
        })
    }
}

pub struct CalibrationStatistics {
    pub params: StatsParameters,
    logger: Logger,
}

impl CalibrationStatistics {
    pub fn new(params: StatsParameters, logger: Logger) -> Self {
        CalibrationStatistics { params, logger }
    }

    pub fn summarize(&self, values: &[f64]) -> Result<StatisticsSummary> {
        let summary = summarize(values, &self.params.percentiles)?;
        debug!(self.logger, "summarized series";
            "count" => summary.count, "mean" => summary.mean,
            "shape" => summary.skewness.is_some(),
            "percentiles" => summary.percentiles.is_some());
        Ok(summary)
    }

    pub fn hrv(&self, rr_ms: &[f64]) -> Result<HrvMetrics> {
        let metrics = hrv_metrics(rr_ms)?;
        debug!(self.logger, "hrv metrics";
            "count" => metrics.count, "sdnn" => metrics.sdnn, "rmssd" => metrics.rmssd,
            "pnn50" => metrics.pnn50);
        Ok(metrics)
    }
}

pub fn summarize(values: &[f64], levels: &[u8]) -> Result<StatisticsSummary> {
    if values.is_empty() {
        return Err(Error::insufficient("summary statistics", 1, 0));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidParameter(
            "statistics require finite values".into(),
        ));
    }
    if let Some(level) = levels.iter().find(|&&l| l > 100) {
        return Err(Error::InvalidParameter(format!(
            "percentile level {} is above 100",
            level
        )));
    }

    let count = values.len();
    let data = Array1::from_vec(values.to_vec());
    let min = *data.min().map_err(|e| Error::InvalidParameter(e.to_string()))?;
    let max = *data.max().map_err(|e| Error::InvalidParameter(e.to_string()))?;
    let mean = data.sum() / count as f64;
    let variance = data.var(0.0);

    let mut ordered: Array1<N64> = data.mapv(n64);
    let median = quantile(&mut ordered, 0.5)?;

    let (skewness, kurtosis) = if count >= MIN_SAMPLES_SHAPE {
        (
            data.skewness().ok().filter(|v| v.is_finite()),
            data.kurtosis().ok().map(|k| k - 3.0).filter(|v| v.is_finite()),
        )
    } else {
        (None, None)
    };

    let (iqr, percentiles) = if count >= MIN_SAMPLES_PERCENTILES {
        let q1 = quantile(&mut ordered, 0.25)?;
        let q3 = quantile(&mut ordered, 0.75)?;
        let mut table = BTreeMap::new();
        for &level in levels {
            table.insert(level, quantile(&mut ordered, level as f64 / 100.0)?);
        }
        (Some(q3 - q1), Some(table))
    } else {
        (None, None)
    };

    Ok(StatisticsSummary {
        count,
        min,
        max,
        mean,
        std: variance.sqrt(),
        variance,
        range: max - min,
        median,
        mode: mode(values),
        sample_std: if count >= 2 { Some(data.std(1.0)) } else { None },
        skewness,
        kurtosis,
        iqr,
        percentiles,
    })
}

/// Linearly interpolated quantile, `q` in `[0, 1]`.
fn quantile(data: &mut Array1<N64>, q: f64) -> Result<f64> {
    data.quantile_mut(n64(q), &Linear)
        .map(|v| v.raw())
        .map_err(|e| Error::InvalidParameter(e.to_string()))
}

/// Most frequent value; ties go to the smallest.
fn mode(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let (mut best, mut best_count) = (sorted[0], 0);
    let mut i = 0;
    while i < sorted.len() {
        let run = sorted[i..].iter().take_while(|&&v| v == sorted[i]).count();
        if run > best_count {
            best = sorted[i];
            best_count = run;
        }
        i += run;
    }
    best
}

pub fn hrv_metrics(rr_ms: &[f64]) -> Result<HrvMetrics> {
    if rr_ms.len() < 2 {
        return Err(Error::insufficient("hrv metrics (rr intervals)", 2, rr_ms.len()));
    }
    let rr = Array1::from_vec(rr_ms.to_vec());
    let diffs: Vec<f64> = rr_ms.windows(2).map(|w| w[1] - w[0]).collect();
    let n_diffs = diffs.len() as f64;

    let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / n_diffs).sqrt();
    let nn50 = diffs.iter().filter(|d| d.abs() > 50.0).count();

    Ok(HrvMetrics {
        count: rr_ms.len(),
        mean_rr: rr.sum() / rr_ms.len() as f64,
        sdnn: rr.std(0.0),
        rmssd,
        pnn50: 100.0 * nn50 as f64 / n_diffs,
    })
}
