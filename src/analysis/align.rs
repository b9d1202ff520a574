use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};

use crate::error::{Error, Result};
use crate::signal::{Sample, TimeSeries};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignParameters {
    /// Grid spacing in seconds; sets alignment resolution.
    pub interval: f64,
    /// Round bucket values to whole units (e.g. whole BPM).
    pub round_values: bool,
}

impl Default for AlignParameters {
    fn default() -> Self {
        AlignParameters {
            interval: 2.0,
            round_values: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub bucket_time: f64,
    pub value_a: Option<f64>,
    pub value_b: Option<f64>,
}

/// Aggregate of one left-closed interval `[start, start + interval)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalSummary {
    pub start: f64,
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub struct TemporalAligner {
    pub params: AlignParameters,
    logger: Logger,
}

impl TemporalAligner {
    pub fn new(params: AlignParameters, logger: Logger) -> Self {
        TemporalAligner { params, logger }
    }

    /// Maps both series onto `start + k * interval` for every grid point not
    /// past `end`.
    pub fn align(
        &self,
        a: &TimeSeries,
        b: &TimeSeries,
        start: f64,
        end: f64,
    ) -> Result<Vec<AlignedPair>> {
        let interval = self.params.interval;
        let grid = bucket_grid(start, end, interval)?;

        let (values_a, fallback_a) = resample_counted(a, &grid, interval, (start, end));
        let (values_b, fallback_b) = resample_counted(b, &grid, interval, (start, end));
        debug!(self.logger, "aligned series";
            "buckets" => grid.len(), "interval" => interval,
            "nearest_a" => fallback_a, "nearest_b" => fallback_b,
            "available_a" => values_a.iter().any(Option::is_some),
            "available_b" => values_b.iter().any(Option::is_some));

        let round = |v: Option<f64>| {
            if self.params.round_values {
                v.map(f64::round_ties_even)
            } else {
                v
            }
        };
        Ok(grid
            .into_iter()
            .zip(values_a.into_iter().zip(values_b))
            .map(|(bucket_time, (va, vb))| AlignedPair {
                bucket_time,
                value_a: round(va),
                value_b: round(vb),
            })
            .collect())
    }
}

/// Grid points `start + k * interval` with `k` counted up to `end`.
pub fn bucket_grid(start: f64, end: f64, interval: f64) -> Result<Vec<f64>> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "bucket interval must be positive and finite, got {}",
            interval
        )));
    }
    if !(start.is_finite() && end.is_finite()) || end < start {
        return Err(Error::InvalidParameter(format!(
            "alignment span [{}, {}] is empty or not finite",
            start, end
        )));
    }
    let steps = ((end - start) / interval + 1e-9).floor() as usize;
    Ok((0..=steps).map(|k| start + k as f64 * interval).collect())
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace_grid(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|k| start + k as f64 * step).collect()
        }
    }
}

/// Averages samples within `[t - width/2, t + width/2)` of each grid point,
/// falling back to the nearest sample when that window is empty. All values
/// are `None` when the series has nothing inside the grid's span.
pub fn resample(series: &TimeSeries, grid: &[f64], width: f64) -> Vec<Option<f64>> {
    match (grid.first(), grid.last()) {
        (Some(&first), Some(&last)) => resample_counted(series, grid, width, (first, last)).0,
        _ => Vec::new(),
    }
}

/// `span` is the requested `[start, end]`; the series counts as available
/// when it has a sample in `[start - width/2, end + width/2)`.
fn resample_counted(
    series: &TimeSeries,
    grid: &[f64],
    width: f64,
    span: (f64, f64),
) -> (Vec<Option<f64>>, usize) {
    let half = width / 2.0;
    let sorted = sorted_samples(series);
    let times: Vec<f64> = sorted.iter().map(|s| s.time).collect();

    let (start, end) = span;
    let lo = times.partition_point(|&t| t < start - half);
    let hi = times.partition_point(|&t| t < end + half);
    if grid.is_empty() || lo >= hi {
        return (vec![None; grid.len()], 0);
    }

    let mut fallbacks = 0;
    let values = grid
        .iter()
        .map(|&t| {
            let from = times.partition_point(|&x| x < t - half);
            let to = times.partition_point(|&x| x < t + half);
            if from < to {
                let window: Array1<f64> = sorted[from..to].iter().map(|s| s.value).collect();
                window.mean()
            } else {
                fallbacks += 1;
                nearest(&sorted, &times, t).map(|s| s.value)
            }
        })
        .collect();
    (values, fallbacks)
}

/// Sorted by time, then value, so aggregation ignores input order.
fn sorted_samples(series: &TimeSeries) -> Vec<Sample> {
    let mut sorted = series.samples.clone();
    sorted.sort_by(|x, y| {
        x.time
            .total_cmp(&y.time)
            .then_with(|| x.value.total_cmp(&y.value))
    });
    sorted
}

/// Closest sample by absolute time; ties go to the earlier timestamp.
fn nearest<'a>(sorted: &'a [Sample], times: &[f64], t: f64) -> Option<&'a Sample> {
    let after = times.partition_point(|&x| x < t);
    let later = sorted.get(after);
    let earlier = after.checked_sub(1).map(|i| {
        // first sample sharing the earlier timestamp
        let first = times.partition_point(|&x| x < times[i]);
        &sorted[first]
    });
    match (earlier, later) {
        (Some(e), Some(l)) => {
            if (t - e.time) <= (l.time - t) {
                Some(e)
            } else {
                Some(l)
            }
        }
        (e, l) => e.or(l),
    }
}

/// Mean, min and max per left-closed interval over `[start, end]`.
pub fn interval_summaries(
    series: &TimeSeries,
    interval: f64,
    start: f64,
    end: f64,
) -> Result<Vec<IntervalSummary>> {
    let bins = bucket_grid(start, end, interval)?;
    let sorted = sorted_samples(&series.clip(start, end));
    let times: Vec<f64> = sorted.iter().map(|s| s.time).collect();

    Ok(bins
        .iter()
        .map(|&bin_start| {
            let from = times.partition_point(|&x| x < bin_start);
            let to = times.partition_point(|&x| x < bin_start + interval);
            let values: Array1<f64> = sorted[from..to].iter().map(|s| s.value).collect();
            summarize_bin(bin_start, values)
        })
        .collect())
}

fn summarize_bin(start: f64, values: Array1<f64>) -> IntervalSummary {
    IntervalSummary {
        start,
        count: values.len(),
        mean: values.mean(),
        min: values.min().ok().copied(),
        max: values.max().ok().copied(),
    }
}
