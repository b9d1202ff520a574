use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single time-stamped value. Time is in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(time: f64, value: f64) -> Self {
        Sample { time, value }
    }
}

/// Uniformly sampled waveform, e.g. a raw PPG channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    times: Vec<f64>,
    values: Vec<f64>,
    sampling_rate: f64,
}

impl Waveform {
    pub fn new(times: Vec<f64>, values: Vec<f64>, sampling_rate: f64) -> Result<Self> {
        if times.len() != values.len() {
            return Err(Error::MismatchedSeries(format!(
                "{} timestamps for {} values",
                times.len(),
                values.len()
            )));
        }
        if let Some(i) = times.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(Error::InvalidParameter(format!(
                "timestamps must be strictly increasing (index {})",
                i + 1
            )));
        }
        Ok(Waveform {
            times,
            values,
            sampling_rate,
        })
    }

    /// Builds the time base as `t0 + i / fs`.
    pub fn from_values(values: Vec<f64>, sampling_rate: f64, t0: f64) -> Result<Self> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(Error::InvalidSamplingRate(format!(
                "sampling rate must be positive and finite, got {}",
                sampling_rate
            )));
        }
        let times = (0..values.len())
            .map(|i| t0 + i as f64 / sampling_rate)
            .collect();
        Waveform::new(times, values, sampling_rate)
    }

    /// Derives the sampling rate from the first two timestamps.
    pub fn infer_rate(times: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if times.len() < 2 {
            return Err(Error::insufficient("sampling rate inference", 2, times.len()));
        }
        let dt = times[1] - times[0];
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::InvalidSamplingRate(format!(
                "non-positive sample spacing {}",
                dt
            )));
        }
        Waveform::new(times, values, 1.0 / dt)
    }

    /// Same time base and rate, new values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        Waveform::new(self.times.clone(), values, self.sampling_rate)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(self.values.iter())
            .map(|(&t, &v)| Sample::new(t, v))
    }
}

/// An accepted pulse peak in the conditioned signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakEvent {
    /// Sample index into the waveform.
    pub index: usize,
    pub time: f64,
    pub raw_amplitude: f64,
    pub filtered_amplitude: f64,
}

/// Instantaneous heart rate, anchored to the later peak of its pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub time: f64,
    pub bpm: f64,
}

/// Converts consecutive peaks into rates: `bpm = 60 / (t[i+1] - t[i])`.
pub fn rates_from_peaks(peaks: &[PeakEvent]) -> Vec<RateSample> {
    peaks
        .windows(2)
        .map(|w| RateSample {
            time: w[1].time,
            bpm: 60.0 / (w[1].time - w[0].time),
        })
        .collect()
}

/// Peak-to-peak intervals in milliseconds.
pub fn rr_intervals_ms(peaks: &[PeakEvent]) -> Vec<f64> {
    peaks
        .windows(2)
        .map(|w| (w[1].time - w[0].time) * 1000.0)
        .collect()
}

/// Irregularly sampled series, e.g. a reference device's rate readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(samples: Vec<Sample>) -> Self {
        TimeSeries { samples }
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        TimeSeries::new(pairs.iter().map(|&(t, v)| Sample::new(t, v)).collect())
    }

    pub fn from_rates(rates: &[RateSample]) -> Self {
        TimeSeries::new(rates.iter().map(|r| Sample::new(r.time, r.bpm)).collect())
    }

    /// One value every `interval` seconds starting at `start`.
    pub fn uniform(start: f64, interval: f64, values: &[f64]) -> Self {
        TimeSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| Sample::new(start + i as f64 * interval, v))
                .collect(),
        )
    }

    /// Wall-clock timestamps expressed as seconds since `origin`.
    pub fn from_timestamps(
        origin: NaiveDateTime,
        timestamps: &[NaiveDateTime],
        values: &[f64],
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(Error::MismatchedSeries(format!(
                "{} timestamps for {} values",
                timestamps.len(),
                values.len()
            )));
        }
        let samples = timestamps
            .iter()
            .zip(values.iter())
            .map(|(ts, &v)| {
                let secs = (*ts - origin).num_milliseconds() as f64 / 1000.0;
                Sample::new(secs, v)
            })
            .collect();
        Ok(TimeSeries::new(samples))
    }

    /// Samples with `start <= t <= end`.
    pub fn clip(&self, start: f64, end: f64) -> Self {
        TimeSeries::new(
            self.samples
                .iter()
                .filter(|s| s.time >= start && s.time <= end)
                .copied()
                .collect(),
        )
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn peak(time: f64) -> PeakEvent {
        PeakEvent {
            index: 0,
            time,
            raw_amplitude: 0.0,
            filtered_amplitude: 0.0,
        }
    }

    #[test]
    fn rates_are_anchored_to_later_peak() {
        let peaks = vec![peak(0.0), peak(1.0), peak(1.5)];
        let rates = rates_from_peaks(&peaks);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0], RateSample { time: 1.0, bpm: 60.0 });
        assert_eq!(rates[1], RateSample { time: 1.5, bpm: 120.0 });
    }

    #[test]
    fn rr_intervals_in_milliseconds() {
        let peaks = vec![peak(0.0), peak(0.75), peak(1.5)];
        assert_eq!(rr_intervals_ms(&peaks), vec![750.0, 750.0]);
    }

    #[test]
    fn waveform_rejects_non_increasing_time() {
        let err = Waveform::new(vec![0.0, 0.0], vec![1.0, 2.0], 100.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn waveform_rejects_length_mismatch() {
        let err = Waveform::new(vec![0.0, 0.1], vec![1.0], 10.0).unwrap_err();
        assert!(matches!(err, Error::MismatchedSeries(_)));
    }

    #[test]
    fn infer_rate_from_spacing() {
        let wf = Waveform::infer_rate(vec![0.0, 0.005, 0.010], vec![1.0, 2.0, 3.0]).unwrap();
        assert!((wf.sampling_rate() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn timestamps_relative_to_origin() {
        let origin = NaiveDate::from_ymd_opt(2025, 7, 26)
            .unwrap()
            .and_hms_opt(11, 42, 47)
            .unwrap();
        let later = origin + chrono::Duration::seconds(4);
        let series = TimeSeries::from_timestamps(origin, &[origin, later], &[95.0, 97.0]).unwrap();
        assert_eq!(series.samples[1], Sample::new(4.0, 97.0));
    }

    #[test]
    fn clip_is_inclusive() {
        let series = TimeSeries::uniform(0.0, 2.0, &[1.0, 2.0, 3.0, 4.0]);
        let clipped = series.clip(2.0, 4.0);
        assert_eq!(clipped.values(), vec![2.0, 3.0]);
    }
}
