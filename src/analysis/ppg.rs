use find_peaks::PeakFinder;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use slog::{debug, warn, Logger};

use crate::analysis::filter::SignalConditioner;
use crate::analysis::{RateExtraction, RateExtractor};
use crate::error::{Error, Result};
use crate::signal::{rates_from_peaks, PeakEvent, RateSample, Waveform};

/// Peak acceptance constraints. `None` fields are derived from the signal.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakParameters {
    /// Minimum samples between accepted peaks; caps the detectable rate.
    /// Defaults to `fs / 3`, i.e. about 180 bpm.
    pub distance: Option<usize>,
    /// Noise floor; defaults to the mean of the conditioned signal.
    pub height: Option<f64>,
    /// Rejects shallow maxima riding on a larger wave.
    pub prominence: f64,
}

impl Default for PeakParameters {
    fn default() -> Self {
        PeakParameters {
            distance: None,
            height: None,
            prominence: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetection {
    pub peaks: Vec<PeakEvent>,
    pub rates: Vec<RateSample>,
}

pub struct PeakDetector {
    pub params: PeakParameters,
    logger: Logger,
}

impl PeakDetector {
    pub fn new(params: PeakParameters, logger: Logger) -> Self {
        PeakDetector { params, logger }
    }

    /// Locates pulse peaks in `conditioned` and records the co-located raw
    /// amplitude from `raw`. Both must share one time base.
    pub fn detect(&self, raw: &Waveform, conditioned: &Waveform) -> Result<PeakDetection> {
        if raw.len() != conditioned.len() {
            return Err(Error::MismatchedSeries(format!(
                "raw waveform has {} samples, conditioned has {}",
                raw.len(),
                conditioned.len()
            )));
        }
        if conditioned.values().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(
                "conditioned signal contains non-finite samples".into(),
            ));
        }

        let fs = conditioned.sampling_rate();
        let indices = self.find_peaks(ArrayView1::from(conditioned.values()), fs);

        let peaks: Vec<PeakEvent> = indices
            .iter()
            .map(|&i| PeakEvent {
                index: i,
                time: conditioned.times()[i],
                raw_amplitude: raw.values()[i],
                filtered_amplitude: conditioned.values()[i],
            })
            .collect();

        if peaks.len() < 2 {
            warn!(self.logger, "too few peaks to form a rate"; "peaks" => peaks.len());
            return Err(Error::insufficient("rate extraction (peaks)", 2, peaks.len()));
        }

        let rates = rates_from_peaks(&peaks);
        debug!(self.logger, "peaks detected"; "peaks" => peaks.len(), "rates" => rates.len());
        Ok(PeakDetection { peaks, rates })
    }

    /// Sorted sample indices of accepted peaks.
    pub fn find_peaks(&self, signal: ArrayView1<f64>, fs: f64) -> Vec<usize> {
        if signal.is_empty() {
            return Vec::new();
        }
        let distance = self
            .params
            .distance
            .unwrap_or((fs / 3.0) as usize)
            .max(1);
        let height = match self.params.height {
            Some(h) => h,
            None => signal.mean().unwrap_or(0.0),
        };
        let prominence = self.params.prominence;

        let slice: Vec<f64> = signal.to_vec();
        let peaks = PeakFinder::new(&slice[..])
            .with_min_prominence(prominence)
            .with_min_height(height)
            .with_min_distance(distance)
            .find_peaks();

        let mut peaks: Vec<usize> = peaks
            .iter()
            .map(|p| p.position.start)
            .filter(|&i| is_interior_maximum(&slice, i))
            .collect();
        peaks.sort_unstable();
        peaks
    }
}

/// A maximum needs a sample on both sides; plateaus are indexed by their start.
fn is_interior_maximum(signal: &[f64], i: usize) -> bool {
    i > 0 && i + 1 < signal.len() && signal[i - 1] < signal[i] && signal[i + 1] <= signal[i]
}

/// Band-pass conditioning followed by peak detection.
pub struct PeakRateExtractor {
    pub conditioner: SignalConditioner,
    pub detector: PeakDetector,
}

impl RateExtractor for PeakRateExtractor {
    fn extract(&self, waveform: &Waveform) -> Result<RateExtraction> {
        let conditioned = self.conditioner.condition(waveform)?;
        let detection = self.detector.detect(waveform, &conditioned)?;
        Ok(RateExtraction {
            conditioned: Some(conditioned),
            peaks: detection.peaks,
            rates: detection.rates,
        })
    }
}
