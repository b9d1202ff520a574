use std::f64::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};

use crate::error::{Error, Result};
use crate::signal::Waveform;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParameters {
    pub low_cutoff_hz: f64,
    pub high_cutoff_hz: f64,
    /// Butterworth order of each edge of the band.
    pub order: usize,
}

impl Default for FilterParameters {
    fn default() -> Self {
        FilterParameters {
            low_cutoff_hz: 0.5,
            high_cutoff_hz: 5.0,
            order: 3,
        }
    }
}

/// Zero-phase Butterworth band-pass for raw PPG waveforms.
pub struct SignalConditioner {
    pub params: FilterParameters,
    logger: Logger,
}

impl SignalConditioner {
    pub fn new(params: FilterParameters, logger: Logger) -> Self {
        SignalConditioner { params, logger }
    }

    /// Filters the waveform, keeping its time base.
    pub fn condition(&self, waveform: &Waveform) -> Result<Waveform> {
        let data = ArrayView1::from(waveform.values());
        let filtered = self.apply(data, waveform.sampling_rate())?;
        waveform.with_values(filtered.to_vec())
    }

    pub fn apply(&self, data: ArrayView1<f64>, fs: f64) -> Result<Array1<f64>> {
        let (low, high) = (self.params.low_cutoff_hz, self.params.high_cutoff_hz);
        debug!(self.logger, "band-pass filtering";
            "samples" => data.len(), "fs" => fs, "low" => low, "high" => high,
            "order" => self.params.order);
        bandpass_filter(data, low, high, self.params.order, fs)
    }
}

/// Second-order (and for odd orders, one first-order) sections of a
/// Butterworth low-pass at `highcut` cascaded with a high-pass at `lowcut`.
pub fn design_bandpass(
    lowcut: f64,
    highcut: f64,
    order: usize,
    fs: f64,
) -> Result<Vec<Coefficients<f64>>> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(Error::InvalidSamplingRate(format!(
            "sampling rate must be positive and finite, got {}",
            fs
        )));
    }
    if order == 0 {
        return Err(Error::InvalidSamplingRate("filter order must be at least 1".into()));
    }
    let nyq = fs / 2.0;
    let (low_norm, high_norm) = (lowcut / nyq, highcut / nyq);
    let in_unit = |w: f64| w.is_finite() && w > 0.0 && w < 1.0;
    if !in_unit(low_norm) || !in_unit(high_norm) {
        return Err(Error::InvalidSamplingRate(format!(
            "normalized cutoffs [{}, {}] must lie in (0, 1) for fs = {}",
            low_norm, high_norm, fs
        )));
    }
    if low_norm >= high_norm {
        return Err(Error::InvalidSamplingRate(format!(
            "low cutoff {} Hz must be below high cutoff {} Hz",
            lowcut, highcut
        )));
    }

    let mut sections = Vec::with_capacity(order + 1);
    for q in butterworth_q(order) {
        sections.push(biquad_section(false, fs, highcut, q)?);
    }
    for q in butterworth_q(order) {
        sections.push(biquad_section(true, fs, lowcut, q)?);
    }
    if order % 2 == 1 {
        sections.push(first_order_section(false, highcut, fs));
        sections.push(first_order_section(true, lowcut, fs));
    }
    Ok(sections)
}

pub fn bandpass_filter(
    data: ArrayView1<f64>,
    lowcut: f64,
    highcut: f64,
    order: usize,
    fs: f64,
) -> Result<Array1<f64>> {
    let sections = design_bandpass(lowcut, highcut, order, fs)?;
    if data.is_empty() {
        return Ok(Array1::zeros(0));
    }
    let warmup = warmup_len(lowcut, fs);
    let padlen = (3 * (2 * order + 1)).min(data.len() - 1);
    Ok(forward_backward_filter(data, &sections, padlen, warmup))
}

/// Priming steps that settle the high-pass edge before the first real
/// sample: ten periods of the low cutoff, capped for very low cutoffs.
fn warmup_len(lowcut: f64, fs: f64) -> usize {
    (10.0 * fs / lowcut).ceil().min(MAX_WARMUP as f64) as usize
}

const MAX_WARMUP: usize = 40_000;

/// Q of each conjugate pole pair of an analog Butterworth prototype.
fn butterworth_q(order: usize) -> Vec<f64> {
    let n = order as f64;
    (0..order)
        .map(|m| (2 * m + 1) as f64 - n)
        .filter(|&k| k > 0.0)
        .map(|k| 1.0 / (2.0 * (k * PI / (2.0 * n)).cos()))
        .collect()
}

fn biquad_section(highpass: bool, fs: f64, f0: f64, q: f64) -> Result<Coefficients<f64>> {
    let kind = if highpass { Type::HighPass } else { Type::LowPass };
    Coefficients::<f64>::from_params(kind, fs.hz(), f0.hz(), q)
        .map_err(|e| Error::InvalidSamplingRate(format!("biquad design failed: {:?}", e)))
}

/// Bilinear-transformed single pole, prewarped to `cutoff`.
fn first_order_section(highpass: bool, cutoff: f64, fs: f64) -> Coefficients<f64> {
    let k = (PI * cutoff / fs).tan();
    let a1 = (k - 1.0) / (k + 1.0);
    let (b0, b1) = if highpass {
        (1.0 / (1.0 + k), -1.0 / (1.0 + k))
    } else {
        (k / (1.0 + k), k / (1.0 + k))
    };
    Coefficients {
        a1,
        a2: 0.0,
        b0,
        b1,
        b2: 0.0,
    }
}

fn forward_backward_filter(
    data: ArrayView1<f64>,
    sections: &[Coefficients<f64>],
    padlen: usize,
    warmup: usize,
) -> Array1<f64> {
    let mut processed = odd_extend(data, padlen);

    run_pass(&mut processed, sections, warmup);

    processed.reverse();
    run_pass(&mut processed, sections, warmup);
    processed.reverse();

    Array1::from_vec(processed[padlen..processed.len() - padlen].to_vec())
}

/// One causal pass through the cascade, primed on the first sample.
fn run_pass(data: &mut [f64], sections: &[Coefficients<f64>], warmup: usize) {
    let mut chain: Vec<DirectForm1<f64>> =
        sections.iter().map(|c| DirectForm1::<f64>::new(*c)).collect();
    let mut step = |x: f64| chain.iter_mut().fold(x, |acc, f| f.run(acc));

    if let Some(&first) = data.first() {
        for _ in 0..warmup {
            step(first);
        }
    }
    for sample in data.iter_mut() {
        *sample = step(*sample);
    }
}

/// Point-symmetric extension about both end samples.
fn odd_extend(data: ArrayView1<f64>, padlen: usize) -> Vec<f64> {
    let n = data.len();
    let mut out = Vec::with_capacity(n + 2 * padlen);
    let (first, last) = (data[0], data[n - 1]);
    out.extend((1..=padlen).rev().map(|i| 2.0 * first - data[i]));
    out.extend(data.iter().copied());
    out.extend((1..=padlen).map(|i| 2.0 * last - data[n - 1 - i]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::silent;

    fn sine(freq: f64, fs: f64, seconds: f64) -> Array1<f64> {
        let n = (fs * seconds) as usize;
        Array1::from_iter((0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()))
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|x| x * x).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn butterworth_pole_pairs() {
        let q2 = butterworth_q(2);
        assert_eq!(q2.len(), 1);
        assert!((q2[0] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);

        let q3 = butterworth_q(3);
        assert_eq!(q3.len(), 1);
        assert!((q3[0] - 1.0).abs() < 1e-12);

        let q4 = butterworth_q(4);
        assert!((q4[0] - 0.541_196_100_146_197).abs() < 1e-9);
        assert!((q4[1] - 1.306_562_964_876_376_6).abs() < 1e-9);
    }

    #[test]
    fn section_count_follows_order() {
        assert_eq!(design_bandpass(0.5, 5.0, 3, 200.0).unwrap().len(), 4);
        assert_eq!(design_bandpass(0.5, 5.0, 4, 200.0).unwrap().len(), 4);
        assert_eq!(design_bandpass(0.5, 5.0, 1, 200.0).unwrap().len(), 2);
    }

    #[test]
    fn rejects_bad_sampling_rate() {
        for fs in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let err = design_bandpass(0.5, 5.0, 3, fs).unwrap_err();
            assert!(matches!(err, Error::InvalidSamplingRate(_)), "fs = {}", fs);
        }
    }

    #[test]
    fn rejects_cutoffs_outside_nyquist() {
        // nyq = 5 Hz, high cutoff normalizes to 1.0
        assert!(matches!(
            design_bandpass(0.5, 5.0, 3, 10.0),
            Err(Error::InvalidSamplingRate(_))
        ));
        assert!(matches!(
            design_bandpass(0.0, 5.0, 3, 200.0),
            Err(Error::InvalidSamplingRate(_))
        ));
        assert!(matches!(
            design_bandpass(5.0, 0.5, 3, 200.0),
            Err(Error::InvalidSamplingRate(_))
        ));
    }

    #[test]
    fn passband_kept_stopband_removed() {
        let fs = 200.0;
        let pass = sine(1.2, fs, 20.0);
        let stop = sine(40.0, fs, 20.0);
        let f_pass = bandpass_filter(pass.view(), 0.5, 5.0, 3, fs).unwrap();
        let f_stop = bandpass_filter(stop.view(), 0.5, 5.0, 3, fs).unwrap();

        let core = 400..3600;
        let gain_pass = rms(&f_pass.as_slice().unwrap()[core.clone()])
            / rms(&pass.as_slice().unwrap()[core.clone()]);
        let gain_stop = rms(&f_stop.as_slice().unwrap()[core.clone()])
            / rms(&stop.as_slice().unwrap()[core]);
        assert!(gain_pass > 0.9 && gain_pass < 1.1, "pass gain {}", gain_pass);
        assert!(gain_stop < 0.01, "stop gain {}", gain_stop);
    }

    #[test]
    fn zero_phase_keeps_peak_positions() {
        let fs = 200.0;
        let signal = sine(1.0, fs, 10.0);
        let filtered = bandpass_filter(signal.view(), 0.5, 5.0, 3, fs).unwrap();
        // sine peaks at 0.25 s + k, sample 50 + 200k
        for k in 2..8 {
            let center = 50 + 200 * k;
            let window = &filtered.as_slice().unwrap()[center - 20..center + 20];
            let argmax = window
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc })
                .0;
            assert!((argmax as i64 - 20).abs() <= 1, "peak shifted by {}", argmax as i64 - 20);
        }
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let conditioner = SignalConditioner::new(FilterParameters::default(), silent());
        let signal = sine(1.3, 100.0, 15.0).mapv(|v| v + 512.0);
        let a = conditioner.apply(signal.view(), 100.0).unwrap();
        let b = conditioner.apply(signal.view(), 100.0).unwrap();
        assert_eq!(a.len(), signal.len());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn dc_offset_does_not_ring_at_edges() {
        let fs = 100.0;
        let signal = Array1::from_elem(2000, 800.0);
        let filtered = bandpass_filter(signal.view(), 0.5, 5.0, 3, fs).unwrap();
        assert!(filtered.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn warmup_is_bounded_for_tiny_cutoffs() {
        assert_eq!(warmup_len(0.5, 200.0), 4000);
        assert_eq!(warmup_len(1e-9, 200.0), MAX_WARMUP);

        let signal = sine(1.2, 200.0, 0.5);
        let started = std::time::Instant::now();
        let filtered = bandpass_filter(signal.view(), 1e-6, 5.0, 3, 200.0).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(filtered.len(), 100);
        assert!(filtered.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn empty_and_tiny_inputs() {
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(bandpass_filter(empty.view(), 0.5, 5.0, 3, 100.0).unwrap().len(), 0);
        let one = Array1::from_vec(vec![3.0]);
        assert_eq!(bandpass_filter(one.view(), 0.5, 5.0, 3, 100.0).unwrap().len(), 1);
    }
}
