use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::signal::Waveform;

/// Synthetic PPG: a systolic bump with a smaller diastolic wave each beat,
/// on a constant baseline, plus optional seeded uniform noise.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseTrain {
    /// Beats per second (1.2 Hz is 72 bpm).
    pub beat_hz: f64,
    pub sampling_rate: f64,
    pub duration: f64,
    pub amplitude: f64,
    pub baseline: f64,
    /// Half-width of the uniform noise; zero disables it.
    pub noise: f64,
    pub seed: u64,
}

impl Default for PulseTrain {
    fn default() -> Self {
        PulseTrain {
            beat_hz: 1.2,
            sampling_rate: 200.0,
            duration: 60.0,
            amplitude: 1.0,
            baseline: 512.0,
            noise: 0.0,
            seed: 7,
        }
    }
}

impl PulseTrain {
    pub fn waveform(&self) -> Result<Waveform> {
        let n = (self.duration * self.sampling_rate).round() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let values = (0..n)
            .map(|i| {
                let t = i as f64 / self.sampling_rate;
                let phase = (t * self.beat_hz).fract();
                let mut v = self.baseline + self.amplitude * pulse_shape(phase);
                if self.noise > 0.0 {
                    v += rng.gen_range(-self.noise..=self.noise);
                }
                v
            })
            .collect();
        Waveform::from_values(values, self.sampling_rate, 0.0)
    }

    /// Beats in the generated span whose systolic maximum lies inside it.
    pub fn expected_beats(&self) -> usize {
        (self.duration * self.beat_hz - SYSTOLIC_PHASE).ceil().max(0.0) as usize
    }
}

const SYSTOLIC_PHASE: f64 = 0.25;

fn pulse_shape(phase: f64) -> f64 {
    let bump = |center: f64, width: f64| (-((phase - center) / width).powi(2) / 2.0).exp();
    bump(SYSTOLIC_PHASE, 0.08) + 0.35 * bump(0.55, 0.12)
}
