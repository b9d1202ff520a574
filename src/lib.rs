//! Heart-rate calibration for optical pulse sensors.
//!
//! A raw PPG waveform is band-pass filtered, its pulse peaks are turned into
//! instantaneous rates, and those rates are windowed, summarized and
//! compared against a reference device on a shared time grid.

pub mod analysis;
pub mod config;
pub mod error;
pub mod io;
pub mod log;
pub mod mock;
pub mod signal;

pub use analysis::{Analysis, CalibrationRun, Comparison, PrecomputedRates, RateExtractor};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use signal::{PeakEvent, RateSample, Sample, TimeSeries, Waveform};
