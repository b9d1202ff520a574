use serde::{Deserialize, Serialize};
use slog::{info, o, Logger};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::signal::{rr_intervals_ms, PeakEvent, RateSample, TimeSeries, Waveform};

pub mod align;
pub mod filter;
pub mod ppg;
pub mod report;
pub mod stats;
pub mod window;

use align::{AlignedPair, TemporalAligner};
use filter::SignalConditioner;
use ppg::{PeakDetector, PeakRateExtractor};
use report::{CalibrationReport, ComparisonReporter};
use stats::{CalibrationStatistics, HrvMetrics, RecordingSummary, StatisticsSummary};
use window::{CalibrationWindow, WindowAggregator};

/// Output of a rate extractor. `peaks` is empty when the extractor only
/// reports rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateExtraction {
    pub conditioned: Option<Waveform>,
    pub peaks: Vec<PeakEvent>,
    pub rates: Vec<RateSample>,
}

/// Turns a waveform into instantaneous heart-rate samples.
pub trait RateExtractor {
    fn extract(&self, waveform: &Waveform) -> Result<RateExtraction>;
}

/// Rates produced elsewhere, e.g. by a third-party processing toolkit.
pub struct PrecomputedRates {
    rates: Vec<RateSample>,
}

impl PrecomputedRates {
    pub fn new(rates: Vec<RateSample>) -> Self {
        PrecomputedRates { rates }
    }

    pub fn from_series(series: &TimeSeries) -> Self {
        PrecomputedRates::new(
            series
                .samples
                .iter()
                .map(|s| RateSample {
                    time: s.time,
                    bpm: s.value,
                })
                .collect(),
        )
    }
}

impl RateExtractor for PrecomputedRates {
    fn extract(&self, _waveform: &Waveform) -> Result<RateExtraction> {
        if self.rates.is_empty() {
            return Err(Error::insufficient("precomputed rates", 1, 0));
        }
        Ok(RateExtraction {
            conditioned: None,
            peaks: Vec::new(),
            rates: self.rates.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRun {
    pub extraction: RateExtraction,
    pub windows: Vec<CalibrationWindow>,
    pub rate_summary: StatisticsSummary,
    pub window_summary: Option<StatisticsSummary>,
    pub hrv: Option<HrvMetrics>,
    pub recording: Option<RecordingSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub pairs: Vec<AlignedPair>,
    pub report: CalibrationReport,
}

/// Composes the stages with one configuration and logger.
pub struct Analysis {
    pub config: PipelineConfig,
    logger: Logger,
}

impl Analysis {
    pub fn new(config: PipelineConfig, logger: Logger) -> Self {
        Analysis { config, logger }
    }

    fn stage_logger(&self, stage: &'static str) -> Logger {
        self.logger.new(o!("stage" => stage))
    }

    pub fn conditioner(&self) -> SignalConditioner {
        SignalConditioner::new(self.config.filter.clone(), self.stage_logger("filter"))
    }

    pub fn detector(&self) -> PeakDetector {
        PeakDetector::new(self.config.peaks.clone(), self.stage_logger("peaks"))
    }

    pub fn extractor(&self) -> PeakRateExtractor {
        PeakRateExtractor {
            conditioner: self.conditioner(),
            detector: self.detector(),
        }
    }

    pub fn aggregator(&self) -> WindowAggregator {
        WindowAggregator::new(self.config.window.clone(), self.stage_logger("window"))
    }

    pub fn aligner(&self) -> TemporalAligner {
        TemporalAligner::new(self.config.align.clone(), self.stage_logger("align"))
    }

    pub fn statistics(&self) -> CalibrationStatistics {
        CalibrationStatistics::new(self.config.stats.clone(), self.stage_logger("stats"))
    }

    pub fn reporter(&self) -> ComparisonReporter {
        ComparisonReporter::new(self.stage_logger("report"))
    }

    /// Filter, detect and window a raw waveform.
    pub fn calibrate(&self, waveform: &Waveform) -> Result<CalibrationRun> {
        self.calibrate_with(&self.extractor(), waveform)
    }

    pub fn calibrate_with(
        &self,
        extractor: &dyn RateExtractor,
        waveform: &Waveform,
    ) -> Result<CalibrationRun> {
        let extraction = extractor.extract(waveform)?;
        let stats = self.statistics();
        let bpm: Vec<f64> = extraction.rates.iter().map(|r| r.bpm).collect();
        let rate_summary = stats.summarize(&bpm)?;

        let (windows, hrv, recording) = if extraction.peaks.is_empty() {
            (Vec::new(), None, None)
        } else {
            let windows = self.aggregator().aggregate(&extraction.rates, &extraction.peaks)?;
            let hrv = stats.hrv(&rr_intervals_ms(&extraction.peaks)).ok();
            let recording = RecordingSummary::from_peaks(&extraction.peaks).ok();
            (windows, hrv, recording)
        };

        let window_summary = if windows.is_empty() {
            None
        } else {
            let means: Vec<f64> = windows.iter().map(|w| w.mean_rate).collect();
            Some(stats.summarize(&means)?)
        };

        info!(self.logger, "calibration run";
            "samples" => waveform.len(), "peaks" => extraction.peaks.len(),
            "rates" => extraction.rates.len(), "windows" => windows.len(),
            "mean_bpm" => rate_summary.mean);

        Ok(CalibrationRun {
            extraction,
            windows,
            rate_summary,
            window_summary,
            hrv,
            recording,
        })
    }

    /// Aligns two rate series over `[start, end]` and compares their
    /// statistics.
    pub fn compare(
        &self,
        label_a: &str,
        a: &TimeSeries,
        label_b: &str,
        b: &TimeSeries,
        start: f64,
        end: f64,
    ) -> Result<Comparison> {
        let pairs = self.aligner().align(a, b, start, end)?;
        let values_a: Vec<f64> = pairs.iter().filter_map(|p| p.value_a).collect();
        let values_b: Vec<f64> = pairs.iter().filter_map(|p| p.value_b).collect();
        if values_a.is_empty() || values_b.is_empty() {
            return Err(Error::insufficient(
                "comparison (aligned values)",
                1,
                values_a.len().min(values_b.len()),
            ));
        }

        let stats = self.statistics();
        let summary_a = stats.summarize(&values_a)?;
        let summary_b = stats.summarize(&values_b)?;
        let report = self
            .reporter()
            .report(label_a, summary_a, label_b, summary_b, None)?;
        Ok(Comparison { pairs, report })
    }
}
