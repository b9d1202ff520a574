use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use slog::{info, Logger};

use crate::analysis::stats::{HrvMetrics, StatisticsSummary};
use crate::error::{Error, Result};

/// Absolute differences between the summaries of two devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub mean_absolute_error: f64,
    pub max_error: f64,
    pub min_error: f64,
    pub std_difference: f64,
}

impl ErrorMetrics {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("mean_absolute_error".to_string(), self.mean_absolute_error),
            ("max_error".to_string(), self.max_error),
            ("min_error".to_string(), self.min_error),
            ("std_difference".to_string(), self.std_difference),
        ])
    }
}

pub fn compare(a: &StatisticsSummary, b: &StatisticsSummary) -> Result<ErrorMetrics> {
    for s in [a, b] {
        if s.count == 0 {
            return Err(Error::insufficient("comparison summary", 1, 0));
        }
    }
    Ok(ErrorMetrics {
        mean_absolute_error: (a.mean - b.mean).abs(),
        max_error: (a.max - b.max).abs(),
        min_error: (a.min - b.min).abs(),
        std_difference: (a.std - b.std).abs(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub label_a: String,
    pub label_b: String,
    pub summary_a: StatisticsSummary,
    pub summary_b: StatisticsSummary,
    pub errors: ErrorMetrics,
    pub hrv: Option<HrvMetrics>,
}

impl CalibrationReport {
    /// Flat `<section>.<metric>` map for tabular export.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for (label, summary) in [(&self.label_a, &self.summary_a), (&self.label_b, &self.summary_b)] {
            for (k, v) in summary.to_map() {
                map.insert(format!("{}.{}", label, k), v);
            }
        }
        for (k, v) in self.errors.to_map() {
            map.insert(format!("error.{}", k), v);
        }
        if let Some(hrv) = &self.hrv {
            map.insert("hrv.mean_rr".to_string(), hrv.mean_rr);
            map.insert("hrv.sdnn".to_string(), hrv.sdnn);
            map.insert("hrv.rmssd".to_string(), hrv.rmssd);
            map.insert("hrv.pnn50".to_string(), hrv.pnn50);
        }
        map
    }
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Statistical Analysis ===")?;
        for (label, s) in [(&self.label_a, &self.summary_a), (&self.label_b, &self.summary_b)] {
            writeln!(f)?;
            writeln!(f, "{} (n = {}):", label, s.count)?;
            writeln!(f, "Minimum: {:.2} BPM", s.min)?;
            writeln!(f, "Maximum: {:.2} BPM", s.max)?;
            writeln!(f, "Mean: {:.2} BPM", s.mean)?;
            writeln!(f, "Median: {:.2} BPM", s.median)?;
            writeln!(f, "Standard Deviation: {:.2} BPM", s.std)?;
            if let Some(iqr) = s.iqr {
                writeln!(f, "Interquartile Range: {:.2} BPM", iqr)?;
            }
            if let (Some(skew), Some(kurt)) = (s.skewness, s.kurtosis) {
                writeln!(f, "Skewness: {:.3}", skew)?;
                writeln!(f, "Kurtosis: {:.3}", kurt)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "=== Error Analysis ===")?;
        writeln!(f, "Mean Absolute Error: {:.2} BPM", self.errors.mean_absolute_error)?;
        writeln!(f, "Max Error: {:.2} BPM", self.errors.max_error)?;
        writeln!(f, "Min Error: {:.2} BPM", self.errors.min_error)?;
        writeln!(f, "SD Difference: {:.2} BPM", self.errors.std_difference)?;
        if let Some(hrv) = &self.hrv {
            writeln!(f)?;
            writeln!(f, "=== Heart Rate Variability ===")?;
            writeln!(f, "SDNN: {:.2} ms", hrv.sdnn)?;
            writeln!(f, "RMSSD: {:.2} ms", hrv.rmssd)?;
            writeln!(f, "pNN50: {:.1}%", hrv.pnn50)?;
        }
        Ok(())
    }
}

pub struct ComparisonReporter {
    logger: Logger,
}

impl ComparisonReporter {
    pub fn new(logger: Logger) -> Self {
        ComparisonReporter { logger }
    }

    pub fn report(
        &self,
        label_a: &str,
        summary_a: StatisticsSummary,
        label_b: &str,
        summary_b: StatisticsSummary,
        hrv: Option<HrvMetrics>,
    ) -> Result<CalibrationReport> {
        let errors = compare(&summary_a, &summary_b)?;
        info!(self.logger, "comparison";
            "a" => label_a, "b" => label_b,
            "mae" => errors.mean_absolute_error, "max_error" => errors.max_error,
            "min_error" => errors.min_error, "sd_diff" => errors.std_difference);
        Ok(CalibrationReport {
            label_a: label_a.to_string(),
            label_b: label_b.to_string(),
            summary_a,
            summary_b,
            errors,
            hrv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stats::summarize;
    use crate::log::silent;

    const LEVELS: [u8; 4] = [25, 50, 75, 95];

    #[test]
    fn mae_of_means_is_exact() {
        let a = summarize(&[85.0, 90.0, 95.0], &LEVELS).unwrap();
        let b = summarize(&[90.0, 95.0, 100.0], &LEVELS).unwrap();
        let e = compare(&a, &b).unwrap();
        assert_eq!(e.mean_absolute_error, 5.0);
        assert_eq!(e.max_error, 5.0);
        assert_eq!(e.min_error, 5.0);
        assert_eq!(e.std_difference, 0.0);
    }

    #[test]
    fn errors_are_symmetric() {
        let a = summarize(&[60.0, 70.0, 80.0, 120.0], &LEVELS).unwrap();
        let b = summarize(&[65.0, 66.0, 67.0], &LEVELS).unwrap();
        assert_eq!(compare(&a, &b).unwrap(), compare(&b, &a).unwrap());
    }

    #[test]
    fn empty_summary_is_rejected() {
        let a = summarize(&[90.0], &LEVELS).unwrap();
        let mut empty = a.clone();
        empty.count = 0;
        assert!(matches!(
            compare(&a, &empty),
            Err(Error::InsufficientSamples { .. })
        ));
        assert!(matches!(
            compare(&empty, &a),
            Err(Error::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn report_map_and_text() {
        let a = summarize(&[90.0, 90.0], &LEVELS).unwrap();
        let b = summarize(&[94.0, 96.0, 95.0, 95.0], &LEVELS).unwrap();
        let report = ComparisonReporter::new(silent())
            .report("sensor", a, "reference", b, None)
            .unwrap();

        let map = report.to_map();
        assert_eq!(map["error.mean_absolute_error"], 5.0);
        assert_eq!(map["sensor.mean"], 90.0);
        assert!(map.contains_key("reference.p95"));
        assert!(!map.contains_key("sensor.p95"));
        assert!(!map.keys().any(|k| k.starts_with("hrv.")));

        let text = report.to_string();
        assert!(text.contains("Mean Absolute Error: 5.00 BPM"));
        assert!(text.contains("sensor (n = 2):"));
        assert!(!text.contains("Heart Rate Variability"));
    }

    #[test]
    fn report_serializes_to_json() {
        let a = summarize(&[70.0, 72.0, 74.0, 76.0], &LEVELS).unwrap();
        let b = summarize(&[71.0, 73.0], &LEVELS).unwrap();
        let report = ComparisonReporter::new(silent())
            .report("a", a, "b", b, None)
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"]["mean_absolute_error"], 1.0);
        assert!(json["summary_b"]["percentiles"].is_null());
    }
}
