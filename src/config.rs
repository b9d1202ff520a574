use serde::{Deserialize, Serialize};

use crate::analysis::align::AlignParameters;
use crate::analysis::filter::FilterParameters;
use crate::analysis::ppg::PeakParameters;
use crate::analysis::stats::StatsParameters;
use crate::analysis::window::WindowParameters;
use crate::error::Result;

/// Every tunable of the pipeline. Missing sections and keys take their
/// defaults, so an empty document is a valid configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter: FilterParameters,
    pub peaks: PeakParameters,
    pub window: WindowParameters,
    pub align: AlignParameters,
    pub stats: StatsParameters,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
