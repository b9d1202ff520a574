use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Sampling rate or filter band that cannot be designed against.
    #[error("invalid sampling rate: {0}")]
    InvalidSamplingRate(String),

    #[error("insufficient samples for {what}: needed {needed}, found {found}")]
    InsufficientSamples {
        what: &'static str,
        needed: usize,
        found: usize,
    },

    /// Required column absent from an ingested table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("mismatched series: {0}")]
    MismatchedSeries(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn insufficient(what: &'static str, needed: usize, found: usize) -> Self {
        Error::InsufficientSamples {
            what,
            needed,
            found,
        }
    }
}
