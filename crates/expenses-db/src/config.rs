//! Engine configuration.

use std::fmt;
use std::str::FromStr;

use expenses_core::{Error, Result};

/// Vector distance operator used to rank similar transactions.
///
/// Must match the operator class of the index built on
/// `desc_embedding`, otherwise ranking falls back to a sequential scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// pgvector `<=>`.
    #[default]
    Cosine,
    /// pgvector `<->`.
    L2,
}

impl DistanceMetric {
    /// The SQL operator for this metric.
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::L2 => "<->",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => f.write_str("cosine"),
            DistanceMetric::L2 => f.write_str("l2"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            other => Err(Error::Config(format!(
                "unknown vector distance '{}', want cosine|l2",
                other
            ))),
        }
    }
}

/// Query engine settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub distance: DistanceMetric,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the distance metric.
    pub fn distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `VECTOR_DISTANCE`: `cosine` (default) or `l2`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(val) = std::env::var("VECTOR_DISTANCE") {
            config.distance = val.parse()?;
        }
        Ok(config)
    }
}
