//! Tracking algorithm selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported tracking algorithms.
///
/// Selected once at session creation; immutable for the session's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackingAlgorithm {
    /// Kernelized Correlation Filters
    Kcf,
    /// Discriminative Correlation Filter with Channel and Spatial Reliability
    Csrt,
    /// Minimum Output Sum of Squared Error
    Mosse,
    /// Online boosting
    Boosting,
    /// Multiple Instance Learning
    Mil,
    /// Tracking, Learning and Detection
    Tld,
    /// Median Flow
    MedianFlow,
}

impl TrackingAlgorithm {
    /// All supported algorithms, in presentation order.
    pub fn all() -> &'static [TrackingAlgorithm] {
        &[
            TrackingAlgorithm::Kcf,
            TrackingAlgorithm::Csrt,
            TrackingAlgorithm::Mosse,
            TrackingAlgorithm::Boosting,
            TrackingAlgorithm::Mil,
            TrackingAlgorithm::Tld,
            TrackingAlgorithm::MedianFlow,
        ]
    }

    /// Canonical uppercase name.
    pub fn name(&self) -> &'static str {
        match self {
            TrackingAlgorithm::Kcf => "KCF",
            TrackingAlgorithm::Csrt => "CSRT",
            TrackingAlgorithm::Mosse => "MOSSE",
            TrackingAlgorithm::Boosting => "BOOSTING",
            TrackingAlgorithm::Mil => "MIL",
            TrackingAlgorithm::Tld => "TLD",
            TrackingAlgorithm::MedianFlow => "MEDIANFLOW",
        }
    }

    /// Human-readable description for UI listings.
    pub fn description(&self) -> &'static str {
        match self {
            TrackingAlgorithm::Kcf => "Kernelized Correlation Filters (fast, good accuracy)",
            TrackingAlgorithm::Csrt => "Channel and Spatial Reliability (slower, best accuracy)",
            TrackingAlgorithm::Mosse => "Minimum Output Sum of Squared Error (fastest)",
            TrackingAlgorithm::Boosting => "Online boosting (legacy)",
            TrackingAlgorithm::Mil => "Multiple Instance Learning (robust to partial occlusion)",
            TrackingAlgorithm::Tld => "Tracking, Learning and Detection (handles scale change)",
            TrackingAlgorithm::MedianFlow => "Median Flow (reports failure reliably)",
        }
    }
}

impl fmt::Display for TrackingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(Debug, Clone, Error)]
#[error("unknown tracking algorithm: {0}")]
pub struct AlgorithmParseError(pub String);

impl FromStr for TrackingAlgorithm {
    type Err = AlgorithmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "KCF" => Ok(TrackingAlgorithm::Kcf),
            "CSRT" => Ok(TrackingAlgorithm::Csrt),
            "MOSSE" => Ok(TrackingAlgorithm::Mosse),
            "BOOSTING" => Ok(TrackingAlgorithm::Boosting),
            "MIL" => Ok(TrackingAlgorithm::Mil),
            "TLD" => Ok(TrackingAlgorithm::Tld),
            "MEDIANFLOW" | "MEDIAN_FLOW" => Ok(TrackingAlgorithm::MedianFlow),
            other => Err(AlgorithmParseError(other.to_string())),
        }
    }
}
