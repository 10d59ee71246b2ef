//! Shared data models for the VTrack tracking pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes in frame-pixel coordinates
//! - Per-frame tracking results and status
//! - Tracking algorithm selection
//! - Reduced motion keyframes for animation export

pub mod algorithm;
pub mod keyframe;
pub mod rect;
pub mod result;

// Re-export common types
pub use algorithm::{AlgorithmParseError, TrackingAlgorithm};
pub use keyframe::MotionKeyframe;
pub use rect::BoundingBox;
pub use result::{TrackStatus, TrackingResult};
