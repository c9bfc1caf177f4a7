//! Fallwatch Pose Model
//!
//! Defines the data contracts between the external pose estimator and the
//! fall-decision engine:
//! - **Landmarks:** the 33-point body topology, normalized to `[0.0, 1.0]`
//! - **Pose frames:** one landmark set (or none) per video frame, as JSONL
//! - **Geometry:** pixel-space points, motion vectors, bounding boxes
//! - **Synthetic:** deterministic fall sequences for replays and tests

pub mod geometry;
pub mod landmark;
pub mod synthetic;

pub use geometry::*;
pub use landmark::*;
