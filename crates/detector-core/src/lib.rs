//! Fallwatch Detector Core — The Fall-Decision Engine
//!
//! Turns a stream of body landmarks into a debounced fall/no-fall decision:
//! - **Features:** shoulder/hip/knee midpoints, body box, height/width ratio
//! - **Kinematics:** per-keypoint finite-difference velocity and acceleration
//! - **Scoring:** swappable strategies voting on four independent criteria
//! - **Hysteresis:** enter on sustained positives, re-arm on sustained recovery
//!
//! This crate performs no I/O and owns no threads.
//! Frames go in one at a time; decisions and alert intents come out.

pub mod engine;
pub mod features;
pub mod hysteresis;
pub mod kinematics;
pub mod scoring;

pub use engine::{AlertIntent, FallEngine, FrameDecision, Observation};
pub use hysteresis::{EpisodePhase, FallEpisodeState, HysteresisMachine, Transition};
pub use kinematics::KinematicsTracker;
pub use scoring::{
    scorer_for, FallScorer, FrameFeatures, MotionThresholds, RatioScorer, ScoreVector,
    TorsoAngleScorer, Verdict,
};
