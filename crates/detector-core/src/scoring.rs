//! Multi-criteria fall scoring.
//!
//! Every strategy votes on four independent criteria and a frame counts as
//! a potential fall once `min_votes` of them agree. Only the posture
//! criterion differs between strategies, so the hysteresis stage is shared.

use serde::Serialize;

use fallwatch_common::config::{DetectionConfig, ScoringStrategy};
use fallwatch_pose_model::BoundingBox;

use crate::features::{BodyGeometry, BodyKeypoints};
use crate::kinematics::BodyMotion;

/// Everything a scoring strategy may look at for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameFeatures {
    pub frame_width: u32,
    pub frame_height: u32,
    pub keypoints: BodyKeypoints,
    pub bbox: BoundingBox,
    pub height_width_ratio: f64,
    pub torso_angle_deg: f64,
    /// Downward hip velocity in frame heights per frame.
    pub hip_vertical_velocity: f64,
    /// Change of downward hip velocity in frame heights per frame^2.
    pub hip_vertical_acceleration: f64,
}

impl FrameFeatures {
    /// Combine single-frame geometry with tracked motion.
    ///
    /// Only the vertical hip components feed scoring; they are divided by
    /// the frame height so thresholds do not depend on resolution.
    pub fn from_parts(
        geometry: &BodyGeometry,
        motion: &BodyMotion,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let h = frame_height.max(1) as f64;
        Self {
            frame_width,
            frame_height,
            keypoints: geometry.keypoints,
            bbox: geometry.bbox,
            height_width_ratio: geometry.height_width_ratio,
            torso_angle_deg: geometry.torso_angle_deg,
            hip_vertical_velocity: motion.hip.velocity.dy / h,
            hip_vertical_acceleration: motion.hip.acceleration.dy / h,
        }
    }
}

/// Outcome of the four criteria for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreVector {
    /// Body is lying rather than upright.
    pub posture: bool,
    /// Hip is descending fast.
    pub vertical_velocity: bool,
    /// Hip descent is speeding up.
    pub vertical_acceleration: bool,
    /// Hip is in the lower part of the frame.
    pub low_position: bool,
}

impl ScoreVector {
    /// Number of criteria satisfied, 0..=4.
    pub fn votes(&self) -> u8 {
        [
            self.posture,
            self.vertical_velocity,
            self.vertical_acceleration,
            self.low_position,
        ]
        .iter()
        .filter(|&&hit| hit)
        .count() as u8
    }
}

/// Scores plus the potential-fall decision derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub scores: ScoreVector,
    pub votes: u8,
    pub potential_fall: bool,
}

/// A swappable scoring strategy.
pub trait FallScorer: Send {
    /// Short identifier used in logs and alert intents.
    fn name(&self) -> &'static str;

    /// Evaluate the four criteria.
    fn evaluate(&self, features: &FrameFeatures) -> ScoreVector;

    /// Votes required for a potential fall.
    fn min_votes(&self) -> u8;

    fn judge(&self, features: &FrameFeatures) -> Verdict {
        let scores = self.evaluate(features);
        let votes = scores.votes();
        Verdict {
            scores,
            votes,
            potential_fall: votes >= self.min_votes(),
        }
    }
}

/// Thresholds for the three criteria every strategy shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionThresholds {
    pub velocity: f64,
    pub acceleration: f64,
    pub low_position_fraction: f64,
    pub min_votes: u8,
}

impl MotionThresholds {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            velocity: config.velocity_threshold,
            acceleration: config.acceleration_threshold,
            low_position_fraction: config.low_position_fraction,
            min_votes: config.min_votes,
        }
    }

    fn score(&self, features: &FrameFeatures, posture: bool) -> ScoreVector {
        ScoreVector {
            posture,
            vertical_velocity: features.hip_vertical_velocity > self.velocity,
            vertical_acceleration: features.hip_vertical_acceleration > self.acceleration,
            low_position: features.keypoints.hip.y
                > self.low_position_fraction * features.frame_height as f64,
        }
    }
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

/// Posture from the body box: wider than tall means lying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioScorer {
    pub normal_posture_ratio: f64,
    pub thresholds: MotionThresholds,
}

impl RatioScorer {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            normal_posture_ratio: config.normal_posture_ratio,
            thresholds: MotionThresholds::from_config(config),
        }
    }
}

impl Default for RatioScorer {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl FallScorer for RatioScorer {
    fn name(&self) -> &'static str {
        "ratio"
    }

    fn evaluate(&self, features: &FrameFeatures) -> ScoreVector {
        self.thresholds
            .score(features, features.height_width_ratio < self.normal_posture_ratio)
    }

    fn min_votes(&self) -> u8 {
        self.thresholds.min_votes
    }
}

/// Posture from the torso axis: tilted past the threshold means lying.
/// Unaffected by limbs spreading the body box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoAngleScorer {
    pub angle_threshold_deg: f64,
    pub thresholds: MotionThresholds,
}

impl TorsoAngleScorer {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            angle_threshold_deg: config.torso_angle_threshold_deg,
            thresholds: MotionThresholds::from_config(config),
        }
    }
}

impl Default for TorsoAngleScorer {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl FallScorer for TorsoAngleScorer {
    fn name(&self) -> &'static str {
        "torso_angle"
    }

    fn evaluate(&self, features: &FrameFeatures) -> ScoreVector {
        self.thresholds
            .score(features, features.torso_angle_deg > self.angle_threshold_deg)
    }

    fn min_votes(&self) -> u8 {
        self.thresholds.min_votes
    }
}

/// Build the scorer selected in the configuration.
pub fn scorer_for(config: &DetectionConfig) -> Box<dyn FallScorer> {
    match config.strategy {
        ScoringStrategy::Ratio => Box::new(RatioScorer::from_config(config)),
        ScoringStrategy::TorsoAngle => Box::new(TorsoAngleScorer::from_config(config)),
    }
}
