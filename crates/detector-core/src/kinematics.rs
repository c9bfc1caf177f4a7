//! Finite-difference kinematics for the tracked keypoints.
//!
//! Velocity is the one-frame displacement of a keypoint, acceleration the
//! one-frame change of velocity, both in pixels. Noise is left to the
//! hysteresis stage; optional EMA smoothing only damps the velocity.

use serde::Serialize;

use fallwatch_pose_model::{Point2D, Vector2D};

use crate::features::BodyKeypoints;

/// Carried state for one keypoint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackedPointState {
    pub last_position: Option<Point2D>,
    pub last_velocity: Vector2D,
}

/// Motion of one keypoint in the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PointMotion {
    pub velocity: Vector2D,
    pub acceleration: Vector2D,
}

/// Motion of every tracked keypoint in the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BodyMotion {
    pub shoulder: PointMotion,
    pub hip: PointMotion,
    pub knee: PointMotion,
}

impl TrackedPointState {
    /// Compute motion against the stored state, then overwrite the state
    /// with the current observation.
    ///
    /// `smoothing` is the EMA strength in `[0.0, 1.0)`; `0.0` keeps the raw
    /// finite difference.
    pub fn observe(&mut self, position: Point2D, smoothing: f64) -> PointMotion {
        let motion = match self.last_position {
            Some(previous) => {
                let raw = position - previous;
                let velocity = if smoothing > 0.0 {
                    raw * (1.0 - smoothing) + self.last_velocity * smoothing
                } else {
                    raw
                };
                PointMotion {
                    velocity,
                    acceleration: velocity - self.last_velocity,
                }
            }
            // First observation: nothing to differentiate against.
            None => PointMotion::default(),
        };

        self.last_position = Some(position);
        self.last_velocity = motion.velocity;
        motion
    }
}

/// Tracks shoulder, hip, and knee midpoints across frames.
#[derive(Debug, Clone, Default)]
pub struct KinematicsTracker {
    shoulder: TrackedPointState,
    hip: TrackedPointState,
    knee: TrackedPointState,
    smoothing: f64,
}

impl KinematicsTracker {
    /// Create a tracker. `smoothing` is clamped into `[0.0, 0.99]`.
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 0.99),
            ..Default::default()
        }
    }

    /// Record this frame's keypoints and return their motion.
    ///
    /// Must be called exactly once for every frame with a detected body,
    /// whatever the later fall decision is.
    pub fn update(&mut self, keypoints: &BodyKeypoints) -> BodyMotion {
        BodyMotion {
            shoulder: self.shoulder.observe(keypoints.shoulder, self.smoothing),
            hip: self.hip.observe(keypoints.hip, self.smoothing),
            knee: self.knee.observe(keypoints.knee, self.smoothing),
        }
    }

    pub fn shoulder(&self) -> &TrackedPointState {
        &self.shoulder
    }

    pub fn hip(&self) -> &TrackedPointState {
        &self.hip
    }

    pub fn knee(&self) -> &TrackedPointState {
        &self.knee
    }

    /// Forget all carried state.
    pub fn reset(&mut self) {
        *self = Self::new(self.smoothing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypoints(y: f64) -> BodyKeypoints {
        BodyKeypoints {
            shoulder: Point2D::new(100.0, y - 100.0),
            hip: Point2D::new(100.0, y),
            knee: Point2D::new(100.0, y + 80.0),
        }
    }

    #[test]
    fn test_first_observation_is_still() {
        let mut tracker = KinematicsTracker::new(0.0);
        let motion = tracker.update(&keypoints(200.0));
        assert_eq!(motion, BodyMotion::default());
        assert_eq!(tracker.hip().last_position, Some(Point2D::new(100.0, 200.0)));
        assert_eq!(tracker.hip().last_velocity, Vector2D::ZERO);
    }

    #[test]
    fn test_velocity_and_acceleration() {
        let mut tracker = KinematicsTracker::new(0.0);
        tracker.update(&keypoints(200.0));

        let m1 = tracker.update(&keypoints(210.0));
        assert_eq!(m1.hip.velocity, Vector2D::new(0.0, 10.0));
        assert_eq!(m1.hip.acceleration, Vector2D::new(0.0, 10.0));

        let m2 = tracker.update(&keypoints(235.0));
        assert_eq!(m2.hip.velocity, Vector2D::new(0.0, 25.0));
        assert_eq!(m2.hip.acceleration, Vector2D::new(0.0, 15.0));
        assert_eq!(m2.knee.velocity, m2.hip.velocity);

        assert_eq!(tracker.hip().last_velocity, Vector2D::new(0.0, 25.0));
    }

    #[test]
    fn test_lateral_motion_has_no_vertical_component() {
        let mut state = TrackedPointState::default();
        state.observe(Point2D::new(0.0, 50.0), 0.0);
        let motion = state.observe(Point2D::new(40.0, 50.0), 0.0);
        assert_eq!(motion.velocity.dy, 0.0);
        assert_eq!(motion.acceleration.dy, 0.0);
        assert_eq!(motion.velocity.dx, 40.0);
    }

    #[test]
    fn test_smoothing_damps_sudden_jump() {
        let mut raw = TrackedPointState::default();
        let mut smooth = TrackedPointState::default();
        for p in [Point2D::new(0.0, 0.0), Point2D::new(0.0, 20.0)] {
            raw.observe(p, 0.0);
            smooth.observe(p, 0.5);
        }
        assert_eq!(raw.last_velocity.dy, 20.0);
        assert_eq!(smooth.last_velocity.dy, 10.0);
    }

    #[test]
    fn test_reset_forgets_positions() {
        let mut tracker = KinematicsTracker::new(0.3);
        tracker.update(&keypoints(200.0));
        tracker.reset();
        assert!(tracker.hip().last_position.is_none());
        assert_eq!(tracker.update(&keypoints(300.0)), BodyMotion::default());
    }
}
