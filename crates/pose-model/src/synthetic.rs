//! Deterministic synthetic pose streams.
//!
//! Generates a standing subject that falls with an accelerating (ease-in)
//! drop, lies still, gets back up, and stands again. Used to replay the
//! detector without a camera and as a fixture for tests.

use crate::geometry::Point2D;
use crate::landmark::{Landmark, LandmarkIndex, PoseFrame, PoseStreamHeader, LANDMARK_COUNT};

/// Shape of a synthetic fall sequence.
#[derive(Debug, Clone)]
pub struct SyntheticFallConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Upright frames before each fall and after the last one.
    pub standing_frames: usize,
    /// Frames spent dropping from standing to lying.
    pub fall_frames: usize,
    /// Frames lying still on the floor.
    pub lying_frames: usize,
    /// Frames spent getting back up.
    pub getup_frames: usize,
    /// Number of fall cycles.
    pub falls: usize,
}

impl Default for SyntheticFallConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            standing_frames: 10,
            fall_frames: 6,
            lying_frames: 15,
            getup_frames: 8,
            falls: 1,
        }
    }
}

impl SyntheticFallConfig {
    /// Frame index (0-based) of the last frame of fall number `n`.
    pub fn fall_end_frame(&self, n: usize) -> usize {
        let cycle = self.standing_frames + self.fall_frames + self.lying_frames + self.getup_frames;
        n * cycle + self.standing_frames + self.fall_frames - 1
    }

    /// Total number of frames `fall_sequence` produces.
    pub fn total_frames(&self) -> usize {
        let cycle = self.standing_frames + self.fall_frames + self.lying_frames + self.getup_frames;
        self.falls * cycle + self.standing_frames
    }

    pub fn header(&self) -> PoseStreamHeader {
        PoseStreamHeader::new("synthetic", self.fps, self.width, self.height)
    }
}

/// Normalized positions of the landmarks that matter for fall analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonPose {
    pub nose: Point2D,
    pub left_shoulder: Point2D,
    pub right_shoulder: Point2D,
    pub left_hip: Point2D,
    pub right_hip: Point2D,
    pub left_knee: Point2D,
    pub right_knee: Point2D,
    pub left_ankle: Point2D,
    pub right_ankle: Point2D,
}

impl SkeletonPose {
    /// Upright subject in the middle of the frame.
    pub fn standing() -> Self {
        Self {
            nose: Point2D::new(0.50, 0.15),
            left_shoulder: Point2D::new(0.45, 0.25),
            right_shoulder: Point2D::new(0.55, 0.25),
            left_hip: Point2D::new(0.47, 0.50),
            right_hip: Point2D::new(0.53, 0.50),
            left_knee: Point2D::new(0.47, 0.70),
            right_knee: Point2D::new(0.53, 0.70),
            left_ankle: Point2D::new(0.47, 0.90),
            right_ankle: Point2D::new(0.53, 0.90),
        }
    }

    /// Subject lying across the bottom of the frame.
    pub fn lying() -> Self {
        Self {
            nose: Point2D::new(0.15, 0.85),
            left_shoulder: Point2D::new(0.25, 0.82),
            right_shoulder: Point2D::new(0.25, 0.88),
            left_hip: Point2D::new(0.50, 0.83),
            right_hip: Point2D::new(0.50, 0.89),
            left_knee: Point2D::new(0.68, 0.83),
            right_knee: Point2D::new(0.68, 0.89),
            left_ankle: Point2D::new(0.85, 0.83),
            right_ankle: Point2D::new(0.85, 0.89),
        }
    }

    /// Interpolate every landmark between two poses.
    pub fn lerp(a: &SkeletonPose, b: &SkeletonPose, t: f64) -> SkeletonPose {
        SkeletonPose {
            nose: Point2D::lerp(&a.nose, &b.nose, t),
            left_shoulder: Point2D::lerp(&a.left_shoulder, &b.left_shoulder, t),
            right_shoulder: Point2D::lerp(&a.right_shoulder, &b.right_shoulder, t),
            left_hip: Point2D::lerp(&a.left_hip, &b.left_hip, t),
            right_hip: Point2D::lerp(&a.right_hip, &b.right_hip, t),
            left_knee: Point2D::lerp(&a.left_knee, &b.left_knee, t),
            right_knee: Point2D::lerp(&a.right_knee, &b.right_knee, t),
            left_ankle: Point2D::lerp(&a.left_ankle, &b.left_ankle, t),
            right_ankle: Point2D::lerp(&a.right_ankle, &b.right_ankle, t),
        }
    }

    /// Expand into a full 33-landmark set. Landmarks not modelled here are
    /// attached to their nearest modelled neighbour.
    pub fn to_landmarks(&self) -> Vec<Landmark> {
        use LandmarkIndex::*;

        let mut landmarks = vec![Landmark::new(self.nose.x, self.nose.y); LANDMARK_COUNT];
        let mut set = |index: LandmarkIndex, p: &Point2D| {
            landmarks[index.index()] = Landmark::new(p.x, p.y);
        };

        set(LeftShoulder, &self.left_shoulder);
        set(RightShoulder, &self.right_shoulder);
        set(LeftHip, &self.left_hip);
        set(RightHip, &self.right_hip);
        set(LeftKnee, &self.left_knee);
        set(RightKnee, &self.right_knee);
        set(LeftAnkle, &self.left_ankle);
        set(RightAnkle, &self.right_ankle);

        let left_elbow = Point2D::lerp(&self.left_shoulder, &self.left_hip, 0.5);
        let right_elbow = Point2D::lerp(&self.right_shoulder, &self.right_hip, 0.5);
        for index in [LeftElbow, LeftWrist, LeftPinky, LeftIndex, LeftThumb] {
            set(index, &left_elbow);
        }
        for index in [RightElbow, RightWrist, RightPinky, RightIndex, RightThumb] {
            set(index, &right_elbow);
        }
        for index in [LeftHeel, LeftFootIndex] {
            set(index, &self.left_ankle);
        }
        for index in [RightHeel, RightFootIndex] {
            set(index, &self.right_ankle);
        }

        landmarks
    }
}

/// Generate the full fall sequence described by `config`.
pub fn fall_sequence(config: &SyntheticFallConfig) -> Vec<PoseFrame> {
    let standing = SkeletonPose::standing();
    let lying = SkeletonPose::lying();

    let mut poses = Vec::with_capacity(config.total_frames());
    for _ in 0..config.falls {
        poses.extend(std::iter::repeat(standing).take(config.standing_frames));

        // Ease-in: the drop speeds up every frame.
        for i in 1..=config.fall_frames {
            let t = i as f64 / config.fall_frames as f64;
            poses.push(SkeletonPose::lerp(&standing, &lying, t * t));
        }

        poses.extend(std::iter::repeat(lying).take(config.lying_frames));

        for i in 1..=config.getup_frames {
            let t = i as f64 / config.getup_frames as f64;
            poses.push(SkeletonPose::lerp(&lying, &standing, t));
        }
    }
    poses.extend(std::iter::repeat(standing).take(config.standing_frames));

    let frame_ns = 1_000_000_000 / config.fps.max(1) as u64;
    poses
        .iter()
        .enumerate()
        .map(|(i, pose)| {
            PoseFrame::detected(
                i as u64 * frame_ns,
                config.width,
                config.height,
                pose.to_landmarks(),
            )
        })
        .collect()
}
