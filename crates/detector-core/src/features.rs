//! Per-frame keypoint feature extraction.
//!
//! Pure function of the landmark set and frame size: resolves the
//! shoulder/hip/knee midpoints and the body bounding box in pixel space.

use serde::Serialize;

use fallwatch_common::error::{FallwatchError, FallwatchResult};
use fallwatch_pose_model::{
    BoundingBox, Landmark, LandmarkIndex, Point2D, PoseFrame, BODY_BOX_LANDMARKS,
};

/// Midpoint keypoints in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodyKeypoints {
    pub shoulder: Point2D,
    pub hip: Point2D,
    pub knee: Point2D,
}

/// Static (single-frame) body geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodyGeometry {
    pub keypoints: BodyKeypoints,
    pub bbox: BoundingBox,
    /// `bbox` height over width, `1.0` when the box has no width.
    pub height_width_ratio: f64,
    /// Tilt of the shoulder-to-hip axis away from vertical, in degrees.
    /// `0` is upright, `90` is horizontal.
    pub torso_angle_deg: f64,
}

/// Result of extracting features from one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extraction {
    /// The estimator found nobody in the frame.
    NoDetection,
    Body(BodyGeometry),
}

/// Extract body geometry from a pose frame.
///
/// Returns [`Extraction::NoDetection`] when the frame carries no landmarks,
/// and an input error when the landmark set is unusable.
pub fn extract(frame: &PoseFrame) -> FallwatchResult<Extraction> {
    if frame.width == 0 || frame.height == 0 {
        return Err(FallwatchError::input(format!(
            "frame has zero size {}x{}",
            frame.width, frame.height
        )));
    }

    let Some(landmarks) = frame.landmarks.as_deref() else {
        return Ok(Extraction::NoDetection);
    };

    let pixel = |index: LandmarkIndex| -> FallwatchResult<Point2D> {
        let landmark = required(landmarks, index)?;
        Ok(landmark.to_pixels(frame.width, frame.height))
    };

    let shoulder = Point2D::midpoint(
        &pixel(LandmarkIndex::LeftShoulder)?,
        &pixel(LandmarkIndex::RightShoulder)?,
    );
    let hip = Point2D::midpoint(
        &pixel(LandmarkIndex::LeftHip)?,
        &pixel(LandmarkIndex::RightHip)?,
    );
    let knee = Point2D::midpoint(
        &pixel(LandmarkIndex::LeftKnee)?,
        &pixel(LandmarkIndex::RightKnee)?,
    );

    let box_points = BODY_BOX_LANDMARKS
        .iter()
        .map(|&index| pixel(index))
        .collect::<FallwatchResult<Vec<_>>>()?;
    let bbox = BoundingBox::from_points(box_points)
        .ok_or_else(|| FallwatchError::input("no landmarks for body box"))?;

    Ok(Extraction::Body(BodyGeometry {
        keypoints: BodyKeypoints {
            shoulder,
            hip,
            knee,
        },
        height_width_ratio: bbox.height_width_ratio(),
        torso_angle_deg: torso_angle_deg(&shoulder, &hip),
        bbox,
    }))
}

fn required(landmarks: &[Landmark], index: LandmarkIndex) -> FallwatchResult<&Landmark> {
    let landmark = landmarks.get(index.index()).ok_or_else(|| {
        FallwatchError::input(format!(
            "landmark {:?} (#{}) missing from a set of {}",
            index,
            index.index(),
            landmarks.len()
        ))
    })?;
    if !landmark.is_finite() {
        return Err(FallwatchError::input(format!(
            "landmark {:?} has non-finite coordinates",
            index
        )));
    }
    Ok(landmark)
}

/// Angle between the shoulder→hip axis and the image vertical.
fn torso_angle_deg(shoulder: &Point2D, hip: &Point2D) -> f64 {
    let dx = (hip.x - shoulder.x).abs();
    let dy = (hip.y - shoulder.y).abs();
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dx.atan2(dy).to_degrees()
}
