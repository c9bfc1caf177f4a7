//! Body landmark and pose-frame types.
//!
//! Pose streams are stored as JSONL: one [`PoseFrame`] per line, with an
//! optional `#`-prefixed [`PoseStreamHeader`] line at the top. Landmark
//! coordinates are normalized to `[0.0, 1.0]` relative to the frame.

use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;

/// Monotonic timestamp in nanoseconds since stream start.
pub type TimestampNs = u64;

/// Number of landmarks in a full body pose.
pub const LANDMARK_COUNT: usize = 33;

/// Landmark identities in the 33-point body topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl LandmarkIndex {
    /// Position of this landmark in a landmark set.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Landmarks framing the body for the height/width ratio.
pub const BODY_BOX_LANDMARKS: [LandmarkIndex; 9] = [
    LandmarkIndex::Nose,
    LandmarkIndex::LeftShoulder,
    LandmarkIndex::RightShoulder,
    LandmarkIndex::LeftHip,
    LandmarkIndex::RightHip,
    LandmarkIndex::LeftKnee,
    LandmarkIndex::RightKnee,
    LandmarkIndex::LeftAnkle,
    LandmarkIndex::RightAnkle,
];

/// A single normalized landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized X coordinate [0.0, 1.0].
    pub x: f64,
    /// Normalized Y coordinate [0.0, 1.0].
    pub y: f64,
    /// Estimator confidence that the landmark is visible.
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: 1.0,
        }
    }

    /// Scale to pixel coordinates for a `width x height` frame.
    pub fn to_pixels(&self, width: u32, height: u32) -> Point2D {
        Point2D::new(self.x * width as f64, self.y * height as f64)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Pose estimator output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Monotonic nanoseconds since stream start.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Landmarks indexed by [`LandmarkIndex`], or `None` when no body was
    /// detected in the frame.
    #[serde(default)]
    pub landmarks: Option<Vec<Landmark>>,
}

impl PoseFrame {
    /// A frame with a detected body.
    pub fn detected(
        timestamp_ns: TimestampNs,
        width: u32,
        height: u32,
        landmarks: Vec<Landmark>,
    ) -> Self {
        Self {
            timestamp_ns,
            width,
            height,
            landmarks: Some(landmarks),
        }
    }

    /// A frame where the estimator found nobody.
    pub fn no_detection(timestamp_ns: TimestampNs, width: u32, height: u32) -> Self {
        Self {
            timestamp_ns,
            width,
            height,
            landmarks: None,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.landmarks.is_some()
    }

    /// Look up a landmark, if detected and present.
    pub fn landmark(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.landmarks.as_ref()?.get(index.index())
    }

    /// Timestamp as fractional seconds since stream start.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1_000_000_000.0
    }
}

/// Metadata written as the first (`#`-prefixed) line of a pose stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStreamHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Where the poses came from (estimator name, "synthetic", ...).
    pub source: String,

    /// Nominal frame rate.
    pub fps: u32,

    /// Frame dimensions in pixels.
    pub width: u32,
    pub height: u32,
}

impl PoseStreamHeader {
    pub fn new(source: impl Into<String>, fps: u32, width: u32, height: u32) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            source: source.into(),
            fps,
            width,
            height,
        }
    }

    /// Render as a JSONL header line.
    pub fn to_header_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("# {}", serde_json::to_string(self)?))
    }

    /// Parse a `# {...}` header line. Returns `None` for other lines.
    pub fn from_header_line(line: &str) -> Option<PoseStreamHeader> {
        let body = line.trim().strip_prefix('#')?;
        serde_json::from_str(body.trim()).ok()
    }
}

/// Parse a single JSONL line. Blank and `#` lines yield `None`.
pub fn parse_pose_line(line: &str) -> Option<Result<PoseFrame, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

/// Parse pose frames from JSONL content (one JSON object per line).
pub fn parse_pose_frames(jsonl: &str) -> Result<Vec<PoseFrame>, serde_json::Error> {
    jsonl.lines().filter_map(parse_pose_line).collect()
}

/// Serialize frames to JSONL with a header line.
pub fn write_pose_frames(
    header: &PoseStreamHeader,
    frames: &[PoseFrame],
) -> Result<String, serde_json::Error> {
    let mut out = header.to_header_line()?;
    out.push('\n');
    for frame in frames {
        out.push_str(&serde_json::to_string(frame)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_indices_match_topology() {
        assert_eq!(LandmarkIndex::Nose.index(), 0);
        assert_eq!(LandmarkIndex::LeftShoulder.index(), 11);
        assert_eq!(LandmarkIndex::RightShoulder.index(), 12);
        assert_eq!(LandmarkIndex::LeftHip.index(), 23);
        assert_eq!(LandmarkIndex::RightKnee.index(), 26);
        assert_eq!(LandmarkIndex::RightAnkle.index(), 28);
        assert_eq!(LandmarkIndex::RightFootIndex.index(), LANDMARK_COUNT - 1);
    }

    #[test]
    fn test_landmark_to_pixels() {
        let p = Landmark::new(0.25, 0.5).to_pixels(640, 480);
        assert_eq!(p, Point2D::new(160.0, 240.0));
    }

    #[test]
    fn test_parse_frames_with_header_and_gaps() {
        let jsonl = r#"# {"schema_version":"1.0","source":"test","fps":30,"width":640,"height":480}
{"t":0,"width":640,"height":480,"landmarks":[{"x":0.5,"y":0.5}]}

{"t":33333333,"width":640,"height":480,"landmarks":null}
{"t":66666666,"width":640,"height":480}
"#;
        let frames = parse_pose_frames(jsonl).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].is_detected());
        assert_eq!(frames[0].landmarks.as_ref().unwrap()[0].visibility, 1.0);
        assert!(!frames[1].is_detected());
        assert!(!frames[2].is_detected());

        let header = PoseStreamHeader::from_header_line(jsonl.lines().next().unwrap()).unwrap();
        assert_eq!(header.fps, 30);
        assert_eq!(header.source, "test");
    }

    #[test]
    fn test_landmark_lookup_out_of_range() {
        let frame = PoseFrame::detected(0, 640, 480, vec![Landmark::new(0.1, 0.2)]);
        assert!(frame.landmark(LandmarkIndex::Nose).is_some());
        assert!(frame.landmark(LandmarkIndex::LeftHip).is_none());
        assert!(PoseFrame::no_detection(0, 640, 480)
            .landmark(LandmarkIndex::Nose)
            .is_none());
    }

    #[test]
    fn test_write_then_parse_keeps_detection_state() {
        let header = PoseStreamHeader::new("test", 30, 320, 240);
        let frames = vec![
            PoseFrame::detected(0, 320, 240, vec![Landmark::new(0.5, 0.5)]),
            PoseFrame::no_detection(1, 320, 240),
        ];
        let jsonl = write_pose_frames(&header, &frames).unwrap();
        assert!(jsonl.starts_with("# "));
        assert_eq!(parse_pose_frames(&jsonl).unwrap(), frames);
    }
}
