//! Evidence capture: frame history plus composition on demand.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use fallwatch_common::config::EvidenceConfig;
use fallwatch_common::error::FallwatchResult;

use crate::compositor::EvidenceComposer;
use crate::ring_buffer::FrameRingBuffer;

/// A composed evidence image ready for delivery.
#[derive(Debug, Clone)]
pub struct EvidenceArtifact {
    /// JPEG-encoded composite.
    pub jpeg: Vec<u8>,
    pub caption: String,
    /// Frames in the composite, triggering frame included.
    pub tiles: usize,
    pub width: u32,
    pub height: u32,
    /// Where the composite was written, if persistence is enabled and
    /// succeeded.
    pub saved_to: Option<PathBuf>,
}

/// Owns the raw frame history of one stream.
#[derive(Debug)]
pub struct EvidenceCapture {
    buffer: FrameRingBuffer<RgbImage>,
    composer: EvidenceComposer,
    strip_frames: usize,
    save_dir: Option<PathBuf>,
}

impl EvidenceCapture {
    pub fn new(composer: EvidenceComposer, buffer_capacity: usize, strip_frames: usize) -> Self {
        Self {
            buffer: FrameRingBuffer::new(buffer_capacity),
            composer,
            strip_frames,
            save_dir: None,
        }
    }

    pub fn from_config(config: &EvidenceConfig) -> FallwatchResult<Self> {
        config.validate()?;
        let composer = EvidenceComposer::from_config(config)?;
        Ok(Self::new(composer, config.buffer_capacity, config.strip_frames)
            .with_save_dir(config.save_dir.clone()))
    }

    /// Also write every composite under `dir`.
    pub fn with_save_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.save_dir = dir;
        self
    }

    /// Record a frame after it has been processed.
    pub fn push(&mut self, frame: RgbImage) {
        self.buffer.push(frame);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Compose the last `strip_frames` buffered frames plus `current`.
    ///
    /// With an empty history only `current` is used. `file_stamp` names
    /// the saved file; a failed save is logged and does not fail the
    /// capture.
    pub fn capture(
        &self,
        current: &RgbImage,
        caption: impl Into<String>,
        file_stamp: &str,
    ) -> FallwatchResult<EvidenceArtifact> {
        let mut frames: Vec<&RgbImage> = self.buffer.latest(self.strip_frames).collect();
        frames.push(current);

        let composite = self.composer.compose(&frames)?;
        let jpeg = self.composer.encode_jpeg(&composite)?;
        debug!(
            tiles = frames.len(),
            bytes = jpeg.len(),
            "Evidence composed"
        );

        let saved_to = match &self.save_dir {
            Some(dir) => match save_jpeg(dir, file_stamp, &jpeg) {
                Ok(path) => {
                    info!(path = %path.display(), "Evidence saved");
                    Some(path)
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to save evidence");
                    None
                }
            },
            None => None,
        };

        Ok(EvidenceArtifact {
            jpeg,
            caption: caption.into(),
            tiles: frames.len(),
            width: composite.width(),
            height: composite.height(),
            saved_to,
        })
    }
}

/// Write `jpeg` as `fall_detected_<stamp>.jpg` under `dir`.
pub fn save_jpeg(dir: &Path, stamp: &str, jpeg: &[u8]) -> FallwatchResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("fall_detected_{stamp}.jpg"));
    std::fs::write(&path, jpeg)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::BANNER_HEIGHT;
    use image::Rgb;

    fn frame(value: u8) -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb([value, value, value]))
    }

    fn capture() -> EvidenceCapture {
        EvidenceCapture::new(EvidenceComposer::new(3, 85), 15, 5)
    }

    #[test]
    fn test_cold_start_uses_current_frame_only() {
        let artifact = capture()
            .capture(&frame(1), "Fall detected at now", "cold")
            .unwrap();
        assert_eq!(artifact.tiles, 1);
        assert_eq!((artifact.width, artifact.height), (64, BANNER_HEIGHT + 48));
        assert_eq!(artifact.caption, "Fall detected at now");
        assert!(artifact.saved_to.is_none());
    }

    #[test]
    fn test_strip_is_last_five_plus_current() {
        let mut evidence = capture();
        for i in 0..20 {
            evidence.push(frame(i));
        }
        assert_eq!(evidence.buffered(), 15);

        let artifact = evidence.capture(&frame(200), "c", "x").unwrap();
        assert_eq!(artifact.tiles, 6);
        assert_eq!((artifact.width, artifact.height), (192, BANNER_HEIGHT + 96));
        assert!(!artifact.jpeg.is_empty());
    }

    #[test]
    fn test_short_history() {
        let mut evidence = capture();
        evidence.push(frame(0));
        evidence.push(frame(1));
        let artifact = evidence.capture(&frame(2), "c", "x").unwrap();
        assert_eq!(artifact.tiles, 3);
        assert_eq!(artifact.width, 192);
    }

    #[test]
    fn test_saves_to_dir() {
        let dir = std::env::temp_dir().join("fallwatch_test_evidence_save");
        let _ = std::fs::remove_dir_all(&dir);

        let evidence = capture().with_save_dir(Some(dir.clone()));
        let artifact = evidence
            .capture(&frame(9), "c", "2024-01-01_00-00-00")
            .unwrap();

        let path = artifact.saved_to.unwrap();
        assert_eq!(path, dir.join("fall_detected_2024-01-01_00-00-00.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), artifact.jpeg);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_save_still_returns_artifact() {
        let blocker = std::env::temp_dir().join("fallwatch_test_evidence_blocker");
        let _ = std::fs::remove_dir_all(&blocker);
        std::fs::write(&blocker, b"not a directory").unwrap();

        let evidence = capture().with_save_dir(Some(blocker.join("nested")));
        let artifact = evidence.capture(&frame(9), "c", "x").unwrap();
        assert!(artifact.saved_to.is_none());
        assert!(!artifact.jpeg.is_empty());

        let _ = std::fs::remove_file(&blocker);
    }
}
