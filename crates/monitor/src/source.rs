//! Pose and raw-frame sources.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use fallwatch_common::error::{FallwatchError, FallwatchResult};
use fallwatch_pose_model::{parse_pose_line, PoseFrame, PoseStreamHeader};

/// Supplies pose estimates one frame at a time.
pub trait PoseSource: Send {
    /// The next frame, `None` at end of stream. An `Err` affects only that
    /// frame; the caller may keep reading.
    fn next_pose(&mut self) -> Option<FallwatchResult<PoseFrame>>;

    /// Stream metadata, if the source carries any.
    fn header(&self) -> Option<&PoseStreamHeader> {
        None
    }
}

/// Supplies the raw image for the current frame.
pub trait FrameSource: Send {
    /// The next frame, `Ok(None)` once the source is exhausted. `width`
    /// and `height` are the pose frame's size.
    fn next_frame(&mut self, width: u32, height: u32) -> FallwatchResult<Option<RgbImage>>;
}

/// Replays a JSONL pose stream from disk.
pub struct JsonlPoseSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
    header: Option<PoseStreamHeader>,
    /// First line, when it turned out not to be a header.
    pending: Option<String>,
}

impl JsonlPoseSource {
    pub fn open(path: &Path) -> FallwatchResult<Self> {
        if !path.exists() {
            return Err(FallwatchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut lines = BufReader::new(File::open(path)?).lines();
        let first = lines.next().transpose()?;
        let header = first.as_deref().and_then(PoseStreamHeader::from_header_line);
        let pending = if header.is_some() { None } else { first };

        Ok(Self {
            path: path.to_path_buf(),
            lines,
            line_number: if header.is_some() { 1 } else { 0 },
            header,
            pending,
        })
    }

    fn next_line(&mut self) -> Option<std::io::Result<String>> {
        match self.pending.take() {
            Some(line) => Some(Ok(line)),
            None => self.lines.next(),
        }
    }
}

impl PoseSource for JsonlPoseSource {
    fn next_pose(&mut self) -> Option<FallwatchResult<PoseFrame>> {
        loop {
            let line = match self.next_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;
            match parse_pose_line(&line) {
                None => continue,
                Some(Ok(frame)) => return Some(Ok(frame)),
                Some(Err(e)) => {
                    return Some(Err(FallwatchError::input(format!(
                        "{}:{}: {e}",
                        self.path.display(),
                        self.line_number
                    ))))
                }
            }
        }
    }

    fn header(&self) -> Option<&PoseStreamHeader> {
        self.header.as_ref()
    }
}

/// In-memory pose source.
#[derive(Debug, Default)]
pub struct VecPoseSource {
    frames: VecDeque<PoseFrame>,
    header: Option<PoseStreamHeader>,
}

impl VecPoseSource {
    pub fn new(frames: Vec<PoseFrame>) -> Self {
        Self {
            frames: frames.into(),
            header: None,
        }
    }

    pub fn with_header(mut self, header: PoseStreamHeader) -> Self {
        self.header = Some(header);
        self
    }
}

impl PoseSource for VecPoseSource {
    fn next_pose(&mut self) -> Option<FallwatchResult<PoseFrame>> {
        self.frames.pop_front().map(Ok)
    }

    fn header(&self) -> Option<&PoseStreamHeader> {
        self.header.as_ref()
    }
}

/// Image files from a directory, in file-name order.
#[derive(Debug)]
pub struct ImageDirFrameSource {
    files: Vec<PathBuf>,
    next: usize,
}

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

impl ImageDirFrameSource {
    pub fn open(dir: &Path) -> FallwatchResult<Self> {
        if !dir.is_dir() {
            return Err(FallwatchError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if is_image {
                files.push(path);
            }
        }
        files.sort();
        tracing::debug!(dir = %dir.display(), count = files.len(), "Frame directory opened");
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirFrameSource {
    fn next_frame(&mut self, _width: u32, _height: u32) -> FallwatchResult<Option<RgbImage>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let image = image::open(path).map_err(|e| {
            FallwatchError::evidence(format!("failed to read frame {}: {e}", path.display()))
        })?;
        Ok(Some(image.to_rgb8()))
    }
}

/// Solid frames for pose-only replays.
#[derive(Debug, Clone, Copy)]
pub struct BlankFrameSource {
    color: Rgb<u8>,
}

impl BlankFrameSource {
    pub fn new(color: Rgb<u8>) -> Self {
        Self { color }
    }
}

impl Default for BlankFrameSource {
    fn default() -> Self {
        Self::new(Rgb([32, 32, 40]))
    }
}

impl FrameSource for BlankFrameSource {
    fn next_frame(&mut self, width: u32, height: u32) -> FallwatchResult<Option<RgbImage>> {
        if width == 0 || height == 0 {
            return Ok(None);
        }
        Ok(Some(RgbImage::from_pixel(width, height, self.color)))
    }
}
