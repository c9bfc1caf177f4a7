//! Grid composition and JPEG encoding of evidence frames.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use fallwatch_common::config::EvidenceConfig;
use fallwatch_common::error::{FallwatchError, FallwatchResult};

/// Height of the banner strip above the grid.
pub const BANNER_HEIGHT: u32 = 32;

/// Thickness of the alert border around the composite.
pub const BORDER_THICKNESS: u32 = 4;

pub const BANNER_TEXT: &str = "FALL DETECTED!";

const ALERT_RED: Rgb<u8> = Rgb([220, 20, 20]);
const LABEL_GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BANNER_WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const EMPTY_CELL: Rgb<u8> = Rgb([24, 24, 28]);

const PIP_SIZE: u32 = 6;
const PIP_STRIDE: i32 = 10;
const LABEL_MARGIN: i32 = 6;

/// Placement of `tiles` frames in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl GridLayout {
    pub fn new(tiles: usize, max_columns: usize, tile_width: u32, tile_height: u32) -> Self {
        let tiles = tiles.max(1) as u32;
        let columns = (max_columns.max(1) as u32).min(tiles);
        Self {
            columns,
            rows: tiles.div_ceil(columns),
            tile_width,
            tile_height,
        }
    }

    pub fn width(&self) -> u32 {
        self.columns * self.tile_width
    }

    pub fn height(&self) -> u32 {
        BANNER_HEIGHT + self.rows * self.tile_height
    }

    /// Top-left corner of tile `index`.
    pub fn origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let col = index % self.columns;
        let row = index / self.columns;
        (col * self.tile_width, BANNER_HEIGHT + row * self.tile_height)
    }
}

/// Lays frames out in a labelled grid and encodes the result.
pub struct EvidenceComposer {
    max_columns: usize,
    jpeg_quality: u8,
    font: Option<FontVec>,
}

impl EvidenceComposer {
    pub fn new(max_columns: usize, jpeg_quality: u8) -> Self {
        Self {
            max_columns: max_columns.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            font: None,
        }
    }

    /// Label tiles with text instead of index pips.
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn from_config(config: &EvidenceConfig) -> FallwatchResult<Self> {
        let composer = Self::new(config.grid_columns, config.jpeg_quality);
        match &config.font_path {
            Some(path) => Ok(composer.with_font(load_font(path)?)),
            None => Ok(composer),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Compose `frames` (oldest first, triggering frame last) into one
    /// image. Every tile takes the size of the first frame.
    pub fn compose(&self, frames: &[&RgbImage]) -> FallwatchResult<RgbImage> {
        let first = frames
            .first()
            .ok_or_else(|| FallwatchError::evidence("no frames to compose"))?;
        let (tile_width, tile_height) = first.dimensions();
        if tile_width == 0 || tile_height == 0 {
            return Err(FallwatchError::evidence("evidence frame has zero size"));
        }

        let layout = GridLayout::new(frames.len(), self.max_columns, tile_width, tile_height);
        let mut canvas = RgbImage::from_pixel(layout.width(), layout.height(), EMPTY_CELL);

        for (index, frame) in frames.iter().enumerate() {
            let (x, y) = layout.origin(index);
            if frame.dimensions() == (tile_width, tile_height) {
                imageops::replace(&mut canvas, *frame, x as i64, y as i64);
            } else {
                let tile = imageops::resize(*frame, tile_width, tile_height, FilterType::Triangle);
                imageops::replace(&mut canvas, &tile, x as i64, y as i64);
            }
            self.label_tile(&mut canvas, x as i32, y as i32, index + 1);
        }

        self.draw_banner(&mut canvas);
        draw_border(&mut canvas);
        Ok(canvas)
    }

    /// Encode an image as JPEG bytes.
    pub fn encode_jpeg(&self, image: &RgbImage) -> FallwatchResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
        image
            .write_with_encoder(encoder)
            .map_err(|e| FallwatchError::evidence(format!("JPEG encoding failed: {e}")))?;
        Ok(buf.into_inner())
    }

    fn label_tile(&self, canvas: &mut RgbImage, x: i32, y: i32, sequence: usize) {
        match &self.font {
            Some(font) => {
                let scale = PxScale::from(22.0);
                let text = format!("Frame {sequence}");
                draw_text_mut(
                    canvas,
                    LABEL_GREEN,
                    x + LABEL_MARGIN,
                    y + LABEL_MARGIN,
                    scale,
                    font,
                    &text,
                );
            }
            None => {
                for pip in 0..sequence as i32 {
                    let rect = Rect::at(x + LABEL_MARGIN + pip * PIP_STRIDE, y + LABEL_MARGIN)
                        .of_size(PIP_SIZE, PIP_SIZE);
                    draw_filled_rect_mut(canvas, rect, LABEL_GREEN);
                }
            }
        }
    }

    fn draw_banner(&self, canvas: &mut RgbImage) {
        draw_filled_rect_mut(
            canvas,
            Rect::at(0, 0).of_size(canvas.width(), BANNER_HEIGHT),
            ALERT_RED,
        );
        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                BANNER_WHITE,
                10,
                5,
                PxScale::from(24.0),
                font,
                BANNER_TEXT,
            );
        }
    }
}

impl std::fmt::Debug for EvidenceComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceComposer")
            .field("max_columns", &self.max_columns)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("font", &self.font.is_some())
            .finish()
    }
}

fn draw_border(canvas: &mut RgbImage) {
    let (width, height) = canvas.dimensions();
    for inset in 0..BORDER_THICKNESS {
        if width <= 2 * inset || height <= 2 * inset {
            break;
        }
        let rect = Rect::at(inset as i32, inset as i32).of_size(width - 2 * inset, height - 2 * inset);
        draw_hollow_rect_mut(canvas, rect, ALERT_RED);
    }
}

/// Load a TrueType/OpenType font for tile labels.
pub fn load_font(path: &Path) -> FallwatchResult<FontVec> {
    if !path.exists() {
        return Err(FallwatchError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| FallwatchError::config(format!("invalid font {}: {e}", path.display())))
}
