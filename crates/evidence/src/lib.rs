//! Fallwatch Evidence Capture
//!
//! Keeps a short history of raw frames and, when a fall is confirmed,
//! composes the most recent ones into a labelled grid image:
//!
//! ```text
//! ┌──────────── FALL DETECTED! ─────────────┐
//! │ Frame 1     │ Frame 2     │ Frame 3     │
//! ├─────────────┼─────────────┼─────────────┤
//! │ Frame 4     │ Frame 5     │ Frame 6     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The last tile is always the triggering frame. Nothing here feeds back
//! into the fall decision.

pub mod capture;
pub mod compositor;
pub mod ring_buffer;

pub use capture::{EvidenceArtifact, EvidenceCapture};
pub use compositor::{EvidenceComposer, GridLayout};
pub use ring_buffer::FrameRingBuffer;
