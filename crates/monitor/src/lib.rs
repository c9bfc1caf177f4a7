//! Fallwatch Monitor
//!
//! Drives one monitored stream frame by frame:
//!
//! ```text
//! PoseSource ──► FallEngine ──► decision ──► DecisionRecorder (optional)
//!                                   │
//!                     rising edge ──┤
//!                                   ▼
//! FrameSource ──► EvidenceCapture ──► AlertDispatcher ──► sinks
//! ```
//!
//! All engine and evidence state lives on the session and is mutated only
//! by [`MonitorSession::process`]; alert delivery runs on separate tasks.

pub mod recorder;
pub mod session;
pub mod source;

pub use recorder::{DecisionLogHeader, DecisionRecorder};
pub use session::{MonitorSession, SessionSummary};
pub use source::{
    BlankFrameSource, FrameSource, ImageDirFrameSource, JsonlPoseSource, PoseSource,
    VecPoseSource,
};
