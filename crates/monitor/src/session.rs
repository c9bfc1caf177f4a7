//! The per-frame monitoring loop.

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use fallwatch_common::clock::{caption_timestamp, file_timestamp, RateController, StreamClock};
use fallwatch_common::config::AppConfig;
use fallwatch_common::error::FallwatchResult;
use fallwatch_detector_core::{AlertIntent, FallEngine, FrameDecision, Observation, Transition};
use fallwatch_evidence::EvidenceCapture;
use fallwatch_notify::{alert_message, photo_caption, AlertDispatcher, AlertJob, DispatchStats};
use fallwatch_pose_model::PoseFrame;

use crate::recorder::DecisionRecorder;
use crate::source::{FrameSource, PoseSource};

/// Totals for one monitoring run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Frames accepted by the engine.
    pub frames: u64,
    /// Frames rejected as malformed.
    pub skipped: u64,
    /// Accepted frames without a detected body.
    pub no_detection: u64,
    /// Rising edges (one per fall episode).
    pub alerts: u64,
    pub recoveries: u64,
    /// Alerts sent without a photo.
    pub evidence_failures: u64,
    pub dispatch: DispatchStats,
}

/// One monitored stream: engine, evidence history, and alert hand-off.
#[derive(Debug)]
pub struct MonitorSession {
    engine: FallEngine,
    evidence: EvidenceCapture,
    dispatcher: AlertDispatcher,
    recorder: Option<DecisionRecorder>,
    summary: SessionSummary,
}

impl MonitorSession {
    pub fn new(engine: FallEngine, evidence: EvidenceCapture, dispatcher: AlertDispatcher) -> Self {
        Self {
            engine,
            evidence,
            dispatcher,
            recorder: None,
            summary: SessionSummary::default(),
        }
    }

    /// Build the engine and evidence capture from `config`.
    pub fn from_config(config: &AppConfig, dispatcher: AlertDispatcher) -> FallwatchResult<Self> {
        let engine = FallEngine::new(&config.detection)?;
        let evidence = EvidenceCapture::from_config(&config.evidence)?;
        Ok(Self::new(engine, evidence, dispatcher))
    }

    /// Also log every decision as JSONL.
    pub fn with_recorder(mut self, recorder: DecisionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn engine(&self) -> &FallEngine {
        &self.engine
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            dispatch: self.dispatcher.stats(),
            ..self.summary
        }
    }

    /// Process one frame.
    ///
    /// Malformed poses are counted and returned as input errors; the raw
    /// frame is then discarded. On the rising edge of an episode the
    /// evidence is composed from the history plus `frame` and the alert is
    /// queued. `frame` joins the history afterwards.
    pub fn process(
        &mut self,
        pose: &PoseFrame,
        frame: Option<RgbImage>,
    ) -> FallwatchResult<FrameDecision> {
        let decision = match self.engine.process(pose) {
            Ok(decision) => decision,
            Err(e) => {
                self.summary.skipped += 1;
                warn!(t = pose.timestamp_secs(), error = %e, "Skipping malformed frame");
                return Err(e);
            }
        };

        self.summary.frames += 1;
        if matches!(decision.observation, Observation::NoDetection) {
            self.summary.no_detection += 1;
        }
        if decision.transition == Transition::Recovered {
            self.summary.recoveries += 1;
        }
        if let Some(intent) = &decision.alert {
            self.raise_alert(intent, frame.as_ref());
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(&decision) {
                warn!(path = %recorder.path().display(), error = %e, "Failed to record decision");
            }
        }

        if let Some(frame) = frame {
            self.evidence.push(frame);
        }
        Ok(decision)
    }

    fn raise_alert(&mut self, intent: &AlertIntent, frame: Option<&RgbImage>) {
        self.summary.alerts += 1;
        let timestamp = caption_timestamp();
        let mut job = AlertJob::text(alert_message(&timestamp));

        match frame {
            Some(current) => {
                let stamp = file_timestamp();
                match self
                    .evidence
                    .capture(current, photo_caption(&timestamp), &stamp)
                {
                    Ok(artifact) => {
                        debug!(
                            episode = intent.episode,
                            tiles = artifact.tiles,
                            "Evidence ready"
                        );
                        job = job.with_photo(artifact.jpeg, artifact.caption);
                    }
                    Err(e) => {
                        self.summary.evidence_failures += 1;
                        warn!(episode = intent.episode, error = %e, "Evidence capture failed, sending text only");
                    }
                }
            }
            None => {
                self.summary.evidence_failures += 1;
                warn!(episode = intent.episode, "No raw frame for evidence, sending text only");
            }
        }

        if let Err(e) = self.dispatcher.submit(job) {
            error!(episode = intent.episode, error = %e, "Alert dropped");
        }
    }

    /// Drain `poses` (and `frames` alongside), optionally paced at `fps`.
    pub async fn run(
        mut self,
        poses: &mut dyn PoseSource,
        frames: &mut dyn FrameSource,
        pace_fps: Option<u32>,
    ) -> FallwatchResult<SessionSummary> {
        let clock = StreamClock::start();
        let mut pacer = pace_fps.map(RateController::new);

        info!(
            strategy = self.engine.scorer_name(),
            paced = pace_fps.is_some(),
            "Monitoring started"
        );

        while let Some(next) = poses.next_pose() {
            let pose = match next {
                Ok(pose) => pose,
                Err(e) if e.is_input() => {
                    self.summary.skipped += 1;
                    warn!(error = %e, "Skipping unreadable pose");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(pacer) = pacer.as_mut() {
                let wait = pacer.time_until_next(clock.elapsed_ns());
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                pacer.should_tick(clock.elapsed_ns());
            }

            let frame = frames
                .next_frame(pose.width, pose.height)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Raw frame unavailable");
                    None
                });

            // Malformed poses are already counted and logged.
            if let Ok(decision) = self.process(&pose, frame) {
                if decision.alert.is_some() {
                    // Let the dispatcher start delivering on single-threaded runtimes.
                    tokio::task::yield_now().await;
                }
            }
        }

        Ok(self.finish().await)
    }

    /// Flush the decision log and wait for queued alerts.
    pub async fn finish(self) -> SessionSummary {
        let Self {
            engine,
            mut recorder,
            dispatcher,
            summary,
            ..
        } = self;

        if let Some(recorder) = recorder.as_mut() {
            if let Err(e) = recorder.flush() {
                warn!(error = %e, "Failed to flush decision log");
            }
        }
        let dispatch = dispatcher.shutdown().await;
        let summary = SessionSummary { dispatch, ..summary };

        info!(
            frames = summary.frames,
            skipped = summary.skipped,
            alerts = summary.alerts,
            delivered = dispatch.delivered,
            failed = dispatch.failed,
            dropped = dispatch.dropped,
            episodes = engine.episodes(),
            "Monitoring finished"
        );
        summary
    }
}
