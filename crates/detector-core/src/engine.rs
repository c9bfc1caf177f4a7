//! Per-stream fall-decision engine.
//!
//! Owns all carried state of one monitored stream and processes frames
//! strictly in order. The engine never performs I/O: on the rising edge of
//! an episode it returns an [`AlertIntent`] for the caller to hand to a
//! dispatcher.

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use fallwatch_common::config::DetectionConfig;
use fallwatch_common::error::FallwatchResult;
use fallwatch_pose_model::{PoseFrame, TimestampNs};

use crate::features::{self, Extraction};
use crate::hysteresis::{EpisodePhase, FallEpisodeState, HysteresisMachine, Transition};
use crate::kinematics::KinematicsTracker;
use crate::scoring::{scorer_for, FallScorer, FrameFeatures, Verdict};

/// What the engine saw in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    /// No body in the frame; counted as a negative vote.
    NoDetection,
    Scored {
        features: FrameFeatures,
        verdict: Verdict,
    },
}

impl Observation {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Observation::NoDetection => None,
            Observation::Scored { verdict, .. } => Some(verdict),
        }
    }

    pub fn votes(&self) -> u8 {
        self.verdict().map_or(0, |v| v.votes)
    }

    pub fn is_positive(&self) -> bool {
        self.verdict().is_some_and(|v| v.potential_fall)
    }
}

/// Request to capture evidence and notify, emitted once per episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertIntent {
    /// 1-based episode number within the stream.
    pub episode: u64,
    /// 0-based index of the triggering frame among accepted frames.
    pub frame_index: u64,
    pub timestamp_ns: TimestampNs,
    pub votes: u8,
    pub strategy: &'static str,
}

/// Engine output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDecision {
    pub frame_index: u64,
    pub timestamp_ns: TimestampNs,
    pub observation: Observation,
    pub transition: Transition,
    pub phase: EpisodePhase,
    pub state: FallEpisodeState,
    pub alert: Option<AlertIntent>,
}

/// The fall-decision engine for one stream.
pub struct FallEngine {
    scorer: Box<dyn FallScorer>,
    tracker: KinematicsTracker,
    machine: HysteresisMachine,
    frames_processed: u64,
    episodes: u64,
}

impl FallEngine {
    /// Build an engine using the strategy selected in `config`.
    pub fn new(config: &DetectionConfig) -> FallwatchResult<Self> {
        config.validate()?;
        Ok(Self::with_scorer(config, scorer_for(config)))
    }

    /// Build an engine with an explicit scoring strategy.
    pub fn with_scorer(config: &DetectionConfig, scorer: Box<dyn FallScorer>) -> Self {
        Self {
            scorer,
            tracker: KinematicsTracker::new(config.velocity_smoothing),
            machine: HysteresisMachine::from_config(config),
            frames_processed: 0,
            episodes: 0,
        }
    }

    /// Process the next frame of the stream.
    ///
    /// Malformed frames return an input error and leave every piece of
    /// state untouched. Frames without a detected body decay the debounce
    /// counter and leave kinematics as they were.
    pub fn process(&mut self, frame: &PoseFrame) -> FallwatchResult<FrameDecision> {
        let extraction = features::extract(frame)?;

        let frame_index = self.frames_processed;
        self.frames_processed += 1;

        let observation = match extraction {
            Extraction::NoDetection => Observation::NoDetection,
            Extraction::Body(geometry) => {
                let motion = self.tracker.update(&geometry.keypoints);
                let features =
                    FrameFeatures::from_parts(&geometry, &motion, frame.width, frame.height);
                let verdict = self.scorer.judge(&features);
                Observation::Scored { features, verdict }
            }
        };

        let transition = self.machine.update(observation.is_positive());
        let state = *self.machine.state();

        trace!(
            frame = frame_index,
            votes = observation.votes(),
            positive_count = state.consecutive_positive_count,
            recovery_count = state.recovery_count,
            "Frame scored"
        );

        let alert = match transition {
            Transition::RisingEdge => {
                self.episodes += 1;
                warn!(
                    frame = frame_index,
                    episode = self.episodes,
                    votes = observation.votes(),
                    strategy = self.scorer.name(),
                    "Fall detected"
                );
                Some(AlertIntent {
                    episode: self.episodes,
                    frame_index,
                    timestamp_ns: frame.timestamp_ns,
                    votes: observation.votes(),
                    strategy: self.scorer.name(),
                })
            }
            Transition::Recovered => {
                info!(frame = frame_index, episode = self.episodes, "Subject recovered");
                None
            }
            Transition::Steady => {
                if matches!(observation, Observation::NoDetection) {
                    debug!(frame = frame_index, "No body detected");
                }
                None
            }
        };

        Ok(FrameDecision {
            frame_index,
            timestamp_ns: frame.timestamp_ns,
            observation,
            transition,
            phase: self.machine.phase(),
            state,
            alert,
        })
    }

    pub fn state(&self) -> &FallEpisodeState {
        self.machine.state()
    }

    pub fn phase(&self) -> EpisodePhase {
        self.machine.phase()
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Rising edges seen so far.
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Forget all carried state, keeping the configuration.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.machine.reset();
        self.frames_processed = 0;
        self.episodes = 0;
    }
}

impl std::fmt::Debug for FallEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallEngine")
            .field("scorer", &self.scorer.name())
            .field("tracker", &self.tracker)
            .field("machine", &self.machine)
            .field("frames_processed", &self.frames_processed)
            .field("episodes", &self.episodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fallwatch_pose_model::synthetic::SkeletonPose;
    use fallwatch_pose_model::{Landmark, LandmarkIndex};

    const W: u32 = 640;
    const H: u32 = 480;

    fn engine() -> FallEngine {
        FallEngine::new(&DetectionConfig::default()).unwrap()
    }

    /// Standing skeleton shifted so the hip midpoint sits at `hip_frac * H`.
    fn standing_at(t: u64, hip_frac: f64) -> PoseFrame {
        let dy = hip_frac - SkeletonPose::standing().left_hip.y;
        let landmarks = SkeletonPose::standing()
            .to_landmarks()
            .into_iter()
            .map(|l| Landmark::new(l.x, l.y + dy))
            .collect();
        PoseFrame::detected(t, W, H, landmarks)
    }

    /// Lying skeleton shifted so the hip midpoint sits at `hip_frac * H`.
    fn lying_at(t: u64, hip_frac: f64) -> PoseFrame {
        let lying = SkeletonPose::lying();
        let dy = hip_frac - (lying.left_hip.y + lying.right_hip.y) / 2.0;
        let landmarks = lying
            .to_landmarks()
            .into_iter()
            .map(|l| Landmark::new(l.x, l.y + dy))
            .collect();
        PoseFrame::detected(t, W, H, landmarks)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectionConfig {
            fall_frames_threshold: 0,
            ..Default::default()
        };
        assert!(FallEngine::new(&config).is_err());
    }

    #[test]
    fn test_first_frame_has_no_motion() {
        let mut engine = engine();
        let decision = engine.process(&standing_at(0, 0.5)).unwrap();
        match decision.observation {
            Observation::Scored { features, verdict } => {
                assert_eq!(features.hip_vertical_velocity, 0.0);
                assert_eq!(features.hip_vertical_acceleration, 0.0);
                assert_eq!(verdict.votes, 0);
            }
            Observation::NoDetection => panic!("expected a scored frame"),
        }
        assert_eq!(decision.phase, EpisodePhase::Normal);
    }

    #[test]
    fn test_all_criteria_from_landmarks() {
        let mut engine = engine();
        // Hip at 0.60H, 0.63H (v = 0.03), 0.70H (v = 0.07, a = 0.04).
        engine.process(&lying_at(0, 0.60)).unwrap();
        engine.process(&lying_at(1, 0.63)).unwrap();
        let decision = engine.process(&lying_at(2, 0.70)).unwrap();

        let verdict = decision.observation.verdict().copied().unwrap();
        assert!(verdict.scores.posture);
        assert!(verdict.scores.vertical_velocity);
        assert!(verdict.scores.vertical_acceleration);
        assert!(verdict.scores.low_position);
        assert_eq!(verdict.votes, 4);
        assert!(verdict.potential_fall);
    }

    #[test]
    fn test_malformed_frame_leaves_state_untouched() {
        let mut engine = engine();
        engine.process(&standing_at(0, 0.5)).unwrap();
        let before_state = *engine.state();
        let before_hip = engine.tracker.hip().last_position;

        let mut landmarks = SkeletonPose::standing().to_landmarks();
        landmarks.truncate(LandmarkIndex::LeftHip.index());
        let err = engine
            .process(&PoseFrame::detected(1, W, H, landmarks))
            .unwrap_err();

        assert!(err.is_input());
        assert_eq!(*engine.state(), before_state);
        assert_eq!(engine.tracker.hip().last_position, before_hip);
        assert_eq!(engine.frames_processed(), 1);
    }

    #[test]
    fn test_no_detection_is_negative_vote() {
        let mut engine = engine();
        let positive = |engine: &mut FallEngine, t| {
            // A lying body dropping from 0.6H to 0.7H meets all four criteria.
            engine.process(&lying_at(t, 0.6)).unwrap();
            engine.process(&lying_at(t + 1, 0.7)).unwrap()
        };
        let first = positive(&mut engine, 0);
        assert!(first.observation.is_positive());
        assert_eq!(engine.state().consecutive_positive_count, 1);

        let decision = engine.process(&PoseFrame::no_detection(2, W, H)).unwrap();
        assert_eq!(decision.observation, Observation::NoDetection);
        assert_eq!(decision.state.consecutive_positive_count, 0);
        assert!(decision.alert.is_none());
    }

    #[test]
    fn test_alert_intent_on_rising_edge_only() {
        let config = DetectionConfig {
            fall_frames_threshold: 1,
            ..Default::default()
        };
        let mut engine = FallEngine::new(&config).unwrap();
        engine.process(&lying_at(0, 0.60)).unwrap();
        let decision = engine.process(&lying_at(5, 0.70)).unwrap();

        assert_eq!(decision.transition, Transition::RisingEdge);
        let alert = decision.alert.unwrap();
        assert_eq!(alert.episode, 1);
        assert_eq!(alert.frame_index, 1);
        assert_eq!(alert.timestamp_ns, 5);
        assert_eq!(alert.strategy, "ratio");

        // Next positive frame is part of the same episode.
        engine.process(&lying_at(6, 0.60)).unwrap();
        let decision = engine.process(&lying_at(7, 0.75)).unwrap();
        assert!(decision.alert.is_none());
        assert_eq!(engine.episodes(), 1);
    }

    #[test]
    fn test_reset() {
        let mut engine = engine();
        engine.process(&standing_at(0, 0.5)).unwrap();
        engine.reset();
        assert_eq!(engine.frames_processed(), 0);
        assert_eq!(*engine.state(), FallEpisodeState::default());
        assert!(engine.tracker.hip().last_position.is_none());
    }

    #[test]
    fn test_decision_serializes() {
        let mut engine = engine();
        let decision = engine.process(&PoseFrame::no_detection(0, W, H)).unwrap();
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["observation"]["kind"], "no_detection");
        assert_eq!(json["phase"], "normal");
        assert_eq!(json["transition"], "steady");
    }
}
