//! Temporal hysteresis over per-frame potential-fall verdicts.
//!
//! Positive frames raise a counter, negative frames decay it by one
//! (floor 0). The fallen state is entered when the counter reaches
//! `fall_frames_threshold` and left only after `recovery_frames_threshold`
//! consecutive frames below it. The entry transition is the single alert
//! trigger of an episode.

use serde::Serialize;

use fallwatch_common::config::DetectionConfig;

/// Persistent state of one monitored stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FallEpisodeState {
    pub consecutive_positive_count: u32,
    pub is_in_fall_state: bool,
    pub recovery_count: u32,
}

/// Coarse view of [`FallEpisodeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePhase {
    /// Armed; no episode in progress.
    Normal,
    /// Episode in progress, subject still scored as falling.
    Fallen,
    /// Episode in progress, recent frames negative.
    Recovering,
}

/// What a single update did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Steady,
    /// Entered the fallen state. Fires once per episode.
    RisingEdge,
    /// Recovery completed; the trigger is re-armed.
    Recovered,
}

/// Debounces potential-fall verdicts into episodes.
#[derive(Debug, Clone)]
pub struct HysteresisMachine {
    state: FallEpisodeState,
    fall_frames_threshold: u32,
    recovery_frames_threshold: u32,
}

impl HysteresisMachine {
    /// Thresholds below 1 are raised to 1.
    pub fn new(fall_frames_threshold: u32, recovery_frames_threshold: u32) -> Self {
        Self {
            state: FallEpisodeState::default(),
            fall_frames_threshold: fall_frames_threshold.max(1),
            recovery_frames_threshold: recovery_frames_threshold.max(1),
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.fall_frames_threshold,
            config.recovery_frames_threshold,
        )
    }

    /// Advance by one frame. `positive` is the frame's potential-fall
    /// verdict; frames without a detected body are passed as negative.
    pub fn update(&mut self, positive: bool) -> Transition {
        let state = &mut self.state;
        state.consecutive_positive_count = if positive {
            state.consecutive_positive_count.saturating_add(1)
        } else {
            state.consecutive_positive_count.saturating_sub(1)
        };

        let falling_now = state.consecutive_positive_count >= self.fall_frames_threshold;

        match (falling_now, state.is_in_fall_state) {
            (true, false) => {
                state.is_in_fall_state = true;
                state.recovery_count = 0;
                Transition::RisingEdge
            }
            (true, true) => {
                // Episode still ongoing.
                state.recovery_count = 0;
                Transition::Steady
            }
            (false, true) => {
                state.recovery_count += 1;
                if state.recovery_count >= self.recovery_frames_threshold {
                    state.is_in_fall_state = false;
                    state.recovery_count = 0;
                    Transition::Recovered
                } else {
                    Transition::Steady
                }
            }
            (false, false) => Transition::Steady,
        }
    }

    pub fn state(&self) -> &FallEpisodeState {
        &self.state
    }

    /// Whether the debounced counter is at or above the entry threshold.
    pub fn is_falling_now(&self) -> bool {
        self.state.consecutive_positive_count >= self.fall_frames_threshold
    }

    pub fn phase(&self) -> EpisodePhase {
        if !self.state.is_in_fall_state {
            EpisodePhase::Normal
        } else if self.is_falling_now() {
            EpisodePhase::Fallen
        } else {
            EpisodePhase::Recovering
        }
    }

    pub fn fall_frames_threshold(&self) -> u32 {
        self.fall_frames_threshold
    }

    pub fn recovery_frames_threshold(&self) -> u32 {
        self.recovery_frames_threshold
    }

    pub fn reset(&mut self) {
        self.state = FallEpisodeState::default();
    }
}

impl Default for HysteresisMachine {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(machine: &mut HysteresisMachine, frames: &[bool]) -> Vec<Transition> {
        frames.iter().map(|&p| machine.update(p)).collect()
    }

    #[test]
    fn test_decay_not_reset() {
        let mut machine = HysteresisMachine::new(3, 10);
        let mut counts = Vec::new();
        let mut transitions = Vec::new();
        for positive in [true, true, false, true, true] {
            transitions.push(machine.update(positive));
            counts.push(machine.state().consecutive_positive_count);
        }
        assert_eq!(counts, vec![1, 2, 1, 2, 3]);
        assert_eq!(
            transitions,
            vec![
                Transition::Steady,
                Transition::Steady,
                Transition::Steady,
                Transition::Steady,
                Transition::RisingEdge,
            ]
        );
    }

    #[test]
    fn test_rising_edge_on_threshold_frame() {
        let mut machine = HysteresisMachine::new(3, 10);
        let transitions = run(&mut machine, &[true, true, true]);
        assert_eq!(transitions[2], Transition::RisingEdge);
        assert!(machine.state().is_in_fall_state);
        assert_eq!(machine.phase(), EpisodePhase::Fallen);
    }

    #[test]
    fn test_fires_once_per_episode() {
        let mut machine = HysteresisMachine::new(3, 10);
        let transitions = run(&mut machine, &[true; 30]);
        let edges = transitions
            .iter()
            .filter(|t| **t == Transition::RisingEdge)
            .count();
        assert_eq!(edges, 1);
        // Counter is uncapped.
        assert_eq!(machine.state().consecutive_positive_count, 30);
    }

    #[test]
    fn test_recovery_rearms_trigger() {
        let mut machine = HysteresisMachine::new(3, 10);
        run(&mut machine, &[true, true, true]);

        // 3 -> 2 drops below threshold on the first negative frame.
        let transitions = run(&mut machine, &[false; 9]);
        assert!(transitions.iter().all(|t| *t == Transition::Steady));
        assert_eq!(machine.phase(), EpisodePhase::Recovering);
        assert_eq!(machine.state().recovery_count, 9);

        assert_eq!(machine.update(false), Transition::Recovered);
        assert_eq!(machine.phase(), EpisodePhase::Normal);
        assert_eq!(*machine.state(), FallEpisodeState::default());

        let transitions = run(&mut machine, &[true, true, true]);
        assert_eq!(transitions[2], Transition::RisingEdge);
    }

    #[test]
    fn test_relapse_resets_recovery() {
        let mut machine = HysteresisMachine::new(3, 10);
        run(&mut machine, &[true, true, true, true]);
        // 4 -> 3 (still falling), 3 -> 2 (recovering, 1)
        run(&mut machine, &[false, false]);
        assert_eq!(machine.state().recovery_count, 1);

        // Back over the threshold: still the same episode, no new edge.
        assert_eq!(machine.update(true), Transition::Steady);
        assert_eq!(machine.state().recovery_count, 0);
        assert_eq!(machine.phase(), EpisodePhase::Fallen);
    }

    #[test]
    fn test_long_fall_needs_counter_to_drain_first() {
        let mut machine = HysteresisMachine::new(3, 10);
        run(&mut machine, &[true; 8]);
        // 8 -> 3 stays at or above threshold for five frames.
        run(&mut machine, &[false; 5]);
        assert_eq!(machine.state().recovery_count, 0);
        let transitions = run(&mut machine, &[false; 10]);
        assert_eq!(transitions.last(), Some(&Transition::Recovered));
    }

    #[test]
    fn test_zero_thresholds_clamped() {
        let machine = HysteresisMachine::new(0, 0);
        assert_eq!(machine.fall_frames_threshold(), 1);
        assert_eq!(machine.recovery_frames_threshold(), 1);
    }

    proptest! {
        #[test]
        fn prop_fewer_positives_than_threshold_never_fires(
            frames in proptest::collection::vec(any::<bool>(), 0..200),
            threshold in 1u32..8,
        ) {
            let mut budget = threshold - 1;
            let mut machine = HysteresisMachine::new(threshold, 10);
            for mut positive in frames {
                // Keep at most `threshold - 1` positives in the whole run.
                if positive {
                    positive = budget > 0;
                    budget = budget.saturating_sub(1);
                }
                machine.update(positive);
                prop_assert!(!machine.state().is_in_fall_state);
            }
        }

        #[test]
        fn prop_one_alert_between_recoveries(
            frames in proptest::collection::vec(any::<bool>(), 0..400),
            fall_threshold in 1u32..6,
            recovery_threshold in 1u32..15,
        ) {
            let mut machine = HysteresisMachine::new(fall_threshold, recovery_threshold);
            let mut armed = true;
            let mut quiet_run = 0u32;
            for positive in frames {
                match machine.update(positive) {
                    Transition::RisingEdge => {
                        prop_assert!(armed);
                        armed = false;
                    }
                    Transition::Recovered => {
                        prop_assert!(!armed);
                        prop_assert!(quiet_run + 1 >= recovery_threshold);
                        armed = true;
                    }
                    Transition::Steady => {}
                }
                quiet_run = if machine.is_falling_now() { 0 } else { quiet_run + 1 };
                prop_assert!(machine.state().recovery_count < recovery_threshold);
            }
        }
    }
}
