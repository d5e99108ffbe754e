//! Half-turn counting over a stream of bounded yaw samples.
//!
//! Raw yaw is unwrapped into a continuous angle by assuming consecutive
//! samples are less than π apart (the observer interval is chosen so a head
//! cannot turn 180° between ticks). The signed half-turn index is the
//! number of whole π steps between the unwrapped angle and the baseline,
//! truncated toward zero, so boundaries sit at every non-zero multiple of π.

use crate::math::wrap_delta;
use crate::observer::{Observer, SampleSink};
use crate::types::{
    DecayWindow, HalfTurnIndex, HmdState, Radians, ResumeOrigin, ResumeState, RotationSide,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Tracker shared with the observer that feeds it
pub type SharedTracker = Arc<Mutex<YawTracker>>;

/// Twist count as shown to the user, e.g. `3 (Left)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub completed_half_turns: u64,
    pub rotation_side: Option<RotationSide>,
}

impl fmt::Display for TurnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.completed_half_turns, self.rotation_side) {
            (0, _) | (_, None) => write!(f, "{}", self.completed_half_turns),
            (n, Some(side)) => write!(f, "{} ({})", n, side),
        }
    }
}

/// Counts half-turns of the headset away from a baseline heading
#[derive(Debug, Clone)]
pub struct YawTracker {
    raw_yaw: Radians,
    unwrapped_yaw: Radians,
    baseline_yaw: Radians,
    current_half_turn: HalfTurnIndex,
    rotation_side: Option<RotationSide>,
}

impl Default for YawTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl YawTracker {
    /// Fresh tracker with the baseline facing forward (yaw 0)
    pub fn new() -> Self {
        Self {
            raw_yaw: 0.0,
            unwrapped_yaw: 0.0,
            baseline_yaw: 0.0,
            current_half_turn: 0,
            rotation_side: None,
        }
    }

    /// Tracker seeded from persisted state.
    ///
    /// Saved state older than the decay window is ignored; restart
    /// carry-over is always applied.
    pub fn from_resume(resume: Option<&ResumeState>, decay: DecayWindow, now: SystemTime) -> Self {
        let Some(resume) = resume else {
            return Self::new();
        };

        let applies = match resume.origin {
            ResumeOrigin::Restart => true,
            ResumeOrigin::SavedConfig => decay.allows(resume.elapsed(now)),
        };

        if applies {
            tracing::info!(
                half_turn = resume.half_turn,
                last_yaw = resume.last_yaw,
                origin = ?resume.origin,
                "Resuming half-turn count"
            );
            Self::seeded(resume.half_turn, resume.last_yaw)
        } else {
            tracing::info!(
                half_turn = resume.half_turn,
                elapsed_secs = resume.elapsed(now).as_secs(),
                "Remembered half-turn count expired, starting from zero"
            );
            Self::new()
        }
    }

    /// Place the baseline so the last yaw sits inside half-turn `half_turn`
    fn seeded(half_turn: HalfTurnIndex, last_yaw: Radians) -> Self {
        let relative = relative_angle_for(half_turn, last_yaw);
        Self {
            raw_yaw: last_yaw,
            unwrapped_yaw: last_yaw,
            baseline_yaw: last_yaw - relative,
            current_half_turn: half_turn,
            rotation_side: side_of(half_turn),
        }
    }

    /// Register with an observer; samples are applied inside each tick
    pub fn attach(self, observer: &Observer) -> SharedTracker {
        let tracker = Arc::new(Mutex::new(self));
        observer.add_sink(tracker.clone());
        tracker
    }

    /// Feed one raw yaw sample in (−π, π]. Non-finite samples are dropped.
    pub fn on_sample(&mut self, yaw: Radians) {
        if !yaw.is_finite() {
            tracing::debug!(yaw, "Ignoring non-finite yaw sample");
            return;
        }

        let delta = wrap_delta(yaw - self.raw_yaw);
        self.raw_yaw = yaw;
        self.unwrapped_yaw += delta;

        let index = half_turn_index(self.unwrapped_yaw - self.baseline_yaw);
        if index != self.current_half_turn {
            let side = if index > self.current_half_turn {
                RotationSide::Left
            } else {
                RotationSide::Right
            };
            tracing::debug!(
                from = self.current_half_turn,
                to = index,
                crossed = (index - self.current_half_turn).unsigned_abs(),
                side = %side,
                "Half-turn boundary crossed"
            );
            self.current_half_turn = index;
            self.rotation_side = Some(side);
        }
    }

    /// Make the current heading the new zero-turn reference
    pub fn reset(&mut self) {
        self.baseline_yaw = self.unwrapped_yaw;
        self.current_half_turn = 0;
        self.rotation_side = None;
        tracing::info!("Half-turn counter reset");
    }

    /// Last raw yaw sample
    pub fn yaw_value(&self) -> Radians {
        self.raw_yaw
    }

    /// Continuous yaw since tracking began
    pub fn unwrapped_yaw(&self) -> Radians {
        self.unwrapped_yaw
    }

    /// Unwrapped yaw of the zero-turn heading
    pub fn baseline_yaw(&self) -> Radians {
        self.baseline_yaw
    }

    /// Half-turns away from the baseline, either direction
    pub fn completed_half_turns(&self) -> u64 {
        self.current_half_turn.unsigned_abs()
    }

    /// Direction of the most recent boundary crossing
    pub fn rotation_side(&self) -> Option<RotationSide> {
        self.rotation_side
    }

    /// Signed half-turn index; positive is counter-clockwise
    pub fn current_half_turn(&self) -> HalfTurnIndex {
        self.current_half_turn
    }

    /// Count and side for display
    pub fn summary(&self) -> TurnSummary {
        TurnSummary {
            completed_half_turns: self.completed_half_turns(),
            rotation_side: self.rotation_side,
        }
    }

    /// State to persist so a later run can pick up the count
    pub fn resume_state(&self, origin: ResumeOrigin, now: SystemTime) -> ResumeState {
        ResumeState {
            half_turn: self.current_half_turn,
            last_yaw: self.raw_yaw,
            saved_at: now,
            origin,
        }
    }
}

impl SampleSink for YawTracker {
    fn on_state(&mut self, state: &HmdState) {
        self.on_sample(state.yaw);
    }
}

fn half_turn_index(relative: Radians) -> HalfTurnIndex {
    (relative / PI).trunc() as HalfTurnIndex
}

fn side_of(half_turn: HalfTurnIndex) -> Option<RotationSide> {
    match half_turn.signum() {
        1 => Some(RotationSide::Left),
        -1 => Some(RotationSide::Right),
        _ => None,
    }
}

/// Relative angle congruent to `yaw` (mod 2π) inside half-turn `half_turn`,
/// or the middle of that half-turn when no congruent angle fits
fn relative_angle_for(half_turn: HalfTurnIndex, yaw: Radians) -> Radians {
    let middle = if half_turn == 0 {
        0.0
    } else {
        (half_turn as f64 + 0.5 * (half_turn.signum() as f64)) * PI
    };
    let wraps = ((middle - yaw) / TAU).round();
    let candidate = yaw + wraps * TAU;
    if half_turn_index(candidate) == half_turn {
        candidate
    } else {
        middle
    }
}
