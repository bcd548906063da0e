//! Traffic signal state machine
//!
//! Each intersection carries one independent three-phase signal. The phase
//! cycle is strictly Green → Yellow → Red → Green with fixed per-phase
//! durations.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

/// Ticks a signal spends in the green phase
pub const GREEN_DURATION: u32 = 10;
/// Ticks a signal spends in the yellow phase
pub const YELLOW_DURATION: u32 = 3;
/// Ticks a signal spends in the red phase
pub const RED_DURATION: u32 = 10;

/// Phase of a traffic signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    Green,
    Yellow,
    Red,
}

impl SignalPhase {
    /// Phase that follows this one in the cycle
    pub fn next(self) -> SignalPhase {
        match self {
            SignalPhase::Green => SignalPhase::Yellow,
            SignalPhase::Yellow => SignalPhase::Red,
            SignalPhase::Red => SignalPhase::Green,
        }
    }

    /// Ticks this phase lasts
    pub fn duration(self) -> u32 {
        match self {
            SignalPhase::Green => GREEN_DURATION,
            SignalPhase::Yellow => YELLOW_DURATION,
            SignalPhase::Red => RED_DURATION,
        }
    }
}

/// A traffic signal at one intersection
#[derive(Debug, Clone)]
pub struct SimSignal {
    phase: SignalPhase,
    ticks_in_phase: u32,
}

impl SimSignal {
    pub fn new(phase: SignalPhase) -> Self {
        Self {
            phase,
            ticks_in_phase: 0,
        }
    }

    /// Create a signal with a random phase and elapsed offset so that
    /// intersections start out of step with each other.
    pub fn new_desynced(rng: &mut StdRng) -> Self {
        let phases = [SignalPhase::Green, SignalPhase::Yellow, SignalPhase::Red];
        let phase = *phases.choose(rng).unwrap_or(&SignalPhase::Green);
        Self {
            phase,
            ticks_in_phase: rng.random_range(0..=5),
        }
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    pub fn ticks_in_phase(&self) -> u32 {
        self.ticks_in_phase
    }

    pub fn is_red(&self) -> bool {
        self.phase == SignalPhase::Red
    }

    /// Advance one tick; on reaching the phase duration the signal moves to
    /// the next phase and the elapsed counter resets to zero.
    pub fn step(&mut self) {
        self.ticks_in_phase += 1;
        if self.ticks_in_phase >= self.phase.duration() {
            self.phase = self.phase.next();
            self.ticks_in_phase = 0;
        }
    }
}
