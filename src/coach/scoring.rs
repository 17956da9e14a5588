//! # Scoring Engine
//!
//! Pure transformation from verdicts to a smoothed real-time score, an
//! accuracy figure, and a debounced hand-presence signal. Invoked once per
//! verdict drained from the transport mailbox.
//!
//! ## Counting invariant:
//! The total/hit counters only advance on frames where a hand was detected.
//! Frames without a hand are excluded from accuracy but still drop the
//! score to zero immediately — losing the hand is instant feedback, not
//! something to smooth over.

use crate::relay::messages::{Verdict, LANDMARK_POINTS};

/// Smoothing factor for the exponential moving average.
pub const SMOOTHING_ALPHA: f32 = 0.7;

/// Consecutive invalid frames before presence is retracted.
pub const PRESENCE_MISS_FRAMES: u32 = 8;

/// Asymmetric debounce for the hand-presence signal.
///
/// Presence asserts immediately on any frame with a complete point set, but
/// retracts only after [`PRESENCE_MISS_FRAMES`] consecutive frames without
/// one. A single dropped detection never flickers the signal.
#[derive(Debug, Clone)]
pub struct PresenceDebounce {
    present: bool,
    misses: u32,
    miss_frames: u32,
}

impl PresenceDebounce {
    pub fn new(miss_frames: u32) -> Self {
        Self {
            present: false,
            misses: 0,
            miss_frames,
        }
    }

    /// Feed one observation; returns the debounced presence state.
    pub fn observe(&mut self, valid: bool) -> bool {
        if valid {
            self.misses = 0;
            self.present = true;
        } else {
            self.misses += 1;
            if self.misses >= self.miss_frames {
                self.present = false;
            }
        }
        self.present
    }

    pub fn is_present(&self) -> bool {
        self.present
    }
}

impl Default for PresenceDebounce {
    fn default() -> Self {
        Self::new(PRESENCE_MISS_FRAMES)
    }
}

/// Per-session scoring state.
#[derive(Debug, Clone)]
pub struct ScoreState {
    /// Latest raw score (0-100, straight from confidence)
    raw: u32,

    /// Exponential moving average of the raw score (0-100)
    smoothed: u32,

    /// Frames counted toward accuracy (hand present only)
    total: u64,

    /// Counted frames where predicted matched target
    hits: u64,

    /// Debounced hand-presence signal
    presence: PresenceDebounce,

    alpha: f32,
}

impl ScoreState {
    pub fn new() -> Self {
        Self::with_params(SMOOTHING_ALPHA, PRESENCE_MISS_FRAMES)
    }

    pub fn with_params(alpha: f32, presence_miss_frames: u32) -> Self {
        Self {
            raw: 0,
            smoothed: 0,
            total: 0,
            hits: 0,
            presence: PresenceDebounce::new(presence_miss_frames),
            alpha,
        }
    }

    /// Apply one verdict.
    ///
    /// A frame without a detected hand zeroes both scores and is not
    /// counted; everything else scores the confidence, smooths it, and
    /// updates the accuracy counters.
    pub fn apply(&mut self, verdict: &Verdict) {
        self.presence
            .observe(verdict.landmarks.len() >= LANDMARK_POINTS);

        if !verdict.hands_detected {
            self.raw = 0;
            self.smoothed = 0;
            return;
        }

        let confidence = verdict.confidence.clamp(0.0, 1.0);
        self.raw = (confidence * 100.0).round() as u32;
        self.smoothed = (self.alpha * self.raw as f32 + (1.0 - self.alpha) * self.smoothed as f32)
            .round() as u32;

        self.total += 1;
        if verdict.predicted == verdict.target {
            self.hits += 1;
        }
    }

    /// Latest raw score (0-100).
    pub fn score(&self) -> u32 {
        self.raw
    }

    /// Smoothed score (0-100), suited for progress displays.
    pub fn smooth_score(&self) -> u32 {
        self.smoothed
    }

    /// Cumulative accuracy (0-100) over counted frames.
    pub fn accuracy(&self) -> u32 {
        if self.total > 0 {
            ((self.hits as f64 / self.total as f64) * 100.0).round() as u32
        } else {
            0
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Debounced hand-presence signal.
    pub fn hand_present(&self) -> bool {
        self.presence.is_present()
    }

    /// Clear all scoring state.
    pub fn reset(&mut self) {
        let alpha = self.alpha;
        let miss_frames = self.presence.miss_frames;
        *self = Self::with_params(alpha, miss_frames);
    }
}

impl Default for ScoreState {
    fn default() -> Self {
        Self::new()
    }
}
