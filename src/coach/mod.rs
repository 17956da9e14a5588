//! # Gesture Coaching
//!
//! Consumer-side state that turns a stream of verdicts into user feedback:
//! the scoring engine ([`scoring`]) and the letter/word progression state
//! machine ([`spelling`]). Both are pure, frame-driven, and owned by one
//! session — no timers, no shared state.

pub mod scoring;
pub mod spelling;

pub use scoring::ScoreState;
pub use spelling::{SpellingCoach, SpellingMode};

/// The fixed practice alphabet.
pub const LETTERS: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];
