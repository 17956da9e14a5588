//! # Spelling Progression
//!
//! Letter/word progression state machine. Two modes: free practice (the
//! operator picks any letter, nothing advances automatically) and auto
//! spelling (work through a word letter by letter, advancing after a
//! sustained run of qualifying frames).
//!
//! Advancement depends only on a run-length of qualifying frames, never on
//! wall-clock time, so the machine behaves identically at any frame rate.

use crate::coach::LETTERS;

/// Minimum score for a frame to count toward stability.
pub const SCORE_THRESHOLD: u32 = 75;

/// Qualifying frames required before the current letter is considered held.
pub const STABLE_FRAMES: u32 = 10;

/// Practice mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellingMode {
    /// Operator-selected letter, no automatic advancement
    Free,
    /// Word-driven letter sequence with automatic advancement
    Auto,
}

/// Per-session progression state.
///
/// ## State Transitions:
/// - `Free → Auto`: requires a non-empty word (letters only after
///   filtering); rejected otherwise with no state change
/// - `Auto → Free`: always allowed
/// - Either switch resets the word index, stability counter, and
///   completion flag
#[derive(Debug, Clone)]
pub struct SpellingCoach {
    mode: SpellingMode,
    current_letter: char,

    /// Letters of the target word (auto mode only)
    word: Vec<char>,

    /// Position in the word (auto mode only)
    index: usize,

    /// Run length of consecutive qualifying frames, clamped at
    /// `stable_frames`
    stable_count: u32,

    complete: bool,

    score_threshold: u32,
    stable_frames: u32,
}

impl SpellingCoach {
    pub fn new() -> Self {
        Self::with_params(SCORE_THRESHOLD, STABLE_FRAMES)
    }

    pub fn with_params(score_threshold: u32, stable_frames: u32) -> Self {
        Self {
            mode: SpellingMode::Free,
            current_letter: LETTERS[0],
            word: Vec::new(),
            index: 0,
            stable_count: 0,
            complete: false,
            score_threshold,
            stable_frames,
        }
    }

    pub fn mode(&self) -> SpellingMode {
        self.mode
    }

    pub fn current_letter(&self) -> char {
        self.current_letter
    }

    /// The letter after the current one, while spelling a word.
    pub fn next_letter(&self) -> Option<char> {
        if self.mode == SpellingMode::Auto {
            self.word.get(self.index + 1).copied()
        } else {
            None
        }
    }

    pub fn word(&self) -> String {
        self.word.iter().collect()
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Stability progress toward the next advancement (0-100).
    pub fn progress(&self) -> u32 {
        ((self.stable_count as f64 / self.stable_frames as f64) * 100.0).round() as u32
    }

    /// Select a practice letter directly (free mode only).
    pub fn set_letter(&mut self, letter: char) -> Result<(), String> {
        if self.mode != SpellingMode::Free {
            return Err("Letter selection is only available in free practice".to_string());
        }
        let letter = letter.to_ascii_uppercase();
        if !LETTERS.contains(&letter) {
            return Err(format!("'{}' is not a practice letter", letter));
        }
        self.current_letter = letter;
        self.stable_count = 0;
        Ok(())
    }

    /// Switch to auto mode and start spelling `word`.
    ///
    /// The word is uppercased and filtered to letters; a word with no
    /// letters left after filtering is rejected and nothing changes.
    pub fn start_auto(&mut self, word: &str) -> Result<(), String> {
        let letters: Vec<char> = word
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase())
            .collect();

        if letters.is_empty() {
            return Err("A word is required to start auto spelling".to_string());
        }

        self.mode = SpellingMode::Auto;
        self.current_letter = letters[0];
        self.word = letters;
        self.index = 0;
        self.stable_count = 0;
        self.complete = false;
        Ok(())
    }

    /// Switch back to free practice, keeping the current letter.
    pub fn set_free(&mut self) {
        self.mode = SpellingMode::Free;
        self.word.clear();
        self.index = 0;
        self.stable_count = 0;
        self.complete = false;
    }

    /// Feed one scored frame. Only meaningful in auto mode; the counter is
    /// inert in free practice and after completion.
    ///
    /// A frame qualifies when the prediction matches the current letter and
    /// the score reaches the threshold; anything else resets the run.
    pub fn update_stability(&mut self, score: u32, predicted: Option<char>) {
        if self.mode != SpellingMode::Auto || self.complete {
            return;
        }

        let qualifies = predicted
            .map(|p| p.to_ascii_uppercase() == self.current_letter && score >= self.score_threshold)
            .unwrap_or(false);

        if qualifies {
            self.stable_count = (self.stable_count + 1).min(self.stable_frames);
        } else {
            self.stable_count = 0;
            return;
        }

        if self.stable_count == self.stable_frames {
            if self.index + 1 < self.word.len() {
                self.index += 1;
                self.current_letter = self.word[self.index];
                self.stable_count = 0;
            } else {
                self.complete = true;
            }
        }
    }
}

impl Default for SpellingCoach {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let coach = SpellingCoach::new();
        assert_eq!(coach.mode(), SpellingMode::Free);
        assert_eq!(coach.current_letter(), 'A');
        assert!(!coach.is_complete());
        assert_eq!(coach.progress(), 0);
    }

    #[test]
    fn test_empty_word_rejected() {
        let mut coach = SpellingCoach::new();
        assert!(coach.start_auto("").is_err());
        assert!(coach.start_auto("123 !?").is_err());
        // Rejection mutates nothing.
        assert_eq!(coach.mode(), SpellingMode::Free);
    }

    #[test]
    fn test_word_filtered_to_letters() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("hi-5!").unwrap();
        assert_eq!(coach.word(), "HI");
        assert_eq!(coach.current_letter(), 'H');
        assert_eq!(coach.next_letter(), Some('I'));
    }

    #[test]
    fn test_ten_stable_frames_advance_letter() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("AB").unwrap();

        for _ in 0..10 {
            coach.update_stability(80, Some('A'));
        }
        assert_eq!(coach.current_letter(), 'B');
        assert_eq!(coach.stable_count(), 0);
        assert!(!coach.is_complete());
    }

    #[test]
    fn test_interleaved_miss_resets_run() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("AB").unwrap();

        for _ in 0..9 {
            coach.update_stability(80, Some('A'));
        }
        assert_eq!(coach.stable_count(), 9);

        // One non-matching frame throws the whole run away.
        coach.update_stability(80, Some('C'));
        assert_eq!(coach.stable_count(), 0);
        assert_eq!(coach.current_letter(), 'A');

        // A fresh full run is required to advance.
        for _ in 0..10 {
            coach.update_stability(80, Some('A'));
        }
        assert_eq!(coach.current_letter(), 'B');
    }

    #[test]
    fn test_sub_threshold_score_resets_run() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("AB").unwrap();

        coach.update_stability(80, Some('A'));
        coach.update_stability(74, Some('A'));
        assert_eq!(coach.stable_count(), 0);

        coach.update_stability(75, Some('A'));
        assert_eq!(coach.stable_count(), 1);
    }

    #[test]
    fn test_word_completion() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("AB").unwrap();

        for _ in 0..10 {
            coach.update_stability(90, Some('A'));
        }
        for _ in 0..10 {
            coach.update_stability(90, Some('B'));
        }
        assert!(coach.is_complete());
        assert_eq!(coach.current_letter(), 'B');
        assert_eq!(coach.progress(), 100);

        // Completed: further frames change nothing.
        coach.update_stability(90, Some('B'));
        assert!(coach.is_complete());
        assert_eq!(coach.progress(), 100);
    }

    #[test]
    fn test_counter_inert_in_free_mode() {
        let mut coach = SpellingCoach::new();
        coach.update_stability(100, Some('A'));
        assert_eq!(coach.stable_count(), 0);
    }

    #[test]
    fn test_mode_switch_resets_progress() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("AB").unwrap();
        for _ in 0..5 {
            coach.update_stability(80, Some('A'));
        }
        assert_eq!(coach.stable_count(), 5);

        coach.set_free();
        assert_eq!(coach.stable_count(), 0);
        assert!(!coach.is_complete());

        coach.start_auto("AB").unwrap();
        assert_eq!(coach.stable_count(), 0);
        assert_eq!(coach.current_letter(), 'A');
    }

    #[test]
    fn test_letter_selection_rules() {
        let mut coach = SpellingCoach::new();
        assert!(coach.set_letter('q').is_ok());
        assert_eq!(coach.current_letter(), 'Q');
        assert!(coach.set_letter('3').is_err());

        coach.start_auto("AB").unwrap();
        assert!(coach.set_letter('Z').is_err());
    }

    #[test]
    fn test_progress_percentage() {
        let mut coach = SpellingCoach::new();
        coach.start_auto("A").unwrap();
        for _ in 0..5 {
            coach.update_stability(80, Some('A'));
        }
        assert_eq!(coach.progress(), 50);
    }
}
