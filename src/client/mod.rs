//! # Client Transport
//!
//! The consuming application's side of the relay connection: a resilient
//! WebSocket client with exponential reconnection backoff, a single-slot
//! mailbox between the network and the render loop, and a fixed-rate frame
//! sender. Three loops run independently — frame send, network receive,
//! render drain — sharing nothing but last-write-wins slots.

pub mod mailbox;
pub mod transport;

pub use mailbox::LatestSlot;
pub use transport::{CoachClient, ClientOptions};

use std::time::Duration;

/// Initial reconnection delay.
pub const BASE_RECONNECT_DELAY_MS: u64 = 500;

/// Reconnection delay growth factor per attempt.
pub const RECONNECT_DECAY: u32 = 2;

/// Ceiling on the reconnection delay.
pub const MAX_RECONNECT_DELAY_MS: u64 = 10_000;

/// Interval between outgoing frames (≈20 Hz).
pub const FRAME_INTERVAL_MS: u64 = 50;

/// Delay before reconnection attempt number `attempts`:
/// `min(base · decay^attempts, max)`.
pub fn reconnect_delay(attempts: u32) -> Duration {
    let delay = BASE_RECONNECT_DELAY_MS.saturating_mul(u64::from(RECONNECT_DECAY).saturating_pow(attempts));
    Duration::from_millis(delay.min(MAX_RECONNECT_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_series() {
        assert_eq!(reconnect_delay(0), Duration::from_millis(500));
        assert_eq!(reconnect_delay(1), Duration::from_millis(1000));
        assert_eq!(reconnect_delay(2), Duration::from_millis(2000));
        // After 3 consecutive abnormal closures: 500 * 2^3 = 4000 ms.
        assert_eq!(reconnect_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(reconnect_delay(5), Duration::from_millis(10_000));
        assert_eq!(reconnect_delay(30), Duration::from_millis(10_000));
        // Absurd attempt counts must not overflow.
        assert_eq!(reconnect_delay(200), Duration::from_millis(10_000));
    }
}
