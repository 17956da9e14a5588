pub mod bridge;
pub mod protocol;

pub use bridge::{DispatchOutcome, WorkerBridge};
