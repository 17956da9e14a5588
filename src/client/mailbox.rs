//! # Latest-Message Mailbox
//!
//! Single-slot, last-write-wins mailbox decoupling network receipt from
//! rendering. The receive loop overwrites the slot on every message; the
//! render loop drains it once per display refresh. The consumer can never
//! fall behind a bursty network and never processes a stale-but-queued
//! message — there is no queue to fall behind on.

use std::sync::Mutex;

/// A one-element overwrite slot with one writer and one reader.
#[derive(Debug, Default)]
pub struct LatestSlot<T> {
    slot: Mutex<Option<T>>,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store a value, replacing whatever was there.
    pub fn put(&self, value: T) {
        *self.slot.lock().unwrap() = Some(value);
    }

    /// Remove and return the latest value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().unwrap().take()
    }

    /// Drop any stored value.
    pub fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }
}
