//! Client-side toolkit for the upload pipeline: validation, key generation,
//! the relay HTTP client, URL resolution, category management, AI-assisted
//! drafting, location suggestions, and the composer that ties them together.

pub mod api;
pub mod assist;
pub mod categories;
pub mod composer;
pub mod location;
pub mod resolve;
pub mod upload;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Marks a form or view as still mounted. Asynchronous continuations hold a
/// clone and must check [`LivenessToken::is_alive`] before applying their
/// result; a response that lands after teardown is discarded, never applied.
#[derive(Debug, Clone)]
pub struct LivenessToken {
    alive: Arc<AtomicBool>,
}

impl LivenessToken {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Called on teardown. Every clone observes the change.
    pub fn revoke(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revocation_is_visible_through_clones() {
        let token = LivenessToken::new();
        let held_by_task = token.clone();
        assert!(held_by_task.is_alive());
        token.revoke();
        assert!(!held_by_task.is_alive());
        assert!(!token.is_alive());
    }
}
