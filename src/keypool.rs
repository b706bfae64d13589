//! Extraction-API credential rotation.
//!
//! The extraction model sits behind aggressive per-key rate limits, so the
//! orchestrator draws keys from a shared pool instead of hammering one
//! credential. The pool is an explicit injected object (no module-level
//! state) so tests can run against deterministic pools.
//!
//! When every key is in cooldown the pool resets itself and rotation
//! restarts from index 0. That favors availability over strict rate-limit
//! compliance: a stalled batch is worse for the reviewer than the odd 429.

use log::{debug, warn};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Failures a key absorbs before it is put in cooldown.
pub const MAX_FAILURES: u32 = 5;

/// How long a key sits out after crossing the failure threshold, and how
/// long a key must be idle before its failure count resets.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct KeyState {
    key: String,
    last_used_at: Option<Instant>,
    failure_count: u32,
    cooldown_until: Option<Instant>,
}

impl KeyState {
    fn new(key: String) -> Self {
        Self {
            key,
            last_used_at: None,
            failure_count: 0,
            cooldown_until: None,
        }
    }

    fn reset(&mut self) {
        self.failure_count = 0;
        self.cooldown_until = None;
    }

    fn usable_at(&self, now: Instant) -> bool {
        match self.cooldown_until {
            Some(until) => now >= until,
            None => true,
        }
    }
}

/// A pool of extraction-API credentials with per-key failure tracking.
/// All state lives behind a mutex so the pool can be shared if callers
/// introduce parallel extraction.
pub struct KeyPool {
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    keys: Vec<KeyState>,
    cursor: usize,
}

impl KeyPool {
    /// Build a pool from the configured credentials. Panics on an empty
    /// key list; there is no meaningful way to proceed without keys.
    pub fn new(keys: Vec<String>) -> Self {
        assert!(!keys.is_empty(), "KeyPool requires at least one API key");
        Self {
            inner: Mutex::new(PoolInner {
                keys: keys.into_iter().map(KeyState::new).collect(),
                cursor: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next usable key in rotation order.
    pub fn next(&self) -> String {
        self.next_at(Instant::now())
    }

    /// Record a failed call for a key. Crossing the failure threshold puts
    /// the key in cooldown.
    pub fn report_failure(&self, key: &str) {
        self.report_failure_at(key, Instant::now());
    }

    fn next_at(&self, now: Instant) -> String {
        let mut inner = self.inner.lock().unwrap();
        let count = inner.keys.len();

        for offset in 0..count {
            let index = (inner.cursor + offset) % count;
            let state = &mut inner.keys[index];

            // An elapsed cooldown clears the slate entirely.
            if state.usable_at(now) && state.cooldown_until.is_some() {
                state.reset();
            }

            // A key idle for longer than the cooldown window gets a clean
            // slate too; old failures no longer say anything about it.
            if let Some(last_used) = state.last_used_at {
                if now.duration_since(last_used) > RATE_LIMIT_COOLDOWN {
                    state.reset();
                }
            }

            if !state.usable_at(now) || state.failure_count >= MAX_FAILURES {
                continue;
            }

            state.last_used_at = Some(now);
            let key = state.key.clone();
            inner.cursor = (index + 1) % count;
            debug!("Issuing API key index {}", index);
            return key;
        }

        // Every key is in cooldown or over the threshold. Reset the whole
        // pool and restart from index 0.
        warn!("All {} API keys exhausted; resetting pool", count);
        for state in &mut inner.keys {
            state.reset();
        }
        inner.keys[0].last_used_at = Some(now);
        inner.cursor = 1 % count;
        inner.keys[0].key.clone()
    }

    fn report_failure_at(&self, key: &str, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.keys.iter_mut().find(|state| state.key == key) {
            state.failure_count += 1;
            if state.failure_count >= MAX_FAILURES {
                state.cooldown_until = Some(now + RATE_LIMIT_COOLDOWN);
                warn!(
                    "API key hit {} failures, cooling down for {:?}",
                    state.failure_count, RATE_LIMIT_COOLDOWN
                );
            }
        }
    }
}
