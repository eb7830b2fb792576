// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff for failed reconciliation cycles.
//!
//! A cycle that returns an error is requeued by the controller's error policy
//! after a delay taken from a per-key [`ExponentialBackoff`]. The delay starts
//! at 5 seconds, doubles on every consecutive failure of the same key, is capped
//! at 5 minutes and carries ±10% jitter to prevent thundering herd. A cycle that
//! succeeds resets the key.

use crate::config::ControllerConfig;
use crate::constants::{ERROR_BACKOFF_MULTIPLIER, ERROR_BACKOFF_RANDOMIZATION};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            multiplier,
            randomization_factor,
        }
    }

    /// Get the next backoff interval and advance the schedule.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        jittered.min(self.max_interval)
    }

    /// Return to the initial interval.
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let jittered = rand::rng().random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Per-key failure backoff shared by a controller's error policy.
#[derive(Debug)]
pub struct FailureBackoff {
    initial: Duration,
    max: Duration,
    randomization_factor: f64,
    entries: Mutex<HashMap<String, ExponentialBackoff>>,
}

impl FailureBackoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration, randomization_factor: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            randomization_factor,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Backoff bounds taken from the controller configuration.
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.error_backoff_initial(),
            config.error_backoff_max(),
            ERROR_BACKOFF_RANDOMIZATION,
        )
    }

    /// Delay before retrying `key` after another failure.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let backoff = entries.entry(key.to_string()).or_insert_with(|| {
            ExponentialBackoff::new(
                self.initial,
                self.max,
                ERROR_BACKOFF_MULTIPLIER,
                self.randomization_factor,
            )
        });
        let delay = backoff.next_backoff();
        debug!(key = %key, delay_secs = delay.as_secs_f64(), "Backing off failed reconciliation");
        delay
    }

    /// Forget the failure history of `key`.
    pub fn reset(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of keys currently backing off
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for FailureBackoff {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
