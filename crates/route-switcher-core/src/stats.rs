// # Path Statistics
//
// Per-path probe counters and health classification.
//
// ## Ownership
//
// - Counters: accumulated by exactly one health monitor, read-and-reset by
//   the controller. Both sides go through one mutex so a round committed
//   while the controller drains the window lands in exactly one window.
// - Health: written only by the controller (`pub(crate)`), readable by anyone.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Counters accumulated over one evaluation window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeWindow {
    /// Probes attempted
    pub sent: u64,
    /// Probes answered before the round-trip timeout
    pub received: u64,
}

impl ProbeWindow {
    /// Create a window from raw counts
    pub fn new(sent: u64, received: u64) -> Self {
        Self { sent, received }
    }

    /// Reply ratio, or `None` when nothing was sent
    pub fn ratio(&self) -> Option<f64> {
        if self.sent == 0 {
            None
        } else {
            Some(self.received as f64 / self.sent as f64)
        }
    }
}

/// Verdict for a single window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowVerdict {
    /// Reply ratio above the threshold
    Good,
    /// Reply ratio at or below the threshold, or no traffic at all
    Bad,
}

/// Health classification of a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Usable for routing
    #[default]
    Healthy,
    /// Excluded from routing
    Unhealthy,
}

/// Thresholds driving the hysteresis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    /// Ratio that must be exceeded for a GOOD window
    pub good_ratio: f64,
    /// Consecutive BAD windows tolerated before exclusion
    pub max_bad_windows: u32,
}

impl HealthThresholds {
    /// Classify one window
    ///
    /// A window with nothing sent proves nothing and counts as BAD.
    pub fn classify(&self, window: ProbeWindow) -> WindowVerdict {
        match window.ratio() {
            Some(ratio) if ratio > self.good_ratio => WindowVerdict::Good,
            _ => WindowVerdict::Bad,
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            good_ratio: crate::config::DEFAULT_GOOD_RATIO,
            max_bad_windows: crate::config::DEFAULT_MAX_BAD_WINDOWS,
        }
    }
}

impl From<&crate::config::ControllerConfig> for HealthThresholds {
    fn from(config: &crate::config::ControllerConfig) -> Self {
        Self {
            good_ratio: config.good_ratio,
            max_bad_windows: config.max_bad_windows,
        }
    }
}

/// Hysteresis state of a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PathHealth {
    /// Consecutive BAD windows
    pub bad_windows: u32,
    /// Current classification
    pub state: HealthState,
}

impl PathHealth {
    /// Whether the path may carry the default route
    pub fn is_usable(&self) -> bool {
        self.state == HealthState::Healthy
    }

    /// Fold one window into the hysteresis
    ///
    /// GOOD clears the bad counter, BAD increments it. The path is usable
    /// while the counter is at most `max_bad_windows`.
    pub fn observe(&mut self, verdict: WindowVerdict, thresholds: &HealthThresholds) {
        match verdict {
            WindowVerdict::Good => self.bad_windows = 0,
            WindowVerdict::Bad => self.bad_windows = self.bad_windows.saturating_add(1),
        }

        self.state = if self.bad_windows <= thresholds.max_bad_windows {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
    }
}

/// Shared statistics record of one path
#[derive(Debug, Default)]
pub struct PathStatistic {
    window: Mutex<ProbeWindow>,
    health: Mutex<PathHealth>,
}

impl PathStatistic {
    /// Create a zeroed, healthy record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one completed probe round to the current window
    pub fn record_round(&self, sent: u64, received: u64) {
        let mut window = lock(&self.window);
        window.sent = window.sent.saturating_add(sent);
        window.received = window.received.saturating_add(received);
    }

    /// Take the current window and start a new one at zero
    pub(crate) fn take_window(&self) -> ProbeWindow {
        std::mem::take(&mut *lock(&self.window))
    }

    /// Peek at the current window without resetting it
    pub fn current_window(&self) -> ProbeWindow {
        *lock(&self.window)
    }

    /// Snapshot of the health classification
    pub fn health(&self) -> PathHealth {
        *lock(&self.health)
    }

    /// Apply a window verdict; returns the (previous, new) health
    pub(crate) fn apply(
        &self,
        verdict: WindowVerdict,
        thresholds: &HealthThresholds,
    ) -> (PathHealth, PathHealth) {
        let mut health = lock(&self.health);
        let previous = *health;
        health.observe(verdict, thresholds);
        (previous, *health)
    }
}

// A panic while holding one of these locks cannot leave the counters
// half-written, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_classify_thresholds() {
        let t = HealthThresholds::default();
        assert_eq!(t.classify(ProbeWindow::new(20, 19)), WindowVerdict::Good);
        // Exactly 0.9 is not above the threshold
        assert_eq!(t.classify(ProbeWindow::new(10, 9)), WindowVerdict::Bad);
        assert_eq!(t.classify(ProbeWindow::new(10, 5)), WindowVerdict::Bad);
        assert_eq!(t.classify(ProbeWindow::new(0, 0)), WindowVerdict::Bad);
    }

    #[test]
    fn test_hysteresis_tolerates_three_bad_windows() {
        let t = HealthThresholds::default();
        let mut health = PathHealth::default();

        for expected in 1..=3 {
            health.observe(WindowVerdict::Bad, &t);
            assert_eq!(health.bad_windows, expected);
            assert!(health.is_usable());
        }

        health.observe(WindowVerdict::Bad, &t);
        assert_eq!(health.bad_windows, 4);
        assert!(!health.is_usable());

        // A single GOOD window fully restores the path
        health.observe(WindowVerdict::Good, &t);
        assert_eq!(health.bad_windows, 0);
        assert!(health.is_usable());
    }

    #[test]
    fn test_take_window_resets_counters() {
        let stat = PathStatistic::new();
        stat.record_round(3, 3);
        stat.record_round(3, 1);
        assert_eq!(stat.take_window(), ProbeWindow::new(6, 4));
        assert_eq!(stat.take_window(), ProbeWindow::default());
    }

    #[test]
    fn test_concurrent_rounds_are_never_lost() {
        let stat = Arc::new(PathStatistic::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let stat = Arc::clone(&stat);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stat.record_round(2, 1);
                }
            }));
        }

        let mut total = ProbeWindow::default();
        while handles.iter().any(|h| !h.is_finished()) {
            let w = stat.take_window();
            total.sent += w.sent;
            total.received += w.received;
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let w = stat.take_window();
        total.sent += w.sent;
        total.received += w.received;

        assert_eq!(total, ProbeWindow::new(8000, 4000));
    }
}
