//! Idle-output detection.
//!
//! Every output delivery stamps the pane and opens a burst. The activity
//! monitor ticks at a fixed cadence and, once a pane has been quiet for the
//! idle threshold, fires a single notification and closes the burst. The
//! next output opens a new one.
//!
//! The detector is edge-triggered on the burst flag rather than on a narrow
//! timing window, so a tick that arrives late still fires (late) instead of
//! missing the burst altogether.

use std::time::{Duration, Instant};

/// Per-pane activity state.
#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    last_output_at: Option<Instant>,
    burst_active: bool,
}

impl ActivityTracker {
    /// Stamp an output delivery. Opens a burst if none is open.
    pub fn record_output(&mut self, now: Instant) {
        self.last_output_at = Some(now);
        self.burst_active = true;
    }

    pub fn last_output_at(&self) -> Option<Instant> {
        self.last_output_at
    }

    pub fn is_burst_active(&self) -> bool {
        self.burst_active
    }
}

/// Decides when a burst has gone quiet.
#[derive(Debug, Clone, Copy)]
pub struct IdleDetector {
    threshold: Duration,
}

impl IdleDetector {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Check one pane at tick time `now`.
    ///
    /// Returns `true` exactly once per burst: on the first tick at which the
    /// pane has been quiet for at least the threshold. The burst is closed
    /// as a side effect.
    pub fn poll(&self, tracker: &mut ActivityTracker, now: Instant) -> bool {
        if !tracker.burst_active {
            return false;
        }
        let Some(last) = tracker.last_output_at else {
            return false;
        };
        if now.saturating_duration_since(last) < self.threshold {
            return false;
        }
        tracker.burst_active = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(250);

    #[test]
    fn test_no_output_never_fires() {
        let detector = IdleDetector::new(Duration::from_secs(1));
        let mut tracker = ActivityTracker::default();
        let start = Instant::now();
        for i in 0..20 {
            assert!(!detector.poll(&mut tracker, start + TICK * i));
        }
    }

    #[test]
    fn test_single_burst_fires_exactly_once() {
        let detector = IdleDetector::new(Duration::from_secs(1));
        let mut tracker = ActivityTracker::default();
        let t0 = Instant::now();
        tracker.record_output(t0);

        let fired: usize = (1..=40)
            .filter(|i| detector.poll(&mut tracker, t0 + TICK * *i))
            .count();

        assert_eq!(fired, 1);
        assert!(!tracker.is_burst_active());
    }

    #[test]
    fn test_fires_on_first_tick_past_threshold() {
        let detector = IdleDetector::new(Duration::from_secs(1));
        let mut tracker = ActivityTracker::default();
        let t0 = Instant::now();
        tracker.record_output(t0);

        assert!(!detector.poll(&mut tracker, t0 + Duration::from_millis(750)));
        assert!(detector.poll(&mut tracker, t0 + Duration::from_millis(1000)));
        assert!(!detector.poll(&mut tracker, t0 + Duration::from_millis(1250)));
    }

    #[test]
    fn test_continuing_output_postpones_notification() {
        let detector = IdleDetector::new(Duration::from_secs(1));
        let mut tracker = ActivityTracker::default();
        let t0 = Instant::now();

        // Output every 500ms for 3s keeps the burst open.
        for i in 0..6 {
            let now = t0 + Duration::from_millis(500) * i;
            tracker.record_output(now);
            assert!(!detector.poll(&mut tracker, now + Duration::from_millis(250)));
        }
        let last = t0 + Duration::from_millis(2500);
        assert!(detector.poll(&mut tracker, last + Duration::from_secs(1)));
    }

    #[test]
    fn test_new_burst_rearms() {
        let detector = IdleDetector::new(Duration::from_secs(1));
        let mut tracker = ActivityTracker::default();
        let t0 = Instant::now();

        tracker.record_output(t0);
        assert!(detector.poll(&mut tracker, t0 + Duration::from_secs(2)));

        let t1 = t0 + Duration::from_secs(5);
        tracker.record_output(t1);
        assert!(tracker.is_burst_active());
        assert!(detector.poll(&mut tracker, t1 + Duration::from_secs(1)));
    }

    #[test]
    fn test_late_tick_still_fires() {
        let detector = IdleDetector::new(Duration::from_secs(1));
        let mut tracker = ActivityTracker::default();
        let t0 = Instant::now();
        tracker.record_output(t0);

        assert!(detector.poll(&mut tracker, t0 + Duration::from_secs(30)));
    }
}
