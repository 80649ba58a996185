//! Debounce/throttle timing for flush scheduling.
//!
//! The composition mirrors a `debounce(throttle(flush, T), D)` wrapper
//! stack: the event stream drives the debounce layer, and when the debounce
//! deadline elapses it *requests* a flush from the throttle layer, which
//! rate-limits actual flushes to one per window. Instead of nesting opaque
//! wrappers, the whole thing is one state machine over two deadlines, so
//! the composition is testable with plain `Instant`s and no real timers.
//!
//! Both layers are trailing-edge only: nothing ever fires on the leading
//! edge of a window.

use std::time::{Duration, Instant};

/// Shared debounce/throttle configuration.
///
/// `None` means the layer is disabled. A debounce of zero milliseconds is
/// "disabled", not "fire immediately".
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingPolicy {
    pub debounce: Option<Duration>,
    pub throttle: Option<Duration>,
}

impl TimingPolicy {
    /// Build a policy from raw millisecond settings.
    pub fn from_millis(debounce_ms: u64, throttle_ms: Option<u64>) -> Self {
        Self {
            debounce: (debounce_ms > 0).then(|| Duration::from_millis(debounce_ms)),
            throttle: throttle_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
        }
    }

    /// With no layer configured every event flushes immediately.
    pub fn is_immediate(&self) -> bool {
        self.debounce.is_none() && self.throttle.is_none()
    }
}

/// Per-group scheduler deciding when the pending batch is flushed.
///
/// Driven by the owning group task: `on_event` on every arrival, then
/// `poll` whenever `next_deadline` elapses.
#[derive(Debug)]
pub struct TimingCoordinator {
    policy: TimingPolicy,
    /// Reset-on-activity deadline; armed while events keep arriving.
    debounce_deadline: Option<Instant>,
    /// Trailing edge of the current throttle window, if one is armed.
    throttle_fire_at: Option<Instant>,
}

impl TimingCoordinator {
    pub fn new(policy: TimingPolicy) -> Self {
        Self {
            policy,
            debounce_deadline: None,
            throttle_fire_at: None,
        }
    }

    /// Record an event arrival at `now`.
    ///
    /// Returns true when the flush must happen immediately (no layer
    /// configured); otherwise deadlines are (re)armed and `poll` decides.
    pub fn on_event(&mut self, now: Instant) -> bool {
        if self.policy.is_immediate() {
            return true;
        }
        match self.policy.debounce {
            Some(window) => self.debounce_deadline = Some(now + window),
            // Throttle-only: the event stream drives the throttle directly.
            None => self.request_flush(now),
        }
        false
    }

    /// The earliest instant at which `poll` can fire, if any deadline is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_deadline, self.throttle_fire_at) {
            (Some(d), Some(t)) => Some(d.min(t)),
            (Some(d), None) => Some(d),
            (None, Some(t)) => Some(t),
            (None, None) => None,
        }
    }

    /// Advance the machine to `now`; true means flush the batch now.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut fire = false;

        if let Some(deadline) = self.debounce_deadline
            && now >= deadline
        {
            self.debounce_deadline = None;
            match self.policy.throttle {
                // Quiet period over: hand the request to the throttle layer,
                // timed at the deadline itself for deterministic windows.
                Some(_) => self.request_flush(deadline),
                None => fire = true,
            }
        }

        if let Some(at) = self.throttle_fire_at
            && now >= at
        {
            self.throttle_fire_at = None;
            fire = true;
        }

        fire
    }

    /// Drop every armed deadline. Used on `stop()` so nothing fires later.
    pub fn cancel(&mut self) {
        self.debounce_deadline = None;
        self.throttle_fire_at = None;
    }

    pub fn is_idle(&self) -> bool {
        self.debounce_deadline.is_none() && self.throttle_fire_at.is_none()
    }

    /// Ask the throttle layer for a flush at `now`.
    ///
    /// Arms the trailing edge of a new window, or coalesces into the one
    /// already armed. Without a throttle layer the request fires at once.
    fn request_flush(&mut self, now: Instant) {
        match self.policy.throttle {
            Some(window) => {
                if self.throttle_fire_at.is_none() {
                    self.throttle_fire_at = Some(now + window);
                }
            }
            None => self.throttle_fire_at = Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn policy(debounce_ms: u64, throttle_ms: Option<u64>) -> TimingPolicy {
        TimingPolicy::from_millis(debounce_ms, throttle_ms)
    }

    #[test]
    fn test_zero_debounce_means_disabled() {
        let p = policy(0, None);
        assert!(p.debounce.is_none());
        assert!(p.is_immediate());

        let p = policy(0, Some(0));
        assert!(p.is_immediate());
    }

    #[test]
    fn test_immediate_mode_fires_per_event() {
        let mut c = TimingCoordinator::new(policy(0, None));
        let now = Instant::now();

        assert!(c.on_event(now));
        assert!(c.on_event(now + ms(1)));
        assert!(c.next_deadline().is_none());
    }

    #[test]
    fn test_debounce_fires_after_quiet_period() {
        let mut c = TimingCoordinator::new(policy(1000, None));
        let t0 = Instant::now();

        assert!(!c.on_event(t0));
        assert!(!c.on_event(t0 + ms(100)));
        assert!(!c.on_event(t0 + ms(200)));

        // Last event at t0+200, so the deadline is t0+1200.
        assert_eq!(c.next_deadline(), Some(t0 + ms(1200)));
        assert!(!c.poll(t0 + ms(1199)));
        assert!(c.poll(t0 + ms(1200)));
        assert!(c.is_idle());
    }

    #[test]
    fn test_debounce_defers_while_events_keep_arriving() {
        let mut c = TimingCoordinator::new(policy(100, None));
        let t0 = Instant::now();

        let mut t = t0;
        for _ in 0..10 {
            c.on_event(t);
            t += ms(50);
            assert!(!c.poll(t));
        }
        // Quiet from the last event onward.
        assert!(c.poll(t + ms(100)));
    }

    #[test]
    fn test_throttle_trailing_edge_only() {
        let mut c = TimingCoordinator::new(policy(0, Some(500)));
        let t0 = Instant::now();

        assert!(!c.on_event(t0));
        assert!(!c.on_event(t0 + ms(50)));

        // Window armed at the first event; second coalesces into it.
        assert_eq!(c.next_deadline(), Some(t0 + ms(500)));
        assert!(!c.poll(t0 + ms(499)));
        assert!(c.poll(t0 + ms(500)));
        assert!(c.is_idle());

        // A later event starts a fresh window.
        assert!(!c.on_event(t0 + ms(600)));
        assert!(!c.on_event(t0 + ms(650)));
        assert_eq!(c.next_deadline(), Some(t0 + ms(1100)));
        assert!(c.poll(t0 + ms(1100)));
    }

    #[test]
    fn test_throttle_caps_rate_under_continuous_stream() {
        let mut c = TimingCoordinator::new(policy(0, Some(200)));
        let t0 = Instant::now();

        let mut fires = Vec::new();
        for i in 0..100u64 {
            let now = t0 + ms(i * 10);
            c.on_event(now);
            if c.poll(now) {
                fires.push(now);
            }
        }

        assert!(!fires.is_empty());
        for pair in fires.windows(2) {
            assert!(pair[1] - pair[0] >= ms(200));
        }
    }

    #[test]
    fn test_debounce_wraps_throttle() {
        let mut c = TimingCoordinator::new(policy(100, Some(500)));
        let t0 = Instant::now();

        // Events keep the debounce layer busy; the throttle layer sees
        // nothing until a quiet period.
        c.on_event(t0);
        c.on_event(t0 + ms(50));
        assert_eq!(c.next_deadline(), Some(t0 + ms(150)));

        // Quiet period elapses at t0+150: the flush request enters a
        // throttle window ending at t0+650.
        assert!(!c.poll(t0 + ms(150)));
        assert_eq!(c.next_deadline(), Some(t0 + ms(650)));
        assert!(!c.poll(t0 + ms(649)));
        assert!(c.poll(t0 + ms(650)));
        assert!(c.is_idle());
    }

    #[test]
    fn test_armed_throttle_window_fires_despite_new_events() {
        let mut c = TimingCoordinator::new(policy(100, Some(500)));
        let t0 = Instant::now();

        c.on_event(t0);
        assert!(!c.poll(t0 + ms(100))); // request enters throttle window [100, 600)

        // New event re-arms the debounce layer but the armed window holds.
        c.on_event(t0 + ms(550));
        assert!(c.poll(t0 + ms(600)));

        // The pending debounce deadline then produces a second window.
        assert_eq!(c.next_deadline(), Some(t0 + ms(650)));
        assert!(!c.poll(t0 + ms(650)));
        assert_eq!(c.next_deadline(), Some(t0 + ms(1150)));
        assert!(c.poll(t0 + ms(1150)));
    }

    #[test]
    fn test_poll_handles_late_wakeups() {
        let mut c = TimingCoordinator::new(policy(100, Some(500)));
        let t0 = Instant::now();

        c.on_event(t0);
        // Woken long after both deadlines: the debounce hand-off lands in a
        // window anchored at the deadline, which has itself already passed.
        assert!(c.poll(t0 + ms(2000)));
        assert!(c.is_idle());
    }

    #[test]
    fn test_cancel_drops_armed_deadlines() {
        let mut c = TimingCoordinator::new(policy(100, Some(500)));
        let t0 = Instant::now();

        c.on_event(t0);
        assert!(c.next_deadline().is_some());

        c.cancel();
        assert!(c.next_deadline().is_none());
        assert!(!c.poll(t0 + ms(10_000)));
    }
}
