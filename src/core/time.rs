//! Tick cadence and rolling tick statistics

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Window over which tick rates are averaged
const STATS_WINDOW: Duration = Duration::from_secs(5);

/// Drives the tick loop at a fixed cadence.
///
/// `wait` sleeps until the next deadline. A tick that overruns its slot
/// pushes the schedule forward instead of trying to catch up with a burst.
pub struct TickScheduler {
    interval: Duration,
    next_deadline: Instant,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next tick is due
    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next_deadline {
            std::thread::sleep(self.next_deadline - now);
            self.next_deadline += self.interval;
        } else {
            self.next_deadline = now + self.interval;
        }
    }
}

/// Rolling tick/output statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub ticks_per_sec: f32,
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub bytes_received: u64,
    pub tick_count: u64,
}

/// Tracks tick timing and transport counters
pub struct TickStats {
    tick_count: u64,
    frames_sent: u64,
    frames_skipped: u64,
    bytes_received: u64,
    last_report: Instant,
    /// Timestamps of recent ticks for the rolling rate
    history: VecDeque<Instant>,
}

impl TickStats {
    pub fn new() -> Self {
        Self {
            tick_count: 0,
            frames_sent: 0,
            frames_skipped: 0,
            bytes_received: 0,
            last_report: Instant::now(),
            history: VecDeque::new(),
        }
    }

    /// Call once per tick
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.tick_count += 1;
        self.history.push_back(now);

        // Prune ticks older than the window
        let Some(cutoff) = now.checked_sub(STATS_WINDOW) else {
            return;
        };
        while let Some(&stamp) = self.history.front() {
            if stamp < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn record_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn record_skipped(&mut self) {
        self.frames_skipped += 1;
    }

    pub fn report(&self) -> TickReport {
        let ticks_per_sec = match (self.history.front(), self.history.back()) {
            (Some(first), Some(last)) if self.history.len() > 1 => {
                let span = last.duration_since(*first).as_secs_f32();
                if span > 0.0 { (self.history.len() - 1) as f32 / span } else { 0.0 }
            }
            _ => 0.0,
        };

        TickReport {
            ticks_per_sec,
            frames_sent: self.frames_sent,
            frames_skipped: self.frames_skipped,
            bytes_received: self.bytes_received,
            tick_count: self.tick_count,
        }
    }

    /// Return a report once per window, `None` otherwise
    pub fn poll_report(&mut self) -> Option<TickReport> {
        if self.last_report.elapsed() < STATS_WINDOW {
            return None;
        }
        self.last_report = Instant::now();
        Some(self.report())
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = TickStats::new();
        stats.tick();
        stats.tick();
        stats.record_received(100);
        stats.record_received(28);
        stats.record_sent();
        stats.record_skipped();

        let report = stats.report();
        assert_eq!(report.tick_count, 2);
        assert_eq!(report.bytes_received, 128);
        assert_eq!(report.frames_sent, 1);
        assert_eq!(report.frames_skipped, 1);
    }

    #[test]
    fn test_no_report_before_window() {
        let mut stats = TickStats::new();
        stats.tick();
        assert!(stats.poll_report().is_none());
    }

    #[test]
    fn test_scheduler_waits_one_interval() {
        let mut scheduler = TickScheduler::new(Duration::from_millis(5));
        let start = Instant::now();
        scheduler.wait();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }
}
