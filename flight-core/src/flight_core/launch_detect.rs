use heapless::Deque;

use crate::{sensor::SensorSample, utils::elapsed_us};

/// Hard upper bound on samples kept for replay.
pub const LAUNCH_DETECT_CAPACITY: usize = 128;

/// Outcome of feeding one READY sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDetect {
    /// below threshold, nothing pending
    Quiet,
    /// above threshold, window not yet long enough
    Pending,
    /// threshold held for the full window, launch happened at `launch_time_us`
    Confirmed { launch_time_us: u64 },
}

/// Debounced launch detection on the primary accelerometer body axis.
///
/// When replay is on, the samples of the confirmation window are kept so the
/// estimator can catch up on the first moments of boost.
pub struct LaunchDetector {
    threshold: f32,
    duration_us: u64,
    replay: bool,
    above_since: Option<u64>,
    history: Deque<SensorSample, LAUNCH_DETECT_CAPACITY>,
    limit: usize,
}

impl LaunchDetector {
    pub fn new(threshold: f32, duration_us: u64, replay: bool, limit: usize) -> Self {
        Self {
            threshold,
            duration_us,
            replay,
            above_since: None,
            history: Deque::new(),
            limit: limit.clamp(1, LAUNCH_DETECT_CAPACITY),
        }
    }

    pub fn feed(&mut self, sample: &SensorSample) -> LaunchDetect {
        // NaN counts as below threshold
        let above = sample.body_acc() > self.threshold;
        if !above {
            if self.above_since.is_some() {
                log_debug!("launch detect reset at {}", sample.timestamp_us);
            }
            self.clear();
            return LaunchDetect::Quiet;
        }

        let since = *self.above_since.get_or_insert(sample.timestamp_us);

        if self.replay {
            if self.history.len() >= self.limit {
                self.history.pop_front();
            }
            // cannot fail, room was made above
            let _ = self.history.push_back(sample.clone());
        }

        if elapsed_us(sample.timestamp_us, since) >= self.duration_us {
            LaunchDetect::Confirmed {
                launch_time_us: since,
            }
        } else {
            LaunchDetect::Pending
        }
    }

    /// Oldest buffered sample first.
    pub fn pop_front(&mut self) -> Option<SensorSample> {
        self.history.pop_front()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn replay_enabled(&self) -> bool {
        self.replay
    }

    pub fn clear(&mut self) {
        self.above_since = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::flight::{boost_sample, pad_sample};

    fn detector(replay: bool) -> LaunchDetector {
        // 3 g for 100 ms at a 10 ms tick
        LaunchDetector::new(3.0, 100_000, replay, 11)
    }

    #[test]
    fn confirms_after_full_window() {
        let mut detector = detector(true);
        assert_eq!(detector.feed(&pad_sample(0)), LaunchDetect::Quiet);

        for ts in (10_000..110_000).step_by(10_000) {
            assert_eq!(detector.feed(&boost_sample(ts, 5.0)), LaunchDetect::Pending);
        }
        assert_eq!(
            detector.feed(&boost_sample(110_000, 5.0)),
            LaunchDetect::Confirmed {
                launch_time_us: 10_000
            }
        );
        assert_eq!(detector.len(), 11);

        let mut previous = 0;
        while let Some(sample) = detector.pop_front() {
            assert!(sample.timestamp_us > previous);
            previous = sample.timestamp_us;
        }
        assert_eq!(previous, 110_000);
    }

    #[test]
    fn dip_below_threshold_resets() {
        let mut detector = detector(true);
        for ts in (0..90_000).step_by(10_000) {
            detector.feed(&boost_sample(ts, 5.0));
        }
        assert_eq!(detector.feed(&boost_sample(90_000, 2.0)), LaunchDetect::Quiet);
        assert!(detector.is_empty());

        // window restarts from the next above threshold sample
        assert_eq!(detector.feed(&boost_sample(100_000, 5.0)), LaunchDetect::Pending);
        assert_eq!(
            detector.feed(&boost_sample(200_000, 5.0)),
            LaunchDetect::Confirmed {
                launch_time_us: 100_000
            }
        );
    }

    #[test]
    fn nan_counts_as_quiet() {
        let mut detector = detector(true);
        detector.feed(&boost_sample(0, 5.0));
        assert_eq!(
            detector.feed(&SensorSample::missing(10_000)),
            LaunchDetect::Quiet
        );
        assert!(detector.is_empty());
    }

    #[test]
    fn keeps_only_the_newest_samples() {
        let mut detector = LaunchDetector::new(3.0, 1_000_000, true, 4);
        for ts in (0..100_000).step_by(10_000) {
            detector.feed(&boost_sample(ts, 5.0));
        }
        assert_eq!(detector.len(), 4);
        assert_eq!(detector.pop_front().map(|s| s.timestamp_us), Some(60_000));
    }

    #[test]
    fn without_replay_nothing_is_buffered() {
        let mut detector = detector(false);
        for ts in (0..=100_000).step_by(10_000) {
            detector.feed(&boost_sample(ts, 5.0));
        }
        assert!(detector.is_empty());
        assert!(!detector.replay_enabled());
    }
}
