/// Turns raw byte counts into a percentage that only ever goes up.
///
/// Playlists restart the raw counters for every item; those regressions are
/// swallowed instead of rewinding the progress bar.
#[derive(Debug, Default, Clone)]
pub struct ProgressSmoother {
    max_percent: u8,
}

impl ProgressSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_percent(&self) -> u8 {
        self.max_percent
    }

    /// Returns the new percentage only when it beats everything emitted so far.
    pub fn observe(&mut self, downloaded: u64, total: u64) -> Option<u8> {
        let total = total.max(1) as f64;
        let percent = (downloaded as f64 / total * 100.0).clamp(0.0, 100.0) as u8;
        if percent > self.max_percent {
            self.max_percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_only_increases() {
        let mut smoother = ProgressSmoother::new();
        assert_eq!(smoother.observe(0, 100), None);
        assert_eq!(smoother.observe(10, 100), Some(10));
        assert_eq!(smoother.observe(10, 100), None);
        assert_eq!(smoother.observe(5, 100), None);
        assert_eq!(smoother.observe(999, 1000), Some(99));
        assert_eq!(smoother.observe(1000, 1000), Some(100));
        assert_eq!(smoother.observe(2000, 1000), None);
        assert_eq!(smoother.max_percent(), 100);
    }

    #[test]
    fn test_zero_total() {
        let mut smoother = ProgressSmoother::new();
        assert_eq!(smoother.observe(0, 0), None);
        assert_eq!(smoother.observe(5, 0), Some(100));
    }

    #[test]
    fn test_playlist_reset_is_absorbed() {
        let mut smoother = ProgressSmoother::new();
        let samples = [
            (50, 100),
            (100, 100),
            (1, 200),
            (100, 200),
            (199, 200),
            (u64::MAX, 1),
            (3, 0),
        ];
        let mut emitted = Vec::new();
        for (downloaded, total) in samples {
            if let Some(p) = smoother.observe(downloaded, total) {
                emitted.push(p);
            }
        }
        assert_eq!(emitted, vec![50, 100]);
        assert!(emitted.windows(2).all(|w| w[0] <= w[1]));
        assert!(emitted.iter().all(|p| *p <= 100));
    }

    #[test]
    fn test_sequence_is_monotonic_over_many_samples() {
        let mut smoother = ProgressSmoother::new();
        let mut last = 0;
        // Deterministic pseudo-random walk, including totals of zero.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..10_000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let total = seed % 5_000;
            let downloaded = (seed >> 20) % 6_000;
            if let Some(p) = smoother.observe(downloaded, total) {
                assert!(p > last);
                assert!(p <= 100);
                last = p;
            }
        }
    }
}
