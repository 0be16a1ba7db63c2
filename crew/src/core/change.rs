//! Modification-time change detection for the background poll loop.

use std::time::SystemTime;

/// Tracks the last-observed mtime of the watched document.
///
/// The first successful observation only records a baseline and never fires,
/// so a file that already existed before the loop started does not trigger a
/// phase. A missing file is no observation at all; the baseline is kept.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    baseline: Option<SystemTime>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll result. Returns true when a genuine change is detected.
    ///
    /// Any mtime differing from the baseline counts as a change, including a
    /// file that was replaced with an older timestamp.
    pub fn observe(&mut self, mtime: Option<SystemTime>) -> bool {
        let Some(mtime) = mtime else {
            return false;
        };
        match self.baseline {
            None => {
                self.baseline = Some(mtime);
                false
            }
            Some(seen) if seen == mtime => false,
            Some(_) => {
                self.baseline = Some(mtime);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn first_observation_is_baseline_only() {
        let mut tracker = ChangeTracker::new();
        assert!(!tracker.observe(Some(at(100))));
    }

    #[test]
    fn subsequent_change_fires_once() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(Some(at(100)));
        assert!(tracker.observe(Some(at(200))));
        assert!(!tracker.observe(Some(at(200))));
    }

    #[test]
    fn missing_file_is_no_observation() {
        let mut tracker = ChangeTracker::new();
        assert!(!tracker.observe(None));
        tracker.observe(Some(at(100)));
        assert!(!tracker.observe(None));
        // Baseline kept across the gap; same mtime is still unchanged.
        assert!(!tracker.observe(Some(at(100))));
    }

    #[test]
    fn replaced_file_with_older_mtime_counts_as_change() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(Some(at(200)));
        assert!(tracker.observe(Some(at(100))));
    }
}
