use std::collections::HashMap;

use log::{info, warn};

/// Outcome of recording a segment load failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryResult {
    Retry(String),
    Failed(String),
}

/// Bounded retry bookkeeping for segment loads.
///
/// Each segment gets `max_attempts` tries; after that the failure is final
/// until [`LoadRecovery::forget`] is called for it.
#[derive(Debug, Clone)]
pub struct LoadRecovery {
    attempts: HashMap<usize, u32>,
    max_attempts: u32,
}

impl LoadRecovery {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: HashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Failed attempts recorded so far for a segment
    pub fn attempts(&self, index: usize) -> u32 {
        self.attempts.get(&index).copied().unwrap_or(0)
    }

    pub fn record_failure(&mut self, index: usize, reason: &str) -> RecoveryResult {
        let attempts = self.attempts(index) + 1;
        self.attempts.insert(index, attempts);

        if attempts >= self.max_attempts {
            warn!(
                "Segment {} failed to load {} times, giving up: {}",
                index, attempts, reason
            );
            RecoveryResult::Failed(format!(
                "Segment {} could not be loaded after {} attempts: {}",
                index, attempts, reason
            ))
        } else {
            info!(
                "Segment {} failed to load (attempt {} of {}): {}",
                index, attempts, self.max_attempts, reason
            );
            RecoveryResult::Retry(format!("Retrying segment {}", index))
        }
    }

    pub fn record_success(&mut self, index: usize) {
        self.attempts.remove(&index);
    }

    /// Allow a segment that has exhausted its attempts to be tried again
    pub fn forget(&mut self, index: usize) {
        self.attempts.remove(&index);
    }

    pub fn clear(&mut self) {
        self.attempts.clear();
    }
}

impl Default for LoadRecovery {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_until_limit() {
        let mut recovery = LoadRecovery::new(3);

        assert!(matches!(recovery.record_failure(1, "boom"), RecoveryResult::Retry(_)));
        assert!(matches!(recovery.record_failure(1, "boom"), RecoveryResult::Retry(_)));
        assert!(matches!(recovery.record_failure(1, "boom"), RecoveryResult::Failed(_)));
        assert_eq!(recovery.attempts(1), 3);
        assert_eq!(recovery.attempts(0), 0);
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut recovery = LoadRecovery::new(2);
        recovery.record_failure(4, "flaky");
        recovery.record_success(4);

        assert_eq!(recovery.attempts(4), 0);
        assert!(matches!(recovery.record_failure(4, "flaky"), RecoveryResult::Retry(_)));
    }

    #[test]
    fn test_zero_attempts_is_treated_as_one() {
        let mut recovery = LoadRecovery::new(0);
        assert_eq!(recovery.max_attempts(), 1);
        assert!(matches!(recovery.record_failure(0, "x"), RecoveryResult::Failed(_)));
    }
}
