//! Degrade-and-retry policy for record writes.
//!
//! A write rejected because a unique value (serial number, item id) is
//! already taken is retried exactly once without the fields flagged
//! `error-skip`. Any other failure, or a second failure, gives up.
//!
//! ```text
//! Full --duplicate value--> Degraded --any error--> Exhausted
//!   \--other error-------------------------------->/
//! ```

use crate::error::SyncError;

/// Where a record write stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradeState {
    /// First attempt with every field.
    #[default]
    Full,
    /// Single retry without `error-skip` fields.
    Degraded,
    /// No attempts left.
    Exhausted,
}

/// What to do after a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Rebuild the payload without `error-skip` fields and try again.
    RetryDegraded,
    /// Abandon the record.
    GiveUp,
}

/// Finite retry policy for one record.
#[derive(Debug, Clone, Default)]
pub struct DegradePolicy {
    state: DegradeState,
}

impl DegradePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DegradeState {
        self.state
    }

    /// Whether `error-skip` fields must be left out of the next payload.
    #[must_use]
    pub fn skip_error_fields(&self) -> bool {
        self.state == DegradeState::Degraded
    }

    /// Advance on a failed write.
    pub fn on_error(&mut self, error: &SyncError) -> RetryDecision {
        match self.state {
            DegradeState::Full if error.is_duplicate_value() => {
                self.state = DegradeState::Degraded;
                RetryDecision::RetryDegraded
            }
            _ => {
                self.state = DegradeState::Exhausted;
                RetryDecision::GiveUp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbsync_freshservice::FreshServiceError;

    fn duplicate() -> SyncError {
        SyncError::Target(FreshServiceError::DuplicateValue {
            method: "POST".to_string(),
            path: "api/v2/assets".to_string(),
            body: String::new(),
        })
    }

    #[test]
    fn test_duplicate_degrades_once() {
        let mut policy = DegradePolicy::new();
        assert!(!policy.skip_error_fields());

        assert_eq!(policy.on_error(&duplicate()), RetryDecision::RetryDegraded);
        assert!(policy.skip_error_fields());

        assert_eq!(policy.on_error(&duplicate()), RetryDecision::GiveUp);
        assert_eq!(policy.state(), DegradeState::Exhausted);
        assert_eq!(policy.on_error(&duplicate()), RetryDecision::GiveUp);
    }

    #[test]
    fn test_other_errors_give_up() {
        let mut policy = DegradePolicy::new();
        let err = SyncError::record("srv1", "boom");
        assert_eq!(policy.on_error(&err), RetryDecision::GiveUp);
        assert!(!policy.skip_error_fields());
    }
}
