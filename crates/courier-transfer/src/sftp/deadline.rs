//! Wall-clock budget shared by every step of one upload.

use std::time::{Duration, Instant};

use crate::error::{TransferError, TransferResult};

/// Budget for one upload, running from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a budget of `budget` now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Total budget granted at creation.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left; zero once the budget is spent.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    /// Whether the budget is spent.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Fail with [`TransferError::Timeout`] tagged `operation` once the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns a timeout error when no time remains.
    pub fn check(&self, operation: &'static str) -> TransferResult<()> {
        if self.expired() {
            Err(TransferError::Timeout {
                operation,
                after: self.budget,
            })
        } else {
            Ok(())
        }
    }

    /// Remaining time in whole milliseconds, never zero.
    ///
    /// libssh2 and socket timeouts treat zero as "wait forever".
    pub(crate) fn remaining_millis(&self) -> u32 {
        u32::try_from(self.remaining().as_millis())
            .unwrap_or(u32::MAX)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_spent_immediately() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.remaining_millis(), 1);
        assert!(matches!(
            deadline.check("sftp.handshake"),
            Err(TransferError::Timeout {
                operation: "sftp.handshake",
                after,
            }) if after.is_zero()
        ));
    }

    #[test]
    fn generous_budget_still_has_time() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(deadline.check("sftp.write").is_ok());
        assert!(deadline.remaining() <= deadline.budget());
        assert!(deadline.remaining_millis() > 1_000);
    }
}
