//! Cooperative cancellation for blocking loads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use report_core::error::{ReportError, Result};

/// Shared flag checked by the loader between sheets and every
/// [`CancelFlag::CHECK_EVERY`] rows. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Rows processed between two checks of the flag.
    pub const CHECK_EVERY: usize = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ReportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Check only on every [`CHECK_EVERY`](Self::CHECK_EVERY)th row.
    pub(crate) fn check_row(&self, row: usize) -> Result<()> {
        if row % Self::CHECK_EVERY == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let flag = CancelFlag::new();
        let worker = flag.clone();
        assert!(worker.check().is_ok());

        flag.cancel();
        assert!(worker.is_cancelled());
        assert!(matches!(worker.check(), Err(ReportError::Cancelled)));
    }

    #[test]
    fn test_check_row_only_on_interval() {
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(flag.check_row(1).is_ok());
        assert!(flag.check_row(CancelFlag::CHECK_EVERY - 1).is_ok());
        assert!(flag.check_row(0).is_err());
        assert!(flag.check_row(CancelFlag::CHECK_EVERY).is_err());
    }
}
