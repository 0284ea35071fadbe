//! Admission control for the inference backend
//!
//! The backend serves one generation at a time. A [`GenerationSlot`] is a
//! binary permit; callers that find it held are rejected immediately with
//! [`AppError::Busy`] rather than queued.

use opensynthesis_common::errors::{AppError, Result};
use opensynthesis_common::metrics;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Single generation permit shared by every caller of one backend
#[derive(Debug, Clone)]
pub struct GenerationSlot {
    semaphore: Arc<Semaphore>,
}

/// Held generation permit, released on drop
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl GenerationSlot {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the slot without waiting
    pub fn try_acquire(&self) -> Result<SlotGuard> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(SlotGuard { _permit: permit }),
            Err(_) => {
                metrics::record_busy_rejection();
                Err(AppError::Busy)
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for GenerationSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let slot = GenerationSlot::new();
        let guard = slot.try_acquire().unwrap();
        assert!(slot.is_held());
        assert!(matches!(slot.try_acquire(), Err(AppError::Busy)));

        drop(guard);
        assert!(!slot.is_held());
        tokio_test::assert_ok!(slot.try_acquire());
    }

    #[test]
    fn test_clones_share_the_permit() {
        let slot = GenerationSlot::new();
        let other = slot.clone();
        let _guard = slot.try_acquire().unwrap();
        assert!(other.is_held());
        tokio_test::assert_err!(other.try_acquire());
    }

    #[tokio::test]
    async fn test_guard_released_when_task_aborts() {
        let slot = GenerationSlot::new();
        let guard = slot.try_acquire().unwrap();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        handle.abort();
        let _ = handle.await;

        assert!(!slot.is_held());
    }
}
