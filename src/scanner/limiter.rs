//! Admission gate for probes.
//!
//! A counting semaphore sized to the [`ConcurrencyBudget`]. A probe must hold
//! a [`Slot`] while its socket is open; dropping the slot returns the unit,
//! so release happens on every exit path including panics and aborts.

use super::budget::ConcurrencyBudget;
use crate::error::{ScanError, ScanResult};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of admitted concurrency.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(budget: ConcurrencyBudget) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(budget.get())),
            capacity: budget.get(),
        }
    }

    /// Wait until a unit is available.
    ///
    /// Fails only after [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> ScanResult<Slot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ScanError::LimiterClosed)?;
        Ok(Slot { _permit: permit })
    }

    /// Refuse all waiting and future acquisitions. Slots already handed out
    /// stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
