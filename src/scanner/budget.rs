//! Concurrency budget derived from the open file descriptor limit.
//!
//! Every in-flight probe holds one socket, so the soft `RLIMIT_NOFILE` value
//! bounds how many probes may run at once. Descriptors the process already
//! holds (stdio, the runtime's poller, log files) and a reserve for the
//! ones it opens while scanning are taken off the top.

use crate::error::{ScanError, ScanResult};
use tokio::sync::Semaphore;

/// Capacity used when the OS reports no descriptor limit at all.
pub const DEFAULT_FALLBACK: usize = 1000;

/// Smallest number of descriptors kept out of the budget.
const MIN_RESERVE: u64 = 16;

/// What the OS reported for the per-process descriptor limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorLimit {
    /// Soft limit and the number of descriptors open when it was read.
    Bounded { soft: u64, in_use: u64 },
    Unbounded,
}

impl DescriptorLimit {
    /// A bounded limit with nothing open yet.
    pub fn bounded(soft: u64) -> Self {
        Self::Bounded { soft, in_use: 0 }
    }
}

/// Maximum number of probes allowed in flight. Fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyBudget(usize);

impl ConcurrencyBudget {
    /// Query the OS and derive the budget.
    ///
    /// `fallback` replaces an unbounded limit; `cap` is an optional user
    /// ceiling that can only lower the result.
    pub fn resolve(fallback: usize, cap: Option<usize>) -> ScanResult<Self> {
        let limit = query_descriptor_limit()?;
        let budget = Self::from_limit(limit, fallback, cap);
        tracing::debug!(?limit, budget = budget.get(), "resolved concurrency budget");
        Ok(budget)
    }

    /// Derive the budget from an already known limit.
    pub fn from_limit(limit: DescriptorLimit, fallback: usize, cap: Option<usize>) -> Self {
        let raw = match limit {
            DescriptorLimit::Bounded { soft, in_use } => {
                let available = soft.saturating_sub(in_use).saturating_sub(reserve(soft));
                usize::try_from(available).unwrap_or(usize::MAX)
            }
            DescriptorLimit::Unbounded => {
                tracing::warn!(fallback, "descriptor limit is unbounded, using fallback");
                fallback
            }
        };

        let capped = match cap {
            Some(cap) if cap > 0 => raw.min(cap),
            _ => raw,
        };

        Self(capped.clamp(1, Semaphore::MAX_PERMITS))
    }

    /// Build a budget directly; used when the caller already knows it.
    pub fn fixed(capacity: usize) -> Self {
        Self(capacity.clamp(1, Semaphore::MAX_PERMITS))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Descriptors held back for the rest of the process: an eighth of the
/// limit, at least [`MIN_RESERVE`].
fn reserve(soft: u64) -> u64 {
    (soft / 8).max(MIN_RESERVE)
}

#[cfg(unix)]
fn query_descriptor_limit() -> ScanResult<DescriptorLimit> {
    use rlimit::Resource;

    let (soft, _hard) = Resource::NOFILE.get().map_err(ScanError::ResourceQueryFailed)?;
    if soft == rlimit::INFINITY {
        return Ok(DescriptorLimit::Unbounded);
    }

    Ok(DescriptorLimit::Bounded {
        soft,
        in_use: open_descriptors(),
    })
}

#[cfg(not(unix))]
fn query_descriptor_limit() -> ScanResult<DescriptorLimit> {
    Ok(DescriptorLimit::Unbounded)
}

/// Count this process's open descriptors. Zero when it cannot be listed.
#[cfg(unix)]
fn open_descriptors() -> u64 {
    std::fs::read_dir("/dev/fd")
        .map(|entries| entries.count() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_uses_fallback() {
        let budget = ConcurrencyBudget::from_limit(DescriptorLimit::Unbounded, DEFAULT_FALLBACK, None);
        assert_eq!(budget.get(), 1000);
    }

    #[test]
    fn test_bounded_keeps_headroom() {
        let budget = ConcurrencyBudget::from_limit(DescriptorLimit::bounded(1024), 1000, None);
        assert_eq!(budget.get(), 1024 - 128);

        // Small limits still leave the minimum reserve free
        let small = ConcurrencyBudget::from_limit(DescriptorLimit::bounded(64), 1000, None);
        assert_eq!(small.get(), 64 - 16);
    }

    #[test]
    fn test_descriptors_in_use_are_subtracted() {
        let limit = DescriptorLimit::Bounded {
            soft: 64,
            in_use: 10,
        };
        let budget = ConcurrencyBudget::from_limit(limit, 1000, None);
        assert_eq!(budget.get(), 64 - 10 - 16);
        assert!((budget.get() as u64) < 64);
    }

    #[test]
    fn test_cap_only_lowers() {
        let lowered = ConcurrencyBudget::from_limit(DescriptorLimit::bounded(1024), 1000, Some(64));
        assert_eq!(lowered.get(), 64);

        let not_raised = ConcurrencyBudget::from_limit(DescriptorLimit::bounded(256), 1000, Some(5000));
        assert_eq!(not_raised.get(), 256 - 32);

        let zero_ignored = ConcurrencyBudget::from_limit(DescriptorLimit::bounded(256), 1000, Some(0));
        assert_eq!(zero_ignored.get(), 256 - 32);
    }

    #[test]
    fn test_budget_is_always_positive_and_bounded() {
        assert_eq!(ConcurrencyBudget::from_limit(DescriptorLimit::bounded(0), 1000, None).get(), 1);
        assert_eq!(ConcurrencyBudget::from_limit(DescriptorLimit::bounded(12), 1000, None).get(), 1);
        let huge = ConcurrencyBudget::from_limit(DescriptorLimit::bounded(u64::MAX), 1000, None);
        assert_eq!(huge.get(), Semaphore::MAX_PERMITS);
    }

    #[test]
    fn test_resolve_on_this_host() {
        let budget = ConcurrencyBudget::resolve(DEFAULT_FALLBACK, None).unwrap();
        assert!(budget.get() >= 1);

        #[cfg(unix)]
        {
            let (soft, _) = rlimit::Resource::NOFILE.get().unwrap();
            if soft != rlimit::INFINITY && soft > 2 * MIN_RESERVE {
                assert!((budget.get() as u64) < soft);
            }
        }
    }
}
