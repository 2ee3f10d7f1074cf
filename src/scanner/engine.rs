//! The raw-connect scan engine.
//!
//! One short-lived task per port, all spawned up front and admitted by the
//! [`ConcurrencyLimiter`]. Each task reports to the [`Aggregator`]; the
//! driver joins every task before the results are released.

use super::aggregator::{Aggregator, ResultSet};
use super::budget::ConcurrencyBudget;
use super::limiter::ConcurrencyLimiter;
use super::rate_limiter::RateLimiter;
use super::tcp::{Dialer, Prober, TcpDialer};
use super::traits::{PortState, ScanBackend, ScanConfig, Scanner};
use crate::error::{ScanError, ScanResult};
use crate::types::ScanTarget;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Full TCP connect scanner.
///
/// Does not require elevated privileges. The concurrency budget is
/// resolved once, when the scanner is built, and reused for every scan.
pub struct ConnectScanner<D = TcpDialer> {
    config: ScanConfig,
    budget: ConcurrencyBudget,
    dialer: D,
}

impl ConnectScanner<TcpDialer> {
    /// Build a scanner sized to this process's descriptor limit.
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        let budget =
            ConcurrencyBudget::resolve(config.fallback_concurrency, config.concurrency_cap)?;
        Ok(Self::with_budget(config, budget, TcpDialer))
    }
}

impl<D> ConnectScanner<D>
where
    D: Dialer + Clone + 'static,
{
    pub fn with_budget(config: ScanConfig, budget: ConcurrencyBudget, dialer: D) -> Self {
        Self {
            config,
            budget,
            dialer,
        }
    }

    pub fn budget(&self) -> ConcurrencyBudget {
        self.budget
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

#[async_trait]
impl<D> Scanner for ConnectScanner<D>
where
    D: Dialer + Clone + 'static,
{
    fn backend(&self) -> ScanBackend {
        ScanBackend::Connect
    }

    fn requires_privileges(&self) -> bool {
        false
    }

    async fn scan(&self, target: &ScanTarget) -> ScanResult<ResultSet> {
        let start = Instant::now();
        let prober = Arc::new(
            Prober::with_dialer(target.ip, self.config.timeout, self.dialer.clone())
                .with_max_retries(self.config.max_retries),
        );
        let limiter = ConcurrencyLimiter::new(self.budget);
        let pacing = RateLimiter::new(self.config.rate_limit);
        let progress = self.progress_bar(target.ports.len());

        tracing::info!(
            host = %target,
            ports = %target.ports,
            budget = self.budget.get(),
            "starting connect scan"
        );

        let (handle, aggregator) = Aggregator::spawn();
        let mut tasks = JoinSet::new();

        for port in target.ports.iter() {
            let prober = Arc::clone(&prober);
            let limiter = limiter.clone();
            let pacing = pacing.clone();
            let handle = handle.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                let _slot = limiter.acquire().await?;
                if let Some(pacing) = &pacing {
                    pacing.wait().await;
                }

                let outcome = prober.probe(port).await;
                handle.report(outcome).await?;

                progress.inc(1);
                if outcome.state == PortState::Open {
                    progress.set_message(format!("Found open port: {}", port));
                }
                Ok::<(), ScanError>(())
            });
        }
        // Only the tasks hold senders now; the aggregator stops when they finish.
        drop(handle);

        match self.config.deadline {
            Some(limit) => {
                let drained = tokio::time::timeout(limit, drain(&mut tasks)).await;
                match drained {
                    Ok(result) => result?,
                    Err(_) => {
                        limiter.close();
                        tasks.shutdown().await;
                        progress.abandon_with_message("Scan aborted");
                        tracing::warn!(?limit, "scan deadline exceeded");
                        return Err(ScanError::DeadlineExceeded(limit));
                    }
                }
            }
            None => drain(&mut tasks).await?,
        }

        let results = aggregator.finish().await?;
        progress.finish_with_message("Scan complete");

        tracing::info!(
            open = results.count(PortState::Open),
            scanned = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "connect scan finished"
        );
        Ok(results)
    }
}

/// Join every probe task. A panicked task is logged and skipped.
async fn drain(tasks: &mut JoinSet<ScanResult<()>>) -> ScanResult<()> {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) if e.is_panic() => tracing::error!("probe task panicked: {}", e),
            Err(_) => {}
        }
    }
    Ok(())
}
