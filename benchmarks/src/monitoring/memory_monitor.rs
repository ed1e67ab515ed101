//! Background memory sampling around a long-running computation

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{MemorySource, SystemMemory};
use crate::error::{BenchError, Result};
use crate::utils::stats;

/// Samples collected by one monitor and their mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub samples_gb: Vec<f64>,
    pub average_gb: f64,
}

impl MemoryUsage {
    pub fn from_samples(samples_gb: Vec<f64>) -> Result<Self> {
        if samples_gb.is_empty() {
            return Err(BenchError::NoSamples);
        }
        let average_gb = stats::mean(&samples_gb);
        Ok(Self {
            samples_gb,
            average_gb,
        })
    }

    pub fn peak_gb(&self) -> f64 {
        self.samples_gb.iter().copied().fold(f64::MIN, f64::max)
    }
}

/// Periodic memory sampler running on its own task.
///
/// One monitor covers exactly one trial. Dropping a monitor that was not
/// stopped cancels its task.
pub struct MemoryMonitor {
    token: CancellationToken,
    handle: Option<JoinHandle<Vec<f64>>>,
    samples: Vec<f64>,
}

impl MemoryMonitor {
    /// Start sampling system memory every `interval`
    pub fn start(interval: Duration) -> Result<Self> {
        Self::start_with(interval, SystemMemory::new())
    }

    /// Start sampling `source` every `interval`.
    ///
    /// The first sample is taken as soon as the task runs, so a stopped
    /// monitor always holds at least one sample.
    pub fn start_with<S: MemorySource>(interval: Duration, mut source: S) -> Result<Self> {
        if interval.is_zero() {
            return Err(BenchError::InvalidInterval(0.0));
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut samples = Vec::new();
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // First tick completes immediately
            ticker.tick().await;
            samples.push(source.used_gb());

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => samples.push(source.used_gb()),
                }
            }

            samples
        });

        debug!("Memory monitor started with interval {:?}", interval);

        Ok(Self {
            token,
            handle: Some(handle),
            samples: Vec::new(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal the sampling task and wait for it to finish
    pub async fn stop(&mut self) -> Result<()> {
        self.token.cancel();

        if let Some(handle) = self.handle.take() {
            self.samples = handle
                .await
                .map_err(|e| BenchError::MonitorJoin(e.to_string()))?;
            debug!("Memory monitor stopped after {} samples", self.samples.len());
        }

        Ok(())
    }

    /// Samples and their mean. Only available once the monitor is stopped.
    pub fn get_usage(&self) -> Result<MemoryUsage> {
        if self.is_running() {
            return Err(BenchError::MonitorRunning);
        }
        MemoryUsage::from_samples(self.samples.clone())
    }

    /// Drive `fut` to completion while sampling, then stop the monitor.
    ///
    /// The monitor is joined whatever `fut` returns, so a failed computation
    /// never leaves the sampling task behind.
    pub async fn observe<F>(mut self, fut: F) -> (F::Output, Result<MemoryUsage>)
    where
        F: Future,
    {
        let output = fut.await;
        let usage = match self.stop().await {
            Ok(()) => self.get_usage(),
            Err(e) => Err(e),
        };
        (output, usage)
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_samples() {
        let usage = MemoryUsage::from_samples(vec![1.0, 2.0, 3.0, 6.0]).unwrap();
        assert_eq!(usage.average_gb, 3.0);
        assert_eq!(usage.peak_gb(), 6.0);
    }

    #[test]
    fn test_empty_samples_are_an_error() {
        assert!(matches!(
            MemoryUsage::from_samples(Vec::new()),
            Err(BenchError::NoSamples)
        ));
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let result = MemoryMonitor::start_with(Duration::ZERO, || 1.0);
        assert!(matches!(result, Err(BenchError::InvalidInterval(_))));
    }

    #[tokio::test]
    async fn test_usage_requires_stop() {
        let mut monitor = MemoryMonitor::start_with(Duration::from_millis(10), || 1.0).unwrap();
        assert!(matches!(monitor.get_usage(), Err(BenchError::MonitorRunning)));

        monitor.stop().await.unwrap();
        let usage = monitor.get_usage().unwrap();
        assert!(!usage.samples_gb.is_empty());
        assert_eq!(usage.average_gb, 1.0);
    }
}
