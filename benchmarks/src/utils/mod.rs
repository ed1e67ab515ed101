//! Small helpers shared by the runner and the CLI

use std::time::Duration;
use tokio::time::Instant;

/// Timer utility for measuring execution time.
///
/// Reads the tokio clock, which follows the real clock unless a test pauses it.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Statistical utilities
pub mod stats {
    /// Arithmetic mean; zero for an empty slice
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Format utilities
pub mod format {
    use std::time::Duration;

    pub fn duration_human(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        let millis = duration.subsec_millis();

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if seconds > 0 {
            format!("{}.{:03}s", seconds, millis)
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    /// Memory samples as a bracketed list, e.g. `[1.25, 1.3]`
    pub fn samples_list(samples: &[f64]) -> String {
        let body = samples
            .iter()
            .map(|s| format!("{:?}", s))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[{}]", body)
    }
}

/// Elapsed seconds as a `Duration`, clamped for log output
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
