//! Tractography pipeline benchmarking
//!
//! Runs model fits and streamline exports of an external tractography
//! pipeline under varying chunk counts, including:
//!
//! - Wall-clock timing of each trial
//! - Background memory sampling while the pipeline runs
//! - CSV result tables that accumulate across invocations
//! - Upload of the results file to object storage

pub mod config;
pub mod error;
pub mod monitoring;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod schedule;
pub mod sweep;
pub mod utils;

pub use error::{BenchError, Result};
pub use monitoring::{MemoryMonitor, MemoryUsage};
pub use pipeline::{CommandPipeline, DataShape, FitRequest, Pipeline, TrackingParams};
pub use record::{RunMode, RunRecord, RunTable};
pub use runner::{BenchmarkRunner, EnvironmentFacts, FitTrial};
pub use schedule::ChunkSchedule;
pub use sweep::{FitSweep, ResultPublisher, StreamlineSweep};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug output.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tractbench=debug,tractbench_cloud=debug,benchmark_runner=debug"
    } else {
        "tractbench=info,tractbench_cloud=info,benchmark_runner=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
