//! Tractography Benchmark Runner
//!
//! Times the external pipeline's model fits and streamline exports across
//! chunk counts, writes the results to CSV and uploads them to S3.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tractbench::{
    config::Config,
    init_tracing,
    pipeline::count_mask_voxels,
    sweep::{run_fit_sweep, run_streamline_sweep},
    utils::{format, secs_to_duration},
    BenchmarkRunner, ChunkSchedule, CommandPipeline, DataShape, EnvironmentFacts, FitSweep,
    ResultPublisher, StreamlineSweep, TrackingParams,
};
use tractbench_cloud::{
    credentials::{default_credentials_path, write_profile},
    AccessKeys, S3UploadConfig, S3Uploader,
};

/// Profile that receives the dataset credentials
const DATASET_PROFILE: &str = "hcp";

#[derive(Parser)]
#[command(name = "benchmark-runner")]
#[command(about = "Tractography pipeline benchmark runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "tractbench.toml", global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Time streamline generation across chunk counts
    Streamlines(StreamlineArgs),
    /// Time model fitting across engines and chunk counts
    Fit(FitArgs),
    /// Write an access key profile into the shared credentials file
    Credentials(CredentialArgs),
    /// Generate sample configuration
    Config {
        /// Where to write the configuration
        #[arg(short, long, default_value = "tractbench.toml")]
        output: PathBuf,
    },
    /// Validate benchmark configuration
    Validate,
}

/// Options shared by every benchmark mode
#[derive(Args)]
struct RunArgs {
    /// Lower bound of the chunk sweep
    #[arg(long, alias = "min_chunks")]
    min_chunks: Option<u32>,

    /// Upper bound of the chunk sweep
    #[arg(long, alias = "max_chunks")]
    max_chunks: Option<u32>,

    /// Sweep 2^n chunks instead of n
    #[arg(long, alias = "exp_chunks")]
    exp_chunks: bool,

    /// Number of repetitions of the whole sweep
    #[arg(long, alias = "num_runs", default_value_t = 1)]
    num_runs: u32,

    /// CPU count to record instead of the detected one
    #[arg(long, alias = "num_cpus")]
    num_cpus: Option<usize>,

    /// Results CSV file
    #[arg(long)]
    filename: Option<PathBuf>,

    /// Destination bucket for the results file
    #[arg(long)]
    s3bucket: Option<String>,

    #[arg(long, alias = "s3_access_key_id", requires = "s3_secret_access_key")]
    s3_access_key_id: Option<String>,

    #[arg(long, alias = "s3_secret_access_key", requires = "s3_access_key_id")]
    s3_secret_access_key: Option<String>,
}

#[derive(Args)]
struct StreamlineArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Number of seeds per voxel
    #[arg(long, alias = "num_seeds", default_value_t = 1)]
    num_seeds: u64,

    /// Place seeds randomly
    #[arg(long, alias = "random_seeds")]
    random_seeds: bool,

    /// Seeds for the random number generator
    #[arg(long, alias = "rng_seeds")]
    rng_seeds: Option<String>,

    /// Access key for the dataset bucket, stored in the `hcp` profile
    #[arg(long, alias = "hcp_access_key_id", requires = "hcp_secret_access_key")]
    hcp_access_key_id: Option<String>,

    #[arg(long, alias = "hcp_secret_access_key", requires = "hcp_access_key_id")]
    hcp_secret_access_key: Option<String>,
}

#[derive(Args)]
struct FitArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Parallel engine to fit with; repeat for several
    #[arg(long = "engine", default_values_t = vec!["serial".to_string()])]
    engines: Vec<String>,

    /// Model name recorded with each trial
    #[arg(long, default_value = "csd")]
    model: String,

    /// Raw u8 brain mask; non-zero bytes are voxels to fit
    #[arg(long, conflicts_with = "num_vox", required_unless_present = "num_vox")]
    mask: Option<PathBuf>,

    /// Number of voxels in the brain mask
    #[arg(long)]
    num_vox: Option<u64>,

    /// Data dimensions, e.g. 81,106,76,160
    #[arg(long)]
    data_shape: Option<DataShape>,
}

#[derive(Args)]
struct CredentialArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    profile: String,

    #[arg(long)]
    access_key_id: String,

    #[arg(long)]
    secret_access_key: String,

    /// Credentials file; defaults to the shared credentials file
    #[arg(long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Streamlines(args) => {
            let config = load_config(&cli.config)?;
            run_streamlines_command(args, config).await?;
        }
        Commands::Fit(args) => {
            let config = load_config(&cli.config)?;
            run_fit_command(args, config).await?;
        }
        Commands::Credentials(args) => {
            credentials_command(args)?;
        }
        Commands::Config { output } => {
            generate_config_command(&output)?;
        }
        Commands::Validate => {
            validate_config_command(&cli.config)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(Some(path))
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_runner(config: &Config, run: &RunArgs) -> Result<BenchmarkRunner<CommandPipeline>> {
    let interval = config.sample_interval()?;
    let facts = EnvironmentFacts::detect().with_cpu_count(run.num_cpus);
    info!(
        "Host: {} CPUs, {} bytes of memory",
        facts.cpu_count, facts.memory_size
    );

    Ok(BenchmarkRunner::new(
        CommandPipeline::new(config.pipeline.clone()),
        facts,
        interval,
    ))
}

async fn build_publisher(config: &Config, run: &RunArgs) -> Result<ResultPublisher<S3Uploader>> {
    let filename = run
        .filename
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.filename));

    let bucket = run.s3bucket.clone().or_else(|| config.upload.bucket.clone());
    let uploader = match bucket {
        Some(bucket) => {
            let credentials =
                AccessKeys::from_parts(run.s3_access_key_id.clone(), run.s3_secret_access_key.clone());
            let upload_config = S3UploadConfig::new(bucket)
                .with_region(config.upload.region.clone())
                .with_credentials(credentials);
            Some(
                S3Uploader::new(upload_config)
                    .await
                    .context("Failed to set up S3 upload")?,
            )
        }
        None => {
            warn!("No bucket given; results will only be written locally");
            None
        }
    };

    let publisher = ResultPublisher::new(filename, uploader);
    match publisher.uploader() {
        Some(uploader) => info!(
            "Results go to {} and s3://{}/{}",
            publisher.filename().display(),
            uploader.bucket(),
            publisher.object_name()
        ),
        None => info!("Results go to {}", publisher.filename().display()),
    }
    Ok(publisher)
}

fn chunk_schedule(run: &RunArgs) -> Result<ChunkSchedule> {
    let schedule = ChunkSchedule::new(run.min_chunks, run.max_chunks, run.exp_chunks)?;
    info!("Chunk counts: {:?}", schedule.values());
    Ok(schedule)
}

async fn run_streamlines_command(args: StreamlineArgs, config: Config) -> Result<()> {
    if let (Some(key_id), Some(secret)) = (&args.hcp_access_key_id, &args.hcp_secret_access_key) {
        let path = default_credentials_path()?;
        write_profile(&path, DATASET_PROFILE, key_id, secret)
            .context("Failed to store dataset credentials")?;
    }

    let mut runner = build_runner(&config, &args.run)?;
    let publisher = build_publisher(&config, &args.run).await?;

    let sweep = StreamlineSweep {
        base_params: TrackingParams {
            n_seeds: args.num_seeds,
            random_seeds: args.random_seeds,
            rng_seeds: args.rng_seeds.clone(),
            trx: true,
            num_chunks: None,
        },
        schedule: chunk_schedule(&args.run)?,
        num_runs: args.run.num_runs,
    };

    let times = run_streamline_sweep(&mut runner, &publisher, &sweep).await?;
    summarize(&times);
    Ok(())
}

async fn run_fit_command(args: FitArgs, config: Config) -> Result<()> {
    let num_vox = match (&args.mask, args.num_vox) {
        (Some(mask), _) => count_mask_voxels(mask)
            .with_context(|| format!("Failed to read mask {}", mask.display()))?,
        (None, Some(num_vox)) => num_vox,
        (None, None) => anyhow::bail!("either --mask or --num-vox is required"),
    };

    let mut runner = build_runner(&config, &args.run)?;
    let publisher = build_publisher(&config, &args.run).await?;

    let sweep = FitSweep {
        engines: args.engines.clone(),
        model: args.model.clone(),
        num_vox,
        data_shape: args.data_shape.clone(),
        schedule: chunk_schedule(&args.run)?,
        num_runs: args.run.num_runs,
    };

    let times = run_fit_sweep(&mut runner, &publisher, &sweep).await?;
    summarize(&times);
    Ok(())
}

fn summarize(times: &[f64]) {
    let total: f64 = times.iter().sum();
    info!(
        "Completed {} trials in {}",
        times.len(),
        format::duration_human(secs_to_duration(total))
    );
}

fn credentials_command(args: CredentialArgs) -> Result<()> {
    let path = match args.file {
        Some(path) => path,
        None => default_credentials_path()?,
    };

    write_profile(&path, &args.profile, &args.access_key_id, &args.secret_access_key)
        .with_context(|| format!("Failed to write credentials to {}", path.display()))?;
    Ok(())
}

fn generate_config_command(output: &Path) -> Result<()> {
    Config::sample().save_to_file(output)?;
    info!("Generated sample configuration: {}", output.display());
    Ok(())
}

fn validate_config_command(path: &Path) -> Result<()> {
    info!("Validating configuration file: {}", path.display());

    let config = Config::load_from_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match config.validate() {
        Ok(()) => {
            info!("Configuration file is valid");
            Ok(())
        }
        Err(e) => {
            warn!("Configuration file is invalid: {}", e);
            Err(e.into())
        }
    }
}
