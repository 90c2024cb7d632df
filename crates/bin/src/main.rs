//! adsim CLI binary.
//!
//! Simulates media-mix datasets, fits them with the grid-search engine and
//! reports how well the ground truth was recovered.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use adsim::{SweepSummary, seeds_from, sweep_recovery};
use adsim_design::{DesignError, ModelPayload, RunConfig, Scenario};
use adsim_inference::{GridSearchEngine, InferenceEngine, Posterior, fit_with_timeout};
use adsim_output::{ExportFormat, Exporter, RecoveryReport, save_dataset_csv};
use adsim_series::Channel;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adsim")]
#[command(about = "adsim: synthetic media-mix data with known ground truth", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a run and write its dataset, payload and configuration
    Generate {
        #[command(flatten)]
        run: RunArgs,

        /// Output directory
        #[arg(short, long, default_value = "adsim-output")]
        output: PathBuf,
    },

    /// Fit a payload with the grid-search engine
    Fit {
        #[command(flatten)]
        run: RunArgs,

        /// Fit a previously exported payload instead of simulating one
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Fit timeout in seconds
        #[arg(long, default_value = "300")]
        timeout: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Simulate and fit one configuration over many seeds
    Sweep {
        #[command(flatten)]
        run: RunArgs,

        /// Number of seeds
        #[arg(long, default_value = "20")]
        seeds: usize,

        /// First seed
        #[arg(long, default_value = "1")]
        start: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the supported media channels
    Channels,
}

/// Run configuration source and overrides
#[derive(Args)]
struct RunArgs {
    /// JSON run configuration (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the run seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of periods
    #[arg(long)]
    periods: Option<usize>,

    /// Override the lag window length
    #[arg(long)]
    window: Option<usize>,
}

impl RunArgs {
    fn load(&self) -> Result<RunConfig, DesignError> {
        let mut config = self
            .config
            .as_deref()
            .map_or_else(|| Ok(RunConfig::default()), RunConfig::from_path)?;
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(periods) = self.periods {
            config = config.with_periods(periods);
        }
        if let Some(window) = self.window {
            config = config.with_window(window);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate { run, output } => generate(&run.load()?, &output),
        Commands::Fit {
            run,
            payload,
            timeout,
            format,
        } => {
            let timeout = Duration::from_secs(timeout);
            match payload {
                Some(path) => fit_payload_file(&path, timeout, format).await,
                None => fit_simulated(&run.load()?, timeout, format).await,
            }
        }
        Commands::Sweep {
            run,
            seeds,
            start,
            format,
        } => sweep(&run.load()?, start, seeds, format),
        Commands::Channels => {
            list_channels();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_header(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

fn generate(config: &RunConfig, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let run = Scenario::run(config)?;
    std::fs::create_dir_all(output)?;

    let dataset_path = output.join("dataset.csv");
    let payload_path = output.join("payload.json");
    let config_path = output.join("config.json");
    save_dataset_csv(run.dataset(), &dataset_path)?;
    run.payload()
        .export_to_file(&payload_path, ExportFormat::PrettyJson)?;
    std::fs::write(&config_path, config.to_json()?)?;

    print_header("adsim Generate");
    println!("Seed:     {}", config.generation.seed);
    println!("Periods:  {}", config.generation.periods);
    println!("Window:   {}", run.design().window());
    println!(
        "Channels: {}",
        run.payload()
            .channels()
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Rows:     {}", run.dataset().len());
    println!();
    println!("Dataset:  {}", dataset_path.display());
    println!("Payload:  {}", payload_path.display());
    println!("Config:   {}", config_path.display());

    if run.dataset().is_empty() {
        warn!("window exceeds the number of periods; dataset is empty");
    }
    Ok(())
}

async fn fit_payload(
    payload: ModelPayload,
    timeout: Duration,
) -> Result<Posterior, Box<dyn std::error::Error>> {
    let engine = Arc::new(GridSearchEngine::default());
    info!(
        engine = engine.name(),
        rows = payload.n(),
        channels = payload.num_channels(),
        "fitting payload"
    );

    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(());
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Fitting with {}...", engine.name()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = fit_with_timeout(engine, Arc::new(payload), timeout, Some(cancel_rx)).await;
    spinner.finish_and_clear();
    Ok(result?)
}

async fn fit_simulated(
    config: &RunConfig,
    timeout: Duration,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let run = Scenario::run(config)?;
    let posterior = fit_payload(run.payload().clone(), timeout).await?;
    let report = RecoveryReport::new(&run, &posterior)?;

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => {
            print_header("adsim Parameter Recovery");
            print!("{}", report.to_ascii_table());
        }
    }
    Ok(())
}

async fn fit_payload_file(
    path: &Path,
    timeout: Duration,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload: ModelPayload = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let posterior = fit_payload(payload, timeout).await?;

    match format {
        OutputFormat::Json => println!("{}", posterior.export_to_string(ExportFormat::PrettyJson)?),
        OutputFormat::Text => {
            print_header("adsim Posterior");
            println!(
                "{:<10} {:>8} {:>8} {:>8} {:>8} {:>8}",
                "Channel", "Rate", "Theta", "K", "S", "B"
            );
            println!("{}", "-".repeat(56));
            for e in posterior.channels() {
                println!(
                    "{:<10} {:>8.3} {:>8} {:>8.3} {:>8.3} {:>8.3}",
                    e.channel.name(),
                    e.rate,
                    e.theta.map_or_else(|| "-".to_string(), |t| format!("{t:.2}")),
                    e.k,
                    e.s,
                    e.b
                );
            }
            println!("{}", "-".repeat(56));
            println!("Intercept: {:.4}", posterior.intercept());
            for (k, g) in posterior.control_coefficients().iter().enumerate() {
                println!("Gamma {}:   {:.4}", k + 1, g);
            }
            println!("RSS:       {:.6e}", posterior.rss());
        }
    }
    Ok(())
}

fn sweep(
    base: &RunConfig,
    start: u64,
    count: usize,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = GridSearchEngine::default();
    let seeds = seeds_from(start, count);
    let chunk = std::thread::available_parallelism().map_or(1, |n| n.get());

    let pb = ProgressBar::new(seeds.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let mut records = Vec::with_capacity(seeds.len());
    for batch in seeds.chunks(chunk) {
        pb.set_message(format!("seed {}", batch[0]));
        records.extend(sweep_recovery(base, batch, &engine));
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("Sweep complete");

    for record in &records {
        if let Err(e) = &record.result {
            warn!(seed = record.seed, error = %e, "run failed");
        }
    }

    let summary = SweepSummary::from_records(&records);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            print_header("adsim Recovery Sweep");
            println!("Seeds:            {}..{}", start, start.wrapping_add(count as u64));
            println!("Runs:             {}", summary.runs);
            println!("Failures:         {}", summary.failures);
            println!("Mean rate error:  {:.4}", summary.mean_rate_error);
            println!("Max rate error:   {:.4}", summary.max_rate_error);
            println!("Mean K error:     {:.4}", summary.mean_k_error);
            println!("Max K error:      {:.4}", summary.max_k_error);
        }
    }
    Ok(())
}

fn list_channels() {
    print_header("adsim Channels");
    for channel in Channel::ALL {
        println!("  {:<8} {}", channel.name(), channel.description());
    }
}
