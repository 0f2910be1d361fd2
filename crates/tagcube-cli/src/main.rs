mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tagcube_core::{
    ClusterConfig, LifecycleEvent, Mutation, TagCluster, TokenRecord, export_frame_json,
};

#[derive(Parser)]
#[command(name = "tagcube", about = "Tag cluster physics engine driver")]
struct Cli {
    /// TOML config file (falls back to TAGCUBE_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine synchronously over a file of provider batches
    Simulate {
        /// JSON file holding an array of batches, each an array of token records
        batches: PathBuf,

        /// Frames to simulate
        #[arg(long, default_value_t = 600)]
        frames: u64,

        /// Seconds per frame
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f64,

        /// Feed the next batch every K frames
        #[arg(long, default_value_t = 120)]
        batch_every: u64,

        /// RNG seed, overrides the config
        #[arg(long)]
        seed: Option<u64>,

        /// Print the final frame as JSON
        #[arg(long)]
        snapshot: bool,
    },

    /// Run a live frame loop fed by an async provider, printing events as JSON lines
    Watch {
        /// JSON file holding an array of batches
        batches: PathBuf,

        /// Frame rate
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Stop after this many frames (runs until Ctrl-C otherwise)
        #[arg(long)]
        frames: Option<u64>,

        /// Delay between provider batches
        #[arg(long, default_value_t = 2000)]
        batch_interval_ms: u64,
    },

    /// Print the default configuration as TOML
    Config,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Simulate {
            batches,
            frames,
            dt,
            batch_every,
            seed,
            snapshot,
        } => cmd_simulate(&cli, batches, *frames, *dt, *batch_every, *seed, *snapshot),
        Commands::Watch {
            batches,
            fps,
            frames,
            batch_interval_ms,
        } => cmd_watch(&cli, batches, *fps, *frames, *batch_interval_ms).await,
        Commands::Config => cmd_config(),
    }
}

fn load_config(cli: &Cli) -> Result<ClusterConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("TAGCUBE_CONFIG").ok().map(PathBuf::from));
    let Some(path) = path else {
        return Ok(ClusterConfig::default());
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: ClusterConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

fn load_batches(path: &Path) -> Result<Vec<Vec<TokenRecord>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse batches in {}", path.display()))
}

fn build_engine(config: ClusterConfig) -> Result<TagCluster> {
    TagCluster::new(config).context("failed to build engine")
}

#[derive(Default)]
struct EventTally {
    entered: usize,
    resized: usize,
    exiting: usize,
    removed: usize,
}

impl EventTally {
    fn record(&mut self, events: &[LifecycleEvent]) {
        for ev in events {
            match ev {
                LifecycleEvent::Entered { .. } => self.entered += 1,
                LifecycleEvent::Resized { .. } => self.resized += 1,
                LifecycleEvent::Exiting { .. } => self.exiting += 1,
                LifecycleEvent::Removed { .. } => self.removed += 1,
            }
        }
    }
}

fn cmd_simulate(
    cli: &Cli,
    path: &Path,
    frames: u64,
    dt: f64,
    batch_every: u64,
    seed: Option<u64>,
    snapshot: bool,
) -> Result<()> {
    let mut config = load_config(cli)?;
    if seed.is_some() {
        config.seed = seed;
    }
    let batches = load_batches(path)?;
    let mut engine = build_engine(config)?;

    let batch_every = batch_every.max(1);
    let mut pending = batches.into_iter();
    let mut tally = EventTally::default();
    let mut recovered = 0usize;

    for frame in 0..frames {
        if frame % batch_every == 0
            && let Some(batch) = pending.next()
        {
            engine.enqueue(Mutation::Reconcile(batch));
        }
        let report = engine.step(dt);
        tally.record(&report.events);
        recovered += report.physics.recovered;
    }

    let stats = engine.stats();
    println!("frames:     {}", stats.frame);
    println!("clock:      {:.3}s", stats.clock);
    println!("live:       {}", stats.live);
    println!("exiting:    {}", stats.exiting);
    println!("extent:     {:.3}", stats.extent);
    println!(
        "center:     [{:.3}, {:.3}, {:.3}]",
        stats.center[0], stats.center[1], stats.center[2]
    );
    println!("energy:     {:.4}", stats.kinetic_energy);
    println!(
        "events:     entered={}, resized={}, exiting={}, removed={}",
        tally.entered, tally.resized, tally.exiting, tally.removed
    );
    if cli.verbose {
        eprintln!("--- recovered={recovered}, unfed_batches={} ---", pending.len());
    }

    if snapshot {
        let json = export_frame_json(&engine).context("failed to serialize frame")?;
        println!("{json}");
    }
    Ok(())
}

async fn cmd_watch(
    cli: &Cli,
    path: &Path,
    fps: f64,
    frames: Option<u64>,
    batch_interval_ms: u64,
) -> Result<()> {
    if !fps.is_finite() || fps <= 0.0 {
        anyhow::bail!("--fps must be positive, got {fps}");
    }
    let config = load_config(cli)?;
    let batches = load_batches(path)?;
    let engine = build_engine(config)?;

    let opts = watch::WatchOptions {
        fps,
        frames,
        batch_interval: std::time::Duration::from_millis(batch_interval_ms),
    };
    let engine = watch::run(engine, batches, opts).await?;

    let stats = serde_json::to_string(&engine.stats()).context("failed to serialize stats")?;
    eprintln!("{stats}");
    Ok(())
}

fn cmd_config() -> Result<()> {
    let toml = toml::to_string_pretty(&ClusterConfig::default())
        .context("failed to serialize default config")?;
    print!("{toml}");
    Ok(())
}
