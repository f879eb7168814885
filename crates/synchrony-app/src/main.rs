//! Synchrony Application
//!
//! Command-line front end for multitaper coherence connectivity. Generates
//! synthetic phase-coupled trials or loads trials from JSON, runs the
//! pipeline, and prints or writes the resulting graph.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic data, default settings
//! synchrony simulate
//!
//! # Slepian tapers, imaginary coherence, alpha band summary
//! synchrony simulate --window dpss --half-bandwidth 3 --measure imag_coherence \
//!     --sampling-frequency 250 --fmin 8 --fmax 12
//!
//! # Trials from a file, settings from a JSON document, graph to disk
//! synchrony analyze --input trials.json --config settings.json --output network.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use synchrony_core::types::{ConnectivityMeasure, Trial, WindowType};
use synchrony_core::{ConnectivityConfig, Network};
use synchrony_native::{
    CoherencyMatrix, ConnectivityEngine, ConnectivityOutput, ConnectivitySettings, RunSummary,
};

/// Synchrony Application
#[derive(Parser, Debug)]
#[command(name = "synchrony")]
#[command(author, version, about = "Multitaper coherence connectivity networks", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate phase-coupled synthetic trials and estimate connectivity
    Simulate {
        /// Number of channels
        #[arg(short, long, default_value = "8")]
        channels: usize,

        /// Number of trials
        #[arg(short, long, default_value = "20")]
        trials: usize,

        /// Samples per trial
        #[arg(short, long, default_value = "512")]
        samples: usize,

        /// Share of the common rhythm in the coupled channels (0 to 1)
        #[arg(long, default_value = "0.7")]
        coupling: f64,

        /// Seed for the noise generator
        #[arg(long, default_value = "1")]
        seed: u64,

        #[command(flatten)]
        estimation: EstimationArgs,
    },

    /// Estimate connectivity for trials stored in a JSON file
    Analyze {
        /// Trial file: `{"trials": [[[ch0 samples], [ch1 samples], ...], ...]}`
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        estimation: EstimationArgs,
    },
}

/// Options shared by every subcommand
#[derive(Args, Debug)]
struct EstimationArgs {
    /// JSON settings document; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// FFT length (raised to the trial length when shorter)
    #[arg(long)]
    nfft: Option<usize>,

    /// Window family: hanning, ones, or dpss
    #[arg(short, long)]
    window: Option<String>,

    /// DPSS time-half-bandwidth product (NW)
    #[arg(long)]
    half_bandwidth: Option<f64>,

    /// Number of DPSS tapers
    #[arg(long)]
    tapers: Option<usize>,

    /// Measure: coherency, coherence, or imag_coherence
    #[arg(short, long)]
    measure: Option<String>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Sampling frequency in Hz
    #[arg(long)]
    sampling_frequency: Option<f64>,

    /// Lower edge of the summary band in Hz
    #[arg(long, requires = "fmax")]
    fmin: Option<f64>,

    /// Upper edge of the summary band in Hz
    #[arg(long, requires = "fmin")]
    fmax: Option<f64>,

    /// Keep only edges whose mean weight magnitude reaches this value
    #[arg(long)]
    threshold: Option<f64>,

    /// Write the result as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Trials as stored on disk
#[derive(Debug, Deserialize)]
struct TrialFile {
    trials: Vec<Vec<Vec<f64>>>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Synchrony v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Simulate { channels, trials, samples, coupling, seed, estimation } => {
            if channels == 0 || samples == 0 {
                bail!("--channels and --samples must be positive");
            }
            if !(0.0..=1.0).contains(&coupling) {
                bail!("--coupling must lie in [0, 1], got {coupling}");
            }
            let config = build_config(&estimation)?;
            let fs = config.sampling_frequency.unwrap_or(250.0);
            info!("Simulating {trials} trials of {channels} channels × {samples} samples");
            let mut rng = StdRng::seed_from_u64(seed);
            let data = (0..trials).map(|_| simulate_trial(&mut rng, channels, samples, fs, coupling));
            run(config, data.collect::<Result<_, _>>()?, &estimation)
        }
        Commands::Analyze { input, estimation } => {
            let config = build_config(&estimation)?;
            let trials = load_trials(&input)?;
            info!("Loaded {} trials from {}", trials.len(), input.display());
            run(config, trials, &estimation)
        }
    }
}

/// Merge the optional settings document with command-line overrides
fn build_config(args: &EstimationArgs) -> anyhow::Result<ConnectivityConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading settings from {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing settings in {}", path.display()))?
        }
        None => ConnectivityConfig::default(),
    };

    if let Some(nfft) = args.nfft {
        config.nfft = nfft;
    }
    if let Some(name) = &args.window {
        config.window_type = name.parse()?;
    }
    if let WindowType::Dpss { half_bandwidth, num_tapers } = config.window_type {
        config.window_type = WindowType::Dpss {
            half_bandwidth: args.half_bandwidth.unwrap_or(half_bandwidth),
            num_tapers: args.tapers.or(num_tapers),
        };
    } else if args.half_bandwidth.is_some() || args.tapers.is_some() {
        warn!("--half-bandwidth and --tapers only apply to the dpss window");
    }
    if let Some(name) = &args.measure {
        config.measure = name.parse()?;
    }
    if let Some(threads) = args.threads {
        config.num_threads = Some(threads);
    }
    if let Some(hz) = args.sampling_frequency {
        config.sampling_frequency = Some(hz);
    }

    config.validate()?;
    Ok(config)
}

fn load_trials(path: &Path) -> anyhow::Result<Vec<Trial>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading trials from {}", path.display()))?;
    let file: TrialFile =
        serde_json::from_str(&text).with_context(|| format!("parsing trials in {}", path.display()))?;
    file.trials
        .iter()
        .enumerate()
        .map(|(idx, rows)| Trial::from_rows(rows).with_context(|| format!("trial {idx}")))
        .collect()
}

/// Synthetic trial: the first half of the channels share a 10 Hz rhythm with
/// a fixed channel-dependent lag and a random per-trial phase; the rest carry
/// an independent 23 Hz rhythm. Every channel gets white noise.
fn simulate_trial(
    rng: &mut StdRng,
    channels: usize,
    samples: usize,
    fs: f64,
    coupling: f64,
) -> Result<Trial, synchrony_core::ShapeError> {
    use std::f64::consts::PI;

    let coupled = channels.div_ceil(2);
    let trial_phase = rng.gen_range(0.0..2.0 * PI);
    let rows: Vec<Vec<f64>> = (0..channels)
        .map(|ch| {
            let own_phase = rng.gen_range(0.0..2.0 * PI);
            (0..samples)
                .map(|i| {
                    let t = i as f64 / fs;
                    let rhythm = if ch < coupled {
                        let lag = ch as f64 * 0.25;
                        (2.0 * PI * 10.0 * t + trial_phase + lag).sin()
                    } else {
                        (2.0 * PI * 23.0 * t + own_phase).sin()
                    };
                    let noise = rng.gen_range(-1.0..1.0);
                    (coupling * rhythm + (1.0 - coupling) * noise) * 50.0 // Scale to ~50 µV
                })
                .collect()
        })
        .collect();
    Trial::from_rows(&rows)
}

fn run(config: ConnectivityConfig, trials: Vec<Trial>, args: &EstimationArgs) -> anyhow::Result<()> {
    let measure = config.measure;
    let mut settings = ConnectivitySettings::new(config);
    settings.append_trials(trials);

    let mut engine = ConnectivityEngine::new(settings)?;
    info!("Worker pool: {} threads", engine.num_threads());
    let (output, summary) = engine.calculate_with_summary()?;

    if output.is_empty() {
        warn!("No trials supplied; nothing to report");
        return Ok(());
    }
    print_summary(&summary);

    match output {
        ConnectivityOutput::Network(network) => {
            let network = shape_network(network, args)?;
            print_network(&network);
            if let Some(path) = &args.output {
                write_json(path, &network)?;
            }
        }
        ConnectivityOutput::Coherency(matrix) => {
            print_coherency(&matrix);
            if let Some(path) = &args.output {
                write_json(path, &CoherencyReport::from_matrix(&matrix, measure))?;
            }
        }
    }
    Ok(())
}

/// Apply the band and threshold options
fn shape_network(mut network: Network, args: &EstimationArgs) -> anyhow::Result<Network> {
    if let (Some(lo), Some(hi)) = (args.fmin, args.fmax) {
        network.set_frequency_range(lo, hi)?;
        let (first, last) = network.active_bins();
        info!("Summary band {lo}–{hi} Hz → bins {first}..{last}");
    }
    if let Some(threshold) = args.threshold {
        network = network.thresholded(threshold);
        info!("{} edges at or above {threshold}", network.edge_count());
    }
    Ok(network)
}

fn print_summary(summary: &RunSummary) {
    println!("Trials:    {} ({} memoized)", summary.trials, summary.memoized_trials);
    println!("Channels:  {} ({} pairs)", summary.channels, summary.pairs);
    println!("Spectrum:  nfft {} → {} bins, {} taper(s)", summary.nfft, summary.bins, summary.tapers);
    println!(
        "Timing:    prepare {:?}, spectra {:?}, finalize {:?}, network {:?}",
        summary.prepare_time, summary.spectra_time, summary.finalize_time, summary.network_time
    );
}

fn print_network(network: &Network) {
    println!();
    println!("{} network: {} nodes, {} edges", network.measure(), network.node_count(), network.edge_count());
    if let Some((lo, hi)) = network.min_max_weights() {
        println!("Weight range (self-loops excluded): {lo:.4} .. {hi:.4}");
    }

    let n = network.node_count();
    let matrix = network.connectivity_matrix();
    print!("     ");
    for j in 0..n {
        print!("{j:>7}");
    }
    println!();
    for i in 0..n {
        print!("{i:>4} ");
        for j in 0..n {
            print!("{:>7.3}", matrix[i * n + j]);
        }
        println!("   degree {:>2}  strength {:.3}", network.degree(i), network.strength(i));
    }
}

fn print_coherency(matrix: &CoherencyMatrix) {
    println!();
    println!("Coherency: {} channels, {} bins", matrix.n_channels(), matrix.n_freqs());
    for (idx, (i, j)) in matrix.pairs().iter().enumerate().filter(|(_, (i, j))| i != j) {
        let Some(row) = matrix.pair_row(idx) else { continue };
        let mean = row.iter().map(|c| c.norm()).sum::<f64>() / row.len().max(1) as f64;
        println!("  ({i}, {j})  mean |C| {mean:.4}");
    }
}

/// Serializable form of a [`CoherencyMatrix`]
#[derive(Debug, Serialize)]
struct CoherencyReport {
    measure: ConnectivityMeasure,
    nfft: usize,
    channels: usize,
    pairs: Vec<CoherencyPair>,
}

#[derive(Debug, Serialize)]
struct CoherencyPair {
    start: usize,
    end: usize,
    real: Vec<f64>,
    imag: Vec<f64>,
}

impl CoherencyReport {
    fn from_matrix(matrix: &CoherencyMatrix, measure: ConnectivityMeasure) -> Self {
        let pairs = matrix
            .pairs()
            .iter()
            .enumerate()
            .filter_map(|(idx, (start, end))| {
                let row = matrix.pair_row(idx)?;
                Some(CoherencyPair {
                    start,
                    end,
                    real: row.iter().map(|c| c.re).collect(),
                    imag: row.iter().map(|c| c.im).collect(),
                })
            })
            .collect();
        Self { measure, nfft: matrix.nfft(), channels: matrix.n_channels(), pairs }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
