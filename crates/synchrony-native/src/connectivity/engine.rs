//! Pipeline driver
//!
//! One run executes two parallel phases on a bounded rayon pool:
//!
//! 1. One task per trial computes (or reuses) its spectra and merges them
//!    into the accumulator under a lock.
//! 2. After the barrier and a single square root of the PSD sums, one task
//!    per channel pair normalizes and attaches its edge.
//!
//! All validation happens before phase 1; a failing run returns no graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use synchrony_core::config::ConnectivityConfig;
use synchrony_core::network::Network;
use synchrony_core::pairs::PairIndex;
use synchrony_core::types::{effective_nfft, frequency_bin_count, ConnectivityMeasure};

use crate::error::{ConnectivityError, ConnectivityResult};
use crate::spectral::{SpectralAccumulator, TaperSet, TrialProcessor};

use super::builder::NetworkBuilder;
use super::coherency::CoherencyMatrix;
use super::settings::ConnectivitySettings;

// ============================================================================
// Output
// ============================================================================

/// Result of one run.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectivityOutput {
    /// Graph with one edge per channel pair
    Network(Network),
    /// Raw complex coherency, for [`ConnectivityMeasure::Coherency`]
    Coherency(CoherencyMatrix),
}

impl ConnectivityOutput {
    /// The graph, if this run produced one
    pub fn as_network(&self) -> Option<&Network> {
        match self {
            Self::Network(network) => Some(network),
            Self::Coherency(_) => None,
        }
    }

    /// Take the graph, if this run produced one
    pub fn into_network(self) -> Option<Network> {
        match self {
            Self::Network(network) => Some(network),
            Self::Coherency(_) => None,
        }
    }

    /// Take the coherency matrix, if this run produced one
    pub fn into_coherency(self) -> Option<CoherencyMatrix> {
        match self {
            Self::Coherency(matrix) => Some(matrix),
            Self::Network(_) => None,
        }
    }

    /// Whether the output covers no channels
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Network(network) => network.node_count() == 0,
            Self::Coherency(matrix) => matrix.is_empty(),
        }
    }
}

/// Dimensions and phase timings of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Trials processed
    pub trials: usize,
    /// Trials whose memoized spectra were reused
    pub memoized_trials: usize,
    /// Channels per trial
    pub channels: usize,
    /// FFT length after raising to the trial length
    pub nfft: usize,
    /// Frequency bins per spectrum
    pub bins: usize,
    /// Tapers per channel
    pub tapers: usize,
    /// Channel pairs, self-pairs included
    pub pairs: usize,
    /// Validation and taper generation
    pub prepare_time: Duration,
    /// Phase 1: per-trial spectra and merge
    pub spectra_time: Duration,
    /// Square root of the PSD sums
    pub finalize_time: Duration,
    /// Phase 2: normalization and graph building
    pub network_time: Duration,
}

impl RunSummary {
    /// Wall time across all phases
    pub fn total_time(&self) -> Duration {
        self.prepare_time + self.spectra_time + self.finalize_time + self.network_time
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs the connectivity pipeline over a [`ConnectivitySettings`].
pub struct ConnectivityEngine {
    settings: ConnectivitySettings,
    pool: ThreadPool,
}

impl ConnectivityEngine {
    /// Build the worker pool for `settings`.
    ///
    /// The pool size is fixed here; later changes to
    /// [`ConnectivityConfig::num_threads`] have no effect on this engine.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or if the pool cannot be built.
    pub fn new(settings: ConnectivitySettings) -> ConnectivityResult<Self> {
        settings.config().validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.config().num_threads.unwrap_or(0))
            .thread_name(|i| format!("synchrony-{i}"))
            .build()?;
        tracing::debug!(threads = pool.current_num_threads(), "connectivity worker pool ready");
        Ok(Self { settings, pool })
    }

    /// Settings and trials
    #[inline]
    pub fn settings(&self) -> &ConnectivitySettings {
        &self.settings
    }

    /// Mutable settings, to add trials or change the measure between runs
    #[inline]
    pub fn settings_mut(&mut self) -> &mut ConnectivitySettings {
        &mut self.settings
    }

    /// Release the settings, memoized spectra included
    pub fn into_settings(self) -> ConnectivitySettings {
        self.settings
    }

    /// Worker threads in the pool
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run the pipeline.
    ///
    /// # Errors
    ///
    /// See [`ConnectivityEngine::calculate_with_summary`].
    pub fn calculate(&mut self) -> ConnectivityResult<ConnectivityOutput> {
        self.calculate_with_summary().map(|(output, _)| output)
    }

    /// Run the pipeline and report dimensions and phase timings.
    ///
    /// An empty trial collection is not an error: it logs a warning and
    /// returns an output over zero channels.
    ///
    /// # Errors
    ///
    /// Configuration and shape errors are reported before any trial is
    /// processed. Numeric failures abort the run. No partial output is
    /// returned.
    pub fn calculate_with_summary(&mut self) -> ConnectivityResult<(ConnectivityOutput, RunSummary)> {
        let Self { settings, pool } = self;
        let started = Instant::now();

        let config = settings.config().clone();
        let Some((n_channels, n_samples)) = settings.validate()? else {
            tracing::warn!("no trials supplied, connectivity output is empty");
            let summary = RunSummary {
                nfft: config.nfft,
                bins: frequency_bin_count(config.nfft),
                ..RunSummary::default()
            };
            return Ok((empty_output(&config), summary));
        };

        let nfft = effective_nfft(config.nfft, n_samples);
        if nfft != config.nfft {
            tracing::debug!(requested = config.nfft, nfft, "FFT length raised to trial length");
        }

        let tapers = TaperSet::generate(n_samples, config.window_type)?;
        if !tapers.is_finite() {
            return Err(ConnectivityError::Numeric {
                operation: "taper generation",
                reason: format!("{} produced non-finite values for length {n_samples}", config.window_type),
            });
        }
        let prepare_time = started.elapsed();
        tracing::debug!(
            window = %config.window_type,
            tapers = tapers.count(),
            elapsed = ?prepare_time,
            "tapers generated"
        );

        // Phase 1: per-trial spectra, merged as each task completes
        let phase = Instant::now();
        let processor = TrialProcessor::new(&tapers, nfft, n_channels);
        let accumulator = SpectralAccumulator::new();
        let memoized = AtomicUsize::new(0);
        pool.install(|| {
            settings.trials_mut().par_iter_mut().for_each(|data| {
                let (spectra, cached) = processor.process(data);
                if cached {
                    memoized.fetch_add(1, Ordering::Relaxed);
                }
                accumulator.merge(spectra);
            });
        });
        let spectra_time = phase.elapsed();
        let memoized_trials = memoized.into_inner();
        tracing::debug!(
            trials = settings.trial_count(),
            memoized = memoized_trials,
            elapsed = ?spectra_time,
            "trial spectra accumulated"
        );

        let phase = Instant::now();
        let mut accumulated = accumulator.into_inner().ok_or_else(|| ConnectivityError::Numeric {
            operation: "accumulation",
            reason: "no trial spectra were merged".to_string(),
        })?;
        accumulated.finalize();
        let finalize_time = phase.elapsed();
        tracing::debug!(elapsed = ?finalize_time, "PSD sums square-rooted");

        // Phase 2: one task per channel pair
        let phase = Instant::now();
        let output = match config.measure {
            ConnectivityMeasure::Coherency => {
                ConnectivityOutput::Coherency(pool.install(|| CoherencyMatrix::from_accumulated(&accumulated, nfft)))
            }
            measure => {
                let mut network = Network::new(n_channels, nfft, measure);
                if let Some(hz) = config.sampling_frequency {
                    network = network.with_sampling_frequency(hz);
                }
                let builder = NetworkBuilder::new(network);
                pool.install(|| builder.attach_all(&accumulated))?;
                ConnectivityOutput::Network(builder.finish())
            }
        };
        let network_time = phase.elapsed();
        tracing::debug!(measure = %config.measure, elapsed = ?network_time, "pairs normalized");

        let summary = RunSummary {
            trials: settings.trial_count(),
            memoized_trials,
            channels: n_channels,
            nfft,
            bins: frequency_bin_count(nfft),
            tapers: tapers.count(),
            pairs: PairIndex::new(n_channels).len(),
            prepare_time,
            spectra_time,
            finalize_time,
            network_time,
        };
        tracing::info!(
            trials = summary.trials,
            channels = n_channels,
            pairs = summary.pairs,
            bins = summary.bins,
            elapsed = ?summary.total_time(),
            "connectivity run complete"
        );
        Ok((output, summary))
    }
}

fn empty_output(config: &ConnectivityConfig) -> ConnectivityOutput {
    match config.measure {
        ConnectivityMeasure::Coherency => ConnectivityOutput::Coherency(CoherencyMatrix::empty(config.nfft)),
        measure => ConnectivityOutput::Network(Network::new(0, config.nfft, measure)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use synchrony_core::error::{ConfigError, ShapeError};
    use synchrony_core::types::{Trial, WindowType};

    /// Channels share a 10 Hz rhythm with channel-dependent lag plus
    /// deterministic broadband noise.
    fn coupled_trial(n_channels: usize, n_samples: usize, seed: usize) -> Trial {
        let rows: Vec<Vec<f64>> = (0..n_channels)
            .map(|ch| {
                (0..n_samples)
                    .map(|n| {
                        let t = n as f64 / 128.0;
                        let lag = ch as f64 * 0.6;
                        let noise = ((n * 7 + ch * 13 + seed * 31) as f64 * 0.917).sin() * 0.4;
                        (2.0 * PI * 10.0 * t + lag + seed as f64 * 0.3).sin() + noise
                    })
                    .collect()
            })
            .collect();
        Trial::from_rows(&rows).unwrap()
    }

    fn engine(config: ConnectivityConfig, trials: impl IntoIterator<Item = Trial>) -> ConnectivityEngine {
        let mut settings = ConnectivitySettings::new(config.with_threads(4));
        settings.append_trials(trials);
        ConnectivityEngine::new(settings).unwrap()
    }

    fn network(config: ConnectivityConfig, trials: impl IntoIterator<Item = Trial>) -> Network {
        engine(config, trials).calculate().unwrap().into_network().unwrap()
    }

    fn max_weight_diff(a: &Network, b: &Network) -> f64 {
        a.edges()
            .iter()
            .zip(b.edges())
            .flat_map(|(x, y)| {
                assert_eq!(x.endpoints(), y.endpoints());
                x.frequency_weights().iter().zip(y.frequency_weights()).map(|(p, q)| (p - q).abs())
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_three_channels_give_six_edges() {
        let config = ConnectivityConfig::default().with_nfft(64);
        let net = network(config, (0..4).map(|s| coupled_trial(3, 64, s)));

        assert_eq!(net.node_count(), 3);
        assert_eq!(net.edge_count(), 6);
        let pairs: Vec<_> = net.edges().iter().map(|e| e.endpoints()).collect();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]);
        assert!(net.edges().iter().all(|e| e.bin_count() == 33));
    }

    #[test]
    fn test_self_coherence() {
        let config = ConnectivityConfig::default().with_nfft(64);
        let trials: Vec<_> = (0..3).map(|s| coupled_trial(2, 64, s)).collect();

        let coh = network(config.clone(), trials.clone());
        for ch in 0..2 {
            let edge = coh.edge_between(ch, ch).unwrap();
            assert!(edge.frequency_weights().iter().all(|w| (w - 1.0).abs() < 1e-9));
        }

        let imag = network(config.with_measure(ConnectivityMeasure::ImagCoherence), trials);
        for ch in 0..2 {
            let edge = imag.edge_between(ch, ch).unwrap();
            assert!(edge.frequency_weights().iter().all(|w| w.abs() < 1e-12));
        }
    }

    #[test]
    fn test_coherence_is_bounded() {
        let config = ConnectivityConfig::default().with_nfft(128).with_window(WindowType::dpss(2.5));
        let net = network(config, (0..5).map(|s| coupled_trial(4, 100, s)));
        for edge in net.edges() {
            assert!(edge.frequency_weights().iter().all(|&w| (0.0..=1.0 + 1e-9).contains(&w)));
        }
    }

    #[test]
    fn test_trial_count_invariance() {
        let config = ConnectivityConfig::default().with_nfft(64).with_window(WindowType::dpss(2.0));
        let trial = coupled_trial(3, 64, 1);

        let once = network(config.clone(), [trial.clone()]);
        let repeated = network(config, std::iter::repeat(trial).take(5));
        assert!(max_weight_diff(&once, &repeated) < 1e-9);
    }

    #[test]
    fn test_reversed_order_matches() {
        let config = ConnectivityConfig::default().with_nfft(64);
        let trials: Vec<_> = (0..8).map(|s| coupled_trial(3, 64, s)).collect();

        let forward = network(config.clone(), trials.clone());
        let reversed = network(config, trials.into_iter().rev());
        assert!(max_weight_diff(&forward, &reversed) < 1e-9);
    }

    #[test]
    fn test_empty_input_gives_empty_network() {
        let mut engine = engine(ConnectivityConfig::default(), []);
        let (output, summary) = engine.calculate_with_summary().unwrap();
        assert!(output.is_empty());
        assert_eq!(output.as_network().unwrap().edge_count(), 0);
        assert_eq!(summary.trials, 0);
    }

    #[test]
    fn test_shape_mismatch_fails_run() {
        let trials = [coupled_trial(3, 64, 0), coupled_trial(3, 64, 1), coupled_trial(2, 64, 2)];
        let mut engine = engine(ConnectivityConfig::default(), trials);
        let err = engine.calculate().unwrap_err();
        assert!(matches!(err, ConnectivityError::Shape(ShapeError::ChannelMismatch { trial: 2, .. })));
        assert_eq!(engine.settings().memoized_count(), 0);
    }

    #[test]
    fn test_invalid_dpss_fails_before_processing() {
        let config = ConnectivityConfig::default().with_window(WindowType::dpss(40.0));
        let mut engine = engine(config, [coupled_trial(2, 64, 0)]);
        let err = engine.calculate().unwrap_err();
        assert!(matches!(err, ConnectivityError::Config(ConfigError::InvalidBandwidth { .. })));
    }

    #[test]
    fn test_two_sample_trial() {
        let trial = Trial::from_rows(&[[0.5, -1.0], [2.0, 1.5]]).unwrap();

        let config = ConnectivityConfig::default().with_nfft(2);
        let mut hann = engine(config.clone(), [trial.clone()]);
        let err = hann.calculate().unwrap_err();
        assert!(matches!(
            err,
            ConnectivityError::Config(ConfigError::WindowTooShort { signal_length: 2, min: 3 })
        ));
        assert_eq!(hann.settings().memoized_count(), 0);

        let net = network(config.with_window(WindowType::Ones), [trial]);
        assert_eq!(net.edge_count(), 3);
        assert_eq!(net.bin_count(), 2);
        assert!(net.edges().iter().all(|e| e.frequency_weights().iter().all(|w| w.is_finite())));
    }

    #[test]
    fn test_nfft_raised_to_trial_length() {
        let config = ConnectivityConfig::default().with_nfft(16);
        let mut engine = engine(config, [coupled_trial(2, 64, 0)]);
        let (output, summary) = engine.calculate_with_summary().unwrap();
        let net = output.into_network().unwrap();
        assert_eq!(summary.nfft, 64);
        assert_eq!(net.nfft(), 64);
        assert_eq!(net.bin_count(), 33);
    }

    #[test]
    fn test_second_run_reuses_memo() {
        let config = ConnectivityConfig::default().with_nfft(64);
        let mut engine = engine(config, (0..3).map(|s| coupled_trial(2, 64, s)));

        let (first, summary) = engine.calculate_with_summary().unwrap();
        assert_eq!(summary.memoized_trials, 0);
        let (second, summary) = engine.calculate_with_summary().unwrap();
        assert_eq!(summary.memoized_trials, 3);
        let (first, second) = (first.into_network().unwrap(), second.into_network().unwrap());
        assert!(max_weight_diff(&first, &second) < 1e-12);

        engine.settings_mut().append_trial(coupled_trial(2, 64, 9));
        let (_, summary) = engine.calculate_with_summary().unwrap();
        assert_eq!(summary.trials, 4);
        assert_eq!(summary.memoized_trials, 3);
    }

    #[test]
    fn test_coherency_output() {
        let config = ConnectivityConfig::default().with_nfft(64);
        let trials: Vec<_> = (0..3).map(|s| coupled_trial(3, 64, s)).collect();

        let matrix = engine(config.clone().with_measure(ConnectivityMeasure::Coherency), trials.clone())
            .calculate()
            .unwrap()
            .into_coherency()
            .unwrap();
        assert_eq!(matrix.n_channels(), 3);
        assert_eq!(matrix.n_freqs(), 33);

        let forward = matrix.get(0, 1).unwrap();
        let backward = matrix.get(1, 0).unwrap();
        for (f, b) in forward.iter().zip(&backward) {
            assert!((f.conj() - b).norm() < 1e-15);
        }

        let direct = network(config, trials);
        let materialized = matrix.to_network(ConnectivityMeasure::Coherence).unwrap();
        assert!(max_weight_diff(&direct, &materialized) < 1e-9);
    }

    #[test]
    fn test_sampling_frequency_reaches_network() {
        let config = ConnectivityConfig::default().with_nfft(128).with_sampling_frequency(128.0);
        let mut net = network(config, (0..3).map(|s| coupled_trial(2, 128, s)));
        assert_eq!(net.sampling_frequency(), Some(128.0));

        net.set_frequency_range(8.0, 12.0).unwrap();
        assert_eq!(net.active_bins(), (8, 13));
    }
}
