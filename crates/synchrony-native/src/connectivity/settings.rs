//! Run settings: configuration plus the ordered trial collection

use synchrony_core::config::ConnectivityConfig;
use synchrony_core::error::{ConfigError, ShapeError};
use synchrony_core::types::{ConnectivityMeasure, Trial, WindowType};

use crate::error::ConnectivityResult;
use crate::spectral::TrialData;

/// Configuration and trials for one or more connectivity runs.
///
/// Trials keep their memoized spectra between runs. Changing the FFT length
/// or the window drops the memo, since it no longer matches the tapers.
#[derive(Clone, Debug, Default)]
pub struct ConnectivitySettings {
    config: ConnectivityConfig,
    trials: Vec<TrialData>,
}

impl ConnectivitySettings {
    /// Settings with no trials
    #[must_use]
    pub fn new(config: ConnectivityConfig) -> Self {
        Self { config, trials: Vec::new() }
    }

    /// Current configuration
    #[inline]
    pub fn config(&self) -> &ConnectivityConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// Memoized spectra are dropped when the FFT length or window changes.
    pub fn set_config(&mut self, config: ConnectivityConfig) {
        if config.nfft != self.config.nfft || config.window_type != self.config.window_type {
            self.clear_intermediate_data();
        }
        self.config = config;
    }

    /// Set the requested FFT length
    pub fn set_nfft(&mut self, nfft: usize) {
        let config = ConnectivityConfig { nfft, ..self.config.clone() };
        self.set_config(config);
    }

    /// Set the window family
    pub fn set_window(&mut self, window_type: WindowType) {
        let config = ConnectivityConfig { window_type, ..self.config.clone() };
        self.set_config(config);
    }

    /// Set the connectivity measure; memoized spectra stay valid
    pub fn set_measure(&mut self, measure: ConnectivityMeasure) {
        self.config.measure = measure;
    }

    /// Append one trial at the end
    pub fn append_trial(&mut self, trial: Trial) {
        self.trials.push(TrialData::new(trial));
    }

    /// Append trials in order
    pub fn append_trials(&mut self, trials: impl IntoIterator<Item = Trial>) {
        self.trials.extend(trials.into_iter().map(TrialData::new));
    }

    /// Drop the `n` oldest trials (all of them if fewer remain)
    pub fn remove_first(&mut self, n: usize) {
        let n = n.min(self.trials.len());
        self.trials.drain(..n);
    }

    /// Drop every trial
    pub fn clear_all_data(&mut self) {
        self.trials.clear();
    }

    /// Drop memoized spectra, keeping the trials
    pub fn clear_intermediate_data(&mut self) {
        for data in &mut self.trials {
            data.clear_spectra();
        }
    }

    /// Number of trials
    #[inline]
    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    /// Number of trials with memoized spectra
    pub fn memoized_count(&self) -> usize {
        self.trials.iter().filter(|t| t.spectra().is_some()).count()
    }

    /// Trials in insertion order
    #[inline]
    pub fn trials(&self) -> &[TrialData] {
        &self.trials
    }

    pub(crate) fn trials_mut(&mut self) -> &mut [TrialData] {
        &mut self.trials
    }

    /// Check the configuration and that every trial has the first trial's
    /// shape.
    ///
    /// Returns `(channels, samples)`, or `None` when there are no trials.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, [`ConfigError::NoChannels`] or
    /// [`ConfigError::NoSamples`] for empty trials, or the first
    /// [`ShapeError`] mismatch.
    pub fn validate(&self) -> ConnectivityResult<Option<(usize, usize)>> {
        self.config.validate()?;

        let Some(first) = self.trials.first() else {
            return Ok(None);
        };
        let n_channels = first.trial().n_channels();
        let n_samples = first.trial().n_samples();
        if n_channels == 0 {
            return Err(ConfigError::NoChannels.into());
        }
        if n_samples == 0 {
            return Err(ConfigError::NoSamples.into());
        }

        for (idx, data) in self.trials.iter().enumerate().skip(1) {
            let trial = data.trial();
            if trial.n_channels() != n_channels {
                return Err(ShapeError::ChannelMismatch {
                    trial: idx,
                    expected: n_channels,
                    got: trial.n_channels(),
                }
                .into());
            }
            if trial.n_samples() != n_samples {
                return Err(ShapeError::SampleMismatch {
                    trial: idx,
                    expected: n_samples,
                    got: trial.n_samples(),
                }
                .into());
            }
        }
        Ok(Some((n_channels, n_samples)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectivityError;
    use crate::spectral::{TaperSet, TrialProcessor};

    fn trial(n_channels: usize, n_samples: usize, seed: f64) -> Trial {
        let data = (0..n_channels * n_samples).map(|i| (i as f64 * 0.37 + seed).sin()).collect();
        Trial::new(n_channels, n_samples, data).unwrap()
    }

    fn memoize_all(settings: &mut ConnectivitySettings) {
        let tapers = TaperSet::generate(16, WindowType::Hanning).unwrap();
        let processor = TrialProcessor::new(&tapers, 16, 2);
        for data in settings.trials_mut() {
            processor.process(data);
        }
    }

    #[test]
    fn test_append_and_remove_first() {
        let mut settings = ConnectivitySettings::default();
        settings.append_trial(trial(2, 16, 0.0));
        settings.append_trials((1..4).map(|s| trial(2, 16, f64::from(s))));
        assert_eq!(settings.trial_count(), 4);

        let third = settings.trials()[2].trial().clone();
        settings.remove_first(2);
        assert_eq!(settings.trial_count(), 2);
        assert_eq!(settings.trials()[0].trial(), &third);

        settings.remove_first(10);
        assert_eq!(settings.trial_count(), 0);
    }

    #[test]
    fn test_clear_data() {
        let mut settings = ConnectivitySettings::default();
        settings.append_trials((0..3).map(|s| trial(2, 16, f64::from(s))));
        memoize_all(&mut settings);
        assert_eq!(settings.memoized_count(), 3);

        settings.clear_intermediate_data();
        assert_eq!(settings.memoized_count(), 0);
        assert_eq!(settings.trial_count(), 3);

        settings.clear_all_data();
        assert_eq!(settings.trial_count(), 0);
    }

    #[test]
    fn test_window_change_drops_memo() {
        let mut settings = ConnectivitySettings::default();
        settings.append_trial(trial(2, 16, 0.0));
        memoize_all(&mut settings);

        settings.set_measure(ConnectivityMeasure::ImagCoherence);
        assert_eq!(settings.memoized_count(), 1);

        settings.set_window(WindowType::Ones);
        assert_eq!(settings.memoized_count(), 0);
    }

    #[test]
    fn test_validate_empty_is_ok() {
        let settings = ConnectivitySettings::default();
        assert!(matches!(settings.validate(), Ok(None)));
    }

    #[test]
    fn test_validate_shape_mismatch() {
        let mut settings = ConnectivitySettings::default();
        settings.append_trial(trial(3, 20, 0.0));
        settings.append_trial(trial(3, 20, 1.0));
        settings.append_trial(trial(2, 20, 2.0));
        assert!(matches!(
            settings.validate(),
            Err(ConnectivityError::Shape(ShapeError::ChannelMismatch { trial: 2, expected: 3, got: 2 }))
        ));

        let mut settings = ConnectivitySettings::default();
        settings.append_trial(trial(3, 20, 0.0));
        settings.append_trial(trial(3, 21, 1.0));
        assert!(matches!(
            settings.validate(),
            Err(ConnectivityError::Shape(ShapeError::SampleMismatch { trial: 1, .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_nfft() {
        let mut settings = ConnectivitySettings::new(ConnectivityConfig::default().with_nfft(0));
        settings.append_trial(trial(2, 16, 0.0));
        assert!(matches!(
            settings.validate(),
            Err(ConnectivityError::Config(ConfigError::InvalidFftLength { nfft: 0 }))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_channels() {
        let mut settings = ConnectivitySettings::default();
        settings.append_trial(Trial::new(0, 16, Vec::new()).unwrap());
        assert!(matches!(settings.validate(), Err(ConnectivityError::Config(ConfigError::NoChannels))));
    }
}
