//! Taper generation for multitaper spectral estimation
//!
//! A [`TaperSet`] is a `K × L` matrix of windows plus one weight per window.
//! It depends only on the signal length and window family, so one set is
//! computed per run and shared read-only by every trial task.
//!
//! # Families
//!
//! | Window | Tapers | Weights |
//! |--------|--------|---------|
//! | Hanning | 1, unit L2 norm | 1 |
//! | Ones | 1, height `1/L` | 1 |
//! | DPSS | K Slepian sequences, unit L2 norm | `sqrt(λ_k)` |
//!
//! DPSS tapers are eigenvectors of the tridiagonal matrix that commutes with
//! the sinc concentration kernel (Percival & Walden, 1993). The matrix is
//! decomposed with nalgebra's symmetric eigensolver and the K eigenvectors
//! with the largest eigenvalues are kept.

use std::cmp::Ordering;
use std::f64::consts::PI;

use nalgebra::{DMatrix, SymmetricEigen};

use synchrony_core::error::ConfigError;
use synchrony_core::types::WindowType;

use super::matrix::SpectralMatrix;

/// Shortest signal a symmetric Hann window is non-zero for
const MIN_HANNING_LENGTH: usize = 3;

/// Orthogonal window functions and their weights.
#[derive(Clone, Debug, PartialEq)]
pub struct TaperSet {
    tapers: SpectralMatrix<f64>,
    weights: Vec<f64>,
}

impl TaperSet {
    /// Generate tapers for signals of `signal_length` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSamples`] for an empty signal,
    /// [`ConfigError::WindowTooShort`] for a two-sample Hann window, and
    /// [`ConfigError::InvalidBandwidth`] or [`ConfigError::InvalidTaperCount`]
    /// for DPSS parameters the signal length cannot support.
    pub fn generate(signal_length: usize, window: WindowType) -> Result<Self, ConfigError> {
        match signal_length {
            0 => Err(ConfigError::NoSamples),
            1 => Ok(Self::single(&[1.0])),
            len => match window {
                WindowType::Hanning if len < MIN_HANNING_LENGTH => {
                    Err(ConfigError::WindowTooShort { signal_length: len, min: MIN_HANNING_LENGTH })
                }
                WindowType::Hanning => Ok(Self::single(&hanning(len))),
                WindowType::Ones => Ok(Self::single(&vec![1.0 / len as f64; len])),
                WindowType::Dpss { half_bandwidth, num_tapers } => {
                    dpss(len, half_bandwidth, num_tapers)
                }
            },
        }
    }

    fn single(taper: &[f64]) -> Self {
        let mut tapers = SpectralMatrix::zeros(1, taper.len());
        tapers.row_mut(0).copy_from_slice(taper);
        Self { tapers, weights: vec![1.0] }
    }

    /// Number of tapers (K)
    #[inline]
    pub fn count(&self) -> usize {
        self.weights.len()
    }

    /// Samples per taper (L)
    #[inline]
    pub fn signal_length(&self) -> usize {
        self.tapers.cols()
    }

    /// Window `k`
    #[inline]
    pub fn taper(&self, k: usize) -> &[f64] {
        self.tapers.row(k)
    }

    /// Per-taper weights
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Sum of squared weights, the multitaper normalization energy
    pub fn weight_energy(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum()
    }

    /// Whether every taper sample and weight is finite
    pub fn is_finite(&self) -> bool {
        self.tapers.as_slice().iter().chain(&self.weights).all(|v| v.is_finite())
    }
}

/// Symmetric Hann window `0.5 - 0.5 cos(2πn/(L-1))`, scaled to unit L2 norm.
///
/// Both end samples are zero, so `len` must be at least three.
fn hanning(len: usize) -> Vec<f64> {
    let denom = (len - 1) as f64;
    let mut window: Vec<f64> = (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos())
        .collect();
    let norm = window.iter().map(|w| w * w).sum::<f64>().sqrt();
    for w in &mut window {
        *w /= norm;
    }
    window
}

/// Default DPSS taper count, `floor(2NW) - 1` (at least one).
fn default_taper_count(half_bandwidth: f64) -> usize {
    ((2.0 * half_bandwidth).floor() as usize).saturating_sub(1).max(1)
}

fn dpss(len: usize, half_bandwidth: f64, num_tapers: Option<usize>) -> Result<TaperSet, ConfigError> {
    if !half_bandwidth.is_finite() || half_bandwidth <= 0.0 || half_bandwidth >= len as f64 / 2.0 {
        return Err(ConfigError::InvalidBandwidth { half_bandwidth, signal_length: len });
    }
    let count = num_tapers.unwrap_or_else(|| default_taper_count(half_bandwidth));
    if count == 0 || count > len {
        return Err(ConfigError::InvalidTaperCount { requested: count, max: len });
    }

    let bandwidth = half_bandwidth / len as f64;
    let eigen = SymmetricEigen::new(commuting_matrix(len, bandwidth));
    let kernel = sinc_kernel(len, bandwidth);

    let mut ranked: Vec<(usize, f64)> = eigen.eigenvalues.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut tapers = SpectralMatrix::zeros(count, len);
    let mut weights = Vec::with_capacity(count);

    for (order, &(column, _)) in ranked.iter().take(count).enumerate() {
        let mut taper: Vec<f64> = eigen.eigenvectors.column(column).iter().copied().collect();
        fix_sign(&mut taper, order);

        let concentration = concentration_ratio(&taper, &kernel);
        weights.push(concentration.clamp(0.0, 1.0).sqrt());
        tapers.row_mut(order).copy_from_slice(&taper);
    }

    tracing::trace!(len, half_bandwidth, count, ?weights, "generated DPSS tapers");
    Ok(TaperSet { tapers, weights })
}

/// Symmetric tridiagonal matrix whose eigenvectors are the Slepian sequences.
///
/// Diagonal `((L-1-2n)/2)² cos 2πW`, off-diagonal `n(L-n)/2`.
fn commuting_matrix(len: usize, bandwidth: f64) -> DMatrix<f64> {
    let cos_w = (2.0 * PI * bandwidth).cos();
    let n_f = len as f64;
    let mut matrix = DMatrix::<f64>::zeros(len, len);
    for n in 0..len {
        let center = (n_f - 1.0 - 2.0 * n as f64) / 2.0;
        matrix[(n, n)] = center * center * cos_w;
        if n > 0 {
            let off = n as f64 * (n_f - n as f64) / 2.0;
            matrix[(n, n - 1)] = off;
            matrix[(n - 1, n)] = off;
        }
    }
    matrix
}

/// Sign convention: even orders sum positive, odd orders start with a
/// positive lobe.
fn fix_sign(taper: &mut [f64], order: usize) {
    let len = taper.len();
    let score: f64 = if order % 2 == 0 {
        taper.iter().sum()
    } else {
        taper
            .iter()
            .enumerate()
            .map(|(n, &v)| v * (len as f64 - 1.0 - 2.0 * n as f64))
            .sum()
    };
    if score < 0.0 {
        for v in taper.iter_mut() {
            *v = -*v;
        }
    }
}

/// Lags of the sinc kernel `sin(2πW·d) / (π·d)`, `2W` at lag zero.
fn sinc_kernel(len: usize, bandwidth: f64) -> Vec<f64> {
    (0..len)
        .map(|lag| {
            if lag == 0 {
                2.0 * bandwidth
            } else {
                let d = lag as f64;
                (2.0 * PI * bandwidth * d).sin() / (PI * d)
            }
        })
        .collect()
}

/// Fraction of a unit-norm taper's energy inside `[-W, W]`, `wᵀ A w`.
fn concentration_ratio(taper: &[f64], kernel: &[f64]) -> f64 {
    let energy: f64 = taper.iter().map(|v| v * v).sum();
    let mut total = kernel[0] * energy;
    for (lag, &k) in kernel.iter().enumerate().skip(1) {
        let lagged: f64 = taper.iter().zip(&taper[lag..]).map(|(a, b)| a * b).sum();
        total += 2.0 * k * lagged;
    }
    total
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hanning_unit_norm() {
        let tapers = TaperSet::generate(64, WindowType::Hanning).unwrap();
        assert_eq!(tapers.count(), 1);
        assert_eq!(tapers.signal_length(), 64);
        assert_eq!(tapers.weights(), &[1.0]);

        let taper = tapers.taper(0);
        assert!((dot(taper, taper) - 1.0).abs() < 1e-12);
        assert!(taper[0].abs() < 1e-15);
        assert!((taper[10] - taper[53]).abs() < 1e-12);
    }

    #[test]
    fn test_ones_window() {
        let tapers = TaperSet::generate(8, WindowType::Ones).unwrap();
        assert!(tapers.taper(0).iter().all(|&v| (v - 0.125).abs() < 1e-15));
        assert!((tapers.weight_energy() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_single_sample_signal() {
        let tapers = TaperSet::generate(1, WindowType::Hanning).unwrap();
        assert_eq!(tapers.taper(0), &[1.0]);
    }

    #[test]
    fn test_empty_signal_rejected() {
        assert_eq!(TaperSet::generate(0, WindowType::Ones), Err(ConfigError::NoSamples));
    }

    #[test]
    fn test_dpss_orthonormal() {
        let tapers = TaperSet::generate(64, WindowType::dpss(3.0)).unwrap();
        assert_eq!(tapers.count(), 5);

        for a in 0..tapers.count() {
            for b in 0..tapers.count() {
                let expected = if a == b { 1.0 } else { 0.0 };
                let got = dot(tapers.taper(a), tapers.taper(b));
                assert!((got - expected).abs() < 1e-8, "<{a},{b}> = {got}");
            }
        }
    }

    #[test]
    fn test_dpss_concentration_weights() {
        let tapers = TaperSet::generate(128, WindowType::dpss(4.0)).unwrap();
        let weights = tapers.weights();
        assert_eq!(weights.len(), 7);
        assert!(weights[0] > 0.999, "first taper weight {}", weights[0]);
        for pair in weights.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-9);
        }
    }

    #[test]
    fn test_dpss_symmetry_and_sign() {
        let tapers = TaperSet::generate(65, WindowType::dpss(2.5)).unwrap();
        let even = tapers.taper(0);
        let odd = tapers.taper(1);
        let len = even.len();

        assert!(even.iter().sum::<f64>() > 0.0);
        for n in 0..len {
            assert!((even[n] - even[len - 1 - n]).abs() < 1e-8);
            assert!((odd[n] + odd[len - 1 - n]).abs() < 1e-8);
        }
        assert!(odd[len / 4] > 0.0);
    }

    #[test]
    fn test_dpss_explicit_taper_count() {
        let window = WindowType::Dpss { half_bandwidth: 4.0, num_tapers: Some(3) };
        let tapers = TaperSet::generate(100, window).unwrap();
        assert_eq!(tapers.count(), 3);
    }

    #[test]
    fn test_dpss_invalid_parameters() {
        let result = TaperSet::generate(64, WindowType::dpss(40.0));
        assert!(matches!(result, Err(ConfigError::InvalidBandwidth { .. })));

        let window = WindowType::Dpss { half_bandwidth: 2.0, num_tapers: Some(100) };
        let result = TaperSet::generate(64, window);
        assert_eq!(result, Err(ConfigError::InvalidTaperCount { requested: 100, max: 64 }));
    }

    #[test]
    fn test_hanning_needs_three_samples() {
        assert_eq!(
            TaperSet::generate(2, WindowType::Hanning),
            Err(ConfigError::WindowTooShort { signal_length: 2, min: 3 })
        );

        let tapers = TaperSet::generate(3, WindowType::Hanning).unwrap();
        assert_eq!(tapers.taper(0), &[0.0, 1.0, 0.0]);
        assert!(tapers.is_finite());

        // Other families still accept two samples
        let tapers = TaperSet::generate(2, WindowType::Ones).unwrap();
        assert_eq!(tapers.taper(0), &[0.5, 0.5]);
    }

    #[test]
    fn test_commuting_matrix_is_tridiagonal() {
        let matrix = commuting_matrix(16, 2.0 / 16.0);
        assert_eq!(matrix.transpose(), matrix);
        for r in 0..16usize {
            for c in 0..16 {
                if r.abs_diff(c) > 1 {
                    assert_eq!(matrix[(r, c)], 0.0);
                }
            }
        }
        assert!((matrix[(1, 0)] - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_dpss_long_signal() {
        let tapers = TaperSet::generate(512, WindowType::dpss(4.0)).unwrap();
        assert_eq!(tapers.count(), 7);
        assert!(tapers.is_finite());

        for a in 0..tapers.count() {
            for b in a..tapers.count() {
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot(tapers.taper(a), tapers.taper(b)) - expected).abs() < 1e-9);
            }
        }
        let weights = tapers.weights();
        assert!(weights[0] > 0.9999);
        assert!(weights[6] > 0.9 && weights[6] < weights[5]);
    }
}
