//! Random draws used by the digitizer.

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::{Normal, Poisson};

/// Source of the Poisson and Gaussian draws of the charge model.
///
/// The digitizer owns its stream for the whole run; reproducibility
/// depends only on how the stream is seeded.
pub trait RandomStream {
    /// Poisson draw with the given mean. Returns 0 for a non-positive mean.
    fn poisson(&mut self, mean: f64) -> f64;

    /// Zero-mean Gaussian draw. Returns 0 for a non-positive sigma.
    fn gaussian(&mut self, sigma: f64) -> f64;
}

impl<R: RandomStream + ?Sized> RandomStream for &mut R {
    fn poisson(&mut self, mean: f64) -> f64 {
        (**self).poisson(mean)
    }

    fn gaussian(&mut self, sigma: f64) -> f64 {
        (**self).gaussian(sigma)
    }
}

/// [`StdRng`] backed stream drawing through `statrs` distributions.
#[derive(Debug, Clone)]
pub struct SeededStream {
    rng: StdRng,
}

impl SeededStream {
    /// Deterministic stream from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when `seed` is given, from OS entropy otherwise.
    #[must_use]
    pub fn from_seed_or_entropy(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }
}

impl RandomStream for SeededStream {
    fn poisson(&mut self, mean: f64) -> f64 {
        if !(mean.is_finite() && mean > 0.0) {
            return 0.0;
        }
        match Poisson::new(mean) {
            Ok(dist) => Distribution::<f64>::sample(&dist, &mut self.rng),
            Err(_) => 0.0,
        }
    }

    fn gaussian(&mut self, sigma: f64) -> f64 {
        if !(sigma.is_finite() && sigma > 0.0) {
            return 0.0;
        }
        match Normal::new(0.0, sigma) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_stream_is_reproducible() {
        let mut a = SeededStream::new(42);
        let mut b = SeededStream::new(42);
        for _ in 0..20 {
            assert_eq!(a.poisson(350.0).to_bits(), b.poisson(350.0).to_bits());
            assert_eq!(a.gaussian(0.1).to_bits(), b.gaussian(0.1).to_bits());
        }
    }

    #[test]
    fn test_poisson_draws() {
        let mut stream = SeededStream::new(7);
        let n = 2000;
        let mut sum = 0.0;
        for _ in 0..n {
            let k = stream.poisson(50.0);
            assert!(k >= 0.0);
            assert!((k - k.round()).abs() < 1e-12);
            sum += k;
        }
        let mean = sum / f64::from(n);
        assert!((mean - 50.0).abs() < 1.5, "mean {mean}");
    }

    #[test]
    fn test_degenerate_parameters() {
        let mut stream = SeededStream::new(1);
        assert!(stream.poisson(0.0).abs() < f64::EPSILON);
        assert!(stream.poisson(-3.0).abs() < f64::EPSILON);
        assert!(stream.poisson(f64::NAN).abs() < f64::EPSILON);
        assert!(stream.gaussian(0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gaussian_width() {
        let mut stream = SeededStream::new(99);
        let n = 5000;
        let draws: Vec<f64> = (0..n).map(|_| stream.gaussian(2.0)).collect();
        let mean = draws.iter().sum::<f64>() / f64::from(n);
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / f64::from(n);
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "sigma {}", var.sqrt());
    }
}
