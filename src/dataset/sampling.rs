//! Seeded subsampling without replacement

use super::Dataset;
use crate::error::{FraudBenchError, Result};
use rand::seq::index;
use rand::Rng;
use tracing::debug;

/// Number of records selected for a fraction: `ceil(fraction * n)`, capped at `n`
pub fn sample_size(n: usize, fraction: f64) -> usize {
    let raw = fraction * n as f64;
    // 0.07 * 100 is 7.000000000000001; snap products that are integral up to rounding
    let k = if (raw - raw.round()).abs() < 1e-9 {
        raw.round()
    } else {
        raw.ceil()
    };
    (k as usize).min(n)
}

fn validate_fraction(fraction: f64) -> Result<()> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(FraudBenchError::invalid_parameter(
            "sample_fraction",
            fraction,
            "must be in (0, 1]",
        ));
    }
    Ok(())
}

impl Dataset {
    /// Select `ceil(fraction * len)` records uniformly at random without
    /// replacement.
    ///
    /// The generator is supplied by the caller; the same seed gives the same
    /// subset. Selected records keep their original relative order.
    pub fn subsample<R: Rng + ?Sized>(&self, fraction: f64, rng: &mut R) -> Result<Dataset> {
        validate_fraction(fraction)?;

        let n = self.len();
        let k = sample_size(n, fraction);

        let mut indices = index::sample(rng, n, k).into_vec();
        indices.sort_unstable();

        debug!(from = n, selected = k, fraction, "Subsampled dataset");
        self.select_rows(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::ten_record_dataset;
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_sample_size_rounds_up() {
        assert_eq!(sample_size(10, 0.25), 3);
        assert_eq!(sample_size(10, 1.0), 10);
        assert_eq!(sample_size(10, 0.01), 1);
        assert_eq!(sample_size(0, 0.5), 0);
        assert_eq!(sample_size(100, 0.07), 7);
        assert_eq!(sample_size(30, 0.1), 3);
        assert_eq!(sample_size(284_807, 0.1), 28_481);
    }

    #[test]
    fn test_full_fraction_keeps_every_record() {
        let ds = ten_record_dataset();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let sub = ds.subsample(1.0, &mut rng).unwrap();

        // Sorted selection of all rows reproduces the dataset exactly
        assert_eq!(sub, ds);
    }

    #[test]
    fn test_same_seed_same_subset() {
        let ds = ten_record_dataset();
        let a = ds.subsample(0.5, &mut Xoshiro256PlusPlus::seed_from_u64(7)).unwrap();
        let b = ds.subsample(0.5, &mut Xoshiro256PlusPlus::seed_from_u64(7)).unwrap();

        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_subsample_has_no_duplicates() {
        let ds = ten_record_dataset();
        let sub = ds.subsample(0.7, &mut Xoshiro256PlusPlus::seed_from_u64(3)).unwrap();

        // Column "Time" holds the row index in the fixture
        let mut times: Vec<f64> = sub.column("Time").unwrap().to_vec();
        times.dedup();
        assert_eq!(times.len(), 7);
    }

    #[test]
    fn test_invalid_fraction() {
        let ds = ten_record_dataset();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert!(ds.subsample(0.0, &mut rng).is_err());
        assert!(ds.subsample(1.5, &mut rng).is_err());
        assert!(ds.subsample(f64::NAN, &mut rng).is_err());
    }
}
