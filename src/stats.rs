use tracing::debug;

use crate::batch::MeasurementBatch;
use crate::models::{round2, AggregateStats};

pub fn aggregate(batch: &MeasurementBatch) -> AggregateStats {
    let stats = aggregate_values(batch.raw_values());
    debug!(
        valid = stats.valid_count,
        mean = stats.mean,
        cv = stats.cv,
        "batch aggregated"
    );
    stats
}

/// Statistics over the weighed birds only; zeros are skipped.
///
/// Sums are kept in integers so the result depends only on the multiset of
/// values, never on their order.
pub fn aggregate_values<I>(values: I) -> AggregateStats
where
    I: IntoIterator<Item = u32>,
{
    let (count, sum, sum_sq) = values
        .into_iter()
        .filter(|value| *value > 0)
        .fold((0u64, 0u128, 0u128), |(count, sum, sum_sq), value| {
            let value = u128::from(value);
            (count + 1, sum + value, sum_sq + value * value)
        });

    if count == 0 {
        return AggregateStats::EMPTY;
    }

    let n = count as f64;
    let mean = round2(sum as f64 / n);

    // Population variance: (n * sum(x^2) - sum(x)^2) / n^2, exact in integers.
    let n_wide = u128::from(count);
    let spread = n_wide * sum_sq - sum * sum;
    let std_dev = (spread as f64 / (n * n)).sqrt();

    let cv = if mean > 0.0 {
        round2(std_dev / mean * 100.0)
    } else {
        0.0
    };

    AggregateStats {
        valid_count: count as usize,
        mean,
        std_dev,
        cv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn all_zero_batch_is_empty_not_an_error() {
        let stats = aggregate_values(vec![0; 15]);
        assert_eq!(stats, AggregateStats::EMPTY);
    }

    #[test]
    fn single_sample_has_no_spread() {
        let stats = aggregate_values([0, 0, 42, 0]);
        assert_eq!(stats.valid_count, 1);
        assert_eq!(stats.mean, 42.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.cv, 0.0);
    }

    #[test]
    fn uses_population_deviation() {
        // mean 5, population variance 4
        let stats = aggregate_values([2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(stats.valid_count, 8);
        assert_eq!(stats.mean, 5.0);
        assert!(close(stats.std_dev, 2.0));
        assert_eq!(stats.cv, 40.0);
    }

    #[test]
    fn zeros_are_excluded_from_every_figure() {
        let with_gaps = aggregate_values([2, 0, 4, 4, 0, 4, 5, 5, 7, 9]);
        let without = aggregate_values([2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(with_gaps, without);
    }

    #[test]
    fn mean_and_cv_round_to_two_places() {
        let values = [40, 42, 41, 39, 43, 40, 41, 42, 39, 40, 41, 43, 40, 41, 42];
        let stats = aggregate_values(values);

        let expected_mean = 614.0 / 15.0;
        let expected_std = (values
            .iter()
            .map(|v| (*v as f64 - expected_mean).powi(2))
            .sum::<f64>()
            / 15.0)
            .sqrt();

        assert_eq!(stats.valid_count, 15);
        assert_eq!(stats.mean, 40.93);
        assert!(close(stats.std_dev, expected_std));
        assert_eq!(stats.cv, round2(expected_std / 40.93 * 100.0));
    }

    #[test]
    fn order_does_not_matter() {
        let forward = aggregate_values([3100, 2875, 0, 2990, 3333, 2701]);
        let backward = aggregate_values([2701, 3333, 2990, 0, 2875, 3100]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn large_weights_do_not_overflow() {
        let stats = aggregate_values([u32::MAX, u32::MAX]);
        assert_eq!(stats.valid_count, 2);
        assert_eq!(stats.std_dev, 0.0);
    }
}
