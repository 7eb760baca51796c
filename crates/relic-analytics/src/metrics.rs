//! Shared numeric semantics.
//!
//! Every analyzer that reports a percentage, completion rate, mean or
//! percentile computes it here. Two different views of the same scope
//! agree because they call the same function, not because they happen
//! to have copied the same arithmetic.

/// Half-away-from-zero rounding to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// `part` as a percentage of `whole`, one decimal. A zero `whole` yields
/// 0.0, never a NaN.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    round1(part / whole * 100.0)
}

/// Completion over the full records-by-fields grid, scaled to [0, 100].
///
/// This is a ratio of completed cells to total cells, not an average of
/// per-record rates, so sparsely populated records are not
/// double-weighted. Zero records or zero tracked fields yield 0.0.
pub fn completion_rate(completed_cells: usize, records: usize, tracked_fields: usize) -> f64 {
    let cells = records * tracked_fields;
    if cells == 0 {
        return 0.0;
    }
    let rate = completed_cells as f64 / cells as f64 * 100.0;
    round1(rate.clamp(0.0, 100.0))
}

/// Percentile rank of a target among its peers:
/// `(strictly_below + 1) / (peer_count + 1) * 100`, one decimal.
pub fn percentile_rank(strictly_below: usize, peer_count: usize) -> f64 {
    round1((strictly_below as f64 + 1.0) / (peer_count as f64 + 1.0) * 100.0)
}

/// Arithmetic mean; empty input yields 0.0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round1_half_away_from_zero() {
        assert_eq!(round1(2.25), 2.3);
        assert_eq!(round1(2.24), 2.2);
        assert_eq!(round1(-2.25), -2.3);
        assert_eq!(round1(0.0), 0.0);
    }

    #[test]
    fn test_percentage_zero_whole_is_zero() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_percentage_rounds_to_one_decimal() {
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(2.0, 3.0), 66.7);
        assert_eq!(percentage(50.0, 50.0), 100.0);
    }

    #[test]
    fn test_completion_rate_is_grid_ratio() {
        // 3 records x 4 fields = 12 cells, 6 complete.
        assert_eq!(completion_rate(6, 3, 4), 50.0);
        // Not an average of per-record rates: 5 of 8 cells.
        assert_eq!(completion_rate(5, 2, 4), 62.5);
    }

    #[test]
    fn test_completion_rate_degenerate_inputs() {
        assert_eq!(completion_rate(0, 0, 10), 0.0);
        assert_eq!(completion_rate(0, 10, 0), 0.0);
        assert_eq!(completion_rate(0, 0, 0), 0.0);
        // Overcounted cells clamp instead of exceeding 100.
        assert_eq!(completion_rate(20, 2, 4), 100.0);
    }

    #[test]
    fn test_completion_rate_bounds() {
        for completed in 0..=12 {
            let rate = completion_rate(completed, 3, 4);
            assert!((0.0..=100.0).contains(&rate));
        }
    }

    #[test]
    fn test_percentile_rank_formula() {
        // 3 of 4 peers strictly below: (3 + 1) / (4 + 1) * 100.
        assert_eq!(percentile_rank(3, 4), 80.0);
        assert_eq!(percentile_rank(0, 4), 20.0);
        // No peers at all ranks the target at the top.
        assert_eq!(percentile_rank(0, 0), 100.0);
    }

    #[test]
    fn test_mean_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[4.0, 6.0]), 5.0);
    }
}
