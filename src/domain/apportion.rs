//! Largest-remainder apportionment.
//!
//! Splits an integer total across weighted claimants: everyone gets the
//! floor of their exact quota, then leftover units go one each to the
//! largest fractional remainders. Ties on the remainder are broken by the
//! claimant key in ascending order, so the result is fully deterministic.

/// Apportion `total` units across `claims` (`(key, weight)` pairs).
///
/// Returns one count per claim, in input order. The counts sum to `total`
/// whenever the total weight is positive; with no positive weight nobody
/// receives anything.
pub fn largest_remainder(total: u32, claims: &[(&str, f64)]) -> Vec<u32> {
    let weight_sum: f64 = claims.iter().map(|(_, w)| w.max(0.0)).sum();
    if total == 0 || weight_sum <= 0.0 || !weight_sum.is_finite() {
        return vec![0; claims.len()];
    }

    let quotas: Vec<f64> = claims
        .iter()
        .map(|(_, w)| f64::from(total) * w.max(0.0) / weight_sum)
        .collect();
    let mut counts: Vec<u32> = quotas.iter().map(|q| q.floor() as u32).collect();

    let assigned: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    let leftover = u64::from(total).saturating_sub(assigned) as usize;

    let mut order: Vec<usize> = (0..claims.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = quotas[a] - quotas[a].floor();
        let frac_b = quotas[b] - quotas[b].floor();
        frac_b
            .total_cmp(&frac_a)
            .then_with(|| claims[a].0.cmp(claims[b].0))
    });
    for &i in order.iter().take(leftover) {
        counts[i] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let counts = largest_remainder(100, &[("a", 100.0), ("b", 100.0)]);
        assert_eq!(counts, vec![50, 50]);
    }

    #[test]
    fn test_leftover_goes_to_largest_fraction() {
        // quotas: 3.333.., 3.333.., 3.333.. -> one leftover, key order
        let counts = largest_remainder(10, &[("c", 1.0), ("a", 1.0), ("b", 1.0)]);
        assert_eq!(counts, vec![3, 4, 3]);
    }

    #[test]
    fn test_fraction_beats_key_order() {
        // quotas: 2.8 and 7.2 -> leftover to "z" (0.8 > 0.2)
        let counts = largest_remainder(10, &[("z", 28.0), ("a", 72.0)]);
        assert_eq!(counts, vec![3, 7]);
    }

    #[test]
    fn test_sum_is_exact() {
        let claims = [("a", 0.13), ("b", 0.41), ("c", 0.07), ("d", 0.39)];
        for total in [0_u32, 1, 7, 99, 1234] {
            let counts = largest_remainder(total, &claims);
            assert_eq!(counts.iter().sum::<u32>(), total);
        }
    }

    #[test]
    fn test_zero_weights() {
        assert_eq!(largest_remainder(10, &[("a", 0.0), ("b", 0.0)]), vec![0, 0]);
        assert!(largest_remainder(10, &[]).is_empty());
    }
}
