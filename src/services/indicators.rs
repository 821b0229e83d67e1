/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator). `None` with fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values.iter().fold(0.0, |acc, &v| acc + (v - m).powi(2));
    Some(ss / (values.len() as f64 - 1.0))
}

pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Median; even-length input averages the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Daily log returns `ln(p_i / p_{i-1})`, one shorter than the input.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Cumulative sums of `x` and `x^2` with a leading zero, so the sums over
/// `values[a..b]` are `s[b] - s[a]`.
pub fn prefix_sums(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut sums = Vec::with_capacity(values.len() + 1);
    let mut squares = Vec::with_capacity(values.len() + 1);
    sums.push(0.0);
    squares.push(0.0);
    for &v in values {
        sums.push(sums[sums.len() - 1] + v);
        squares.push(squares[squares.len() - 1] + v * v);
    }
    (sums, squares)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[50.0, 55.0, 45.0]), Some(50.0));
        assert_eq!(median(&[50.0, 55.0, 45.0]), Some(50.0));
        assert_eq!(median(&[1.0, 4.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_sample_variance_uses_n_minus_one() {
        let var = sample_variance(&[50.0, 55.0, 45.0]).unwrap();
        assert!((var - 25.0).abs() < 1e-12);
        assert_eq!(sample_variance(&[1.0]), None);
    }

    #[test]
    fn test_log_returns_length_and_values() {
        let r = log_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - (1.1_f64).ln()).abs() < 1e-12);
        assert!((r[1] - (0.9_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_prefix_sums() {
        let (s, q) = prefix_sums(&[1.0, 2.0, 3.0]);
        assert_eq!(s, vec![0.0, 1.0, 3.0, 6.0]);
        assert_eq!(q, vec![0.0, 1.0, 5.0, 14.0]);
        assert_eq!(s[3] - s[1], 5.0);
    }
}
