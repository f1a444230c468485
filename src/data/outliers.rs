//! Outlier rejection for noisy period measurements using Chauvenet's criterion.
//!
//! A datapoint is kept when the two-tailed probability of seeing a value at least
//! that far from the sample mean, `erfc(|d - mean| / (stddev * sqrt(2)))`, is at
//! least `1 / (2n)`.

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(datapoints: &[f64]) -> Option<f64> {
    if datapoints.is_empty() {
        return None;
    }
    Some(datapoints.iter().sum::<f64>() / datapoints.len() as f64)
}

/// Population standard deviation, or `None` for an empty slice.
pub fn std_dev(datapoints: &[f64]) -> Option<f64> {
    let mean = mean(datapoints)?;
    let variance = datapoints
        .iter()
        .map(|d| (d - mean).powi(2))
        .sum::<f64>()
        / datapoints.len() as f64;
    Some(variance.sqrt())
}

/// Remove outliers from `datapoints` with Chauvenet's criterion.
///
/// Empty input yields empty output. When the spread is zero or not a number
/// (identical values, a single value, or NaN contamination) every point is
/// passed through unfiltered.
pub fn filter_outliers(datapoints: &[f64]) -> Vec<f64> {
    let (Some(mean), Some(std_dev)) = (mean(datapoints), std_dev(datapoints)) else {
        return Vec::new();
    };

    if !std_dev.is_finite() || std_dev == 0.0 {
        return datapoints.to_vec();
    }

    let criterion = 1.0 / (2.0 * datapoints.len() as f64);

    datapoints
        .iter()
        .copied()
        .filter(|d| {
            let distance = (d - mean).abs() / std_dev / std::f64::consts::SQRT_2;
            libm::erfc(distance) >= criterion
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(filter_outliers(&[]).is_empty());
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_identical_values_pass_through() {
        let data = vec![16_666_667.0; 12];
        assert_eq!(filter_outliers(&data), data);
    }

    #[test]
    fn test_single_value_passes_through() {
        assert_eq!(filter_outliers(&[42.0]), vec![42.0]);
    }

    #[test]
    fn test_rejects_spike() {
        let mut data = vec![10.0, 10.1, 9.9, 10.0, 10.2, 9.8, 10.0, 10.1, 9.9, 10.0];
        data.push(50.0);

        let filtered = filter_outliers(&data);
        assert_eq!(filtered.len(), 10);
        assert!(!filtered.contains(&50.0));
    }

    #[test]
    fn test_keeps_well_behaved_samples() {
        let data = [9.0, 10.0, 11.0, 10.0, 9.5, 10.5];
        assert_eq!(filter_outliers(&data).len(), data.len());
    }

    #[test]
    fn test_nan_spread_passes_through() {
        let data = [1.0, f64::NAN, 3.0];
        assert_eq!(filter_outliers(&data).len(), 3);
    }

    #[test]
    fn test_population_std_dev() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }
}
