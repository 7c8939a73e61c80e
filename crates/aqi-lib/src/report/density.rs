//! Gaussian kernel density estimation

/// Points at which each density curve is evaluated
pub const GRID_SIZE: usize = 200;

/// Bandwidths the curve extends past the data on either side
pub const CUT: f64 = 3.0;

/// Scott's rule bandwidth: sample standard deviation times n^(-1/5).
///
/// Returns `None` for fewer than two samples or zero spread.
pub fn scott_bandwidth(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if !std.is_finite() || std <= 0.0 {
        return None;
    }
    Some(std * (n as f64).powf(-0.2))
}

/// Evaluate a Gaussian KDE of `values` on an even grid
pub fn gaussian_kde(values: &[f64], grid_size: usize) -> Option<Vec<(f64, f64)>> {
    let bandwidth = scott_bandwidth(values)?;
    let grid_size = grid_size.max(2);

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lo = min - CUT * bandwidth;
    let hi = max + CUT * bandwidth;
    let step = (hi - lo) / (grid_size - 1) as f64;

    let norm = 1.0 / (values.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    Some(
        (0..grid_size)
            .map(|i| {
                let x = lo + step * i as f64;
                let density: f64 = values
                    .iter()
                    .map(|v| {
                        let z = (x - v) / bandwidth;
                        (-0.5 * z * z).exp()
                    })
                    .sum();
                (x, density * norm)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bandwidth_requires_spread() {
        assert!(scott_bandwidth(&[]).is_none());
        assert!(scott_bandwidth(&[3.0]).is_none());
        assert!(scott_bandwidth(&[3.0, 3.0, 3.0]).is_none());
        assert!(scott_bandwidth(&[1.0, 2.0, 3.0]).unwrap() > 0.0);
    }

    #[test]
    fn test_density_integrates_to_about_one() {
        let values = [10.0, 12.0, 15.0, 15.5, 20.0, 22.0, 30.0];
        let curve = gaussian_kde(&values, GRID_SIZE).unwrap();
        assert_eq!(curve.len(), GRID_SIZE);

        let area: f64 = curve
            .windows(2)
            .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
            .sum();
        assert!((area - 1.0).abs() < 0.01, "area was {}", area);
    }

    #[test]
    fn test_density_peaks_near_cluster() {
        let values = [5.0, 5.1, 4.9, 5.0, 20.0];
        let curve = gaussian_kde(&values, GRID_SIZE).unwrap();
        let (peak_x, _) = curve
            .iter()
            .copied()
            .fold((0.0, f64::MIN), |acc, p| if p.1 > acc.1 { p } else { acc });
        assert!((peak_x - 5.0).abs() < 2.0, "peak at {}", peak_x);
    }
}
