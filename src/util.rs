pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population variance (divide by n). Maximum-likelihood estimate, matching
/// how the throw distribution is rendered.
pub fn variance(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let ssq = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    Some(ssq / data.len() as f64)
}

/// Population covariance of paired samples. `None` when the slices are empty
/// or of unequal length.
pub fn covariance(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    let (mx, my) = (mean(xs)?, mean(ys)?);
    let sum = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>();
    Some(sum / xs.len() as f64)
}
