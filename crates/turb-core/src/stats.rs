//! Small numeric helpers over series with missing values.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Sample standard deviation (divides by n - 1), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Median of an unsorted slice. Even lengths average the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Centered running median with an odd `kernel` over the values present.
///
/// Missing entries are skipped, so the neighbours of a value are the
/// adjacent *reported* values however far apart they sit in the series.
/// The window shrinks at the edges and a missing value stays missing.
pub fn median_filter(values: &[Option<f64>], kernel: usize) -> Vec<Option<f64>> {
    let half = kernel.max(1) / 2;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let mut window = Vec::with_capacity(kernel);
    let mut rank: usize = 0;

    values
        .iter()
        .map(|value| {
            value.as_ref()?;
            let lo = rank.saturating_sub(half);
            let hi = (rank + half).min(present.len() - 1);
            rank += 1;
            window.clear();
            window.extend_from_slice(&present[lo..=hi]);
            median(&window)
        })
        .collect()
}

/// Unwrap a series of angles in degrees so successive observed values never
/// jump by more than half a turn. Missing values are skipped over.
pub fn unwrap_degrees(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut offset = 0.0;
    let mut previous: Option<f64> = None;

    values
        .iter()
        .map(|value| {
            let raw = (*value)?;
            if let Some(prev) = previous {
                let delta = raw - prev;
                if delta.abs() > 180.0 {
                    offset -= 360.0 * (delta / 360.0).round();
                }
            }
            previous = Some(raw);
            Some(raw + offset)
        })
        .collect()
}
