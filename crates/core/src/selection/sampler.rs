use rand::Rng;

/// Draw up to `k` distinct items from `pool`, without replacement.
///
/// Weights are recomputed through `weight_of` before every draw, so a
/// jittered weight function sees fresh noise each time. Negative, NaN and
/// infinite weights count as zero. When the remaining weights sum to zero the
/// draw falls back to a uniform pick, so the sampler always makes progress.
/// Returns fewer than `k` items if the pool runs out.
pub fn sample_without_replacement<T, R, F>(
    pool: Vec<T>,
    k: usize,
    rng: &mut R,
    mut weight_of: F,
) -> Vec<T>
where
    R: Rng + ?Sized,
    F: FnMut(&T, &mut R) -> f64,
{
    let mut pool = pool;
    let mut picked = Vec::with_capacity(k.min(pool.len()));

    while picked.len() < k && !pool.is_empty() {
        let weights: Vec<f64> = pool
            .iter()
            .map(|item| sanitize(weight_of(item, &mut *rng)))
            .collect();
        let total: f64 = weights.iter().sum();

        let index = if total > 0.0 && total.is_finite() {
            weighted_index(&weights, total, rng)
        } else {
            rng.random_range(0..pool.len())
        };
        picked.push(pool.remove(index));
    }

    picked
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Walk the cumulative weights until the running total passes a uniform
/// draw in `[0, total)`.
fn weighted_index<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> usize {
    let target = rng.random::<f64>() * total;
    let mut running = 0.0;
    for (i, w) in weights.iter().enumerate() {
        running += w;
        if running > target {
            return i;
        }
    }
    // Rounding can leave `running` a hair below `target`.
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
}
