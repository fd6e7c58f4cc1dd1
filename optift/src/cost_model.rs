use crate::error::Error;
use std::collections::BTreeMap;

/// Maps a subset size (glyph count) to predicted compressed bytes.
///
/// The empirical variant is the one driving the optimizer; the linear fit exists for reporting
/// and diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub enum CostModel {
    /// An ordinary least-squares line `bytes = cost_per_glyph * n + cost_base` over the raw
    /// samples.
    Linear { cost_per_glyph: f64, cost_base: f64 },
    /// Piecewise-linear interpolation through per-size sample means, clamped to the endpoints
    /// outside the sampled range.
    Empirical { knots: Vec<(usize, f64)> },
}
impl CostModel {
    pub fn fit_linear(raw_data: &[(usize, f64)]) -> Result<CostModel, Error> {
        if raw_data.is_empty() {
            return Err(Error::InsufficientData);
        }
        let raw_data = in_fixed_order(raw_data);

        let n = raw_data.len() as f64;
        let (mut s_x, mut s_y, mut s_xx, mut s_xy) = (0.0, 0.0, 0.0, 0.0);
        for &(x, y) in &raw_data {
            let x = x as f64;
            s_x += x;
            s_y += y;
            s_xx += x * x;
            s_xy += x * y;
        }
        let cost_per_glyph = (n * s_xy - s_x * s_y) / (n * s_xx - s_x * s_x);
        let cost_base = (s_y - cost_per_glyph * s_x) / n;
        Ok(CostModel::Linear { cost_per_glyph, cost_base })
    }

    pub fn fit_empirical(raw_data: &[(usize, f64)]) -> Result<CostModel, Error> {
        if raw_data.is_empty() {
            return Err(Error::InsufficientData);
        }
        let raw_data = in_fixed_order(raw_data);

        let mut bins: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        for &(n_glyphs, bytes) in &raw_data {
            let (sum, count) = bins.entry(n_glyphs).or_insert((0.0, 0));
            *sum += bytes;
            *count += 1;
        }
        let knots = bins
            .into_iter()
            .map(|(n_glyphs, (sum, count))| (n_glyphs, sum / count as f64))
            .collect();
        Ok(CostModel::Empirical { knots })
    }

    pub fn cost(&self, n_glyphs: usize) -> f64 {
        match self {
            CostModel::Linear { cost_per_glyph, cost_base } => {
                cost_per_glyph * n_glyphs as f64 + cost_base
            }
            CostModel::Empirical { knots } => {
                // The first knot with knot size >= the query.
                let ub = knots.partition_point(|&(n, _)| n < n_glyphs);
                if ub == knots.len() {
                    return knots[knots.len() - 1].1;
                }
                if ub == 0 {
                    return knots[0].1;
                }
                let (ub_n, ub_bytes) = knots[ub];
                if ub_n == n_glyphs {
                    return ub_bytes;
                }
                let (lb_n, lb_bytes) = knots[ub - 1];
                lb_bytes
                    + (ub_bytes - lb_bytes) * (n_glyphs - lb_n) as f64 / (ub_n - lb_n) as f64
            }
        }
    }
}

/// Accumulation runs in a fixed order so the fit is bit-reproducible for a given sample
/// multiset, whatever order the parallel harness collected it in.
fn in_fixed_order(raw_data: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let mut data = raw_data.to_vec();
    data.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    data
}
