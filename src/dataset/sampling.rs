//! Row sampling for training and evaluation sets.
//!
//! Training data is reduced per class before merging, steering the merged
//! set toward a target positive-class ratio while keeping a floor on the
//! absolute number of rows per class. Evaluation data gets a flat fraction.
//! All sampling is without replacement and driven by the caller's seeded
//! RNG, so runs are reproducible.

use rand::Rng;

use crate::dataset::table::DataTable;

/// Per-class fractions that move a `(n_pos, n_neg)` split toward a target
/// positive ratio `r`.
///
/// The naive fractions keep the total row count and rescale each class;
/// when one class cannot supply enough rows its fraction is clamped to 1
/// and the other class is recomputed against the clamped count, so the
/// ratio is still met exactly whenever the data allows it.
pub fn sample_fractions(n_pos: usize, n_neg: usize, r: f64) -> (f64, f64) {
    if n_pos == 0 || n_neg == 0 {
        return (1.0, 1.0);
    }
    let r = r.clamp(0.0, 1.0);
    if r == 0.0 {
        return (0.0, 1.0);
    }
    if r == 1.0 {
        return (1.0, 0.0);
    }

    let pos = n_pos as f64;
    let neg = n_neg as f64;
    let total = pos + neg;

    let mut frac_pos = total * r / pos;
    let mut frac_neg = total * (1.0 - r) / neg;
    if frac_pos > 1.0 {
        // Every positive row is kept; shrink the negatives to match.
        frac_pos = 1.0;
        frac_neg = (pos * (1.0 - r) / r / neg).min(1.0);
    } else if frac_neg > 1.0 {
        frac_neg = 1.0;
        frac_pos = (neg * r / (1.0 - r) / pos).min(1.0);
    }
    (frac_pos, frac_neg)
}

/// Sample `fraction` of the rows, but never fewer than `min_rows` (or the
/// whole table, when it is smaller than the floor).
pub fn sample_reduction<R: Rng>(
    table: &DataTable,
    fraction: f64,
    min_rows: usize,
    rng: &mut R,
) -> DataTable {
    let n = table.n_rows();
    if n == 0 {
        return table.clone();
    }
    let floor = min_rows as f64 / n as f64;
    let effective = fraction.max(floor).min(1.0);
    table.sample_fraction(effective, rng)
}
