//! Class balancing of the merged training set.
//!
//! Every strategy returns a set with exactly as many positive as negative
//! rows. Undersampling strategies pick real rows; oversampling repeats
//! minority rows; cluster centroids replaces the majority class with
//! synthetic k-means centers (which therefore carry no `db_id`).
//!
//! | strategy            | direction | rows in output                        |
//! |---------------------|-----------|---------------------------------------|
//! | `random`            | under     | minority + random majority subset     |
//! | `oversampling`      | over      | majority + repeated minority rows     |
//! | `cluster-centroids` | under     | minority + synthetic majority centers |
//! | `near-miss`         | under     | minority + closest majority rows      |

use std::fmt;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample as index_sample;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::dataset::table::{Column, DataTable};

/// How to equalize class counts before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceStrategy {
    Random,
    Oversampling,
    ClusterCentroids,
    NearMiss,
}

impl fmt::Display for BalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BalanceStrategy::Random => "random",
            BalanceStrategy::Oversampling => "oversampling",
            BalanceStrategy::ClusterCentroids => "cluster-centroids",
            BalanceStrategy::NearMiss => "near-miss",
        };
        write!(f, "{}", name)
    }
}

/// Balance `(x, y)` so both classes have the same row count.
///
/// `y` holds one label (0 or 1) per row of `x`. When one class is absent
/// the input passes through unchanged. The seed makes every strategy
/// deterministic.
pub fn perform_balancing(
    x: &DataTable,
    y: &[u8],
    strategy: BalanceStrategy,
    seed: u64,
) -> Result<(DataTable, Vec<u8>)> {
    assert_eq!(x.n_rows(), y.len(), "feature rows and labels must align");

    let pos: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 1).collect();
    let neg: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 0).collect();
    if pos.is_empty() || neg.is_empty() {
        return Ok((x.clone(), y.to_vec()));
    }

    let (minority, majority, min_label) = if pos.len() <= neg.len() {
        (&pos, &neg, 1u8)
    } else {
        (&neg, &pos, 0u8)
    };
    let maj_label = 1 - min_label;

    let mut rng = StdRng::seed_from_u64(seed);
    match strategy {
        BalanceStrategy::Random => {
            let picked = index_sample(&mut rng, majority.len(), minority.len()).into_vec();
            let rows: Vec<usize> = minority
                .iter()
                .copied()
                .chain(picked.into_iter().map(|i| majority[i]))
                .collect();
            let labels = labels_for(minority.len(), min_label, minority.len(), maj_label);
            Ok((x.select_rows(&rows), labels))
        }
        BalanceStrategy::Oversampling => {
            let mut rows: Vec<usize> = minority.iter().chain(majority.iter()).copied().collect();
            for _ in 0..majority.len() - minority.len() {
                rows.push(minority[rng.gen_range(0..minority.len())]);
            }
            let mut labels = labels_for(minority.len(), min_label, majority.len(), maj_label);
            labels.extend(std::iter::repeat(min_label).take(majority.len() - minority.len()));
            Ok((x.select_rows(&rows), labels))
        }
        BalanceStrategy::ClusterCentroids => {
            let points = numeric_matrix(x, majority)?;
            let centroids = kmeans(&points, minority.len(), 10, &mut rng);
            let balanced = with_synthetic_rows(x, minority, &centroids)?;
            let labels = labels_for(minority.len(), min_label, centroids.len(), maj_label);
            Ok((balanced, labels))
        }
        BalanceStrategy::NearMiss => {
            let min_points = numeric_matrix(x, minority)?;
            let maj_points = numeric_matrix(x, majority)?;

            // NearMiss-1: keep the majority rows with the smallest mean
            // distance to their 3 nearest minority neighbours.
            let mut scored: Vec<(f64, usize)> = maj_points
                .iter()
                .zip(majority.iter())
                .map(|(p, &row)| (mean_nearest_distance(p, &min_points, 3), row))
                .collect();
            scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let rows: Vec<usize> = minority
                .iter()
                .copied()
                .chain(scored.iter().take(minority.len()).map(|&(_, row)| row))
                .collect();
            let labels = labels_for(minority.len(), min_label, minority.len(), maj_label);
            Ok((x.select_rows(&rows), labels))
        }
    }
}

fn labels_for(n_min: usize, min_label: u8, n_maj: usize, maj_label: u8) -> Vec<u8> {
    let mut labels = vec![min_label; n_min];
    labels.extend(std::iter::repeat(maj_label).take(n_maj));
    labels
}

/// Row-major matrix over the numeric columns only, in table column order.
fn numeric_matrix(x: &DataTable, rows: &[usize]) -> Result<Vec<Vec<f64>>> {
    let mut columns: Vec<&Vec<Option<f64>>> = Vec::new();
    for name in x.names() {
        if let Some(Column::Num(v)) = x.column(name) {
            columns.push(v);
        }
    }
    rows.iter()
        .map(|&r| {
            columns
                .iter()
                .map(|v| v[r].with_context(|| format!("missing value in row {}", r)))
                .collect()
        })
        .collect()
}

/// Minority rows followed by synthetic rows whose numeric columns come
/// from `centroids` (in table column order) and whose string columns are
/// missing.
fn with_synthetic_rows(
    x: &DataTable,
    minority: &[usize],
    centroids: &[Vec<f64>],
) -> Result<DataTable> {
    let real = x.select_rows(minority);
    let mut out = DataTable::new();
    let mut dim = 0;
    for name in x.names() {
        match real.column(name).context("column vanished during selection")? {
            Column::Num(v) => {
                let mut values = v.clone();
                values.extend(centroids.iter().map(|c| Some(c[dim])));
                out.push_column(name.clone(), Column::Num(values))?;
                dim += 1;
            }
            Column::Str(v) => {
                let mut values = v.clone();
                values.extend(std::iter::repeat(None).take(centroids.len()));
                out.push_column(name.clone(), Column::Str(values))?;
            }
        }
    }
    Ok(out)
}

/// Lloyd's algorithm with random initial centers. An emptied cluster keeps
/// its previous center.
fn kmeans<R: Rng>(points: &[Vec<f64>], k: usize, iterations: usize, rng: &mut R) -> Vec<Vec<f64>> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(points.len());
    let mut centroids: Vec<Vec<f64>> = index_sample(rng, points.len(), k)
        .into_iter()
        .map(|i| points[i].clone())
        .collect();

    for _ in 0..iterations {
        let mut sums = vec![vec![0.0; points[0].len()]; k];
        let mut counts = vec![0usize; k];
        for point in points {
            let nearest = nearest_centroid(point, &centroids);
            counts[nearest] += 1;
            for (s, &v) in sums[nearest].iter_mut().zip(point) {
                *s += v;
            }
        }
        for (c, (sum, count)) in centroids.iter_mut().zip(sums.iter().zip(&counts)) {
            if *count > 0 {
                *c = sum.iter().map(|s| s / *count as f64).collect();
            }
        }
    }
    centroids
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn mean_nearest_distance(point: &[f64], others: &[Vec<f64>], k: usize) -> f64 {
    let mut distances: Vec<f64> = others.iter().map(|o| squared_distance(point, o)).collect();
    distances.sort_by(f64::total_cmp);
    let k = k.min(distances.len());
    distances[..k].iter().sum::<f64>() / k as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_counts(y: &[u8]) -> (usize, usize) {
        let pos = y.iter().filter(|&&l| l == 1).count();
        (pos, y.len() - pos)
    }

    /// `n_pos` rows near 100.0, `n_neg` rows near 0.0.
    fn imbalanced(n_pos: usize, n_neg: usize) -> (DataTable, Vec<u8>) {
        let mut t = DataTable::new();
        let mut values = Vec::new();
        let mut ids = Vec::new();
        let mut y = Vec::new();
        for i in 0..n_pos {
            values.push(Some(100.0 + i as f64));
            ids.push(Some(format!("RefactoringCommit.{}", i)));
            y.push(1);
        }
        for i in 0..n_neg {
            values.push(Some(i as f64 / 100.0));
            ids.push(Some(format!("StableCommit.{}", i)));
            y.push(0);
        }
        t.push_column("metric", Column::Num(values)).unwrap();
        t.push_column("db_id", Column::Str(ids)).unwrap();
        (t, y)
    }

    #[test]
    fn test_random_undersamples_majority() {
        let (x, y) = imbalanced(10, 40);
        let (bx, by) = perform_balancing(&x, &y, BalanceStrategy::Random, 42).unwrap();
        assert_eq!(class_counts(&by), (10, 10));
        assert_eq!(bx.n_rows(), 20);
        assert_eq!(bx.names(), x.names());
    }

    #[test]
    fn test_oversampling_repeats_minority() {
        let (x, y) = imbalanced(10, 40);
        let (bx, by) = perform_balancing(&x, &y, BalanceStrategy::Oversampling, 42).unwrap();
        assert_eq!(class_counts(&by), (40, 40));
        assert_eq!(bx.n_rows(), 80);
    }

    #[test]
    fn test_cluster_centroids_synthesizes_majority() {
        let (x, y) = imbalanced(5, 20);
        let (bx, by) =
            perform_balancing(&x, &y, BalanceStrategy::ClusterCentroids, 42).unwrap();
        assert_eq!(class_counts(&by), (5, 5));
        assert_eq!(bx.n_rows(), 10);

        // The synthetic rows have no identifier.
        let Some(Column::Str(ids)) = bx.column("db_id") else {
            panic!("db_id column missing");
        };
        assert_eq!(ids.iter().filter(|id| id.is_none()).count(), 5);

        // Centroids of values near 0.0 stay near 0.0.
        let Some(Column::Num(values)) = bx.column("metric") else {
            panic!("metric column missing");
        };
        for (value, label) in values.iter().zip(&by) {
            if *label == 0 {
                assert!(value.unwrap() < 1.0);
            }
        }
    }

    #[test]
    fn test_nearmiss_keeps_closest_majority_rows() {
        // Minority near 0; majority split between near (0.5) and far (1000).
        let mut t = DataTable::new();
        t.push_column(
            "metric",
            Column::Num(vec![
                Some(0.0),
                Some(0.1),
                Some(0.5),
                Some(0.6),
                Some(1000.0),
                Some(2000.0),
            ]),
        )
        .unwrap();
        let y = vec![1, 1, 0, 0, 0, 0];

        let (bx, by) = perform_balancing(&t, &y, BalanceStrategy::NearMiss, 42).unwrap();
        assert_eq!(class_counts(&by), (2, 2));
        let Some(Column::Num(values)) = bx.column("metric") else {
            panic!("metric column missing");
        };
        for (value, label) in values.iter().zip(&by) {
            if *label == 0 {
                assert!(value.unwrap() < 1.0, "far majority rows must be dropped");
            }
        }
    }

    #[test]
    fn test_single_class_passes_through() {
        let (x, _) = imbalanced(5, 0);
        let y = vec![1; 5];
        let (bx, by) = perform_balancing(&x, &y, BalanceStrategy::Random, 42).unwrap();
        assert_eq!(bx, x);
        assert_eq!(by, y);
    }

    #[test]
    fn test_determinism() {
        let (x, y) = imbalanced(10, 50);
        let a = perform_balancing(&x, &y, BalanceStrategy::Random, 7).unwrap();
        let b = perform_balancing(&x, &y, BalanceStrategy::Random, 7).unwrap();
        assert_eq!(a, b);
    }
}
