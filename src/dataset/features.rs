//! Recursive feature elimination with cross-validated scoring.
//!
//! Two paths, mirroring how training and evaluation sets are handled:
//!
//! - **Selection** (training): recursively drop the least important
//!   feature, score each subset with k-fold cross-validation, and keep the
//!   best-scoring subset. Estimators that expose no importances are
//!   replaced by a linear regressor for the elimination.
//! - **Enforcement** (evaluation): reduce the table to a previously
//!   selected feature list, asserting the counts line up.
//!
//! Feature reduction runs after scaling, on purely numeric tables.

use anyhow::{Context, Result};
use log::debug;

use crate::dataset::table::DataTable;

/// Minimal modelling surface needed to drive feature elimination.
pub trait Estimator {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// One prediction per row of `x`.
    fn predict(&self, x: &[Vec<f64>]) -> Vec<f64>;

    /// Per-feature importance scores, when the model exposes them.
    fn importances(&self) -> Option<Vec<f64>>;
}

/// Least-squares linear model trained by gradient descent. Serves as the
/// fallback ranker when the primary estimator exposes no importances, and
/// its weights double as importance scores.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    epochs: usize,
}

impl Default for LinearRegressor {
    fn default() -> Self {
        // Tuned for features scaled into [0, 1].
        Self {
            weights: Vec::new(),
            bias: 0.0,
            learning_rate: 0.1,
            epochs: 500,
        }
    }
}

impl Estimator for LinearRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let n_features = x.first().map_or(0, Vec::len);
        self.weights = vec![0.0; n_features];
        self.bias = 0.0;
        if x.is_empty() {
            return Ok(());
        }

        let n = x.len() as f64;
        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (row, &target) in x.iter().zip(y) {
                let error = self.predict_row(row) - target;
                for (g, &v) in grad_w.iter_mut().zip(row) {
                    *g += error * v;
                }
                grad_b += error;
            }
            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g / n;
            }
            self.bias -= self.learning_rate * grad_b / n;
        }
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    fn importances(&self) -> Option<Vec<f64>> {
        Some(self.weights.iter().map(|w| w.abs()).collect())
    }
}

impl LinearRegressor {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>() + self.bias
    }
}

/// Reduce `x` to its most predictive features, or to a previously selected
/// list.
///
/// With `allowed_features` the enforcement path runs; otherwise the
/// selection path eliminates features recursively using `estimator`.
/// Returns the retained feature names, in table order, with `x` reduced to
/// exactly those columns.
pub fn perform_feature_reduction(
    estimator: &mut dyn Estimator,
    x: &mut DataTable,
    y: &[u8],
    allowed_features: Option<&[String]>,
    folds: usize,
) -> Result<Vec<String>> {
    debug!(
        "features before reduction (total of {}): {}",
        x.n_cols(),
        x.names().join(", ")
    );

    match allowed_features {
        Some(allowed) => {
            let drop: Vec<String> = x
                .names()
                .iter()
                .filter(|name| !allowed.contains(name))
                .cloned()
                .collect();
            x.drop_columns(&drop);
            assert_eq!(x.n_cols(), allowed.len(), "incorrect number of features");
        }
        None => {
            let keep = rfecv(estimator, x, y, folds)?;
            let drop: Vec<String> = x
                .names()
                .iter()
                .filter(|name| !keep.contains(name))
                .cloned()
                .collect();
            x.drop_columns(&drop);
        }
    }

    debug!(
        "features after reduction (total of {}): {}",
        x.n_cols(),
        x.names().join(", ")
    );
    Ok(x.names().to_vec())
}

/// Recursive elimination: drop the least important feature one at a time,
/// scoring every intermediate subset, and return the best-scoring one
/// (ties go to the smaller subset).
fn rfecv(
    estimator: &mut dyn Estimator,
    x: &DataTable,
    y: &[u8],
    folds: usize,
) -> Result<Vec<String>> {
    let rows = x.to_matrix()?;
    let labels: Vec<f64> = y.iter().map(|&l| f64::from(l)).collect();

    // Estimators without importances cannot rank features; fall back to
    // the linear model for the whole elimination.
    let mut fallback = LinearRegressor::default();
    estimator.fit(&rows, &labels)?;
    let estimator: &mut dyn Estimator = if estimator.importances().is_some() {
        estimator
    } else {
        debug!("estimator exposes no feature importances, ranking with a linear model");
        &mut fallback
    };

    let mut active: Vec<usize> = (0..x.n_cols()).collect();
    let mut best: Option<(f64, Vec<usize>)> = None;
    while !active.is_empty() {
        let subset = project(&rows, &active);
        let score = cross_validate(estimator, &subset, &labels, folds)?;
        debug!("cv score with {} features: {:.4}", active.len(), score);
        if best.as_ref().map_or(true, |(s, _)| score >= *s) {
            best = Some((score, active.clone()));
        }
        if active.len() == 1 {
            break;
        }

        estimator.fit(&subset, &labels)?;
        let importances = estimator
            .importances()
            .context("estimator lost its importances mid-elimination")?;
        let weakest = importances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .context("no features left to rank")?;
        active.remove(weakest);
    }

    let (_, kept) = best.context("feature elimination saw no features")?;
    Ok(kept.iter().map(|&i| x.names()[i].clone()).collect())
}

fn project(rows: &[Vec<f64>], columns: &[usize]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| columns.iter().map(|&c| row[c]).collect())
        .collect()
}

/// Mean accuracy over `folds` round-robin splits, thresholding predictions
/// at 0.5.
fn cross_validate(
    estimator: &mut dyn Estimator,
    rows: &[Vec<f64>],
    labels: &[f64],
    folds: usize,
) -> Result<f64> {
    let folds = folds.max(2).min(rows.len().max(2));
    let mut total = 0.0;
    for fold in 0..folds {
        let mut train_x = Vec::new();
        let mut train_y = Vec::new();
        let mut test_x = Vec::new();
        let mut test_y = Vec::new();
        for (i, (row, &label)) in rows.iter().zip(labels).enumerate() {
            if i % folds == fold {
                test_x.push(row.clone());
                test_y.push(label);
            } else {
                train_x.push(row.clone());
                train_y.push(label);
            }
        }
        if test_x.is_empty() {
            continue;
        }

        estimator.fit(&train_x, &train_y)?;
        let predictions = estimator.predict(&test_x);
        let correct = predictions
            .iter()
            .zip(&test_y)
            .filter(|(p, &t)| (**p >= 0.5) == (t >= 0.5))
            .count();
        total += correct as f64 / test_y.len() as f64;
    }
    Ok(total / folds as f64)
}
