//! Assembly of model-ready labelled datasets.
//!
//! Turns the two raw tables of a refactoring descriptor (refactored and
//! stable instances) into an aligned feature matrix, label vector and
//! identifier list:
//!
//! 1. drop rows with missing values; an empty side means "skip"
//! 2. label rows (refactored 1, stable 0)
//! 3. check both sides share one column set
//! 4. per-class sample reduction (training) or flat fraction (evaluation)
//! 5. merge, drop configured metric columns, drop faulty sentinel rows
//! 6. balance classes (training), then shuffle
//! 7. set aside `db_id`, scale features
//!
//! Scalers are fitted on training data only and reused for evaluation.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::Config;
use crate::dataset::balancing::perform_balancing;
use crate::dataset::features::{perform_feature_reduction, LinearRegressor};
use crate::dataset::sampling::{sample_fractions, sample_reduction};
use crate::dataset::scaling::MinMaxScaler;
use crate::dataset::table::{Column, DataTable};
use crate::db::connector::{Connector, Store};
use crate::db::schema::PROCESS_METRICS_FIELDS;
use crate::refactoring::Refactoring;
use crate::types::MISSING_METRIC;

/// One assembled dataset. All fields are aligned row-wise; `ids` entries
/// are missing for synthetic rows introduced by centroid balancing.
#[derive(Debug, Clone)]
pub struct LabelledInstances {
    pub x: DataTable,
    pub y: Vec<u8>,
    pub ids: Vec<Option<String>>,
    /// The scaler applied to `x`, for reuse on evaluation sets. `None`
    /// when scaling is disabled.
    pub scaler: Option<MinMaxScaler>,
}

/// Fetch and assemble the labelled instances of one descriptor on one
/// dataset.
///
/// `Ok(None)` means no usable instances exist for this combination; the
/// caller moves on to the next descriptor. Pass the training run's fitted
/// scaler when assembling evaluation data.
pub fn retrieve_labelled_instances<S: Store>(
    connector: &mut Connector<S>,
    refactoring: &Refactoring,
    dataset: &str,
    is_training: bool,
    scaler: Option<MinMaxScaler>,
    config: &Config,
) -> Result<Option<LabelledInstances>> {
    info!(
        "retrieving {} at {} level (threshold {}) from dataset {:?}",
        refactoring.name(),
        refactoring.level(),
        refactoring.commit_threshold(),
        dataset
    );
    let refactored = refactoring
        .refactored_instances(connector, dataset, config.file_type)
        .with_context(|| format!("fetching refactored instances of {}", refactoring.name()))?;
    let stable = refactoring
        .non_refactored_instances(connector, dataset, config.file_type)
        .with_context(|| format!("fetching stable instances for {}", refactoring.name()))?;
    assemble_labelled_instances(refactored, stable, is_training, scaler, config)
}

/// The pure assembly pipeline over two already-fetched tables.
pub fn assemble_labelled_instances(
    refactored: DataTable,
    stable: DataTable,
    is_training: bool,
    scaler: Option<MinMaxScaler>,
    config: &Config,
) -> Result<Option<LabelledInstances>> {
    let mut refactored = refactored.drop_na();
    let mut stable = stable.drop_na();
    if refactored.is_empty() || stable.is_empty() {
        info!(
            "no instances after cleaning ({} refactored, {} stable), skipping",
            refactored.n_rows(),
            stable.n_rows()
        );
        return Ok(None);
    }
    debug!(
        "clean instances: {} refactored, {} stable",
        refactored.n_rows(),
        stable.n_rows()
    );

    refactored.push_const_num("prediction", 1.0)?;
    stable.push_const_num("prediction", 0.0)?;

    // The merge invariant is checked up front so a schema drift fails
    // before any rows are sampled away.
    ensure_same_columns(&refactored, &stable)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    if is_training {
        if config.sample_reduction {
            let (frac_pos, frac_neg) = sample_fractions(
                refactored.n_rows(),
                stable.n_rows(),
                config.training_positive_ratio,
            );
            refactored =
                sample_reduction(&refactored, frac_pos, config.min_training_positive, &mut rng);
            stable = sample_reduction(&stable, frac_neg, config.min_training_negative, &mut rng);
            debug!(
                "after sample reduction: {} refactored, {} stable",
                refactored.n_rows(),
                stable.n_rows()
            );
        }
    } else {
        refactored = sample_reduction(
            &refactored,
            config.evaluation_fraction,
            config.min_evaluation,
            &mut rng,
        );
        stable = sample_reduction(&stable, config.evaluation_fraction, config.min_evaluation, &mut rng);
    }

    let mut merged = refactored.concat(&stable)?;
    merged.drop_columns(&config.effective_drop_metrics());

    if !config.drop_process_metrics && config.drop_faulty_process_metrics {
        merged = drop_faulty_process_rows(&merged);
    }

    let labels = merged.take_num_column("prediction")?;
    let mut y: Vec<u8> = labels
        .into_iter()
        .map(|l| l.map(|v| u8::from(v != 0.0)))
        .collect::<Option<Vec<u8>>>()
        .context("label column lost values during assembly")?;
    let mut x = merged;

    if is_training && config.balance {
        let (bx, by) = perform_balancing(&x, &y, config.balance_strategy, config.seed)?;
        x = bx;
        y = by;
        assert_eq!(x.n_rows(), y.len(), "balancing misaligned features and labels");
    }

    // Balancing leaves the classes in contiguous blocks; training code
    // must not see ordered batches.
    let mut permutation: Vec<usize> = (0..x.n_rows()).collect();
    permutation.shuffle(&mut rng);
    x = x.select_rows(&permutation);
    y = permutation.iter().map(|&i| y[i]).collect();

    let ids = x.take_str_column("db_id")?;

    let scaler = if config.scale {
        let fitted = match (scaler, is_training) {
            (Some(fitted), _) => fitted,
            (None, true) => MinMaxScaler::fit(&x),
            (None, false) => bail!("evaluation scaling requires a scaler fitted on training data"),
        };
        x = fitted.transform(&x)?;
        Some(fitted)
    } else {
        None
    };

    info!(
        "assembled {} instances ({} positive) with {} features",
        x.n_rows(),
        y.iter().filter(|&&l| l == 1).count(),
        x.n_cols()
    );
    Ok(Some(LabelledInstances { x, y, ids, scaler }))
}

/// Apply the configured feature reduction to an assembled training set.
///
/// Returns the retained feature names, or `None` when reduction is
/// disabled. Evaluation sets are reduced by passing the returned list to
/// [`perform_feature_reduction`] as the allowed-feature list instead.
pub fn reduce_features(
    instances: &mut LabelledInstances,
    config: &Config,
) -> Result<Option<Vec<String>>> {
    if !config.feature_reduction {
        return Ok(None);
    }
    let mut estimator = LinearRegressor::default();
    let kept = perform_feature_reduction(
        &mut estimator,
        &mut instances.x,
        &instances.y,
        None,
        config.feature_reduction_folds,
    )?;
    Ok(Some(kept))
}

fn ensure_same_columns(refactored: &DataTable, stable: &DataTable) -> Result<()> {
    let mut a: Vec<&String> = refactored.names().iter().collect();
    let mut b: Vec<&String> = stable.names().iter().collect();
    a.sort();
    b.sort();
    if a != b {
        bail!(
            "column sets differ between refactored ({}) and stable ({}) instances",
            refactored.n_cols(),
            stable.n_cols()
        );
    }
    Ok(())
}

/// Drop every row where a retained process metric equals the missing
/// sentinel.
fn drop_faulty_process_rows(table: &DataTable) -> DataTable {
    let columns: Vec<&Vec<Option<f64>>> = PROCESS_METRICS_FIELDS
        .iter()
        .filter_map(|name| match table.column(name) {
            Some(Column::Num(v)) => Some(v),
            _ => None,
        })
        .collect();
    let keep: Vec<usize> = (0..table.n_rows())
        .filter(|&r| !columns.iter().any(|v| v[r] == Some(MISSING_METRIC)))
        .collect();
    table.select_rows(&keep)
}
