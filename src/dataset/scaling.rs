//! Min-max feature scaling.
//!
//! Fitted on the training set only; the same fitted scaler is reapplied to
//! every evaluation set so both live in the same [0, 1] space. A scaler is
//! immutable after fitting.

use anyhow::{bail, Result};

use crate::dataset::table::{Column, DataTable};

/// Per-column minimum/maximum learned from one training set.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    names: Vec<String>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    /// Learn the value range of every numeric column. String columns are
    /// ignored; they carry identifiers, not features.
    pub fn fit(table: &DataTable) -> MinMaxScaler {
        let mut names = Vec::new();
        let mut mins = Vec::new();
        let mut maxs = Vec::new();
        for name in table.names() {
            if let Some(Column::Num(values)) = table.column(name) {
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                for value in values.iter().flatten() {
                    lo = lo.min(*value);
                    hi = hi.max(*value);
                }
                names.push(name.clone());
                mins.push(lo);
                maxs.push(hi);
            }
        }
        MinMaxScaler { names, mins, maxs }
    }

    /// Map every fitted column into [0, 1].
    ///
    /// Values outside the fitted range are clamped rather than
    /// extrapolated, so evaluation outliers cannot leave the unit
    /// interval. A constant column maps to 0.0. Fails when a fitted
    /// column is absent from the table.
    pub fn transform(&self, table: &DataTable) -> Result<DataTable> {
        let mut scaled = table.clone();
        for ((name, &lo), &hi) in self.names.iter().zip(&self.mins).zip(&self.maxs) {
            let Some(Column::Num(values)) = table.column(name) else {
                bail!("scaler fitted on column {} which is missing here", name);
            };
            let range = hi - lo;
            let rescaled = values
                .iter()
                .map(|v| {
                    v.map(|v| {
                        if range == 0.0 {
                            0.0
                        } else {
                            ((v - lo) / range).clamp(0.0, 1.0)
                        }
                    })
                })
                .collect();
            scaled.replace_num_column(name, rescaled)?;
        }
        Ok(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: &[f64]) -> DataTable {
        let mut t = DataTable::new();
        t.push_column("metric", Column::Num(values.iter().map(|&v| Some(v)).collect()))
            .unwrap();
        t
    }

    #[test]
    fn test_transform_maps_to_unit_interval() {
        let train = table(&[10.0, 20.0, 30.0]);
        let scaler = MinMaxScaler::fit(&train);
        let scaled = scaler.transform(&train).unwrap();
        assert_eq!(
            scaled.column("metric"),
            Some(&Column::Num(vec![Some(0.0), Some(0.5), Some(1.0)]))
        );
    }

    #[test]
    fn test_fitted_range_is_reused_and_clamped() {
        let train = table(&[0.0, 10.0]);
        let scaler = MinMaxScaler::fit(&train);

        // Evaluation data beyond the training range is clamped.
        let eval = table(&[-5.0, 5.0, 20.0]);
        let scaled = scaler.transform(&eval).unwrap();
        assert_eq!(
            scaled.column("metric"),
            Some(&Column::Num(vec![Some(0.0), Some(0.5), Some(1.0)]))
        );
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let train = table(&[7.0, 7.0]);
        let scaler = MinMaxScaler::fit(&train);
        let scaled = scaler.transform(&train).unwrap();
        assert_eq!(
            scaled.column("metric"),
            Some(&Column::Num(vec![Some(0.0), Some(0.0)]))
        );
    }

    #[test]
    fn test_missing_fitted_column_is_an_error() {
        let scaler = MinMaxScaler::fit(&table(&[1.0]));
        let mut other = DataTable::new();
        other
            .push_column("other", Column::Num(vec![Some(1.0)]))
            .unwrap();
        assert!(scaler.transform(&other).is_err());
    }

    #[test]
    fn test_string_columns_pass_through() {
        let mut train = table(&[0.0, 4.0]);
        train
            .push_column(
                "db_id",
                Column::Str(vec![Some("a.1".into()), Some("a.2".into())]),
            )
            .unwrap();
        let scaler = MinMaxScaler::fit(&train);
        let scaled = scaler.transform(&train).unwrap();
        assert_eq!(scaled.column("db_id"), train.column("db_id"));
    }
}
