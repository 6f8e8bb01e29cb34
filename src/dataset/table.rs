//! Columnar table of query results.
//!
//! The store hands back rectangular row sets with named columns; everything
//! downstream (NA dropping, merging, sampling, balancing, scaling) operates
//! on this representation. Columns are either numeric or string-valued,
//! with per-cell missingness. Tables serialize with bincode for the query
//! cache, round-tripping shape and values without loss.

use anyhow::{bail, Context, Result};
use rand::seq::index::sample as index_sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single named column. Numeric columns hold the metric values the
/// models consume; string columns carry identifiers such as `db_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Num(Vec<Option<f64>>),
    Str(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Num(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Num(v) => v[row].is_none(),
            Column::Str(v) => v[row].is_none(),
        }
    }

    fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Num(v) => Column::Num(rows.iter().map(|&r| v[r]).collect()),
            Column::Str(v) => Column::Str(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    fn extend_from(&mut self, other: &Column) -> Result<()> {
        match (self, other) {
            (Column::Num(a), Column::Num(b)) => a.extend_from_slice(b),
            (Column::Str(a), Column::Str(b)) => a.extend_from_slice(b),
            _ => bail!("column kind mismatch while merging tables"),
        }
        Ok(())
    }
}

/// Rectangular table with named columns, all of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Length must match the existing columns.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            bail!("duplicate column name: {}", name);
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                bail!(
                    "column {} has {} rows, table has {}",
                    name,
                    column.len(),
                    first.len()
                );
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Append a numeric column holding the same value in every row.
    pub fn push_const_num(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        let rows = self.n_rows();
        self.push_column(name, Column::Num(vec![Some(value); rows]))
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Rows without any missing value, in original order.
    pub fn drop_na(&self) -> DataTable {
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&r| !self.columns.iter().any(|c| c.is_missing(r)))
            .collect();
        self.select_rows(&keep)
    }

    /// New table containing the given rows, in the given order. Row
    /// indices may repeat (used by oversampling).
    pub fn select_rows(&self, rows: &[usize]) -> DataTable {
        DataTable {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
        }
    }

    /// Drop the listed columns; names absent from the table are ignored.
    pub fn drop_columns<S: AsRef<str>>(&mut self, drop: &[S]) {
        let mut i = 0;
        while i < self.names.len() {
            if drop.iter().any(|d| d.as_ref() == self.names[i]) {
                self.names.remove(i);
                self.columns.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Remove and return a numeric column.
    pub fn take_num_column(&mut self, name: &str) -> Result<Vec<Option<f64>>> {
        let i = self
            .index_of(name)
            .with_context(|| format!("no such column: {}", name))?;
        self.names.remove(i);
        match self.columns.remove(i) {
            Column::Num(v) => Ok(v),
            Column::Str(_) => bail!("column {} is not numeric", name),
        }
    }

    /// Replace the values of an existing numeric column, keeping its
    /// position. The new values must have the table's row count.
    pub fn replace_num_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.n_rows() {
            bail!(
                "replacement for column {} has {} rows, table has {}",
                name,
                values.len(),
                self.n_rows()
            );
        }
        let i = self
            .index_of(name)
            .with_context(|| format!("no such column: {}", name))?;
        match &mut self.columns[i] {
            Column::Num(v) => {
                *v = values;
                Ok(())
            }
            Column::Str(_) => bail!("column {} is not numeric", name),
        }
    }

    /// Remove and return a string column.
    pub fn take_str_column(&mut self, name: &str) -> Result<Vec<Option<String>>> {
        let i = self
            .index_of(name)
            .with_context(|| format!("no such column: {}", name))?;
        self.names.remove(i);
        match self.columns.remove(i) {
            Column::Str(v) => Ok(v),
            Column::Num(_) => bail!("column {} is not a string column", name),
        }
    }

    /// Concatenate two tables row-wise.
    ///
    /// The column sets must be identical; the result follows `self`'s
    /// column order. A mismatch is a schema error, since downstream code
    /// assumes homogeneous columns.
    pub fn concat(&self, other: &DataTable) -> Result<DataTable> {
        let mut mine: Vec<&String> = self.names.iter().collect();
        let mut theirs: Vec<&String> = other.names.iter().collect();
        mine.sort();
        theirs.sort();
        if mine != theirs {
            bail!(
                "column sets differ between merged tables ({} vs {} columns)",
                self.n_cols(),
                other.n_cols()
            );
        }

        let mut merged = self.clone();
        for (name, column) in merged.names.iter().zip(merged.columns.iter_mut()) {
            let source = other
                .column(name)
                .with_context(|| format!("column {} missing from merged table", name))?;
            column.extend_from(source)?;
        }
        Ok(merged)
    }

    /// Uniform sample without replacement of `fraction` of the rows.
    pub fn sample_fraction<R: Rng>(&self, fraction: f64, rng: &mut R) -> DataTable {
        let n = self.n_rows();
        let k = ((fraction.clamp(0.0, 1.0)) * n as f64).round() as usize;
        let k = k.min(n);
        let rows: Vec<usize> = index_sample(rng, n, k).into_vec();
        self.select_rows(&rows)
    }

    /// Row-major matrix of all values. Fails on string columns or missing
    /// cells; callers drop NAs and extract identifiers first.
    pub fn to_matrix(&self) -> Result<Vec<Vec<f64>>> {
        let mut columns = Vec::with_capacity(self.n_cols());
        for (name, column) in self.names.iter().zip(&self.columns) {
            match column {
                Column::Num(v) => columns.push(v),
                Column::Str(_) => bail!("column {} is not numeric", name),
            }
        }
        (0..self.n_rows())
            .map(|r| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(c, v)| {
                        v[r].with_context(|| {
                            format!("missing value at row {}, column {}", r, self.names[c])
                        })
                    })
                    .collect()
            })
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(names: &[&str], rows: &[&[f64]]) -> DataTable {
        let mut t = DataTable::new();
        for (c, name) in names.iter().enumerate() {
            let col = Column::Num(rows.iter().map(|r| Some(r[c])).collect());
            t.push_column(*name, col).unwrap();
        }
        t
    }

    #[test]
    fn test_drop_na_removes_rows_with_any_missing() {
        let mut t = DataTable::new();
        t.push_column("a", Column::Num(vec![Some(1.0), None, Some(3.0)]))
            .unwrap();
        t.push_column(
            "id",
            Column::Str(vec![
                Some("x".into()),
                Some("y".into()),
                Some("z".into()),
            ]),
        )
        .unwrap();

        let clean = t.drop_na();
        assert_eq!(clean.n_rows(), 2);
        assert_eq!(
            clean.column("id"),
            Some(&Column::Str(vec![Some("x".into()), Some("z".into())]))
        );
    }

    #[test]
    fn test_concat_aligns_column_order() {
        let a = table(&["x", "y"], &[&[1.0, 2.0]]);
        let mut b = DataTable::new();
        b.push_column("y", Column::Num(vec![Some(20.0)])).unwrap();
        b.push_column("x", Column::Num(vec![Some(10.0)])).unwrap();

        let merged = a.concat(&b).unwrap();
        assert_eq!(merged.n_rows(), 2);
        assert_eq!(merged.names(), &["x".to_string(), "y".to_string()]);
        assert_eq!(
            merged.column("x"),
            Some(&Column::Num(vec![Some(1.0), Some(10.0)]))
        );
    }

    #[test]
    fn test_concat_rejects_differing_column_sets() {
        let a = table(&["x", "y"], &[&[1.0, 2.0]]);
        let b = table(&["x"], &[&[1.0]]);
        assert!(a.concat(&b).is_err());
    }

    #[test]
    fn test_push_column_rejects_ragged_lengths() {
        let mut t = table(&["x"], &[&[1.0], &[2.0]]);
        let result = t.push_column("y", Column::Num(vec![Some(1.0)]));
        assert!(result.is_err());
    }

    #[test]
    fn test_sample_fraction_row_count() {
        let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64]).collect();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let t = table(&["x"], &refs);

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(t.sample_fraction(0.25, &mut rng).n_rows(), 25);
        assert_eq!(t.sample_fraction(1.0, &mut rng).n_rows(), 100);
        assert_eq!(t.sample_fraction(0.0, &mut rng).n_rows(), 0);
    }

    #[test]
    fn test_to_matrix_is_row_major() {
        let t = table(&["a", "b"], &[&[1.0, 2.0], &[3.0, 4.0]]);
        let m = t.to_matrix().unwrap();
        assert_eq!(m, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let mut with_ids = t.clone();
        with_ids
            .push_column("db_id", Column::Str(vec![Some("r.1".into()), Some("r.2".into())]))
            .unwrap();
        assert!(with_ids.to_matrix().is_err(), "string columns cannot be matrixed");
    }

    #[test]
    fn test_select_rows_allows_repeats() {
        let t = table(&["a"], &[&[1.0], &[2.0]]);
        let picked = t.select_rows(&[1, 1, 0]);
        assert_eq!(
            picked.column("a"),
            Some(&Column::Num(vec![Some(2.0), Some(2.0), Some(1.0)]))
        );
    }

    #[test]
    fn test_bincode_roundtrip() {
        let mut t = table(&["a"], &[&[1.5], &[2.5]]);
        t.push_column("id", Column::Str(vec![Some("r.1".into()), None]))
            .unwrap();

        let bytes = bincode::serialize(&t).unwrap();
        let decoded: DataTable = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, t);
    }
}
