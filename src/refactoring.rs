//! Refactoring descriptors.
//!
//! A descriptor fixes one (refactoring name, level, commit threshold)
//! triple and knows how to pull its positive and negative instances from
//! the store. Descriptors are built once by [`build_refactorings`], the
//! only place where refactoring types are registered; the rest of the
//! pipeline just iterates them.

use anyhow::Result;

use crate::dataset::table::DataTable;
use crate::db::connector::{Connector, Store};
use crate::db::query;
use crate::types::{FileType, Level};

/// One refactoring type at one level with one stability threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refactoring {
    name: String,
    level: Level,
    commit_threshold: i64,
}

impl Refactoring {
    pub fn new(name: impl Into<String>, level: Level, commit_threshold: i64) -> Self {
        Self {
            name: name.into(),
            level,
            commit_threshold,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn commit_threshold(&self) -> i64 {
        self.commit_threshold
    }

    /// Commits where this refactoring was detected, with the level's
    /// metrics, ordered by commit date.
    pub fn refactored_instances<S: Store>(
        &self,
        connector: &mut Connector<S>,
        dataset: &str,
        file_type: FileType,
    ) -> Result<DataTable> {
        let sql = query::level_refactorings_query(self.level, &self.name, dataset, file_type);
        connector.execute(&sql)
    }

    /// Entities unchanged for at least `commit_threshold` commits at this
    /// level, used as negative examples.
    pub fn non_refactored_instances<S: Store>(
        &self,
        connector: &mut Connector<S>,
        dataset: &str,
        file_type: FileType,
    ) -> Result<DataTable> {
        let sql =
            query::level_stable_query(self.level, self.commit_threshold, dataset, file_type);
        connector.execute(&sql)
    }
}

/// Every known refactoring descriptor for the given levels: the level's
/// refactoring names crossed with its stability thresholds.
pub fn build_refactorings(levels: &[Level]) -> Vec<Refactoring> {
    let mut descriptors = Vec::new();
    for &level in levels {
        for &name in level.refactorings() {
            for &threshold in level.stable_thresholds() {
                descriptors.push(Refactoring::new(name, level, threshold));
            }
        }
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_refactorings_crosses_names_and_thresholds() {
        let descriptors = build_refactorings(&Level::all());
        let expected: usize = Level::all()
            .iter()
            .map(|l| l.refactorings().len() * l.stable_thresholds().len())
            .sum();
        assert_eq!(descriptors.len(), expected);

        for descriptor in &descriptors {
            assert!(descriptor
                .level()
                .refactorings()
                .contains(&descriptor.name()));
            assert!(descriptor
                .level()
                .stable_thresholds()
                .contains(&descriptor.commit_threshold()));
        }
    }

    #[test]
    fn test_method_level_includes_extract_method() {
        let descriptors = build_refactorings(&[Level::Method]);
        assert!(descriptors
            .iter()
            .any(|d| d.name() == "Extract Method" && d.commit_threshold() == 30));
    }

    #[test]
    fn test_other_level_shares_class_threshold() {
        let descriptors = build_refactorings(&[Level::Other]);
        assert!(!descriptors.is_empty());
        assert!(descriptors.iter().all(|d| d.commit_threshold() == 15));
    }
}
