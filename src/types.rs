//! Core domain types shared across the pipeline.
//!
//! The structural **level** of a refactoring decides everything downstream:
//! which metric tables get joined, which refactoring names are studied, and
//! which stability thresholds define a negative example.
//!
//! | Level    | Metric tables joined                  | Default threshold |
//! |----------|---------------------------------------|-------------------|
//! | Class    | class + process                       | 15                |
//! | Method   | class + method + process              | 30                |
//! | Variable | class + method + variable + process   | 40                |
//! | Field    | class + field + process               | 30                |
//! | Other    | class + process                       | 15 (class fold)   |
//!
//! These maps are fixed lookup tables, loaded once and never mutated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value marking a process/authorship metric the collector could not compute.
///
/// Rows carrying this sentinel are optionally filtered out in one place
/// (the assembler's faulty-row step), never anywhere else.
pub const MISSING_METRIC: f64 = -1.0;

/// Structural granularity of a refactoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    None = 0,
    Class = 1,
    Method = 2,
    Variable = 3,
    Field = 4,
    Other = 5,
}

impl Level {
    /// All levels that carry refactoring types, in database order.
    pub fn all() -> [Level; 5] {
        [
            Level::Class,
            Level::Method,
            Level::Variable,
            Level::Field,
            Level::Other,
        ]
    }

    /// Integer value as stored in the `level` column.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Refactoring type names studied at this level.
    pub fn refactorings(self) -> &'static [&'static str] {
        match self {
            Level::None => &[],
            Level::Class => CLASS_LEVEL_REFACTORINGS,
            Level::Method => METHOD_LEVEL_REFACTORINGS,
            Level::Variable => VARIABLE_LEVEL_REFACTORINGS,
            Level::Field => FIELD_LEVEL_REFACTORINGS,
            Level::Other => OTHER_LEVEL_REFACTORINGS,
        }
    }

    /// Stable commit-count thresholds that define a negative example at
    /// this level. A descriptor is built per (name, level, threshold) triple.
    pub fn stable_thresholds(self) -> &'static [i64] {
        match self {
            Level::None => &[],
            // Other-level refactorings are folded to class granularity in
            // the stable-commit data, so they share the class threshold.
            Level::Other | Level::Class => &[15],
            Level::Method => &[30],
            Level::Variable => &[40],
            Level::Field => &[30],
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::None => "none",
            Level::Class => "class",
            Level::Method => "method",
            Level::Variable => "variable",
            Level::Field => "field",
            Level::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Which file population the instances are drawn from.
///
/// The database flags every instance with `isTest`; this filter restricts
/// queries to production files, test files, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    OnlyProduction,
    OnlyTest,
    TestAndProduction,
}

impl FileType {
    /// Value of the `isTest` column this variant matches, if restricted.
    pub fn is_test_value(self) -> Option<i64> {
        match self {
            FileType::OnlyProduction => Some(0),
            FileType::OnlyTest => Some(1),
            FileType::TestAndProduction => None,
        }
    }
}

pub const CLASS_LEVEL_REFACTORINGS: &[&str] = &[
    "Extract Class",
    "Extract Interface",
    "Extract Subclass",
    "Extract Superclass",
    "Move And Rename Class",
    "Move Class",
    "Rename Class",
    "Introduce Polymorphism",
    "Convert Anonymous Class To Type",
];

pub const METHOD_LEVEL_REFACTORINGS: &[&str] = &[
    "Extract And Move Method",
    "Extract Method",
    "Inline Method",
    "Move Method",
    "Pull Up Method",
    "Push Down Method",
    "Rename Method",
    "Change Return Type",
    "Move And Inline Method",
    "Move And Rename Method",
    "Change Parameter Type",
    "Split Parameter",
    "Merge Parameter",
];

pub const VARIABLE_LEVEL_REFACTORINGS: &[&str] = &[
    "Extract Variable",
    "Inline Variable",
    "Parameterize Variable",
    "Rename Parameter",
    "Rename Variable",
    "Replace Variable With Attribute",
    "Change Variable Type",
    "Split Variable",
    "Merge Variable",
];

pub const FIELD_LEVEL_REFACTORINGS: &[&str] = &[
    "Move Attribute",
    "Pull Up Attribute",
    "Move And Rename Attribute",
    "Push Down Attribute",
    "Replace Attribute",
    "Rename Attribute",
    "Extract Attribute",
    "Change Attribute Type",
];

pub const OTHER_LEVEL_REFACTORINGS: &[&str] = &["Move Source Folder", "Change Package"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_integer_values() {
        assert_eq!(Level::Class.as_i64(), 1);
        assert_eq!(Level::Method.as_i64(), 2);
        assert_eq!(Level::Other.as_i64(), 5);
    }

    #[test]
    fn test_every_studied_level_has_refactorings() {
        for level in Level::all() {
            assert!(
                !level.refactorings().is_empty(),
                "level {} has no refactoring types",
                level
            );
        }
    }

    #[test]
    fn test_thresholds_match_level_map() {
        assert_eq!(Level::Class.stable_thresholds(), &[15]);
        assert_eq!(Level::Method.stable_thresholds(), &[30]);
        assert_eq!(Level::Variable.stable_thresholds(), &[40]);
        assert_eq!(Level::Field.stable_thresholds(), &[30]);
        // Other folds to class granularity and shares its threshold.
        assert_eq!(Level::Other.stable_thresholds(), &[15]);
    }

    #[test]
    fn test_file_type_filter_values() {
        assert_eq!(FileType::OnlyProduction.is_test_value(), Some(0));
        assert_eq!(FileType::OnlyTest.is_test_value(), Some(1));
        assert_eq!(FileType::TestAndProduction.is_test_value(), None);
    }
}
