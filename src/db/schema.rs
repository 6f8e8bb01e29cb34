//! Static catalog of the metric-store schema.
//!
//! Every table the pipeline touches is enumerated here together with its
//! join key and column list. The query builder never discovers columns at
//! runtime; the catalog is the single source of truth, and its declared
//! column order is what makes generated queries byte-reproducible (the
//! result cache keys on the query string).
//!
//! Two instance tables exist: `RefactoringCommit` (positive examples) and
//! `StableCommit` (negative examples). Both reference the same metric
//! tables through `<table>_id` foreign keys.

use crate::types::Level;

/// A logical table in the metric store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    CommitMetaData,
    ClassMetric,
    MethodMetric,
    VariableMetric,
    FieldMetric,
    ProcessMetrics,
    Project,
    RefactoringCommit,
    StableCommit,
}

impl Table {
    /// Table name as it appears in SQL.
    pub fn name(self) -> &'static str {
        match self {
            Table::CommitMetaData => "CommitMetaData",
            Table::ClassMetric => "ClassMetric",
            Table::MethodMetric => "MethodMetric",
            Table::VariableMetric => "VariableMetric",
            Table::FieldMetric => "FieldMetric",
            Table::ProcessMetrics => "ProcessMetrics",
            Table::Project => "project",
            Table::RefactoringCommit => "RefactoringCommit",
            Table::StableCommit => "StableCommit",
        }
    }

    /// Column on the *instance* table that references this table's `id`.
    ///
    /// Instance tables themselves join on their own `id`.
    pub fn join_key(self) -> &'static str {
        match self {
            Table::CommitMetaData => "commitMetaData_id",
            Table::ClassMetric => "classMetrics_id",
            Table::MethodMetric => "methodMetrics_id",
            Table::VariableMetric => "variableMetrics_id",
            Table::FieldMetric => "fieldMetrics_id",
            Table::ProcessMetrics => "processMetrics_id",
            Table::Project => "project_id",
            Table::RefactoringCommit | Table::StableCommit => "id",
        }
    }

    /// Data columns of this table, in declaration order.
    ///
    /// `id` columns are omitted; they are identical across tables.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Table::CommitMetaData => COMMIT_METADATA_FIELDS,
            Table::ClassMetric => CLASS_METRICS_FIELDS,
            Table::MethodMetric => METHOD_METRICS_FIELDS,
            Table::VariableMetric => VARIABLE_METRICS_FIELDS,
            Table::FieldMetric => FIELD_METRICS_FIELDS,
            Table::ProcessMetrics => PROCESS_METRICS_FIELDS,
            Table::Project => PROJECT_FIELDS,
            Table::RefactoringCommit => REFACTORING_COMMIT_FIELDS,
            Table::StableCommit => STABLE_COMMIT_FIELDS,
        }
    }
}

/// Ordered list of metric tables applicable at the given level, always
/// terminated by the process/authorship metrics table.
///
/// Requesting `Level::None` is a programmer error and panics.
pub fn metrics_for_level(level: Level) -> Vec<(Table, &'static [&'static str])> {
    let tables: &[Table] = match level {
        Level::Class => &[Table::ClassMetric, Table::ProcessMetrics],
        Level::Method => &[Table::ClassMetric, Table::MethodMetric, Table::ProcessMetrics],
        Level::Variable => &[
            Table::ClassMetric,
            Table::MethodMetric,
            Table::VariableMetric,
            Table::ProcessMetrics,
        ],
        Level::Field => &[Table::ClassMetric, Table::FieldMetric, Table::ProcessMetrics],
        Level::Other => &[Table::ClassMetric, Table::ProcessMetrics],
        Level::None => panic!("no metric tables exist for Level::None"),
    };
    tables.iter().map(|&t| (t, t.fields())).collect()
}

/// Stable-level folding: the `StableCommit.level` value used when querying
/// negative examples at the given level.
///
/// `Other` refactorings operate on class-granularity entities (packages and
/// source folders have no finer metrics), so their stable instances are the
/// class-level ones. All other levels map to themselves.
pub fn stable_level(level: Level) -> i64 {
    match level {
        Level::Other => Level::Class.as_i64(),
        other => other.as_i64(),
    }
}

pub const COMMIT_METADATA_FIELDS: &[&str] = &[
    "commitDate",
    "commitId",
    "commitMessage",
    "commitUrl",
    "parentCommitId",
];

pub const CLASS_METRICS_FIELDS: &[&str] = &[
    "classAnonymousClassesQty",
    "classAssignmentsQty",
    "classCbo",
    "classComparisonsQty",
    "classLambdasQty",
    "classLcom",
    "classLoc",
    "classLoopQty",
    "classMathOperationsQty",
    "classMaxNestedBlocks",
    "classNosi",
    "classNumberOfAbstractMethods",
    "classNumberOfDefaultFields",
    "classNumberOfDefaultMethods",
    "classNumberOfFields",
    "classNumberOfFinalFields",
    "classNumberOfFinalMethods",
    "classNumberOfMethods",
    "classNumberOfPrivateFields",
    "classNumberOfPrivateMethods",
    "classNumberOfProtectedFields",
    "classNumberOfProtectedMethods",
    "classNumberOfPublicFields",
    "classNumberOfPublicMethods",
    "classNumberOfStaticFields",
    "classNumberOfStaticMethods",
    "classNumberOfSynchronizedFields",
    "classNumberOfSynchronizedMethods",
    "classNumbersQty",
    "classParenthesizedExpsQty",
    "classReturnQty",
    "classRfc",
    "classStringLiteralsQty",
    "classSubClassesQty",
    "classTryCatchQty",
    "classUniqueWordsQty",
    "classVariablesQty",
    "classWmc",
    "isInnerClass",
];

pub const METHOD_METRICS_FIELDS: &[&str] = &[
    "methodAnonymousClassesQty",
    "methodAssignmentsQty",
    "methodCbo",
    "methodComparisonsQty",
    "methodLambdasQty",
    "methodLoc",
    "methodLoopQty",
    "methodMathOperationsQty",
    "methodMaxNestedBlocks",
    "methodNumbersQty",
    "methodParametersQty",
    "methodParenthesizedExpsQty",
    "methodReturnQty",
    "methodRfc",
    "methodStringLiteralsQty",
    "methodSubClassesQty",
    "methodTryCatchQty",
    "methodUniqueWordsQty",
    "methodVariablesQty",
    "methodWmc",
    "startLine",
];

pub const VARIABLE_METRICS_FIELDS: &[&str] = &["variableAppearances"];

pub const FIELD_METRICS_FIELDS: &[&str] = &["fieldAppearances"];

/// Process and authorship metrics. Also the set the assembler's faulty-row
/// filter inspects for the `-1` sentinel.
pub const PROCESS_METRICS_FIELDS: &[&str] = &[
    "authorOwnership",
    "bugFixCount",
    "qtyMajorAuthors",
    "qtyMinorAuthors",
    "qtyOfAuthors",
    "qtyOfCommits",
    "refactoringsInvolved",
];

pub const PROJECT_FIELDS: &[&str] = &[
    "commitCountThresholds",
    "commits",
    "datasetName",
    "dateOfProcessing",
    "exceptionsCount",
    "finishedDate",
    "gitUrl",
    "isLocal",
    "javaLoc",
    "lastCommitHash",
    "numberOfProductionFiles",
    "numberOfTestFiles",
    "productionLoc",
    "projectName",
    "projectSizeInBytes",
    "testLoc",
];

pub const REFACTORING_COMMIT_FIELDS: &[&str] = &["className", "filePath", "isTest", "level"];

pub const STABLE_COMMIT_FIELDS: &[&str] = &["className", "filePath", "isTest", "level"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_for_level_table_counts() {
        assert_eq!(metrics_for_level(Level::Class).len(), 2);
        assert_eq!(metrics_for_level(Level::Method).len(), 3);
        assert_eq!(metrics_for_level(Level::Variable).len(), 4);
        assert_eq!(metrics_for_level(Level::Field).len(), 3);
        assert_eq!(metrics_for_level(Level::Other).len(), 2);
    }

    #[test]
    fn test_metrics_always_end_with_process_metrics() {
        for level in Level::all() {
            let tables = metrics_for_level(level);
            assert_eq!(
                tables.last().unwrap().0,
                Table::ProcessMetrics,
                "level {} does not end with process metrics",
                level
            );
        }
    }

    #[test]
    fn test_metrics_for_level_is_order_stable() {
        assert_eq!(metrics_for_level(Level::Method), metrics_for_level(Level::Method));
        assert_ne!(metrics_for_level(Level::Method), metrics_for_level(Level::Field));
    }

    #[test]
    #[should_panic(expected = "Level::None")]
    fn test_metrics_for_level_none_panics() {
        metrics_for_level(Level::None);
    }

    #[test]
    fn test_stable_level_folding() {
        assert_eq!(stable_level(Level::Class), 1);
        assert_eq!(stable_level(Level::Method), 2);
        assert_eq!(stable_level(Level::Variable), 3);
        assert_eq!(stable_level(Level::Field), 4);
        // Other folds onto class granularity.
        assert_eq!(stable_level(Level::Other), 1);
    }

    #[test]
    fn test_join_keys() {
        assert_eq!(Table::CommitMetaData.join_key(), "commitMetaData_id");
        assert_eq!(Table::ClassMetric.join_key(), "classMetrics_id");
        assert_eq!(Table::Project.join_key(), "project_id");
        assert_eq!(Table::RefactoringCommit.join_key(), "id");
    }
}
