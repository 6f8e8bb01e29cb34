//! Deterministic SQL construction for instance retrieval.
//!
//! Every query the pipeline runs is assembled here from structured inputs;
//! callers never pass free-form SQL (beyond pre-validated condition
//! fragments). Two identical requests must produce byte-identical strings,
//! because the result cache keys on the query text — column order follows
//! the schema catalog, filters are appended in a fixed order.
//!
//! Fragments interpolate level integers and refactoring names literally.
//! The caller is trusted; this is an internal batch tool, not a service.

use crate::db::schema::{metrics_for_level, stable_level, Table};
use crate::types::{FileType, Level};

/// INNER JOIN fragment linking `instance` to `table` through the catalog's
/// join key.
pub fn join_clause(instance: Table, table: Table) -> String {
    format!(
        " INNER JOIN {table} ON {instance}.{key} = {table}.id",
        table = table.name(),
        instance = instance.name(),
        key = table.join_key(),
    )
}

/// Condition restricting instances to projects of the named dataset.
pub fn project_filter(instance: Table, dataset: &str) -> String {
    format!(
        "{}.project_id in (select id from project where datasetName = \"{}\")",
        instance.name(),
        dataset
    )
}

/// Restriction to production files, test files, or neither.
fn file_type_filter(instance: Table, file_type: FileType) -> String {
    match file_type.is_test_value() {
        Some(v) => format!(" AND {}.isTest = {}", instance.name(), v),
        None => String::new(),
    }
}

/// Only detected refactorings that passed validation are usable as
/// positive examples. Stable commits carry no validity flag.
fn valid_refactorings_filter(instance: Table) -> String {
    if instance == Table::RefactoringCommit {
        format!(" AND {}.isValid = TRUE", instance.name())
    } else {
        String::new()
    }
}

/// Build a complete select statement for an instance table.
///
/// `fields` pairs each referenced table with the columns to select, in
/// catalog order; tables are joined unless they are the instance itself.
/// With `with_id` the row identifier `db_id` is emitted first, as
/// `CONCAT_WS('.', '<Instance>', <Instance>.id)`, so identifiers stay
/// unique across the two instance tables.
///
/// The `WHERE` keyword appears only when at least one of `conditions` and
/// `dataset` is non-empty, and the two are joined by exactly one `AND`.
pub fn instance_query(
    instance: Table,
    fields: &[(Table, &[&str])],
    conditions: &str,
    dataset: &str,
    order: &str,
    with_id: bool,
) -> String {
    let mut columns = String::new();
    let mut joins = String::new();

    if with_id {
        columns.push_str(&format!(
            "CONCAT_WS('.', '{0}', {0}.id) AS db_id, ",
            instance.name()
        ));
    }
    for &(table, names) in fields {
        if table != instance {
            joins.push_str(&join_clause(instance, table));
        }
        for field in names {
            columns.push_str(table.name());
            columns.push('.');
            columns.push_str(field);
            columns.push_str(", ");
        }
    }
    let columns = columns.trim_end_matches(", ");

    let mut sql = format!("SELECT {} FROM {}{} WHERE ", columns, instance.name(), joins);
    if !conditions.is_empty() {
        if !sql.ends_with(" WHERE ") {
            sql.push_str(" AND ");
        }
        sql.push_str(conditions);
    }
    if !dataset.is_empty() {
        if !sql.ends_with(" WHERE ") {
            sql.push_str(" AND ");
        }
        sql.push_str(&project_filter(instance, dataset));
    }
    if sql.ends_with(" WHERE ") {
        sql.truncate(sql.len() - " WHERE ".len());
    }
    if !order.is_empty() {
        sql.push(' ');
        sql.push_str(order);
    }
    sql
}

/// Shared shape of the two instance-level queries: level filter, validity
/// and file-type filters, optional exact refactoring-name match, metric
/// joins for the level, commit metadata, ordered by commit date.
fn level_query(
    instance: Table,
    level_filter: i64,
    metric_level: Level,
    refactoring: Option<&str>,
    extra_conditions: &str,
    dataset: &str,
    file_type: FileType,
) -> String {
    let mut conditions = format!("{}.level = {}", instance.name(), level_filter);
    conditions.push_str(&valid_refactorings_filter(instance));
    conditions.push_str(&file_type_filter(instance, file_type));
    if let Some(name) = refactoring {
        conditions.push_str(&format!(
            " AND {}.refactoring = \"{}\"",
            Table::RefactoringCommit.name(),
            name
        ));
    }
    if !extra_conditions.is_empty() {
        conditions.push_str(" AND ");
        conditions.push_str(extra_conditions);
    }

    let empty: &[&str] = &[];
    let mut fields: Vec<(Table, &[&str])> = vec![(instance, empty), (Table::CommitMetaData, empty)];
    fields.extend(metrics_for_level(metric_level));

    instance_query(
        instance,
        &fields,
        &conditions,
        dataset,
        "order by CommitMetaData.commitDate",
        true,
    )
}

/// All refactoring instances of the given type and level, with the
/// level-appropriate metrics. An empty `refactoring` selects every type
/// at the level.
pub fn level_refactorings_query(
    level: Level,
    refactoring: &str,
    dataset: &str,
    file_type: FileType,
) -> String {
    let name = (!refactoring.is_empty()).then_some(refactoring);
    level_query(
        Table::RefactoringCommit,
        level.as_i64(),
        level,
        name,
        "",
        dataset,
        file_type,
    )
}

/// All stable (non-refactored) instances at the given level and commit
/// threshold. The level filter goes through [`stable_level`] folding.
pub fn level_stable_query(
    level: Level,
    commit_threshold: i64,
    dataset: &str,
    file_type: FileType,
) -> String {
    let threshold_condition = format!(
        "{}.commitThreshold = {}",
        Table::StableCommit.name(),
        commit_threshold
    );
    level_query(
        Table::StableCommit,
        stable_level(level),
        level,
        None,
        &threshold_condition,
        dataset,
        file_type,
    )
}

/// Instance counts per refactoring type at the given level.
pub fn level_refactorings_count_query(level: Level, dataset: &str) -> String {
    let refactoring_field: &[&str] = &["refactoring"];
    let conditions = format!(
        "{0}.level = {1}{2}",
        Table::RefactoringCommit.name(),
        level.as_i64(),
        valid_refactorings_filter(Table::RefactoringCommit)
    );
    let inner = instance_query(
        Table::RefactoringCommit,
        &[(Table::RefactoringCommit, refactoring_field)],
        &conditions,
        dataset,
        "",
        false,
    );
    format!(
        "SELECT refactoring, count(*) FROM ({}) t group by refactoring order by count(*) desc",
        inner
    )
}

/// Distinct refactoring type names present in the store.
pub fn refactoring_types_query(dataset: &str) -> String {
    let refactoring_field: &[&str] = &["refactoring"];
    let inner = instance_query(
        Table::RefactoringCommit,
        &[(Table::RefactoringCommit, refactoring_field)],
        "",
        dataset,
        "",
        false,
    );
    format!("SELECT DISTINCT refactoring FROM ({}) t", inner)
}

/// Instance counts per (level, refactoring) across all levels.
pub fn refactoring_levels_query(dataset: &str) -> String {
    let selected: &[&str] = &["refactoring", "level"];
    let inner = instance_query(
        Table::RefactoringCommit,
        &[(Table::RefactoringCommit, selected)],
        "RefactoringCommit.isValid = TRUE",
        dataset,
        "",
        false,
    );
    format!(
        "SELECT refactoring, count(*) total FROM ({}) t group by `level`, refactoring order by count(*) desc",
        inner
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_clause() {
        assert_eq!(
            join_clause(Table::RefactoringCommit, Table::CommitMetaData),
            " INNER JOIN CommitMetaData ON RefactoringCommit.commitMetaData_id = CommitMetaData.id"
        );
        assert_eq!(
            join_clause(Table::RefactoringCommit, Table::ProcessMetrics),
            " INNER JOIN ProcessMetrics ON RefactoringCommit.processMetrics_id = ProcessMetrics.id"
        );
        assert_eq!(
            join_clause(Table::StableCommit, Table::Project),
            " INNER JOIN project ON StableCommit.project_id = project.id"
        );
    }

    fn small_fields() -> Vec<(Table, &'static [&'static str])> {
        let rc: &[&str] = &["className"];
        let cm: &[&str] = &["commitId"];
        vec![(Table::RefactoringCommit, rc), (Table::CommitMetaData, cm)]
    }

    #[test]
    fn test_instance_query_no_dangling_where() {
        let sql = instance_query(
            Table::RefactoringCommit,
            &small_fields(),
            "",
            "",
            "",
            false,
        );
        assert_eq!(
            sql,
            "SELECT RefactoringCommit.className, CommitMetaData.commitId \
             FROM RefactoringCommit \
             INNER JOIN CommitMetaData ON RefactoringCommit.commitMetaData_id = CommitMetaData.id"
        );
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_instance_query_conditions_only() {
        let sql = instance_query(
            Table::RefactoringCommit,
            &small_fields(),
            "CommitMetaData.parentCommitId != null",
            "",
            "",
            false,
        );
        assert!(sql.ends_with(" WHERE CommitMetaData.parentCommitId != null"));
        assert_eq!(sql.matches("WHERE").count(), 1);
    }

    #[test]
    fn test_instance_query_dataset_only() {
        let sql = instance_query(Table::RefactoringCommit, &small_fields(), "", "github", "", false);
        assert!(sql.ends_with(
            " WHERE RefactoringCommit.project_id in \
             (select id from project where datasetName = \"github\")"
        ));
        // One outer WHERE; the dataset subselect uses lowercase `where`.
        assert_eq!(sql.matches("WHERE").count(), 1);
        assert_eq!(sql.matches("where").count(), 1);
        assert!(!sql.contains(" AND "));
    }

    #[test]
    fn test_instance_query_exactly_one_and_between_groups() {
        let sql = instance_query(
            Table::RefactoringCommit,
            &small_fields(),
            "CommitMetaData.parentCommitId != null",
            "github",
            "order by CommitMetaData.commitDate",
            false,
        );
        assert_eq!(sql.matches(" AND ").count(), 1);
        assert!(sql.ends_with(" order by CommitMetaData.commitDate"));
    }

    #[test]
    fn test_instance_query_with_id_prefix() {
        let sql = instance_query(Table::StableCommit, &small_fields(), "", "", "", true);
        assert!(sql.starts_with("SELECT CONCAT_WS('.', 'StableCommit', StableCommit.id) AS db_id, "));
    }

    #[test]
    fn test_level_refactorings_query_extract_method_scenario() {
        let sql = level_refactorings_query(
            Level::Method,
            "Extract Method",
            "github",
            FileType::OnlyProduction,
        );

        assert!(sql.starts_with(
            "SELECT CONCAT_WS('.', 'RefactoringCommit', RefactoringCommit.id) AS db_id, "
        ));
        // Method level joins commit metadata plus class, method and process metrics.
        for join in [
            "INNER JOIN CommitMetaData ON RefactoringCommit.commitMetaData_id = CommitMetaData.id",
            "INNER JOIN ClassMetric ON RefactoringCommit.classMetrics_id = ClassMetric.id",
            "INNER JOIN MethodMetric ON RefactoringCommit.methodMetrics_id = MethodMetric.id",
            "INNER JOIN ProcessMetrics ON RefactoringCommit.processMetrics_id = ProcessMetrics.id",
        ] {
            assert!(sql.contains(join), "missing join: {}", join);
        }
        assert!(!sql.contains("VariableMetric"));
        assert!(!sql.contains("FieldMetric"));

        assert!(sql.contains("RefactoringCommit.level = 2"));
        assert!(sql.contains("RefactoringCommit.isValid = TRUE"));
        assert!(sql.contains("RefactoringCommit.isTest = 0"));
        assert!(sql.contains("RefactoringCommit.refactoring = \"Extract Method\""));
        assert!(sql.contains(
            "RefactoringCommit.project_id in (select id from project where datasetName = \"github\")"
        ));
        assert!(sql.ends_with(" order by CommitMetaData.commitDate"));

        // Column order follows the catalog: class metrics, then method
        // metrics, then process metrics.
        let class_pos = sql.find("ClassMetric.classWmc").unwrap();
        let method_pos = sql.find("MethodMetric.methodLoc").unwrap();
        let process_pos = sql.find("ProcessMetrics.authorOwnership").unwrap();
        assert!(class_pos < method_pos && method_pos < process_pos);
    }

    #[test]
    fn test_level_queries_are_byte_deterministic() {
        let a = level_refactorings_query(Level::Variable, "Rename Variable", "github", FileType::TestAndProduction);
        let b = level_refactorings_query(Level::Variable, "Rename Variable", "github", FileType::TestAndProduction);
        assert_eq!(a, b);
    }

    #[test]
    fn test_level_stable_query_threshold_and_folding() {
        let sql = level_stable_query(Level::Method, 50, "github", FileType::OnlyProduction);
        assert!(sql.contains("StableCommit.level = 2"));
        assert!(sql.contains("StableCommit.commitThreshold = 50"));
        assert!(!sql.contains("isValid"));
        assert!(sql.ends_with(" order by CommitMetaData.commitDate"));

        // Other-level refactorings read class-level stable instances.
        let folded = level_stable_query(Level::Other, 15, "", FileType::TestAndProduction);
        assert!(folded.contains("StableCommit.level = 1"));
    }

    #[test]
    fn test_count_query_wraps_subquery() {
        let sql = level_refactorings_count_query(Level::Method, "github");
        assert!(sql.starts_with("SELECT refactoring, count(*) FROM (SELECT RefactoringCommit.refactoring FROM RefactoringCommit"));
        assert!(sql.contains("RefactoringCommit.level = 2"));
        assert!(sql.contains("RefactoringCommit.isValid = TRUE"));
        assert!(sql.ends_with(") t group by refactoring order by count(*) desc"));
    }

    #[test]
    fn test_refactoring_types_query() {
        let sql = refactoring_types_query("github");
        assert!(sql.starts_with("SELECT DISTINCT refactoring FROM (SELECT RefactoringCommit.refactoring FROM RefactoringCommit"));
        assert!(sql.ends_with(") t"));
    }
}
