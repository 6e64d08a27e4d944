use crate::error::RdsError;
use crate::escape::{Dialect, escape_id};
use crate::types::{Row, SqlValue};

use super::predicate::{
    Condition, Where, build_optional_where_with, build_where_with, render_conditions,
};

const PRIMARY_KEY: &str = "id";

/// Options for `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// Defaults to `id = row.id` when absent or empty.
    pub filter: Option<Where>,
    /// Columns to SET; defaults to every column of the row.
    pub columns: Option<Vec<String>>,
}

impl UpdateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// One entry of an `update_rows` batch.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateRow {
    /// A row carrying its own `id`; the id becomes the row's condition.
    Keyed(Row),
    /// Explicit payload and condition. An empty `filter` falls back to `row.id`.
    Explicit { row: Row, filter: Where },
}

impl UpdateRow {
    #[must_use]
    pub fn keyed(row: Row) -> Self {
        UpdateRow::Keyed(row)
    }

    #[must_use]
    pub fn explicit(row: Row, filter: Where) -> Self {
        UpdateRow::Explicit { row, filter }
    }

    /// Split into `(row, filter, id_shortcut)`.
    fn resolve(&self) -> Result<(&Row, Where, bool), RdsError> {
        let (row, filter) = match self {
            UpdateRow::Keyed(row) => (row, None),
            UpdateRow::Explicit { row, filter } => (row, Some(filter)),
        };
        match filter {
            Some(filter) if !filter.is_empty() => Ok((row, filter.clone(), false)),
            _ => match row.get(PRIMARY_KEY) {
                Some(id) => Ok((row, Where::new().with(PRIMARY_KEY, id.clone()), true)),
                None => Err(RdsError::Statement(
                    "Can not auto detect updateRows condition, set an explicit filter, or make sure the row has an id"
                        .to_string(),
                )),
            },
        }
    }
}

impl From<Row> for UpdateRow {
    fn from(row: Row) -> Self {
        UpdateRow::Keyed(row)
    }
}

/// Multi-row `INSERT INTO t(cols) VALUES (...), (...)`.
///
/// Columns default to the first row's columns; a row missing a column inserts `NULL`.
///
/// # Errors
/// Returns `RdsError::Statement` when there are no rows or no columns.
pub fn build_insert(table: &str, rows: &[Row], columns: Option<&[String]>) -> Result<String, RdsError> {
    build_insert_with(table, rows, columns, Dialect::MySql)
}

/// [`build_insert`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_insert`].
pub fn build_insert_with(
    table: &str,
    rows: &[Row],
    columns: Option<&[String]>,
    dialect: Dialect,
) -> Result<String, RdsError> {
    let Some(first) = rows.first() else {
        return Err(RdsError::Statement(format!(
            "Cannot insert empty rows into `{table}`"
        )));
    };
    let columns: Vec<String> = match columns {
        Some(columns) => columns.to_vec(),
        None => first.columns().map(str::to_string).collect(),
    };
    if columns.is_empty() {
        return Err(RdsError::Statement(format!(
            "Cannot insert into `{table}` without columns"
        )));
    }

    let values = rows
        .iter()
        .map(|row| {
            let items = columns
                .iter()
                .map(|column| dialect.escape_value(row.get(column).unwrap_or(&SqlValue::Null)))
                .collect::<Vec<_>>();
            format!("({})", items.join(", "))
        })
        .collect::<Vec<_>>();

    let column_list = columns
        .iter()
        .map(|c| escape_id(c))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {}({column_list}) VALUES{}",
        escape_id(table),
        values.join(", ")
    ))
}

/// `UPDATE t SET a = 1, b = 2 WHERE ...`.
///
/// # Errors
/// Returns `RdsError::Statement` when no condition can be derived (no `filter` and no
/// `id` column), when there is nothing to set, or when the filter cannot be rendered.
pub fn build_update(table: &str, row: &Row, options: &UpdateOptions) -> Result<String, RdsError> {
    build_update_with(table, row, options, Dialect::MySql)
}

/// [`build_update`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_update`].
pub fn build_update_with(
    table: &str,
    row: &Row,
    options: &UpdateOptions,
    dialect: Dialect,
) -> Result<String, RdsError> {
    let filter = match options.filter.as_ref() {
        Some(filter) if !filter.is_empty() => filter.clone(),
        _ => match row.get(PRIMARY_KEY) {
            Some(id) => Where::new().with(PRIMARY_KEY, id.clone()),
            None => {
                return Err(RdsError::Statement(
                    "Can not auto detect update condition, set options.filter, or make sure the row has an id"
                        .to_string(),
                ));
            }
        },
    };

    let columns: Vec<&str> = match options.columns.as_ref() {
        Some(columns) => columns.iter().map(String::as_str).collect(),
        None => row.columns().collect(),
    };
    if columns.is_empty() {
        return Err(RdsError::Statement(format!(
            "Cannot update `{table}` without columns"
        )));
    }

    let sets = columns
        .iter()
        .map(|column| {
            format!(
                "{} = {}",
                escape_id(column),
                dialect.escape_value(row.get(column).unwrap_or(&SqlValue::Null))
            )
        })
        .collect::<Vec<_>>();
    Ok(format!(
        "UPDATE {} SET {}{}",
        escape_id(table),
        sets.join(", "),
        build_where_with(&filter, dialect)?
    ))
}

struct CaseColumn {
    name: String,
    /// `(row index, value)` for the rows that set this column.
    arms: Vec<(usize, SqlValue)>,
}

/// Bulk update of several rows with one `CASE` expression per column.
///
/// ```text
/// UPDATE `t` SET
///   `name` = CASE WHEN `id` = 1 THEN 'a' WHEN `id` = 2 THEN `name` ELSE `name` END,
///   `email` = CASE WHEN `id` = 1 THEN `email` WHEN `id` = 2 THEN 'b@x' ELSE `email` END
/// WHERE `id` IN (1, 2)
/// ```
///
/// Every row contributes its own condition, so rows with different where shapes can share a
/// batch. A row that omits a column keeps that column's current value. The outer WHERE
/// unions the equality/IN values of the keys every row's condition has in common.
///
/// # Errors
/// Returns `RdsError::Statement` for an empty batch, a row without a derivable condition,
/// or a batch with nothing to set. Validation finishes before any SQL is assembled.
pub fn build_update_rows(table: &str, batch: &[UpdateRow]) -> Result<String, RdsError> {
    build_update_rows_with(table, batch, Dialect::MySql)
}

/// [`build_update_rows`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_update_rows`].
pub fn build_update_rows_with(
    table: &str,
    batch: &[UpdateRow],
    dialect: Dialect,
) -> Result<String, RdsError> {
    if batch.is_empty() {
        return Err(RdsError::Statement(format!(
            "updateRows for `{table}` needs at least one row"
        )));
    }

    let resolved = batch
        .iter()
        .map(UpdateRow::resolve)
        .collect::<Result<Vec<_>, _>>()?;

    let mut conditions = Vec::with_capacity(resolved.len());
    let mut columns: Vec<CaseColumn> = Vec::new();
    for (index, (row, filter, id_shortcut)) in resolved.iter().enumerate() {
        conditions.push(render_conditions(filter, dialect)?);
        for (column, value) in row.iter() {
            if *id_shortcut && column == PRIMARY_KEY {
                continue;
            }
            match columns.iter_mut().find(|c| c.name == column) {
                Some(case) => case.arms.push((index, value.clone())),
                None => columns.push(CaseColumn {
                    name: column.to_string(),
                    arms: vec![(index, value.clone())],
                }),
            }
        }
    }
    if columns.is_empty() {
        return Err(RdsError::Statement(format!(
            "updateRows for `{table}` has no columns to set"
        )));
    }

    let sets = columns
        .iter()
        .map(|case| {
            let id = escape_id(&case.name);
            let whens = (0..conditions.len())
                .map(|index| {
                    let then = case
                        .arms
                        .iter()
                        .find(|(arm, _)| *arm == index)
                        .map_or_else(|| id.clone(), |(_, value)| dialect.escape_value(value));
                    format!("WHEN {} THEN {then}", conditions[index])
                })
                .collect::<Vec<_>>();
            format!("{id} = CASE {} ELSE {id} END", whens.join(" "))
        })
        .collect::<Vec<_>>();

    let filters = resolved.iter().map(|(_, filter, _)| filter).collect::<Vec<_>>();
    let outer = union_filter(&filters);
    Ok(format!(
        "UPDATE {} SET {}{}",
        escape_id(table),
        sets.join(", "),
        build_where_with(&outer, dialect)?
    ))
}

/// `key IN (...)` over every key that all filters share with an equality or IN condition.
fn union_filter(filters: &[&Where]) -> Where {
    let mut outer = Where::new();
    let Some(first) = filters.first() else {
        return outer;
    };
    'keys: for (key, _) in first.iter() {
        let mut values: Vec<SqlValue> = Vec::new();
        for filter in filters {
            let candidates = match filter.get(key) {
                Some(Condition::Eq(value)) if !value.is_null() => vec![value.clone()],
                Some(Condition::In(list)) => list.clone(),
                _ => continue 'keys,
            };
            for value in candidates {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        outer.set(key, Condition::In(values));
    }
    outer
}

/// `DELETE FROM t` plus an optional where clause. No filter deletes every row.
///
/// # Errors
/// Returns `RdsError::Statement` if the where descriptor cannot be rendered.
pub fn build_delete(table: &str, filter: Option<&Where>) -> Result<String, RdsError> {
    build_delete_with(table, filter, Dialect::MySql)
}

/// [`build_delete`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_delete`].
pub fn build_delete_with(
    table: &str,
    filter: Option<&Where>,
    dialect: Dialect,
) -> Result<String, RdsError> {
    Ok(format!(
        "DELETE FROM {}{}",
        escape_id(table),
        build_optional_where_with(filter, dialect)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use crate::query_builder::predicate::CompareOp;

    fn user(id: i64, name: &str) -> Row {
        Row::new().with("id", id).with("name", name)
    }

    #[test]
    fn insert_single_and_many() {
        let sql = build_insert("users", &[user(1, "a")], None).unwrap();
        assert_eq!(sql, "INSERT INTO `users`(`id`, `name`) VALUES(1, 'a')");

        let rows = vec![user(1, "a"), Row::new().with("id", 2)];
        let sql = build_insert("users", &rows, None).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `users`(`id`, `name`) VALUES(1, 'a'), (2, NULL)"
        );
    }

    #[test]
    fn insert_with_columns_and_literal() {
        let row = user(1, "a").with("created_at", Literal::now());
        let columns = vec!["name".to_string(), "created_at".to_string()];
        let sql = build_insert("users", &[row], Some(&columns)).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `users`(`name`, `created_at`) VALUES('a', now())"
        );
    }

    #[test]
    fn insert_rejects_empty() {
        assert!(matches!(build_insert("users", &[], None), Err(RdsError::Statement(_))));
        assert!(matches!(
            build_insert("users", &[Row::new()], None),
            Err(RdsError::Statement(_))
        ));
    }

    #[test]
    fn update_by_id_shortcut() {
        let row = user(1, "a").with("updated_at", Literal::now());
        let sql = build_update("users", &row, &UpdateOptions::new()).unwrap();
        assert_eq!(
            sql,
            "UPDATE `users` SET `id` = 1, `name` = 'a', `updated_at` = now() WHERE `id` = 1"
        );
    }

    #[test]
    fn id_shortcut_with_a_list_uses_in() {
        let row = Row::new().with("id", vec![1, 2]).with("name", "x");
        let sql = build_update_rows("users", &[UpdateRow::keyed(row)]).unwrap();
        assert_eq!(
            sql,
            "UPDATE `users` SET `name` = CASE WHEN `id` IN (1, 2) THEN 'x' ELSE `name` END WHERE `id` IN (1, 2)"
        );
    }

    #[test]
    fn ansi_dialect_doubles_quotes_in_values() {
        let sql = build_insert_with("users", &[user(9, "o'brien")], None, Dialect::Ansi).unwrap();
        assert_eq!(sql, "INSERT INTO `users`(`id`, `name`) VALUES(9, 'o''brien')");

        let sql = build_update_with(
            "users",
            &Row::new().with("name", "a\\b"),
            &UpdateOptions::new().filter(Where::new().eq("name", "it's")),
            Dialect::Ansi,
        )
        .unwrap();
        assert_eq!(sql, "UPDATE `users` SET `name` = 'a\\b' WHERE `name` = 'it''s'");

        let sql = build_delete_with("users", Some(&Where::new().eq("name", "x'y")), Dialect::Ansi)
            .unwrap();
        assert_eq!(sql, "DELETE FROM `users` WHERE `name` = 'x''y'");
    }

    #[test]
    fn update_with_filter_and_columns() {
        let row = Row::new().with("name", "b").with("email", "b@x");
        let options = UpdateOptions::new()
            .filter(Where::new().eq("name", "a"))
            .columns(["email"]);
        let sql = build_update("users", &row, &options).unwrap();
        assert_eq!(sql, "UPDATE `users` SET `email` = 'b@x' WHERE `name` = 'a'");
    }

    #[test]
    fn update_without_condition_fails() {
        let err = build_update("users", &Row::new(), &UpdateOptions::new()).unwrap_err();
        assert!(err.to_string().contains("Can not auto detect update condition"));

        let options = UpdateOptions::new().filter(Where::new());
        let err = build_update("users", &Row::new().with("name", "a"), &options).unwrap_err();
        assert!(matches!(err, RdsError::Statement(_)));
    }

    #[test]
    fn update_rows_fills_missing_columns_with_current_value() {
        let batch = vec![
            UpdateRow::keyed(user(1, "a").with("email", "a@x")),
            UpdateRow::keyed(Row::new().with("id", 2).with("email", "b@x")),
        ];
        let sql = build_update_rows("users", &batch).unwrap();
        assert_eq!(
            sql,
            "UPDATE `users` SET \
             `name` = CASE WHEN `id` = 1 THEN 'a' WHEN `id` = 2 THEN `name` ELSE `name` END, \
             `email` = CASE WHEN `id` = 1 THEN 'a@x' WHEN `id` = 2 THEN 'b@x' ELSE `email` END \
             WHERE `id` IN (1, 2)"
        );
    }

    #[test]
    fn update_rows_with_explicit_compound_filters() {
        let batch = vec![
            UpdateRow::explicit(
                Row::new().with("score", 10),
                Where::new().eq("tenant", "t1").eq("uid", 7),
            ),
            UpdateRow::explicit(
                Row::new().with("score", 20),
                Where::new().eq("tenant", "t2").eq("uid", 7),
            ),
        ];
        let sql = build_update_rows("scores", &batch).unwrap();
        assert_eq!(
            sql,
            "UPDATE `scores` SET `score` = CASE \
             WHEN `tenant` = 't1' AND `uid` = 7 THEN 10 \
             WHEN `tenant` = 't2' AND `uid` = 7 THEN 20 ELSE `score` END \
             WHERE `tenant` IN ('t1', 't2') AND `uid` IN (7)"
        );
    }

    #[test]
    fn update_rows_outer_filter_skips_keys_not_shared() {
        let batch = vec![
            UpdateRow::explicit(Row::new().with("n", 1), Where::new().eq("id", 1)),
            UpdateRow::explicit(
                Row::new().with("n", 2),
                Where::new().eq("id", 2).op("age", CompareOp::Gt, 3),
            ),
        ];
        let sql = build_update_rows("t", &batch).unwrap();
        assert!(sql.ends_with(" WHERE `id` IN (1, 2)"), "{sql}");
    }

    #[test]
    fn update_rows_rejects_rows_without_condition() {
        let batch = vec![
            UpdateRow::keyed(user(1, "a")),
            UpdateRow::keyed(Row::new().with("name", "b")),
        ];
        let err = build_update_rows("users", &batch).unwrap_err();
        assert!(err.to_string().contains("Can not auto detect updateRows condition"));
        assert!(matches!(build_update_rows("users", &[]), Err(RdsError::Statement(_))));
    }

    #[test]
    fn delete_with_and_without_filter() {
        assert_eq!(build_delete("users", None).unwrap(), "DELETE FROM `users`");
        assert_eq!(
            build_delete("users", Some(&Where::new().eq("id", 1))).unwrap(),
            "DELETE FROM `users` WHERE `id` = 1"
        );
    }
}
