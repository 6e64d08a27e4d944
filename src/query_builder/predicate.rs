use std::fmt;
use std::str::FromStr;

use crate::error::RdsError;
use crate::escape::{Dialect, escape_id};
use crate::types::SqlValue;

/// Comparison operators accepted in [`Condition::Op`] and [`Condition::OpList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    /// `<>`
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `<=>`
    NullSafeEq,
    Like,
    NotLike,
    In,
    NotIn,
    Regexp,
    NotRegexp,
    Is,
    IsNot,
}

impl CompareOp {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::NullSafeEq => "<=>",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
            CompareOp::Regexp => "REGEXP",
            CompareOp::NotRegexp => "NOT REGEXP",
            CompareOp::Is => "IS",
            CompareOp::IsNot => "IS NOT",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for CompareOp {
    type Err = RdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match normalized.to_ascii_uppercase().as_str() {
            "=" => CompareOp::Eq,
            "!=" => CompareOp::NotEq,
            "<>" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "<=>" => CompareOp::NullSafeEq,
            "LIKE" => CompareOp::Like,
            "NOT LIKE" => CompareOp::NotLike,
            "IN" => CompareOp::In,
            "NOT IN" => CompareOp::NotIn,
            "REGEXP" => CompareOp::Regexp,
            "NOT REGEXP" => CompareOp::NotRegexp,
            "IS" => CompareOp::Is,
            "IS NOT" => CompareOp::IsNot,
            _ => {
                return Err(RdsError::Statement(format!(
                    "unsupported comparison operator `{s}`"
                )));
            }
        };
        Ok(op)
    }
}

/// One entry of a [`Where`] descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `col = value` (`col IS NULL` when the value is `Null`)
    Eq(SqlValue),
    /// `col IN (v1, v2, ...)`
    In(Vec<SqlValue>),
    /// `col IS NULL`
    IsNull,
    /// `col <op> value`
    Op(CompareOp, SqlValue),
    /// `(col <op1> v1 AND col <op2> v2 ...)`, always joined with `AND`
    OpList(Vec<(CompareOp, SqlValue)>),
    /// Parenthesized group joined with `AND`
    And(Where),
    /// Parenthesized group joined with `OR`
    Or(Where),
}

impl From<SqlValue> for Condition {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Condition::IsNull,
            SqlValue::List(values) => Condition::In(values),
            other => Condition::Eq(other),
        }
    }
}

const AND_KEY: &str = "AND";
const OR_KEY: &str = "OR";

/// A structured where-clause: column conditions plus nested `AND`/`OR` groups.
///
/// Keys are unique; setting a key again replaces its condition in place.
/// ```rust
/// use rds_middleware::prelude::*;
///
/// let filter = Where::new()
///     .eq("a", 1)
///     .or(Where::new().eq("b", 2).eq("c", 3));
/// assert_eq!(build_where(&filter)?, " WHERE `a` = 1 AND (`b` = 2 OR `c` = 3)");
/// # Ok::<(), RdsError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    entries: Vec<(String, Condition)>,
}

impl Where {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, condition: Condition) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = condition;
        } else {
            self.entries.push((key, condition));
        }
    }

    /// Set a condition under `key`, classifying the value the way a plain
    /// descriptor would: `Null` → `IS NULL`, a list → `IN`, anything else → `=`.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, Condition::from(value.into()));
        self
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, Condition::Eq(value.into()));
        self
    }

    #[must_use]
    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.set(column, Condition::IsNull);
        self
    }

    #[must_use]
    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.set(
            column,
            Condition::In(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    #[must_use]
    pub fn op(mut self, column: impl Into<String>, op: CompareOp, value: impl Into<SqlValue>) -> Self {
        self.set(column, Condition::Op(op, value.into()));
        self
    }

    #[must_use]
    pub fn ops<I, V>(mut self, column: impl Into<String>, conditions: I) -> Self
    where
        I: IntoIterator<Item = (CompareOp, V)>,
        V: Into<SqlValue>,
    {
        self.set(
            column,
            Condition::OpList(
                conditions
                    .into_iter()
                    .map(|(op, value)| (op, value.into()))
                    .collect(),
            ),
        );
        self
    }

    /// Nest `group` under the `AND` key.
    #[must_use]
    pub fn and(mut self, group: Where) -> Self {
        self.set(AND_KEY, Condition::And(group));
        self
    }

    /// Nest `group` under the `OR` key.
    #[must_use]
    pub fn or(mut self, group: Where) -> Self {
        self.set(OR_KEY, Condition::Or(group));
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Condition> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, condition)| condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Render a where descriptor as `" WHERE ..."`, or an empty string when it has no
/// conditions.
///
/// # Errors
/// Returns `RdsError::Statement` for an empty `IN` list or an empty operator list.
pub fn build_where(filter: &Where) -> Result<String, RdsError> {
    build_where_with(filter, Dialect::MySql)
}

/// [`build_where`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_where`].
pub fn build_where_with(filter: &Where, dialect: Dialect) -> Result<String, RdsError> {
    let body = render_group(filter, AND_KEY, dialect)?;
    if body.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {body}"))
    }
}

/// [`build_where`] over an optional descriptor.
///
/// # Errors
/// Same as [`build_where`].
pub fn build_optional_where(filter: Option<&Where>) -> Result<String, RdsError> {
    build_optional_where_with(filter, Dialect::MySql)
}

/// [`build_optional_where`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_where`].
pub fn build_optional_where_with(
    filter: Option<&Where>,
    dialect: Dialect,
) -> Result<String, RdsError> {
    filter.map_or_else(|| Ok(String::new()), |filter| build_where_with(filter, dialect))
}

/// The condition text of `filter` without the leading `WHERE` keyword.
pub(crate) fn render_conditions(filter: &Where, dialect: Dialect) -> Result<String, RdsError> {
    render_group(filter, AND_KEY, dialect)
}

fn render_group(filter: &Where, joiner: &str, dialect: Dialect) -> Result<String, RdsError> {
    let mut fragments = Vec::with_capacity(filter.len());
    for (key, condition) in filter.iter() {
        if let Some(fragment) = render_condition(key, condition, dialect)? {
            fragments.push(fragment);
        }
    }
    Ok(fragments.join(&format!(" {joiner} ")))
}

/// One entry of a group; `None` for a nested group with nothing in it.
fn render_condition(
    key: &str,
    condition: &Condition,
    dialect: Dialect,
) -> Result<Option<String>, RdsError> {
    let id = || escape_id(key);
    let fragment = match condition {
        Condition::And(group) => return render_nested(group, AND_KEY, dialect),
        Condition::Or(group) => return render_nested(group, OR_KEY, dialect),
        Condition::Eq(SqlValue::Null) | Condition::IsNull => format!("{} IS NULL", id()),
        Condition::Eq(SqlValue::List(values)) | Condition::In(values) => {
            if values.is_empty() {
                return Err(RdsError::Statement(format!(
                    "empty IN list for column `{key}`"
                )));
            }
            format!(
                "{} IN ({})",
                id(),
                dialect.escape_value(&SqlValue::List(values.clone()))
            )
        }
        Condition::Eq(value) => format!("{} = {}", id(), dialect.escape_value(value)),
        Condition::Op(op, value) => render_op(&id(), *op, value, dialect),
        Condition::OpList(conditions) => {
            if conditions.is_empty() {
                return Err(RdsError::Statement(format!(
                    "empty operator list for column `{key}`"
                )));
            }
            let id = id();
            let parts = conditions
                .iter()
                .map(|(op, value)| render_op(&id, *op, value, dialect))
                .collect::<Vec<_>>();
            format!("({})", parts.join(" AND "))
        }
    };
    Ok(Some(fragment))
}

fn render_nested(group: &Where, joiner: &str, dialect: Dialect) -> Result<Option<String>, RdsError> {
    let body = render_group(group, joiner, dialect)?;
    Ok((!body.is_empty()).then(|| format!("({body})")))
}

fn render_op(id: &str, op: CompareOp, value: &SqlValue, dialect: Dialect) -> String {
    match value {
        SqlValue::List(_) => format!("{id} {op} ({})", dialect.escape_value(value)),
        other => format!("{id} {op} {}", dialect.escape_value(other)),
    }
}
