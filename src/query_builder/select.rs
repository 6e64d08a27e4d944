use crate::error::RdsError;
use crate::escape::{Dialect, escape_id};

use super::predicate::{Where, build_optional_where_with};

/// Sort direction of an [`OrderBy`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Case-insensitive `asc`/`desc`; anything else yields `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Direction::Asc),
            "DESC" => Some(Direction::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` entry: a bare column, or a column with a direction token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Column(String),
    /// The token is normalized with [`Direction::parse`]; unrecognized tokens emit no direction.
    Directed(String, String),
}

impl OrderBy {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        OrderBy::Directed(column.into(), "ASC".to_string())
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        OrderBy::Directed(column.into(), "DESC".to_string())
    }
}

impl From<&str> for OrderBy {
    fn from(column: &str) -> Self {
        OrderBy::Column(column.to_string())
    }
}

impl From<String> for OrderBy {
    fn from(column: String) -> Self {
        OrderBy::Column(column)
    }
}

impl<C: Into<String>, D: Into<String>> From<(C, D)> for OrderBy {
    fn from((column, direction): (C, D)) -> Self {
        OrderBy::Directed(column.into(), direction.into())
    }
}

/// Options for `select`/`get`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub filter: Option<Where>,
    /// Empty selects `*`.
    pub columns: Vec<String>,
    pub orders: Vec<OrderBy>,
    /// Only a positive limit emits `LIMIT`; `offset` is ignored without one.
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectOptions {
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
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn order(mut self, order: impl Into<OrderBy>) -> Self {
        self.orders.push(order.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// `SELECT * FROM t` or `SELECT a, b FROM t`.
#[must_use]
pub fn build_select(table: &str, columns: &[String]) -> String {
    if columns.is_empty() || (columns.len() == 1 && columns[0] == "*") {
        return format!("SELECT * FROM {}", escape_id(table));
    }
    let cols = columns
        .iter()
        .map(|c| escape_id(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {cols} FROM {}", escape_id(table))
}

/// `" ORDER BY ..."`, or empty when there are no orders.
#[must_use]
pub fn build_order_by(orders: &[OrderBy]) -> String {
    if orders.is_empty() {
        return String::new();
    }
    let parts = orders
        .iter()
        .map(|order| match order {
            OrderBy::Column(column) => escape_id(column),
            OrderBy::Directed(column, token) => match Direction::parse(token) {
                Some(direction) => format!("{} {}", escape_id(column), direction.as_sql()),
                None => escape_id(column),
            },
        })
        .collect::<Vec<_>>();
    format!(" ORDER BY {}", parts.join(", "))
}

/// `" LIMIT offset, limit"` when `limit` is positive, otherwise empty.
#[must_use]
pub fn build_limit(limit: Option<u64>, offset: Option<u64>) -> String {
    match limit {
        Some(limit) if limit > 0 => format!(" LIMIT {}, {limit}", offset.unwrap_or(0)),
        _ => String::new(),
    }
}

/// The full `SELECT` for `table` under `options`.
///
/// # Errors
/// Returns `RdsError::Statement` if the where descriptor cannot be rendered.
pub fn build_select_statement(table: &str, options: &SelectOptions) -> Result<String, RdsError> {
    build_select_statement_with(table, options, Dialect::MySql)
}

/// [`build_select_statement`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_select_statement`].
pub fn build_select_statement_with(
    table: &str,
    options: &SelectOptions,
    dialect: Dialect,
) -> Result<String, RdsError> {
    Ok(format!(
        "{}{}{}{}",
        build_select(table, &options.columns),
        build_optional_where_with(options.filter.as_ref(), dialect)?,
        build_order_by(&options.orders),
        build_limit(options.limit, options.offset),
    ))
}

/// `SELECT COUNT(*) as count FROM t` plus the where clause.
///
/// # Errors
/// Returns `RdsError::Statement` if the where descriptor cannot be rendered.
pub fn build_count(table: &str, filter: Option<&Where>) -> Result<String, RdsError> {
    build_count_with(table, filter, Dialect::MySql)
}

/// [`build_count`] with values quoted for `dialect`.
///
/// # Errors
/// Same as [`build_count`].
pub fn build_count_with(
    table: &str,
    filter: Option<&Where>,
    dialect: Dialect,
) -> Result<String, RdsError> {
    Ok(format!(
        "SELECT COUNT(*) as count FROM {}{}",
        escape_id(table),
        build_optional_where_with(filter, dialect)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns() {
        assert_eq!(build_select("users", &[]), "SELECT * FROM `users`");
        assert_eq!(build_select("users", &["*".to_string()]), "SELECT * FROM `users`");
        assert_eq!(
            build_select("users", &["id".to_string(), "name".to_string()]),
            "SELECT `id`, `name` FROM `users`"
        );
    }

    #[test]
    fn order_by_normalizes_direction() {
        let orders = vec![
            OrderBy::from("id"),
            OrderBy::from(("name", "desc")),
            OrderBy::from(("age", "asc")),
            OrderBy::from(("email", "sideways")),
        ];
        assert_eq!(
            build_order_by(&orders),
            " ORDER BY `id`, `name` DESC, `age` ASC, `email`"
        );
        assert_eq!(build_order_by(&[]), "");
    }

    #[test]
    fn limit_requires_positive_limit() {
        assert_eq!(build_limit(Some(10), None), " LIMIT 0, 10");
        assert_eq!(build_limit(Some(10), Some(5)), " LIMIT 5, 10");
        assert_eq!(build_limit(Some(0), Some(5)), "");
        // offset without limit is dropped
        assert_eq!(build_limit(None, Some(5)), "");
    }

    #[test]
    fn full_select() {
        let options = SelectOptions::new()
            .filter(Where::new().eq("type", "doc").in_list("id", [1, 2]))
            .columns(["id", "title"])
            .order(OrderBy::desc("id"))
            .limit(10)
            .offset(20);
        assert_eq!(
            build_select_statement("posts", &options).unwrap(),
            "SELECT `id`, `title` FROM `posts` WHERE `type` = 'doc' AND `id` IN (1, 2) ORDER BY `id` DESC LIMIT 20, 10"
        );
    }

    #[test]
    fn count_statement() {
        assert_eq!(
            build_count("posts", Some(&Where::new().eq("type", "doc"))).unwrap(),
            "SELECT COUNT(*) as count FROM `posts` WHERE `type` = 'doc'"
        );
        assert_eq!(
            build_count("posts", None).unwrap(),
            "SELECT COUNT(*) as count FROM `posts`"
        );
    }
}
