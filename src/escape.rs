//! Escaping for values and identifiers, plus placeholder formatting.
//!
//! The free functions use MySQL quoting; [`Dialect`] selects another backend's.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::{Params, SqlValue};

static POSITIONAL_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?+").expect("static placeholder pattern"));
static NAMED_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\w+)").expect("static placeholder pattern"));

/// How a backend reads string literals.
///
/// Identifiers are back-tick quoted in every dialect; only value quoting differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Backslash escapes inside single quotes.
    #[default]
    MySql,
    /// Standard SQL strings: `'` is doubled and backslash is an ordinary character.
    Ansi,
}

impl Dialect {
    /// Render a value as a SQL literal.
    ///
    /// `Null` and non-finite floats become `NULL`, lists become comma-separated items
    /// and [`Literal`](crate::Literal)s pass through unchanged.
    #[must_use]
    pub fn escape_value(self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) if f.is_finite() => f.to_string(),
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Text(s) => self.escape_string(s),
            SqlValue::Timestamp(ts) => {
                self.escape_string(&ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            }
            SqlValue::Json(json) => self.escape_string(&json.to_string()),
            SqlValue::Blob(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2 + 3);
                out.push_str("X'");
                for byte in bytes {
                    let _ = write!(out, "{byte:02x}");
                }
                out.push('\'');
                out
            }
            SqlValue::List(items) => items
                .iter()
                .map(|item| match item {
                    SqlValue::List(_) => format!("({})", self.escape_value(item)),
                    other => self.escape_value(other),
                })
                .collect::<Vec<_>>()
                .join(", "),
            SqlValue::Literal(literal) => literal.as_str().to_string(),
        }
    }

    fn escape_string(self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        match self {
            Dialect::MySql => {
                for ch in s.chars() {
                    match ch {
                        '\0' => out.push_str("\\0"),
                        '\x08' => out.push_str("\\b"),
                        '\t' => out.push_str("\\t"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\x1a' => out.push_str("\\Z"),
                        '"' => out.push_str("\\\""),
                        '\'' => out.push_str("\\'"),
                        '\\' => out.push_str("\\\\"),
                        other => out.push(other),
                    }
                }
            }
            Dialect::Ansi => out.push_str(&s.replace('\'', "''")),
        }
        out.push('\'');
        out
    }

    /// [`format`] with values rendered for this dialect.
    #[must_use]
    pub fn format(self, sql: &str, params: &Params) -> String {
        match params {
            Params::None => sql.to_string(),
            Params::Positional(values) => self.format_positional(sql, values),
            Params::Named(values) => NAMED_PLACEHOLDER
                .replace_all(sql, |caps: &Captures<'_>| match values.get(&caps[1]) {
                    Some(value) => self.escape_value(value),
                    None => caps[0].to_string(),
                })
                .into_owned(),
        }
    }

    fn format_positional(self, sql: &str, values: &[SqlValue]) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut last = 0;
        let mut next_value = values.iter();
        for placeholder in POSITIONAL_PLACEHOLDER.find_iter(sql) {
            let len = placeholder.as_str().len();
            if len > 2 {
                continue;
            }
            let Some(value) = next_value.next() else {
                break;
            };
            out.push_str(&sql[last..placeholder.start()]);
            if len == 2 {
                out.push_str(&escape_id_value(value));
            } else {
                out.push_str(&self.escape_value(value));
            }
            last = placeholder.end();
        }
        out.push_str(&sql[last..]);
        out
    }
}

/// Render a value as a MySQL literal; see [`Dialect::escape_value`].
///
/// Strings are single-quoted with backslash escapes.
#[must_use]
pub fn escape_value(value: &SqlValue) -> String {
    Dialect::MySql.escape_value(value)
}

/// Back-tick quote an identifier; `table.column` becomes `` `table`.`column` ``.
#[must_use]
pub fn escape_id(name: &str) -> String {
    escape_id_with(name, false)
}

/// Back-tick quote an identifier, optionally treating dots as part of the name.
#[must_use]
pub fn escape_id_with(name: &str, forbid_qualified: bool) -> String {
    let doubled = name.replace('`', "``");
    if forbid_qualified {
        format!("`{doubled}`")
    } else {
        format!("`{}`", doubled.replace('.', "`.`"))
    }
}

fn escape_id_value(value: &SqlValue) -> String {
    match value {
        SqlValue::List(items) => items
            .iter()
            .map(escape_id_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => escape_id(&other.to_plain_string()),
    }
}

/// Substitute placeholders in `sql`.
///
/// Positional params fill `?` with escaped values and `??` with escaped identifiers in
/// order of appearance; substitution stops once the values run out. Named params fill
/// `:name`, leaving names without a value untouched.
///
/// ```rust
/// use rds_middleware::prelude::*;
///
/// let sql = format("SELECT * FROM ?? WHERE id = ?", &Params::positional(["users"]));
/// assert_eq!(sql, "SELECT * FROM `users` WHERE id = ?");
///
/// let sql = format(
///     "SELECT * FROM t WHERE name = :name AND kind = :kind",
///     &Params::named([("name", "o'k")]),
/// );
/// assert_eq!(sql, "SELECT * FROM t WHERE name = 'o\\'k' AND kind = :kind");
/// ```
#[must_use]
pub fn format(sql: &str, params: &Params) -> String {
    Dialect::MySql.format(sql, params)
}
