use crate::error::RdsError;
use crate::escape::escape_id;

const LOCK_TYPES: &[&str] = &["READ", "WRITE", "READ LOCAL", "LOW_PRIORITY WRITE"];

/// One `LOCK TABLES` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTableOption {
    pub table_name: String,
    /// One of `READ`, `WRITE`, `READ LOCAL`, `LOW_PRIORITY WRITE` (any case).
    pub lock_type: String,
    pub table_alias: Option<String>,
}

impl LockTableOption {
    #[must_use]
    pub fn new(table_name: impl Into<String>, lock_type: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            lock_type: lock_type.into(),
            table_alias: None,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.table_alias = Some(alias.into());
        self
    }
}

/// `LOCK TABLES t1 [AS a1] type1, t2 ...`.
///
/// # Errors
/// Returns `RdsError::Statement` for an empty list, a missing table name or lock type, or
/// a lock type outside the allow-list.
pub fn build_lock_tables(options: &[LockTableOption]) -> Result<String, RdsError> {
    if options.is_empty() {
        return Err(RdsError::Statement("Cannot lock empty tables.".to_string()));
    }
    let mut entries = Vec::with_capacity(options.len());
    for option in options {
        if option.table_name.trim().is_empty() {
            return Err(RdsError::Statement(
                "No table_name provided while trying to lock table".to_string(),
            ));
        }
        if option.lock_type.trim().is_empty() {
            return Err(RdsError::Statement(format!(
                "No lock_type provided while trying to lock table `{}`",
                option.table_name
            )));
        }
        let lock_type = option.lock_type.to_ascii_uppercase();
        if !LOCK_TYPES.contains(&lock_type.as_str()) {
            return Err(RdsError::Statement(format!(
                "lock_type provided while trying to lock table `{}` must be one of the following(CASE INSENSITIVE):\n`READ` | `WRITE` | `READ LOCAL` | `LOW_PRIORITY WRITE`",
                option.table_name
            )));
        }
        let mut entry = escape_id(&option.table_name);
        if let Some(alias) = option.table_alias.as_deref().filter(|a| !a.is_empty()) {
            entry.push_str(" AS ");
            entry.push_str(&escape_id(alias));
        }
        entry.push(' ');
        entry.push_str(&lock_type);
        entries.push(entry);
    }
    Ok(format!("LOCK TABLES {}", entries.join(", ")))
}

/// `UNLOCK TABLES`
#[must_use]
pub fn build_unlock_tables() -> String {
    "UNLOCK TABLES".to_string()
}
