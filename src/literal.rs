use std::fmt;

/// Raw SQL text that the escaper emits verbatim instead of quoting.
///
/// ```rust
/// use rds_middleware::prelude::*;
///
/// assert_eq!(escape_value(&Literal::now().into()), "now()");
/// assert_eq!(escape_value(&"now()".into()), "'now()'");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal(String);

impl Literal {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// `now()`
    #[must_use]
    pub fn now() -> Self {
        Self::new("now()")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
