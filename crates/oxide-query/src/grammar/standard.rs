//! ANSI-leaning grammar using only the provided defaults.

use super::Grammar;

/// Standard SQL grammar.
#[derive(Debug, Default, Clone)]
pub struct StandardGrammar {
    table_prefix: String,
}

impl StandardGrammar {
    /// Creates a grammar without a table prefix.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table_prefix: String::new(),
        }
    }

    /// Creates a grammar with a table prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
        }
    }
}

impl Grammar for StandardGrammar {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_wraps_with_double_quotes() {
        let grammar = StandardGrammar::new();
        assert_eq!(grammar.wrap("users.name"), "\"users\".\"name\"");
        assert_eq!(grammar.wrap("users.*"), "\"users\".*");
        assert_eq!(grammar.wrap("name as n"), "\"name\" AS \"n\"");
    }

    #[test]
    fn test_prefix_applies_to_tables_and_aliases() {
        let grammar = StandardGrammar::with_prefix("app_");
        assert_eq!(grammar.wrap_table("users as u"), "\"app_users\" AS \"app_u\"");
        assert_eq!(grammar.wrap("users.id"), "\"app_users\".\"id\"");
        assert_eq!(grammar.wrap_table("audit.logs"), "\"audit\".\"app_logs\"");
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let grammar = StandardGrammar::new();
        assert_eq!(grammar.wrap_value("we\"ird"), "\"we\"\"ird\"");
    }
}
