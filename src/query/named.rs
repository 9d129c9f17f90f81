//! Named-parameter query parsing and binding
//!
//! Query templates use human-readable `:name` placeholders; backends only
//! understand positional ones. [`NamedQuery::parse`] rewrites the text and
//! remembers, per name, every 1-based position where it appeared, so a
//! single bind call can fill all occurrences. The scan tracks quote state so
//! parameter-like text inside string literals, and bare colons in SQL
//! operators, pass through untouched.

use crate::backend::{Connection, Rows, Statement};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Immutable parsed form of a named-parameter query template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    positional_text: String,
    index_map: HashMap<String, Vec<usize>>,
}

impl NamedQuery {
    /// Parse a query template, rewriting `:name` tokens to `?` placeholders.
    ///
    /// Originally attempted with regular expressions, which could not ignore
    /// parameter-like strings inside quotes; hence the explicit scan.
    pub fn parse(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut positional_text = String::with_capacity(text.len());
        let mut index_map: HashMap<String, Vec<usize>> = HashMap::new();
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut position = 1;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if in_single_quote {
                if c == '\'' {
                    in_single_quote = false;
                }
            } else if in_double_quote {
                if c == '"' {
                    in_double_quote = false;
                }
            } else if c == '\'' {
                in_single_quote = true;
            } else if c == '"' {
                in_double_quote = true;
            } else if c == ':' && i + 1 < chars.len() && is_identifier_start(chars[i + 1]) {
                let mut j = i + 2;
                while j < chars.len() && is_identifier_part(chars[j]) {
                    j += 1;
                }
                let name: String = chars[i + 1..j].iter().collect();
                index_map.entry(name).or_default().push(position);
                position += 1;
                positional_text.push('?');
                i = j;
                continue;
            }
            positional_text.push(c);
            i += 1;
        }

        Self {
            positional_text,
            index_map,
        }
    }

    /// The rewritten query text with positional placeholders
    pub fn positional_text(&self) -> &str {
        &self.positional_text
    }

    /// Number of distinct parameter names in the template
    pub fn parameter_count(&self) -> usize {
        self.index_map.len()
    }

    /// 1-based placeholder positions recorded for `name`
    pub fn positions(&self, name: &str) -> Option<&[usize]> {
        self.index_map.get(name).map(Vec::as_slice)
    }
}

/// A prepared statement addressed through parameter names.
///
/// Wraps the backend statement prepared from the rewritten text together
/// with the name→positions index; every typed setter applies its value to
/// all recorded positions for the name. Scoped to one executable statement
/// and discarded when the statement closes.
pub struct NamedStatement {
    statement: Arc<dyn Statement>,
    query: NamedQuery,
}

impl NamedStatement {
    /// Parse `text` and prepare the rewritten statement on `connection`
    pub fn prepare(connection: &dyn Connection, text: &str) -> Result<Self> {
        let query = NamedQuery::parse(text);
        let statement = connection.prepare(query.positional_text())?;
        Ok(Self { statement, query })
    }

    fn positions(&self, name: &str) -> Result<&[usize]> {
        self.query
            .positions(name)
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))
    }

    /// Bind a string to every occurrence of `name`.
    ///
    /// Unlike the other setters this is a no-op for an unrecognized name:
    /// optional parameters are bound unconditionally by callers even when a
    /// given template does not reference them.
    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        if let Some(positions) = self.query.positions(name) {
            for &p in positions {
                self.statement.bind_string(p, value)?;
            }
        }
        Ok(())
    }

    /// Bind a 64-bit integer to every occurrence of `name`
    pub fn set_long(&self, name: &str, value: i64) -> Result<()> {
        for &p in self.positions(name)? {
            self.statement.bind_long(p, value)?;
        }
        Ok(())
    }

    /// Bind a 32-bit integer to every occurrence of `name`
    pub fn set_int(&self, name: &str, value: i32) -> Result<()> {
        for &p in self.positions(name)? {
            self.statement.bind_int(p, value)?;
        }
        Ok(())
    }

    /// Bind NULL with an explicit backend type code to every occurrence of `name`
    pub fn set_null(&self, name: &str, type_code: i32) -> Result<()> {
        for &p in self.positions(name)? {
            self.statement.bind_null(p, type_code)?;
        }
        Ok(())
    }

    /// Bind an untyped NULL to every occurrence of `name`
    pub fn set_untyped_null(&self, name: &str) -> Result<()> {
        for &p in self.positions(name)? {
            self.statement.bind_untyped_null(p)?;
        }
        Ok(())
    }

    /// Bind a large text (CLOB) value to every occurrence of `name`
    pub fn set_large_text(&self, name: &str, value: &str) -> Result<()> {
        for &p in self.positions(name)? {
            self.statement.bind_large_text(p, value)?;
        }
        Ok(())
    }

    /// Number of distinct parameter names in the template
    pub fn parameter_count(&self) -> usize {
        self.query.parameter_count()
    }

    /// Execute the statement as a query
    pub fn execute_query(&self) -> Result<Box<dyn Rows>> {
        Ok(self.statement.execute_query()?)
    }

    /// Execute the statement as an update; returns the affected row count
    pub fn execute_update(&self) -> Result<u64> {
        Ok(self.statement.execute_update()?)
    }

    /// The underlying backend statement, shared with the cancellation path
    pub fn statement(&self) -> Arc<dyn Statement> {
        Arc::clone(&self.statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stubs::ScriptedBackend;
    use crate::backend::{ConnectionRouter, RoutingPolicy};

    #[test]
    fn test_parse_rewrites_in_appearance_order() {
        let q = NamedQuery::parse("select * from t where a = :first and b = :second");
        assert_eq!(
            q.positional_text(),
            "select * from t where a = ? and b = ?"
        );
        assert_eq!(q.parameter_count(), 2);
        assert_eq!(q.positions("first"), Some(&[1][..]));
        assert_eq!(q.positions("second"), Some(&[2][..]));
    }

    #[test]
    fn test_parse_repeated_name_collects_all_positions() {
        let q = NamedQuery::parse("select :x, :y, :x from t");
        assert_eq!(q.positional_text(), "select ?, ?, ? from t");
        assert_eq!(q.parameter_count(), 2);
        assert_eq!(q.positions("x"), Some(&[1, 3][..]));
        assert_eq!(q.positions("y"), Some(&[2][..]));
    }

    #[test]
    fn test_quoted_literals_are_not_parameters() {
        let text = "select ':notaparam' as a, \":alsonot\" as b, :real from t";
        let q = NamedQuery::parse(text);
        assert_eq!(
            q.positional_text(),
            "select ':notaparam' as a, \":alsonot\" as b, ? from t"
        );
        assert_eq!(q.parameter_count(), 1);
        assert!(q.positions("notaparam").is_none());
        assert!(q.positions("alsonot").is_none());
    }

    #[test]
    fn test_bare_colon_passes_through() {
        // a colon before a digit or inside a literal is not a parameter start
        let q = NamedQuery::parse("select '12:30', b FROM t where c = :1x or d = :p");
        assert_eq!(q.parameter_count(), 1);
        assert!(q.positions("p").is_some());
    }

    #[test]
    fn test_double_colon_cast_reads_as_parameter() {
        // the second colon of a :: cast precedes an identifier start, so the
        // scanner captures it as a parameter named after the cast type
        let q = NamedQuery::parse("select a::int from t where d = :p");
        assert_eq!(q.parameter_count(), 2);
        assert!(q.positions("int").is_some());
        assert!(q.positions("p").is_some());
    }

    #[test]
    fn test_colon_at_end_of_text() {
        let q = NamedQuery::parse("select a from t where b = :");
        assert_eq!(q.positional_text(), "select a from t where b = :");
        assert_eq!(q.parameter_count(), 0);
    }

    #[test]
    fn test_bind_applies_to_every_position() {
        let backend = ScriptedBackend::new();
        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        let stmt = NamedStatement::prepare(
            conn.as_ref(),
            "select * from t where a = :id or b = :id or c = :other",
        )
        .unwrap();
        stmt.set_long("id", 42).unwrap();
        stmt.set_string("other", "x").unwrap();

        let scripted = &backend.statements()[0];
        assert_eq!(scripted.bound(1).unwrap(), "42");
        assert_eq!(scripted.bound(2).unwrap(), "42");
        assert_eq!(scripted.bound(3).unwrap(), "x");
    }

    #[test]
    fn test_unknown_name_errors_except_strings() {
        let backend = ScriptedBackend::new();
        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        let stmt =
            NamedStatement::prepare(conn.as_ref(), "select * from t where a = :id").unwrap();

        assert!(matches!(
            stmt.set_long("missing", 1),
            Err(Error::ParameterNotFound(_))
        ));
        assert!(matches!(
            stmt.set_int("missing", 1),
            Err(Error::ParameterNotFound(_))
        ));
        // string bind for an unreferenced optional parameter is a no-op
        assert!(stmt.set_string("missing", "v").is_ok());
        assert_eq!(backend.statements()[0].bound_count(), 0);
    }
}
