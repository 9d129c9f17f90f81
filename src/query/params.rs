//! Typed bind parameters
//!
//! Request-parameter mapping (an external collaborator) produces a map of
//! parameter name to [`BindValue`]; [`bind_all`] applies the whole map to a
//! prepared [`NamedStatement`], dispatching each value to the binder its tag
//! selects.

use crate::error::Result;
use crate::query::named::NamedStatement;
use std::collections::HashMap;
use tracing::warn;

/// A tagged bind value; the tag determines which binder is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Long(i64),
    /// 32-bit integer value
    Int(i32),
    /// NULL with an explicit backend type code
    TypedNull(i32),
    /// NULL without type information
    UntypedNull,
    /// Large text (CLOB) value
    LargeText(String),
}

impl BindValue {
    /// String parameter
    pub fn string(value: impl Into<String>) -> Self {
        BindValue::String(value.into())
    }

    /// 64-bit integer parameter
    pub fn long(value: i64) -> Self {
        BindValue::Long(value)
    }

    /// 32-bit integer parameter
    pub fn int(value: i32) -> Self {
        BindValue::Int(value)
    }

    /// NULL parameter carrying a backend type code
    pub fn typed_null(type_code: i32) -> Self {
        BindValue::TypedNull(type_code)
    }

    /// Untyped NULL parameter
    pub fn untyped_null() -> Self {
        BindValue::UntypedNull
    }

    /// Large text (CLOB) parameter
    pub fn large_text(value: impl Into<String>) -> Self {
        BindValue::LargeText(value.into())
    }
}

/// Bind every supplied parameter to the statement by name.
///
/// An empty map is a no-op. A mismatch between the number of distinct
/// template names and the number of supplied values is logged and tolerated:
/// queries legitimately supply values for optional parameters a given
/// template does not reference, and vice versa.
pub fn bind_all(
    statement: &NamedStatement,
    parameters: &HashMap<String, BindValue>,
) -> Result<()> {
    if parameters.is_empty() {
        return Ok(());
    }

    if statement.parameter_count() != parameters.len() {
        warn!(
            template_parameters = statement.parameter_count(),
            supplied_parameters = parameters.len(),
            "parameter count mismatch, binding the intersection"
        );
    }

    for (name, value) in parameters {
        match value {
            BindValue::String(v) => statement.set_string(name, v)?,
            BindValue::Long(v) => statement.set_long(name, *v)?,
            BindValue::Int(v) => statement.set_int(name, *v)?,
            BindValue::TypedNull(type_code) => statement.set_null(name, *type_code)?,
            BindValue::UntypedNull => statement.set_untyped_null(name)?,
            BindValue::LargeText(v) => statement.set_large_text(name, v)?,
        }
    }
    Ok(())
}
