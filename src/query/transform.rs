//! Row-set transformation
//!
//! A [`RowTransformer`] turns the raw row cursor(s) produced by an execution
//! into the caller's result shape. The executor owns the cursor lifecycle;
//! transformers only read. Both methods default to producing no result, so an
//! implementation overrides exactly the arity it supports and a cancelled
//! execution is indistinguishable from a transformer that produced nothing.

use crate::backend::Rows;
use crate::error::Result;

/// Turns row cursors into a typed result
pub trait RowTransformer {
    /// The result shape produced from the rows
    type Output;

    /// Transform the single cursor of a plain execution
    fn transform(&self, _rows: &mut dyn Rows) -> Result<Option<Self::Output>> {
        Ok(None)
    }

    /// Transform the cursors of a batch execution, one per query
    fn transform_batch(&self, _rows: &mut [Box<dyn Rows>]) -> Result<Option<Self::Output>> {
        Ok(None)
    }
}

/// Collects the first column of every row as a string list.
///
/// NULL cells are skipped. Used by the partition lookups, whose queries
/// project a single table-name column.
pub struct StringRowsTransformer;

impl RowTransformer for StringRowsTransformer {
    type Output = Vec<String>;

    fn transform(&self, rows: &mut dyn Rows) -> Result<Option<Vec<String>>> {
        let mut values = Vec::new();
        while rows.next_row()? {
            if let Some(value) = rows.column_string(0)? {
                values.push(value);
            }
        }
        Ok(Some(values))
    }

    fn transform_batch(&self, rows: &mut [Box<dyn Rows>]) -> Result<Option<Vec<String>>> {
        let mut values = Vec::new();
        for cursor in rows {
            if let Some(mut chunk) = self.transform(cursor.as_mut())? {
                values.append(&mut chunk);
            }
        }
        Ok(Some(values))
    }
}
