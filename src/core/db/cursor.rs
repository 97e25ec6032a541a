/// Cursor Module
///
/// A cursor executes statements on its connection and hands the buffered
/// rows out one at a time or all at once.

use crate::config::Backend;
use crate::core::db::connection::ConnectionHandle;
use crate::core::db::query::QueryResult;
use crate::core::Result;
use std::fmt;
use tracing::debug;

#[derive(Debug)]
pub struct Cursor {
    connection: ConnectionHandle,
    result: Option<QueryResult>,
    /// Index of the next row `fetchone` returns
    position: usize,
}

impl Cursor {
    pub fn new(connection: ConnectionHandle) -> Self {
        Cursor {
            connection,
            result: None,
            position: 0,
        }
    }

    pub fn backend(&self) -> Backend {
        self.connection.backend()
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Runs `sql` and buffers its rows, replacing anything left from the
    /// previous statement.
    ///
    /// Returns the number of rows produced, or the number of rows changed for
    /// statements without result columns. On error the previous result is
    /// discarded as well.
    pub fn execute(&mut self, sql: &str) -> Result<usize> {
        self.result = None;
        self.position = 0;
        debug!("cursor.execute on {}: {}", self.connection.backend(), sql);
        let result = self.connection.execute(sql)?;
        let count = result.row_count;
        self.result = Some(result);
        Ok(count)
    }

    /// Next buffered row, or `None` once exhausted (or before any execute).
    pub fn fetchone(&mut self) -> Option<Vec<String>> {
        let row = self.result.as_ref()?.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    /// All rows not fetched yet.
    pub fn fetchall(&mut self) -> Vec<Vec<String>> {
        match &self.result {
            Some(result) => {
                let rest = result.rows[self.position.min(result.rows.len())..].to_vec();
                self.position = result.rows.len();
                rest
            }
            None => Vec::new(),
        }
    }

    /// Column names of the last statement; `None` before any execute or for
    /// statements that return no columns.
    pub fn description(&self) -> Option<&[String]> {
        self.result
            .as_ref()
            .map(|result| result.columns.as_slice())
            .filter(|columns| !columns.is_empty())
    }

    /// Rows returned or changed by the last statement, `-1` when nothing has
    /// been executed.
    pub fn rowcount(&self) -> i64 {
        self.result
            .as_ref()
            .map(|result| result.row_count as i64)
            .unwrap_or(-1)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<cursor backend={} rowcount={}>",
            self.backend(),
            self.rowcount()
        )
    }
}
