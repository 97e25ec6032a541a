/// Embedded Backend
///
/// Opens a DuckDB database file (or an in-memory database) and executes
/// statements against it.

use crate::config::{Backend, IN_MEMORY};
use crate::core::db::connection::DatabaseConnection;
use crate::core::db::query::{QueryResult, NULL_TEXT};
use crate::core::{DbShellError, Result};
use ::duckdb::types::Value;
use ::duckdb::Connection;
use tracing::debug;

/// Single column DuckDB answers data-changing statements with.
const CHANGE_COUNT_COLUMN: &str = "Count";

/// Leading keywords of statements whose `Count` result is a change count.
const CHANGING_KEYWORDS: [&str; 6] = ["insert", "update", "delete", "create", "drop", "alter"];

/// A connection to an embedded database file.
#[derive(Debug)]
pub struct DuckDbConnection {
    connection: Connection,
    file: String,
}

impl DuckDbConnection {
    /// Opens the database at `file`, or an in-memory database for `:memory:`.
    ///
    /// # Errors
    ///
    /// Returns `DbShellError::Connection` when the file cannot be opened or
    /// created (missing directory, permissions, not a database).
    pub fn open(file: &str) -> Result<Self> {
        let connection = if file == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(file)
        }
        .map_err(DbShellError::connection)?;
        debug!("Opened DuckDB database {}", file);

        Ok(DuckDbConnection {
            connection,
            file: file.to_string(),
        })
    }
}

impl DatabaseConnection for DuckDbConnection {
    fn backend(&self) -> Backend {
        Backend::DuckDb
    }

    fn target(&self) -> String {
        self.file.clone()
    }

    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let mut stmt = self
            .connection
            .prepare(sql)
            .map_err(|e| DbShellError::Query(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let column_count = row.as_ref().column_count();
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(format_value(row.get::<_, Value>(i)?));
                }
                Ok(values)
            })
            .map_err(|e| DbShellError::Query(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DbShellError::Query(format!("Result processing failed: {}", e)))?;

        // Known once the statement has run, even when it produced no rows.
        let columns = stmt.column_names();

        if changes_rows(sql) && columns.len() == 1 && columns[0] == CHANGE_COUNT_COLUMN {
            let changed = rows
                .first()
                .and_then(|row| row.first())
                .and_then(|count| count.parse::<u64>().ok())
                .unwrap_or(0);
            return Ok(QueryResult::new(Vec::new(), Vec::new()).with_rows_affected(changed));
        }

        Ok(QueryResult::new(columns, rows))
    }
}

fn changes_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    CHANGING_KEYWORDS
        .iter()
        .any(|changing| keyword.eq_ignore_ascii_case(changing))
}

/// Formats a DuckDB value for display
fn format_value(value: Value) -> String {
    match value {
        Value::Null => NULL_TEXT.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::TinyInt(i) => i.to_string(),
        Value::SmallInt(i) => i.to_string(),
        Value::Int(i) => i.to_string(),
        Value::BigInt(i) => i.to_string(),
        Value::HugeInt(i) => i.to_string(),
        Value::UTinyInt(i) => i.to_string(),
        Value::USmallInt(i) => i.to_string(),
        Value::UInt(i) => i.to_string(),
        Value::UBigInt(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(t) => t,
        Value::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_table(conn: &mut DuckDbConnection) {
        conn.connection
            .execute_batch(
                "
            CREATE TABLE test (
                id INTEGER,
                name VARCHAR,
                value DOUBLE,
                active BOOLEAN DEFAULT true
            );
            INSERT INTO test (id, name, value) VALUES (1, 'Alice', 123.5);
            INSERT INTO test (id, name, value) VALUES (2, 'Bob', 678.25);
            INSERT INTO test (id, name, value) VALUES (3, NULL, NULL);
        ",
            )
            .unwrap();
    }

    #[test]
    fn test_select_one_round_trip() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        let result = conn.execute("select 1 as one").unwrap();
        assert_eq!(result.columns, vec!["one"]);
        assert_eq!(result.rows, vec![vec!["1".to_string()]]);
    }

    #[test]
    fn test_query_execution() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        setup_test_table(&mut conn);

        let result = conn.execute("SELECT * FROM test ORDER BY id").unwrap();

        assert_eq!(result.columns, vec!["id", "name", "value", "active"]);
        assert_eq!(result.row_count, 3);
        assert_eq!(result.rows[0], vec!["1", "Alice", "123.5", "true"]);
        assert_eq!(result.rows[2], vec!["3", "NULL", "NULL", "true"]);
    }

    #[test]
    fn test_empty_result_keeps_columns() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        setup_test_table(&mut conn);

        let result = conn.execute("SELECT id, name FROM test WHERE id > 100").unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_changed_rows_are_counted() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        conn.execute("CREATE TABLE t (x INTEGER)").unwrap();

        let inserted = conn.execute("INSERT INTO t VALUES (1), (2), (3)").unwrap();
        assert!(inserted.columns.is_empty());
        assert!(inserted.rows.is_empty());
        assert_eq!(inserted.row_count, 3);
        assert_eq!(inserted.rows_affected, Some(3));

        let updated = conn.execute("update t set x = x + 1 where x > 1").unwrap();
        assert_eq!(updated.row_count, 2);

        let result = conn.execute("SELECT x FROM t ORDER BY x").unwrap();
        assert_eq!(result.rows, vec![vec!["1"], vec!["3"], vec!["4"]]);
    }

    #[test]
    fn test_changes_rows_keywords() {
        assert!(changes_rows("INSERT INTO t VALUES (1)"));
        assert!(changes_rows("  delete from t"));
        assert!(changes_rows("create table t (x int)"));
        assert!(!changes_rows("select count(*) as \"Count\" from t"));
        assert!(!changes_rows(""));
    }

    #[test]
    fn test_select_named_count_is_kept_as_rows() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        let result = conn.execute("SELECT 5 AS \"Count\"").unwrap();
        assert_eq!(result.columns, vec!["Count"]);
        assert_eq!(result.rows, vec![vec!["5"]]);
    }

    #[test]
    fn test_query_error_handling() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        match conn.execute("SELECT * FROM nonexistent_table").unwrap_err() {
            DbShellError::Query(msg) => assert!(msg.contains("nonexistent_table")),
            other => panic!("Expected Query error, got {:?}", other),
        }
    }

    #[test]
    fn test_blob_handling() {
        let mut conn = DuckDbConnection::open(IN_MEMORY).unwrap();
        let result = conn.execute("SELECT 'Hello'::BLOB").unwrap();
        assert_eq!(result.rows[0][0], "<BLOB: 5 bytes>");
    }

    #[test]
    fn test_file_database_persists_between_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shell.duckdb").to_str().unwrap().to_string();

        let mut first = DuckDbConnection::open(&path).unwrap();
        first.execute("CREATE TABLE kv (k VARCHAR, v VARCHAR)").unwrap();
        first.execute("INSERT INTO kv VALUES ('a', 'b')").unwrap();
        drop(first);

        let mut second = DuckDbConnection::open(&path).unwrap();
        assert_eq!(second.target(), path);
        let result = second.execute("SELECT v FROM kv WHERE k = 'a'").unwrap();
        assert_eq!(result.rows, vec![vec!["b".to_string()]]);
    }

    #[test]
    fn test_connection_error_handling() {
        match DuckDbConnection::open("/nonexistent/path/database.db").unwrap_err() {
            DbShellError::Connection(_) => {}
            other => panic!("Expected Connection error, got {:?}", other),
        }
    }
}
