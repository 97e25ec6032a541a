/// Query Result Module
///
/// Result sets as the shells hold and print them: column names plus rows of
/// values already rendered to text by the driver-specific code.

/// Text used for SQL `NULL` in every backend.
pub const NULL_TEXT: &str = "NULL";

/// Represents the result of a SQL statement execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as string values
    pub rows: Vec<Vec<String>>,
    /// Rows returned, or rows changed when the statement returns no columns
    pub row_count: usize,
    /// Rows changed, when the driver reports it
    pub rows_affected: Option<u64>,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
            rows_affected: None,
        }
    }

    /// Records the driver's count of changed rows. It becomes the row count
    /// of statements that produce no result columns (INSERT, UPDATE, DDL).
    pub fn with_rows_affected(mut self, rows_affected: u64) -> Self {
        self.rows_affected = Some(rows_affected);
        if self.columns.is_empty() {
            self.row_count = rows_affected as usize;
        }
        self
    }

    /// Renders the whole result set as a table.
    pub fn render(&self) -> String {
        render_table(&self.columns, &self.rows)
    }
}

/// Renders rows under a header line, pipe separated, followed by the row count.
///
/// ```text
/// id | name
/// ---------
/// 1 | Alice
///
/// (1 rows)
/// ```
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    if !columns.is_empty() {
        let header = columns.join(" | ");
        out.push_str(&header);
        out.push('\n');
        out.push_str(&"-".repeat(header.len()));
        out.push('\n');
    }
    for row in rows {
        out.push_str(&row.join(" | "));
        out.push('\n');
    }
    out.push_str(&format!("\n({} rows)", rows.len()));
    out
}

/// Renders a single row the way `fetchone()` shows it.
pub fn render_row(row: &[String]) -> String {
    format!("({})", row.join(", "))
}
