/// PostgreSQL Backend

use crate::config::{Backend, NetworkParams};
use crate::core::db::connection::{current_thread_runtime, DatabaseConnection};
use crate::core::db::query::{QueryResult, NULL_TEXT};
use crate::core::{DbShellError, Result};
use futures_util::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, ConnectOptions, Either, Executor, Row, ValueRef};
use tokio::runtime::Runtime;
use tracing::debug;

pub struct PostgresConnection {
    runtime: Runtime,
    connection: sqlx::PgConnection,
    target: String,
}

impl PostgresConnection {
    /// Opens a single (unpooled) connection.
    ///
    /// Parameters left unset fall back to whatever the driver picks, which
    /// includes the standard `PG*` variables.
    pub fn connect(params: &NetworkParams) -> Result<Self> {
        let runtime = current_thread_runtime()?;
        let options = connect_options(params);
        debug!("Connecting to PostgreSQL with {:?}", params);
        let connection = runtime
            .block_on(options.connect())
            .map_err(DbShellError::connection)?;

        Ok(PostgresConnection {
            runtime,
            connection,
            target: params.target(),
        })
    }
}

pub(crate) fn connect_options(params: &NetworkParams) -> PgConnectOptions {
    let mut options = PgConnectOptions::new().port(params.port);
    if let Some(host) = &params.host {
        options = options.host(host);
    }
    if let Some(user) = &params.user {
        options = options.username(user);
    }
    if let Some(password) = &params.password {
        options = options.password(password);
    }
    if let Some(database) = &params.database {
        options = options.database(database);
    }
    options
}

impl DatabaseConnection for PostgresConnection {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let connection = &mut self.connection;
        let (rows, rows_affected) = self
            .runtime
            .block_on(async {
                let mut rows: Vec<PgRow> = Vec::new();
                let mut rows_affected = 0;
                let mut results = (&mut *connection).fetch_many(sql);
                while let Some(step) = results.try_next().await? {
                    match step {
                        Either::Left(done) => rows_affected += done.rows_affected(),
                        Either::Right(row) => rows.push(row),
                    }
                }
                Ok::<_, sqlx::Error>((rows, rows_affected))
            })
            .map_err(DbShellError::query)?;

        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None if rows_affected == 0 => self.describe_columns(sql),
            None => Vec::new(),
        };
        let rows = rows.iter().map(render_row).collect::<Result<Vec<_>>>()?;
        Ok(QueryResult::new(columns, rows).with_rows_affected(rows_affected))
    }
}

impl PostgresConnection {
    /// Column names of a statement that returned no rows, from the server's
    /// description of it. Statements the server cannot describe have none.
    fn describe_columns(&mut self, sql: &str) -> Vec<String> {
        match self.runtime.block_on((&mut self.connection).describe(sql)) {
            Ok(described) => described
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(e) => {
                debug!("Could not describe statement: {}", e);
                Vec::new()
            }
        }
    }
}

/// Unprepared statements come back in the text format, bytea included (as `\x..` hex).
fn render_row(row: &PgRow) -> Result<Vec<String>> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i).map_err(DbShellError::query)?;
            if raw.is_null() {
                Ok(NULL_TEXT.to_string())
            } else {
                row.try_get_unchecked::<String, _>(i).map_err(DbShellError::query)
            }
        })
        .collect()
}
