/// MySQL Backend
///
/// Connects with sqlx on a private current-thread runtime and renders every
/// value as text.

use crate::config::{Backend, NetworkParams};
use crate::core::db::connection::{current_thread_runtime, DatabaseConnection};
use crate::core::db::query::{QueryResult, NULL_TEXT};
use crate::core::{DbShellError, Result};
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{Column, ConnectOptions, Either, Executor, Row, ValueRef};
use tokio::runtime::Runtime;
use tracing::debug;

pub struct MySqlConnection {
    runtime: Runtime,
    connection: sqlx::MySqlConnection,
    target: String,
}

impl MySqlConnection {
    /// Opens a single (unpooled) connection.
    ///
    /// # Errors
    ///
    /// Returns `DbShellError::Connection` when the server is unreachable or
    /// rejects the credentials.
    pub fn connect(params: &NetworkParams) -> Result<Self> {
        let runtime = current_thread_runtime()?;
        let options = connect_options(params);
        debug!("Connecting to MySQL with {:?}", params);
        let connection = runtime
            .block_on(options.connect())
            .map_err(DbShellError::connection)?;

        Ok(MySqlConnection {
            runtime,
            connection,
            target: params.target(),
        })
    }
}

/// Only the parameters that are present are handed to the driver.
pub(crate) fn connect_options(params: &NetworkParams) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new().port(params.port);
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

impl DatabaseConnection for MySqlConnection {
    fn backend(&self) -> Backend {
        Backend::MySql
    }

    fn target(&self) -> String {
        self.target.clone()
    }

    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let connection = &mut self.connection;
        let (rows, rows_affected) = self
            .runtime
            .block_on(async {
                let mut rows: Vec<MySqlRow> = Vec::new();
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

impl MySqlConnection {
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

/// Statements without bind parameters go over the text protocol, so every
/// non-binary value decodes as a string.
fn render_row(row: &MySqlRow) -> Result<Vec<String>> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i).map_err(DbShellError::query)?;
            if raw.is_null() {
                return Ok(NULL_TEXT.to_string());
            }
            match row.try_get_unchecked::<String, _>(i) {
                Ok(text) => Ok(text),
                Err(_) => {
                    let bytes: Vec<u8> = row.try_get_unchecked(i).map_err(DbShellError::query)?;
                    Ok(format!("<BLOB: {} bytes>", bytes.len()))
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionParams, DEFAULT_PORT};
    use std::collections::HashMap;

    #[test]
    fn test_connect_options_from_params() {
        let mut vars = HashMap::new();
        vars.insert("MYSQL_HOST".to_string(), "db.internal".to_string());
        vars.insert("MYSQL_USER".to_string(), "app".to_string());
        vars.insert("MYSQL_DATABASE".to_string(), "shop".to_string());

        let params = match ConnectionParams::from_vars(Backend::MySql, &vars).unwrap() {
            ConnectionParams::MySql(params) => params,
            other => panic!("Expected MySQL params, got {:?}", other),
        };
        let options = connect_options(&params);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), DEFAULT_PORT);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("shop"));
    }

    #[test]
    fn test_unreachable_server_is_a_connection_error() {
        let params = NetworkParams {
            host: Some("127.0.0.1".to_string()),
            user: Some("nobody".to_string()),
            password: None,
            database: None,
            port: 1,
            port_defaulted: false,
        };
        match MySqlConnection::connect(&params) {
            Err(DbShellError::Connection(_)) => {}
            Err(other) => panic!("Expected Connection error, got {:?}", other),
            Ok(_) => panic!("Nothing should be listening on port 1"),
        }
    }
}
