/// Connection Management Module
///
/// The backend-neutral connection trait, the shareable connection handle the
/// shell binds as `conn`, and the connection factories bound as `get_conn`.

use crate::config::{Backend, ConnectionParams};
use crate::core::db::cursor::Cursor;
use crate::core::db::mysql::MySqlConnection;
use crate::core::db::postgres::PostgresConnection;
use crate::core::db::query::QueryResult;
use crate::core::db::duckdb::DuckDbConnection;
use crate::core::Result;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tokio::runtime::Runtime;
use tracing::info;

/// An open session to one database, whatever the driver behind it.
pub trait DatabaseConnection {
    /// Which backend this connection talks to
    fn backend(&self) -> Backend;

    /// File path or `host:port/database` this connection was opened against
    fn target(&self) -> String;

    /// Executes one statement and returns its full result set
    fn execute(&mut self, sql: &str) -> Result<QueryResult>;
}

/// Cheaply clonable handle to an open connection.
///
/// Every clone and every cursor derived from it share the same underlying
/// connection. The shell is single threaded, so sharing is `Rc<RefCell<..>>`.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Rc<RefCell<Box<dyn DatabaseConnection>>>,
    backend: Backend,
    target: String,
}

impl ConnectionHandle {
    pub fn new(connection: Box<dyn DatabaseConnection>) -> Self {
        let backend = connection.backend();
        let target = connection.target();
        ConnectionHandle {
            inner: Rc::new(RefCell::new(connection)),
            backend,
            target,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Derives a new cursor bound to this connection.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.clone())
    }

    /// Executes one statement on the shared connection.
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.inner.borrow_mut().execute(sql)
    }

    /// Whether both handles share the same underlying connection.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("backend", &self.backend)
            .field("target", &self.target)
            .finish()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<connection backend={} target={}>", self.backend, self.target)
    }
}

/// Opens a connection with the given parameters.
///
/// Driver failures come back as `DbShellError::Connection` carrying the
/// driver's message. There is no retry.
pub fn get_conn(params: &ConnectionParams) -> Result<ConnectionHandle> {
    let connection: Box<dyn DatabaseConnection> = match params {
        ConnectionParams::DuckDb { file } => Box::new(DuckDbConnection::open(file)?),
        ConnectionParams::MySql(network) => Box::new(MySqlConnection::connect(network)?),
        ConnectionParams::Postgres(network) => Box::new(PostgresConnection::connect(network)?),
    };
    let handle = ConnectionHandle::new(connection);
    info!("Connected to {} at {}", handle.backend(), handle.target());
    Ok(handle)
}

/// Reads the backend's environment variables and opens a connection.
///
/// The environment is read again on every call.
pub fn get_conn_from_env(backend: Backend) -> Result<ConnectionHandle> {
    let params = ConnectionParams::from_env(backend)?;
    get_conn(&params)
}

/// The `get_conn` callable: produces a fresh connection every time it is called.
#[derive(Clone)]
pub struct ConnectionFactory {
    backend: Backend,
    connect: Rc<dyn Fn() -> Result<ConnectionHandle>>,
}

impl ConnectionFactory {
    /// Factory that re-reads the process environment on each call.
    pub fn from_env(backend: Backend) -> Self {
        ConnectionFactory {
            backend,
            connect: Rc::new(move || get_conn_from_env(backend)),
        }
    }

    /// Factory bound to fixed parameters.
    pub fn from_params(params: ConnectionParams) -> Self {
        ConnectionFactory {
            backend: params.backend(),
            connect: Rc::new(move || get_conn(&params)),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn connect(&self) -> Result<ConnectionHandle> {
        (self.connect)()
    }
}

impl fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("backend", &self.backend)
            .finish()
    }
}

/// Runtime the async network drivers are driven on, one per connection.
pub(crate) fn current_thread_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
