/// Database Module
///
/// The database layer behind the shells, one submodule per concern:
/// - **Connection Management** (`connection.rs`): the backend-neutral trait,
///   shareable handles and the connection factories
/// - **Cursors** (`cursor.rs`): statement execution with buffered fetching
/// - **Results** (`query.rs`): result sets rendered to text
/// - **Backends** (`duckdb.rs`, `mysql.rs`, `postgres.rs`): one driver each
///
/// ## Error Handling
///
/// Driver errors surface as `DbShellError::Connection` while opening and as
/// `DbShellError::Query` afterwards, with the driver's message kept as is.
pub mod connection;
pub mod cursor;
pub mod duckdb;
pub mod mysql;
pub mod postgres;
pub mod query;

pub use connection::*;
pub use cursor::Cursor;
pub use query::*;
