use crate::core::{DbShellError, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Port used by both network backends when their port variable is absent or empty.
pub const DEFAULT_PORT: u16 = 3306;

/// Sentinel understood by the embedded driver as "no file, keep it in memory".
pub const IN_MEMORY: &str = ":memory:";

/// The three databases a shell can be launched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    DuckDb,
    MySql,
    Postgres,
}

impl Backend {
    /// Name used in logs and in connection/cursor representations.
    pub fn name(self) -> &'static str {
        match self {
            Backend::DuckDb => "duckdb",
            Backend::MySql => "mysql",
            Backend::Postgres => "postgres",
        }
    }

    /// Environment variables consulted by this backend, in the order they are read.
    pub fn env_keys(self) -> &'static [&'static str] {
        match self {
            Backend::DuckDb => &[SQLITE_FILE],
            Backend::MySql => &MYSQL_ENV,
            Backend::Postgres => &POSTGRES_ENV,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const SQLITE_FILE: &str = "SQLITE_FILE";

/// Names of the five variables a network backend reads.
#[derive(Debug, Clone, Copy)]
pub struct NetworkKeys {
    pub host: &'static str,
    pub user: &'static str,
    pub password: &'static str,
    pub database: &'static str,
    pub port: &'static str,
}

impl NetworkKeys {
    const fn all(&self) -> [&'static str; 5] {
        [self.host, self.user, self.password, self.database, self.port]
    }
}

pub const MYSQL_KEYS: NetworkKeys = NetworkKeys {
    host: "MYSQL_HOST",
    user: "MYSQL_USER",
    password: "MYSQL_PASSWORD",
    database: "MYSQL_DATABASE",
    port: "MYSQL_PORT",
};

pub const POSTGRES_KEYS: NetworkKeys = NetworkKeys {
    host: "POSTGRES_HOST",
    user: "POSTGRES_USER",
    password: "POSTGRES_PASSWORD",
    database: "POSTGRES_DATABASE",
    port: "POSTGRES_PORT",
};

const MYSQL_ENV: [&str; 5] = MYSQL_KEYS.all();
const POSTGRES_ENV: [&str; 5] = POSTGRES_KEYS.all();

/// Parameters of a MySQL or PostgreSQL connection.
///
/// Absent fields are simply not handed to the driver, which then applies its
/// own defaults.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub port: u16,
    /// Whether `port` came from [`DEFAULT_PORT`] rather than the environment.
    pub port_defaulted: bool,
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for NetworkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

impl NetworkParams {
    /// `host:port/database` as shown in connection representations.
    pub fn target(&self) -> String {
        format!(
            "{}:{}/{}",
            self.host.as_deref().unwrap_or(""),
            self.port,
            self.database.as_deref().unwrap_or("")
        )
    }
}

/// Everything a connection factory needs, per backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionParams {
    DuckDb { file: String },
    MySql(NetworkParams),
    Postgres(NetworkParams),
}

impl ConnectionParams {
    /// Builds the parameters of `backend` from a key-value mapping.
    ///
    /// This is a pure function of `vars`: nothing is read from the process
    /// environment here, which keeps it usable from tests.
    ///
    /// # Errors
    ///
    /// Returns `DbShellError::Config` when the port variable is set to
    /// something that is not a valid TCP port.
    pub fn from_vars(backend: Backend, vars: &HashMap<String, String>) -> Result<Self> {
        match backend {
            Backend::DuckDb => {
                let file = match vars.get(SQLITE_FILE).map(String::as_str) {
                    None | Some("") => IN_MEMORY.to_string(),
                    Some(path) => path.to_string(),
                };
                Ok(ConnectionParams::DuckDb { file })
            }
            Backend::MySql => network_params(&MYSQL_KEYS, vars).map(ConnectionParams::MySql),
            Backend::Postgres => {
                let params = network_params(&POSTGRES_KEYS, vars)?;
                if params.port_defaulted {
                    warn!(
                        "{} is not set, using port {} which is the MySQL default; PostgreSQL usually listens on 5432",
                        POSTGRES_KEYS.port, DEFAULT_PORT
                    );
                }
                Ok(ConnectionParams::Postgres(params))
            }
        }
    }

    /// Snapshots the current process environment and builds the parameters of `backend`.
    pub fn from_env(backend: Backend) -> Result<Self> {
        let vars: HashMap<String, String> = backend
            .env_keys()
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        debug!("Read {} of {} variables for {}", vars.len(), backend.env_keys().len(), backend);
        Self::from_vars(backend, &vars)
    }

    pub fn backend(&self) -> Backend {
        match self {
            ConnectionParams::DuckDb { .. } => Backend::DuckDb,
            ConnectionParams::MySql(_) => Backend::MySql,
            ConnectionParams::Postgres(_) => Backend::Postgres,
        }
    }

    /// Human-readable target: the file for DuckDB, `host:port/database` otherwise.
    pub fn target(&self) -> String {
        match self {
            ConnectionParams::DuckDb { file } => file.clone(),
            ConnectionParams::MySql(params) | ConnectionParams::Postgres(params) => params.target(),
        }
    }
}

fn network_params(keys: &NetworkKeys, vars: &HashMap<String, String>) -> Result<NetworkParams> {
    let (port, port_defaulted) = parse_port(keys.port, vars.get(keys.port).map(String::as_str))?;
    Ok(NetworkParams {
        host: vars.get(keys.host).cloned(),
        user: vars.get(keys.user).cloned(),
        password: vars.get(keys.password).cloned(),
        database: vars.get(keys.database).cloned(),
        port,
        port_defaulted,
    })
}

/// Returns the port and whether the default was applied.
fn parse_port(key: &str, raw: Option<&str>) -> Result<(u16, bool)> {
    match raw.map(str::trim) {
        None | Some("") => Ok((DEFAULT_PORT, true)),
        Some(value) => value
            .parse::<u16>()
            .map(|port| (port, false))
            .map_err(|e| DbShellError::Config(format!("{}={:?} is not a valid port: {}", key, value, e))),
    }
}

/// Loads `.env` from the working directory, if there is one.
///
/// Variables already present in the environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_embedded_defaults_to_memory() {
        let params = ConnectionParams::from_vars(Backend::DuckDb, &vars(&[])).unwrap();
        assert_eq!(params, ConnectionParams::DuckDb { file: ":memory:".to_string() });

        let params = ConnectionParams::from_vars(Backend::DuckDb, &vars(&[("SQLITE_FILE", "")])).unwrap();
        assert_eq!(params.target(), ":memory:");
    }

    #[test]
    fn test_embedded_file_is_taken_verbatim() {
        let params =
            ConnectionParams::from_vars(Backend::DuckDb, &vars(&[("SQLITE_FILE", "/tmp/app.db")])).unwrap();
        assert_eq!(params.target(), "/tmp/app.db");
    }

    #[test]
    fn test_mysql_full_environment() {
        let env = vars(&[
            ("MYSQL_HOST", "db.internal"),
            ("MYSQL_USER", "app"),
            ("MYSQL_PASSWORD", "secret"),
            ("MYSQL_DATABASE", "shop"),
            ("MYSQL_PORT", "3307"),
        ]);
        match ConnectionParams::from_vars(Backend::MySql, &env).unwrap() {
            ConnectionParams::MySql(params) => {
                assert_eq!(params.host.as_deref(), Some("db.internal"));
                assert_eq!(params.user.as_deref(), Some("app"));
                assert_eq!(params.password.as_deref(), Some("secret"));
                assert_eq!(params.database.as_deref(), Some("shop"));
                assert_eq!(params.port, 3307);
                assert!(!params.port_defaulted);
                assert_eq!(params.target(), "db.internal:3307/shop");
            }
            other => panic!("Expected MySQL params, got {:?}", other),
        }
    }

    #[test]
    fn test_unset_port_uses_default_for_both_network_backends() {
        for backend in [Backend::MySql, Backend::Postgres] {
            match ConnectionParams::from_vars(backend, &vars(&[])).unwrap() {
                ConnectionParams::MySql(params) | ConnectionParams::Postgres(params) => {
                    assert_eq!(params.port, 3306);
                    assert!(params.port_defaulted);
                    assert_eq!(params.host, None);
                    assert_eq!(params.user, None);
                }
                other => panic!("Expected network params, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_empty_port_uses_default() {
        let params = ConnectionParams::from_vars(Backend::Postgres, &vars(&[("POSTGRES_PORT", "")])).unwrap();
        match params {
            ConnectionParams::Postgres(params) => assert_eq!(params.port, DEFAULT_PORT),
            other => panic!("Expected Postgres params, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        let result = ConnectionParams::from_vars(Backend::MySql, &vars(&[("MYSQL_PORT", "http")]));
        match result {
            Err(DbShellError::Config(msg)) => assert!(msg.contains("MYSQL_PORT")),
            other => panic!("Expected Config error, got {:?}", other),
        }

        let result = ConnectionParams::from_vars(Backend::Postgres, &vars(&[("POSTGRES_PORT", "70000")]));
        assert!(matches!(result, Err(DbShellError::Config(_))));
    }

    #[test]
    fn test_backends_do_not_read_each_others_variables() {
        let env = vars(&[("MYSQL_HOST", "mysql.local"), ("POSTGRES_HOST", "pg.local")]);
        match ConnectionParams::from_vars(Backend::Postgres, &env).unwrap() {
            ConnectionParams::Postgres(params) => assert_eq!(params.host.as_deref(), Some("pg.local")),
            other => panic!("Expected Postgres params, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_hides_password() {
        let env = vars(&[("MYSQL_PASSWORD", "hunter2")]);
        let params = ConnectionParams::from_vars(Backend::MySql, &env).unwrap();
        let rendered = format!("{:?}", params);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_env_keys_per_backend() {
        assert_eq!(Backend::DuckDb.env_keys(), &["SQLITE_FILE"]);
        assert_eq!(Backend::MySql.env_keys().len(), 5);
        assert!(Backend::Postgres.env_keys().contains(&"POSTGRES_DATABASE"));
    }
}
