//! Startup sequence shared by the three shell binaries:
//! usage → connect → cursor → session → exit status.

use crate::config::{self, Backend};
use crate::core::db::ConnectionFactory;
use crate::core::{DbShellError, Result};
use crate::namespace::Namespace;
use crate::repl::{BufferedLines, EditorLines, LineSource, Session, SessionEnd};
use std::io::{self, IsTerminal, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Printed at startup and by `msg()`. Identical for every backend.
pub const USAGE: &str = "
Variables and functions:
    conn: database connection
    cursor: connection cursor
    get_conn(): obtain database connection
    msg: function printing this message
";

/// How a session that did start came to an end.
#[derive(Debug)]
pub enum SessionOutcome {
    Finished(SessionEnd),
    /// Input or output broke down mid-session
    Failed(DbShellError),
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Finished(_) => 0,
            SessionOutcome::Failed(_) => 1,
        }
    }
}

/// Writes the usage message followed by a newline.
pub fn print_usage(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", USAGE)?;
    out.flush()
}

/// Runs one shell: prints usage, connects once, derives one cursor and hands
/// the four bindings to a session reading from `source`.
///
/// # Errors
///
/// Fails before the session starts when the connection cannot be opened or
/// the usage message cannot be written. Anything going wrong after that is
/// reported through [`SessionOutcome::Failed`].
pub fn launch(
    factory: ConnectionFactory,
    source: &mut dyn LineSource,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<SessionOutcome> {
    print_usage(out)?;

    let conn = factory.connect()?;
    let cursor = conn.cursor();
    let mut session = Session::new(Namespace::seeded(conn, cursor, factory, USAGE));

    Ok(match session.run(source, out, err) {
        Ok(end) => SessionOutcome::Finished(end),
        Err(e) => SessionOutcome::Failed(e),
    })
}

/// Entry point of the shell binaries; returns the process exit status.
///
/// Reads the backend's environment variables, uses the line editor when
/// stdin is a terminal and plain line reading otherwise.
pub fn run(backend: Backend) -> i32 {
    let extra: Vec<String> = std::env::args().skip(1).collect();
    if !extra.is_empty() {
        warn!("Ignoring unexpected arguments: {:?}", extra);
    }

    config::load_dotenv();
    info!("Starting {} shell", backend);

    let mut source: Box<dyn LineSource> = if io::stdin().is_terminal() {
        Box::new(EditorLines::new())
    } else {
        Box::new(BufferedLines::new(io::stdin().lock()))
    };
    let mut out = io::stdout();
    let mut err = io::stderr();

    match launch(ConnectionFactory::from_env(backend), source.as_mut(), &mut out, &mut err) {
        Ok(SessionOutcome::Finished(end)) => {
            info!("{} shell finished ({:?})", backend, end);
            0
        }
        Ok(SessionOutcome::Failed(e)) | Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

/// Sends logs to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
