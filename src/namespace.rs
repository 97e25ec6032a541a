//! Names visible inside the interactive session and the values bound to them.

use crate::core::db::{ConnectionFactory, ConnectionHandle, Cursor};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub const CONN: &str = "conn";
pub const CURSOR: &str = "cursor";
pub const GET_CONN: &str = "get_conn";
pub const MSG: &str = "msg";

/// Zero-argument callables the session can invoke with `name()`.
#[derive(Clone, Debug)]
pub enum Function {
    /// Reprints the usage message
    Msg(&'static str),
    /// Opens a fresh connection
    GetConn(ConnectionFactory),
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Msg(_) => MSG,
            Function::GetConn(_) => GET_CONN,
        }
    }
}

/// A value bound to a name.
///
/// Cloning a binding aliases it, like assignment does in the session: both
/// names then refer to the same connection or the same cursor.
#[derive(Clone, Debug)]
pub enum Binding {
    Connection(ConnectionHandle),
    Cursor(Rc<RefCell<Cursor>>),
    Function(Function),
}

impl Binding {
    pub fn cursor(cursor: Cursor) -> Self {
        Binding::Cursor(Rc::new(RefCell::new(cursor)))
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Connection(_) => "connection",
            Binding::Cursor(_) => "cursor",
            Binding::Function(_) => "function",
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Connection(conn) => write!(f, "{}", conn),
            Binding::Cursor(cursor) => write!(f, "{}", cursor.borrow()),
            Binding::Function(function) => write!(f, "<function {}>", function.name()),
        }
    }
}

/// The session's global namespace.
#[derive(Debug, Default)]
pub struct Namespace {
    bindings: HashMap<String, Binding>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    /// The four names every shell starts with.
    pub fn seeded(
        conn: ConnectionHandle,
        cursor: Cursor,
        factory: ConnectionFactory,
        usage: &'static str,
    ) -> Self {
        let mut namespace = Namespace::new();
        namespace.bind(CONN, Binding::Connection(conn));
        namespace.bind(CURSOR, Binding::cursor(cursor));
        namespace.bind(GET_CONN, Binding::Function(Function::GetConn(factory)));
        namespace.bind(MSG, Binding::Function(Function::Msg(usage)));
        namespace
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Binds `value` to `name`, replacing any previous binding.
    pub fn bind(&mut self, name: &str, value: Binding) -> Option<Binding> {
        self.bindings.insert(name.to_string(), value)
    }

    /// Bound names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
