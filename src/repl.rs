use crate::core::db::{render_row, render_table};
use crate::core::{DbShellError, Result};
use crate::namespace::{Binding, Function, Namespace};
use reedline::{DefaultPrompt, Reedline, Signal};
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Method calls understood on connections and cursors.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    Cursor,
    Execute(String),
    FetchOne,
    FetchAll,
    Unsupported(String),
}

/// Attributes readable on cursors.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Description,
    RowCount,
    Unsupported(String),
}

/// Right-hand side of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `name`
    Name(String),
    /// `name()`
    Call(String),
    /// `name.method(...)`
    Method { receiver: String, method: Method },
    /// `name.attribute`
    Attribute { receiver: String, attribute: Attribute },
}

/// Represents a parsed session statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Empty,
    Exit,
    Eval(Expr),
    Assign { name: String, value: Expr },
    Unknown(String),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a user input string into a corresponding `Command`.
///
/// One statement per line: an optional `name =` followed by a name, a call,
/// a method call or an attribute read.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Empty;
    }
    if matches!(input, "exit" | "quit" | "exit()" | "quit()") {
        return Command::Exit;
    }

    // An `=` only starts an assignment when it comes before any call or quote.
    let boundary = input.find(['(', '"', '\'']).unwrap_or(input.len());
    if let Some(eq) = input[..boundary].find('=') {
        let name = input[..eq].trim();
        let rest = &input[eq + 1..];
        if is_identifier(name) && !rest.starts_with('=') {
            return match parse_expr(rest.trim()) {
                Some(value) => Command::Assign {
                    name: name.to_string(),
                    value,
                },
                None => Command::Unknown(input.to_string()),
            };
        }
        return Command::Unknown(input.to_string());
    }

    match parse_expr(input) {
        Some(expr) => Command::Eval(expr),
        None => Command::Unknown(input.to_string()),
    }
}

fn parse_expr(input: &str) -> Option<Expr> {
    if is_identifier(input) {
        return Some(Expr::Name(input.to_string()));
    }
    if let Some(name) = input.strip_suffix("()") {
        if is_identifier(name.trim_end()) {
            return Some(Expr::Call(name.trim_end().to_string()));
        }
    }

    let (receiver, member) = input.split_once('.')?;
    let receiver = receiver.trim();
    if !is_identifier(receiver) {
        return None;
    }
    let member = member.trim();

    if is_identifier(member) {
        let attribute = match member {
            "description" => Attribute::Description,
            "rowcount" => Attribute::RowCount,
            other => Attribute::Unsupported(other.to_string()),
        };
        return Some(Expr::Attribute {
            receiver: receiver.to_string(),
            attribute,
        });
    }

    let (name, args) = member.strip_suffix(')')?.split_once('(')?;
    let name = name.trim();
    if !is_identifier(name) {
        return None;
    }
    let args = args.trim();
    let method = match (name, args) {
        ("cursor", "") => Method::Cursor,
        ("fetchone", "") => Method::FetchOne,
        ("fetchall", "") => Method::FetchAll,
        ("execute", args) => Method::Execute(parse_string_literal(args)?),
        (other, _) => Method::Unsupported(other.to_string()),
    };
    Some(Expr::Method {
        receiver: receiver.to_string(),
        method,
    })
}

/// Accepts `"..."` or `'...'`.
///
/// A backslash escapes either quote, another backslash, `n` and `t`; before
/// any other character it is kept as is. An unescaped closing quote must end
/// the literal.
fn parse_string_literal(input: &str) -> Option<String> {
    let mut chars = input.chars();
    let quote = chars.next().filter(|c| *c == '"' || *c == '\'')?;
    let mut literal = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                escaped @ ('\'' | '"' | '\\') => literal.push(escaped),
                'n' => literal.push('\n'),
                't' => literal.push('\t'),
                other => {
                    literal.push('\\');
                    literal.push(other);
                }
            },
            c if c == quote => return chars.as_str().is_empty().then_some(literal),
            c => literal.push(c),
        }
    }
    None
}

/// Something the session reads statements from.
pub trait LineSource {
    /// Next line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Reads lines from any buffered reader, e.g. piped stdin.
pub struct BufferedLines<R> {
    reader: R,
}

impl<R: BufRead> BufferedLines<R> {
    pub fn new(reader: R) -> Self {
        BufferedLines { reader }
    }
}

impl<R: BufRead> LineSource for BufferedLines<R> {
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// Interactive line editor for terminals.
///
/// Ctrl-C abandons the current line, Ctrl-D ends the input.
pub struct EditorLines {
    editor: Reedline,
    prompt: DefaultPrompt,
}

impl EditorLines {
    pub fn new() -> Self {
        EditorLines {
            editor: Reedline::create(),
            prompt: DefaultPrompt::default(),
        }
    }
}

impl Default for EditorLines {
    fn default() -> Self {
        EditorLines::new()
    }
}

impl LineSource for EditorLines {
    fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            match self.editor.read_line(&self.prompt)? {
                Signal::Success(line) => return Ok(Some(line)),
                Signal::CtrlD => return Ok(None),
                _ => continue,
            }
        }
    }
}

/// Why the session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    EndOfInput,
    Exit,
}

/// What evaluating an expression produced.
enum Evaluated {
    Value(Binding),
    Text(String),
}

/// The read-eval-print loop over a namespace.
pub struct Session {
    namespace: Namespace,
}

impl Session {
    pub fn new(namespace: Namespace) -> Self {
        Session { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Runs statements from `source` until it is exhausted or `exit` is entered.
    ///
    /// Results go to `out`, statement errors to `err`; neither ends the loop.
    /// Only a failing `source` or a failing `out`/`err` write returns `Err`.
    pub fn run(
        &mut self,
        source: &mut dyn LineSource,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<SessionEnd> {
        info!("Session started with {:?}", self.namespace.names());
        loop {
            let line = match source.read_line()? {
                Some(line) => line,
                None => {
                    info!("Session ended at end of input");
                    return Ok(SessionEnd::EndOfInput);
                }
            };

            let command = parse_command(&line);
            debug!("Parsed {:?}", command);
            match self.execute(command, out) {
                Ok(Some(end)) => {
                    info!("Session ended by exit");
                    return Ok(end);
                }
                Ok(None) => {}
                Err(DbShellError::Io(e)) => return Err(DbShellError::Io(e)),
                Err(e) => writeln!(err, "Error: {}", e)?,
            }
            out.flush()?;
        }
    }

    /// Executes one parsed statement; `Some` means the session should stop.
    pub fn execute(&mut self, command: Command, out: &mut dyn Write) -> Result<Option<SessionEnd>> {
        match command {
            Command::Empty => {}
            Command::Exit => return Ok(Some(SessionEnd::Exit)),
            Command::Unknown(input) => {
                return Err(DbShellError::Session(format!("invalid syntax: {}", input)));
            }
            Command::Eval(expr) => match self.eval(&expr)? {
                Evaluated::Value(value) => writeln!(out, "{}", value)?,
                Evaluated::Text(text) => writeln!(out, "{}", text)?,
            },
            Command::Assign { name, value } => match self.eval(&value)? {
                Evaluated::Value(value) => {
                    self.namespace.bind(&name, value);
                }
                Evaluated::Text(_) => {
                    return Err(DbShellError::Session(format!(
                        "only connections, cursors and functions can be bound to '{}'",
                        name
                    )));
                }
            },
        }
        Ok(None)
    }

    fn lookup(&self, name: &str) -> Result<Binding> {
        self.namespace
            .get(name)
            .cloned()
            .ok_or_else(|| DbShellError::Session(format!("name '{}' is not defined", name)))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Evaluated> {
        match expr {
            Expr::Name(name) => self.lookup(name).map(Evaluated::Value),
            Expr::Call(name) => match self.lookup(name)? {
                Binding::Function(Function::Msg(usage)) => Ok(Evaluated::Text(usage.to_string())),
                Binding::Function(Function::GetConn(factory)) => {
                    factory.connect().map(|conn| Evaluated::Value(Binding::Connection(conn)))
                }
                other => Err(DbShellError::Session(format!(
                    "'{}' object is not callable",
                    other.kind()
                ))),
            },
            Expr::Method { receiver, method } => {
                let target = self.lookup(receiver)?;
                call_method(target, method)
            }
            Expr::Attribute { receiver, attribute } => match (self.lookup(receiver)?, attribute) {
                (Binding::Cursor(cursor), Attribute::Description) => {
                    Ok(Evaluated::Text(match cursor.borrow().description() {
                        Some(columns) => columns.join(", "),
                        None => "None".to_string(),
                    }))
                }
                (Binding::Cursor(cursor), Attribute::RowCount) => {
                    Ok(Evaluated::Text(cursor.borrow().rowcount().to_string()))
                }
                (other, attribute) => Err(no_attribute(&other, attribute_name(attribute))),
            },
        }
    }
}

fn attribute_name(attribute: &Attribute) -> &str {
    match attribute {
        Attribute::Description => "description",
        Attribute::RowCount => "rowcount",
        Attribute::Unsupported(name) => name,
    }
}

fn method_name(method: &Method) -> &str {
    match method {
        Method::Cursor => "cursor",
        Method::Execute(_) => "execute",
        Method::FetchOne => "fetchone",
        Method::FetchAll => "fetchall",
        Method::Unsupported(name) => name,
    }
}

fn no_attribute(binding: &Binding, name: &str) -> DbShellError {
    DbShellError::Session(format!("'{}' object has no attribute '{}'", binding.kind(), name))
}

fn call_method(target: Binding, method: &Method) -> Result<Evaluated> {
    match (&target, method) {
        (Binding::Connection(conn), Method::Cursor) => Ok(Evaluated::Value(Binding::cursor(conn.cursor()))),
        (Binding::Connection(conn), Method::Execute(sql)) => {
            let mut cursor = conn.cursor();
            let count = cursor.execute(sql)?;
            Ok(Evaluated::Text(match cursor.description().map(<[String]>::to_vec) {
                Some(columns) => render_table(&columns, &cursor.fetchall()),
                None => format!("\n({} rows)", count),
            }))
        }
        (Binding::Cursor(cursor), Method::Execute(sql)) => {
            let count = cursor.borrow_mut().execute(sql)?;
            Ok(Evaluated::Text(count.to_string()))
        }
        (Binding::Cursor(cursor), Method::FetchOne) => Ok(Evaluated::Text(
            cursor
                .borrow_mut()
                .fetchone()
                .map(|row| render_row(&row))
                .unwrap_or_else(|| "None".to_string()),
        )),
        (Binding::Cursor(cursor), Method::FetchAll) => {
            let mut cursor = cursor.borrow_mut();
            let columns = cursor.description().map(<[String]>::to_vec).unwrap_or_default();
            let rows = cursor.fetchall();
            Ok(Evaluated::Text(render_table(&columns, &rows)))
        }
        (Binding::Cursor(_), Method::Cursor) => Err(no_attribute(&target, "cursor")),
        _ => Err(no_attribute(&target, method_name(method))),
    }
}
