//! Filter token parser.
//!
//! Each filter is given on the command line as one token:
//! ```text
//! cols:1:3:x      project columns 1 and 3, then the literal "x"
//! re:1:^ff$       keep rows whose column 1 matches ^ff$
//! split:1:-       explode column 1 on every "-"
//! uniq:0          keep the first row for each value of column 0
//! ```
//!
//! - `:` separates the name from its arguments
//! - column arguments are non-negative integers
//! - the pattern of `re` and `split` is the rest of the token, so it may
//!   contain `:` itself
//! - an unknown name is skipped with a warning; a known name with a bad
//!   argument fails the whole parse

use regex::Regex;
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Separator between a filter name and its arguments.
pub const TOKEN_SEPARATOR: char = ':';

/// One argument of a `cols` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// Copy this column of the input row.
    Index(usize),
    /// Emit this text verbatim.
    Literal(String),
}

impl ColumnRef {
    /// Anything that is not a non-negative integer is a literal.
    pub fn parse(arg: &str) -> Self {
        match arg.parse::<usize>() {
            Ok(index) => ColumnRef::Index(index),
            Err(_) => ColumnRef::Literal(arg.to_string()),
        }
    }
}

/// Parsed filter token.
#[derive(Debug, Clone)]
pub enum Command {
    /// cols:ref:ref:...
    Cols { columns: Vec<ColumnRef> },
    /// re:col:pattern
    Re { column: usize, pattern: Regex },
    /// split:col:pattern
    Split { column: usize, pattern: Regex },
    /// uniq:col
    Uniq { column: usize },
}

impl Command {
    /// Token name, also used as the stage name in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Cols { .. } => "cols",
            Command::Re { .. } => "re",
            Command::Split { .. } => "split",
            Command::Uniq { .. } => "uniq",
        }
    }
}

/// Parse filter tokens, in order, into commands.
///
/// Unknown filter names are logged and dropped. The first malformed
/// argument aborts the whole parse; no partial list is returned.
pub fn parse_commands<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Command>> {
    let mut commands = Vec::with_capacity(tokens.len());

    for token in tokens {
        let token = token.as_ref();
        match parse_command(token)? {
            Some(cmd) => commands.push(cmd),
            None => warn!(token, "unknown filter type, skipping"),
        }
    }

    Ok(commands)
}

/// Parse one token. Returns `Ok(None)` for an unrecognised name.
pub fn parse_command(token: &str) -> Result<Option<Command>> {
    let (name, rest) = match token.split_once(TOKEN_SEPARATOR) {
        Some((name, rest)) => (name, Some(rest)),
        None => (token, None),
    };

    let cmd = match name {
        "cols" => parse_cols(rest),
        "re" => {
            let (column, pattern) = parse_column_and_pattern(token, rest)?;
            Command::Re { column, pattern }
        }
        "split" => {
            let (column, pattern) = parse_column_and_pattern(token, rest)?;
            Command::Split { column, pattern }
        }
        "uniq" => parse_uniq(token, rest)?,
        _ => return Ok(None),
    };

    Ok(Some(cmd))
}

fn parse_cols(rest: Option<&str>) -> Command {
    let columns = match rest {
        Some(rest) => rest.split(TOKEN_SEPARATOR).map(ColumnRef::parse).collect(),
        None => Vec::new(),
    };
    Command::Cols { columns }
}

fn parse_uniq(token: &str, rest: Option<&str>) -> Result<Command> {
    let rest = rest.ok_or_else(|| missing(token, "column"))?;
    let (arg, extra) = match rest.split_once(TOKEN_SEPARATOR) {
        Some((arg, extra)) => (arg, Some(extra)),
        None => (rest, None),
    };
    if let Some(extra) = extra {
        return Err(PipelineError::UnexpectedArgument {
            token: token.to_string(),
            arg: extra.to_string(),
        });
    }
    let column = parse_column(token, arg)?;
    Ok(Command::Uniq { column })
}

/// Parse `col:pattern`, where the pattern runs to the end of the token.
fn parse_column_and_pattern(token: &str, rest: Option<&str>) -> Result<(usize, Regex)> {
    let rest = rest.ok_or_else(|| missing(token, "column"))?;
    let (arg, pattern) = rest
        .split_once(TOKEN_SEPARATOR)
        .ok_or_else(|| missing(token, "pattern"))?;
    let column = parse_column(token, arg)?;
    let pattern = Regex::new(pattern).map_err(|source| PipelineError::BadPattern {
        token: token.to_string(),
        pattern: pattern.to_string(),
        source,
    })?;
    Ok((column, pattern))
}

fn parse_column(token: &str, arg: &str) -> Result<usize> {
    arg.parse().map_err(|_| PipelineError::BadColumn {
        token: token.to_string(),
        arg: arg.to_string(),
    })
}

fn missing(token: &str, what: &'static str) -> PipelineError {
    PipelineError::MissingArgument {
        token: token.to_string(),
        what,
    }
}
