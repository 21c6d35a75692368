//! Error taxonomy.
//!
//! One `thiserror`-derived enum per failure domain, matching the split
//! `fuel-vm` draws between `InterpreterError` (outer, user-facing) and
//! `RuntimeError` (recoverable-vs-halt). Here the outer enum is
//! [`SearchError`]; [`LexError`], [`ParseError`], [`EvalError`], and
//! [`TargetError`] are the domains it wraps.

use thiserror::Error;

/// Lexer failures. Non-recoverable for the current token; the parser counts
/// these and resumes scanning at the next end-of-line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("invalid number literal")]
    InvalidNumber,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("expected '=' after '='")]
    UnterminatedAssign,
}

/// Parse failures. The parser accumulates an error count and, on any
/// failure, discards the partial tree rather than returning one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("invalid operands for operator")]
    InvalidOperandTypes,
    #[error("expected a factor")]
    ExpectedFactor,
    #[error("{0} parse error(s)")]
    Accumulated(usize),
}

/// Evaluation-time failures. A `Deref` read failure or integer division by
/// zero; the search/filter driver treats these as "no hit, keep scanning",
/// not a scan abort.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("division or modulo by zero")]
    DivisionByZero,
    #[error("bitwise operator applied to a floating-point operand")]
    BitwiseOnFloat,
    #[error("dereference failed to read target memory")]
    DerefReadFailed,
}

/// `Target` capability failures.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to open {0}")]
    Open(String, #[source] std::io::Error),
    #[error("failed to parse a line of {0}")]
    MapsFormat(&'static str),
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    #[error("ptrace stop failed")]
    StopFailed(#[source] nix::Error),
    #[error("ptrace run failed")]
    RunFailed(#[source] nix::Error),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

/// Top-level error returned by [`crate::search::search`] and
/// [`crate::search::filter`].
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("no memory regions matched the requested protection mask")]
    NoRegions,
}
