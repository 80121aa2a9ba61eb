use thiserror::Error;
use vfs::VfsError;

use crate::process::Pid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsFault {
    #[error("memory read out of bounds: {addr} (size {size})")]
    Read { addr: i64, size: usize },
    #[error("memory write out of bounds: {addr} (size {size})")]
    Write { addr: i64, size: usize },
    #[error("stack overflow: sp={sp} (size {size})")]
    StackOverflow { sp: usize, size: usize },
    #[error("stack underflow")]
    StackUnderflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticFault {
    #[error("division by zero")]
    DivideByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("integer overflow")]
    Overflow,
}

/// Everything a single instruction can raise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error(transparent)]
    Bounds(#[from] BoundsFault),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticFault),
    #[error(transparent)]
    Filesystem(#[from] VfsError),
    #[error("unknown operation: {0}")]
    UnknownOpcode(String),
    #[error("invalid operand for {op}: {reason}")]
    InvalidOperand { op: String, reason: String },
}

impl Fault {
    /// Fatal faults halt the machine (or the offending process).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Fault::Bounds(_) | Fault::Arithmetic(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("no such process: {0}")]
    NoSuchProcess(Pid),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
