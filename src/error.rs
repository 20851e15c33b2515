/*!
Shared error type for the assembler, linker, and Mini32 compiler.

Build-time failures (configuration, assembly, link errors — taxonomy
buckets 1-3 of the error handling design) are represented uniformly so
every binary can print `file:line: message` and exit non-zero. Runtime
faults (bucket 5) never surface here: the virtual machine reports halts
through `MachineState`, not `Result`.
*/

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Renders the `file:line: ` / `file: ` / `` prefix shared by the three
/// build-time variants, ahead of their own message.
fn loc_prefix(file: &Option<PathBuf>, line: &Option<usize>) -> String {
    match (file, line) {
        (Some(file), Some(line)) => format!("{}:{}: ", file.display(), line),
        (Some(file), None) => format!("{}: ", file.display()),
        (None, _) => String::new(),
    }
}

fn io_display(file: &Option<PathBuf>, source: &std::io::Error) -> String {
    match file {
        Some(file) => format!("{}: {source}", file.display()),
        None => source.to_string(),
    }
}

/// A build-time failure: configuration, assembly, or link error.
#[derive(Debug, Error)]
pub enum EduvmError {
    /// Missing file, unreadable source, invalid header value.
    #[error("{}{message}", loc_prefix(file, line))]
    Config {
        file: Option<PathBuf>,
        line: Option<usize>,
        message: String,
    },
    /// Unknown mnemonic, arity mismatch, undefined label, malformed expression.
    #[error("{}{message}", loc_prefix(file, line))]
    Assembly {
        file: Option<PathBuf>,
        line: Option<usize>,
        message: String,
    },
    /// Module layout overlap, unresolved extern symbol, mismatched extern sites.
    #[error("{}{message}", loc_prefix(file, line))]
    Link {
        file: Option<PathBuf>,
        line: Option<usize>,
        message: String,
    },
    /// Any underlying I/O failure reading or writing a source/image file.
    #[error("{}", io_display(file, source))]
    Io {
        file: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl EduvmError {
    pub fn config(message: impl Into<String>) -> Self {
        EduvmError::Config {
            file: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn assembly(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        EduvmError::Assembly {
            file: Some(file.into()),
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn link(message: impl Into<String>) -> Self {
        EduvmError::Link {
            file: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn io(file: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EduvmError::Io {
            file: Some(file.into()),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EduvmError>;

/// A non-fatal diagnostic: undefined pointer variable resolved to 0, or a
/// pointer variable defined but never used. Collected rather than raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: warning: {}", file.display(), line, self.message),
            (Some(file), None) => write!(f, "{}: warning: {}", file.display(), self.message),
            (None, _) => write!(f, "warning: {}", self.message),
        }
    }
}
