//! User-visible diagnostics: one line each, `path:line:col: severity: message`, matching the
//! contract the command-line interface promises. `fatal` is the only exit point from a core pass
//! that ever terminates the process; everything upstream of it threads a `Result` instead.

use std::fmt;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// One diagnostic line. `path`/`location` are omitted when a message isn't tied to a specific
/// source position (most compiler-backend diagnostics — this crate has no source-location
/// tracking of its own, since that belongs to the external front end).
pub struct Diagnostic {
    pub path: Option<PathBuf>,
    pub location: Option<(u32, u32)>,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic { path: None, location: None, severity, message: message.into() }
    }

    pub fn at(mut self, path: impl Into<PathBuf>, line: u32, col: u32) -> Self {
        self.path = Some(path.into());
        self.location = Some((line, col));
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}:", path.display())?;
            if let Some((line, col)) = self.location {
                write!(f, "{line}:{col}:")?;
            }
            write!(f, " ")?;
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Print `diag` to stderr and mirror it into the `log` facade at the matching level.
pub fn report(diag: &Diagnostic) {
    match diag.severity {
        Severity::Info => log::info!("{diag}"),
        Severity::Warning => log::warn!("{diag}"),
        Severity::Error | Severity::Fatal => log::error!("{diag}"),
    }
    eprintln!("{diag}");
}

/// Report a fatal diagnostic and terminate the process with a non-zero exit code. There is no
/// recovery path past this point: every core pass is documented to either succeed completely or
/// leave the caller with nothing worth salvaging.
pub fn fatal(message: impl Into<String>) -> ! {
    report(&Diagnostic::new(Severity::Fatal, message));
    std::process::exit(1);
}
