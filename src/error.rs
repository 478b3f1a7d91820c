use thiserror::Error;

/// Terminal input errors for the CLI surface.
///
/// Transport and parse failures are soft-failed inside the modules that
/// hit them; only bad user input ends the process (exit code 1).
#[derive(Debug, Error)]
pub enum InputError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file type: {0}. Use package.json, package-lock.json, or yarn.lock")]
    UnsupportedFile(String),

    #[error("no dependencies found in {0}")]
    NoDependencies(String),
}
