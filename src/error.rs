//! Error kinds surfaced while bringing the runner up.

use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// COM could not be initialised on the UI thread.
    #[error("COM initialization failed: {0}")]
    OsInit(String),

    /// The top-level window could not be created, or `on_create` refused it.
    #[error("window creation failed: {0}")]
    WindowCreate(String),

    /// The view controller came back without an engine or a view.
    #[error("Flutter engine initialization failed: {0}")]
    EngineInit(String),

    /// A console redirection step failed. Never fatal.
    #[error("console setup failed: {0}")]
    ConsoleSetup(String),

    /// A command-line argument was not valid UTF-16. Never fatal.
    #[error("argument {index} is not valid UTF-16")]
    Transcode { index: usize },
}

impl RunnerError {
    /// Whether this error aborts startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunnerError::OsInit(_) | RunnerError::WindowCreate(_) | RunnerError::EngineInit(_)
        )
    }

    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_fatal() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}
