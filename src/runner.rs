//! Startup and shutdown sequencing, independent of the OS calls behind it.
//!
//! COM is only uninitialized when its initialization succeeded, and the
//! window is always gone before that happens.

use log::info;

use crate::{
    constants::{DATA_DIRECTORY, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH, WINDOW_TITLE},
    dart_project::DartProject,
    error::RunnerError,
    window::{Point, Size, centered_origin},
};

/// The process-level OS services the runner drives.
pub trait Platform {
    type Window;

    /// Single-threaded apartment, OLE1 DDE disabled.
    fn initialize_com(&mut self) -> Result<(), RunnerError>;
    fn uninitialize_com(&mut self);

    /// Size of the primary monitor in pixels.
    fn screen_size(&self) -> Size;

    /// Creates the hidden top-level window hosting the engine for `project`.
    fn create_window(
        &mut self,
        project: DartProject,
        title: &str,
        origin: Point,
        size: Size,
    ) -> Result<Self::Window, RunnerError>;

    fn set_quit_on_close(&mut self, window: &mut Self::Window, quit_on_close: bool);

    /// Pumps messages until the queue reports `WM_QUIT`.
    fn run_message_loop(&mut self, window: &mut Self::Window);
}

/// Runs the app on `platform`, forwarding `arguments` to the Dart entrypoint.
pub fn run_with<P: Platform>(platform: &mut P, arguments: Vec<String>) -> Result<(), RunnerError> {
    platform.initialize_com()?;
    info!("[Runner] COM initialized (STA)");

    let result = run_window(platform, arguments);
    platform.uninitialize_com();
    result
}

fn run_window<P: Platform>(platform: &mut P, arguments: Vec<String>) -> Result<(), RunnerError> {
    let mut project = DartProject::new(DATA_DIRECTORY);
    if !arguments.is_empty() {
        project.set_dart_entrypoint_arguments(arguments);
    }

    let size = Size::new(DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT);
    let origin = centered_origin(platform.screen_size(), size);

    let mut window = platform.create_window(project, WINDOW_TITLE, origin, size)?;
    platform.set_quit_on_close(&mut window, true);

    info!("[Runner] Entering message loop");
    platform.run_message_loop(&mut window);
    info!("[Runner] Exited message loop");

    drop(window);
    Ok(())
}
