#![allow(non_camel_case_types, non_upper_case_globals, non_snake_case)] // FFI names follow flutter_windows.h

//! Windows host for the Trainova Flutter app.
//!
//! - Attaches a console for debugging when appropriate
//! - Initializes COM (STA) for Flutter plugins and shell dialogs
//! - Builds the Dart project from `data/` and the command line
//! - Hosts the Flutter view in a native Win32 window, shown on first frame
//! - Runs the standard message loop and cleans up on exit

pub mod arguments;
pub mod console;
pub mod constants;
pub mod dart_project;
pub mod error;
pub mod flutter_bindings;
pub mod flutter_dll;
pub mod flutter_window;
pub mod plugin_loader;
pub mod runner;
#[cfg(test)]
mod test_support;
pub mod view_controller;
#[cfg(windows)]
pub mod win32_window;
pub mod window;

use std::{process::ExitCode, sync::Once};

use env_logger::{Builder, Env};
use log::{LevelFilter, debug, error, info};

/// Program entry point.
///
/// 1. Initialize logging and attach a console if wanted.
/// 2. Hand the command line to [`runner::run_with`], which initializes COM,
///    creates the Flutter window centered on the primary monitor, runs the
///    message loop until the window closes and uninitializes COM.
pub fn run() -> ExitCode {
    init_logging();
    let console = console::ensure_console();
    debug!("Console setup: {:?}", console);

    match platform::run() {
        Ok(()) => {
            info!("Application exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}

#[cfg(windows)]
mod platform {
    use windows::Win32::{
        System::Com::{COINIT_APARTMENTTHREADED, COINIT_DISABLE_OLE1DDE, CoInitializeEx, CoUninitialize},
        UI::WindowsAndMessaging::{
            DispatchMessageW, GetMessageW, GetSystemMetrics, MSG, SM_CXSCREEN, SM_CYSCREEN,
            TranslateMessage,
        },
    };

    use crate::{
        arguments,
        dart_project::{DartProject, executable_directory},
        error::RunnerError,
        flutter_dll::FlutterDll,
        flutter_window::FlutterWindow,
        runner::{Platform, run_with},
        view_controller::FlutterEmbedder,
        win32_window::Win32Window,
        window::{Point, Size},
    };

    pub(super) fn run() -> Result<(), RunnerError> {
        run_with(&mut Win32Platform, arguments::command_line_arguments())
    }

    struct Win32Platform;

    impl Platform for Win32Platform {
        type Window = Box<Win32Window>;

        fn initialize_com(&mut self) -> Result<(), RunnerError> {
            unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE) }
                .ok()
                .map_err(|e| RunnerError::OsInit(e.to_string()))
        }

        fn uninitialize_com(&mut self) {
            unsafe { CoUninitialize() };
        }

        fn screen_size(&self) -> Size {
            unsafe { Size::new(GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
        }

        fn create_window(
            &mut self,
            project: DartProject,
            title: &str,
            origin: Point,
            size: Size,
        ) -> Result<Box<Win32Window>, RunnerError> {
            let exe_dir = executable_directory().map_err(|e| RunnerError::EngineInit(format!("{e:#}")))?;
            let dll = FlutterDll::get_for(&exe_dir).map_err(|e| RunnerError::EngineInit(format!("{e:#}")))?;
            let embedder = FlutterEmbedder::new(dll, exe_dir);

            let window = Win32Window::new(Box::new(FlutterWindow::new(embedder, project)));
            window.create(title, origin, size)?;
            Ok(window)
        }

        fn set_quit_on_close(&mut self, window: &mut Box<Win32Window>, quit_on_close: bool) {
            window.set_quit_on_close(quit_on_close);
        }

        fn run_message_loop(&mut self, _window: &mut Box<Win32Window>) {
            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use crate::error::RunnerError;

    pub(super) fn run() -> Result<(), RunnerError> {
        Err(RunnerError::OsInit("this runner only supports Windows".into()))
    }
}

// Logging may be initialised by an embedding host first; only try once.
static LOGGER_INIT: Once = Once::new();

fn init_logging() {
    LOGGER_INIT.call_once(|| {
        let _ = Builder::from_env(Env::default().default_filter_or("debug"))
            .filter_module("goblin", LevelFilter::Off)
            .try_init();
    });
}
