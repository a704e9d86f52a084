//! Attaches stdout/stderr to a console for debugging a GUI-subsystem build.
//!
//! Debug builds always try; release builds only when a debugger is attached.
//! The parent's console is preferred, a fresh one is allocated otherwise.
//! Having no console at all is fine.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use crate::error::RunnerError;

/// OS operations behind [`ConsoleState::ensure`].
pub trait ConsoleOps {
    /// Build/debugger policy: should a console be set up at all.
    fn should_attach(&self) -> bool;

    /// `AttachConsole(ATTACH_PARENT_PROCESS)`.
    fn attach_parent(&mut self) -> bool;

    /// `AllocConsole()`.
    fn allocate(&mut self) -> bool;

    /// Points the standard streams at a freshly allocated console.
    fn redirect_std_streams(&mut self) -> Result<(), RunnerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// An earlier call already ran.
    AlreadyHandled,
    /// Policy said no console.
    Skipped,
    Attached,
    Allocated,
    /// Neither attaching nor allocating worked.
    Unavailable,
}

/// Write-once record of whether console setup has run.
pub struct ConsoleState {
    handled: AtomicBool,
}

impl ConsoleState {
    pub const fn new() -> Self {
        Self { handled: AtomicBool::new(false) }
    }

    /// Runs console setup on the first call only.
    pub fn ensure(&self, ops: &mut dyn ConsoleOps) -> ConsoleOutcome {
        if self.handled.swap(true, Ordering::AcqRel) {
            return ConsoleOutcome::AlreadyHandled;
        }
        if !ops.should_attach() {
            return ConsoleOutcome::Skipped;
        }
        if ops.attach_parent() {
            debug!("[Console] Attached to parent console");
            return ConsoleOutcome::Attached;
        }
        if !ops.allocate() {
            debug!("[Console] No console available");
            return ConsoleOutcome::Unavailable;
        }
        if let Err(e) = ops.redirect_std_streams() {
            warn!("[Console] {e}");
        }
        ConsoleOutcome::Allocated
    }
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new()
    }
}

static CONSOLE: ConsoleState = ConsoleState::new();

/// Descriptors 0-2 are the duplication targets themselves and stay open.
#[cfg_attr(not(windows), allow(dead_code))]
fn is_standard_descriptor(fd: i32) -> bool {
    (0..=2).contains(&fd)
}

/// Process-wide, idempotent console setup.
#[cfg(windows)]
pub fn ensure_console() -> ConsoleOutcome {
    CONSOLE.ensure(&mut win32::Win32Console)
}

#[cfg(not(windows))]
pub fn ensure_console() -> ConsoleOutcome {
    struct Inherited;
    impl ConsoleOps for Inherited {
        fn should_attach(&self) -> bool {
            false
        }
        fn attach_parent(&mut self) -> bool {
            false
        }
        fn allocate(&mut self) -> bool {
            false
        }
        fn redirect_std_streams(&mut self) -> Result<(), RunnerError> {
            Ok(())
        }
    }
    CONSOLE.ensure(&mut Inherited)
}

#[cfg(windows)]
mod win32 {
    use std::io::Write;

    use windows::{
        core::w,
        Win32::{
            Foundation::{GENERIC_READ, GENERIC_WRITE},
            Storage::FileSystem::{
                CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
            },
            System::{
                Console::{
                    ATTACH_PARENT_PROCESS, AllocConsole, AttachConsole, STD_ERROR_HANDLE,
                    STD_OUTPUT_HANDLE, SetStdHandle,
                },
                Diagnostics::Debug::IsDebuggerPresent,
            },
        },
    };

    use super::{ConsoleOps, is_standard_descriptor};
    use crate::{error::RunnerError, flutter_dll::FlutterDll};

    const O_TEXT: i32 = 0x4000;

    unsafe extern "C" {
        fn _open_osfhandle(osfhandle: isize, flags: i32) -> i32;
        fn _dup2(fd1: i32, fd2: i32) -> i32;
        fn _close(fd: i32) -> i32;
    }

    pub(super) struct Win32Console;

    impl ConsoleOps for Win32Console {
        fn should_attach(&self) -> bool {
            cfg!(debug_assertions) || unsafe { IsDebuggerPresent() }.as_bool()
        }

        fn attach_parent(&mut self) -> bool {
            unsafe { AttachConsole(ATTACH_PARENT_PROCESS) }.is_ok()
        }

        fn allocate(&mut self) -> bool {
            unsafe { AllocConsole() }.is_ok()
        }

        fn redirect_std_streams(&mut self) -> Result<(), RunnerError> {
            let conout = unsafe {
                CreateFileW(
                    w!("CONOUT$"),
                    (GENERIC_READ | GENERIC_WRITE).0,
                    FILE_SHARE_READ | FILE_SHARE_WRITE,
                    None,
                    OPEN_EXISTING,
                    FILE_ATTRIBUTE_NORMAL,
                    None,
                )
            }
            .map_err(|e| RunnerError::ConsoleSetup(format!("CONOUT$: {e}")))?;

            let mut failures = Vec::new();
            if let Err(e) = unsafe { SetStdHandle(STD_OUTPUT_HANDLE, conout) } {
                failures.push(format!("stdout handle: {e}"));
            }
            if let Err(e) = unsafe { SetStdHandle(STD_ERROR_HANDLE, conout) } {
                failures.push(format!("stderr handle: {e}"));
            }

            let fd = unsafe { _open_osfhandle(conout.0 as isize, O_TEXT) };
            if fd < 0 {
                failures.push("_open_osfhandle".to_string());
            } else {
                for target in [1, 2] {
                    if unsafe { _dup2(fd, target) } != 0 {
                        failures.push(format!("_dup2 onto {target}"));
                    }
                }
                if !is_standard_descriptor(fd) {
                    unsafe { _close(fd) };
                }
            }

            let _ = std::io::stdout().flush();
            let _ = std::io::stderr().flush();
            match FlutterDll::get() {
                Ok(dll) => unsafe { (dll.FlutterDesktopResyncOutputStreams)() },
                Err(e) => failures.push(format!("engine stream resync: {e:#}")),
            }

            if failures.is_empty() {
                Ok(())
            } else {
                Err(RunnerError::ConsoleSetup(failures.join("; ")))
            }
        }
    }
}
