//! The embedder surface the Flutter window drives.
//!
//! [`ViewController`] and [`Embedder`] are the seams; the Flutter-backed
//! implementations live below and talk to `flutter_windows.dll`.

use std::{
    ffi::{CString, c_char, c_void},
    path::{Path, PathBuf},
    ptr,
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};

use crate::{
    dart_project::DartProject,
    flutter_bindings as b,
    flutter_dll::FlutterDll,
    plugin_loader,
    window::{NativeHandle, WindowMessage},
};

/// One-shot notification raised when the engine has produced a frame.
pub type NextFrameCallback = Box<dyn FnOnce()>;

/// Per-window facade over an engine instance and its native child view.
pub trait ViewController {
    /// Whether the controller holds a live engine.
    fn has_engine(&self) -> bool;

    /// The engine's native child window, if one was created.
    fn view_handle(&self) -> Option<NativeHandle>;

    /// Offers a top-level window message to the engine and its plugins.
    /// `Some` means the message was consumed with that result.
    fn handle_top_level_window_proc(&mut self, msg: &WindowMessage) -> Option<isize>;

    /// Installs, replaces or (with `None`) clears the next-frame callback.
    fn set_next_frame_callback(&mut self, callback: Option<NextFrameCallback>);

    /// Asks the engine to render a frame right away.
    fn force_redraw(&mut self);

    /// Asks the engine to re-read the system font collection.
    fn reload_system_fonts(&mut self);
}

/// Builds view controllers and binds plugins to them.
pub trait Embedder {
    type Controller: ViewController;

    fn create_view_controller(
        &self,
        width: i32,
        height: i32,
        project: &DartProject,
    ) -> Result<Self::Controller>;

    fn register_plugins(&self, controller: &Self::Controller);
}

/// [`Embedder`] backed by `flutter_windows.dll`, loading plugins from
/// `plugin_dir`.
pub struct FlutterEmbedder {
    dll: Arc<FlutterDll>,
    plugin_dir: PathBuf,
}

impl FlutterEmbedder {
    pub fn new(dll: Arc<FlutterDll>, plugin_dir: impl Into<PathBuf>) -> Self {
        Self { dll, plugin_dir: plugin_dir.into() }
    }
}

impl Embedder for FlutterEmbedder {
    type Controller = FlutterViewController;

    fn create_view_controller(
        &self,
        width: i32,
        height: i32,
        project: &DartProject,
    ) -> Result<FlutterViewController> {
        FlutterViewController::create(self.dll.clone(), width, height, project)
    }

    fn register_plugins(&self, controller: &FlutterViewController) {
        if let Err(e) =
            plugin_loader::load_and_register_plugins(&self.plugin_dir, &self.dll, controller.engine)
        {
            error!("[View Controller] Plugin registration failed: {:?}", e);
        }
    }
}

unsafe extern "C" fn next_frame_trampoline(user_data: *mut c_void) {
    let slot = user_data as *mut Option<NextFrameCallback>;
    // Take first: the callback may end up clearing the slot itself.
    let callback = unsafe { (*slot).take() };
    if let Some(callback) = callback {
        callback();
    }
}

/// Heap cell handed to the engine as the next-frame `user_data`.
///
/// The engine may call the registered trampoline at any point until the
/// controller is destroyed, so the cell stays allocated and registered
/// until then. Clearing only empties it; the engine never receives a null
/// function pointer.
struct NextFrameSlot {
    cell: *mut Option<NextFrameCallback>,
}

impl NextFrameSlot {
    fn new() -> Self {
        Self { cell: Box::into_raw(Box::new(None)) }
    }

    /// Stores `callback` and hands the trampoline to `register`.
    fn install(
        &mut self,
        callback: NextFrameCallback,
        register: impl FnOnce(b::VoidCallback, *mut c_void),
    ) {
        unsafe { *self.cell = Some(callback) };
        register(Some(next_frame_trampoline), self.cell as *mut c_void);
    }

    fn clear(&mut self) {
        unsafe { *self.cell = None };
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        unsafe { (*self.cell).is_some() }
    }
}

impl Drop for NextFrameSlot {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.cell) });
    }
}

/// Owns a `FlutterDesktopViewControllerRef` and, through it, the engine and
/// the child HWND.
pub struct FlutterViewController {
    dll: Arc<FlutterDll>,
    controller: b::FlutterDesktopViewControllerRef,
    engine: b::FlutterDesktopEngineRef,
    view: b::FlutterDesktopViewRef,
    // Dropped after `Drop::drop` has destroyed the controller.
    next_frame: NextFrameSlot,
}

impl FlutterViewController {
    /// Creates the engine from `project` and a view controller of the given
    /// physical size around it.
    pub fn create(
        dll: Arc<FlutterDll>,
        width: i32,
        height: i32,
        project: &DartProject,
    ) -> Result<Self> {
        let paths = project.engine_paths()?;
        paths.validate()?;

        let assets_w = to_wide(&paths.assets);
        let icu_w = to_wide(&paths.icu_data);
        let aot_w = to_wide(&paths.aot_library);

        let args_c: Vec<CString> = project
            .dart_entrypoint_arguments()
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<_, _>>()
            .context("Dart entrypoint argument contains a NUL byte")?;
        let mut args_ptrs: Vec<*const c_char> = args_c.iter().map(|c| c.as_ptr()).collect();

        let props = b::FlutterDesktopEngineProperties {
            assets_path: assets_w.as_ptr(),
            icu_data_path: icu_w.as_ptr(),
            aot_library_path: aot_w.as_ptr(),
            dart_entrypoint: ptr::null(),
            dart_entrypoint_argc: args_ptrs.len() as i32,
            dart_entrypoint_argv: if args_ptrs.is_empty() {
                ptr::null_mut()
            } else {
                args_ptrs.as_mut_ptr()
            },
            gpu_preference: b::FlutterDesktopGpuPreference_NoPreference,
            ui_thread_policy: b::FlutterDesktopUIThreadPolicy_Default,
        };

        info!("[View Controller] Initializing Flutter engine");
        let engine = unsafe { (dll.FlutterDesktopEngineCreate)(&props) };
        if engine.is_null() {
            bail!("FlutterDesktopEngineCreate returned null");
        }

        // The controller takes ownership of the engine, also on failure.
        let controller = unsafe { (dll.FlutterDesktopViewControllerCreate)(width, height, engine) };
        if controller.is_null() {
            bail!("FlutterDesktopViewControllerCreate failed ({}×{})", width, height);
        }

        let engine = unsafe { (dll.FlutterDesktopViewControllerGetEngine)(controller) };
        let view = unsafe { (dll.FlutterDesktopViewControllerGetView)(controller) };
        info!("[View Controller] View controller created ({}×{})", width, height);

        Ok(Self { dll, controller, engine, view, next_frame: NextFrameSlot::new() })
    }

}

impl ViewController for FlutterViewController {
    fn has_engine(&self) -> bool {
        !self.engine.is_null()
    }

    fn view_handle(&self) -> Option<NativeHandle> {
        if self.view.is_null() {
            return None;
        }
        let hwnd = unsafe { (self.dll.FlutterDesktopViewGetHWND)(self.view) };
        (!hwnd.is_null()).then(|| NativeHandle(hwnd as isize))
    }

    fn handle_top_level_window_proc(&mut self, msg: &WindowMessage) -> Option<isize> {
        let mut result: b::LRESULT = 0;
        let handled = unsafe {
            (self.dll.FlutterDesktopViewControllerHandleTopLevelWindowProc)(
                self.controller,
                msg.hwnd.0 as b::HWND,
                msg.message,
                msg.wparam,
                msg.lparam,
                &mut result,
            )
        };
        handled.then_some(result)
    }

    fn set_next_frame_callback(&mut self, callback: Option<NextFrameCallback>) {
        let Some(callback) = callback else {
            self.next_frame.clear();
            debug!("[View Controller] Next-frame callback cleared");
            return;
        };
        if self.engine.is_null() {
            warn!("[View Controller] No engine; next-frame callback dropped");
            return;
        }
        let (dll, engine) = (&self.dll, self.engine);
        self.next_frame.install(callback, |trampoline, user_data| unsafe {
            (dll.FlutterDesktopEngineSetNextFrameCallback)(engine, trampoline, user_data)
        });
        debug!("[View Controller] Next-frame callback installed");
    }

    fn force_redraw(&mut self) {
        unsafe { (self.dll.FlutterDesktopViewControllerForceRedraw)(self.controller) };
    }

    fn reload_system_fonts(&mut self) {
        if !self.engine.is_null() {
            unsafe { (self.dll.FlutterDesktopEngineReloadSystemFonts)(self.engine) };
        }
    }
}

impl Drop for FlutterViewController {
    fn drop(&mut self) {
        self.next_frame.clear();
        unsafe { (self.dll.FlutterDesktopViewControllerDestroy)(self.controller) };
        debug!("[View Controller] Destroyed");
    }
}

#[cfg(windows)]
fn to_wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

#[cfg(not(windows))]
fn to_wide(path: &Path) -> Vec<u16> {
    path.to_string_lossy().encode_utf16().chain(Some(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    /// Stands in for the engine: remembers what was registered last.
    #[derive(Default)]
    struct Registered {
        callback: b::VoidCallback,
        user_data: Option<*mut c_void>,
        calls: usize,
    }

    impl Registered {
        fn register(&mut self) -> impl FnOnce(b::VoidCallback, *mut c_void) + '_ {
            move |callback, user_data| {
                self.callback = callback;
                self.user_data = Some(user_data);
                self.calls += 1;
            }
        }

        fn fire(&self) {
            let callback = self.callback.expect("engine holds a real function pointer");
            unsafe { callback(self.user_data.unwrap()) };
        }
    }

    fn counting_callback(count: &Rc<Cell<usize>>) -> NextFrameCallback {
        let count = count.clone();
        Box::new(move || count.set(count.get() + 1))
    }

    #[test]
    fn installed_callback_fires_once() {
        let fired = Rc::new(Cell::new(0));
        let mut engine = Registered::default();
        let mut slot = NextFrameSlot::new();

        slot.install(counting_callback(&fired), engine.register());
        assert!(slot.is_armed());
        engine.fire();
        engine.fire();
        assert_eq!(fired.get(), 1);
        assert!(!slot.is_armed());
    }

    #[test]
    fn clearing_keeps_the_trampoline_registered() {
        let fired = Rc::new(Cell::new(0));
        let mut engine = Registered::default();
        let mut slot = NextFrameSlot::new();

        slot.install(counting_callback(&fired), engine.register());
        slot.clear();
        assert_eq!(engine.calls, 1);
        assert!(engine.callback.is_some());
        assert!(!slot.is_armed());

        // A frame arriving after the clear lands in an empty slot.
        engine.fire();
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn reinstall_reuses_the_same_cell() {
        let fired = Rc::new(Cell::new(0));
        let mut engine = Registered::default();
        let mut slot = NextFrameSlot::new();

        slot.install(counting_callback(&fired), engine.register());
        let first = engine.user_data;
        engine.fire();
        slot.install(counting_callback(&fired), engine.register());
        assert_eq!(engine.user_data, first);
        engine.fire();
        assert_eq!(fired.get(), 2);
    }
}
