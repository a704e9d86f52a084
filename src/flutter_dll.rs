use crate::constants::FLUTTER_WINDOWS_DLL;
use crate::dart_project::executable_directory;
use crate::flutter_bindings as b;
use anyhow::{Context, Result};
use libloading::{Library, Symbol};
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    ffi::c_void,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Entry points resolved from `flutter_windows.dll`.
#[derive(Debug)]
pub struct FlutterDll {
    _lib: &'static Library,

    pub FlutterDesktopEngineCreate: Symbol<
        'static,
        unsafe extern "C" fn(*const b::FlutterDesktopEngineProperties) -> b::FlutterDesktopEngineRef,
    >,
    pub FlutterDesktopEngineGetPluginRegistrar: Symbol<
        'static,
        unsafe extern "C" fn(
            b::FlutterDesktopEngineRef,
            *const std::ffi::c_char,
        ) -> b::FlutterDesktopPluginRegistrarRef,
    >,
    pub FlutterDesktopEngineSetNextFrameCallback: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopEngineRef, b::VoidCallback, *mut c_void),
    >,
    pub FlutterDesktopEngineReloadSystemFonts:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopEngineRef)>,
    pub FlutterDesktopViewControllerCreate: Symbol<
        'static,
        unsafe extern "C" fn(
            i32,
            i32,
            b::FlutterDesktopEngineRef,
        ) -> b::FlutterDesktopViewControllerRef,
    >,
    pub FlutterDesktopViewControllerDestroy:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopViewControllerRef)>,
    pub FlutterDesktopViewControllerGetEngine: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopViewControllerRef) -> b::FlutterDesktopEngineRef,
    >,
    pub FlutterDesktopViewControllerGetView: Symbol<
        'static,
        unsafe extern "C" fn(b::FlutterDesktopViewControllerRef) -> b::FlutterDesktopViewRef,
    >,
    pub FlutterDesktopViewControllerForceRedraw:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopViewControllerRef)>,
    pub FlutterDesktopViewControllerHandleTopLevelWindowProc: Symbol<
        'static,
        unsafe extern "C" fn(
            b::FlutterDesktopViewControllerRef,
            b::HWND,
            b::UINT,
            b::WPARAM,
            b::LPARAM,
            *mut b::LRESULT,
        ) -> bool,
    >,
    pub FlutterDesktopViewGetHWND:
        Symbol<'static, unsafe extern "C" fn(b::FlutterDesktopViewRef) -> b::HWND>,
    pub FlutterDesktopGetDpiForMonitor:
        Symbol<'static, unsafe extern "C" fn(b::HMONITOR) -> b::UINT>,
    pub FlutterDesktopResyncOutputStreams: Symbol<'static, unsafe extern "C" fn()>,
}

/// Every export the runner resolves; a missing one fails [`FlutterDll::load`].
pub const EXPORTS: &[&str] = &[
    "FlutterDesktopEngineCreate",
    "FlutterDesktopEngineGetPluginRegistrar",
    "FlutterDesktopEngineSetNextFrameCallback",
    "FlutterDesktopEngineReloadSystemFonts",
    "FlutterDesktopViewControllerCreate",
    "FlutterDesktopViewControllerDestroy",
    "FlutterDesktopViewControllerGetEngine",
    "FlutterDesktopViewControllerGetView",
    "FlutterDesktopViewControllerForceRedraw",
    "FlutterDesktopViewControllerHandleTopLevelWindowProc",
    "FlutterDesktopViewGetHWND",
    "FlutterDesktopGetDpiForMonitor",
    "FlutterDesktopResyncOutputStreams",
];

static DLL_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<FlutterDll>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

macro_rules! resolve {
    ($lib:expr, $name:ident) => {
        $lib.get(concat!(stringify!($name), "\0").as_bytes())
            .context(concat!("Missing symbol: ", stringify!($name)))?
    };
}

impl FlutterDll {
    pub fn load(dir: &Path) -> Result<Self> {
        let dll_path = dir.join(FLUTTER_WINDOWS_DLL);
        let lib = unsafe { Library::new(&dll_path) }
            .with_context(|| format!("Failed to load {}", dll_path.display()))?;

        // Symbols borrow the library for the rest of the process.
        let lib_static: &'static Library = Box::leak(Box::new(lib));

        unsafe {
            Ok(FlutterDll {
                _lib: lib_static,
                FlutterDesktopEngineCreate: resolve!(lib_static, FlutterDesktopEngineCreate),
                FlutterDesktopEngineGetPluginRegistrar: resolve!(
                    lib_static,
                    FlutterDesktopEngineGetPluginRegistrar
                ),
                FlutterDesktopEngineSetNextFrameCallback: resolve!(
                    lib_static,
                    FlutterDesktopEngineSetNextFrameCallback
                ),
                FlutterDesktopEngineReloadSystemFonts: resolve!(
                    lib_static,
                    FlutterDesktopEngineReloadSystemFonts
                ),
                FlutterDesktopViewControllerCreate: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerCreate
                ),
                FlutterDesktopViewControllerDestroy: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerDestroy
                ),
                FlutterDesktopViewControllerGetEngine: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerGetEngine
                ),
                FlutterDesktopViewControllerGetView: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerGetView
                ),
                FlutterDesktopViewControllerForceRedraw: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerForceRedraw
                ),
                FlutterDesktopViewControllerHandleTopLevelWindowProc: resolve!(
                    lib_static,
                    FlutterDesktopViewControllerHandleTopLevelWindowProc
                ),
                FlutterDesktopViewGetHWND: resolve!(lib_static, FlutterDesktopViewGetHWND),
                FlutterDesktopGetDpiForMonitor: resolve!(lib_static, FlutterDesktopGetDpiForMonitor),
                FlutterDesktopResyncOutputStreams: resolve!(
                    lib_static,
                    FlutterDesktopResyncOutputStreams
                ),
            })
        }
    }

    /// Loads (once per directory) the embedder library found in `dir`.
    pub fn get_for(dir: &Path) -> Result<Arc<Self>> {
        let mut cache = DLL_CACHE.lock();
        if let Some(existing) = cache.get(dir) {
            return Ok(existing.clone());
        }

        let dll = Arc::new(FlutterDll::load(dir)?);
        debug!(
            "[Flutter DLL] Loaded {} from {} ({} exports)",
            FLUTTER_WINDOWS_DLL,
            dir.display(),
            EXPORTS.len()
        );
        cache.insert(dir.to_path_buf(), dll.clone());
        Ok(dll)
    }

    /// The embedder library beside the executable.
    pub fn get() -> Result<Arc<Self>> {
        Self::get_for(&executable_directory()?)
    }
}
