//! C declarations from `flutter_windows.h` used by the runner.

use std::ffi::{c_char, c_int, c_void};

#[repr(C)]
pub struct FlutterDesktopEngine {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FlutterDesktopViewController {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FlutterDesktopView {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FlutterDesktopPluginRegistrar {
    _private: [u8; 0],
}

pub type FlutterDesktopEngineRef = *mut FlutterDesktopEngine;
pub type FlutterDesktopViewControllerRef = *mut FlutterDesktopViewController;
pub type FlutterDesktopViewRef = *mut FlutterDesktopView;
pub type FlutterDesktopPluginRegistrarRef = *mut FlutterDesktopPluginRegistrar;

pub type HWND = *mut c_void;
pub type HMONITOR = *mut c_void;
pub type UINT = u32;
pub type WPARAM = usize;
pub type LPARAM = isize;
pub type LRESULT = isize;

/// `void (*)(void* user_data)`
pub type VoidCallback = Option<unsafe extern "C" fn(user_data: *mut c_void)>;

/// `FlutterDesktopGpuPreference`; zero lets the engine choose.
pub const FlutterDesktopGpuPreference_NoPreference: c_int = 0;

/// `FlutterDesktopUIThreadPolicy`; zero keeps the engine default.
pub const FlutterDesktopUIThreadPolicy_Default: c_int = 0;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlutterDesktopEngineProperties {
    pub assets_path: *const u16,
    pub icu_data_path: *const u16,
    pub aot_library_path: *const u16,
    pub dart_entrypoint: *const c_char,
    pub dart_entrypoint_argc: c_int,
    pub dart_entrypoint_argv: *mut *const c_char,
    pub gpu_preference: c_int,
    pub ui_thread_policy: c_int,
}
