/// The Win32 window class name used to register and create the main window.
pub const WINDOW_CLASS_NAME: &str = "FLUTTER_RUNNER_WIN32_WINDOW";

/// Title text for the main application window.
pub const WINDOW_TITLE: &str = "Trainova";

/// Default width (in logical pixels) for the main application window.
pub const DEFAULT_WINDOW_WIDTH: i32 = 1280;

/// Default height (in logical pixels) for the main application window.
pub const DEFAULT_WINDOW_HEIGHT: i32 = 720;

/// Engine data directory, relative to the executable.
/// Holds `flutter_assets/`, `icudtl.dat` and `app.so`.
pub const DATA_DIRECTORY: &str = "data";

/// File name of the Flutter Windows embedder library shipped beside the executable.
pub const FLUTTER_WINDOWS_DLL: &str = "flutter_windows.dll";

/// Export suffix shared by every plugin's C entry point.
pub const PLUGIN_REGISTRAR_SUFFIX: &str = "RegisterWithRegistrar";

/// DPI that Windows treats as a scale factor of 1.0.
pub const BASE_DPI: u32 = 96;
