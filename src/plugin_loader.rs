//! Plugin registrant: every DLL beside the executable that exports a
//! `*RegisterWithRegistrar` symbol is bound to the engine under a registrar
//! named after its file stem.

use anyhow::{Context, Result};
use goblin::Object;
use libloading::{Library, Symbol};
use log::{debug, info, warn};
use std::{
    ffi::CString,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    constants::{FLUTTER_WINDOWS_DLL, PLUGIN_REGISTRAR_SUFFIX},
    flutter_bindings::{FlutterDesktopEngineRef, FlutterDesktopPluginRegistrarRef},
    flutter_dll::FlutterDll,
};

/// Keeps the exported names that look like plugin entry points.
fn registrar_exports<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|n| n.ends_with(PLUGIN_REGISTRAR_SUFFIX) && n.len() > PLUGIN_REGISTRAR_SUFFIX.len())
        .map(str::to_string)
        .collect()
}

fn is_plugin_candidate(path: &Path) -> bool {
    let is_dll = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dll"));
    let is_embedder = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case(FLUTTER_WINDOWS_DLL));
    is_dll && !is_embedder
}

/// Scan the directory for all DLLs exporting `*RegisterWithRegistrar`,
/// sorted by path so registration order is stable between runs.
pub fn discover_plugins(dir: &Path) -> Result<Vec<(PathBuf, Vec<String>)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))? {
        let dll = entry?.path();
        if !is_plugin_candidate(&dll) {
            continue;
        }
        let data = fs::read(&dll).with_context(|| format!("reading {}", dll.display()))?;
        match Object::parse(&data) {
            Ok(Object::PE(pe)) => {
                let syms = registrar_exports(pe.exports.iter().filter_map(|e| e.name));
                if !syms.is_empty() {
                    debug!("[Plugin Loader] {} exports {:?}", dll.display(), syms);
                    out.push((dll, syms));
                }
            }
            Ok(_) => debug!("[Plugin Loader] {} is not a PE image", dll.display()),
            Err(e) => warn!("[Plugin Loader] Skipping {}: {}", dll.display(), e),
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Load one DLL and invoke each `xxxRegisterWithRegistrar` symbol.
fn load_and_register(
    dll: &Path,
    symbols: &[String],
    registrar: FlutterDesktopPluginRegistrarRef,
) -> Result<()> {
    let lib = unsafe { Library::new(dll).with_context(|| format!("loading {}", dll.display()))? };
    for sym in symbols {
        let cname = CString::new(sym.as_str())?;
        let func: Symbol<unsafe extern "C" fn(FlutterDesktopPluginRegistrarRef)> = unsafe {
            lib.get(cname.as_bytes_with_nul())
                .with_context(|| format!("symbol {}", sym))?
        };
        unsafe { func(registrar) };
    }
    // keep the library alive for the life of the process
    std::mem::forget(lib);
    Ok(())
}

/// Discover every plugin DLL in `dir` and register it against `engine`.
pub fn load_and_register_plugins(
    dir: &Path,
    dll: &FlutterDll,
    engine: FlutterDesktopEngineRef,
) -> Result<()> {
    let plugins = discover_plugins(dir)
        .with_context(|| format!("discovering plugins in {}", dir.display()))?;
    for (dll_path, symbols) in &plugins {
        let plugin_name = dll_path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let c_name = CString::new(plugin_name)?;
        let registrar =
            unsafe { (dll.FlutterDesktopEngineGetPluginRegistrar)(engine, c_name.as_ptr()) };
        load_and_register(dll_path, symbols, registrar)?;
    }
    info!("[Plugin Loader] {} plugin(s) registered", plugins.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_registrar_exports() {
        let names = [
            "UrlLauncherWindowsRegisterWithRegistrar",
            "DllMain",
            "RegisterWithRegistrar",
            "PermissionHandlerWindowsPluginRegisterWithRegistrarEx",
        ];
        assert_eq!(registrar_exports(names), ["UrlLauncherWindowsRegisterWithRegistrar"]);
    }

    #[test]
    fn embedder_dll_is_not_a_plugin() {
        assert!(is_plugin_candidate(Path::new("url_launcher_windows_plugin.dll")));
        assert!(is_plugin_candidate(Path::new("Camera.DLL")));
        assert!(!is_plugin_candidate(Path::new("flutter_windows.dll")));
        assert!(!is_plugin_candidate(Path::new("icudtl.dat")));
    }

    #[test]
    fn unreadable_images_are_skipped() {
        let dir = std::env::temp_dir().join(format!("trainova-plugins-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("broken.dll"), b"not a portable executable").unwrap();
        fs::write(dir.join("notes.txt"), b"hello").unwrap();

        let found = discover_plugins(&dir).unwrap();
        assert!(found.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join("trainova-plugins-does-not-exist");
        assert!(discover_plugins(&dir).is_err());
    }
}
