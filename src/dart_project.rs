//! The project descriptor handed to the view controller: where the engine's
//! data lives and what arguments the Dart entrypoint receives.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DartProject {
    data_dir: PathBuf,
    dart_entrypoint_arguments: Vec<String>,
}

impl DartProject {
    /// `data_dir` may be relative, in which case it is resolved against the
    /// executable's directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            dart_entrypoint_arguments: Vec::new(),
        }
    }

    pub fn set_dart_entrypoint_arguments(&mut self, arguments: Vec<String>) {
        self.dart_entrypoint_arguments = arguments;
    }

    pub fn dart_entrypoint_arguments(&self) -> &[String] {
        &self.dart_entrypoint_arguments
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Engine asset locations with `data_dir` anchored at `base_dir`.
    pub fn engine_paths_from(&self, base_dir: &Path) -> EnginePaths {
        let data = if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            base_dir.join(&self.data_dir)
        };
        EnginePaths {
            assets: data.join("flutter_assets"),
            icu_data: data.join("icudtl.dat"),
            aot_library: data.join("app.so"),
        }
    }

    /// Engine asset locations relative to the running executable.
    pub fn engine_paths(&self) -> Result<EnginePaths> {
        Ok(self.engine_paths_from(&executable_directory()?))
    }
}

/// Resolved engine inputs derived from a [`DartProject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub assets: PathBuf,
    pub icu_data: PathBuf,
    pub aot_library: PathBuf,
}

impl EnginePaths {
    /// Checks the bundle on disk. `app.so` is only present in AOT builds, so
    /// its absence is logged rather than rejected.
    pub fn validate(&self) -> Result<()> {
        if !self.assets.is_dir() {
            bail!("missing flutter_assets at `{}`", self.assets.display());
        }
        if !self.icu_data.is_file() {
            bail!("missing icudtl.dat at `{}`", self.icu_data.display());
        }
        if !self.aot_library.is_file() {
            warn!(
                "[Dart Project] No AOT library at `{}`; engine will run in JIT mode",
                self.aot_library.display()
            );
        }
        debug!(
            "[Dart Project] Validated paths: assets=`{}`, icu=`{}`",
            self.assets.display(),
            self.icu_data.display()
        );
        Ok(())
    }
}

/// Directory containing the running executable.
pub fn executable_directory() -> Result<PathBuf> {
    std::env::current_exe()
        .context("Failed to get current exe path")?
        .parent()
        .map(PathBuf::from)
        .context("Exe has no parent directory")
}
