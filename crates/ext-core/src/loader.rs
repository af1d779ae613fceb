//! Module loading.
//!
//! A [`ModuleLoader`] turns module files found in extracted packages into
//! [`LoadedModule`]s. Each manager owns one loader; the loader keeps its own
//! [`ModuleCache`] and [`SearchPaths`], nothing is process-global.

use std::collections::HashMap;
use std::env::consts::DLL_PREFIX;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use ext_packages::{PackageIdentity, normalize_module_name};
use ext_plugin::{ABI_VERSION, DECLARATION_SYMBOL, PluginDeclaration, SDK_VERSION};
use libloading::Library;
use walkdir::WalkDir;

use crate::{Error, Result};

/// A module loaded into the process.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// Normalized module name, e.g. `demo_plugin` for `libdemo_plugin.so`.
    pub name: String,
    pub path: PathBuf,
    pub package: Option<PackageIdentity>,
    /// Present when the module exports a plugin.
    pub declaration: Option<PluginDeclaration>,
}

/// Module name of a module file: file stem without the platform prefix.
pub fn module_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match stem.strip_prefix(DLL_PREFIX) {
        Some(rest) if !DLL_PREFIX.is_empty() && !rest.is_empty() => rest.to_string(),
        _ => stem,
    };
    normalize_module_name(&stem)
}

/// Loaded modules by name, owned by one loader.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: Mutex<Vec<LoadedModule>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<LoadedModule> {
        let name = normalize_module_name(name);
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn insert(&self, module: LoadedModule) {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(module);
    }

    /// Snapshot in load order.
    pub fn snapshot(&self) -> Vec<LoadedModule> {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Directories searched for native libraries shipped inside packages.
///
/// Earlier directories win. Within a directory, files under
/// `runtimes/<unix|win>` are preferred over files under `lib`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let runtime = if cfg!(windows) { "win" } else { "unix" };
        self.dirs.iter().find_map(|dir| {
            WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
                .map(|entry| entry.into_path())
                .min_by_key(|path| rank(path, runtime))
        })
    }
}

fn rank(path: &Path, runtime: &str) -> u8 {
    let components: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_ascii_lowercase())
        .collect();
    let under_runtime = components
        .windows(2)
        .any(|pair| pair[0] == "runtimes" && pair[1].starts_with(runtime));
    if under_runtime {
        0
    } else if components.iter().any(|c| c == "lib") {
        1
    } else {
        2
    }
}

/// Loads module files and tracks what is loaded.
pub trait ModuleLoader: Send + Sync {
    /// Load the module at `path`. Loading an already loaded module returns
    /// the cached entry.
    fn load(&self, path: &Path, package: Option<&PackageIdentity>) -> Result<LoadedModule>;

    /// Whether a module with this (normalized) name is loaded.
    fn is_loaded(&self, name: &str) -> bool;

    /// Loaded modules in load order.
    fn modules(&self) -> Vec<LoadedModule>;

    /// Replace the directories consulted by [`resolve_library`](Self::resolve_library).
    fn set_search_paths(&self, paths: SearchPaths);

    /// Locate a native library shipped in a package.
    fn resolve_library(&self, file_name: &str) -> Option<PathBuf>;
}

fn check_compatible(path: &Path, declaration: &PluginDeclaration) -> Result<()> {
    if declaration.is_compatible() {
        return Ok(());
    }
    Err(Error::IncompatibleModule {
        path: path.to_path_buf(),
        abi: declaration.abi_version,
        sdk: declaration.sdk_version.to_string(),
        expected_abi: ABI_VERSION,
        expected_sdk: SDK_VERSION.to_string(),
    })
}

/// Loads shared libraries with `libloading`.
///
/// Libraries are never unloaded: services and plugin objects created by a
/// module can outlive the loader and the manager, so a loaded library stays
/// mapped until the process exits.
#[derive(Debug, Default)]
pub struct NativeModuleLoader {
    cache: ModuleCache,
    search_paths: RwLock<SearchPaths>,
}

impl NativeModuleLoader {
    pub fn new(search_paths: SearchPaths) -> Self {
        Self {
            cache: ModuleCache::new(),
            search_paths: RwLock::new(search_paths),
        }
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, path: &Path, package: Option<&PackageIdentity>) -> Result<LoadedModule> {
        let name = module_name(path);
        if let Some(existing) = self.cache.get(&name) {
            tracing::debug!(module = %name, "Module already loaded");
            return Ok(existing);
        }

        // SAFETY: loading runs the library's initializers; modules come from
        // packages the host configured.
        let library = unsafe { Library::new(path) }.map_err(|e| Error::ModuleLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: the symbol, when present, is the static exported by
        // `declare_plugin!`, whose type is `PluginDeclaration`.
        let declaration = unsafe {
            library
                .get::<*const PluginDeclaration>(DECLARATION_SYMBOL)
                .ok()
                .map(|symbol| **symbol)
        };
        if let Some(declaration) = &declaration {
            check_compatible(path, declaration)?;
        }
        std::mem::forget(library);

        let module = LoadedModule {
            name,
            path: path.to_path_buf(),
            package: package.cloned(),
            declaration,
        };
        self.cache.insert(module.clone());
        tracing::info!(module = %module.name, path = %path.display(), "Loaded module");
        Ok(module)
    }

    fn is_loaded(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    fn modules(&self) -> Vec<LoadedModule> {
        self.cache.snapshot()
    }

    fn set_search_paths(&self, paths: SearchPaths) {
        *self
            .search_paths
            .write()
            .unwrap_or_else(PoisonError::into_inner) = paths;
    }

    fn resolve_library(&self, file_name: &str) -> Option<PathBuf> {
        self.search_paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(file_name)
    }
}

/// Serves plugin declarations linked into the host binary.
///
/// Module files found in packages are matched to registered declarations by
/// module name; unregistered files load as plain library modules. Used by
/// hosts that statically link their plugins and by tests.
#[derive(Debug, Default)]
pub struct BuiltinModuleLoader {
    declarations: HashMap<String, PluginDeclaration>,
    cache: ModuleCache,
    search_paths: RwLock<SearchPaths>,
}

impl BuiltinModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `declaration` for module files named `module`.
    pub fn register(mut self, module: &str, declaration: PluginDeclaration) -> Self {
        self.declarations
            .insert(normalize_module_name(module), declaration);
        self
    }
}

impl ModuleLoader for BuiltinModuleLoader {
    fn load(&self, path: &Path, package: Option<&PackageIdentity>) -> Result<LoadedModule> {
        let name = module_name(path);
        if let Some(existing) = self.cache.get(&name) {
            return Ok(existing);
        }

        let declaration = self.declarations.get(&name).copied();
        if let Some(declaration) = &declaration {
            check_compatible(path, declaration)?;
        }

        let module = LoadedModule {
            name,
            path: path.to_path_buf(),
            package: package.cloned(),
            declaration,
        };
        self.cache.insert(module.clone());
        tracing::info!(module = %module.name, path = %path.display(), "Loaded module");
        Ok(module)
    }

    fn is_loaded(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    fn modules(&self) -> Vec<LoadedModule> {
        self.cache.snapshot()
    }

    fn set_search_paths(&self, paths: SearchPaths) {
        *self
            .search_paths
            .write()
            .unwrap_or_else(PoisonError::into_inner) = paths;
    }

    fn resolve_library(&self, file_name: &str) -> Option<PathBuf> {
        self.search_paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ext_plugin::{Plugin, PluginContext};
    use ext_test_utils::module_file_name;
    use tempfile::TempDir;

    fn no_plugin(_context: &PluginContext) -> Option<Box<dyn Plugin>> {
        None
    }

    #[test]
    fn module_name_strips_prefix_and_normalizes() {
        let path = PathBuf::from("/x").join(module_file_name("Demo.Plugin"));
        assert_eq!(module_name(&path), "demo_plugin");
    }

    #[test]
    fn builtin_loader_matches_registered_declarations() {
        let loader = BuiltinModuleLoader::new()
            .register("demo_plugin", PluginDeclaration::new("demo", no_plugin));

        let plugin = loader
            .load(&PathBuf::from(module_file_name("demo_plugin")), None)
            .unwrap();
        assert!(plugin.declaration.is_some());
        let library = loader
            .load(&PathBuf::from(module_file_name("helper")), None)
            .unwrap();
        assert!(library.declaration.is_none());

        assert!(loader.is_loaded("demo_plugin"));
        assert!(loader.is_loaded("Demo.Plugin"));
        assert_eq!(loader.modules().len(), 2);
    }

    #[test]
    fn loading_twice_returns_cached_module() {
        let loader = BuiltinModuleLoader::new();
        let path = PathBuf::from(module_file_name("a"));
        loader.load(&path, None).unwrap();
        loader.load(&path, None).unwrap();
        assert_eq!(loader.modules().len(), 1);
    }

    #[test]
    fn incompatible_declaration_is_rejected() {
        let mut declaration = PluginDeclaration::new("old", no_plugin);
        declaration.abi_version = ABI_VERSION + 1;
        let loader = BuiltinModuleLoader::new().register("old", declaration);

        let err = loader
            .load(&PathBuf::from(module_file_name("old")), None)
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleModule { .. }));
        assert!(!loader.is_loaded("old"));
    }

    #[test]
    fn native_loader_reports_missing_file() {
        let loader = NativeModuleLoader::new(SearchPaths::default());
        let err = loader
            .load(Path::new("/definitely/not/here.so"), None)
            .unwrap_err();
        assert!(matches!(err, Error::ModuleLoad { .. }));
    }

    #[test]
    fn search_prefers_earlier_dirs_then_runtimes() {
        let temp = TempDir::new().unwrap();
        let deps = temp.path().join("lib");
        let plugins = temp.path().join("plugins");
        let runtime = if cfg!(windows) { "win-x64" } else { "unix" };

        for dir in [
            deps.join("Native.1.0/lib/any"),
            deps.join(format!("Native.1.0/runtimes/{runtime}/native")),
            plugins.join("Other.1.0/lib/any"),
        ] {
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("native.bin"), b"").unwrap();
        }

        let paths = SearchPaths::new(vec![deps.clone(), plugins.clone()]);
        let found = paths.resolve("native.bin").unwrap();
        assert!(found.starts_with(&deps));
        assert!(found.to_string_lossy().contains("runtimes"));
        assert!(paths.resolve("missing.bin").is_none());

        let loader = BuiltinModuleLoader::new();
        assert!(loader.resolve_library("native.bin").is_none());
        loader.set_search_paths(SearchPaths::new(vec![plugins]));
        assert!(loader.resolve_library("native.bin").unwrap().starts_with(temp.path().join("plugins")));
    }
}
