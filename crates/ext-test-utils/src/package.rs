//! [`PackageBuilder`] for package archives.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Platform file name of the module called `name` (`libdemo_plugin.so`).
pub fn module_file_name(name: &str) -> String {
    format!("{DLL_PREFIX}{name}.{DLL_EXTENSION}")
}

#[derive(Debug, Clone)]
struct Group {
    target: Option<String>,
    dependencies: Vec<(String, Option<String>)>,
}

/// Builds a package archive with a manifest, module files and dependency
/// groups.
///
/// ```rust,no_run
/// use ext_test_utils::PackageBuilder;
///
/// let archive = PackageBuilder::new("DemoPlugin", "1.0.0")
///     .module("any", "demo_plugin")
///     .dependency("DemoPlugin.Dependency", Some("[1.0,)"))
///     .write_to(std::path::Path::new("/tmp/feed"));
/// ```
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    id: String,
    version: String,
    groups: Vec<Group>,
    files: Vec<(String, Vec<u8>)>,
}

impl PackageBuilder {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            groups: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Add a dependency to the group without a target framework.
    pub fn dependency(self, id: &str, range: Option<&str>) -> Self {
        self.group_dependency(None, id, range)
    }

    /// Add a dependency to the group for `target`.
    pub fn target_dependency(self, target: &str, id: &str, range: Option<&str>) -> Self {
        self.group_dependency(Some(target), id, range)
    }

    fn group_dependency(mut self, target: Option<&str>, id: &str, range: Option<&str>) -> Self {
        let dependency = (id.to_string(), range.map(str::to_string));
        match self
            .groups
            .iter_mut()
            .find(|g| g.target.as_deref() == target)
        {
            Some(group) => group.dependencies.push(dependency),
            None => self.groups.push(Group {
                target: target.map(str::to_string),
                dependencies: vec![dependency],
            }),
        }
        self
    }

    /// Add an (empty) module file under `lib/<moniker>/`.
    pub fn module(self, moniker: &str, name: &str) -> Self {
        let path = format!("lib/{moniker}/{}", module_file_name(name));
        self.file(&path, b"module")
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}.{}.nupkg", self.id, self.version)
    }

    pub fn nuspec(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <package xmlns=\"http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd\">\n  <metadata>\n",
        );
        xml.push_str(&format!("    <id>{}</id>\n", self.id));
        xml.push_str(&format!("    <version>{}</version>\n", self.version));
        xml.push_str(&format!("    <description>{} test package</description>\n", self.id));
        if !self.groups.is_empty() {
            xml.push_str("    <dependencies>\n");
            for group in &self.groups {
                match &group.target {
                    Some(target) => xml.push_str(&format!("      <group targetFramework=\"{target}\">\n")),
                    None => xml.push_str("      <group>\n"),
                }
                for (id, range) in &group.dependencies {
                    match range {
                        Some(range) => xml.push_str(&format!(
                            "        <dependency id=\"{id}\" version=\"{range}\" />\n"
                        )),
                        None => xml.push_str(&format!("        <dependency id=\"{id}\" />\n")),
                    }
                }
                xml.push_str("      </group>\n");
            }
            xml.push_str("    </dependencies>\n");
        }
        xml.push_str("  </metadata>\n</package>\n");
        xml
    }

    /// Write the archive into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(self.archive_file_name());
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(format!("{}.nuspec", self.id), options).unwrap();
        zip.write_all(self.nuspec().as_bytes()).unwrap();
        for (name, content) in &self.files {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
        path
    }
}

/// Overwrite `path` with bytes that are not a zip archive.
pub fn corrupt(path: &Path) {
    fs::write(path, b"this is not a zip archive").unwrap();
}
