//! Package manifest (`.nuspec`) parsing.
//!
//! Only the parts the extension manager consumes are read: id, version,
//! description and the dependency groups.
//!
//! ```xml
//! <package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
//!   <metadata>
//!     <id>DemoPlugin</id>
//!     <version>1.0.0</version>
//!     <dependencies>
//!       <group targetFramework="linux-x86_64">
//!         <dependency id="DemoPlugin.Dependency" version="[1.0,2.0)" />
//!       </group>
//!     </dependencies>
//!   </metadata>
//! </package>
//! ```

use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::{Error, Result};
use crate::request::PackageIdentity;
use crate::version::{PackageVersion, VersionRange};

/// Namespace of current package manifests.
pub const NUSPEC_NAMESPACE: &str = "http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd";

const NAMESPACE_PREFIX: &str = "http://schemas.microsoft.com/packaging/";

/// Target of dependency groups that declare no framework.
pub const ANY_TARGET: &str = "any";

/// One declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependency {
    pub id: String,
    pub range: VersionRange,
}

/// Dependencies that apply to one target platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub target: String,
    pub dependencies: Vec<PackageDependency>,
}

/// Parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub id: String,
    pub version: PackageVersion,
    pub description: Option<String>,
    pub dependency_groups: Vec<DependencyGroup>,
}

impl PackageManifest {
    pub fn parse(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).map_err(|e| Error::ManifestParse {
            reason: e.to_string(),
        })?;

        let root = document.root_element();
        check_element(root, "package")?;

        let metadata = child(root, "metadata").ok_or_else(|| missing("metadata"))?;
        let id = child_text(metadata, "id").ok_or_else(|| missing("id"))?;
        let version = child_text(metadata, "version").ok_or_else(|| missing("version"))?;
        let version = PackageVersion::parse(&version).map_err(|e| Error::ManifestParse {
            reason: e.to_string(),
        })?;

        let dependency_groups = match child(metadata, "dependencies") {
            Some(dependencies) => parse_dependency_groups(dependencies)?,
            None => Vec::new(),
        };

        Ok(Self {
            id,
            version,
            description: child_text(metadata, "description"),
            dependency_groups,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&xml)
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }
}

fn parse_dependency_groups(dependencies: Node<'_, '_>) -> Result<Vec<DependencyGroup>> {
    let mut groups = Vec::new();
    let mut flat = Vec::new();

    for node in dependencies.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "group" => {
                let target = node
                    .attribute("targetFramework")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(ANY_TARGET)
                    .to_string();
                let dependencies = node
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "dependency")
                    .map(parse_dependency)
                    .collect::<Result<Vec<_>>>()?;
                groups.push(DependencyGroup {
                    target,
                    dependencies,
                });
            }
            "dependency" => flat.push(parse_dependency(node)?),
            _ => {}
        }
    }

    if !flat.is_empty() {
        groups.push(DependencyGroup {
            target: ANY_TARGET.to_string(),
            dependencies: flat,
        });
    }
    Ok(groups)
}

fn parse_dependency(node: Node<'_, '_>) -> Result<PackageDependency> {
    let id = node
        .attribute("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| missing("dependency id"))?;
    let range = match node.attribute("version") {
        Some(range) => VersionRange::parse(range).map_err(|e| Error::ManifestParse {
            reason: e.to_string(),
        })?,
        None => VersionRange::any(),
    };
    Ok(PackageDependency {
        id: id.to_string(),
        range,
    })
}

fn check_element(node: Node<'_, '_>, name: &str) -> Result<()> {
    if node.tag_name().name() != name {
        return Err(Error::ManifestParse {
            reason: format!("expected <{name}>, found <{}>", node.tag_name().name()),
        });
    }
    match node.tag_name().namespace() {
        None => Ok(()),
        Some(ns) if ns.starts_with(NAMESPACE_PREFIX) && ns.ends_with("nuspec.xsd") => Ok(()),
        Some(ns) => Err(Error::ManifestParse {
            reason: format!("unexpected namespace '{ns}'"),
        }),
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn missing(what: &str) -> Error {
    Error::ManifestParse {
        reason: format!("missing {what}"),
    }
}
