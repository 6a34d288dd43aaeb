//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

use std::cmp::Ordering;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zip::ZipArchive;

use crate::config::ZiCEngineConfig;
use crate::dag::ZiCModuleNode;
use crate::errors::{Result, ZiError};

/// A dependency declared by a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiCModuleDependency {
    pub module: String,
    /// The depending module's context is parented on this module's context.
    pub use_code: bool,
}

/// Comparable module version.
///
/// Leading dot-separated numbers form the release; anything after them is a
/// qualifier (`1.2.0-beta`, `3.1.GA`). Missing numbers count as zero, and a
/// qualified version sorts below the same release without one.
#[derive(Clone, Debug)]
pub struct ZiCModuleVersion {
    pub release: Vec<u64>,
    pub qualifier: Option<String>,
}

impl ZiCModuleVersion {
    #[allow(non_snake_case)]
    pub fn ZiFParse(version: &str) -> Self {
        let version = version.trim();
        let mut release = Vec::new();
        let mut rest = version;
        loop {
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                break;
            }
            match rest[..digits].parse::<u64>() {
                Ok(n) => release.push(n),
                Err(_) => break,
            }
            rest = &rest[digits..];
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }
        let qualifier = rest.trim_start_matches(|c: char| c == '.' || c == '-' || c == '_');
        Self {
            release,
            qualifier: if qualifier.is_empty() {
                None
            } else {
                Some(qualifier.to_string())
            },
        }
    }

    fn ZiFRelease(&self) -> &[u64] {
        let len = self.release.iter().rposition(|n| *n != 0).map_or(0, |i| i + 1);
        &self.release[..len]
    }
}

impl PartialEq for ZiCModuleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ZiCModuleVersion {}

impl PartialOrd for ZiCModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ZiCModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ZiFRelease()
            .cmp(other.ZiFRelease())
            .then_with(|| match (&self.qualifier, &other.qualifier) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            })
    }
}

impl fmt::Display for ZiCModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        f.write_str(&release.join("."))?;
        if let Some(qualifier) = &self.qualifier {
            if !release.is_empty() {
                f.write_str("-")?;
            }
            f.write_str(qualifier)?;
        }
        Ok(())
    }
}

/// Parsed, immutable description of one module archive.
#[derive(Clone, Debug)]
pub struct ZiCModuleDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub archive: PathBuf,
    pub dependencies: Vec<ZiCModuleDependency>,
}

impl ZiCModuleDescriptor {
    #[allow(non_snake_case)]
    pub fn ZiFNew(name: impl Into<String>, archive: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            archive: archive.into(),
            dependencies: Vec::new(),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithVersion(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFVersion(&self) -> ZiCModuleVersion {
        ZiCModuleVersion::ZiFParse(&self.version)
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithProvider(mut self, provider: impl Into<String>) -> Self {
        self.dependencies.push(ZiCModuleDependency {
            module: provider.into(),
            use_code: true,
        });
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithDependency(mut self, module: impl Into<String>) -> Self {
        self.dependencies.push(ZiCModuleDependency {
            module: module.into(),
            use_code: false,
        });
        self
    }

    /// The module whose code this module uses, if it declares one.
    #[allow(non_snake_case)]
    pub fn ZiFProvider(&self) -> Option<&str> {
        self.dependencies
            .iter()
            .find(|d| d.use_code)
            .map(|d| d.module.as_str())
    }

    /// Checks the rules a parsed file cannot express on its own.
    #[allow(non_snake_case)]
    pub fn ZiFValidate(&self) -> Result<()> {
        let archive = self.archive.display().to_string();
        if self.name.trim().is_empty() {
            return Err(ZiError::parse(archive, "module name cannot be empty"));
        }
        let providers = self.dependencies.iter().filter(|d| d.use_code).count();
        if providers > 1 {
            return Err(ZiError::parse(
                archive,
                format!("module '{}' uses code of {} modules, at most one allowed", self.name, providers),
            ));
        }
        for (i, dep) in self.dependencies.iter().enumerate() {
            if dep.module == self.name {
                return Err(ZiError::parse(
                    archive,
                    format!("module '{}' depends on itself", self.name),
                ));
            }
            if self.dependencies[..i].iter().any(|d| d.module == dep.module) {
                return Err(ZiError::parse(
                    archive,
                    format!("module '{}' lists '{}' twice", self.name, dep.module),
                ));
            }
        }
        Ok(())
    }

    #[allow(non_snake_case)]
    pub fn ZiFToGraphNode(&self) -> ZiCModuleNode {
        let mut node = ZiCModuleNode::ZiFNew(self.name.as_str());
        for dep in &self.dependencies {
            node = if dep.use_code {
                node.ZiFWithProvider(dep.module.as_str())
            } else {
                node.ZiFWithDependency(dep.module.as_str())
            };
        }
        node
    }
}

#[derive(Debug, Deserialize)]
struct ZiCModuleDependencyFile {
    module: String,
    #[serde(default)]
    use_code: bool,
}

#[derive(Debug, Deserialize)]
struct ZiCModuleFile {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    depends: Vec<ZiCModuleDependencyFile>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ZiCModuleFile {
    fn into_runtime(self, archive: &Path) -> Result<ZiCModuleDescriptor> {
        let descriptor = ZiCModuleDescriptor {
            name: self.name,
            version: self.version,
            description: self.description,
            archive: archive.to_path_buf(),
            dependencies: self
                .depends
                .into_iter()
                .map(|d| ZiCModuleDependency {
                    module: d.module,
                    use_code: d.use_code,
                })
                .collect(),
        };
        descriptor.ZiFValidate()?;
        Ok(descriptor)
    }
}

fn ZiFParseText(text: &str, yaml: bool, archive: &Path) -> Result<ZiCModuleDescriptor> {
    let label = archive.display().to_string();
    let file: ZiCModuleFile = if yaml {
        serde_yaml::from_str(text).map_err(|e| ZiError::parse(label, e.to_string()))?
    } else {
        serde_json::from_str(text).map_err(|e| ZiError::parse(label, e.to_string()))?
    };
    file.into_runtime(archive)
}

fn ZiFIsYamlName(name: &str) -> bool {
    name.ends_with(".yaml") || name.ends_with(".yml")
}

/// Reads the descriptor entry of a module archive. Every failure, including
/// an unreadable archive, is reported as a parse error.
#[allow(non_snake_case)]
pub fn ZiFParseDescriptor(archive: &Path, descriptor_entry: &str) -> Result<ZiCModuleDescriptor> {
    let label = archive.display().to_string();
    let text = (|| -> Result<String> {
        let mut zip = ZipArchive::new(File::open(archive)?)?;
        let mut entry = zip.by_name(descriptor_entry)?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(text)
    })()
    .map_err(|e| ZiError::parse(label, e.to_string()))?;

    ZiFParseText(&text, ZiFIsYamlName(descriptor_entry), archive)
}

/// Reads a descriptor from a standalone file. The archive recorded in the
/// descriptor is `archive` when given, the file itself otherwise.
#[allow(non_snake_case)]
pub fn ZiFLoadDescriptorFromPath(path: &Path, archive: Option<&Path>) -> Result<ZiCModuleDescriptor> {
    let text = fs::read_to_string(path)
        .map_err(|e| ZiError::parse(path.display().to_string(), e.to_string()))?;
    let name = path.to_string_lossy();
    ZiFParseText(&text, ZiFIsYamlName(&name), archive.unwrap_or(path))
}

/// Lists module archives in `dir`, sorted by path.
#[allow(non_snake_case)]
pub fn ZiFDiscoverArchives(dir: &Path, config: &ZiCEngineConfig) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && config.ZiFIsArchivePath(&path) {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}
