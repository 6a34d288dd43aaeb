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

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};

/// Configuration for the module loading engine.
///
/// Every field has a default, so a JSON or YAML document only needs to name
/// the settings it changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiCEngineConfig {
    /// Regexes over fully-qualified symbol names. Host symbols matching any of
    /// them are hidden from every module. Each pattern must match the whole name.
    pub hide_patterns: Vec<String>,
    /// Parent directory of every working area the engine creates.
    pub working_area_root: PathBuf,
    /// Directory scanned for module archives at initialization.
    pub modules_dir: Option<PathBuf>,
    /// File extensions treated as archives, both for modules and for
    /// libraries embedded inside them.
    pub archive_extensions: Vec<String>,
    /// Archive path holding embedded libraries.
    pub embedded_library_path: String,
    /// Archive entry holding the module descriptor.
    pub descriptor_entry: String,
    /// When false, resources always share their module context.
    pub create_resource_contexts: bool,
    /// Modules that are never deployed even if an archive is found.
    pub disabled_modules: Vec<String>,
}

impl Default for ZiCEngineConfig {
    fn default() -> Self {
        ZiCEngineConfig {
            hide_patterns: vec![r"zimod\..*".to_string()],
            working_area_root: std::env::temp_dir().join("zimod-work"),
            modules_dir: None,
            archive_extensions: vec!["zip".to_string(), "jar".to_string(), "zmod".to_string()],
            embedded_library_path: "lib/".to_string(),
            descriptor_entry: "module.json".to_string(),
            create_resource_contexts: true,
            disabled_modules: Vec::new(),
        }
    }
}

impl ZiCEngineConfig {
    #[allow(non_snake_case)]
    pub fn ZiFNew() -> Self {
        Self::default()
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithHidePatterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hide_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithWorkingAreaRoot(mut self, root: impl Into<PathBuf>) -> Self {
        self.working_area_root = root.into();
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithModulesDir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithEmbeddedLibraryPath(mut self, path: &str) -> Self {
        self.embedded_library_path = path.to_string();
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithDescriptorEntry(mut self, entry: &str) -> Self {
        self.descriptor_entry = entry.to_string();
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithResourceContexts(mut self, enabled: bool) -> Self {
        self.create_resource_contexts = enabled;
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithDisabledModules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true when `path` carries one of the configured archive extensions.
    #[allow(non_snake_case)]
    pub fn ZiFIsArchivePath(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.archive_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    #[allow(non_snake_case)]
    pub fn ZiFIsDisabled(&self, module: &str) -> bool {
        self.disabled_modules.iter().any(|m| m == module)
    }

    #[allow(non_snake_case)]
    pub fn ZiFFromJson(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Loads a configuration file. `.yaml`/`.yml` files are read as YAML,
    /// anything else as JSON.
    #[allow(non_snake_case)]
    pub fn ZiFFromPath(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Ok(serde_yaml::from_str(&text)?)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }

    /// Checks settings that would otherwise fail late, deep inside the engine.
    #[allow(non_snake_case)]
    pub fn ZiFValidate(&self) -> Result<()> {
        if self.descriptor_entry.trim().is_empty() {
            return Err(ZiError::validation("descriptor_entry cannot be empty"));
        }
        if self.archive_extensions.is_empty() {
            return Err(ZiError::validation("archive_extensions cannot be empty"));
        }
        Ok(())
    }
}
