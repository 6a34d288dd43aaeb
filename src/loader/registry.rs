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

use std::collections::HashMap;

use crate::dag::ZiCModuleGraph;
use crate::errors::Result;
use crate::loader::descriptor::ZiCModuleDescriptor;

/// Deployed module descriptors together with their dependency graph.
#[derive(Clone, Debug, Default)]
pub struct ZiCModuleRegistry {
    descriptors: HashMap<String, ZiCModuleDescriptor>,
    graph: ZiCModuleGraph,
}

impl ZiCModuleRegistry {
    #[allow(non_snake_case)]
    pub fn ZiFNew() -> Self {
        Self::default()
    }

    /// Adds a descriptor.
    ///
    /// When the name is already registered, the descriptor with the higher
    /// version wins; on equal versions the one added last wins. The dropped
    /// descriptor is logged.
    #[allow(non_snake_case)]
    pub fn ZiFRegister(&mut self, descriptor: ZiCModuleDescriptor) -> Result<()> {
        if let Some(existing) = self.descriptors.get(&descriptor.name) {
            if descriptor.ZiFVersion() < existing.ZiFVersion() {
                log::warn!(
                    "loader.module.version_conflict: module with same name and higher version already registered; keeping existing descriptor - module={}, existing_version={}, new_version={}, ignored_archive={}",
                    descriptor.name,
                    existing.version,
                    descriptor.version,
                    descriptor.archive.display()
                );
                return Ok(());
            }
            log::info!(
                "loader.module.upgrade: replacing module with newer or equal version - module={}, existing_version={}, new_version={}, ignored_archive={}",
                descriptor.name,
                existing.version,
                descriptor.version,
                existing.archive.display()
            );
            self.graph.ZiFRemove(&descriptor.name);
        }
        self.graph.ZiFAddModule(descriptor.ZiFToGraphNode())?;
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Builds a registry, skipping (and logging) descriptors that cannot be
    /// registered.
    #[allow(non_snake_case)]
    pub fn ZiFFromDescriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = ZiCModuleDescriptor>,
    {
        let mut registry = Self::default();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            let archive = descriptor.archive.display().to_string();
            if let Err(err) = registry.ZiFRegister(descriptor) {
                log::warn!("loader.registry.skipped: module not registered - module={}, archive={}, error={}", name, archive, err);
            }
        }
        registry
    }

    /// Takes a module out of the registry so that nothing can use its code
    /// any more. The graph keeps no trace of it either.
    #[allow(non_snake_case)]
    pub fn ZiFRetire(&mut self, module: &str) -> Option<ZiCModuleDescriptor> {
        self.graph.ZiFRemove(module);
        self.descriptors.remove(module)
    }

    #[allow(non_snake_case)]
    pub fn ZiFDescriptor(&self, module: &str) -> Option<&ZiCModuleDescriptor> {
        self.descriptors.get(module)
    }

    #[allow(non_snake_case)]
    pub fn ZiFContains(&self, module: &str) -> bool {
        self.descriptors.contains_key(module)
    }

    #[allow(non_snake_case)]
    pub fn ZiFProviderOf(&self, module: &str) -> Option<String> {
        self.graph.ZiFProviderOf(module)
    }

    #[allow(non_snake_case)]
    pub fn ZiFGraph(&self) -> &ZiCModuleGraph {
        &self.graph
    }

    #[allow(non_snake_case)]
    pub fn ZiFLen(&self) -> usize {
        self.descriptors.len()
    }

    #[allow(non_snake_case)]
    pub fn ZiFDeploymentOrder(&self) -> Result<Vec<String>> {
        self.graph.ZiFDeploymentOrder()
    }
}
