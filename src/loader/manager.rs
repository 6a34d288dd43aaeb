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

//! # Context Manager
//!
//! Owns the root context and the three context caches of one engine:
//!
//! - **module contexts**, one per deployed module, parented on the module's
//!   provider context (or the root);
//! - **discovery contexts**, one per `(module, foreign parent)` pair;
//! - **resource contexts**, one per canonical resource identity, which may
//!   alias a module context or a context of their own.
//!
//! Everything a new context hangs under is obtained before the owning
//! cache's construction lock is taken, so nested obtains never wait on a
//! lock their own caller holds.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::ZiCEngineConfig;
use crate::errors::{Result, ZiError};
use crate::loader::archive::ZiCArchiveMaterializer;
use crate::loader::cache::ZiCContextCache;
use crate::loader::context::{ZiCCodeSource, ZiCContextId, ZiCContextKind, ZiCLoadingContext};
use crate::loader::descriptor::ZiCModuleDescriptor;
use crate::loader::identity::{ZiCCanonicalResourceIdentity, ZiCStringInterner};
use crate::loader::registry::ZiCModuleRegistry;
use crate::loader::resource::{
    ZiCParentResource, ZiCResource, ZiCResourceParent, ZiCResourcePlan, ZiFPlanResourceContext,
};
use crate::loader::root::{ZiCHostSymbols, ZiFNewRootContext};

/// Key of the discovery cache: module name plus the foreign parent's id.
pub type ZiCDiscoveryKey = (String, ZiCContextId);

/// A resource context that either already exists or still has to be built.
enum ZiCPreparedContext {
    Existing(ZiCLoadingContext),
    Fresh {
        module: String,
        archive: PathBuf,
        parent: ZiCLoadingContext,
    },
}

pub struct ZiCContextManager {
    config: ZiCEngineConfig,
    root: ZiCLoadingContext,
    registry: RwLock<ZiCModuleRegistry>,
    materializer: ZiCArchiveMaterializer,
    modules: ZiCContextCache<String>,
    discovery: ZiCContextCache<ZiCDiscoveryKey>,
    resources: ZiCContextCache<ZiCCanonicalResourceIdentity>,
    interner: ZiCStringInterner,
}

impl ZiCContextManager {
    /// Builds the root context and empty caches over `registry`.
    #[allow(non_snake_case)]
    pub fn ZiFNew(
        config: ZiCEngineConfig,
        host: Arc<dyn ZiCHostSymbols>,
        registry: ZiCModuleRegistry,
    ) -> Result<Self> {
        config.ZiFValidate()?;
        let root = ZiFNewRootContext(&config.hide_patterns, host)?;
        let materializer = ZiCArchiveMaterializer::ZiFNew(&config);
        Ok(Self {
            config,
            root,
            registry: RwLock::new(registry),
            materializer,
            modules: ZiCContextCache::ZiFNew("module"),
            discovery: ZiCContextCache::ZiFNew("discovery"),
            resources: ZiCContextCache::ZiFNew("resource"),
            interner: ZiCStringInterner::ZiFNew(),
        })
    }

    #[allow(non_snake_case)]
    pub fn ZiFRoot(&self) -> &ZiCLoadingContext {
        &self.root
    }

    #[allow(non_snake_case)]
    pub fn ZiFConfig(&self) -> &ZiCEngineConfig {
        &self.config
    }

    #[allow(non_snake_case)]
    pub fn ZiFDescriptor(&self, module: &str) -> Result<Option<ZiCModuleDescriptor>> {
        Ok(self.ZiFReadRegistry()?.ZiFDescriptor(module).cloned())
    }

    #[allow(non_snake_case)]
    pub fn ZiFDeploymentOrder(&self) -> Result<Vec<String>> {
        self.ZiFReadRegistry()?.ZiFDeploymentOrder()
    }

    /// Removes a module from the registry. Modules using its code can no
    /// longer be obtained; contexts already built are left alone.
    #[allow(non_snake_case)]
    pub fn ZiFRetireModule(&self, module: &str) -> Result<Option<ZiCModuleDescriptor>> {
        let retired = self
            .registry
            .write()
            .map_err(|_| ZiError::poisoned("registry"))?
            .ZiFRetire(module);
        if retired.is_some() {
            log::debug!("loader.module.retired: module retired - module={}", module);
        }
        Ok(retired)
    }

    /// Returns the context of `module`, building it and its provider chain on
    /// first use.
    #[allow(non_snake_case)]
    pub fn ZiFObtainModuleContext(&self, module: &str) -> Result<ZiCLoadingContext> {
        let mut visiting = Vec::new();
        self.ZiFObtainModule(module, &mut visiting)
    }

    fn ZiFObtainModule(&self, module: &str, visiting: &mut Vec<String>) -> Result<ZiCLoadingContext> {
        let key = module.to_string();
        if let Some(found) = self.modules.ZiFGet(&key)? {
            return Ok(found);
        }
        if let Some(pos) = visiting.iter().position(|m| m == module) {
            let mut cycle = visiting[pos..].to_vec();
            cycle.push(key);
            return Err(ZiError::CyclicDependency { cycle });
        }

        let (archive, provider) = {
            let registry = self.ZiFReadRegistry()?;
            let descriptor = registry
                .ZiFDescriptor(module)
                .ok_or_else(|| ZiError::unknown_module(module))?;
            let provider = descriptor.ZiFProvider().map(str::to_string);
            if let Some(p) = &provider {
                if !registry.ZiFContains(p) {
                    return Err(ZiError::missing_dependency(module, p.as_str()));
                }
            }
            (descriptor.archive.clone(), provider)
        };

        let parent = match provider {
            Some(p) => {
                visiting.push(key.clone());
                let parent = self.ZiFObtainModule(&p, visiting);
                visiting.pop();
                parent?
            }
            None => self.root.clone(),
        };

        self.modules.ZiFGetOrConstruct(&key, || {
            self.ZiFConstruct(ZiCContextKind::Module, module.to_string(), &archive, parent, &[])
        })
    }

    /// Returns the context `module` uses to discover resources below a
    /// resource whose context is `foreign_parent`.
    #[allow(non_snake_case)]
    pub fn ZiFObtainDiscoveryContext(
        &self,
        module: &str,
        foreign_parent: &ZiCLoadingContext,
    ) -> Result<ZiCLoadingContext> {
        let key: ZiCDiscoveryKey = (module.to_string(), foreign_parent.ZiFId());
        if let Some(found) = self.discovery.ZiFGet(&key)? {
            return Ok(found);
        }
        let archive = self.ZiFArchiveOf(module)?;
        self.discovery.ZiFGetOrConstruct(&key, || {
            self.ZiFConstruct(
                ZiCContextKind::Discovery,
                format!("{}@{}", module, foreign_parent.ZiFId()),
                &archive,
                foreign_parent.clone(),
                &[],
            )
        })
    }

    /// Returns the context `resource` runs in.
    ///
    /// `parent` is the resource's parent with its already resolved context;
    /// `None` marks the top of the resource hierarchy. `additional_sources`
    /// are appended after the module archive whenever a dedicated context is
    /// built, and ignored otherwise.
    #[allow(non_snake_case)]
    pub fn ZiFResolveResourceContext(
        &self,
        resource: &ZiCResource,
        parent: Option<ZiCParentResource<'_>>,
        additional_sources: &[PathBuf],
    ) -> Result<ZiCLoadingContext> {
        let parent_resource = parent
            .map(|p| p.resource)
            .or_else(|| resource.parent.as_deref());
        let lookup = ZiCCanonicalResourceIdentity::ZiFUninterned(resource, parent_resource)?;
        if let Some(found) = self.resources.ZiFGet(&lookup)? {
            return Ok(found);
        }

        let prepared = self.ZiFPrepareResourceContext(resource, parent)?;
        let identity = lookup.ZiFInterned(&self.interner)?;
        self.resources.ZiFGetOrConstruct(&identity, || match prepared {
            ZiCPreparedContext::Existing(context) => Ok(context),
            ZiCPreparedContext::Fresh {
                module,
                archive,
                parent,
            } => {
                log::debug!("loader.resource.dedicated: building dedicated resource context - resource={}, module={}", identity, module);
                self.ZiFConstruct(
                    ZiCContextKind::Resource,
                    identity.to_string(),
                    &archive,
                    parent,
                    additional_sources,
                )
            }
        })
    }

    fn ZiFPrepareResourceContext(
        &self,
        resource: &ZiCResource,
        parent: Option<ZiCParentResource<'_>>,
    ) -> Result<ZiCPreparedContext> {
        let own_module = resource.ZiFModule();
        let parent = match parent {
            Some(parent) if self.config.create_resource_contexts => parent,
            _ => {
                return Ok(ZiCPreparedContext::Existing(
                    self.ZiFObtainModuleContext(own_module)?,
                ))
            }
        };

        let plan = ZiFPlanResourceContext(
            &resource.key,
            own_module,
            resource.resource_type.sharing,
            parent.resource.ZiFModule(),
            parent.resource.resource_type.sharing,
            parent.resource.ZiFIsHierarchyRoot(),
        )?;

        let prepared = match plan {
            ZiCResourcePlan::ReuseParent => ZiCPreparedContext::Existing(parent.context.clone()),
            ZiCResourcePlan::ModuleContext(module) => {
                ZiCPreparedContext::Existing(self.ZiFObtainModuleContext(&module)?)
            }
            ZiCResourcePlan::Fresh { module, parent: attach } => {
                let parent_context = match attach {
                    ZiCResourceParent::ModuleContextParent(m) => self
                        .ZiFObtainModuleContext(&m)?
                        .ZiFParent()
                        .cloned()
                        .unwrap_or_else(|| self.root.clone()),
                    ZiCResourceParent::ModuleContext(m) => self.ZiFObtainModuleContext(&m)?,
                    ZiCResourceParent::ParentResourceContext => parent.context.clone(),
                };
                ZiCPreparedContext::Fresh {
                    archive: self.ZiFArchiveOf(&module)?,
                    module,
                    parent: parent_context,
                }
            }
        };
        Ok(prepared)
    }

    fn ZiFConstruct(
        &self,
        kind: ZiCContextKind,
        label: String,
        archive: &Path,
        parent: ZiCLoadingContext,
        additional_sources: &[PathBuf],
    ) -> Result<ZiCLoadingContext> {
        let materialized = self
            .materializer
            .ZiFMaterialize(archive, &self.config.working_area_root)?;
        let mut sources = materialized.sources;
        for extra in additional_sources {
            let source = ZiCCodeSource::ZiFFromPath(extra)
                .map_err(|e| ZiError::archive_io(extra.display().to_string(), e.to_string()))?;
            sources.push(source);
        }

        let context =
            ZiCLoadingContext::ZiFNew(kind, label, parent, sources, materialized.working_area);
        log::debug!(
            "loader.context.created: context created - context={}, archive={}, parent={}, sources={}",
            context,
            archive.display(),
            context
                .ZiFParent()
                .map(|p| p.to_string())
                .unwrap_or_default(),
            context.ZiFSources().len()
        );
        Ok(context)
    }

    fn ZiFArchiveOf(&self, module: &str) -> Result<PathBuf> {
        self.ZiFReadRegistry()?
            .ZiFDescriptor(module)
            .map(|d| d.archive.clone())
            .ok_or_else(|| ZiError::unknown_module(module))
    }

    fn ZiFReadRegistry(&self) -> Result<std::sync::RwLockReadGuard<'_, ZiCModuleRegistry>> {
        self.registry.read().map_err(|_| ZiError::poisoned("registry"))
    }

    #[allow(non_snake_case)]
    pub fn ZiFCountModuleContexts(&self) -> usize {
        self.modules.ZiFLen().unwrap_or(0)
    }

    #[allow(non_snake_case)]
    pub fn ZiFCountDiscoveryContexts(&self) -> usize {
        self.discovery.ZiFLen().unwrap_or(0)
    }

    /// Distinct resource contexts; many resources may share one.
    #[allow(non_snake_case)]
    pub fn ZiFCountUniqueResourceContexts(&self) -> usize {
        self.resources.ZiFUniqueLen().unwrap_or(0)
    }

    #[allow(non_snake_case)]
    pub fn ZiFModuleContexts(&self) -> Result<HashMap<String, ZiCLoadingContext>> {
        self.modules.ZiFSnapshot()
    }

    #[allow(non_snake_case)]
    pub fn ZiFDiscoveryContexts(&self) -> Result<HashMap<ZiCDiscoveryKey, ZiCLoadingContext>> {
        self.discovery.ZiFSnapshot()
    }

    #[allow(non_snake_case)]
    pub fn ZiFResourceContexts(
        &self,
    ) -> Result<HashMap<ZiCCanonicalResourceIdentity, ZiCLoadingContext>> {
        self.resources.ZiFSnapshot()
    }

    /// Closes every cache and purges each distinct context's working area
    /// once. Purge failures are logged, not returned.
    ///
    /// Returns the number of distinct contexts released.
    #[allow(non_snake_case)]
    pub fn ZiFDestroy(&self) -> Result<usize> {
        let mut released = Vec::new();
        released.extend(self.resources.ZiFClose()?);
        released.extend(self.discovery.ZiFClose()?);
        released.extend(self.modules.ZiFClose()?);

        let mut seen = HashSet::new();
        let mut count = 0;
        for context in released {
            if !seen.insert(context.ZiFId()) {
                continue;
            }
            count += 1;
            if let Err(err) = context.ZiFDestroy() {
                log::warn!("loader.context.purge_failed: cannot purge working area - context={}, error={}", context, err);
            }
        }
        self.interner.ZiFClear();
        log::debug!("loader.manager.destroyed: caches closed - contexts={}", count);
        Ok(count)
    }
}

impl fmt::Display for ZiCContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ZiCContextManager [#module={}, #discovery={}, #resource={}]",
            self.ZiFCountModuleContexts(),
            self.ZiFCountDiscoveryContexts(),
            self.ZiFCountUniqueResourceContexts()
        )
    }
}

impl fmt::Debug for ZiCContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiCContextManager")
            .field("root", &self.root)
            .field("modules", &self.ZiFCountModuleContexts())
            .field("discovery", &self.ZiFCountDiscoveryContexts())
            .field("resources", &self.ZiFCountUniqueResourceContexts())
            .finish()
    }
}
