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

//! # Module Lifecycle
//!
//! The orchestrator drives one engine run:
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> ShuttingDown -> Terminated
//! ```
//!
//! `Terminated` is final. Running again needs a new orchestrator.
//!
//! Initialization parses every descriptor it is given (bad ones are logged
//! and skipped), orders the modules by dependency, and for each module in
//! that order obtains its context and runs its `initialize` hook with the
//! context active. A module that fails is retired, so modules using its code
//! fail too when their own context is obtained. Only a dependency cycle stops
//! initialization as a whole.
//!
//! Shutdown runs the `shutdown` hooks in reverse deployment order, ignoring
//! their failures, then releases every context of the engine.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::ZiCEngineConfig;
use crate::errors::{Result, ZiError};
use crate::loader::context::ZiCLoadingContext;
use crate::loader::descriptor::{ZiCModuleDescriptor, ZiFDiscoverArchives, ZiFParseDescriptor};
use crate::loader::manager::ZiCContextManager;
use crate::loader::registry::ZiCModuleRegistry;
use crate::loader::resource::{ZiCParentResource, ZiCResource};
use crate::loader::root::ZiCHostSymbols;

/// What a lifecycle hook is told about the module it runs for.
#[derive(Clone, Copy, Debug)]
pub struct ZiCModuleHookContext<'a> {
    pub module: &'a str,
    pub descriptor: &'a ZiCModuleDescriptor,
    pub context: &'a ZiCLoadingContext,
}

/// Install and teardown hooks supplied by a module.
pub trait ZiCModuleLifecycle: Send + Sync {
    fn initialize(&self, hook: &ZiCModuleHookContext<'_>) -> Result<()>;

    fn shutdown(&self, _hook: &ZiCModuleHookContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Hooks looked up by module name.
#[derive(Clone, Default)]
pub struct ZiCLifecycleRegistry {
    hooks: HashMap<String, Arc<dyn ZiCModuleLifecycle>>,
}

impl ZiCLifecycleRegistry {
    #[allow(non_snake_case)]
    pub fn ZiFNew() -> Self {
        Self::default()
    }

    /// Registers hooks for `module`, replacing any registered before.
    #[allow(non_snake_case)]
    pub fn ZiFRegister(&mut self, module: impl Into<String>, hook: Arc<dyn ZiCModuleLifecycle>) {
        self.hooks.insert(module.into(), hook);
    }

    #[allow(non_snake_case)]
    pub fn ZiFWith(mut self, module: impl Into<String>, hook: Arc<dyn ZiCModuleLifecycle>) -> Self {
        self.ZiFRegister(module, hook);
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFGet(&self, module: &str) -> Option<Arc<dyn ZiCModuleLifecycle>> {
        self.hooks.get(module).cloned()
    }

    #[allow(non_snake_case)]
    pub fn ZiFLen(&self) -> usize {
        self.hooks.len()
    }
}

impl fmt::Debug for ZiCLifecycleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<&String> = self.hooks.keys().collect();
        modules.sort();
        f.debug_struct("ZiCLifecycleRegistry")
            .field("modules", &modules)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiCEngineState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for ZiCEngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZiCEngineState::Uninitialized => "uninitialized",
            ZiCEngineState::Initializing => "initializing",
            ZiCEngineState::Ready => "ready",
            ZiCEngineState::ShuttingDown => "shutting down",
            ZiCEngineState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A module that could not be deployed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiCModuleFailure {
    pub module: String,
    pub error: ZiError,
}

pub struct ZiCModuleOrchestrator {
    config: ZiCEngineConfig,
    host: Arc<dyn ZiCHostSymbols>,
    hooks: ZiCLifecycleRegistry,
    state: Mutex<ZiCEngineState>,
    manager: Mutex<Option<Arc<ZiCContextManager>>>,
    deployed: Mutex<Vec<String>>,
    failed: Mutex<Vec<ZiCModuleFailure>>,
}

impl ZiCModuleOrchestrator {
    #[allow(non_snake_case)]
    pub fn ZiFNew(
        config: ZiCEngineConfig,
        host: Arc<dyn ZiCHostSymbols>,
        hooks: ZiCLifecycleRegistry,
    ) -> Self {
        Self {
            config,
            host,
            hooks,
            state: Mutex::new(ZiCEngineState::Uninitialized),
            manager: Mutex::new(None),
            deployed: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFState(&self) -> ZiCEngineState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ZiCEngineState::Terminated)
    }

    /// Deploys the modules found in `archives`.
    #[allow(non_snake_case)]
    pub fn ZiFInitialize(&self, archives: &[PathBuf]) -> Result<()> {
        self.ZiFBegin()?;
        let mut descriptors = Vec::new();
        for archive in archives {
            match ZiFParseDescriptor(archive, &self.config.descriptor_entry) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => log::warn!("lifecycle.descriptor.skipped: cannot read module descriptor - archive={}, error={}", archive.display(), err),
            }
        }
        self.ZiFDeploy(descriptors)
    }

    /// Deploys every archive in the configured modules directory.
    #[allow(non_snake_case)]
    pub fn ZiFInitializeFromModulesDir(&self) -> Result<()> {
        let dir = self
            .config
            .modules_dir
            .clone()
            .ok_or_else(|| ZiError::validation("modules_dir is not configured"))?;
        let archives = ZiFDiscoverArchives(&dir, &self.config)?;
        log::info!("lifecycle.modules.discovered: scanned modules directory - dir={}, archives={}", dir.display(), archives.len());
        self.ZiFInitialize(&archives)
    }

    /// Deploys already parsed descriptors.
    #[allow(non_snake_case)]
    pub fn ZiFInitializeWithDescriptors(&self, descriptors: Vec<ZiCModuleDescriptor>) -> Result<()> {
        self.ZiFBegin()?;
        let mut valid = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match descriptor.ZiFValidate() {
                Ok(()) => valid.push(descriptor),
                Err(err) => log::warn!("lifecycle.descriptor.skipped: invalid module descriptor - module={}, error={}", descriptor.name, err),
            }
        }
        self.ZiFDeploy(valid)
    }

    fn ZiFBegin(&self) -> Result<()> {
        let mut state = self.ZiFLockState()?;
        if *state != ZiCEngineState::Uninitialized {
            return Err(ZiError::invalid_state("initialize", state.to_string()));
        }
        *state = ZiCEngineState::Initializing;
        log::info!("lifecycle.engine.initializing: module engine initializing");
        Ok(())
    }

    fn ZiFDeploy(&self, descriptors: Vec<ZiCModuleDescriptor>) -> Result<()> {
        match self.ZiFDeployInner(descriptors) {
            Ok(()) => {
                self.ZiFSetState(ZiCEngineState::Ready)?;
                log::info!(
                    "lifecycle.engine.ready: module engine ready - deployed={}, failed={}",
                    self.ZiFDeploymentOrder().len(),
                    self.ZiFFailedModules().len()
                );
                Ok(())
            }
            Err(err) => {
                log::error!("lifecycle.engine.failed: module engine initialization failed - error={}", err);
                self.ZiFSetState(ZiCEngineState::Terminated)?;
                Err(err)
            }
        }
    }

    fn ZiFDeployInner(&self, descriptors: Vec<ZiCModuleDescriptor>) -> Result<()> {
        let enabled = descriptors.into_iter().filter(|d| {
            let disabled = self.config.ZiFIsDisabled(&d.name);
            if disabled {
                log::info!("lifecycle.module.disabled: module disabled by configuration - module={}", d.name);
            }
            !disabled
        });
        let registry = ZiCModuleRegistry::ZiFFromDescriptors(enabled);
        for (module, missing) in registry.ZiFGraph().ZiFDanglingDependencies() {
            log::warn!("lifecycle.module.dangling: dependency is not deployed - module={}, dependency={}", module, missing);
        }

        let manager = Arc::new(ZiCContextManager::ZiFNew(
            self.config.clone(),
            Arc::clone(&self.host),
            registry,
        )?);
        let order = manager.ZiFDeploymentOrder()?;
        log::info!("lifecycle.engine.order: deployment order computed - order=[{}]", order.join(", "));
        *self
            .manager
            .lock()
            .map_err(|_| ZiError::poisoned("manager"))? = Some(Arc::clone(&manager));

        for module in &order {
            match self.ZiFInstall(&manager, module) {
                Ok(()) => {
                    log::debug!("lifecycle.module.deployed: module deployed - module={}", module);
                    self.deployed
                        .lock()
                        .map_err(|_| ZiError::poisoned("deployed modules"))?
                        .push(module.clone());
                }
                Err(err) => {
                    log::error!("lifecycle.module.failed: module failed to deploy - module={}, error={}", module, err);
                    manager.ZiFRetireModule(module)?;
                    self.failed
                        .lock()
                        .map_err(|_| ZiError::poisoned("failed modules"))?
                        .push(ZiCModuleFailure {
                            module: module.clone(),
                            error: err,
                        });
                }
            }
        }
        Ok(())
    }

    fn ZiFInstall(&self, manager: &ZiCContextManager, module: &str) -> Result<()> {
        let context = manager.ZiFObtainModuleContext(module)?;
        let hook = match self.hooks.ZiFGet(module) {
            Some(hook) => hook,
            None => return Ok(()),
        };
        let descriptor = manager
            .ZiFDescriptor(module)?
            .ok_or_else(|| ZiError::unknown_module(module))?;
        let _active = context.ZiFEnter();
        hook.initialize(&ZiCModuleHookContext {
            module,
            descriptor: &descriptor,
            context: &context,
        })
        .map_err(|e| ZiError::lifecycle(module, "initialize", e.to_string()))
    }

    /// Runs shutdown hooks and releases every context. Safe to call more
    /// than once; calls made while a shutdown is running or after it finished
    /// do nothing. Shutting down during initialization is refused.
    #[allow(non_snake_case)]
    pub fn ZiFShutdown(&self) -> Result<()> {
        {
            let mut state = self.ZiFLockState()?;
            match *state {
                ZiCEngineState::Terminated | ZiCEngineState::ShuttingDown => return Ok(()),
                ZiCEngineState::Uninitialized => {
                    *state = ZiCEngineState::Terminated;
                    return Ok(());
                }
                ZiCEngineState::Ready => *state = ZiCEngineState::ShuttingDown,
                other => return Err(ZiError::invalid_state("shut down", other.to_string())),
            }
        }
        log::info!("lifecycle.engine.shutdown: module engine shutting down");

        let manager = self
            .manager
            .lock()
            .map_err(|_| ZiError::poisoned("manager"))?
            .clone();
        if let Some(manager) = manager {
            let deployed = self
                .deployed
                .lock()
                .map_err(|_| ZiError::poisoned("deployed modules"))?
                .clone();
            for module in deployed.iter().rev() {
                self.ZiFTeardown(&manager, module);
            }
            match manager.ZiFDestroy() {
                Ok(released) => log::debug!("lifecycle.engine.released: contexts released - count={}", released),
                Err(err) => log::error!("lifecycle.engine.release_failed: cannot release contexts - error={}", err),
            }
        }

        self.ZiFSetState(ZiCEngineState::Terminated)?;
        log::info!("lifecycle.engine.terminated: module engine terminated");
        Ok(())
    }

    fn ZiFTeardown(&self, manager: &ZiCContextManager, module: &str) {
        let hook = match self.hooks.ZiFGet(module) {
            Some(hook) => hook,
            None => return,
        };
        let result = (|| -> Result<()> {
            let context = manager.ZiFObtainModuleContext(module)?;
            let descriptor = manager
                .ZiFDescriptor(module)?
                .ok_or_else(|| ZiError::unknown_module(module))?;
            let _active = context.ZiFEnter();
            hook.shutdown(&ZiCModuleHookContext {
                module,
                descriptor: &descriptor,
                context: &context,
            })
        })();
        if let Err(err) = result {
            log::warn!("lifecycle.module.shutdown_failed: shutdown hook failed - module={}, error={}", module, err);
        }
    }

    /// Modules deployed successfully, in deployment order.
    #[allow(non_snake_case)]
    pub fn ZiFDeploymentOrder(&self) -> Vec<String> {
        self.deployed.lock().map(|d| d.clone()).unwrap_or_default()
    }

    #[allow(non_snake_case)]
    pub fn ZiFFailedModules(&self) -> Vec<ZiCModuleFailure> {
        self.failed.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// The context manager of the current run.
    #[allow(non_snake_case)]
    pub fn ZiFManager(&self) -> Result<Arc<ZiCContextManager>> {
        self.manager
            .lock()
            .map_err(|_| ZiError::poisoned("manager"))?
            .clone()
            .ok_or_else(|| ZiError::invalid_state("use contexts", self.ZiFState().to_string()))
    }

    #[allow(non_snake_case)]
    pub fn ZiFObtainModuleContext(&self, module: &str) -> Result<ZiCLoadingContext> {
        self.ZiFManager()?.ZiFObtainModuleContext(module)
    }

    #[allow(non_snake_case)]
    pub fn ZiFObtainDiscoveryContext(
        &self,
        module: &str,
        foreign_parent: &ZiCLoadingContext,
    ) -> Result<ZiCLoadingContext> {
        self.ZiFManager()?.ZiFObtainDiscoveryContext(module, foreign_parent)
    }

    #[allow(non_snake_case)]
    pub fn ZiFResolveResourceContext(
        &self,
        resource: &ZiCResource,
        parent: Option<ZiCParentResource<'_>>,
        additional_sources: &[PathBuf],
    ) -> Result<ZiCLoadingContext> {
        self.ZiFManager()?
            .ZiFResolveResourceContext(resource, parent, additional_sources)
    }

    #[allow(non_snake_case)]
    pub fn ZiFCountModuleContexts(&self) -> usize {
        self.ZiFManager()
            .map(|m| m.ZiFCountModuleContexts())
            .unwrap_or(0)
    }

    #[allow(non_snake_case)]
    pub fn ZiFCountDiscoveryContexts(&self) -> usize {
        self.ZiFManager()
            .map(|m| m.ZiFCountDiscoveryContexts())
            .unwrap_or(0)
    }

    #[allow(non_snake_case)]
    pub fn ZiFCountUniqueResourceContexts(&self) -> usize {
        self.ZiFManager()
            .map(|m| m.ZiFCountUniqueResourceContexts())
            .unwrap_or(0)
    }

    fn ZiFLockState(&self) -> Result<MutexGuard<'_, ZiCEngineState>> {
        self.state.lock().map_err(|_| ZiError::poisoned("engine state"))
    }

    fn ZiFSetState(&self, next: ZiCEngineState) -> Result<()> {
        *self.ZiFLockState()? = next;
        Ok(())
    }
}

impl fmt::Debug for ZiCModuleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiCModuleOrchestrator")
            .field("state", &self.ZiFState())
            .field("hooks", &self.hooks)
            .field("deployed", &self.ZiFDeploymentOrder())
            .finish()
    }
}
