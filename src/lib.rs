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

//! # Zimod
//!
//! Module loading and isolation engine. Independently built, versioned
//! module archives become a tree of loading contexts that decide which code
//! each module, and each managed resource, can see.
//!
//! ## Module Overview
//!
//! - **errors**: `ZiError` and the crate `Result` alias
//! - **config**: engine configuration (hide patterns, working areas, module discovery)
//! - **dag**: module dependency graph and deployment order
//! - **loader**: loading contexts, root context, archive materializer,
//!   context caches, resource contexts and canonical resource identity
//! - **lifecycle**: ordered module initialization and teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zimod::{ZiCEngineConfig, ZiCLifecycleRegistry, ZiCModuleOrchestrator, ZiCStaticHostSymbols};
//!
//! let config = ZiCEngineConfig::ZiFNew().ZiFWithModulesDir("/opt/app/modules");
//! let engine = ZiCModuleOrchestrator::ZiFNew(
//!     config,
//!     Arc::new(ZiCStaticHostSymbols::ZiFNew(["std.Vec"])),
//!     ZiCLifecycleRegistry::ZiFNew(),
//! );
//! engine.ZiFInitializeFromModulesDir()?;
//! let web = engine.ZiFObtainModuleContext("web")?;
//! assert!(web.ZiFParent().is_some());
//! engine.ZiFShutdown()?;
//! # Ok::<(), zimod::ZiError>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ZiError>`. Failures while deploying one
//! module are logged and recorded without stopping the others; only a
//! dependency cycle aborts initialization.

#![allow(non_snake_case)]

pub mod errors;
pub mod config;
pub mod dag;
pub mod loader;
pub mod lifecycle;

pub use errors::{Result, ZiError};
pub use config::ZiCEngineConfig;
pub use dag::{ZiCModuleGraph, ZiCModuleId, ZiCModuleNode};
pub use loader::{
    ZiCActiveContextGuard, ZiCCanonicalResourceIdentity, ZiCCodeSource, ZiCContextId,
    ZiCContextKind, ZiCContextManager, ZiCHostSymbols, ZiCLoadingContext, ZiCModuleDescriptor,
    ZiCModuleRegistry, ZiCParentResource, ZiCResolvedSymbol, ZiCResource, ZiCResourceType,
    ZiCSharingPolicy, ZiCStaticHostSymbols, ZiCSymbolOrigin, ZiFCurrentContext,
};
pub use lifecycle::{
    ZiCEngineState, ZiCLifecycleRegistry, ZiCModuleFailure, ZiCModuleHookContext,
    ZiCModuleLifecycle, ZiCModuleOrchestrator,
};
