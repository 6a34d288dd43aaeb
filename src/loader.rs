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

pub mod context;
pub mod scope;
pub mod root;
pub mod archive;
pub mod descriptor;
pub mod registry;
pub(crate) mod cache;
pub mod identity;
pub mod resource;
pub mod manager;

pub use context::{
    ZiCCodeSource,
    ZiCCodeSourceKind,
    ZiCContextId,
    ZiCContextKind,
    ZiCLoadingContext,
    ZiCResolvedSymbol,
    ZiCSymbolOrigin,
    ZiCWorkingArea,
    ZiFSymbolForEntry,
};

pub use scope::{ZiCActiveContextGuard, ZiFCurrentContext, ZiFEnterContext};
pub use root::{ZiCHostSymbols, ZiCRootVisibility, ZiCStaticHostSymbols, ZiFNewRootContext};
pub use archive::{ZiCArchiveMaterializer, ZiCMaterializedArchive};
pub use descriptor::{
    ZiCModuleDependency, ZiCModuleDescriptor, ZiCModuleVersion, ZiFDiscoverArchives, ZiFLoadDescriptorFromPath,
    ZiFParseDescriptor,
};
pub use registry::ZiCModuleRegistry;
pub use identity::{ZiCCanonicalResourceIdentity, ZiCResourceTriple, ZiCStringInterner};
pub use resource::{
    ZiCParentResource, ZiCResource, ZiCResourceParent, ZiCResourcePlan, ZiCResourceType,
    ZiCSharingPolicy, ZiFPlanResourceContext,
};
pub use manager::{ZiCContextManager, ZiCDiscoveryKey};
