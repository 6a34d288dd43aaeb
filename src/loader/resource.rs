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

//! # Managed Resources
//!
//! Resources form a tree (a host, the servers on it, the applications in
//! each server...). Every resource type belongs to a module and declares
//! whether its instances can share the module context (`Shared`) or each need
//! their own (`Instance`). The decision table below picks the context a
//! resource runs in from its own policy and its parent's.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};
use crate::loader::context::ZiCLoadingContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZiCSharingPolicy {
    Shared,
    Instance,
}

impl fmt::Display for ZiCSharingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZiCSharingPolicy::Shared => write!(f, "SHARED"),
            ZiCSharingPolicy::Instance => write!(f, "INSTANCE"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiCResourceType {
    pub name: String,
    pub module: String,
    /// `None` when the type metadata never set a policy.
    pub sharing: Option<ZiCSharingPolicy>,
}

impl ZiCResourceType {
    #[allow(non_snake_case)]
    pub fn ZiFNew(
        name: impl Into<String>,
        module: impl Into<String>,
        sharing: Option<ZiCSharingPolicy>,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            sharing,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ZiCResource {
    pub key: String,
    pub resource_type: ZiCResourceType,
    pub parent: Option<Arc<ZiCResource>>,
}

impl ZiCResource {
    #[allow(non_snake_case)]
    pub fn ZiFNew(key: impl Into<String>, resource_type: ZiCResourceType) -> Self {
        Self {
            key: key.into(),
            resource_type,
            parent: None,
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithParent(mut self, parent: Arc<ZiCResource>) -> Self {
        self.parent = Some(parent);
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFModule(&self) -> &str {
        &self.resource_type.module
    }

    /// True for the resource at the top of the hierarchy.
    #[allow(non_snake_case)]
    pub fn ZiFIsHierarchyRoot(&self) -> bool {
        self.parent.is_none()
    }
}

/// A resource's parent together with the context already resolved for it.
#[derive(Clone, Copy, Debug)]
pub struct ZiCParentResource<'a> {
    pub resource: &'a ZiCResource,
    pub context: &'a ZiCLoadingContext,
}

impl<'a> ZiCParentResource<'a> {
    #[allow(non_snake_case)]
    pub fn ZiFNew(resource: &'a ZiCResource, context: &'a ZiCLoadingContext) -> Self {
        Self { resource, context }
    }
}

/// Where a freshly built resource context hangs in the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZiCResourceParent {
    /// The parent of the named module's own context, skipping that context.
    ModuleContextParent(String),
    /// The named module's context.
    ModuleContext(String),
    /// The context already resolved for the parent resource.
    ParentResourceContext,
}

/// Outcome of the sharing-policy decision table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZiCResourcePlan {
    /// Same module as the parent resource: run in the parent's context.
    ReuseParent,
    /// Run in the named module's shared context.
    ModuleContext(String),
    /// Build a dedicated context from the module's archive.
    Fresh {
        module: String,
        parent: ZiCResourceParent,
    },
}

/// Applies the decision table to one resource and its parent.
///
/// | same module | own      | parent   | parent is root | plan |
/// |---|---|---|---|---|
/// | yes | any      | any      | any | reuse parent context |
/// | no  | Shared   | Shared   | any | module context of own module |
/// | no  | Instance | Shared   | yes | fresh, parented on own module context's parent |
/// | no  | Instance | Shared   | no  | fresh, parented on parent module's context |
/// | no  | Shared   | Instance | any | fresh, parented on parent resource context |
/// | no  | Instance | Instance | any | fresh, parented on parent resource context |
#[allow(non_snake_case)]
pub fn ZiFPlanResourceContext(
    resource_key: &str,
    own_module: &str,
    own_policy: Option<ZiCSharingPolicy>,
    parent_module: &str,
    parent_policy: Option<ZiCSharingPolicy>,
    parent_is_root: bool,
) -> Result<ZiCResourcePlan> {
    use ZiCSharingPolicy::{Instance, Shared};

    if own_module == parent_module {
        return Ok(ZiCResourcePlan::ReuseParent);
    }

    let plan = match (own_policy, parent_policy) {
        // Top of the hierarchy or not, a shared resource under a shared
        // parent runs in its own module context. Its module must then depend
        // on the parent's module.
        (Some(Shared), Some(Shared)) => ZiCResourcePlan::ModuleContext(own_module.to_string()),
        (Some(Instance), Some(Shared)) if parent_is_root => ZiCResourcePlan::Fresh {
            module: own_module.to_string(),
            parent: ZiCResourceParent::ModuleContextParent(own_module.to_string()),
        },
        (Some(Instance), Some(Shared)) => ZiCResourcePlan::Fresh {
            module: own_module.to_string(),
            parent: ZiCResourceParent::ModuleContext(parent_module.to_string()),
        },
        (Some(Shared), Some(Instance)) | (Some(Instance), Some(Instance)) => {
            ZiCResourcePlan::Fresh {
                module: own_module.to_string(),
                parent: ZiCResourceParent::ParentResourceContext,
            }
        }
        (own, parent) => {
            return Err(ZiError::InvalidSharingPolicy {
                resource: resource_key.to_string(),
                own: own.map(|p| p.to_string()).unwrap_or_else(|| "unset".to_string()),
                parent: parent.map(|p| p.to_string()).unwrap_or_else(|| "unset".to_string()),
            });
        }
    };
    Ok(plan)
}
