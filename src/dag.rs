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

//! # Module Dependency Graph
//!
//! Tracks which module depends on which, and which single module each one
//! uses the code of (its provider). The graph answers two questions for the
//! loader: the deployment order, and `provider of(module)`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::errors::{Result, ZiError};

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ZiCModuleId(pub String);

impl fmt::Display for ZiCModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ZiCModuleId {
    fn from(s: &str) -> Self {
        ZiCModuleId(s.to_string())
    }
}

impl From<String> for ZiCModuleId {
    fn from(s: String) -> Self {
        ZiCModuleId(s)
    }
}

#[derive(Clone, Debug)]
pub struct ZiCModuleNode {
    pub id: ZiCModuleId,
    /// The module whose code this one uses, if any. Always also listed in
    /// `dependencies`.
    pub provider: Option<ZiCModuleId>,
    pub dependencies: Vec<ZiCModuleId>,
}

impl ZiCModuleNode {
    #[allow(non_snake_case)]
    pub fn ZiFNew(id: impl Into<ZiCModuleId>) -> Self {
        Self {
            id: id.into(),
            provider: None,
            dependencies: Vec::new(),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFAddDependency(&mut self, dep: impl Into<ZiCModuleId>) {
        let dep = dep.into();
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithProvider(mut self, provider: impl Into<ZiCModuleId>) -> Self {
        let provider = provider.into();
        self.ZiFAddDependency(provider.clone());
        self.provider = Some(provider);
        self
    }

    #[allow(non_snake_case)]
    pub fn ZiFWithDependency(mut self, dep: impl Into<ZiCModuleId>) -> Self {
        self.ZiFAddDependency(dep);
        self
    }
}

/// Dependency graph over deployed modules.
///
/// Edges pointing at modules that are not in the graph are kept on the node
/// but ignored when ordering, so a dangling dependency never blocks the
/// deployment of unrelated modules.
#[derive(Clone, Debug, Default)]
pub struct ZiCModuleGraph {
    nodes: BTreeMap<ZiCModuleId, ZiCModuleNode>,
}

impl ZiCModuleGraph {
    #[allow(non_snake_case)]
    pub fn ZiFNew() -> Self {
        Self::default()
    }

    #[allow(non_snake_case)]
    pub fn ZiFAddModule(&mut self, node: ZiCModuleNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(ZiError::validation(format!(
                "module '{}' already exists",
                node.id
            )));
        }
        if node.dependencies.contains(&node.id) {
            return Err(ZiError::validation(format!(
                "module '{}' cannot depend on itself",
                node.id
            )));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    #[allow(non_snake_case)]
    pub fn ZiFRemove(&mut self, module: &str) -> Option<ZiCModuleNode> {
        self.nodes.remove(&ZiCModuleId::from(module))
    }

    #[allow(non_snake_case)]
    pub fn ZiFContains(&self, module: &str) -> bool {
        self.nodes.contains_key(&ZiCModuleId::from(module))
    }

    #[allow(non_snake_case)]
    pub fn ZiFLen(&self) -> usize {
        self.nodes.len()
    }

    #[allow(non_snake_case)]
    pub fn ZiFIsEmpty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[allow(non_snake_case)]
    pub fn ZiFModules(&self) -> Vec<String> {
        self.nodes.keys().map(|id| id.0.clone()).collect()
    }

    /// The declared provider of `module`, whether or not it is in the graph.
    #[allow(non_snake_case)]
    pub fn ZiFProviderOf(&self, module: &str) -> Option<String> {
        self.nodes
            .get(&ZiCModuleId::from(module))
            .and_then(|n| n.provider.as_ref())
            .map(|p| p.0.clone())
    }

    #[allow(non_snake_case)]
    pub fn ZiFDependencies(&self, module: &str) -> Vec<String> {
        self.nodes
            .get(&ZiCModuleId::from(module))
            .map(|n| n.dependencies.iter().map(|d| d.0.clone()).collect())
            .unwrap_or_default()
    }

    /// Modules that directly depend on `module`.
    #[allow(non_snake_case)]
    pub fn ZiFDependents(&self, module: &str) -> Vec<String> {
        let id = ZiCModuleId::from(module);
        self.nodes
            .values()
            .filter(|n| n.dependencies.contains(&id))
            .map(|n| n.id.0.clone())
            .collect()
    }

    /// Dependencies declared by some module that are absent from the graph,
    /// as `(module, missing dependency)` pairs.
    #[allow(non_snake_case)]
    pub fn ZiFDanglingDependencies(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    dangling.push((node.id.0.clone(), dep.0.clone()));
                }
            }
        }
        dangling
    }

    /// Orders modules so every module comes after all of its dependencies.
    ///
    /// Ties are broken by module name, so the same graph always yields the
    /// same order. Fails with `CyclicDependency` naming the members of one
    /// cycle when no order exists.
    #[allow(non_snake_case)]
    pub fn ZiFDeploymentOrder(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<&ZiCModuleId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&ZiCModuleId, Vec<&ZiCModuleId>> = BTreeMap::new();

        for node in self.nodes.values() {
            let known: HashSet<&ZiCModuleId> = node
                .dependencies
                .iter()
                .filter(|dep| self.nodes.contains_key(*dep))
                .collect();
            in_degree.insert(&node.id, known.len());
            for dep in known {
                dependents.entry(dep).or_default().push(&node.id);
            }
        }

        let mut ready: BTreeSet<&ZiCModuleId> = in_degree
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut sorted: Vec<String> = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.iter().next().copied() {
            ready.remove(next);
            sorted.push(next.0.clone());

            if let Some(targets) = dependents.get(next) {
                for target in targets {
                    if let Some(degree) = in_degree.get_mut(target) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(*target);
                        }
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            let placed: HashSet<&str> = sorted.iter().map(String::as_str).collect();
            let cycle = self.ZiFFindCycle(&placed);
            return Err(ZiError::CyclicDependency { cycle });
        }

        Ok(sorted)
    }

    #[allow(non_snake_case)]
    pub fn ZiFDetectCycles(&self) -> bool {
        self.ZiFDeploymentOrder().is_err()
    }

    /// Every module left unplaced by the topological pass still has at least
    /// one unplaced dependency, so walking dependencies from any of them must
    /// eventually revisit a module.
    fn ZiFFindCycle(&self, placed: &HashSet<&str>) -> Vec<String> {
        let start = match self.nodes.keys().find(|id| !placed.contains(id.0.as_str())) {
            Some(id) => id,
            None => return Vec::new(),
        };

        let mut path: Vec<&ZiCModuleId> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|id| *id == current) {
                return path[pos..].iter().map(|id| id.0.clone()).collect();
            }
            path.push(current);

            let next = self.nodes.get(current).and_then(|node| {
                node.dependencies
                    .iter()
                    .filter(|dep| self.nodes.contains_key(*dep) && !placed.contains(dep.0.as_str()))
                    .min()
            });
            match next {
                Some(dep) => current = dep,
                None => return path.iter().map(|id| id.0.clone()).collect(),
            }
        }
    }
}
