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

//! Root context: the top of every context tree, filtering what the host
//! process exposes to modules.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::RegexSet;

use crate::errors::Result;
use crate::loader::context::ZiCLoadingContext;

/// Symbols the host process can supply to modules.
pub trait ZiCHostSymbols: Send + Sync + fmt::Debug {
    fn provides(&self, name: &str) -> bool;
}

/// Host symbol table backed by a fixed set of names.
#[derive(Clone, Debug, Default)]
pub struct ZiCStaticHostSymbols {
    names: HashSet<String>,
}

impl ZiCStaticHostSymbols {
    #[allow(non_snake_case)]
    pub fn ZiFNew<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFInsert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }
}

impl ZiCHostSymbols for ZiCStaticHostSymbols {
    fn provides(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Hide rules plus host view held by the root context.
pub struct ZiCRootVisibility {
    hidden: RegexSet,
    host: Arc<dyn ZiCHostSymbols>,
}

impl ZiCRootVisibility {
    /// Compiles `patterns` so that each must match a whole symbol name.
    #[allow(non_snake_case)]
    pub fn ZiFNew<S: AsRef<str>>(patterns: &[S], host: Arc<dyn ZiCHostSymbols>) -> Result<Self> {
        let anchored: Vec<String> = patterns
            .iter()
            .map(|p| format!("^(?:{})$", p.as_ref()))
            .collect();
        let hidden = RegexSet::new(&anchored)?;
        Ok(Self { hidden, host })
    }

    /// No hide patterns and an empty host.
    #[allow(non_snake_case)]
    pub fn ZiFOpen() -> Self {
        Self {
            hidden: RegexSet::empty(),
            host: Arc::new(ZiCStaticHostSymbols::default()),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFIsHidden(&self, name: &str) -> bool {
        self.hidden.is_match(name)
    }

    /// True only for names that are not hidden and that the host has.
    #[allow(non_snake_case)]
    pub fn ZiFHostProvides(&self, name: &str) -> bool {
        !self.ZiFIsHidden(name) && self.host.provides(name)
    }
}

/// Builds the root context for an engine.
#[allow(non_snake_case)]
pub fn ZiFNewRootContext<S: AsRef<str>>(
    hide_patterns: &[S],
    host: Arc<dyn ZiCHostSymbols>,
) -> Result<ZiCLoadingContext> {
    let visibility = ZiCRootVisibility::ZiFNew(hide_patterns, host)?;
    log::debug!(
        "loader.root.created: root context created - hide_patterns={}",
        hide_patterns.len()
    );
    Ok(ZiCLoadingContext::ZiFNewRoot(visibility))
}
