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

//! Memoizing context cache shared by the module, discovery and resource
//! caches.
//!
//! Lookups take only the read side of the entry map. Constructions are
//! serialized by one coarse lock per cache and re-check the map after taking
//! it, so each key is constructed at most once. A construction closure must
//! never call back into the same cache; callers obtain whatever the new
//! context depends on before asking for it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Mutex, RwLock};

use crate::errors::{Result, ZiError};
use crate::loader::context::{ZiCContextId, ZiCLoadingContext};

pub(crate) struct ZiCContextCache<K> {
    name: &'static str,
    entries: RwLock<HashMap<K, ZiCLoadingContext>>,
    /// Held for the duration of a construction; true once the cache is closed.
    construction: Mutex<bool>,
}

impl<K> ZiCContextCache<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn ZiFNew(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            construction: Mutex::new(false),
        }
    }

    pub(crate) fn ZiFGet(&self, key: &K) -> Result<Option<ZiCLoadingContext>> {
        let entries = self.entries.read().map_err(|_| ZiError::poisoned(self.name))?;
        Ok(entries.get(key).cloned())
    }

    /// Returns the cached context for `key`, running `build` to create it on
    /// a miss.
    pub(crate) fn ZiFGetOrConstruct<F>(&self, key: &K, build: F) -> Result<ZiCLoadingContext>
    where
        F: FnOnce() -> Result<ZiCLoadingContext>,
    {
        if let Some(found) = self.ZiFGet(key)? {
            return Ok(found);
        }

        let closed = self
            .construction
            .lock()
            .map_err(|_| ZiError::poisoned(self.name))?;
        if *closed {
            return Err(ZiError::invalid_state(
                format!("construct {} context", self.name),
                "terminated",
            ));
        }
        if let Some(found) = self.ZiFGet(key)? {
            return Ok(found);
        }

        let context = build()?;
        self.entries
            .write()
            .map_err(|_| ZiError::poisoned(self.name))?
            .insert(key.clone(), context.clone());
        drop(closed);
        Ok(context)
    }

    /// Waits for any in-flight construction, refuses further ones, and hands
    /// back every cached context.
    pub(crate) fn ZiFClose(&self) -> Result<Vec<ZiCLoadingContext>> {
        let mut closed = self
            .construction
            .lock()
            .map_err(|_| ZiError::poisoned(self.name))?;
        *closed = true;
        let mut entries = self.entries.write().map_err(|_| ZiError::poisoned(self.name))?;
        Ok(entries.drain().map(|(_, ctx)| ctx).collect())
    }

    pub(crate) fn ZiFLen(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| ZiError::poisoned(self.name))?
            .len())
    }

    /// Number of distinct contexts, since several keys may share one.
    pub(crate) fn ZiFUniqueLen(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|_| ZiError::poisoned(self.name))?;
        let unique: HashSet<ZiCContextId> = entries.values().map(|c| c.ZiFId()).collect();
        Ok(unique.len())
    }

    pub(crate) fn ZiFSnapshot(&self) -> Result<HashMap<K, ZiCLoadingContext>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| ZiError::poisoned(self.name))?
            .clone())
    }
}
