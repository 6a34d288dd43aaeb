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

//! # Canonical Resource Identity
//!
//! Content-based key of a resource's position in the resource tree: its own
//! `(key, type, module)` triple followed by the same triple for every
//! ancestor, nearest first. Two resources built independently but sitting at
//! the same position compare equal. The identity is only ever a cache key.
//!
//! Strings are interned so equal components share one allocation, and the
//! whole chain is hashed once with xxh3 at construction time.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use xxhash_rust::xxh3::Xxh3;

use crate::errors::{Result, ZiError};
use crate::loader::resource::ZiCResource;

/// Byte that never occurs in UTF-8, used to delimit hashed fields.
const ZI_FIELD_SEPARATOR: u8 = 0xFF;

/// Deduplicating store of identity strings.
#[derive(Debug, Default)]
pub struct ZiCStringInterner {
    strings: Mutex<HashSet<Arc<str>>>,
}

impl ZiCStringInterner {
    #[allow(non_snake_case)]
    pub fn ZiFNew() -> Self {
        Self::default()
    }

    #[allow(non_snake_case)]
    pub fn ZiFIntern(&self, value: &str) -> Result<Arc<str>> {
        let mut strings = self
            .strings
            .lock()
            .map_err(|_| ZiError::poisoned("interner"))?;
        if let Some(existing) = strings.get(value) {
            return Ok(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(value);
        strings.insert(Arc::clone(&interned));
        Ok(interned)
    }

    #[allow(non_snake_case)]
    pub fn ZiFLen(&self) -> usize {
        self.strings.lock().map(|s| s.len()).unwrap_or(0)
    }

    #[allow(non_snake_case)]
    pub fn ZiFClear(&self) {
        if let Ok(mut strings) = self.strings.lock() {
            strings.clear();
        }
    }
}

/// One `(key, type, module)` triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiCResourceTriple {
    pub key: Arc<str>,
    pub type_name: Arc<str>,
    pub module: Arc<str>,
}

impl ZiCResourceTriple {
    fn ZiFFrom<F>(resource: &ZiCResource, intern: &F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Arc<str>>,
    {
        Ok(Self {
            key: intern(&resource.key)?,
            type_name: intern(&resource.resource_type.name)?,
            module: intern(&resource.resource_type.module)?,
        })
    }

    fn ZiFInterned(&self, interner: &ZiCStringInterner) -> Result<Self> {
        Ok(Self {
            key: interner.ZiFIntern(&self.key)?,
            type_name: interner.ZiFIntern(&self.type_name)?,
            module: interner.ZiFIntern(&self.module)?,
        })
    }

    fn ZiFSameAs(&self, other: &Self) -> bool {
        ZiFSameStr(&self.key, &other.key)
            && ZiFSameStr(&self.type_name, &other.type_name)
            && ZiFSameStr(&self.module, &other.module)
    }

    fn ZiFFeed(&self, hasher: &mut Xxh3) {
        for field in [&self.key, &self.type_name, &self.module] {
            hasher.update(field.as_bytes());
            hasher.update(&[ZI_FIELD_SEPARATOR]);
        }
    }
}

fn ZiFSameStr(a: &Arc<str>, b: &Arc<str>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

/// Position of a resource in the resource tree.
#[derive(Clone)]
pub struct ZiCCanonicalResourceIdentity {
    own: ZiCResourceTriple,
    ancestors: Vec<ZiCResourceTriple>,
    digest: u64,
}

impl ZiCCanonicalResourceIdentity {
    #[allow(non_snake_case)]
    pub fn ZiFFromResource(resource: &ZiCResource, interner: &ZiCStringInterner) -> Result<Self> {
        Self::ZiFFromResourceWithParent(resource, resource.parent.as_deref(), interner)
    }

    /// Like [`Self::ZiFFromResource`], but the ancestor chain starts at
    /// `parent` instead of the resource's own parent link.
    #[allow(non_snake_case)]
    pub fn ZiFFromResourceWithParent(
        resource: &ZiCResource,
        parent: Option<&ZiCResource>,
        interner: &ZiCStringInterner,
    ) -> Result<Self> {
        Self::ZiFBuild(resource, parent, &|value: &str| interner.ZiFIntern(value))
    }

    /// Builds an identity whose strings are private copies, touching no
    /// interner. Equal to the interned identity of the same position.
    #[allow(non_snake_case)]
    pub fn ZiFUninterned(resource: &ZiCResource, parent: Option<&ZiCResource>) -> Result<Self> {
        Self::ZiFBuild(resource, parent, &|value: &str| Ok(Arc::from(value)))
    }

    /// The same identity with every string moved into `interner`.
    #[allow(non_snake_case)]
    pub fn ZiFInterned(&self, interner: &ZiCStringInterner) -> Result<Self> {
        Ok(Self {
            own: self.own.ZiFInterned(interner)?,
            ancestors: self
                .ancestors
                .iter()
                .map(|a| a.ZiFInterned(interner))
                .collect::<Result<Vec<_>>>()?,
            digest: self.digest,
        })
    }

    fn ZiFBuild<F>(resource: &ZiCResource, parent: Option<&ZiCResource>, intern: &F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Arc<str>>,
    {
        let own = ZiCResourceTriple::ZiFFrom(resource, intern)?;
        let mut ancestors = Vec::new();
        let mut current = parent;
        while let Some(ancestor) = current {
            ancestors.push(ZiCResourceTriple::ZiFFrom(ancestor, intern)?);
            current = ancestor.parent.as_deref();
        }

        let mut hasher = Xxh3::new();
        own.ZiFFeed(&mut hasher);
        for ancestor in &ancestors {
            hasher.update(&[ZI_FIELD_SEPARATOR]);
            ancestor.ZiFFeed(&mut hasher);
        }

        Ok(Self {
            own,
            ancestors,
            digest: hasher.digest(),
        })
    }

    #[allow(non_snake_case)]
    pub fn ZiFOwn(&self) -> &ZiCResourceTriple {
        &self.own
    }

    /// Ancestor triples, parent first.
    #[allow(non_snake_case)]
    pub fn ZiFAncestors(&self) -> &[ZiCResourceTriple] {
        &self.ancestors
    }

    #[allow(non_snake_case)]
    pub fn ZiFDigest(&self) -> u64 {
        self.digest
    }
}

impl PartialEq for ZiCCanonicalResourceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
            && self.ancestors.len() == other.ancestors.len()
            && self.own.ZiFSameAs(&other.own)
            && self
                .ancestors
                .iter()
                .zip(&other.ancestors)
                .all(|(a, b)| a.ZiFSameAs(b))
    }
}

impl Eq for ZiCCanonicalResourceIdentity {}

impl Hash for ZiCCanonicalResourceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.digest);
    }
}

impl fmt::Display for ZiCCanonicalResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.own.module, self.own.type_name, self.own.key
        )?;
        for ancestor in &self.ancestors {
            write!(f, " < {}:{}:{}", ancestor.module, ancestor.type_name, ancestor.key)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ZiCCanonicalResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZiCCanonicalResourceIdentity({} #{:016x})", self, self.digest)
    }
}
