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

//! # Loading Contexts
//!
//! A loading context is a visibility scope: the set of symbols code running
//! "inside" it can reach. Contexts form a tree. Each context sees its parent's
//! symbols first and then its own code sources, in order. Only the root
//! context has no parent; it decides which host symbols leak into the tree.
//!
//! Contexts are cheap handles (`Arc` inside). Identity is the context id,
//! never the content: two contexts built from the same archive are different
//! contexts.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use zip::ZipArchive;

use crate::errors::{Result, ZiError};
use crate::loader::root::ZiCRootVisibility;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a loading context.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ZiCContextId(pub u64);

impl ZiCContextId {
    fn ZiFNext() -> Self {
        ZiCContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ZiCContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Which cache (if any) a context was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiCContextKind {
    Root,
    Module,
    Discovery,
    Resource,
}

impl ZiCContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZiCContextKind::Root => "root",
            ZiCContextKind::Module => "module",
            ZiCContextKind::Discovery => "discovery",
            ZiCContextKind::Resource => "resource",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiCCodeSourceKind {
    /// A zip-format archive; its file entries are the symbols.
    Archive,
    /// A directory tree; its files are the symbols.
    Directory,
}

/// One location code can be loaded from, with the symbols it provides.
///
/// A symbol is the path of a file relative to the source, with the file
/// extension dropped and `/` replaced by `.`: `acme/web/Server.bin` provides
/// `acme.web.Server`.
#[derive(Clone, Debug)]
pub struct ZiCCodeSource {
    path: PathBuf,
    kind: ZiCCodeSourceKind,
    symbols: Arc<HashSet<String>>,
}

impl ZiCCodeSource {
    /// Indexes an archive, ignoring entries whose name starts with any of
    /// `excluded_prefixes` or equals one of them.
    #[allow(non_snake_case)]
    pub fn ZiFFromArchive(path: &Path, excluded_prefixes: &[&str]) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut symbols = HashSet::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name();
            if excluded_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && name.starts_with(prefix))
            {
                continue;
            }
            if let Some(symbol) = ZiFSymbolForEntry(name) {
                symbols.insert(symbol);
            }
        }
        Ok(ZiCCodeSource {
            path: path.to_path_buf(),
            kind: ZiCCodeSourceKind::Archive,
            symbols: Arc::new(symbols),
        })
    }

    #[allow(non_snake_case)]
    pub fn ZiFFromDirectory(path: &Path) -> Result<Self> {
        let mut symbols = HashSet::new();
        ZiFIndexDirectory(path, path, &mut symbols)?;
        Ok(ZiCCodeSource {
            path: path.to_path_buf(),
            kind: ZiCCodeSourceKind::Directory,
            symbols: Arc::new(symbols),
        })
    }

    /// Directories are indexed as directories, anything else as an archive.
    #[allow(non_snake_case)]
    pub fn ZiFFromPath(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::ZiFFromDirectory(path)
        } else {
            Self::ZiFFromArchive(path, &[])
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFPath(&self) -> &Path {
        &self.path
    }

    #[allow(non_snake_case)]
    pub fn ZiFKind(&self) -> ZiCCodeSourceKind {
        self.kind
    }

    #[allow(non_snake_case)]
    pub fn ZiFProvides(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    #[allow(non_snake_case)]
    pub fn ZiFSymbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.iter().cloned().collect();
        symbols.sort();
        symbols
    }
}

/// Maps an archive entry or relative file path to the symbol it provides.
#[allow(non_snake_case)]
pub fn ZiFSymbolForEntry(entry: &str) -> Option<String> {
    let entry = entry.trim_start_matches('/');
    if entry.is_empty() || entry.ends_with('/') {
        return None;
    }
    let (dir, file) = match entry.rfind('/') {
        Some(pos) => (&entry[..=pos], &entry[pos + 1..]),
        None => ("", entry),
    };
    let stem = match file.rfind('.') {
        Some(0) | None => file,
        Some(pos) => &file[..pos],
    };
    Some(format!("{}{}", dir, stem).replace('/', "."))
}

fn ZiFIndexDirectory(base: &Path, dir: &Path, symbols: &mut HashSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            ZiFIndexDirectory(base, &path, symbols)?;
            continue;
        }
        let relative = path
            .strip_prefix(base)
            .map_err(|e| ZiError::internal(e.to_string()))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if let Some(symbol) = ZiFSymbolForEntry(&relative) {
            symbols.insert(symbol);
        }
    }
    Ok(())
}

/// Private directory holding files extracted for one context.
///
/// The directory is removed by [`ZiCWorkingArea::ZiFPurge`], or when the value
/// is dropped if nobody purged it.
#[derive(Debug)]
pub struct ZiCWorkingArea {
    dir: TempDir,
}

impl ZiCWorkingArea {
    /// Creates a uniquely named directory under `parent`, creating `parent`
    /// first if needed.
    #[allow(non_snake_case)]
    pub fn ZiFCreate(parent: &Path, prefix: &str) -> Result<Self> {
        fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", prefix))
            .tempdir_in(parent)?;
        Ok(ZiCWorkingArea { dir })
    }

    #[allow(non_snake_case)]
    pub fn ZiFPath(&self) -> &Path {
        self.dir.path()
    }

    #[allow(non_snake_case)]
    pub fn ZiFPurge(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

/// Where a resolved symbol came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZiCSymbolOrigin {
    /// Supplied by the host process through the root context.
    Host,
    /// Supplied by a code source at this path.
    Source(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiCResolvedSymbol {
    pub name: String,
    pub origin: ZiCSymbolOrigin,
    /// The context whose own sources (or host view) supplied the symbol.
    pub context: ZiCContextId,
}

struct ZiCContextInner {
    id: ZiCContextId,
    kind: ZiCContextKind,
    label: String,
    parent: Option<ZiCLoadingContext>,
    sources: Vec<ZiCCodeSource>,
    working_area: Mutex<Option<ZiCWorkingArea>>,
    working_area_path: Option<PathBuf>,
    root: Option<ZiCRootVisibility>,
}

/// Reference-counted handle to a loading context.
///
/// Cloning shares the context. Equality and hashing use the context id.
#[derive(Clone)]
pub struct ZiCLoadingContext {
    inner: Arc<ZiCContextInner>,
}

impl ZiCLoadingContext {
    /// Builds the one parentless context of an engine.
    pub(crate) fn ZiFNewRoot(visibility: ZiCRootVisibility) -> Self {
        ZiCLoadingContext {
            inner: Arc::new(ZiCContextInner {
                id: ZiCContextId::ZiFNext(),
                kind: ZiCContextKind::Root,
                label: "root".to_string(),
                parent: None,
                sources: Vec::new(),
                working_area: Mutex::new(None),
                working_area_path: None,
                root: Some(visibility),
            }),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFNew(
        kind: ZiCContextKind,
        label: impl Into<String>,
        parent: ZiCLoadingContext,
        sources: Vec<ZiCCodeSource>,
        working_area: Option<ZiCWorkingArea>,
    ) -> Self {
        let working_area_path = working_area.as_ref().map(|w| w.ZiFPath().to_path_buf());
        ZiCLoadingContext {
            inner: Arc::new(ZiCContextInner {
                id: ZiCContextId::ZiFNext(),
                kind,
                label: label.into(),
                parent: Some(parent),
                sources,
                working_area: Mutex::new(working_area),
                working_area_path,
                root: None,
            }),
        }
    }

    #[allow(non_snake_case)]
    pub fn ZiFId(&self) -> ZiCContextId {
        self.inner.id
    }

    #[allow(non_snake_case)]
    pub fn ZiFKind(&self) -> ZiCContextKind {
        self.inner.kind
    }

    #[allow(non_snake_case)]
    pub fn ZiFLabel(&self) -> &str {
        &self.inner.label
    }

    #[allow(non_snake_case)]
    pub fn ZiFParent(&self) -> Option<&ZiCLoadingContext> {
        self.inner.parent.as_ref()
    }

    #[allow(non_snake_case)]
    pub fn ZiFIsRoot(&self) -> bool {
        self.inner.parent.is_none()
    }

    #[allow(non_snake_case)]
    pub fn ZiFSources(&self) -> &[ZiCCodeSource] {
        &self.inner.sources
    }

    #[allow(non_snake_case)]
    pub fn ZiFSourcePaths(&self) -> Vec<PathBuf> {
        self.inner
            .sources
            .iter()
            .map(|s| s.ZiFPath().to_path_buf())
            .collect()
    }

    /// Path of the working area this context was created with, even after it
    /// has been purged.
    #[allow(non_snake_case)]
    pub fn ZiFWorkingAreaPath(&self) -> Option<&Path> {
        self.inner.working_area_path.as_deref()
    }

    /// Number of ancestors between this context and the root.
    #[allow(non_snake_case)]
    pub fn ZiFDepth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.ZiFParent();
        while let Some(ctx) = current {
            depth += 1;
            current = ctx.ZiFParent();
        }
        depth
    }

    /// Returns true when `other` is this context or one of its ancestors.
    #[allow(non_snake_case)]
    pub fn ZiFDescendsFrom(&self, other: &ZiCLoadingContext) -> bool {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if ctx == other {
                return true;
            }
            current = ctx.ZiFParent();
        }
        false
    }

    /// Resolves a fully-qualified symbol name.
    ///
    /// The parent chain is asked first. The root context consults the host
    /// for names that match no hide pattern. Hidden names fall through to the
    /// context's own sources only, which the root does not have.
    #[allow(non_snake_case)]
    pub fn ZiFResolve(&self, name: &str) -> Option<ZiCResolvedSymbol> {
        if let Some(parent) = &self.inner.parent {
            if let Some(found) = parent.ZiFResolve(name) {
                return Some(found);
            }
        } else if let Some(root) = &self.inner.root {
            if root.ZiFHostProvides(name) {
                return Some(ZiCResolvedSymbol {
                    name: name.to_string(),
                    origin: ZiCSymbolOrigin::Host,
                    context: self.inner.id,
                });
            }
        }

        self.inner
            .sources
            .iter()
            .find(|source| source.ZiFProvides(name))
            .map(|source| ZiCResolvedSymbol {
                name: name.to_string(),
                origin: ZiCSymbolOrigin::Source(source.ZiFPath().to_path_buf()),
                context: self.inner.id,
            })
    }

    #[allow(non_snake_case)]
    pub fn ZiFCanSee(&self, name: &str) -> bool {
        self.ZiFResolve(name).is_some()
    }

    /// Deletes the working area, if any. Safe to call more than once.
    ///
    /// Returns true when this call removed a directory.
    #[allow(non_snake_case)]
    pub fn ZiFDestroy(&self) -> Result<bool> {
        let area = self
            .inner
            .working_area
            .lock()
            .map_err(|_| ZiError::poisoned("working area"))?
            .take();
        match area {
            Some(area) => {
                let path = area.ZiFPath().to_path_buf();
                area.ZiFPurge().map_err(|e| {
                    ZiError::archive_io(path.display().to_string(), e.to_string())
                })?;
                log::debug!("loader.context.purged: working area purged - context={}, path={}", self, path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl PartialEq for ZiCLoadingContext {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ZiCLoadingContext {}

impl std::hash::Hash for ZiCLoadingContext {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for ZiCLoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{} {}]",
            self.inner.kind.as_str(),
            self.inner.id,
            self.inner.label
        )
    }
}

impl fmt::Debug for ZiCLoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiCLoadingContext")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.ZiFId()))
            .field("sources", &self.ZiFSourcePaths())
            .field("working_area", &self.inner.working_area_path)
            .finish()
    }
}
