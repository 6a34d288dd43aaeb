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

//! # Archive Materializer
//!
//! Turns a module archive into the ordered code sources of a context:
//!
//! 1. the archive itself, minus its descriptor and embedded libraries;
//! 2. a `files/` directory in the working area holding every plain file
//!    embedded under the library path (only if there is at least one);
//! 3. each nested archive embedded under the library path, extracted to the
//!    working area, in archive order.
//!
//! A working area is only allocated when the archive embeds something.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::config::ZiCEngineConfig;
use crate::errors::{Result, ZiError};
use crate::loader::context::{ZiCCodeSource, ZiCWorkingArea};

const ZI_FILES_DIR: &str = "files";

/// Code sources and working area produced for one context.
#[derive(Debug)]
pub struct ZiCMaterializedArchive {
    pub sources: Vec<ZiCCodeSource>,
    pub working_area: Option<ZiCWorkingArea>,
    /// Embedded entries that could not be written and were left out.
    pub skipped: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ZiCArchiveMaterializer {
    embedded_path: String,
    descriptor_entry: String,
    archive_extensions: Vec<String>,
}

impl ZiCArchiveMaterializer {
    #[allow(non_snake_case)]
    pub fn ZiFNew(config: &ZiCEngineConfig) -> Self {
        let mut embedded_path = config.embedded_library_path.trim_start_matches('/').to_string();
        if !embedded_path.is_empty() && !embedded_path.ends_with('/') {
            embedded_path.push('/');
        }
        Self {
            embedded_path,
            descriptor_entry: config.descriptor_entry.clone(),
            archive_extensions: config.archive_extensions.clone(),
        }
    }

    /// Materializes `archive` with a working area under `working_area_parent`.
    ///
    /// Any failure other than an unwritable single file aborts the whole
    /// operation; whatever was already extracted is removed with the
    /// working area before the error is returned.
    #[allow(non_snake_case)]
    pub fn ZiFMaterialize(
        &self,
        archive: &Path,
        working_area_parent: &Path,
    ) -> Result<ZiCMaterializedArchive> {
        self.ZiFMaterializeInner(archive, working_area_parent)
            .map_err(|e| match e {
                ZiError::ArchiveIo { .. } => e,
                other => ZiError::archive_io(archive.display().to_string(), other.to_string()),
            })
    }

    fn ZiFMaterializeInner(
        &self,
        archive_path: &Path,
        working_area_parent: &Path,
    ) -> Result<ZiCMaterializedArchive> {
        let own = ZiCCodeSource::ZiFFromArchive(
            archive_path,
            &[self.embedded_path.as_str(), self.descriptor_entry.as_str()],
        )?;

        let mut archive = ZipArchive::new(File::open(archive_path)?)?;
        let embedded: Vec<usize> = (0..archive.len())
            .filter(|&i| {
                archive
                    .by_index(i)
                    .map(|e| {
                        !e.is_dir()
                            && !self.embedded_path.is_empty()
                            && e.name().starts_with(&self.embedded_path)
                    })
                    .unwrap_or(false)
            })
            .collect();

        let mut sources = vec![own];
        if embedded.is_empty() {
            return Ok(ZiCMaterializedArchive {
                sources,
                working_area: None,
                skipped: Vec::new(),
            });
        }

        let stem = archive_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");
        let area = ZiCWorkingArea::ZiFCreate(working_area_parent, stem)?;
        let files_dir = area.ZiFPath().join(ZI_FILES_DIR);

        let mut nested: Vec<PathBuf> = Vec::new();
        let mut has_files = false;
        let mut skipped: Vec<String> = Vec::new();

        for index in embedded {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_string();
            let relative = match ZiFSafeRelative(&name[self.embedded_path.len()..]) {
                Some(rel) => rel,
                None => {
                    log::warn!(
                        "loader.archive.skipped: unsafe embedded entry path - archive={}, entry={}",
                        archive_path.display(),
                        name
                    );
                    skipped.push(name);
                    continue;
                }
            };

            let is_nested = relative.components().count() == 1 && self.ZiFIsArchiveName(&relative);
            let target = if is_nested {
                area.ZiFPath().join(&relative)
            } else {
                files_dir.join(&relative)
            };
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out = match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(file) => file,
                Err(err) if ZiFIsLockedTarget(&err) => {
                    log::warn!(
                        "loader.archive.skipped: cannot write embedded entry - archive={}, entry={}, target={}, error={}",
                        archive_path.display(),
                        name,
                        target.display(),
                        err
                    );
                    skipped.push(name);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            io::copy(&mut entry, &mut out)?;

            if is_nested {
                nested.push(target);
            } else {
                has_files = true;
            }
        }

        if has_files {
            sources.push(ZiCCodeSource::ZiFFromDirectory(&files_dir)?);
        }
        for path in &nested {
            sources.push(ZiCCodeSource::ZiFFromArchive(path, &[])?);
        }

        log::debug!(
            "loader.archive.materialized: archive materialized - archive={}, working_area={}, sources={}, skipped={}",
            archive_path.display(),
            area.ZiFPath().display(),
            sources.len(),
            skipped.len()
        );

        Ok(ZiCMaterializedArchive {
            sources,
            working_area: Some(area),
            skipped,
        })
    }

    fn ZiFIsArchiveName(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.archive_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// A relative path with no root, prefix or parent components.
fn ZiFSafeRelative(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// A target that already exists, or that another process holds open, is
/// skipped rather than failing the whole archive.
fn ZiFIsLockedTarget(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::AlreadyExists | ErrorKind::PermissionDenied)
}
