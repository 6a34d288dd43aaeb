//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd project team.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use zip::write::FileOptions;
use zip::ZipWriter;

use zimod::ZiCEngineConfig;

/// Zip bytes holding `entries` in order.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(path).unwrap();
    file.write_all(&zip_bytes(entries)).unwrap();
    path.to_path_buf()
}

/// Writes `<dir>/<name>.zip` with a `module.json` descriptor followed by
/// `entries`.
pub fn module_archive(
    dir: &Path,
    name: &str,
    provider: Option<&str>,
    entries: &[(&str, &[u8])],
) -> PathBuf {
    versioned_module_archive(dir, name, name, "1.0.0", provider, entries)
}

/// Like [`module_archive`], written to `<dir>/<file_stem>.zip` with an
/// explicit version.
pub fn versioned_module_archive(
    dir: &Path,
    file_stem: &str,
    name: &str,
    version: &str,
    provider: Option<&str>,
    entries: &[(&str, &[u8])],
) -> PathBuf {
    let depends: Vec<serde_json::Value> = provider
        .map(|p| vec![json!({"module": p, "use_code": true})])
        .unwrap_or_default();
    let descriptor = json!({
        "name": name,
        "version": version,
        "description": format!("{} test module", name),
        "depends": depends,
    })
    .to_string();

    let mut all: Vec<(&str, &[u8])> = vec![("module.json", descriptor.as_bytes())];
    all.extend_from_slice(entries);
    write_zip(&dir.join(format!("{}.zip", file_stem)), &all)
}

/// Engine configuration whose working areas live under `work`.
pub fn config(work: &Path) -> ZiCEngineConfig {
    ZiCEngineConfig::ZiFNew().ZiFWithWorkingAreaRoot(work)
}

/// Subdirectories currently present under `work`.
pub fn working_areas(work: &Path) -> Vec<PathBuf> {
    match fs::read_dir(work) {
        Ok(entries) => {
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            dirs.sort();
            dirs
        }
        Err(_) => Vec::new(),
    }
}
