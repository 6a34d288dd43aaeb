//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd project team.

mod common;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zimod::loader::descriptor::ZiFParseDescriptor;
use zimod::loader::*;
use zimod::{ZiCEngineConfig, ZiError};

use common::{config, module_archive, working_areas, zip_bytes};

fn registry(archives: &[PathBuf]) -> ZiCModuleRegistry {
    ZiCModuleRegistry::ZiFFromDescriptors(
        archives
            .iter()
            .map(|a| ZiFParseDescriptor(a, "module.json").unwrap()),
    )
}

fn manager(config: ZiCEngineConfig, archives: &[PathBuf]) -> ZiCContextManager {
    let host = ZiCStaticHostSymbols::ZiFNew(["std.Vec", "zimod.loader.Secret"]);
    ZiCContextManager::ZiFNew(config, Arc::new(host), registry(archives)).unwrap()
}

/// core <- web, core <- storage, each carrying an embedded library.
fn three_modules(dir: &Path) -> Vec<PathBuf> {
    let util = zip_bytes(&[("acme/util/Strings.bin", b"u")]);
    vec![
        module_archive(dir, "core", None, &[("acme/core/Kernel.bin", b"k"), ("lib/util.zip", &util)]),
        module_archive(dir, "web", Some("core"), &[("acme/web/Server.bin", b"s"), ("lib/util.zip", &util)]),
        module_archive(dir, "storage", Some("core"), &[("acme/storage/Disk.bin", b"d")]),
    ]
}

#[test]
fn test_module_context_is_memoized() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let m = manager(config(&work), &three_modules(dir.path()));

    let first = m.ZiFObtainModuleContext("core").unwrap();
    let second = m.ZiFObtainModuleContext("core").unwrap();
    assert_eq!(first.ZiFId(), second.ZiFId());
    assert_eq!(m.ZiFCountModuleContexts(), 1);
    assert_eq!(working_areas(&work).len(), 1);
}

#[test]
fn test_provider_context_is_the_parent() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(config(&dir.path().join("work")), &three_modules(dir.path()));

    let web = m.ZiFObtainModuleContext("web").unwrap();
    let storage = m.ZiFObtainModuleContext("storage").unwrap();
    let core = m.ZiFObtainModuleContext("core").unwrap();

    assert_eq!(web.ZiFParent(), Some(&core));
    assert_eq!(storage.ZiFParent(), Some(&core));
    assert_eq!(core.ZiFParent(), Some(m.ZiFRoot()));
    assert_eq!(web.ZiFKind(), ZiCContextKind::Module);
    assert_eq!(m.ZiFCountModuleContexts(), 3);
}

#[test]
fn test_visibility_follows_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(config(&dir.path().join("work")), &three_modules(dir.path()));
    let web = m.ZiFObtainModuleContext("web").unwrap();
    let core = m.ZiFObtainModuleContext("core").unwrap();

    assert!(web.ZiFCanSee("acme.web.Server"));
    assert!(web.ZiFCanSee("acme.core.Kernel"));
    assert!(!core.ZiFCanSee("acme.web.Server"));
    assert!(!web.ZiFCanSee("acme.storage.Disk"));

    // Parent first: core's copy of the shared library wins.
    let util = web.ZiFResolve("acme.util.Strings").unwrap();
    assert_eq!(util.context, core.ZiFId());

    let kernel = web.ZiFResolve("acme.core.Kernel").unwrap();
    assert_eq!(kernel.origin, ZiCSymbolOrigin::Source(core.ZiFSourcePaths()[0].clone()));
}

#[test]
fn test_hidden_host_symbols_never_reach_modules() {
    let dir = tempfile::tempdir().unwrap();
    let own_secret = module_archive(dir.path(), "bundled", None, &[("zimod/loader/Secret.bin", b"x")]);
    let plain = module_archive(dir.path(), "plain", None, &[("acme/Plain.bin", b"p")]);
    let m = manager(config(&dir.path().join("work")), &[own_secret, plain]);

    let plain = m.ZiFObtainModuleContext("plain").unwrap();
    assert_eq!(plain.ZiFResolve("std.Vec").unwrap().origin, ZiCSymbolOrigin::Host);
    assert!(plain.ZiFResolve("zimod.loader.Secret").is_none());
    assert!(plain.ZiFResolve("nowhere.Missing").is_none());

    let bundled = m.ZiFObtainModuleContext("bundled").unwrap();
    let found = bundled.ZiFResolve("zimod.loader.Secret").unwrap();
    assert_eq!(found.context, bundled.ZiFId());
}

#[test]
fn test_dangling_provider_fails_only_its_module() {
    let dir = tempfile::tempdir().unwrap();
    let a = module_archive(dir.path(), "a", Some("z"), &[]);
    let b = module_archive(dir.path(), "b", None, &[]);
    let m = manager(config(&dir.path().join("work")), &[a, b]);

    let err = m.ZiFObtainModuleContext("a").unwrap_err();
    assert_eq!(
        err,
        ZiError::MissingDependency {
            module: "a".to_string(),
            provider: "z".to_string()
        }
    );
    assert!(m.ZiFObtainModuleContext("b").is_ok());
    assert_eq!(m.ZiFCountModuleContexts(), 1);
}

#[test]
fn test_retired_provider_cascades() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(config(&dir.path().join("work")), &three_modules(dir.path()));

    assert!(m.ZiFRetireModule("core").unwrap().is_some());
    let err = m.ZiFObtainModuleContext("web").unwrap_err();
    assert!(matches!(err, ZiError::MissingDependency { ref provider, .. } if provider == "core"));
}

#[test]
fn test_discovery_context_keys_on_parent_identity() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(config(&dir.path().join("work")), &three_modules(dir.path()));
    let ctx1 = m.ZiFObtainModuleContext("core").unwrap();
    let ctx2 = m.ZiFObtainModuleContext("storage").unwrap();

    let d1 = m.ZiFObtainDiscoveryContext("web", &ctx1).unwrap();
    let d1_again = m.ZiFObtainDiscoveryContext("web", &ctx1).unwrap();
    let d2 = m.ZiFObtainDiscoveryContext("web", &ctx2).unwrap();

    assert_eq!(d1, d1_again);
    assert_ne!(d1, d2);
    assert_eq!(d1.ZiFParent(), Some(&ctx1));
    assert_eq!(d2.ZiFParent(), Some(&ctx2));
    assert_eq!(d1.ZiFKind(), ZiCContextKind::Discovery);
    assert!(d2.ZiFCanSee("acme.storage.Disk"));
    assert!(d2.ZiFCanSee("acme.web.Server"));

    // Discovery never creates or reuses a module context.
    assert_eq!(m.ZiFCountDiscoveryContexts(), 2);
    assert_eq!(m.ZiFCountModuleContexts(), 2);
    assert!(!m.ZiFModuleContexts().unwrap().contains_key("web"));
}

#[test]
fn test_concurrent_first_obtain_builds_once() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let m = Arc::new(manager(config(&work), &three_modules(dir.path())));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                let name = if i % 2 == 0 { "web" } else { "storage" };
                m.ZiFObtainModuleContext(name).unwrap().ZiFParent().unwrap().ZiFId()
            })
        })
        .collect();

    let parents: HashSet<ZiCContextId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(parents.len(), 1);
    assert_eq!(m.ZiFCountModuleContexts(), 3);
    // core and web embed a library; storage does not.
    assert_eq!(working_areas(&work).len(), 2);
}

#[test]
fn test_destroy_purges_and_empties_caches() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let m = manager(config(&work), &three_modules(dir.path()));
    let core = m.ZiFObtainModuleContext("core").unwrap();
    m.ZiFObtainModuleContext("web").unwrap();
    m.ZiFObtainDiscoveryContext("web", &core).unwrap();
    assert_eq!(working_areas(&work).len(), 3);

    assert_eq!(m.ZiFDestroy().unwrap(), 3);
    assert!(working_areas(&work).is_empty());
    assert_eq!(m.ZiFCountModuleContexts(), 0);
    assert_eq!(m.ZiFCountDiscoveryContexts(), 0);
    assert_eq!(m.to_string(), "ZiCContextManager [#module=0, #discovery=0, #resource=0]");

    let err = m.ZiFObtainModuleContext("core").unwrap_err();
    assert!(matches!(err, ZiError::InvalidState { .. }));
}

#[test]
fn test_destroy_during_concurrent_obtains_leaves_no_working_area() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let m = Arc::new(manager(config(&work), &three_modules(dir.path())));
    let barrier = Arc::new(std::sync::Barrier::new(9));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let m = Arc::clone(&m);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let name = if i % 2 == 0 { "web" } else { "storage" };
                let mut built = Vec::new();
                for _ in 0..20 {
                    match m.ZiFObtainModuleContext(name) {
                        Ok(ctx) => {
                            if let Ok(discovery) = m.ZiFObtainDiscoveryContext("web", &ctx) {
                                built.push(discovery);
                            }
                            built.push(ctx);
                        }
                        Err(err) => {
                            assert!(matches!(err, ZiError::InvalidState { .. }));
                            break;
                        }
                    }
                }
                built
            })
        })
        .collect();

    barrier.wait();
    m.ZiFDestroy().unwrap();
    let built: Vec<ZiCLoadingContext> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert!(working_areas(&work).is_empty());
    for ctx in &built {
        if let Some(path) = ctx.ZiFWorkingAreaPath() {
            assert!(!path.exists(), "{} kept {}", ctx, path.display());
        }
    }
    assert_eq!(m.ZiFCountModuleContexts(), 0);
    assert_eq!(m.ZiFCountDiscoveryContexts(), 0);
}
