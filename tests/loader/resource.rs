//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd project team.

mod common;

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proptest::prelude::*;

use zimod::loader::descriptor::ZiFParseDescriptor;
use zimod::loader::*;
use zimod::{ZiCEngineConfig, ZiError};

use common::{config, module_archive};

use ZiCSharingPolicy::{Instance, Shared};

/// Modules: `base`; `m` uses code of `base`; `p` owns the parent resources.
struct Fixture {
    _dir: tempfile::TempDir,
    manager: ZiCContextManager,
    m_archive: PathBuf,
}

fn fixture_with(config_for: impl FnOnce(&Path) -> ZiCEngineConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let archives = vec![
        module_archive(dir.path(), "base", None, &[("acme/base/Common.bin", b"c")]),
        module_archive(dir.path(), "m", Some("base"), &[("acme/m/Agent.bin", b"a")]),
        module_archive(dir.path(), "p", None, &[("acme/p/Host.bin", b"h")]),
    ];
    let registry = ZiCModuleRegistry::ZiFFromDescriptors(
        archives.iter().map(|a| ZiFParseDescriptor(a, "module.json").unwrap()),
    );
    let manager = ZiCContextManager::ZiFNew(
        config_for(&dir.path().join("work")),
        Arc::new(ZiCStaticHostSymbols::default()),
        registry,
    )
    .unwrap();
    let m_archive = archives[1].clone();
    Fixture {
        _dir: dir,
        manager,
        m_archive,
    }
}

fn fixture() -> Fixture {
    fixture_with(config)
}

fn resource(key: &str, type_name: &str, module: &str, policy: Option<ZiCSharingPolicy>) -> ZiCResource {
    ZiCResource::ZiFNew(key, ZiCResourceType::ZiFNew(type_name, module, policy))
}

/// The platform resource at the top of the hierarchy.
fn platform() -> Arc<ZiCResource> {
    Arc::new(resource("localhost", "Platform", "p", Some(Shared)))
}

/// A resource of module `p` below the platform.
fn server(policy: ZiCSharingPolicy) -> Arc<ZiCResource> {
    Arc::new(resource("srv-1", "Server", "p", Some(policy)).ZiFWithParent(platform()))
}

#[test]
fn test_same_module_reuses_parent_context() {
    let f = fixture();
    let parent = server(Instance);
    let parent_ctx = f.manager.ZiFObtainDiscoveryContext("p", f.manager.ZiFRoot()).unwrap();
    let child = resource("db", "Database", "p", None).ZiFWithParent(Arc::clone(&parent));

    let ctx = f
        .manager
        .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
        .unwrap();
    assert_eq!(ctx, parent_ctx);
}

#[test]
fn test_shared_under_shared_uses_module_context() {
    let f = fixture();
    let module_m = f.manager.ZiFObtainModuleContext("m").unwrap();

    for parent in [platform(), server(Shared)] {
        let parent_ctx = f.manager.ZiFObtainModuleContext("p").unwrap();
        let child = resource("agent", "Agent", "m", Some(Shared)).ZiFWithParent(Arc::clone(&parent));
        let ctx = f
            .manager
            .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
            .unwrap();
        assert_eq!(ctx, module_m);
    }
    assert_eq!(f.manager.ZiFCountUniqueResourceContexts(), 1);
}

#[test]
fn test_instance_under_shared_root_skips_module_context() {
    let f = fixture();
    let parent = platform();
    let parent_ctx = f.manager.ZiFObtainModuleContext("p").unwrap();
    let child = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&parent));

    let ctx = f
        .manager
        .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
        .unwrap();
    let module_m = f.manager.ZiFObtainModuleContext("m").unwrap();
    let base = f.manager.ZiFObtainModuleContext("base").unwrap();

    assert_ne!(ctx, module_m);
    assert_eq!(ctx.ZiFParent(), Some(&base));
    assert_eq!(ctx.ZiFKind(), ZiCContextKind::Resource);
    assert_eq!(ctx.ZiFSourcePaths()[0], f.m_archive);
    assert!(ctx.ZiFCanSee("acme.base.Common"));
}

#[test]
fn test_instance_under_shared_attaches_to_parent_module() {
    let f = fixture();
    let parent = server(Shared);
    let parent_ctx = f.manager.ZiFObtainModuleContext("p").unwrap();
    let child = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&parent));

    let ctx = f
        .manager
        .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
        .unwrap();
    let module_p = f.manager.ZiFObtainModuleContext("p").unwrap();

    assert_eq!(ctx.ZiFParent(), Some(&module_p));
    assert!(ctx.ZiFCanSee("acme.p.Host"));
    assert!(ctx.ZiFCanSee("acme.m.Agent"));
}

#[test]
fn test_instance_parent_gives_fresh_child_context() {
    for own in [Shared, Instance] {
        let f = fixture();
        let extra = f._dir.path().join("extra");
        fs::create_dir_all(extra.join("conn")).unwrap();
        fs::write(extra.join("conn/Client.bin"), b"c").unwrap();

        let parent = server(Instance);
        let parent_ctx = f.manager.ZiFObtainDiscoveryContext("p", f.manager.ZiFRoot()).unwrap();
        let child = resource("agent", "Agent", "m", Some(own)).ZiFWithParent(Arc::clone(&parent));

        let ctx = f
            .manager
            .ZiFResolveResourceContext(
                &child,
                Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)),
                &[extra.clone()],
            )
            .unwrap();

        assert_eq!(ctx.ZiFParent(), Some(&parent_ctx));
        assert_eq!(ctx.ZiFSourcePaths(), vec![f.m_archive.clone(), extra.clone()]);
        assert!(ctx.ZiFCanSee("conn.Client"));
        assert!(ctx.ZiFCanSee("acme.p.Host"));
        assert_ne!(ctx, f.manager.ZiFObtainModuleContext("m").unwrap());
    }
}

#[test]
fn test_unset_policy_is_invalid() {
    let f = fixture();
    let parent = server(Shared);
    let parent_ctx = f.manager.ZiFObtainModuleContext("p").unwrap();
    let child = resource("agent", "Agent", "m", None).ZiFWithParent(Arc::clone(&parent));

    let err = f
        .manager
        .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
        .unwrap_err();
    assert!(matches!(err, ZiError::InvalidSharingPolicy { .. }));
    assert_eq!(f.manager.ZiFCountUniqueResourceContexts(), 0);
}

#[test]
fn test_top_level_resource_gets_module_context() {
    let f = fixture();
    let top = platform();
    let ctx = f.manager.ZiFResolveResourceContext(&top, None, &[]).unwrap();
    assert_eq!(ctx, f.manager.ZiFObtainModuleContext("p").unwrap());
}

#[test]
fn test_resource_contexts_can_be_switched_off() {
    let f = fixture_with(|work| config(work).ZiFWithResourceContexts(false));
    let parent = server(Instance);
    let parent_ctx = f.manager.ZiFObtainDiscoveryContext("p", f.manager.ZiFRoot()).unwrap();
    let child = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&parent));

    let ctx = f
        .manager
        .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
        .unwrap();
    assert_eq!(ctx, f.manager.ZiFObtainModuleContext("m").unwrap());
}

#[test]
fn test_identity_caches_by_position_not_object() {
    let f = fixture();
    let parent_ctx = f.manager.ZiFObtainDiscoveryContext("p", f.manager.ZiFRoot()).unwrap();
    let other_ctx = f.manager.ZiFObtainModuleContext("p").unwrap();

    let first_parent = server(Instance);
    let first = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&first_parent));
    let ctx1 = f
        .manager
        .ZiFResolveResourceContext(&first, Some(ZiCParentResource::ZiFNew(&first_parent, &parent_ctx)), &[])
        .unwrap();

    // Rebuilt from scratch at the same position: cached, even with another parent context.
    let same_parent = server(Instance);
    let same = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&same_parent));
    let ctx2 = f
        .manager
        .ZiFResolveResourceContext(&same, Some(ZiCParentResource::ZiFNew(&same_parent, &other_ctx)), &[])
        .unwrap();
    assert_eq!(ctx1, ctx2);

    // Same own triple, different grandparent: a new entry.
    let elsewhere = Arc::new(
        resource("srv-1", "Server", "p", Some(Instance)).ZiFWithParent(Arc::new(resource(
            "remote",
            "Platform",
            "p",
            Some(Shared),
        ))),
    );
    let moved = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&elsewhere));
    let ctx3 = f
        .manager
        .ZiFResolveResourceContext(&moved, Some(ZiCParentResource::ZiFNew(&elsewhere, &parent_ctx)), &[])
        .unwrap();
    assert_ne!(ctx1, ctx3);

    assert_eq!(f.manager.ZiFResourceContexts().unwrap().len(), 2);
    assert_eq!(f.manager.ZiFCountUniqueResourceContexts(), 2);
}

#[test]
fn test_destroy_clears_resource_contexts() {
    let f = fixture();
    let parent = server(Instance);
    let parent_ctx = f.manager.ZiFObtainDiscoveryContext("p", f.manager.ZiFRoot()).unwrap();
    let child = resource("agent", "Agent", "m", Some(Instance)).ZiFWithParent(Arc::clone(&parent));
    f.manager
        .ZiFResolveResourceContext(&child, Some(ZiCParentResource::ZiFNew(&parent, &parent_ctx)), &[])
        .unwrap();

    f.manager.ZiFDestroy().unwrap();
    assert_eq!(f.manager.ZiFCountUniqueResourceContexts(), 0);
    assert!(f.manager.ZiFResourceContexts().unwrap().is_empty());
}

fn chain(triples: &[(String, String, String)]) -> Option<ZiCResource> {
    let mut current: Option<ZiCResource> = None;
    for (key, type_name, module) in triples.iter().rev() {
        let next = resource(key, type_name, module, Some(Shared));
        current = Some(match current {
            Some(parent) => next.ZiFWithParent(Arc::new(parent)),
            None => next,
        });
    }
    current
}

fn hash_of(identity: &ZiCCanonicalResourceIdentity) -> u64 {
    let mut hasher = DefaultHasher::new();
    identity.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #[test]
    fn prop_identity_matches_iff_chains_match(
        a in prop::collection::vec(("[a-c]{1,2}", "[A-B]", "[m-n]"), 1..4),
        b in prop::collection::vec(("[a-c]{1,2}", "[A-B]", "[m-n]"), 1..4),
    ) {
        let interner = ZiCStringInterner::ZiFNew();
        let ra = chain(&a).unwrap();
        let rb = chain(&b).unwrap();
        let again = chain(&a).unwrap();

        let ia = ZiCCanonicalResourceIdentity::ZiFFromResource(&ra, &interner).unwrap();
        let ib = ZiCCanonicalResourceIdentity::ZiFFromResource(&rb, &interner).unwrap();
        let ia2 = ZiCCanonicalResourceIdentity::ZiFFromResource(&again, &interner).unwrap();

        prop_assert_eq!(&ia, &ia2);
        prop_assert_eq!(hash_of(&ia), hash_of(&ia2));
        prop_assert_eq!(ia == ib, a == b);
    }
}
