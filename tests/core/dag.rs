//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd project team.

use zimod::dag::*;
use zimod::ZiError;

fn graph(nodes: Vec<ZiCModuleNode>) -> ZiCModuleGraph {
    let mut graph = ZiCModuleGraph::ZiFNew();
    for node in nodes {
        graph.ZiFAddModule(node).unwrap();
    }
    graph
}

#[test]
fn test_core_precedes_web_and_storage() {
    let graph = graph(vec![
        ZiCModuleNode::ZiFNew("web").ZiFWithProvider("core"),
        ZiCModuleNode::ZiFNew("storage").ZiFWithProvider("core"),
        ZiCModuleNode::ZiFNew("core"),
    ]);

    let order = graph.ZiFDeploymentOrder().unwrap();
    assert_eq!(order, vec!["core", "storage", "web"]);
    assert_eq!(graph.ZiFProviderOf("web").as_deref(), Some("core"));
    assert_eq!(graph.ZiFProviderOf("core"), None);
    assert_eq!(graph.ZiFDependents("core"), vec!["storage", "web"]);
}

#[test]
fn test_plain_dependencies_also_order() {
    let graph = graph(vec![
        ZiCModuleNode::ZiFNew("reports").ZiFWithDependency("storage"),
        ZiCModuleNode::ZiFNew("storage"),
    ]);
    assert_eq!(graph.ZiFDeploymentOrder().unwrap(), vec!["storage", "reports"]);
    assert_eq!(graph.ZiFProviderOf("reports"), None);
    assert_eq!(graph.ZiFDependencies("reports"), vec!["storage"]);
}

#[test]
fn test_provider_cycle_names_both_modules() {
    let graph = graph(vec![
        ZiCModuleNode::ZiFNew("a").ZiFWithProvider("b"),
        ZiCModuleNode::ZiFNew("b").ZiFWithProvider("a"),
        ZiCModuleNode::ZiFNew("free"),
    ]);

    let err = graph.ZiFDeploymentOrder().unwrap_err();
    match &err {
        ZiError::CyclicDependency { cycle } => {
            let mut members = cycle.clone();
            members.sort();
            assert_eq!(members, vec!["a", "b"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("a") && message.contains("b"));
}

#[test]
fn test_unknown_dependency_does_not_block_order() {
    let graph = graph(vec![
        ZiCModuleNode::ZiFNew("a").ZiFWithProvider("z"),
        ZiCModuleNode::ZiFNew("b"),
    ]);
    assert_eq!(graph.ZiFDeploymentOrder().unwrap(), vec!["a", "b"]);
    assert_eq!(
        graph.ZiFDanglingDependencies(),
        vec![("a".to_string(), "z".to_string())]
    );
}

#[test]
fn test_duplicate_and_self_dependency_rejected() {
    let mut graph = ZiCModuleGraph::ZiFNew();
    graph.ZiFAddModule(ZiCModuleNode::ZiFNew("a")).unwrap();
    assert!(graph.ZiFAddModule(ZiCModuleNode::ZiFNew("a")).is_err());
    assert!(graph
        .ZiFAddModule(ZiCModuleNode::ZiFNew("b").ZiFWithDependency("b"))
        .is_err());
    assert_eq!(graph.ZiFLen(), 1);
}

#[test]
fn test_remove_frees_dependents_of_edges() {
    let mut graph = graph(vec![
        ZiCModuleNode::ZiFNew("web").ZiFWithProvider("core"),
        ZiCModuleNode::ZiFNew("core"),
    ]);
    assert!(graph.ZiFRemove("core").is_some());
    assert!(!graph.ZiFContains("core"));
    assert_eq!(graph.ZiFDeploymentOrder().unwrap(), vec!["web"]);
}
