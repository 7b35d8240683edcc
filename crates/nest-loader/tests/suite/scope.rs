use std::sync::Arc;

use nest_loader::{
    Aggregator, ArchiveAddress, ClassResolver, ErrorKind, IndexOptions, NodeScope,
    ReservedNamespaces, ResolutionNode,
};
use nest_test_utils::{class_bytes_with_super, JarBuilder};
use pretty_assertions::assert_eq;

use super::Fixture;

/// ```text
/// outer.jar
///   Top.class, shared.txt
///   a.jar: A.class, shared.txt
///     deep.jar: Deep.class
///   b.jar: B.class, shared.txt
/// ```
fn tree() -> JarBuilder {
    JarBuilder::new()
        .class("Top")
        .file("shared.txt", "outer")
        .jar(
            "a.jar",
            JarBuilder::new()
                .class("A")
                .file("shared.txt", "a")
                .jar("deep.jar", JarBuilder::new().class("Deep")),
        )
        .jar(
            "b.jar",
            JarBuilder::new().class("B").file("shared.txt", "b"),
        )
}

#[test]
fn lookups_climb_the_ancestor_chain() {
    let fixture = Fixture::new();
    let outer = fixture.jar("outer.jar", tree());
    let aggregator = Aggregator::new();
    aggregator.add_archive(&outer, true).unwrap();

    let deep = outer.join("a.jar").join("deep.jar");
    let scope = aggregator.scope(&deep).unwrap();
    assert_eq!(scope.path().len(), 3);
    assert_eq!(scope.node().origin(), &deep);

    assert_eq!(scope.resolve_class("Deep").unwrap().defined_by(), &deep);
    assert_eq!(scope.resolve_class("A").unwrap().defined_by(), &outer.join("a.jar"));
    assert_eq!(scope.resolve_class("Top").unwrap().defined_by(), &outer);
    assert_eq!(scope.resolve_class("B").unwrap().defined_by(), &outer.join("b.jar"));
    assert!(scope.resolve_class("Nowhere").unwrap_err().is_not_found());
}

#[test]
fn resources_skip_the_branch_already_searched() {
    let fixture = Fixture::new();
    let outer = fixture.jar("outer.jar", tree());
    let aggregator = Aggregator::new();
    aggregator.add_archive(&outer, true).unwrap();

    let scope = aggregator.scope(&outer.join("a.jar")).unwrap();
    let found: Vec<_> = scope
        .find_resources("shared.txt")
        .map(|locator| locator.read_all().unwrap())
        .collect();
    assert_eq!(found, [b"a".to_vec(), b"outer".to_vec(), b"b".to_vec()]);
}

#[test]
fn scope_falls_back_to_sibling_components() {
    let fixture = Fixture::new();
    let outer = fixture.jar("outer.jar", tree());
    let other = fixture.jar(
        "other.jar",
        JarBuilder::new().class("Other").file("shared.txt", "other"),
    );
    let aggregator = Aggregator::new();
    aggregator.add_archive(&outer, true).unwrap();
    aggregator.add_archive(&other, true).unwrap();

    let scope = aggregator.scope(&outer.join("b.jar")).unwrap();
    assert_eq!(scope.resolve_class("Other").unwrap().defined_by(), &other);
    // The root is not searched a second time on the way through the aggregator.
    assert_eq!(scope.find_resources("shared.txt").count(), 4);
}

#[test]
fn superclass_resolves_from_the_defining_node() {
    let fixture = Fixture::new();
    let app = fixture.jar(
        "app.jar",
        JarBuilder::new()
            .file("app/Main.class", class_bytes_with_super("app/Main", Some("lib/Base")))
            .jar("lib.jar", JarBuilder::new().class("lib/Base")),
    );
    let aggregator = Aggregator::new();
    aggregator.add_archive(&app, true).unwrap();

    let main = aggregator.resolve_class("app.Main").unwrap();
    let super_name = main.header().super_class.clone().unwrap().replace('/', ".");
    let base = aggregator.resolve_from(main.defined_by(), &super_name).unwrap();
    assert_eq!(base.defined_by(), &app.join("lib.jar"));

    // Resolved through the scope, the node's cached instance comes back.
    let again = aggregator.resolve_class("lib.Base").unwrap();
    assert!(Arc::ptr_eq(&base, &again));
}

#[test]
fn unknown_origin_has_no_scope() {
    let fixture = Fixture::new();
    let outer = fixture.jar("outer.jar", tree());
    let aggregator = Aggregator::new();
    aggregator.add_archive(&outer, true).unwrap();

    let missing = outer.join("zzz.jar");
    assert!(aggregator.scope(&missing).is_none());
    assert_eq!(
        aggregator.resolve_from(&missing, "Top").unwrap_err().kind(),
        ErrorKind::InvalidConfiguration
    );
}

#[test]
fn standalone_scope_ends_at_its_parent() {
    let fixture = Fixture::new();
    let outer = fixture.jar("outer.jar", tree());
    let host_jar = fixture.jar("host.jar", JarBuilder::new().class("HostOnly"));

    let host = Aggregator::new();
    host.add_archive(&host_jar, true).unwrap();
    let root = ResolutionNode::open(&outer, &IndexOptions::default()).unwrap();
    let deep = outer.join("a.jar").join("deep.jar");

    let parent: Arc<dyn ClassResolver> = Arc::new(host);
    let scope =
        NodeScope::standalone(&root, &deep, Some(parent), ReservedNamespaces::default()).unwrap();
    assert_eq!(scope.resolve_class("HostOnly").unwrap().defined_by(), &host_jar);
    assert_eq!(scope.resolve_class("B").unwrap().defined_by(), &outer.join("b.jar"));

    let detached =
        NodeScope::standalone(&root, &deep, None, ReservedNamespaces::default()).unwrap();
    assert!(detached.resolve_class("HostOnly").unwrap_err().is_not_found());
    assert!(detached.resolve_class("java.lang.Object").unwrap_err().is_not_found());
    let elsewhere = ArchiveAddress::from_path("/elsewhere.jar");
    assert!(
        NodeScope::standalone(&root, &elsewhere, None, ReservedNamespaces::default()).is_none()
    );
}
