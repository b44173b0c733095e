//! Package-scoped loading, delegation and concurrent class definition.

mod common;

use std::sync::Arc;

use envelope_loader::{
    Archive, LoaderSession, MemoryReader, ModuleFinder, ModuleLoader, NestedLocation,
};

use common::{JarBuilder, core_jar, util_jar};

fn open_in_memory(name: &str, bytes: Vec<u8>) -> Arc<Archive> {
    Arc::new(
        Archive::from_reader(
            Arc::new(MemoryReader::new(bytes)),
            name.to_string(),
            envelope_loader::DEFAULT_RELEASE_FEATURE,
        )
        .unwrap(),
    )
}

/// A session over the core/util pair used throughout these tests.
fn two_module_session() -> LoaderSession {
    let root = NestedLocation::root("outer.jar");
    let finder = ModuleFinder::from_archives([
        (
            open_in_memory("outer.jar!LIB-INF/core-1.0.0.jar", core_jar()),
            root.join("LIB-INF/core-1.0.0.jar"),
        ),
        (
            open_in_memory("outer.jar!LIB-INF/util.jar", util_jar()),
            root.join("LIB-INF/util.jar"),
        ),
    ])
    .unwrap();
    LoaderSession::new(Arc::new(finder))
}

#[test]
fn ownership_maps_each_package_to_its_module() {
    let session = two_module_session();
    assert_eq!(session.ownership().owner("a.b"), Some("core"));
    assert_eq!(session.ownership().owner("a.c"), Some("util"));
    assert_eq!(session.ownership().owner("a.d"), None);
}

#[test]
fn loads_a_class_from_the_bound_module() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();

    let class = core.load_class("a.b.Greeter").unwrap().unwrap();
    assert_eq!(class.name(), "a.b.Greeter");
    assert_eq!(class.module(), "core");
    assert_eq!(class.bytes(), b"core greeter bytecode");
    assert_eq!(
        class.location().to_string(),
        "envelope:outer.jar!LIB-INF/core-1.0.0.jar!a/b/Greeter.class"
    );
}

#[test]
fn delegates_one_hop_to_the_owning_loader() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();

    // a.c belongs to util; core's loader delegates and reports util as the
    // defining module.
    let class = core.load_class("a.c.Helper").unwrap().unwrap();
    assert_eq!(class.module(), "util");
    assert_eq!(class.bytes(), b"util helper bytecode");

    // The delegate and the owner hand out the same definition.
    let util = session.loader("util").unwrap();
    let direct = util.load_class("a.c.Helper").unwrap().unwrap();
    assert!(Arc::ptr_eq(&class, &direct));
}

#[test]
fn unknown_class_is_none_not_an_error() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();
    assert!(core.load_class("a.b.Missing").unwrap().is_none());
    assert!(core.load_class("no.such.pkg.X").unwrap().is_none());
}

#[test]
fn repeated_loads_return_the_same_definition() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();
    let first = core.load_class("a.b.Engine").unwrap().unwrap();
    let second = core.load_class("a.b.Engine").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn concurrent_loads_define_a_class_at_most_once() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let loader: Arc<ModuleLoader> = core.clone();
        handles.push(std::thread::spawn(move || {
            loader.load_class("a.b.Greeter").unwrap().unwrap()
        }));
    }
    let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for class in &classes[1..] {
        assert!(Arc::ptr_eq(&classes[0], class));
    }
}

#[test]
fn concurrent_delegated_loads_share_one_definition() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();
    let util = session.loader("util").unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        // Half the threads go through the delegating loader, half straight
        // to the owner.
        let loader = if i % 2 == 0 { core.clone() } else { util.clone() };
        handles.push(std::thread::spawn(move || {
            loader.load_class("a.c.Helper").unwrap().unwrap()
        }));
    }
    let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for class in &classes[1..] {
        assert!(Arc::ptr_eq(&classes[0], class));
    }
}

#[test]
fn resources_resolve_within_the_bound_module_only() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();

    assert_eq!(
        core.find_resource("core-notes.txt").unwrap().as_deref(),
        Some(&b"core resource\n"[..])
    );
    // util's resource is not visible without naming the module.
    assert!(core.find_resource("util-notes.txt").unwrap().is_none());
    assert_eq!(core.find_resources("core-notes.txt").unwrap().len(), 1);
    assert!(core.find_resources("util-notes.txt").unwrap().is_empty());
}

#[test]
fn module_qualified_resource_lookup_reaches_siblings() {
    let session = two_module_session();
    let core = session.loader("core").unwrap();

    assert_eq!(
        core.find_resource_in("util", "util-notes.txt")
            .unwrap()
            .as_deref(),
        Some(&b"util resource\n"[..])
    );
    assert!(core.find_resource_in("nope", "util-notes.txt").unwrap().is_none());
}

#[test]
fn loading_honors_the_versioned_view() {
    let bytes = JarBuilder::new()
        .deflated("a/b/Impl.class", b"base impl")
        .deflated("META-INF/versions/11/a/b/Impl.class", b"v11 impl")
        .build();
    let finder = ModuleFinder::from_archives([(
        open_in_memory("mv-1.0.jar", bytes),
        NestedLocation::root("mv-1.0.jar"),
    )])
    .unwrap();
    let session = LoaderSession::new(Arc::new(finder));
    let loader = session.loader("mv").unwrap();

    let class = loader.load_class("a.b.Impl").unwrap().unwrap();
    assert_eq!(class.bytes(), b"v11 impl");
}
