//! End-to-end envelope sessions and location resolution.

mod common;

use std::sync::Arc;

use envelope_loader::{
    Archive, Envelope, LoaderError, LocationResolver, MemoryReader, NestedLocation,
};

use common::{JarBuilder, core_jar, envelope_jar, write_jar};

fn open_envelope(bytes: Vec<u8>) -> Result<Envelope, LoaderError> {
    let archive = Archive::from_reader(
        Arc::new(MemoryReader::new(bytes)),
        "outer.jar".to_string(),
        envelope_loader::DEFAULT_RELEASE_FEATURE,
    )?;
    Envelope::from_archive(Arc::new(archive))
}

#[test]
fn reads_manifest_attributes_and_metadata() {
    let envelope = open_envelope(envelope_jar()).unwrap();

    assert_eq!(envelope.main_module(), Some("core"));
    assert_eq!(envelope.main_class(), Some("a.b.Engine"));
    assert_eq!(envelope.extra_classpath(), vec!["/opt/extra.jar"]);
    assert_eq!(
        envelope.library_names(),
        &["core-1.0.0.jar".to_string(), "util.jar".to_string()]
    );
    assert_eq!(
        envelope.entry_digest("LIB-INF/core-1.0.0.jar"),
        Some("Y29yZQ==")
    );
    assert_eq!(envelope.entry_digest("LIB-INF/util.jar"), None);

    let properties = envelope.system_properties().unwrap();
    assert_eq!(properties.get("app.mode").map(String::as_str), Some("test"));
}

#[test]
fn archive_without_a_table_of_contents_is_not_an_envelope() {
    let bytes = JarBuilder::new()
        .deflated("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n")
        .stored("LIB-INF/core-1.0.0.jar", &core_jar())
        .build();
    match open_envelope(bytes) {
        Err(LoaderError::MalformedArchive { reason, .. }) => {
            assert!(reason.contains("libraries.txt"), "{reason}");
        }
        Err(other) => panic!("expected MalformedArchive, got {other}"),
        Ok(_) => panic!("expected MalformedArchive, got an envelope"),
    }
}

#[test]
fn toc_naming_a_missing_library_breaks_addressing() {
    let bytes = JarBuilder::new()
        .deflated("META-INF/libraries.txt", b"ghost.jar\n")
        .build();
    let envelope = open_envelope(bytes).unwrap();
    match envelope.libraries() {
        Err(LoaderError::BrokenAddressing { segment, .. }) => {
            assert_eq!(segment, "LIB-INF/ghost.jar");
        }
        other => panic!("expected BrokenAddressing, got {other:?}"),
    }
}

#[test]
fn session_loads_the_main_class_through_the_main_loader() {
    let session = open_envelope(envelope_jar()).unwrap().into_session().unwrap();

    let main_class = session.envelope().main_class().unwrap().to_string();
    let loader = session.main_loader().unwrap();
    assert_eq!(loader.module_name(), "core");

    let class = loader.load_class(&main_class).unwrap().unwrap();
    assert_eq!(class.bytes(), b"core engine bytecode");

    // Cross-module loading works from the main loader too.
    let helper = loader.load_class("a.c.Helper").unwrap().unwrap();
    assert_eq!(helper.module(), "util");
}

#[test]
fn session_without_a_main_module_attribute_reports_it() {
    let bytes = JarBuilder::new()
        .deflated("META-INF/libraries.txt", b"")
        .build();
    let session = open_envelope(bytes).unwrap().into_session().unwrap();
    assert!(matches!(
        session.main_loader(),
        Err(LoaderError::ModuleNotFound { .. })
    ));
}

#[test]
fn resolves_composite_identifiers_back_to_bytes() {
    let session = open_envelope(envelope_jar()).unwrap().into_session().unwrap();

    // Entry inside a stored nested archive.
    let bytes = session
        .resolve_str("envelope:outer.jar!LIB-INF/core-1.0.0.jar!a/b/Greeter.class")
        .unwrap();
    assert_eq!(bytes, b"core greeter bytecode");

    // Entry inside a deflated nested archive.
    let bytes = session
        .resolve_str("envelope:outer.jar!LIB-INF/util.jar!util-notes.txt")
        .unwrap();
    assert_eq!(bytes, b"util resource\n");

    // Entry of the outer archive itself.
    let bytes = session
        .resolve_str("envelope:outer.jar!META-INF/libraries.txt")
        .unwrap();
    assert_eq!(bytes, b"core-1.0.0.jar\nutil.jar\n");
}

#[test]
fn loaded_class_locations_resolve_to_the_same_bytes() {
    let session = open_envelope(envelope_jar()).unwrap().into_session().unwrap();
    let loader = session.main_loader().unwrap();
    let class = loader.load_class("a.b.Greeter").unwrap().unwrap();

    let bytes = session.resolve_str(&class.location().to_string()).unwrap();
    assert_eq!(bytes, class.bytes());
}

#[test]
fn broken_chain_segments_fail_fast() {
    let session = open_envelope(envelope_jar()).unwrap().into_session().unwrap();

    match session.resolve_str("envelope:outer.jar!LIB-INF/core-1.0.0.jar!no/such/Entry.class") {
        Err(LoaderError::BrokenAddressing { segment, .. }) => {
            assert_eq!(segment, "no/such/Entry.class");
        }
        other => panic!("expected BrokenAddressing, got {other:?}"),
    }
    match session.resolve_str("envelope:outer.jar!LIB-INF/ghost.jar!x.txt") {
        Err(LoaderError::BrokenAddressing { segment, .. }) => {
            assert_eq!(segment, "LIB-INF/ghost.jar");
        }
        other => panic!("expected BrokenAddressing, got {other:?}"),
    }
}

#[test]
fn resolver_walks_unregistered_levels_from_the_closest_prefix() {
    // Only the outer archive is registered; the nested level is opened on
    // demand during resolution.
    let outer = Arc::new(
        Archive::from_reader(
            Arc::new(MemoryReader::new(envelope_jar())),
            "outer.jar".to_string(),
            envelope_loader::DEFAULT_RELEASE_FEATURE,
        )
        .unwrap(),
    );
    let mut resolver = LocationResolver::new();
    resolver.register(NestedLocation::root("outer.jar"), outer);

    let location = NestedLocation::root("outer.jar")
        .join("LIB-INF/util.jar")
        .join("a/c/Helper.class");
    assert_eq!(resolver.resolve(&location).unwrap(), b"util helper bytecode");
}

#[test]
fn opens_an_envelope_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_jar(&dir, "app.jar", &envelope_jar());

    let envelope = Envelope::open(&path).unwrap();
    assert_eq!(envelope.main_module(), Some("core"));

    let session = envelope.into_session().unwrap();
    let loader = session.main_loader().unwrap();
    let class = loader.load_class("a.b.Engine").unwrap().unwrap();
    assert_eq!(class.module(), "core");
}
