//! In-memory jar fixtures for integration tests.

// Each test binary uses its own subset of the fixtures.
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builds a small zip archive in memory, entry by entry.
pub struct JarBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl JarBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    pub fn stored(self, name: &str, content: &[u8]) -> Self {
        self.entry(name, content, CompressionMethod::Stored)
    }

    pub fn deflated(self, name: &str, content: &[u8]) -> Self {
        self.entry(name, content, CompressionMethod::Deflated)
    }

    fn entry(mut self, name: &str, content: &[u8], method: CompressionMethod) -> Self {
        let options = SimpleFileOptions::default().compression_method(method);
        self.writer.start_file(name, options).unwrap();
        self.writer.write_all(content).unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.writer.finish().unwrap().into_inner()
    }
}

/// Write archive bytes under `name` in `dir` and return the full path.
///
/// The file name matters: module-name derivation reads it.
pub fn write_jar(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// A library jar with one class in package `a.b` and a service declaration.
pub fn core_jar() -> Vec<u8> {
    JarBuilder::new()
        .deflated("a/b/Greeter.class", b"core greeter bytecode")
        .deflated("a/b/Engine.class", b"core engine bytecode")
        .deflated(
            "META-INF/services/a.b.Greeter",
            b"a.b.Engine # default engine\n",
        )
        .deflated("core-notes.txt", b"core resource\n")
        .build()
}

/// A library jar with one class in package `a.c` and no version in its
/// name.
pub fn util_jar() -> Vec<u8> {
    JarBuilder::new()
        .deflated("a/c/Helper.class", b"util helper bytecode")
        .deflated("util-notes.txt", b"util resource\n")
        .build()
}

/// An envelope embedding `core_jar` (stored) and `util_jar` (deflated),
/// with a manifest, table of contents and bootstrap properties.
pub fn envelope_jar() -> Vec<u8> {
    let manifest = b"Manifest-Version: 1.0\r\n\
                     Executable-Jar-Main-Module: core\r\n\
                     Executable-Jar-Main-Class: a.b.Engine\r\n\
                     Executable-Jar-Extra-Classpath: /opt/extra.jar\r\n\
                     \r\n\
                     Name: LIB-INF/core-1.0.0.jar\r\n\
                     SHA-256-Digest: Y29yZQ==\r\n";
    JarBuilder::new()
        .deflated("META-INF/MANIFEST.MF", manifest)
        .deflated("META-INF/libraries.txt", b"core-1.0.0.jar\nutil.jar\n")
        .deflated("META-INF/system.properties", b"app.mode=test\n")
        .stored("LIB-INF/core-1.0.0.jar", &core_jar())
        .deflated("LIB-INF/util.jar", &util_jar())
        .build()
}
