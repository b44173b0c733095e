//! Entry point for the `envelope` inspection CLI.
//!
//! This binary lists archive entries, derives module descriptors for the
//! nested libraries of an envelope, prints envelope metadata and resolves
//! composite location identifiers to raw bytes.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use envelope_loader::cli::{Cli, Command};
use envelope_loader::{Archive, Envelope, LocationResolver, NestedLocation, ZipEntry};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::List {
            file,
            verbose,
            versioned,
        } => list_entries(&file, verbose, versioned),
        Command::Modules { file } => print_modules(&file),
        Command::Info { file } => print_info(&file),
        Command::Cat { location } => cat_entry(&location),
    }
}

/// List the entries of an archive, either the raw central-directory order
/// or the folded multi-version view.
fn list_entries(file: &str, verbose: bool, versioned: bool) -> Result<()> {
    let archive = Archive::from_file(file).with_context(|| format!("opening {file}"))?;
    let entries: Vec<(&str, &ZipEntry)> = if versioned {
        archive.versioned_entries().collect()
    } else {
        archive.entries().map(|e| (e.name(), e)).collect()
    };

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    // Totals for the summary line, directories excluded.
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for (name, entry) in &entries {
        if verbose {
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();
            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                entry.uncompressed_size,
                entry.compressed_size,
                compression_ratio(entry.compressed_size, entry.uncompressed_size),
                year,
                month,
                day,
                hour,
                minute,
                name
            );
            if !entry.is_directory {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            println!("{name}");
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            compression_ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Percentage saved by compression, right-aligned for the table.
fn compression_ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Derive and print the module descriptor of every nested library listed
/// in the envelope's table of contents.
fn print_modules(file: &str) -> Result<()> {
    let envelope = Envelope::open(file).with_context(|| format!("opening {file}"))?;
    let session = envelope.into_session()?;

    for module in session.finder().find_all() {
        let descriptor = module.descriptor();
        match descriptor.version() {
            Some(version) => println!("{}@{}", descriptor.name(), version),
            None => println!("{}", descriptor.name()),
        }
        println!("  location: {}", module.location());
        for package in descriptor.packages() {
            println!("  package: {package}");
        }
        for (service, providers) in descriptor.provides() {
            println!("  provides: {service} with {}", providers.join(", "));
        }
        if let Some(main_class) = descriptor.main_class() {
            println!("  main-class: {main_class}");
        }
    }

    for module in session.finder().shadowed() {
        println!(
            "shadowed: {} ({})",
            module.descriptor().name(),
            module.archive().name()
        );
    }

    Ok(())
}

/// Print envelope metadata: manifest attributes, bootstrap properties and
/// the library load order.
fn print_info(file: &str) -> Result<()> {
    let envelope = Envelope::open(file).with_context(|| format!("opening {file}"))?;

    if let Some(main_module) = envelope.main_module() {
        println!("main module: {main_module}");
    }
    if let Some(main_class) = envelope.main_class() {
        println!("main class: {main_class}");
    }
    for path in envelope.extra_classpath() {
        println!("extra classpath: {path}");
    }

    let properties = envelope.system_properties()?;
    if !properties.is_empty() {
        println!("system properties:");
        for (key, value) in &properties {
            println!("  {key}={value}");
        }
    }

    println!("libraries ({}):", envelope.library_names().len());
    for name in envelope.library_names() {
        match envelope.entry_digest(&format!("LIB-INF/{name}")) {
            Some(digest) => println!("  {name}  sha256={digest}"),
            None => println!("  {name}"),
        }
    }

    Ok(())
}

/// Resolve a composite identifier and write the entry bytes to stdout.
///
/// The outer archive does not have to be an envelope; any archive works as
/// the root of the chain.
fn cat_entry(location: &str) -> Result<()> {
    let parsed = NestedLocation::parse(location)?;
    let archive = Archive::from_file(parsed.outer())
        .with_context(|| format!("opening {}", parsed.outer()))?;

    let mut resolver = LocationResolver::new();
    resolver.register(NestedLocation::root(parsed.outer()), Arc::new(archive));
    let bytes = resolver
        .resolve(&parsed)
        .with_context(|| format!("resolving {location}"))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
