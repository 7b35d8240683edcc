use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use nest_archive::{ArchiveAddress, ArchiveError, ArchiveIndex, ErrorKind};
use nest_config::NestConfig;
use nest_loader::{Aggregator, ClassResolver, DefinedClass, ResolveError, ReservedNamespaces};
use serde::Serialize;

use crate::manifest::{Manifest, BOOT_CLASS, MANIFEST_PATH};

#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub origin: String,
    pub inline_entries: usize,
    pub ordinal_entries: usize,
    pub children: Vec<IndexReport>,
}

impl IndexReport {
    fn from_index(index: &ArchiveIndex) -> Self {
        let inline_entries = index.entries().values().filter(|l| l.is_inline()).count();
        Self {
            origin: index.origin().to_string(),
            inline_entries,
            ordinal_entries: index.entries().len() - inline_entries,
            children: index.children().iter().map(Self::from_index).collect(),
        }
    }

    pub fn archives(&self) -> usize {
        1 + self.children.iter().map(IndexReport::archives).sum::<usize>()
    }
}

#[derive(Debug, Serialize)]
pub struct ClassReport {
    pub name: String,
    pub defined_by: String,
    pub location: String,
    pub major_version: u16,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub bytes: usize,
}

impl ClassReport {
    fn new(class: &DefinedClass) -> Self {
        let header = class.header();
        Self {
            name: class.name().to_owned(),
            defined_by: class.defined_by().to_string(),
            location: class.location().to_string(),
            major_version: header.major_version,
            super_class: header.super_class.clone(),
            interfaces: header.interfaces.clone(),
            bytes: class.bytes().len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BootReport {
    pub jar: String,
    pub archives: Vec<String>,
    pub boot: ClassReport,
}

pub fn index(address: &str, recursive: bool, config: &NestConfig) -> Result<IndexReport> {
    let address = ArchiveAddress::parse(address)?;
    let mut options = config.index_options();
    options.recursive &= recursive;
    let index = ArchiveIndex::open(&address, &options)
        .with_context(|| format!("failed to index {address}"))?;
    Ok(IndexReport::from_index(&index))
}

/// Builds an aggregator over `archives`, with a parent aggregator over
/// `hosts` when any are given.
fn aggregator(archives: &[String], hosts: &[String], config: &NestConfig) -> Result<Aggregator> {
    let mut builder = Aggregator::builder()
        .reserved(config.reserved_namespaces())
        .options(config.index_options());

    if !hosts.is_empty() {
        // The host stands in for the runtime itself, so it answers every name.
        let host = Aggregator::builder()
            .reserved(ReservedNamespaces::none())
            .options(config.index_options())
            .build();
        add_all(&host, hosts, config.index.recursive)?;
        builder = builder.parent(Arc::new(host) as Arc<dyn ClassResolver>);
    }

    let aggregator = builder.build();
    add_all(&aggregator, archives, config.index.recursive)?;
    Ok(aggregator)
}

fn add_all(aggregator: &Aggregator, archives: &[String], recursive: bool) -> Result<()> {
    for archive in archives {
        let address = ArchiveAddress::parse(archive)?;
        aggregator
            .add_archive(&address, recursive)
            .with_context(|| format!("failed to add {address}"))?;
    }
    Ok(())
}

pub fn resolve(
    name: &str,
    archives: &[String],
    hosts: &[String],
    config: &NestConfig,
) -> Result<ClassReport> {
    let aggregator = aggregator(archives, hosts, config)?;
    let class = aggregator.resolve_class(name)?;
    Ok(ClassReport::new(&class))
}

/// Every locator address for `path`, in lookup order.
pub fn resources(path: &str, archives: &[String], config: &NestConfig) -> Result<Vec<String>> {
    let aggregator = aggregator(archives, &[], config)?;
    let found: Vec<String> = aggregator
        .find_resources(path)
        .map(|locator| locator.address().to_string())
        .collect();
    if found.is_empty() {
        return Err(ResolveError::NotFound(path.to_owned()).into());
    }
    Ok(found)
}

/// Streams the bytes named by `address` into `out`, one buffer at a time at
/// every nesting level.
pub fn cat(address: &str, out: &mut dyn Write) -> Result<u64> {
    let address = ArchiveAddress::parse(address)?;
    let copied = address.copy_to(out)?;
    out.flush()?;
    Ok(copied)
}

/// Reads the jar's manifest, adds the jar and each `Compact-Class-Path` entry
/// inside it as separate non-recursive archives, and resolves `Boot-Class`.
pub fn boot(jar: &Path, config: &NestConfig) -> Result<BootReport> {
    let root = ArchiveAddress::from_path(jar);
    let text = root
        .join(MANIFEST_PATH)
        .read_all()
        .with_context(|| format!("failed to read manifest of {}", jar.display()))?;
    let manifest = Manifest::parse(&String::from_utf8_lossy(&text))
        .with_context(|| format!("invalid manifest in {}", jar.display()))?;

    let Some(boot_class) = manifest.boot_class() else {
        bail!("{} has no {BOOT_CLASS} attribute", jar.display());
    };

    let aggregator = Aggregator::builder()
        .reserved(config.reserved_namespaces())
        .options(config.index_options())
        .build();
    aggregator.add_archive(&root, false)?;
    let mut archives = vec![root.to_string()];
    for entry in manifest.class_path() {
        let address = root.join(entry);
        aggregator
            .add_archive(&address, false)
            .with_context(|| format!("failed to add class path entry {entry}"))?;
        archives.push(address.to_string());
    }
    tracing::debug!(jar = %jar.display(), boot_class, archives = archives.len(), "booting");

    let class = aggregator.resolve_class(boot_class)?;
    Ok(BootReport {
        jar: jar.display().to_string(),
        archives,
        boot: ClassReport::new(&class),
    })
}

/// 1 when the failure is a plain miss, 2 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<ResolveError>() {
            return if err.is_not_found() { 1 } else { 2 };
        }
        if let Some(err) = cause.downcast_ref::<ArchiveError>() {
            return if err.kind() == ErrorKind::NotFound { 1 } else { 2 };
        }
    }
    2
}
