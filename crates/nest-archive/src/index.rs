use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

use crate::address::ArchiveAddress;
use crate::error::Result;
use crate::locator::Locator;
use crate::stream::next_entry;

/// Controls how entries are classified while indexing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexOptions {
    /// Build child indices for entries that look like nested archives.
    pub recursive: bool,
    /// Entries ending with this suffix are compiled units and captured inline.
    pub class_suffix: String,
    /// Entries ending with one of these suffixes are treated as nested archives.
    pub archive_suffixes: Vec<String>,
}

impl IndexOptions {
    pub fn recursive(recursive: bool) -> Self {
        Self {
            recursive,
            ..Self::default()
        }
    }

    pub fn is_class(&self, entry: &str) -> bool {
        entry.ends_with(self.class_suffix.as_str())
    }

    pub fn is_archive(&self, entry: &str) -> bool {
        self.archive_suffixes
            .iter()
            .any(|suffix| entry.ends_with(suffix.as_str()))
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            class_suffix: ".class".to_owned(),
            archive_suffixes: vec![".jar".to_owned()],
        }
    }
}

/// Entry table of one archive plus the indices of archives nested in it.
///
/// Built in a single sequential pass. Compiled units are captured as inline
/// locators; everything else gets an ordinal locator. Nested archives are
/// indexed depth-first from the same open stream while the outer scan is
/// positioned on them, in the order they were encountered.
#[derive(Clone, Debug)]
pub struct ArchiveIndex {
    source: Arc<Locator>,
    entries: HashMap<String, Locator>,
    children: Vec<ArchiveIndex>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub archives: usize,
    pub inline_entries: usize,
    pub ordinal_entries: usize,
    pub max_depth: usize,
}

impl ArchiveIndex {
    /// Opens `address` and indexes it.
    pub fn open(address: &ArchiveAddress, options: &IndexOptions) -> Result<Self> {
        Self::open_locator(Locator::direct(address.clone()), options)
    }

    /// Indexes the archive behind an arbitrary locator, reopening it from its
    /// own source.
    pub fn open_locator(source: Locator, options: &IndexOptions) -> Result<Self> {
        let source = Arc::new(source);
        source.visit(&mut |reader| scan(source.clone(), reader, options))
    }

    /// Indexes an already-open archive stream. `source` must describe how to
    /// reopen the same bytes; ordinal locators recorded in the index replay it.
    pub fn build(source: Locator, reader: &mut dyn Read, options: &IndexOptions) -> Result<Self> {
        scan(Arc::new(source), &mut BufReader::new(reader), options)
    }

    pub fn origin(&self) -> &ArchiveAddress {
        self.source.address()
    }

    pub fn source(&self) -> &Arc<Locator> {
        &self.source
    }

    pub fn get(&self, entry: &str) -> Option<&Locator> {
        self.entries.get(entry)
    }

    pub fn entries(&self) -> &HashMap<String, Locator> {
        &self.entries
    }

    pub fn children(&self) -> &[ArchiveIndex] {
        &self.children
    }

    pub fn into_parts(self) -> (Arc<Locator>, HashMap<String, Locator>, Vec<ArchiveIndex>) {
        (self.source, self.entries, self.children)
    }

    /// Origins of this archive and every nested archive, depth-first.
    pub fn origins(&self) -> Vec<ArchiveAddress> {
        let mut out = Vec::new();
        self.collect_origins(&mut out);
        out
    }

    fn collect_origins(&self, out: &mut Vec<ArchiveAddress>) {
        out.push(self.origin().clone());
        for child in &self.children {
            child.collect_origins(out);
        }
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats::default();
        self.accumulate(0, &mut stats);
        stats
    }

    fn accumulate(&self, depth: usize, stats: &mut IndexStats) {
        stats.archives += 1;
        stats.max_depth = stats.max_depth.max(depth);
        for locator in self.entries.values() {
            if locator.is_inline() {
                stats.inline_entries += 1;
            } else {
                stats.ordinal_entries += 1;
            }
        }
        for child in &self.children {
            child.accumulate(depth + 1, stats);
        }
    }
}

fn scan(
    source: Arc<Locator>,
    reader: &mut dyn BufRead,
    options: &IndexOptions,
) -> Result<ArchiveIndex> {
    let origin = source.address().clone();
    let mut entries = HashMap::new();
    let mut children: Vec<ArchiveIndex> = Vec::new();

    // Directories advance the position too; ordinal opens count every header.
    let mut position = 0usize;
    while let Some(mut entry) = next_entry(reader, &origin)? {
        if entry.is_dir() {
            entry.finish(&origin)?;
        } else if options.is_class(entry.name()) {
            let name = entry.name().to_owned();
            let bytes = entry.into_bytes(&origin)?;
            entries.insert(name.clone(), Locator::inline(&origin, &name, bytes)?);
        } else {
            let name = entry.name().to_owned();
            let locator = Locator::ordinal(source.clone(), &name, position)?;
            if options.recursive && options.is_archive(&name) {
                let child = {
                    let mut content = BufReader::new(&mut entry);
                    scan(Arc::new(locator.clone()), &mut content, options)?
                };
                // A repeated name shadows the earlier entry, so its child goes too.
                match children.iter_mut().find(|c| c.origin() == child.origin()) {
                    Some(existing) => *existing = child,
                    None => children.push(child),
                }
            }
            entry.finish(&origin)?;
            entries.insert(name, locator);
        }
        position += 1;
    }

    tracing::debug!(
        archive = %origin,
        entries = entries.len(),
        children = children.len(),
        "indexed archive"
    );

    Ok(ArchiveIndex {
        source,
        entries,
        children,
    })
}
