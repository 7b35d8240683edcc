use std::io::{Cursor, Write};
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::class::class_bytes;

#[derive(Clone, Debug)]
enum Entry {
    Dir(String),
    File {
        name: String,
        bytes: Vec<u8>,
        method: CompressionMethod,
    },
}

/// Authors a jar in stream order. Entries appear in the archive exactly in the
/// order they were added, which is what ordinal positions are measured
/// against.
#[derive(Clone, Debug, Default)]
pub struct JarBuilder {
    entries: Vec<Entry>,
    layout: Layout,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Layout {
    /// Sizes and CRC in every local header, as `ZipWriter` over a seekable
    /// sink produces.
    #[default]
    Sized,
    /// Deflated entries and directories carry general purpose flag bit 3 and
    /// a trailing data descriptor, the way `JarOutputStream` writes them.
    Descriptors { signature: bool },
}

impl JarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory entry. A trailing `/` is appended when missing.
    pub fn dir(mut self, name: &str) -> Self {
        let name = if name.ends_with('/') {
            name.to_owned()
        } else {
            format!("{name}/")
        };
        self.entries.push(Entry::Dir(name));
        self
    }

    /// Adds a deflated file entry.
    pub fn file(mut self, name: &str, bytes: impl AsRef<[u8]>) -> Self {
        self.entries.push(Entry::File {
            name: name.to_owned(),
            bytes: bytes.as_ref().to_vec(),
            method: CompressionMethod::Deflated,
        });
        self
    }

    /// Adds an uncompressed file entry.
    pub fn stored(mut self, name: &str, bytes: impl AsRef<[u8]>) -> Self {
        self.entries.push(Entry::File {
            name: name.to_owned(),
            bytes: bytes.as_ref().to_vec(),
            method: CompressionMethod::Stored,
        });
        self
    }

    /// Adds `<internal_name>.class` holding a minimal class file that declares
    /// `internal_name`.
    pub fn class(self, internal_name: &str) -> Self {
        let entry = format!("{internal_name}.class");
        self.file(&entry, class_bytes(internal_name))
    }

    /// Adds a nested jar under `name`.
    pub fn jar(self, name: &str, nested: JarBuilder) -> Self {
        let bytes = nested.build();
        self.file(name, bytes)
    }

    /// Writes deflated entries with their sizes in a data descriptor after
    /// the content instead of in the local header. Stored entries keep their
    /// sizes up front. Duplicate entry names are allowed in this layout.
    pub fn with_data_descriptors(mut self) -> Self {
        self.layout = Layout::Descriptors { signature: true };
        self
    }

    /// Omits the optional `PK\x07\x08` signature from data descriptors.
    pub fn without_descriptor_signature(mut self) -> Self {
        self.layout = Layout::Descriptors { signature: false };
        self
    }

    pub fn build(&self) -> Vec<u8> {
        match self.layout {
            Layout::Sized => self.build_sized(),
            Layout::Descriptors { signature } => self.build_with_descriptors(signature),
        }
    }

    fn build_sized(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            match entry {
                Entry::Dir(name) => {
                    zip.add_directory(name.as_str(), SimpleFileOptions::default())
                        .expect("add directory");
                }
                Entry::File {
                    name,
                    bytes,
                    method,
                } => {
                    let options = SimpleFileOptions::default().compression_method(*method);
                    zip.start_file(name.as_str(), options).expect("start file");
                    zip.write_all(bytes).expect("write entry");
                }
            }
        }
        zip.finish().expect("finish jar").into_inner()
    }

    fn build_with_descriptors(&self, signature: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        for entry in &self.entries {
            let (name, bytes, stored) = match entry {
                Entry::Dir(name) => (name, &[][..], false),
                Entry::File {
                    name,
                    bytes,
                    method,
                } => (name, bytes.as_slice(), *method == CompressionMethod::Stored),
            };
            let mut crc = Crc::new();
            crc.update(bytes);
            let data = if stored {
                bytes.to_vec()
            } else {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(bytes).expect("deflate entry");
                encoder.finish().expect("finish deflate")
            };
            let record = Record {
                name,
                flags: if stored { 0 } else { 0x0008 },
                method: if stored { 0 } else { 8 },
                crc: crc.sum(),
                compressed: len32(data.len()),
                uncompressed: len32(bytes.len()),
                offset: len32(out.len()),
            };

            record.local_header(&mut out);
            out.extend_from_slice(&data);
            if !stored {
                if signature {
                    out.extend_from_slice(&0x0807_4b50u32.to_le_bytes());
                }
                out.extend_from_slice(&record.crc.to_le_bytes());
                out.extend_from_slice(&record.compressed.to_le_bytes());
                out.extend_from_slice(&record.uncompressed.to_le_bytes());
            }
            record.central_header(&mut central);
        }

        let count = u16::try_from(self.entries.len()).expect("entry count fits a zip");
        let central_offset = len32(out.len());
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&len32(central.len()).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out
    }

    /// Writes the jar to `path`, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(path, self.build()).expect("write fixture jar");
    }
}

struct Record<'a> {
    name: &'a str,
    flags: u16,
    method: u16,
    crc: u32,
    compressed: u32,
    uncompressed: u32,
    offset: u32,
}

impl Record<'_> {
    fn local_header(&self, out: &mut Vec<u8>) {
        let descriptor = self.flags & 0x0008 != 0;
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0x21, 0]);
        for field in [self.crc, self.compressed, self.uncompressed] {
            let field = if descriptor { 0 } else { field };
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&len16(self.name.len()).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
    }

    fn central_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0x21, 0]);
        out.extend_from_slice(&self.crc.to_le_bytes());
        out.extend_from_slice(&self.compressed.to_le_bytes());
        out.extend_from_slice(&self.uncompressed.to_le_bytes());
        out.extend_from_slice(&len16(self.name.len()).to_le_bytes());
        // Extra, comment, disk number, internal and external attributes.
        out.extend_from_slice(&[0; 12]);
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
    }
}

fn len16(len: usize) -> u16 {
    u16::try_from(len).expect("length fits 16 bits")
}

fn len32(len: usize) -> u32 {
    u32::try_from(len).expect("length fits 32 bits")
}
