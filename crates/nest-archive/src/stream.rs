//! Sequential reading of zip local file headers.
//!
//! Archives are consumed strictly front to back, so the central directory is
//! never consulted: each entry is described by its local header alone. Deflated
//! entries whose sizes trail the data (general purpose flag bit 3) are read by
//! decompressing to the end of the deflate stream and then consuming the data
//! descriptor that follows it.

use std::io::{self, BufRead, Read, Take};

use flate2::bufread::DeflateDecoder;
use flate2::Crc;

use crate::address::ArchiveAddress;
use crate::error::{ArchiveError, Result};

/// Upper bound on capacity reserved from an entry's declared size; the header
/// value is untrusted.
pub(crate) const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

const SIG_LOCAL_HEADER: u32 = 0x0403_4b50;
const SIG_CENTRAL_HEADER: u32 = 0x0201_4b50;
const SIG_END_OF_CENTRAL_DIR: u32 = 0x0605_4b50;
const SIG_ZIP64_END_OF_CENTRAL_DIR: u32 = 0x0606_4b50;
const SIG_DATA_DESCRIPTOR: u32 = 0x0807_4b50;

/// Fixed part of a local file header after its signature.
const LOCAL_HEADER_LEN: usize = 26;

const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;

/// One entry of a sequential zip stream, positioned at the start of its
/// content.
///
/// The entry borrows the archive stream. Callers that want to continue to the
/// next header must call [`StreamEntry::finish`], which drains unread content,
/// consumes a trailing data descriptor and checks the CRC.
pub(crate) struct StreamEntry<'a> {
    name: String,
    declared: Declared,
    crc: Crc,
    produced: u64,
    body: Body<'a>,
}

/// What the local header says about the content, if anything.
#[derive(Clone, Copy)]
enum Declared {
    Sizes { crc: u32, size: u64 },
    Trailing { zip64: bool },
}

enum Body<'a> {
    Stored(Take<&'a mut dyn BufRead>),
    Deflated(DeflateDecoder<Take<&'a mut dyn BufRead>>),
    DeflatedToEnd(DeflateDecoder<&'a mut dyn BufRead>),
}

impl Read for Body<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Stored(inner) => inner.read(buf),
            Body::Deflated(inner) => inner.read(buf),
            Body::DeflatedToEnd(inner) => inner.read(buf),
        }
    }
}

impl StreamEntry<'_> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Reads the remaining content and moves the stream past this entry.
    pub(crate) fn into_bytes(mut self, archive: &ArchiveAddress) -> Result<Vec<u8>> {
        let hint = match self.declared {
            Declared::Sizes { size, .. } => size.min(MAX_PREALLOC) as usize,
            Declared::Trailing { .. } => 0,
        };
        let mut bytes = Vec::with_capacity(hint);
        self.read_to_end(&mut bytes)
            .map_err(|err| ArchiveError::read(&archive.join(&self.name), err))?;
        self.finish(archive)?;
        Ok(bytes)
    }

    /// Skips whatever content is left, leaving the stream at the next header.
    pub(crate) fn finish(mut self, archive: &ArchiveAddress) -> Result<()> {
        let entry = archive.join(&self.name);
        io::copy(&mut self, &mut io::sink()).map_err(|err| ArchiveError::read(&entry, err))?;

        let (crc, size) = match (self.body, self.declared) {
            (Body::Stored(_), Declared::Sizes { crc, size }) => (crc, size),
            (Body::Deflated(decoder), Declared::Sizes { crc, size }) => {
                // Padding after the final deflate block still belongs to this entry.
                let mut rest = decoder.into_inner();
                io::copy(&mut rest, &mut io::sink())
                    .map_err(|err| ArchiveError::read(&entry, err))?;
                (crc, size)
            }
            (Body::DeflatedToEnd(decoder), Declared::Trailing { zip64 }) => {
                read_descriptor(decoder.into_inner(), zip64)
                    .map_err(|err| ArchiveError::read(&entry, err))?
            }
            _ => return Err(ArchiveError::malformed(&entry, "inconsistent entry layout")),
        };

        if self.produced != size {
            return Err(ArchiveError::malformed(
                &entry,
                format!("expected {size} bytes, read {}", self.produced),
            ));
        }
        if self.crc.sum() != crc {
            return Err(ArchiveError::malformed(&entry, "CRC-32 mismatch"));
        }
        Ok(())
    }
}

impl Read for StreamEntry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.body.read(buf)?;
        self.crc.update(&buf[..n]);
        self.produced += n as u64;
        Ok(n)
    }
}

/// Advances to the next local file header of a sequential zip stream.
///
/// Returns `Ok(None)` at a clean end of input or once the central directory or
/// end-of-central-directory record is reached, which is all an empty archive
/// contains.
pub(crate) fn next_entry<'a>(
    reader: &'a mut dyn BufRead,
    archive: &ArchiveAddress,
) -> Result<Option<StreamEntry<'a>>> {
    let signature =
        read_signature(&mut *reader).map_err(|err| ArchiveError::read(archive, err))?;
    match signature {
        None => return Ok(None),
        Some(SIG_LOCAL_HEADER) => {}
        Some(SIG_CENTRAL_HEADER | SIG_END_OF_CENTRAL_DIR | SIG_ZIP64_END_OF_CENTRAL_DIR) => {
            return Ok(None)
        }
        Some(other) => {
            return Err(ArchiveError::malformed(
                archive,
                format!("unexpected signature {other:#010x}"),
            ))
        }
    }

    let mut header = [0u8; LOCAL_HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|err| ArchiveError::read(archive, err))?;
    let flags = le_u16(&header[2..4]);
    let method = le_u16(&header[4..6]);
    let crc = le_u32(&header[10..14]);
    let compressed = le_u32(&header[14..18]);
    let uncompressed = le_u32(&header[18..22]);
    let name_len = usize::from(le_u16(&header[22..24]));
    let extra_len = usize::from(le_u16(&header[24..26]));

    let mut name = vec![0u8; name_len];
    reader
        .read_exact(&mut name)
        .map_err(|err| ArchiveError::read(archive, err))?;
    let name = String::from_utf8(name)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());

    let mut extra = vec![0u8; extra_len];
    reader
        .read_exact(&mut extra)
        .map_err(|err| ArchiveError::read(&archive.join(&name), err))?;
    let zip64 = zip64_sizes(&extra, compressed, uncompressed);
    let (compressed, uncompressed) = match zip64 {
        Some(sizes) => sizes,
        None => (u64::from(compressed), u64::from(uncompressed)),
    };

    if flags & FLAG_ENCRYPTED != 0 {
        return Err(ArchiveError::malformed(
            &archive.join(&name),
            "encrypted entries are not supported",
        ));
    }

    let trailing = flags & FLAG_DATA_DESCRIPTOR != 0;
    let (declared, body) = match (method, trailing) {
        (METHOD_STORED, false) => (
            Declared::Sizes {
                crc,
                size: uncompressed,
            },
            Body::Stored(Read::take(reader, compressed)),
        ),
        (METHOD_STORED, true) => {
            return Err(ArchiveError::malformed(
                &archive.join(&name),
                "stored entry has no size in its local header",
            ))
        }
        (METHOD_DEFLATED, false) => (
            Declared::Sizes {
                crc,
                size: uncompressed,
            },
            Body::Deflated(DeflateDecoder::new(Read::take(reader, compressed))),
        ),
        (METHOD_DEFLATED, true) => (
            Declared::Trailing {
                zip64: zip64.is_some(),
            },
            Body::DeflatedToEnd(DeflateDecoder::new(reader)),
        ),
        (other, _) => {
            return Err(ArchiveError::malformed(
                &archive.join(&name),
                format!("unsupported compression method {other}"),
            ))
        }
    };

    Ok(Some(StreamEntry {
        name,
        declared,
        crc: Crc::new(),
        produced: 0,
        body,
    }))
}

/// Reads a 4-byte signature, or `None` when the stream ends before it.
fn read_signature(reader: &mut dyn BufRead) -> io::Result<Option<u32>> {
    let mut word = [0u8; 4];
    let mut filled = 0;
    while filled < word.len() {
        match reader.read(&mut word[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(Some(u32::from_le_bytes(word)))
}

/// Reads the data descriptor after a bit-3 entry. Its signature is optional.
fn read_descriptor(reader: &mut dyn BufRead, zip64: bool) -> io::Result<(u32, u64)> {
    let mut word = [0u8; 4];
    reader.read_exact(&mut word)?;
    if u32::from_le_bytes(word) == SIG_DATA_DESCRIPTOR {
        reader.read_exact(&mut word)?;
    }
    let crc = u32::from_le_bytes(word);

    let uncompressed = if zip64 {
        let mut sizes = [0u8; 16];
        reader.read_exact(&mut sizes)?;
        le_u64(&sizes[8..16])
    } else {
        let mut sizes = [0u8; 8];
        reader.read_exact(&mut sizes)?;
        u64::from(le_u32(&sizes[4..8]))
    };
    Ok((crc, uncompressed))
}

/// Sizes from a zip64 extended-information field, as (compressed, uncompressed).
///
/// Only 32-bit fields holding the sentinel are present in the extra record,
/// uncompressed first.
fn zip64_sizes(extra: &[u8], compressed: u32, uncompressed: u32) -> Option<(u64, u64)> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let id = le_u16(&rest[0..2]);
        let len = usize::from(le_u16(&rest[2..4]));
        let data = rest.get(4..4 + len)?;
        if id == ZIP64_EXTRA_ID {
            let mut fields = data.chunks_exact(8).map(le_u64);
            let uncompressed = if uncompressed == ZIP64_SENTINEL {
                fields.next()?
            } else {
                u64::from(uncompressed)
            };
            let compressed = if compressed == ZIP64_SENTINEL {
                fields.next()?
            } else {
                u64::from(compressed)
            };
            return Some((compressed, uncompressed));
        }
        rest = &rest[4 + len..];
    }
    None
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn le_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}
