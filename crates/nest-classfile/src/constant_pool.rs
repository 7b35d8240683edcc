use crate::error::{Error, Result};
use crate::reader::Reader;

#[derive(Debug)]
enum Constant<'a> {
    Utf8(&'a [u8]),
    Class { name_index: u16 },
    /// Any other tag; only its kind is kept for diagnostics.
    Other(&'static str),
    /// Second slot of a long or double.
    Unusable,
}

impl Constant<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Class { .. } => "Class",
            Constant::Other(kind) => kind,
            Constant::Unusable => "unusable",
        }
    }
}

/// The constant pool, borrowing string data from the class bytes.
pub(crate) struct ConstantPool<'a> {
    // Index 0 is a placeholder so JVM indices can be used directly.
    entries: Vec<Constant<'a>>,
}

impl<'a> ConstantPool<'a> {
    pub(crate) fn parse(reader: &mut Reader<'a>) -> Result<Self> {
        let count = reader.read_u2()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        while entries.len() < count as usize {
            let tag = reader.read_u1()?;
            let constant = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    Constant::Utf8(reader.read_bytes(len)?)
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other(if tag == 3 { "Integer" } else { "Float" })
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other(if tag == 5 { "Long" } else { "Double" }));
                    Constant::Unusable
                }
                8 => {
                    reader.skip(2)?;
                    Constant::Other("String")
                }
                9 | 10 | 11 => {
                    reader.skip(4)?;
                    Constant::Other("MemberRef")
                }
                12 => {
                    reader.skip(4)?;
                    Constant::Other("NameAndType")
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other("MethodHandle")
                }
                16 => {
                    reader.skip(2)?;
                    Constant::Other("MethodType")
                }
                17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other("Dynamic")
                }
                19 => {
                    reader.skip(2)?;
                    Constant::Other("Module")
                }
                20 => {
                    reader.skip(2)?;
                    Constant::Other("Package")
                }
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };
            entries.push(constant);
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant<'a>> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(Error::InvalidConstantPoolIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Utf8(bytes) => decode_modified_utf8(bytes),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class { name_index } => self.get_utf8(*name_index),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }
}

/// Decodes the JVM's modified UTF-8: NUL is `C0 80` and supplementary
/// characters are encoded as surrogate pairs of three-byte sequences.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_owned());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            units.push(((b0 & 0x1F) << 6) | b1);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            units.push(((b0 & 0x0F) << 12) | (b1 << 6) | b2);
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }

    String::from_utf16(&units).map_err(|_| Error::InvalidModifiedUtf8)
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(Error::InvalidModifiedUtf8),
    }
}
