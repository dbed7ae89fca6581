use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{MetadataError, Result};

/// One logical slot of the constant pool.
///
/// Only UTF8 text and two-byte references into UTF8 slots are retained;
/// everything else is decoded for its byte width and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEntry {
    Utf8(String),
    /// Class, string and name-and-type entries: an index of a UTF8 slot.
    Indirect(u16),
    /// Numeric literals, method handles and the like, plus the unusable
    /// second slot of 8-byte literals.
    Skipped,
}

/// The constant pool of a single class file.
///
/// Slots are 1-based; slot 0 is unused. Long and double literals consume
/// two consecutive slots, the second of which stays empty.
#[derive(Debug)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    /// Decodes the pool from a cursor positioned at the 2-byte entry count.
    ///
    /// An unrecognized tag is a hard failure for the whole unit: entry
    /// lengths are tag-dependent, so there is no safe way to skip one.
    pub fn read(r: &mut Cursor<&[u8]>) -> Result<ConstantPool> {
        let count = r.read_u16::<BigEndian>().map_err(truncated)? as usize;
        let mut entries = vec![PoolEntry::Skipped; count.max(1)];

        let mut slot = 1;
        while slot < count {
            let tag = r.read_u8().map_err(truncated)?;
            match tag {
                1 => {
                    let len = r.read_u16::<BigEndian>().map_err(truncated)? as usize;
                    let mut bytes = vec![0u8; len];
                    r.read_exact(&mut bytes).map_err(truncated)?;
                    // Pool text is modified UTF-8: supplementary
                    // characters arrive as CESU-8 surrogate pairs and
                    // NUL as the two-byte form.
                    let text = cesu8::from_java_cesu8(&bytes).map_err(|_| {
                        MetadataError::MalformedUnit(format!(
                            "constant pool slot {slot} holds invalid modified UTF8"
                        ))
                    })?;
                    entries[slot] = PoolEntry::Utf8(text.into_owned());
                }
                3 | 4 => skip(r, 4)?,
                5 | 6 => {
                    // 8-byte literal: burns this slot and the next one.
                    skip(r, 8)?;
                    slot += 1;
                }
                7 | 8 => {
                    entries[slot] = PoolEntry::Indirect(r.read_u16::<BigEndian>().map_err(truncated)?);
                }
                9..=12 => {
                    skip(r, 2)?;
                    entries[slot] = PoolEntry::Indirect(r.read_u16::<BigEndian>().map_err(truncated)?);
                }
                15 => skip(r, 3)?,
                16 => skip(r, 2)?,
                18 => skip(r, 4)?,
                other => {
                    return Err(MetadataError::MalformedUnit(format!(
                        "unknown constant pool tag {other} in slot {slot}"
                    )));
                }
            }
            slot += 1;
        }

        Ok(ConstantPool { entries })
    }

    /// Resolves a slot to UTF8 text, following one level of indirection.
    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.entries.get(index as usize)? {
            PoolEntry::Utf8(text) => Some(text),
            PoolEntry::Indirect(target) => match self.entries.get(*target as usize)? {
                PoolEntry::Utf8(text) => Some(text),
                _ => None,
            },
            PoolEntry::Skipped => None,
        }
    }

    /// Resolves a slot like [`utf8`](Self::utf8) but errors on failure,
    /// for positions where the format requires a resolvable name.
    pub fn expect_utf8(&self, index: u16) -> Result<&str> {
        self.utf8(index).ok_or_else(|| {
            MetadataError::MalformedUnit(format!(
                "constant pool slot {index} does not resolve to UTF8 text"
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

fn skip(r: &mut Cursor<&[u8]>, bytes: u64) -> Result<()> {
    let pos = r.seek(SeekFrom::Current(bytes as i64)).map_err(truncated)?;
    if pos > r.get_ref().len() as u64 {
        return Err(MetadataError::MalformedUnit(
            "constant pool entry runs past end of stream".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn truncated(err: std::io::Error) -> MetadataError {
    MetadataError::MalformedUnit(format!("unexpected end of stream: {err}"))
}
