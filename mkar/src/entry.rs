//! Per-entry prefix (prop flags + mask permutation) and payload codecs for
//! the non-plain-file prop kinds (PATH, SYMLINK, SCRIPT, NETWORK).

use crate::bitio::{BitReader, BitWriter};
use crate::mask::{Mask, Version};
use crate::Error;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{self, Read, Write};

pub const PROP_NETWORK: u8 = 0x01;
pub const PROP_SCRIPT: u8 = 0x02;
pub const PROP_PATH: u8 = 0x04;
pub const PROP_SYMLINK: u8 = 0x08;
pub const PROP_ROOTDIR: u8 = 0x10;
pub const PROP_COMPRESSED: u8 = 0x20;
pub const PROP_ENCRYPTED: u8 = 0x40;

const PROP_BITS: u8 = 7;

/// Fixed per-entry prefix size: 7 prop bits plus a serialized permutation of
/// `0..=255`, sharing one bit-aligned stream flushed once at the end.
pub const PREFIX_SIZE: u64 = 225;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prop(pub u8);

impl Prop {
    pub fn is_encrypted(self) -> bool {
        self.0 & PROP_ENCRYPTED != 0
    }
    pub fn is_compressed(self) -> bool {
        self.0 & PROP_COMPRESSED != 0
    }
    pub fn is_rootdir(self) -> bool {
        self.0 & PROP_ROOTDIR != 0
    }
    pub fn is_symlink(self) -> bool {
        self.0 & PROP_SYMLINK != 0
    }
    pub fn is_path(self) -> bool {
        self.0 & PROP_PATH != 0
    }
    pub fn is_script(self) -> bool {
        self.0 & PROP_SCRIPT != 0
    }
    pub fn is_network(self) -> bool {
        self.0 & PROP_NETWORK != 0
    }
}

/// Writes the 225-byte prefix (prop bits followed by a fresh permutation for
/// `version`) and returns the generated [`Mask`].
pub fn write_prefix<W: Write>(inner: &mut W, prop: Prop, version: Version) -> io::Result<Mask> {
    let mut writer = BitWriter::new(inner);
    writer.write_bits(prop.0 as u16, PROP_BITS)?;
    let mask = Mask::generate(version, &mut writer)?;
    writer.finish()?;
    Ok(mask)
}

/// Reads the 225-byte prefix, returning the prop byte and the decoded
/// [`Mask`].
pub fn read_prefix<R: Read>(inner: &mut R, version: Version) -> io::Result<(Prop, Mask)> {
    let mut reader = BitReader::new(inner);
    let prop = reader.read_bits(PROP_BITS)? as u8;
    let mask = Mask::read(version, &mut reader)?;
    Ok((Prop(prop), mask))
}

/// Encodes a PATH (directory) payload: child fsid count followed by the
/// fsids themselves, little-endian.
pub fn encode_path_payload(children: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + children.len() * 4);
    out.write_u32::<LE>(children.len() as u32).unwrap();
    for &fsid in children {
        out.write_u32::<LE>(fsid).unwrap();
    }
    out
}

pub fn decode_path_payload(mut data: &[u8]) -> Result<Vec<u32>, Error> {
    let count = data.read_u32::<LE>()?;
    let expected = 4 + count as usize * 4;
    let got = data.len() + 4;
    if got != expected {
        return Err(Error::InvalidPathPayload {
            got,
            expected,
            count,
        });
    }
    let mut children = Vec::with_capacity(count as usize);
    for _ in 0..count {
        children.push(data.read_u32::<LE>()?);
    }
    Ok(children)
}

/// Encodes a SYMLINK payload: the fsid of the link's target entry.
pub fn encode_symlink_payload(target_fsid: u32) -> Vec<u8> {
    target_fsid.to_le_bytes().to_vec()
}

pub fn decode_symlink_payload(data: &[u8]) -> Result<u32, Error> {
    if data.len() != 4 {
        return Err(Error::InvalidSymlinkPayload(data.len()));
    }
    Ok(u32::from_le_bytes(data.try_into().unwrap()))
}

/// Encodes a SCRIPT payload: a priority (lower runs first) followed by the
/// UTF-8 script source.
pub fn encode_script_payload(priority: u32, source: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + source.len());
    out.write_u32::<LE>(priority).unwrap();
    out.extend_from_slice(source.as_bytes());
    out
}

pub fn decode_script_payload(mut data: &[u8]) -> Result<(u32, String), Error> {
    let priority = data.read_u32::<LE>()?;
    let source = String::from_utf8(data.to_vec())?;
    Ok((priority, source))
}

/// Encodes a NETWORK payload: a URL with surrounding whitespace trimmed.
pub fn encode_network_payload(url: &str) -> Vec<u8> {
    url.trim().as_bytes().to_vec()
}

pub fn decode_network_payload(data: &[u8]) -> Result<String, Error> {
    Ok(String::from_utf8(data.to_vec())?.trim().to_string())
}
