#![allow(dead_code)]
//! MKAR: a content-addressed archive container with a per-entry mask
//! transform, optional compression and AES encryption, and PATH/SYMLINK/
//! SCRIPT/NETWORK entry kinds layered over a flat, content-addressed FS
//! table.

mod bitio;
mod callback;
mod compress;
mod crypto;
mod entry;
mod error;
mod fstable;
mod mask;
mod network;
mod pack;
pub mod platform;
mod script;
mod treap;
mod unpack;

pub use callback::{NoPasswordCallback, PasswordCallback, PasswordTable, SinglePassword};
pub use entry::{
    PROP_COMPRESSED, PROP_ENCRYPTED, PROP_NETWORK, PROP_PATH, PROP_ROOTDIR, PROP_SCRIPT,
    PROP_SYMLINK,
};
pub use error::Error;
pub use mask::Version;
pub use network::{Fetcher, NoopFetcher};
#[cfg(feature = "network")]
pub use network::UreqFetcher;
pub use pack::{ArchiveBuilder, ArchiveWriter};
pub use script::{NoopScriptRunner, ScriptRunner};
pub use unpack::Archive;

/// Four-byte magic at the start of every container: `b"MKAR"` read as a
/// little-endian `u32` (byte 0 is `M`, matching the on-disk byte order).
pub const MAGIC: u32 = 0x52414B4D;

/// Implementation tag recorded in the header, identifying this crate's
/// on-disk dialect.
pub const IMPL_TAG: u16 = 0x2009;

/// Highest standard version this crate can read or write.
pub const MAX_VERSION: u16 = 2;

/// Fixed 16-byte container header: magic, impl tag, standard version, and
/// the byte offset of the FS table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub standard_version: u16,
    pub fs_table_offset: u64,
}

impl Header {
    pub const SIZE: u64 = 16;

    pub fn read<R: std::io::Read>(reader: &mut R) -> Result<Self, Error> {
        use byteorder::{ReadBytesExt, LE};
        let magic = reader.read_u32::<LE>()?;
        if magic != MAGIC {
            return Err(Error::Magic(magic));
        }
        let impl_tag = reader.read_u16::<LE>()?;
        if impl_tag != IMPL_TAG {
            return Err(Error::ImplTag(impl_tag));
        }
        let standard_version = reader.read_u16::<LE>()?;
        if standard_version > MAX_VERSION {
            return Err(Error::StandardVersion(standard_version));
        }
        let fs_table_offset = reader.read_u64::<LE>()?;
        Ok(Header {
            standard_version,
            fs_table_offset,
        })
    }

    pub fn write<W: std::io::Write>(&self, writer: &mut W) -> Result<(), Error> {
        use byteorder::{WriteBytesExt, LE};
        writer.write_u32::<LE>(MAGIC)?;
        writer.write_u16::<LE>(IMPL_TAG)?;
        writer.write_u16::<LE>(self.standard_version)?;
        writer.write_u64::<LE>(self.fs_table_offset)?;
        Ok(())
    }

    pub fn version(&self) -> Version {
        Version::from_u16(self.standard_version)
            .expect("header validated standard_version <= MAX_VERSION")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let header = Header {
            standard_version: 2,
            fs_table_offset: 123_456,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, Header::SIZE);
        let read_back = Header::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut buf = vec![0u8; 16];
        buf[0] = 0xFF;
        assert!(matches!(
            Header::read(&mut Cursor::new(buf)),
            Err(Error::Magic(_))
        ));
    }
}
