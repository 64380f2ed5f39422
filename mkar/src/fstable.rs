//! The FS table: an ordered list of `(name, offset)` pairs terminated by a
//! sentinel name length, resolving each fsid's byte offset into the entry
//! stream.

use crate::Error;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{self, Read, Write};

/// Terminates the table: no real name is this long.
const SENTINEL_NAME_LEN: u16 = 0x8000;

#[derive(Debug, Clone)]
pub struct FsEntry {
    pub name: String,
    pub offset: u64,
}

pub fn write_fs_table<W: Write>(writer: &mut W, entries: &[FsEntry]) -> io::Result<()> {
    for entry in entries {
        let name_bytes = entry.name.as_bytes();
        debug_assert!(name_bytes.len() < SENTINEL_NAME_LEN as usize);
        writer.write_u16::<LE>(name_bytes.len() as u16)?;
        writer.write_all(name_bytes)?;
        writer.write_u64::<LE>(entry.offset)?;
    }
    writer.write_u16::<LE>(SENTINEL_NAME_LEN)?;
    Ok(())
}

pub fn read_fs_table<R: Read>(reader: &mut R) -> Result<Vec<FsEntry>, Error> {
    let mut entries = Vec::new();
    loop {
        let name_len = reader.read_u16::<LE>()?;
        if name_len == SENTINEL_NAME_LEN {
            break;
        }
        let mut name_bytes = vec![0u8; name_len as usize];
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes)?;
        let offset = reader.read_u64::<LE>()?;
        entries.push(FsEntry { name, offset });
    }
    Ok(entries)
}

/// Derives each fsid's payload size from consecutive offsets, subtracting
/// the fixed prefix overhead.
pub fn derive_sizes(entries: &[FsEntry], data_end: u64, prefix_size: u64) -> Vec<u64> {
    let mut sizes = Vec::with_capacity(entries.len());
    for i in 0..entries.len() {
        let next = entries
            .get(i + 1)
            .map(|e| e.offset)
            .unwrap_or(data_end);
        sizes.push(next - entries[i].offset - prefix_size);
    }
    sizes
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fs_table_round_trips() {
        let entries = vec![
            FsEntry {
                name: "root".into(),
                offset: 16,
            },
            FsEntry {
                name: "root/a.txt".into(),
                offset: 241,
            },
            FsEntry {
                name: "root/b.bin".into(),
                offset: 500,
            },
        ];
        let mut buf = Vec::new();
        write_fs_table(&mut buf, &entries).unwrap();
        let mut cursor = Cursor::new(buf);
        let read_back = read_fs_table(&mut cursor).unwrap();
        assert_eq!(read_back.len(), entries.len());
        for (a, b) in entries.iter().zip(read_back.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.offset, b.offset);
        }
    }

    #[test]
    fn derive_sizes_subtracts_prefix_overhead() {
        let entries = vec![
            FsEntry {
                name: "a".into(),
                offset: 100,
            },
            FsEntry {
                name: "b".into(),
                offset: 400,
            },
        ];
        let sizes = derive_sizes(&entries, 1000, 225);
        assert_eq!(sizes, vec![400 - 100 - 225, 1000 - 400 - 225]);
    }
}
