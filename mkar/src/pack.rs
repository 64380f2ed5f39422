//! Packing a host filesystem tree into an MKAR container.
//!
//! `ArchiveBuilder` picks the standard version up front (it is fixed per
//! archive, not negotiated per entry), then hands off to `ArchiveWriter`,
//! which walks the tree, optionally compresses and encrypts each entry's
//! payload, masks it three times, and appends it to the stream.

use crate::entry::{
    self, encode_network_payload, encode_path_payload, encode_script_payload,
    encode_symlink_payload, Prop, PROP_COMPRESSED, PROP_ENCRYPTED, PROP_PATH, PROP_ROOTDIR,
    PROP_SCRIPT, PROP_SYMLINK,
};
use crate::fstable::{write_fs_table, FsEntry};
use crate::mask::Mask;
use crate::{compress, crypto, Error, Header, Version};
use std::collections::{HashMap, VecDeque};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Collapses `.`/`..` segments and normalizes separators to `/`, the same
/// key space `EArchive`'s `lexically_normal().generic_u8string()` used for
/// its prop/kix/exec-priority maps.
fn normalize(path: &Path) -> String {
    let mut out: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::Normal(seg) => out.push(seg.to_string_lossy().into_owned()),
            std::path::Component::RootDir | std::path::Component::Prefix(_) => {}
        }
    }
    out.join("/")
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Configures the archive's standard version before handing off to a writer.
/// Mirrors `PakBuilder`'s role as the pre-write configuration step.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveBuilder {
    version: Version,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    /// Defaults to the newest standard version (`2`) this crate writes;
    /// readers still accept `0` and `1`.
    pub fn new() -> Self {
        ArchiveBuilder {
            version: Version::V2,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn writer<W: Write + Seek>(self, mut writer: W) -> Result<ArchiveWriter<W>, Error> {
        let header = Header {
            standard_version: self.version.as_u16(),
            fs_table_offset: 0,
        };
        header.write(&mut writer)?;
        Ok(ArchiveWriter {
            writer,
            version: self.version,
            file_count: 0,
            prev_size: Header::SIZE,
            file_names: Vec::new(),
            file_offsets: Vec::new(),
            subs: Vec::new(),
            props: HashMap::new(),
            keys: HashMap::new(),
            enckix: HashMap::new(),
            execpri: HashMap::new(),
            pth2fsid: HashMap::new(),
            routines: VecDeque::new(),
            mask_prop: 0,
        })
    }
}

/// A container under construction. Owns the destination writer; entries are
/// queued with [`ArchiveWriter::add_routine`] and materialized by
/// [`ArchiveWriter::run_routines`], mirroring `EArchive`'s two-phase queue
/// (register the tree, then walk and write it).
pub struct ArchiveWriter<W: Write + Seek> {
    writer: W,
    version: Version,
    file_count: u32,
    prev_size: u64,
    file_names: Vec<String>,
    file_offsets: Vec<u64>,
    subs: Vec<Vec<u32>>,
    props: HashMap<String, u8>,
    keys: HashMap<u32, String>,
    enckix: HashMap<String, u32>,
    execpri: HashMap<String, u32>,
    pth2fsid: HashMap<String, u32>,
    routines: VecDeque<PathBuf>,
    mask_prop: u8,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// ORs `prop` into the flags recorded for `path`. Call before
    /// [`run_routines`](Self::run_routines); flags that apply to every entry
    /// regardless of path use [`mask_prop`](Self::mask_prop) instead.
    pub fn add_prop(&mut self, path: &Path, prop: u8) {
        *self.props.entry(normalize(path)).or_insert(0) |= prop;
    }

    /// ORs `prop` into every entry this writer produces.
    pub fn mask_prop(&mut self, prop: u8) {
        self.mask_prop |= prop;
    }

    /// Registers the password for key index `kix`.
    pub fn set_key(&mut self, kix: u32, password: impl Into<String>) -> Result<(), Error> {
        if self.keys.contains_key(&kix) {
            return Err(Error::DuplicateKey(kix));
        }
        self.keys.insert(kix, password.into());
        Ok(())
    }

    /// Assigns which key index encrypts `path`'s entry (only meaningful if
    /// the entry also carries `PROP_ENCRYPTED`, e.g. via [`add_prop`](Self::add_prop)).
    pub fn set_kix(&mut self, path: &Path, kix: u32) -> Result<(), Error> {
        let key = normalize(path);
        if self.enckix.contains_key(&key) {
            return Err(Error::Other(format!(
                "duplicate key index assignment for {key}"
            )));
        }
        self.enckix.insert(key, kix);
        Ok(())
    }

    /// Assigns `path`'s SCRIPT execution priority (lower runs first inline;
    /// see [`crate::unpack::Archive::post_extract`] for the deferred order).
    pub fn set_exec_pri(&mut self, path: &Path, pri: u32) -> Result<(), Error> {
        let key = normalize(path);
        if self.execpri.contains_key(&key) {
            return Err(Error::DuplicateExecPriority(key));
        }
        self.execpri.insert(key, pri);
        Ok(())
    }

    /// Registers `path` (file, directory, or prop-tagged special entry) for
    /// inclusion, recursing into directories and assigning each discovered
    /// entry the next fsid in pre-order. `is_root` marks `path` as an
    /// extraction root (ROOTDIR prop).
    pub fn add_routine(&mut self, path: &Path, is_root: bool) -> Result<(), Error> {
        self.routines.push_back(path.to_path_buf());
        if is_root {
            self.add_prop(path, PROP_ROOTDIR);
        }
        let self_id = self.file_count;
        self.file_count += 1;
        self.subs.push(Vec::new());

        let key = normalize(path);
        if self.pth2fsid.contains_key(&key) {
            return Err(Error::DuplicatePath(key));
        }
        self.pth2fsid.insert(key, self_id);

        if path.is_dir() {
            self.add_prop(path, PROP_PATH);
            let mut child_paths: Vec<PathBuf> = std::fs::read_dir(path)?
                .map(|e| e.map(|e| e.path()))
                .collect::<Result<_, std::io::Error>>()?;
            child_paths.sort();
            for child in child_paths {
                self.subs[self_id as usize].push(self.file_count);
                self.add_routine(&child, false)?;
            }
        }
        Ok(())
    }

    /// Writes every queued entry's content, in the order
    /// [`add_routine`](Self::add_routine) discovered it.
    pub fn run_routines(&mut self) -> Result<(), Error> {
        while let Some(path) = self.routines.pop_front() {
            let fsid = *self
                .pth2fsid
                .get(&normalize(&path))
                .expect("queued path was assigned an fsid by add_routine");
            self.add_path(&path, fsid)?;
        }
        Ok(())
    }

    fn add_path(&mut self, path: &Path, fsid: u32) -> Result<(), Error> {
        let key = normalize(path);
        let mut prop = self.props.get(&key).copied().unwrap_or(0);
        prop |= self.mask_prop;
        let prop = Prop(prop);

        let mask = entry::write_prefix(&mut self.writer, prop, self.version)?;

        let mut content = if prop.is_path() {
            encode_path_payload(&self.subs[fsid as usize])
        } else {
            let raw = std::fs::read(path)?;
            if prop.is_symlink() {
                let target_text = String::from_utf8(raw)?;
                let target_key = normalize(Path::new(target_text.trim()));
                let target_fsid = self
                    .pth2fsid
                    .get(&target_key)
                    .copied()
                    .ok_or_else(|| Error::SymlinkTargetNotFound(target_key.clone()))?;
                encode_symlink_payload(target_fsid)
            } else if prop.is_script() {
                let pri = self
                    .execpri
                    .get(&key)
                    .copied()
                    .ok_or_else(|| Error::MissingExecPriority(key.clone()))?;
                let source = String::from_utf8(raw)?;
                encode_script_payload(pri, &source)
            } else if prop.is_network() {
                encode_network_payload(&String::from_utf8(raw)?)
            } else {
                raw
            }
        };

        if prop.is_compressed() {
            content = compress::compress(&content)?;
        }
        if prop.is_encrypted() {
            let kix = self.enckix.get(&key).copied().unwrap_or(0);
            let password = self
                .keys
                .get(&kix)
                .ok_or(Error::MissingPassword(kix))?
                .clone();
            content = crypto::encrypt(&content, kix, &password);
        }

        crate::mask::mask_triple(&mask, &mut content);
        self.writer.write_all(&content)?;

        self.file_names.push(base_name(path));
        self.file_offsets.push(self.prev_size);
        self.prev_size += entry::PREFIX_SIZE + content.len() as u64;

        Ok(())
    }

    /// Writes the FS table and back-patches the header's FST offset field.
    /// Returns the inner writer.
    pub fn finish(mut self) -> Result<W, Error> {
        let entries: Vec<FsEntry> = self
            .file_names
            .iter()
            .zip(self.file_offsets.iter())
            .map(|(name, &offset)| FsEntry {
                name: name.clone(),
                offset,
            })
            .collect();
        write_fs_table(&mut self.writer, &entries)?;

        self.writer.seek(SeekFrom::Start(8))?;
        use byteorder::{WriteBytesExt, LE};
        self.writer.write_u64::<LE>(self.prev_size)?;
        self.writer.seek(SeekFrom::End(0))?;

        Ok(self.writer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::unpack::Archive;
    use std::io::Cursor;

    fn build_tree(dir: &Path) {
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("a.txt"), b"hello world").unwrap();
        std::fs::write(dir.join("sub/b.txt"), b"nested content").unwrap();
    }

    #[test]
    fn pack_then_unpack_round_trips_a_tree() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(tmp.path());

        let mut writer = ArchiveBuilder::new().writer(Cursor::new(Vec::new())).unwrap();
        writer.add_routine(tmp.path(), true).unwrap();
        writer.run_routines().unwrap();
        let buf = writer.finish().unwrap().into_inner();

        let mut archive = Archive::open(Cursor::new(buf)).unwrap();
        archive.load_fs_table().unwrap();
        assert_eq!(archive.fs_count(), 3);
    }

    #[test]
    fn duplicate_key_registration_is_rejected() {
        let mut writer = ArchiveBuilder::new().writer(Cursor::new(Vec::new())).unwrap();
        writer.set_key(1, "a").unwrap();
        assert!(matches!(writer.set_key(1, "b"), Err(Error::DuplicateKey(1))));
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize(Path::new("a/./b/../c")), "a/c");
    }
}
