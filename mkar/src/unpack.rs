//! Reading and extracting an MKAR container.
//!
//! Header parse, FS table load, ROOTDIR scan, then per-fsid decode (unmask,
//! decrypt, decompress) dispatched by prop byte. `extract` walks an explicit
//! stack rather than recursing, and the password/script/network
//! collaborators are trait objects held on `Archive` rather than globals.

use crate::callback::{NoPasswordCallback, PasswordCallback};
use crate::entry::{
    self, decode_network_payload, decode_path_payload, decode_script_payload,
    decode_symlink_payload, Prop,
};
use crate::fstable::read_fs_table;
use crate::mask::unmask_triple;
use crate::network::{Fetcher, NoopFetcher};
use crate::script::{NoopScriptRunner, ScriptRunner};
use crate::{compress, crypto, Error, Header, Version};
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

fn normalize_segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s.to_string()),
        }
    }
    out
}

/// A deferred SCRIPT task: priority, decoded source, and the logical title
/// (extracted path) it was written to.
struct Task {
    priority: u32,
    source: String,
    title: String,
}

/// An opened MKAR container, ready to have its FS table loaded and entries
/// extracted.
pub struct Archive<R> {
    reader: R,
    version: Version,
    fst_offset: u64,
    file_count: u32,
    file_names: Vec<String>,
    file_offsets: Vec<u64>,
    file_sizes: Vec<u64>,
    rootdir: Vec<u32>,
    keys: HashMap<u32, String>,
    safe_mode: bool,
    password_cb: Box<dyn PasswordCallback>,
    script_runner: Box<dyn ScriptRunner>,
    fetcher: Box<dyn Fetcher>,
    deferred_scripts: Vec<Task>,
    routines: VecDeque<(u32, PathBuf)>,
}

impl<R: Read + Seek> Archive<R> {
    /// Parses the 16-byte header and returns an archive with no FS table
    /// loaded yet; call [`load_fs_table`](Self::load_fs_table) next.
    pub fn open(mut reader: R) -> Result<Self, Error> {
        let header = Header::read(&mut reader)?;
        Ok(Archive {
            reader,
            version: header.version(),
            fst_offset: header.fs_table_offset,
            file_count: 0,
            file_names: Vec::new(),
            file_offsets: Vec::new(),
            file_sizes: Vec::new(),
            rootdir: Vec::new(),
            keys: HashMap::new(),
            safe_mode: false,
            password_cb: Box::new(NoPasswordCallback),
            script_runner: Box::new(NoopScriptRunner),
            fetcher: Box::new(NoopFetcher),
            deferred_scripts: Vec::new(),
            routines: VecDeque::new(),
        })
    }

    pub fn with_password_callback(mut self, cb: Box<dyn PasswordCallback>) -> Self {
        self.password_cb = cb;
        self
    }

    pub fn with_script_runner(mut self, runner: Box<dyn ScriptRunner>) -> Self {
        self.script_runner = runner;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Enables safe mode: SCRIPT entries are written as plain files (with
    /// their priority prefix stripped, never executed) and NETWORK entries
    /// are never fetched, written as their raw recorded bytes instead.
    pub fn safe(mut self, safe: bool) -> Self {
        self.safe_mode = safe;
        self
    }

    pub fn set_key(&mut self, kix: u32, password: impl Into<String>) {
        self.keys.insert(kix, password.into());
    }

    /// Reads the FS table at the header's recorded offset and derives each
    /// fsid's payload size from consecutive offsets.
    pub fn load_fs_table(&mut self) -> Result<(), Error> {
        self.reader.seek(SeekFrom::Start(self.fst_offset))?;
        let entries = read_fs_table(&mut self.reader)?;
        self.file_count = entries.len() as u32;
        self.file_names = entries.iter().map(|e| e.name.clone()).collect();
        self.file_offsets = entries.iter().map(|e| e.offset).collect();

        let mut bounds = self.file_offsets.clone();
        bounds.push(self.fst_offset);
        self.file_sizes = (0..self.file_count as usize)
            .map(|i| bounds[i + 1] - bounds[i] - entry::PREFIX_SIZE)
            .collect();
        Ok(())
    }

    /// Scans every entry's prop byte and records which are ROOTDIR. Call
    /// after [`load_fs_table`](Self::load_fs_table).
    pub fn test_rootdir(&mut self) -> Result<(), Error> {
        self.rootdir.clear();
        for fsid in 0..self.file_count {
            if self.raw_prop_byte(fsid)?.is_rootdir() {
                self.rootdir.push(fsid);
            }
        }
        Ok(())
    }

    pub fn fs_count(&self) -> u32 {
        self.file_count
    }

    pub fn get_name(&self, fsid: u32) -> String {
        self.file_names
            .get(fsid as usize)
            .cloned()
            .unwrap_or_else(|| "**undefined**".to_string())
    }

    pub fn rootdir(&self) -> &[u32] {
        &self.rootdir
    }

    /// Reads just the prop byte (first byte of the 225-byte prefix) without
    /// decoding the permutation, the same shortcut `DArchive::TestRootdir`
    /// and `isSymlink` take: the prop bits occupy the top 7 bits of that
    /// byte, MSB-first, so a single right shift recovers them.
    fn raw_prop_byte(&mut self, fsid: u32) -> Result<Prop, Error> {
        if fsid >= self.file_count {
            return Err(Error::FsidOutOfRange(fsid));
        }
        self.reader
            .seek(SeekFrom::Start(self.file_offsets[fsid as usize]))?;
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        Ok(Prop(byte[0] >> 1))
    }

    pub fn is_symlink(&mut self, fsid: u32) -> Result<bool, Error> {
        Ok(self.raw_prop_byte(fsid)?.is_symlink())
    }

    fn decrypt_with_retries(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let kix = crypto::kix_of(data)?;
        if !self.keys.contains_key(&kix) {
            match self.password_cb.on_missing(kix) {
                Some(password) => {
                    self.keys.insert(kix, password);
                }
                None => return Err(Error::MissingPassword(kix)),
            }
        }
        loop {
            let password = self.keys.get(&kix).expect("inserted above").clone();
            match crypto::decrypt(data, &password) {
                Ok(plaintext) => return Ok(plaintext),
                Err(_) => match self.password_cb.on_incorrect(kix) {
                    Some(password) => {
                        self.keys.insert(kix, password);
                    }
                    None => return Err(Error::IncorrectPassword(kix)),
                },
            }
        }
    }

    /// Reads fsid's prefix and payload, unmasks it, and applies decryption/
    /// decompression per its prop bits. Does not interpret PATH/SYMLINK/
    /// SCRIPT/NETWORK payload structure; callers that need that call the
    /// `entry::decode_*` functions on the returned bytes.
    fn extract_data(&mut self, fsid: u32) -> Result<(Prop, Vec<u8>), Error> {
        if fsid >= self.file_count {
            return Err(Error::FsidOutOfRange(fsid));
        }
        self.reader
            .seek(SeekFrom::Start(self.file_offsets[fsid as usize]))?;
        let (prop, mask) = entry::read_prefix(&mut self.reader, self.version)?;

        let mut data = vec![0u8; self.file_sizes[fsid as usize] as usize];
        self.reader.read_exact(&mut data)?;
        unmask_triple(&mask, &mut data);

        if prop.is_encrypted() {
            data = self.decrypt_with_retries(&data)?;
        }
        if prop.is_compressed() {
            data = compress::decompress(&data)?;
        }
        Ok((prop, data))
    }

    /// Resolves a symlink chain (zero or more hops) starting at `fsid`,
    /// returning the first non-symlink entry's prop and decoded data.
    fn resolve_symlinks(&mut self, fsid: u32) -> Result<(Prop, Vec<u8>), Error> {
        let (mut prop, mut data) = self.extract_data(fsid)?;
        while prop.is_symlink() {
            let target = decode_symlink_payload(&data)?;
            let resolved = self.extract_data(target)?;
            prop = resolved.0;
            data = resolved.1;
        }
        Ok((prop, data))
    }

    /// Extracts `fsid` to `dest`, recursing into directories and following
    /// symlinks with an explicit work stack (no native recursion).
    pub fn extract(&mut self, fsid: u32, dest: &Path) -> Result<(), Error> {
        let mut stack = vec![(fsid, dest.to_path_buf())];
        while let Some((fsid, path)) = stack.pop() {
            let (prop, data) = self.extract_data(fsid)?;

            if prop.is_symlink() {
                let target = decode_symlink_payload(&data)?;
                stack.push((target, path));
                continue;
            }

            if prop.is_path() {
                match std::fs::create_dir(crate::platform::to_native_path(&path)?) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(Error::Io(e)),
                }
                // Pushed in reverse so the stack (LIFO) pops children back
                // into left-to-right order, matching the directory-tree
                // pre-order walk's ordering guarantee for inline scripts.
                for child in decode_path_payload(&data)?.into_iter().rev() {
                    if child >= self.file_count {
                        return Err(Error::FsidOutOfRange(child));
                    }
                    let name = self.file_names[child as usize].clone();
                    stack.push((child, path.join(name)));
                }
                continue;
            }

            if prop.is_script() {
                let (priority, source) = decode_script_payload(&data)?;
                if self.safe_mode {
                    std::fs::write(crate::platform::to_native_path(&path)?, source.as_bytes())?;
                } else if priority == 0 {
                    self.script_runner
                        .run(&source, &path.to_string_lossy())?;
                } else {
                    self.deferred_scripts.push(Task {
                        priority,
                        source,
                        title: path.to_string_lossy().into_owned(),
                    });
                }
                continue;
            }

            if prop.is_network() && !self.safe_mode {
                let url = decode_network_payload(&data)?;
                let native = crate::platform::to_native_path(&path)?;
                if !self.fetcher.fetch(&url, &native) {
                    std::fs::write(&native, url.as_bytes())?;
                }
                continue;
            }

            std::fs::write(crate::platform::to_native_path(&path)?, &data)?;
        }
        Ok(())
    }

    /// Extracts every ROOTDIR entry into `dest_root`, named by its own
    /// recorded basename.
    pub fn extract_all(&mut self, dest_root: &Path) -> Result<(), Error> {
        let dest_root = crate::platform::to_native_path(dest_root)?;
        for fsid in self.rootdir.clone() {
            let name = self.file_names[fsid as usize].clone();
            self.extract(fsid, &dest_root.join(name))?;
        }
        Ok(())
    }

    /// Queues `fsid` for extraction to `dest`; materialized by
    /// [`run_routines`](Self::run_routines).
    pub fn add_routine(&mut self, fsid: u32, dest: PathBuf) {
        self.routines.push_back((fsid, dest));
    }

    pub fn run_routines(&mut self) -> Result<(), Error> {
        while let Some((fsid, dest)) = self.routines.pop_front() {
            self.extract(fsid, &dest)?;
        }
        Ok(())
    }

    /// Runs every deferred (non-zero priority) SCRIPT task queued by
    /// [`extract`](Self::extract), in descending priority order.
    pub fn post_extract(&mut self) -> Result<(), Error> {
        let mut tasks = std::mem::take(&mut self.deferred_scripts);
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        for task in tasks {
            self.script_runner.run(&task.source, &task.title)?;
        }
        Ok(())
    }

    /// Resolves a logical slash-separated path to its fsid by walking the
    /// ROOTDIR entries and then each directory's child list, following
    /// symlinks transparently at each hop.
    pub fn dump_fsid(&mut self, path: &str) -> Result<u32, Error> {
        let segments = normalize_segments(path);
        let Some(first) = segments.first() else {
            return Err(Error::MissingEntry(path.to_string()));
        };
        let mut fsid = self
            .rootdir
            .iter()
            .copied()
            .find(|&x| self.file_names[x as usize] == *first)
            .ok_or_else(|| Error::MissingEntry(path.to_string()))?;

        for segment in &segments[1..] {
            let (prop, data) = self.resolve_symlinks(fsid)?;
            if !prop.is_path() {
                return Err(Error::MissingEntry(path.to_string()));
            }
            let children = decode_path_payload(&data)?;
            fsid = children
                .into_iter()
                .find(|&c| {
                    self.file_names
                        .get(c as usize)
                        .is_some_and(|n| n == segment)
                })
                .ok_or_else(|| Error::MissingEntry(path.to_string()))?;
        }
        Ok(fsid)
    }

    /// `true` if `fsid` (following any symlink chain) is a directory.
    pub fn is_directory(&mut self, fsid: u32) -> Result<bool, Error> {
        if fsid >= self.file_count {
            return Ok(false);
        }
        let (prop, _) = self.resolve_symlinks(fsid)?;
        Ok(prop.is_path())
    }

    /// Lists the children of `fsid`, or the ROOTDIR set if `fsid` is `None`.
    pub fn list_directory(&mut self, fsid: Option<u32>) -> Result<Vec<u32>, Error> {
        let fsid = match fsid {
            None => return Ok(self.rootdir.clone()),
            Some(f) if f >= self.file_count => return Ok(self.rootdir.clone()),
            Some(f) => f,
        };
        let (prop, data) = self.resolve_symlinks(fsid)?;
        if !prop.is_path() {
            return Ok(Vec::new());
        }
        Ok(decode_path_payload(&data)?
            .into_iter()
            .filter(|&c| c < self.file_count)
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entry::{PROP_PATH, PROP_ROOTDIR};
    use crate::pack::ArchiveBuilder;
    use std::io::Cursor;

    fn build_simple_archive() -> Vec<u8> {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"file a").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/b.txt"), b"file b").unwrap();

        let mut writer = ArchiveBuilder::new()
            .writer(Cursor::new(Vec::new()))
            .unwrap();
        writer.add_routine(tmp.path(), true).unwrap();
        writer.run_routines().unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn open_reads_header_and_fs_table() {
        let bytes = build_simple_archive();
        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        archive.load_fs_table().unwrap();
        archive.test_rootdir().unwrap();
        assert_eq!(archive.fs_count(), 3);
        assert_eq!(archive.rootdir().len(), 1);
    }

    #[test]
    fn extract_all_reproduces_the_tree() {
        let bytes = build_simple_archive();
        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        archive.load_fs_table().unwrap();
        archive.test_rootdir().unwrap();

        let out = tempfile::tempdir().unwrap();
        archive.extract_all(out.path()).unwrap();

        let root_name = archive.get_name(archive.rootdir()[0]);
        let root = out.path().join(root_name);
        assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"file a");
        assert_eq!(std::fs::read(root.join("sub/b.txt")).unwrap(), b"file b");
    }

    #[test]
    fn dump_fsid_resolves_nested_path() {
        let bytes = build_simple_archive();
        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        archive.load_fs_table().unwrap();
        archive.test_rootdir().unwrap();

        let root_name = archive.get_name(archive.rootdir()[0]);
        let fsid = archive
            .dump_fsid(&format!("{root_name}/sub/b.txt"))
            .unwrap();
        assert!(archive.is_directory(fsid).unwrap() == false);
    }

    #[test]
    fn fsid_out_of_range_is_rejected() {
        let bytes = build_simple_archive();
        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        archive.load_fs_table().unwrap();
        assert!(matches!(
            archive.extract(999, Path::new("/tmp/whatever")),
            Err(Error::FsidOutOfRange(999))
        ));
    }
}
