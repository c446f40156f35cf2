//! Durable storage of chunks keyed by chunk coordinate. See also the `format`
//! module.
//!
//! Every coordinate the store knows about is in one or more of these states:
//!
//! - Resident: the store owns the chunk in memory.
//! - Snapshotted: the chunk is owned by the loaded window, which has saved
//!   a serialized copy of it through the store.
//! - On disk: the store file holds a record for it at a known byte offset,
//!   which is read lazily on first request.
//!
//! A coordinate whose chunk was handed out by `get` is checked out until it
//! is handed back with `put`. While checked out, the store never hands it out
//! again, and a flush writes its latest snapshot or its old on-disk record.
//!
//! Flushing writes a complete new file next to the old one and then renames it
//! over the old one, so an interrupted flush leaves the previous file intact.

pub mod format;

use self::format::*;
use crate::{
    content::Content,
    error::{
        MapError,
        Result,
    },
};
use chunk_data::*;
use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fs::{
        self,
        File,
    },
    io::{
        self,
        BufReader,
        BufWriter,
        Seek,
        SeekFrom,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use vek::*;


type Key = (i32, i32, i32);

fn key(cc: Vec3<i32>) -> Key {
    (cc.x, cc.y, cc.z)
}

fn unkey((x, y, z): Key) -> Vec3<i32> {
    Vec3 { x, y, z }
}

// convert a parse failure into the store error taxonomy
fn format_error(e: anyhow::Error, line: usize) -> MapError {
    match e.downcast::<io::Error>() {
        Ok(e) => MapError::StoreIo(e),
        Err(e) => MapError::StoreFormat {
            line,
            msg: format!("{:#}", e),
        },
    }
}


/// Open chunk store file. Operations are blocking.
#[derive(Debug)]
pub struct ChunkStore {
    path: PathBuf,
    content: Arc<Content>,
    resident: BTreeMap<Key, Chunk>,
    // only ever held for checked out coordinates
    snapshots: BTreeMap<Key, Vec<u8>>,
    on_disk: BTreeMap<Key, u64>,
    checked_out: BTreeSet<Key>,
    // how on disk records' ids translate to current ids
    remap: IdRemap,
    file: Option<BufReader<File>>,
}

impl ChunkStore {
    /// Open the store file at `path`, or start an empty store if there is none
    /// yet. The file is scanned once to index where each record starts.
    pub fn open(path: impl Into<PathBuf>, content: Arc<Content>) -> Result<Self> {
        let path = path.into();
        let mut store = ChunkStore {
            path,
            content,
            resident: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            on_disk: BTreeMap::new(),
            checked_out: BTreeSet::new(),
            remap: IdRemap::identity(),
            file: None,
        };

        let pre_existent = store.path.try_exists()?;
        trace!(?pre_existent, path = %store.path.display(), "opening chunk store");
        if !pre_existent {
            return Ok(store);
        }

        let mut reader = LineReader::new(BufReader::new(File::open(&store.path)?), 0, 0);
        let header = read_header(&mut reader)
            .map_err(|e| format_error(e, reader.line_no()))?;

        // index record offsets
        loop {
            let offset = reader.offset();
            let parsed = match reader.next_line()? {
                Some(line) => parse_cc(line),
                None => break,
            };
            let cc = parsed.map_err(|e| format_error(e, reader.line_no()))?;
            reader.read_raw_record().map_err(|e| format_error(e, reader.line_no()))?;
            if store.on_disk.insert(key(cc), offset).is_some() {
                warn!(?cc, "chunk store has multiple records for one chunk, keeping the last");
            }
        }
        if header.listsize != store.on_disk.len() {
            warn!(
                listsize = header.listsize,
                records = store.on_disk.len(),
                "chunk store header disagrees with record count",
            );
        }
        store.file = Some(BufReader::new(File::open(&store.path)?));

        let saved_tables = header.symbol_tables();
        if saved_tables != store.content.symbol_tables() {
            // records must be rewritten with current ids at the next flush
            info!("content changed since chunk store was written, loading every record");
            store.remap = IdRemap::new(&saved_tables, &store.content);
            let on_disk = std::mem::take(&mut store.on_disk);
            for (k, offset) in on_disk {
                let chunk = store.read_at(unkey(k), offset)?;
                store.resident.insert(k, chunk);
            }
            store.remap = IdRemap::identity();
        }

        debug!(
            on_disk = store.on_disk.len(),
            resident = store.resident.len(),
            "opened chunk store",
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    /// Whether the store knows a chunk at this coordinate, checked out or not.
    pub fn contains(&self, cc: Vec3<i32>) -> bool {
        let k = key(cc);
        self.resident.contains_key(&k)
            || self.snapshots.contains_key(&k)
            || self.on_disk.contains_key(&k)
            || self.checked_out.contains(&k)
    }

    pub fn is_checked_out(&self, cc: Vec3<i32>) -> bool {
        self.checked_out.contains(&key(cc))
    }

    /// Number of coordinates the store knows a chunk for.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> BTreeSet<Key> {
        self.resident.keys()
            .chain(self.snapshots.keys())
            .chain(self.on_disk.keys())
            .chain(self.checked_out.iter())
            .copied()
            .collect()
    }

    // deserialize the record at a byte offset of the store file
    fn read_at(&mut self, cc: Vec3<i32>, offset: u64) -> Result<Chunk> {
        let file = self.file.as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "chunk store file not open"))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = LineReader::new(file, offset, 0);
        let read = read_record(&mut reader, &self.remap)
            .map_err(|e| format_error(e, reader.line_no()))?;
        match read {
            Some((read_cc, chunk)) if read_cc == cc => Ok(chunk),
            Some((read_cc, _)) => Err(MapError::StoreFormat {
                line: 0,
                msg: format!("record at offset {} is for {:?}, expected {:?}", offset, read_cc, cc),
            }),
            None => Err(MapError::StoreFormat {
                line: 0,
                msg: format!("no record at offset {}", offset),
            }),
        }
    }

    // raw text of the record at a byte offset of the store file
    fn read_raw_at(&mut self, offset: u64) -> Result<Vec<u8>> {
        let file = self.file.as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "chunk store file not open"))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = LineReader::new(file, offset, 0);
        reader.read_raw_record().map_err(|e| format_error(e, reader.line_no()))
    }

    /// Take the chunk at a coordinate out of the store, if there is one,
    /// checking it out. Never generates anything.
    pub fn get(&mut self, cc: Vec3<i32>) -> Result<Option<Chunk>> {
        let k = key(cc);
        if self.checked_out.contains(&k) {
            error!(?cc, "chunk requested from store while already checked out");
            return Err(MapError::DuplicateChunk { cc });
        }
        let chunk =
            if let Some(chunk) = self.resident.remove(&k) {
                Some(chunk)
            } else if let Some(&offset) = self.on_disk.get(&k) {
                trace!(?cc, offset, "lazily loading chunk");
                Some(self.read_at(cc, offset)?)
            } else {
                None
            };
        if chunk.is_some() {
            self.checked_out.insert(k);
        }
        Ok(chunk)
    }

    /// Give a chunk to the store.
    ///
    /// Accepted if the coordinate is checked out or unknown, or if the store
    /// already holds an identical chunk there. Otherwise errors with
    /// `DuplicateChunk` and leaves the store unchanged.
    pub fn put(&mut self, cc: Vec3<i32>, chunk: Chunk) -> Result<()> {
        let k = key(cc);
        if self.checked_out.remove(&k) {
            self.snapshots.remove(&k);
            self.resident.insert(k, chunk);
            return Ok(());
        }
        if let Some(existing) = self.resident.get(&k) {
            if *existing == chunk {
                return Ok(());
            }
            error!(?cc, "refusing to replace a different chunk in the store");
            return Err(MapError::DuplicateChunk { cc });
        }
        if self.on_disk.contains_key(&k) {
            error!(?cc, "refusing to replace a stored chunk that is not checked out");
            return Err(MapError::DuplicateChunk { cc });
        }
        self.resident.insert(k, chunk);
        Ok(())
    }

    /// Serialize a chunk owned by the loaded window, so the next flush
    /// persists this version of it. The coordinate counts as checked out
    /// afterwards.
    pub fn save(&mut self, cc: Vec3<i32>, chunk: &Chunk) -> Result<()> {
        let k = key(cc);
        if let Some(existing) = self.resident.get(&k) {
            if existing == chunk {
                return Ok(());
            }
            error!(?cc, "refusing to snapshot over a different resident chunk");
            return Err(MapError::DuplicateChunk { cc });
        }
        let mut bytes = Vec::new();
        write_record(&mut bytes, cc, chunk)?;
        self.snapshots.insert(k, bytes);
        self.checked_out.insert(k);
        Ok(())
    }

    /// Write every known chunk to the store file, replacing it.
    ///
    /// On failure the old file and all in-memory state are left as they were.
    pub fn flush_all(&mut self) -> Result<()> {
        let tmp_path = {
            let mut name = self.path.as_os_str().to_owned();
            name.push(".tmp");
            PathBuf::from(name)
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let offsets = match self.write_file(&tmp_path) {
            Ok(offsets) => offsets,
            Err(e) => {
                error!(%e, "error writing chunk store, keeping previous file");
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        self.file = Some(BufReader::new(File::open(&self.path)?));
        self.snapshots.clear();
        self.on_disk = offsets;
        info!(
            chunks = self.on_disk.len(),
            resident = self.resident.len(),
            checked_out = self.checked_out.len(),
            "flushed chunk store",
        );
        Ok(())
    }

    // write the complete store to a new file, returning record offsets
    fn write_file(&mut self, path: &Path) -> Result<BTreeMap<Key, u64>> {
        // coordinates checked out before ever being saved have no record yet
        let keys = self.keys().into_iter()
            .filter(|k| {
                self.resident.contains_key(k)
                    || self.snapshots.contains_key(k)
                    || self.on_disk.contains_key(k)
            })
            .collect::<Vec<Key>>();
        let mut out = BufWriter::new(File::create(path)?);
        let mut offset = 0u64;
        let mut offsets = BTreeMap::new();

        let mut buf = Vec::new();
        write_header(&mut buf, &StoreHeader::new(keys.len(), self.content.symbol_tables()))?;
        out.write_all(&buf)?;
        offset += buf.len() as u64;

        for k in keys {
            buf.clear();
            if let Some(chunk) = self.resident.get(&k) {
                write_record(&mut buf, unkey(k), chunk)?;
            } else if let Some(bytes) = self.snapshots.get(&k) {
                buf.extend_from_slice(bytes);
            } else if let Some(&old_offset) = self.on_disk.get(&k) {
                buf = self.read_raw_at(old_offset)?;
            }
            offsets.insert(k, offset);
            out.write_all(&buf)?;
            offset += buf.len() as u64;
        }

        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(offsets)
    }
}
