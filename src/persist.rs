//! Snapshot files - encoding, legacy migration and target selection
//!
//! ## File Layout
//!
//! ```text
//! +--------+---------+------------------------------------------+
//! | "TIDX" | version |  bincode body                            |
//! | 4 B    | u16 LE  |  Snapshot (v2) or LegacySnapshot (v1)    |
//! +--------+---------+------------------------------------------+
//! ```
//!
//! Version 2 embeds each tag bitmap as a portable roaring blob. Version 1
//! keeps one fixed-width tag bit vector per item and is migrated on load.

use crate::config::{COOKIE_PREFIX, EXT, FORMAT_CURRENT, FORMAT_LEGACY, SNAPSHOT_MAGIC};
use crate::error::{Result, StoreError};
use crate::metadata::{Color, KeyBinding};
use crate::tag::{ItemId, TagBits, TagId};
use roaring::RoaringBitmap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

const HEADER_LEN: usize = SNAPSHOT_MAGIC.len() + 2;

// Distinguishes scratch files of concurrent writers in one process
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Persisted state of a store in the current format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub checked: Vec<bool>,
    #[serde(with = "bitmap_map")]
    pub bitmaps: BTreeMap<TagId, RoaringBitmap>,
    pub names: BTreeMap<TagId, String>,
    pub comments: BTreeMap<TagId, String>,
    pub key_bindings: BTreeMap<TagId, KeyBinding>,
    pub colors: BTreeMap<TagId, Color>,
    pub in_report: BTreeSet<TagId>,
    pub typed_words: Vec<String>,
    pub checked_count: u64,
}

impl Snapshot {
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_with_header(FORMAT_CURRENT, self)
    }
}

/// Persisted state in the older per-item bit vector format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySnapshot {
    pub checked: Vec<bool>,
    /// Tag bits of each item, indexed by item id
    pub item_bits: Vec<TagBits>,
    pub names: BTreeMap<TagId, String>,
    pub comments: BTreeMap<TagId, String>,
    pub key_bindings: BTreeMap<TagId, KeyBinding>,
    pub colors: BTreeMap<TagId, Color>,
    pub in_report: BTreeSet<TagId>,
    pub typed_words: Vec<String>,
    pub checked_count: u64,
}

impl LegacySnapshot {
    /// Empty legacy state for `items` items and room for `tag_slots` tags
    pub fn new(items: usize, tag_slots: usize) -> Self {
        Self {
            checked: vec![false; items],
            item_bits: vec![TagBits::with_slots(tag_slots); items],
            ..Self::default()
        }
    }

    /// Mark `item` as a member of `tag`
    pub fn set_member(&mut self, item: ItemId, tag: TagId) {
        if let Some(bits) = self.item_bits.get_mut(item as usize) {
            bits.add(tag);
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_with_header(FORMAT_LEGACY, self)
    }

    /// Rebuild one compressed bitmap per named tag by testing every item of
    /// `0..=last_id`. Everything else carries over as is.
    pub fn migrate(self, last_id: ItemId) -> Snapshot {
        let mut bitmaps = BTreeMap::new();
        for &tag in self.names.keys() {
            let bitmap: RoaringBitmap = (0..=last_id)
                .filter(|&item| {
                    self.item_bits
                        .get(item as usize)
                        .is_some_and(|bits| bits.contains(tag))
                })
                .collect();
            bitmaps.insert(tag, bitmap);
        }
        log::info!("Migrated {} tags from legacy snapshot", bitmaps.len());

        Snapshot {
            checked: self.checked,
            bitmaps,
            names: self.names,
            comments: self.comments,
            key_bindings: self.key_bindings,
            colors: self.colors,
            in_report: self.in_report,
            typed_words: self.typed_words,
            checked_count: self.checked_count,
        }
    }
}

/// A decoded snapshot file of either format
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSnapshot {
    Legacy(LegacySnapshot),
    Current(Snapshot),
}

impl StoredSnapshot {
    pub fn format(&self) -> u16 {
        match self {
            StoredSnapshot::Legacy(_) => FORMAT_LEGACY,
            StoredSnapshot::Current(_) => FORMAT_CURRENT,
        }
    }

    /// Current-format state, migrating a legacy snapshot over `0..=last_id`
    pub fn into_current(self, last_id: ItemId) -> Snapshot {
        match self {
            StoredSnapshot::Legacy(legacy) => legacy.migrate(last_id),
            StoredSnapshot::Current(snapshot) => snapshot,
        }
    }
}

fn encode_with_header<T: Serialize>(version: u16, body: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_LEN);
    buf.extend_from_slice(&SNAPSHOT_MAGIC);
    buf.extend_from_slice(&version.to_le_bytes());
    bincode::serialize_into(&mut buf, body).map_err(|e| StoreError::Encode(e.to_string()))?;
    Ok(buf)
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    bincode::deserialize(body).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Decode a snapshot file's bytes, dispatching on the header version
pub fn decode(bytes: &[u8]) -> Result<StoredSnapshot> {
    if bytes.len() < HEADER_LEN || bytes[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
        return Err(StoreError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    let body = &bytes[HEADER_LEN..];
    match version {
        FORMAT_CURRENT => Ok(StoredSnapshot::Current(decode_body(body)?)),
        FORMAT_LEGACY => Ok(StoredSnapshot::Legacy(decode_body(body)?)),
        other => Err(StoreError::UnsupportedVersion(other)),
    }
}

pub fn read_snapshot(path: &Path) -> Result<StoredSnapshot> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    decode(&bytes)
}

/// Write `bytes` to a temp file next to `path`, then rename over it, so the
/// target holds either the old or the new content
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::io(path, std::io::Error::other("path has no file name")))?;
    let temp_path = parent.join(format!(
        ".{}.{}-{}.tmp",
        file_name.to_string_lossy(),
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io(&temp_path, e));
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Existing file we may overwrite, checked by opening it for append
pub fn can_write(path: &Path) -> bool {
    path.is_file() && fs::OpenOptions::new().append(true).open(path).is_ok()
}

/// Existing directory we may create files in, checked by creating and
/// removing a scratch file
pub fn can_create_in(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let scratch = dir.join(format!(
        ".tagindex-scratch.{}-{}",
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    match fs::OpenOptions::new().write(true).create_new(true).open(&scratch) {
        Ok(_) => {
            let _ = fs::remove_file(&scratch);
            true
        }
        Err(_) => false,
    }
}

/// The state file when writable or creatable, the cookie otherwise
pub fn choose_save_target(state_file: &Path, cookie: &Path) -> PathBuf {
    let creatable = !state_file.exists()
        && state_file.parent().is_some_and(can_create_in);
    if can_write(state_file) || creatable {
        state_file.to_path_buf()
    } else {
        cookie.to_path_buf()
    }
}

fn modified(path: &Path) -> Option<std::time::SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// The cookie when it exists and is newer than the state file, else the
/// state file when it exists
pub fn choose_load_source(state_file: &Path, cookie: &Path) -> Option<PathBuf> {
    if cookie.exists() {
        let newer = match (modified(cookie), modified(state_file)) {
            (_, None) => true,
            (Some(c), Some(s)) => c > s,
            (None, Some(_)) => false,
        };
        if newer || !state_file.exists() {
            return Some(cookie.to_path_buf());
        }
    }
    state_file.exists().then(|| state_file.to_path_buf())
}

/// Cookie path for an index directory: `<dir>/indexer<mtime millis>.tix`.
/// A missing index directory yields timestamp 0.
pub fn cookie_path(index_dir: &Path, cookie_dir: &Path) -> PathBuf {
    let millis = modified(index_dir)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0);
    cookie_dir.join(format!("{}{}.{}", COOKIE_PREFIX, millis, EXT))
}

mod bitmap_map {
    use crate::tag::TagId;
    use roaring::RoaringBitmap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<TagId, RoaringBitmap>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut encoded = BTreeMap::new();
        for (&tag, bitmap) in map {
            let mut buf = Vec::with_capacity(bitmap.serialized_size());
            bitmap
                .serialize_into(&mut buf)
                .map_err(serde::ser::Error::custom)?;
            encoded.insert(tag, buf);
        }
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<BTreeMap<TagId, RoaringBitmap>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<TagId, Vec<u8>>::deserialize(d)?;
        encoded
            .into_iter()
            .map(|(tag, buf)| {
                RoaringBitmap::deserialize_from(&buf[..])
                    .map(|bitmap| (tag, bitmap))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
