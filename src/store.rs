//! Tag store - the aggregate owned by an open case
//!
//! All mutations take the exclusive side of one `RwLock`, so they run one at
//! a time in a total order. Queries share the read side.

use crate::config::{StoreConfig, INDEX_DIR_NAME, STATE_FILE_NAME};
use crate::error::Result;
use crate::filter::{self, ResultSet};
use crate::membership::Membership;
use crate::metadata::{Color, KeyBinding, Registry};
use crate::persist::{self, Snapshot};
use crate::selection::{ItemDomain, Selection};
use crate::tag::{ItemId, TagId};
use crate::writer::{SaveJob, SaveWorker};
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct State {
    membership: Membership,
    registry: Registry,
    selection: Selection,
    typed_words: Vec<String>,
}

impl State {
    fn empty(universe: usize) -> Self {
        Self {
            membership: Membership::new(),
            registry: Registry::new(),
            selection: Selection::new(universe),
            typed_words: Vec::new(),
        }
    }

    fn tag_ids(&self, names: &[&str]) -> Vec<TagId> {
        names.iter().filter_map(|n| self.registry.id_of(n)).collect()
    }
}

pub struct TagStore {
    state: RwLock<State>,
    domain: Arc<dyn ItemDomain>,
    last_id: ItemId,
    total_items: u32,
    sync_save: bool,
    index_dir: PathBuf,
    state_file: PathBuf,
    cookie_dir: PathBuf,
    cookie: Mutex<PathBuf>,
    writer: SaveWorker,
}

impl TagStore {
    /// Open an empty store for the case described by `domain`. Nothing is
    /// read from disk until `load` is called.
    pub fn new(domain: Arc<dyn ItemDomain>, config: &StoreConfig) -> Result<Self> {
        let last_id = domain.last_id();
        let total_items = domain.total_items();
        let index_dir = config.module_dir.join(INDEX_DIR_NAME);
        let state_file = config.module_dir.join(STATE_FILE_NAME);
        let state_file = state_file.canonicalize().unwrap_or(state_file);
        let cookie_dir = config.cookie_dir();
        let cookie = persist::cookie_path(&index_dir, &cookie_dir);

        Ok(Self {
            state: RwLock::new(State::empty(last_id as usize + 1)),
            domain,
            last_id,
            total_items,
            sync_save: config.sync_save,
            index_dir,
            state_file,
            cookie_dir,
            cookie: Mutex::new(cookie),
            writer: SaveWorker::spawn()?,
        })
    }

    pub fn last_id(&self) -> ItemId {
        self.last_id
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn cookie_file(&self) -> PathBuf {
        self.cookie.lock().clone()
    }

    /// Recompute the cookie path from the index directory's current mtime
    pub fn refresh_cookie(&self) {
        *self.cookie.lock() = persist::cookie_path(&self.index_dir, &self.cookie_dir);
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    /// Create a tag, or return the id of the live tag already named `name`
    pub fn create_tag(&self, name: &str) -> TagId {
        let mut state = self.state.write();
        if let Some(id) = state.registry.id_of(name) {
            return id;
        }
        let id = state.membership.next_free_id();
        state.membership.insert_tag(id);
        state.registry.insert(id, name);
        id
    }

    /// Delete a tag with its bitmap and metadata. Absent ids are ignored.
    pub fn delete_tag(&self, tag: TagId) {
        let mut state = self.state.write();
        state.membership.remove_tag(tag);
        state.registry.remove(tag);
    }

    /// Rename a tag. Uniqueness is not checked; absent ids are ignored.
    pub fn rename_tag(&self, tag: TagId, name: &str) {
        self.state.write().registry.rename(tag, name);
    }

    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        self.state.read().registry.id_of(name)
    }

    pub fn tag_name(&self, tag: TagId) -> Option<String> {
        self.state.read().registry.name(tag).map(str::to_owned)
    }

    /// Live tags by id
    pub fn tags(&self) -> BTreeMap<TagId, String> {
        self.state.read().registry.names().clone()
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    pub fn add_members(&self, items: &[ItemId], tag: TagId) -> Result<()> {
        self.state
            .write()
            .membership
            .add_members(tag, items.iter().copied())
    }

    pub fn remove_members(&self, items: &[ItemId], tag: TagId) -> Result<()> {
        self.state
            .write()
            .membership
            .remove_members(tag, items.iter().copied())
    }

    pub fn contains(&self, item: ItemId, tag: TagId) -> bool {
        self.state.read().membership.contains(item, tag)
    }

    pub fn contains_any(&self, item: ItemId, tags: &[TagId]) -> bool {
        self.state.read().membership.contains_any(item, tags)
    }

    /// True if `item` belongs to at least one tag
    pub fn has_any_tag(&self, item: ItemId) -> bool {
        self.state.read().membership.in_any(item)
    }

    /// Names of the tags containing `item`, sorted and deduplicated
    pub fn tags_of(&self, item: ItemId) -> Vec<String> {
        let state = self.state.read();
        let mut names: Vec<String> = state
            .membership
            .tags_containing(item)
            .into_iter()
            .filter_map(|id| state.registry.name(id).map(str::to_owned))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Ids of the tags containing `item`, ascending
    pub fn tag_ids_of(&self, item: ItemId) -> Vec<TagId> {
        self.state.read().membership.tags_containing(item)
    }

    pub fn cardinality(&self, tag: TagId) -> Option<u64> {
        self.state.read().membership.cardinality(tag)
    }

    // ------------------------------------------------------------------
    // Unions
    // ------------------------------------------------------------------

    /// Copy of the union of every tag
    pub fn union_all(&self) -> RoaringBitmap {
        self.state.read().membership.union_all()
    }

    /// Union of the named tags; unknown names are skipped
    pub fn union_of(&self, names: &[&str]) -> RoaringBitmap {
        let state = self.state.read();
        state.membership.union_of(&state.tag_ids(names))
    }

    /// Union of the named tags plus every untagged item of the universe
    pub fn union_of_or_untagged(&self, names: &[&str]) -> RoaringBitmap {
        let state = self.state.read();
        state
            .membership
            .union_of_or_untagged(&state.tag_ids(names), self.last_id)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn set_comment(&self, tag: TagId, comment: Option<String>) -> Result<()> {
        self.state.write().registry.set_comment(tag, comment)
    }

    pub fn comment(&self, tag: TagId) -> Option<String> {
        self.state.read().registry.comment(tag).map(str::to_owned)
    }

    pub fn set_key_binding(&self, tag: TagId, key: KeyBinding) -> Result<()> {
        self.state.write().registry.set_key_binding(tag, key)
    }

    pub fn remove_key_binding(&self, tag: TagId) {
        self.state.write().registry.remove_key_binding(tag);
    }

    pub fn key_binding(&self, tag: TagId) -> Option<KeyBinding> {
        self.state.read().registry.key_binding(tag).cloned()
    }

    pub fn set_color(&self, tag: TagId, color: Option<Color>) -> Result<()> {
        self.state.write().registry.set_color(tag, color)
    }

    pub fn color(&self, tag: TagId) -> Option<Color> {
        self.state.read().registry.color(tag)
    }

    pub fn used_colors(&self) -> HashSet<Color> {
        self.state.read().registry.used_colors()
    }

    pub fn set_in_report(&self, tag: TagId, in_report: bool) -> Result<()> {
        self.state.write().registry.set_in_report(tag, in_report)
    }

    pub fn is_in_report(&self, tag: TagId) -> bool {
        self.state.read().registry.is_in_report(tag)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn set_checked(&self, item: ItemId, value: bool) {
        self.state.write().selection.set_checked(item, value);
    }

    pub fn is_checked(&self, item: ItemId) -> bool {
        self.state.read().selection.is_checked(item)
    }

    /// Check every item that exists in the case
    pub fn check_all(&self) {
        self.state.write().selection.check_all(self.domain.as_ref());
    }

    pub fn clear_checked(&self) {
        self.state.write().selection.clear_all();
    }

    pub fn checked_count(&self) -> usize {
        self.state.read().selection.count()
    }

    // ------------------------------------------------------------------
    // Result filters
    // ------------------------------------------------------------------

    /// Keep hits belonging to any of the named tags
    pub fn filter_by_tags(&self, mut result: ResultSet, names: &[&str]) -> ResultSet {
        let union = self.union_of(names);
        filter::retain_in(&mut result, &union);
        result
    }

    /// Keep hits belonging to any of the named tags or to no tag at all
    pub fn filter_by_tags_or_untagged(&self, mut result: ResultSet, names: &[&str]) -> ResultSet {
        let union = self.union_of_or_untagged(names);
        filter::retain_in(&mut result, &union);
        result
    }

    /// Keep hits with no tag
    pub fn filter_untagged(&self, mut result: ResultSet) -> ResultSet {
        let union = self.union_all();
        filter::retain_not_in(&mut result, &union);
        result
    }

    /// Keep checked hits
    pub fn filter_checked(&self, mut result: ResultSet) -> ResultSet {
        filter::retain_checked(&mut result, &self.state.read().selection);
        result
    }

    /// Copy of `result` keeping hits in at least one tag flagged for the
    /// report. `result` itself is untouched.
    pub fn filter_in_report(&self, result: &ResultSet) -> ResultSet {
        let mut filtered = result.clone();
        let state = self.state.read();
        filtered.retain_items(|item| {
            state
                .membership
                .tags_containing(item)
                .into_iter()
                .any(|tag| state.registry.is_in_report(tag))
        });
        filtered
    }

    // ------------------------------------------------------------------
    // Typed words
    // ------------------------------------------------------------------

    /// Remember a typed tag name. Blank text and repeats are ignored; a new
    /// word triggers a save.
    pub fn add_typed_word(&self, text: &str) {
        {
            let mut state = self.state.write();
            if text.trim().is_empty() || state.typed_words.iter().any(|w| w == text) {
                return;
            }
            state.typed_words.push(text.to_string());
        }
        self.save(false);
    }

    pub fn typed_words(&self) -> Vec<String> {
        self.state.read().typed_words.clone()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Copy of the persistent part of the state
    pub fn snapshot(&self) -> Snapshot {
        Self::snapshot_of(&self.state.read())
    }

    fn snapshot_of(state: &State) -> Snapshot {
        let registry = &state.registry;
        Snapshot {
            checked: state.selection.as_slice().to_vec(),
            bitmaps: state.membership.bitmaps().clone(),
            names: registry.names.clone(),
            comments: registry.comments.clone(),
            key_bindings: registry.key_bindings.clone(),
            colors: registry.colors.clone(),
            in_report: registry.in_report.clone(),
            typed_words: state.typed_words.clone(),
            checked_count: state.selection.count() as u64,
        }
    }

    /// Replace the in-memory state with `snapshot`. Checked flags are fitted
    /// to this case's universe.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut state = self.state.write();
        let mut selection = Selection::new(self.last_id as usize + 1);
        selection.restore_from(&snapshot.checked);
        if selection.count() as u64 != snapshot.checked_count {
            log::warn!(
                "Snapshot checked count {} differs from its flags; using {}",
                snapshot.checked_count,
                selection.count()
            );
        }
        *state = State {
            membership: Membership::from_bitmaps(snapshot.bitmaps),
            registry: Registry {
                names: snapshot.names,
                comments: snapshot.comments,
                key_bindings: snapshot.key_bindings,
                colors: snapshot.colors,
                in_report: snapshot.in_report,
            },
            selection,
            typed_words: snapshot.typed_words,
        };
    }

    /// Save to the state file, or to the cookie when the state file cannot
    /// be written. Failures are logged.
    pub fn save(&self, sync: bool) {
        let sync = sync || self.sync_save;
        let target = persist::choose_save_target(&self.state_file, &self.cookie_file());
        if let Err(e) = self.save_to(&target, sync) {
            log::error!("Failed to save state to {}: {}", target.display(), e);
        }
    }

    /// Save to `path`. With `sync` the write happens here under the exclusive
    /// lock; otherwise it is handed to the background writer.
    pub fn save_to(&self, path: &Path, sync: bool) -> Result<()> {
        log::info!("Saving state sync={} to file {}", sync, path.display());
        if sync {
            let state = self.state.write();
            let bytes = Self::snapshot_of(&state).encode()?;
            persist::write_atomic(path, &bytes)
        } else {
            self.writer.submit(SaveJob {
                snapshot: self.snapshot(),
                path: path.to_path_buf(),
            });
            Ok(())
        }
    }

    /// Load from the newer of cookie and state file. Failures are logged and
    /// leave the current state in place.
    pub fn load(&self) {
        let Some(source) = persist::choose_load_source(&self.state_file, &self.cookie_file())
        else {
            log::debug!("No saved state for {}", self.state_file.display());
            return;
        };
        if let Err(e) = self.load_from(&source) {
            log::error!("Failed to load state from {}: {}", source.display(), e);
        }
    }

    /// Load a snapshot of either format from `path`
    pub fn load_from(&self, path: &Path) -> Result<()> {
        log::info!("Loading state from file {}", path.display());
        let stored = persist::read_snapshot(path)?;
        self.restore(stored.into_current(self.last_id));
        Ok(())
    }

    /// Wait for queued background saves to finish
    pub fn flush(&self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::DenseDomain;

    fn store(last_id: ItemId) -> (TagStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            module_dir: dir.path().to_path_buf(),
            temp_dir: Some(dir.path().to_path_buf()),
            sync_save: false,
        };
        let store = TagStore::new(Arc::new(DenseDomain { last_id }), &config).unwrap();
        (store, dir)
    }

    #[test]
    fn test_create_is_idempotent() {
        let (s, _dir) = store(9);
        let a = s.create_tag("Relevant");
        s.add_members(&[1, 2], a).unwrap();
        assert_eq!(s.create_tag("Relevant"), a);
        assert_eq!(s.cardinality(a), Some(2));
    }

    #[test]
    fn test_deleted_id_is_reused_clean() {
        let (s, _dir) = store(9);
        let a = s.create_tag("a");
        let b = s.create_tag("b");
        s.add_members(&[3], a).unwrap();
        s.set_in_report(a, true).unwrap();
        s.delete_tag(a);

        let c = s.create_tag("c");
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(s.cardinality(c), Some(0));
        assert!(!s.is_in_report(c));
        assert_eq!(s.create_tag("d"), TagId(2));
    }

    #[test]
    fn test_delete_and_rename_ignore_absent() {
        let (s, _dir) = store(9);
        s.delete_tag(TagId(4));
        s.rename_tag(TagId(4), "x");
        assert!(s.tags().is_empty());
    }

    #[test]
    fn test_tags_of_sorted_by_name() {
        let (s, _dir) = store(9);
        let z = s.create_tag("zeta");
        let a = s.create_tag("alpha");
        s.add_members(&[7], z).unwrap();
        s.add_members(&[7], a).unwrap();
        assert_eq!(s.tags_of(7), vec!["alpha".to_string(), "zeta".to_string()]);
        assert_eq!(s.tag_ids_of(7), vec![z, a]);
        assert!(s.has_any_tag(7));
        assert!(!s.has_any_tag(8));
    }

    #[test]
    fn test_add_typed_word_dedupes() {
        let (s, _dir) = store(3);
        s.add_typed_word("pdf");
        s.add_typed_word("pdf");
        s.add_typed_word("   ");
        s.add_typed_word("email");
        s.flush();
        assert_eq!(s.typed_words(), vec!["pdf".to_string(), "email".to_string()]);
        assert!(s.state_file().exists());
    }

    #[test]
    fn test_filter_in_report_leaves_input() {
        let (s, _dir) = store(4);
        let a = s.create_tag("a");
        let b = s.create_tag("b");
        s.add_members(&[0, 1], a).unwrap();
        s.add_members(&[2], b).unwrap();
        s.set_in_report(b, true).unwrap();

        let input = ResultSet::new(vec![0, 1, 2, 3]);
        let out = s.filter_in_report(&input);
        assert_eq!(out.ids(), &[2]);
        assert_eq!(input.ids(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_refresh_cookie_follows_index_dir() {
        let (s, dir) = store(3);
        assert_eq!(s.cookie_file(), dir.path().join("indexer0.tix"));
        std::fs::create_dir(s.index_dir()).unwrap();
        s.refresh_cookie();
        assert_ne!(s.cookie_file(), dir.path().join("indexer0.tix"));
        assert_eq!(s.cookie_file().parent(), Some(dir.path()));
    }

    #[test]
    fn test_restore_fits_universe() {
        let (s, _dir) = store(2);
        s.restore(Snapshot {
            checked: vec![true, true, true, true, true],
            checked_count: 5,
            ..Snapshot::default()
        });
        assert_eq!(s.checked_count(), 3);
    }
}
