//!
//! filedex filesystem index
//! ------------------------
//! This module implements the virtual filesystem index: a flat, path-keyed
//! collection of File/Folder entries plus the hierarchical operations a
//! browser file manager needs (scan, list, create, remove, rename/move,
//! replace, tag update, copy, upload ingestion).
//!
//! Key responsibilities:
//! - Path uniqueness: no two entries ever share a normalized path.
//! - Boundary-safe containment: subtree and direct-child queries respect the
//!   path-separator boundary, so "/foo" never claims "/foobar".
//! - Atomic recursive rewrites: rename/remove of a subtree either applies to
//!   the entire matched set or not at all.
//!
//! The public API centers around the `FsIndex` type, which is wrapped in a
//! thread-safe `SharedIndex` (`Arc<RwLock<FsIndex>>`) and injected into the
//! HTTP adapter. Mutating operations take the write lock for their whole
//! duration; readers receive cloned snapshots, never live references.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod paths;
use paths::{
    ancestors_of, child_prefix, is_direct_child, join_upload_path, name_of, normalize_path,
    subtree_upper_bound, ROOT,
};

/// Entry variant. Serialized on the wire as `"file"` / `"folder"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        }
    }
}

/// A single record of the namespace, keyed by its normalized path.
///
/// `name` is deliberately not stored: it is always the final path segment and
/// is recomputed on access and serialization, so it can never drift from the
/// path.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Opaque unique identifier, assigned at creation, immutable.
    pub id: String,
    pub kind: EntryKind,
    /// Normalized absolute path; the sole lookup/containment/ordering key.
    pub path: String,
    pub description: String,
    /// Content type, File entries only.
    pub mime_type: Option<String>,
    /// Coarse content class for the UI: "folder", "text", "image", ... "file".
    pub file_type: String,
    /// Byte count, File entries only.
    pub size: Option<u64>,
    /// Timestamp of the last mutation. Tag updates do not bump it.
    pub modified: Option<DateTime<Utc>>,
    /// Normalized tag set: trimmed, deduplicated, stable order.
    pub tags: Vec<String>,
}

impl Entry {
    /// Final path segment, derived from `path`.
    pub fn name(&self) -> &str {
        name_of(&self.path)
    }

    fn new_folder(path: String, description: &str) -> Self {
        Entry {
            id: Uuid::new_v4().to_string(),
            kind: EntryKind::Folder,
            path,
            description: description.to_string(),
            mime_type: None,
            file_type: "folder".to_string(),
            size: None,
            modified: Some(Utc::now()),
            tags: Vec::new(),
        }
    }

    fn new_file(path: String, description: &str, mime_type: Option<String>, size: u64) -> Self {
        let file_type = file_type_for(mime_type.as_deref());
        Entry {
            id: Uuid::new_v4().to_string(),
            kind: EntryKind::File,
            path,
            description: description.to_string(),
            mime_type,
            file_type,
            size: Some(size),
            modified: Some(Utc::now()),
            tags: Vec::new(),
        }
    }
}

/// Coarse UI file class from a MIME type's primary component.
fn file_type_for(mime: Option<&str>) -> String {
    match mime.and_then(|m| m.split('/').next()) {
        Some(primary @ ("text" | "image" | "audio" | "video")) => primary.to_string(),
        _ => "file".to_string(),
    }
}

// Wire format: {id, type, mimeType?, description, name, path, fileType,
// size?, modified?, tags}. Serialized by hand so `name` is always the derived
// value and optional fields are omitted when absent.
impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut len = 7;
        if self.mime_type.is_some() { len += 1; }
        if self.size.is_some() { len += 1; }
        if self.modified.is_some() { len += 1; }
        let mut st = serializer.serialize_struct("Entry", len)?;
        st.serialize_field("id", &self.id)?;
        st.serialize_field("type", self.kind.as_str())?;
        if let Some(m) = &self.mime_type {
            st.serialize_field("mimeType", m)?;
        }
        st.serialize_field("description", &self.description)?;
        st.serialize_field("name", self.name())?;
        st.serialize_field("path", &self.path)?;
        st.serialize_field("fileType", &self.file_type)?;
        if let Some(sz) = self.size {
            st.serialize_field("size", &sz)?;
        }
        if let Some(m) = &self.modified {
            st.serialize_field("modified", &m.to_rfc3339())?;
        }
        st.serialize_field("tags", &self.tags)?;
        st.end()
    }
}

/// One uploaded item, as extracted from a multipart part by the adapter.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Declared filename; folder uploads carry relative paths here.
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size: u64,
}

/// An upload item that failed validation and was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedUpload {
    pub name: String,
    pub reason: String,
}

/// Outcome of a best-effort multi-item upload: committed entries plus the
/// per-item failures. Committed items stay committed regardless of later
/// failures in the same batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub created: Vec<Entry>,
    pub skipped: Vec<SkippedUpload>,
}

/// The in-memory index: flat path-keyed map as the source of truth, an
/// insertion-order list backing stable `scan` results, and a lexicographic
/// path set for boundary-safe subtree range queries.
///
/// All three structures mutate together under `&mut self`; the shared handle's
/// write lock makes every operation one atomic transition.
pub struct FsIndex {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
    sorted: BTreeSet<String>,
}

impl FsIndex {
    pub fn new() -> Self {
        FsIndex { entries: HashMap::new(), order: Vec::new(), sorted: BTreeSet::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the entry at an exact normalized path.
    pub fn get(&self, path: &str) -> Option<Entry> {
        self.entries.get(path).cloned()
    }

    // -- internal structure maintenance -------------------------------------

    fn insert_new(&mut self, entry: Entry) -> Entry {
        let snapshot = entry.clone();
        self.order.push(entry.path.clone());
        self.sorted.insert(entry.path.clone());
        self.entries.insert(entry.path.clone(), entry);
        snapshot
    }

    fn remove_at(&mut self, path: &str) -> Option<Entry> {
        let removed = self.entries.remove(path)?;
        self.sorted.remove(path);
        self.order.retain(|p| p != path);
        Some(removed)
    }

    /// Move one entry to a free path, preserving its insertion-order slot and
    /// bumping `modified`. The caller has already checked both endpoints.
    fn move_path(&mut self, old: &str, new: String) -> Option<Entry> {
        let mut entry = self.entries.remove(old)?;
        entry.path = new.clone();
        entry.modified = Some(Utc::now());
        self.sorted.remove(old);
        self.sorted.insert(new.clone());
        if let Some(slot) = self.order.iter_mut().find(|p| p.as_str() == old) {
            *slot = new.clone();
        }
        let snapshot = entry.clone();
        self.entries.insert(new, entry);
        Some(snapshot)
    }

    /// Paths of the entry at `folder` (if present) and everything nested under
    /// it, boundary-safe, in lexicographic order.
    fn subtree_paths(&self, folder: &str) -> Vec<String> {
        let mut out = Vec::new();
        if self.entries.contains_key(folder) {
            out.push(folder.to_string());
        }
        let lo = child_prefix(folder);
        let hi = subtree_upper_bound(folder);
        for p in self.sorted.range(lo..hi) {
            if p != folder {
                out.push(p.clone());
            }
        }
        out
    }

    // -- read operations ----------------------------------------------------

    /// Every entry whose path starts with the raw prefix, in insertion order.
    /// Plain string-prefix semantics: `scan("/")` includes the root folder.
    pub fn scan(&self, prefix: &str) -> Vec<Entry> {
        self.order
            .iter()
            .filter(|p| p.starts_with(prefix))
            .filter_map(|p| self.entries.get(p).cloned())
            .collect()
    }

    /// Names of the direct children of `path`, in insertion order. The folder
    /// itself is never listed as its own child.
    pub fn list(&self, path: &str) -> AppResult<Vec<String>> {
        let folder = normalize_path(path)?;
        Ok(self
            .order
            .iter()
            .filter(|p| is_direct_child(p, &folder))
            .map(|p| name_of(p).to_string())
            .collect())
    }

    // -- single-entry mutations ---------------------------------------------

    /// Insert a new Folder entry at `path` with an explicit description.
    /// Fails with Conflict when the path is already occupied.
    pub fn insert_folder(&mut self, path: &str, description: &str) -> AppResult<Entry> {
        let norm = normalize_path(path)?;
        if self.entries.contains_key(&norm) {
            return Err(AppError::conflict("path_exists", format!("{} already exists", norm)));
        }
        debug!(target: "filedex::index", "create: path='{}' kind='folder'", norm);
        Ok(self.insert_new(Entry::new_folder(norm, description)))
    }

    /// Insert a new File entry at `path` with explicit metadata.
    pub fn insert_file(
        &mut self,
        path: &str,
        description: &str,
        mime_type: Option<String>,
        size: u64,
    ) -> AppResult<Entry> {
        let norm = normalize_path(path)?;
        if self.entries.contains_key(&norm) {
            return Err(AppError::conflict("path_exists", format!("{} already exists", norm)));
        }
        debug!(target: "filedex::index", "create: path='{}' kind='file'", norm);
        Ok(self.insert_new(Entry::new_file(norm, description, mime_type, size)))
    }

    /// Insert a new entry at `path` with the default description for its kind.
    pub fn create(&mut self, path: &str, kind: EntryKind) -> AppResult<Entry> {
        match kind {
            EntryKind::Folder => self.insert_folder(path, "New folder"),
            EntryKind::File => self.insert_file(path, "New file", None, 0),
        }
    }

    /// Create a folder and any missing intermediate ancestors in one call.
    /// Idempotent on ancestors; Conflict when the leaf already exists as a
    /// Folder, TypeConflict when the leaf or an ancestor exists as a File.
    pub fn makedirs(&mut self, path: &str) -> AppResult<Entry> {
        let norm = normalize_path(path)?;
        match self.entries.get(&norm) {
            Some(existing) if existing.kind == EntryKind::Folder => {
                return Err(AppError::conflict("path_exists", format!("{} already exists", norm)));
            }
            Some(_) => {
                return Err(AppError::type_conflict(
                    "kind_mismatch",
                    format!("{} exists and is not a folder", norm),
                ));
            }
            None => {}
        }
        for ancestor in ancestors_of(&norm) {
            match self.entries.get(&ancestor) {
                Some(e) if e.kind == EntryKind::File => {
                    return Err(AppError::type_conflict(
                        "kind_mismatch",
                        format!("{} exists and is not a folder", ancestor),
                    ));
                }
                Some(_) => {}
                None => {
                    let folder = Entry::new_folder(ancestor, "New directories");
                    self.insert_new(folder);
                }
            }
        }
        debug!(target: "filedex::index", "makedirs: path='{}'", norm);
        Ok(self.insert_new(Entry::new_folder(norm, "New directories")))
    }

    /// Delete exactly the single entry at `path`, of either kind.
    pub fn remove(&mut self, path: &str) -> AppResult<()> {
        let norm = normalize_path(path)?;
        match self.remove_at(&norm) {
            Some(_) => {
                debug!(target: "filedex::index", "remove: path='{}'", norm);
                Ok(())
            }
            None => Err(AppError::not_found("path_not_found", format!("{} not found", norm))),
        }
    }

    /// Delete a single empty folder. NotFound when absent, TypeConflict for a
    /// File, Conflict when the folder still has nested entries.
    pub fn rmdir(&mut self, path: &str) -> AppResult<()> {
        let norm = normalize_path(path)?;
        if norm == ROOT {
            return Err(AppError::invalid("root_removal", "the root folder cannot be removed"));
        }
        let entry = self
            .entries
            .get(&norm)
            .ok_or_else(|| AppError::not_found("path_not_found", format!("{} not found", norm)))?;
        if entry.kind != EntryKind::Folder {
            return Err(AppError::type_conflict("kind_mismatch", format!("{} is not a folder", norm)));
        }
        if self.subtree_paths(&norm).len() > 1 {
            return Err(AppError::conflict("folder_not_empty", format!("{} is not empty", norm)));
        }
        let _ = self.remove_at(&norm);
        debug!(target: "filedex::index", "rmdir: path='{}'", norm);
        Ok(())
    }

    /// Delete `path` and every entry nested under it. The matched set is
    /// boundary-safe: siblings sharing a string prefix are untouched.
    pub fn remove_subtree(&mut self, path: &str) -> AppResult<usize> {
        let norm = normalize_path(path)?;
        if norm == ROOT {
            return Err(AppError::invalid("root_removal", "the root folder cannot be removed"));
        }
        let matched = self.subtree_paths(&norm);
        if matched.is_empty() {
            return Err(AppError::not_found("path_not_found", format!("{} not found", norm)));
        }
        for p in &matched {
            let _ = self.remove_at(p);
        }
        debug!(target: "filedex::index", "remove_subtree: path='{}' removed={}", norm, matched.len());
        Ok(matched.len())
    }

    /// Move exactly one entry. Never overwrites: an occupied destination is a
    /// Conflict (see `replace` for overwrite semantics).
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> AppResult<Entry> {
        let old = normalize_path(old_path)?;
        let new = normalize_path(new_path)?;
        if old == ROOT {
            return Err(AppError::invalid("root_rename", "the root folder cannot be moved"));
        }
        if !self.entries.contains_key(&old) {
            return Err(AppError::not_found("path_not_found", format!("{} not found", old)));
        }
        if self.entries.contains_key(&new) {
            return Err(AppError::conflict("path_exists", format!("{} already exists", new)));
        }
        let moved = self
            .move_path(&old, new.clone())
            .ok_or_else(|| AppError::internal("index_corrupt", format!("{} vanished during rename", old)))?;
        debug!(target: "filedex::index", "rename: '{}' -> '{}'", old, new);
        Ok(moved)
    }

    /// Move `old_path` and all nested entries, substituting the prefix and
    /// preserving each relative suffix. All-or-nothing: every destination is
    /// checked before any entry moves, so no partial rewrite is ever visible.
    pub fn rename_subtree(&mut self, old_path: &str, new_path: &str) -> AppResult<usize> {
        let old = normalize_path(old_path)?;
        let new = normalize_path(new_path)?;
        if old == ROOT {
            return Err(AppError::invalid("root_rename", "the root folder cannot be moved"));
        }
        if paths::is_within(&new, &old) {
            return Err(AppError::invalid(
                "nested_target",
                format!("cannot move {} inside itself ({})", old, new),
            ));
        }
        let matched = self.subtree_paths(&old);
        if matched.is_empty() {
            return Err(AppError::not_found("path_not_found", format!("{} not found", old)));
        }
        let matched_set: HashSet<&str> = matched.iter().map(|s| s.as_str()).collect();
        let moves: Vec<(String, String)> = matched
            .iter()
            .map(|p| (p.clone(), format!("{}{}", new, &p[old.len()..])))
            .collect();
        for (_, target) in &moves {
            if self.entries.contains_key(target) && !matched_set.contains(target.as_str()) {
                return Err(AppError::conflict("path_exists", format!("{} already exists", target)));
            }
        }
        // Two phases: detach every matched entry first, then reinsert at the
        // rewritten paths. A rewritten target may equal a not-yet-moved source
        // (e.g. collapsing "/a/b" onto "/a"), so moving entries one at a time
        // would overwrite live entries mid-rewrite.
        let now = Utc::now();
        let mut detached: Vec<(String, Entry)> = Vec::with_capacity(moves.len());
        for (from, to) in &moves {
            if let Some(mut entry) = self.entries.remove(from) {
                self.sorted.remove(from);
                entry.path = to.clone();
                entry.modified = Some(now);
                detached.push((to.clone(), entry));
            }
        }
        let rewrites: HashMap<&str, &str> =
            moves.iter().map(|(f, t)| (f.as_str(), t.as_str())).collect();
        for slot in self.order.iter_mut() {
            if let Some(to) = rewrites.get(slot.as_str()) {
                *slot = (*to).to_string();
            }
        }
        for (to, entry) in detached {
            self.sorted.insert(to.clone());
            self.entries.insert(to, entry);
        }
        crate::tprintln!("index rename_subtree ok {} -> {} moved={}", old, new, moves.len());
        debug!(target: "filedex::index", "rename_subtree: '{}' -> '{}' moved={}", old, new, moves.len());
        Ok(moves.len())
    }

    /// Like `rename`, but an occupied destination is removed first and the
    /// source takes its place in the same atomic step.
    pub fn replace(&mut self, src: &str, dest: &str) -> AppResult<Entry> {
        let src = normalize_path(src)?;
        let dest = normalize_path(dest)?;
        if src == ROOT {
            return Err(AppError::invalid("root_rename", "the root folder cannot be moved"));
        }
        if !self.entries.contains_key(&src) {
            return Err(AppError::not_found("path_not_found", format!("{} not found", src)));
        }
        if src == dest {
            return self
                .get(&src)
                .ok_or_else(|| AppError::internal("index_corrupt", format!("{} vanished during replace", src)));
        }
        let _ = self.remove_at(&dest);
        let moved = self
            .move_path(&src, dest.clone())
            .ok_or_else(|| AppError::internal("index_corrupt", format!("{} vanished during replace", src)))?;
        debug!(target: "filedex::index", "replace: '{}' -> '{}'", src, dest);
        Ok(moved)
    }

    /// Replace the tag set wholesale (no merge). Tags are normalized: trimmed,
    /// empties dropped, duplicates collapsed, stable order. No other field
    /// changes, and `modified` is left untouched.
    pub fn update_tags(&mut self, path: &str, tags: &[String]) -> AppResult<Entry> {
        let norm = normalize_path(path)?;
        let entry = self
            .entries
            .get_mut(&norm)
            .ok_or_else(|| AppError::not_found("path_not_found", format!("{} not found", norm)))?;
        let mut tag_set: BTreeSet<String> = BTreeSet::new();
        for t in tags {
            let tt = t.trim();
            if !tt.is_empty() {
                tag_set.insert(tt.to_string());
            }
        }
        entry.tags = tag_set.into_iter().collect();
        Ok(entry.clone())
    }

    /// Duplicate the entry at `source` (and, for a Folder, its whole subtree)
    /// into fresh-id entries under `destination`. Conflicts anywhere in the
    /// target set abort the whole copy.
    pub fn copy(&mut self, source: &str, destination: &str) -> AppResult<usize> {
        let src = normalize_path(source)?;
        let dest = normalize_path(destination)?;
        if src == ROOT {
            return Err(AppError::invalid("root_copy", "the root folder cannot be copied"));
        }
        if paths::is_within(&dest, &src) {
            return Err(AppError::invalid(
                "nested_target",
                format!("cannot copy {} inside itself ({})", src, dest),
            ));
        }
        let src_entry = self
            .entries
            .get(&src)
            .ok_or_else(|| AppError::not_found("path_not_found", format!("{} not found", src)))?;
        let matched = match src_entry.kind {
            EntryKind::Folder => self.subtree_paths(&src),
            EntryKind::File => vec![src.clone()],
        };
        let copies: Vec<(String, String)> = matched
            .iter()
            .map(|p| (p.clone(), format!("{}{}", dest, &p[src.len()..])))
            .collect();
        for (_, target) in &copies {
            if self.entries.contains_key(target) {
                return Err(AppError::conflict("path_exists", format!("{} already exists", target)));
            }
        }
        let now = Utc::now();
        for (from, to) in &copies {
            let mut dup = self
                .entries
                .get(from)
                .cloned()
                .ok_or_else(|| AppError::internal("index_corrupt", format!("{} vanished during copy", from)))?;
            dup.id = Uuid::new_v4().to_string();
            dup.path = to.clone();
            dup.modified = Some(now);
            self.insert_new(dup);
        }
        debug!(target: "filedex::index", "copy: '{}' -> '{}' copied={}", src, dest, copies.len());
        Ok(copies.len())
    }

    /// Create one File entry under `folder` per uploaded item, all with the
    /// caller's `description` (single-file and folder uploads label their
    /// files differently). Best-effort: items that fail validation or collide
    /// with an existing path are skipped and reported; preceding items remain
    /// committed.
    pub fn ingest_uploads(
        &mut self,
        folder: &str,
        items: &[UploadItem],
        description: &str,
    ) -> AppResult<IngestReport> {
        let dir = normalize_path(folder)?;
        let mut report = IngestReport::default();
        for item in items {
            let target = match join_upload_path(&dir, &item.file_name) {
                Ok(t) => t,
                Err(e) => {
                    report.skipped.push(SkippedUpload {
                        name: item.file_name.clone(),
                        reason: e.message().to_string(),
                    });
                    continue;
                }
            };
            if self.entries.contains_key(&target) {
                report.skipped.push(SkippedUpload {
                    name: item.file_name.clone(),
                    reason: format!("{} already exists", target),
                });
                continue;
            }
            let entry = Entry::new_file(target, description, item.mime_type.clone(), item.size);
            report.created.push(self.insert_new(entry));
        }
        crate::tprintln!(
            "index ingest_uploads dir={} created={} skipped={}",
            dir,
            report.created.len(),
            report.skipped.len()
        );
        debug!(target: "filedex::index", "ingest_uploads: dir='{}' created={} skipped={}",
            dir, report.created.len(), report.skipped.len());
        Ok(report)
    }
}

impl Default for FsIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle around the index, cloned into every handler. Writers
/// serialize on the write lock; `scan`/`list` run under the read lock and
/// return owned snapshots.
#[derive(Clone)]
pub struct SharedIndex(pub Arc<RwLock<FsIndex>>);

impl SharedIndex {
    pub fn new() -> Self {
        SharedIndex(Arc::new(RwLock::new(FsIndex::new())))
    }
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self::new()
    }
}
