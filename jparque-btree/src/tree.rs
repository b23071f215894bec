//! B+Tree engine over the page manager.
//!
//! Leaves hold `(key, inline value | overflow reference)` pairs; branches
//! hold `(separator, child page id)` pairs where each separator is the
//! minimum key of its child's subtree, maintained at insert and split
//! time. Descent therefore always routes to the last separator `<= key`
//! (child 0 when the key sorts before every separator). Leaf pages chain
//! to their right sibling through the header successor field, which range
//! scans follow across leaf boundaries.

use crate::page::{
    ELEM_SIZE, FLAG_BRANCH, FLAG_FREELIST, FLAG_LEAF, FLAG_OVERFLOW, PAGE_HEADER_SIZE, Page,
};
use crate::pager::{DEFAULT_PAGE_SIZE, PageId, PageManager};
use jparque_result::{Error, Result};
use jparque_storage::{
    FieldMap, Record, StorageEngine, decode_field_map, encode_field_map,
};
use rustc_hash::FxHashSet;
use std::path::Path;

/// Bytes held back when sizing an insertion, so borderline entries split
/// instead of landing exactly on the page boundary.
const SAFETY_MARGIN: usize = 32;

/// Upper bound on a single reassembled overflow value.
const MAX_OVERFLOW_VALUE: usize = 50 * 1024 * 1024;

/// Upper bound on tree depth during descent; anything deeper is a cycle.
const MAX_DESCENT_DEPTH: usize = 64;

/// Ordered key/value store over a paged file.
///
/// `scan` treats its end bound as *inclusive*.
pub struct BTreeEngine {
    pager: PageManager,
    root: PageId,
    degree: usize,
    closed: bool,
}

impl BTreeEngine {
    /// Open or create a tree at `path` with the default 4 KiB page size.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_page_size(path, DEFAULT_PAGE_SIZE)
    }

    /// Open or create a tree with a custom page size.
    pub fn open_with_page_size(path: &Path, page_size: usize) -> Result<Self> {
        let mut pager = PageManager::open(path, page_size)?;
        let degree = (page_size - PAGE_HEADER_SIZE) / (2 * ELEM_SIZE);

        let root = match pager.root() {
            0 => Self::create_root(&mut pager)?,
            remembered => match pager.read_page(remembered) {
                Ok(page) if page.is_leaf() || page.is_branch() => remembered,
                // Wrong role or unreadable: the root pointer is stale.
                // Reinitialize a fresh root rather than serving garbage.
                _ => Self::create_root(&mut pager)?,
            },
        };

        Ok(Self {
            pager,
            root,
            degree,
            closed: false,
        })
    }

    fn create_root(pager: &mut PageManager) -> Result<PageId> {
        let id = pager.allocate_page()?;
        let mut page = Page::new(pager.page_size());
        page.set_id(id);
        page.set_flags(FLAG_LEAF);
        pager.write_page(&page)?;
        pager.set_root(id)?;
        Ok(id)
    }

    /// Current root page id.
    #[inline]
    pub fn root_id(&self) -> PageId {
        self.root
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.pager.page_size()
    }

    // ------------------------------ descent ------------------------------

    /// Walk from the root to the leaf that owns `key`, recording the
    /// branch path for split propagation.
    fn descend(&mut self, key: &[u8]) -> Result<(Page, Vec<PageId>)> {
        let mut path = Vec::new();
        let mut id = self.root;
        for _ in 0..MAX_DESCENT_DEPTH {
            let page = self.pager.read_page(id)?;
            if page.is_leaf() {
                return Ok((page, path));
            }
            if !page.is_branch() {
                return Err(Error::corrupt(format!(
                    "page {id} on the descent path is neither leaf nor branch"
                )));
            }
            path.push(id);
            let idx = Self::child_index(&page, key);
            id = Self::child_id(&page, idx)?;
        }
        Err(Error::corrupt("descent exceeded maximum tree depth"))
    }

    /// Index of the child to follow: the last separator `<= key`, or 0
    /// when the key sorts before every separator.
    fn child_index(page: &Page, key: &[u8]) -> usize {
        match page.find_slot(key) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        }
    }

    fn child_id(page: &Page, index: usize) -> Result<PageId> {
        let elem = page.element(index).ok_or_else(|| {
            Error::corrupt(format!("branch page {} has no child {index}", page.id()))
        })?;
        let value = elem.value();
        let bytes: [u8; 8] = value.try_into().map_err(|_| {
            Error::corrupt(format!(
                "branch page {} child {index} pointer is {} bytes, expected 8",
                page.id(),
                value.len()
            ))
        })?;
        let child = u64::from_be_bytes(bytes);
        if child == 0 {
            return Err(Error::corrupt(format!(
                "branch page {} child {index} points at the meta page",
                page.id()
            )));
        }
        Ok(child)
    }

    // ------------------------------- write -------------------------------

    fn write_record(&mut self, key: &[u8], value: &FieldMap) -> Result<()> {
        self.ensure_open()?;
        if key.is_empty() {
            return Err(Error::invalid("keys must not be empty"));
        }

        let encoded = encode_field_map(value);
        let (mut leaf, path) = self.descend(key)?;

        // An existing entry can be overwritten in place only when the new
        // bytes match the stored length; otherwise drop it (releasing its
        // overflow chain) and insert fresh.
        if let Ok(pos) = leaf.find_slot(key) {
            let (has_overflow, head, old_len) = {
                let elem = leaf
                    .element(pos)
                    .ok_or_else(|| Error::Internal("matched slot vanished".to_string()))?;
                (elem.has_overflow(), elem.overflow_page_id(), elem.value_size())
            };
            if has_overflow {
                let head = head.ok_or_else(|| {
                    Error::corrupt("overflow element without an 8-byte chain reference")
                })?;
                self.free_overflow_chain(head)?;
            }
            if encoded.len() == old_len {
                // The payload slot is already the right size.
                if leaf.put_element(key, &encoded, false) {
                    return self.pager.write_page(&leaf);
                }
                return Err(Error::Internal(
                    "same-length overwrite rejected by the page".to_string(),
                ));
            }
            leaf = Self::rebuild_without(&leaf, pos);
        }

        let budget = leaf
            .free_space()
            .saturating_sub(ELEM_SIZE + key.len())
            .saturating_sub(SAFETY_MARGIN);

        if encoded.len() <= budget {
            if leaf.put_element(key, &encoded, false) {
                return self.pager.write_page(&leaf);
            }
        } else {
            let head = self.create_overflow_chain(&encoded)?;
            if leaf.put_element(key, &head.to_be_bytes(), true) {
                return self.pager.write_page(&leaf);
            }
            // The page could not take even the 8-byte reference; release
            // the fresh chain and let the split re-place the value.
            self.free_overflow_chain(head)?;
        }

        self.split_leaf(leaf, key, encoded, path)
    }

    // ------------------------------- split -------------------------------

    fn split_leaf(
        &mut self,
        leaf: Page,
        key: &[u8],
        encoded: Vec<u8>,
        path: Vec<PageId>,
    ) -> Result<()> {
        struct Entry {
            key: Vec<u8>,
            value: Vec<u8>,
            overflow: bool,
            fresh: bool,
        }

        let mut entries: Vec<Entry> = leaf
            .entries()
            .into_iter()
            .map(|(key, value, overflow)| Entry {
                key,
                value,
                overflow,
                fresh: false,
            })
            .collect();
        let new_entry = Entry {
            key: key.to_vec(),
            value: encoded,
            overflow: false,
            fresh: true,
        };
        match entries.binary_search_by(|e| e.key.as_slice().cmp(key)) {
            Ok(i) => entries[i] = new_entry,
            Err(i) => entries.insert(i, new_entry),
        }
        if entries.len() < 2 {
            return Err(Error::Internal(
                "leaf split with fewer than two entries".to_string(),
            ));
        }

        let split = (self.degree / 2).clamp(1, entries.len() - 1);
        let right_id = self.pager.allocate_page()?;
        let left_id = leaf.id();
        let old_next = leaf.overflow();

        let mut left = Page::new(self.pager.page_size());
        left.set_id(left_id);
        left.set_flags(FLAG_LEAF);
        left.set_overflow(right_id);

        let mut right = Page::new(self.pager.page_size());
        right.set_id(right_id);
        right.set_flags(FLAG_LEAF);
        right.set_overflow(old_next);

        let promoted = entries[split].key.clone();
        let left_min = entries[0].key.clone();

        for entry in &entries[..split] {
            self.place_entry(&mut left, entry.key.as_slice(), &entry.value, entry.overflow, entry.fresh)?;
        }
        for entry in &entries[split..] {
            self.place_entry(&mut right, entry.key.as_slice(), &entry.value, entry.overflow, entry.fresh)?;
        }

        self.pager.write_page(&left)?;
        self.pager.write_page(&right)?;
        self.insert_into_parent(path, left_id, left_min, promoted, right_id)
    }

    /// Put one entry into a freshly rebuilt split half. Carried-over
    /// entries keep their stored form; the triggering entry re-decides
    /// inline versus overflow against the half's actual budget.
    fn place_entry(
        &mut self,
        page: &mut Page,
        key: &[u8],
        value: &[u8],
        overflow: bool,
        fresh: bool,
    ) -> Result<()> {
        if !fresh {
            if page.put_element(key, value, overflow) {
                return Ok(());
            }
            return Err(Error::Internal(
                "split half rejected a carried-over entry".to_string(),
            ));
        }

        let budget = page
            .free_space()
            .saturating_sub(ELEM_SIZE + key.len() + SAFETY_MARGIN);
        if value.len() <= budget {
            if page.put_element(key, value, false) {
                return Ok(());
            }
        } else {
            let head = self.create_overflow_chain(value)?;
            if page.put_element(key, &head.to_be_bytes(), true) {
                return Ok(());
            }
            self.free_overflow_chain(head)?;
        }
        Err(Error::Internal(
            "split half rejected the triggering entry".to_string(),
        ))
    }

    fn split_branch(
        &mut self,
        branch: Page,
        separator: Vec<u8>,
        child: PageId,
        path: Vec<PageId>,
    ) -> Result<()> {
        let mut entries: Vec<(Vec<u8>, u64)> = Vec::with_capacity(branch.count() + 1);
        for i in 0..branch.count() {
            let elem = branch.element(i).ok_or_else(|| {
                Error::corrupt(format!("branch page {} slot {i} unreadable", branch.id()))
            })?;
            entries.push((elem.key().to_vec(), Self::child_id(&branch, i)?));
        }
        match entries.binary_search_by(|(k, _)| k.as_slice().cmp(&separator)) {
            Ok(i) => entries[i] = (separator.clone(), child),
            Err(i) => entries.insert(i, (separator.clone(), child)),
        }
        if entries.len() < 2 {
            return Err(Error::Internal(
                "branch split with fewer than two entries".to_string(),
            ));
        }

        let split = (self.degree / 2).clamp(1, entries.len() - 1);
        let right_id = self.pager.allocate_page()?;
        let left_id = branch.id();

        let mut left = Page::new(self.pager.page_size());
        left.set_id(left_id);
        left.set_flags(FLAG_BRANCH);

        let mut right = Page::new(self.pager.page_size());
        right.set_id(right_id);
        right.set_flags(FLAG_BRANCH);

        let promoted = entries[split].0.clone();
        let left_min = entries[0].0.clone();

        for (k, c) in &entries[..split] {
            if !left.put_element(k, &c.to_be_bytes(), false) {
                return Err(Error::Internal(
                    "branch split half rejected an entry".to_string(),
                ));
            }
        }
        for (k, c) in &entries[split..] {
            if !right.put_element(k, &c.to_be_bytes(), false) {
                return Err(Error::Internal(
                    "branch split half rejected an entry".to_string(),
                ));
            }
        }

        self.pager.write_page(&left)?;
        self.pager.write_page(&right)?;
        self.insert_into_parent(path, left_id, left_min, promoted, right_id)
    }

    /// Register a freshly split-off right sibling with its parent,
    /// growing a new root when the split reached the top.
    fn insert_into_parent(
        &mut self,
        mut path: Vec<PageId>,
        left_id: PageId,
        left_min: Vec<u8>,
        separator: Vec<u8>,
        right_id: PageId,
    ) -> Result<()> {
        let Some(parent_id) = path.pop() else {
            let root_id = self.pager.allocate_page()?;
            let mut root = Page::new(self.pager.page_size());
            root.set_id(root_id);
            root.set_flags(FLAG_BRANCH);
            if !root.put_element(&left_min, &left_id.to_be_bytes(), false)
                || !root.put_element(&separator, &right_id.to_be_bytes(), false)
            {
                return Err(Error::Internal(
                    "new root rejected its two child pointers".to_string(),
                ));
            }
            self.pager.write_page(&root)?;
            self.root = root_id;
            return self.pager.set_root(root_id);
        };

        let parent = self.pager.read_page(parent_id)?;
        let mut parent = self.refresh_left_separator(parent, left_id, &left_min)?;
        if parent.put_element(&separator, &right_id.to_be_bytes(), false) {
            return self.pager.write_page(&parent);
        }
        self.split_branch(parent, separator, right_id, path)
    }

    /// Lower the parent separator for `left_id` to `left_min` when needed.
    ///
    /// Descent clamps keys smaller than every separator into child 0, so
    /// the first child may hold keys below its stored separator. When that
    /// child splits, the promoted key can sort before the stale separator;
    /// the separator must drop to the left half's minimum first or the
    /// parent's entry order stops matching its children's key ranges.
    fn refresh_left_separator(
        &mut self,
        parent: Page,
        left_id: PageId,
        left_min: &[u8],
    ) -> Result<Page> {
        let mut left_slot = None;
        for i in 0..parent.count() {
            if Self::child_id(&parent, i)? == left_id {
                left_slot = Some(i);
                break;
            }
        }
        let slot = left_slot.ok_or_else(|| {
            Error::corrupt(format!(
                "branch page {} has no entry for child {left_id}",
                parent.id()
            ))
        })?;

        let stale = match parent.element(slot) {
            Some(elem) => left_min < elem.key(),
            None => false,
        };
        if !stale {
            return Ok(parent);
        }

        let mut fresh = Page::new(parent.size());
        fresh.set_id(parent.id());
        fresh.set_flags(parent.flags());
        fresh.set_overflow(parent.overflow());
        for (i, (key, value, overflow)) in parent.entries().into_iter().enumerate() {
            let key: &[u8] = if i == slot { left_min } else { &key };
            if !fresh.put_element(key, &value, overflow) {
                return Err(Error::Internal(
                    "branch page rejected a separator refresh".to_string(),
                ));
            }
        }
        Ok(fresh)
    }

    // ------------------------------ overflow -----------------------------

    /// Lay `value` down as a chain of overflow pages and return the head
    /// id. Each page carries up to `page_size - header` payload bytes,
    /// its chunk length in the count field, and a successor link (0 ends
    /// the chain).
    fn create_overflow_chain(&mut self, value: &[u8]) -> Result<PageId> {
        let data_per_page = self.pager.page_size() - PAGE_HEADER_SIZE;
        let pages_needed = value.len().div_ceil(data_per_page).max(1);

        let ids: Vec<PageId> = (0..pages_needed)
            .map(|_| self.pager.allocate_page())
            .collect::<Result<_>>()?;

        for (i, &id) in ids.iter().enumerate() {
            let offset = i * data_per_page;
            let chunk = &value[offset..(offset + data_per_page).min(value.len())];

            let mut page = Page::new(self.pager.page_size());
            page.set_id(id);
            page.set_flags(FLAG_OVERFLOW);
            page.set_count(chunk.len());
            page.set_overflow(if i + 1 < ids.len() { ids[i + 1] } else { 0 });
            page.data_mut()[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + chunk.len()]
                .copy_from_slice(chunk);
            self.pager.write_page(&page)?;
        }
        Ok(ids[0])
    }

    /// Reassemble a value by walking its overflow chain.
    fn read_overflow_chain(&mut self, head: PageId) -> Result<Vec<u8>> {
        let mut visited: FxHashSet<PageId> = FxHashSet::default();
        let mut out = Vec::new();
        let mut id = head;

        while id != 0 {
            if !visited.insert(id) {
                return Err(Error::corrupt(format!(
                    "cycle in overflow chain at page {id}"
                )));
            }
            let page = self.pager.read_page(id)?;
            if !page.is_overflow() {
                return Err(Error::corrupt(format!(
                    "page {id} in overflow chain has role flags {:#x}",
                    page.flags()
                )));
            }
            let len = page.count();
            if len > self.pager.page_size() - PAGE_HEADER_SIZE {
                return Err(Error::corrupt(format!(
                    "overflow page {id} claims {len} payload bytes"
                )));
            }
            out.extend_from_slice(&page.data()[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + len]);
            if out.len() > MAX_OVERFLOW_VALUE {
                return Err(Error::corrupt(format!(
                    "overflow value exceeds the {MAX_OVERFLOW_VALUE}-byte safety limit"
                )));
            }
            id = page.overflow();
        }
        Ok(out)
    }

    /// Mark every page of a chain as freelist. No freelist index exists;
    /// the pages are simply retired.
    fn free_overflow_chain(&mut self, head: PageId) -> Result<()> {
        let mut visited: FxHashSet<PageId> = FxHashSet::default();
        let mut id = head;
        while id != 0 && visited.insert(id) {
            let mut page = self.pager.read_page(id)?;
            if !page.is_overflow() {
                return Err(Error::corrupt(format!(
                    "page {id} in overflow chain has role flags {:#x}",
                    page.flags()
                )));
            }
            let next = page.overflow();
            page.set_flags(FLAG_FREELIST);
            self.pager.write_page(&page)?;
            id = next;
        }
        Ok(())
    }

    // ----------------------------- read/scan -----------------------------

    fn read_record(&mut self, key: &[u8]) -> Result<Option<FieldMap>> {
        self.ensure_open()?;
        if key.is_empty() {
            return Ok(None);
        }
        let (leaf, _) = self.descend(key)?;
        let Ok(pos) = leaf.find_slot(key) else {
            return Ok(None);
        };
        let fields = self.materialize(&leaf, pos)?;
        Ok(Some(fields))
    }

    /// Decode the value stored at `pos`, following an overflow chain when
    /// the element carries one.
    fn materialize(&mut self, leaf: &Page, pos: usize) -> Result<FieldMap> {
        let (has_overflow, head, inline) = {
            let elem = leaf
                .element(pos)
                .ok_or_else(|| Error::Internal("matched slot vanished".to_string()))?;
            (
                elem.has_overflow(),
                elem.overflow_page_id(),
                elem.value().to_vec(),
            )
        };
        let bytes = if has_overflow {
            let head = head.ok_or_else(|| {
                Error::corrupt("overflow element without an 8-byte chain reference")
            })?;
            self.read_overflow_chain(head)?
        } else {
            inline
        };
        Ok(decode_field_map(&bytes))
    }

    fn scan_range(
        &mut self,
        start_key: &[u8],
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<Record>> {
        self.ensure_open()?;
        let mut results = Vec::new();
        let (mut leaf, _) = self.descend(start_key)?;
        let mut visited: FxHashSet<PageId> = FxHashSet::default();

        loop {
            if !visited.insert(leaf.id()) {
                return Err(Error::corrupt(format!(
                    "cycle in leaf sibling chain at page {}",
                    leaf.id()
                )));
            }
            for i in 0..leaf.count() {
                let key = match leaf.element(i) {
                    Some(e) => e.key().to_vec(),
                    None => continue,
                };
                if key.as_slice() < start_key {
                    continue;
                }
                // Inclusive end bound.
                if let Some(end) = end_key {
                    if key.as_slice() > end {
                        return Ok(results);
                    }
                }
                let fields = self.materialize(&leaf, i)?;
                results.push(Record::new(key, project(fields, columns)));
            }
            let next = leaf.overflow();
            if next == 0 {
                return Ok(results);
            }
            leaf = self.pager.read_page(next)?;
        }
    }

    // ------------------------------ delete -------------------------------

    fn delete_record(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if key.is_empty() {
            return Ok(());
        }
        let (leaf, _) = self.descend(key)?;
        let Ok(pos) = leaf.find_slot(key) else {
            return Ok(());
        };

        if let Some(elem) = leaf.element(pos) {
            if elem.has_overflow() {
                let head = elem.overflow_page_id().ok_or_else(|| {
                    Error::corrupt("overflow element without an 8-byte chain reference")
                })?;
                self.free_overflow_chain(head)?;
            }
        }

        let rebuilt = Self::rebuild_without(&leaf, pos);
        self.pager.write_page(&rebuilt)
    }

    /// Rebuild a leaf with entry `skip` dropped, preserving identity,
    /// role, and the sibling link.
    fn rebuild_without(leaf: &Page, skip: usize) -> Page {
        let mut fresh = Page::new(leaf.size());
        fresh.set_id(leaf.id());
        fresh.set_flags(leaf.flags());
        fresh.set_overflow(leaf.overflow());
        for (i, (key, value, overflow)) in leaf.entries().into_iter().enumerate() {
            if i != skip {
                // Entries came out of the same page; the rebuild cannot
                // run out of room.
                fresh.put_element(&key, &value, overflow);
            }
        }
        fresh
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Internal("engine is closed".to_string()));
        }
        Ok(())
    }

    // ----------------------------- integrity ----------------------------

    /// Walk the whole tree, checking structural invariants, and return
    /// aggregate statistics. Intended for tests and diagnostics.
    ///
    /// Checked per page: the directory is sorted ascending with no
    /// duplicate keys; header, directory, and payloads fit the page; every
    /// leaf sits at the same depth; for every branch entry past the first,
    /// the separator lower-bounds all keys in its child's subtree; every
    /// overflow reference leads to a well-formed chain.
    pub fn verify(&mut self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let root = self.root;
        self.verify_page(root, 1, None, &mut stats)?;
        Ok(stats)
    }

    fn verify_page(
        &mut self,
        id: PageId,
        depth: usize,
        lower_bound: Option<Vec<u8>>,
        stats: &mut TreeStats,
    ) -> Result<()> {
        if depth > MAX_DESCENT_DEPTH {
            return Err(Error::corrupt("verification exceeded maximum tree depth"));
        }
        let page = self.pager.read_page(id)?;

        let mut payload_bytes = 0usize;
        let mut previous_key: Option<Vec<u8>> = None;
        for i in 0..page.count() {
            let elem = page.element(i).ok_or_else(|| {
                Error::corrupt(format!("page {id} slot {i} is unreadable"))
            })?;
            let key = elem.key().to_vec();
            if key.is_empty() {
                return Err(Error::corrupt(format!("page {id} slot {i} has an empty key")));
            }
            if let Some(prev) = &previous_key {
                if *prev >= key {
                    return Err(Error::corrupt(format!(
                        "page {id} directory is not strictly sorted at slot {i}"
                    )));
                }
            }
            if let Some(bound) = &lower_bound {
                if key < *bound {
                    return Err(Error::corrupt(format!(
                        "page {id} slot {i} undercuts its branch separator"
                    )));
                }
            }
            payload_bytes += elem.key_size() + elem.value_size();
            previous_key = Some(key);
        }
        if PAGE_HEADER_SIZE + page.count() * ELEM_SIZE + payload_bytes > page.size() {
            return Err(Error::corrupt(format!(
                "page {id} accounts for more bytes than it holds"
            )));
        }

        if page.is_leaf() {
            stats.leaf_pages += 1;
            stats.entries += page.count();
            match stats.leaf_depth {
                None => stats.leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(Error::corrupt(format!(
                        "leaf {id} at depth {depth}, expected {expected}"
                    )));
                }
                Some(_) => {}
            }
            for i in 0..page.count() {
                let (has_overflow, head) = match page.element(i) {
                    Some(e) => (e.has_overflow(), e.overflow_page_id()),
                    None => continue,
                };
                if has_overflow {
                    let head = head.ok_or_else(|| {
                        Error::corrupt(format!(
                            "leaf {id} slot {i} has the overflow bit but no 8-byte reference"
                        ))
                    })?;
                    // Traversal validates roles, links, and size caps.
                    let value = self.read_overflow_chain(head)?;
                    stats.overflow_values += 1;
                    stats.overflow_bytes += value.len();
                }
            }
            return Ok(());
        }

        if !page.is_branch() {
            return Err(Error::corrupt(format!(
                "page {id} in the tree has role flags {:#x}",
                page.flags()
            )));
        }
        stats.branch_pages += 1;
        for i in 0..page.count() {
            let child = Self::child_id(&page, i)?;
            // Child 0 may legitimately hold keys below its separator
            // (descent clamps there), so only later children are bounded.
            let bound = if i == 0 {
                None
            } else {
                page.element(i).map(|e| e.key().to_vec())
            };
            self.verify_page(child, depth + 1, bound, stats)?;
        }
        Ok(())
    }
}

/// Aggregate results of [`BTreeEngine::verify`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeStats {
    pub leaf_pages: usize,
    pub branch_pages: usize,
    /// Number of key/value entries stored in leaves.
    pub entries: usize,
    /// Values stored through overflow chains.
    pub overflow_values: usize,
    /// Total reassembled size of all overflow values.
    pub overflow_bytes: usize,
    /// Uniform depth of every leaf, counted from the root at 1.
    pub leaf_depth: Option<usize>,
}

impl StorageEngine for BTreeEngine {
    fn write(&mut self, key: &[u8], value: FieldMap) -> Result<()> {
        self.write_record(key, &value)
    }

    fn write_batch(&mut self, records: Vec<Record>) -> Result<()> {
        for record in records {
            self.write_record(&record.key, &record.fields)?;
        }
        Ok(())
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<FieldMap>> {
        self.read_record(key)
    }

    fn scan(
        &mut self,
        start_key: &[u8],
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<Record>> {
        self.scan_range(start_key, end_key, columns)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.delete_record(key)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pager.close()
    }
}

fn project(fields: FieldMap, columns: Option<&[String]>) -> FieldMap {
    match columns {
        Some(cols) if !cols.is_empty() => {
            let mut projected = FieldMap::default();
            for col in cols {
                if let Some(v) = fields.get(col) {
                    projected.insert(col.clone(), v.clone());
                }
            }
            projected
        }
        _ => fields,
    }
}
