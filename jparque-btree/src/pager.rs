//! File-backed page manager.
//!
//! The manager is the only component that performs page I/O and the only
//! authority on page identifiers. Page `id` lives at file offset
//! `id * page_size`; id 0 is the meta page holding the allocation counter
//! in bytes 0..8 and the current tree root id in bytes 8..16. Reads flow
//! through a bounded LRU cache; mutations become visible only through
//! [`PageManager::write_page`].

use crate::page::Page;
use jparque_result::{Error, Result};
use rustc_hash::FxHashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Page identifier. Ids grow monotonically from 1; 0 is the meta page.
pub type PageId = u64;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Maximum number of pages held in the read cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Smallest page size that can hold a header, one slot, and a payload.
const MIN_PAGE_SIZE: usize = 64;

/// Largest page size whose overflow chunk length still fits the 16-bit
/// count header field.
const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Owns the database file, the allocation counter, and the page cache.
pub struct PageManager {
    file: Option<File>,
    page_size: usize,
    next_page_id: PageId,
    root_page_id: PageId,
    cache: PageCache,
}

impl PageManager {
    /// Open or create the file at `path`.
    ///
    /// A new file gets a meta page with the counter initialized to 1 and
    /// no tree root. An existing file has counter and root reloaded from
    /// the meta page.
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(Error::invalid(format!(
                "page size {page_size} outside supported range [{MIN_PAGE_SIZE}, {MAX_PAGE_SIZE}]"
            )));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut manager = Self {
            file: None,
            page_size,
            next_page_id: 1,
            root_page_id: 0,
            cache: PageCache::new(DEFAULT_CACHE_CAPACITY),
        };

        if file.metadata()?.len() == 0 {
            let mut meta = vec![0u8; page_size];
            meta[0..8].copy_from_slice(&manager.next_page_id.to_be_bytes());
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&meta)?;
            file.sync_all()?;
        } else {
            let mut header = [0u8; 16];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut header).map_err(|_| {
                Error::corrupt("database file is too short to hold a meta page")
            })?;
            let next = u64::from_be_bytes(header[0..8].try_into().unwrap_or([0; 8]));
            let root = u64::from_be_bytes(header[8..16].try_into().unwrap_or([0; 8]));
            if next == 0 {
                return Err(Error::corrupt("meta page holds a zero allocation counter"));
            }
            manager.next_page_id = next;
            manager.root_page_id = root;
        }

        manager.file = Some(file);
        Ok(manager)
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The id the next allocation will return. Exposed for diagnostics.
    #[inline]
    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    /// The persisted tree root page id; 0 when no root exists yet.
    #[inline]
    pub fn root(&self) -> PageId {
        self.root_page_id
    }

    /// Persist a new tree root id into the meta page.
    pub fn set_root(&mut self, id: PageId) -> Result<()> {
        self.root_page_id = id;
        self.persist_meta()
    }

    /// Allocate a fresh page id, persist the advanced counter, and write a
    /// zeroed page (with its id stamped) at the new offset, so a
    /// subsequent `read_page` succeeds.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let id = self.next_page_id;
        self.next_page_id += 1;
        self.persist_meta()?;

        let mut page = Page::new(self.page_size);
        page.set_id(id);
        self.write_page(&page)?;
        Ok(id)
    }

    /// Read the page at `id`, consulting the cache first.
    pub fn read_page(&mut self, id: PageId) -> Result<Page> {
        if id == 0 {
            return Err(Error::corrupt("page 0 is reserved for the meta page"));
        }
        if id >= self.next_page_id {
            return Err(Error::corrupt(format!(
                "page id {id} beyond allocation counter {}",
                self.next_page_id
            )));
        }
        if let Some(page) = self.cache.get(&id) {
            return Ok(page);
        }

        let offset = id * self.page_size as u64;
        let page_size = self.page_size;
        let file = self.file_mut()?;
        let mut buf = vec![0u8; page_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)
            .map_err(|_| Error::corrupt(format!("short read for page {id}")))?;

        let page = Page::from_bytes(buf);
        if page.id() != id {
            return Err(Error::corrupt(format!(
                "page at offset {offset} claims id {} instead of {id}",
                page.id()
            )));
        }
        self.cache.insert(id, page.clone());
        Ok(page)
    }

    /// Write a page to disk and refresh the cache entry.
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        let id = page.id();
        if id == 0 || id >= self.next_page_id {
            return Err(Error::Internal(format!(
                "refusing to write page {id} outside allocated range"
            )));
        }
        if page.size() != self.page_size {
            return Err(Error::Internal(format!(
                "page {id} is {} bytes, expected {}",
                page.size(),
                self.page_size
            )));
        }
        let offset = id * self.page_size as u64;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        self.cache.insert(id, page.clone());
        Ok(())
    }

    /// Flush OS buffers.
    pub fn sync(&mut self) -> Result<()> {
        self.file_mut()?.sync_all()?;
        Ok(())
    }

    /// Sync and release the file handle. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        self.cache.clear();
        Ok(())
    }

    fn persist_meta(&mut self) -> Result<()> {
        let mut header = [0u8; 16];
        header[0..8].copy_from_slice(&self.next_page_id.to_be_bytes());
        header[8..16].copy_from_slice(&self.root_page_id.to_be_bytes());
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::Internal("page manager is closed".to_string()))
    }
}

// ================================ LRU cache ==================================
//
// Id-linked LRU with O(1) get/insert/invalidate: a map of entries carrying
// prev/next ids plus head/tail ids. Eviction happens on insert only.

struct CacheEntry {
    page: Page,
    prev: Option<PageId>,
    next: Option<PageId>,
}

struct PageCache {
    map: FxHashMap<PageId, CacheEntry>,
    head: Option<PageId>,
    tail: Option<PageId>,
    cap: usize,
}

impl PageCache {
    fn new(cap: usize) -> Self {
        Self {
            map: FxHashMap::default(),
            head: None,
            tail: None,
            cap: cap.max(1),
        }
    }

    fn get(&mut self, id: &PageId) -> Option<Page> {
        if !self.map.contains_key(id) {
            return None;
        }
        self.move_to_head(id);
        self.map.get(id).map(|e| e.page.clone())
    }

    fn insert(&mut self, id: PageId, page: Page) {
        if let Some(entry) = self.map.get_mut(&id) {
            entry.page = page;
            self.move_to_head(&id);
            return;
        }
        let old_head = self.head;
        self.map.insert(
            id,
            CacheEntry {
                page,
                prev: None,
                next: old_head,
            },
        );
        if let Some(h) = old_head {
            if let Some(e) = self.map.get_mut(&h) {
                e.prev = Some(id);
            }
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
        if self.map.len() > self.cap {
            self.evict_one();
        }
    }

    fn invalidate(&mut self, id: &PageId) {
        let Some(entry) = self.map.remove(id) else {
            return;
        };
        if let Some(p) = entry.prev {
            if let Some(pe) = self.map.get_mut(&p) {
                pe.next = entry.next;
            }
        }
        if let Some(n) = entry.next {
            if let Some(ne) = self.map.get_mut(&n) {
                ne.prev = entry.prev;
            }
        }
        if self.head == Some(*id) {
            self.head = entry.next;
        }
        if self.tail == Some(*id) {
            self.tail = entry.prev;
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.head = None;
        self.tail = None;
    }

    fn move_to_head(&mut self, id: &PageId) {
        if self.head == Some(*id) {
            return;
        }
        let (prev, next) = match self.map.get(id) {
            Some(e) => (e.prev, e.next),
            None => return,
        };
        if let Some(p) = prev {
            if let Some(pe) = self.map.get_mut(&p) {
                pe.next = next;
            }
        }
        if let Some(n) = next {
            if let Some(ne) = self.map.get_mut(&n) {
                ne.prev = prev;
            }
        }
        if self.tail == Some(*id) {
            self.tail = prev;
        }
        let old_head = self.head;
        if let Some(e) = self.map.get_mut(id) {
            e.prev = None;
            e.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(he) = self.map.get_mut(&h) {
                he.prev = Some(*id);
            }
        }
        self.head = Some(*id);
        if self.tail.is_none() {
            self.tail = Some(*id);
        }
    }

    fn evict_one(&mut self) {
        if let Some(tid) = self.tail {
            self.invalidate(&tid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::FLAG_LEAF;
    use tempfile::TempDir;

    fn open_manager(dir: &TempDir, name: &str) -> PageManager {
        PageManager::open(&dir.path().join(name), DEFAULT_PAGE_SIZE).unwrap()
    }

    #[test]
    fn new_file_initializes_counter() {
        let dir = TempDir::new().unwrap();
        let pm = open_manager(&dir, "t.db");
        assert_eq!(pm.next_page_id(), 1);
        assert_eq!(pm.root(), 0);
    }

    #[test]
    fn allocation_is_monotonic_and_readable() {
        let dir = TempDir::new().unwrap();
        let mut pm = open_manager(&dir, "t.db");
        let a = pm.allocate_page().unwrap();
        let b = pm.allocate_page().unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);

        let page = pm.read_page(a).unwrap();
        assert_eq!(page.id(), a);
        assert_eq!(page.count(), 0);
    }

    #[test]
    fn counter_and_root_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut pm = PageManager::open(&path, DEFAULT_PAGE_SIZE).unwrap();
            for _ in 0..5 {
                pm.allocate_page().unwrap();
            }
            pm.set_root(3).unwrap();
            pm.close().unwrap();
        }
        let pm = PageManager::open(&path, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(pm.next_page_id(), 6);
        assert_eq!(pm.root(), 3);
    }

    #[test]
    fn writes_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut pm = PageManager::open(&path, DEFAULT_PAGE_SIZE).unwrap();
            let id = pm.allocate_page().unwrap();
            let mut page = pm.read_page(id).unwrap();
            page.set_flags(FLAG_LEAF);
            assert!(page.put_element(b"hello", b"world", false));
            pm.write_page(&page).unwrap();
            pm.close().unwrap();
        }
        // Fresh manager, cold cache: the bytes must come from disk.
        let mut pm = PageManager::open(&path, DEFAULT_PAGE_SIZE).unwrap();
        let page = pm.read_page(1).unwrap();
        assert!(page.is_leaf());
        assert_eq!(page.element(0).unwrap().key(), b"hello");
        assert_eq!(page.element(0).unwrap().value(), b"world");
    }

    #[test]
    fn reserved_and_unallocated_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut pm = open_manager(&dir, "t.db");
        assert!(pm.read_page(0).is_err());
        assert!(pm.read_page(7).is_err());
    }

    #[test]
    fn rejects_out_of_range_page_sizes() {
        let dir = TempDir::new().unwrap();
        assert!(PageManager::open(&dir.path().join("a.db"), 16).is_err());
        assert!(PageManager::open(&dir.path().join("b.db"), 1 << 20).is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut pm = open_manager(&dir, "t.db");
        pm.close().unwrap();
        pm.close().unwrap();
        assert!(pm.read_page(1).is_err());
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = PageCache::new(2);
        let mk = |id: u64| {
            let mut p = Page::new(64);
            p.set_id(id);
            p
        };
        cache.insert(1, mk(1));
        cache.insert(2, mk(2));
        // Touch 1 so 2 becomes the LRU entry.
        assert!(cache.get(&1).is_some());
        cache.insert(3, mk(3));
        assert!(cache.get(&2).is_none());
        assert!(cache.get(&1).is_some());
        assert!(cache.get(&3).is_some());
    }

    #[test]
    fn cache_invalidate_unlinks_entries() {
        let mut cache = PageCache::new(4);
        let mk = |id: u64| {
            let mut p = Page::new(64);
            p.set_id(id);
            p
        };
        for id in 1..=4 {
            cache.insert(id, mk(id));
        }
        cache.invalidate(&3);
        assert!(cache.get(&3).is_none());
        for id in [1u64, 2, 4] {
            assert!(cache.get(&id).is_some());
        }
    }
}
