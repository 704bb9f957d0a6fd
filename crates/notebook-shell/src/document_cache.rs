//! Bounded cache of in-memory document buffers.
//!
//! Entries are kept in least-recently-used order and evicted while the cache
//! holds more than `max_entries` buffers or more than `max_bytes` bytes. The
//! active document and any document whose notebook is executing are never
//! evicted, so the cache may exceed its budget by exactly that pinned set.

use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// An editable buffer held by the cache.
pub trait DocumentBuffer {
    /// Current size of the buffer contents.
    fn size_bytes(&self) -> usize;

    /// Release the resources behind the buffer. Called once, when the cache
    /// drops the entry and the buffer is not attached to the visible editor.
    fn dispose(&mut self) {}
}

/// Decides whether a key is exempt from eviction.
pub trait EvictionGuard {
    fn is_pinned(&self, key: &str) -> bool;
}

/// Guard that pins nothing.
pub struct NoPins;

impl EvictionGuard for NoPins {
    fn is_pinned(&self, _key: &str) -> bool {
        false
    }
}

/// Plain text buffer with an edit version counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    version: u64,
    disposed: bool,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        TextBuffer {
            text: text.into(),
            version: 0,
            disposed: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl DocumentBuffer for TextBuffer {
    fn size_bytes(&self) -> usize {
        self.text.len()
    }

    fn dispose(&mut self) {
        self.text = String::new();
        self.disposed = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        CacheLimits {
            max_entries: 20,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

struct CacheEntry<B> {
    buffer: B,
    size_bytes: usize,
}

/// No entry can be evicted: everything left is pinned.
#[derive(Debug)]
struct EvictionBlocked;

pub struct DocumentCache<B: DocumentBuffer> {
    limits: CacheLimits,
    entries: HashMap<String, CacheEntry<B>>,
    /// Keys from least to most recently used
    order: VecDeque<String>,
    total_bytes: usize,
    active: Option<String>,
    /// Key whose buffer the visible editor currently holds
    attached: Option<String>,
    /// Removed buffers that were attached at removal time
    deferred: Vec<(String, B)>,
}

impl<B: DocumentBuffer> DocumentCache<B> {
    pub fn new(limits: CacheLimits) -> Self {
        DocumentCache {
            limits,
            entries: HashMap::new(),
            order: VecDeque::new(),
            total_bytes: 0,
            active: None,
            attached: None,
            deferred: Vec::new(),
        }
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Pin `key` as the active document. The previous active key loses its pin.
    pub fn set_active(&mut self, key: Option<&str>) {
        self.active = key.map(str::to_string);
    }

    pub fn attached(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    /// Record that the visible editor now shows `key`'s buffer.
    /// Buffers whose disposal was deferred are disposed now.
    pub fn attach(&mut self, key: &str) {
        self.flush_deferred();
        self.attached = Some(key.to_string());
    }

    pub fn detach(&mut self) {
        self.flush_deferred();
        self.attached = None;
    }

    /// Number of removed buffers waiting for the editor to let go of them.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Look up a buffer without changing its recency.
    pub fn get(&self, key: &str) -> Option<&B> {
        self.entries.get(key).map(|e| &e.buffer)
    }

    /// Mutable access without changing recency; call [`touch`](Self::touch)
    /// after editing so the size is re-measured.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut B> {
        self.entries.get_mut(key).map(|e| &mut e.buffer)
    }

    /// Return the buffer for `key`, loading and inserting it on a miss.
    ///
    /// A hit marks the entry most recently used. A miss inserts the loaded
    /// buffer and then evicts; the requested key is exempt from that pass.
    pub fn get_or_create<F>(
        &mut self,
        key: &str,
        loader: F,
        guard: &dyn EvictionGuard,
    ) -> Result<&mut B>
    where
        F: FnOnce() -> Result<B>,
    {
        if self.entries.contains_key(key) {
            self.mark_used(key);
            return self.buffer_mut(key);
        }

        let buffer = loader()?;
        let size_bytes = buffer.size_bytes();
        self.entries
            .insert(key.to_string(), CacheEntry { buffer, size_bytes });
        self.order.push_back(key.to_string());
        self.total_bytes += size_bytes;
        debug!("[cache] Inserted {} ({} bytes)", key, size_bytes);

        self.evict_except(guard, Some(key));
        self.buffer_mut(key)
    }

    /// Mark `key` most recently used and re-measure its size, evicting if it
    /// grew. Returns false when `key` is not cached.
    pub fn touch(&mut self, key: &str, guard: &dyn EvictionGuard) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let old_size = entry.size_bytes;
        let new_size = entry.buffer.size_bytes();
        entry.size_bytes = new_size;
        self.total_bytes = self.total_bytes - old_size + new_size;
        self.mark_used(key);

        if new_size > old_size {
            self.evict_except(guard, Some(key));
        }
        true
    }

    /// Remove `key`, disposing its buffer unless it is attached to the editor.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(entry) = self.take_entry(key) else {
            return false;
        };
        self.dispose_or_defer(key.to_string(), entry.buffer);
        true
    }

    /// Remove `prefix` and every key below it (a deleted file or folder).
    pub fn remove_all_under(&mut self, prefix: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .order
            .iter()
            .filter(|k| path_is_under(k, prefix))
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    /// Move the entry for `old` to `new`, keeping its buffer and recency.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == new || !self.entries.contains_key(old) {
            return false;
        }
        self.remove(new);
        let Some(entry) = self.entries.remove(old) else {
            return false;
        };
        self.entries.insert(new.to_string(), entry);
        for key in self.order.iter_mut() {
            if key == old {
                *key = new.to_string();
            }
        }
        if self.active.as_deref() == Some(old) {
            self.active = Some(new.to_string());
        }
        if self.attached.as_deref() == Some(old) {
            self.attached = Some(new.to_string());
        }
        true
    }

    /// Rename every key at or below `old_prefix` (a renamed folder).
    pub fn rename_all_under(&mut self, old_prefix: &str, new_prefix: &str) {
        let keys: Vec<String> = self
            .order
            .iter()
            .filter(|k| path_is_under(k, old_prefix))
            .cloned()
            .collect();
        for key in keys {
            let target = rebase_path(&key, old_prefix, new_prefix);
            self.rename(&key, &target);
        }
    }

    /// Evict least recently used entries until the cache is within budget
    /// or only pinned entries remain. Returns the evicted keys.
    pub fn evict(&mut self, guard: &dyn EvictionGuard) -> Vec<String> {
        self.evict_except(guard, None)
    }

    fn evict_except(&mut self, guard: &dyn EvictionGuard, exempt: Option<&str>) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.over_budget() {
            match self.pick_victim(guard, exempt) {
                Ok(key) => {
                    info!("[cache] Evicting {}", key);
                    self.remove(&key);
                    evicted.push(key);
                }
                Err(EvictionBlocked) => {
                    debug!(
                        "[cache] Eviction blocked: {} entries, {} bytes, all pinned",
                        self.entries.len(),
                        self.total_bytes
                    );
                    break;
                }
            }
        }
        evicted
    }

    fn over_budget(&self) -> bool {
        self.entries.len() > self.limits.max_entries || self.total_bytes > self.limits.max_bytes
    }

    fn pick_victim(
        &self,
        guard: &dyn EvictionGuard,
        exempt: Option<&str>,
    ) -> std::result::Result<String, EvictionBlocked> {
        self.order
            .iter()
            .find(|key| {
                Some(key.as_str()) != self.active.as_deref()
                    && Some(key.as_str()) != exempt
                    && !guard.is_pinned(key)
            })
            .cloned()
            .ok_or(EvictionBlocked)
    }

    fn mark_used(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn take_entry(&mut self, key: &str) -> Option<CacheEntry<B>> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn buffer_mut(&mut self, key: &str) -> Result<&mut B> {
        self.entries
            .get_mut(key)
            .map(|e| &mut e.buffer)
            .ok_or_else(|| anyhow!("document {} is not cached", key))
    }

    fn dispose_or_defer(&mut self, key: String, mut buffer: B) {
        if self.attached.as_deref() == Some(key.as_str()) {
            debug!("[cache] {} is attached to the editor, deferring disposal", key);
            self.deferred.push((key, buffer));
        } else {
            buffer.dispose();
        }
    }

    fn flush_deferred(&mut self) {
        for (key, mut buffer) in self.deferred.drain(..) {
            debug!("[cache] Disposing detached buffer {}", key);
            buffer.dispose();
        }
    }
}

/// True when `path` is `prefix` itself or lies below it. Matching is by
/// whole path segments: `a/b` is under `a`, `ab` is not. An empty prefix
/// (the workspace root) contains everything.
pub fn path_is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Replace the `old_prefix` part of `path` with `new_prefix`.
pub fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    let old_prefix = old_prefix.trim_end_matches('/');
    let new_prefix = new_prefix.trim_end_matches('/');
    match path.strip_prefix(old_prefix) {
        Some(rest) if old_prefix.is_empty() => format!("{}/{}", new_prefix, rest),
        Some(rest) => format!("{}{}", new_prefix, rest),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Pinned(HashSet<&'static str>);

    impl EvictionGuard for Pinned {
        fn is_pinned(&self, key: &str) -> bool {
            self.0.contains(key)
        }
    }

    fn cache(max_entries: usize, max_bytes: usize) -> DocumentCache<TextBuffer> {
        DocumentCache::new(CacheLimits {
            max_entries,
            max_bytes,
        })
    }

    fn open(c: &mut DocumentCache<TextBuffer>, key: &str, text: &str, guard: &dyn EvictionGuard) {
        let text = text.to_string();
        c.get_or_create(key, || Ok(TextBuffer::new(text)), guard)
            .unwrap();
    }

    #[test]
    fn test_get_or_create_loads_once() {
        let mut c = cache(4, 1024);
        let mut loads = 0;

        for _ in 0..3 {
            c.get_or_create(
                "a.go",
                || {
                    loads += 1;
                    Ok(TextBuffer::new("package main"))
                },
                &NoPins,
            )
            .unwrap();
        }

        assert_eq!(loads, 1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.total_bytes(), "package main".len());
    }

    #[test]
    fn test_loader_error_inserts_nothing() {
        let mut c = cache(4, 1024);
        let result = c.get_or_create("a.go", || Err(anyhow!("no such file")), &NoPins);
        assert!(result.is_err());
        assert!(c.is_empty());
    }

    #[test]
    fn test_lru_order_follows_access() {
        let mut c = cache(4, 1024);
        open(&mut c, "a", "1", &NoPins);
        open(&mut c, "b", "2", &NoPins);
        open(&mut c, "c", "3", &NoPins);

        open(&mut c, "a", "", &NoPins);

        assert_eq!(c.keys(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_inactive_document_is_evicted_first() {
        let mut c = cache(2, 1024);
        c.set_active(Some("A"));
        open(&mut c, "A", "a", &NoPins);
        open(&mut c, "B", "b", &NoPins);

        c.set_active(Some("C"));
        open(&mut c, "C", "c", &NoPins);

        assert_eq!(c.keys(), vec!["B", "C"]);
    }

    #[test]
    fn test_active_document_is_never_evicted() {
        let mut c = cache(2, 1024);
        c.set_active(Some("A"));
        open(&mut c, "A", "a", &NoPins);
        open(&mut c, "B", "b", &NoPins);

        open(&mut c, "C", "c", &NoPins);

        assert!(c.contains("A"));
        assert!(!c.contains("B"));
        assert!(c.contains("C"));
    }

    #[test]
    fn test_executing_document_is_never_evicted() {
        let mut c = cache(2, 1024);
        let running = Pinned(HashSet::from(["A"]));
        c.set_active(Some("A"));
        open(&mut c, "A", "a", &running);
        open(&mut c, "B", "b", &running);

        c.set_active(Some("C"));
        open(&mut c, "C", "c", &running);

        assert_eq!(c.keys(), vec!["A", "C"]);
    }

    #[test]
    fn test_byte_budget_evicts_until_within_limit() {
        let mut c = cache(10, 10);
        open(&mut c, "a", "1234", &NoPins);
        open(&mut c, "b", "1234", &NoPins);
        open(&mut c, "c", "1234", &NoPins);

        assert_eq!(c.keys(), vec!["b", "c"]);
        assert_eq!(c.total_bytes(), 8);
    }

    #[test]
    fn test_eviction_blocked_when_everything_pinned() {
        let mut c = cache(1, 1024);
        let pins = Pinned(HashSet::from(["a", "b"]));
        open(&mut c, "a", "x", &pins);
        open(&mut c, "b", "y", &pins);
        open(&mut c, "c", "z", &pins);

        // a and b are executing and c was just requested
        assert_eq!(c.len(), 3);
        let evicted = c.evict(&NoPins);
        assert_eq!(evicted, vec!["a", "b"]);
    }

    #[test]
    fn test_touch_tracks_growth_and_evicts() {
        let mut c = cache(10, 10);
        open(&mut c, "a", "12", &NoPins);
        open(&mut c, "b", "12", &NoPins);

        c.get_mut("b").unwrap().set_text("123456789");
        assert!(c.touch("b", &NoPins));

        assert_eq!(c.keys(), vec!["b"]);
        assert_eq!(c.total_bytes(), 9);
    }

    #[test]
    fn test_touch_shrink_keeps_entries() {
        let mut c = cache(10, 10);
        open(&mut c, "a", "12345", &NoPins);
        open(&mut c, "b", "12345", &NoPins);

        c.get_mut("a").unwrap().set_text("1");
        c.touch("a", &NoPins);

        assert_eq!(c.keys(), vec!["b", "a"]);
        assert_eq!(c.total_bytes(), 6);
        assert!(!c.touch("missing", &NoPins));
    }

    #[test]
    fn test_remove_disposes_buffer() {
        let mut c = cache(4, 1024);
        open(&mut c, "a", "text", &NoPins);

        assert!(c.remove("a"));
        assert!(!c.remove("a"));
        assert!(c.is_empty());
        assert_eq!(c.total_bytes(), 0);
        assert_eq!(c.deferred_len(), 0);
    }

    #[test]
    fn test_remove_attached_buffer_defers_disposal() {
        let mut c = cache(4, 1024);
        open(&mut c, "a", "text", &NoPins);
        open(&mut c, "b", "text", &NoPins);
        c.attach("a");

        c.remove("a");
        assert!(!c.contains("a"));
        assert_eq!(c.deferred_len(), 1);

        c.attach("b");
        assert_eq!(c.deferred_len(), 0);
    }

    #[test]
    fn test_remove_all_under_matches_segments() {
        let mut c = cache(10, 1024);
        for key in ["src/a.go", "src/lib/b.go", "srcx/c.go", "d.go"] {
            open(&mut c, key, "x", &NoPins);
        }

        let removed = c.remove_all_under("src/");

        assert_eq!(removed, vec!["src/a.go", "src/lib/b.go"]);
        assert_eq!(c.keys(), vec!["srcx/c.go", "d.go"]);
    }

    #[test]
    fn test_rename_keeps_buffer_and_pins() {
        let mut c = cache(10, 1024);
        open(&mut c, "old.igonb", "content", &NoPins);
        open(&mut c, "other.go", "x", &NoPins);
        c.set_active(Some("old.igonb"));
        c.attach("old.igonb");

        assert!(c.rename("old.igonb", "new.igonb"));

        assert_eq!(c.get("new.igonb").unwrap().text(), "content");
        assert_eq!(c.active(), Some("new.igonb"));
        assert_eq!(c.attached(), Some("new.igonb"));
        assert_eq!(c.keys(), vec!["new.igonb", "other.go"]);
    }

    #[test]
    fn test_rename_all_under_folder() {
        let mut c = cache(10, 1024);
        open(&mut c, "nb/a.igonb", "a", &NoPins);
        open(&mut c, "nb/sub/b.igonb", "b", &NoPins);

        c.rename_all_under("nb", "notebooks");

        assert_eq!(c.keys(), vec!["notebooks/a.igonb", "notebooks/sub/b.igonb"]);
    }

    #[test]
    fn test_path_is_under() {
        assert!(path_is_under("a/b.go", "a"));
        assert!(path_is_under("a/b.go", "a/"));
        assert!(path_is_under("a", "a"));
        assert!(!path_is_under("ab/c.go", "a"));
        assert!(path_is_under("anything", ""));
    }

    #[test]
    fn test_rebase_path() {
        assert_eq!(rebase_path("a/b/c.go", "a/b", "x"), "x/c.go");
        assert_eq!(rebase_path("a.go", "a.go", "b.go"), "b.go");
        assert_eq!(rebase_path("z.go", "a", "b"), "z.go");
    }

    #[test]
    fn test_text_buffer_dispose() {
        let mut buf = TextBuffer::new("hello");
        buf.set_text("hello world");
        assert_eq!(buf.version(), 1);
        buf.dispose();
        assert!(buf.is_disposed());
        assert_eq!(buf.size_bytes(), 0);
    }
}
