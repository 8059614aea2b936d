use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::parser::ParsedSpec;

/// The filesystem fingerprint a cache entry was populated from. A changed
/// mtime or size invalidates the entry without needing to re-read and hash
/// the file's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub mtime: SystemTime,
    pub size: u64,
}

struct Entry {
    fingerprint: FileFingerprint,
    parsed: ParsedSpec,
    last_accessed: SystemTime,
}

/// A simple in-memory cache of parsed specs keyed by file path, invalidated
/// by mtime/size rather than content hashing. Access bumps an entry's
/// recency; [`SpecCache::evict_older_than`] is the explicit maintenance hook
/// a caller runs periodically (the Spec Store does not age entries out on
/// its own).
pub struct SpecCache {
    entries: HashMap<PathBuf, Entry>,
    capacity: usize,
}

impl SpecCache {
    /// Create a cache holding at most `capacity` entries. When a fresh
    /// insert would exceed capacity, the least-recently-accessed entry is
    /// evicted first.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Look up `path`, returning the cached parse only if `fingerprint`
    /// matches what was stored at insert time.
    pub fn get(&mut self, path: &std::path::Path, fingerprint: FileFingerprint) -> Option<&ParsedSpec> {
        let now = SystemTime::now();
        let entry = self.entries.get_mut(path)?;
        if entry.fingerprint != fingerprint {
            return None;
        }
        entry.last_accessed = now;
        Some(&entry.parsed)
    }

    /// Insert or replace the cached parse for `path`.
    pub fn put(&mut self, path: PathBuf, fingerprint: FileFingerprint, parsed: ParsedSpec) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&path) {
            self.evict_least_recently_used();
        }
        self.entries.insert(
            path,
            Entry {
                fingerprint,
                parsed,
                last_accessed: SystemTime::now(),
            },
        );
    }

    /// Drop the cached entry for `path`, if any.
    pub fn invalidate(&mut self, path: &std::path::Path) {
        self.entries.remove(path);
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maintenance hook: evict entries that have not been accessed within
    /// `max_age`. Returns the number of entries evicted.
    pub fn evict_older_than(&mut self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            now.duration_since(entry.last_accessed)
                .map(|age| age <= max_age)
                .unwrap_or(true)
        });
        before - self.entries.len()
    }

    fn evict_least_recently_used(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(path, _)| path.clone())
        {
            self.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn fixture(id: &str) -> ParsedSpec {
        let doc = format!(
            "---\nid: {id}\ntype: feature\nstatus: backlog\ntitle: x\npriority: P2\n---\nbody\n"
        );
        crate::parser::parse_spec(&doc, &format!("{id}.md")).expect("parses")
    }

    #[test]
    fn hit_on_matching_fingerprint() {
        let mut cache = SpecCache::new(4);
        let fp = FileFingerprint { mtime: SystemTime::now(), size: 10 };
        cache.put(PathBuf::from("a.md"), fp, fixture("FEAT-001"));
        assert!(cache.get(&PathBuf::from("a.md"), fp).is_some());
    }

    #[test]
    fn miss_on_changed_fingerprint() {
        let mut cache = SpecCache::new(4);
        let fp = FileFingerprint { mtime: SystemTime::now(), size: 10 };
        cache.put(PathBuf::from("a.md"), fp, fixture("FEAT-001"));
        let changed = FileFingerprint { mtime: fp.mtime, size: 11 };
        assert!(cache.get(&PathBuf::from("a.md"), changed).is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let mut cache = SpecCache::new(2);
        let fp = FileFingerprint { mtime: SystemTime::now(), size: 10 };
        cache.put(PathBuf::from("a.md"), fp, fixture("FEAT-001"));
        cache.put(PathBuf::from("b.md"), fp, fixture("FEAT-002"));
        // touch "a" so "b" becomes the least recently used
        assert!(cache.get(&PathBuf::from("a.md"), fp).is_some());
        cache.put(PathBuf::from("c.md"), fp, fixture("FEAT-003"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&PathBuf::from("b.md"), fp).is_none());
        assert!(cache.get(&PathBuf::from("a.md"), fp).is_some());
    }

    #[test]
    fn maintenance_evicts_stale_entries() {
        let mut cache = SpecCache::new(4);
        let fp = FileFingerprint { mtime: SystemTime::now(), size: 10 };
        cache.put(PathBuf::from("a.md"), fp, fixture("FEAT-001"));
        sleep(Duration::from_millis(20));
        let evicted = cache.evict_older_than(Duration::from_millis(5));
        assert_eq!(evicted, 1);
        assert!(cache.is_empty());
    }
}
