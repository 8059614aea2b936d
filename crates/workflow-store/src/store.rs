use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use workflow_core::{Spec, WorkflowError, WorkflowResult};

use crate::cache::{FileFingerprint, SpecCache};
use crate::graph::SpecGraph;
use crate::parser::{self, ParseFailure};

const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// Loads spec documents from a directory tree, parses them, and keeps an
/// in-memory [`SpecGraph`] plus a per-file parse cache. This is the only
/// crate in the workspace that touches the spec tree on disk; every other
/// subsystem reads through here.
pub struct SpecStore {
    root: PathBuf,
    cache: RwLock<SpecCache>,
    graph: RwLock<SpecGraph>,
}

impl SpecStore {
    /// Open a store rooted at `root` (the directory containing the
    /// `draft/`, `backlog/`, `active/`, ... status subdirectories). Does not
    /// load anything; call [`SpecStore::load_all`] first.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(SpecCache::new(DEFAULT_CACHE_CAPACITY)),
            graph: RwLock::new(SpecGraph::default()),
        }
    }

    /// Walk the whole spec tree, parse every `.md` file found, and replace
    /// the in-memory graph. Individual parse failures are collected into
    /// the graph's `errors`, not propagated — only an I/O failure walking
    /// the tree itself returns `Err`.
    pub fn load_all(&self) -> WorkflowResult<()> {
        let mut paths = Vec::new();
        collect_markdown_files(&self.root, &mut paths)?;

        let mut specs = Vec::new();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        for path in paths {
            match self.load_one(&path) {
                Ok(parsed) => {
                    for warning in &parsed.warnings {
                        warnings.push((path.display().to_string(), warning.clone()));
                    }
                    specs.push(parsed.spec);
                }
                Err(failure) => errors.push(failure),
            }
        }

        let mut graph = self.graph.write().expect("graph lock poisoned");
        *graph = SpecGraph::build(specs, warnings, errors);
        Ok(())
    }

    /// Load (or return the cached parse of) a single spec by id, reading
    /// the graph's indexed path.
    pub fn load(&self, spec_id: &str) -> WorkflowResult<Option<Spec>> {
        let path = {
            let graph = self.graph.read().expect("graph lock poisoned");
            graph.get(spec_id).and_then(|s| s.file_path.clone())
        };
        match path {
            Some(path) => self.load_path(Path::new(&path)).map(Some),
            None => Ok(None),
        }
    }

    /// Load a single spec document from an explicit path, using the cache
    /// when the file's mtime/size has not changed since it was cached.
    pub fn load_path(&self, path: &Path) -> WorkflowResult<Spec> {
        Ok(self.load_one(path).map_err(|failure| WorkflowError::ParseError {
            path: failure.path,
            reason: failure.reason,
        })?.spec)
    }

    /// Drop the cached parse for a single path, forcing a re-read on next
    /// access. Used by the file watcher after it observes a change.
    pub fn invalidate(&self, path: &Path) {
        self.cache.write().expect("cache lock poisoned").invalidate(path);
    }

    /// Run the cache's age-based maintenance eviction. Call periodically
    /// (the command orchestrators do this between pipeline steps); the
    /// store never ages entries out implicitly.
    pub fn run_cache_maintenance(&self, max_age: Duration) -> usize {
        self.cache.write().expect("cache lock poisoned").evict_older_than(max_age)
    }

    /// Borrow the current in-memory graph. Returns a guard; callers should
    /// drop it promptly rather than holding it across other store calls.
    pub fn graph(&self) -> std::sync::RwLockReadGuard<'_, SpecGraph> {
        self.graph.read().expect("graph lock poisoned")
    }

    fn load_one(&self, path: &Path) -> Result<parser::ParsedSpec, ParseFailure> {
        let metadata = std::fs::metadata(path).map_err(|e| ParseFailure {
            path: path.display().to_string(),
            reason: format!("could not stat file: {e}"),
        })?;
        let fingerprint = FileFingerprint {
            mtime: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            size: metadata.len(),
        };

        if let Some(cached) = self.cache.write().expect("cache lock poisoned").get(path, fingerprint) {
            return Ok(clone_parsed(cached));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ParseFailure {
            path: path.display().to_string(),
            reason: format!("could not read file: {e}"),
        })?;

        let parsed = parser::parse_spec(&content, &path.display().to_string())?;
        self.cache
            .write()
            .expect("cache lock poisoned")
            .put(path.to_path_buf(), fingerprint, clone_parsed(&parsed));
        Ok(parsed)
    }
}

fn clone_parsed(parsed: &parser::ParsedSpec) -> parser::ParsedSpec {
    parser::ParsedSpec {
        spec: parsed.spec.clone(),
        warnings: parsed.warnings.clone(),
    }
}

fn collect_markdown_files(dir: &Path, out: &mut Vec<PathBuf>) -> WorkflowResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let entries = std::fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_markdown_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
    Ok(())
}
