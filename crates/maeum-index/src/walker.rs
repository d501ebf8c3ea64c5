//! Workspace walking and index construction

use crate::node::{classify, priority, FileNode, Symbol};
use crate::symbols;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory names pruned from every walk.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "build",
    "dist",
    "target",
    ".idea",
    ".vscode",
    ".maeum_backups",
    ".pytest_cache",
    ".mypy_cache",
];

/// File name suffixes excluded from indexing (binaries, lockfiles, media).
const IGNORED_SUFFIXES: &[&str] = &[
    ".lock", ".pyc", ".so", ".dylib", ".dll", ".exe", ".bin", ".o", ".a", ".png", ".jpg",
    ".jpeg", ".gif", ".ico", ".svg", ".pdf", ".zip", ".tar", ".gz", ".bz2", ".7z", ".mp3",
    ".mp4", ".wav", ".woff", ".woff2", ".ttf", ".min.js", ".min.css",
];

const IGNORED_NAMES: &[&str] = &["package-lock.json", "yarn.lock", "Cargo.lock"];

/// Files above this size are excluded from the index.
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

fn is_ignored_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    IGNORED_NAMES.contains(&name) || IGNORED_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Where a symbol with a given name lives.
#[derive(Clone, Debug)]
pub struct SymbolLocation {
    pub file: String,
    pub symbol: Symbol,
}

#[derive(Default)]
struct IndexState {
    files: HashMap<String, FileNode>,
    by_name: HashMap<String, Vec<SymbolLocation>>,
}

/// Process-wide index shared by all sessions. Readers take snapshots of the
/// node list; (re)indexing swaps the state wholesale under the write lock.
pub struct WorkspaceIndex {
    root: PathBuf,
    state: RwLock<Arc<IndexState>>,
    generation: std::sync::atomic::AtomicU64,
}

impl WorkspaceIndex {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            state: RwLock::new(Arc::new(IndexState::default())),
            generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Bumped on every rebuild; used to invalidate cached search results.
    pub fn generation(&self) -> u64 {
        self.generation.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Worker-pool width for indexing and search.
    pub fn pool_size() -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cpus + 4).min(32)
    }

    /// Build (or rebuild) the index. With `force=false`, entries whose mtime
    /// matches on-disk are reused without re-extraction.
    pub async fn build(&self, force: bool) -> usize {
        let previous = if force {
            Arc::new(IndexState::default())
        } else {
            self.snapshot()
        };

        let mut candidates = Vec::new();
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !is_ignored_dir(&e.file_name().to_string_lossy())
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if is_ignored_file(&name) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            if meta.len() > MAX_FILE_SIZE {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            candidates.push((rel, entry.path().to_path_buf(), meta.len(), modified));
        }

        let total = candidates.len();
        let nodes: Vec<FileNode> = stream::iter(candidates)
            .map(|(rel, abs, size, modified)| {
                let reuse = previous
                    .files
                    .get(&rel)
                    .filter(|n| n.modified == modified)
                    .cloned();
                async move {
                    if let Some(node) = reuse {
                        return node;
                    }
                    tokio::task::spawn_blocking(move || build_node(rel, &abs, size, modified))
                        .await
                        .unwrap_or_else(|e| {
                            warn!("index worker panicked: {}", e);
                            FileNode {
                                relative_path: String::new(),
                                extension: String::new(),
                                size: 0,
                                modified: 0,
                                kind: crate::node::FileKind::Other,
                                priority: 0,
                                symbols: Vec::new(),
                                imports: Vec::new(),
                            }
                        })
                }
            })
            .buffer_unordered(Self::pool_size())
            .collect()
            .await;

        let mut state = IndexState::default();
        for node in nodes {
            if node.relative_path.is_empty() {
                continue;
            }
            for symbol in &node.symbols {
                state
                    .by_name
                    .entry(symbol.name.clone())
                    .or_default()
                    .push(SymbolLocation {
                        file: node.relative_path.clone(),
                        symbol: symbol.clone(),
                    });
            }
            state.files.insert(node.relative_path.clone(), node);
        }

        let indexed = state.files.len();
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(state);
        self.generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        info!("indexed {} files ({} candidates)", indexed, total);
        indexed
    }

    fn snapshot(&self) -> Arc<IndexState> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn file_count(&self) -> usize {
        self.snapshot().files.len()
    }

    /// Snapshot of every indexed node.
    pub fn nodes(&self) -> Vec<FileNode> {
        self.snapshot().files.values().cloned().collect()
    }

    pub fn node(&self, relative_path: &str) -> Option<FileNode> {
        self.snapshot().files.get(relative_path).cloned()
    }

    /// All locations of symbols with exactly this name.
    pub fn symbols_named(&self, name: &str) -> Vec<SymbolLocation> {
        self.snapshot().by_name.get(name).cloned().unwrap_or_default()
    }

    /// Case-insensitive substring match over symbol names.
    pub fn symbols_matching(&self, fragment: &str) -> Vec<SymbolLocation> {
        let needle = fragment.to_lowercase();
        let state = self.snapshot();
        let mut out = Vec::new();
        for (name, locations) in &state.by_name {
            if name.to_lowercase().contains(&needle) {
                out.extend(locations.iter().cloned());
            }
        }
        out
    }
}

fn build_node(rel: String, abs: &Path, size: u64, modified: u64) -> FileNode {
    let extension = abs
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let (syms, imports) = if symbols::supported(&extension) {
        match std::fs::read_to_string(abs) {
            Ok(content) => {
                let ex = symbols::extract(&extension, &content);
                (ex.symbols, ex.imports)
            }
            Err(e) => {
                debug!("symbol extraction skipped for {}: {}", rel, e);
                (Vec::new(), Vec::new())
            }
        }
    } else {
        (Vec::new(), Vec::new())
    };

    FileNode {
        kind: classify(&rel),
        priority: priority(&rel),
        relative_path: rel,
        extension,
        size,
        modified,
        symbols: syms,
        imports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs;

    fn test_workspace() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = temp_dir().join(format!("maeum-index-test-{}-{}", std::process::id(), id));
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::create_dir_all(dir.join("node_modules/dep")).unwrap();
        fs::write(dir.join("main.py"), "def main():\n    pass\n").unwrap();
        fs::write(
            dir.join("src/util.py"),
            "CACHE_SIZE = 10\n\ndef helper(x):\n    return x\n",
        )
        .unwrap();
        fs::write(dir.join("node_modules/dep/index.js"), "ignored").unwrap();
        fs::write(dir.join("photo.png"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[tokio::test]
    async fn build_indexes_and_prunes() {
        let dir = test_workspace();
        let index = WorkspaceIndex::new(&dir);
        index.build(true).await;

        assert!(index.node("main.py").is_some());
        assert!(index.node("src/util.py").is_some());
        assert!(index.node("node_modules/dep/index.js").is_none());
        assert!(index.node("photo.png").is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn symbol_index_answers_by_name() {
        let dir = test_workspace();
        let index = WorkspaceIndex::new(&dir);
        index.build(true).await;

        let found = index.symbols_named("helper");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "src/util.py");
        assert!(!index.symbols_matching("help").is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn incremental_reuse_by_mtime() {
        let dir = test_workspace();
        let index = WorkspaceIndex::new(&dir);
        index.build(true).await;
        let before = index.node("main.py").unwrap();

        index.build(false).await;
        let after = index.node("main.py").unwrap();
        assert_eq!(before.modified, after.modified);
        assert_eq!(before.symbols.len(), after.symbols.len());
        let _ = fs::remove_dir_all(&dir);
    }
}
