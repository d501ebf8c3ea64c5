//! Multi-mode search over the workspace index
//!
//! Modes: exact (escaped literal), fuzzy (per-char `.*` join), regex
//! (verbatim), semantic (token-OR over split query words), symbol (consults
//! the symbol index). Results rank by file priority, then match score.

use crate::node::FileKind;
use crate::walker::WorkspaceIndex;
use futures::stream::{self, StreamExt};
use globset::GlobBuilder;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One file contributes at most this many matches so a huge file cannot
/// starve the rest of the result set.
const PER_FILE_CAP: usize = 20;

const CACHE_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Exact,
    Fuzzy,
    Regex,
    Semantic,
    Symbol,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub mode: SearchMode,
    #[serde(default)]
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub file_types: Option<Vec<FileKind>>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub context_lines: usize,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub include_hidden: bool,
}

fn default_max_results() -> usize {
    50
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            mode,
            file_pattern: None,
            file_types: None,
            max_results: default_max_results(),
            context_lines: 0,
            case_sensitive: false,
            whole_word: false,
            include_hidden: false,
        }
    }

    fn cache_key(&self, generation: u64) -> String {
        format!(
            "{}|{:?}|{:?}|{:?}|{}|{}|{}|{}|{}|{}",
            self.query,
            self.mode,
            self.file_pattern,
            self.file_types,
            self.max_results,
            self.context_lines,
            self.case_sensitive,
            self.whole_word,
            self.include_hidden,
            generation
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchMatch {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub before_context: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub after_context: Vec<String>,
    pub match_text: String,
    pub score: f32,
    #[serde(skip)]
    pub file_priority: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub matches: Vec<SearchMatch>,
    pub truncated: bool,
}

/// Search front-end with an LRU-bounded result cache keyed by the full
/// parameter tuple (plus index generation, so reindexing invalidates).
pub struct SearchEngine {
    index: Arc<WorkspaceIndex>,
    cache: Mutex<LruCache>,
}

impl SearchEngine {
    pub fn new(index: Arc<WorkspaceIndex>) -> Self {
        Self {
            index,
            cache: Mutex::new(LruCache::new(CACHE_CAPACITY)),
        }
    }

    pub fn index(&self) -> &Arc<WorkspaceIndex> {
        &self.index
    }

    pub async fn search(&self, query: SearchQuery) -> SearchResponse {
        let key = query.cache_key(self.index.generation());
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            debug!("search cache hit: {}", query.query);
            return (*hit).clone();
        }

        let response = self.run(query).await;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(key, Arc::new(response.clone()));
        response
    }

    async fn run(&self, query: SearchQuery) -> SearchResponse {
        if query.mode == SearchMode::Symbol {
            return self.symbol_search(&query);
        }

        let pattern = match compile(&query) {
            Ok(p) => p,
            Err(e) => {
                debug!("search compile failed: {}", e);
                return SearchResponse {
                    query: query.query,
                    mode: query.mode,
                    matches: Vec::new(),
                    truncated: false,
                };
            }
        };

        let glob = query.file_pattern.as_deref().and_then(|p| {
            GlobBuilder::new(p)
                .literal_separator(false)
                .build()
                .ok()
                .map(|g| g.compile_matcher())
        });

        let candidates: Vec<_> = self
            .index
            .nodes()
            .into_iter()
            .filter(|n| {
                if !query.include_hidden
                    && n.relative_path
                        .split('/')
                        .any(|part| part.starts_with('.'))
                {
                    return false;
                }
                if let Some(types) = &query.file_types {
                    if !types.contains(&n.kind) {
                        return false;
                    }
                }
                if let Some(glob) = &glob {
                    let name = n.relative_path.rsplit('/').next().unwrap_or("");
                    if !glob.is_match(name) && !glob.is_match(&n.relative_path) {
                        return false;
                    }
                }
                true
            })
            .collect();

        let score = base_score(query.mode);
        let root = self.index.root().to_path_buf();
        let context = query.context_lines;

        let mut matches: Vec<SearchMatch> = stream::iter(candidates)
            .map(|node| {
                let pattern = pattern.clone();
                let path = root.join(&node.relative_path);
                async move {
                    tokio::task::spawn_blocking(move || {
                        scan_file(&node, &path, &pattern, context, score)
                    })
                    .await
                    .unwrap_or_default()
                }
            })
            .buffer_unordered(WorkspaceIndex::pool_size())
            .collect::<Vec<Vec<SearchMatch>>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        rank(&mut matches);
        let truncated = matches.len() > query.max_results;
        matches.truncate(query.max_results);

        SearchResponse {
            query: query.query,
            mode: query.mode,
            matches,
            truncated,
        }
    }

    fn symbol_search(&self, query: &SearchQuery) -> SearchResponse {
        let exact = self.index.symbols_named(&query.query);
        let mut locations: Vec<_> = exact
            .into_iter()
            .map(|loc| (1.0f32, loc))
            .collect();
        if !query.whole_word {
            for loc in self.index.symbols_matching(&query.query) {
                if loc.symbol.name != query.query {
                    locations.push((0.8, loc));
                }
            }
        }

        let mut matches: Vec<SearchMatch> = locations
            .into_iter()
            .map(|(score, loc)| {
                let priority = self
                    .index
                    .node(&loc.file)
                    .map(|n| n.priority)
                    .unwrap_or(0);
                SearchMatch {
                    file: loc.file,
                    line: loc.symbol.line,
                    column: 0,
                    content: format!("{:?} {}", loc.symbol.kind, loc.symbol.name),
                    before_context: Vec::new(),
                    after_context: Vec::new(),
                    match_text: loc.symbol.name,
                    score,
                    file_priority: priority,
                }
            })
            .collect();

        // Exact names first, then file priority, then source order.
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.file_priority.cmp(&a.file_priority))
                .then(a.file.cmp(&b.file))
                .then(a.line.cmp(&b.line))
        });
        let truncated = matches.len() > query.max_results;
        matches.truncate(query.max_results);

        SearchResponse {
            query: query.query.clone(),
            mode: SearchMode::Symbol,
            matches,
            truncated,
        }
    }
}

fn base_score(mode: SearchMode) -> f32 {
    match mode {
        SearchMode::Exact | SearchMode::Regex => 1.0,
        SearchMode::Fuzzy => 0.9,
        SearchMode::Semantic => 0.85,
        SearchMode::Symbol => 1.0,
    }
}

fn compile(query: &SearchQuery) -> Result<regex::Regex, regex::Error> {
    let mut pattern = match query.mode {
        SearchMode::Exact => regex::escape(&query.query),
        SearchMode::Fuzzy => query
            .query
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect::<Vec<_>>()
            .join(".*"),
        SearchMode::Regex => query.query.clone(),
        SearchMode::Semantic => query
            .query
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|"),
        SearchMode::Symbol => unreachable!("symbol mode does not compile a regex"),
    };
    if query.whole_word {
        pattern = format!(r"\b(?:{})\b", pattern);
    }
    RegexBuilder::new(&pattern)
        .case_insensitive(!query.case_sensitive)
        .build()
}

fn scan_file(
    node: &crate::node::FileNode,
    path: &std::path::Path,
    pattern: &regex::Regex,
    context_lines: usize,
    score: f32,
) -> Vec<SearchMatch> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let found = match pattern.find(line) {
            Some(m) => m,
            None => continue,
        };
        let start = i.saturating_sub(context_lines);
        let end = (i + context_lines + 1).min(lines.len());
        out.push(SearchMatch {
            file: node.relative_path.clone(),
            line: i + 1,
            column: found.start() + 1,
            content: line.to_string(),
            before_context: lines[start..i].iter().map(|l| l.to_string()).collect(),
            after_context: lines[i + 1..end].iter().map(|l| l.to_string()).collect(),
            match_text: found.as_str().to_string(),
            score,
            file_priority: node.priority,
        });
        if out.len() >= PER_FILE_CAP {
            break;
        }
    }

    out
}

/// Primary key: descending file priority; secondary: descending score; then
/// stable file/line order so results are deterministic.
fn rank(matches: &mut [SearchMatch]) {
    matches.sort_by(|a, b| {
        b.file_priority
            .cmp(&a.file_priority)
            .then(
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.file.cmp(&b.file))
            .then(a.line.cmp(&b.line))
    });
}

struct LruCache {
    capacity: usize,
    map: HashMap<String, Arc<SearchResponse>>,
    order: VecDeque<String>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<Arc<SearchResponse>> {
        let hit = self.map.get(key).cloned()?;
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
        Some(hit)
    }

    fn put(&mut self, key: String, value: Arc<SearchResponse>) {
        if self.map.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.map.remove(&evicted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs;
    use std::path::PathBuf;

    fn test_workspace() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = temp_dir().join(format!("maeum-search-test-{}-{}", std::process::id(), id));
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(
            dir.join("main.py"),
            "def handle_request(req):\n    return process(req)\n",
        )
        .unwrap();
        fs::write(
            dir.join("src/worker.py"),
            "def process(item):\n    # request goes here\n    return item\n",
        )
        .unwrap();
        dir
    }

    async fn engine(dir: &PathBuf) -> SearchEngine {
        let index = Arc::new(WorkspaceIndex::new(dir));
        index.build(true).await;
        SearchEngine::new(index)
    }

    #[tokio::test]
    async fn exact_mode_ranks_by_priority() {
        let dir = test_workspace();
        let engine = engine(&dir).await;

        let response = engine
            .search(SearchQuery::new("request", SearchMode::Exact))
            .await;
        assert!(response.matches.len() >= 2);
        // main.py is an entry point, so it outranks src/worker.py.
        assert_eq!(response.matches[0].file, "main.py");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn max_results_sets_truncated() {
        let dir = test_workspace();
        let engine = engine(&dir).await;

        let mut query = SearchQuery::new("e", SearchMode::Exact);
        query.max_results = 1;
        let response = engine.search(query).await;
        assert_eq!(response.matches.len(), 1);
        assert!(response.truncated);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn symbol_mode_exact_before_partial() {
        let dir = test_workspace();
        let engine = engine(&dir).await;

        let response = engine
            .search(SearchQuery::new("process", SearchMode::Symbol))
            .await;
        assert!(!response.matches.is_empty());
        assert_eq!(response.matches[0].match_text, "process");
        assert_eq!(response.matches[0].score, 1.0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn fuzzy_mode_matches_subsequence() {
        let dir = test_workspace();
        let engine = engine(&dir).await;

        let response = engine
            .search(SearchQuery::new("hdl", SearchMode::Fuzzy))
            .await;
        assert!(response
            .matches
            .iter()
            .any(|m| m.content.contains("handle_request")));
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn context_lines_are_attached() {
        let dir = test_workspace();
        let engine = engine(&dir).await;

        let mut query = SearchQuery::new("return item", SearchMode::Exact);
        query.context_lines = 1;
        let response = engine.search(query).await;
        let m = &response.matches[0];
        assert_eq!(m.before_context.len(), 1);
        assert!(m.before_context[0].contains("request goes here"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn lru_evicts_oldest() {
        let mut cache = LruCache::new(2);
        let resp = Arc::new(SearchResponse {
            query: "q".into(),
            mode: SearchMode::Exact,
            matches: Vec::new(),
            truncated: false,
        });
        cache.put("a".into(), resp.clone());
        cache.put("b".into(), resp.clone());
        cache.get("a");
        cache.put("c".into(), resp);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }
}
