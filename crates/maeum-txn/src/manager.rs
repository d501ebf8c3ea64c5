//! Transaction manager - staged changes, commit with rollback, undo/redo

use crate::change::{Change, ChangeStatus, Operation, Transaction, TxnStatus};
use crate::fileops;
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Soft cap on retained transactions.
const MAX_TRANSACTIONS: usize = 1000;

/// Hard cap on retained content bytes across the undo stack.
const MAX_RETAINED_BYTES: usize = 3 * 1024 * 1024 * 1024;

pub type TxnResult<T> = Result<T, TxnError>;

#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("a transaction is already open")]
    AlreadyOpen,

    #[error("no open transaction")]
    NoOpenTransaction,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("text not found in {0}")]
    TextNotFound(String),

    #[error("text occurs {count} times in {path} - must be unique")]
    Ambiguous { path: String, count: usize },

    #[error("binary file: {0}")]
    Binary(String),

    #[error("path escapes workspace: {0}")]
    OutsideWorkspace(String),

    #[error("transaction contains a non-revertible change for {0}")]
    NonRevertible(String),

    #[error("commit failed at {path}: {detail}")]
    CommitFailed { path: String, detail: String },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An open transaction plus the effective content of files it has staged
/// (so a second operation on the same file sees the first one's result).
struct PendingTxn {
    txn: Transaction,
    /// path -> effective content; `None` means staged-deleted.
    staged: HashMap<String, Option<String>>,
}

#[derive(Default)]
struct Inner {
    open: Option<PendingTxn>,
    undo: VecDeque<Transaction>,
    redo: Vec<Transaction>,
    retained_bytes: usize,
}

/// Process-wide manager. All operations serialize under one mutex; only one
/// transaction is open at a time.
pub struct TransactionManager {
    workspace_root: PathBuf,
    inner: Mutex<Inner>,
}

impl TransactionManager {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Resolve a workspace-relative path, rejecting escapes. Lexical only:
    /// the target may not exist yet.
    pub fn resolve(&self, relative: &str) -> TxnResult<PathBuf> {
        let candidate = Path::new(relative);
        let mut resolved = self.workspace_root.clone();
        let components = if candidate.is_absolute() {
            match candidate.strip_prefix(&self.workspace_root) {
                Ok(rest) => rest.components(),
                Err(_) => return Err(TxnError::OutsideWorkspace(relative.to_string())),
            }
        } else {
            candidate.components()
        };
        for component in components {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() || !resolved.starts_with(&self.workspace_root) {
                        return Err(TxnError::OutsideWorkspace(relative.to_string()));
                    }
                }
                _ => return Err(TxnError::OutsideWorkspace(relative.to_string())),
            }
        }
        if resolved.starts_with(&self.workspace_root) {
            Ok(resolved)
        } else {
            Err(TxnError::OutsideWorkspace(relative.to_string()))
        }
    }

    pub fn begin(&self, description: impl Into<String>) -> TxnResult<String> {
        let mut inner = self.lock();
        if inner.open.is_some() {
            return Err(TxnError::AlreadyOpen);
        }
        let id = Uuid::new_v4().to_string();
        inner.open = Some(PendingTxn {
            txn: Transaction::new(id.clone(), description),
            staged: HashMap::new(),
        });
        debug!("txn begin: {}", id);
        Ok(id)
    }

    /// Effective content of a path as the open transaction sees it.
    fn effective_content(
        &self,
        pending: &PendingTxn,
        relative: &str,
        resolved: &Path,
    ) -> TxnResult<Option<String>> {
        if let Some(staged) = pending.staged.get(relative) {
            return Ok(staged.clone());
        }
        match std::fs::read_to_string(resolved) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn check_not_binary(&self, relative: &str, resolved: &Path) -> TxnResult<()> {
        if resolved.exists() && fileops::is_binary(resolved) {
            return Err(TxnError::Binary(relative.to_string()));
        }
        Ok(())
    }

    /// Stage a find-and-replace edit. `old` must occur exactly once unless
    /// `replace_all` is set.
    pub fn stage_edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> TxnResult<usize> {
        let resolved = self.resolve(path)?;
        self.check_not_binary(path, &resolved)?;
        let mut inner = self.lock();
        let pending = inner.open.as_mut().ok_or(TxnError::NoOpenTransaction)?;

        let current = match self.effective_content(pending, path, &resolved)? {
            Some(c) => c,
            None => return Err(TxnError::NotFound(path.to_string())),
        };

        let count = current.matches(old).count();
        if count == 0 {
            return Err(TxnError::TextNotFound(path.to_string()));
        }
        if count > 1 && !replace_all {
            return Err(TxnError::Ambiguous {
                path: path.to_string(),
                count,
            });
        }

        let replaced = if replace_all {
            current.replace(old, new)
        } else {
            current.replacen(old, new, 1)
        };

        pending
            .txn
            .changes
            .push(Change::modify(path, current, replaced.clone()));
        pending.staged.insert(path.to_string(), Some(replaced));
        Ok(count)
    }

    /// Stage a full-content write: create or modify depending on whether the
    /// path currently (effectively) exists.
    pub fn stage_write(&self, path: &str, content: &str) -> TxnResult<Operation> {
        let resolved = self.resolve(path)?;
        self.check_not_binary(path, &resolved)?;
        let mut inner = self.lock();
        let pending = inner.open.as_mut().ok_or(TxnError::NoOpenTransaction)?;

        let operation = match self.effective_content(pending, path, &resolved)? {
            Some(old) => {
                pending
                    .txn
                    .changes
                    .push(Change::modify(path, old, content));
                Operation::Modify
            }
            None => {
                pending.txn.changes.push(Change::create(path, content));
                Operation::Create
            }
        };
        pending
            .staged
            .insert(path.to_string(), Some(content.to_string()));
        Ok(operation)
    }

    pub fn stage_delete(&self, path: &str) -> TxnResult<()> {
        let resolved = self.resolve(path)?;
        let mut inner = self.lock();
        let pending = inner.open.as_mut().ok_or(TxnError::NoOpenTransaction)?;

        let old = self
            .effective_content(pending, path, &resolved)?
            .ok_or_else(|| TxnError::NotFound(path.to_string()))?;
        pending.txn.changes.push(Change::delete(path, old));
        pending.staged.insert(path.to_string(), None);
        Ok(())
    }

    pub fn stage_rename(&self, from: &str, to: &str) -> TxnResult<()> {
        let resolved_from = self.resolve(from)?;
        self.resolve(to)?;
        let mut inner = self.lock();
        let pending = inner.open.as_mut().ok_or(TxnError::NoOpenTransaction)?;

        let content = self
            .effective_content(pending, from, &resolved_from)?
            .ok_or_else(|| TxnError::NotFound(from.to_string()))?;
        pending.txn.changes.push(Change::rename(from, to));
        pending.staged.insert(from.to_string(), None);
        pending.staged.insert(to.to_string(), Some(content));
        Ok(())
    }

    /// Apply the staged changes in order. Any failure rolls back the changes
    /// already applied and marks the transaction failed. `dry_run` returns
    /// the transaction without touching disk.
    pub fn commit(&self, dry_run: bool) -> TxnResult<Transaction> {
        let mut inner = self.lock();
        let pending = inner.open.take().ok_or(TxnError::NoOpenTransaction)?;
        let mut txn = pending.txn;

        if let Some(bad) = txn.changes.iter().find(|c| !c.revertible()) {
            let path = bad.file_path.clone();
            inner.open = Some(PendingTxn {
                txn,
                staged: pending.staged,
            });
            return Err(TxnError::NonRevertible(path));
        }

        if dry_run {
            let preview = txn.clone();
            inner.open = Some(PendingTxn {
                txn,
                staged: pending.staged,
            });
            return Ok(preview);
        }

        let mut applied: Vec<usize> = Vec::new();
        let mut failure: Option<(String, String)> = None;

        for (i, change) in txn.changes.iter_mut().enumerate() {
            match self.apply_change(change) {
                Ok(()) => {
                    change.status = ChangeStatus::Applied;
                    applied.push(i);
                }
                Err(e) => {
                    change.status = ChangeStatus::Failed;
                    change.error = Some(e.to_string());
                    failure = Some((change.file_path.clone(), e.to_string()));
                    break;
                }
            }
        }

        if let Some((path, detail)) = failure {
            // Reverse-apply what we already did.
            for &i in applied.iter().rev() {
                if let Err(e) = self.revert_change(&txn.changes[i]) {
                    warn!("rollback of {} failed: {}", txn.changes[i].file_path, e);
                }
            }
            txn.status = TxnStatus::Failed;
            return Err(TxnError::CommitFailed { path, detail });
        }

        txn.status = TxnStatus::Applied;
        info!("txn applied: {} ({})", txn.id, txn.summary());

        inner.retained_bytes += txn.footprint();
        inner.undo.push_back(txn.clone());
        inner.redo.clear();
        while inner.undo.len() > MAX_TRANSACTIONS
            || inner.retained_bytes > MAX_RETAINED_BYTES
        {
            match inner.undo.pop_front() {
                Some(evicted) => {
                    inner.retained_bytes =
                        inner.retained_bytes.saturating_sub(evicted.footprint());
                    debug!("evicted txn {} from undo stack", evicted.id);
                }
                None => break,
            }
        }

        Ok(txn)
    }

    /// Discard staged changes without applying.
    pub fn rollback(&self) -> TxnResult<()> {
        let mut inner = self.lock();
        inner.open.take().ok_or(TxnError::NoOpenTransaction)?;
        Ok(())
    }

    fn apply_change(&self, change: &Change) -> TxnResult<()> {
        match change.operation {
            Operation::Create => {
                let path = self.resolve(&change.file_path)?;
                let content = change.new_content.as_deref().unwrap_or("");
                fileops::atomic_write(&path, content)?;
            }
            Operation::Modify => {
                let path = self.resolve(&change.file_path)?;
                fileops::snapshot(&self.workspace_root, &path)?;
                let content = change.new_content.as_deref().unwrap_or("");
                fileops::atomic_write(&path, content)?;
            }
            Operation::Delete => {
                let path = self.resolve(&change.file_path)?;
                fileops::snapshot(&self.workspace_root, &path)?;
                std::fs::remove_file(&path)?;
            }
            Operation::Rename => {
                let from = self.resolve(&change.file_path)?;
                let to = self.resolve(change.new_path.as_deref().unwrap_or_default())?;
                if let Some(parent) = to.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&from, &to)?;
            }
        }
        Ok(())
    }

    fn revert_change(&self, change: &Change) -> TxnResult<()> {
        match change.operation {
            Operation::Create => {
                let path = self.resolve(&change.file_path)?;
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Operation::Modify | Operation::Delete => {
                let path = self.resolve(&change.file_path)?;
                let old = change.old_content.as_deref().unwrap_or("");
                fileops::atomic_write(&path, old)?;
            }
            Operation::Rename => {
                let from = self.resolve(&change.file_path)?;
                let to = self.resolve(change.new_path.as_deref().unwrap_or_default())?;
                std::fs::rename(&to, &from)?;
            }
        }
        Ok(())
    }

    fn reapply_change(&self, change: &Change) -> TxnResult<()> {
        self.apply_change(change)
    }

    /// Pop the newest applied transaction and reverse it, change by change,
    /// in reverse order.
    pub fn undo(&self) -> TxnResult<Transaction> {
        let mut inner = self.lock();
        let mut txn = inner.undo.pop_back().ok_or(TxnError::NothingToUndo)?;
        inner.retained_bytes = inner.retained_bytes.saturating_sub(txn.footprint());

        for change in txn.changes.iter().rev() {
            self.revert_change(change)?;
        }
        txn.status = TxnStatus::Undone;
        info!("txn undone: {}", txn.id);
        inner.redo.push(txn.clone());
        Ok(txn)
    }

    pub fn redo(&self) -> TxnResult<Transaction> {
        let mut inner = self.lock();
        let mut txn = inner.redo.pop().ok_or(TxnError::NothingToRedo)?;

        for change in &txn.changes {
            self.reapply_change(change)?;
        }
        txn.status = TxnStatus::Applied;
        info!("txn redone: {}", txn.id);
        inner.retained_bytes += txn.footprint();
        inner.undo.push_back(txn.clone());
        Ok(txn)
    }

    /// Peek the transaction `undo()` would revert.
    pub fn preview_undo(&self) -> Option<Transaction> {
        self.lock().undo.back().cloned()
    }

    pub fn preview_redo(&self) -> Option<Transaction> {
        self.lock().redo.last().cloned()
    }

    /// Newest-first transaction summaries.
    pub fn history(&self, limit: usize) -> Vec<Transaction> {
        self.lock()
            .undo
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn undo_depth(&self) -> usize {
        self.lock().undo.len()
    }

    pub fn retained_bytes(&self) -> usize {
        self.lock().retained_bytes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs;

    fn test_manager() -> (PathBuf, TransactionManager) {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = temp_dir().join(format!("maeum-txn-test-{}-{}", std::process::id(), id));
        fs::create_dir_all(&dir).unwrap();
        let manager = TransactionManager::new(&dir);
        (dir, manager)
    }

    fn commit_write(manager: &TransactionManager, path: &str, content: &str) {
        manager.begin(format!("write {}", path)).unwrap();
        manager.stage_write(path, content).unwrap();
        manager.commit(false).unwrap();
    }

    #[test]
    fn write_then_read_round_trip() {
        let (dir, manager) = test_manager();
        commit_write(&manager, "a.txt", "hello\n");
        assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "hello\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn edit_requires_unique_occurrence() {
        let (dir, manager) = test_manager();
        commit_write(&manager, "a.txt", "x x y");

        manager.begin("edit").unwrap();
        let err = manager.stage_edit("a.txt", "x", "z", false).unwrap_err();
        assert!(matches!(err, TxnError::Ambiguous { count: 2, .. }));
        let err = manager.stage_edit("a.txt", "missing", "z", false).unwrap_err();
        assert!(matches!(err, TxnError::TextNotFound(_)));
        manager.stage_edit("a.txt", "y", "w", false).unwrap();
        manager.commit(false).unwrap();
        assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "x x w");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn undo_redo_round_trip_restores_bytes() {
        let (dir, manager) = test_manager();
        let file = dir.join("a.txt");

        // T1=write "1", T2=edit 1->2, T3=delete
        commit_write(&manager, "a.txt", "1");
        manager.begin("edit").unwrap();
        manager.stage_edit("a.txt", "1", "2", false).unwrap();
        manager.commit(false).unwrap();
        manager.begin("delete").unwrap();
        manager.stage_delete("a.txt").unwrap();
        manager.commit(false).unwrap();
        assert!(!file.exists());

        manager.undo().unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "2");
        manager.undo().unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "1");
        manager.undo().unwrap();
        assert!(!file.exists());

        manager.redo().unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "1");
        manager.redo().unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "2");
        manager.redo().unwrap();
        assert!(!file.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rename_round_trip_restores_layout() {
        let (dir, manager) = test_manager();
        commit_write(&manager, "a.txt", "content");

        manager.begin("rename").unwrap();
        manager.stage_rename("a.txt", "b.txt").unwrap();
        manager.commit(false).unwrap();
        assert!(dir.join("b.txt").exists());
        assert!(!dir.join("a.txt").exists());

        manager.undo().unwrap();
        assert!(dir.join("a.txt").exists());
        assert!(!dir.join("b.txt").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn same_file_twice_keeps_pre_transaction_old_content() {
        let (dir, manager) = test_manager();
        commit_write(&manager, "a.txt", "base");

        manager.begin("double write").unwrap();
        manager.stage_write("a.txt", "first").unwrap();
        manager.stage_write("a.txt", "second").unwrap();
        let txn = manager.commit(false).unwrap();

        // Final state is the last write.
        assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "second");
        // First change captured the pre-transaction state.
        assert_eq!(txn.changes[0].old_content.as_deref(), Some("base"));

        manager.undo().unwrap();
        assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "base");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn commit_failure_rolls_back_applied_changes() {
        let (dir, manager) = test_manager();
        commit_write(&manager, "a.txt", "keep");

        manager.begin("partial").unwrap();
        manager.stage_write("a.txt", "changed").unwrap();
        manager.stage_delete("a.txt").unwrap();
        // Sabotage the second change so apply fails: deleting a path that
        // no longer resolves to a file.
        {
            let mut inner = manager.inner.lock().unwrap();
            let pending = inner.open.as_mut().unwrap();
            pending.txn.changes[1].file_path = "ghost/missing.txt".into();
        }
        let err = manager.commit(false).unwrap_err();
        assert!(matches!(err, TxnError::CommitFailed { .. }));
        assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "keep");
        assert_eq!(manager.undo_depth(), 1); // only the initial write
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn new_commit_clears_redo() {
        let (dir, manager) = test_manager();
        commit_write(&manager, "a.txt", "1");
        manager.undo().unwrap();
        assert!(manager.preview_redo().is_some());

        commit_write(&manager, "b.txt", "x");
        assert!(manager.preview_redo().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_escape_rejected() {
        let (dir, manager) = test_manager();
        manager.begin("escape").unwrap();
        let err = manager.stage_write("../outside.txt", "x").unwrap_err();
        assert!(matches!(err, TxnError::OutsideWorkspace(_)));
        manager.rollback().unwrap();
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn binary_write_rejected() {
        let (dir, manager) = test_manager();
        fs::write(dir.join("blob.bin"), [1u8, 0, 2]).unwrap();

        manager.begin("binary").unwrap();
        let err = manager.stage_write("blob.bin", "text").unwrap_err();
        assert!(matches!(err, TxnError::Binary(_)));
        manager.rollback().unwrap();
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn only_one_transaction_open() {
        let (dir, manager) = test_manager();
        manager.begin("one").unwrap();
        assert!(matches!(manager.begin("two"), Err(TxnError::AlreadyOpen)));
        manager.rollback().unwrap();
        let _ = fs::remove_dir_all(&dir);
    }
}
