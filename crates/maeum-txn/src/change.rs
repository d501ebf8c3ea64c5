//! Transaction and change models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Modify,
    Delete,
    Rename,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Applied,
    Failed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxnStatus {
    Pending,
    Applied,
    Failed,
    Undone,
}

/// One file mutation. `old_content` holds the pre-state for every operation
/// that can be reverted; `new_content` the post-state for create/modify.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    pub operation: Operation,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    pub status: ChangeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Change {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            operation: Operation::Create,
            file_path: path.into(),
            new_path: None,
            old_content: None,
            new_content: Some(content.into()),
            status: ChangeStatus::Pending,
            error: None,
        }
    }

    pub fn modify(
        path: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            operation: Operation::Modify,
            file_path: path.into(),
            new_path: None,
            old_content: Some(old.into()),
            new_content: Some(new.into()),
            status: ChangeStatus::Pending,
            error: None,
        }
    }

    pub fn delete(path: impl Into<String>, old: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            file_path: path.into(),
            new_path: None,
            old_content: Some(old.into()),
            new_content: None,
            status: ChangeStatus::Pending,
            error: None,
        }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            operation: Operation::Rename,
            file_path: from.into(),
            new_path: Some(to.into()),
            old_content: None,
            new_content: None,
            status: ChangeStatus::Pending,
            error: None,
        }
    }

    /// A change is revertible when its pre-state was captured. Creates and
    /// renames revert structurally; modify/delete need `old_content`.
    pub fn revertible(&self) -> bool {
        match self.operation {
            Operation::Create => true,
            Operation::Rename => self.new_path.is_some(),
            Operation::Modify | Operation::Delete => self.old_content.is_some(),
        }
    }

    /// Retained-byte footprint for the undo budget.
    pub fn footprint(&self) -> usize {
        self.file_path.len()
            + self.new_path.as_deref().map_or(0, str::len)
            + self.old_content.as_deref().map_or(0, str::len)
            + self.new_content.as_deref().map_or(0, str::len)
    }
}

/// Unit of undo: an ordered group of changes applied together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<Change>,
    pub status: TxnStatus,
}

impl Transaction {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            timestamp: Utc::now(),
            changes: Vec::new(),
            status: TxnStatus::Pending,
        }
    }

    pub fn footprint(&self) -> usize {
        let header = self.id.len() + self.description.len() + 32;
        header + self.changes.iter().map(Change::footprint).sum::<usize>()
    }

    /// Short human summary for the history endpoint.
    pub fn summary(&self) -> String {
        let files: Vec<&str> = self
            .changes
            .iter()
            .map(|c| c.file_path.as_str())
            .collect();
        format!(
            "{} ({} change{}: {})",
            self.description,
            self.changes.len(),
            if self.changes.len() == 1 { "" } else { "s" },
            files.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revertibility_rules() {
        assert!(Change::create("a.txt", "x").revertible());
        assert!(Change::modify("a.txt", "x", "y").revertible());
        assert!(Change::delete("a.txt", "x").revertible());
        assert!(Change::rename("a.txt", "b.txt").revertible());

        let mut broken = Change::modify("a.txt", "x", "y");
        broken.old_content = None;
        assert!(!broken.revertible());
    }

    #[test]
    fn footprint_counts_content_and_paths() {
        let change = Change::modify("a.txt", "old", "new!");
        assert_eq!(change.footprint(), 5 + 3 + 4);
    }
}
