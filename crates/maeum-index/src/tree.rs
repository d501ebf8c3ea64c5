//! Workspace tree rendering for prompts and the project_structure tool

use crate::walker::is_ignored_dir;
use std::path::Path;

/// Render a directory tree with icons, depth- and line-capped. The output is
/// what the model sees in its prompt, so it stays compact.
pub fn render_tree(root: &Path, max_depth: usize, max_lines: usize) -> String {
    let mut lines = Vec::new();
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    lines.push(format!("📁 {}/", root_name));
    render_dir(root, 1, max_depth, max_lines, &mut lines);
    let mut truncated = false;
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        truncated = true;
    }
    let mut out = lines.join("\n");
    if truncated {
        out.push_str("\n... (truncated)");
    }
    out
}

fn render_dir(
    dir: &Path,
    depth: usize,
    max_depth: usize,
    max_lines: usize,
    lines: &mut Vec<String>,
) {
    if depth > max_depth || lines.len() > max_lines {
        return;
    }
    let mut entries: Vec<_> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return,
    };
    // Directories first, then files, each alphabetical.
    entries.sort_by_key(|e| {
        let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
        (!is_dir, e.file_name().to_string_lossy().to_lowercase())
    });

    for entry in entries {
        if lines.len() > max_lines {
            return;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if name.starts_with('.') || (is_dir && is_ignored_dir(&name)) {
            continue;
        }
        let indent = "  ".repeat(depth);
        if is_dir {
            lines.push(format!("{}📁 {}/", indent, name));
            render_dir(&entry.path(), depth + 1, max_depth, max_lines, lines);
        } else {
            lines.push(format!("{}📄 {}", indent, name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs;

    #[test]
    fn renders_depth_capped_tree() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = temp_dir().join(format!("maeum-tree-test-{}-{}", std::process::id(), id));
        fs::create_dir_all(dir.join("src/deep/deeper")).unwrap();
        fs::create_dir_all(dir.join("node_modules/x")).unwrap();
        fs::write(dir.join("main.py"), "").unwrap();
        fs::write(dir.join("src/app.py"), "").unwrap();
        fs::write(dir.join("src/deep/inner.py"), "").unwrap();

        let tree = render_tree(&dir, 2, 150);
        assert!(tree.contains("📄 main.py"));
        assert!(tree.contains("📁 src/"));
        assert!(tree.contains("📄 app.py"));
        // Depth 3 content and pruned dirs stay invisible.
        assert!(!tree.contains("inner.py"));
        assert!(!tree.contains("node_modules"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn caps_total_lines() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = temp_dir().join(format!("maeum-tree-cap-{}-{}", std::process::id(), id));
        fs::create_dir_all(&dir).unwrap();
        for i in 0..40 {
            fs::write(dir.join(format!("file{:02}.txt", i)), "").unwrap();
        }
        let tree = render_tree(&dir, 3, 10);
        assert!(tree.lines().count() <= 11);
        assert!(tree.ends_with("(truncated)"));
        let _ = fs::remove_dir_all(&dir);
    }
}
