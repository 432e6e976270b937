//! The snapshot engine: rebuild the accessibility tree, prune it down to
//! what an agent needs, and format it with stable per-snapshot references.

pub mod format;
pub mod prune;
pub mod tree;

use std::collections::HashMap;

use serde_json::Value;

pub use format::{format_tree, with_stats_prefix};
pub use prune::{PruneOptions, SnapshotMode, prune_tree};
pub use tree::{AxNode, INTERACTIVE_ROLES, TreeBuild, build_tree};

/// A rendered snapshot plus the reference map that makes its `[ref=N]`
/// markers actionable. The map is only meaningful against this text.
pub struct Snapshot {
    /// Statistics line followed by the indented tree body.
    pub text: String,
    /// Reference token to DOM back-identifier.
    pub refs: HashMap<String, i64>,
}

/// Run the whole engine over a raw `Accessibility.getFullAXTree` node batch.
///
/// Pure: once the batch is in hand this cannot fail. An empty batch renders
/// an empty document.
#[must_use]
pub fn render(nodes: &[Value], opts: &PruneOptions) -> Snapshot {
    let build = build_tree(nodes);
    let Some(root) = build.root else {
        return Snapshot {
            text: with_stats_prefix(0, ""),
            refs: build.refs,
        };
    };

    let raw_chars = format_tree(&root).chars().count();
    let body = prune_tree(&root, opts)
        .map(|pruned| format_tree(&pruned))
        .unwrap_or_default();

    Snapshot {
        text: with_stats_prefix(raw_chars, &body),
        refs: build.refs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: u64, parent: Option<u64>, role: &str, name: &str, backend: i64) -> Value {
        let mut v = json!({
            "nodeId": id.to_string(),
            "ignored": false,
            "role": {"value": role},
            "name": {"value": name},
            "properties": [],
            "backendDOMNodeId": backend,
        });
        if let Some(p) = parent {
            v["parentId"] = Value::String(p.to_string());
        }
        v
    }

    #[test]
    fn render_emits_stats_line_and_refs() {
        let nodes = vec![
            raw(1, None, "RootWebArea", "Example", 1),
            raw(2, Some(1), "heading", "Example Domain", 10),
            raw(3, Some(1), "link", "More information...", 30),
        ];
        let snap = render(&nodes, &PruneOptions::new(SnapshotMode::Act));
        assert!(snap.text.starts_with("# "));
        assert!(snap.text.contains("- link \"More information...\" [ref=3]"));
        assert_eq!(snap.refs.get("3"), Some(&30));
    }

    #[test]
    fn render_empty_batch() {
        let snap = render(&[], &PruneOptions::new(SnapshotMode::Act));
        assert_eq!(snap.text, "# 0 chars → 0 chars (0% pruned)\n");
        assert!(snap.refs.is_empty());
    }

    #[test]
    fn declared_pruned_chars_match_body() {
        let nodes = vec![
            raw(1, None, "RootWebArea", "P", 1),
            raw(2, Some(1), "heading", "Title", 10),
            raw(3, Some(1), "paragraph", "", 20),
            raw(4, Some(3), "StaticText", "long rambling prose that is decidedly not a label", 21),
            raw(5, Some(1), "button", "Go", 30),
        ];
        let snap = render(&nodes, &PruneOptions::new(SnapshotMode::Act));
        let first_line = snap.text.lines().next().unwrap();
        let declared: usize = first_line.split_whitespace().nth(4).unwrap().parse().unwrap();
        let body = &snap.text[snap.text.find('\n').unwrap() + 1..];
        assert_eq!(body.chars().count(), declared);
    }

    #[test]
    fn raw_is_larger_than_pruned_for_noisy_page() {
        let nodes = vec![
            raw(1, None, "RootWebArea", "P", 1),
            raw(2, Some(1), "heading", "Title", 10),
            raw(3, Some(1), "paragraph", "", 20),
            raw(4, Some(3), "StaticText", "filler prose filler prose filler prose", 21),
            raw(5, Some(1), "link", "Next", 30),
        ];
        let snap = render(&nodes, &PruneOptions::new(SnapshotMode::Act));
        let mut parts = snap.text.lines().next().unwrap().split_whitespace();
        let raw_count: usize = parts.nth(1).unwrap().parse().unwrap();
        let pruned_count: usize = parts.nth(2).unwrap().parse().unwrap();
        assert!(raw_count > pruned_count);
    }
}
