use std::fmt::Write;

use super::tree::AxNode;

/// Roles that are pure render noise and never emitted. Their children are.
const RENDER_NOISE_ROLES: &[&str] = &["InlineTextBox", "LineBreak", "ListMarker"];

/// Properties worth showing, in emission order.
const EMITTED_PROPERTIES: &[&str] = &[
    "checked",
    "disabled",
    "expanded",
    "level",
    "selected",
    "required",
    "value",
];

/// Serialize a tree as indented text, one line per emitted node:
/// `- ROLE "name" [prop=value, …] [ref=N]`.
///
/// Ignored nodes and `_promote` wrappers are transparent: their line is not
/// emitted but their children are, at the same depth.
#[must_use]
pub fn format_tree(root: &AxNode) -> String {
    let mut out = String::new();
    format_node(root, 0, &mut out);
    out
}

fn format_node(node: &AxNode, depth: usize, out: &mut String) {
    if RENDER_NOISE_ROLES.contains(&node.role.as_str()) {
        return;
    }

    if node.ignored || node.role == "_promote" {
        for child in &node.children {
            format_node(child, depth, out);
        }
        return;
    }

    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}- {} \"{}\"", node.role, node.name);

    let props = emitted_properties(node);
    if !props.is_empty() {
        let _ = write!(out, " [{}]", props.join(", "));
    }

    if node.is_interactive() && node.backend_id.is_some() {
        let _ = write!(out, " [ref={}]", node.id);
    }

    out.push('\n');

    for child in &node.children {
        format_node(child, depth + 1, out);
    }
}

fn emitted_properties(node: &AxNode) -> Vec<String> {
    let mut out = Vec::new();
    for key in EMITTED_PROPERTIES {
        let Some(value) = node.property(key) else {
            continue;
        };
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if rendered.is_empty() || rendered == "null" {
            continue;
        }
        out.push(format!("{key}={rendered}"));
    }
    out
}

/// Prefix the formatted body with the statistics line:
/// `# <raw> chars → <pruned> chars (NN% pruned)`.
///
/// `raw_chars` is the size the unpruned tree would have formatted to; the
/// declared pruned count always equals the body's character count.
#[must_use]
pub fn with_stats_prefix(raw_chars: usize, body: &str) -> String {
    let pruned_chars = body.chars().count();
    let percent = if raw_chars == 0 {
        0
    } else {
        (raw_chars.saturating_sub(pruned_chars) * 100) / raw_chars
    };
    format!("# {raw_chars} chars → {pruned_chars} chars ({percent}% pruned)\n{body}")
}
