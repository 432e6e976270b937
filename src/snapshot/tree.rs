use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// Roles whose nodes are interaction targets. These carry `[ref=N]` markers
/// in the formatted snapshot and always survive act-mode pruning.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "textbox",
    "searchbox",
    "checkbox",
    "radio",
    "combobox",
    "listbox",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "option",
    "slider",
    "spinbutton",
    "switch",
    "tab",
    "treeitem",
];

/// One node of the reconstructed accessibility tree.
#[derive(Debug, Clone)]
pub struct AxNode {
    /// Per-document accessibility node id; doubles as the reference token.
    pub id: i64,
    pub role: String,
    pub name: String,
    /// Named properties as received (level, checked, expanded, ...).
    pub properties: Vec<(String, Value)>,
    /// Ignored nodes are transparent in output; their children are not.
    pub ignored: bool,
    /// DOM back-identifier used for interaction targeting.
    pub backend_id: Option<i64>,
    pub children: Vec<AxNode>,
}

impl AxNode {
    /// A bare node with no properties or children, for pipeline rewrites.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            role: "text".into(),
            name: name.into(),
            properties: Vec::new(),
            ignored: false,
            backend_id: None,
            children: Vec::new(),
        }
    }

    /// Look up a named property's inner value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Heading level, when this node carries one.
    #[must_use]
    pub fn level(&self) -> Option<i64> {
        self.property("level").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        INTERACTIVE_ROLES.contains(&self.role.as_str())
    }

    /// Whether any node below this one (excluding it) is interactive.
    #[must_use]
    pub fn has_interactive_descendant(&self) -> bool {
        self.children
            .iter()
            .any(|c| c.is_interactive() || c.has_interactive_descendant())
    }

    /// All accessible names in this subtree, lowercased and concatenated.
    #[must_use]
    pub fn concatenated_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if !self.name.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&self.name.to_lowercase());
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// Result of reconstructing a flat node batch.
pub struct TreeBuild {
    /// The single parentless node, or `None` for an empty batch.
    pub root: Option<AxNode>,
    /// Reference token to DOM back-identifier, for every node that has one.
    pub refs: HashMap<String, i64>,
}

struct RawNode {
    id: i64,
    parent_id: Option<i64>,
    ignored: bool,
    role: String,
    name: String,
    properties: Vec<(String, Value)>,
    backend_id: Option<i64>,
}

/// Node ids arrive as decimal strings in some browser versions and as
/// numbers in others.
fn node_id(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str()?.parse().ok())
}

fn parse_raw(nodes: &[Value]) -> Vec<RawNode> {
    nodes
        .iter()
        .filter_map(|n| {
            let properties = n["properties"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|p| {
                            let name = p["name"].as_str()?.to_string();
                            let value = p["value"]["value"].clone();
                            Some((name, value))
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(RawNode {
                id: node_id(&n["nodeId"])?,
                parent_id: n.get("parentId").and_then(node_id),
                ignored: n["ignored"].as_bool().unwrap_or(false),
                role: n["role"]["value"].as_str().unwrap_or_default().to_string(),
                name: n["name"]["value"].as_str().unwrap_or_default().to_string(),
                properties,
                backend_id: n["backendDOMNodeId"].as_i64(),
            })
        })
        .collect()
}

/// Reconstruct the tree from a flat batch using parent identifiers only.
///
/// Remote child-id lists are never consulted: some browser versions emit
/// duplicates in them. Child order under a parent is the batch order. The
/// reference map pairs every node id with its DOM back-identifier when one
/// is present.
#[must_use]
pub fn build_tree(nodes: &[Value]) -> TreeBuild {
    let raw = parse_raw(nodes);

    let mut children_of: HashMap<i64, Vec<usize>> = HashMap::with_capacity(raw.len());
    let mut root_idx = None;
    for (idx, node) in raw.iter().enumerate() {
        match node.parent_id {
            Some(pid) => children_of.entry(pid).or_default().push(idx),
            None => {
                if root_idx.is_none() {
                    root_idx = Some(idx);
                }
            }
        }
    }

    let mut refs = HashMap::new();
    let root = root_idx.map(|idx| {
        let mut visited = HashSet::new();
        assemble(idx, &raw, &children_of, &mut refs, &mut visited)
    });

    TreeBuild { root, refs }
}

fn assemble(
    idx: usize,
    raw: &[RawNode],
    children_of: &HashMap<i64, Vec<usize>>,
    refs: &mut HashMap<String, i64>,
    visited: &mut HashSet<i64>,
) -> AxNode {
    let node = &raw[idx];
    visited.insert(node.id);

    if let Some(backend) = node.backend_id {
        refs.insert(node.id.to_string(), backend);
    }

    let children = children_of
        .get(&node.id)
        .map(|idxs| {
            idxs.iter()
                .filter(|&&ci| !visited.contains(&raw[ci].id))
                .copied()
                .collect::<Vec<_>>()
                .into_iter()
                .map(|ci| assemble(ci, raw, children_of, refs, visited))
                .collect()
        })
        .unwrap_or_default();

    AxNode {
        id: node.id,
        role: node.role.clone(),
        name: node.name.clone(),
        properties: node.properties.clone(),
        ignored: node.ignored,
        backend_id: node.backend_id,
        children,
    }
}
