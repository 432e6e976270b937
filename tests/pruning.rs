//! End-to-end tests for the snapshot engine: raw node batches in, pruned
//! documents out.

use serde_json::{Value, json};

use agentpage::snapshot::{
    PruneOptions, SnapshotMode, build_tree, format_tree, prune_tree, render,
};

// =============================================================================
// Fixture builders
// =============================================================================

struct Batch {
    nodes: Vec<Value>,
    next_id: u64,
}

impl Batch {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            next_id: 1,
        }
    }

    fn push(&mut self, parent: Option<u64>, role: &str, name: &str, props: Value) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let mut node = json!({
            "nodeId": id.to_string(),
            "ignored": false,
            "role": {"value": role},
            "name": {"value": name},
            "properties": props,
            "backendDOMNodeId": id * 100,
        });
        if let Some(p) = parent {
            node["parentId"] = Value::String(p.to_string());
        }
        self.nodes.push(node);
        id
    }

    fn node(&mut self, parent: Option<u64>, role: &str, name: &str) -> u64 {
        self.push(parent, role, name, json!([]))
    }

    fn heading(&mut self, parent: u64, name: &str, level: u64) -> u64 {
        self.push(
            Some(parent),
            "heading",
            name,
            json!([{"name": "level", "value": {"value": level}}]),
        )
    }
}

fn body_of(text: &str) -> &str {
    &text[text.find('\n').unwrap() + 1..]
}

// =============================================================================
// Scenario: trivial page
// =============================================================================

fn trivial_page() -> Batch {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Example Domain");
    b.heading(root, "Example Domain", 1);
    let para = b.node(Some(root), "paragraph", "");
    b.node(
        Some(para),
        "StaticText",
        "This domain is for use in illustrative examples in documents.",
    );
    b.node(Some(root), "link", "More information...");
    b
}

#[test]
fn trivial_page_act_mode() {
    let batch = trivial_page();
    let snap = render(&batch.nodes, &PruneOptions::new(SnapshotMode::Act));
    let body = body_of(&snap.text);

    assert!(body.contains("- heading \"Example Domain\" [level=1]"));
    assert!(body.contains("- link \"More information...\" [ref=5]"));
    assert!(!body.contains("paragraph"));
    assert!(!body.contains("This domain is for use"));

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2, "act output is exactly heading + link: {body}");
}

#[test]
fn trivial_page_browse_mode_keeps_paragraph() {
    let batch = trivial_page();
    let snap = render(&batch.nodes, &PruneOptions::new(SnapshotMode::Browse));
    let body = body_of(&snap.text);

    assert!(body.contains("- heading \"Example Domain\""));
    assert!(body.contains("- link \"More information...\""));
    assert!(body.contains("- paragraph"));
}

#[test]
fn trivial_page_raw_exceeds_pruned() {
    let batch = trivial_page();
    let snap = render(&batch.nodes, &PruneOptions::new(SnapshotMode::Act));
    let mut parts = snap.text.lines().next().unwrap().split_whitespace();
    let raw: usize = parts.nth(1).unwrap().parse().unwrap();
    let pruned: usize = parts.nth(2).unwrap().parse().unwrap();
    assert!(raw > pruned);
}

// =============================================================================
// Scenario: landmarked page
// =============================================================================

fn landmarked_page() -> Batch {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Shop");
    let banner = b.node(Some(root), "banner", "");
    b.heading(banner, "MegaShop", 1);
    let nav = b.node(Some(root), "navigation", "");
    b.node(Some(nav), "link", "Home");
    b.node(Some(nav), "link", "Deals");
    let main = b.node(Some(root), "main", "");
    b.node(Some(main), "button", "Buy");
    let footer = b.node(Some(root), "contentinfo", "");
    b.node(Some(footer), "link", "Imprint");
    b
}

#[test]
fn landmarked_page_act_keeps_main_only() {
    let batch = landmarked_page();
    let snap = render(&batch.nodes, &PruneOptions::new(SnapshotMode::Act));
    let body = body_of(&snap.text);

    assert!(body.contains("- button \"Buy\""));
    assert!(!body.contains("banner"));
    assert!(!body.contains("navigation"));
    assert!(!body.contains("contentinfo"));
    assert!(!body.contains("\"Home\""));
    assert!(!body.contains("\"Imprint\""));
}

#[test]
fn landmarked_page_navigate_keeps_banner_and_nav_links() {
    let batch = landmarked_page();
    let snap = render(&batch.nodes, &PruneOptions::new(SnapshotMode::Navigate));
    let body = body_of(&snap.text);

    assert!(body.contains("- banner"));
    assert!(body.contains("- navigation"));
    assert!(body.contains("- link \"Home\""));
    assert!(body.contains("- link \"Deals\""));
}

// =============================================================================
// Scenario: list deduplication
// =============================================================================

#[test]
fn duplicate_links_collapse_to_at_most_one() {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Results");
    let main = b.node(Some(root), "main", "");
    let list = b.node(Some(main), "list", "Search results");
    for i in 0..20 {
        let item = b.node(Some(list), "listitem", "");
        if i % 2 == 0 {
            b.node(Some(item), "link", "Energy class A");
        }
        b.node(Some(item), "link", &format!("Product {i}"));
        b.node(Some(item), "button", "Add to cart");
    }

    let snap = render(&b.nodes, &PruneOptions::new(SnapshotMode::Act));
    let body = body_of(&snap.text);
    let energy_lines = body
        .lines()
        .filter(|l| l.contains("\"Energy class A\""))
        .count();
    assert!(energy_lines <= 1, "expected at most one, got {energy_lines}");
    // Distinct product links all survive.
    assert!(body.contains("\"Product 0\""));
    assert!(body.contains("\"Product 19\""));
}

// =============================================================================
// Scenario: combobox trim
// =============================================================================

#[test]
fn combobox_shows_selected_option_only() {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Product");
    let main = b.node(Some(root), "main", "");
    let combo = b.node(Some(main), "combobox", "Size");
    b.node(Some(combo), "option", "Small");
    b.push(
        Some(combo),
        "option",
        "Medium",
        json!([{"name": "selected", "value": {"value": true}}]),
    );
    b.node(Some(combo), "option", "Large");

    let snap = render(&b.nodes, &PruneOptions::new(SnapshotMode::Act));
    let body = body_of(&snap.text);

    let combo_lines: Vec<&str> = body.lines().filter(|l| l.contains("combobox")).collect();
    assert_eq!(combo_lines.len(), 1);
    assert!(combo_lines[0].contains("\"Medium\""), "line: {}", combo_lines[0]);
    assert!(!body.contains("- option"));
    assert!(!body.contains("\"Small\""));
    assert!(!body.contains("\"Large\""));
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn tree_reconstruction_has_single_root() {
    let batch = landmarked_page();
    let build = build_tree(&batch.nodes);
    let root = build.root.expect("one parentless node");
    assert_eq!(root.role, "RootWebArea");

    fn count(n: &agentpage::snapshot::AxNode) -> usize {
        1 + n.children.iter().map(count).sum::<usize>()
    }
    assert_eq!(count(&root), batch.nodes.len());
}

#[test]
fn every_ref_in_output_is_in_the_map() {
    let batch = landmarked_page();
    let snap = render(&batch.nodes, &PruneOptions::new(SnapshotMode::Full));
    for line in snap.text.lines() {
        let Some(start) = line.find("[ref=") else {
            continue;
        };
        let token = &line[start + 5..line.len() - 1];
        assert!(
            snap.refs.contains_key(token),
            "token {token} missing from the reference map"
        );
    }
}

#[test]
fn act_mode_preserves_interactive_targets_under_main() {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Page");
    let main = b.node(Some(root), "main", "");
    let wrapper = b.node(Some(main), "generic", "");
    b.node(Some(wrapper), "button", "Checkout");
    b.node(Some(wrapper), "textbox", "Coupon code");
    b.node(Some(main), "checkbox", "Gift wrap");

    let snap = render(&b.nodes, &PruneOptions::new(SnapshotMode::Act));
    let body = body_of(&snap.text);
    for (role, name) in [
        ("button", "Checkout"),
        ("textbox", "Coupon code"),
        ("checkbox", "Gift wrap"),
    ] {
        let marker = format!("- {role} \"{name}\"");
        assert!(body.contains(&marker), "missing {marker} in {body}");
        let line = body.lines().find(|l| l.contains(&marker)).unwrap();
        assert!(line.contains("[ref="), "no ref on {line}");
    }
}

#[test]
fn pruning_is_idempotent_across_modes() {
    let batch = landmarked_page();
    let build = build_tree(&batch.nodes);
    let root = build.root.unwrap();

    for mode in [SnapshotMode::Act, SnapshotMode::Browse, SnapshotMode::Navigate] {
        let opts = PruneOptions::new(mode);
        let Some(once) = prune_tree(&root, &opts) else {
            continue;
        };
        let twice = prune_tree(&once, &opts).expect("second pass keeps the tree");
        assert_eq!(format_tree(&once), format_tree(&twice), "mode {mode:?}");
    }
}

#[test]
fn no_unnamed_structural_wrappers_in_output() {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Page");
    let main = b.node(Some(root), "main", "");
    let outer = b.node(Some(main), "generic", "");
    let inner = b.node(Some(outer), "group", "");
    let row = b.node(Some(inner), "row", "");
    let cell = b.node(Some(row), "cell", "");
    b.node(Some(cell), "button", "Lone");
    let list = b.node(Some(main), "list", "");
    let item = b.node(Some(list), "listitem", "");
    b.node(Some(item), "link", "One");
    b.node(Some(item), "link", "Two");

    let snap = render(&b.nodes, &PruneOptions::new(SnapshotMode::Act));
    for line in body_of(&snap.text).lines() {
        for role in ["generic", "group", "list", "row", "cell"] {
            assert!(
                !line.contains(&format!("- {role} \"\"")),
                "unnamed {role} wrapper leaked: {line}"
            );
        }
    }
}

#[test]
fn formatter_round_trips_interactive_subset() {
    let mut b = Batch::new();
    let root = b.node(None, "RootWebArea", "Page");
    let main = b.node(Some(root), "main", "");
    let expected = [
        ("button", "Buy now"),
        ("link", "Reviews"),
        ("textbox", "Quantity"),
        ("checkbox", "Gift"),
    ];
    for (role, name) in expected {
        b.node(Some(main), role, name);
    }

    let snap = render(&b.nodes, &PruneOptions::new(SnapshotMode::Act));
    let mut recovered = Vec::new();
    for line in body_of(&snap.text).lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("- ") else {
            continue;
        };
        let Some((role, rest)) = rest.split_once(' ') else {
            continue;
        };
        let Some(name_end) = rest.rfind('"') else {
            continue;
        };
        let name = rest[1..name_end].to_string();
        if let Some(start) = line.find("[ref=") {
            let token: i64 = line[start + 5..line.len() - 1].parse().expect("numeric ref");
            recovered.push((role.to_string(), name, token));
        }
    }

    assert_eq!(recovered.len(), expected.len());
    for ((role, name), (r_role, r_name, _)) in expected.iter().zip(&recovered) {
        assert_eq!(role, r_role);
        assert_eq!(name, r_name);
    }
}

#[test]
fn stats_prefix_matches_body_char_count() {
    for mode in [SnapshotMode::Act, SnapshotMode::Browse, SnapshotMode::Full] {
        let batch = landmarked_page();
        let snap = render(&batch.nodes, &PruneOptions::new(mode));
        let first = snap.text.lines().next().unwrap();
        let declared: usize = first.split_whitespace().nth(4).unwrap().parse().unwrap();
        assert_eq!(body_of(&snap.text).chars().count(), declared, "mode {mode:?}");
    }
}
