use serde_json::Value;

use super::tree::AxNode;

/// Pruning mode selecting how aggressively the tree is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Interaction targets only; prose, imagery and chrome are stripped.
    Act,
    /// Readable content plus interaction targets.
    Browse,
    /// Page chrome: banners, navigation, search.
    Navigate,
    /// The whole tree, unpruned.
    Full,
}

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub mode: SnapshotMode,
    /// Lowercased keywords steering act-mode card condensing.
    pub keywords: Vec<String>,
}

impl PruneOptions {
    #[must_use]
    pub fn new(mode: SnapshotMode) -> Self {
        Self {
            mode,
            keywords: Vec::new(),
        }
    }

    /// Split free-text context into lowercase keywords.
    #[must_use]
    pub fn with_context(mode: SnapshotMode, context: &str) -> Self {
        Self {
            mode,
            keywords: context
                .split_whitespace()
                .map(str::to_lowercase)
                .collect(),
        }
    }
}

// =============================================================================
// Vocabularies (module-level constants; never mutable state)
// =============================================================================

const LANDMARK_ROLES: &[&str] = &[
    "banner",
    "main",
    "navigation",
    "complementary",
    "contentinfo",
    "region",
    "search",
    "form",
];

const ACT_LANDMARKS: &[&str] = &["main", "form", "search"];
const BROWSE_LANDMARKS: &[&str] = &["main", "region", "form", "search", "complementary"];
const NAVIGATE_LANDMARKS: &[&str] = &["banner", "navigation", "main", "search", "contentinfo"];

/// Region names that mark auxiliary page areas, not main content.
const AUX_REGION_NAMES: &[&str] = &[
    "image",
    "review",
    "recommend",
    "related",
    "similar",
    "also viewed",
    "cookie",
];

const GROUP_ROLES: &[&str] = &[
    "radiogroup",
    "tablist",
    "menu",
    "menubar",
    "toolbar",
    "listbox",
    "tree",
    "treegrid",
    "grid",
];

/// Group names recognized as color swatch pickers, across storefront locales.
const COLOR_GROUP_NAMES: &[&str] = &["colors", "couleurs", "farben", "kleuren"];

/// Sub-heading names that introduce descriptive prose blocks.
const DESCRIPTION_HEADINGS: &[&str] = &[
    "about this",
    "description",
    "detail",
    "feature",
    "specification",
    "overview",
];

/// Stock and shipping phrases kept as short actionable facts.
const STOCK_PHRASES: &[&str] = &[
    "in stock",
    "out of stock",
    "free shipping",
    "free delivery",
    "delivery",
    "ships",
];

/// Button names that are listing noise.
const NOISE_BUTTON_NAMES: &[&str] = &[
    "energy class",
    "sponsored",
    "ad feedback",
    "product information sheet",
    "rating details",
    "ratings",
];

/// Link names that are option pickers or footer legalese.
const NOISE_LINK_NAMES: &[&str] = &[
    "view options",
    "see options",
    "more options",
    "privacy policy",
    "terms of use",
    "terms and conditions",
    "cookie policy",
    "legal notice",
    "imprint",
    "accessibility statement",
];

/// Headings after which the remaining siblings are cut off.
const TRUNCATION_HEADINGS: &[&str] = &["related searches", "need help"];

/// Names marking filter-control groups.
const FILTER_GROUP_NAMES: &[&str] = &["filter", "sort by", "refine by", "price range"];

/// Unnamed structural wrappers eligible for collapse.
const COLLAPSIBLE_ROLES: &[&str] = &[
    "generic",
    "group",
    "list",
    "table",
    "row",
    "rowgroup",
    "cell",
    "presentation",
    "none",
    "separator",
    "LayoutTable",
    "LayoutTableRow",
    "LayoutTableCell",
    "_promote",
];

// =============================================================================
// Pipeline
// =============================================================================

/// Run the full pipeline on a copy of `root`; the input tree is never
/// mutated, and every stage is idempotent.
///
/// Returns `None` when everything prunes away.
#[must_use]
pub fn prune_tree(root: &AxNode, opts: &PruneOptions) -> Option<AxNode> {
    if opts.mode == SnapshotMode::Full {
        return Some(root.clone());
    }

    let tree = extract_regions(root, opts.mode);
    let tree = prune_node(&tree, &Context::top(opts))?;
    let tree = collapse_wrappers(tree)?;
    let mut tree = post_clean(tree, opts.mode);
    if opts.mode == SnapshotMode::Act {
        tree = strip_commerce_noise(tree);
    }
    Some(tree)
}

// =============================================================================
// Stage 1: region extraction
// =============================================================================

fn is_landmark(node: &AxNode) -> bool {
    LANDMARK_ROLES.contains(&node.role.as_str())
}

fn has_aux_name(node: &AxNode) -> bool {
    let name = node.name.to_lowercase();
    AUX_REGION_NAMES.iter().any(|aux| name.contains(aux))
}

fn allowed_landmarks(mode: SnapshotMode) -> &'static [&'static str] {
    match mode {
        SnapshotMode::Act => ACT_LANDMARKS,
        SnapshotMode::Browse => BROWSE_LANDMARKS,
        SnapshotMode::Navigate => NAVIGATE_LANDMARKS,
        SnapshotMode::Full => LANDMARK_ROLES,
    }
}

/// Unwrap the root web-area; when the page declares landmarks, keep only the
/// ones the mode cares about, with aux-named regions demoted out of the set.
/// Landmark-free pages keep the subtrees that carry headings, interaction,
/// or text content; a page where nothing qualifies passes through whole.
fn extract_regions(root: &AxNode, mode: SnapshotMode) -> AxNode {
    let mut out = root.clone();
    if out.role == "RootWebArea" || out.role == "WebArea" {
        out.role = "_promote".into();
        out.name = String::new();
        out.properties = Vec::new();
    }

    let mut landmarks = Vec::new();
    collect_landmarks(&out, &mut landmarks);

    if landmarks.is_empty() {
        let qualified: Vec<AxNode> = out
            .children
            .iter()
            .filter(|c| carries_content(c))
            .cloned()
            .collect();
        if !qualified.is_empty() {
            out.children = qualified;
        }
        return out;
    }

    let allowed = allowed_landmarks(mode);
    out.children = landmarks
        .into_iter()
        .filter(|lm| allowed.contains(&lm.role.as_str()))
        .filter(|lm| !(lm.role == "region" && has_aux_name(lm)))
        .collect();
    out
}

/// Document-order landmark collection; nested landmarks stay inside their
/// ancestor rather than being listed twice.
fn collect_landmarks(node: &AxNode, out: &mut Vec<AxNode>) {
    for child in &node.children {
        if is_landmark(child) {
            out.push(child.clone());
        } else {
            collect_landmarks(child, out);
        }
    }
}

fn carries_content(node: &AxNode) -> bool {
    node.role == "heading"
        || node.is_interactive()
        || ((node.role == "StaticText" || node.role == "text")
            && !node.name.trim().is_empty())
        || node.children.iter().any(carries_content)
}

// =============================================================================
// Stage 2: node-level rules
// =============================================================================

/// Traversal context carried down the tree.
struct Context<'a> {
    mode: SnapshotMode,
    parent_role: &'a str,
    keywords: &'a [String],
    in_main: bool,
}

impl<'a> Context<'a> {
    fn top(opts: &'a PruneOptions) -> Self {
        Self {
            mode: opts.mode,
            parent_role: "",
            keywords: &opts.keywords,
            in_main: false,
        }
    }

    fn descend(&self, parent: &'a AxNode) -> Self {
        Self {
            mode: self.mode,
            parent_role: &parent.role,
            keywords: self.keywords,
            in_main: self.in_main || parent.role == "main",
        }
    }
}

fn recurse_children<'a>(node: &'a AxNode, ctx: &Context<'a>) -> Vec<AxNode> {
    let child_ctx = ctx.descend(node);
    node.children
        .iter()
        .filter_map(|c| prune_node(c, &child_ctx))
        .collect()
}

fn keep_with_children<'a>(node: &'a AxNode, ctx: &Context<'a>) -> AxNode {
    let mut out = node.clone();
    out.children = recurse_children(node, ctx);
    out
}

fn keep_leaf(node: &AxNode) -> AxNode {
    let mut out = node.clone();
    out.children = Vec::new();
    out
}

fn is_price(text: &str) -> bool {
    let mut chars = text.trim().chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first != '$' && first != '€' {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    !rest.is_empty()
        && rest.iter().all(|c| {
            c.is_ascii_digit() || *c == ',' || (*c == '.' && first == '$')
        })
}

fn is_stock_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    STOCK_PHRASES.iter().any(|p| lower.contains(p))
}

fn keep_static_text(node: &AxNode, mode: SnapshotMode) -> bool {
    let text = node.name.trim();
    match mode {
        SnapshotMode::Browse => {
            // A lone separator character is layout debris.
            !(text.chars().count() == 1
                && !text.chars().next().is_some_and(char::is_alphanumeric))
        }
        SnapshotMode::Act => {
            let len = text.chars().count();
            len > 0
                && (len <= 30
                    || (text.ends_with(':') && len <= 40)
                    || is_price(text)
                    || is_stock_phrase(text))
        }
        SnapshotMode::Navigate | SnapshotMode::Full => mode == SnapshotMode::Full,
    }
}

#[allow(clippy::too_many_lines)]
fn prune_node<'a>(node: &'a AxNode, ctx: &Context<'a>) -> Option<AxNode> {
    let act = ctx.mode == SnapshotMode::Act;
    let browse = ctx.mode == SnapshotMode::Browse;
    let role = node.role.as_str();
    let lower_name = node.name.to_lowercase();

    match role {
        // Links embedded in prose are descriptive, not actionable.
        "link" if act && ctx.parent_role == "paragraph" => None,

        "paragraph" => {
            if act {
                None
            } else {
                Some(keep_with_children(node, ctx))
            }
        }

        // Navigation repeated inside main is page chrome.
        "navigation" if browse && ctx.in_main => None,

        "code" | "term" | "definition" => Some(node.clone()),

        "strong" | "emphasis" | "blockquote" => {
            if browse {
                Some(keep_with_children(node, ctx))
            } else {
                None
            }
        }

        "figure" => {
            if browse && !node.name.is_empty() {
                Some(AxNode::text(format!("[Figure: {}]", node.name)))
            } else {
                None
            }
        }

        _ if node.is_interactive() => Some(keep_with_children(node, ctx)),

        "listitem" if act => {
            if !node.has_interactive_descendant() {
                return None;
            }
            if !ctx.keywords.is_empty() {
                let text = node.concatenated_text();
                let matched = ctx.keywords.iter().any(|kw| text.contains(kw));
                if !matched {
                    return condense_to_link(node);
                }
            }
            Some(keep_with_children(node, ctx))
        }

        _ if GROUP_ROLES.contains(&role) => Some(keep_with_children(node, ctx)),

        "group" if COLOR_GROUP_NAMES.contains(&lower_name.as_str()) => {
            let swatches: Vec<&str> = node
                .children
                .iter()
                .map(|c| c.name.as_str())
                .filter(|n| !n.is_empty())
                .collect();
            Some(AxNode::text(format!(
                "colors({}): {}",
                swatches.len(),
                swatches.join(", ")
            )))
        }

        "heading" => {
            let level = node.level().unwrap_or(2);
            if level > 1
                && act
                && DESCRIPTION_HEADINGS.iter().any(|d| lower_name.contains(d))
            {
                return None;
            }
            // Headings carry no children in output.
            Some(keep_leaf(node))
        }

        "StaticText" | "text" => keep_static_text(node, ctx.mode).then(|| keep_leaf(node)),

        "image" | "img" => {
            if browse && !node.name.is_empty() {
                Some(keep_leaf(node))
            } else {
                None
            }
        }

        "separator" => None,

        "region" if act && has_aux_name(node) => None,

        "complementary" if act => None,

        "list" if act => {
            let kept = recurse_children(node, ctx);
            if kept.iter().any(|c| c.is_interactive() || c.has_interactive_descendant()) {
                let mut out = node.clone();
                out.children = kept;
                Some(out)
            } else {
                None
            }
        }

        _ => Some(keep_with_children(node, ctx)),
    }
}

/// Condense a card to its first link, with no children.
fn condense_to_link(node: &AxNode) -> Option<AxNode> {
    fn first_link(node: &AxNode) -> Option<&AxNode> {
        if node.role == "link" {
            return Some(node);
        }
        node.children.iter().find_map(first_link)
    }
    first_link(node).map(|link| {
        let mut out = link.clone();
        out.children = Vec::new();
        out
    })
}

// =============================================================================
// Stage 3: wrapper collapse
// =============================================================================

/// Post-order: unnamed structural wrappers dissolve. One child replaces the
/// wrapper; several children ride under a transparent `_promote`; zero
/// children delete it.
fn collapse_wrappers(node: AxNode) -> Option<AxNode> {
    let mut out = node;
    out.children = out
        .children
        .into_iter()
        .filter_map(collapse_wrappers)
        .collect();

    let collapsible =
        out.name.is_empty() && COLLAPSIBLE_ROLES.contains(&out.role.as_str());
    if !collapsible {
        return Some(out);
    }

    match out.children.len() {
        0 => None,
        1 => out.children.pop(),
        _ => {
            out.role = "_promote".into();
            Some(out)
        }
    }
}

// =============================================================================
// Stage 4: post-clean
// =============================================================================

fn post_clean(node: AxNode, mode: SnapshotMode) -> AxNode {
    let mut out = trim_selection_widgets(node);
    if mode == SnapshotMode::Act {
        drop_orphaned_subheadings(&mut out);
    }
    out
}

/// A combobox or listbox shows only the currently selected option's name;
/// the option children disappear.
fn trim_selection_widgets(mut node: AxNode) -> AxNode {
    if node.role == "combobox" || node.role == "listbox" {
        let selected = node.children.iter().find(|c| {
            c.role == "option"
                && c.property("selected").and_then(Value::as_bool) == Some(true)
        });
        if let Some(option) = selected {
            node.name = option.name.clone();
        }
        node.children.clear();
        return node;
    }
    node.children = node
        .children
        .into_iter()
        .map(trim_selection_widgets)
        .collect();
    node
}

/// A non-h1 heading followed by nothing interactive before the next heading
/// introduces prose that act mode already stripped; drop it.
fn drop_orphaned_subheadings(node: &mut AxNode) {
    let mut kept = Vec::with_capacity(node.children.len());
    let children = std::mem::take(&mut node.children);

    for (i, child) in children.iter().enumerate() {
        let is_sub_heading = child.role == "heading" && child.level().unwrap_or(2) > 1;
        if is_sub_heading {
            let followed_by_interactive = children[i + 1..]
                .iter()
                .take_while(|s| s.role != "heading")
                .any(|s| s.is_interactive() || s.has_interactive_descendant());
            if !followed_by_interactive {
                continue;
            }
        }
        kept.push(child.clone());
    }

    node.children = kept;
    for child in &mut node.children {
        drop_orphaned_subheadings(child);
    }
}

// =============================================================================
// Stage 5: commerce-noise passes (act only)
// =============================================================================

fn strip_commerce_noise(node: AxNode) -> AxNode {
    let mut out = node;
    let mut seen_links = std::collections::HashSet::new();
    dedupe_links(&mut out, &mut seen_links);
    drop_noise_controls(&mut out);
    truncate_trailers(&mut out);
    out
}

/// One link per accessible name, first occurrence wins, across the tree.
fn dedupe_links(node: &mut AxNode, seen: &mut std::collections::HashSet<String>) {
    node.children.retain(|c| {
        !(c.role == "link" && !c.name.is_empty() && !seen.insert(c.name.clone()))
    });
    for child in &mut node.children {
        dedupe_links(child, seen);
    }
}

fn is_noise_control(node: &AxNode) -> bool {
    let name = node.name.to_lowercase();
    match node.role.as_str() {
        "button" => NOISE_BUTTON_NAMES.iter().any(|n| name.contains(n)),
        "link" => NOISE_LINK_NAMES.iter().any(|n| name.contains(n)),
        "group" | "generic" | "toolbar" => {
            FILTER_GROUP_NAMES.iter().any(|n| name.contains(n))
        }
        _ => false,
    }
}

fn drop_noise_controls(node: &mut AxNode) {
    node.children.retain(|c| !is_noise_control(c));
    for child in &mut node.children {
        drop_noise_controls(child);
    }
}

/// Everything after a back-to-top button, an h6, or a trailer heading is
/// page tail.
fn is_truncation_point(node: &AxNode) -> bool {
    let name = node.name.to_lowercase();
    match node.role.as_str() {
        "button" => name.contains("back to top"),
        "heading" => {
            node.level() == Some(6)
                || TRUNCATION_HEADINGS.iter().any(|t| name.contains(t))
        }
        _ => false,
    }
}

fn truncate_trailers(node: &mut AxNode) {
    if let Some(cut) = node.children.iter().position(is_truncation_point) {
        node.children.truncate(cut);
    }
    for child in &mut node.children {
        truncate_trailers(child);
    }
}
