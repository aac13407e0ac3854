//! Template-based fragment rendering.
//!
//! The hosting pages supplied named template elements that the original
//! clients cloned per row. This module keeps the same contract against a
//! plain node tree: look up a template, clone it, strip its id, apply an
//! ordered list of (selector, property, value) substitutions. A selector
//! that matches nothing is a programming error and fails loudly.
//!
//! The renderer never inserts anything anywhere; callers own placement of
//! the returned fragment.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use thiserror::Error;

/// Errors produced while rendering a template.
///
/// All variants are configuration or programming defects, not runtime
/// conditions to retry; poll loops propagate them.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No template registered under this id.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    /// A template container had no content element to clone.
    #[error("template '{0}' has no content element")]
    EmptyTemplate(String),
    /// A substitution selector matched nothing inside the clone.
    #[error("selector '{selector}' matched nothing in template '{template}'")]
    SelectorMiss { template: String, selector: String },
}

// ---------------------------------------------------------------------------
// Node tree
// ---------------------------------------------------------------------------

/// One element of a fragment tree.
///
/// Cloning a `Node` yields a fully independent tree; there is no sharing
/// between a template and the fragments rendered from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub props: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Node {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            props: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Set a named property on this node.
    ///
    /// The property name `text` addresses the node's text content, matching
    /// how the original substitutions wrote `innerText`; anything else lands
    /// in the property map.
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        if name == "text" {
            self.text = value.into();
        } else {
            self.props.insert(name.to_string(), value.into());
        }
    }

    /// Read a property previously set on this node.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Tag(t) => self.tag == *t,
            Selector::Class(c) => self.classes.iter().any(|cl| cl == c),
            Selector::Id(i) => self.id.as_deref() == Some(i.as_str()),
        }
    }

    /// Depth-first search for the first node matching `selector`, this node
    /// included.
    pub fn find(&self, selector: &str) -> Option<&Node> {
        let sel = Selector::parse(selector);
        self.find_node(&sel)
    }

    fn find_node(&self, sel: &Selector) -> Option<&Node> {
        if self.matches(sel) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_node(sel))
    }

    fn find_node_mut(&mut self, sel: &Selector) -> Option<&mut Node> {
        if self.matches(sel) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_node_mut(sel))
    }

    /// All text in the fragment, document order, single-space separated.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        if !self.text.is_empty() {
            out.push(self.text.clone());
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// All `href` property values in the fragment, document order.
    pub fn links(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_links(&mut out);
        out
    }

    fn collect_links<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(href) = self.prop("href") {
            out.push(href);
        }
        for child in &self.children {
            child.collect_links(out);
        }
    }
}

// ---------------------------------------------------------------------------
// Selectors and substitutions
// ---------------------------------------------------------------------------

/// The selector forms the hosting pages actually used: `tag`, `.class`, `#id`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Tag(String),
    Class(String),
    Id(String),
}

impl Selector {
    fn parse(s: &str) -> Self {
        if let Some(class) = s.strip_prefix('.') {
            Selector::Class(class.to_string())
        } else if let Some(id) = s.strip_prefix('#') {
            Selector::Id(id.to_string())
        } else {
            Selector::Tag(s.to_string())
        }
    }
}

/// One (selector, property, value) substitution, applied to a fresh clone.
#[derive(Debug, Clone)]
pub struct Substitution {
    pub selector: String,
    pub property: String,
    pub value: String,
}

impl Substitution {
    pub fn new(
        selector: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Substitution {
            selector: selector.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Template registry
// ---------------------------------------------------------------------------

/// Named templates, the stand-in for the hosting page's template elements.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    map: HashMap<String, Node>,
}

impl Templates {
    /// An empty registry.
    pub fn new() -> Self {
        Templates { map: HashMap::new() }
    }

    /// A registry pre-loaded with the rows the slash pages ship:
    /// `template_app` (linked list row) and `template_log` (log line row).
    pub fn with_defaults() -> Self {
        let mut templates = Templates::new();
        templates.register(
            "template_app",
            Node::new("template").with_id("template_app").with_child(
                Node::new("tr")
                    .with_child(
                        Node::new("td").with_child(
                            Node::new("a")
                                .with_child(Node::new("span").with_class("app_id")),
                        ),
                    )
                    .with_child(
                        Node::new("td").with_child(Node::new("span").with_class("date")),
                    ),
            ),
        );
        templates.register(
            "template_log",
            Node::new("template")
                .with_id("template_log")
                .with_child(Node::new("tr").with_child(Node::new("td").with_class("log"))),
        );
        templates
    }

    /// Register (or replace) a template under `id`.
    pub fn register(&mut self, id: impl Into<String>, node: Node) {
        self.map.insert(id.into(), node);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    /// Clone the named template and apply `subs` in order.
    ///
    /// A `template`-tagged container contributes a clone of its first child;
    /// any other node is cloned directly. The clone's own id is stripped so
    /// repeated rendering cannot produce duplicate ids.
    pub fn render(&self, id: &str, subs: &[Substitution]) -> Result<Node, RenderError> {
        let template = self
            .map
            .get(id)
            .ok_or_else(|| RenderError::UnknownTemplate(id.to_string()))?;

        let mut clone = if template.tag == "template" {
            template
                .children
                .first()
                .cloned()
                .ok_or_else(|| RenderError::EmptyTemplate(id.to_string()))?
        } else {
            template.clone()
        };
        clone.id = None;

        for sub in subs {
            let sel = Selector::parse(&sub.selector);
            let target = clone
                .find_node_mut(&sel)
                .ok_or_else(|| RenderError::SelectorMiss {
                    template: id.to_string(),
                    selector: sub.selector.clone(),
                })?;
            target.set_property(&sub.property, sub.value.clone());
        }

        Ok(clone)
    }
}

static DEFAULTS: Lazy<Templates> = Lazy::new(Templates::with_defaults);

/// The shared default registry used when the caller supplies none.
pub fn defaults() -> &'static Templates {
    &DEFAULTS
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn plain_template() -> Templates {
        let mut t = Templates::new();
        t.register(
            "row",
            Node::new("tr")
                .with_id("row")
                .with_child(Node::new("td").with_class("name"))
                .with_child(Node::new("td").with_class("value"))
                .with_child(Node::new("a")),
        );
        t
    }

    // -----------------------------------------------------------------------
    // Selector parsing
    // -----------------------------------------------------------------------

    #[rstest]
    #[case(".app_id", Selector::Class("app_id".to_string()))]
    #[case("#content", Selector::Id("content".to_string()))]
    #[case("a", Selector::Tag("a".to_string()))]
    #[case("td", Selector::Tag("td".to_string()))]
    fn selector_parse_forms(#[case] input: &str, #[case] expected: Selector) {
        assert_eq!(Selector::parse(input), expected);
    }

    // -----------------------------------------------------------------------
    // Node queries
    // -----------------------------------------------------------------------

    #[test]
    fn find_matches_depth_first_first_wins() {
        let tree = Node::new("tr")
            .with_child(
                Node::new("td").with_child(Node::new("span").with_class("x").with_text("inner")),
            )
            .with_child(Node::new("span").with_class("x").with_text("outer"));
        let hit = tree.find(".x").expect("match");
        assert_eq!(hit.text, "inner");
    }

    #[test]
    fn find_can_match_root() {
        let tree = Node::new("tr").with_class("row");
        assert!(tree.find("tr").is_some());
        assert!(tree.find(".row").is_some());
    }

    #[test]
    fn find_miss_is_none() {
        let tree = Node::new("tr");
        assert!(tree.find(".missing").is_none());
    }

    #[test]
    fn text_content_joins_in_document_order() {
        let tree = Node::new("tr")
            .with_child(Node::new("td").with_text("a"))
            .with_child(Node::new("td").with_text("b"));
        assert_eq!(tree.text_content(), "a b");
    }

    #[test]
    fn links_collects_href_props() {
        let tree = Node::new("tr")
            .with_child(Node::new("a").with_prop("href", "app.html?app_id=a1"))
            .with_child(Node::new("a").with_prop("href", "logs.html?app_id=a1&device_id=d1"));
        assert_eq!(
            tree.links(),
            vec!["app.html?app_id=a1", "logs.html?app_id=a1&device_id=d1"]
        );
    }

    #[test]
    fn set_property_text_addresses_text_content() {
        let mut node = Node::new("td");
        node.set_property("text", "hello");
        assert_eq!(node.text, "hello");
        assert!(node.props.is_empty());
    }

    #[test]
    fn set_property_other_lands_in_prop_map() {
        let mut node = Node::new("a");
        node.set_property("href", "app.html?app_id=a1");
        assert_eq!(node.prop("href"), Some("app.html?app_id=a1"));
    }

    // -----------------------------------------------------------------------
    // Template rendering
    // -----------------------------------------------------------------------

    #[test]
    fn render_unknown_template_errors() {
        let t = Templates::new();
        let err = t.render("nope", &[]).unwrap_err();
        assert!(matches!(err, RenderError::UnknownTemplate(_)));
    }

    #[test]
    fn render_template_container_clones_first_child() {
        let t = Templates::with_defaults();
        let row = t.render("template_log", &[]).expect("render");
        assert_eq!(row.tag, "tr");
    }

    #[test]
    fn render_empty_template_container_errors() {
        let mut t = Templates::new();
        t.register("empty", Node::new("template").with_id("empty"));
        let err = t.render("empty", &[]).unwrap_err();
        assert!(matches!(err, RenderError::EmptyTemplate(_)));
    }

    #[test]
    fn render_plain_node_clones_directly() {
        let t = plain_template();
        let row = t.render("row", &[]).expect("render");
        assert_eq!(row.tag, "tr");
        assert_eq!(row.children.len(), 3);
    }

    #[test]
    fn render_strips_clone_id() {
        let t = plain_template();
        let row = t.render("row", &[]).expect("render");
        assert!(row.id.is_none(), "clone must not carry the template id");
    }

    #[test]
    fn render_applies_substitutions_in_order() {
        let t = plain_template();
        let row = t
            .render(
                "row",
                &[
                    Substitution::new(".name", "text", "first"),
                    Substitution::new(".name", "text", "second"),
                ],
            )
            .expect("render");
        // Later substitutions overwrite earlier ones on the same target.
        assert_eq!(row.find(".name").expect("name").text, "second");
    }

    #[test]
    fn render_selector_miss_fails_loudly() {
        let t = plain_template();
        let err = t
            .render("row", &[Substitution::new(".absent", "text", "x")])
            .unwrap_err();
        match err {
            RenderError::SelectorMiss { template, selector } => {
                assert_eq!(template, "row");
                assert_eq!(selector, ".absent");
            }
            other => panic!("expected SelectorMiss, got {other:?}"),
        }
    }

    #[test]
    fn render_sets_href_via_tag_selector() {
        let t = plain_template();
        let row = t
            .render("row", &[Substitution::new("a", "href", "app.html?app_id=a1")])
            .expect("render");
        assert_eq!(row.find("a").expect("a").prop("href"), Some("app.html?app_id=a1"));
    }

    #[test]
    fn render_twice_yields_independent_fragments() {
        let t = plain_template();
        let subs = [Substitution::new(".name", "text", "same")];
        let mut first = t.render("row", &subs).expect("first");
        let second = t.render("row", &subs).expect("second");
        assert_eq!(first, second);

        // Mutating one must not touch the other.
        first
            .find_node_mut(&Selector::parse(".name"))
            .expect("name")
            .set_property("text", "changed");
        assert_ne!(first, second);
        assert_eq!(second.find(".name").expect("name").text, "same");
    }

    #[test]
    fn render_does_not_mutate_the_template() {
        let t = plain_template();
        let _ = t
            .render("row", &[Substitution::new(".name", "text", "x")])
            .expect("render");
        let fresh = t.render("row", &[]).expect("render");
        assert_eq!(fresh.find(".name").expect("name").text, "");
    }

    // -----------------------------------------------------------------------
    // Default registry
    // -----------------------------------------------------------------------

    #[test]
    fn defaults_contain_slash_templates() {
        let t = Templates::with_defaults();
        assert!(t.contains("template_app"));
        assert!(t.contains("template_log"));
    }

    #[test]
    fn defaults_app_row_supports_page_substitutions() {
        // The exact substitutions the app list page performed.
        let t = Templates::with_defaults();
        let row = t
            .render(
                "template_app",
                &[
                    Substitution::new(".app_id", "text", "a1"),
                    Substitution::new(".date", "text", "Thu Jan 01 1970"),
                    Substitution::new("a", "href", "app.html?app_id=a1"),
                ],
            )
            .expect("render");
        assert_eq!(row.find(".app_id").expect("app_id").text, "a1");
        assert_eq!(row.links(), vec!["app.html?app_id=a1"]);
    }

    #[test]
    fn shared_defaults_registry_is_usable() {
        assert!(defaults().contains("template_app"));
    }
}
