//! In-memory page used by tests and offline harnesses.
//!
//! Elements carry a tag, attributes, inline styles, own text and scroll
//! geometry. Child-list changes are broadcast as [`PageEvent::Mutation`];
//! attribute and style writes are not, matching a `childList`/`subtree`
//! mutation observer. Scroll hooks let a test emulate lazy rendering.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use jobfilter_core_types::NodeRef;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::trace;

use crate::errors::PortError;
use crate::events::{DomChangeSource, PageEvent};
use crate::ports::{PagePort, ScrollMetrics};
use crate::selector::{ElementView, Selector};

/// Builder for an element to insert.
#[derive(Clone, Debug, Default)]
pub struct ElementSpec {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        let entry = self.attrs.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(class);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
}

#[derive(Clone, Debug)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    scroll: ScrollMetrics,
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<NodeRef, NodeData>,
    next_id: u64,
    root: NodeRef,
    url: String,
}

impl Tree {
    fn new(url: &str) -> Self {
        let root = NodeRef(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            NodeData {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
                styles: BTreeMap::new(),
                text: String::new(),
                parent: None,
                children: Vec::new(),
                scroll: ScrollMetrics::default(),
            },
        );
        Self {
            nodes,
            next_id: 1,
            root,
            url: url.to_string(),
        }
    }

    fn node(&self, id: NodeRef) -> Result<&NodeData, PortError> {
        self.nodes.get(&id).ok_or(PortError::NodeDetached(id))
    }

    fn node_mut(&mut self, id: NodeRef) -> Result<&mut NodeData, PortError> {
        self.nodes.get_mut(&id).ok_or(PortError::NodeDetached(id))
    }

    fn insert(&mut self, parent: NodeRef, spec: ElementSpec) -> Result<NodeRef, PortError> {
        self.node(parent)?;
        let id = NodeRef(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            NodeData {
                tag: spec.tag,
                attrs: spec.attrs,
                styles: spec.styles,
                text: spec.text,
                parent: Some(parent),
                children: Vec::new(),
                scroll: ScrollMetrics::default(),
            },
        );
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn detach(&mut self, id: NodeRef) -> Result<Option<NodeRef>, PortError> {
        if id == self.root {
            return Err(PortError::internal("cannot remove the document body"));
        }
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Some(data) = self.nodes.get_mut(&parent) {
                data.children.retain(|child| *child != id);
            }
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(data) = self.nodes.remove(&next) {
                stack.extend(data.children);
            }
        }
        Ok(parent)
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself.
    fn descendants(&self, scope: NodeRef) -> Result<Vec<NodeRef>, PortError> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef> = self.node(scope)?.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(data) = self.nodes.get(&next) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    fn collect_text(&self, id: NodeRef, out: &mut String) {
        if let Some(data) = self.nodes.get(&id) {
            out.push_str(&data.text);
            for child in &data.children {
                self.collect_text(*child, out);
            }
        }
    }
}

impl ElementView for Tree {
    fn tag(&self, node: NodeRef) -> Option<&str> {
        self.nodes.get(&node).map(|data| data.tag.as_str())
    }

    fn attr(&self, node: NodeRef, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|data| data.attrs.get(name))
            .map(String::as_str)
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.get(&node).and_then(|data| data.parent)
    }
}

type ScrollHook = Arc<dyn Fn(&MemoryPage, NodeRef, f64) + Send + Sync>;

pub struct MemoryPage {
    tree: RwLock<Tree>,
    events: broadcast::Sender<PageEvent>,
    scroll_hooks: Mutex<HashMap<NodeRef, ScrollHook>>,
}

impl MemoryPage {
    pub fn new(url: &str) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            tree: RwLock::new(Tree::new(url)),
            events,
            scroll_hooks: Mutex::new(HashMap::new()),
        })
    }

    pub fn body(&self) -> NodeRef {
        self.tree.read().root
    }

    pub fn set_url(&self, url: &str) {
        self.tree.write().url = url.to_string();
        self.emit(PageEvent::Navigated {
            url: url.to_string(),
        });
    }

    /// Inserts `spec` as the last child of `parent`.
    pub fn append(&self, parent: NodeRef, spec: ElementSpec) -> Result<NodeRef, PortError> {
        let id = self.tree.write().insert(parent, spec)?;
        self.emit(PageEvent::Mutation {
            target: Some(parent),
        });
        Ok(id)
    }

    /// Removes `node` and its whole subtree; stale handles become detached.
    pub fn remove(&self, node: NodeRef) -> Result<(), PortError> {
        let parent = self.tree.write().detach(node)?;
        self.scroll_hooks.lock().remove(&node);
        self.emit(PageEvent::Mutation { target: parent });
        Ok(())
    }

    /// Removes every child of `parent`.
    pub fn clear_children(&self, parent: NodeRef) -> Result<(), PortError> {
        let children = self.tree.read().node(parent)?.children.clone();
        {
            let mut tree = self.tree.write();
            for child in &children {
                tree.detach(*child)?;
            }
        }
        self.emit(PageEvent::Mutation {
            target: Some(parent),
        });
        Ok(())
    }

    pub fn set_scroll_extent(
        &self,
        node: NodeRef,
        scroll_height: f64,
        client_height: f64,
    ) -> Result<(), PortError> {
        let mut tree = self.tree.write();
        let data = tree.node_mut(node)?;
        data.scroll.scroll_height = scroll_height;
        data.scroll.client_height = client_height;
        data.scroll.scroll_top = data.scroll.scroll_top.min(data.scroll.max_scroll_top());
        Ok(())
    }

    /// Registers a callback run after every scroll position write on `node`.
    pub fn on_scroll<F>(&self, node: NodeRef, hook: F)
    where
        F: Fn(&MemoryPage, NodeRef, f64) + Send + Sync + 'static,
    {
        self.scroll_hooks.lock().insert(node, Arc::new(hook));
    }

    pub fn click(&self, node: NodeRef) {
        self.emit(PageEvent::Click { target: node });
    }

    pub fn emit(&self, event: PageEvent) {
        trace!(target: "page.memory", ?event, "page event");
        let _ = self.events.send(event);
    }

    pub fn contains(&self, node: NodeRef) -> bool {
        self.tree.read().nodes.contains_key(&node)
    }

    pub fn inline_styles(&self, node: NodeRef) -> Result<BTreeMap<String, String>, PortError> {
        Ok(self.tree.read().node(node)?.styles.clone())
    }

    pub fn attributes(&self, node: NodeRef) -> Result<BTreeMap<String, String>, PortError> {
        Ok(self.tree.read().node(node)?.attrs.clone())
    }

    pub fn child_count(&self, node: NodeRef) -> Result<usize, PortError> {
        Ok(self.tree.read().node(node)?.children.len())
    }

    fn select(&self, scope: Option<NodeRef>, selector: &str) -> Result<Vec<NodeRef>, PortError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.read();
        let scope = scope.unwrap_or(tree.root);
        let candidates = tree.descendants(scope)?;
        Ok(candidates
            .into_iter()
            .filter(|node| selector.matches(&*tree, *node))
            .collect())
    }
}

impl DomChangeSource for MemoryPage {
    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl PagePort for MemoryPage {
    async fn current_url(&self) -> Result<String, PortError> {
        Ok(self.tree.read().url.clone())
    }

    async fn query_all(
        &self,
        scope: Option<NodeRef>,
        selector: &str,
    ) -> Result<Vec<NodeRef>, PortError> {
        self.select(scope, selector)
    }

    async fn children(&self, node: NodeRef) -> Result<Vec<NodeRef>, PortError> {
        Ok(self.tree.read().node(node)?.children.clone())
    }

    async fn next_sibling(&self, node: NodeRef) -> Result<Option<NodeRef>, PortError> {
        let tree = self.tree.read();
        let Some(parent) = tree.node(node)?.parent else {
            return Ok(None);
        };
        let siblings = &tree.node(parent)?.children;
        Ok(siblings
            .iter()
            .position(|child| *child == node)
            .and_then(|idx| siblings.get(idx + 1))
            .copied())
    }

    async fn tag_name(&self, node: NodeRef) -> Result<String, PortError> {
        Ok(self.tree.read().node(node)?.tag.clone())
    }

    async fn class_name(&self, node: NodeRef) -> Result<String, PortError> {
        Ok(self
            .tree
            .read()
            .node(node)?
            .attrs
            .get("class")
            .cloned()
            .unwrap_or_default())
    }

    async fn text_content(&self, node: NodeRef) -> Result<String, PortError> {
        let tree = self.tree.read();
        tree.node(node)?;
        let mut out = String::new();
        tree.collect_text(node, &mut out);
        Ok(out)
    }

    async fn closest(
        &self,
        node: NodeRef,
        selector: &str,
    ) -> Result<Option<NodeRef>, PortError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.read();
        tree.node(node)?;
        let mut current = Some(node);
        while let Some(candidate) = current {
            if selector.matches(&*tree, candidate) {
                return Ok(Some(candidate));
            }
            current = tree.parent(candidate);
        }
        Ok(None)
    }

    async fn scroll_metrics(&self, node: NodeRef) -> Result<ScrollMetrics, PortError> {
        Ok(self.tree.read().node(node)?.scroll)
    }

    async fn set_scroll_top(&self, node: NodeRef, value: f64) -> Result<(), PortError> {
        let clamped = {
            let mut tree = self.tree.write();
            let data = tree.node_mut(node)?;
            let clamped = value.clamp(0.0, data.scroll.max_scroll_top());
            data.scroll.scroll_top = clamped;
            clamped
        };
        let hook = self.scroll_hooks.lock().get(&node).cloned();
        if let Some(hook) = hook {
            hook(self, node, clamped);
        }
        Ok(())
    }

    async fn attribute(&self, node: NodeRef, name: &str) -> Result<Option<String>, PortError> {
        Ok(self.tree.read().node(node)?.attrs.get(name).cloned())
    }

    async fn set_attribute(
        &self,
        node: NodeRef,
        name: &str,
        value: &str,
    ) -> Result<(), PortError> {
        self.tree
            .write()
            .node_mut(node)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_attribute(&self, node: NodeRef, name: &str) -> Result<(), PortError> {
        self.tree.write().node_mut(node)?.attrs.remove(name);
        Ok(())
    }

    async fn inline_style(
        &self,
        node: NodeRef,
        property: &str,
    ) -> Result<Option<String>, PortError> {
        Ok(self.tree.read().node(node)?.styles.get(property).cloned())
    }

    async fn set_inline_style(
        &self,
        node: NodeRef,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), PortError> {
        let mut tree = self.tree.write();
        let styles = &mut tree.node_mut(node)?.styles;
        match value {
            Some(value) => {
                styles.insert(property.to_string(), value.to_string());
            }
            None => {
                styles.remove(property);
            }
        }
        Ok(())
    }

    async fn append_element(
        &self,
        parent: NodeRef,
        tag: &str,
        class: &str,
        text: &str,
    ) -> Result<NodeRef, PortError> {
        self.append(parent, ElementSpec::new(tag).class(class).text(text))
    }

    async fn remove_node(&self, node: NodeRef) -> Result<(), PortError> {
        self.remove(node)
    }
}
