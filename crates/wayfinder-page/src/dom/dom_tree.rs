//! PageTree: arena storage, traversal and layout queries.

use wayfinder_protocols::{Rect, ScrollOffset};

use super::{NodeAttributes, PageNode};
use crate::fixture::NodeSpec;

/// Arena-backed element tree.
#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<PageNode>,
    root: usize,
}

impl PageTree {
    /// Build a tree from a root spec.
    pub fn from_spec(root: &NodeSpec) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.build(None, root);
        tree
    }

    fn build(&mut self, parent: Option<usize>, spec: &NodeSpec) -> usize {
        let id = self.nodes.len();
        self.nodes.push(PageNode {
            tag: spec.tag.to_ascii_lowercase(),
            attributes: NodeAttributes {
                id: spec.id.clone(),
                classes: spec
                    .class
                    .as_deref()
                    .map(|c| c.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                href: spec.href.clone(),
                extra: spec.attrs.clone(),
            },
            text: spec.text.clone(),
            rect: spec.rect,
            style: spec.style.resolve(),
            scroll: spec.scroll,
            parent,
            children: Vec::new(),
            attached: true,
        });
        for child in &spec.children {
            let child_id = self.build(Some(id), child);
            self.nodes[id].children.push(child_id);
        }
        id
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: usize) -> Option<&PageNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: usize) -> Option<&mut PageNode> {
        self.nodes.get_mut(id)
    }

    /// Append `spec` (and its subtree) as the last child of `parent`.
    pub fn append(&mut self, parent: usize, spec: &NodeSpec) -> Option<usize> {
        if parent >= self.nodes.len() {
            return None;
        }
        let id = self.build(Some(parent), spec);
        self.nodes[parent].children.push(id);
        Some(id)
    }

    /// Remove a node from its parent. The subtree stays in the arena but is
    /// no longer attached.
    pub fn detach(&mut self, id: usize) -> bool {
        if id == self.root || id >= self.nodes.len() {
            return false;
        }
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|c| *c != id);
        }
        self.nodes[id].attached = false;
        true
    }

    /// Whether the node is connected to the root.
    pub fn is_attached(&self, id: usize) -> bool {
        let mut current = id;
        loop {
            let Some(node) = self.nodes.get(current) else {
                return false;
            };
            if !node.attached {
                return false;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return current == self.root,
            }
        }
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes[parent].parent;
        }
        out
    }

    /// Attached nodes in document (pre-)order.
    pub fn document_order(&self) -> Vec<usize> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    /// Descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(id) else {
            return out;
        };
        let mut stack: Vec<usize> = node.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Position of an attached node in document order.
    pub fn position(&self, id: usize) -> Option<usize> {
        self.document_order().iter().position(|n| *n == id)
    }

    /// Own text followed by the text of every descendant.
    pub fn text_content(&self, id: usize) -> String {
        let mut text = match self.nodes.get(id) {
            Some(node) => node.text.clone(),
            None => return String::new(),
        };
        for child in self.descendants(id) {
            text.push_str(&self.nodes[child].text);
        }
        text
    }

    /// First attached node with the given id attribute.
    pub fn find_by_id(&self, id_attr: &str) -> Option<usize> {
        self.document_order()
            .into_iter()
            .find(|n| self.nodes[*n].attributes.id.as_deref() == Some(id_attr))
    }

    /// The node or one of its ancestors has fixed positioning.
    pub fn in_fixed_container(&self, id: usize) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .any(|n| self.nodes[n].style.is_fixed())
    }

    /// Whether a `display: none` ancestor removes the node from layout.
    pub fn is_rendered(&self, id: usize) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .all(|n| self.nodes[n].style.display != "none")
    }

    /// Rectangle in viewport coordinates.
    ///
    /// Scroll offsets of ancestor scroll containers are subtracted, and the
    /// window scroll unless the node sits in a fixed-position subtree.
    pub fn viewport_rect(&self, id: usize, window_scroll: ScrollOffset) -> Option<Rect> {
        let node = self.nodes.get(id)?;
        if !self.is_rendered(id) {
            return Some(Rect::new(node.rect.x, node.rect.y, 0.0, 0.0));
        }
        let mut rect = node.rect;
        for ancestor in self.ancestors(id) {
            let a = &self.nodes[ancestor];
            if a.style.is_scroll_container() {
                rect = rect.offset(-a.scroll.x, -a.scroll.y);
            }
        }
        if !self.in_fixed_container(id) {
            rect = rect.offset(-window_scroll.x, -window_scroll.y);
        }
        Some(rect)
    }
}
