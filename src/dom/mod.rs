//! In-memory page tree used by the content session.
//!
//! Nodes live in an arena and are addressed by [`NodeId`], which stays stable
//! for the life of the document (detached nodes keep their id). Every
//! structural change is appended to a mutation log that the change watcher
//! drains in batches, the same way a mutation observer delivers records.

pub mod html;
pub mod selector;

use crate::utils::error::{PriceToggleError, Result};
pub use selector::SelectorList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attribute {
        target: NodeId,
        name: String,
    },
    CharacterData {
        target: NodeId,
    },
}

impl MutationRecord {
    pub fn added_nodes(&self) -> &[NodeId] {
        match self {
            MutationRecord::ChildList { added, .. } => added,
            MutationRecord::Attribute { .. } | MutationRecord::CharacterData { .. } => &[],
        }
    }

    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attribute { target, .. }
            | MutationRecord::CharacterData { target } => *target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            mutations: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// 第一個 `<body>`，沒有的話就用根節點
    pub fn body(&self) -> NodeId {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.tag(*id) == Some("body"))
            .unwrap_or_else(|| self.root())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| PriceToggleError::DocumentError {
                message: format!("unknown node {}", id),
            })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| PriceToggleError::DocumentError {
                message: format!("unknown node {}", id),
            })
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            _ => Err(PriceToggleError::DocumentError {
                message: format!("node {} is not an element", id),
            }),
        }
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element(_)))
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// 祖先節點，由近到遠，不含自己
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Descendants in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).last() == Some(&self.root())
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).contains(&ancestor)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element(data) => Some(data.tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element(data) => data
                .attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match self.kind(id) {
            Some(NodeKind::Element(data)) => &data.attrs,
            _ => &[],
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let data = self.element_mut(id)?;
        match data.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => data.attrs.push((name.to_string(), value.to_string())),
        }
        self.mutations.push(MutationRecord::Attribute {
            target: id,
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<()> {
        let data = self.element_mut(id)?;
        let before = data.attrs.len();
        data.attrs.retain(|(k, _)| k != name);
        if data.attrs.len() != before {
            self.mutations.push(MutationRecord::Attribute {
                target: id,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &value)
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        if !self.has_class(id, class) {
            return Ok(());
        }
        let remaining: Vec<&str> = self
            .attr(id, "class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        if remaining.is_empty() {
            self.remove_attr(id, "class")
        } else {
            let value = remaining.join(" ");
            self.set_attr(id, "class", &value)
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(NodeKind::Text(text)) = self.kind(id) {
            return text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| match self.kind(d) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Rendered text: whitespace runs collapsed and trimmed.
    pub fn inner_text(&self, id: NodeId) -> String {
        self.text_content(id)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 以單一文字節點取代所有子節點
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        if !self.is_element(id) {
            return Err(PriceToggleError::DocumentError {
                message: format!("cannot set text on non-element {}", id),
            });
        }
        let removed = std::mem::take(&mut self.node_mut(id)?.children);
        for child in &removed {
            self.node_mut(*child)?.parent = None;
        }
        let text_node = self.create_text(text);
        self.node_mut(text_node)?.parent = Some(id);
        self.node_mut(id)?.children.push(text_node);
        self.mutations.push(MutationRecord::ChildList {
            target: id,
            added: vec![text_node],
            removed,
        });
        Ok(())
    }

    /// 直接改寫既有文字節點的內容
    pub fn set_text_value(&mut self, id: NodeId, text: &str) -> Result<()> {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Text(current) if current.as_str() == text => false,
            NodeKind::Text(current) => {
                *current = text.to_string();
                true
            }
            _ => {
                return Err(PriceToggleError::DocumentError {
                    message: format!("node {} is not a text node", id),
                })
            }
        };
        if changed {
            self.mutations.push(MutationRecord::CharacterData { target: id });
        }
        Ok(())
    }

    /// Swap the children of `id` for `children`, detaching the current ones.
    pub fn replace_children(&mut self, id: NodeId, children: &[NodeId]) -> Result<()> {
        if !self.is_element(id) {
            return Err(PriceToggleError::DocumentError {
                message: format!("cannot replace children of non-element {}", id),
            });
        }
        for child in self.children(id).to_vec() {
            self.detach(child)?;
        }
        for child in children {
            self.append_child(id, *child)?;
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_at(parent, child, None)
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        self.insert_at(parent, child, Some(reference))
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<()> {
        if matches!(self.node(parent)?.kind, NodeKind::Text(_) | NodeKind::Comment(_)) {
            return Err(PriceToggleError::DocumentError {
                message: format!("character data node {} cannot have children", parent),
            });
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(PriceToggleError::DocumentError {
                message: format!("inserting {} under {} would create a cycle", child, parent),
            });
        }
        self.detach(child)?;
        let position = match reference {
            Some(r) => self
                .node(parent)?
                .children
                .iter()
                .position(|c| *c == r)
                .ok_or_else(|| PriceToggleError::DocumentError {
                    message: format!("{} is not a child of {}", r, parent),
                })?,
            None => self.node(parent)?.children.len(),
        };
        self.node_mut(parent)?.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        self.mutations.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detach a node from its parent. The node and its subtree keep their ids.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != id);
        self.node_mut(id)?.parent = None;
        self.mutations.push(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![id],
        });
        Ok(())
    }

    /// Put `wrapper` where `id` currently is and move `id` inside it, ahead of
    /// anything the wrapper already holds.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) -> Result<()> {
        let parent = self.parent(id).ok_or_else(|| PriceToggleError::DocumentError {
            message: format!("cannot wrap detached node {}", id),
        })?;
        self.insert_before(parent, wrapper, id)?;
        match self.children(wrapper).first().copied() {
            Some(first) => self.insert_before(wrapper, id, first),
            None => self.append_child(wrapper, id),
        }
    }

    /// Move `id` back to where `wrapper` is and detach the wrapper. The
    /// wrapper keeps its other children and can be wrapped around `id` again.
    pub fn unwrap_from(&mut self, id: NodeId, wrapper: NodeId) -> Result<()> {
        let parent = self.parent(wrapper).ok_or_else(|| PriceToggleError::DocumentError {
            message: format!("wrapper {} is detached", wrapper),
        })?;
        self.insert_before(parent, id, wrapper)?;
        self.detach(wrapper)
    }

    /// Elements under `scope` (excluding `scope`) matching any selector in the list.
    pub fn select(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.is_element(*id) && selectors.matches(self, *id))
            .collect()
    }

    pub fn matches(&self, id: NodeId, selectors: &SelectorList) -> bool {
        self.is_element(id) && selectors.matches(self, id)
    }

    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    pub fn to_html(&self) -> String {
        html::serialize(self, self.root())
    }
}
