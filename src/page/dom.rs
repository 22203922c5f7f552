use serde::Serialize;

use super::observer::{MutationKind, MutationRecord};
use crate::error::DomError;

/// Index of a node in the document arena. Nodes are never freed for the page lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag_name: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes().any(|c| c == class_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena-backed document tree. Mutators return the records describing what changed;
/// routing them to observers is the page's job.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    document_element: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            document_element: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        let html = doc.attach_new(doc.root, "html");
        let head = doc.attach_new(html, "head");
        let body = doc.attach_new(html, "body");
        doc.document_element = html;
        doc.head = head;
        doc.body = body;
        doc
    }

    // Builds the skeleton without emitting records; nobody observes before construction ends.
    fn attach_new(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // === Construction ===

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag_name: tag.to_ascii_lowercase(),
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
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    // === Accessors ===

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag_name)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attribute(&name.to_ascii_lowercase()))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Element ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            cursor: self.parent_element(id),
        }
    }

    /// Pre-order descendants, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Element siblings that precede `id`, nearest first.
    pub fn preceding_element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        let Some(pos) = siblings.iter().position(|s| *s == id) else {
            return Vec::new();
        };
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .filter(|s| self.is_element(*s))
            .collect()
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    /// `id` followed by its ancestors up to the detached root or the document.
    pub fn event_path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.parent(current);
        }
        path
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Text(text)) | Some(NodeKind::Comment(text)) => text.clone(),
            Some(NodeKind::Element(_)) | Some(NodeKind::Document) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match self.kind(d) {
                    Some(NodeKind::Text(text)) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            None => String::new(),
        }
    }

    /// Short console label: `div#main.card.active`, `#text`, `#document`.
    pub fn describe(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Document) => "#document".to_string(),
            Some(NodeKind::Text(_)) => "#text".to_string(),
            Some(NodeKind::Comment(_)) => "#comment".to_string(),
            Some(NodeKind::Element(el)) => {
                let mut label = el.tag_name.clone();
                if let Some(id_attr) = el.id() {
                    label.push('#');
                    label.push_str(id_attr);
                }
                for class in el.classes() {
                    label.push('.');
                    label.push_str(class);
                }
                label
            }
            None => format!("#missing({})", id.0),
        }
    }

    // === Mutation ===

    pub fn append_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> Result<Vec<MutationRecord>, DomError> {
        self.insert_before(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<Vec<MutationRecord>, DomError> {
        self.validate_insert(parent, child)?;
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        let mut records = Vec::new();
        if let Some(old_parent) = self.parent(child) {
            records.push(self.detach(old_parent, child));
        }

        let children = &mut self.nodes[parent.0].children;
        let pos = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(pos, child);
        self.nodes[child.0].parent = Some(parent);

        records.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
        Ok(records)
    }

    fn validate_insert(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        let parent_accepts = matches!(parent_node.kind, NodeKind::Document | NodeKind::Element(_));
        let child_insertable = !matches!(child_node.kind, NodeKind::Document);
        if !parent_accepts || !child_insertable || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    pub fn remove_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> Result<MutationRecord, DomError> {
        self.node(parent)?;
        self.node(child)?;
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        Ok(self.detach(parent, child))
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) -> MutationRecord {
        self.nodes[parent.0].children.retain(|c| *c != child);
        self.nodes[child.0].parent = None;
        MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![child],
            },
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<MutationRecord, DomError> {
        let name = name.to_ascii_lowercase();
        let el = self.element_mut(id)?;
        let old_value = match el.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value.to_string())),
            None => {
                el.attrs.push((name.clone(), value.to_string()));
                None
            }
        };
        Ok(MutationRecord {
            target: id,
            kind: MutationKind::Attributes { name, old_value },
        })
    }

    /// Returns `None` when the attribute was not present (nothing changed).
    pub fn remove_attribute(
        &mut self,
        id: NodeId,
        name: &str,
    ) -> Result<Option<MutationRecord>, DomError> {
        let name = name.to_ascii_lowercase();
        let el = self.element_mut(id)?;
        let Some(pos) = el.attrs.iter().position(|(key, _)| *key == name) else {
            return Ok(None);
        };
        let (_, old_value) = el.attrs.remove(pos);
        Ok(Some(MutationRecord {
            target: id,
            kind: MutationKind::Attributes {
                name,
                old_value: Some(old_value),
            },
        }))
    }

    /// Replaces the data of a text or comment node.
    pub fn set_data(&mut self, id: NodeId, data: &str) -> Result<MutationRecord, DomError> {
        let node = self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))?;
        let old_value = match &mut node.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => {
                std::mem::replace(text, data.to_string())
            }
            _ => return Err(DomError::NotCharacterData(id)),
        };
        Ok(MutationRecord {
            target: id,
            kind: MutationKind::CharacterData { old_value },
        })
    }

    /// Replaces all children of an element with a single text node.
    pub fn set_text_content(
        &mut self,
        id: NodeId,
        text: &str,
    ) -> Result<Vec<MutationRecord>, DomError> {
        self.element_mut(id)?;
        let removed = std::mem::take(&mut self.nodes[id.0].children);
        for child in &removed {
            self.nodes[child.0].parent = None;
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.nodes[text_node.0].parent = Some(id);
            self.nodes[id.0].children.push(text_node);
            added.push(text_node);
        }
        if added.is_empty() && removed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![MutationRecord {
            target: id,
            kind: MutationKind::ChildList { added, removed },
        }])
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Ok(el),
            Some(_) => Err(DomError::NotAnElement(id)),
            None => Err(DomError::UnknownNode(id)),
        }
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    cursor: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.cursor?;
        self.cursor = self.doc.parent_element(current);
        Some(current)
    }
}
