//! DOM tree (arena-based allocation)
//!
//! Nodes live in a slot arena owned by [`DomTree`] and refer to each other by
//! [`NodeId`]. The `children` and `attributes` lists of a node are the only
//! ownership edges; `parent` is a plain back reference used for lookups and
//! unlinking. Destroying a node destroys its attributes and children first,
//! then unlinks it from its parent, then releases its strings and its slot.
//!
//! Slots are reused after a delete. Each slot carries a generation that is
//! bumped on release, so a [`NodeId`] kept past the delete of its node stops
//! resolving instead of aliasing whatever takes the slot next.

use alloc::vec::Vec;

use crate::error::XmlError;
use crate::linklist::{ItemOwnership, LinkedList};
use crate::xstring::XString;

/// Node identifier (arena slot plus the slot's generation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Document node created by [`DomTree::new`]
    pub const DOCUMENT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };

    /// Arena slot of this node
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Number of times the slot was released before this node took it
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Kind of a DOM node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Root of a parsed tree; never has a parent
    Document,
    /// Tag with a name, attributes and children
    Element,
    /// `name` or `name=value` pair in an element's attribute list
    Attribute,
    /// Verbatim text between tags
    Text,
    /// Content of a `<!-- -->` block
    Comment,
}

/// DOM node
#[derive(Debug)]
pub struct DomNode {
    node_type: NodeType,
    name: Option<XString>,
    value: Option<XString>,
    parent: Option<NodeId>,
    children: LinkedList<NodeId>,
    attributes: LinkedList<NodeId>,
}

impl DomNode {
    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Tag or attribute name
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_ref().map(XString::as_bytes)
    }

    /// Text, comment or attribute value
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_ref().map(XString::as_bytes)
    }

    /// Name as `&str` if present and valid UTF-8
    pub fn name_str(&self) -> Option<&str> {
        self.name.as_ref().and_then(XString::as_str)
    }

    /// Value as `&str` if present and valid UTF-8
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(XString::as_str)
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in document order
    #[inline]
    pub fn children(&self) -> &LinkedList<NodeId> {
        &self.children
    }

    /// Attribute nodes in source order
    #[inline]
    pub fn attributes(&self) -> &LinkedList<NodeId> {
        &self.attributes
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<DomNode>,
}

/// Arena-backed DOM tree
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Slot>,
    /// Released slots, reused by later creations
    free: Vec<u32>,
    live: usize,
}

impl DomTree {
    /// Create a tree holding a single empty document node
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            live: 0,
        };
        tree.alloc(DomNode {
            node_type: NodeType::Document,
            name: None,
            value: None,
            parent: None,
            children: LinkedList::new(ItemOwnership::Borrowed),
            attributes: LinkedList::new(ItemOwnership::Borrowed),
        });
        tree
    }

    /// The document node
    #[inline]
    pub fn document(&self) -> NodeId {
        NodeId::DOCUMENT
    }

    /// Number of live nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if every node (the document included) has been destroyed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Get a node by ID
    ///
    /// Returns None for deleted nodes, even if their slot was reused.
    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.nodes
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: DomNode) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.nodes.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.nodes.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Create a node and link it into its parent
    ///
    /// Attribute nodes go to the parent's attribute list, everything else to
    /// its children. Document nodes take no parent; all other kinds need an
    /// existing one.
    pub fn create_node(
        &mut self,
        parent: Option<NodeId>,
        node_type: NodeType,
        name: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> Result<NodeId, XmlError> {
        match (node_type, parent) {
            (NodeType::Document, None) => {}
            (NodeType::Document, Some(_)) | (_, None) => return Err(XmlError::InvalidParent),
            (_, Some(parent)) => {
                if self.get(parent).is_none() {
                    return Err(XmlError::InvalidParent);
                }
            }
        }

        let id = self.alloc(DomNode {
            node_type,
            name: name.map(|n| XString::from_copy(n, 0)),
            value: value.map(|v| XString::from_copy(v, 0)),
            parent,
            children: LinkedList::new(ItemOwnership::Borrowed),
            attributes: LinkedList::new(ItemOwnership::Borrowed),
        });

        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            if node_type == NodeType::Attribute {
                parent.attributes.append(id);
            } else {
                parent.children.append(id);
            }
        }

        Ok(id)
    }

    /// Destroy a node with everything beneath it
    ///
    /// Returns false if the node does not exist.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.get(id).map(DomNode::parent) else {
            return false;
        };

        self.destroy_owned(id);

        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            if !parent.children.remove_item(&id) {
                parent.attributes.remove_item(&id);
            }
        }

        self.release(id);
        true
    }

    /// Post-order destroy of everything `id` owns
    fn destroy_owned(&mut self, id: NodeId) {
        let owned: Vec<NodeId> = match self.get(id) {
            Some(node) => node.attributes.iter().chain(node.children.iter()).copied().collect(),
            None => return,
        };

        for child in owned {
            self.destroy_owned(child);
            self.release(child);
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id.index()) {
            if slot.generation == id.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.live -= 1;
                self.free.push(id.index);
            }
        }
    }

    /// Kind of a node
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(DomNode::node_type)
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(DomNode::parent)
    }

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(|node| node.children.iter().copied())
    }

    /// Iterate over the attributes of a node
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(|node| node.attributes.iter().copied())
    }

    /// First child, optionally of a given kind
    pub fn first_child(&self, id: NodeId, node_type: Option<NodeType>) -> Option<NodeId> {
        self.children(id)
            .find(|&child| node_type.map_or(true, |t| self.node_type(child) == Some(t)))
    }

    /// Attribute node with the given name
    pub fn find_attribute(&self, id: NodeId, name: &[u8]) -> Option<NodeId> {
        self.attributes(id)
            .find(|&attr| self.get(attr).and_then(DomNode::name) == Some(name))
    }

    /// Value of the named attribute (None if missing or valueless)
    pub fn attribute_value(&self, id: NodeId, name: &[u8]) -> Option<&[u8]> {
        self.find_attribute(id, name)
            .and_then(|attr| self.get(attr))
            .and_then(DomNode::value)
    }

    /// All descendant elements named `name`, in document order
    pub fn elements_by_tag_name(&self, id: NodeId, name: &[u8]) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_elements(id, name, &mut found);
        found
    }

    fn collect_elements(&self, id: NodeId, name: &[u8], found: &mut Vec<NodeId>) {
        for child in self.children(id) {
            if let Some(node) = self.get(child) {
                if node.node_type == NodeType::Element {
                    if node.name() == Some(name) {
                        found.push(child);
                    }
                    self.collect_elements(child, name, found);
                }
            }
        }
    }

    /// Concatenated text of a node and its descendants
    pub fn text_content(&self, id: NodeId) -> XString {
        let mut text = XString::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, text: &mut XString) {
        let Some(node) = self.get(id) else {
            return;
        };

        if node.node_type == NodeType::Text {
            if let Some(value) = node.value() {
                text.append(value);
            }
            return;
        }

        for child in node.children.iter() {
            self.collect_text(*child, text);
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use pretty_assertions::assert_eq;

    fn element(tree: &mut DomTree, parent: NodeId, name: &str) -> NodeId {
        tree.create_node(Some(parent), NodeType::Element, Some(name.as_bytes()), None)
            .unwrap()
    }

    #[test]
    fn test_create_links_into_parent() {
        let mut tree = DomTree::new();
        let doc = tree.document();
        assert_eq!(tree.node_type(doc), Some(NodeType::Document));

        let root = element(&mut tree, doc, "root");
        let attr = tree
            .create_node(Some(root), NodeType::Attribute, Some(b"id"), Some(b"7"))
            .unwrap();
        let text = tree
            .create_node(Some(root), NodeType::Text, None, Some(b"body"))
            .unwrap();

        assert_eq!(tree.children(doc).collect::<Vec<_>>(), vec![root]);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![text]);
        assert_eq!(tree.attributes(root).collect::<Vec<_>>(), vec![attr]);
        assert_eq!(tree.parent(attr), Some(root));
        assert_eq!(tree.attribute_value(root, b"id"), Some(&b"7"[..]));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_create_rejects_bad_parents() {
        let mut tree = DomTree::new();
        let doc = tree.document();

        assert_eq!(
            tree.create_node(None, NodeType::Element, Some(b"x"), None),
            Err(XmlError::InvalidParent)
        );
        assert_eq!(
            tree.create_node(Some(doc), NodeType::Document, None, None),
            Err(XmlError::InvalidParent)
        );
        assert_eq!(
            tree.create_node(Some(NodeId { index: 42, generation: 0 }), NodeType::Text, None, None),
            Err(XmlError::InvalidParent)
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_delete_subtree_unlinks_and_frees() {
        let mut tree = DomTree::new();
        let doc = tree.document();
        let a = element(&mut tree, doc, "a");
        let b = element(&mut tree, a, "b");
        element(&mut tree, b, "c");
        tree.create_node(Some(b), NodeType::Attribute, Some(b"k"), None)
            .unwrap();
        let d = element(&mut tree, a, "d");
        assert_eq!(tree.len(), 6);

        assert!(tree.delete_node(b));
        assert_eq!(tree.len(), 3);
        assert!(tree.get(b).is_none());
        assert_eq!(tree.children(a).collect::<Vec<_>>(), vec![d]);
        assert!(!tree.delete_node(b));

        // Released slots are reused
        let e = element(&mut tree, d, "e");
        assert!(e.index() < 6);

        assert!(tree.delete_node(doc));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_stale_id_does_not_alias_reused_slot() {
        let mut tree = DomTree::new();
        let doc = tree.document();
        let old = element(&mut tree, doc, "old");
        assert!(tree.delete_node(old));

        let new = element(&mut tree, doc, "new");
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);

        assert!(tree.get(old).is_none());
        assert_eq!(tree.node_type(old), None);
        assert!(!tree.delete_node(old));
        assert_eq!(
            tree.create_node(Some(old), NodeType::Text, None, Some(b"x")),
            Err(XmlError::InvalidParent)
        );

        assert_eq!(tree.get(new).and_then(DomNode::name_str), Some("new"));
        assert_eq!(tree.children(doc).collect::<Vec<_>>(), vec![new]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_delete_attribute() {
        let mut tree = DomTree::new();
        let el = element(&mut tree, NodeId::DOCUMENT, "el");
        let attr = tree
            .create_node(Some(el), NodeType::Attribute, Some(b"flag"), None)
            .unwrap();

        assert!(tree.delete_node(attr));
        assert_eq!(tree.attributes(el).count(), 0);
        assert_eq!(tree.find_attribute(el, b"flag"), None);
    }

    #[test]
    fn test_queries() {
        let mut tree = DomTree::new();
        let doc = tree.document();
        let list = element(&mut tree, doc, "list");
        tree.create_node(Some(list), NodeType::Comment, None, Some(b"note"))
            .unwrap();
        let first = element(&mut tree, list, "item");
        tree.create_node(Some(first), NodeType::Text, None, Some(b"one"))
            .unwrap();
        let nested = element(&mut tree, first, "item");
        tree.create_node(Some(nested), NodeType::Text, None, Some(b"-two"))
            .unwrap();

        assert_eq!(tree.first_child(list, None), tree.children(list).next());
        assert_eq!(tree.first_child(list, Some(NodeType::Element)), Some(first));
        assert_eq!(tree.first_child(list, Some(NodeType::Text)), None);
        assert_eq!(tree.elements_by_tag_name(doc, b"item"), vec![first, nested]);
        assert_eq!(tree.text_content(list).as_bytes(), b"one-two");
        assert_eq!(tree.get(first).and_then(DomNode::name_str), Some("item"));
    }
}
