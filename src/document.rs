//! Minimal in-memory host document
//!
//! Models just enough of a DOM for the render lifecycle: element creation,
//! child append/remove with single-parent semantics, a body node, and anchor
//! activation that hands downloads to a [`DownloadHandler`].

use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier of a node inside its document.
///
/// Slots of discarded nodes are reused; the generation tells a reused slot
/// apart from the node that held it before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String },
    Text(String),
    /// Drawable surface placeholder; pixels live in the owning `Surface`
    Canvas { width: u32, height: u32 },
    /// Handle to a node that was discarded
    Discarded,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    attributes: HashMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: HashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

/// Receives the target of an activated download anchor
pub trait DownloadHandler: Send + Sync {
    fn save(&self, href: &str, filename: &str) -> Result<()>;
}

struct Tree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    body: NodeId,
    downloads: Option<Arc<dyn DownloadHandler>>,
}

impl Tree {
    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.data.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.data.as_mut())
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.data = Some(data);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    data: Some(data),
                });
                NodeId {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let parent = self.get_mut(child).and_then(|c| c.parent.take());
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != child);
        }
    }

    /// Drop the node's data and hand its slot back for reuse
    fn release(&mut self, id: NodeId) {
        if id == self.body || self.get(id).is_none() {
            return;
        }
        self.unlink(id);
        let slot = &mut self.slots[id.index];
        let data = slot.data.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        // Children outlive their parent as free-standing nodes
        for child in data.map(|d| d.children).unwrap_or_default() {
            if let Some(c) = self.get_mut(child) {
                c.parent = None;
            }
        }
    }
}

/// Shared handle to a host document
#[derive(Clone)]
pub struct Document {
    inner: Arc<Mutex<Tree>>,
}

/// Reference to a node; cloning does not clone the node
#[derive(Clone)]
pub struct Node {
    doc: Document,
    id: NodeId,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("id", &self.id).finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.doc.ptr_eq(&other.doc)
    }
}

impl Eq for Node {}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut tree = Tree {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId { index: 0, generation: 0 },
            downloads: None,
        };
        tree.body = tree.insert(NodeData::new(NodeKind::Element { tag: "body".into() }));
        Self {
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    /// Document whose anchor activations are forwarded to `handler`
    pub fn with_download_handler(handler: Arc<dyn DownloadHandler>) -> Self {
        let doc = Self::new();
        doc.set_download_handler(handler);
        doc
    }

    pub fn set_download_handler(&self, handler: Arc<dyn DownloadHandler>) {
        self.tree().downloads = Some(handler);
    }

    /// Whether both handles refer to the same document
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn node(&self, id: NodeId) -> Node {
        Node { doc: self.clone(), id }
    }

    fn insert(&self, kind: NodeKind) -> Node {
        let id = self.tree().insert(NodeData::new(kind));
        self.node(id)
    }

    pub fn create_element(&self, tag: &str) -> Node {
        self.insert(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        })
    }

    pub fn create_text_node(&self, text: &str) -> Node {
        self.insert(NodeKind::Text(text.to_string()))
    }

    pub fn create_canvas(&self, width: u32, height: u32) -> Node {
        let node = self.insert(NodeKind::Canvas { width, height });
        node.set_attribute("width", &width.to_string());
        node.set_attribute("height", &height.to_string());
        node
    }

    pub fn body(&self) -> Node {
        let id = self.tree().body;
        self.node(id)
    }

    /// Nodes not yet discarded, attached or free-standing
    pub fn live_node_count(&self) -> usize {
        self.tree().slots.iter().filter(|s| s.data.is_some()).count()
    }

    /// Node slots allocated so far, live or waiting for reuse
    pub fn slot_count(&self) -> usize {
        self.tree().slots.len()
    }

    /// Total bytes of attribute names and values held by live nodes
    pub fn attribute_bytes(&self) -> usize {
        self.tree()
            .slots
            .iter()
            .filter_map(|s| s.data.as_ref())
            .flat_map(|d| d.attributes.iter())
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    fn activate_anchor(&self, id: NodeId) -> Result<()> {
        let (href, filename, handler) = {
            let tree = self.tree();
            let attrs = tree.get(id).map(|n| &n.attributes);
            let get = |name: &str| attrs.and_then(|a| a.get(name)).cloned().unwrap_or_default();
            (get("href"), get("download"), tree.downloads.clone())
        };
        match handler {
            Some(h) => h.save(&href, &filename),
            None => Err(Error::Download("document has no download handler".into())),
        }
    }
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn kind(&self) -> NodeKind {
        self.doc
            .tree()
            .get(self.id)
            .map_or(NodeKind::Discarded, |n| n.kind.clone())
    }

    pub fn is_canvas(&self) -> bool {
        matches!(self.kind(), NodeKind::Canvas { .. })
    }

    /// Whether this node can hold children (text and discarded nodes cannot)
    pub fn accepts_children(&self) -> bool {
        !matches!(self.kind(), NodeKind::Text(_) | NodeKind::Discarded)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.doc.tree().get(self.id)?.attributes.get(name).cloned()
    }

    /// No-op on a discarded node
    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Some(n) = self.doc.tree().get_mut(self.id) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn parent(&self) -> Option<Node> {
        let parent = self.doc.tree().get(self.id)?.parent;
        parent.map(|id| self.doc.node(id))
    }

    pub fn children(&self) -> Vec<Node> {
        let ids = self
            .doc
            .tree()
            .get(self.id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        ids.into_iter().map(|id| self.doc.node(id)).collect()
    }

    /// Append `child`, moving it out of its current parent first.
    pub fn append_child(&self, child: &Node) -> Result<()> {
        if !self.doc.ptr_eq(&child.doc) {
            return Err(Error::InvalidContainer("node belongs to another document".into()));
        }
        let mut tree = self.doc.tree();
        match tree.get(self.id).map(|n| &n.kind) {
            None => return Err(Error::InvalidContainer("container was discarded".into())),
            Some(NodeKind::Text(_)) => {
                return Err(Error::InvalidContainer("text nodes cannot have children".into()))
            }
            Some(_) => {}
        }
        if tree.get(child.id).is_none() {
            return Err(Error::InvalidContainer("cannot append a discarded node".into()));
        }
        // Reject cycles: `self` must not be inside `child`
        let mut cursor = Some(self.id);
        while let Some(id) = cursor {
            if id == child.id {
                return Err(Error::InvalidContainer("cannot append a node to its own subtree".into()));
            }
            cursor = tree.get(id).and_then(|n| n.parent);
        }
        tree.unlink(child.id);
        if let Some(c) = tree.get_mut(child.id) {
            c.parent = Some(self.id);
        }
        if let Some(p) = tree.get_mut(self.id) {
            p.children.push(child.id);
        }
        Ok(())
    }

    /// Remove `child` if it is a direct child of this node. Returns whether it was.
    pub fn remove_child(&self, child: &Node) -> bool {
        let mut tree = self.doc.tree();
        if tree.get(child.id).and_then(|c| c.parent) != Some(self.id) {
            return false;
        }
        tree.unlink(child.id);
        true
    }

    /// Detach this node from whatever parent holds it
    pub fn detach(&self) {
        self.doc.tree().unlink(self.id);
    }

    /// Detach the node and release everything it holds.
    ///
    /// Attributes are dropped, children become free-standing and the slot is
    /// reused by the next node created; this handle then reports
    /// [`NodeKind::Discarded`]. The body cannot be discarded.
    pub fn discard(&self) {
        self.doc.tree().release(self.id);
    }

    /// Simulate a user activation (click). Anchors with an `href` forward
    /// their target and `download` name to the document's handler.
    pub fn click(&self) -> Result<()> {
        match self.kind() {
            NodeKind::Element { tag } if tag == "a" => self.doc.activate_anchor(self.id),
            _ => Ok(()),
        }
    }
}

/// Records every save; useful for tests and for callers that post-process files
#[derive(Default)]
pub struct MemoryDownloads {
    saved: Mutex<Vec<(String, String)>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved `(filename, href)` pairs in activation order
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DownloadHandler for MemoryDownloads {
    fn save(&self, href: &str, filename: &str) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((filename.to_string(), href.to_string()));
        Ok(())
    }
}

/// Decodes `data:` URIs and writes them below a directory
pub struct DirectoryDownloads {
    dir: std::path::PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadHandler for DirectoryDownloads {
    fn save(&self, href: &str, filename: &str) -> Result<()> {
        let bytes = crate::export::decode_data_uri(href)?;
        // Only keep the final path component of the suggested name
        let name = std::path::Path::new(filename)
            .file_name()
            .ok_or_else(|| Error::Download(format!("invalid file name '{}'", filename)))?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, bytes)?;
        log::debug!("Saved download to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_moves_instead_of_duplicating() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let c = doc.create_canvas(10, 10);
        a.append_child(&c).unwrap();
        a.append_child(&c).unwrap();
        assert_eq!(a.children().len(), 1);
        b.append_child(&c).unwrap();
        assert!(a.children().is_empty());
        assert_eq!(c.parent(), Some(b.clone()));
    }

    #[test]
    fn text_nodes_reject_children() {
        let doc = Document::new();
        let t = doc.create_text_node("hi");
        let c = doc.create_canvas(1, 1);
        assert!(matches!(t.append_child(&c), Err(Error::InvalidContainer(_))));
        assert!(!t.accepts_children());
    }

    #[test]
    fn rejects_cycles() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        a.append_child(&b).unwrap();
        assert!(b.append_child(&a).is_err());
        assert!(a.append_child(&a).is_err());
    }

    #[test]
    fn remove_child_only_touches_own_children() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let other = doc.create_element("span");
        let c = doc.create_canvas(1, 1);
        a.append_child(&other).unwrap();
        assert!(!a.remove_child(&c));
        a.append_child(&c).unwrap();
        assert!(a.remove_child(&c));
        assert_eq!(a.children(), vec![other]);
    }

    #[test]
    fn anchor_click_reaches_handler() {
        let sink = Arc::new(MemoryDownloads::new());
        let doc = Document::with_download_handler(sink.clone());
        let a = doc.create_element("A");
        a.set_attribute("href", "data:image/png;base64,AAAA");
        a.set_attribute("download", "qr.png");
        a.click().unwrap();
        assert_eq!(sink.saved(), vec![("qr.png".to_string(), "data:image/png;base64,AAAA".to_string())]);
    }

    #[test]
    fn discard_releases_attributes_and_reuses_slot() {
        let doc = Document::new();
        let a = doc.create_element("a");
        a.set_attribute("href", &"x".repeat(10_000));
        doc.body().append_child(&a).unwrap();
        let slots = doc.slot_count();

        a.discard();
        assert!(doc.body().children().is_empty());
        assert_eq!(a.kind(), NodeKind::Discarded);
        assert_eq!(a.attribute("href"), None);
        assert!(doc.attribute_bytes() < 100);

        let b = doc.create_element("a");
        assert_eq!(doc.slot_count(), slots);
        assert_ne!(a, b);
        assert_eq!(b.attribute("href"), None);
        // the stale handle must not reach the new occupant
        a.set_attribute("href", "stale");
        assert_eq!(b.attribute("href"), None);
    }

    #[test]
    fn discarded_parent_frees_children() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let c = doc.create_canvas(2, 2);
        a.append_child(&c).unwrap();
        a.discard();
        assert_eq!(c.parent(), None);
        assert!(matches!(a.append_child(&c), Err(Error::InvalidContainer(_))));
        assert!(matches!(doc.body().append_child(&a), Err(Error::InvalidContainer(_))));
    }

    #[test]
    fn body_cannot_be_discarded() {
        let doc = Document::new();
        doc.body().discard();
        assert!(doc.body().accepts_children());
        assert_eq!(doc.live_node_count(), 1);
    }

    #[test]
    fn anchor_click_without_handler_fails() {
        let doc = Document::new();
        let a = doc.create_element("a");
        assert!(matches!(a.click(), Err(Error::Download(_))));
    }
}
