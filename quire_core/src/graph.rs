//! The addressable resource graph.
//!
//! ```text
//! Domain ─► Namespace ─► Manifest ─► Entry
//! ```
//!
//! Each container node owns a [`Children`] cache keyed by the name a child was
//! resolved under. Children never own their parent: an [`Identity`] only
//! records the parent's path. The arguments every ancestor was constructed
//! with travel down in a [`Scope`], so a child is built from the union of its
//! ancestors' arguments plus its own key.

use crate::domain::Context;
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Path used for a root node constructed without an explicit location.
pub const ROOT_PATH: &str = ".";

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Domain,
    Namespace,
    Manifest,
    Entry,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Domain,
        NodeKind::Namespace,
        NodeKind::Manifest,
        NodeKind::Entry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Domain => "domain",
            NodeKind::Namespace => "namespace",
            NodeKind::Manifest => "manifest",
            NodeKind::Entry => "entry",
        }
    }

    /// The child type the node's `Container` impl constructs.
    pub fn built_child(&self) -> ChildDecl {
        match self {
            NodeKind::Domain => ChildDecl::Of(NodeKind::Namespace),
            NodeKind::Namespace => ChildDecl::Of(NodeKind::Manifest),
            NodeKind::Manifest => ChildDecl::Of(NodeKind::Entry),
            NodeKind::Entry => ChildDecl::Leaf,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a kind may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildDecl {
    Of(NodeKind),
    Leaf,
}

impl fmt::Display for ChildDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildDecl::Of(kind) => write!(f, "{} children", kind),
            ChildDecl::Leaf => f.write_str("no children"),
        }
    }
}

/// Static dispatch table from parent kind to child kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KindTable {
    entries: BTreeMap<NodeKind, ChildDecl>,
}

impl KindTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Domain → Namespace → Manifest → Entry.
    pub fn standard() -> Self {
        Self::empty()
            .declare(NodeKind::Domain, NodeKind::Namespace)
            .declare(NodeKind::Namespace, NodeKind::Manifest)
            .declare(NodeKind::Manifest, NodeKind::Entry)
            .leaf(NodeKind::Entry)
    }

    pub fn declare(mut self, parent: NodeKind, child: NodeKind) -> Self {
        self.entries.insert(parent, ChildDecl::Of(child));
        self
    }

    pub fn leaf(mut self, kind: NodeKind) -> Self {
        self.entries.insert(kind, ChildDecl::Leaf);
        self
    }

    /// Check that every kind is declared and that each declaration matches
    /// the child type its node is built with.
    pub fn validate(&self) -> Result<()> {
        for kind in NodeKind::ALL {
            let declared = self.entries.get(&kind).ok_or_else(|| {
                Error::configuration(format!("no child kind declared for {}", kind))
            })?;
            let built = kind.built_child();
            if *declared != built {
                return Err(Error::configuration(format!(
                    "{} is declared with {} but is built with {}",
                    kind, declared, built
                )));
            }
        }
        Ok(())
    }

    /// The declared child kind of `parent`.
    pub fn child_of(&self, parent: NodeKind) -> Result<NodeKind> {
        match self.entries.get(&parent) {
            Some(ChildDecl::Of(child)) => Ok(*child),
            Some(ChildDecl::Leaf) => Err(Error::configuration(format!(
                "{} is a leaf and has no children",
                parent
            ))),
            None => Err(Error::configuration(format!(
                "no child kind declared for {}",
                parent
            ))),
        }
    }

    /// Fail unless `parent` is declared to contain `child`.
    pub fn expect_child(&self, parent: NodeKind, child: NodeKind) -> Result<()> {
        let declared = self.child_of(parent)?;
        if declared != child {
            return Err(Error::configuration(format!(
                "{} declares {} children, not {}",
                parent, declared, child
            )));
        }
        Ok(())
    }
}

/// Name, parent path and own path of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
    parent: Option<String>,
    path: String,
}

impl Identity {
    /// A parentless node; `path` defaults to [`ROOT_PATH`].
    pub fn root(name: impl Into<String>, path: Option<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            path: path.unwrap_or_else(|| ROOT_PATH.to_string()),
        }
    }

    /// A child of this node: path = parent path / name.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: format!("{}/{}", self.path.trim_end_matches('/'), name),
            parent: Some(self.path.clone()),
            name,
        }
    }

    /// A node under the same parent as this one.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        match &self.parent {
            Some(parent) => Self {
                path: format!("{}/{}", parent.trim_end_matches('/'), name),
                parent: Some(parent.clone()),
                name,
            },
            None => Self::root(name, Some(self.path.clone())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the parent node, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Construction arguments inherited from the root down to a node.
#[derive(Clone)]
pub struct Scope {
    context: Rc<Context>,
    keys: BTreeMap<NodeKind, String>,
}

impl Scope {
    pub fn root(context: Rc<Context>) -> Self {
        Self {
            context,
            keys: BTreeMap::new(),
        }
    }

    /// This scope plus the key a `kind` child was resolved under.
    pub fn with(&self, kind: NodeKind, key: impl Into<String>) -> Self {
        let mut keys = self.keys.clone();
        keys.insert(kind, key.into());
        Self {
            context: Rc::clone(&self.context),
            keys,
        }
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    /// The key an ancestor of `kind` was resolved under.
    pub fn key(&self, kind: NodeKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    pub fn require(&self, kind: NodeKind) -> Result<&str> {
        self.key(kind)
            .ok_or_else(|| Error::configuration(format!("scope has no {} key", kind)))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("keys", &self.keys).finish()
    }
}

/// Lazily-populated child cache owned by a container node.
pub struct Children<T> {
    cache: RefCell<BTreeMap<String, Rc<T>>>,
}

impl<T> Children<T> {
    pub fn new() -> Self {
        Self {
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Return the cached child under `key`, constructing it on first use.
    pub fn get_or_try_insert<F>(&self, key: &str, construct: F) -> Result<Rc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(child) = self.cache.borrow().get(key) {
            return Ok(Rc::clone(child));
        }
        let child = Rc::new(construct()?);
        self.cache
            .borrow_mut()
            .insert(key.to_string(), Rc::clone(&child));
        Ok(child)
    }

    pub fn cached(&self, key: &str) -> Option<Rc<T>> {
        self.cache.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Children<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.cache.borrow().keys()).finish()
    }
}

/// Any node in the graph.
pub trait Node {
    const KIND: NodeKind;

    fn identity(&self) -> &Identity;

    fn name(&self) -> &str {
        self.identity().name()
    }

    fn path(&self) -> &str {
        self.identity().path()
    }
}

/// A node with lazily-resolved children.
pub trait Container: Node {
    type Child: Node;

    fn children(&self) -> &Children<Self::Child>;

    /// Build the child for `key`; called at most once per cached key.
    fn construct(&self, key: &str) -> Result<Self::Child>;

    /// Child keys, per the node's listing policy.
    fn list(&self) -> Result<Vec<String>>;

    fn get(&self, key: &str) -> Result<Rc<Self::Child>> {
        self.children()
            .get_or_try_insert(key, || self.construct(key))
    }
}
