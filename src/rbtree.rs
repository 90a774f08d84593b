use crate::error::{Error, Result};
use crate::index::{DefaultIx, Handle, IndexType, NodeIndex};
use crate::iter::Iter;
use crate::node::{Color, Dir, Node};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of tree ids stamped into every handle a tree gives out.
static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(0);

fn next_tree_id() -> u32 {
    NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Default key type of a [`RbTree`].
pub type Key = i32;

/// An ordered map of keys, kept balanced as a red-black tree.
///
/// Nodes live in a single arena and link to each other by slot index. Slot 0 holds the
/// sentinel, which stands for every missing child and for the root's parent.
///
/// With the `serde` feature a deserialized arena is checked before use and gets a fresh
/// tree id, so handles taken from the tree that was serialized do not carry over.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RbTree<K = Key, Ix = DefaultIx> {
    /// Vector that stores nodes
    pub(crate) nodes: Vec<Node<K, Ix>>,
    /// Root of the tree
    pub(crate) root: NodeIndex<Ix>,
    /// First vacant slot, or the sentinel when there is none
    pub(crate) free_head: NodeIndex<Ix>,
    /// Number of keys in the tree
    pub(crate) len: usize,
    /// Id stamped into the handles of this tree
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) id: u32,
}

impl<K, Ix> RbTree<K, Ix>
where
    K: Ord,
    Ix: IndexType,
{
    /// Creates a new `RbTree` with estimated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.saturating_add(1));
        nodes.push(Node::new_sentinel());
        RbTree {
            nodes,
            root: NodeIndex::sentinel(),
            free_head: NodeIndex::sentinel(),
            len: 0,
            id: next_tree_id(),
        }
    }

    /// Creates a new `RbTree` with estimated capacity, reporting allocation failure
    /// instead of aborting.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::{Error, RbTree};
    ///
    /// let tree = RbTree::<i32>::try_with_capacity(16).unwrap();
    /// assert!(tree.is_empty());
    /// assert!(matches!(
    ///     RbTree::<i32>::try_with_capacity(usize::MAX / 2),
    ///     Err(Error::AllocFailed(_))
    /// ));
    /// ```
    #[inline]
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut nodes = Vec::new();
        nodes.try_reserve(capacity.saturating_add(1))?;
        nodes.push(Node::new_sentinel());
        Ok(RbTree {
            nodes,
            root: NodeIndex::sentinel(),
            free_head: NodeIndex::sentinel(),
            len: 0,
            id: next_tree_id(),
        })
    }

    /// Insert a key into the tree and return the handle of the root afterwards.
    ///
    /// Equal keys are kept side by side; use [`RbTree::find`] to get a handle to a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocFailed`] when the arena cannot grow, and
    /// [`Error::IndexExhausted`] when the index type cannot address another slot. The
    /// tree is unchanged in both cases.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// let root = tree.insert(10).unwrap();
    /// assert_eq!(tree.key(root), Some(&10));
    /// tree.insert(20).unwrap();
    /// let root = tree.insert(30).unwrap();
    /// assert_eq!(tree.key(root), Some(&20));
    /// ```
    #[inline]
    pub fn insert(&mut self, key: K) -> Result<Handle<Ix>> {
        let z = self.alloc(key)?;
        self.insert_inner(z);
        Ok(self.handle(self.root))
    }

    /// Remove the node behind `handle`, returning its key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] when the handle does not refer to a live node
    /// of this tree, for instance because the node was already erased or the handle
    /// came from another tree.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::{Error, RbTree};
    ///
    /// let mut tree = RbTree::new();
    /// for key in [1, 2, 3] {
    ///     tree.insert(key).unwrap();
    /// }
    /// let two = tree.find(&2).unwrap();
    /// assert_eq!(tree.erase(two), Ok(2));
    /// assert_eq!(tree.erase(two), Err(Error::InvalidHandle));
    /// assert_eq!(tree.len(), 2);
    /// ```
    #[inline]
    pub fn erase(&mut self, handle: Handle<Ix>) -> Result<K> {
        let Some(z) = self.live(handle) else {
            debug!("erase rejected {handle:?}: not a live node of this tree");
            return Err(Error::InvalidHandle);
        };
        self.remove_inner(z);
        Ok(self.release(z))
    }

    /// Return the handle of a node holding `key`.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// tree.insert(7).unwrap();
    /// let seven = tree.find(&7).unwrap();
    /// assert_eq!(tree.key(seven), Some(&7));
    /// assert!(tree.find(&8).is_none());
    /// ```
    #[inline]
    pub fn find(&self, key: &K) -> Option<Handle<Ix>> {
        self.search(key).map(|x| self.handle(x))
    }

    /// Return `true` if some node holds `key`.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Return the handle of the node with the smallest key.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// assert!(tree.min().is_none());
    /// for key in [4, 1, 9] {
    ///     tree.insert(key).unwrap();
    /// }
    /// assert_eq!(tree.min().and_then(|h| tree.key(h)), Some(&1));
    /// assert_eq!(tree.max().and_then(|h| tree.key(h)), Some(&9));
    /// ```
    #[inline]
    pub fn min(&self) -> Option<Handle<Ix>> {
        self.root()
            .map(|_| self.handle(self.extreme(self.root, Dir::Left)))
    }

    /// Return the handle of the node with the largest key.
    #[inline]
    pub fn max(&self) -> Option<Handle<Ix>> {
        self.root()
            .map(|_| self.handle(self.extreme(self.root, Dir::Right)))
    }

    /// Return the handle of the root, or `None` if the tree is empty.
    #[inline]
    pub fn root(&self) -> Option<Handle<Ix>> {
        (!self.node_ref(self.root, Node::is_sentinel)).then(|| self.handle(self.root))
    }

    /// Return the key behind `handle`, or `None` if the handle is no longer live.
    #[inline]
    pub fn key(&self, handle: Handle<Ix>) -> Option<&K> {
        self.live(handle).map(|x| self.node_ref(x, Node::key))
    }

    /// Return the color of the node behind `handle`.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::{Color, RbTree};
    ///
    /// let mut tree = RbTree::new();
    /// let root = tree.insert(1).unwrap();
    /// tree.insert(2).unwrap();
    /// assert_eq!(tree.color(root), Some(Color::Black));
    /// assert_eq!(tree.color(tree.find(&2).unwrap()), Some(Color::Red));
    /// ```
    #[inline]
    pub fn color(&self, handle: Handle<Ix>) -> Option<Color> {
        self.live(handle).map(|x| self.node_ref(x, Node::color))
    }

    /// Copy up to `capacity` keys out of the tree in ascending order.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// for key in [3, 1, 2] {
    ///     tree.insert(key).unwrap();
    /// }
    /// assert_eq!(tree.export_sorted(10), vec![1, 2, 3]);
    /// assert_eq!(tree.export_sorted(2), vec![1, 2]);
    /// ```
    #[inline]
    #[must_use]
    pub fn export_sorted(&self, capacity: usize) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::with_capacity(capacity.min(self.len));
        keys.extend(self.iter().take(capacity).cloned());
        keys
    }

    /// Fill `out` with the smallest keys in ascending order, returning how many slots
    /// were written. Slots past the returned count are left untouched.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::RbTree;
    ///
    /// let mut tree = RbTree::new();
    /// for key in [30, 10, 20] {
    ///     tree.insert(key).unwrap();
    /// }
    /// let mut out = [0; 2];
    /// assert_eq!(tree.to_array(&mut out), 2);
    /// assert_eq!(out, [10, 20]);
    /// ```
    #[inline]
    pub fn to_array(&self, out: &mut [K]) -> usize
    where
        K: Clone,
    {
        let mut written = 0;
        for (slot, key) in out.iter_mut().zip(self.iter()) {
            slot.clone_from(key);
            written += 1;
        }
        written
    }

    /// Get an iterator over the keys of the tree, in ascending order.
    #[inline]
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, Ix> {
        Iter::new(self)
    }

    /// Number of nodes on the longest path from the root down to a leaf.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut level = VecDeque::new();
        if !self.node_ref(self.root, Node::is_sentinel) {
            level.push_back(self.root);
        }
        while !level.is_empty() {
            height += 1;
            for _ in 0..level.len() {
                let Some(x) = level.pop_front() else {
                    break;
                };
                for dir in [Dir::Left, Dir::Right] {
                    let child = self.node_ref(x, |xn| xn.child(dir));
                    if !self.node_ref(child, Node::is_sentinel) {
                        level.push_back(child);
                    }
                }
            }
        }
        height
    }

    /// Remove all keys from the tree. The arena keeps its slots for later inserts.
    #[inline]
    pub fn clear(&mut self) {
        let released = self.release_all();
        self.nodes[NodeIndex::<Ix>::sentinel().index()] = Node::new_sentinel();
        self.root = NodeIndex::sentinel();
        self.len = 0;
        trace!("cleared tree, released {released} nodes");
    }

    /// Tear the tree down, releasing every node after both of its children. Returns
    /// the number of nodes released.
    ///
    /// # Example
    /// ```rust
    /// use rb_key_tree::RbTree;
    ///
    /// assert_eq!(RbTree::<i32>::new().destroy(), 0);
    ///
    /// let mut tree = RbTree::new();
    /// for key in 0..100 {
    ///     tree.insert(key).unwrap();
    /// }
    /// assert_eq!(tree.destroy(), 100);
    /// ```
    #[inline]
    pub fn destroy(mut self) -> usize {
        let released = self.release_all();
        trace!("destroyed tree, released {released} nodes");
        released
    }

    /// Return the number of keys in the tree.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return `true` if the tree contains no keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> RbTree<K>
where
    K: Ord,
{
    /// Create an empty `RbTree`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }
}

impl<K> Default for RbTree<K>
where
    K: Ord,
{
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, Ix> IntoIterator for &'a RbTree<K, Ix>
where
    K: Ord,
    Ix: IndexType,
{
    type Item = &'a K;
    type IntoIter = Iter<'a, K, Ix>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, Ix> RbTree<K, Ix>
where
    K: Ord,
    Ix: IndexType,
{
    /// Place `key` in a vacant slot, or in a new one at the end of the arena.
    fn alloc(&mut self, key: K) -> Result<NodeIndex<Ix>> {
        let slot = self.free_head;
        if slot != NodeIndex::sentinel() {
            self.free_head = self.node_ref(slot, Node::parent);
            self.node_mut(slot, Node::occupy(key));
            trace!("reusing vacant slot {slot:?}");
            return Ok(slot);
        }
        if self.nodes.len() >= NodeIndex::<Ix>::end().index() {
            debug!("node arena is full at {} slots", self.nodes.len());
            return Err(Error::IndexExhausted);
        }
        if let Err(err) = self.nodes.try_reserve(1) {
            debug!("failed to grow node arena past {} slots: {err}", self.nodes.len());
            return Err(err.into());
        }
        let slot = NodeIndex::new(self.nodes.len());
        self.nodes.push(Node::new_leaf(key));
        Ok(slot)
    }

    /// Move the key out of a node already unlinked from the tree and put its slot on
    /// the free list, unless its generation is spent.
    fn release(&mut self, x: NodeIndex<Ix>) -> K {
        let key = self.node_mut(x, Node::vacate(self.free_head));
        if self.node_ref(x, Node::is_retired) {
            self.node_mut(x, Node::set_parent(NodeIndex::sentinel()));
            debug!("retired slot {x:?}, its generation is spent");
        } else {
            self.free_head = x;
        }
        key
    }

    /// Release every node in post-order with an explicit stack.
    fn release_all(&mut self) -> usize {
        let sentinel = NodeIndex::sentinel();
        let mut stack = Vec::new();
        let mut last = sentinel;
        let mut x = self.root;
        let mut released = 0;
        loop {
            while x != sentinel {
                stack.push(x);
                x = self.node_ref(x, Node::left);
            }
            let Some(&top) = stack.last() else {
                break;
            };
            let right = self.node_ref(top, Node::right);
            if right != sentinel && right != last {
                x = right;
            } else {
                let _ignore = stack.pop();
                drop(self.release(top));
                released += 1;
                last = top;
            }
        }
        self.root = sentinel;
        self.len = 0;
        released
    }

    /// Insert a node into the tree.
    fn insert_inner(&mut self, z: NodeIndex<Ix>) {
        let mut y = NodeIndex::sentinel();
        let mut x = self.root;

        while !self.node_ref(x, Node::is_sentinel) {
            y = x;
            x = self.node_ref(x, |xn| xn.child(self.descend_dir(z, xn)));
        }
        self.node_mut(z, Node::set_parent(y));
        if self.node_ref(y, Node::is_sentinel) {
            self.root = z;
        } else {
            let dir = self.node_ref(y, |yn| self.descend_dir(z, yn));
            self.node_mut(y, Node::set_child(dir, z));
        }

        self.insert_fixup(z);

        self.len += 1;
    }

    /// Remove a node from the tree.
    fn remove_inner(&mut self, z: NodeIndex<Ix>) {
        let mut y_orig_color = self.node_ref(z, Node::color);
        let x;
        if self.child_ref(z, Dir::Left, Node::is_sentinel) {
            x = self.node_ref(z, Node::right);
            self.transplant(z, x);
        } else if self.child_ref(z, Dir::Right, Node::is_sentinel) {
            x = self.node_ref(z, Node::left);
            self.transplant(z, x);
        } else {
            let y = self.extreme(self.node_ref(z, Node::right), Dir::Left);
            y_orig_color = self.node_ref(y, Node::color);
            x = self.node_ref(y, Node::right);
            if self.node_ref(y, Node::parent) == z {
                self.node_mut(x, Node::set_parent(y));
            } else {
                self.transplant(y, x);
                self.node_mut(y, Node::set_child(Dir::Right, self.node_ref(z, Node::right)));
                self.child_mut(y, Dir::Right, Node::set_parent(y));
            }
            self.transplant(z, y);
            self.node_mut(y, Node::set_child(Dir::Left, self.node_ref(z, Node::left)));
            self.child_mut(y, Dir::Left, Node::set_parent(y));
            self.node_mut(y, Node::set_color(self.node_ref(z, Node::color)));
        }

        if matches!(y_orig_color, Color::Black) {
            self.remove_fixup(x);
        }

        self.len -= 1;
    }

    /// Search for a node with the given key.
    fn search(&self, key: &K) -> Option<NodeIndex<Ix>> {
        let mut x = self.root;
        while !self.node_ref(x, Node::is_sentinel) {
            if self.node_ref(x, Node::key) == key {
                return Some(x);
            }
            if key < self.node_ref(x, Node::key) {
                x = self.node_ref(x, Node::left);
            } else {
                x = self.node_ref(x, Node::right);
            }
        }
        None
    }

    /// Restore red-black tree properties after an insert.
    fn insert_fixup(&mut self, mut z: NodeIndex<Ix>) {
        while self.parent_ref(z, Node::is_red) {
            if self.grand_parent_ref(z, Node::is_sentinel) {
                break;
            }
            let side = self.side_of(self.node_ref(z, Node::parent));
            let y = self.grand_parent_ref(z, |gn| gn.child(!side));
            if self.node_ref(y, Node::is_red) {
                self.parent_mut(z, Node::set_color(Color::Black));
                self.node_mut(y, Node::set_color(Color::Black));
                self.grand_parent_mut(z, Node::set_color(Color::Red));
                z = self.parent_ref(z, Node::parent);
            } else {
                if self.side_of(z) != side {
                    z = self.node_ref(z, Node::parent);
                    self.rotate(z, side);
                }
                self.parent_mut(z, Node::set_color(Color::Black));
                self.grand_parent_mut(z, Node::set_color(Color::Red));
                self.rotate(self.parent_ref(z, Node::parent), !side);
            }
        }
        self.node_mut(self.root, Node::set_color(Color::Black));
    }

    /// Restore red-black tree properties after a remove.
    ///
    /// `x` carries one missing black. It may be the sentinel, whose parent link was
    /// pointed at the vacated position by the caller.
    fn remove_fixup(&mut self, mut x: NodeIndex<Ix>) {
        while x != self.root && self.node_ref(x, Node::is_black) {
            let side = self.side_of(x);
            let mut w = self.parent_ref(x, |pn| pn.child(!side));
            if self.node_ref(w, Node::is_red) {
                self.node_mut(w, Node::set_color(Color::Black));
                self.parent_mut(x, Node::set_color(Color::Red));
                self.rotate(self.node_ref(x, Node::parent), side);
                w = self.parent_ref(x, |pn| pn.child(!side));
            }
            if self.node_ref(w, Node::is_sentinel) {
                break;
            }
            if self.child_ref(w, side, Node::is_black) && self.child_ref(w, !side, Node::is_black) {
                self.node_mut(w, Node::set_color(Color::Red));
                x = self.node_ref(x, Node::parent);
            } else {
                if self.child_ref(w, !side, Node::is_black) {
                    self.child_mut(w, side, Node::set_color(Color::Black));
                    self.node_mut(w, Node::set_color(Color::Red));
                    self.rotate(w, !side);
                    w = self.parent_ref(x, |pn| pn.child(!side));
                }
                self.node_mut(w, Node::set_color(self.parent_ref(x, Node::color)));
                self.parent_mut(x, Node::set_color(Color::Black));
                self.child_mut(w, !side, Node::set_color(Color::Black));
                self.rotate(self.node_ref(x, Node::parent), side);
                x = self.root;
            }
        }
        self.node_mut(x, Node::set_color(Color::Black));
    }

    /// Binary tree rotation that moves `x` down toward `dir`.
    ///
    /// `Dir::Left` is a left rotation: `x.right` takes the place of `x` and `x`
    /// becomes its left child. `Dir::Right` is the mirror.
    pub(crate) fn rotate(&mut self, x: NodeIndex<Ix>, dir: Dir) {
        if self.child_ref(x, !dir, Node::is_sentinel) {
            return;
        }
        let y = self.node_ref(x, |xn| xn.child(!dir));
        let inner = self.node_ref(y, |yn| yn.child(dir));
        self.node_mut(x, Node::set_child(!dir, inner));
        if !self.node_ref(inner, Node::is_sentinel) {
            self.node_mut(inner, Node::set_parent(x));
        }

        self.replace_parent(x, y);
        self.node_mut(y, Node::set_child(dir, x));
    }

    /// Replace parent during a rotation.
    fn replace_parent(&mut self, x: NodeIndex<Ix>, y: NodeIndex<Ix>) {
        self.node_mut(y, Node::set_parent(self.node_ref(x, Node::parent)));
        if self.parent_ref(x, Node::is_sentinel) {
            self.root = y;
        } else {
            let side = self.side_of(x);
            self.parent_mut(x, Node::set_child(side, y));
        }
        self.node_mut(x, Node::set_parent(y));
    }

    /// Follow `dir` links from `x` down to the last real node.
    fn extreme(&self, mut x: NodeIndex<Ix>, dir: Dir) -> NodeIndex<Ix> {
        while !self.child_ref(x, dir, Node::is_sentinel) {
            x = self.node_ref(x, |xn| xn.child(dir));
        }
        x
    }

    /// Replace one subtree as a child of its parent with another subtree.
    fn transplant(&mut self, u: NodeIndex<Ix>, v: NodeIndex<Ix>) {
        if self.parent_ref(u, Node::is_sentinel) {
            self.root = v;
        } else {
            let side = self.side_of(u);
            self.parent_mut(u, Node::set_child(side, v));
        }
        self.node_mut(v, Node::set_parent(self.node_ref(u, Node::parent)));
    }

    /// Which child of its parent a node is.
    fn side_of(&self, node: NodeIndex<Ix>) -> Dir {
        if self.parent_ref(node, Node::left) == node {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// Side of `node` a new node `z` descends to. Equal keys go right.
    fn descend_dir(&self, z: NodeIndex<Ix>, node: &Node<K, Ix>) -> Dir {
        if self.node_ref(z, Node::key) < node.key() {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// Resolve a handle to its slot if the slot still holds the node it was made for.
    fn live(&self, handle: Handle<Ix>) -> Option<NodeIndex<Ix>> {
        if handle.owner != self.id {
            return None;
        }
        self.nodes
            .get(handle.index.index())
            .filter(|node| !node.is_sentinel() && node.generation() == handle.generation)
            .map(|_| handle.index)
    }

    fn handle(&self, x: NodeIndex<Ix>) -> Handle<Ix> {
        Handle::new(self.id, x, self.node_ref(x, Node::generation))
    }
}

#[cfg(feature = "graphviz")]
impl<K, Ix> RbTree<K, Ix>
where
    K: Ord + std::fmt::Display,
    Ix: IndexType,
{
    /// Write the tree to `path` as a Graphviz dot file.
    pub fn draw(&self, path: &str) -> std::io::Result<()> {
        use std::io::Write;

        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        writeln!(out, "digraph rbtree {{")?;
        writeln!(out, "    node [style=filled, fontcolor=white];")?;
        let mut queue = VecDeque::new();
        if !self.node_ref(self.root, Node::is_sentinel) {
            queue.push_back(self.root);
        }
        while let Some(x) = queue.pop_front() {
            let fill = match self.node_ref(x, Node::color) {
                Color::Red => "red",
                Color::Black => "black",
            };
            writeln!(
                out,
                "    n{} [label=\"{}\", fillcolor={fill}];",
                x.index(),
                self.node_ref(x, Node::key)
            )?;
            for dir in [Dir::Left, Dir::Right] {
                let child = self.node_ref(x, |xn| xn.child(dir));
                if !self.node_ref(child, Node::is_sentinel) {
                    writeln!(out, "    n{} -> n{};", x.index(), child.index())?;
                    queue.push_back(child);
                }
            }
        }
        writeln!(out, "}}")?;
        out.flush()
    }
}

/// Arena layout as written by `Serialize`, before it is checked.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawTree<K, Ix> {
    nodes: Vec<Node<K, Ix>>,
    root: NodeIndex<Ix>,
    free_head: NodeIndex<Ix>,
    len: usize,
}

#[cfg(feature = "serde")]
fn corrupt<T>(reason: impl Into<String>) -> Result<T> {
    Err(Error::CorruptLayout(reason.into()))
}

#[cfg(feature = "serde")]
impl<K, Ix> RbTree<K, Ix>
where
    K: Ord,
    Ix: IndexType,
{
    /// Accept an arena only if every slot is accounted for and the linked nodes form a
    /// red-black tree whose in-order keys never decrease.
    fn from_raw(raw: RawTree<K, Ix>) -> Result<Self> {
        let RawTree {
            mut nodes,
            root,
            free_head,
            len,
        } = raw;
        let sentinel = NodeIndex::<Ix>::sentinel();
        match nodes.first() {
            Some(node) if node.is_sentinel() && node.is_black() => {}
            _ => return corrupt("slot 0 is not a black sentinel"),
        }
        // the sentinel parent is scratch space for erase
        nodes[sentinel.index()] = Node::new_sentinel();

        let mut seen = vec![false; nodes.len()];
        seen[sentinel.index()] = true;
        let mut linked = 0;
        if root != sentinel {
            match nodes.get(root.index()) {
                Some(node)
                    if !node.is_sentinel() && node.is_black() && node.parent() == sentinel => {}
                _ => return corrupt(format!("root {root:?} is not a black live node")),
            }
            let mut black_height = None;
            let mut stack = vec![(root, 1_usize)];
            seen[root.index()] = true;
            while let Some((x, blacks)) = stack.pop() {
                linked += 1;
                let node = &nodes[x.index()];
                for dir in [Dir::Left, Dir::Right] {
                    let c = node.child(dir);
                    if c == sentinel {
                        if *black_height.get_or_insert(blacks) != blacks {
                            return corrupt(format!("black height differs below {x:?}"));
                        }
                        continue;
                    }
                    let child = match nodes.get(c.index()) {
                        Some(child) if !seen[c.index()] => child,
                        _ => {
                            return corrupt(format!(
                                "{x:?} links to {c:?}, which is out of range or already linked"
                            ))
                        }
                    };
                    if child.is_sentinel() || child.parent() != x {
                        return corrupt(format!("{c:?} is not a live child of {x:?}"));
                    }
                    if node.is_red() && child.is_red() {
                        return corrupt(format!("red {x:?} has red child {c:?}"));
                    }
                    seen[c.index()] = true;
                    stack.push((c, blacks + usize::from(child.is_black())));
                }
            }
        }
        if linked != len {
            return corrupt(format!("len is {len} but {linked} nodes are linked"));
        }

        let mut x = free_head;
        while x != sentinel {
            match nodes.get(x.index()) {
                Some(node) if !seen[x.index()] && node.is_sentinel() => {
                    seen[x.index()] = true;
                    x = node.parent();
                }
                _ => {
                    return corrupt(format!(
                        "free list reaches {x:?}, which is not a fresh vacant slot"
                    ))
                }
            }
        }
        if let Some(slot) = (0..nodes.len()).find(|&i| !seen[i] && !nodes[i].is_retired()) {
            return corrupt(format!("slot {slot} is neither linked nor free"));
        }

        let tree = RbTree {
            nodes,
            root,
            free_head,
            len,
            id: next_tree_id(),
        };
        if tree.iter().zip(tree.iter().skip(1)).any(|(prev, next)| next < prev) {
            return corrupt("keys are out of order");
        }
        Ok(tree)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, Ix> serde::Deserialize<'de> for RbTree<K, Ix>
where
    K: Ord + serde::Deserialize<'de>,
    Ix: IndexType + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <RawTree<K, Ix> as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

// Convenient methods for reference or mutate current/parent/child node
impl<'a, K, Ix> RbTree<K, Ix>
where
    Ix: IndexType,
{
    pub(crate) fn node_ref<F, R>(&'a self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a Node<K, Ix>) -> R,
    {
        op(&self.nodes[node.index()])
    }

    fn node_mut<F, R>(&'a mut self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a mut Node<K, Ix>) -> R,
    {
        op(&mut self.nodes[node.index()])
    }

    fn child_ref<F, R>(&'a self, node: NodeIndex<Ix>, dir: Dir, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a Node<K, Ix>) -> R,
    {
        let idx = self.nodes[node.index()].child(dir).index();
        op(&self.nodes[idx])
    }

    fn parent_ref<F, R>(&'a self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a Node<K, Ix>) -> R,
    {
        let idx = self.nodes[node.index()].parent().index();
        op(&self.nodes[idx])
    }

    fn grand_parent_ref<F, R>(&'a self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a Node<K, Ix>) -> R,
    {
        let parent_idx = self.nodes[node.index()].parent().index();
        let grand_parent_idx = self.nodes[parent_idx].parent().index();
        op(&self.nodes[grand_parent_idx])
    }

    fn child_mut<F, R>(&'a mut self, node: NodeIndex<Ix>, dir: Dir, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a mut Node<K, Ix>) -> R,
    {
        let idx = self.nodes[node.index()].child(dir).index();
        op(&mut self.nodes[idx])
    }

    fn parent_mut<F, R>(&'a mut self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a mut Node<K, Ix>) -> R,
    {
        let idx = self.nodes[node.index()].parent().index();
        op(&mut self.nodes[idx])
    }

    fn grand_parent_mut<F, R>(&'a mut self, node: NodeIndex<Ix>, op: F) -> R
    where
        R: 'a,
        F: FnOnce(&'a mut Node<K, Ix>) -> R,
    {
        let parent_idx = self.nodes[node.index()].parent().index();
        let grand_parent_idx = self.nodes[parent_idx].parent().index();
        op(&mut self.nodes[grand_parent_idx])
    }
}
