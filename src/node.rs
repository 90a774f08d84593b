use std::ops::Not;

use crate::index::{IndexType, NodeIndex};

/// Node of the red-black tree
///
/// The sentinel and vacant arena slots carry no key. A vacant slot threads the free
/// list through its `parent` link.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node<K, Ix> {
    /// Left children
    pub left: NodeIndex<Ix>,
    /// Right children
    pub right: NodeIndex<Ix>,
    /// Parent
    pub parent: NodeIndex<Ix>,
    /// Color of the node
    pub color: Color,

    /// Key of the node
    pub key: Option<K>,
    /// Bumped every time the slot is released
    pub generation: u32,
}

impl<K, Ix> Node<K, Ix>
where
    Ix: IndexType,
{
    /// Create the sentinel: black, self-linked, keyless.
    pub fn new_sentinel() -> Self {
        Node {
            left: NodeIndex::sentinel(),
            right: NodeIndex::sentinel(),
            parent: NodeIndex::sentinel(),
            color: Color::Black,
            key: None,
            generation: 0,
        }
    }

    /// Create a fresh red leaf.
    pub fn new_leaf(key: K) -> Self {
        Node {
            left: NodeIndex::sentinel(),
            right: NodeIndex::sentinel(),
            parent: NodeIndex::sentinel(),
            color: Color::Red,
            key: Some(key),
            generation: 0,
        }
    }
}

// Convenient getter/setter methods
impl<K, Ix> Node<K, Ix>
where
    Ix: IndexType,
{
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn key(&self) -> &K {
        self.key.as_ref().unwrap()
    }

    pub fn left(&self) -> NodeIndex<Ix> {
        self.left
    }

    pub fn right(&self) -> NodeIndex<Ix> {
        self.right
    }

    pub fn parent(&self) -> NodeIndex<Ix> {
        self.parent
    }

    pub fn child(&self, dir: Dir) -> NodeIndex<Ix> {
        match dir {
            Dir::Left => self.left,
            Dir::Right => self.right,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_sentinel(&self) -> bool {
        self.key.is_none()
    }

    /// A vacant slot whose generation is spent. It stays off the free list for good.
    pub fn is_retired(&self) -> bool {
        self.is_sentinel() && self.generation == u32::MAX
    }

    pub fn is_black(&self) -> bool {
        matches!(self.color, Color::Black)
    }

    pub fn is_red(&self) -> bool {
        matches!(self.color, Color::Red)
    }

    pub fn set_color(color: Color) -> impl FnOnce(&mut Node<K, Ix>) {
        move |node: &mut Node<K, Ix>| {
            node.color = color;
        }
    }

    pub fn set_child(dir: Dir, child: NodeIndex<Ix>) -> impl FnOnce(&mut Node<K, Ix>) {
        move |node: &mut Node<K, Ix>| match dir {
            Dir::Left => node.left = child,
            Dir::Right => node.right = child,
        }
    }

    pub fn set_parent(parent: NodeIndex<Ix>) -> impl FnOnce(&mut Node<K, Ix>) {
        move |node: &mut Node<K, Ix>| {
            node.parent = parent;
        }
    }

    /// Move a new key into a vacant slot, turning it into a red leaf.
    pub fn occupy(key: K) -> impl FnOnce(&mut Node<K, Ix>) {
        move |node: &mut Node<K, Ix>| {
            node.key = Some(key);
            node.color = Color::Red;
            node.left = NodeIndex::sentinel();
            node.right = NodeIndex::sentinel();
            node.parent = NodeIndex::sentinel();
        }
    }

    /// Move the key out and link the slot in front of `next_free`.
    pub fn vacate(next_free: NodeIndex<Ix>) -> impl FnOnce(&mut Node<K, Ix>) -> K {
        move |node: &mut Node<K, Ix>| {
            node.generation = node.generation.saturating_add(1);
            node.color = Color::Black;
            node.left = NodeIndex::sentinel();
            node.right = NodeIndex::sentinel();
            node.parent = next_free;
            node.key.take().unwrap()
        }
    }
}

/// The color of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Color {
    /// Red node
    Red,
    /// Black node
    Black,
}

/// Side of a parent a child hangs on.
///
/// Every mirrored case of the fix-ups is written once against a `Dir` and its
/// opposite `!dir`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dir {
    Left,
    Right,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}
