use std::fmt;
use std::hash::Hash;

pub type DefaultIx = u32;

pub unsafe trait IndexType: Copy + Default + Hash + Ord + fmt::Debug + 'static {
    fn new(x: usize) -> Self;
    fn index(&self) -> usize;
    fn max() -> Self;
}

unsafe impl IndexType for u32 {
    #[inline(always)]
    fn new(x: usize) -> Self {
        x as u32
    }
    #[inline(always)]
    fn index(&self) -> usize {
        *self as usize
    }
    #[inline(always)]
    fn max() -> Self {
        u32::MAX
    }
}

unsafe impl IndexType for usize {
    #[inline(always)]
    fn new(x: usize) -> Self {
        x
    }
    #[inline(always)]
    fn index(&self) -> usize {
        *self
    }
    #[inline(always)]
    fn max() -> Self {
        usize::MAX
    }
}

/// Arena slot identifier.
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeIndex<Ix = DefaultIx>(Ix);

impl<Ix: IndexType> NodeIndex<Ix> {
    #[inline]
    pub fn new(x: usize) -> Self {
        NodeIndex(IndexType::new(x))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0.index()
    }

    /// The slot every tree reserves for its sentinel.
    #[inline]
    pub fn sentinel() -> Self {
        NodeIndex(IndexType::new(0))
    }

    #[inline]
    pub fn end() -> Self {
        NodeIndex(IndexType::max())
    }
}

impl<Ix: fmt::Debug> fmt::Debug for NodeIndex<Ix> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeIndex({:?})", self.0)
    }
}

/// A reference to a node of an [`RbTree`](crate::RbTree).
///
/// A handle pairs the arena slot of a node with the generation the slot had when the
/// node was created, and with the id of the tree that issued it. Erasing a node bumps
/// the generation of its slot, so every handle obtained before the erase is rejected
/// afterwards instead of reaching whatever key reuses the slot. A slot whose generation
/// reaches `u32::MAX` is retired and never handed out again.
///
/// Tree ids come from a process-wide `u32` counter, so two trees only share an id after
/// 2^32 trees have been created.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Handle<Ix = DefaultIx> {
    pub(crate) owner: u32,
    pub(crate) index: NodeIndex<Ix>,
    pub(crate) generation: u32,
}

impl<Ix: IndexType> Handle<Ix> {
    pub(crate) fn new(owner: u32, index: NodeIndex<Ix>, generation: u32) -> Self {
        Handle {
            owner,
            index,
            generation,
        }
    }

    /// Arena slot this handle points at.
    #[inline]
    pub fn index(&self) -> usize {
        self.index.index()
    }
}

impl<Ix: fmt::Debug> fmt::Debug for Handle<Ix> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Handle({:?}@{} of tree {})",
            self.index.0, self.generation, self.owner
        )
    }
}
