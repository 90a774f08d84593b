use std::iter::FusedIterator;

use crate::index::{IndexType, NodeIndex};
use crate::node::Node;
use crate::rbtree::RbTree;

/// Pushes a link of nodes on the left to stack.
fn push_left_link<K, Ix>(tree: &RbTree<K, Ix>, mut x: NodeIndex<Ix>, stack: &mut Vec<NodeIndex<Ix>>)
where
    Ix: IndexType,
{
    while !tree.node_ref(x, Node::is_sentinel) {
        stack.push(x);
        x = tree.node_ref(x, Node::left);
    }
}

/// An iterator over the keys of a `RbTree`, in ascending order.
///
/// The walk keeps an explicit stack of the pending left spine, so its depth is bounded
/// by the height of the tree.
#[derive(Debug)]
pub struct Iter<'a, K, Ix> {
    /// Reference to the tree
    pub(crate) tree: &'a RbTree<K, Ix>,
    /// Stack for iteration
    pub(crate) stack: Vec<NodeIndex<Ix>>,
    /// Keys not yet yielded
    pub(crate) remaining: usize,
}

impl<'a, K, Ix> Iter<'a, K, Ix>
where
    Ix: IndexType,
{
    pub(crate) fn new(tree: &'a RbTree<K, Ix>) -> Self {
        let mut stack = Vec::new();
        push_left_link(tree, tree.root, &mut stack);
        Iter {
            tree,
            stack,
            remaining: tree.len,
        }
    }
}

impl<'a, K, Ix> Iterator for Iter<'a, K, Ix>
where
    Ix: IndexType,
{
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let x = self.stack.pop()?;
        push_left_link(self.tree, self.tree.node_ref(x, Node::right), &mut self.stack);
        self.remaining -= 1;
        Some(self.tree.node_ref(x, Node::key))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, Ix> ExactSizeIterator for Iter<'_, K, Ix> where Ix: IndexType {}

impl<K, Ix> FusedIterator for Iter<'_, K, Ix> where Ix: IndexType {}

#[cfg(test)]
mod test {
    use crate::RbTree;

    #[test]
    fn iter_on_empty_tree_yields_nothing() {
        let tree = RbTree::<i32>::new();
        let mut iter = tree.iter();
        assert_eq!(iter.len(), 0);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn iter_counts_down() {
        let mut tree = RbTree::new();
        for key in [5, 3, 8, 1] {
            let _ignore = tree.insert(key).unwrap();
        }
        let mut iter = tree.iter();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.len(), 3);
        let rest: Vec<_> = iter.collect();
        assert_eq!(rest, vec![&3, &5, &8]);
    }

    #[test]
    fn borrowed_tree_into_iter() {
        let mut tree = RbTree::new();
        for key in [2, 1] {
            let _ignore = tree.insert(key).unwrap();
        }
        let mut seen = Vec::new();
        for key in &tree {
            seen.push(*key);
        }
        assert_eq!(seen, vec![1, 2]);
    }
}
