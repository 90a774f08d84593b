//! `rb_key_tree` is an ordered key map based on a red-black tree.
//!
//! It implements the insertion and deletion fix-ups of a red-black tree, so every
//! insert, lookup and erase runs in O(logN) time.
//!
//! All nodes live in one arena and refer to their parent and children by slot index.
//! Slot 0 holds a black sentinel that stands in for every missing child, so the
//! balancing code never branches on an absent link. Nodes are reached from outside
//! through [`Handle`]s, which carry the generation of their slot: a handle to an
//! erased node is rejected rather than silently reading whatever key reuses the slot.
//!
//! # Example
//!
//! ```rust
//! use rb_key_tree::RbTree;
//!
//! let mut tree = RbTree::new();
//! for key in [10, 20, 30, 15, 25, 5] {
//!     tree.insert(key).unwrap();
//! }
//! assert_eq!(tree.export_sorted(6), vec![5, 10, 15, 20, 25, 30]);
//!
//! let twenty = tree.find(&20).unwrap();
//! tree.erase(twenty).unwrap();
//! assert_eq!(tree.export_sorted(5), vec![5, 10, 15, 25, 30]);
//! ```
//!

mod error;
mod index;
mod iter;
mod node;
mod rbtree;


pub use error::{Error, Result};
pub use index::{DefaultIx, Handle, IndexType, NodeIndex};
pub use iter::Iter;
pub use node::Color;
pub use rbtree::{Key, RbTree};
